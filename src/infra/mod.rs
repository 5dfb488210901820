// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Filesystem concerns shared by the training and evaluation
// workflows:
//
//   checkpoint.rs    run directory layout, best-only gzip MessagePack
//                    weights, best_score.json and run_config.json
//
//   metrics.rs       per-epoch and per-step CSV logs
//
//   config_file.rs   optional JSON RunConfig from --config
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Records and Checkpointing)

/// Run directory artifacts and the best-checkpoint policy
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Run configuration file loading
pub mod config_file;
