// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Orchestrates the other layers for one user-level goal.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing (that's Layer 1)
//   - Only workflow coordination, plus the dataset shape lines
//     printed right after loading
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// Scoring a finished run
pub mod evaluate_use_case;
