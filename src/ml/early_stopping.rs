// ============================================================
// Layer 5: Early Stopping
// ============================================================
// Called once per scored epoch with the monitored metric. Training
// stops once `patience` consecutive epochs fail to improve
// strictly on the best value seen so far.
//
//   NewBest        value beat the best, counter reset
//   NoImprovement  counter incremented, patience left
//   Stop           counter reached patience
//
// NaN never counts as an improvement.

/// Whether larger or smaller metric values are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Min,
    Max,
}

impl MonitorMode {
    /// Loss-like metrics are minimised, everything else maximised.
    pub fn for_metric(name: &str) -> Self {
        if name.ends_with("loss") { MonitorMode::Min } else { MonitorMode::Max }
    }

    /// `candidate` is strictly better than `best`. NaN never improves.
    pub fn improves(self, candidate: f64, best: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }
        match self {
            MonitorMode::Max => candidate > best,
            MonitorMode::Min => candidate < best,
        }
    }

    fn worst(self) -> f64 {
        match self {
            MonitorMode::Max => f64::NEG_INFINITY,
            MonitorMode::Min => f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoppingDecision {
    NewBest,
    NoImprovement { count: usize, remaining: usize },
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor:    String,
    mode:       MonitorMode,
    patience:   usize,
    best_value: f64,
    counter:    usize,
    verbose:    bool,
}

impl EarlyStopping {
    pub fn new(monitor: impl Into<String>, mode: MonitorMode, patience: usize) -> Self {
        Self {
            monitor: monitor.into(),
            mode,
            patience,
            best_value: mode.worst(),
            counter: 0,
            verbose: false,
        }
    }

    /// Log every decision at info level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn check(&mut self, value: f64) -> StoppingDecision {
        if self.mode.improves(value, self.best_value) {
            if self.verbose {
                tracing::info!(
                    "Metric {} improved to {:.4} (previous best {:.4})",
                    self.monitor, value, self.best_value
                );
            }
            self.best_value = value;
            self.counter = 0;
            return StoppingDecision::NewBest;
        }

        self.counter += 1;
        if self.counter >= self.patience {
            if self.verbose {
                tracing::info!(
                    "Monitored metric {} did not improve in the last {} epochs. Best score: {:.4}. Stopping.",
                    self.monitor, self.counter, self.best_value
                );
            }
            return StoppingDecision::Stop;
        }

        let remaining = self.patience - self.counter;
        if self.verbose {
            tracing::info!(
                "Metric {} did not improve ({:.4} vs best {:.4}); {} epoch(s) of patience left",
                self.monitor, value, self.best_value, remaining
            );
        }
        StoppingDecision::NoImprovement { count: self.counter, remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_after_patience_plateau() {
        let mut es = EarlyStopping::new("val_acc", MonitorMode::Max, 2);
        assert_eq!(es.check(0.5), StoppingDecision::NewBest);
        assert_eq!(es.check(0.6), StoppingDecision::NewBest);
        assert_eq!(es.check(0.6), StoppingDecision::NoImprovement { count: 1, remaining: 1 });
        assert_eq!(es.check(0.55), StoppingDecision::Stop);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut es = EarlyStopping::new("val_acc", MonitorMode::Max, 2);
        es.check(0.5);
        es.check(0.4);
        assert_eq!(es.check(0.7), StoppingDecision::NewBest);
        assert_eq!(es.check(0.7), StoppingDecision::NoImprovement { count: 1, remaining: 1 });
    }

    #[test]
    fn test_zero_patience_stops_on_first_plateau() {
        let mut es = EarlyStopping::new("val_acc", MonitorMode::Max, 0);
        assert_eq!(es.check(0.3), StoppingDecision::NewBest);
        assert_eq!(es.check(0.3), StoppingDecision::Stop);
    }

    #[test]
    fn test_min_mode() {
        let mut es = EarlyStopping::new("val_loss", MonitorMode::Min, 3);
        es.check(1.0);
        assert_eq!(es.check(1.2), StoppingDecision::NoImprovement { count: 1, remaining: 2 });
        assert_eq!(es.check(0.8), StoppingDecision::NewBest);
    }

    #[test]
    fn test_mode_follows_metric_name() {
        assert_eq!(MonitorMode::for_metric("val_acc"), MonitorMode::Max);
        assert_eq!(MonitorMode::for_metric("val_loss"), MonitorMode::Min);
    }

    #[test]
    fn test_nan_is_not_improvement() {
        let mut es = EarlyStopping::new("val_acc", MonitorMode::Max, 5);
        assert!(matches!(es.check(f64::NAN), StoppingDecision::NoImprovement { count: 1, .. }));
        assert_eq!(es.check(0.1), StoppingDecision::NewBest);
    }
}
