//! Pluggable reporters for run output.

use std::io::Write;

use crate::result::{RunPlan, RunSummary};

/// Line printed before any worker starts.
pub const START_BANNER: &str = "stress test";

/// Line printed after a clean run.
pub const COMPLETION_LINE: &str = "ok";

/// Trait for run reporters.
pub trait Reporter: Send + Sync {
    /// Called once setup is done, before workers spawn.
    fn run_start(&self, _plan: &RunPlan) {}

    /// Called after every worker joined without a violation.
    fn run_end(&self, _summary: &RunSummary) {}
}

/// Prints the fixed banner and completion lines to stdout.
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn run_start(&self, _plan: &RunPlan) {
        println!("{}", START_BANNER);
        std::io::stdout().flush().ok();
    }

    fn run_end(&self, _summary: &RunSummary) {
        println!("{}", COMPLETION_LINE);
    }
}

/// Prints the run summary as pretty JSON to stdout.
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }

    fn render(summary: &RunSummary) -> serde_json::Result<String> {
        serde_json::to_string_pretty(summary)
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn run_end(&self, summary: &RunSummary) {
        match Self::render(summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Warning: failed to render JSON summary: {}", e),
        }
    }
}

/// Combines multiple reporters.
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        Self { reporters }
    }
}

impl Reporter for MultiReporter {
    fn run_start(&self, plan: &RunPlan) {
        for r in &self.reporters {
            r.run_start(plan);
        }
    }

    fn run_end(&self, summary: &RunSummary) {
        for r in &self.reporters {
            r.run_end(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn summary() -> RunSummary {
        RunSummary::from_reports(
            RunPlan {
                backend: "reference".to_string(),
                workers: 2,
                capacity: 512,
                duration: Duration::from_secs(1),
            },
            Duration::from_secs(1),
            "0".to_string(),
            vec![],
        )
    }

    struct Counting(Arc<AtomicUsize>);

    impl Reporter for Counting {
        fn run_end(&self, _summary: &RunSummary) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn should_fan_out_when_multiple_reporters() {
        let hits = Arc::new(AtomicUsize::new(0));
        let multi = MultiReporter::new(vec![
            Box::new(Counting(Arc::clone(&hits))),
            Box::new(Counting(Arc::clone(&hits))),
        ]);
        multi.run_end(&summary());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn should_render_counters_when_json() {
        let json = JsonReporter::render(&summary()).unwrap();
        assert!(json.contains("\"frames_verified\": 0"));
        assert!(json.contains("\"backend\": \"reference\""));
    }
}
