use chrono::{DateTime, Duration, Utc};
use log::debug;

/// Measures one stage of the classification pipeline.
pub struct StageTimer {
    stage: &'static str,
    started: DateTime<Utc>,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        debug!("{}: starting", stage);

        StageTimer {
            stage,
            started: Utc::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        Utc::now() - self.started
    }

    /// Stop the timer and return the elapsed milliseconds.
    pub fn finish(self) -> i64 {
        let msec = self.elapsed().num_milliseconds();
        debug!("{} duration: {} msec", self.stage, msec);
        msec
    }
}

/// Per-stage durations of a single prediction, in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    pub preprocess: i64,
    pub inference: i64,
}

impl Timings {
    pub fn total(&self) -> i64 {
        self.preprocess + self.inference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_stage_is_never_negative() {
        let timer = StageTimer::start("noop");
        assert!(timer.finish() >= 0);
    }

    #[test]
    fn total_adds_stages() {
        let timings = Timings {
            preprocess: 12,
            inference: 30,
        };
        assert_eq!(timings.total(), 42);
    }
}
