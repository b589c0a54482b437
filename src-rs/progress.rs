use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

use crate::job::{JobId, JobStore};

/// Destination for percent-complete reports. Real operations and the
/// synthetic ticker both write through this.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

pub struct StoreProgress {
    store: Arc<JobStore>,
    id: JobId,
}

impl StoreProgress {
    pub fn new(store: Arc<JobStore>, id: JobId) -> Self {
        Self { store, id }
    }
}

impl ProgressSink for StoreProgress {
    fn report(&self, percent: u8) {
        let _ = self.store.report_progress(&self.id, percent);
    }
}

/// Picks the last `NN%` token out of a line of downloader output, e.g.
/// `  3072K ........ ........ 12% 1.21M 4s`.
pub fn parse_percent_line(line: &str) -> Option<u8> {
    line.split_whitespace()
        .filter_map(|token| token.strip_suffix('%'))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u8>().ok())
        .filter(|percent| *percent <= 100)
        .last()
}

#[derive(Clone, Debug, PartialEq)]
pub enum StepMode {
    Random { min: u8, max: u8 },
    Fixed(u8),
}

impl StepMode {
    fn next_step(&self) -> u8 {
        match *self {
            StepMode::Random { min, max } if min < max => rand::thread_rng().gen_range(min..=max),
            StepMode::Random { min, .. } => min,
            StepMode::Fixed(step) => step,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyntheticProgress {
    pub interval: Duration,
    pub cap: u8,
    pub steps: StepMode,
}

impl Default for SyntheticProgress {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            cap: 95,
            steps: StepMode::Random { min: 1, max: 10 },
        }
    }
}

/// Periodically advances progress for operations that report none of their
/// own. Aborted on drop; `stop` also waits for the task to finish so no tick
/// lands after the caller moves on.
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn start(cfg: SyntheticProgress, sink: Arc<dyn ProgressSink>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cfg.interval);
            interval.tick().await;
            let mut progress: u8 = 0;
            loop {
                interval.tick().await;
                progress = progress.saturating_add(cfg.steps.next_step()).min(cfg.cap);
                sink.report(progress);
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u8>>,
    }

    impl ProgressSink for Recorder {
        fn report(&self, percent: u8) {
            self.seen.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn parses_wget_dot_output() {
        assert_eq!(
            parse_percent_line("  3072K ........ ........ ........ 12% 1.21M 4s"),
            Some(12)
        );
        assert_eq!(parse_percent_line("100%[=======>] 45.2M 10.1MB/s in 4.5s"), None);
        assert_eq!(parse_percent_line("  46080K ........ 100%  9.8M=4.6s"), Some(100));
        assert_eq!(parse_percent_line("Resolving api.papermc.io..."), None);
        assert_eq!(parse_percent_line("bogus 250%"), None);
        assert_eq!(parse_percent_line("%"), None);
    }

    #[test]
    fn fixed_steps_are_deterministic() {
        assert_eq!(StepMode::Fixed(7).next_step(), 7);
        for _ in 0..50 {
            let step = StepMode::Random { min: 1, max: 10 }.next_step();
            assert!((1..=10).contains(&step));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_climbs_to_cap_and_stops() {
        let recorder = Arc::new(Recorder::default());
        let cfg = SyntheticProgress {
            interval: Duration::from_secs(2),
            cap: 95,
            steps: StepMode::Fixed(30),
        };
        let ticker = Ticker::start(cfg, recorder.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        ticker.stop().await;
        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![30, 60, 90, 95, 95]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(recorder.seen.lock().unwrap().len(), seen.len());
    }
}
