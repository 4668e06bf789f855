//! Telemetry simulator.
//!
//! Fabricates power and cadence samples on a fixed period so the rest of
//! the crate (and any UI on top of it) can run on hosts without Bluetooth.
//! The simulator has no discovery or connect phase.

use parking_lot::{Mutex, ReentrantMutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::config::SimulatorConfig;
use crate::data::TelemetrySample;
use crate::error::Result;
use crate::sink::TelemetrySink;
use crate::utils::STATS_PLACEHOLDER;

/// Periodic generator of synthetic telemetry.
pub struct TelemetrySimulator {
    /// Settings.
    config: SimulatorConfig,
    /// Where stats are reset on stop.
    sink: Arc<dyn TelemetrySink>,
    /// Sample source.
    rng: Arc<Mutex<StdRng>>,
    /// Held while a sample is handed out, and by `stop()`. Reentrant so a
    /// callback may stop the simulator it is called from.
    emission: Arc<ReentrantMutex<()>>,
    /// Running flag.
    is_running: Arc<AtomicBool>,
    /// Emitter task handle.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetrySimulator {
    /// Create a simulator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`](crate::Error::InvalidParameter)
    /// if the configuration is invalid.
    pub fn new(config: SimulatorConfig, sink: Arc<dyn TelemetrySink>) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            sink,
            rng: Arc::new(Mutex::new(rng)),
            emission: Arc::new(ReentrantMutex::new(())),
            is_running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        })
    }

    /// The simulator settings.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Check if samples are being emitted.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Draw one sample without emitting it.
    pub fn next_sample(&self) -> TelemetrySample {
        draw(&mut self.rng.lock(), &self.config)
    }

    /// Start emitting a sample to `on_sample` every period.
    ///
    /// The first sample arrives one period after the call. Starting an
    /// already running simulator does nothing. Must be called from within a
    /// Tokio runtime.
    pub fn start<F>(&self, on_sample: F)
    where
        F: Fn(TelemetrySample) + Send + 'static,
    {
        if self.is_running.swap(true, Ordering::SeqCst) {
            debug!("Simulator already running, ignoring start request");
            return;
        }

        info!(
            "Starting telemetry simulator ({} ms period)",
            self.config.period_ms
        );

        let config = self.config.clone();
        let rng = self.rng.clone();
        let emission = self.emission.clone();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let period = config.period();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let _emitting = emission.lock();
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }

                let sample = draw(&mut rng.lock(), &config);
                trace!(
                    "Simulated sample: {:.1} W, {:.1} rpm",
                    sample.power_watts,
                    sample.cadence_rpm
                );
                on_sample(sample);
            }

            debug!("Simulator task ended");
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop emitting and reset the displayed stats to the placeholder.
    ///
    /// Returns `false` if the simulator was not running, in which case
    /// nothing is touched.
    pub fn stop(&self) -> bool {
        {
            // No sample lands after the reset.
            let _emission = self.emission.lock();
            if !self.is_running.swap(false, Ordering::SeqCst) {
                debug!("Simulator not running, ignoring stop request");
                return false;
            }
        }

        info!("Stopping telemetry simulator");

        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }

        self.sink.set_stats(STATS_PLACEHOLDER, STATS_PLACEHOLDER);
        true
    }
}

impl Drop for TelemetrySimulator {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

fn draw(rng: &mut StdRng, config: &SimulatorConfig) -> TelemetrySample {
    TelemetrySample::new(
        rng.gen_range(config.power_min_watts..config.power_max_watts),
        rng.gen_range(config.cadence_min_rpm..config.cadence_max_rpm),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MockTelemetrySink, RecordingSink};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn simulator(sink: Arc<dyn TelemetrySink>) -> TelemetrySimulator {
        TelemetrySimulator::new(SimulatorConfig::default().with_seed(42), sink).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(TelemetrySample) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_samples_stay_in_range() {
        let sim = simulator(Arc::new(RecordingSink::new()));
        for _ in 0..1_000 {
            let sample = sim.next_sample();
            assert!((140.0..240.0).contains(&sample.power_watts));
            assert!((78.0..178.0).contains(&sample.cadence_rpm));
        }
    }

    #[test]
    fn test_seeded_sequence_is_reproducible() {
        let a = simulator(Arc::new(RecordingSink::new()));
        let b = simulator(Arc::new(RecordingSink::new()));
        for _ in 0..10 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SimulatorConfig {
            cadence_min_rpm: 100.0,
            cadence_max_rpm: 100.0,
            ..SimulatorConfig::default()
        };
        assert!(TelemetrySimulator::new(config, Arc::new(RecordingSink::new())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_every_period() {
        let sim = simulator(Arc::new(RecordingSink::new()));
        let (count, on_sample) = counter();

        sim.start(on_sample);
        assert!(sim.is_running());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_one_emitter() {
        let sim = simulator(Arc::new(RecordingSink::new()));
        let (count, on_sample) = counter();
        let (second_count, second_on_sample) = counter();

        sim.start(on_sample);
        sim.start(second_on_sample);

        tokio::time::sleep(Duration::from_millis(1_250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_and_resets_stats() {
        let sink = RecordingSink::new();
        let sim = simulator(Arc::new(sink.clone()));
        let (count, on_sample) = counter();

        let display = sink.clone();
        sim.start(move |sample| {
            display.set_stats(&sample.power_text(), &sample.cadence_text());
            on_sample(sample);
        });

        tokio::time::sleep(Duration::from_millis(1_250)).await;
        assert_ne!(sink.stats().0, "--");

        assert!(sim.stop());
        assert!(!sim.is_running());
        assert_eq!(sink.stats(), ("--".to_string(), "--".to_string()));

        let emitted = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), emitted);
        assert_eq!(sink.stats(), ("--".to_string(), "--".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_resets_once() {
        let mut sink = MockTelemetrySink::new();
        sink.expect_set_stats()
            .withf(|power, cadence| power == "--" && cadence == "--")
            .times(1)
            .return_const(());

        let sim = simulator(Arc::new(sink));
        sim.start(|_| {});

        assert!(sim.stop());
        assert!(!sim.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_use_the_simulator() {
        let sink = RecordingSink::new();
        let sim = Arc::new(simulator(Arc::new(sink.clone())));
        let (count, on_sample) = counter();

        let weak = Arc::downgrade(&sim);
        sim.start(move |sample| {
            on_sample(sample);
            if let Some(sim) = weak.upgrade() {
                let _ = sim.next_sample();
                sim.stop();
            }
        });

        tokio::time::sleep(Duration::from_millis(1_250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sim.is_running());
        assert_eq!(sink.stats(), ("--".to_string(), "--".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let sim = simulator(Arc::new(RecordingSink::new()));
        let (count, on_sample) = counter();

        sim.start(|_| {});
        sim.stop();
        sim.start(on_sample);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
