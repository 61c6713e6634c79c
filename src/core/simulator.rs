//! Scripted vitals simulator.
//!
//! [`Waveform`] is the pure per-mode state machine; [`SimulatorController`]
//! owns the timer task and the shared patient record, and publishes every
//! change through a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::models::{PatientData, PatientIdentity, Vitals};

/// SpO2 values stepped through after entering safe mode.
pub const SAFE_SEQUENCE: [u8; 10] = [98, 97, 96, 94, 93, 93, 93, 94, 95, 96];

const DANGER_LOW: u8 = 88;
const DANGER_HIGH: u8 = 89;
const SAFE_LOW: u8 = 96;
const SAFE_HIGH: u8 = 97;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    #[default]
    Danger,
    Safe,
}

impl SimulationMode {
    pub fn toggled(self) -> Self {
        match self {
            SimulationMode::Danger => SimulationMode::Safe,
            SimulationMode::Safe => SimulationMode::Danger,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Waveform {
    mode: SimulationMode,
    step: usize,
}

impl Waveform {
    pub fn new(mode: SimulationMode) -> Self {
        Self { mode, step: 0 }
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Vitals the record is reset to when the mode is entered.
    pub fn baseline(&self) -> Vitals {
        match self.mode {
            SimulationMode::Danger => Vitals::DANGER,
            SimulationMode::Safe => Vitals {
                spo2: SAFE_SEQUENCE[0],
                ..Vitals::SAFE
            },
        }
    }

    /// Next SpO2 value given the one currently on the record.
    pub fn advance(&mut self, current: u8) -> u8 {
        match self.mode {
            SimulationMode::Danger => {
                if current == DANGER_LOW {
                    DANGER_HIGH
                } else {
                    DANGER_LOW
                }
            }
            SimulationMode::Safe => match SAFE_SEQUENCE.get(self.step) {
                Some(&value) => {
                    self.step += 1;
                    value
                }
                None if current == SAFE_LOW => SAFE_HIGH,
                None => SAFE_LOW,
            },
        }
    }
}

/// Tick periods per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorTiming {
    pub danger: Duration,
    pub safe: Duration,
}

/// Shortest period a timer is started with; `interval` rejects zero.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

impl SimulatorTiming {
    pub fn period(&self, mode: SimulationMode) -> Duration {
        let period = match mode {
            SimulationMode::Danger => self.danger,
            SimulationMode::Safe => self.safe,
        };
        period.max(MIN_PERIOD)
    }
}

impl Default for SimulatorTiming {
    fn default() -> Self {
        Self {
            danger: Duration::from_millis(2000),
            safe: Duration::from_millis(1200),
        }
    }
}

/// What subscribers observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorSnapshot {
    pub mode: SimulationMode,
    pub running: bool,
    /// Bumped on every start, switch and stop.
    pub epoch: u64,
    /// Ticks applied within the current epoch.
    pub tick: u64,
    pub patient: PatientData,
}

pub struct SimulatorController {
    state: Arc<watch::Sender<SimulatorSnapshot>>,
    timing: SimulatorTiming,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatorController {
    /// Creates a stopped controller holding the danger preset.
    pub fn new(identity: PatientIdentity, timing: SimulatorTiming) -> Self {
        let (state, _) = watch::channel(SimulatorSnapshot {
            mode: SimulationMode::Danger,
            running: false,
            epoch: 0,
            tick: 0,
            patient: PatientData::new(identity, Vitals::DANGER),
        });

        Self {
            state: Arc::new(state),
            timing,
            task: Mutex::new(None),
        }
    }

    /// Resets the record to `mode`'s baseline and starts its timer,
    /// cancelling whatever was running. Must be called inside a Tokio runtime.
    pub fn start(&self, mode: SimulationMode) -> SimulatorSnapshot {
        let mut task = self.lock_task();
        self.restart(&mut task, mode)
    }

    pub fn switch_mode(&self, mode: SimulationMode) -> SimulatorSnapshot {
        info!(from = ?self.state.borrow().mode, to = ?mode, "switching simulation mode");
        self.start(mode)
    }

    /// Flips between danger and safe. The current mode is read under the
    /// task lock, so concurrent toggles each flip once.
    pub fn toggle(&self) -> SimulatorSnapshot {
        let mut task = self.lock_task();
        let next = self.state.borrow().mode.toggled();
        info!(to = ?next, "toggling simulation mode");
        self.restart(&mut task, next)
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn restart(&self, task: &mut Option<JoinHandle<()>>, mode: SimulationMode) -> SimulatorSnapshot {
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let waveform = Waveform::new(mode);
        let baseline = waveform.baseline();
        let mut epoch = 0;
        self.state.send_modify(|s| {
            s.epoch += 1;
            s.mode = mode;
            s.running = true;
            s.tick = 0;
            s.patient.vitals = baseline;
            epoch = s.epoch;
        });

        let period = self.timing.period(mode);
        info!(?mode, epoch, period_ms = period.as_millis() as u64, "simulator started");

        *task = Some(tokio::spawn(run_waveform(
            Arc::clone(&self.state),
            waveform,
            epoch,
            Instant::now() + period,
            period,
        )));

        self.snapshot()
    }

    /// Cancels the timer and keeps the last record.
    pub fn stop(&self) -> SimulatorSnapshot {
        let mut task = self.lock_task();
        if let Some(handle) = task.take() {
            handle.abort();
        }

        self.state.send_modify(|s| {
            s.epoch += 1;
            s.running = false;
        });
        info!("simulator stopped");

        self.snapshot()
    }

    /// Replaces the display name; vitals and timer are untouched.
    pub fn rename(&self, name: impl Into<String>) -> SimulatorSnapshot {
        let name = name.into();
        self.state.send_modify(|s| s.patient.identity.name = name);
        self.snapshot()
    }

    pub fn snapshot(&self) -> SimulatorSnapshot {
        self.state.borrow().clone()
    }

    pub fn patient(&self) -> PatientData {
        self.state.borrow().patient.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SimulatorSnapshot> {
        self.state.subscribe()
    }
}

impl Drop for SimulatorController {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

async fn run_waveform(
    state: Arc<watch::Sender<SimulatorSnapshot>>,
    mut waveform: Waveform,
    epoch: u64,
    first_tick: Instant,
    period: Duration,
) {
    let mut ticker = time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // The epoch check runs under the channel lock, so a tick racing a
        // restart can never land on the new record.
        let applied = state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.patient.vitals.spo2 = waveform.advance(s.patient.vitals.spo2);
            s.tick += 1;
            true
        });

        if !applied {
            debug!(epoch, "stale simulator task exiting");
            break;
        }

        debug!(mode = ?waveform.mode(), epoch, spo2 = state.borrow().patient.vitals.spo2, "tick");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> SimulatorController {
        SimulatorController::new(PatientIdentity::default(), SimulatorTiming::default())
    }

    async fn next_values(
        rx: &mut watch::Receiver<SimulatorSnapshot>,
        count: usize,
    ) -> Vec<u8> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            rx.changed().await.unwrap();
            values.push(rx.borrow_and_update().patient.vitals.spo2);
        }
        values
    }

    #[test]
    fn danger_waveform_alternates() {
        let mut waveform = Waveform::new(SimulationMode::Danger);
        let mut spo2 = waveform.baseline().spo2;
        assert_eq!(spo2, 88);

        let mut seen = Vec::new();
        for _ in 0..6 {
            spo2 = waveform.advance(spo2);
            seen.push(spo2);
        }
        assert_eq!(seen, vec![89, 88, 89, 88, 89, 88]);
    }

    #[test]
    fn safe_waveform_runs_sequence_then_oscillates() {
        let mut waveform = Waveform::new(SimulationMode::Safe);
        let mut spo2 = waveform.baseline().spo2;
        assert_eq!(spo2, 98);

        let mut seen = Vec::new();
        for _ in 0..14 {
            spo2 = waveform.advance(spo2);
            seen.push(spo2);
        }
        assert_eq!(&seen[..10], &SAFE_SEQUENCE);
        assert_eq!(&seen[10..], &[97, 96, 97, 96]);
    }

    #[test]
    fn baselines_hold_non_spo2_fields() {
        let danger = Waveform::new(SimulationMode::Danger).baseline();
        let safe = Waveform::new(SimulationMode::Safe).baseline();
        assert_eq!(danger, Vitals::DANGER);
        assert_eq!(safe.rr, Vitals::SAFE.rr);
        assert_eq!(safe.p_peak_measured, Vitals::SAFE.p_peak_measured);
    }

    #[tokio::test(start_paused = true)]
    async fn danger_ticks_every_two_seconds() {
        let sim = controller();
        let mut rx = sim.subscribe();
        let started = Instant::now();
        sim.start(SimulationMode::Danger);
        rx.borrow_and_update();

        let first = next_values(&mut rx, 1).await;
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
        let rest = next_values(&mut rx, 5).await;

        assert_eq!(first, vec![89]);
        assert_eq!(rest, vec![88, 89, 88, 89, 88]);
    }

    #[tokio::test(start_paused = true)]
    async fn safe_ticks_follow_sequence() {
        let sim = controller();
        let mut rx = sim.subscribe();
        let started = Instant::now();
        sim.start(SimulationMode::Safe);
        assert_eq!(rx.borrow_and_update().patient.vitals.spo2, 98);

        let values = next_values(&mut rx, 14).await;
        assert_eq!(started.elapsed(), Duration::from_millis(1200 * 14));
        assert_eq!(&values[..10], &SAFE_SEQUENCE);
        assert_eq!(&values[10..], &[97, 96, 97, 96]);
        assert_eq!(sim.snapshot().tick, 14);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_discards_previous_timer() {
        let sim = controller();
        let mut rx = sim.subscribe();
        sim.start(SimulationMode::Danger);
        rx.borrow_and_update();
        next_values(&mut rx, 3).await;

        let switched_at = Instant::now();
        let snapshot = sim.switch_mode(SimulationMode::Safe);
        assert_eq!(snapshot.mode, SimulationMode::Safe);
        assert_eq!(snapshot.patient.vitals.spo2, 98);
        assert_eq!(snapshot.patient.vitals.rr, Vitals::SAFE.rr);
        assert_eq!(snapshot.tick, 0);
        let epoch = snapshot.epoch;
        rx.borrow_and_update();

        let values = next_values(&mut rx, 12).await;
        assert_eq!(switched_at.elapsed(), Duration::from_millis(1200 * 12));
        assert_eq!(&values[..10], &SAFE_SEQUENCE);
        assert_eq!(&values[10..], &[97, 96]);
        assert!(!values.contains(&88) && !values.contains(&89));
        assert_eq!(sim.snapshot().epoch, epoch);

        // And back again: the safe sequence position is not carried over.
        let snapshot = sim.toggle();
        assert_eq!(snapshot.mode, SimulationMode::Danger);
        assert_eq!(snapshot.patient.vitals, Vitals::DANGER);
        rx.borrow_and_update();
        assert_eq!(next_values(&mut rx, 2).await, vec![89, 88]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_record() {
        let sim = controller();
        let mut rx = sim.subscribe();
        sim.start(SimulationMode::Safe);
        rx.borrow_and_update();
        next_values(&mut rx, 2).await;

        let stopped = sim.stop();
        assert!(!stopped.running);
        rx.borrow_and_update();

        time::sleep(Duration::from_secs(30)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(sim.snapshot().patient.vitals.spo2, 97);
    }

    #[tokio::test(start_paused = true)]
    async fn rename_keeps_vitals_and_timer() {
        let sim = controller();
        let mut rx = sim.subscribe();
        sim.start(SimulationMode::Danger);
        rx.borrow_and_update();

        let renamed = sim.rename("Harin");
        assert_eq!(renamed.patient.identity.name, "Harin");
        assert_eq!(renamed.patient.vitals.spo2, 88);
        rx.borrow_and_update();

        assert_eq!(next_values(&mut rx, 1).await, vec![89]);
        assert_eq!(sim.patient().identity.name, "Harin");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_clamped() {
        let sim = SimulatorController::new(
            PatientIdentity::default(),
            SimulatorTiming {
                danger: Duration::ZERO,
                safe: Duration::ZERO,
            },
        );
        let mut rx = sim.subscribe();
        sim.start(SimulationMode::Danger);
        rx.borrow_and_update();

        assert_eq!(next_values(&mut rx, 2).await, vec![89, 88]);
        assert!(sim.snapshot().running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_each_flip_once() {
        let sim = Arc::new(controller());
        sim.start(SimulationMode::Danger);
        let epoch = sim.snapshot().epoch;

        let toggles: Vec<_> = (0..32)
            .map(|_| {
                let sim = Arc::clone(&sim);
                tokio::task::spawn_blocking(move || {
                    sim.toggle();
                })
            })
            .collect();
        for toggle in toggles {
            toggle.await.unwrap();
        }

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.epoch, epoch + 32);
        assert_eq!(snapshot.mode, SimulationMode::Danger);
        assert_eq!(snapshot.patient.vitals, Vitals::DANGER);
    }
}
