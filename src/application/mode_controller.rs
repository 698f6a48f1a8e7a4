// Mode state machine with minimum live-collection enforcement
use crate::application::clock::Clock;
use crate::application::telemetry_repository::HistoryProbe;
use crate::domain::error::TelemetryError;
use crate::domain::mode::{Mode, ModeChange, ModeState};
use crate::infrastructure::config::DisplaySettings;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModePolicy {
    /// How long Live is enforced when history is insufficient.
    pub min_live_ms: i64,
    pub recheck_interval: Duration,
    /// A probe slower than this counts as failed.
    pub probe_timeout: Duration,
}

impl Default for ModePolicy {
    fn default() -> Self {
        Self {
            min_live_ms: 60 * 60_000,
            recheck_interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&DisplaySettings> for ModePolicy {
    fn from(settings: &DisplaySettings) -> Self {
        Self {
            min_live_ms: settings.min_live_ms(),
            recheck_interval: settings.recheck_interval(),
            probe_timeout: settings.probe_timeout(),
        }
    }
}

struct Inner {
    state: ModeState,
    live_entered: bool,
    history_confirmed: bool,
}

/// State shared with the background recheck task.
struct Shared {
    family: String,
    inner: Mutex<Inner>,
    probe: Arc<dyn HistoryProbe>,
    probe_timeout: Duration,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<ModeChange>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, inner: &Inner) -> ModeChange {
        ModeChange {
            mode: inner.state.mode,
            enforced: inner.state.is_enforced(self.clock.now_ms()),
        }
    }

    fn notify(&self, change: ModeChange) {
        tracing::debug!(
            "Mode change for {}: mode={}, enforced={}",
            self.family,
            change.mode,
            change.enforced
        );
        // No subscribers is fine
        let _ = self.changes.send(change);
    }

    /// Probe failures and timeouts count as insufficient history.
    async fn probe(&self) -> bool {
        let outcome = tokio::time::timeout(
            self.probe_timeout,
            self.probe.has_sufficient_history(&self.family),
        )
        .await
        .unwrap_or_else(|_| Err(anyhow::anyhow!("timed out after {:?}", self.probe_timeout)));

        match outcome {
            Ok(sufficient) => sufficient,
            Err(e) => {
                let err = TelemetryError::ProbeFailure {
                    family: self.family.clone(),
                    reason: format!("{:#}", e),
                };
                tracing::warn!("{}; assuming insufficient history", err);
                false
            }
        }
    }

    /// One enforcement re-check. Returns `true` while enforcement remains
    /// active and another check is due.
    async fn recheck(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.state.mode != Mode::Live || inner.state.enforced_until.is_none() {
                return false;
            }
            if !inner.state.is_enforced(self.clock.now_ms()) {
                inner.state.clear_enforcement();
                let change = self.snapshot(&inner);
                drop(inner);
                tracing::info!("Minimum live window elapsed for {}, enforcement released", self.family);
                self.notify(change);
                return false;
            }
        }

        if !self.probe().await {
            tracing::debug!("History for {} still insufficient, keeping enforcement", self.family);
            return true;
        }

        let mut inner = self.lock();
        inner.history_confirmed = true;
        if inner.state.mode == Mode::Live && inner.state.enforced_until.is_some() {
            inner.state.clear_enforcement();
            let change = self.snapshot(&inner);
            drop(inner);
            tracing::info!("History for {} is now sufficient, enforcement released", self.family);
            self.notify(change);
        }
        false
    }
}

/// Governs which acquisition mode a view is in. Owned by exactly one view;
/// dropping it cancels the background re-check.
pub struct ModeController {
    shared: Arc<Shared>,
    policy: ModePolicy,
    recheck_task: Option<JoinHandle<()>>,
}

impl ModeController {
    /// Run the startup probe and pick the initial mode: Today when enough
    /// history exists, otherwise enforced Live.
    pub async fn start(
        family: impl Into<String>,
        probe: Arc<dyn HistoryProbe>,
        clock: Arc<dyn Clock>,
        policy: ModePolicy,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            family: family.into(),
            inner: Mutex::new(Inner {
                state: ModeState::new(Mode::Today),
                live_entered: false,
                history_confirmed: false,
            }),
            probe,
            probe_timeout: policy.probe_timeout,
            clock,
            changes,
        });

        let sufficient = shared.probe().await;
        shared.lock().history_confirmed = sufficient;

        let mut controller = Self {
            shared,
            policy,
            recheck_task: None,
        };

        if sufficient {
            tracing::info!("Sufficient history for {}, starting in today mode", controller.shared.family);
        } else {
            tracing::info!(
                "Insufficient history for {}, starting in enforced live mode",
                controller.shared.family
            );
            controller.enter_live();
        }

        controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModeChange> {
        self.shared.changes.subscribe()
    }

    pub fn state(&self) -> ModeState {
        self.shared.lock().state
    }

    pub fn mode(&self) -> Mode {
        self.shared.lock().state.mode
    }

    pub fn is_enforced(&self) -> bool {
        let now = self.shared.clock.now_ms();
        self.shared.lock().state.is_enforced(now)
    }

    pub fn current(&self) -> ModeChange {
        let inner = self.shared.lock();
        self.shared.snapshot(&inner)
    }

    /// Switch to Live. Enforcement starts only on the first entry of the
    /// session and only when history has not been confirmed.
    pub fn enter_live(&mut self) {
        let now = self.shared.clock.now_ms();
        let (before, after) = {
            let mut inner = self.shared.lock();
            let before = self.shared.snapshot(&inner);

            inner.state.mode = Mode::Live;
            if !inner.live_entered {
                inner.live_entered = true;
                if !inner.history_confirmed {
                    inner.state.enforcement_started_at = Some(now);
                    inner.state.enforced_until = Some(now.saturating_add(self.policy.min_live_ms));
                }
            }

            (before, self.shared.snapshot(&inner))
        };

        if after.enforced {
            self.ensure_recheck();
        }
        if before != after {
            self.shared.notify(after);
        }
    }

    /// Returns `false` when leaving Live is blocked by active enforcement.
    pub fn request_switch(&mut self, target: Mode) -> bool {
        if target == Mode::Live {
            self.enter_live();
            return true;
        }

        let now = self.shared.clock.now_ms();
        let (before, after) = {
            let mut inner = self.shared.lock();
            if inner.state.is_enforced(now) {
                tracing::debug!(
                    "Rejected switch to {} for {}: live collection enforced until {:?}",
                    target,
                    self.shared.family,
                    inner.state.enforced_until
                );
                return false;
            }

            let before = self.shared.snapshot(&inner);
            inner.state.mode = target;
            inner.state.clear_enforcement();
            (before, self.shared.snapshot(&inner))
        };

        self.cancel_recheck();
        if before != after {
            self.shared.notify(after);
        }
        true
    }

    /// Clear enforcement. Returns whether it was actually active.
    pub fn override_enforcement(&mut self) -> bool {
        let now = self.shared.clock.now_ms();
        let (was_active, change) = {
            let mut inner = self.shared.lock();
            let was_active = inner.state.is_enforced(now);
            inner.state.clear_enforcement();
            (was_active, self.shared.snapshot(&inner))
        };

        self.cancel_recheck();
        if was_active {
            tracing::info!("Live enforcement for {} overridden", self.shared.family);
            self.shared.notify(change);
        }
        was_active
    }

    /// Cancel background work. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.cancel_recheck();
    }

    fn ensure_recheck(&mut self) {
        if self.recheck_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.policy.recheck_interval;
        self.recheck_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !shared.recheck().await {
                    break;
                }
            }
        }));
    }

    fn cancel_recheck(&mut self) {
        if let Some(task) = self.recheck_task.take() {
            task.abort();
        }
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        self.cancel_recheck();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::clock::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const T0: i64 = 1_767_225_600_000;
    const MINUTE: i64 = 60_000;

    #[derive(Default)]
    pub(crate) struct FakeProbe {
        pub sufficient: AtomicBool,
        pub fail: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl FakeProbe {
        pub fn new(sufficient: bool) -> Arc<Self> {
            let probe = Self::default();
            probe.sufficient.store(sufficient, Ordering::SeqCst);
            Arc::new(probe)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistoryProbe for FakeProbe {
        async fn has_sufficient_history(&self, _family: &str) -> anyhow::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            Ok(self.sufficient.load(Ordering::SeqCst))
        }
    }

    async fn controller(probe: &Arc<FakeProbe>, clock: &Arc<ManualClock>) -> ModeController {
        ModeController::start(
            "power",
            probe.clone() as Arc<dyn HistoryProbe>,
            clock.clone() as Arc<dyn Clock>,
            ModePolicy::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_sufficient_history_starts_in_today() {
        let probe = FakeProbe::new(true);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;

        assert_eq!(controller.mode(), Mode::Today);
        assert!(!controller.is_enforced());

        controller.enter_live();
        assert_eq!(controller.state().enforced_until, None);
        assert!(controller.request_switch(Mode::Range));
    }

    #[tokio::test]
    async fn test_insufficient_history_enforces_live() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;

        let state = controller.state();
        assert_eq!(state.mode, Mode::Live);
        assert_eq!(state.enforcement_started_at, Some(T0));
        assert_eq!(state.enforced_until, Some(T0 + 60 * MINUTE));

        assert!(!controller.request_switch(Mode::Today));
        assert_eq!(controller.mode(), Mode::Live);

        assert!(controller.override_enforcement());
        assert!(controller.request_switch(Mode::Today));
        assert_eq!(controller.mode(), Mode::Today);
        assert_eq!(controller.state().enforced_until, None);

        assert!(!controller.override_enforcement());
    }

    #[tokio::test]
    async fn test_probe_failure_fails_safe() {
        let probe = FakeProbe::new(true);
        probe.fail.store(true, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;

        assert_eq!(controller.mode(), Mode::Live);
        assert!(controller.is_enforced());
        assert!(!controller.request_switch(Mode::SelectedDay));
    }

    #[tokio::test]
    async fn test_switch_to_live_always_accepted() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;

        assert!(controller.request_switch(Mode::Live));
        assert!(controller.is_enforced());
    }

    #[tokio::test]
    async fn test_reentering_live_does_not_reenforce() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;

        controller.override_enforcement();
        assert!(controller.request_switch(Mode::Today));
        assert!(controller.request_switch(Mode::Live));

        assert!(!controller.is_enforced());
        assert!(controller.request_switch(Mode::Range));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_recheck_releases_when_history_arrives() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;
        let mut changes = controller.subscribe();

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(probe.calls(), 2);
        assert!(controller.is_enforced());

        probe.sufficient.store(true, Ordering::SeqCst);
        clock.advance(10 * MINUTE);
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(probe.calls(), 3);
        assert!(!controller.is_enforced());
        assert_eq!(controller.mode(), Mode::Live);
        assert_eq!(
            changes.try_recv().unwrap(),
            ModeChange {
                mode: Mode::Live,
                enforced: false
            }
        );
        assert!(controller.request_switch(Mode::Today));

        // task has finished; no further polling
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforcement_clears_after_hour_with_history() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;
        assert!(!controller.request_switch(Mode::Today));

        probe.sufficient.store(true, Ordering::SeqCst);
        clock.advance(60 * MINUTE);
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert!(controller.state().enforced_until.is_none());
        assert!(controller.request_switch(Mode::Today));
    }

    #[tokio::test]
    async fn test_manual_recheck_keeps_enforcement_while_insufficient() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let controller = controller(&probe, &clock).await;

        assert!(controller.shared.recheck().await);
        assert!(controller.is_enforced());

        probe.fail.store(true, Ordering::SeqCst);
        assert!(controller.shared.recheck().await);
        assert!(controller.is_enforced());
    }

    struct StalledStore;

    #[async_trait]
    impl HistoryProbe for StalledStore {
        async fn has_sufficient_history(&self, _family: &str) -> anyhow::Result<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_history_check_times_out_into_enforced_live() {
        let clock = Arc::new(ManualClock::new(T0));
        let started = Instant::now();
        let mut controller = ModeController::start(
            "power",
            Arc::new(StalledStore),
            clock as Arc<dyn Clock>,
            ModePolicy::default(),
        )
        .await;

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
        assert_eq!(controller.mode(), Mode::Live);
        assert!(controller.is_enforced());

        // background re-checks time out the same way and keep enforcement
        tokio::time::sleep(Duration::from_secs(301 + 5)).await;
        assert!(controller.is_enforced());
        assert!(!controller.request_switch(Mode::Today));
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_cancels_recheck() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;

        controller.override_enforcement();
        tokio::time::sleep(Duration::from_secs(1_200)).await;
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_recheck() {
        let probe = FakeProbe::new(false);
        let clock = Arc::new(ManualClock::new(T0));
        let controller = controller(&probe, &clock).await;

        drop(controller);
        tokio::time::sleep(Duration::from_secs(1_200)).await;
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_notifications_on_switch() {
        let probe = FakeProbe::new(true);
        let clock = Arc::new(ManualClock::new(T0));
        let mut controller = controller(&probe, &clock).await;
        let mut changes = controller.subscribe();

        assert!(controller.request_switch(Mode::Range));
        assert!(controller.request_switch(Mode::Range));
        controller.enter_live();

        assert_eq!(changes.try_recv().unwrap().mode, Mode::Range);
        assert_eq!(
            changes.try_recv().unwrap(),
            ModeChange {
                mode: Mode::Live,
                enforced: false
            }
        );
        assert!(changes.try_recv().is_err());
    }
}
