use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{progress, LoadingBarConfig};

/// Progress value a fresh load jumps to so the bar is immediately visible.
const INITIAL_PROGRESS: f64 = 2.0;
/// Period of the synthetic progress advancement.
const PROGRESS_TICK: Duration = Duration::from_millis(250);
/// How long a finished bar lingers at 100 before resetting to 0.
const SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Loading-state machine driving a client-side progress bar.
///
/// Tracks the number of in-flight requests and synthesizes a 0–100 progress
/// value from a decelerating random curve while anything is loading. The
/// handle is cheap to clone; all clones share one set of counters, so a
/// single bar can be handed to every collaborator that issues requests.
///
/// Construct one instance per application and pass it explicitly — there is
/// no global state.
///
/// ```
/// use http_loading_bar::{LoadingBar, LoadingBarConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bar = LoadingBar::new(LoadingBarConfig::default());
/// assert!(!bar.is_loading());
///
/// bar.start_loading();
/// assert!(bar.is_loading());
/// assert!(bar.current_progress() >= 2.0);
///
/// bar.complete_loading();
/// assert_eq!(bar.current_progress(), 100.0);
/// # }
/// ```
#[derive(Clone)]
pub struct LoadingBar {
    inner: Arc<BarInner>,
}

struct BarInner {
    config: LoadingBarConfig,
    state: Mutex<BarState>,
}

struct BarState {
    in_flight: i64,
    progress: f64,
    retry_count: usize,
    ticker: Option<JoinHandle<()>>,
    settle: Option<JoinHandle<()>>,
}

impl BarState {
    fn is_loading(&self) -> bool {
        self.in_flight > 0 || self.progress > 0.0
    }
}

impl BarInner {
    fn lock(&self) -> MutexGuard<'_, BarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BarInner {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        if let Some(settle) = state.settle.take() {
            settle.abort();
        }
    }
}

impl fmt::Debug for LoadingBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("LoadingBar")
            .field("config", &self.inner.config)
            .field("in_flight", &state.in_flight)
            .field("progress", &state.progress)
            .field("retry_count", &state.retry_count)
            .finish()
    }
}

impl Default for LoadingBar {
    fn default() -> Self {
        Self::new(LoadingBarConfig::default())
    }
}

impl LoadingBar {
    /// Creates a bar with the given configuration.
    pub fn new(config: LoadingBarConfig) -> Self {
        Self {
            inner: Arc::new(BarInner {
                config,
                state: Mutex::new(BarState {
                    in_flight: 0,
                    progress: 0.0,
                    retry_count: 0,
                    ticker: None,
                    settle: None,
                }),
            }),
        }
    }

    /// Registers one more in-flight request.
    ///
    /// A fresh load (bar fully idle) clears stale retry bookkeeping and
    /// raises progress to the initial floor. The floor is never applied
    /// backward: concurrent loads that already advanced past it keep their
    /// progress. A pending settle reset is cancelled so progress never dips
    /// mid-load.
    pub fn start_loading(&self) {
        let mut state = self.inner.lock();
        if state.in_flight == 0 && state.progress <= 0.0 {
            state.retry_count = 0;
        }
        state.in_flight += 1;
        if state.retry_count == 0 && state.progress < INITIAL_PROGRESS {
            state.progress = INITIAL_PROGRESS;
        }
        if let Some(settle) = state.settle.take() {
            settle.abort();
        }
        self.ensure_ticker(&mut state);
    }

    /// Registers completion of one in-flight request.
    ///
    /// When the last request finishes, progress snaps to 100 so the bar
    /// visibly completes, then resets to 0 after a 250 ms settle delay.
    /// During that window [`is_loading`](Self::is_loading) stays true.
    pub fn complete_loading(&self) {
        let mut state = self.inner.lock();
        state.in_flight -= 1;
        if state.in_flight > 0 {
            return;
        }
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        if let Some(settle) = state.settle.take() {
            settle.abort();
        }
        state.progress = 100.0;

        let Ok(handle) = Handle::try_current() else {
            // No runtime to schedule the settle on; reset right away so the
            // bar does not stay lit forever.
            state.progress = 0.0;
            return;
        };
        let inner = Arc::downgrade(&self.inner);
        state.settle = Some(handle.spawn(async move {
            time::sleep(SETTLE_DELAY).await;
            if let Some(inner) = inner.upgrade() {
                inner.lock().progress = 0.0;
            }
        }));
    }

    /// Records one retry attempt as an extra in-flight unit.
    ///
    /// Keeps the bar visible across a retry. Once the retry budget
    /// (`max_retry_count`) is exhausted the accumulated retry units are
    /// subtracted back out, so a request that fails through its whole budget
    /// does not leave the counter inflated. With a budget of 0 every call
    /// nets zero.
    pub fn increment_retry_count(&self) {
        let mut state = self.inner.lock();
        state.retry_count += 1;
        state.in_flight += 1;
        if state.retry_count >= self.inner.config.max_retry_count {
            state.in_flight -= state.retry_count as i64;
            state.retry_count = 0;
        }
        self.ensure_ticker(&mut state);
    }

    /// True while any request is in flight or the bar is still visible.
    pub fn is_loading(&self) -> bool {
        self.inner.lock().is_loading()
    }

    /// Current synthetic progress in `[0, 100]`.
    pub fn current_progress(&self) -> f64 {
        self.inner.lock().progress
    }

    /// Configured interceptor timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.inner.config.timeout_ms
    }

    /// Configured timeout as a duration, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        let timeout_ms = self.inner.config.timeout_ms;
        (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms))
    }

    /// Spawns the progress ticker if loading is active and none is running.
    ///
    /// The task holds only a weak reference so dropping the last handle
    /// tears it down; it also exits on its own once loading stops.
    fn ensure_ticker(&self, state: &mut BarState) {
        let running = state.ticker.as_ref().is_some_and(|task| !task.is_finished());
        if running || !state.is_loading() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let inner = Arc::downgrade(&self.inner);
        state.ticker = Some(handle.spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + PROGRESS_TICK, PROGRESS_TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let mut state = inner.lock();
                if !state.is_loading() {
                    break;
                }
                if state.in_flight > 0 && state.progress < 100.0 {
                    let step = progress::next_increment(state.progress, &mut rand::thread_rng());
                    state.progress = (state.progress + step).min(100.0);
                }
            }
        }));
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> i64 {
        self.inner.lock().in_flight
    }

    #[cfg(test)]
    pub(crate) fn retry_count(&self) -> usize {
        self.inner.lock().retry_count
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::LoadingBar;
    use crate::LoadingBarConfig;

    fn bar_with(max_retry_count: usize) -> LoadingBar {
        LoadingBar::new(LoadingBarConfig {
            max_retry_count,
            timeout_ms: 30_000,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_bar_is_idle() {
        let bar = LoadingBar::default();
        assert!(!bar.is_loading());
        assert_eq!(bar.current_progress(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_raises_progress_to_floor() {
        let bar = LoadingBar::default();
        bar.start_loading();
        assert!(bar.is_loading());
        assert_eq!(bar.current_progress(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_loads_keep_bar_active() {
        let bar = LoadingBar::default();
        bar.start_loading();
        bar.start_loading();
        bar.complete_loading();
        assert!(bar.is_loading());
        assert_eq!(bar.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_progress_monotonically() {
        let bar = LoadingBar::default();
        bar.start_loading();
        let mut last = bar.current_progress();
        for _ in 0..8 {
            sleep(Duration::from_millis(250)).await;
            let now = bar.current_progress();
            assert!(now >= last, "progress went backward: {last} -> {now}");
            assert!(now <= 100.0);
            last = now;
        }
        assert!(last > 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn long_load_converges_to_exactly_one_hundred() {
        let bar = LoadingBar::default();
        bar.start_loading();
        sleep(Duration::from_secs(200)).await;
        assert_eq!(bar.current_progress(), 100.0);
        assert!(bar.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_snaps_then_settles() {
        let bar = LoadingBar::default();
        bar.start_loading();
        bar.complete_loading();
        assert_eq!(bar.current_progress(), 100.0);
        assert!(bar.is_loading());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(bar.current_progress(), 100.0, "settled before 250 ms");

        sleep(Duration::from_millis(100)).await;
        assert_eq!(bar.current_progress(), 0.0);
        assert!(!bar.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn start_during_settle_window_cancels_reset() {
        let bar = LoadingBar::default();
        bar.start_loading();
        bar.complete_loading();
        sleep(Duration::from_millis(100)).await;

        bar.start_loading();
        sleep(Duration::from_millis(500)).await;
        assert!(bar.is_loading());
        assert_eq!(bar.current_progress(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_never_moves_progress_backward() {
        let bar = LoadingBar::default();
        bar.start_loading();
        sleep(Duration::from_millis(600)).await;
        let advanced = bar.current_progress();
        assert!(advanced > 2.0);

        bar.start_loading();
        assert!(bar.current_progress() >= advanced);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_with_zero_budget_nets_nothing() {
        let bar = bar_with(0);
        for _ in 0..5 {
            bar.increment_retry_count();
        }
        assert_eq!(bar.in_flight(), 0);
        assert_eq!(bar.retry_count(), 0);
        assert!(!bar.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_collapses_on_final_attempt() {
        let bar = bar_with(3);
        bar.start_loading();
        assert_eq!(bar.in_flight(), 1);

        bar.increment_retry_count();
        assert_eq!(bar.in_flight(), 2);
        bar.increment_retry_count();
        assert_eq!(bar.in_flight(), 3);

        // Third call hits the budget: +1 then -3.
        bar.increment_retry_count();
        assert_eq!(bar.in_flight(), 1);
        assert_eq!(bar.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_reentry_skips_the_progress_floor() {
        let bar = bar_with(5);
        bar.increment_retry_count();
        assert_eq!(bar.retry_count(), 1);

        bar.start_loading();
        assert_eq!(bar.current_progress(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_start_clears_stale_retry_count() {
        let bar = bar_with(5);
        bar.increment_retry_count();
        bar.complete_loading();
        sleep(Duration::from_millis(300)).await;
        assert!(!bar.is_loading());

        bar.start_loading();
        assert_eq!(bar.retry_count(), 0);
        assert_eq!(bar.current_progress(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_accessors_reflect_config() {
        let bar = LoadingBar::new(LoadingBarConfig {
            max_retry_count: 0,
            timeout_ms: 0,
        });
        assert_eq!(bar.timeout_ms(), 0);
        assert!(bar.timeout().is_none());

        let bar = LoadingBar::default();
        assert_eq!(bar.timeout_ms(), 30_000);
        assert_eq!(bar.timeout(), Some(Duration::from_millis(30_000)));
    }
}
