//! Stock detail polling
//!
//! The backend answers `GET /stock/{ticker}` straight away, but the AI
//! summary is produced in the background and reads [`SUMMARY_PENDING`] until
//! it is done. [`DetailPoller`] fetches the detail, keeps re-fetching on a
//! fixed delay while the summary is pending, and publishes every state change
//! on a `watch` channel.
//!
//! ```text
//! Idle -> Loading -> ReadyPending -> ... -> Ready
//!                 \              \------> Error
//!                  \-> Ready | Error
//! ```
//!
//! Every ticker change starts a new generation. Timers and in-flight fetches
//! of the previous generation are cancelled first, and any result that still
//! arrives for an old generation is discarded.
//!
//! [`SUMMARY_PENDING`]: tickerwatch_core::SUMMARY_PENDING

use crate::api::Backend;
use crate::error::Result;
use crate::scheduler::{CancelToken, schedule};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tickerwatch_core::StockDetail;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the detail screen is in its fetch cycle
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailPhase {
    #[default]
    Idle,
    Loading,
    /// Stats are available but the summary is still being generated
    ReadyPending(StockDetail),
    Ready(StockDetail),
    /// The last fetch failed; `last` keeps the snapshot shown before it
    Error {
        message: String,
        last: Option<StockDetail>,
    },
}

impl DetailPhase {
    /// Ready and Error end the polling cycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Error { .. })
    }

    /// The most recent snapshot, if one has been fetched
    pub fn detail(&self) -> Option<&StockDetail> {
        match self {
            Self::ReadyPending(detail) | Self::Ready(detail) => Some(detail),
            Self::Error { last, .. } => last.as_ref(),
            Self::Idle | Self::Loading => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// The phase that follows a fetch completing with `outcome`
    pub fn after_fetch(&self, outcome: Result<StockDetail>) -> Self {
        match outcome {
            Ok(detail) if detail.is_summary_pending() => Self::ReadyPending(detail),
            Ok(detail) => Self::Ready(detail),
            Err(e) => Self::Error {
                message: e.to_string(),
                last: self.detail().cloned(),
            },
        }
    }
}

/// Snapshot published to subscribers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailState {
    pub ticker: Option<String>,
    /// Bumped on every ticker change
    pub generation: u64,
    pub phase: DetailPhase,
}

#[derive(Default)]
struct Tasks {
    initial: Option<CancelToken>,
    timer: Option<CancelToken>,
    /// Set by `stop`; cleared by the next `set_ticker`
    stopped: bool,
}

impl Tasks {
    /// Cancel everything and refuse results until the next ticker change
    fn halt(&mut self) -> bool {
        self.stopped = true;
        self.cancel_all()
    }

    /// Cancel everything; true if anything was still running
    fn cancel_all(&mut self) -> bool {
        let mut was_active = false;
        for token in [self.initial.take(), self.timer.take()].into_iter().flatten() {
            was_active |= token.is_active();
            token.cancel();
        }
        was_active
    }
}

struct Shared {
    backend: Arc<dyn Backend>,
    state: watch::Sender<DetailState>,
    // Lock order: tasks, then state
    tasks: Mutex<Tasks>,
    interval: Duration,
}

impl Shared {
    fn lock_tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a fetch result for `generation`; true while polling should go on
    fn apply(self: &Arc<Self>, ticker: &str, generation: u64, outcome: Result<StockDetail>) -> bool {
        let mut tasks = self.lock_tasks();

        // A fetch that was already running when `stop` took the lock
        if tasks.stopped {
            debug!("Discarding detail for {} after stop", ticker);
            return false;
        }

        let mut pending = false;
        let current = self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.phase = state.phase.after_fetch(outcome);
            pending = matches!(state.phase, DetailPhase::ReadyPending(_));
            true
        });

        if !current {
            debug!("Discarding stale detail for {}", ticker);
            return false;
        }

        if pending {
            if tasks.timer.is_none() {
                debug!(
                    "Summary for {} is generating, re-checking every {:?}",
                    ticker, self.interval
                );
                tasks.timer = Some(self.arm(ticker.to_string(), generation));
            }
            return true;
        }

        if let Some(timer) = tasks.timer.take() {
            timer.cancel();
        }
        match &self.state.borrow().phase {
            DetailPhase::Error { message, .. } => {
                warn!("Stopped loading {}: {}", ticker, message);
            }
            _ => info!("Stock detail for {} is ready", ticker),
        }
        false
    }

    fn arm(self: &Arc<Self>, ticker: String, generation: u64) -> CancelToken {
        let shared = Arc::clone(self);
        schedule(self.interval, move || {
            let shared = Arc::clone(&shared);
            let ticker = ticker.clone();
            async move {
                let outcome = shared.backend.stock_detail(&ticker).await;
                if shared.apply(&ticker, generation, outcome) {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }
        })
    }
}

/// Polling coordinator for the stock detail screen
///
/// Must be used from within a tokio runtime. Dropping the poller stops it.
pub struct DetailPoller {
    shared: Arc<Shared>,
}

impl DetailPoller {
    pub fn new(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (state, _) = watch::channel(DetailState::default());
        Self {
            shared: Arc::new(Shared {
                backend,
                state,
                tasks: Mutex::new(Tasks::default()),
                interval,
            }),
        }
    }

    /// Show `ticker`, abandoning whatever was loading or polling before
    pub fn set_ticker(&self, ticker: impl Into<String>) {
        let ticker = ticker.into();
        let mut tasks = self.shared.lock_tasks();

        if tasks.cancel_all() {
            debug!("Cancelled pending fetches before switching to {}", ticker);
        }
        tasks.stopped = false;

        let mut generation = 0;
        self.shared.state.send_modify(|state| {
            state.generation += 1;
            state.ticker = Some(ticker.clone());
            state.phase = DetailPhase::Idle;
            generation = state.generation;
        });
        self.shared
            .state
            .send_modify(|state| state.phase = DetailPhase::Loading);

        info!("Loading stock detail for {}", ticker);
        let shared = Arc::clone(&self.shared);
        tasks.initial = Some(CancelToken::spawn(async move {
            let outcome = shared.backend.stock_detail(&ticker).await;
            shared.apply(&ticker, generation, outcome);
        }));
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.shared.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> DetailState {
        self.shared.state.borrow().clone()
    }

    /// Resolves once the current ticker reaches Ready or Error
    pub async fn wait_until_settled(&self) -> DetailState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| state.phase.is_terminal()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// True while a re-check is scheduled
    pub fn has_active_timer(&self) -> bool {
        self.shared
            .lock_tasks()
            .timer
            .as_ref()
            .is_some_and(CancelToken::is_active)
    }

    /// Cancel the timer and any in-flight fetch; safe to call repeatedly
    ///
    /// Results that still arrive are dropped until the next [`set_ticker`](Self::set_ticker).
    pub fn stop(&self) {
        if self.shared.lock_tasks().halt() {
            let ticker = self.shared.state.borrow().ticker.clone();
            info!(
                "Stopped polling {}",
                ticker.as_deref().unwrap_or("(no ticker)")
            );
        }
    }
}

impl Drop for DetailPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::testing::{DetailReply, FakeBackend, detail, pending};

    const INTERVAL: Duration = Duration::from_millis(5000);

    fn poller_for(backend: &Arc<FakeBackend>) -> DetailPoller {
        DetailPoller::new(Arc::clone(backend) as Arc<dyn Backend>, INTERVAL)
    }

    async fn wait_for_pending(poller: &DetailPoller) {
        let mut rx = poller.subscribe();
        rx.wait_for(|state| matches!(state.phase, DetailPhase::ReadyPending(_)))
            .await
            .unwrap();
    }

    #[test]
    fn test_after_fetch_transitions() {
        let phase = DetailPhase::Loading.after_fetch(Ok(pending(10.0)));
        assert!(matches!(phase, DetailPhase::ReadyPending(_)));
        assert!(!phase.is_terminal());

        let ready = phase.after_fetch(Ok(detail(11.0, "Solid quarter.")));
        assert_eq!(ready, DetailPhase::Ready(detail(11.0, "Solid quarter.")));
        assert!(ready.is_terminal());
    }

    #[test]
    fn test_error_keeps_last_snapshot() {
        let phase = DetailPhase::ReadyPending(pending(10.0)).after_fetch(Err(
            ClientError::Network("connection reset".to_string()),
        ));

        assert_eq!(phase.error(), Some("Network error: connection reset"));
        assert_eq!(phase.detail(), Some(&pending(10.0)));

        let phase = DetailPhase::Loading.after_fetch(Err(ClientError::NotAuthenticated));
        assert_eq!(phase.error(), Some("User not authenticated"));
        assert!(phase.detail().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentinel_then_final_summary() {
        let backend = Arc::new(FakeBackend::new().script(
            "AAPL",
            vec![
                DetailReply::Detail(pending(189.5)),
                DetailReply::Detail(detail(190.0, "Services revenue hit a record.")),
            ],
        ));
        let poller = poller_for(&backend);

        poller.set_ticker("AAPL");
        wait_for_pending(&poller).await;
        assert!(poller.has_active_timer());
        assert_eq!(backend.detail_call_count("AAPL"), 1);

        let settled = poller.wait_until_settled().await;
        assert_eq!(settled.ticker.as_deref(), Some("AAPL"));
        assert_eq!(
            settled.phase,
            DetailPhase::Ready(detail(190.0, "Services revenue hit a record."))
        );
        assert!(!poller.has_active_timer());

        let calls = backend.detail_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1 - calls[0].1, INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_while_pending() {
        let backend = Arc::new(FakeBackend::new().script(
            "NVDA",
            vec![
                DetailReply::Detail(pending(100.0)),
                DetailReply::Detail(pending(101.0)),
                DetailReply::Detail(detail(102.0, "Data center demand.")),
            ],
        ));
        let poller = poller_for(&backend);

        poller.set_ticker("NVDA");
        wait_for_pending(&poller).await;
        tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;

        // Second snapshot replaces the first without going back to Loading
        assert_eq!(poller.state().phase, DetailPhase::ReadyPending(pending(101.0)));
        assert_eq!(backend.detail_call_count("NVDA"), 2);

        let settled = poller.wait_until_settled().await;
        assert_eq!(settled.phase.detail().map(|d| d.price), Some(102.0));
        assert_eq!(backend.detail_call_count("NVDA"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_measured_from_fetch_completion() {
        let backend = Arc::new(
            FakeBackend::new()
                .script("AMD", vec![DetailReply::Detail(pending(150.0))])
                .delay("AMD", Duration::from_secs(1)),
        );
        let poller = poller_for(&backend);

        poller.set_ticker("AMD");
        tokio::time::sleep(Duration::from_secs(13)).await;

        let calls = backend.detail_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(6));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_secs(6));
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_change_cancels_timer() {
        let backend = Arc::new(
            FakeBackend::new()
                .script("AAPL", vec![DetailReply::Detail(pending(189.5))])
                .script(
                    "MSFT",
                    vec![DetailReply::Detail(detail(420.0, "Azure grew 31%."))],
                ),
        );
        let poller = poller_for(&backend);

        poller.set_ticker("AAPL");
        wait_for_pending(&poller).await;
        assert!(poller.has_active_timer());

        poller.set_ticker("MSFT");
        assert!(!poller.has_active_timer());

        let settled = poller.wait_until_settled().await;
        assert_eq!(settled.ticker.as_deref(), Some("MSFT"));
        assert_eq!(settled.generation, 2);

        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(backend.detail_call_count("AAPL"), 1);
        assert_eq!(poller.state(), settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_for_old_ticker_never_lands() {
        let backend = Arc::new(
            FakeBackend::new()
                .script(
                    "AAPL",
                    vec![DetailReply::Detail(detail(189.5, "Old ticker summary."))],
                )
                .delay("AAPL", Duration::from_secs(3))
                .script("MSFT", vec![DetailReply::Detail(pending(420.0))]),
        );
        let poller = poller_for(&backend);

        poller.set_ticker("AAPL");
        tokio::task::yield_now().await;
        poller.set_ticker("MSFT");

        tokio::time::sleep(Duration::from_secs(4)).await;

        let state = poller.state();
        assert_eq!(state.ticker.as_deref(), Some("MSFT"));
        assert_eq!(state.phase, DetailPhase::ReadyPending(pending(420.0)));
        poller.stop();
    }

    #[tokio::test]
    async fn test_stale_generation_is_discarded() {
        let backend = Arc::new(
            FakeBackend::new().script("MSFT", vec![DetailReply::Detail(pending(420.0))]),
        );
        let poller = poller_for(&backend);

        poller.set_ticker("MSFT");
        let before = poller.state();
        let keep_polling = poller.shared.apply(
            "AAPL",
            before.generation - 1,
            Ok(detail(189.5, "Old ticker summary.")),
        );

        assert!(!keep_polling);
        assert_eq!(poller.state().ticker.as_deref(), Some("MSFT"));
        assert_ne!(
            poller.state().phase,
            DetailPhase::Ready(detail(189.5, "Old ticker summary."))
        );
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let backend =
            Arc::new(FakeBackend::new().script("TSLA", vec![DetailReply::Detail(pending(250.0))]));
        let poller = poller_for(&backend);

        poller.set_ticker("TSLA");
        wait_for_pending(&poller).await;

        poller.stop();
        poller.stop();
        assert!(!poller.has_active_timer());

        tokio::time::sleep(INTERVAL * 6).await;
        assert_eq!(backend.detail_call_count("TSLA"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fetch_finishing_during_stop_does_not_rearm() {
        let interval = Duration::from_millis(50);
        let backend =
            Arc::new(FakeBackend::new().script("TSLA", vec![DetailReply::Detail(pending(250.0))]));
        let poller = DetailPoller::new(Arc::clone(&backend) as Arc<dyn Backend>, interval);

        poller.set_ticker("TSLA");
        {
            // Hold the lock so the first fetch completes and waits inside apply
            let mut tasks = poller.shared.lock_tasks();
            while backend.detail_call_count("TSLA") == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            std::thread::sleep(Duration::from_millis(50));
            tasks.halt();
        }

        tokio::time::sleep(interval * 8).await;
        assert!(!poller.has_active_timer());
        assert_eq!(backend.detail_call_count("TSLA"), 1);
        assert_eq!(poller.state().phase, DetailPhase::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let backend = Arc::new(
            FakeBackend::new().script("AAPL", vec![DetailReply::Detail(detail(190.0, "Fine."))]),
        );
        let poller = poller_for(&backend);

        poller.stop();
        poller.set_ticker("AAPL");
        let settled = poller.wait_until_settled().await;
        assert_eq!(settled.phase, DetailPhase::Ready(detail(190.0, "Fine.")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let backend =
            Arc::new(FakeBackend::new().script("TSLA", vec![DetailReply::Detail(pending(250.0))]));
        let poller = poller_for(&backend);

        poller.set_ticker("TSLA");
        wait_for_pending(&poller).await;
        drop(poller);

        tokio::time::sleep(INTERVAL * 6).await;
        assert_eq!(backend.detail_call_count("TSLA"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_stops_polling() {
        let backend = Arc::new(FakeBackend::new().script(
            "AAPL",
            vec![
                DetailReply::Detail(pending(189.5)),
                DetailReply::Fail(500, "Internal Server Error"),
            ],
        ));
        let poller = poller_for(&backend);

        poller.set_ticker("AAPL");
        let settled = poller.wait_until_settled().await;

        assert_eq!(settled.phase.error(), Some("Internal Server Error"));
        assert_eq!(settled.phase.detail(), Some(&pending(189.5)));
        assert!(!poller.has_active_timer());

        tokio::time::sleep(INTERVAL * 4).await;
        assert_eq!(backend.detail_call_count("AAPL"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_failure_has_no_snapshot() {
        let backend = Arc::new(FakeBackend::new());
        let poller = poller_for(&backend);

        poller.set_ticker("ZZZZ");
        let settled = poller.wait_until_settled().await;

        assert_eq!(
            settled.phase.error(),
            Some(r#"{"detail":"Could not fetch details for ZZZZ"}"#)
        );
        assert!(settled.phase.detail().is_none());
        assert!(!poller.has_active_timer());
    }
}
