//! Poll scheduling and display-state derivation.
//!
//! [`Board`] owns the latest [`ServerSnapshot`] together with the loading and
//! error flags and the copy feedback deadline. All of it lives in a single
//! `watch` channel and is only mutated once a fetch cycle has fanned in.

use lodestone_api::{FetchError, ServerSnapshot, StatusSource};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Period between scheduled fetch cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest period the schedule accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the "copied" feedback stays up after a clipboard write.
pub const COPY_FEEDBACK: Duration = Duration::from_millis(2000);

/// What the board should currently show. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Loading,
    Error,
    Empty,
    Populated,
}

/// Everything the board displays, owned by [`Board`].
#[derive(Debug, Clone)]
pub struct BoardState {
    pub snapshot: ServerSnapshot,
    pub is_loading: bool,
    pub last_error: Option<FetchError>,
    /// Deadline of the copy feedback, if one was started.
    pub copied_until: Option<Instant>,
    /// Set once the first cycle has completed, loading never comes back after.
    settled: bool,
    stopped: bool,
    /// Cycles numbered at or below this are not applied: either one was
    /// already applied or they were started before the last stop.
    applied_cycle: u64,
}

impl BoardState {
    fn new() -> Self {
        Self {
            snapshot: ServerSnapshot::default(),
            is_loading: true,
            last_error: None,
            copied_until: None,
            settled: false,
            stopped: false,
            applied_cycle: 0,
        }
    }

    /// Derive the display state: Loading, then Error, then Empty, then Populated.
    pub fn display_state(&self) -> DisplayState {
        if self.is_loading {
            DisplayState::Loading
        } else if self.last_error.is_some() {
            DisplayState::Error
        } else if self.snapshot.is_empty() {
            DisplayState::Empty
        } else {
            DisplayState::Populated
        }
    }

    pub fn is_copied(&self, now: Instant) -> bool {
        self.copied_until.is_some_and(|until| now < until)
    }

    fn begin_cycle(&mut self) -> bool {
        let loading =
            !self.settled && self.snapshot.is_empty() && self.last_error.is_none();
        let changed = loading != self.is_loading;
        self.is_loading = loading;
        changed
    }

    fn apply(&mut self, cycle: u64, result: lodestone_api::Result<ServerSnapshot>) -> bool {
        if self.stopped {
            debug!(cycle, "discarding fetch result after stop");
            return false;
        }
        if cycle <= self.applied_cycle {
            debug!(
                cycle,
                applied = self.applied_cycle,
                "discarding result of superseded cycle"
            );
            return false;
        }

        self.applied_cycle = cycle;
        self.settled = true;
        self.is_loading = false;
        match result {
            Ok(snapshot) => {
                if self.last_error.take().is_some() {
                    info!("status api reachable again");
                }
                self.snapshot = snapshot;
            }
            Err(e) => {
                if self.last_error.is_none() {
                    warn!(error = %e, "server marked unreachable, keeping last roster");
                }
                self.last_error = Some(e);
            }
        }
        true
    }
}

/// Cancellation handle for the periodic schedule. Dropping it stops the timer.
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Inner<S> {
    source: S,
    state: watch::Sender<BoardState>,
    poller: Mutex<Option<PollHandle>>,
    cycles: AtomicU64,
    interval: Duration,
}

/// Owns the poll schedule and the displayed state.
pub struct Board<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Board<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StatusSource> Board<S> {
    pub fn new(source: S) -> Self {
        Self::with_interval(source, DEFAULT_POLL_INTERVAL)
    }

    /// Board polling every `interval`, raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn with_interval(source: S, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(requested = ?interval, min = ?MIN_POLL_INTERVAL, "poll interval too short, using minimum");
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (state, _) = watch::channel(BoardState::new());
        Self {
            inner: Arc::new(Inner {
                source,
                state,
                poller: Mutex::new(None),
                cycles: AtomicU64::new(0),
                interval,
            }),
        }
    }

    /// Run one cycle now and re-run it every interval until [`Board::stop`].
    ///
    /// Does nothing if the schedule is already running.
    pub fn start(&self) {
        let mut poller = self
            .inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if poller.is_some() {
            debug!("poller already running");
            return;
        }

        self.inner.state.send_if_modified(|state| {
            let was_stopped = state.stopped;
            state.stopped = false;
            was_stopped
        });

        self.spawn_cycle();

        let period = self.inner.interval;
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match Weak::upgrade(&weak) {
                    Some(inner) => Board { inner }.spawn_cycle(),
                    None => break,
                }
            }
        });
        *poller = Some(PollHandle { task });
        info!(interval = ?period, "poller started");
    }

    /// Cancel the schedule. Results of cycles still in flight are ignored,
    /// even if the board is started again before they land.
    pub fn stop(&self) {
        let handle = self
            .inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let started = self.inner.cycles.load(Ordering::Relaxed);
        self.inner.state.send_if_modified(|state| {
            let was_running = !state.stopped;
            state.stopped = true;
            state.applied_cycle = state.applied_cycle.max(started);
            was_running
        });

        if let Some(handle) = handle {
            handle.cancel();
            info!("poller stopped");
        }
    }

    /// Trigger one out-of-band cycle without touching the schedule.
    pub fn retry_now(&self) {
        info!("manual retry requested");
        self.spawn_cycle();
    }

    /// Run one cycle to completion and return the resulting display state.
    pub async fn refresh(&self) -> DisplayState {
        let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.state.send_if_modified(BoardState::begin_cycle);

        debug!(cycle, "fetch cycle started");
        let result = self.inner.source.fetch().await;

        self.inner
            .state
            .send_if_modified(|state| state.apply(cycle, result));
        self.display_state()
    }

    fn spawn_cycle(&self) {
        let board = self.clone();
        tokio::spawn(async move {
            board.refresh().await;
        });
    }
}

impl<S: StatusSource> Board<S> {
    pub fn display_state(&self) -> DisplayState {
        self.inner.state.borrow().display_state()
    }

    /// Copy of the current state.
    pub fn state(&self) -> BoardState {
        self.inner.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.inner.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the copy feedback window.
    pub fn mark_copied(&self) {
        let until = Instant::now() + COPY_FEEDBACK;
        self.inner
            .state
            .send_modify(|state| state.copied_until = Some(until));

        // Clear the deadline once it passes so watchers see the flag drop.
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep_until(until).await;
            if let Some(inner) = weak.upgrade() {
                inner.state.send_if_modified(|state| {
                    if state.copied_until == Some(until) {
                        state.copied_until = None;
                        true
                    } else {
                        false
                    }
                });
            }
        });
    }

    pub fn is_copied(&self) -> bool {
        self.inner.state.borrow().is_copied(Instant::now())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    type Reply = (Duration, lodestone_api::Result<ServerSnapshot>);

    /// Source answering from a script; each reply may be delayed.
    pub(crate) struct Scripted {
        replies: Mutex<VecDeque<Reply>>,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        pub(crate) fn new(replies: Vec<lodestone_api::Result<ServerSnapshot>>) -> Self {
            Self::delayed(replies.into_iter().map(|r| (Duration::ZERO, r)).collect())
        }

        pub(crate) fn delayed(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl StatusSource for Scripted {
        async fn fetch(&self) -> lodestone_api::Result<ServerSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().unwrap().pop_front();
            // Out of script: behave like an empty, healthy server.
            let (delay, result) = next.unwrap_or((Duration::ZERO, Ok(ServerSnapshot::default())));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    pub(crate) fn roster(names: &[&str], count: u32) -> lodestone_api::Result<ServerSnapshot> {
        Ok(ServerSnapshot::reconcile(
            names.iter().map(|n| n.to_string()).collect(),
            count,
        ))
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let board = Board::new(Scripted::new(vec![]));
        assert_eq!(board.display_state(), DisplayState::Loading);
        assert!(board.state().is_loading);
    }

    #[tokio::test]
    async fn test_first_fetch_populated() {
        let board = Board::new(Scripted::new(vec![roster(&["Alice", "Bob"], 2)]));

        assert_eq!(board.refresh().await, DisplayState::Populated);
        let state = board.state();
        assert_eq!(state.snapshot.players, vec!["Alice", "Bob"]);
        assert_eq!(state.snapshot.online_count, 2);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_first_fetch_empty() {
        let board = Board::new(Scripted::new(vec![roster(&[], 0)]));
        assert_eq!(board.refresh().await, DisplayState::Empty);
    }

    #[tokio::test]
    async fn test_failsafe_count_reaches_display() {
        let board = Board::new(Scripted::new(vec![roster(&["Alice", "Bob", "Carol"], 0)]));
        board.refresh().await;
        assert_eq!(board.state().snapshot.online_count, 3);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_shows_error() {
        let board = Board::new(Scripted::new(vec![Err(FetchError::Api)]));

        assert_eq!(board.refresh().await, DisplayState::Error);
        let state = board.state();
        assert!(state.snapshot.is_empty());
        assert_eq!(state.last_error, Some(FetchError::Api));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_roster() {
        let board = Board::new(Scripted::new(vec![
            roster(&["Alice", "Bob"], 2),
            Err(FetchError::Api),
        ]));
        board.refresh().await;

        assert_eq!(board.refresh().await, DisplayState::Error);
        let state = board.state();
        assert_eq!(state.snapshot.players, vec!["Alice", "Bob"]);
        assert_eq!(state.snapshot.online_count, 2);
    }

    #[tokio::test]
    async fn test_success_clears_error() {
        let board = Board::new(Scripted::new(vec![
            Err(FetchError::Api),
            roster(&["Alice"], 1),
        ]));
        board.refresh().await;

        assert_eq!(board.refresh().await, DisplayState::Populated);
        assert_eq!(board.state().last_error, None);
    }

    #[tokio::test]
    async fn test_loading_never_returns() {
        let board = Board::new(Scripted::new(vec![
            Err(FetchError::Api),
            Err(FetchError::Api),
            roster(&[], 0),
        ]));

        for _ in 0..3 {
            board.refresh().await;
            assert!(!board.state().is_loading);
            assert_ne!(board.display_state(), DisplayState::Loading);
        }
    }

    #[test]
    fn test_loading_takes_priority_over_error() {
        let mut state = BoardState::new();
        state.last_error = Some(FetchError::Api);
        state.snapshot = ServerSnapshot::reconcile(vec!["Alice".into()], 1);
        assert!(state.is_loading);
        assert_eq!(state.display_state(), DisplayState::Loading);
    }

    #[test]
    fn test_error_takes_priority_over_roster() {
        let mut state = BoardState::new();
        state.is_loading = false;
        state.snapshot = ServerSnapshot::reconcile(vec!["Alice".into()], 1);
        state.last_error = Some(FetchError::Api);
        assert_eq!(state.display_state(), DisplayState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_every_interval() {
        let source = Scripted::new(vec![]);
        let calls = Arc::clone(&source.calls);
        let board = Board::new(source);

        board.start();
        tokio::time::sleep(Duration::from_secs(25)).await;
        // Immediate cycle plus ticks at 10s and 20s.
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        board.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!board.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_one_schedule() {
        let source = Scripted::new(vec![]);
        let calls = Arc::clone(&source.calls);
        let board = Board::new(source);

        board.start();
        board.start();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        board.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let board = Board::new(Scripted::new(vec![]));
        board.stop();
        board.stop();
        assert!(!board.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_does_not_disturb_schedule() {
        let source = Scripted::new(vec![]);
        let calls = Arc::clone(&source.calls);
        let board = Board::new(source);

        board.start();
        tokio::time::sleep(Duration::from_secs(5)).await;
        board.retry_now();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Next scheduled tick still lands at 10s.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        board.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_after_stop_is_ignored() {
        let board = Board::new(Scripted::delayed(vec![(
            Duration::from_secs(5),
            roster(&["Alice"], 1),
        )]));

        board.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        board.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let state = board.state();
        assert!(state.snapshot.is_empty());
        assert_eq!(board.display_state(), DisplayState::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_from_before_stop_ignored_after_restart() {
        let board = Board::new(Scripted::delayed(vec![
            (Duration::from_secs(5), roster(&["Stale"], 1)),
            (Duration::from_secs(20), roster(&["Fresh"], 1)),
        ]));

        board.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        board.stop();
        board.start();

        // First cycle lands at 5s, the restarted one is still pending.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(board.state().snapshot.is_empty());
        assert_eq!(board.display_state(), DisplayState::Loading);
        board.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let source = Scripted::new(vec![]);
        let calls = Arc::clone(&source.calls);
        let board = Board::with_interval(source, Duration::ZERO);

        board.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        // Immediate cycle plus ticks at 1s, 2s and 3s.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(board.is_running());
        board.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_cycle_is_discarded() {
        let board = Board::new(Scripted::delayed(vec![
            (Duration::from_secs(15), roster(&["Old"], 1)),
            (Duration::from_secs(1), roster(&["New"], 1)),
        ]));

        let (first, second) = tokio::join!(board.refresh(), board.refresh());
        assert_eq!(first, DisplayState::Populated);
        assert_eq!(second, DisplayState::Populated);
        assert_eq!(board.state().snapshot.players, vec!["New"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_feedback_window() {
        let board = Board::new(Scripted::new(vec![]));
        assert!(!board.is_copied());

        board.mark_copied();
        assert!(board.is_copied());

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(board.is_copied());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!board.is_copied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_feedback_clears_state_for_watchers() {
        let board = Board::new(Scripted::new(vec![]));
        let mut rx = board.subscribe();

        board.mark_copied();
        rx.borrow_and_update();
        tokio::time::sleep(COPY_FEEDBACK).await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().copied_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_copy_extends_feedback() {
        let board = Board::new(Scripted::new(vec![]));

        board.mark_copied();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        board.mark_copied();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(board.is_copied());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!board.is_copied());
    }
}
