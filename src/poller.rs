//! Periodic `/get_ui_state` polling.
//!
//! At most one timer exists and at most one poll request is in flight. A
//! tick that finds a request outstanding is skipped, not queued.

use crate::actions::AppEvent;
use crate::client::TaskClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Set while a poll request is outstanding; cleared on drop, so every exit
/// path of the request task releases it.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag.clone()))
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
struct Ticker {
    client: TaskClient,
    in_flight: Arc<AtomicBool>,
    last_thought: watch::Receiver<String>,
    events: UnboundedSender<AppEvent>,
}

impl Ticker {
    fn fire(&self) -> bool {
        let Some(guard) = InFlight::acquire(&self.in_flight) else {
            trace!("poll skipped, request still in flight");
            return false;
        };
        let last_thought = self.last_thought.borrow().clone();
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.get_ui_state(&last_thought).await;
            drop(guard);
            let _ = events.send(AppEvent::Polled(result));
        });
        true
    }
}

pub struct Poller {
    ticker: Ticker,
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(
        client: TaskClient,
        interval: Duration,
        last_thought: watch::Receiver<String>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            ticker: Ticker {
                client,
                in_flight: Arc::new(AtomicBool::new(false)),
                last_thought,
                events,
            },
            interval,
            timer: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.ticker.in_flight.load(Ordering::Acquire)
    }

    /// Start or stop the timer to match the polling condition.
    pub fn sync(&mut self, should_poll: bool) {
        match (should_poll, self.timer.is_some()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }
    }

    /// One poll attempt. Returns whether a request was issued.
    pub fn tick(&self) -> bool {
        self.ticker.fire()
    }

    fn start(&mut self) {
        debug!("polling started every {:?}", self.interval);
        let ticker = self.ticker.clone();
        let period = self.interval;
        self.timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                ticker.fire();
            }
        }));
    }

    /// Stop the timer. A request already sent still completes and reports.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("polling stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_backend::MockBackend;
    use tokio::sync::mpsc;

    fn poller(
        mock: &MockBackend,
        interval: Duration,
    ) -> (Poller, watch::Sender<String>, mpsc::UnboundedReceiver<AppEvent>) {
        let client = TaskClient::new(&mock.base_url).unwrap();
        let (ts_tx, ts_rx) = watch::channel(String::new());
        let (tx, rx) = mpsc::unbounded_channel();
        (Poller::new(client, interval, ts_rx, tx), ts_tx, rx)
    }

    #[tokio::test]
    async fn overlapping_ticks_issue_one_request() {
        let mock = MockBackend::start().await;
        mock.set_poll_delay(Duration::from_millis(200));
        let (poller, _ts, mut rx) = poller(&mock, Duration::from_secs(60));

        assert!(poller.tick());
        assert!(!poller.tick(), "second tick must be skipped");
        assert!(poller.is_in_flight());

        let event = rx.recv().await;
        assert!(matches!(event, Some(AppEvent::Polled(Ok(_)))));
        assert!(!poller.is_in_flight());
        assert_eq!(mock.count("/get_ui_state"), 1);
        assert_eq!(mock.max_in_flight(), 1);

        assert!(poller.tick(), "flag is released after the response");
    }

    #[tokio::test]
    async fn failed_request_releases_flag() {
        let mock = MockBackend::start().await;
        mock.respond("/get_ui_state", 500, serde_json::json!({}));
        let (poller, _ts, mut rx) = poller(&mock, Duration::from_secs(60));

        assert!(poller.tick());
        assert!(matches!(rx.recv().await, Some(AppEvent::Polled(Err(_)))));
        assert!(!poller.is_in_flight());
    }

    #[tokio::test]
    async fn slow_backend_never_sees_concurrent_polls() {
        let mock = MockBackend::start().await;
        mock.set_poll_delay(Duration::from_millis(120));
        let (mut poller, _ts, mut rx) = poller(&mock, Duration::from_millis(20));

        poller.sync(true);
        for _ in 0..3 {
            rx.recv().await;
        }
        poller.sync(false);

        assert_eq!(mock.max_in_flight(), 1);
        assert!(mock.count("/get_ui_state") >= 3);
    }

    #[tokio::test]
    async fn sync_is_idempotent_and_stops() {
        let mock = MockBackend::start().await;
        let (mut poller, _ts, mut rx) = poller(&mock, Duration::from_millis(30));

        poller.sync(true);
        poller.sync(true);
        assert!(poller.is_polling());
        rx.recv().await;

        poller.sync(false);
        assert!(!poller.is_polling());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = mock.count("/get_ui_state");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(mock.count("/get_ui_state"), settled);
    }

    #[tokio::test]
    async fn request_carries_latest_thought_timestamp() {
        let mock = MockBackend::start().await;
        let (poller, ts, mut rx) = poller(&mock, Duration::from_secs(60));

        ts.send_replace("42".to_string());
        poller.tick();
        rx.recv().await;
        assert_eq!(mock.calls()[0].query.as_deref(), Some("last_thought=42"));
    }

    #[tokio::test]
    async fn drop_stops_timer() {
        let mock = MockBackend::start().await;
        let (mut poller, _ts, mut rx) = poller(&mock, Duration::from_millis(30));
        poller.sync(true);
        rx.recv().await;
        drop(poller);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = mock.count("/get_ui_state");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(mock.count("/get_ui_state"), settled);
    }
}
