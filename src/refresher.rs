//! Background task keeping the [`VersionStore`] in step with upstream.

use crate::{
    fetcher::{FetchError, ReleaseSource},
    store::VersionStore,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

/// Longest slice of an upstream error body that ends up in the logs.
const BODY_SNIPPET_LEN: usize = 512;

/// A refresher that has not been started yet.
pub struct Refresher {
    interval: Duration,
    store: Arc<VersionStore>,
    source: Arc<dyn ReleaseSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Running,
    Stopped,
}

/// Control handle for a running refresher. Dropping it also stops the loop.
pub struct RefresherHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Refresher {
    pub fn new(
        interval: Duration,
        store: Arc<VersionStore>,
        source: Arc<dyn ReleaseSource>,
    ) -> Self {
        Self {
            interval,
            store,
            source,
        }
    }

    /// Spawns the refresh loop. The first fetch is issued immediately, then one per interval.
    pub fn start(self) -> RefresherHandle {
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));

        RefresherHandle { stop, task }
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Refreshing stable version every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;

                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    refresh_once(&self.store, self.source.as_ref()).await;
                }
            }
        }

        info!("Refresher stopped; task closing.");
    }
}

impl RefresherHandle {
    /// Asks the loop to stop. A fetch already in flight still completes.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn state(&self) -> RefresherState {
        if *self.stop.borrow() || self.task.is_finished() {
            RefresherState::Stopped
        } else {
            RefresherState::Running
        }
    }

    /// Stops the loop and waits for it to wind down.
    pub async fn shutdown(self) {
        self.stop();

        if let Err(err) = self.task.await {
            warn!("Refresher task ended abnormally: {err}");
        }
    }
}

/// Runs a single fetch and stores the result. Failures are logged and leave the store as-is.
///
/// Returns whether the fetch succeeded.
pub async fn refresh_once(store: &VersionStore, source: &dyn ReleaseSource) -> bool {
    match source.fetch_latest().await {
        Ok(tag) => {
            if store.set(tag.clone()) {
                info!(version = %tag, "Stable version updated");
            } else {
                debug!(version = %tag, "Stable version unchanged");
            }

            true
        }

        Err(FetchError::Status { status, body }) => {
            warn!(
                status = status.as_u16(),
                body = body_snippet(&body),
                "HTTP status error retrieving stable version"
            );

            false
        }

        Err(err) => {
            warn!(error = %err, "Failed to retrieve stable version");

            false
        }
    }
}

fn body_snippet(body: &str) -> &str {
    if body.len() <= BODY_SNIPPET_LEN {
        return body;
    }

    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VersionTag;
    use reqwest::StatusCode;
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    /// Collects formatted log lines written while the returned guard is alive.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        (logs, tracing::subscriber::set_default(subscriber))
    }

    enum Outcome {
        Tag(&'static str),
        Unavailable,
        Garbage,
    }

    /// Plays back scripted outcomes, repeating the last one once the script runs out.
    struct ScriptedSource {
        outcomes: Mutex<VecDeque<Outcome>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ReleaseSource for ScriptedSource {
        async fn fetch_latest(&self) -> Result<VersionTag, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let mut outcomes = self.outcomes.lock().unwrap();
            let outcome = if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                match outcomes.front() {
                    Some(Outcome::Tag(tag)) => Outcome::Tag(*tag),
                    Some(Outcome::Unavailable) | None => Outcome::Unavailable,
                    Some(Outcome::Garbage) => Outcome::Garbage,
                }
            };

            match outcome {
                Outcome::Tag(tag) => Ok(VersionTag::new(tag)),
                Outcome::Unavailable => Err(FetchError::Status {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: String::from("try again later"),
                }),
                Outcome::Garbage => Err(FetchError::Malformed(
                    serde_json::from_str::<serde_json::Value>("{not json").unwrap_err(),
                )),
            }
        }
    }

    #[tokio::test]
    async fn failures_keep_the_last_good_value() {
        let store = VersionStore::new();
        let source = ScriptedSource::new([
            Outcome::Tag("v1.4.2"),
            Outcome::Unavailable,
            Outcome::Garbage,
            Outcome::Tag("v1.5.0"),
        ]);

        assert!(refresh_once(&store, &source).await);
        assert_eq!(store.get().as_str(), "v1.4.2");

        assert!(!refresh_once(&store, &source).await);
        assert_eq!(store.get().as_str(), "v1.4.2");

        assert!(!refresh_once(&store, &source).await);
        assert_eq!(store.get().as_str(), "v1.4.2");

        assert!(refresh_once(&store, &source).await);
        assert_eq!(store.get().as_str(), "v1.5.0");
    }

    #[tokio::test]
    async fn status_failure_logs_code_and_body() {
        let (logs, _guard) = capture_logs();
        let store = VersionStore::new();
        store.set(VersionTag::new("v1.4.2"));
        let source = ScriptedSource::new([Outcome::Unavailable]);

        assert!(!refresh_once(&store, &source).await);
        assert_eq!(store.get().as_str(), "v1.4.2");

        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("HTTP status error retrieving stable version"), "{output}");
        assert!(output.contains("status=503"), "{output}");
        assert!(output.contains("try again later"), "{output}");
    }

    #[tokio::test]
    async fn malformed_body_logs_parse_error() {
        let (logs, _guard) = capture_logs();
        let store = VersionStore::new();
        store.set(VersionTag::new("v1.4.2"));
        let source = ScriptedSource::new([Outcome::Garbage]);

        assert!(!refresh_once(&store, &source).await);
        assert_eq!(store.get().as_str(), "v1.4.2");

        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("Failed to retrieve stable version"), "{output}");
        assert!(output.contains("error=malformed release metadata"), "{output}");
    }

    #[tokio::test]
    async fn failure_before_any_success_leaves_store_empty() {
        let store = VersionStore::new();
        let source = ScriptedSource::new([Outcome::Unavailable]);

        assert!(!refresh_once(&store, &source).await);
        assert!(!store.is_initialized());
        assert_eq!(store.get(), VersionTag::default());
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_on_every_tick() {
        let store = Arc::new(VersionStore::new());
        let source = Arc::new(ScriptedSource::new([Outcome::Tag("v2.0.0")]));
        let interval = Duration::from_secs(300);

        let handle = Refresher::new(interval, Arc::clone(&store), source.clone()).start();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(store.get().as_str(), "v2.0.0");

        tokio::time::sleep(interval).await;
        assert_eq!(source.calls(), 2);

        tokio::time::sleep(interval * 2).await;
        assert_eq!(source.calls(), 4);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_ticking_through_consecutive_failures() {
        let store = Arc::new(VersionStore::new());
        store.set(VersionTag::new("v0.9.0"));
        let source = Arc::new(ScriptedSource::new([Outcome::Unavailable]));
        let interval = Duration::from_secs(60);

        let handle = Refresher::new(interval, Arc::clone(&store), source.clone()).start();
        tokio::time::sleep(interval * 5 + Duration::from_millis(1)).await;

        assert_eq!(source.calls(), 6);
        assert_eq!(store.get().as_str(), "v0.9.0");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_fetches_after_stop() {
        let store = Arc::new(VersionStore::new());
        let source = Arc::new(ScriptedSource::new([Outcome::Tag("v2.0.0")]));
        let interval = Duration::from_secs(300);

        let handle = Refresher::new(interval, store, source.clone()).start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(handle.state(), RefresherState::Running);

        handle.stop();
        assert_eq!(handle.state(), RefresherState::Stopped);
        let calls_at_stop = source.calls();

        tokio::time::sleep(interval * 3).await;
        assert_eq!(source.calls(), calls_at_stop);

        handle.shutdown().await;
        assert_eq!(source.calls(), calls_at_stop);
    }

    #[test]
    fn body_snippet_respects_char_boundaries() {
        let body = "é".repeat(BODY_SNIPPET_LEN);
        let snippet = body_snippet(&body);

        assert!(snippet.len() <= BODY_SNIPPET_LEN);
        assert!(body.starts_with(snippet));
        assert_eq!(body_snippet("short"), "short");
    }
}
