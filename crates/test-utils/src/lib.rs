pub mod builders;
pub mod fakes;

use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::{EnvFilter, fmt};

use assetpipe::fs::FileSystem;
use assetpipe::fs::mock::MockFileSystem;
use assetpipe::observer::{Observer, ProgressEvent};
use assetpipe::task::TaskContext;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Observer that keeps every event it sees.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count<F>(&self, pred: F) -> usize
    where
        F: Fn(&ProgressEvent) -> bool,
    {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    /// Number of `TaskStarted` events for `task`.
    pub fn started(&self, task: &str) -> usize {
        self.count(|e| matches!(e, ProgressEvent::TaskStarted { task: t, .. } if t == task))
    }

    pub fn failed(&self, task: &str) -> usize {
        self.count(|e| matches!(e, ProgressEvent::TaskFailed { task: t, .. } if t == task))
    }

    pub fn skipped(&self, task: &str) -> usize {
        self.count(|e| matches!(e, ProgressEvent::TaskSkipped { task: t } if t == task))
    }

    pub fn files_written(&self, task: &str) -> usize {
        self.count(|e| matches!(e, ProgressEvent::FileWritten { task: t, .. } if t == task))
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Task context over a mock filesystem rooted at `"."`.
///
/// Files added to the mock must use the `./` prefix.
pub fn mock_context(fs: &MockFileSystem, observer: Arc<RecordingObserver>) -> TaskContext {
    TaskContext {
        fs: Arc::new(fs.clone()) as Arc<dyn FileSystem>,
        root: ".".into(),
        observer,
    }
}
