use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;

use assetpipe::task::{Asset, Transform, TransformFailure};
use assetpipe::types::BoxFuture;

/// Tracks how many fake transforms run at once, and the peak.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Behaviour {
    Identity,
    Uppercase,
    FailAll(String),
    FailOn(PathBuf),
}

/// Scriptable in-process transform.
///
/// Clones share the call counter, so a test can keep one clone and hand
/// another to the task under test.
#[derive(Debug, Clone)]
pub struct FakeTransform {
    name: String,
    behaviour: Behaviour,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    probe: Option<ConcurrencyProbe>,
}

impl FakeTransform {
    fn with_behaviour(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            probe: None,
        }
    }

    /// Returns assets unchanged.
    pub fn identity(name: &str) -> Self {
        Self::with_behaviour(name, Behaviour::Identity)
    }

    /// ASCII-uppercases every asset's contents.
    pub fn uppercase(name: &str) -> Self {
        Self::with_behaviour(name, Behaviour::Uppercase)
    }

    /// Fails for the whole set with `message`.
    pub fn failing(name: &str, message: &str) -> Self {
        Self::with_behaviour(name, Behaviour::FailAll(message.to_string()))
    }

    /// Fails on the asset whose relative path is `file`.
    pub fn failing_on(name: &str, file: impl Into<PathBuf>) -> Self {
        Self::with_behaviour(name, Behaviour::FailOn(file.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_probe(mut self, probe: ConcurrencyProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of times `apply` has been entered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn Transform> {
        Arc::new(self)
    }
}

impl Transform for FakeTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        _root: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Asset>, TransformFailure>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(probe) = &self.probe {
                probe.enter();
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(probe) = &self.probe {
                probe.exit();
            }

            match &self.behaviour {
                Behaviour::Identity => Ok(assets),
                Behaviour::Uppercase => Ok(assets
                    .into_iter()
                    .map(|mut a| {
                        a.contents.make_ascii_uppercase();
                        a
                    })
                    .collect()),
                Behaviour::FailAll(message) => {
                    Err(TransformFailure::whole_set(anyhow!(message.clone())))
                }
                Behaviour::FailOn(file) => {
                    if assets.iter().any(|a| &a.path == file) {
                        Err(TransformFailure::for_file(
                            file.clone(),
                            anyhow!("{} rejected {:?}", self.name, file),
                        ))
                    } else {
                        Ok(assets)
                    }
                }
            }
        })
    }
}
