//! A scripted [`LocationSource`] for tests and demos.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::source::{LocationError, LocationSample, LocationSource, SampleCallback};
use crate::error::{FabzLinkError, Result};
use crate::models::WatchOptions;

type ScriptStep = std::result::Result<LocationSample, LocationError>;

/// Replays a fixed sequence of fixes (and fix errors), one per `interval`.
///
/// The script plays once per `start`; after the last step the source stays
/// idle until stopped.
pub struct SimulatedLocationSource {
    script: Vec<ScriptStep>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedLocationSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            script: Vec::new(),
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn with_sample(mut self, sample: LocationSample) -> Self {
        self.script.push(Ok(sample));
        self
    }

    pub fn with_error(mut self, error: LocationError) -> Self {
        self.script.push(Err(error));
        self
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl LocationSource for SimulatedLocationSource {
    fn start(&self, _options: &WatchOptions, callback: SampleCallback) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            FabzLinkError::ConfigurationError(
                "SimulatedLocationSource must be started inside a Tokio runtime".to_string(),
            )
        })?;

        let script = self.script.clone();
        let interval = self.interval;
        let handle = runtime.spawn(async move {
            for step in script {
                tokio::time::sleep(interval).await;
                callback(step);
            }
        });

        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for SimulatedLocationSource {
    fn drop(&mut self) {
        self.stop();
    }
}
