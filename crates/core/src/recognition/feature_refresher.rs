/// Keeps the feature store in step with the web application.
///
/// Runs on its own schedule: each cycle re-reads the profile, fetches every
/// enrolled feature and swaps the store's mapping in one step. It stops for
/// good once the profile turns the server off or disables the feature source.
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::profile_source::ProfileHandle;

use super::domain::feature_source::FeatureSource;
use super::domain::feature_store::{FeatureMap, FeatureStore};

/// Floor on the pause between cycles, so a zero interval cannot spin.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The store now holds this many features.
    Refreshed(usize),
    /// The fetch failed; the previous mapping is still in place.
    Failed,
    /// The profile asked the refresher to stop.
    Stopped,
}

pub struct FeatureRefresher {
    source: Box<dyn FeatureSource>,
    store: FeatureStore,
    profile: ProfileHandle,
}

impl FeatureRefresher {
    pub fn new(source: Box<dyn FeatureSource>, store: FeatureStore, profile: ProfileHandle) -> Self {
        Self {
            source,
            store,
            profile,
        }
    }

    /// One refresh: check the stop conditions, fetch, swap.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let profile = self.profile.current();
        if !profile.refresh_enabled() {
            return CycleOutcome::Stopped;
        }
        match self.source.fetch_all(&profile.feature_source) {
            Ok(records) => {
                let count = self.store.replace(FeatureMap::from_records(records));
                log::info!("Loaded {count} face features");
                CycleOutcome::Refreshed(count)
            }
            Err(e) => {
                log::warn!(
                    "Feature refresh failed, keeping {} cached features: {e}",
                    self.store.len()
                );
                CycleOutcome::Failed
            }
        }
    }

    /// Runs cycles on a background thread until the profile stops it or
    /// the returned handle is stopped.
    pub fn spawn(mut self) -> std::io::Result<RefresherHandle> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let handle = std::thread::Builder::new()
            .name("feature-refresher".into())
            .spawn(move || self.run(&stop_rx))?;
        Ok(RefresherHandle {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn run(&mut self, stop_rx: &Receiver<()>) {
        loop {
            if self.run_cycle() == CycleOutcome::Stopped {
                log::info!("Feature refresher stopped by profile");
                return;
            }
            let interval = refresh_interval(self.profile.current().refresh_interval_secs);
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("Feature refresher stopped by handle");
                    return;
                }
            }
        }
    }
}

fn refresh_interval(secs: u64) -> Duration {
    Duration::from_secs(secs).max(MIN_REFRESH_INTERVAL)
}

/// Owner of the refresher thread. Stopping (or dropping) wakes the thread
/// from its sleep and joins it.
pub struct RefresherHandle {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefresherHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Feature refresher thread panicked");
            }
        }
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
