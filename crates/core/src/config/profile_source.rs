use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::profile::Profile;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Somewhere a [`Profile`] can be (re-)loaded from.
pub trait ProfileSource: Send + Sync {
    fn load(&self) -> Result<Profile, ProfileError>;
}

/// JSON profile on disk, read fresh on every `load`.
pub struct ProfileFile {
    path: PathBuf,
}

impl ProfileFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<config dir>/facewatch/profile.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facewatch").join("profile.json"))
    }
}

impl ProfileSource for ProfileFile {
    fn load(&self) -> Result<Profile, ProfileError> {
        let json = fs::read_to_string(&self.path).map_err(|e| ProfileError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ProfileError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Profile held in memory; `update` is visible to the next `load`.
#[derive(Default)]
pub struct InMemoryProfile {
    profile: Mutex<Profile>,
}

impl InMemoryProfile {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile: Mutex::new(profile),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Profile)) {
        let mut guard = self.profile.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl ProfileSource for InMemoryProfile {
    fn load(&self) -> Result<Profile, ProfileError> {
        Ok(self
            .profile
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// Shared, periodically re-read view of the profile.
///
/// Every call to [`ProfileHandle::current`] reloads from the source. A failed
/// reload returns the last profile that loaded successfully instead; only the
/// first failure of a streak is logged as a warning.
#[derive(Clone)]
pub struct ProfileHandle {
    source: Arc<dyn ProfileSource>,
    cached: Arc<Mutex<CachedProfile>>,
}

struct CachedProfile {
    last_good: Profile,
    failing: bool,
}

impl CachedProfile {
    fn record_success(&mut self, profile: Profile) {
        if self.failing {
            log::info!("Profile reload recovered");
        }
        self.failing = false;
        self.last_good = profile;
    }

    /// Level to report a reload failure at: warn once, then debug until the
    /// next success.
    fn record_failure(&mut self) -> log::Level {
        let level = if self.failing {
            log::Level::Debug
        } else {
            log::Level::Warn
        };
        self.failing = true;
        level
    }
}

impl ProfileHandle {
    /// Loads the profile once; this first load must succeed.
    pub fn open(source: Arc<dyn ProfileSource>) -> Result<Self, ProfileError> {
        let initial = source.load()?;
        Ok(Self {
            source,
            cached: Arc::new(Mutex::new(CachedProfile {
                last_good: initial,
                failing: false,
            })),
        })
    }

    pub fn current(&self) -> Profile {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        match self.source.load() {
            Ok(profile) => {
                cached.record_success(profile.clone());
                profile
            }
            Err(e) => {
                let level = cached.record_failure();
                log::log!(level, "Profile reload failed, keeping last good profile: {e}");
                cached.last_good.clone()
            }
        }
    }

    /// The stop signal: `false` once the profile says the server is off.
    pub fn is_running(&self) -> bool {
        self.current().server_on
    }

    /// True while reloads are failing and `current` serves the last good
    /// profile.
    pub fn is_stale(&self) -> bool {
        self.cached.lock().unwrap_or_else(|e| e.into_inner()).failing
    }
}
