//! Thread-safe, mutable LOD tunables shared between the update thread, the
//! mesh worker, and whatever surface edits settings at runtime.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crossbeam_channel::{Receiver, Sender};

use crate::config::{
    LodConfig, validate_distance, validate_hysteresis, validate_radius, validate_resolution,
};
use crate::error::ConfigError;

type ResolutionCallback = Box<dyn Fn(u32) + Send + Sync>;

/// Listeners for `mesh_resolution` changes.
#[derive(Default)]
struct ResolutionListeners {
    callbacks: Vec<ResolutionCallback>,
    subscribers: Vec<Sender<u32>>,
}

impl ResolutionListeners {
    fn notify(&mut self, resolution: u32) {
        for callback in &self.callbacks {
            callback(resolution);
        }
        self.subscribers.retain(|tx| tx.send(resolution).is_ok());
    }
}

/// LOD settings behind a reader/writer lock.
///
/// Readers never observe a half-written value. Only `mesh_resolution` fires a
/// change notification; the other fields are simply re-read on demand.
/// Share it with `Arc<LiveConfig>`.
pub struct LiveConfig {
    settings: RwLock<LodConfig>,
    listeners: Mutex<ResolutionListeners>,
}

impl LiveConfig {
    /// Validate `config` and wrap it.
    pub fn from_config(config: &LodConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            settings: RwLock::new(*config),
            listeners: Mutex::new(ResolutionListeners::default()),
        })
    }

    // Settings are plain `Copy` values, so a poisoned lock still holds a usable one.
    fn read(&self) -> RwLockReadGuard<'_, LodConfig> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LodConfig> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, ResolutionListeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One consistent copy of every field.
    pub fn snapshot(&self) -> LodConfig {
        *self.read()
    }

    pub fn max_depth(&self) -> u32 {
        self.read().max_depth
    }

    pub fn set_max_depth(&self, max_depth: u32) {
        self.write().max_depth = max_depth;
    }

    pub fn max_distance(&self) -> f64 {
        self.read().max_distance
    }

    pub fn set_max_distance(&self, max_distance: f64) -> Result<(), ConfigError> {
        validate_distance(max_distance)?;
        self.write().max_distance = max_distance;
        Ok(())
    }

    pub fn mesh_resolution(&self) -> u32 {
        self.read().mesh_resolution
    }

    /// Update the mesh resolution and notify listeners if it changed.
    ///
    /// Listeners run after the write lock is released, so they may read the
    /// configuration, but must not set the resolution themselves.
    pub fn set_mesh_resolution(&self, resolution: u32) -> Result<(), ConfigError> {
        validate_resolution(resolution)?;

        // Held across the write and the notification so listeners see
        // changes in the order they were made.
        let mut listeners = self.listeners();
        {
            let mut settings = self.write();
            if settings.mesh_resolution == resolution {
                return Ok(());
            }
            settings.mesh_resolution = resolution;
        }
        log::debug!("Mesh resolution changed to {resolution}");
        listeners.notify(resolution);
        Ok(())
    }

    pub fn merge_hysteresis(&self) -> f64 {
        self.read().merge_hysteresis
    }

    pub fn set_merge_hysteresis(&self, factor: f64) -> Result<(), ConfigError> {
        validate_hysteresis(factor)?;
        self.write().merge_hysteresis = factor;
        Ok(())
    }

    pub fn sphere_radius(&self) -> f64 {
        self.read().sphere_radius
    }

    pub fn set_sphere_radius(&self, radius: f64) -> Result<(), ConfigError> {
        validate_radius(radius)?;
        self.write().sphere_radius = radius;
        Ok(())
    }

    /// Push a freshly loaded [`LodConfig`] into the live container.
    ///
    /// All fields are validated before any is written.
    pub fn apply(&self, config: &LodConfig) -> Result<(), ConfigError> {
        config.validate()?;
        {
            let mut settings = self.write();
            let resolution = settings.mesh_resolution;
            *settings = LodConfig {
                mesh_resolution: resolution,
                ..*config
            };
        }
        self.set_mesh_resolution(config.mesh_resolution)
    }

    /// Register a callback fired with the new value whenever the mesh
    /// resolution changes.
    pub fn on_resolution_changed(&self, callback: impl Fn(u32) + Send + Sync + 'static) {
        self.listeners().callbacks.push(Box::new(callback));
    }

    /// Channel-based subscription to mesh resolution changes.
    ///
    /// Dropping the receiver unsubscribes on the next change.
    pub fn subscribe_resolution(&self) -> Receiver<u32> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners().subscribers.push(tx);
        rx
    }
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("settings", &self.snapshot())
            .finish_non_exhaustive()
    }
}
