/// Galaxy3D Engine - singleton access to the material manager and the logger
///
/// The material manager is shared as `Arc<Mutex<MaterialManager>>` so that
/// asset hot-reload callbacks running on a monitoring thread and the render
/// thread serialize their registry mutations through one lock.

use std::sync::{OnceLock, RwLock, Arc, Mutex};
use std::time::SystemTime;
use crate::material::MaterialManager;
use crate::error::{Result, Error};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

struct EngineState {
    material_manager: RwLock<Option<Arc<Mutex<MaterialManager>>>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            material_manager: RwLock::new(None),
        }
    }
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ===== PUBLIC API =====

/// Main engine singleton manager
///
/// # Example
///
/// ```no_run
/// use galaxy_3d_material::galaxy3d::Engine;
///
/// Engine::initialize()?;
/// // Engine::create_material_manager(MaterialManager::new(...)?)?;
/// let manager = Engine::material_manager()?;
/// Engine::shutdown();
/// # Ok::<(), galaxy_3d_material::galaxy3d::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log errors before returning them
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("galaxy3d::Engine", "Initialization failed: {}", msg);
            }
            _ => {
                crate::engine_error!("galaxy3d::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get().ok_or_else(|| Self::log_and_return_error(
            Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
        ))
    }

    /// Initialize the engine (idempotent)
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Drop all singletons
    pub fn shutdown() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut manager) = state.material_manager.write() {
                *manager = None;
            }
        }
    }

    // ===== MATERIAL MANAGER API =====

    /// Register the material manager singleton
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not initialized or a manager already exists.
    pub fn create_material_manager(manager: MaterialManager) -> Result<Arc<Mutex<MaterialManager>>> {
        let state = Self::state()?;
        let mut lock = state.material_manager.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("MaterialManager lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("MaterialManager already exists. Call Engine::destroy_material_manager() first.".to_string())
            ));
        }

        let shared = Arc::new(Mutex::new(manager));
        MaterialManager::install_asset_callbacks(&shared).map_err(Self::log_and_return_error)?;
        *lock = Some(shared.clone());

        crate::engine_info!("galaxy3d::Engine", "MaterialManager singleton created successfully");

        Ok(shared)
    }

    /// Get the material manager singleton
    pub fn material_manager() -> Result<Arc<Mutex<MaterialManager>>> {
        let state = Self::state()?;
        let lock = state.material_manager.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("MaterialManager lock poisoned".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("MaterialManager not created. Call Engine::create_material_manager() first.".to_string())
            ))
    }

    /// Destroy the material manager singleton
    ///
    /// Existing `Arc` handles stay valid until dropped.
    pub fn destroy_material_manager() -> Result<()> {
        let state = Self::state()?;
        let mut lock = state.material_manager.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("MaterialManager lock poisoned".to_string())
            ))?;

        *lock = None;

        crate::engine_info!("galaxy3d::Engine", "MaterialManager singleton destroyed");

        Ok(())
    }

    /// Reset all singletons for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut manager) = state.material_manager.write() {
                *manager = None;
            }
        }
    }

    // ===== LOGGING API =====

    /// Replace the logger
    pub fn set_logger<L: Logger + 'static>(new_logger: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(new_logger);
        }
    }

    /// Reset logger to `DefaultLogger`
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Logging entry point used by engine_info!, engine_warn!, etc.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Logging entry point with file:line (used by engine_error!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
