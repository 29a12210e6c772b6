//! Engine Configuration Module
//!
//! Per-deployment configuration loaded from TOML, with one `EquipmentProfile`
//! per equipment class. Profiles are handed to the registry at registration
//! time; nothing in the pipeline reads configuration from global state.
//!
//! ## Loading Order
//!
//! 1. `IRONWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `ironwatch.toml` in the current working directory
//! 3. Built-in defaults (`config::defaults`)
//!
//! ```ignore
//! let config = EngineConfig::load();
//! let registry = EquipmentRegistry::new(config.engine.clone());
//! for entry in &config.equipment {
//!     registry.register(&entry.id, config.profile_for(&entry.class))?;
//! }
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
