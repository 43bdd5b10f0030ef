//! Heap configuration.
//!
//! Mirrors `fgc::GcConfig`'s shape — a plain struct with a `Default` impl,
//! a `validate()` that returns a dedicated error enum, and a `from_env()`
//! constructor — trimmed down to exactly the knobs the core spec names:
//! a semispace capacity, and the two debug toggles read from
//! `SHI_ALWAYS_GC` / `SHI_DEBUG_GC`.

use thiserror::Error;

/// Default number of heap slots per semispace. Chosen generously for an
/// interpreter embedded in a CLI; overridable via `from_env` for tests that
/// want to force collections quickly.
pub const DEFAULT_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    /// Maximum number of heap slots held by each semispace.
    pub capacity: usize,
    /// Force a full collection before every allocation (`SHI_ALWAYS_GC`).
    pub always_gc: bool,
    /// Log per-cycle statistics (`SHI_DEBUG_GC`).
    pub debug_gc: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("heap capacity must be greater than zero")]
    ZeroCapacity,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            always_gc: false,
            debug_gc: false,
        }
    }
}

impl GcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Builds a config from `SHI_ALWAYS_GC` and `SHI_DEBUG_GC`, per the
    /// exact contract of the core's external interfaces: any non-empty
    /// value enables the corresponding behavior.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.always_gc = env_flag("SHI_ALWAYS_GC");
        config.debug_gc = env_flag("SHI_DEBUG_GC");
        config
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(GcConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let config = GcConfig::default().with_capacity(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }
}
