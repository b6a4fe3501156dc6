//! # Registry Configuration
//!
//! Tuning knobs for a [`Registry`](crate::Registry), loadable from TOML.
//!
//! ```toml
//! page_size = 1024
//! entity_capacity = 50000
//! ```

use serde::{Deserialize, Serialize};

use crate::ecs::DEFAULT_PAGE_SIZE;
use crate::error::{EcsError, EcsResult};

/// Configuration for a registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Sparse slots per page in every pool and group set. Power of two.
    pub page_size: usize,
    /// Entity slots to reserve up front.
    pub entity_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            entity_capacity: 0,
        }
    }
}

impl RegistryConfig {
    /// Small pages for worlds with few, densely numbered entities.
    #[must_use]
    pub const fn compact() -> Self {
        Self {
            page_size: 256,
            entity_capacity: 0,
        }
    }

    /// Large pages and a pre-sized slot table.
    #[must_use]
    pub const fn large_world() -> Self {
        Self {
            page_size: 16_384,
            entity_capacity: 100_000,
        }
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if `page_size` is not a power of two.
    pub fn validate(&self) -> EcsResult<()> {
        if !self.page_size.is_power_of_two() {
            return Err(EcsError::InvalidConfig(format!(
                "page_size must be a power of two, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] on malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
