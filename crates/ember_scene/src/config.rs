//! # Scene Configuration
//!
//! ```toml
//! owning_sprite_group = true
//! default_entity_name = "Entity"
//! viewport = [1920, 1080]
//!
//! [registry]
//! page_size = 1024
//! ```

use ember_core::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SceneResult};

/// Configuration for a [`Scene`](crate::Scene).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Settings of the underlying registry.
    pub registry: RegistryConfig,
    /// Keep sprites in an owning `Transform` + `SpriteRenderer` group so
    /// rendering walks two packed arrays. Otherwise a non-owning group is
    /// used and both pools stay free for other owning groups.
    pub owning_sprite_group: bool,
    /// Tag given to entities created with an empty name.
    pub default_entity_name: String,
    /// Initial viewport size in pixels.
    pub viewport: [u32; 2],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            owning_sprite_group: true,
            default_entity_name: "Entity".to_string(),
            viewport: [1280, 720],
        }
    }
}

impl SceneConfig {
    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// [`SceneError::InvalidConfig`] for an empty default name or a zero
    /// viewport axis, [`SceneError::Ecs`] for an invalid registry section.
    pub fn validate(&self) -> SceneResult<()> {
        self.registry.validate()?;
        if self.default_entity_name.is_empty() {
            return Err(SceneError::InvalidConfig(
                "default_entity_name must not be empty".to_string(),
            ));
        }
        if self.viewport.contains(&0) {
            return Err(SceneError::InvalidConfig(format!(
                "viewport must be non-zero, got {}x{}",
                self.viewport[0], self.viewport[1]
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`SceneError::InvalidConfig`] on malformed TOML, otherwise as
    /// [`validate`](Self::validate).
    pub fn from_toml_str(source: &str) -> SceneResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| SceneError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
