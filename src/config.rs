use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "PhysicsConfig::default_gravity")]
    pub gravity: [f32; 2],
    #[serde(default = "PhysicsConfig::default_velocity_iterations")]
    pub velocity_iterations: usize,
    #[serde(default = "PhysicsConfig::default_position_iterations")]
    pub position_iterations: usize,
    /// Logical step handed to the physics engine. `None` steps by the frame delta instead.
    #[serde(default = "PhysicsConfig::default_fixed_time_step")]
    pub fixed_time_step: Option<f32>,
}

impl PhysicsConfig {
    const fn default_gravity() -> [f32; 2] {
        [0.0, -9.81]
    }

    const fn default_velocity_iterations() -> usize {
        6
    }

    const fn default_position_iterations() -> usize {
        2
    }

    fn default_fixed_time_step() -> Option<f32> {
        Some(1.0 / 60.0)
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Self::default_gravity(),
            velocity_iterations: Self::default_velocity_iterations(),
            position_iterations: Self::default_position_iterations(),
            fixed_time_step: Self::default_fixed_time_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "RenderConfig::default_pixels_per_unit")]
    pub pixels_per_unit: f32,
    #[serde(default = "RenderConfig::default_clear_color")]
    pub clear_color: [f32; 4],
}

impl RenderConfig {
    const fn default_pixels_per_unit() -> f32 {
        100.0
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { pixels_per_unit: Self::default_pixels_per_unit(), clear_color: Self::default_clear_color() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "ScriptConfig::default_root")]
    pub root: PathBuf,
}

impl ScriptConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("assets/scripts")
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { root: Self::default_root() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub scripts: ScriptConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("[config] load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{ "physics": { "gravity": [0.0, -20.0] } }"#).unwrap();
        assert_eq!(cfg.physics.gravity, [0.0, -20.0]);
        assert_eq!(cfg.physics.velocity_iterations, 6);
        assert_eq!(cfg.physics.position_iterations, 2);
        assert_eq!(cfg.physics.fixed_time_step, Some(1.0 / 60.0));
        assert_eq!(cfg.render.pixels_per_unit, 100.0);
        assert_eq!(cfg.scripts.root, PathBuf::from("assets/scripts"));
    }

    #[test]
    fn explicit_null_time_step_means_frame_delta() {
        let cfg: EngineConfig = serde_json::from_str(r#"{ "physics": { "fixed_time_step": null } }"#).unwrap();
        assert_eq!(cfg.physics.fixed_time_step, None);
    }

    #[test]
    fn unreadable_file_falls_back() {
        let cfg = EngineConfig::load_or_default("/definitely/not/here.json");
        assert_eq!(cfg.physics.velocity_iterations, 6);
    }
}
