use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Tunable constants of the viewer. The defaults are empirically chosen.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub normalize: NormalizeConfig,
    pub framing: FramingConfig,
    pub stereo: StereoConfig,
    pub immersive: ImmersiveConfig,
    pub playback: PlaybackConfig,
    pub controls: OrbitConfig,
    /// Background as `0xRRGGBB`.
    pub background: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            framing: FramingConfig::default(),
            stereo: StereoConfig::default(),
            immersive: ImmersiveConfig::default(),
            playback: PlaybackConfig::default(),
            controls: OrbitConfig::default(),
            background: 0x0a0a0a,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Largest extent of a model after normalization, in world units.
    pub target_size: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { target_size: 8.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    pub load_margin: f32,
    pub load_elevation: f32,
    pub reset_margin: f32,
    pub reset_elevation: f32,
    pub stereo_margin: f32,
    pub stereo_elevation: f32,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            load_margin: 1.8,
            load_elevation: 0.7,
            reset_margin: 1.5,
            reset_elevation: 0.6,
            stereo_margin: 2.5,
            stereo_elevation: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    /// Offset of each eye from the camera center, in world units.
    pub eye_separation: f32,
    pub fov_degrees: f32,
    /// Blend factor towards each new orientation sample; `None` applies
    /// samples unfiltered.
    pub orientation_smoothing: Option<f32>,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            eye_separation: 0.032,
            fov_degrees: 80.0,
            orientation_smoothing: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImmersiveConfig {
    /// Largest extent of the model while a VR session is active.
    pub comfort_size: f32,
    pub model_position: [f32; 3],
}

impl Default for ImmersiveConfig {
    fn default() -> Self {
        Self {
            comfort_size: 0.4,
            model_position: [0.0, 1.2, -1.5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub speed: f32,
    pub looping: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            looping: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.05,
            min_distance: 1.0,
            max_distance: 50.0,
            rotate_speed: 0.5,
            zoom_speed: 1.2,
            pan_speed: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "stereo": { "eye_separation": 0.03 } }"#).unwrap();

        assert_eq!(config.stereo.eye_separation, 0.03);
        assert_eq!(config.stereo.fov_degrees, 80.0);
        assert_eq!(config.framing, FramingConfig::default());
        assert_eq!(config.background, 0x0a0a0a);
    }
}
