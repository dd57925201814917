//! Renderer configuration.
//!
//! Settings are read once at startup: defaults, then an optional TOML file,
//! then environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";

/// Environment variable overriding `enable_validation` (`1`/`true`/`0`/`false`).
pub const ENV_VALIDATION: &str = "TESSERA_VALIDATION";

/// Environment variable overriding `frames_in_flight`.
pub const ENV_FRAMES_IN_FLIGHT: &str = "TESSERA_FRAMES_IN_FLIGHT";

/// Upper bound for `frames_in_flight`.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Runtime settings for the window and renderer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Title of the main window.
    pub window_title: String,
    /// Initial window width in physical pixels.
    pub window_width: u32,
    /// Initial window height in physical pixels.
    pub window_height: u32,
    /// Enables the Khronos validation layer and the debug messenger.
    pub enable_validation: bool,
    /// Number of frames the CPU may record ahead of the GPU.
    pub frames_in_flight: usize,
    /// Cap on the MSAA sample count. `1` disables multisampling.
    pub max_msaa_samples: u32,
    /// Compiled SPIR-V vertex shader.
    pub vertex_shader: PathBuf,
    /// Compiled SPIR-V fragment shader.
    pub fragment_shader: PathBuf,
    /// Texture image applied to the model.
    pub texture: PathBuf,
    /// Wavefront OBJ model to draw.
    pub model: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_title: "Tessera".to_string(),
            window_width: 1280,
            window_height: 720,
            enable_validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            max_msaa_samples: 64,
            vertex_shader: PathBuf::from("shaders/shader.vert.spv"),
            fragment_shader: PathBuf::from("shaders/shader.frag.spv"),
            texture: PathBuf::from("assets/textures/texture.png"),
            model: PathBuf::from("assets/models/model.obj"),
        }
    }
}

impl RendererConfig {
    /// Loads a config from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a config from TOML text without validating it.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads `tessera.toml` if it exists, applies environment overrides and
    /// validates the result.
    pub fn from_env_or_default() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        let mut config = if path.exists() {
            info!("Loading config from {}", path.display());
            Self::load(path)?
        } else {
            debug!("No {} found, using default config", DEFAULT_CONFIG_FILE);
            Self::default()
        };

        config.apply_overrides(
            std::env::var(ENV_VALIDATION).ok().as_deref(),
            std::env::var(ENV_FRAMES_IN_FLIGHT).ok().as_deref(),
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Applies raw override values as read from the environment.
    pub fn apply_overrides(
        &mut self,
        validation: Option<&str>,
        frames_in_flight: Option<&str>,
    ) -> Result<()> {
        if let Some(value) = validation {
            self.enable_validation = parse_flag(value).ok_or_else(|| {
                Error::Config(format!("{ENV_VALIDATION} must be a boolean, got '{value}'"))
            })?;
        }

        if let Some(value) = frames_in_flight {
            self.frames_in_flight = value.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{ENV_FRAMES_IN_FLIGHT} must be an integer, got '{value}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Checks that every value is usable by the renderer.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::Config(format!(
                "frames_in_flight must be within 1..={MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }

        if self.window_width == 0 || self.window_height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }

        if !self.max_msaa_samples.is_power_of_two() || self.max_msaa_samples > 64 {
            return Err(Error::Config(format!(
                "max_msaa_samples must be a power of two up to 64, got {}",
                self.max_msaa_samples
            )));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
