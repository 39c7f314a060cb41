use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gradient::{
    Backend, ClearColor, DispatchGrid, Extent, GpuPowerPreference, RendererConfig, SurfaceFormat,
    WorkgroupSize,
};
use serde::{Deserialize, Serialize};

use crate::cli::{self, RunArgs};

pub const DEFAULT_OUTPUT: &str = "uvfill.png";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_adapter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Fully merged render request: CLI over config file over built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
    pub renderer: RendererConfig,
    pub output: PathBuf,
    pub export: bool,
}

impl FileConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads `explicit` if given (it must exist), else `fallback` if present.
    pub fn load(explicit: Option<&Path>, fallback: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if fallback.exists() => fallback,
            None => {
                tracing::debug!(path = %fallback.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("failed to load config file at {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Config describing the built-in defaults, for `config init`.
    pub fn template() -> Self {
        let defaults = RendererConfig::default();
        Self {
            render: RenderSection {
                size: Some(defaults.extent.to_string()),
                backend: Some(defaults.backend.to_string()),
                format: Some(defaults.format.to_string()),
                workgroup: Some(defaults.workgroup.to_string()),
                grid: None,
                clear: Some(defaults.clear_color.0.channels()),
                power: Some("high".to_string()),
                fallback_adapter: Some(false),
                output: Some(PathBuf::from(DEFAULT_OUTPUT)),
            },
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "failed to prepare directory for config file at {}",
                dir.display()
            )
        })?;
        let serialized = toml::to_string_pretty(self)
            .with_context(|| "failed to serialize config file to TOML".to_string())?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Merges CLI flags over this file, falling back to built-in defaults.
    pub fn resolve(&self, args: &RunArgs) -> Result<ResolvedRun, ConfigError> {
        let render = &self.render;
        let defaults = RendererConfig::default();

        let extent = pick(args.size, render.size.as_deref(), "size", |v| {
            v.parse::<Extent>().map_err(|e| e.to_string())
        })?
        .unwrap_or(defaults.extent);
        let backend = pick(args.backend, render.backend.as_deref(), "backend", cli::parse_backend)?
            .unwrap_or(defaults.backend);
        let format = pick(args.format, render.format.as_deref(), "format", |v| {
            v.parse::<SurfaceFormat>().map_err(|e| e.to_string())
        })?
        .unwrap_or(defaults.format);
        let workgroup = pick(args.workgroup, render.workgroup.as_deref(), "workgroup", |v| {
            v.parse::<WorkgroupSize>().map_err(|e| e.to_string())
        })?
        .unwrap_or(defaults.workgroup);
        let grid = pick(args.grid, render.grid.as_deref(), "grid", |v| {
            v.parse::<DispatchGrid>().map_err(|e| e.to_string())
        })?;
        let power = pick(args.power, render.power.as_deref(), "power", cli::parse_power)?
            .unwrap_or(GpuPowerPreference::default());
        let clear_color = match (args.clear, render.clear) {
            (Some(clear), _) => clear,
            (None, Some(channels)) => ClearColor::from_channels(channels)
                .map_err(|err| ConfigError::Invalid(format!("render.clear: {err}")))?,
            (None, None) => defaults.clear_color,
        };

        let renderer = RendererConfig {
            extent,
            backend,
            format,
            workgroup,
            grid,
            clear_color,
            power,
            force_fallback_adapter: args.fallback_adapter
                || render.fallback_adapter.unwrap_or(false),
        };
        renderer
            .resolved_grid()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;

        Ok(ResolvedRun {
            renderer,
            output: args
                .output
                .clone()
                .or_else(|| render.output.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            export: !args.no_export,
        })
    }
}

/// CLI value if set, else the parsed config value, else `None`.
fn pick<T>(
    flag: Option<T>,
    file: Option<&str>,
    key: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    if flag.is_some() {
        return Ok(flag);
    }
    file.map(|value| parse(value).map_err(|err| ConfigError::Invalid(format!("render.{key}: {err}"))))
        .transpose()
}
