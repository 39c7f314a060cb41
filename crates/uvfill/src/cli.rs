use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gradient::{
    Backend, ClearColor, DispatchGrid, Extent, GpuPowerPreference, SurfaceFormat, WorkgroupSize,
};

#[derive(Parser, Debug)]
#[command(
    name = "uvfill",
    author,
    version,
    about = "Runs the UV-gradient compute kernel and exports the result",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Render options shared by the default action and `verify`.
///
/// Every option is optional so the config file can fill the gaps.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_extent)]
    pub size: Option<Extent>,

    /// Kernel implementation: `gpu` or `cpu`.
    #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
    pub backend: Option<Backend>,

    /// Surface storage format: `rgba8unorm` or `rgba32float`.
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<SurfaceFormat>,

    /// Workgroup size baked into the shader (e.g. `8x8`).
    #[arg(long, value_name = "XxY", value_parser = parse_workgroup)]
    pub workgroup: Option<WorkgroupSize>,

    /// Explicit workgroup count; must cover the surface (larger grids over-dispatch).
    #[arg(long, value_name = "XxY", value_parser = parse_grid)]
    pub grid: Option<DispatchGrid>,

    /// Clear color written before the dispatch, as `R,G,B,A` in [0, 1].
    #[arg(long, value_name = "R,G,B,A", value_parser = parse_clear)]
    pub clear: Option<ClearColor>,

    /// Adapter power preference: `low` or `high`.
    #[arg(long, value_name = "PREFERENCE", value_parser = parse_power)]
    pub power: Option<GpuPowerPreference>,

    /// Request wgpu's software fallback adapter.
    #[arg(long)]
    pub fallback_adapter: bool,

    /// Destination PNG path.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Run the kernel without writing an image.
    #[arg(long)]
    pub no_export: bool,

    /// Read defaults from this TOML file instead of the user config.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render on GPU and CPU and compare the two surfaces.
    Verify(VerifyArgs),
    /// List the GPU adapters wgpu can see.
    Adapters(AdaptersArgs),
    /// Inspect or create the user config file.
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Largest per-channel difference tolerated (defaults per format).
    #[arg(long, value_name = "EPSILON")]
    pub tolerance: Option<f32>,
}

#[derive(Args, Debug)]
pub struct AdaptersArgs {
    /// Print adapters as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved config directory and file.
    Where,
    /// Write a config file populated with the built-in defaults.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_extent(value: &str) -> Result<Extent, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_workgroup(value: &str) -> Result<WorkgroupSize, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_grid(value: &str) -> Result<DispatchGrid, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_format(value: &str) -> Result<SurfaceFormat, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_clear(value: &str) -> Result<ClearColor, String> {
    value.parse().map_err(|err| format!("{err}"))
}

pub fn parse_backend(value: &str) -> Result<Backend, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("backend must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "gpu" | "wgpu" => Ok(Backend::Gpu),
        "cpu" | "reference" => Ok(Backend::Cpu),
        other => Err(format!("unknown backend '{other}'; expected gpu or cpu")),
    }
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("power preference must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!(
            "unknown power preference '{other}'; expected low or high"
        )),
    }
}
