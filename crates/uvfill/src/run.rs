use anyhow::{Context, Result};
use gradient::{
    compare, write_png, Backend, Comparison, ExportFormat, RenderOutput, Renderer, RendererConfig,
};
use tracing_subscriber::EnvFilter;

use crate::cli::{RunArgs, VerifyArgs};
use crate::config::{FileConfig, ResolvedRun};
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let resolved = resolve(&args)?;
    if resolved.export {
        // Reject unsupported extensions before spending time on the dispatch.
        ExportFormat::from_path(&resolved.output).map_err(anyhow::Error::msg)?;
    }

    let output = Renderer::new(resolved.renderer.clone()).render()?;
    log_render(&resolved.renderer, &output);

    if resolved.export {
        write_png(&output.surface, &resolved.output)?;
    } else {
        tracing::info!("--no-export requested; skipping image export");
    }
    Ok(())
}

/// Renders the same request on both backends and compares the surfaces.
///
/// A mismatch is returned as an error so the process exits non-zero.
pub fn verify(args: VerifyArgs) -> Result<()> {
    let resolved = resolve(&args.run)?;
    let gpu_config = RendererConfig {
        backend: Backend::Gpu,
        ..resolved.renderer.clone()
    };
    let cpu_config = RendererConfig {
        backend: Backend::Cpu,
        ..resolved.renderer
    };
    let tolerance = args
        .tolerance
        .unwrap_or_else(|| gpu_config.format.default_tolerance());
    if !tolerance.is_finite() || tolerance < 0.0 {
        anyhow::bail!("tolerance must be a non-negative number, got {tolerance}");
    }

    let gpu = Renderer::new(gpu_config.clone())
        .render()
        .context("GPU render failed")?;
    log_render(&gpu_config, &gpu);
    let cpu = Renderer::new(cpu_config).render()?;

    let comparison = compare(&gpu.surface, &cpu.surface, tolerance)?;
    check_comparison(&comparison)
}

fn check_comparison(comparison: &Comparison) -> Result<()> {
    if !comparison.matches() {
        tracing::error!(
            mismatches = comparison.mismatches,
            texels = comparison.texels,
            max_abs_diff = comparison.max_abs_diff,
            worst = ?comparison.worst,
            tolerance = comparison.tolerance,
            "GPU output diverges from CPU reference"
        );
        let worst = comparison
            .worst
            .map(|(x, y)| format!(" (worst texel {x},{y})"))
            .unwrap_or_default();
        anyhow::bail!(
            "{} of {} texels differ from the CPU reference by more than {}; max difference {}{worst}",
            comparison.mismatches,
            comparison.texels,
            comparison.tolerance,
            comparison.max_abs_diff
        );
    }

    tracing::info!(
        texels = comparison.texels,
        max_abs_diff = comparison.max_abs_diff,
        tolerance = comparison.tolerance,
        "GPU output matches CPU reference"
    );
    Ok(())
}

fn resolve(args: &RunArgs) -> Result<ResolvedRun> {
    let paths = AppPaths::discover()?;
    let config_path = args.config.clone().unwrap_or_else(|| paths.config_file());
    let file = FileConfig::load(args.config.as_deref(), &config_path)?;
    let resolved = file.resolve(args)?;
    tracing::debug!(
        config = %config_path.display(),
        output = %resolved.output.display(),
        export = resolved.export,
        "resolved render configuration"
    );
    Ok(resolved)
}

fn log_render(config: &RendererConfig, output: &RenderOutput) {
    if let Some(adapter) = &output.adapter {
        tracing::info!(
            adapter = %adapter.name,
            backend = %adapter.backend,
            software = adapter.is_software,
            "dispatched on GPU adapter"
        );
    }
    tracing::info!(
        extent = %config.extent,
        format = %config.format,
        backend = %output.backend,
        invocations = output.stats.invocations,
        writes = output.stats.writes,
        skipped = output.stats.skipped,
        "rendered gradient"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(mismatches: usize) -> Comparison {
        Comparison {
            tolerance: 0.01,
            max_abs_diff: if mismatches == 0 { 0.004 } else { 0.5 },
            worst: Some((3, 1)),
            mismatches,
            texels: 16,
        }
    }

    #[test]
    fn matching_comparison_succeeds() {
        assert!(check_comparison(&comparison(0)).is_ok());
    }

    #[test]
    fn mismatch_is_reported_as_error() {
        let err = check_comparison(&comparison(2)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("2 of 16 texels"), "{message}");
        assert!(message.contains("worst texel 3,1"), "{message}");
    }
}
