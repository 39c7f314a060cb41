//! Gradient-fill kernel and the headless host that runs it.
//!
//! The kernel writes `(x / width, y / height, 1, 1)` into every texel of a 2D
//! surface and skips invocations that land outside it. It exists twice: as
//! WGSL dispatched through `wgpu`, and as a rayon-parallel CPU reference that
//! shares the exact same contract. The overall flow is:
//!
//! ```text
//!   CLI / uvfill
//!          │ RendererConfig
//!          ▼
//!   Renderer::render ──▶ Backend::Gpu ─▶ HeadlessContext ─▶ FillPipeline ─▶ GpuFill
//!          │                                                                   │
//!          └────────▶ Backend::Cpu ─▶ kernel::dispatch_cpu                     │
//!                                          │                                   │
//!                                          ▼                                   ▼
//!                                       RenderOutput { surface, stats, .. } ◀──┘
//! ```
//!
//! Both backends clear the surface first and apply the storage precision of
//! the requested [`SurfaceFormat`], so their outputs can be compared texel by
//! texel with [`verify::compare`].

pub mod compile;
pub mod export;
pub mod gpu;
pub mod kernel;
pub mod types;
pub mod verify;

use anyhow::{Context, Result};

pub use export::{write_png, ExportFormat};
pub use kernel::{dispatch_cpu, shade, DispatchStats, Surface};
pub use types::{
    AdapterProfile, Backend, ClearColor, DispatchGrid, Extent, GpuPowerPreference, Rgba,
    SurfaceFormat, ValidationError, WorkgroupSize,
};
pub use verify::{compare, Comparison};

/// Immutable configuration passed to the renderer.
///
/// `RendererConfig` mirrors CLI flags and tells the renderer how large the
/// surface is, which backend runs the kernel, and how the dispatch is shaped.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Surface size in texels.
    pub extent: Extent,
    /// Implementation that runs the kernel.
    pub backend: Backend,
    /// Storage format of the surface.
    pub format: SurfaceFormat,
    /// Local workgroup size baked into the shader.
    pub workgroup: WorkgroupSize,
    /// Explicit workgroup count; `None` covers the surface exactly.
    pub grid: Option<DispatchGrid>,
    /// Value every texel holds before the dispatch.
    pub clear_color: ClearColor,
    /// Adapter power preference for the GPU backend.
    pub power: GpuPowerPreference,
    /// Ask wgpu for its software fallback adapter.
    pub force_fallback_adapter: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            extent: Extent::default(),
            backend: Backend::default(),
            format: SurfaceFormat::default(),
            workgroup: WorkgroupSize::default(),
            grid: None,
            clear_color: ClearColor::default(),
            power: GpuPowerPreference::default(),
            force_fallback_adapter: false,
        }
    }
}

impl RendererConfig {
    /// Dispatch grid to use, after checking that it covers the surface.
    pub fn resolved_grid(&self) -> Result<DispatchGrid, ValidationError> {
        let grid = self
            .grid
            .unwrap_or_else(|| DispatchGrid::covering(self.extent, self.workgroup));
        grid.check_covers(self.extent, self.workgroup)?;
        Ok(grid)
    }
}

/// Result of one render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub surface: Surface,
    pub stats: DispatchStats,
    pub backend: Backend,
    /// Adapter that ran the dispatch; `None` on the CPU backend.
    pub adapter: Option<AdapterProfile>,
}

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Clears the surface and runs one dispatch of the kernel on the chosen backend.
    pub fn render(&self) -> Result<RenderOutput> {
        let grid = self
            .config
            .resolved_grid()
            .context("invalid dispatch configuration")?;
        tracing::debug!(
            extent = %self.config.extent,
            backend = %self.config.backend,
            format = %self.config.format,
            workgroup = %self.config.workgroup,
            %grid,
            "rendering gradient"
        );

        match self.config.backend {
            Backend::Gpu => self.render_gpu(grid),
            Backend::Cpu => Ok(self.render_cpu(grid)),
        }
    }

    fn render_cpu(&self, grid: DispatchGrid) -> RenderOutput {
        let mut surface = Surface::new(
            self.config.extent,
            self.config.format,
            self.config.clear_color.0,
        );
        let stats = dispatch_cpu(&mut surface, grid, self.config.workgroup);
        RenderOutput {
            surface,
            stats,
            backend: Backend::Cpu,
            adapter: None,
        }
    }

    fn render_gpu(&self, grid: DispatchGrid) -> Result<RenderOutput> {
        let context = gpu::HeadlessContext::new(
            self.config.power,
            self.config.force_fallback_adapter,
        )?;
        context
            .check_request(
                self.config.extent,
                self.config.format,
                self.config.workgroup,
                grid,
            )
            .context("dispatch exceeds adapter capabilities")?;
        let pipeline =
            gpu::FillPipeline::new(&context.device, self.config.format, self.config.workgroup)
                .context("failed to build fill pipeline")?;
        let surface = gpu::GpuFill::new(&context, &pipeline).run(
            self.config.extent,
            grid,
            self.config.clear_color,
        )?;

        Ok(RenderOutput {
            surface,
            stats: DispatchStats::predicted(self.config.extent, grid, self.config.workgroup),
            backend: Backend::Gpu,
            adapter: Some(context.adapter_profile.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_config(width: u32, height: u32) -> RendererConfig {
        RendererConfig {
            extent: Extent::new(width, height).unwrap(),
            backend: Backend::Cpu,
            format: SurfaceFormat::Rgba32Float,
            ..RendererConfig::default()
        }
    }

    #[test]
    fn cpu_render_fills_gradient() {
        let output = Renderer::new(cpu_config(32, 16)).render().unwrap();
        assert_eq!(output.backend, Backend::Cpu);
        assert!(output.adapter.is_none());
        assert_eq!(output.stats.writes, 32 * 16);
        assert_eq!(
            output.surface.get(16, 8),
            Some(Rgba::new(0.5, 0.5, 1.0, 1.0))
        );
    }

    #[test]
    fn undersized_grid_is_rejected_before_dispatch() {
        let config = RendererConfig {
            grid: Some(DispatchGrid::new(1, 1).unwrap()),
            ..cpu_config(64, 64)
        };
        let err = Renderer::new(config).render().unwrap_err();
        assert!(format!("{err:#}").contains("covers"));
    }

    #[test]
    fn overflowing_grid_is_rejected_before_dispatch() {
        let config = RendererConfig {
            grid: Some(DispatchGrid::new(u32::MAX, u32::MAX).unwrap()),
            ..cpu_config(1, 1)
        };
        let err = Renderer::new(config).render().unwrap_err();
        assert!(format!("{err:#}").contains("exceeds u64 invocations"));
    }

    #[test]
    fn over_dispatch_reports_skipped_invocations() {
        let config = RendererConfig {
            grid: Some(DispatchGrid::new(4, 4).unwrap()),
            ..cpu_config(10, 10)
        };
        let output = Renderer::new(config).render().unwrap();
        assert_eq!(output.stats.invocations, 32 * 32);
        assert_eq!(output.stats.writes, 100);
        assert_eq!(output.stats.skipped, 32 * 32 - 100);
    }

    /// Runs on machines with a usable adapter; skips otherwise.
    #[test]
    fn gpu_matches_cpu_reference() {
        for format in [SurfaceFormat::Rgba8Unorm, SurfaceFormat::Rgba32Float] {
            let config = RendererConfig {
                format,
                backend: Backend::Gpu,
                grid: Some(DispatchGrid::new(5, 3).unwrap()),
                ..cpu_config(33, 17)
            };
            let gpu = match Renderer::new(config.clone()).render() {
                Ok(output) => output,
                Err(err) => {
                    eprintln!("skipping GPU comparison: {err:#}");
                    return;
                }
            };
            let cpu = Renderer::new(RendererConfig {
                backend: Backend::Cpu,
                ..config
            })
            .render()
            .unwrap();

            let comparison = compare(&gpu.surface, &cpu.surface, format.default_tolerance()).unwrap();
            assert!(comparison.matches(), "{format}: {comparison:?}");
            assert_eq!(gpu.stats, cpu.stats);
        }
    }
}
