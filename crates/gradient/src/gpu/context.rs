use anyhow::{Context as AnyhowContext, Result};

use crate::types::{
    AdapterProfile, DispatchGrid, Extent, GpuPowerPreference, SurfaceFormat, WorkgroupSize,
};

/// Device and queue with no presentation surface attached.
pub struct HeadlessContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_profile: AdapterProfile,
    adapter: wgpu::Adapter,
    limits: wgpu::Limits,
}

impl HeadlessContext {
    pub fn new(power: GpuPowerPreference, force_fallback_adapter: bool) -> Result<Self> {
        let instance = create_instance();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power.to_wgpu(),
            compatible_surface: None,
            force_fallback_adapter,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        let adapter_profile = AdapterProfile::from_wgpu(&adapter_info, &limits);
        tracing::debug!(
            name = %adapter_profile.name,
            backend = %adapter_profile.backend,
            device_type = %adapter_profile.device_type,
            is_software = adapter_profile.is_software,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("uvfill device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        Ok(Self {
            device,
            queue,
            adapter_profile,
            adapter,
            limits,
        })
    }

    /// Rejects requests the adapter cannot run, before any resource is created.
    pub fn check_request(
        &self,
        extent: Extent,
        format: SurfaceFormat,
        workgroup: WorkgroupSize,
        grid: DispatchGrid,
    ) -> Result<()> {
        check_limits(&self.limits, extent, workgroup, grid)?;
        let features = self.adapter.get_texture_format_features(format.to_wgpu());
        check_storage_usage(features.allowed_usages, format)
    }
}

fn check_limits(
    limits: &wgpu::Limits,
    extent: Extent,
    workgroup: WorkgroupSize,
    grid: DispatchGrid,
) -> Result<()> {
    let max_dimension = limits.max_texture_dimension_2d;
    if extent.width > max_dimension || extent.height > max_dimension {
        anyhow::bail!(
            "GPU max texture dimension is {max_dimension}, requested surface is {extent}"
        );
    }

    if workgroup.x > limits.max_compute_workgroup_size_x
        || workgroup.y > limits.max_compute_workgroup_size_y
    {
        anyhow::bail!(
            "workgroup {workgroup} exceeds adapter limit {x}x{y}",
            x = limits.max_compute_workgroup_size_x,
            y = limits.max_compute_workgroup_size_y
        );
    }
    if workgroup.invocations() > limits.max_compute_invocations_per_workgroup {
        anyhow::bail!(
            "workgroup {workgroup} has {count} invocations; adapter allows {max}",
            count = workgroup.invocations(),
            max = limits.max_compute_invocations_per_workgroup
        );
    }

    let max_groups = limits.max_compute_workgroups_per_dimension;
    if grid.x > max_groups || grid.y > max_groups {
        anyhow::bail!(
            "dispatch grid {grid} exceeds adapter limit of {max_groups} workgroups per dimension"
        );
    }
    Ok(())
}

fn check_storage_usage(allowed: wgpu::TextureUsages, format: SurfaceFormat) -> Result<()> {
    if !allowed.contains(wgpu::TextureUsages::STORAGE_BINDING) {
        anyhow::bail!("adapter cannot bind {format} as a storage texture");
    }
    Ok(())
}

/// Lists every adapter wgpu can see across all backends.
pub fn enumerate_adapters() -> Vec<AdapterProfile> {
    let instance = create_instance();
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| AdapterProfile::from_wgpu(&adapter.get_info(), &adapter.limits()))
        .collect()
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}
