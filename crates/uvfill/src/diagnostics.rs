//! Adapter listing for `uvfill adapters`.

use std::io::Write;

use anyhow::{Context, Result};
use gradient::gpu::enumerate_adapters;
use gradient::AdapterProfile;

pub fn list_adapters(json: bool) -> Result<()> {
    let adapters = enumerate_adapters();
    tracing::debug!(count = adapters.len(), "enumerated adapters");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let rendered = serde_json::to_string_pretty(&adapters)
            .context("failed to serialise adapter list")?;
        writeln!(out, "{rendered}")?;
    } else {
        write_text(&mut out, &adapters)?;
    }
    Ok(())
}

fn write_text(out: &mut impl Write, adapters: &[AdapterProfile]) -> Result<()> {
    if adapters.is_empty() {
        writeln!(out, "No GPU adapters found; use --backend cpu to render without one.")?;
        return Ok(());
    }

    writeln!(out, "GPU adapters:")?;
    for (index, adapter) in adapters.iter().enumerate() {
        writeln!(
            out,
            "  [{index}] {} ({}, {}{})",
            adapter.name,
            adapter.backend,
            adapter.device_type,
            if adapter.is_software { ", software" } else { "" }
        )?;
        if !adapter.driver.is_empty() {
            writeln!(out, "      driver:    {}", adapter.driver)?;
        }
        writeln!(
            out,
            "      limits:    texture 2d {}, workgroup {}x{} ({} invocations), {} groups/dim",
            adapter.max_texture_dimension_2d,
            adapter.max_compute_workgroup_size_x,
            adapter.max_compute_workgroup_size_y,
            adapter.max_compute_invocations_per_workgroup,
            adapter.max_compute_workgroups_per_dimension
        )?;
    }
    Ok(())
}
