use std::borrow::Cow;

use anyhow::{anyhow, Context, Result};

use crate::types::{SurfaceFormat, WorkgroupSize};

/// Compute entry point inside [`FILL_SHADER`].
pub const ENTRY_POINT: &str = "main";

/// Substitutes the storage format and workgroup size into [`FILL_SHADER`].
pub fn render_fill_source(format: SurfaceFormat, workgroup: WorkgroupSize) -> String {
    FILL_SHADER
        .replace("{{FORMAT}}", format.wgsl_name())
        .replace("{{WORKGROUP_X}}", &workgroup.x.to_string())
        .replace("{{WORKGROUP_Y}}", &workgroup.y.to_string())
}

/// Parses and validates WGSL with naga so errors surface before device work.
pub fn validate_fill_source(source: &str) -> Result<()> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| anyhow!("fill shader failed to parse:\n{}", err.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| anyhow!("fill shader failed validation: {err}"))?;
    Ok(())
}

/// Builds the gradient-fill compute module for `format` and `workgroup`.
///
/// Device-side rejections are captured by a validation error scope.
pub(crate) fn compile_fill_shader(
    device: &wgpu::Device,
    format: SurfaceFormat,
    workgroup: WorkgroupSize,
) -> Result<wgpu::ShaderModule> {
    let source = render_fill_source(format, workgroup);
    validate_fill_source(&source).context("generated fill shader is invalid")?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("gradient fill"),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("device rejected fill shader: {error}"));
    }
    tracing::debug!(%format, %workgroup, "compiled fill shader");
    Ok(module)
}

/// WGSL kernel writing `(x / width, y / height, 1, 1)` into a storage texture.
///
/// Invocations outside the texture return before touching it, so the grid may
/// be larger than the surface.
const FILL_SHADER: &str = r"@group(0) @binding(0)
var output: texture_storage_2d<{{FORMAT}}, write>;

@compute @workgroup_size({{WORKGROUP_X}}, {{WORKGROUP_Y}}, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(output);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }
    let uv = vec2<f32>(f32(id.x) / f32(dims.x), f32(id.y) / f32(dims.y));
    textureStore(output, vec2<i32>(id.xy), vec4<f32>(uv, 1.0, 1.0));
}
";
