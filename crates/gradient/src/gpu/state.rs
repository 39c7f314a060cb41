use anyhow::{anyhow, Context, Result};

use crate::kernel::Surface;
use crate::types::{ClearColor, DispatchGrid, Extent};

use super::context::HeadlessContext;
use super::pipeline::FillPipeline;
use super::readback::ReadbackLayout;

/// One clear + dispatch + readback round trip on the GPU.
///
/// Callers run [`HeadlessContext::check_request`] first; limits are not
/// re-checked here.
pub struct GpuFill<'a> {
    context: &'a HeadlessContext,
    pipeline: &'a FillPipeline,
}

impl<'a> GpuFill<'a> {
    pub fn new(context: &'a HeadlessContext, pipeline: &'a FillPipeline) -> Self {
        Self { context, pipeline }
    }

    pub fn run(&self, extent: Extent, grid: DispatchGrid, clear: ClearColor) -> Result<Surface> {
        let device = &self.context.device;
        let queue = &self.context.queue;
        let format = self.pipeline.format;
        let layout = ReadbackLayout::new(extent, format);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("fill output"),
            size: extent.to_wgpu(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.to_wgpu(),
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let clear_texels = vec![clear.0; extent.texel_count()];
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &layout.encode(&clear_texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(layout.unpadded_bytes_per_row),
                rows_per_image: Some(extent.height),
            },
            extent.to_wgpu(),
        );

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fill readback"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.pipeline.bind_output(device, &view);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fill encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gradient fill"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.x, grid.y, 1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.padded_bytes_per_row),
                    rows_per_image: Some(extent.height),
                },
            },
            extent.to_wgpu(),
        );
        queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("wgpu poll failed: {err:?}"))?;
        rx.recv()
            .context("readback channel closed before mapping finished")?
            .map_err(|err| anyhow!("failed to map readback buffer: {err:?}"))?;

        let packed = {
            let mapped = slice.get_mapped_range();
            layout.unpad(&mapped)?
        };
        readback.unmap();

        tracing::debug!(
            %extent,
            %grid,
            %format,
            padded_bytes_per_row = layout.padded_bytes_per_row,
            "gpu dispatch read back"
        );

        Surface::from_texels(extent, format, layout.decode(&packed))
    }
}
