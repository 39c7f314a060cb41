use anyhow::Result;

use crate::types::{Extent, Rgba, SurfaceFormat};

/// Row pitch bookkeeping for copying a texture into a mappable buffer.
///
/// `copy_texture_to_buffer` requires each row to start on a
/// `COPY_BYTES_PER_ROW_ALIGNMENT` boundary, so rows are padded on the way out
/// and stripped again once mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadbackLayout {
    pub extent: Extent,
    pub format: SurfaceFormat,
    pub unpadded_bytes_per_row: u32,
    pub padded_bytes_per_row: u32,
}

impl ReadbackLayout {
    pub fn new(extent: Extent, format: SurfaceFormat) -> Self {
        let unpadded_bytes_per_row = extent.width * format.bytes_per_texel();
        Self {
            extent,
            format,
            unpadded_bytes_per_row,
            padded_bytes_per_row: align_to(
                unpadded_bytes_per_row,
                wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
            ),
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.extent.height as u64
    }

    /// Drops the per-row padding from a mapped staging buffer.
    pub fn unpad(&self, mapped: &[u8]) -> Result<Vec<u8>> {
        if (mapped.len() as u64) < self.buffer_size() {
            anyhow::bail!(
                "readback buffer holds {} bytes, expected {}",
                mapped.len(),
                self.buffer_size()
            );
        }
        let row_bytes = self.unpadded_bytes_per_row as usize;
        let padded = self.padded_bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * self.extent.height as usize);
        for row in 0..self.extent.height as usize {
            let start = row * padded;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        Ok(out)
    }

    /// Turns tightly packed texel bytes into normalized texels.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Rgba> {
        match self.format {
            SurfaceFormat::Rgba8Unorm => bytes
                .chunks_exact(4)
                .map(|px| {
                    Rgba::new(
                        px[0] as f32 / 255.0,
                        px[1] as f32 / 255.0,
                        px[2] as f32 / 255.0,
                        px[3] as f32 / 255.0,
                    )
                })
                .collect(),
            SurfaceFormat::Rgba32Float => bytes
                .chunks_exact(16)
                .map(|px| {
                    let channel = |i: usize| {
                        f32::from_le_bytes([px[i], px[i + 1], px[i + 2], px[i + 3]])
                    };
                    Rgba::new(channel(0), channel(4), channel(8), channel(12))
                })
                .collect(),
        }
    }

    /// Packs texels the way the texture stores them, for uploads.
    pub fn encode(&self, texels: &[Rgba]) -> Vec<u8> {
        match self.format {
            SurfaceFormat::Rgba8Unorm => texels.iter().flat_map(Rgba::to_unorm8).collect(),
            SurfaceFormat::Rgba32Float => bytemuck::cast_slice(texels).to_vec(),
        }
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        let layout = ReadbackLayout::new(Extent::new(3, 2).unwrap(), SurfaceFormat::Rgba8Unorm);
        assert_eq!(layout.unpadded_bytes_per_row, 12);
        assert_eq!(layout.padded_bytes_per_row, 256);
        assert_eq!(layout.buffer_size(), 512);

        let wide = ReadbackLayout::new(Extent::new(64, 1).unwrap(), SurfaceFormat::Rgba32Float);
        assert_eq!(wide.unpadded_bytes_per_row, 1024);
        assert_eq!(wide.padded_bytes_per_row, 1024);
        assert_eq!(wide.padded_bytes_per_row % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
    }

    #[test]
    fn unpad_keeps_only_row_payload() {
        let layout = ReadbackLayout::new(Extent::new(2, 3).unwrap(), SurfaceFormat::Rgba8Unorm);
        let mut mapped = vec![0xEEu8; layout.buffer_size() as usize];
        for row in 0..3usize {
            let start = row * layout.padded_bytes_per_row as usize;
            for byte in 0..8usize {
                mapped[start + byte] = (row * 8 + byte) as u8;
            }
        }

        let packed = layout.unpad(&mapped).unwrap();
        assert_eq!(packed, (0u8..24).collect::<Vec<_>>());
        assert!(layout.unpad(&mapped[..100]).is_err());
    }

    #[test]
    fn decodes_both_formats() {
        let extent = Extent::new(1, 1).unwrap();
        let unorm = ReadbackLayout::new(extent, SurfaceFormat::Rgba8Unorm);
        assert_eq!(
            unorm.decode(&[0, 255, 51, 255]),
            vec![Rgba::new(0.0, 1.0, 0.2, 1.0)]
        );

        let float = ReadbackLayout::new(extent, SurfaceFormat::Rgba32Float);
        let texel = Rgba::new(0.25, 0.5, 1.0, 1.0);
        let bytes = float.encode(&[texel]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(float.decode(&bytes), vec![texel]);
    }
}
