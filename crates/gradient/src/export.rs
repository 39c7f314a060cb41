use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba as ImageRgba};

use crate::kernel::Surface;

/// File formats supported by the export path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
}

impl ExportFormat {
    /// Picks the export format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => Ok(ExportFormat::Png),
            Some("exr") => Err("EXR export is not implemented yet; use a .png path".to_string()),
            None => Err("export path has no extension; expected .png".to_string()),
            Some(other) => Err(format!(
                "unsupported export format '.{other}'; expected .png"
            )),
        }
    }
}

/// Writes `surface` as an 8-bit RGBA PNG, creating parent directories as needed.
pub fn write_png(surface: &Surface, path: &Path) -> Result<()> {
    let extent = surface.extent();
    let bytes: Vec<u8> = surface
        .texels()
        .iter()
        .flat_map(|texel| texel.to_unorm8())
        .collect();
    let image: ImageBuffer<ImageRgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(extent.width, extent.height, bytes)
            .context("surface byte length does not match its extent")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to prepare export directory {}", parent.display())
        })?;
    }

    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write PNG to {}", path.display()))?;
    tracing::info!(path = %path.display(), %extent, "exported gradient");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::kernel::dispatch_cpu;
    use crate::types::{DispatchGrid, Extent, Rgba, SurfaceFormat, WorkgroupSize};

    #[test]
    fn export_format_follows_extension() {
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("out/Frame.PNG")),
            Ok(ExportFormat::Png)
        );
        assert!(ExportFormat::from_path(&PathBuf::from("frame.exr"))
            .unwrap_err()
            .contains("EXR"));
        assert!(ExportFormat::from_path(&PathBuf::from("frame")).is_err());
        assert!(ExportFormat::from_path(&PathBuf::from("frame.jpg")).is_err());
    }

    #[test]
    fn png_holds_quantized_gradient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/gradient.png");
        let extent = Extent::new(4, 2).unwrap();
        let mut surface = Surface::new(extent, SurfaceFormat::Rgba32Float, Rgba::OPAQUE_BLACK);
        dispatch_cpu(
            &mut surface,
            DispatchGrid::covering(extent, WorkgroupSize::default()),
            WorkgroupSize::default(),
        );

        write_png(&surface, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(decoded.get_pixel(2, 1).0, [128, 128, 255, 255]);
        assert_eq!(decoded.get_pixel(3, 0).0, [191, 0, 255, 255]);
    }
}
