//! CPU rendition of the gradient-fill kernel.
//!
//! `shade` is the kernel body shared by every invocation: a bounds guard
//! followed by a normalized-coordinate color. `dispatch_cpu` walks a whole
//! invocation grid the way a GPU would, splitting the surface into disjoint
//! rows so rayon workers never share a texel.

use rayon::prelude::*;

use crate::types::{DispatchGrid, Extent, Rgba, SurfaceFormat, WorkgroupSize};

/// Color for invocation `(x, y)`, or `None` when it falls outside `extent`.
///
/// The ratio is taken in f64 so the last column and row stay below 1.0 even
/// when the extent exceeds f32's 24-bit integer range.
pub fn shade(extent: Extent, x: u32, y: u32) -> Option<Rgba> {
    if x >= extent.width || y >= extent.height {
        return None;
    }
    Some(Rgba::new(
        normalize(x, extent.width),
        normalize(y, extent.height),
        1.0,
        1.0,
    ))
}

fn normalize(coord: u32, size: u32) -> f32 {
    (coord as f64 / size as f64) as f32
}

/// Row-major texel storage addressed by `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    extent: Extent,
    format: SurfaceFormat,
    texels: Vec<Rgba>,
}

impl Surface {
    /// Allocates a surface with every texel set to `fill`.
    pub fn new(extent: Extent, format: SurfaceFormat, fill: Rgba) -> Self {
        Self {
            extent,
            format,
            texels: vec![format.store(fill); extent.texel_count()],
        }
    }

    /// Wraps texels read back from a device. Length must match `extent`.
    pub fn from_texels(
        extent: Extent,
        format: SurfaceFormat,
        texels: Vec<Rgba>,
    ) -> anyhow::Result<Self> {
        if texels.len() != extent.texel_count() {
            anyhow::bail!(
                "surface {extent} needs {expected} texels, got {actual}",
                expected = extent.texel_count(),
                actual = texels.len()
            );
        }
        Ok(Self {
            extent,
            format,
            texels,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn texels(&self) -> &[Rgba] {
        &self.texels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        self.extent
            .contains(x, y)
            .then(|| self.texels[self.index(x, y)])
    }

    /// Runs a single invocation. Returns whether a texel was written.
    pub fn invoke(&mut self, x: u32, y: u32) -> bool {
        match shade(self.extent, x, y) {
            Some(texel) => {
                let index = self.index(x, y);
                self.texels[index] = self.format.store(texel);
                true
            }
            None => false,
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.extent.width as usize + x as usize
    }
}

/// Invocation accounting for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub invocations: u64,
    pub writes: u64,
    pub skipped: u64,
}

impl DispatchStats {
    /// Stats implied by the bounds guard when every in-bounds texel is covered.
    pub fn predicted(extent: Extent, grid: DispatchGrid, workgroup: WorkgroupSize) -> Self {
        let (grid_x, grid_y) = grid.invocation_extent(workgroup);
        let writes = grid_x.min(extent.width as u64) * grid_y.min(extent.height as u64);
        let invocations = grid.invocations(workgroup);
        Self {
            invocations,
            writes,
            skipped: invocations - writes,
        }
    }
}

/// Runs every invocation of `grid` against `surface`.
///
/// Grid rows beyond the surface height cannot write anything, so they are
/// counted as skipped without being visited. `invocations` saturates at
/// `u64::MAX` for grids rejected by [`DispatchGrid::check_covers`].
pub fn dispatch_cpu(
    surface: &mut Surface,
    grid: DispatchGrid,
    workgroup: WorkgroupSize,
) -> DispatchStats {
    let (grid_x, grid_y) = grid.invocation_extent(workgroup);
    let extent = surface.extent;
    let format = surface.format;
    let width = extent.width as usize;
    let rows = grid_y.min(extent.height as u64) as usize;
    let columns = grid_x.min(extent.width as u64) as u32;

    let writes: u64 = surface
        .texels
        .par_chunks_mut(width)
        .take(rows)
        .enumerate()
        .map(|(y, row)| {
            let mut written = 0u64;
            for x in 0..columns {
                if let Some(texel) = shade(extent, x, y as u32) {
                    row[x as usize] = format.store(texel);
                    written += 1;
                }
            }
            written
        })
        .sum();

    let invocations = grid.invocations(workgroup);
    let stats = DispatchStats {
        invocations,
        writes,
        skipped: invocations - writes,
    };
    tracing::debug!(
        %extent,
        %grid,
        %workgroup,
        invocations = stats.invocations,
        writes = stats.writes,
        skipped = stats.skipped,
        "cpu dispatch finished"
    );
    stats
}
