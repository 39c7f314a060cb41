use anyhow::Result;

use crate::kernel::Surface;

/// Texel-by-texel comparison of two surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub tolerance: f32,
    pub max_abs_diff: f32,
    /// Coordinate of the first texel reaching `max_abs_diff`.
    pub worst: Option<(u32, u32)>,
    pub mismatches: usize,
    pub texels: usize,
}

impl Comparison {
    pub fn matches(&self) -> bool {
        self.mismatches == 0
    }
}

pub fn compare(actual: &Surface, expected: &Surface, tolerance: f32) -> Result<Comparison> {
    if actual.extent() != expected.extent() {
        anyhow::bail!(
            "cannot compare surfaces of different extents ({} vs {})",
            actual.extent(),
            expected.extent()
        );
    }

    let width = actual.extent().width;
    let mut comparison = Comparison {
        tolerance,
        max_abs_diff: 0.0,
        worst: None,
        mismatches: 0,
        texels: actual.texels().len(),
    };
    for (index, (a, b)) in actual.texels().iter().zip(expected.texels()).enumerate() {
        let diff = a.max_abs_diff(b);
        if diff > tolerance {
            comparison.mismatches += 1;
        }
        if diff > comparison.max_abs_diff {
            comparison.max_abs_diff = diff;
            let index = index as u32;
            comparison.worst = Some((index % width, index / width));
        }
    }
    Ok(comparison)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extent, Rgba, SurfaceFormat};

    fn surface(width: u32, height: u32) -> Surface {
        Surface::new(
            Extent::new(width, height).unwrap(),
            SurfaceFormat::Rgba32Float,
            Rgba::OPAQUE_BLACK,
        )
    }

    #[test]
    fn identical_surfaces_match() {
        let a = surface(3, 3);
        let comparison = compare(&a, &a.clone(), 0.0).unwrap();
        assert!(comparison.matches());
        assert_eq!(comparison.worst, None);
        assert_eq!(comparison.texels, 9);
    }

    #[test]
    fn reports_worst_texel() {
        let expected = surface(4, 2);
        let mut actual = expected.clone();
        actual.invoke(3, 1);

        let comparison = compare(&actual, &expected, 1e-3).unwrap();
        assert_eq!(comparison.mismatches, 1);
        assert_eq!(comparison.worst, Some((3, 1)));
        assert_eq!(comparison.max_abs_diff, 1.0);
    }

    #[test]
    fn extent_mismatch_is_an_error() {
        assert!(compare(&surface(2, 2), &surface(2, 3), 0.0).is_err());
    }
}
