use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

/// Workgroup edge used when the caller does not pick one.
pub const DEFAULT_WORKGROUP_EDGE: u32 = 8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("surface extent must be non-zero, got {width}x{height}")]
    EmptyExtent { width: u32, height: u32 },
    #[error("workgroup size must be non-zero, got {x}x{y}")]
    EmptyWorkgroup { x: u32, y: u32 },
    #[error("dispatch grid must be non-zero, got {x}x{y}")]
    EmptyGrid { x: u32, y: u32 },
    #[error("dispatch grid {grid_x}x{grid_y} covers {covered_x}x{covered_y} invocations; surface is {width}x{height}")]
    GridTooSmall {
        grid_x: u32,
        grid_y: u32,
        covered_x: u64,
        covered_y: u64,
        width: u32,
        height: u32,
    },
    #[error("dispatch grid {grid_x}x{grid_y} with workgroup {workgroup_x}x{workgroup_y} exceeds u64 invocations")]
    GridOverflow {
        grid_x: u32,
        grid_y: u32,
        workgroup_x: u32,
        workgroup_y: u32,
    },
    #[error("expected WIDTHxHEIGHT, got '{0}'")]
    MalformedPair(String),
    #[error("invalid number '{value}' in '{input}'")]
    InvalidNumber { input: String, value: String },
    #[error("unknown surface format '{0}'; expected rgba8unorm or rgba32float")]
    UnknownFormat(String),
    #[error("expected four comma-separated channels R,G,B,A, got '{0}'")]
    MalformedColor(String),
    #[error("color channel {value} is outside [0, 1]")]
    ChannelOutOfRange { value: f32 },
}

/// Dimensions of the output surface in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Result<Self, ValidationError> {
        if width == 0 || height == 0 {
            return Err(ValidationError::EmptyExtent { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    pub(crate) fn to_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Extent {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (width, height) = parse_pair(value)?;
        Self::new(width, height)
    }
}

/// One texel as four normalized channels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const OPAQUE_BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn channels(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_channels(channels: [f32; 4]) -> Self {
        Self::new(channels[0], channels[1], channels[2], channels[3])
    }

    /// Rounds each channel to the nearest 8-bit step, as a unorm store would.
    pub fn quantize_unorm8(&self) -> Self {
        Self::from_channels(self.to_unorm8().map(|c| c as f32 / 255.0))
    }

    pub fn to_unorm8(&self) -> [u8; 4] {
        self.channels()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Largest absolute per-channel difference against `other`.
    pub fn max_abs_diff(&self, other: &Rgba) -> f32 {
        self.channels()
            .iter()
            .zip(other.channels().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

/// Color written to every texel before the kernel runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor(pub Rgba);

impl Default for ClearColor {
    fn default() -> Self {
        Self(Rgba::OPAQUE_BLACK)
    }
}

impl FromStr for ClearColor {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(ValidationError::MalformedColor(value.to_string()));
        }
        let mut channels = [0.0f32; 4];
        for (slot, part) in channels.iter_mut().zip(parts) {
            *slot = part
                .parse::<f32>()
                .map_err(|_| ValidationError::InvalidNumber {
                    input: value.to_string(),
                    value: part.to_string(),
                })?;
        }
        Self::from_channels(channels)
    }
}

impl ClearColor {
    pub fn from_channels(channels: [f32; 4]) -> Result<Self, ValidationError> {
        if let Some(&value) = channels.iter().find(|c| !(0.0..=1.0).contains(*c)) {
            return Err(ValidationError::ChannelOutOfRange { value });
        }
        Ok(Self(Rgba::from_channels(channels)))
    }
}

/// Storage format of the GPU surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceFormat {
    #[default]
    Rgba8Unorm,
    Rgba32Float,
}

impl SurfaceFormat {
    /// Spelling used in WGSL storage texture declarations.
    pub fn wgsl_name(self) -> &'static str {
        match self {
            SurfaceFormat::Rgba8Unorm => "rgba8unorm",
            SurfaceFormat::Rgba32Float => "rgba32float",
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        match self {
            SurfaceFormat::Rgba8Unorm => 4,
            SurfaceFormat::Rgba32Float => 16,
        }
    }

    pub(crate) fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            SurfaceFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            SurfaceFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Widest per-channel error expected between two backends storing into this format.
    ///
    /// Unorm stores may land one step either side of the exact rounding.
    pub fn default_tolerance(self) -> f32 {
        match self {
            SurfaceFormat::Rgba8Unorm => 1.5 / 255.0,
            SurfaceFormat::Rgba32Float => 1e-5,
        }
    }

    /// Applies the precision loss of this format to a texel.
    pub fn store(self, texel: Rgba) -> Rgba {
        match self {
            SurfaceFormat::Rgba8Unorm => texel.quantize_unorm8(),
            SurfaceFormat::Rgba32Float => texel,
        }
    }
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wgsl_name())
    }
}

impl FromStr for SurfaceFormat {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rgba8unorm" | "rgba8" | "unorm" => Ok(SurfaceFormat::Rgba8Unorm),
            "rgba32float" | "rgba32f" | "float" => Ok(SurfaceFormat::Rgba32Float),
            _ => Err(ValidationError::UnknownFormat(value.to_string())),
        }
    }
}

/// Local size of one compute workgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    pub fn new(x: u32, y: u32) -> Result<Self, ValidationError> {
        if x == 0 || y == 0 {
            return Err(ValidationError::EmptyWorkgroup { x, y });
        }
        Ok(Self { x, y })
    }

    pub fn invocations(&self) -> u32 {
        self.x.saturating_mul(self.y)
    }
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        Self {
            x: DEFAULT_WORKGROUP_EDGE,
            y: DEFAULT_WORKGROUP_EDGE,
        }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl FromStr for WorkgroupSize {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (x, y) = parse_pair(value)?;
        Self::new(x, y)
    }
}

/// Number of workgroups dispatched along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub x: u32,
    pub y: u32,
}

impl DispatchGrid {
    pub fn new(x: u32, y: u32) -> Result<Self, ValidationError> {
        if x == 0 || y == 0 {
            return Err(ValidationError::EmptyGrid { x, y });
        }
        Ok(Self { x, y })
    }

    /// Smallest grid whose invocations cover every texel of `extent`.
    pub fn covering(extent: Extent, workgroup: WorkgroupSize) -> Self {
        Self {
            x: extent.width.div_ceil(workgroup.x),
            y: extent.height.div_ceil(workgroup.y),
        }
    }

    /// Invocation grid dimensions along x and y.
    pub fn invocation_extent(&self, workgroup: WorkgroupSize) -> (u64, u64) {
        (
            self.x as u64 * workgroup.x as u64,
            self.y as u64 * workgroup.y as u64,
        )
    }

    /// Total invocations, or `None` when the count does not fit in `u64`.
    pub fn checked_invocations(&self, workgroup: WorkgroupSize) -> Option<u64> {
        let (x, y) = self.invocation_extent(workgroup);
        x.checked_mul(y)
    }

    /// Total invocations, saturating at `u64::MAX`.
    pub fn invocations(&self, workgroup: WorkgroupSize) -> u64 {
        let (x, y) = self.invocation_extent(workgroup);
        x.saturating_mul(y)
    }

    /// Fails when some texel of `extent` would never be invoked, or when the
    /// invocation count cannot be represented.
    pub fn check_covers(
        &self,
        extent: Extent,
        workgroup: WorkgroupSize,
    ) -> Result<(), ValidationError> {
        let (covered_x, covered_y) = self.invocation_extent(workgroup);
        if covered_x < extent.width as u64 || covered_y < extent.height as u64 {
            return Err(ValidationError::GridTooSmall {
                grid_x: self.x,
                grid_y: self.y,
                covered_x,
                covered_y,
                width: extent.width,
                height: extent.height,
            });
        }
        if self.checked_invocations(workgroup).is_none() {
            return Err(ValidationError::GridOverflow {
                grid_x: self.x,
                grid_y: self.y,
                workgroup_x: workgroup.x,
                workgroup_y: workgroup.y,
            });
        }
        Ok(())
    }
}

impl fmt::Display for DispatchGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl FromStr for DispatchGrid {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (x, y) = parse_pair(value)?;
        Self::new(x, y)
    }
}

/// Which implementation of the kernel runs the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Gpu,
    Cpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Gpu => f.write_str("gpu"),
            Backend::Cpu => f.write_str("cpu"),
        }
    }
}

/// GPU power preference used when selecting an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

impl GpuPowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Summary of the adapter that ran (or could run) the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub driver: String,
    pub max_texture_dimension_2d: u32,
    pub max_compute_workgroup_size_x: u32,
    pub max_compute_workgroup_size_y: u32,
    pub max_compute_invocations_per_workgroup: u32,
    pub max_compute_workgroups_per_dimension: u32,
    /// Software rasterizer such as llvmpipe or WARP.
    pub is_software: bool,
}

impl AdapterProfile {
    pub(crate) fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
            driver: info.driver.clone(),
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_compute_workgroup_size_x: limits.max_compute_workgroup_size_x,
            max_compute_workgroup_size_y: limits.max_compute_workgroup_size_y,
            max_compute_invocations_per_workgroup: limits.max_compute_invocations_per_workgroup,
            max_compute_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
            is_software: is_software_device(info.device_type),
        }
    }
}

fn is_software_device(device_type: wgpu::DeviceType) -> bool {
    matches!(device_type, wgpu::DeviceType::Cpu)
}

fn parse_pair(value: &str) -> Result<(u32, u32), ValidationError> {
    let trimmed = value.trim();
    let (a, b) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| ValidationError::MalformedPair(value.to_string()))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidNumber {
                input: value.to_string(),
                value: part.trim().to_string(),
            })
    };
    Ok((parse(a)?, parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extent_and_rejects_zero() {
        assert_eq!("640x480".parse::<Extent>().unwrap(), Extent::new(640, 480).unwrap());
        assert_eq!(" 7X3 ".parse::<Extent>().unwrap(), Extent::new(7, 3).unwrap());
        assert_eq!(
            "0x10".parse::<Extent>(),
            Err(ValidationError::EmptyExtent {
                width: 0,
                height: 10
            })
        );
        assert!(matches!(
            "640".parse::<Extent>(),
            Err(ValidationError::MalformedPair(_))
        ));
        assert!(matches!(
            "axb".parse::<Extent>(),
            Err(ValidationError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn covering_grid_rounds_up() {
        let extent = Extent::new(17, 8).unwrap();
        let grid = DispatchGrid::covering(extent, WorkgroupSize::default());
        assert_eq!(grid, DispatchGrid { x: 3, y: 1 });
        assert_eq!(grid.invocations(WorkgroupSize::default()), 24 * 8);
        assert!(grid.check_covers(extent, WorkgroupSize::default()).is_ok());
    }

    #[test]
    fn undersized_grid_is_rejected() {
        let extent = Extent::new(64, 64).unwrap();
        let grid = DispatchGrid::new(4, 8).unwrap();
        assert!(matches!(
            grid.check_covers(extent, WorkgroupSize::default()),
            Err(ValidationError::GridTooSmall { covered_x: 32, .. })
        ));
    }

    #[test]
    fn overflowing_grid_is_rejected() {
        let extent = Extent::new(1, 1).unwrap();
        let grid = DispatchGrid::new(u32::MAX, u32::MAX).unwrap();
        let workgroup = WorkgroupSize::default();

        assert_eq!(grid.checked_invocations(workgroup), None);
        assert_eq!(grid.invocations(workgroup), u64::MAX);
        assert!(matches!(
            grid.check_covers(extent, workgroup),
            Err(ValidationError::GridOverflow { grid_x: u32::MAX, .. })
        ));

        let large = DispatchGrid::new(u32::MAX, 1).unwrap();
        assert!(large.check_covers(extent, WorkgroupSize::new(1, 1).unwrap()).is_ok());
    }

    #[test]
    fn only_cpu_devices_count_as_software() {
        assert!(is_software_device(wgpu::DeviceType::Cpu));
        assert!(!is_software_device(wgpu::DeviceType::DiscreteGpu));
        assert!(!is_software_device(wgpu::DeviceType::VirtualGpu));
    }

    #[test]
    fn clear_color_parses_and_checks_range() {
        let color: ClearColor = "0, 0.5, 1, 1".parse().unwrap();
        assert_eq!(color.0, Rgba::new(0.0, 0.5, 1.0, 1.0));
        assert!(matches!(
            "0,0,0".parse::<ClearColor>(),
            Err(ValidationError::MalformedColor(_))
        ));
        assert!(matches!(
            "0,0,2,1".parse::<ClearColor>(),
            Err(ValidationError::ChannelOutOfRange { .. })
        ));
    }

    #[test]
    fn unorm_quantization_rounds_to_nearest_step() {
        let texel = Rgba::new(0.5, 1.0 / 3.0, 1.0, 0.0);
        assert_eq!(texel.to_unorm8(), [128, 85, 255, 0]);
        let stored = SurfaceFormat::Rgba8Unorm.store(texel);
        assert_eq!(stored.r, 128.0 / 255.0);
        assert_eq!(SurfaceFormat::Rgba32Float.store(texel), texel);
    }

    #[test]
    fn format_names_round_trip() {
        for format in [SurfaceFormat::Rgba8Unorm, SurfaceFormat::Rgba32Float] {
            assert_eq!(format.wgsl_name().parse::<SurfaceFormat>().unwrap(), format);
        }
        assert!("bgra8unorm".parse::<SurfaceFormat>().is_err());
    }
}
