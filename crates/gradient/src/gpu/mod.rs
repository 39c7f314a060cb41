//! Headless GPU host for the gradient-fill kernel.
//!
//! - `context` owns the wgpu instance/adapter/device and checks a request
//!   against the adapter limits before anything is allocated.
//! - `pipeline` compiles the WGSL kernel into a compute pipeline with a single
//!   storage-texture bind group layout.
//! - `readback` sizes the padded staging buffer and turns mapped bytes back
//!   into texels.
//! - `state` glues everything together: clear, dispatch, copy, map.

mod context;
mod pipeline;
mod readback;
mod state;

pub use context::{enumerate_adapters, HeadlessContext};
pub use pipeline::FillPipeline;
pub use readback::ReadbackLayout;
pub use state::GpuFill;
