//! GPU side of the effect host.
//!
//! - `context` owns the wgpu instance/device and, in windowed mode, the
//!   swapchain surface it reconfigures on resize.
//! - `pipeline` builds one render pipeline per colour function and caches it
//!   by name.
//! - `uniforms` mirrors the `EffectParams` block the fragment prelude declares.
//! - `state` uploads content, resolves render instructions into prepared
//!   passes, and chains them through ping-pong targets into a swapchain
//!   image or an exported PNG.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::{GpuState, PreparedPass};
