//! Colour-effect binder.
//!
//! Effects are thin decorators: each one names a GLSL colour function held by
//! a [`ShaderLibrary`] and gathers the positional arguments that function
//! expects from the current [`FrameContext`]. The flow for one frame is:
//!
//! ```text
//!   host frame tick / resize
//!          │ FrameContext { geometry, timestamp }
//!          ▼
//!   EffectStack::apply ──▶ ColorEffect::shader_call (per decorator)
//!          │
//!          ▼
//!   RenderInstruction { content, passes } ──▶ host resolves against ShaderLibrary
//! ```
//!
//! The binder never checks that a function exists or that its arguments line
//! up; that happens when the host calls [`ShaderLibrary::resolve`].

pub mod argument;
pub mod clock;
pub mod effect;
pub mod geometry;
pub mod instruction;
pub mod library;

pub use argument::{ParamKind, ShaderArgument, Signature};
pub use clock::{ClockSign, EffectClock};
pub use effect::{
    ColorEffect, EffectKind, EffectStack, PlainColor, Redraw, SizeAwareColor, TimeVaryingColor,
    COLOR, SIZE_AWARE_COLOR, TIME_VARYING_COLOR,
};
pub use geometry::{FrameContext, ViewGeometry};
pub use instruction::{RenderInstruction, ShaderCall};
pub use library::{ShaderError, ShaderFunction, ShaderLibrary, MAX_ARGUMENTS};
