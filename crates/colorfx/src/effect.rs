//! The three colour-effect decorators and the stack that composes them.
//!
//! Every decorator is a pure function of the frame context: calling
//! [`ColorEffect::shader_call`] twice with the same context yields the same
//! call. The only retained state is the activation instant held by
//! [`TimeVaryingColor`].

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::argument::ShaderArgument;
use crate::clock::{ClockSign, EffectClock};
use crate::geometry::FrameContext;
use crate::instruction::{RenderInstruction, ShaderCall};

/// Library identifier of the plain colour function.
pub const COLOR: &str = "color";
/// Library identifier of the size-aware colour function.
pub const SIZE_AWARE_COLOR: &str = "sizeAwareColor";
/// Library identifier of the time-varying colour function.
pub const TIME_VARYING_COLOR: &str = "timeVaryingColor";

/// When the host has to re-evaluate an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// Only after geometry changes or an explicit redraw request.
    OnChange,
    /// On every frame the effect stays visible.
    Continuous,
}

/// Capability shared by all decorators: produce this frame's shader binding.
pub trait ColorEffect: fmt::Debug {
    fn shader_call(&self, frame: &FrameContext) -> ShaderCall;

    fn redraw(&self) -> Redraw {
        Redraw::OnChange
    }

    /// Called when the host starts showing the effect.
    fn activate(&mut self, _now: Instant) {}

    /// Wraps `content` in a single-pass instruction for this frame.
    fn augment<C>(&self, content: C, frame: &FrameContext) -> RenderInstruction<C>
    where
        Self: Sized,
    {
        RenderInstruction::new(content).with_pass(self.shader_call(frame))
    }
}

/// Calls `color()` with no extra arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlainColor;

impl ColorEffect for PlainColor {
    fn shader_call(&self, _frame: &FrameContext) -> ShaderCall {
        ShaderCall::new(COLOR)
    }
}

/// Calls `sizeAwareColor(float2 size)` with the current view geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeAwareColor;

impl ColorEffect for SizeAwareColor {
    fn shader_call(&self, frame: &FrameContext) -> ShaderCall {
        ShaderCall::new(SIZE_AWARE_COLOR).with_argument(frame.geometry.as_argument())
    }
}

/// Calls `timeVaryingColor(float2 size, float time)` on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeVaryingColor {
    clock: EffectClock,
}

impl TimeVaryingColor {
    pub fn new(clock: EffectClock) -> Self {
        Self { clock }
    }
}

impl ColorEffect for TimeVaryingColor {
    fn shader_call(&self, frame: &FrameContext) -> ShaderCall {
        let elapsed = self.clock.elapsed_at(frame.timestamp);
        tracing::trace!(
            frame = frame.frame_index,
            elapsed,
            width = frame.geometry.width,
            height = frame.geometry.height,
            "time-varying colour binding"
        );
        ShaderCall::new(TIME_VARYING_COLOR)
            .with_argument(frame.geometry.as_argument())
            .with_argument(ShaderArgument::Float(elapsed))
    }

    fn redraw(&self) -> Redraw {
        Redraw::Continuous
    }

    fn activate(&mut self, now: Instant) {
        self.clock.reactivate(now);
    }
}

/// Selector used by configuration files and the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    #[serde(alias = "plain")]
    Color,
    #[serde(alias = "size")]
    SizeAware,
    #[serde(alias = "time")]
    TimeVarying,
}

impl EffectKind {
    /// Builds the decorator; time-varying effects are activated at `activated_at`.
    pub fn build(self, sign: ClockSign, activated_at: Instant) -> Box<dyn ColorEffect> {
        match self {
            Self::Color => Box::new(PlainColor),
            Self::SizeAware => Box::new(SizeAwareColor),
            Self::TimeVarying => Box::new(TimeVaryingColor::new(EffectClock::activated_at(
                activated_at,
                sign,
            ))),
        }
    }

    /// Library identifier this kind binds to.
    pub fn function(self) -> &'static str {
        match self {
            Self::Color => COLOR,
            Self::SizeAware => SIZE_AWARE_COLOR,
            Self::TimeVarying => TIME_VARYING_COLOR,
        }
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("effect must not be empty".to_string());
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "color" | "plain" => Ok(Self::Color),
            "size-aware" | "size" | "sizeawarecolor" => Ok(Self::SizeAware),
            "time-varying" | "time" | "timevaryingcolor" => Ok(Self::TimeVarying),
            other => Err(format!(
                "unknown effect '{other}'; expected color, size-aware, or time-varying"
            )),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Color => f.write_str("color"),
            Self::SizeAware => f.write_str("size-aware"),
            Self::TimeVarying => f.write_str("time-varying"),
        }
    }
}

/// Ordered decorators applied to one piece of content.
#[derive(Debug, Default)]
pub struct EffectStack {
    effects: Vec<Box<dyn ColorEffect>>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kinds(kinds: &[EffectKind], sign: ClockSign, activated_at: Instant) -> Self {
        Self {
            effects: kinds
                .iter()
                .map(|kind| kind.build(sign, activated_at))
                .collect(),
        }
    }

    pub fn push(&mut self, effect: Box<dyn ColorEffect>) {
        self.effects.push(effect);
    }

    pub fn with(mut self, effect: impl ColorEffect + 'static) -> Self {
        self.effects.push(Box::new(effect));
        self
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Continuous if any decorator needs a redraw every frame.
    pub fn redraw(&self) -> Redraw {
        if self
            .effects
            .iter()
            .any(|effect| effect.redraw() == Redraw::Continuous)
        {
            Redraw::Continuous
        } else {
            Redraw::OnChange
        }
    }

    pub fn activate(&mut self, now: Instant) {
        for effect in &mut self.effects {
            effect.activate(now);
        }
    }

    /// Applies every decorator in push order.
    pub fn apply<C>(&self, content: C, frame: &FrameContext) -> RenderInstruction<C> {
        self.effects
            .iter()
            .fold(RenderInstruction::new(content), |instruction, effect| {
                instruction.with_pass(effect.shader_call(frame))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geometry::ViewGeometry;

    fn frame(width: f32, height: f32, timestamp: Instant) -> FrameContext {
        FrameContext::new(ViewGeometry::new(width, height), timestamp)
    }

    #[test]
    fn plain_color_forwards_no_arguments() {
        let now = Instant::now();
        for (width, height) in [(1.0, 1.0), (200.0, 100.0), (4096.0, 2160.0)] {
            let call = PlainColor.shader_call(&frame(width, height, now));
            assert_eq!(call.function, "color");
            assert!(call.arguments.is_empty());
        }
    }

    #[test]
    fn size_aware_forwards_geometry_in_order() {
        let instruction = SizeAwareColor.augment("content", &frame(200.0, 100.0, Instant::now()));
        assert_eq!(instruction.content, "content");
        assert_eq!(
            instruction.passes,
            vec![ShaderCall::new("sizeAwareColor")
                .with_argument(ShaderArgument::Float2([200.0, 100.0]))]
        );
    }

    #[test]
    fn time_varying_forwards_elapsed_seconds() {
        let start = Instant::now();
        let effect = TimeVaryingColor::new(EffectClock::activated_at(start, ClockSign::Forward));
        let call = effect.shader_call(&frame(320.0, 240.0, start + Duration::from_millis(500)));
        assert_eq!(call.function, "timeVaryingColor");
        assert_eq!(call.arguments.len(), 2);
        assert_eq!(call.arguments[0], ShaderArgument::Float2([320.0, 240.0]));
        match call.arguments[1] {
            ShaderArgument::Float(elapsed) => assert!((elapsed - 0.5).abs() < 1e-6),
            other => panic!("unexpected argument {other:?}"),
        }
    }

    #[test]
    fn time_varying_honours_reverse_sign() {
        let start = Instant::now();
        let effect = TimeVaryingColor::new(EffectClock::activated_at(start, ClockSign::Reverse));
        let call = effect.shader_call(&frame(10.0, 10.0, start + Duration::from_millis(500)));
        match call.arguments[1] {
            ShaderArgument::Float(elapsed) => assert!((elapsed + 0.5).abs() < 1e-6),
            other => panic!("unexpected argument {other:?}"),
        }
    }

    #[test]
    fn time_varying_recomputes_each_frame() {
        let start = Instant::now();
        let effect = TimeVaryingColor::new(EffectClock::activated_at(start, ClockSign::Forward));
        let first = effect.shader_call(&frame(10.0, 10.0, start + Duration::from_secs(1)));
        let second = effect.shader_call(&frame(10.0, 10.0, start + Duration::from_secs(2)));
        assert_ne!(first, second);
    }

    #[test]
    fn identical_inputs_yield_identical_instructions() {
        let start = Instant::now();
        let stack = EffectStack::from_kinds(
            &[EffectKind::Color, EffectKind::SizeAware, EffectKind::TimeVarying],
            ClockSign::Forward,
            start,
        );
        let context = frame(640.0, 480.0, start + Duration::from_millis(250));
        assert_eq!(stack.apply(7_u32, &context), stack.apply(7_u32, &context));
    }

    #[test]
    fn stack_applies_passes_in_push_order() {
        let stack = EffectStack::new().with(SizeAwareColor).with(PlainColor);
        let instruction = stack.apply((), &frame(2.0, 3.0, Instant::now()));
        let names: Vec<_> = instruction
            .passes
            .iter()
            .map(|call| call.function.as_str())
            .collect();
        assert_eq!(names, ["sizeAwareColor", "color"]);
    }

    #[test]
    fn empty_stack_is_passthrough() {
        let instruction = EffectStack::new().apply("base", &frame(1.0, 1.0, Instant::now()));
        assert!(instruction.is_passthrough());
    }

    #[test]
    fn stack_redraw_is_continuous_when_any_effect_animates() {
        let now = Instant::now();
        let still = EffectStack::from_kinds(&[EffectKind::SizeAware], ClockSign::Forward, now);
        assert_eq!(still.redraw(), Redraw::OnChange);
        let animated = EffectStack::from_kinds(
            &[EffectKind::SizeAware, EffectKind::TimeVarying],
            ClockSign::Forward,
            now,
        );
        assert_eq!(animated.redraw(), Redraw::Continuous);
    }

    #[test]
    fn activation_resets_time_varying_clock() {
        let start = Instant::now();
        let mut stack = EffectStack::from_kinds(&[EffectKind::TimeVarying], ClockSign::Forward, start);
        let shown = start + Duration::from_secs(5);
        stack.activate(shown);
        let instruction = stack.apply((), &frame(1.0, 1.0, shown + Duration::from_secs(1)));
        assert_eq!(instruction.passes[0].arguments[1], ShaderArgument::Float(1.0));
    }

    #[test]
    fn parses_effect_kinds() {
        assert_eq!("size-aware".parse::<EffectKind>().unwrap(), EffectKind::SizeAware);
        assert_eq!("Plain".parse::<EffectKind>().unwrap(), EffectKind::Color);
        assert_eq!(
            "timeVaryingColor".parse::<EffectKind>().unwrap(),
            EffectKind::TimeVarying
        );
        assert!("blur".parse::<EffectKind>().is_err());
        assert!("".parse::<EffectKind>().is_err());
    }

    #[test]
    fn kinds_bind_to_library_identifiers() {
        let now = Instant::now();
        for kind in [EffectKind::Color, EffectKind::SizeAware, EffectKind::TimeVarying] {
            let effect = kind.build(ClockSign::Forward, now);
            let call = effect.shader_call(&frame(1.0, 1.0, now));
            assert_eq!(call.function, kind.function());
        }
    }
}
