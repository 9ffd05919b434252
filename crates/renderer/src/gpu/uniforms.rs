use bytemuck::{Pod, Zeroable};
use colorfx::{ShaderArgument, MAX_ARGUMENTS};

/// std140 mirror of the `EffectParams` block declared by the fragment prelude.
///
/// `surface` is (physical width, physical height, scale factor, 0). Each
/// argument occupies a full `vec4` slot so the layout never depends on the
/// argument kinds of the function being drawn.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct EffectUniforms {
    pub surface: [f32; 4],
    pub args: [[f32; 4]; MAX_ARGUMENTS],
}

impl EffectUniforms {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.set_surface(width, height, scale_factor);
        uniforms
    }

    pub fn set_surface(&mut self, width: u32, height: u32, scale_factor: f64) {
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor as f32
        } else {
            1.0
        };
        self.surface = [width.max(1) as f32, height.max(1) as f32, scale, 0.0];
    }

    /// Writes `arguments` into consecutive slots and clears the rest.
    pub fn load_arguments(&mut self, arguments: &[ShaderArgument]) {
        if arguments.len() > MAX_ARGUMENTS {
            tracing::warn!(
                count = arguments.len(),
                max = MAX_ARGUMENTS,
                "dropping shader arguments beyond the uniform slot count"
            );
        }
        self.args = [[0.0; 4]; MAX_ARGUMENTS];
        for (slot, argument) in self.args.iter_mut().zip(arguments) {
            *slot = argument.to_slot();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(std::mem::size_of::<EffectUniforms>(), 16 + 16 * MAX_ARGUMENTS);
    }

    #[test]
    fn surface_carries_scale_factor() {
        let uniforms = EffectUniforms::new(400, 200, 2.0);
        assert_eq!(uniforms.surface, [400.0, 200.0, 2.0, 0.0]);
    }

    #[test]
    fn invalid_scale_falls_back_to_one() {
        let uniforms = EffectUniforms::new(0, 0, f64::NAN);
        assert_eq!(uniforms.surface, [1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn arguments_fill_slots_in_order() {
        let mut uniforms = EffectUniforms::new(10, 10, 1.0);
        uniforms.args[3] = [9.0; 4];
        uniforms.load_arguments(&[
            ShaderArgument::Float2([200.0, 100.0]),
            ShaderArgument::Float(0.5),
        ]);
        assert_eq!(uniforms.args[0], [200.0, 100.0, 0.0, 0.0]);
        assert_eq!(uniforms.args[1], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(uniforms.args[3], [0.0; 4]);
    }
}
