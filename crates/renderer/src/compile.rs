use std::borrow::Cow;
use std::fmt::Write as _;

use anyhow::{bail, Result};
use colorfx::{ShaderFunction, ShaderLibrary, MAX_ARGUMENTS};
use wgpu::naga::ShaderStage;

/// Name of the internal function drawn for instructions without passes.
pub(crate) const PASSTHROUGH: &str = "fx_passthrough";

const PASSTHROUGH_GLSL: &str = r"vec4 fx_passthrough(vec2 position, vec4 currentColor) {
    return currentColor;
}
";

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_checked(
        device,
        "fullscreen triangle vertex",
        Cow::Borrowed(VERTEX_SHADER_GLSL),
        ShaderStage::Vertex,
    )
}

/// Wraps a colour function with the effect prelude and compiles it as GLSL.
pub(crate) fn compile_effect_shader(
    device: &wgpu::Device,
    function: &ShaderFunction,
) -> Result<wgpu::ShaderModule> {
    let wrapped = wrap_color_function(function);
    tracing::trace!(function = function.name(), source = %wrapped, "wrapped colour function");
    compile_checked(
        device,
        function.name(),
        Cow::Owned(wrapped),
        ShaderStage::Fragment,
    )
}

/// Colour function used when an instruction carries no passes.
pub(crate) fn passthrough_function() -> Result<ShaderFunction> {
    let mut library = ShaderLibrary::new();
    library.register_source("builtin:passthrough", PASSTHROUGH_GLSL)?;
    match library.get(PASSTHROUGH) {
        Some(function) => Ok(function.clone()),
        None => bail!("passthrough colour function failed to register"),
    }
}

fn compile_checked(
    device: &wgpu::Device,
    label: &str,
    shader: Cow<'_, str>,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader,
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        bail!("failed to compile shader `{label}`: {error}");
    }
    Ok(module)
}

/// Produces a self-contained GLSL fragment shader around one colour function.
///
/// The colour function's whole source file is inlined (so helpers come
/// along) between the uniform prelude and a generated `main` that samples the content,
/// converts `gl_FragCoord` into logical units and calls the function with
/// its arguments read from the uniform slots in declaration order.
pub(crate) fn wrap_color_function(function: &ShaderFunction) -> String {
    let mut call = format!("{}(fx_position, fx_color", function.name());
    for (slot, kind) in function.signature().params().iter().enumerate() {
        let _ = write!(call, ", fx._args[{slot}]{}", kind.swizzle());
    }
    call.push(')');

    format!(
        "{HEADER_OPEN}{MAX_ARGUMENTS}{HEADER_CLOSE}\n#line 1\n{source}\n{FOOTER_OPEN}    outColor = {call};\n}}\n",
        source = function.source(),
    )
}

/// GLSL prologue injected ahead of every colour function, split around the
/// argument slot count.
///
/// The uniform block layout must match `EffectUniforms` in `gpu/uniforms.rs`:
/// `_surface` carries (physical width, physical height, scale factor, unused)
/// and every argument occupies one `vec4` slot.
const HEADER_OPEN: &str = r"#version 450
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform EffectParams {
    vec4 _surface;
    vec4 _args[";

const HEADER_CLOSE: &str = r"];
} fx;

layout(set = 1, binding = 0) uniform texture2D fx_content_texture;
layout(set = 1, binding = 1) uniform sampler fx_content_sampler;
";

/// Start of the generated entry point; the call line and closing brace follow.
const FOOTER_OPEN: &str = r"void main() {
    vec2 fx_uv = gl_FragCoord.xy / fx._surface.xy;
    vec4 fx_color = texture(sampler2D(fx_content_texture, fx_content_sampler), fx_uv);
    vec2 fx_position = gl_FragCoord.xy / fx._surface.z;
";

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    gl_Position = vec4(positions[vertex_index], 0.0, 1.0);
}
";
