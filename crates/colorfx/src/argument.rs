use std::fmt;

use serde::{Deserialize, Serialize};

/// Parameter types a colour function may declare after `(position, color)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Float,
    Float2,
    Float3,
    Float4,
}

impl ParamKind {
    /// Maps a GLSL type name onto a parameter kind.
    pub fn from_glsl(ty: &str) -> Option<Self> {
        match ty {
            "float" => Some(Self::Float),
            "vec2" => Some(Self::Float2),
            "vec3" => Some(Self::Float3),
            "vec4" => Some(Self::Float4),
            _ => None,
        }
    }

    /// Swizzle that extracts this kind from a `vec4` argument slot.
    pub fn swizzle(self) -> &'static str {
        match self {
            Self::Float => ".x",
            Self::Float2 => ".xy",
            Self::Float3 => ".xyz",
            Self::Float4 => "",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => f.write_str("float"),
            Self::Float2 => f.write_str("float2"),
            Self::Float3 => f.write_str("float3"),
            Self::Float4 => f.write_str("float4"),
        }
    }
}

/// One positional argument forwarded to a colour function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ShaderArgument {
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
}

impl ShaderArgument {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Float(_) => ParamKind::Float,
            Self::Float2(_) => ParamKind::Float2,
            Self::Float3(_) => ParamKind::Float3,
            Self::Float4(_) => ParamKind::Float4,
        }
    }

    /// Packs the argument into a std140 `vec4` slot, zero-filling the rest.
    pub fn to_slot(&self) -> [f32; 4] {
        match *self {
            Self::Float(x) => [x, 0.0, 0.0, 0.0],
            Self::Float2([x, y]) => [x, y, 0.0, 0.0],
            Self::Float3([x, y, z]) => [x, y, z, 0.0],
            Self::Float4(v) => v,
        }
    }
}

/// Ordered parameter list of a colour function or a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Signature(pub Vec<ParamKind>);

impl Signature {
    pub fn of(arguments: &[ShaderArgument]) -> Self {
        Self(arguments.iter().map(ShaderArgument::kind).collect())
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, kind) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_zero_fill_unused_components() {
        assert_eq!(ShaderArgument::Float(0.5).to_slot(), [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(
            ShaderArgument::Float2([200.0, 100.0]).to_slot(),
            [200.0, 100.0, 0.0, 0.0]
        );
    }

    #[test]
    fn signature_display_uses_float_names() {
        let signature = Signature::of(&[
            ShaderArgument::Float2([1.0, 2.0]),
            ShaderArgument::Float(3.0),
        ]);
        assert_eq!(signature.to_string(), "float2, float");
        assert_eq!(Signature::default().to_string(), "");
    }

    #[test]
    fn glsl_types_map_onto_kinds() {
        let kinds: Vec<_> = ["float", "vec2", "vec3", "vec4"]
            .into_iter()
            .map(|ty| ParamKind::from_glsl(ty).expect("known type"))
            .collect();
        assert_eq!(
            kinds,
            [ParamKind::Float, ParamKind::Float2, ParamKind::Float3, ParamKind::Float4]
        );
        assert!(ParamKind::from_glsl("mat4").is_none());
    }
}
