use serde::Serialize;

use crate::argument::{ShaderArgument, Signature};

/// A named colour function plus the positional arguments to call it with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderCall {
    pub function: String,
    pub arguments: Vec<ShaderArgument>,
}

impl ShaderCall {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: ShaderArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn signature(&self) -> Signature {
        Signature::of(&self.arguments)
    }
}

/// "Draw this content through these colour functions", produced once per frame.
///
/// Passes run in order; each one sees the previous pass's output as its
/// input colour. No passes means the content is drawn unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderInstruction<C> {
    pub content: C,
    pub passes: Vec<ShaderCall>,
}

impl<C> RenderInstruction<C> {
    pub fn new(content: C) -> Self {
        Self {
            content,
            passes: Vec::new(),
        }
    }

    pub fn with_pass(mut self, call: ShaderCall) -> Self {
        self.passes.push(call);
        self
    }

    pub fn is_passthrough(&self) -> bool {
        self.passes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_passes_with_tagged_arguments() {
        let instruction = RenderInstruction::new("content").with_pass(
            ShaderCall::new("timeVaryingColor")
                .with_argument(ShaderArgument::Float2([200.0, 100.0]))
                .with_argument(ShaderArgument::Float(0.5)),
        );
        let json = serde_json::to_value(&instruction).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "content": "content",
                "passes": [{
                    "function": "timeVaryingColor",
                    "arguments": [
                        { "type": "float2", "value": [200.0, 100.0] },
                        { "type": "float", "value": 0.5 }
                    ]
                }]
            })
        );
    }

    #[test]
    fn passes_are_kept_in_push_order() {
        let instruction = RenderInstruction::new(3_u8)
            .with_pass(ShaderCall::new("color"))
            .with_pass(ShaderCall::new("sizeAwareColor"));
        assert_eq!(instruction.content, 3);
        assert_eq!(instruction.passes[0].function, "color");
        assert_eq!(instruction.passes[1].function, "sizeAwareColor");
        assert!(!instruction.is_passthrough());
        assert!(RenderInstruction::new(()).is_passthrough());
    }
}
