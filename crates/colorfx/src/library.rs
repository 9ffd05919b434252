//! Name-indexed registry of GLSL colour functions.
//!
//! A colour function is any definition shaped like
//!
//! ```glsl
//! vec4 name(vec2 position, vec4 color, <params>) { ... }
//! ```
//!
//! where each extra parameter is `float`, `vec2`, `vec3` or `vec4`. Functions
//! are discovered and validated when a source is registered; call sites are
//! checked against the recorded signature in [`ShaderLibrary::resolve`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::argument::{ParamKind, Signature};
use crate::instruction::ShaderCall;

/// Argument slots available to a colour function beyond `(position, color)`.
pub const MAX_ARGUMENTS: usize = 8;

const COLOR_SOURCE: &str = include_str!("../shaders/color.glsl");
const SIZE_AWARE_SOURCE: &str = include_str!("../shaders/size_aware_color.glsl");
const TIME_VARYING_SOURCE: &str = include_str!("../shaders/time_varying_color.glsl");

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("shader function `{0}` is not registered")]
    UnknownShader(String),
    #[error("shader function `{name}` expects ({expected}) but was called with ({found})")]
    ArgumentMismatch {
        name: String,
        expected: Signature,
        found: Signature,
    },
    #[error("shader function `{name}` from {origin} is already registered from {existing}")]
    DuplicateShader {
        name: String,
        origin: String,
        existing: String,
    },
    #[error("parameter `{parameter}` of `{name}` has unsupported type `{ty}`")]
    UnsupportedParameter {
        name: String,
        parameter: String,
        ty: String,
    },
    #[error("shader function `{name}` declares {count} parameters; at most {max} are supported")]
    TooManyParameters {
        name: String,
        count: usize,
        max: usize,
    },
    #[error("{origin} does not declare any colour function")]
    NoColorFunction { origin: String },
    #[error("failed to read shader source at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A registered colour function.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderFunction {
    name: String,
    signature: Signature,
    source: Arc<str>,
    origin: String,
}

impl ShaderFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters after the implicit `(position, color)` pair.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Full GLSL source the function was declared in, helpers included.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    functions: BTreeMap<String, ShaderFunction>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding `color`, `sizeAwareColor` and `timeVaryingColor`.
    pub fn with_builtins() -> Self {
        let mut library = Self::new();
        for (origin, source) in [
            ("builtin:color.glsl", COLOR_SOURCE),
            ("builtin:size_aware_color.glsl", SIZE_AWARE_SOURCE),
            ("builtin:time_varying_color.glsl", TIME_VARYING_SOURCE),
        ] {
            library
                .register_source(origin, source)
                .unwrap_or_else(|err| panic!("bundled shader {origin} is invalid: {err}"));
        }
        library
    }

    /// Registers every colour function declared in `source`.
    ///
    /// Nothing is registered when any function in the source is rejected.
    pub fn register_source(
        &mut self,
        origin: &str,
        source: &str,
    ) -> Result<Vec<String>, ShaderError> {
        let declarations = scan_color_functions(source)?;
        if declarations.is_empty() {
            return Err(ShaderError::NoColorFunction {
                origin: origin.to_string(),
            });
        }

        for (index, declaration) in declarations.iter().enumerate() {
            let existing = self
                .functions
                .get(&declaration.name)
                .map(|function| function.origin.clone())
                .or_else(|| {
                    declarations[..index]
                        .iter()
                        .any(|earlier| earlier.name == declaration.name)
                        .then(|| origin.to_string())
                });
            if let Some(existing) = existing {
                return Err(ShaderError::DuplicateShader {
                    name: declaration.name.clone(),
                    origin: origin.to_string(),
                    existing,
                });
            }
        }

        let shared: Arc<str> = Arc::from(source);
        let mut names = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            debug!(
                name = %declaration.name,
                signature = %declaration.signature,
                origin,
                "registered colour function"
            );
            names.push(declaration.name.clone());
            self.functions.insert(
                declaration.name.clone(),
                ShaderFunction {
                    name: declaration.name,
                    signature: declaration.signature,
                    source: Arc::clone(&shared),
                    origin: origin.to_string(),
                },
            );
        }
        Ok(names)
    }

    /// Registers every `*.glsl` file in `dir`, in file-name order.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ShaderError> {
        let io_error = |source| ShaderError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("glsl") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registered = 0;
        for path in paths {
            let source = fs::read_to_string(&path).map_err(|source| ShaderError::Io {
                path: path.clone(),
                source,
            })?;
            registered += self
                .register_source(&path.display().to_string(), &source)?
                .len();
        }
        info!(dir = %dir.display(), registered, "loaded user colour functions");
        Ok(registered)
    }

    pub fn get(&self, name: &str) -> Option<&ShaderFunction> {
        self.functions.get(name)
    }

    /// Registered function names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn functions(&self) -> impl Iterator<Item = &ShaderFunction> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Looks up the function a call names and checks the argument list.
    pub fn resolve(&self, call: &ShaderCall) -> Result<&ShaderFunction, ShaderError> {
        let function = self
            .functions
            .get(&call.function)
            .ok_or_else(|| ShaderError::UnknownShader(call.function.clone()))?;
        let found = call.signature();
        if found != function.signature {
            return Err(ShaderError::ArgumentMismatch {
                name: function.name.clone(),
                expected: function.signature.clone(),
                found,
            });
        }
        Ok(function)
    }
}

#[derive(Debug)]
struct Declaration {
    name: String,
    signature: Signature,
}

/// Finds `vec4 name(vec2, vec4, ...) {` definitions in comment-free source.
fn scan_color_functions(source: &str) -> Result<Vec<Declaration>, ShaderError> {
    let cleaned = strip_comments(source);
    let bytes = cleaned.as_bytes();
    let mut declarations = Vec::new();

    for (start, _) in cleaned.match_indices("vec4") {
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        let rest = &cleaned[start + "vec4".len()..];
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let rest = rest.trim_start();
        let name_len = rest
            .bytes()
            .take_while(|byte| is_ident_byte(*byte))
            .count();
        if name_len == 0 || rest.as_bytes()[0].is_ascii_digit() {
            continue;
        }
        let name = &rest[..name_len];
        let Some(params_and_body) = rest[name_len..].trim_start().strip_prefix('(') else {
            continue;
        };
        let Some(close) = params_and_body.find(')') else {
            continue;
        };
        if !params_and_body[close + 1..].trim_start().starts_with('{') {
            continue;
        }

        let params: Vec<(String, String)> = params_and_body[..close]
            .split(',')
            .map(str::trim)
            .filter(|param| !param.is_empty() && *param != "void")
            .map(split_param)
            .collect();

        let is_color_function = params.len() >= 2
            && params[0].0 == "vec2"
            && params[1].0 == "vec4";
        if !is_color_function {
            continue;
        }

        let extra = &params[2..];
        if extra.len() > MAX_ARGUMENTS {
            return Err(ShaderError::TooManyParameters {
                name: name.to_string(),
                count: extra.len(),
                max: MAX_ARGUMENTS,
            });
        }
        let mut kinds = Vec::with_capacity(extra.len());
        for (ty, parameter) in extra {
            let kind = ParamKind::from_glsl(ty).ok_or_else(|| ShaderError::UnsupportedParameter {
                name: name.to_string(),
                parameter: parameter.clone(),
                ty: ty.clone(),
            })?;
            kinds.push(kind);
        }

        declarations.push(Declaration {
            name: name.to_string(),
            signature: Signature(kinds),
        });
    }

    Ok(declarations)
}

/// Splits `in highp vec2 size` into `("vec2", "size")`.
fn split_param(param: &str) -> (String, String) {
    let tokens: Vec<&str> = param
        .split_whitespace()
        .filter(|token| !matches!(*token, "in" | "const" | "highp" | "mediump" | "lowp"))
        .collect();
    match tokens.as_slice() {
        [.., ty, name] => (ty.to_string(), name.to_string()),
        [ty] => (ty.to_string(), String::new()),
        [] => (String::new(), String::new()),
    }
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }
    out
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
