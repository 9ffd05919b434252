use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colorfx::{ClockSign, EffectKind};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Only configuration layout understood by this build.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Content the effects are applied to.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentConfig {
    Image {
        path: PathBuf,
    },
    Solid {
        color: [f32; 4],
    },
    Checker {
        #[serde(default = "default_checker_cell")]
        cell: u32,
    },
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self::Checker {
            cell: default_checker_cell(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FxConfig {
    pub version: u32,
    /// Decorators applied to the content, outermost last.
    #[serde(default = "default_effects")]
    pub effects: Vec<EffectKind>,
    #[serde(default)]
    pub clock: ClockSign,
    #[serde(
        default,
        deserialize_with = "deserialize_size_opt",
        serialize_with = "serialize_size_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<(u32, u32)>,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default)]
    pub shader_dir: Option<PathBuf>,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing
    )]
    pub still_time: Option<Duration>,
    #[serde(default)]
    pub content: ContentConfig,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            effects: default_effects(),
            clock: ClockSign::default(),
            size: None,
            fps: None,
            shader_dir: None,
            still_time: None,
            content: ContentConfig::default(),
        }
    }
}

impl FxConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: FxConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config file; relative paths inside it resolve
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        if let Some(fps) = self.fps {
            check_fps(fps).map_err(ConfigError::Invalid)?;
        }
        match &self.content {
            ContentConfig::Checker { cell } if *cell == 0 => {
                return Err(ConfigError::Invalid(
                    "checker cell size must be greater than zero".into(),
                ));
            }
            ContentConfig::Solid { color } if color.iter().any(|c| !(0.0..=1.0).contains(c)) => {
                return Err(ConfigError::Invalid(
                    "solid colour components must lie within 0.0-1.0".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn rebase(&mut self, base: &Path) {
        if let Some(dir) = self.shader_dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if let ContentConfig::Image { path } = &mut self.content {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

fn default_effects() -> Vec<EffectKind> {
    vec![EffectKind::TimeVarying]
}

fn default_checker_cell() -> u32 {
    32
}

/// Parses `WIDTHxHEIGHT` with both dimensions non-zero.
/// Accepts a frame rate whose frame interval is representable as a `Duration`.
pub fn check_fps(fps: f32) -> Result<f32, String> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(format!("fps must be a positive number, got {fps}"));
    }
    Duration::try_from_secs_f32(1.0 / fps)
        .map(|_| fps)
        .map_err(|_| format!("fps {fps} is too low"))
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width in size '{value}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height in size '{value}'"))?;
    if width == 0 || height == 0 {
        return Err("size dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<(u32, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_size(&value).map_err(de::Error::custom))
        .transpose()
}

fn serialize_size_opt<S>(size: &Option<(u32, u32)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match size {
        Some((w, h)) => serializer.serialize_str(&format!("{w}x{h}")),
        None => serializer.serialize_none(),
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("duration {v} is out of range: {err}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
effects = ["size-aware", "time-varying"]
clock = "reverse"
size = "800x600"
fps = 30
shader_dir = "shaders"
still_time = "1s 500ms"

[content]
kind = "solid"
color = [0.2, 0.4, 0.6, 1.0]
"#;

    #[test]
    fn parses_sample_config() {
        let config = FxConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(
            config.effects,
            vec![EffectKind::SizeAware, EffectKind::TimeVarying]
        );
        assert_eq!(config.clock, ClockSign::Reverse);
        assert_eq!(config.size, Some((800, 600)));
        assert_eq!(config.fps, Some(30.0));
        assert_eq!(config.still_time, Some(Duration::from_millis(1500)));
        assert_eq!(
            config.content,
            ContentConfig::Solid {
                color: [0.2, 0.4, 0.6, 1.0]
            }
        );
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = FxConfig::from_toml_str("version = 1").expect("parse config");
        assert_eq!(config.effects, vec![EffectKind::TimeVarying]);
        assert_eq!(config.clock, ClockSign::Forward);
        assert_eq!(config.content, ContentConfig::Checker { cell: 32 });
        assert!(config.size.is_none());
    }

    #[test]
    fn accepts_numeric_still_time() {
        let config = FxConfig::from_toml_str("version = 1\nstill_time = 0.25").unwrap();
        assert_eq!(config.still_time, Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_unknown_effect() {
        let err = FxConfig::from_toml_str("version = 1\neffects = [\"blur\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_wrong_version() {
        let err = FxConfig::from_toml_str("version = 2").unwrap_err();
        assert!(err.to_string().contains("unsupported config version 2"));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(FxConfig::from_toml_str("version = 1\nsize = \"0x600\"").is_err());
    }

    #[test]
    fn rejects_non_positive_fps() {
        let err = FxConfig::from_toml_str("version = 1\nfps = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_fps_without_representable_interval() {
        let err = FxConfig::from_toml_str("version = 1\nfps = 1e-39").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(check_fps(1e-30).is_err());
        assert_eq!(check_fps(0.5).unwrap(), 0.5);
    }

    #[test]
    fn rejects_unbounded_still_time() {
        assert!(FxConfig::from_toml_str("version = 1\nstill_time = inf").is_err());
        assert!(FxConfig::from_toml_str("version = 1\nstill_time = 1e20").is_err());
        assert!(FxConfig::from_toml_str("version = 1\nstill_time = nan").is_err());
    }

    #[test]
    fn rejects_empty_checker_cell() {
        let config = "version = 1\n[content]\nkind = \"checker\"\ncell = 0";
        assert!(FxConfig::from_toml_str(config).is_err());
    }

    #[test]
    fn rebases_relative_paths_on_load() {
        let mut config = FxConfig::from_toml_str(
            "version = 1\nshader_dir = \"glsl\"\n[content]\nkind = \"image\"\npath = \"art.png\"",
        )
        .unwrap();
        config.rebase(Path::new("/etc/fxview"));
        assert_eq!(config.shader_dir, Some(PathBuf::from("/etc/fxview/glsl")));
        assert_eq!(
            config.content,
            ContentConfig::Image {
                path: PathBuf::from("/etc/fxview/art.png")
            }
        );
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280X720").unwrap(), (1280, 720));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("axb").is_err());
    }
}
