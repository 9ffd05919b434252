use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colorfx::{ClockSign, EffectKind};
use fxconfig::ContentConfig;
use renderer::ColorSpaceMode;

#[derive(Parser, Debug)]
#[command(
    name = "fxview",
    author,
    version,
    about = "Preview, export and inspect stacks of GLSL colour effects"
)]
pub struct Cli {
    /// Configuration file; defaults to `config.toml` in the fxview config directory.
    #[arg(long, global = true, env = "FXVIEW_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window that redraws the effect stack live.
    Preview(EffectArgs),
    /// Render a single frame to a PNG file.
    Export(ExportArgs),
    /// Print the render instruction for one frame as JSON without touching the GPU.
    Inspect(InspectArgs),
    /// List registered colour functions and their parameters.
    Shaders(ShadersArgs),
}

/// Options shared by every command that evaluates an effect stack.
#[derive(Args, Debug, Default, Clone)]
pub struct EffectArgs {
    /// Decorator to apply (`color`, `size-aware`, `time-varying`); repeat to stack.
    #[arg(long = "effect", value_name = "KIND", value_parser = parse_effect)]
    pub effects: Vec<EffectKind>,

    /// Draw the content without any decorator.
    #[arg(long, conflicts_with = "effects")]
    pub no_effects: bool,

    /// Surface size in physical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = fxconfig::parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap for animated stacks.
    #[arg(long, value_name = "FPS", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Sign of the elapsed time handed to time-varying effects: `forward` or `reverse`.
    #[arg(long, value_name = "SIGN", value_parser = parse_clock)]
    pub clock: Option<ClockSign>,

    /// Content to decorate: `checker[:CELL]`, `solid:R,G,B[,A]`, `solid:#RRGGBB[AA]`, or `image:PATH`.
    #[arg(long, value_name = "SPEC", value_parser = parse_content)]
    pub content: Option<ContentConfig>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(
        long,
        value_name = "MODE",
        value_parser = parse_color_space,
        default_value = "auto"
    )]
    pub color_space: ColorSpaceMode,

    /// Directory of extra `*.glsl` colour functions.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub effects: EffectArgs,

    /// Destination PNG file.
    #[arg(long, short, value_name = "FILE")]
    pub output: PathBuf,

    /// Time since activation to render at (e.g. `0.5`, `1.5s`, `250ms`).
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub time: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub effects: EffectArgs,

    /// Time since activation to evaluate at (e.g. `0.5`, `1.5s`, `250ms`).
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub time: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct ShadersArgs {
    /// Directory of extra `*.glsl` colour functions.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_effect(value: &str) -> Result<EffectKind, String> {
    value.parse()
}

pub fn parse_clock(value: &str) -> Result<ClockSign, String> {
    value.parse()
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid fps '{value}'"))?;
    fxconfig::check_fps(fps)
}

/// Accepts plain seconds (`0.5`) or a humantime duration (`1s 500ms`).
pub fn parse_time(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time must not be empty".to_string());
    }
    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("time must be a non-negative number, got {trimmed}"));
        }
        return Duration::try_from_secs_f64(seconds)
            .map_err(|_| format!("time {trimmed} is out of range"));
    }
    humantime::parse_duration(trimmed).map_err(|err| format!("invalid time '{trimmed}': {err}"))
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" | "srgb-off" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}

pub fn parse_content(value: &str) -> Result<ContentConfig, String> {
    let trimmed = value.trim();
    let (kind, rest) = match trimmed.split_once(':') {
        Some((kind, rest)) => (kind, Some(rest)),
        None => (trimmed, None),
    };
    match (kind.to_ascii_lowercase().as_str(), rest) {
        ("checker", None) => Ok(ContentConfig::default()),
        ("checker", Some(cell)) => {
            let cell: u32 = cell
                .trim()
                .parse()
                .map_err(|_| format!("invalid checker cell size '{cell}'"))?;
            if cell == 0 {
                return Err("checker cell size must be greater than zero".to_string());
            }
            Ok(ContentConfig::Checker { cell })
        }
        ("solid", Some(color)) => parse_color(color).map(|color| ContentConfig::Solid { color }),
        ("image", Some(path)) if !path.trim().is_empty() => Ok(ContentConfig::Image {
            path: PathBuf::from(path.trim()),
        }),
        _ => Err(format!(
            "invalid content '{trimmed}'; expected checker[:CELL], solid:COLOR, or image:PATH"
        )),
    }
}

fn parse_color(value: &str) -> Result<[f32; 4], String> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return Err(format!("invalid hex colour '{value}'; expected #RRGGBB or #RRGGBBAA"));
        }
        let mut color = [1.0; 4];
        for (index, slot) in color.iter_mut().take(hex.len() / 2).enumerate() {
            let byte = u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16)
                .map_err(|_| format!("invalid hex colour '{value}'"))?;
            *slot = f32::from(byte) / 255.0;
        }
        return Ok(color);
    }

    let components = value
        .split(',')
        .map(|component| {
            component
                .trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid colour component '{component}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let color = match components.as_slice() {
        [r, g, b] => [*r, *g, *b, 1.0],
        [r, g, b, a] => [*r, *g, *b, *a],
        _ => return Err(format!("colour '{value}' needs 3 or 4 components")),
    };
    if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err("colour components must lie within 0.0-1.0".to_string());
    }
    Ok(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_in_seconds_and_humantime() {
        assert_eq!(parse_time("0.5").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_time("1s 500ms").unwrap(), Duration::from_millis(1500));
        assert!(parse_time("-1").is_err());
        assert!(parse_time("soon").is_err());
    }

    #[test]
    fn out_of_range_values_are_usage_errors() {
        assert!(parse_time("1e20").is_err());
        assert!(parse_fps("1e-39").is_err());
        let err = Cli::try_parse_from(["fxview", "inspect", "--time", "1e20"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_content_specs() {
        assert_eq!(parse_content("checker").unwrap(), ContentConfig::default());
        assert_eq!(
            parse_content("checker:8").unwrap(),
            ContentConfig::Checker { cell: 8 }
        );
        assert_eq!(
            parse_content("solid:#ff0000").unwrap(),
            ContentConfig::Solid {
                color: [1.0, 0.0, 0.0, 1.0]
            }
        );
        assert_eq!(
            parse_content("solid:0.5,0.5,0.5,0").unwrap(),
            ContentConfig::Solid {
                color: [0.5, 0.5, 0.5, 0.0]
            }
        );
        assert_eq!(
            parse_content("image:art/photo.png").unwrap(),
            ContentConfig::Image {
                path: PathBuf::from("art/photo.png")
            }
        );
    }

    #[test]
    fn rejects_bad_content_specs() {
        assert!(parse_content("checker:0").is_err());
        assert!(parse_content("solid:2,0,0").is_err());
        assert!(parse_content("solid:#12345").is_err());
        assert!(parse_content("image:").is_err());
        assert!(parse_content("video:clip.mp4").is_err());
    }

    #[test]
    fn parses_fps_and_color_space() {
        assert_eq!(parse_fps("30").unwrap(), 30.0);
        assert!(parse_fps("0").is_err());
        assert_eq!(parse_color_space("SRGB").unwrap(), ColorSpaceMode::Linear);
        assert!(parse_color_space("hdr").is_err());
    }

    #[test]
    fn cli_collects_repeated_effects() {
        let cli = Cli::try_parse_from([
            "fxview",
            "inspect",
            "--effect",
            "size-aware",
            "--effect",
            "time",
            "--size",
            "200x100",
            "--time",
            "0.5",
        ])
        .unwrap();
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect command");
        };
        assert_eq!(
            args.effects.effects,
            vec![EffectKind::SizeAware, EffectKind::TimeVarying]
        );
        assert_eq!(args.effects.size, Some((200, 100)));
        assert_eq!(args.time, Some(Duration::from_millis(500)));
    }

    #[test]
    fn export_requires_output() {
        assert!(Cli::try_parse_from(["fxview", "export"]).is_err());
    }
}
