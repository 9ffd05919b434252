use std::path::PathBuf;

use fxconfig::{ContentConfig, FxConfig};
use renderer::{ContentSource, RenderMode, RendererConfig};

use crate::cli::EffectArgs;

const DEFAULT_SURFACE_SIZE: (u32, u32) = (800, 600);

pub fn content_source(content: &ContentConfig) -> ContentSource {
    match content {
        ContentConfig::Image { path } => ContentSource::Image { path: path.clone() },
        ContentConfig::Solid { color } => ContentSource::Solid { color: *color },
        ContentConfig::Checker { cell } => ContentSource::Checker { cell: *cell },
    }
}

/// Layers command-line flags over the config file over built-in defaults.
///
/// `fallback_shader_dir` is used only when neither the flags nor the file
/// name a shader directory, and only if it exists.
pub fn renderer_config(
    file: &FxConfig,
    args: &EffectArgs,
    mode: RenderMode,
    fallback_shader_dir: Option<PathBuf>,
) -> RendererConfig {
    let effects = if args.no_effects {
        Vec::new()
    } else if !args.effects.is_empty() {
        args.effects.clone()
    } else {
        file.effects.clone()
    };
    let content = args.content.as_ref().unwrap_or(&file.content);
    let shader_dir = args
        .shader_dir
        .clone()
        .or_else(|| file.shader_dir.clone())
        .or_else(|| fallback_shader_dir.filter(|dir| dir.is_dir()));

    RendererConfig {
        surface_size: args.size.or(file.size).unwrap_or(DEFAULT_SURFACE_SIZE),
        mode,
        effects,
        clock: args.clock.unwrap_or(file.clock),
        content: content_source(content),
        shader_dir,
        target_fps: args.fps.or(file.fps),
        color_space: args.color_space,
    }
}

#[cfg(test)]
mod tests {
    use colorfx::{ClockSign, EffectKind};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn flags_override_file_values() {
        let file = FxConfig {
            effects: vec![EffectKind::Color],
            clock: ClockSign::Reverse,
            size: Some((640, 480)),
            fps: Some(30.0),
            ..FxConfig::default()
        };
        let args = EffectArgs {
            effects: vec![EffectKind::SizeAware],
            size: Some((200, 100)),
            clock: Some(ClockSign::Forward),
            ..EffectArgs::default()
        };
        let config = renderer_config(&file, &args, RenderMode::Windowed, None);
        assert_eq!(config.effects, vec![EffectKind::SizeAware]);
        assert_eq!(config.surface_size, (200, 100));
        assert_eq!(config.clock, ClockSign::Forward);
        assert_eq!(config.target_fps, Some(30.0));
    }

    #[test]
    fn file_values_fill_missing_flags() {
        let file = FxConfig {
            effects: vec![EffectKind::Color, EffectKind::TimeVarying],
            content: ContentConfig::Solid {
                color: [0.0, 0.0, 1.0, 1.0],
            },
            ..FxConfig::default()
        };
        let config = renderer_config(&file, &EffectArgs::default(), RenderMode::Windowed, None);
        assert_eq!(
            config.effects,
            vec![EffectKind::Color, EffectKind::TimeVarying]
        );
        assert_eq!(config.surface_size, DEFAULT_SURFACE_SIZE);
        assert_eq!(
            config.content,
            ContentSource::Solid {
                color: [0.0, 0.0, 1.0, 1.0]
            }
        );
    }

    #[test]
    fn no_effects_flag_clears_the_stack() {
        let args = EffectArgs {
            no_effects: true,
            ..EffectArgs::default()
        };
        let config = renderer_config(&FxConfig::default(), &args, RenderMode::Windowed, None);
        assert!(config.effects.is_empty());
    }

    #[test]
    fn fallback_shader_dir_requires_existing_directory() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("missing");
        let config = renderer_config(
            &FxConfig::default(),
            &EffectArgs::default(),
            RenderMode::Windowed,
            Some(missing),
        );
        assert!(config.shader_dir.is_none());

        let config = renderer_config(
            &FxConfig::default(),
            &EffectArgs::default(),
            RenderMode::Windowed,
            Some(root.path().to_path_buf()),
        );
        assert_eq!(config.shader_dir.as_deref(), Some(root.path()));
    }
}
