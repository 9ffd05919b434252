use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use colorfx::{ClockSign, EffectKind, RenderInstruction};
use fxconfig::FxConfig;
use renderer::{build_library, plan_frame, ContentSource, RenderMode, Renderer};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::bindings::renderer_config;
use crate::cli::{Cli, Command, EffectArgs, ExportArgs, InspectArgs, ShadersArgs};
use crate::paths::AppPaths;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved fxview paths");
    let file = load_config(cli.config.as_deref(), &paths)?;

    match cli.command {
        Command::Preview(args) => preview(&file, &args, &paths),
        Command::Export(args) => export(&file, args, &paths),
        Command::Inspect(args) => inspect(&file, &args, &paths),
        Command::Shaders(args) => list_shaders(&file, &args, &paths),
    }
}

/// Logs go to stderr so `inspect` output on stdout stays machine-readable.
fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<FxConfig> {
    if let Some(path) = explicit {
        tracing::debug!(path = %path.display(), "loading configuration");
        return FxConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    let default = paths.config_file();
    if default.is_file() {
        tracing::debug!(path = %default.display(), "loading default configuration");
        FxConfig::load(&default)
            .with_context(|| format!("failed to load configuration from {}", default.display()))
    } else {
        tracing::debug!(path = %default.display(), "no configuration file; using defaults");
        Ok(FxConfig::default())
    }
}

fn preview(file: &FxConfig, args: &EffectArgs, paths: &AppPaths) -> Result<()> {
    let config = renderer_config(file, args, RenderMode::Windowed, Some(paths.shader_dir()));
    let library = build_library(config.shader_dir.as_deref())?;
    tracing::info!(
        effects = ?config.effects,
        clock = %config.clock,
        width = config.surface_size.0,
        height = config.surface_size.1,
        "opening preview window"
    );
    Renderer::new(config, library).run()
}

fn export(file: &FxConfig, args: ExportArgs, paths: &AppPaths) -> Result<()> {
    let time = args.time.or(file.still_time).unwrap_or(Duration::ZERO);
    let mode = RenderMode::Export {
        path: args.output,
        time,
    };
    let config = renderer_config(file, &args.effects, mode, Some(paths.shader_dir()));
    let library = build_library(config.shader_dir.as_deref())?;
    Renderer::new(config, library).run()
}

#[derive(Serialize)]
struct InspectReport<'a> {
    size: (u32, u32),
    time: f64,
    clock: ClockSign,
    effects: &'a [EffectKind],
    instruction: RenderInstruction<ContentSource>,
}

fn inspect(file: &FxConfig, args: &InspectArgs, paths: &AppPaths) -> Result<()> {
    let time = args.time.or(file.still_time).unwrap_or(Duration::ZERO);
    let config = renderer_config(
        file,
        &args.effects,
        RenderMode::Windowed,
        Some(paths.shader_dir()),
    );
    let library = build_library(config.shader_dir.as_deref())?;
    let instruction = plan_frame(&config, &library, time)?;
    let report = InspectReport {
        size: config.surface_size,
        time: time.as_secs_f64(),
        clock: config.clock,
        effects: &config.effects,
        instruction,
    };
    let json =
        serde_json::to_string_pretty(&report).context("failed to serialise render instruction")?;
    println!("{json}");
    Ok(())
}

fn list_shaders(file: &FxConfig, args: &ShadersArgs, paths: &AppPaths) -> Result<()> {
    let shader_dir = args
        .shader_dir
        .clone()
        .or_else(|| file.shader_dir.clone())
        .or_else(|| Some(paths.shader_dir()).filter(|dir| dir.is_dir()));
    let library = build_library(shader_dir.as_deref())?;
    for function in library.functions() {
        println!(
            "{}({})\t{}",
            function.name(),
            function.signature(),
            function.origin()
        );
    }
    Ok(())
}
