//! Impairment Sim - Command Line Entry Point
//!
//! Parses an effect source, applies an optional configuration document,
//! enables the requested effects and syncs them into a headless pipeline,
//! printing the resulting schema and stage order.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use impairment_sim::effects::headless::HeadlessPipeline;
use impairment_sim::effects::{EffectManager, EffectRegistry, EffectSourceProvider, EffectsConfig, SyncReport};
use impairment_sim::settings::AppPreferences;
use impairment_sim::shaders::{includes_file, load_effect_source, ShaderWatcher, BUILTIN_EFFECTS};
use impairment_sim::telemetry::{init_logging, LogConfig};
use impairment_sim::{FileSourceProvider, StaticSourceProvider};

const USAGE: &str = "usage: impairment-sim [effects.glsl] [--import cfg.json] [--export cfg.json] [--enable Name]... [--watch]";

/// How often the watcher is polled in `--watch` mode
const WATCH_INTERVAL: Duration = Duration::from_millis(200);

type BoxError = Box<dyn std::error::Error>;

/// Parsed command line
#[derive(Debug, Default)]
struct CliArgs {
    source: Option<PathBuf>,
    import: Option<PathBuf>,
    export: Option<PathBuf>,
    enable: Vec<String>,
    watch: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| args.next().ok_or_else(|| format!("{flag} needs a value"));
            match arg.as_str() {
                "--import" => parsed.import = Some(PathBuf::from(value("--import")?)),
                "--export" => parsed.export = Some(PathBuf::from(value("--export")?)),
                "--enable" => parsed.enable.push(value("--enable")?),
                "--watch" => parsed.watch = true,
                "-h" | "--help" => return Err(String::new()),
                flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
                _ if parsed.source.is_none() => parsed.source = Some(PathBuf::from(arg)),
                _ => return Err(format!("unexpected argument {arg}")),
            }
        }

        Ok(parsed)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut preferences = AppPreferences::load();

    // Keep the guard alive for the program duration
    let _log_guard = match init_logging(&LogConfig::from_preferences(&preferences)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{message}");
            }
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    tracing::info!("Impairment Sim v{}", env!("CARGO_PKG_VERSION"));

    let source_path = args.source.clone().or_else(|| preferences.get_effect_source());
    let result = match &source_path {
        Some(path) => {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let sources = FileSourceProvider::new(dir).with_shared_source(path);
            match load_effect_source(path) {
                Ok(text) => run(&args, &mut preferences, &text, Some(path.as_path()), sources).await,
                Err(e) => Err(e.into()),
            }
        }
        None => {
            tracing::info!("No effect source given, using built-in effects");
            let sources = StaticSourceProvider::with_fallback(BUILTIN_EFFECTS);
            run(&args, &mut preferences, BUILTIN_EFFECTS, None, sources).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run<F: EffectSourceProvider>(
    args: &CliArgs,
    preferences: &mut AppPreferences,
    source: &str,
    source_path: Option<&Path>,
    sources: F,
) -> Result<(), BoxError> {
    let registry = EffectRegistry::from_source(source);
    let mut manager = EffectManager::new(registry, HeadlessPipeline::new(), sources);

    if let Some(path) = &args.import {
        let config = EffectsConfig::import_from_path(path)?;
        manager.import_config(&config);
        preferences.set_last_config(path);
    }

    for name in &args.enable {
        if let Err(e) = manager.set_enabled(name, true) {
            tracing::warn!("{e}");
        }
    }

    let report = manager.sync().await;
    print_schema(manager.registry());
    print_report(&report);

    if let Some(path) = &args.export {
        manager.export_config().export_to_path(path)?;
        tracing::info!("Exported configuration to {}", path.display());
        preferences.set_last_config(path);
    }

    let watch = args.watch || preferences.hot_reload;
    match (watch, source_path) {
        (true, Some(path)) => watch_source(&mut manager, path).await,
        (true, None) => {
            tracing::warn!("Nothing to watch: built-in effects are in use");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Follow source edits until interrupted: a change to the shared source
/// re-parses the schema, a change to a per-effect file re-fetches sources
async fn watch_source<F: EffectSourceProvider>(
    manager: &mut EffectManager<HeadlessPipeline, F>,
    path: &Path,
) -> Result<(), BoxError> {
    let mut watcher = ShaderWatcher::new(path)?;
    loop {
        tokio::time::sleep(WATCH_INTERVAL).await;
        let changed = watcher.poll();
        if changed.is_empty() {
            continue;
        }

        if includes_file(&changed, path) {
            match load_effect_source(path) {
                Ok(text) => manager.reload_source(&text),
                Err(e) => {
                    tracing::warn!("Reload skipped: {e}");
                    continue;
                }
            }
        } else {
            manager.invalidate_sources();
        }

        let report = manager.sync().await;
        print_report(&report);
    }
}

fn print_schema(registry: &EffectRegistry) {
    for effect in registry.iter() {
        let state = if effect.is_enabled() {
            format!("enabled #{}", effect.order_index())
        } else {
            "disabled".to_string()
        };
        println!("{} ({}) [{state}]", effect.display_name(), effect.binding_name());

        for uniform in effect.parameters() {
            let array = uniform
                .array_length()
                .map(|n| format!("[{n}]"))
                .unwrap_or_default();
            let range = match uniform.dropdown_options() {
                Some(options) => format!("one of {}", options.join(" | ")),
                None => format!(
                    "{} .. {}{}",
                    uniform.min().to_json(),
                    uniform.max().to_json(),
                    uniform.step().map(|s| format!(" step {s}")).unwrap_or_default()
                ),
            };
            println!(
                "    {} {}{array} = {}  ({range})",
                uniform.declared_type,
                uniform.name,
                uniform.value_to_json()
            );
        }
    }
}

fn print_report(report: &SyncReport) {
    println!("pipeline ({:?}): [{}]", report.mode, report.stages.join(" -> "));
    if !report.failed.is_empty() {
        println!("missing sources: {}", report.failed.join(", "));
    }
}
