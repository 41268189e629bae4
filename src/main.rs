mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use vidtrim::core::time;
use vidtrim::export::{FfmpegExporter, JobHandle, JobOutcome, OutputPathPolicy};
use vidtrim::media::{Asset, AssetProvider};
use vidtrim::{logging, EditEngine, EngineConfig};

fn provider() -> Box<dyn AssetProvider> {
    #[cfg(feature = "native-ffmpeg")]
    {
        Box::new(vidtrim::media::NativeProbe)
    }
    #[cfg(not(feature = "native-ffmpeg"))]
    {
        Box::new(vidtrim::media::FfprobeProvider::new())
    }
}

fn open(input: &Path) -> Result<Arc<dyn Asset>> {
    provider()
        .open(input)
        .with_context(|| format!("Failed to open {}", input.display()))
}

/// Resolve the config. A broken default config file is returned as a warning
/// to log once the subscriber is installed.
fn load_config(cli: &Cli) -> Result<(EngineConfig, Option<vidtrim::EditError>)> {
    let (mut config, ignored) = match &cli.config {
        Some(path) => (EngineConfig::load_from(path)?, None),
        None => EngineConfig::load_or_default(&EngineConfig::default_path()),
    };

    if let Some(dir) = &cli.output_dir {
        config.output = OutputPathPolicy::PerJob { dir: dir.clone() };
    }
    if let Some(preset) = cli.preset {
        config.export.preset = preset;
    }
    if let Some(container) = cli.container {
        config.export.container = container;
    }
    if cli.verbose {
        config.logging.level = "vidtrim=debug,info".to_string();
    }
    Ok((config, ignored))
}

/// Print progress until the job settles; fail unless it completed.
fn wait_for(handle: JobHandle) -> Result<()> {
    handle.subscribe(
        |fraction| eprint!("\rExporting... {:>5.1}%", fraction * 100.0),
        |_| eprintln!(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    match runtime.block_on(handle.wait()) {
        JobOutcome::Completed { output_path } => {
            println!("{}", output_path.display());
            Ok(())
        }
        JobOutcome::Failed(err) => bail!("Export failed: {err}"),
        JobOutcome::Cancelled => bail!("Export was cancelled"),
    }
}

fn print_probe(asset: &dyn Asset) {
    println!("{}", asset.location().display());
    println!("  duration: {}", time::format_time(asset.duration()));
    for stream in asset.streams() {
        println!(
            "  #{} {} {} duration={} time_base={}/{}",
            stream.index,
            stream.kind,
            if stream.codec_name.is_empty() { "?" } else { stream.codec_name.as_str() },
            time::format_time(stream.duration),
            stream.time_base.num,
            stream.time_base.den,
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, ignored) = load_config(&cli)?;
    logging::init_logging(&config.logging);
    if let Some(e) = ignored {
        tracing::warn!("Ignoring config: {}", e);
    }

    match &cli.command {
        Commands::Probe { input } => {
            let asset = open(input)?;
            print_probe(asset.as_ref());
            Ok(())
        }
        Commands::Trim { input, start, end } => {
            let asset = open(input)?;
            let engine = EditEngine::with_config(Arc::new(FfmpegExporter::new()), config);
            let handle = engine.trim_video(&asset, *start, *end)?;
            wait_for(handle)
        }
        Commands::StripAudio { input } => {
            let asset = open(input)?;
            let engine = EditEngine::with_config(Arc::new(FfmpegExporter::new()), config);
            let handle = engine.remove_audio(&asset)?;
            wait_for(handle)
        }
    }
}
