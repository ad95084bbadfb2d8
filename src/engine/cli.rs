//! CLI command handler: resolve settings (defaults → worldconv.toml → flags), then run one conversion.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::apply_opt;
use crate::engine::arg_parser::Cli;
use crate::engine::progress::{CliListener, create_progress_bar, spawn_reporter};
use crate::formats::{ChunkDirSink, ChunkDirSource, LevelInfoCopier, NukkitToAnvil};
use crate::pipeline::{ConverterConfig, WorldConverter};
use crate::types::{Resolution, RunOutcome};
use crate::utils::config::{PackagePaths, QueueConsts, WorkerThreadLimits};
use crate::utils::config_toml::{load_file, load_from_dir};
use crate::utils::setup_logging;

/// Effective run settings after merging defaults, config file and flags.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub threads: usize,
    pub write_threads: Option<usize>,
    pub convert_queue_factor: usize,
    pub write_queue_factor: usize,
    pub on_error: Resolution,
    pub verbose: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            threads: WorkerThreadLimits::current().stage_threads(),
            write_threads: None,
            convert_queue_factor: QueueConsts::CONVERT_QUEUE_FACTOR,
            write_queue_factor: QueueConsts::WRITE_QUEUE_FACTOR,
            on_error: Resolution::StopKeepData,
            verbose: false,
        }
    }
}

impl RunSettings {
    pub fn converter_config(&self) -> ConverterConfig {
        let mut config = ConverterConfig::with_workers(self.threads);
        if let Some(n) = self.write_threads {
            config.write_workers = n.max(1);
        }
        config.with_queue_factors(self.convert_queue_factor, self.write_queue_factor)
    }
}

/// Defaults, then `--config` (or `worldconv.toml` in SRC), then command-line flags.
pub fn resolve_settings(cli: &Cli) -> Result<RunSettings> {
    let file = match &cli.config {
        Some(path) => Some(load_file(path)?),
        None => load_from_dir(&cli.src, PackagePaths::get().config_filename()),
    };
    let mut settings = RunSettings::default();
    if let Some(file) = file {
        let f = file.settings;
        apply_opt!(f, settings, threads => threads);
        if f.write_threads.is_some() {
            settings.write_threads = f.write_threads;
        }
        apply_opt!(f, settings, convert_queue_factor => convert_queue_factor);
        apply_opt!(f, settings, write_queue_factor => write_queue_factor);
        apply_opt!(f, settings, on_error => on_error);
        apply_opt!(f, settings, verbose => verbose);
    }
    apply_opt!(cli, settings, threads => threads);
    if cli.write_threads.is_some() {
        settings.write_threads = cli.write_threads;
    }
    apply_opt!(cli, settings, convert_queue_factor => convert_queue_factor);
    apply_opt!(cli, settings, write_queue_factor => write_queue_factor);
    apply_opt!(cli, settings, on_error => on_error);
    apply_opt!(cli, settings, verbose => verbose);
    Ok(settings)
}

/// Convert SRC into DST. Ctrl+C stops submitting chunks and drains what is queued.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let settings = resolve_settings(cli)?;
    setup_logging(settings.verbose);
    let config = settings.converter_config();
    debug!("{} CONFIG: {:#?}", PackagePaths::get().pkg_name().to_uppercase(), config);

    let source = ChunkDirSource::open(&cli.src)?;
    let sink = ChunkDirSink::create(&cli.dst)?;
    let level_info = LevelInfoCopier::new(&cli.src, &cli.dst);
    let converter = WorldConverter::new(level_info, source, NukkitToAnvil, sink, config);

    let interrupt = converter.interrupt_handle();
    ctrlc::set_handler(move || interrupt.store(true, Ordering::Release))
        .context("set Ctrl+C handler")?;

    let bar = settings.verbose.then(|| create_progress_bar("Converting"));
    let (stop_reporter, reporter) = spawn_reporter(converter.progress(), bar.clone());
    let listener = Arc::new(CliListener::new(settings.on_error, bar));

    let result = converter.convert(Arc::clone(&listener));
    drop(stop_reporter);
    let _ = reporter.join();
    listener.finish_bar();
    let report = result?;

    info!(
        "Conversion {}: {} chunks submitted, {} failed",
        report.outcome, report.submitted, report.failures
    );
    if report.interrupted {
        warn!("Run was interrupted before every chunk was converted");
    }
    match report.outcome {
        RunOutcome::Completed => Ok(()),
        RunOutcome::CompletedWithPartialOutput => {
            warn!("Level info was not copied; {} holds partial output", cli.dst.display());
            Ok(())
        }
        RunOutcome::CompletedWithDiscardedOutput => {
            anyhow::bail!("conversion stopped and output was discarded")
        }
    }
}
