//! Arcanee player binary.

// crate-specific lint exceptions:
//#![allow()]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use arc_config::{Config, HostSettings};
use arc_runtime::Runtime;
use arc_tracing::{error, Dispatch, LevelFilter, RingBufferSink, StderrSink};

#[derive(Parser, Debug)]
#[command(name = "arc-player", about = "Runs an Arcanee cartridge")]
struct Args {
    /// Cartridge directory (dev layout) or .arc archive.
    cartridge: PathBuf,

    /// Unlock the dev namespace and verbose diagnostics.
    #[arg(long)]
    dev: bool,

    /// Start in borderless fullscreen.
    #[arg(long)]
    fullscreen: bool,

    /// Log verbosely.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let dispatch = Dispatch::global();
    dispatch.add_sink(Arc::new(StderrSink));
    // Crash-report ring; dumped on fatal errors.
    let ring = Arc::new(RingBufferSink::new(1024));
    dispatch.add_sink(ring.clone());
    arc_tracing::set_max_level(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(err) => {
            error!("configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match Runtime::new(&settings, &args.cartridge) {
        Ok(runtime) => match runtime.run() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("runtime error: {}", err);
                dump_ring(&ring);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!("failed to start: {}", err);
            dump_ring(&ring);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(args: &Args) -> arc_config::Result<HostSettings> {
    let config = Config::load()?;
    let mut settings = HostSettings::from_config(&config)?;
    settings.dev_mode |= args.dev;
    settings.window.fullscreen |= args.fullscreen;
    Ok(settings)
}

/// Replays the buffered log tail so crash output carries context.
fn dump_ring(ring: &RingBufferSink) {
    let records = ring.snapshot();
    if records.is_empty() {
        return;
    }
    eprintln!("--- last {} log lines ---", records.len());
    for record in records {
        eprintln!(
            "[{:10.3}] [{:6}] {:5} {}",
            record.time,
            record.frame,
            record.level.as_str(),
            record.message
        );
    }
}
