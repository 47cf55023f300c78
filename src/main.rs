use chaos_midi::config::RunConfig;
use chaos_midi::coordinator::{Coordinator, RunSummary};
use chaos_midi::event_log::EventLog;
use chaos_midi::plot::{PlotFeed, PlotPoint, PlotterThread};
use chaos_midi::sink::{MidiFileSink, SinkSet};
use chaos_midi::{Error, Result};

use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use log::{error, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "chaos-midi")]
#[command(about = "Note sequences from logistic and Hénon map trajectories")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run configuration (JSON); missing fields use the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// RNG seed; overrides the config seed. Time-based when neither is given.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Also write every emitted message to a JSONL event log
    #[arg(long, global = true)]
    log_events: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Sonify the logistic bifurcation diagram into a MIDI file
    Bifurcation {
        #[arg(long, default_value = "out.mid")]
        out: PathBuf,
    },
    /// Play the bifurcation diagram on the first MIDI output while recording it
    Live {
        #[arg(long, default_value = "out.mid")]
        out: PathBuf,
    },
    /// Play radially expanding Hénon orbits on the first MIDI output
    Henon {
        /// Also record the performance to this MIDI file
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip the MIDI output device (record/plot only)
        #[arg(long)]
        no_device: bool,

        /// Stream orbit points to an OSC scatter viewer (e.g., 127.0.0.1:9000)
        #[arg(long)]
        plot: Option<String>,
    },
    /// List available MIDI output ports
    Devices,
    /// Write the effective configuration as JSON
    Config { path: PathBuf },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    info!("═══════════════════════════════════════════════");
    info!("  CHAOS MIDI v{}", env!("CARGO_PKG_VERSION"));
    info!("  Tempo: {} BPM, {} ticks/beat, {} notes/s",
          config.tempo.bpm, config.tempo.ticks_per_beat, config.tempo.iterations_per_second);
    info!("═══════════════════════════════════════════════");

    match cli.command {
        Command::Devices => list_devices(),
        Command::Config { ref path } => config.save(path),
        Command::Bifurcation { ref out } => {
            config.validate()?;
            let mut sinks = SinkSet::new();
            sinks.push(Box::new(MidiFileSink::new(out, config.tempo)));
            attach_event_log(&mut sinks, &cli, "bifurcation", &config)?;
            let rng = seeded_rng(&cli, &config);
            Coordinator::new(config, sinks, rng).run_bifurcation()?;
            Ok(())
        }
        Command::Live { ref out } => {
            config.validate()?;
            let mut sinks = SinkSet::new();
            attach_device(&mut sinks, &config)?;
            sinks.push(Box::new(MidiFileSink::new(out, config.tempo)));
            attach_event_log(&mut sinks, &cli, "live-bifurcation", &config)?;
            let rng = seeded_rng(&cli, &config);
            Coordinator::new(config, sinks, rng).run_bifurcation()?;
            Ok(())
        }
        Command::Henon {
            ref out,
            no_device,
            ref plot,
        } => {
            config.validate()?;
            let mut sinks = SinkSet::new();
            if !no_device {
                attach_device(&mut sinks, &config)?;
            }
            if let Some(out) = out {
                sinks.push(Box::new(MidiFileSink::new(out, config.tempo)));
            }
            attach_event_log(&mut sinks, &cli, "henon", &config)?;
            if sinks.is_empty() && plot.is_none() {
                warn!("No device, recording or plot selected; the run will be silent");
            }
            let rng = seeded_rng(&cli, &config);
            run_henon(config, sinks, rng, plot.clone())?;
            Ok(())
        }
    }
}

fn run_henon(
    config: RunConfig,
    sinks: SinkSet,
    rng: ChaCha8Rng,
    plot_target: Option<String>,
) -> Result<RunSummary> {
    let mut coordinator = Coordinator::new(config, sinks, rng);

    // ─── Plot viewer (opt-in) ───────────────────────────────────────────
    let mut plotter = None;
    if let Some(target) = plot_target {
        let (tx, rx) = bounded::<PlotPoint>(4096);
        coordinator = coordinator.with_plot(PlotFeed::new(tx));
        plotter = Some(PlotterThread::spawn(rx, target)?);
    }

    let result = coordinator.run_henon();
    // Dropping the coordinator closes the plot feed so the plotter can exit
    drop(coordinator);
    if let Some(plotter) = plotter {
        plotter.join();
    }
    result
}

fn seeded_rng(cli: &Cli, config: &RunConfig) -> ChaCha8Rng {
    let seed = cli.seed.or(config.seed).unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    });
    info!("Seed: {}", seed);
    ChaCha8Rng::seed_from_u64(seed)
}

fn attach_event_log(sinks: &mut SinkSet, cli: &Cli, program: &str, config: &RunConfig) -> Result<()> {
    if let Some(path) = &cli.log_events {
        sinks.push(Box::new(EventLog::create(path, program, config.tempo)?));
    }
    Ok(())
}

#[cfg(feature = "device")]
fn attach_device(sinks: &mut SinkSet, config: &RunConfig) -> Result<()> {
    use chaos_midi::device::open_default_port;
    use chaos_midi::sink::DeviceSink;

    let port = open_default_port()?;
    let label = format!("device:{}", port.name());
    sinks.push(Box::new(DeviceSink::new(port, label, config.tempo)));
    Ok(())
}

#[cfg(not(feature = "device"))]
fn attach_device(_sinks: &mut SinkSet, _config: &RunConfig) -> Result<()> {
    Err(Error::ResourceUnavailable(
        "built without MIDI device support; rebuild with `--features device`".into(),
    ))
}

#[cfg(feature = "device")]
fn list_devices() -> Result<()> {
    let names = chaos_midi::device::output_port_names()?;
    if names.is_empty() {
        return Err(Error::ResourceUnavailable("No MIDI output devices found".into()));
    }
    for (i, name) in names.iter().enumerate() {
        println!("{}: {}", i, name);
    }
    Ok(())
}

#[cfg(not(feature = "device"))]
fn list_devices() -> Result<()> {
    Err(Error::ResourceUnavailable(
        "built without MIDI device support; rebuild with `--features device`".into(),
    ))
}
