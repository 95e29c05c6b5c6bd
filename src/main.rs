//! Command line front end for the OPL emulator.
//!
//! Lists the emulated chips, probes song metadata, renders DRO captures to WAV
//! and dumps their register streams as CSV.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use ymf262::container::{parse_dro, ContainerRegistry};
use ymf262::export::{export_to_wav_with_config, ExportConfig};
use ymf262::{version_names, ChipTopology, ChipVersion, PlayerConfig};

#[derive(Parser)]
#[command(name = "opl-render")]
#[command(about = "Render and inspect OPL register captures")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the emulated chip versions
    Chips,

    /// Print name and duration of a song
    Info {
        /// Song file (.dro, .ogg, .oga)
        file: PathBuf,
    },

    /// Render a song to a WAV file
    Render {
        /// Song file
        file: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Player configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Chip to emulate (ym3526, ym3812, ymf262)
        #[arg(long)]
        chip: Option<String>,

        /// Topology override (opl2, dual_opl2, opl3)
        #[arg(long)]
        topology: Option<String>,

        /// Output sample rate in Hz
        #[arg(long)]
        rate: Option<u32>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f32>,

        /// Fade out over the last N seconds
        #[arg(long, default_value_t = 0.0)]
        fade: f32,

        /// Write a mono file
        #[arg(long)]
        mono: bool,

        /// Skip peak normalization
        #[arg(long)]
        no_normalize: bool,
    },

    /// Dump the register writes of a DRO capture as CSV
    Trace {
        /// DRO file
        file: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// One CSV row of a register trace
#[derive(Serialize)]
struct TraceRow {
    at_ms: u64,
    bank: u8,
    register: String,
    value: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Chips => list_chips(),
        Command::Info { file } => print_info(&file),
        Command::Render {
            file,
            output,
            config,
            chip,
            topology,
            rate,
            seconds,
            fade,
            mono,
            no_normalize,
        } => {
            let mut player = match config {
                Some(path) => PlayerConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => PlayerConfig::default(),
            };
            if let Some(name) = chip {
                player.version = ChipVersion::from_name(&name)
                    .with_context(|| format!("unknown chip '{}'", name))?;
            }
            if let Some(name) = topology {
                player.topology = Some(
                    ChipTopology::from_name(&name)
                        .with_context(|| format!("unknown topology '{}'", name))?,
                );
            }
            if let Some(rate) = rate {
                player.sample_rate = rate;
            }
            player.validate()?;

            let mut export = if mono {
                ExportConfig::mono()
            } else {
                ExportConfig::stereo()
            }
            .normalize(!no_normalize)
            .fade_out(fade);
            if let Some(seconds) = seconds {
                export = export.max_duration(seconds);
            }
            render(&file, &output, &player, export)
        }
        Command::Trace { file, output } => trace(&file, &output),
    }
}

fn list_chips() -> Result<()> {
    for (version, label) in ChipVersion::ALL.iter().zip(version_names()) {
        println!("{:<8} {}", version.as_str(), label);
    }
    Ok(())
}

fn print_info(file: &Path) -> Result<()> {
    let info = ContainerRegistry::with_defaults().song_info(file);
    println!("Name:     {}", info.name);
    if info.has_duration() {
        let seconds = info.duration_ms / 1000;
        println!(
            "Duration: {}:{:02}.{:03}",
            seconds / 60,
            seconds % 60,
            info.duration_ms % 1000
        );
    } else {
        println!("Duration: unknown");
    }
    Ok(())
}

fn render(file: &Path, output: &Path, player: &PlayerConfig, export: ExportConfig) -> Result<()> {
    let container = ContainerRegistry::with_defaults()
        .open(file)
        .with_context(|| format!("opening {}", file.display()))?;
    let mut mixer = container.create_mixer(player)?;
    let summary = export_to_wav_with_config(mixer.as_mut(), output, export)?;
    println!(
        "Wrote {} ({} frames, {} Hz, {} ch, peak {:.3})",
        output.display(),
        summary.frames,
        summary.sample_rate,
        summary.channels,
        summary.peak
    );
    Ok(())
}

fn trace(file: &Path, output: &Path) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let song = parse_dro(&data)?;
    if song.writes.is_empty() {
        bail!("{} contains no register writes", file.display());
    }

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    for timed in &song.writes {
        writer.serialize(TraceRow {
            at_ms: timed.at_ms,
            bank: timed.write.bank(),
            register: format!("{:#04x}", timed.write.register()),
            value: format!("{:#04x}", timed.write.value()),
        })?;
    }
    writer.flush()?;

    println!(
        "Wrote {} register writes ({}, {} ms) to {}",
        song.writes.len(),
        song.topology,
        song.duration_ms(),
        output.display()
    );
    Ok(())
}
