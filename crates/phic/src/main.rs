//! Headless chart inspector and autoplay runner.

mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use phi_config::PlayConfig;
use phi_input::{HitOutcome, PlayField, autoplay_script, play_script};
use phi_model::{Chart, decode_chart_file};
use phi_scene::{group_simultaneous_notes, precompute_first_visible};

use crate::report::{ChartInfo, SceneSample};

#[derive(Parser)]
#[command(name = "phic", about = "Inspect and autoplay rhythm game charts", version)]
struct Args {
    /// Play config JSON; defaults are used when omitted
    #[arg(long, global = true, env = "PHIC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print chart format, metadata and note counts
    Info {
        chart: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print line transforms and visible notes at one instant
    Sample {
        chart: PathBuf,
        /// Chart time in seconds
        #[arg(long, default_value = "0")]
        time: f64,
        #[arg(long)]
        json: bool,
    },
    /// Autoplay the chart through the judge and print the result
    Play {
        chart: PathBuf,
        /// Simulation frame rate; overrides the config
        #[arg(long)]
        fps: Option<u32>,
        /// Also print every judgment event
        #[arg(long)]
        events: bool,
        #[arg(long)]
        json: bool,
    },
    /// Write the effective config to a file
    WriteConfig { output: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = PlayConfig::read_or_default(args.config.as_deref())?;

    match args.command {
        Command::Info { chart, json } => {
            let chart = load_chart(&chart, &config)?;
            let info = ChartInfo::of(&chart);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
        }
        Command::Sample { chart, time, json } => {
            let chart = load_chart(&chart, &config)?;
            let sample = SceneSample::at(&chart, time, &config.kinematics_options());
            if json {
                println!("{}", serde_json::to_string_pretty(&sample)?);
            } else {
                print_sample(&sample);
            }
        }
        Command::Play {
            chart,
            fps,
            events,
            json,
        } => {
            let chart = load_chart(&chart, &config)?;
            let fps = fps.unwrap_or(config.fps).clamp(1, 1000);
            run_autoplay(&chart, &config, fps, events, json)?;
        }
        Command::WriteConfig { output } => {
            config.write(&output)?;
            log::info!("wrote config to {}", output.display());
        }
    }
    Ok(())
}

fn load_chart(path: &Path, config: &PlayConfig) -> Result<Chart> {
    let viewport = config.viewport();
    let mut chart = decode_chart_file(path, viewport, config.parse_options())
        .with_context(|| format!("failed to load chart {}", path.display()))?;
    group_simultaneous_notes(&mut chart.notes);
    precompute_first_visible(&mut chart, viewport, &config.kinematics_options());
    log::info!(
        "loaded {} chart: {} lines, {} notes",
        chart.format.name(),
        chart.lines.len(),
        chart.notes.len()
    );
    Ok(chart)
}

fn run_autoplay(chart: &Chart, config: &PlayConfig, fps: u32, events: bool, json: bool) -> Result<()> {
    let options = config.kinematics_options();
    let viewport = config.viewport();
    let script = autoplay_script(chart, &options, viewport);
    let mut field = PlayField::new(
        chart,
        viewport,
        config.judge.clone(),
        config.input.clone(),
        options,
    );
    let hits = play_script(&mut field, &script, f64::from(fps), chart.duration + 1.0);
    let summary = field.summary();

    if json {
        let out = if events {
            serde_json::json!({ "summary": summary, "events": hits })
        } else {
            serde_json::to_value(&summary)?
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if events {
        for e in &hits {
            println!(
                "{:>9.4}  note {:>4}  {:?} {:?}",
                e.time, e.note, e.note_kind, e.outcome
            );
        }
        println!();
    }
    let misses = hits.iter().filter(|e| e.outcome == HitOutcome::Miss).count();
    if misses > 0 {
        log::warn!("autoplay missed {misses} notes");
    }
    println!("Score:    {:07}", summary.score);
    println!("Classic:  {:07}", summary.classic_score);
    println!("Accuracy: {:.2}%", summary.accuracy);
    println!("Combo:    {}/{}", summary.max_combo, summary.total);
    println!(
        "Perfect {}  Good {}  Bad {}  Miss {}",
        summary.counts.perfect, summary.counts.good, summary.counts.bad, summary.counts.miss
    );
    println!("Early {}  Late {}", summary.early, summary.late);
    if summary.is_all_perfect() {
        println!("ALL PERFECT");
    } else if summary.is_full_combo() {
        println!("FULL COMBO");
    }
    Ok(())
}

fn print_info(info: &ChartInfo) {
    println!("Format:   {:?} (version {})", info.format, info.meta.version);
    if !info.meta.name.is_empty() {
        println!("Name:     {}", info.meta.name);
    }
    if !info.meta.level.is_empty() {
        println!("Level:    {}", info.meta.level);
    }
    if !info.meta.composer.is_empty() {
        println!("Composer: {}", info.meta.composer);
    }
    if !info.meta.charter.is_empty() {
        println!("Charter:  {}", info.meta.charter);
    }
    println!("Offset:   {:.3}s", info.offset);
    println!("Duration: {:.3}s", info.duration);
    println!("Lines:    {}", info.lines);
    println!(
        "Notes:    {} ({} judged, {} simultaneous)",
        info.notes, info.judgeable, info.multi_hit
    );
    println!(
        "          tap {}  drag {}  hold {}  flick {}",
        info.taps, info.drags, info.holds, info.flicks
    );
}

fn print_sample(sample: &SceneSample) {
    println!("t = {:.4}s", sample.time);
    for l in &sample.lines {
        println!(
            "line {:>3}  ({:>8.2}, {:>8.2})  rot {:>7.3}  alpha {:.3}  scroll {:.2}",
            l.index, l.x, l.y, l.rotation, l.opacity, l.scroll
        );
    }
    for n in &sample.notes {
        let marker = if n.decorative { " fake" } else { "" };
        match n.tail {
            Some((tx, ty)) => println!(
                "note {:>4}  line {:>3}  {:?} head ({:.2}, {:.2}) tail ({:.2}, {:.2}){marker}",
                n.id, n.line, n.kind, n.head.0, n.head.1, tx, ty
            ),
            None => println!(
                "note {:>4}  line {:>3}  {:?} at ({:.2}, {:.2}){marker}",
                n.id, n.line, n.kind, n.head.0, n.head.1
            ),
        }
    }
}
