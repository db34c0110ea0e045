use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use sector_piano::config::PianoConfig;
use sector_piano::core::geometry::CameraIntrinsics;
use sector_piano::core::instrument::orchestrate::{orchestrate, parse_melody};
use sector_piano::core::notes::NoteMapper;
use sector_piano::core::scene::SyntheticScene;
use sector_piano::core::{Instrument, ToneGenerator};
use sector_piano::utils::helpers::{
    amplitude_to_db, format_distance, format_frequency, format_time, peak_amplitude, write_wav,
};

mod cli;

use cli::{Args, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Play {
            config,
            seconds,
            fps,
            noise,
        } => play(config.as_deref(), seconds, fps, noise),
        Command::Render {
            output,
            config,
            seconds,
        } => render(&output, config.as_deref(), seconds),
        Command::Table { config } => table(config.as_deref()),
        Command::Orchestrate {
            notes,
            bpm,
            play,
            config,
        } => orchestrate_melody(&notes, bpm, play, config.as_deref()),
        Command::InitConfig { output, force } => init_config(output.as_deref(), force),
    }
}

fn play(config_path: Option<&Path>, seconds: f32, fps: f32, noise: f32) -> Result<()> {
    let config = PianoConfig::load_or_default(config_path)?;
    let intrinsics = CameraIntrinsics::default();
    let mut instrument = Instrument::from_config(&config, intrinsics)?;
    let scene = SyntheticScene::for_config(&config, intrinsics).with_noise(noise, 0.0);

    let mut generator = ToneGenerator::new(config.synth.clone())?;
    generator.start().context("Failed to start audio output")?;

    let fps = if fps > 0.0 { fps } else { 30.0 };
    let frame_period = Duration::from_secs_f32(1.0 / fps);
    let started = Instant::now();
    let mut last_notes = Vec::new();
    let mut index = 0u64;

    while started.elapsed().as_secs_f32() < seconds {
        let t = index as f32 / fps;
        let output = instrument.process_frame(&scene.frame_at(t)?)?;
        generator.set_target_frequencies(&output.frequencies());

        let notes = output.notes();
        if notes != last_notes {
            let line: Vec<String> = output
                .readings
                .iter()
                .map(|r| format!("{}: {}", r.name, r.note.unwrap_or("-")))
                .collect();
            println!("{}", line.join("  "));
            last_notes = notes;
        }

        index += 1;
        let next = frame_period * index as u32;
        if let Some(wait) = next.checked_sub(started.elapsed()) {
            thread::sleep(wait);
        }
    }

    generator.set_target_frequencies(&[]);
    // Let the release fade finish before closing the device
    thread::sleep(Duration::from_secs_f32(config.synth.buffer_duration() * 4.0));
    generator.stop();

    if generator.render_faults() > 0 {
        log::warn!("{} audio buffer(s) were replaced by silence", generator.render_faults());
    }
    Ok(())
}

fn render(output: &Path, config_path: Option<&Path>, seconds: f32) -> Result<()> {
    let config = PianoConfig::load_or_default(config_path)?;
    let intrinsics = CameraIntrinsics::default();
    let mut instrument = Instrument::from_config(&config, intrinsics)?;
    let scene = SyntheticScene::for_config(&config, intrinsics);

    let samples = scene.perform(&mut instrument, &config.synth, seconds)?;
    write_wav(output, &samples, config.synth.sample_rate)?;

    println!(
        "Wrote {} of audio to {} (peak {:.1} dB, {} frames)",
        format_time(samples.len() as f32 / config.synth.sample_rate as f32),
        output.display(),
        amplitude_to_db(peak_amplitude(&samples)),
        instrument.stats().frames()
    );
    Ok(())
}

fn table(config_path: Option<&Path>) -> Result<()> {
    let config = PianoConfig::load_or_default(config_path)?;
    let instrument = Instrument::from_config(&config, CameraIntrinsics::default())?;

    for sector in instrument.sectors() {
        println!("{}", sector.name());
        // Nearest (highest) note first
        for range in sector.mapper().ranges().iter().rev() {
            let frequency = sector
                .mapper()
                .frequency_from_distance(range.midpoint())
                .unwrap_or(0.0);
            println!(
                "  {:<4} {:>10}  {} .. {}",
                range.note,
                format_frequency(frequency),
                format_distance(range.min),
                format_distance(range.max)
            );
        }
    }
    Ok(())
}

fn orchestrate_melody(notes: &str, bpm: f32, play: bool, config_path: Option<&Path>) -> Result<()> {
    let config = PianoConfig::load_or_default(config_path)?;
    let instrument = Instrument::from_config(&config, CameraIntrinsics::default())?;
    let melody = parse_melody(notes);
    if melody.is_empty() {
        bail!("Melody is empty");
    }

    let plan = orchestrate(&melody, &instrument);
    println!("Melody orchestration:");
    for item in &plan {
        match (&item.sector, item.distance_m, item.frequency) {
            (Some(sector), Some(distance), Some(frequency)) => println!(
                "  {:<4} {:<10} {:>10}  {}",
                item.note,
                sector,
                format_frequency(frequency),
                format_distance(distance)
            ),
            _ => println!("  {:<4} (rest)", item.note),
        }
    }

    if !play {
        return Ok(());
    }

    let mut generator = ToneGenerator::new(config.synth.clone())?;
    generator.start().context("Failed to start audio output")?;
    for item in &plan {
        match item.frequency {
            Some(frequency) => {
                info!("Playing {} at {}", item.note, format_frequency(frequency));
                generator.set_target_frequencies(&[frequency]);
            }
            None => generator.set_target_frequencies(&[]),
        }
        thread::sleep(item.duration(bpm));
    }
    generator.set_target_frequencies(&[]);
    thread::sleep(Duration::from_secs_f32(config.synth.buffer_duration() * 4.0));
    generator.stop();
    Ok(())
}

fn init_config(output: Option<&Path>, force: bool) -> Result<()> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PianoConfig::default_path()?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    PianoConfig::default().save_to_file(&path)?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}
