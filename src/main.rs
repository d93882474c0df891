mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cli::Cli;
use pulseviz::audio::clock::{ManualTime, NullOutput};
use pulseviz::audio::features::AudioMetadata;
use pulseviz::audio::fetch::{is_remote, HttpFetcher};
use pulseviz::audio::source::AudioInput;
use pulseviz::config::{self, Config};
use pulseviz::encode::ffmpeg::{AudioTrack, FfmpegEncoder};
use pulseviz::engine::AudioEngine;
use pulseviz::render::resize::SurfaceSize;
use pulseviz::render::surface::{Rgba, Surface};
use pulseviz::render::text::TextOverlay;
use pulseviz::visual::coordinator::VisualizationCoordinator;
use pulseviz::visual::preset::Preset;
use pulseviz::visual::settings::VisualizationSettings;

struct PresetSlot {
    preset: Preset,
    end_frame: usize,
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    metadata: &'a AudioMetadata,
    envelope: &'a [f32],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect pulseviz.toml / global config
    let cfg = match config::find_config(cli.config.clone()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    // Merge: config values apply only when CLI is at its default
    if cli.width == cli::DEFAULT_WIDTH { cli.width = cfg.output.width; }
    if cli.height == cli::DEFAULT_HEIGHT { cli.height = cfg.output.height; }
    if cli.scale == cli::DEFAULT_SCALE { cli.scale = cfg.output.scale; }
    if cli.fps == cli::DEFAULT_FPS { cli.fps = cfg.output.fps; }
    if cli.crf == cli::DEFAULT_CRF { cli.crf = cfg.output.crf; }
    if cli.codec == cli::DEFAULT_CODEC { cli.codec = cfg.output.codec.clone(); }
    if cli.pix_fmt == cli::DEFAULT_PIX_FMT { cli.pix_fmt = cfg.output.pix_fmt.clone(); }
    if cli.preset == cli::DEFAULT_PRESET { cli.preset = cfg.visual.preset.id().to_string(); }
    if cli.sensitivity == cli::DEFAULT_SENSITIVITY { cli.sensitivity = cfg.visual.sensitivity; }
    if cli.smoothing == cli::DEFAULT_SMOOTHING { cli.smoothing = cfg.visual.smoothing; }
    if cli.bitrate.is_none() {
        cli.bitrate = cfg.output.bitrate.clone();
    }
    if cli.font.is_none() {
        cli.font = cfg.output.font.clone();
    }

    if cli.list_presets {
        println!("Available presets:");
        for preset in Preset::ALL {
            println!("  {:<16} {}", preset.id(), preset.name());
        }
        return Ok(());
    }

    let input = cli.input.clone().context("Input audio file or URL is required")?;
    let audio_input = if is_remote(&input) {
        AudioInput::Url(input.clone())
    } else {
        let path = Path::new(&input);
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }
        AudioInput::from_path(path)?
    };

    let fps = cli.fps.max(1);
    let engine_config = cfg.engine_config();
    let time = ManualTime::new();
    let fetcher = Arc::new(HttpFetcher::new(engine_config.fetch_timeout));
    let mut engine = AudioEngine::with_parts(
        engine_config.clone(),
        fetcher.clone(),
        Box::new(time.clone()),
        Box::new(NullOutput),
    );

    // 1. Decode audio on the load worker
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Loading {}", audio_input.describe()));
    let generation = engine.begin_load(audio_input);
    let metadata = loop {
        match engine.await_load(Duration::from_millis(100)) {
            Some(result) => break result.context("Failed to load audio")?,
            None if engine.pending_load() == Some(generation) => spinner.tick(),
            None => anyhow::bail!("Load #{} was abandoned", generation),
        }
    };
    spinner.finish_and_clear();
    for event in engine.drain_events() {
        log::debug!("{:?}", event);
    }

    log::info!(
        "Track: {} ({}, {}), {:.1}s @ {}Hz, {} ch",
        metadata.display_title().unwrap_or_else(|| "untitled".into()),
        metadata.container_format,
        metadata.codec,
        metadata.duration,
        metadata.sample_rate,
        metadata.channel_count
    );

    // 2. Probe mode
    if cli.probe {
        let envelope = engine.envelope().map(|e| e.samples.as_slice()).unwrap_or(&[]);
        let report = ProbeReport {
            metadata: &metadata,
            envelope,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // 3. Render range
    let start = if cli.start.is_finite() { cli.start.clamp(0.0, metadata.duration) } else { 0.0 };
    let end = cli
        .length
        .filter(|l| l.is_finite() && *l > 0.0)
        .map_or(metadata.duration, |l| (start + l).min(metadata.duration));
    let total_frames = ((end - start) * fps as f64).ceil() as usize;
    if total_frames == 0 {
        anyhow::bail!("Nothing to render between {:.2}s and {:.2}s", start, end);
    }

    // 4. Resolve presets, split evenly in "all" mode
    let presets: Vec<Preset> = if cli.preset == "all" {
        Preset::ALL.to_vec()
    } else {
        vec![cli.preset.parse().map_err(anyhow::Error::msg)?]
    };
    let frames_per_preset = total_frames / presets.len();
    let slots: Vec<PresetSlot> = presets
        .iter()
        .enumerate()
        .map(|(i, &preset)| {
            let end_frame = if i == presets.len() - 1 {
                total_frames
            } else {
                (i + 1) * frames_per_preset
            };
            log::info!(
                "Preset [{}]: {} (frames {}-{})",
                i,
                preset.name(),
                i * frames_per_preset,
                end_frame.saturating_sub(1)
            );
            PresetSlot { preset, end_frame }
        })
        .collect();

    // 5. Surface, text and coordinator
    let size = SurfaceSize::new(cli.width as f32, cli.height as f32, cli.scale);
    let mut surface = Surface::from_size(size);
    let (frame_w, frame_h) = (surface.width(), surface.height());

    let settings = VisualizationSettings::new(cli.sensitivity, cli.smoothing);
    let mut coordinator = VisualizationCoordinator::new(slots[0].preset, settings);
    match cli.font.as_deref() {
        Some(font) => {
            let overlay = TextOverlay::load(font, &*fetcher).with_context(|| format!("Failed to load font {}", font))?;
            coordinator = coordinator.with_text(overlay);
        }
        None => log::info!("No --font given, labels will not be drawn"),
    }

    let title = cli
        .title
        .clone()
        .or_else(|| cli.show_title.then(|| metadata.display_title()).flatten());
    if (title.is_some() || cli.show_time) && coordinator.text_overlay().is_none() {
        log::warn!("Title and time overlays need --font");
    }

    // 6. Start FFmpeg encoder
    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(
        &cli.output,
        &AudioTrack {
            source: &input,
            offset: start,
            volume: cli.volume,
        },
        frame_w,
        frame_h,
        fps,
        &cli.codec,
        &cli.pix_fmt,
        cli.crf,
        cli.bitrate.as_deref(),
    )?;

    // 7. Render loop
    engine.set_volume(cli.volume);
    engine.play(Some(start))?;

    let pb = ProgressBar::new(total_frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let frame_dt = 1.0 / fps as f64;
    let shorter = frame_w.min(frame_h) as f32;
    let overlay_px = (shorter * 0.046).max(24.0);
    let margin = (shorter * 0.07) as i32;
    let overlay_color = Rgba::WHITE.with_alpha(220);
    let mut current_slot_idx = 0;

    for frame_idx in 0..total_frames {
        while current_slot_idx + 1 < slots.len() && frame_idx >= slots[current_slot_idx].end_frame {
            current_slot_idx += 1;
            coordinator.set_preset(slots[current_slot_idx].preset);
        }

        let frame = coordinator.tick(&mut engine);
        for event in engine.drain_events() {
            log::debug!("{:?}", event);
        }
        coordinator.present(&frame, &mut surface);

        if let Some(overlay) = coordinator.text_overlay() {
            if let Some(ref title) = title {
                let tw = overlay.measure_width(title, overlay_px) as i32;
                let tx = frame_w as i32 - margin - tw;
                overlay.composite(surface.as_bytes_mut(), frame_w, frame_h, title, tx, margin, overlay_px, overlay_color);
            }
            if cli.show_time {
                let time_str = format_timestamp(frame.position);
                let tw = overlay.measure_width(&time_str, overlay_px) as i32;
                let tx = frame_w as i32 - margin - tw;
                let ty = frame_h as i32 - margin - overlay.line_height(overlay_px) as i32;
                overlay.composite(surface.as_bytes_mut(), frame_w, frame_h, &time_str, tx, ty, overlay_px, overlay_color);
            }
        }

        encoder.write_frame(surface.as_bytes())?;
        pb.set_position(frame_idx as u64 + 1);
        time.advance(frame_dt);
    }

    pb.finish_with_message("Rendering complete");
    engine.dispose();

    // 8. Finish encoding
    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_secs = seconds as u64;
    let centis = ((seconds - total_secs as f64) * 100.0) as u64;
    if total_secs >= 3600 {
        format!("{:02}:{:02}:{:02}.{:02}", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60, centis)
    } else {
        format!("{:02}:{:02}.{:02}", total_secs / 60, total_secs % 60, centis)
    }
}
