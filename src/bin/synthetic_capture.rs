// framerec synthetic capture
// Records generated frames (and the default microphone when available) to MP4

use framerec::config::RecorderConfig;
use framerec::testing::synthetic_video_frame;
use framerec::{Recorder, SubmitOutcome};
use std::env;
use std::time::{Duration, Instant};

struct Options {
    output: String,
    width: u32,
    height: u32,
    frames: u64,
    fps: f64,
    config_path: Option<String>,
    audio: bool,
    json: bool,
}

fn usage() -> ! {
    eprintln!(
        "Usage: framerec-synthetic <output.mp4> [--width <w>] [--height <h>] [--frames <n>] \
         [--fps <f>] [--config <file.toml>] [--no-audio] [--json]"
    );
    std::process::exit(1);
}

fn parse_args(args: &[String]) -> Result<Options, Box<dyn std::error::Error>> {
    let mut opts = Options {
        output: String::new(),
        width: 1280,
        height: 720,
        frames: 120,
        fps: 30.0,
        config_path: None,
        audio: true,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => {
                i += 1;
                opts.width = args.get(i).ok_or("missing --width value")?.parse()?;
            }
            "--height" => {
                i += 1;
                opts.height = args.get(i).ok_or("missing --height value")?.parse()?;
            }
            "--frames" => {
                i += 1;
                opts.frames = args.get(i).ok_or("missing --frames value")?.parse()?;
            }
            "--fps" => {
                i += 1;
                opts.fps = args.get(i).ok_or("missing --fps value")?.parse()?;
            }
            "--config" => {
                i += 1;
                opts.config_path = Some(args.get(i).ok_or("missing --config value")?.clone());
            }
            "--no-audio" => opts.audio = false,
            "--json" => opts.json = true,
            other if other.starts_with("--") => {
                eprintln!("Unknown option: {}", other);
                usage();
            }
            other => opts.output = other.to_string(),
        }
        i += 1;
    }

    if opts.output.is_empty() || opts.fps <= 0.0 {
        usage();
    }
    Ok(opts)
}

#[cfg(feature = "audio-device")]
fn attach_default_input(recorder: Recorder, config: &RecorderConfig) -> Recorder {
    if config.audio.enabled {
        recorder.with_audio_source(framerec::audio::CpalAudioSource::default_factory(
            &config.audio,
        ))
    } else {
        recorder
    }
}

#[cfg(not(feature = "audio-device"))]
fn attach_default_input(recorder: Recorder, _config: &RecorderConfig) -> Recorder {
    recorder
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    framerec::init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = parse_args(&args)?;

    let mut config = match opts.config_path {
        Some(ref path) => RecorderConfig::load_from_file(path)?,
        None => RecorderConfig::default(),
    };
    config.video.fps_hint = opts.fps;
    config.audio.enabled &= opts.audio;

    let recorder = attach_default_input(Recorder::new(config.clone()), &config);

    let session = recorder.start(&opts.output, opts.width, opts.height)?;

    let frame_interval = Duration::from_secs_f64(1.0 / opts.fps);
    let started = Instant::now();
    let mut skipped = 0u64;

    for n in 0..opts.frames {
        let due = started + frame_interval.mul_f64(n as f64);
        if let Some(wait) = due.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }

        // Skip the readback when the encoder is still busy
        if !session.is_accepting_frames() {
            skipped += 1;
            continue;
        }

        let frame = synthetic_video_frame(n, opts.width, opts.height);
        if session.submit_frame(frame, opts.width, opts.height, Instant::now())
            == SubmitOutcome::Rejected
        {
            break;
        }
    }

    let stats = session.stop()?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Wrote {}", stats.output_path);
        println!(
            "  video: {} packets ({} dropped, {} skipped)",
            stats.video_packets, stats.dropped_frames, skipped
        );
        println!(
            "  audio: {} packets ({} chunks dropped)",
            stats.audio_packets, stats.dropped_audio_chunks
        );
        if let Some(ref err) = stats.audio_error {
            println!("  audio degraded: {}", err);
        }
        println!(
            "  {:.2}s, {} bytes, {:.0} kbit/s",
            stats.duration_secs,
            stats.bytes_written,
            stats.avg_bitrate() / 1000.0
        );
    }

    Ok(())
}
