use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
pub const DEFAULT_SCALE: f32 = 1.0;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_CRF: u32 = 18;
pub const DEFAULT_CODEC: &str = "libx264";
pub const DEFAULT_PIX_FMT: &str = "yuv420p";
pub const DEFAULT_PRESET: &str = "circular-bars";
pub const DEFAULT_SENSITIVITY: f32 = 1.0;
pub const DEFAULT_SMOOTHING: f32 = 0.8;

#[derive(Parser, Debug)]
#[command(name = "pulseviz", about = "Audio analysis and beat-synchronized visualization renderer")]
pub struct Cli {
    /// Input audio file or http(s) URL (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<String>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Preset name, or "all" to split the video across every preset
    #[arg(short, long, default_value = DEFAULT_PRESET)]
    pub preset: String,

    /// Video width in logical pixels
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    /// Video height in logical pixels
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    /// Device pixel ratio; the encoded frame is width*scale x height*scale
    #[arg(long, default_value_t = DEFAULT_SCALE)]
    pub scale: f32,

    /// Frames per second
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = DEFAULT_CRF)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = DEFAULT_CODEC)]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = DEFAULT_PIX_FMT)]
    pub pix_fmt: String,

    /// Visual sensitivity (0.1-2.0)
    #[arg(long, default_value_t = DEFAULT_SENSITIVITY)]
    pub sensitivity: f32,

    /// Visual smoothing (0.1-1.0)
    #[arg(long, default_value_t = DEFAULT_SMOOTHING)]
    pub smoothing: f32,

    /// Start rendering this many seconds into the track
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Render at most this many seconds
    #[arg(long)]
    pub length: Option<f64>,

    /// Soundtrack volume (0.0-1.0)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Title text overlay (defaults to the track's tags with --show-title)
    #[arg(long)]
    pub title: Option<String>,

    /// Show the track title from its tags
    #[arg(long)]
    pub show_title: bool,

    /// Show elapsed time overlay
    #[arg(long)]
    pub show_time: bool,

    /// Font file path or URL used for labels and overlays
    #[arg(long)]
    pub font: Option<String>,

    /// Print track metadata and waveform envelope as JSON and exit
    #[arg(long)]
    pub probe: bool,

    /// List available presets and exit
    #[arg(long)]
    pub list_presets: bool,

    /// Config file (default: ./pulseviz.toml or ~/.config/pulseviz/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
