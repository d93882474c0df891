use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

/// Where ffmpeg takes the soundtrack from: a file path or URL, trimmed to the
/// rendered range.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack<'a> {
    pub source: &'a str,
    /// Seconds into the source where the video starts
    pub offset: f64,
    pub volume: f32,
}

fn build_args(
    output_path: &Path,
    audio: &AudioTrack<'_>,
    width: u32,
    height: u32,
    fps: u32,
    codec: &str,
    pix_fmt: &str,
    crf: u32,
    bitrate: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", width, height),
        "-framerate".into(), fps.to_string(),
        "-i".into(), "pipe:0".into(),
    ];

    if audio.offset > 0.0 {
        args.extend(["-ss".to_string(), format!("{:.3}", audio.offset)]);
    }
    args.extend([
        "-i".to_string(), audio.source.to_string(),
        "-map".into(), "0:v:0".into(),
        "-map".into(), "1:a:0".into(),
        "-c:v".into(), codec.to_string(),
        "-pix_fmt".into(), pix_fmt.to_string(),
    ]);

    if let Some(br) = bitrate {
        args.extend(["-b:v".to_string(), br.to_string()]);
    } else {
        args.extend(["-crf".to_string(), crf.to_string()]);
        args.extend(["-preset".to_string(), "medium".to_string()]);
    }

    if (audio.volume - 1.0).abs() > f32::EPSILON {
        args.extend(["-filter:a".to_string(), format!("volume={:.3}", audio.volume)]);
    }

    args.extend([
        "-c:a".into(), "aac".into(),
        "-b:a".into(), "192k".into(),
        "-shortest".into(),
        output_path.to_string_lossy().into_owned(),
    ]);
    args
}

pub struct FfmpegEncoder {
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegEncoder {
    pub fn new(
        output_path: &Path,
        audio: &AudioTrack<'_>,
        width: u32,
        height: u32,
        fps: u32,
        codec: &str,
        pix_fmt: &str,
        crf: u32,
        bitrate: Option<&str>,
    ) -> Result<Self> {
        let args = build_args(output_path, audio, width, height, fps, codec, pix_fmt, crf, bitrate);
        let encoder = Self::spawn("ffmpeg", &args)?;
        log::info!("FFmpeg encoder started: {}x{} @ {}fps, codec={}", width, height, fps, codec);
        Ok(encoder)
    }

    fn spawn(program: impl AsRef<OsStr>, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        // Drained for the whole run; ffmpeg stops reading frames once this pipe is full
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut log = Vec::new();
                if let Err(e) = pipe.read_to_end(&mut log) {
                    log::debug!("FFmpeg stderr closed early: {}", e);
                }
                String::from_utf8_lossy(&log).into_owned()
            })
        });

        Ok(Self { child, stderr })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        // EOF on stdin ends the video stream
        drop(self.child.stdin.take());

        let status = self.child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() {
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr.trim_end());
        }
        if !stderr.trim().is_empty() {
            log::warn!("FFmpeg: {}", stderr.trim_end());
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}
