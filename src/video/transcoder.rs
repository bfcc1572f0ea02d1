use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use crate::db::models::Quality;
use crate::error::AppError;

/// Encodes uploaded videos. Abstracted so tests don't need an encoder binary.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `input` into an MP4 at `output` for the given quality.
    async fn transcode(&self, input: &Path, output: &Path, quality: Quality)
        -> Result<(), AppError>;

    /// Grab a single JPEG frame from `input` into `output`.
    async fn thumbnail(&self, input: &Path, output: &Path) -> Result<(), AppError>;
}

/// Arguments for one H.264/AAC rendition scaled to the quality's height.
pub fn transcode_args(input: &Path, output: &Path, quality: Quality) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into(), "-i".into()];
    args.push(input.into());
    args.extend(
        [
            "-vf".to_string(),
            format!("scale=-2:{}", quality.height()),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-b:v".to_string(),
            quality.video_bitrate().to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

/// Arguments for a single frame one second in.
pub fn thumbnail_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into(), "-ss".into()];
    args.push("00:00:01".into());
    args.push("-i".into());
    args.push(input.into());
    args.extend(["-frames:v", "1", "-q:v", "3"].into_iter().map(OsString::from));
    args.push(output.into());
    args
}

/// Runs the ffmpeg binary as a child process.
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: Vec<OsString>, what: &str) -> Result<(), AppError> {
        let output = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::Transcode(format!(
                    "Failed to start '{}': {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(5)..].join("\n");
            return Err(AppError::Transcode(format!(
                "{} failed ({}): {}",
                what, output.status, tail
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        quality: Quality,
    ) -> Result<(), AppError> {
        tracing::debug!(quality = quality.as_str(), "Transcoding {}", input.display());
        self.run(
            transcode_args(input, output, quality),
            &format!("{} transcode", quality.as_str()),
        )
        .await
    }

    async fn thumbnail(&self, input: &Path, output: &Path) -> Result<(), AppError> {
        self.run(thumbnail_args(input, output), "thumbnail extraction")
            .await
    }
}
