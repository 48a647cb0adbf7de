//! FFmpeg-based encoder implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, warn};

use super::config::EncoderConfig;
use super::error::EncoderError;
use super::traits::Encoder;
use super::types::{EncodeProgress, TranscodeJob, TranscodeProfile};

/// FFmpeg-based encoder implementation.
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    /// Creates a new FFmpeg encoder with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Creates an encoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Builds the ffmpeg argument list for one job.
    pub fn build_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        profile: &TranscodeProfile,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
        ];

        // Video codec and quality
        args.extend([
            "-c:v".to_string(),
            profile.video_codec.ffmpeg_codec().to_string(),
            "-crf".to_string(),
            profile.crf.to_string(),
        ]);

        if profile.video_codec.supports_preset() {
            args.extend(["-preset".to_string(), profile.preset.as_str().to_string()]);
        }

        if profile.faststart {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        // Cap the width, keep the aspect ratio, force an even height
        args.extend([
            "-vf".to_string(),
            format!("scale='min({},iw)':-2", profile.max_width),
        ]);

        // Audio is always re-encoded
        args.extend([
            "-c:a".to_string(),
            profile.audio_codec.ffmpeg_codec().to_string(),
            "-b:a".to_string(),
            format!("{}k", profile.audio_bitrate_kbps),
        ]);

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
        ]);

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        args.push(output_path.to_string_lossy().to_string());

        args
    }

    /// Reads the input duration with ffprobe.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64, EncoderError> {
        let output = Command::new(&self.config.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EncoderError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
    }

    /// Extracts `format.duration` from ffprobe JSON output.
    fn parse_probe_duration(output: &str) -> Result<f64, EncoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EncoderError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| EncoderError::ParseError {
                reason: "ffprobe output has no duration".to_string(),
            })
    }
}

/// Follows `-progress` key=value lines on ffmpeg's stderr.
struct ProgressTracker {
    time_regex: Option<Regex>,
    speed_regex: Option<Regex>,
    duration_secs: Option<f64>,
    current_time: f64,
    current_speed: Option<String>,
    finished: bool,
}

impl ProgressTracker {
    fn new(duration_secs: Option<f64>) -> Self {
        Self {
            time_regex: Regex::new(r"out_time_ms=(\d+)").ok(),
            speed_regex: Regex::new(r"speed=\s*(\d+\.?\d*)x").ok(),
            duration_secs,
            current_time: 0.0,
            current_speed: None,
            finished: false,
        }
    }

    fn observe(&mut self, line: &str) {
        if let Some(caps) = self.time_regex.as_ref().and_then(|re| re.captures(line)) {
            if let Some(us) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                // out_time_ms is reported in microseconds
                self.current_time = us / 1_000_000.0;
            }
        }

        if let Some(caps) = self.speed_regex.as_ref().and_then(|re| re.captures(line)) {
            if let Some(speed) = caps.get(1) {
                self.current_speed = Some(format!("{}x", speed.as_str()));
            }
        }

        if line.trim() == "progress=end" {
            self.finished = true;
        }
    }

    fn percent(&self) -> f32 {
        if self.finished {
            return 100.0;
        }
        match self.duration_secs {
            Some(dur) if dur > 0.0 => (self.current_time / dur * 100.0).clamp(0.0, 100.0) as f32,
            _ => 0.0,
        }
    }

    fn snapshot(&self) -> EncodeProgress {
        EncodeProgress {
            percent: self.percent(),
            time_secs: Some(self.current_time),
            duration_secs: self.duration_secs,
            speed: self.current_speed.clone(),
        }
    }
}

/// Whether a line is a `-progress` `key=value` pair.
fn is_progress_line(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

/// Whether an ffmpeg stderr line is a diagnostic message.
///
/// ffmpeg runs at the configured log level, so anything that is not progress
/// output is kept.
fn is_diagnostic_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !is_progress_line(line)
}

/// Reads one line, replacing invalid UTF-8. Returns `None` at end of stream.
async fn next_lossy_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).trim_end().to_string()))
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(
        &self,
        job: &TranscodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError> {
        let input_path = &job.input.path;
        if !input_path.exists() {
            return Err(EncoderError::InputNotFound {
                path: input_path.clone(),
            });
        }

        // Duration is only needed to turn timestamps into percentages
        let duration_secs = if progress_tx.is_some() {
            match self.probe_duration(input_path).await {
                Ok(d) => Some(d),
                Err(e) => {
                    debug!(file = %job.input.file_name, error = %e, "Could not probe duration");
                    None
                }
            }
        } else {
            None
        };

        let args = self.build_args(input_path, &job.output_path, &job.profile);
        debug!(
            command = %format!("{} {}", self.config.ffmpeg_path.display(), args.join(" ")),
            "Starting ffmpeg"
        );

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncoderError::encode_failed("ffmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr);
        let mut line_buf = Vec::new();

        let mut tracker = ProgressTracker::new(duration_secs);
        let progress_interval = Duration::from_millis(self.config.progress_interval_ms);
        let mut last_progress_send: Option<Instant> = None;
        let mut error_output = String::new();

        while let Some(line) = next_lossy_line(&mut reader, &mut line_buf).await? {
            if is_diagnostic_line(&line) {
                error_output.push_str(&line);
                error_output.push('\n');
            }

            tracker.observe(&line);

            if let Some(ref tx) = progress_tx {
                let due = last_progress_send
                    .map(|t| t.elapsed() >= progress_interval)
                    .unwrap_or(true);
                if due || tracker.finished {
                    // Non-blocking send
                    let _ = tx.try_send(tracker.snapshot());
                    last_progress_send = Some(Instant::now());
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let reason = error_output
                .lines()
                .last()
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| format!("FFmpeg exited with code: {:?}", status.code()));
            warn!(file = %job.input.file_name, code = ?status.code(), "ffmpeg failed");
            return Err(EncoderError::encode_failed(
                reason,
                if error_output.is_empty() {
                    None
                } else {
                    Some(error_output)
                },
            ));
        }

        Ok(())
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        // Check ffmpeg exists
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        // Check ffprobe exists
        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{AudioCodec, MediaFile, Preset, VideoCodec};
    use std::path::PathBuf;

    fn position(args: &[String], flag: &str) -> usize {
        args.iter().position(|a| a == flag).unwrap()
    }

    #[test]
    fn test_build_args_default_profile() {
        let encoder = FfmpegEncoder::with_defaults();
        let args = encoder.build_args(
            Path::new("/public/hero.mp4"),
            Path::new("/public/optimized-videos/hero.mp4"),
            &TranscodeProfile::default(),
        );

        assert_eq!(args[0], "-y");
        assert_eq!(args[position(&args, "-i") + 1], "/public/hero.mp4");
        assert_eq!(args[position(&args, "-c:v") + 1], "libx264");
        assert_eq!(args[position(&args, "-crf") + 1], "28");
        assert_eq!(args[position(&args, "-preset") + 1], "slower");
        assert_eq!(args[position(&args, "-movflags") + 1], "+faststart");
        assert_eq!(args[position(&args, "-vf") + 1], "scale='min(1280,iw)':-2");
        assert_eq!(args[position(&args, "-c:a") + 1], "aac");
        assert_eq!(args[position(&args, "-b:a") + 1], "128k");
        assert_eq!(args.last().unwrap(), "/public/optimized-videos/hero.mp4");
    }

    #[test]
    fn test_build_args_overrides() {
        let mut config = EncoderConfig::default();
        config.extra_ffmpeg_args = vec!["-threads".to_string(), "2".to_string()];
        let encoder = FfmpegEncoder::new(config);
        let profile = TranscodeProfile {
            video_codec: VideoCodec::Vp9,
            crf: 33,
            preset: Preset::Fast,
            faststart: false,
            max_width: 640,
            audio_codec: AudioCodec::Opus,
            audio_bitrate_kbps: 96,
        };

        let args = encoder.build_args(Path::new("/in.mp4"), Path::new("/out.mp4"), &profile);

        assert_eq!(args[position(&args, "-c:v") + 1], "libvpx-vp9");
        assert!(!args.contains(&"-preset".to_string()));
        assert!(!args.contains(&"-movflags".to_string()));
        assert_eq!(args[position(&args, "-vf") + 1], "scale='min(640,iw)':-2");
        assert_eq!(args[position(&args, "-c:a") + 1], "libopus");
        assert_eq!(args[position(&args, "-b:a") + 1], "96k");
        // Extra args sit right before the output path
        let n = args.len();
        assert_eq!(&args[n - 3..], &["-threads", "2", "/out.mp4"]);
    }

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"filename": "a.mp4", "duration": "12.500000"}}"#;
        let duration = FfmpegEncoder::parse_probe_duration(json).unwrap();
        assert!((duration - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_duration_missing() {
        let json = r#"{"format": {"filename": "a.mp4"}}"#;
        assert!(matches!(
            FfmpegEncoder::parse_probe_duration(json),
            Err(EncoderError::ParseError { .. })
        ));
        assert!(FfmpegEncoder::parse_probe_duration("not json").is_err());
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::new(Some(10.0));
        tracker.observe("frame=120");
        tracker.observe("out_time_ms=2500000");
        tracker.observe("speed=1.75x");
        let snap = tracker.snapshot();
        assert!((snap.percent - 25.0).abs() < 0.01);
        assert_eq!(snap.speed.as_deref(), Some("1.75x"));

        tracker.observe("progress=end");
        assert_eq!(tracker.percent(), 100.0);
    }

    #[test]
    fn test_progress_tracker_unknown_duration() {
        let mut tracker = ProgressTracker::new(None);
        tracker.observe("out_time_ms=99000000");
        assert_eq!(tracker.percent(), 0.0);
    }

    #[test]
    fn test_is_diagnostic_line() {
        assert!(is_diagnostic_line("Error opening input file /in.mp4."));
        assert!(is_diagnostic_line("Invalid data found when processing input"));
        assert!(is_diagnostic_line(
            "[mov,mp4,m4a,3gp,3g2,mj2 @ 0x55d1] moov atom not found"
        ));
        assert!(is_diagnostic_line("Option crf=99 out of range"));
        assert!(!is_diagnostic_line("out_time_ms=1000"));
        assert!(!is_diagnostic_line("frame=10"));
        assert!(!is_diagnostic_line("progress=end"));
        assert!(!is_diagnostic_line("   "));
    }

    #[tokio::test]
    async fn test_next_lossy_line_tolerates_invalid_utf8() {
        let mut reader: &[u8] = b"out_time_ms=5\n\xff\xfe broken\r\nlast";
        let mut buf = Vec::new();

        let first = next_lossy_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(first.as_deref(), Some("out_time_ms=5"));
        let second = next_lossy_line(&mut reader, &mut buf).await.unwrap().unwrap();
        assert!(second.ends_with(" broken"));
        assert!(second.contains('\u{FFFD}'));
        let third = next_lossy_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(third.as_deref(), Some("last"));
        assert_eq!(next_lossy_line(&mut reader, &mut buf).await.unwrap(), None);
    }

    /// Writes an executable shell script standing in for ffmpeg.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn script_job(dir: &Path) -> TranscodeJob {
        let input = dir.join("clip.mp4");
        std::fs::write(&input, b"fake video").unwrap();
        TranscodeJob::new(
            0,
            MediaFile {
                path: input,
                file_name: "clip.mp4".to_string(),
                size_bytes: 10,
            },
            &dir.join("out"),
            TranscodeProfile::default(),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encode_survives_non_utf8_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            r"printf 'Stream title: \377\376\n' >&2
printf 'progress=end\n' >&2
exit 0",
        );
        let encoder = FfmpegEncoder::new(EncoderConfig::with_paths(
            ffmpeg,
            dir.path().join("no-ffprobe"),
        ));

        let result = encoder.encode(&script_job(dir.path()), None).await;
        assert!(result.is_ok(), "unexpected error: {:?}", result);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encode_failure_keeps_ffmpeg_message() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(
            dir.path(),
            r"echo '[mov,mp4,m4a,3gp,3g2,mj2 @ 0x1] moov atom not found' >&2
echo 'clip.mp4: Invalid data found when processing input' >&2
exit 1",
        );
        let encoder = FfmpegEncoder::new(EncoderConfig::with_paths(
            ffmpeg,
            dir.path().join("no-ffprobe"),
        ));

        match encoder.encode(&script_job(dir.path()), None).await {
            Err(EncoderError::EncodeFailed { reason, stderr }) => {
                assert_eq!(reason, "clip.mp4: Invalid data found when processing input");
                assert!(stderr.unwrap_or_default().contains("moov atom not found"));
            }
            other => panic!("expected EncodeFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_encode_missing_input() {
        let encoder = FfmpegEncoder::with_defaults();
        let job = TranscodeJob::new(
            0,
            MediaFile {
                path: PathBuf::from("/definitely/not/here.mp4"),
                file_name: "here.mp4".to_string(),
                size_bytes: 0,
            },
            Path::new("/tmp"),
            TranscodeProfile::default(),
        );
        let result = encoder.encode(&job, None).await;
        assert!(matches!(result, Err(EncoderError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_encode_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.mp4");
        std::fs::write(&input, b"not really a video").unwrap();

        let encoder = FfmpegEncoder::new(EncoderConfig::with_paths(
            dir.path().join("no-ffmpeg"),
            dir.path().join("no-ffprobe"),
        ));
        let job = TranscodeJob::new(
            0,
            MediaFile {
                path: input,
                file_name: "a.mp4".to_string(),
                size_bytes: 18,
            },
            dir.path(),
            TranscodeProfile::default(),
        );

        let result = encoder.encode(&job, None).await;
        assert!(matches!(result, Err(EncoderError::FfmpegNotFound { .. })));
        assert!(matches!(
            encoder.validate().await,
            Err(EncoderError::FfmpegNotFound { .. })
        ));
    }
}
