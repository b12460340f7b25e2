//! ffmpeg scene compositor
//!
//! Renders one scene as the moving background, the timed caption images
//! overlaid on top and the narration audio. Rendered scenes are then joined
//! with the concat demuxer.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::caption::{BackgroundMotion, CaptionError, CaptionFrame, MotionConfig, Result};
use crate::transcribe::locate;

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    /// x264 preset for scene renders (None = encoder default)
    pub preset: Option<String>,
    /// x264 preset for the final concatenation
    pub concat_preset: String,
    /// Constant rate factor for the final concatenation
    pub concat_crf: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: locate("ffmpeg"),
            fps: 30,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: None,
            concat_preset: "ultrafast".to_string(),
            concat_crf: 23,
        }
    }
}

/// Inputs of one scene render
#[derive(Debug, Clone, Copy)]
pub struct SceneRender<'a> {
    pub background: &'a Path,
    pub audio: &'a Path,
    pub output: &'a Path,
    pub frames: &'a [CaptionFrame],
    pub motion: BackgroundMotion,
    pub motion_config: &'a MotionConfig,
    /// Scene length in seconds, normally the audio duration
    pub duration: f64,
}

/// Index of the first caption input; 0 is the background, 1 the audio
const FIRST_FRAME_INPUT: usize = 2;

/// ffmpeg stderr lines kept for the error message
const STDERR_TAIL_LINES: usize = 8;

/// Drives ffmpeg for scene renders and concatenation
pub struct Compositor {
    config: EncoderConfig,
}

impl Compositor {
    #[must_use]
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Check if ffmpeg is available
    pub async fn check_available(&self) -> bool {
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }

    /// Filter graph: background motion, then one overlay per caption frame
    #[must_use]
    pub fn build_filter_complex(&self, render: &SceneRender<'_>) -> String {
        let mut chain = vec![format!(
            "[0:v]{},fps={}[bg]",
            render.motion.filter(render.motion_config, render.duration),
            self.config.fps
        )];

        let mut last = "bg".to_string();
        for (i, frame) in render.frames.iter().enumerate() {
            let label = format!("v{i}");
            chain.push(format!(
                "[{last}][{input}:v]overlay=x={x}:y={y}:enable='gte(t,{start:.3})*lt(t,{end:.3})'[{label}]",
                input = FIRST_FRAME_INPUT + i,
                x = frame.position.x,
                y = frame.position.y,
                start = frame.start,
                end = frame.end,
            ));
            last = label;
        }
        chain.push(format!("[{last}]format=yuv420p[vout]"));
        chain.join(";")
    }

    /// ffmpeg arguments for a scene; `frame_files` holds one raw RGBA file per frame.
    #[must_use]
    pub fn build_scene_args(
        &self,
        render: &SceneRender<'_>,
        frame_files: &[PathBuf],
    ) -> Vec<String> {
        let duration = format!("{:.3}", render.duration);
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "warning", "-y"]
            .iter()
            .map(ToString::to_string)
            .collect();

        // Background still, looped for the whole scene
        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            self.config.fps.to_string(),
            "-t".to_string(),
            duration.clone(),
            "-i".to_string(),
            render.background.to_string_lossy().to_string(),
        ]);

        args.push("-i".to_string());
        args.push(render.audio.to_string_lossy().to_string());

        for (frame, file) in render.frames.iter().zip(frame_files) {
            args.extend([
                "-f".to_string(),
                "rawvideo".to_string(),
                "-pixel_format".to_string(),
                "rgba".to_string(),
                "-video_size".to_string(),
                format!("{}x{}", frame.image.width(), frame.image.height()),
                "-i".to_string(),
                file.to_string_lossy().to_string(),
            ]);
        }

        args.push("-filter_complex".to_string());
        args.push(self.build_filter_complex(render));
        args.extend([
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
        ]);
        if let Some(preset) = &self.config.preset {
            args.push("-preset".to_string());
            args.push(preset.clone());
        }
        args.extend([
            "-r".to_string(),
            self.config.fps.to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            "-t".to_string(),
            duration,
            render.output.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Render one scene to `render.output`.
    ///
    /// Caption images are staged as raw RGBA files in `work_dir` and removed afterwards.
    pub async fn render_scene(&self, render: &SceneRender<'_>, work_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(work_dir).await?;

        let batch = uuid::Uuid::new_v4();
        let mut frame_files = Vec::with_capacity(render.frames.len());
        for (i, frame) in render.frames.iter().enumerate() {
            let path = work_dir.join(format!("{batch}_{i:04}.rgba"));
            tokio::fs::write(&path, frame.image.as_bytes()).await?;
            frame_files.push(path);
        }

        let args = self.build_scene_args(render, &frame_files);
        let result = self.run(&args).await;

        for path in &frame_files {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!("Could not remove {}: {e}", path.display());
            }
        }
        result?;

        info!(
            "Rendered {} ({} caption frames, {})",
            render.output.display(),
            render.frames.len(),
            render.motion
        );
        Ok(())
    }

    /// ffmpeg arguments joining the files listed in `list_file`
    #[must_use]
    pub fn build_concat_args(&self, list_file: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "warning".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_file.to_string_lossy().to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-preset".to_string(),
            self.config.concat_preset.clone(),
            "-crf".to_string(),
            self.config.concat_crf.to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Join rendered scenes in the given order.
    pub async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(CaptionError::Ffmpeg("no scene videos to concatenate".to_string()));
        }

        let list_file = output.with_file_name(format!("concat_{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&list_file, concat_list(inputs)).await?;

        let result = self.run(&self.build_concat_args(&list_file, output)).await;
        if let Err(e) = tokio::fs::remove_file(&list_file).await {
            debug!("Could not remove {}: {e}", list_file.display());
        }
        result?;

        info!("Joined {} scenes into {}", inputs.len(), output.display());
        Ok(())
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        debug!("ffmpeg args: {:?}", args);

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CaptionError::Ffmpeg(format!("failed to start ffmpeg: {e}")))?;

        let mut tail = StderrTail::default();
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if line.contains("Error") || line.contains("error") {
                    warn!("ffmpeg: {line}");
                } else {
                    debug!("ffmpeg: {line}");
                }
                tail.push(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(CaptionError::Ffmpeg(format!(
                "ffmpeg exited with {status}: {}",
                tail.summary()
            )));
        }
        Ok(())
    }
}

/// Last few stderr lines of an ffmpeg run
#[derive(Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
}

impl StderrTail {
    fn push(&mut self, line: String) {
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn summary(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join(" | ")
    }
}

/// Concat demuxer list, one quoted `file` line per input
#[must_use]
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| {
            let path = p.to_string_lossy().replace('\'', r"'\''");
            format!("file '{path}'\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{CaptionImage, FramePosition};

    fn compositor() -> Compositor {
        Compositor::new(EncoderConfig {
            ffmpeg_path: "ffmpeg".to_string(),
            ..EncoderConfig::default()
        })
    }

    fn frame(start: f64, end: f64) -> CaptionFrame {
        CaptionFrame {
            start,
            end,
            image: CaptionImage::new(300, 128),
            position: FramePosition { x: 390, y: 960 },
        }
    }

    fn render<'a>(frames: &'a [CaptionFrame], motion: &'a MotionConfig) -> SceneRender<'a> {
        SceneRender {
            background: Path::new("/in/scene_1.jpg"),
            audio: Path::new("/in/scene_1.mp3"),
            output: Path::new("/out/scene_1.mp4"),
            frames,
            motion: BackgroundMotion::PanRight,
            motion_config: motion,
            duration: 3.5,
        }
    }

    #[test]
    fn test_filter_overlays_each_frame_in_order() {
        let frames = vec![frame(0.0, 0.22), frame(0.22, 0.52)];
        let motion = MotionConfig::default();
        let filter = compositor().build_filter_complex(&render(&frames, &motion));

        assert!(filter.starts_with("[0:v]scale="));
        assert!(filter.contains(",fps=30[bg]"));
        assert!(filter
            .contains("[bg][2:v]overlay=x=390:y=960:enable='gte(t,0.000)*lt(t,0.220)'[v0]"));
        assert!(filter
            .contains("[v0][3:v]overlay=x=390:y=960:enable='gte(t,0.220)*lt(t,0.520)'[v1]"));
        assert!(filter.ends_with("[v1]format=yuv420p[vout]"));
    }

    #[test]
    fn test_filter_without_captions() {
        let motion = MotionConfig::default();
        let filter = compositor().build_filter_complex(&render(&[], &motion));
        assert!(filter.ends_with("[bg]format=yuv420p[vout]"));
        assert!(!filter.contains("overlay"));
    }

    #[test]
    fn test_scene_args() {
        let frames = vec![frame(0.0, 0.5)];
        let motion = MotionConfig::default();
        let files = vec![PathBuf::from("/tmp/f0.rgba")];
        let args = compositor().build_scene_args(&render(&frames, &motion), &files);

        let joined = args.join(" ");
        assert!(joined.contains("-loop 1 -framerate 30 -t 3.500 -i /in/scene_1.jpg"));
        assert!(joined.contains("-i /in/scene_1.mp3"));
        assert!(
            joined.contains("-f rawvideo -pixel_format rgba -video_size 300x128 -i /tmp/f0.rgba")
        );
        assert!(joined.contains("-map [vout] -map 1:a -c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert_eq!(args.last().map(String::as_str), Some("/out/scene_1.mp4"));
        assert!(!args.contains(&"-preset".to_string()));
    }

    #[test]
    fn test_concat_args() {
        let args = compositor()
            .build_concat_args(Path::new("/out/list.txt"), Path::new("/out/final_short.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i /out/list.txt"));
        assert!(joined.contains("-c:v libx264 -preset ultrafast -crf 23 -c:a aac"));
        assert!(joined.ends_with("/out/final_short.mp4"));
    }

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = concat_list(&[
            PathBuf::from("/out/scene_1.mp4"),
            PathBuf::from("/out/it's/scene_2.mp4"),
        ]);
        assert_eq!(
            list,
            "file '/out/scene_1.mp4'\nfile '/out/it'\\''s/scene_2.mp4'\n"
        );
    }

    #[test]
    fn test_concat_without_inputs() {
        let err = tokio_test::block_on(
            compositor().concat(&[], Path::new("/tmp/final_short.mp4")),
        )
        .unwrap_err();
        assert!(matches!(err, CaptionError::Ffmpeg(_)));
    }

    #[test]
    fn test_encoder_config_from_toml() {
        let config: EncoderConfig = toml::from_str(
            r#"
            ffmpeg_path = "/opt/ffmpeg"
            preset = "veryfast"
            "#,
        )
        .unwrap();
        assert_eq!(config.ffmpeg_path, "/opt/ffmpeg");
        assert_eq!(config.preset.as_deref(), Some("veryfast"));
        assert_eq!(config.fps, 30);
        assert_eq!(config.concat_crf, 23);
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let mut tail = StderrTail::default();
        assert_eq!(tail.summary(), "");

        for i in 0..20 {
            tail.push(format!("line {i}"));
        }
        assert_eq!(tail.lines.len(), STDERR_TAIL_LINES);
        assert_eq!(tail.lines.front().map(String::as_str), Some("line 12"));
        assert!(tail.summary().ends_with("line 18 | line 19"));
    }
}
