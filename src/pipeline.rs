//! Scene pipeline: align -> render -> concat
//!
//! Scenes are processed one after another in natural id order. A failing
//! scene is logged and skipped; it never aborts the run.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::caption::{
    build_frames, resolve_style, CaptionError, FontFace, GlyphSource, ResolvedStyle, Result,
    Scene, SceneCaptions, Script,
};
use crate::compositor::{Compositor, SceneRender};
use crate::config::AppConfig;
use crate::transcribe::{align_scene, probe_duration, Transcriber};

/// Final output file name
pub const FINAL_OUTPUT: &str = "final_short.mp4";

/// Seconds of audio assumed after the last word when the duration is unknown
const TRAILING_AUDIO: f64 = 0.5;

/// Outcome of a pass over all scenes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Scene ids processed successfully, in order
    pub completed: Vec<String>,
    /// Scene ids that failed, with the reason
    pub skipped: Vec<(String, String)>,
}

impl RunReport {
    fn skip(&mut self, scene_id: &str, err: &CaptionError) {
        warn!("Skipping scene {scene_id}: {err}");
        self.skipped.push((scene_id.to_string(), err.to_string()));
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len()
    }
}

/// Drives alignment, rendering and concatenation for a scene directory layout
pub struct CaptionPipeline {
    config: AppConfig,
    style: ResolvedStyle,
    compositor: Compositor,
}

impl CaptionPipeline {
    /// Resolve the configured style once for the whole session.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let style = resolve_style(&config.style).value;
        let compositor = Compositor::new(config.encoder.clone());
        Self {
            config,
            style,
            compositor,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn style(&self) -> &ResolvedStyle {
        &self.style
    }

    /// Load the style's allow-listed font
    pub fn load_font(&self) -> Result<FontFace> {
        FontFace::for_style(&self.style, &self.config.paths.font_dir)
    }

    /// Read the configured scene script
    pub async fn load_script(&self) -> Result<Script> {
        let json = tokio::fs::read_to_string(&self.config.paths.script).await?;
        Script::from_json(&json)
    }

    /// Transcribe every scene and write `scene_{id}.json` artifacts.
    pub async fn align_all(
        &self,
        script: &Script,
        transcriber: &dyn Transcriber,
    ) -> Result<RunReport> {
        let paths = &self.config.paths;
        tokio::fs::create_dir_all(&paths.captions_dir).await?;

        let mut scenes: Vec<&Scene> = script.scenes.iter().collect();
        scenes.sort_by(|a, b| natural_cmp(&a.scene_id, &b.scene_id));

        let mut report = RunReport::default();
        for scene in scenes {
            match self.align_one(scene, transcriber).await {
                Ok(path) => {
                    info!("Wrote {}", path.display());
                    report.completed.push(scene.scene_id.clone());
                }
                Err(e) => report.skip(&scene.scene_id, &e),
            }
        }

        info!(
            "Aligned {}/{} scenes",
            report.completed.len(),
            report.total()
        );
        Ok(report)
    }

    async fn align_one(&self, scene: &Scene, transcriber: &dyn Transcriber) -> Result<PathBuf> {
        let paths = &self.config.paths;
        let audio = paths.audio_dir.join(scene.audio_file());

        let duration = match probe_duration(&self.config.transcriber.ffprobe_path, &audio).await {
            Ok(d) => Some(d),
            Err(e) => {
                debug!("No duration for scene {}: {e}", scene.scene_id);
                None
            }
        };

        let captions = align_scene(transcriber, scene, &audio, duration).await?;
        let path = paths
            .captions_dir
            .join(format!("scene_{}.json", scene.scene_id));
        tokio::fs::write(&path, captions.to_json()?).await?;
        Ok(path)
    }

    /// Render every caption artifact to `scene_{id}.mp4`.
    pub async fn render_all(&self, glyphs: &dyn GlyphSource) -> Result<RunReport> {
        let paths = &self.config.paths;
        tokio::fs::create_dir_all(&paths.output_dir).await?;

        let artifacts = scene_files(&paths.captions_dir, "json").await?;
        let mut report = RunReport::default();
        for (index, (scene_id, path)) in artifacts.iter().enumerate() {
            match self.render_one(index, scene_id, path, glyphs).await {
                Ok(()) => report.completed.push(scene_id.clone()),
                Err(e) => report.skip(scene_id, &e),
            }
        }

        info!(
            "Rendered {}/{} scenes",
            report.completed.len(),
            report.total()
        );
        Ok(report)
    }

    async fn render_one(
        &self,
        index: usize,
        scene_id: &str,
        artifact: &Path,
        glyphs: &dyn GlyphSource,
    ) -> Result<()> {
        let paths = &self.config.paths;
        let captions = SceneCaptions::from_json(&tokio::fs::read_to_string(artifact).await?)?;

        let background = paths.image_dir.join(format!("scene_{scene_id}.jpg"));
        let audio = paths.audio_dir.join(format!("scene_{scene_id}.mp3"));
        for input in [&background, &audio] {
            if !input.exists() {
                return Err(CaptionError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("missing input {}", input.display()),
                )));
            }
        }

        let duration = self.scene_duration(&captions, &audio).await;
        let frames = build_frames(&captions, &self.config.timing, &self.style, glyphs);
        let motion = self.config.motion.selection.pick(index);
        let output = paths.output_dir.join(format!("scene_{scene_id}.mp4"));

        info!("Rendering scene {scene_id} ({} frames, {motion})", frames.len());
        let render = SceneRender {
            background: &background,
            audio: &audio,
            output: &output,
            frames: &frames,
            motion,
            motion_config: &self.config.motion,
            duration,
        };
        self.compositor.render_scene(&render, &paths.work_dir).await
    }

    /// Stored duration, else probed, else the end of speech plus a short tail
    async fn scene_duration(&self, captions: &SceneCaptions, audio: &Path) -> f64 {
        if let Some(d) = captions.audio_duration {
            return d;
        }
        match probe_duration(&self.config.transcriber.ffprobe_path, audio).await {
            Ok(d) => d,
            Err(e) => {
                let fallback = captions.speech_end().unwrap_or(0.0) + TRAILING_AUDIO;
                warn!(
                    "Scene {}: {e}; assuming {fallback:.2}s",
                    captions.scene_id
                );
                fallback
            }
        }
    }

    /// Join rendered scenes into `final_short.mp4`.
    pub async fn concat(&self) -> Result<PathBuf> {
        let output_dir = &self.config.paths.output_dir;
        let inputs: Vec<PathBuf> = scene_files(output_dir, "mp4")
            .await?
            .into_iter()
            .map(|(_, path)| path)
            .collect();

        info!("Combining {} scenes...", inputs.len());
        let output = output_dir.join(FINAL_OUTPUT);
        self.compositor.concat(&inputs, &output).await?;
        Ok(output)
    }

    /// Full run: align, render, concat.
    pub async fn run(
        &self,
        script: &Script,
        transcriber: &dyn Transcriber,
        glyphs: &dyn GlyphSource,
    ) -> Result<(RunReport, RunReport, PathBuf)> {
        let aligned = self.align_all(script, transcriber).await?;
        let rendered = self.render_all(glyphs).await?;
        let output = self.concat().await?;
        Ok((aligned, rendered, output))
    }
}

/// `scene_{id}.{ext}` files of `dir`, in natural id order
pub async fn scene_files(dir: &Path, ext: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(id) = scene_id_from_file(name, ext) {
            found.push((id.to_string(), entry.path()));
        }
    }
    found.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    Ok(found)
}

fn scene_id_from_file<'a>(name: &'a str, ext: &str) -> Option<&'a str> {
    name.strip_prefix("scene_")?
        .strip_suffix(ext)?
        .strip_suffix('.')
        .filter(|id| !id.is_empty())
}

/// Numeric ids first in numeric order, then the rest lexicographically
pub fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{FixedAdvanceGlyphs, Word};
    use async_trait::async_trait;

    struct ScriptedTranscriber;

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn transcribe(&self, _audio: &Path, narration: &str) -> Result<Vec<Word>> {
            Ok(narration
                .split_whitespace()
                .enumerate()
                .map(|(i, w)| Word::new(w, i as f64 * 0.4, (i + 1) as f64 * 0.4))
                .collect())
        }
    }

    fn temp_config() -> (AppConfig, PathBuf) {
        let root = std::env::temp_dir().join(format!("swipecap-pipeline-{}", uuid::Uuid::new_v4()));
        let mut config = AppConfig::default();
        config.paths.audio_dir = root.join("audio");
        config.paths.image_dir = root.join("images");
        config.paths.captions_dir = root.join("captions");
        config.paths.output_dir = root.join("output");
        config.paths.work_dir = root.join("work");
        config.transcriber.ffprobe_path = "/nonexistent/ffprobe".to_string();
        config.encoder.ffmpeg_path = "/nonexistent/ffmpeg".to_string();
        (config, root)
    }

    #[test]
    fn test_natural_order() {
        let mut ids = vec!["10", "2", "intro", "1", "b"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, vec!["1", "2", "10", "b", "intro"]);
    }

    #[test]
    fn test_scene_id_from_file() {
        assert_eq!(scene_id_from_file("scene_12.json", "json"), Some("12"));
        assert_eq!(scene_id_from_file("scene_a.mp4", "mp4"), Some("a"));
        assert_eq!(scene_id_from_file("scene_.json", "json"), None);
        assert_eq!(scene_id_from_file("final_short.mp4", "mp4"), None);
        assert_eq!(scene_id_from_file("scene_1.json", "mp4"), None);
    }

    #[test]
    fn test_align_all_writes_artifacts_and_skips_empty() {
        let (config, root) = temp_config();
        let captions_dir = config.paths.captions_dir.clone();
        let pipeline = CaptionPipeline::new(config);
        let script = Script::from_json(
            r#"{"scenes": [
                {"scene_id": 10, "narration": "The end."},
                {"scene_id": 2, "narration": "  "},
                {"scene_id": 1, "narration": "Once upon a time there was"}
            ]}"#,
        )
        .unwrap();

        let report =
            tokio_test::block_on(pipeline.align_all(&script, &ScriptedTranscriber)).unwrap();
        assert_eq!(report.completed, vec!["1", "10"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "2");

        let json = std::fs::read_to_string(captions_dir.join("scene_1.json")).unwrap();
        let captions = SceneCaptions::from_json(&json).unwrap();
        assert_eq!(captions.captions.len(), 2);
        assert_eq!(captions.audio_duration, None);
        assert!(!captions_dir.join("scene_2.json").exists());

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_render_all_skips_scene_without_inputs() {
        let (config, root) = temp_config();
        std::fs::create_dir_all(&config.paths.captions_dir).unwrap();
        let words = vec![Word::new("Hi", 0.0, 0.4)];
        let captions = SceneCaptions::from_words("3", &words, Some(1.0)).unwrap();
        std::fs::write(
            config.paths.captions_dir.join("scene_3.json"),
            captions.to_json().unwrap(),
        )
        .unwrap();

        let pipeline = CaptionPipeline::new(config);
        let report =
            tokio_test::block_on(pipeline.render_all(&FixedAdvanceGlyphs::default())).unwrap();
        assert!(report.completed.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].1.contains("missing input"));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_concat_without_scenes_fails() {
        let (config, root) = temp_config();
        std::fs::create_dir_all(&config.paths.output_dir).unwrap();
        let pipeline = CaptionPipeline::new(config);
        assert!(tokio_test::block_on(pipeline.concat()).is_err());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_scene_files_sorted() {
        let (_, root) = temp_config();
        std::fs::create_dir_all(&root).unwrap();
        for name in ["scene_10.mp4", "scene_2.mp4", "notes.txt", "scene_1.mp4"] {
            std::fs::write(root.join(name), b"").unwrap();
        }
        let files = tokio_test::block_on(scene_files(&root, "mp4")).unwrap();
        let ids: Vec<&str> = files.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
        std::fs::remove_dir_all(root).unwrap();
    }
}
