//! Word timestamps for scene audio
//!
//! Two sources are supported:
//! - [`WhisperTranscriber`]: local Whisper via a Python subprocess, primed
//!   with the scene narration so spelling follows the script
//! - [`NarrationEstimator`]: no speech model, the narration is spread evenly
//!   over the audio duration reported by ffprobe

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info};

use crate::caption::{prepare_words, CaptionError, Result, Scene, SceneCaptions, Word};

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s']").expect("static regex is valid"));

/// Transcription settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Python interpreter with the `whisper` package installed
    pub python: String,
    /// Whisper model size (tiny, base, small, medium, large)
    pub model: String,
    /// Spoken language, or "auto" for detection
    pub language: String,
    /// Path to ffprobe
    pub ffprobe_path: String,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            model: "small".to_string(),
            language: "en".to_string(),
            ffprobe_path: locate("ffprobe"),
        }
    }
}

/// Resolve a binary through `PATH`, falling back to the bare name
pub(crate) fn locate(binary: &str) -> String {
    which::which(binary).map_or_else(
        |_| binary.to_string(),
        |p| p.to_string_lossy().to_string(),
    )
}

/// Source of per-word timestamps for one audio track
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Raw words of `audio`; `narration` is the text expected to be spoken.
    async fn transcribe(&self, audio: &Path, narration: &str) -> Result<Vec<Word>>;
}

/// Whisper run through `python3 -c`
pub struct WhisperTranscriber {
    config: TranscriberConfig,
}

const WHISPER_SCRIPT: &str = r#"
import json
import sys
import whisper

model = whisper.load_model(sys.argv[1])
result = model.transcribe(
    sys.argv[2],
    word_timestamps=True,
    language=sys.argv[3] or None,
    initial_prompt=sys.argv[4],
    condition_on_previous_text=False,
    verbose=None,
)

words = [
    {"word": w["word"], "start": w["start"], "end": w["end"]}
    for seg in result.get("segments", [])
    for w in seg.get("words", [])
]
print(json.dumps({"words": words}))
"#;

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    words: Vec<WhisperWord>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

impl WhisperTranscriber {
    #[must_use]
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// Interpreter arguments for one audio file
    #[must_use]
    pub fn build_args(&self, audio: &Path, narration: &str) -> Vec<String> {
        let language = if self.config.language == "auto" {
            String::new()
        } else {
            self.config.language.clone()
        };
        vec![
            "-c".to_string(),
            WHISPER_SCRIPT.to_string(),
            self.config.model.clone(),
            audio.to_string_lossy().to_string(),
            language,
            narration.to_string(),
        ]
    }
}

/// Parse the JSON line printed by the whisper script.
///
/// Whisper may print warnings before it, so only the last non-empty line is read.
pub fn parse_whisper_output(stdout: &[u8]) -> Result<Vec<Word>> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| CaptionError::Transcription("whisper printed nothing".to_string()))?;

    let output: WhisperOutput = serde_json::from_str(line)?;
    Ok(output
        .words
        .into_iter()
        .map(|w| Word::new(w.word, w.start, w.end))
        .collect())
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &'static str {
        "whisper"
    }

    async fn transcribe(&self, audio: &Path, narration: &str) -> Result<Vec<Word>> {
        if !audio.exists() {
            return Err(CaptionError::Transcription(format!(
                "audio file not found: {}",
                audio.display()
            )));
        }

        debug!(
            "Running whisper ({}) on {}",
            self.config.model,
            audio.display()
        );
        let output = Command::new(&self.config.python)
            .args(self.build_args(audio, narration))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptionError::Transcription(format!(
                "whisper failed: {}",
                stderr.trim()
            )));
        }

        parse_whisper_output(&output.stdout)
    }
}

/// Evenly timed narration words, no speech recognition
pub struct NarrationEstimator {
    ffprobe_path: String,
}

impl NarrationEstimator {
    #[must_use]
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

#[async_trait]
impl Transcriber for NarrationEstimator {
    fn name(&self) -> &'static str {
        "narration"
    }

    async fn transcribe(&self, audio: &Path, narration: &str) -> Result<Vec<Word>> {
        let duration = probe_duration(&self.ffprobe_path, audio).await?;
        Ok(estimate_words(narration, duration))
    }
}

/// Spread the narration's words evenly over `duration` seconds.
///
/// Punctuation is stripped and words are upper-cased; boundaries are rounded
/// to centiseconds and each word starts where the previous one ended.
#[must_use]
pub fn estimate_words(narration: &str, duration: f64) -> Vec<Word> {
    let cleaned = NON_WORD.replace_all(narration, "").to_uppercase();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let step = duration / tokens.len() as f64;
    let mut current = 0.0;
    tokens
        .into_iter()
        .map(|token| {
            let start = centis(current);
            let end = centis(current + step);
            current = end;
            Word::new(token, start, end)
        })
        .collect()
}

fn centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Audio duration in seconds, rounded to centiseconds
pub async fn probe_duration(ffprobe: &str, audio: &Path) -> Result<f64> {
    if !audio.exists() {
        return Err(CaptionError::Ffmpeg(format!(
            "audio file not found: {}",
            audio.display()
        )));
    }

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-show_entries", "format=duration", "-of"])
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(audio)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptionError::Ffmpeg(format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe's bare duration output
pub fn parse_duration(text: &str) -> Result<f64> {
    let duration: f64 = text
        .trim()
        .parse()
        .map_err(|_| CaptionError::Ffmpeg(format!("could not read audio duration from {text:?}")))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(CaptionError::Ffmpeg(format!("invalid audio duration {duration}")));
    }
    Ok(centis(duration))
}

/// Transcribe a scene and group its cleaned words.
///
/// Fails with [`CaptionError::EmptyAlignment`] when no word survives cleaning.
pub async fn align_scene(
    transcriber: &dyn Transcriber,
    scene: &Scene,
    audio: &Path,
    audio_duration: Option<f64>,
) -> Result<SceneCaptions> {
    info!("Aligning scene {} with {}", scene.scene_id, transcriber.name());

    let raw = transcriber.transcribe(audio, &scene.narration).await?;
    let raw_count = raw.len();
    let words = prepare_words(raw);
    debug!(
        "Scene {}: kept {}/{} words",
        scene.scene_id,
        words.len(),
        raw_count
    );

    SceneCaptions::from_words(&scene.scene_id, &words, audio_duration)
}
