use std::path::PathBuf;

use anyhow::{Context, Result};

use swipecap::{AppConfig, CaptionPipeline, NarrationEstimator, Transcriber, WhisperTranscriber};

use crate::TimingSource;

pub async fn cmd_align(
    mut config: AppConfig,
    script: Option<PathBuf>,
    source: TimingSource,
    model: Option<String>,
) -> Result<()> {
    if let Some(script) = script {
        config.paths.script = script;
    }
    if let Some(model) = model {
        config.transcriber.model = model;
    }

    eprintln!("🎙️  Aligning: {}", config.paths.script.display());
    eprintln!("   Source: {source:?}");
    eprintln!("   Captions: {}", config.paths.captions_dir.display());

    let pipeline = CaptionPipeline::new(config);
    let script = pipeline
        .load_script()
        .await
        .with_context(|| format!("failed to load {}", pipeline.config().paths.script.display()))?;

    let transcriber = build_transcriber(pipeline.config(), source);
    let start = std::time::Instant::now();
    let report = pipeline.align_all(&script, transcriber.as_ref()).await?;

    eprintln!(
        "\n✅ Aligned {}/{} scenes in {:.1}s",
        report.completed.len(),
        report.total(),
        start.elapsed().as_secs_f64()
    );
    for (scene_id, reason) in &report.skipped {
        eprintln!("   ⚠️  scene {scene_id}: {reason}");
    }

    Ok(())
}

pub fn build_transcriber(config: &AppConfig, source: TimingSource) -> Box<dyn Transcriber> {
    match source {
        TimingSource::Whisper => Box::new(WhisperTranscriber::new(config.transcriber.clone())),
        TimingSource::Narration => Box::new(NarrationEstimator::new(
            config.transcriber.ffprobe_path.clone(),
        )),
    }
}
