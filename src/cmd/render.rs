use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use swipecap::caption::MotionSelection;
use swipecap::{AppConfig, CaptionPipeline, RunReport};

use super::align::build_transcriber;
use crate::TimingSource;

pub async fn cmd_render(mut config: AppConfig, seed: Option<u64>) -> Result<()> {
    apply_seed(&mut config, seed);

    eprintln!("🎬 Rendering: {}", config.paths.captions_dir.display());
    eprintln!("   Output: {}", config.paths.output_dir.display());

    let pipeline = CaptionPipeline::new(config);
    let font = pipeline.load_font().context("failed to load caption font")?;

    let start = Instant::now();
    let report = pipeline.render_all(&font).await?;
    print_report("Rendered", &report, start);

    Ok(())
}

pub async fn cmd_concat(config: AppConfig) -> Result<()> {
    let pipeline = CaptionPipeline::new(config);
    let output = pipeline.concat().await?;
    eprintln!("✅ Final short: {}", output.display());
    Ok(())
}

pub async fn cmd_run(
    mut config: AppConfig,
    script: Option<PathBuf>,
    source: TimingSource,
    seed: Option<u64>,
) -> Result<()> {
    if let Some(script) = script {
        config.paths.script = script;
    }
    apply_seed(&mut config, seed);

    eprintln!("🚀 Running: {}", config.paths.script.display());

    let pipeline = CaptionPipeline::new(config);
    let script = pipeline
        .load_script()
        .await
        .with_context(|| format!("failed to load {}", pipeline.config().paths.script.display()))?;
    let font = pipeline.load_font().context("failed to load caption font")?;
    let transcriber = build_transcriber(pipeline.config(), source);

    let start = Instant::now();
    let (aligned, rendered, output) = pipeline.run(&script, transcriber.as_ref(), &font).await?;
    print_report("Aligned", &aligned, start);
    print_report("Rendered", &rendered, start);
    eprintln!("✅ Final short: {}", output.display());

    Ok(())
}

fn apply_seed(config: &mut AppConfig, seed: Option<u64>) {
    if let Some(seed) = seed {
        config.motion.selection = MotionSelection::Seeded { seed };
    }
}

fn print_report(action: &str, report: &RunReport, start: Instant) {
    eprintln!(
        "\n✅ {action} {}/{} scenes ({:.1}s)",
        report.completed.len(),
        report.total(),
        start.elapsed().as_secs_f64()
    );
    for (scene_id, reason) in &report.skipped {
        eprintln!("   ⚠️  scene {scene_id}: {reason}");
    }
}
