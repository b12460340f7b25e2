use std::io::Read;

use anyhow::{Context, Result};

use swipecap::caption::{FixedAdvanceGlyphs, FontFace, FramePlan, GlyphSource};
use swipecap::{plan_frames, resolve_style, AppConfig, SceneCaptions};

pub fn cmd_plan(config: &AppConfig, input: &str, json: bool, use_font: bool) -> Result<()> {
    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read captions from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))?
    };

    let captions = SceneCaptions::from_json(&content).context("invalid caption file")?;
    let style = resolve_style(&config.style).value;

    let font;
    let fixed = FixedAdvanceGlyphs::default();
    let glyphs: &dyn GlyphSource = if use_font {
        font = FontFace::for_style(&style, &config.paths.font_dir)?;
        &font
    } else {
        &fixed
    };

    let plans = plan_frames(&captions, &config.timing, &style, glyphs);

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    eprintln!(
        "📐 Scene {}: {} groups, {} words -> {} frames",
        captions.scene_id,
        captions.captions.len(),
        captions.word_count(),
        plans.len()
    );
    for plan in &plans {
        println!("{}", format_plan(plan));
    }

    Ok(())
}

fn format_plan(plan: &FramePlan) -> String {
    let words: Vec<String> = plan
        .words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == plan.highlighted {
                format!("[{w}]")
            } else {
                w.clone()
            }
        })
        .collect();

    format!(
        "{:>8.3} {:>8.3}  g{:<3} {:>3}px {:>4}x{:<4} @({},{}){}  {}",
        plan.start,
        plan.end,
        plan.group_index,
        plan.font_px,
        plan.width,
        plan.height,
        plan.position.x,
        plan.position.y,
        if plan.rescaled { " rescaled" } else { "" },
        words.join(" ")
    )
}
