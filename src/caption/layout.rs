//! Single-line caption layout
//!
//! Words are measured at the style's font size and, if the line is wider
//! than the text budget, the font is scaled down once. Glyph metrics are not
//! linear in size, so the rescaled line may still be slightly off budget;
//! no second pass is made.

use serde::Serialize;

use super::raster::GlyphSource;
use super::style::{ResolvedStyle, Rgba};

/// Output video width
pub const CANVAS_WIDTH: u32 = 1080;
/// Output video height
pub const CANVAS_HEIGHT: u32 = 1920;
/// Share of the canvas width text may occupy
pub const MAX_TEXT_WIDTH_RATIO: f64 = 0.85;
/// Vertical shift of the caption from the canvas center
pub const CENTER_Y_OFFSET: i32 = 0;

/// Position of one word inside the caption image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordPlacement {
    pub text: String,
    pub x: f32,
    pub y: u32,
    pub width: f32,
    pub color: Rgba,
}

/// Draw geometry of one caption group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionLayout {
    /// Effective font size after rescaling
    pub font_px: u32,
    /// Image width including padding
    pub width: u32,
    /// Image height including padding
    pub height: u32,
    /// Measured line width without padding
    pub text_width: u32,
    pub rescaled: bool,
    pub highlighted: usize,
    pub words: Vec<WordPlacement>,
    pub stroke_color: Rgba,
    pub stroke_width: u32,
}

impl CaptionLayout {
    /// Recolor for another highlighted word; geometry is unchanged.
    pub fn set_highlight(&mut self, highlighted: usize, style: &ResolvedStyle) {
        self.highlighted = highlighted;
        for (i, word) in self.words.iter_mut().enumerate() {
            word.color = word_color(i, highlighted, style);
        }
    }

    /// Where the image lands on a `canvas_width` x `canvas_height` frame
    #[must_use]
    pub fn position(&self, canvas_width: u32, canvas_height: u32) -> FramePosition {
        FramePosition {
            x: (canvas_width as i32 - self.width as i32) / 2,
            y: (canvas_height / 2) as i32 + CENTER_Y_OFFSET,
        }
    }
}

/// Top-left corner of a caption image on the video canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FramePosition {
    pub x: i32,
    pub y: i32,
}

/// Lay out `words` on one line with `highlighted` in the highlight color.
pub fn layout_caption(
    words: &[&str],
    highlighted: usize,
    style: &ResolvedStyle,
    glyphs: &dyn GlyphSource,
    canvas_width: u32,
) -> CaptionLayout {
    let spacing = style.word_spacing();
    let max_width = (f64::from(canvas_width) * MAX_TEXT_WIDTH_RATIO) as u32;

    let mut font_px = style.font_size();
    let mut widths = measure(words, font_px, glyphs);
    let mut text_width = line_width(&widths, spacing);

    let rescaled = text_width > max_width;
    if rescaled {
        let scale = f64::from(max_width) / f64::from(text_width);
        font_px = ((f64::from(font_px) * scale) as u32).max(1);
        widths = measure(words, font_px, glyphs);
        text_width = line_width(&widths, spacing);
    }

    let pad_x = style.horizontal_padding();
    let pad_y = style.vertical_padding();

    let mut cursor = pad_x as f32;
    let placements = words
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (text, &width))| {
            let placement = WordPlacement {
                text: (*text).to_string(),
                x: cursor,
                y: pad_y,
                width,
                color: word_color(i, highlighted, style),
            };
            cursor += width + spacing as f32;
            placement
        })
        .collect();

    CaptionLayout {
        font_px,
        width: text_width + pad_x * 2,
        height: font_px * 2 + pad_y * 2,
        text_width,
        rescaled,
        highlighted,
        words: placements,
        stroke_color: style.stroke_color(),
        stroke_width: style.stroke_width(),
    }
}

fn measure(words: &[&str], font_px: u32, glyphs: &dyn GlyphSource) -> Vec<f32> {
    words
        .iter()
        .map(|w| glyphs.measure(w, font_px as f32))
        .collect()
}

fn line_width(widths: &[f32], spacing: u32) -> u32 {
    let gaps = widths.len().saturating_sub(1) as f32;
    (widths.iter().sum::<f32>() + spacing as f32 * gaps) as u32
}

fn word_color(index: usize, highlighted: usize, style: &ResolvedStyle) -> Rgba {
    if index == highlighted {
        style.highlight_color()
    } else {
        style.text_color()
    }
}
