//! Glyph sources and caption rasterization
//!
//! Text is rendered as coverage masks: one fill mask per word plus a dilated
//! copy for the outline. Masks depend only on the layout geometry, so a group
//! is rasterized once and repainted for every highlighted word.

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use std::path::Path;

use super::layout::CaptionLayout;
use super::style::{ResolvedStyle, Rgba};
use super::{CaptionError, Result};

/// 8-bit alpha mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Coverage {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Max-blend `src` with its top-left at `(x, y)`, clipping at the edges.
    pub fn blit_max(&mut self, src: &[u8], src_width: usize, x: i32, y: i32) {
        if src_width == 0 {
            return;
        }
        for (row, line) in src.chunks_exact(src_width).enumerate() {
            let Ok(ty) = usize::try_from(y + row as i32) else {
                continue;
            };
            if ty >= self.height {
                break;
            }
            for (col, &value) in line.iter().enumerate() {
                let Ok(tx) = usize::try_from(x + col as i32) else {
                    continue;
                };
                if tx >= self.width {
                    break;
                }
                let slot = &mut self.data[ty * self.width + tx];
                *slot = (*slot).max(value);
            }
        }
    }

    /// Grow the mask by a disk of `radius` pixels.
    ///
    /// The result is `2 * radius` larger in both dimensions; its origin sits
    /// `radius` pixels up and left of the source origin.
    #[must_use]
    pub fn dilate(&self, radius: u32) -> Self {
        if radius == 0 {
            return self.clone();
        }
        let r = radius as i32;
        let offsets: Vec<(i32, i32)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r + r)
            .collect();

        let pad = radius as usize * 2;
        let mut out = Self::new(self.width + pad, self.height + pad);
        for y in 0..self.height {
            for x in 0..self.width {
                let value = self.get(x, y);
                if value == 0 {
                    continue;
                }
                let cx = x as i32 + r;
                let cy = y as i32 + r;
                for &(dx, dy) in &offsets {
                    let idx = (cy + dy) as usize * out.width + (cx + dx) as usize;
                    out.data[idx] = out.data[idx].max(value);
                }
            }
        }
        out
    }
}

/// Ink of a run of text and where it sits relative to the pen.
///
/// Glyphs may reach left of the pen origin or past the advance width
/// (italics, a trailing `f`), so the mask carries its own offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMask {
    pub coverage: Coverage,
    /// Left edge of the mask relative to the pen origin
    pub left: i32,
    /// Top edge of the mask relative to the top of the line box
    pub top: i32,
}

impl TextMask {
    /// Mask already aligned with the pen origin and line box
    #[must_use]
    pub fn aligned(coverage: Coverage) -> Self {
        Self {
            coverage,
            left: 0,
            top: 0,
        }
    }
}

/// Text measurement and coverage, at a pixel size
pub trait GlyphSource {
    /// Advance width of `text`
    fn measure(&self, text: &str, px: f32) -> f32;

    /// Full ink of `text`, never clipped to the advance width
    fn coverage(&self, text: &str, px: f32) -> TextMask;
}

/// TrueType/OpenType face rendered with fontdue
pub struct FontFace {
    font: Font,
}

impl FontFace {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| CaptionError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    /// Load a font file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            CaptionError::Font(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_bytes(bytes)
    }

    /// Load the allow-listed font of a resolved style from `font_dir`
    pub fn for_style(style: &ResolvedStyle, font_dir: &Path) -> Result<Self> {
        Self::load(&style.font().resolve_path(font_dir))
    }

    fn line_height(&self, px: f32) -> f32 {
        self.font
            .horizontal_line_metrics(px)
            .map_or(px * 1.25, |m| m.new_line_size)
    }
}

impl GlyphSource for FontFace {
    fn measure(&self, text: &str, px: f32) -> f32 {
        let mut width = 0.0;
        let mut prev = None;
        for ch in text.chars() {
            if let Some(p) = prev {
                width += self.font.horizontal_kern(p, ch, px).unwrap_or(0.0);
            }
            width += self.font.metrics(ch, px).advance_width;
            prev = Some(ch);
        }
        width
    }

    fn coverage(&self, text: &str, px: f32) -> TextMask {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[&self.font], &TextStyle::new(text, px, 0));

        let inked: Vec<_> = layout
            .glyphs()
            .iter()
            .filter(|glyph| glyph.width > 0 && glyph.height > 0)
            .map(|glyph| (glyph, glyph.x.round() as i32, glyph.y.round() as i32))
            .collect();

        // Line box, grown to whatever ink falls outside it
        let mut left = 0;
        let mut top = 0;
        let mut right = self.measure(text, px).ceil().max(1.0) as i32;
        let mut bottom = self.line_height(px).ceil().max(1.0) as i32;
        for &(glyph, x, y) in &inked {
            left = left.min(x);
            top = top.min(y);
            right = right.max(x + glyph.width as i32);
            bottom = bottom.max(y + glyph.height as i32);
        }

        let mut coverage = Coverage::new((right - left) as usize, (bottom - top) as usize);
        for (glyph, x, y) in inked {
            let (_, bitmap) = self.font.rasterize_config(glyph.key);
            coverage.blit_max(&bitmap, glyph.width, x - left, y - top);
        }
        TextMask {
            coverage,
            left,
            top,
        }
    }
}

/// Deterministic box glyphs with a fixed advance per character.
///
/// Used for dry-run planning without font files.
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvanceGlyphs {
    /// Advance as a fraction of the pixel size
    pub advance_ratio: f32,
}

impl Default for FixedAdvanceGlyphs {
    fn default() -> Self {
        Self { advance_ratio: 0.5 }
    }
}

impl GlyphSource for FixedAdvanceGlyphs {
    fn measure(&self, text: &str, px: f32) -> f32 {
        text.chars().count() as f32 * px * self.advance_ratio
    }

    fn coverage(&self, text: &str, px: f32) -> TextMask {
        let advance = px * self.advance_ratio;
        let width = self.measure(text, px).ceil().max(1.0) as usize;
        let height = (px * 1.25).ceil().max(1.0) as usize;
        let mut mask = Coverage::new(width, height);

        let inset = (advance * 0.1).round() as usize;
        let top = (px * 0.25).round() as usize;
        let bottom = (px.round() as usize).min(height);

        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = (i as f32 * advance).round() as usize + inset;
            let right = (((i + 1) as f32 * advance).round() as usize)
                .saturating_sub(inset)
                .min(width);
            for y in top..bottom {
                for x in left..right {
                    mask.data[y * width + x] = 255;
                }
            }
        }
        TextMask::aligned(mask)
    }
}

/// Premultiplied-free RGBA pixel buffer, transparent by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CaptionImage {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Rgba([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Source-over composite `color` through `mask` placed at `(x, y)`.
    pub fn blend_mask(&mut self, mask: &Coverage, x: i32, y: i32, color: Rgba) {
        let color_alpha = f32::from(color.alpha()) / 255.0;
        if color_alpha == 0.0 {
            return;
        }

        for my in 0..mask.height {
            let Ok(ty) = u32::try_from(y + my as i32) else {
                continue;
            };
            if ty >= self.height {
                break;
            }
            for mx in 0..mask.width {
                let coverage = mask.get(mx, my);
                if coverage == 0 {
                    continue;
                }
                let Ok(tx) = u32::try_from(x + mx as i32) else {
                    continue;
                };
                if tx >= self.width {
                    break;
                }

                let src_a = f32::from(coverage) / 255.0 * color_alpha;
                let i = (ty as usize * self.width as usize + tx as usize) * 4;
                let dst_a = f32::from(self.pixels[i + 3]) / 255.0;
                let out_a = src_a + dst_a * (1.0 - src_a);

                for c in 0..3 {
                    let src = f32::from(color.0[c]);
                    let dst = f32::from(self.pixels[i + c]);
                    let value = (src * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
                    self.pixels[i + c] = value.round().clamp(0.0, 255.0) as u8;
                }
                self.pixels[i + 3] = (out_a * 255.0).round() as u8;
            }
        }
    }
}

/// Fill and outline masks of one placed word
#[derive(Debug, Clone)]
pub struct WordMask {
    fill: Coverage,
    stroke: Option<Coverage>,
    x: i32,
    y: i32,
    stroke_width: i32,
}

/// Build the masks for every word of a layout.
pub fn word_masks(layout: &CaptionLayout, glyphs: &dyn GlyphSource) -> Vec<WordMask> {
    let px = layout.font_px as f32;
    layout
        .words
        .iter()
        .map(|word| {
            let ink = glyphs.coverage(&word.text, px);
            let stroke =
                (layout.stroke_width > 0).then(|| ink.coverage.dilate(layout.stroke_width));
            WordMask {
                fill: ink.coverage,
                stroke,
                x: word.x.round() as i32 + ink.left,
                y: word.y as i32 + ink.top,
                stroke_width: layout.stroke_width as i32,
            }
        })
        .collect()
}

/// Paint precomputed masks with the layout's per-word colors.
#[must_use]
pub fn paint(layout: &CaptionLayout, masks: &[WordMask]) -> CaptionImage {
    let mut image = CaptionImage::new(layout.width, layout.height);
    for (word, mask) in layout.words.iter().zip(masks) {
        if let Some(stroke) = &mask.stroke {
            image.blend_mask(
                stroke,
                mask.x - mask.stroke_width,
                mask.y - mask.stroke_width,
                layout.stroke_color,
            );
        }
        image.blend_mask(&mask.fill, mask.x, mask.y, word.color);
    }
    image
}

/// Rasterize a single layout.
pub fn rasterize(layout: &CaptionLayout, glyphs: &dyn GlyphSource) -> CaptionImage {
    paint(layout, &word_masks(layout, glyphs))
}
