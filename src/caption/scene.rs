//! Scene descriptors, caption artifacts and frame scheduling

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::layout::{layout_caption, CaptionLayout, FramePosition, CANVAS_HEIGHT, CANVAS_WIDTH};
use super::raster::{paint, word_masks, CaptionImage, GlyphSource, WordMask};
use super::style::ResolvedStyle;
use super::timing::{reconcile, TimedFrame, TimingConfig};
use super::{group_words, CaptionError, CaptionGroup, Result, Word};

/// Narrated scene list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub scenes: Vec<Scene>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One narrated scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(deserialize_with = "scene_id")]
    pub scene_id: String,
    pub narration: String,
}

impl Scene {
    /// Audio track file name
    #[must_use]
    pub fn audio_file(&self) -> String {
        format!("scene_{}.mp3", self.scene_id)
    }

    /// Background image file name
    #[must_use]
    pub fn image_file(&self) -> String {
        format!("scene_{}.jpg", self.scene_id)
    }
}

/// Scene ids appear as strings or numbers in hand-written scripts
fn scene_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

/// Grouped captions of one scene, persisted as `scene_{id}.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCaptions {
    #[serde(deserialize_with = "scene_id")]
    pub scene_id: String,
    pub captions: Vec<CaptionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
}

impl SceneCaptions {
    /// Group cleaned words; a scene without words is an alignment failure.
    pub fn from_words(scene_id: &str, words: &[Word], audio_duration: Option<f64>) -> Result<Self> {
        let captions = group_words(words).map_err(|e| match e {
            CaptionError::EmptyInput => CaptionError::EmptyAlignment {
                scene_id: scene_id.to_string(),
            },
            other => other,
        })?;

        Ok(Self {
            scene_id: scene_id.to_string(),
            captions,
            audio_duration,
        })
    }

    /// Parse an artifact, dropping empty groups.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut captions: Self = serde_json::from_str(json)?;
        captions.captions.retain(|g| !g.words.is_empty());
        if captions.captions.is_empty() {
            return Err(CaptionError::EmptyAlignment {
                scene_id: captions.scene_id,
            });
        }
        Ok(captions)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Word count over all groups
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.captions.iter().map(|g| g.words.len()).sum()
    }

    /// End of the last spoken word, raw
    #[must_use]
    pub fn speech_end(&self) -> Option<f64> {
        self.captions
            .iter()
            .flat_map(|g| g.words.iter())
            .map(|w| w.end)
            .reduce(f64::max)
    }
}

/// A caption image scheduled on the scene timeline
#[derive(Debug, Clone)]
pub struct CaptionFrame {
    pub start: f64,
    pub end: f64,
    pub image: CaptionImage,
    pub position: FramePosition,
}

/// Layout summary of one frame, without pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePlan {
    pub group_index: usize,
    pub highlighted: usize,
    pub start: f64,
    pub end: f64,
    pub words: Vec<String>,
    pub font_px: u32,
    pub width: u32,
    pub height: u32,
    pub rescaled: bool,
    pub position: FramePosition,
}

/// Reconcile and lay out every frame of a scene without rasterizing.
pub fn plan_frames(
    captions: &SceneCaptions,
    timing: &TimingConfig,
    style: &ResolvedStyle,
    glyphs: &dyn GlyphSource,
) -> Vec<FramePlan> {
    let frames = reconcile(&captions.captions, timing);
    let mut layouts = GroupLayouts::new(&captions.captions, style, glyphs);

    frames
        .iter()
        .map(|frame| {
            let (layout, _) = layouts.get(frame.group_index, false);
            FramePlan {
                group_index: frame.group_index,
                highlighted: frame.highlighted,
                start: frame.start,
                end: frame.end,
                words: layout.words.iter().map(|w| w.text.clone()).collect(),
                font_px: layout.font_px,
                width: layout.width,
                height: layout.height,
                rescaled: layout.rescaled,
                position: layout.position(CANVAS_WIDTH, CANVAS_HEIGHT),
            }
        })
        .collect()
}

/// Reconcile a scene and rasterize one image per highlighted word.
///
/// Layout and glyph masks are computed once per group; each frame only
/// recolors and repaints them.
pub fn build_frames(
    captions: &SceneCaptions,
    timing: &TimingConfig,
    style: &ResolvedStyle,
    glyphs: &dyn GlyphSource,
) -> Vec<CaptionFrame> {
    let timed = reconcile(&captions.captions, timing);
    debug!(
        "Scene {}: {} groups -> {} frames",
        captions.scene_id,
        captions.captions.len(),
        timed.len()
    );

    let mut layouts = GroupLayouts::new(&captions.captions, style, glyphs);
    timed
        .iter()
        .map(|frame| render_frame(&mut layouts, frame, style))
        .collect()
}

fn render_frame(
    layouts: &mut GroupLayouts<'_>,
    frame: &TimedFrame,
    style: &ResolvedStyle,
) -> CaptionFrame {
    let (layout, masks) = layouts.get(frame.group_index, true);
    layout.set_highlight(frame.highlighted, style);
    let masks = masks.map_or(&[][..], Vec::as_slice);

    CaptionFrame {
        start: frame.start,
        end: frame.end,
        image: paint(layout, masks),
        position: layout.position(CANVAS_WIDTH, CANVAS_HEIGHT),
    }
}

/// Layout of the group currently being emitted; frames arrive in group order.
struct GroupLayouts<'a> {
    groups: &'a [CaptionGroup],
    style: &'a ResolvedStyle,
    glyphs: &'a dyn GlyphSource,
    current: Option<(usize, CaptionLayout, Option<Vec<WordMask>>)>,
}

impl<'a> GroupLayouts<'a> {
    fn new(
        groups: &'a [CaptionGroup],
        style: &'a ResolvedStyle,
        glyphs: &'a dyn GlyphSource,
    ) -> Self {
        Self {
            groups,
            style,
            glyphs,
            current: None,
        }
    }

    /// Layout of group `index`, with its masks when `with_masks` is set
    fn get(
        &mut self,
        index: usize,
        with_masks: bool,
    ) -> (&mut CaptionLayout, Option<&Vec<WordMask>>) {
        if !matches!(&self.current, Some((i, _, _)) if *i == index) {
            self.current = None;
        }

        let (groups, style, glyphs) = (self.groups, self.style, self.glyphs);
        let (_, layout, masks) = self.current.get_or_insert_with(|| {
            let texts = groups[index].texts();
            let layout = layout_caption(&texts, 0, style, glyphs, CANVAS_WIDTH);
            (index, layout, None)
        });

        if with_masks && masks.is_none() {
            *masks = Some(word_masks(layout, glyphs));
        }
        (layout, masks.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::raster::FixedAdvanceGlyphs;
    use crate::caption::style::Rgba;

    fn sample_captions() -> SceneCaptions {
        SceneCaptions::from_json(
            r#"{
                "scene_id": 1,
                "captions": [
                    {"words": [
                        {"text": "Once", "start": 0.0, "end": 0.3},
                        {"text": "upon", "start": 0.3, "end": 0.6},
                        {"text": "a", "start": 0.6, "end": 0.9}
                    ]},
                    {"words": [
                        {"text": "time", "start": 1.0, "end": 1.4}
                    ]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_script_accepts_numeric_and_string_ids() {
        let script = Script::from_json(
            r#"{"scenes": [
                {"scene_id": 3, "narration": "One."},
                {"scene_id": "intro", "narration": "Two."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(script.scenes[0].scene_id, "3");
        assert_eq!(script.scenes[1].scene_id, "intro");
        assert_eq!(script.scenes[0].audio_file(), "scene_3.mp3");
        assert_eq!(script.scenes[1].image_file(), "scene_intro.jpg");
    }

    #[test]
    fn test_from_words_empty_is_alignment_error() {
        let err = SceneCaptions::from_words("7", &[], None).unwrap_err();
        assert!(matches!(err, CaptionError::EmptyAlignment { scene_id } if scene_id == "7"));
    }

    #[test]
    fn test_artifact_roundtrip_keeps_duration() {
        let words = vec![Word::new("Hi", 0.0, 0.4), Word::new("there", 0.4, 0.9)];
        let captions = SceneCaptions::from_words("2", &words, Some(1.25)).unwrap();
        let json = captions.to_json().unwrap();
        assert!(json.contains("\"audio_duration\": 1.25"));
        assert_eq!(SceneCaptions::from_json(&json).unwrap(), captions);
    }

    #[test]
    fn test_artifact_without_words_rejected() {
        let err = SceneCaptions::from_json(r#"{"scene_id": "x", "captions": [{"words": []}]}"#)
            .unwrap_err();
        assert!(matches!(err, CaptionError::EmptyAlignment { .. }));
    }

    #[test]
    fn test_speech_end_and_word_count() {
        let captions = sample_captions();
        assert_eq!(captions.word_count(), 4);
        assert_eq!(captions.speech_end(), Some(1.4));
    }

    #[test]
    fn test_build_frames_schedule() {
        let captions = sample_captions();
        let style = ResolvedStyle::default();
        let glyphs = FixedAdvanceGlyphs::default();
        let frames = build_frames(&captions, &TimingConfig::default(), &style, &glyphs);

        assert_eq!(frames.len(), 4);
        for pair in frames.windows(2) {
            assert!(pair[0].end <= pair[1].start + 1e-9);
            assert!(pair[0].start <= pair[1].start);
        }
        assert!(frames.iter().all(|f| f.position.y == 960));
    }

    #[test]
    fn test_build_frames_moves_highlight() {
        let captions = sample_captions();
        let style = ResolvedStyle::default();
        let glyphs = FixedAdvanceGlyphs::default();
        let frames = build_frames(&captions, &TimingConfig::default(), &style, &glyphs);

        // middle of the first glyph of "Once" and of "upon"
        let y = 14 + 30;
        let upon_x = 32 + 100 + 18 + 10;
        assert_eq!(frames[0].image.pixel(32 + 10, y), Rgba::YELLOW);
        assert_eq!(frames[0].image.pixel(upon_x, y), Rgba::WHITE);
        assert_eq!(frames[1].image.pixel(32 + 10, y), Rgba::WHITE);
        assert_eq!(frames[1].image.pixel(upon_x, y), Rgba::YELLOW);
    }

    #[test]
    fn test_plan_matches_frames() {
        let captions = sample_captions();
        let style = ResolvedStyle::default();
        let glyphs = FixedAdvanceGlyphs::default();
        let timing = TimingConfig::default();
        let plans = plan_frames(&captions, &timing, &style, &glyphs);
        let frames = build_frames(&captions, &timing, &style, &glyphs);

        assert_eq!(plans.len(), frames.len());
        for (plan, frame) in plans.iter().zip(&frames) {
            assert_eq!(plan.width, frame.image.width());
            assert_eq!(plan.position, frame.position);
            assert!((plan.start - frame.start).abs() < 1e-12);
        }
        assert_eq!(plans[3].words, vec!["time".to_string()]);
        assert_eq!(plans[1].highlighted, 1);
    }
}
