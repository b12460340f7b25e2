//! Caption timing and layout engine
//!
//! Turns noisy per-word timestamps into a gapless sequence of highlighted
//! caption frames:
//!
//! - **Normalization** - clean transcribed tokens, drop punctuation-only ones
//! - **Grouping** - fixed-size word groups shown together on one line
//! - **Reconciliation** - global offset, silence bridging, hard cuts
//! - **Layout** - measure, single-pass rescale, per-word colors and stroke
//! - **Style** - lenient override merge with clamped numeric ranges
//!
//! # Example
//!
//! ```rust
//! use swipecap::caption::{group_words, reconcile, TimingConfig, Word};
//!
//! let words = vec![
//!     Word::new("Once", 0.0, 0.3),
//!     Word::new("upon", 0.3, 0.6),
//!     Word::new("a", 0.6, 0.9),
//!     Word::new("time", 0.9, 1.2),
//! ];
//! let groups = group_words(&words).unwrap();
//! let frames = reconcile(&groups, &TimingConfig::default());
//! assert_eq!(frames.len(), 4);
//! ```

pub mod group;
pub mod layout;
pub mod motion;
pub mod raster;
pub mod scene;
pub mod style;
pub mod timing;
pub mod words;

use thiserror::Error;

pub use group::{group_words, CaptionGroup, GROUP_SIZE};
pub use layout::{
    layout_caption, CaptionLayout, FramePosition, WordPlacement, CANVAS_HEIGHT, CANVAS_WIDTH,
    CENTER_Y_OFFSET, MAX_TEXT_WIDTH_RATIO,
};
pub use motion::{BackgroundMotion, MotionConfig, MotionSelection};
pub use raster::{
    paint, rasterize, word_masks, CaptionImage, Coverage, FixedAdvanceGlyphs, FontFace,
    GlyphSource, TextMask, WordMask,
};
pub use scene::{build_frames, plan_frames, CaptionFrame, FramePlan, Scene, SceneCaptions, Script};
pub use style::{
    resolve_style, FontResource, ResolvedStyle, Rgba, Sanitized, StyleOverrides, StyleWarning,
    ALLOWED_FONTS, DEFAULT_FONT_KEY,
};
pub use timing::{reconcile, ReconcileState, TimedFrame, TimingConfig};
pub use words::{normalize_word, prepare_words, Word};

/// Caption engine errors
#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("No words aligned for scene {scene_id}")]
    EmptyAlignment { scene_id: String },

    #[error("Cannot group an empty word sequence")]
    EmptyInput,

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CaptionError>;
