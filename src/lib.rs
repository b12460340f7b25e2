//! `swipecap` - Word-highlighted caption overlays for short vertical videos
//!
//! # Features
//!
//! - **Timing**: global offset, silence bridging and hard cuts turn noisy
//!   word timestamps into a gapless highlight timeline
//! - **Layout**: three-word caption lines measured and rescaled to fit a
//!   1080x1920 canvas, rasterized with outline
//! - **Styling**: lenient style overrides with clamped ranges and a font allow-list
//! - **Rendering**: Whisper alignment, ffmpeg scene compositing with background
//!   motion, final concatenation
//!
//! # Example
//!
//! ```rust
//! use swipecap::caption::{
//!     plan_frames, FixedAdvanceGlyphs, ResolvedStyle, SceneCaptions, TimingConfig, Word,
//! };
//!
//! let words = vec![
//!     Word::new("Once", 0.0, 0.3),
//!     Word::new("upon", 0.3, 0.6),
//!     Word::new("a", 0.6, 0.9),
//! ];
//! let captions = SceneCaptions::from_words("1", &words, None).unwrap();
//! let plan = plan_frames(
//!     &captions,
//!     &TimingConfig::default(),
//!     &ResolvedStyle::default(),
//!     &FixedAdvanceGlyphs::default(),
//! );
//! assert_eq!(plan.len(), 3);
//! ```

pub mod caption;
pub mod compositor;
pub mod config;
pub mod pipeline;
pub mod transcribe;

pub use caption::{
    build_frames, group_words, plan_frames, reconcile, resolve_style, CaptionError, CaptionFrame,
    CaptionGroup, ResolvedStyle, SceneCaptions, Script, StyleOverrides, TimingConfig, Word,
};
pub use compositor::{Compositor, EncoderConfig};
pub use config::AppConfig;
pub use pipeline::{CaptionPipeline, RunReport};
pub use transcribe::{NarrationEstimator, Transcriber, TranscriberConfig, WhisperTranscriber};

/// Version of swipecap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
