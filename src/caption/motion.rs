//! Background motion
//!
//! Each scene background gets a slow zoom or pan, picked per scene by a
//! [`MotionSelection`] strategy and rendered as an ffmpeg filter chain.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::layout::{CANVAS_HEIGHT, CANVAS_WIDTH};

/// Motion applied to a scene background over its duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMotion {
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
}

impl BackgroundMotion {
    pub const ALL: [Self; 4] = [Self::ZoomIn, Self::ZoomOut, Self::PanLeft, Self::PanRight];

    /// Build the ffmpeg filter chain turning a still background into a
    /// `CANVAS_WIDTH` x `CANVAS_HEIGHT` moving frame of `duration` seconds.
    #[must_use]
    pub fn filter(&self, config: &MotionConfig, duration: f64) -> String {
        let (w, h) = (CANVAS_WIDTH, CANVAS_HEIGHT);
        let duration = duration.max(0.01);

        match self {
            Self::ZoomIn | Self::ZoomOut => {
                let progress = if *self == Self::ZoomIn {
                    format!("t/{duration:.3}")
                } else {
                    format!("(1-t/{duration:.3})")
                };
                let factor = format!("(1+{zoom}*{progress})", zoom = config.max_zoom);
                format!(
                    "{cover},scale=w='trunc({w}*{factor}/2)*2':h='trunc({h}*{factor}/2)*2':eval=frame,crop={w}:{h},setsar=1",
                    cover = cover(w, h),
                )
            }
            Self::PanLeft | Self::PanRight => {
                let pan = config.max_pan;
                let sign = if *self == Self::PanLeft { '+' } else { '-' };
                format!(
                    "{cover},crop={w}:{h}:x='{pan}{sign}{pan}*t/{duration:.3}':y={pan},setsar=1",
                    cover = cover(w + pan * 2, h + pan * 2),
                )
            }
        }
    }
}

/// Scale to fill `w` x `h` and crop the overflow
fn cover(w: u32, h: u32) -> String {
    format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}")
}

impl fmt::Display for BackgroundMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::PanLeft => "pan_left",
            Self::PanRight => "pan_right",
        };
        f.write_str(name)
    }
}

/// How the motion of each scene is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MotionSelection {
    /// Same motion for every scene
    Fixed { effect: BackgroundMotion },
    /// Reproducible per `(seed, scene index)`
    Seeded { seed: u64 },
    /// Fresh choice on every render
    #[default]
    Random,
}

impl MotionSelection {
    /// Motion for the scene at `scene_index` in render order
    #[must_use]
    pub fn pick(&self, scene_index: usize) -> BackgroundMotion {
        let all = BackgroundMotion::ALL;
        match *self {
            Self::Fixed { effect } => effect,
            Self::Seeded { seed } => {
                let mut rng = StdRng::seed_from_u64(seed ^ (scene_index as u64).rotate_left(32));
                all[rng.gen_range(0..all.len())]
            }
            Self::Random => all[rand::thread_rng().gen_range(0..all.len())],
        }
    }
}

/// Motion strength and selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Zoom reached at the end of a zoom-in (fraction of the frame)
    pub max_zoom: f64,
    /// Horizontal travel of a pan, pixels
    pub max_pan: u32,
    pub selection: MotionSelection,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_zoom: 0.08,
            max_pan: 50,
            selection: MotionSelection::default(),
        }
    }
}
