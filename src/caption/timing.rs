//! Timing reconciliation
//!
//! Converts raw per-word timestamps into display intervals for highlighted
//! caption frames. Groups are folded in order: each group may truncate the
//! frames emitted before it (hard cut), so the computation is sequential.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CaptionGroup;

/// Timing correction constants (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Bias applied to every timestamp to compensate transcription lag
    pub global_offset: f64,
    /// Gap left between a hard-cut group and the next group's first frame
    pub frame_epsilon: f64,
    /// Pauses shorter than this are bridged
    pub max_silence_gap: f64,
    /// Minimum visible duration of a highlighted word
    pub min_duration: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            global_offset: -0.08,
            frame_epsilon: 0.04,
            max_silence_gap: 0.15,
            min_duration: 0.05,
        }
    }
}

/// Display interval for one highlighted word of one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedFrame {
    pub group_index: usize,
    /// Index of the highlighted word within its group
    pub highlighted: usize,
    pub start: f64,
    pub end: f64,
}

impl TimedFrame {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Accumulator threaded through the group fold
#[derive(Debug, Clone, Default)]
pub struct ReconcileState {
    pub frames: Vec<TimedFrame>,
    /// Adjusted end of the previous group's last word
    pub previous_group_end: Option<f64>,
}

impl ReconcileState {
    /// Fold one group into the state.
    #[must_use]
    pub fn step(mut self, group_index: usize, group: &CaptionGroup, config: &TimingConfig) -> Self {
        let Some(group_start) = group.start().map(|s| s + config.global_offset) else {
            return self;
        };

        if self.previous_group_end.is_some() {
            self.hard_cut((group_start - config.frame_epsilon).max(0.0));
        }

        let mut prev_word_end: Option<f64> = None;

        for (highlighted, word) in group.words.iter().enumerate() {
            let offset_start = word.start + config.global_offset;

            let adjusted_start = match prev_word_end {
                Some(prev) if offset_start - prev < config.max_silence_gap => prev,
                _ => offset_start,
            };

            let start = adjusted_start.max(0.0);
            let end = (start + config.min_duration).max(word.end + config.global_offset);

            self.frames.push(TimedFrame {
                group_index,
                highlighted,
                start,
                end,
            });
            prev_word_end = Some(end);
        }

        self.previous_group_end = prev_word_end;
        self
    }

    /// Truncate every emitted frame to end no later than `cut`.
    ///
    /// Frames left with zero or negative duration are dropped.
    fn hard_cut(&mut self, cut: f64) {
        let before = self.frames.len();
        for frame in &mut self.frames {
            frame.end = frame.end.min(cut);
        }
        self.frames.retain(|f| f.end > f.start);

        let dropped = before - self.frames.len();
        if dropped > 0 {
            debug!("Hard cut at {cut:.3}s dropped {dropped} frame(s)");
        }
    }
}

/// Reconcile all groups of a scene into ordered, non-overlapping frames.
#[must_use]
pub fn reconcile(groups: &[CaptionGroup], config: &TimingConfig) -> Vec<TimedFrame> {
    groups
        .iter()
        .enumerate()
        .fold(ReconcileState::default(), |state, (i, group)| {
            state.step(i, group, config)
        })
        .frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{group_words, Word};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const EPS: f64 = 1e-9;

    fn group(words: &[(f64, f64)]) -> CaptionGroup {
        CaptionGroup {
            words: words
                .iter()
                .enumerate()
                .map(|(i, &(s, e))| Word::new(format!("w{i}"), s, e))
                .collect(),
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_global_offset() {
        let frames = reconcile(&[group(&[(1.0, 1.3)])], &TimingConfig::default());
        assert_eq!(frames.len(), 1);
        assert!(approx(frames[0].start, 0.92));
        assert!(approx(frames[0].end, 1.22));
    }

    #[test]
    fn test_short_gap_is_bridged() {
        let frames = reconcile(&[group(&[(1.0, 1.2), (1.25, 1.5)])], &TimingConfig::default());
        assert!(approx(frames[0].end, 1.12));
        assert!(approx(frames[1].start, frames[0].end));
        assert!(approx(frames[1].end, 1.42));
    }

    #[test]
    fn test_long_gap_is_kept() {
        let frames = reconcile(&[group(&[(1.0, 1.2), (1.4, 1.6)])], &TimingConfig::default());
        assert!(approx(frames[1].start, 1.4 - 0.08));
        assert!(frames[1].start > frames[0].end);
    }

    #[test]
    fn test_overlapping_source_words_are_bridged() {
        let frames = reconcile(&[group(&[(1.0, 1.5), (1.3, 1.8)])], &TimingConfig::default());
        assert!(approx(frames[1].start, frames[0].end));
    }

    #[test]
    fn test_min_duration() {
        let frames = reconcile(&[group(&[(2.0, 2.0), (3.0, 2.9)])], &TimingConfig::default());
        for f in &frames {
            assert!(f.duration() >= 0.05 - EPS, "{f:?}");
        }
        assert!(approx(frames[0].end, 1.97));
    }

    #[test]
    fn test_negative_start_clamped() {
        let frames = reconcile(&[group(&[(0.0, 0.3)])], &TimingConfig::default());
        assert_eq!(frames[0].start, 0.0);
        assert!(approx(frames[0].end, 0.22));
    }

    #[test]
    fn test_single_group_end_to_end() {
        let frames = reconcile(
            &[group(&[(0.0, 0.3), (0.3, 0.6), (0.6, 0.9)])],
            &TimingConfig::default(),
        );
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].start, 0.0);
        for pair in frames.windows(2) {
            assert!((pair[1].start - pair[0].end).abs() <= 0.04);
        }
        assert!(approx(frames[2].end, 0.82));
        assert_eq!(
            frames.iter().map(|f| f.highlighted).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_hard_cut_between_groups() {
        let groups = vec![
            group(&[(1.0, 1.5), (1.5, 2.0), (2.0, 3.0)]),
            group(&[(2.5, 2.8)]),
        ];
        let frames = reconcile(&groups, &TimingConfig::default());
        let next_start = frames
            .iter()
            .find(|f| f.group_index == 1)
            .map(|f| f.start)
            .unwrap();

        assert!(approx(next_start, 2.42));
        for f in frames.iter().filter(|f| f.group_index == 0) {
            assert!(f.end <= next_start + EPS, "{f:?}");
        }
        let last_of_first = frames.iter().filter(|f| f.group_index == 0).last().unwrap();
        assert!(approx(last_of_first.end, 2.38));
    }

    #[test]
    fn test_hard_cut_drops_collapsed_frames() {
        let groups = vec![group(&[(1.0, 1.5)]), group(&[(1.0, 1.4)])];
        let frames = reconcile(&groups, &TimingConfig::default());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].group_index, 1);
    }

    #[test]
    fn test_state_tracks_previous_group_end() {
        let config = TimingConfig::default();
        let state = ReconcileState::default().step(0, &group(&[(1.0, 1.3)]), &config);
        assert!(approx(state.previous_group_end.unwrap(), 1.22));

        let state = state.step(1, &group(&[(2.0, 2.4)]), &config);
        assert!(approx(state.previous_group_end.unwrap(), 2.32));
        assert_eq!(state.frames.len(), 2);
    }

    #[test]
    fn test_empty_group_is_skipped() {
        let state = ReconcileState::default().step(
            0,
            &CaptionGroup { words: vec![] },
            &TimingConfig::default(),
        );
        assert!(state.frames.is_empty());
        assert!(state.previous_group_end.is_none());
    }

    #[test]
    fn test_random_scenes_never_overlap() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = TimingConfig::default();

        for _ in 0..200 {
            let n = rng.gen_range(1..20);
            let mut t = rng.gen_range(0.0..0.5);
            let mut words = Vec::with_capacity(n);
            for i in 0..n {
                let len = rng.gen_range(0.0..0.6);
                words.push(Word::new(format!("w{i}"), t, t + len));
                t += rng.gen_range(0.0..0.5);
            }

            let groups = group_words(&words).unwrap();
            let frames = reconcile(&groups, &config);

            for f in &frames {
                assert!(f.start >= 0.0);
                assert!(f.duration() > 0.0, "{f:?}");
            }
            for pair in frames.windows(2) {
                assert!(pair[0].start <= pair[1].start + EPS);
                assert!(pair[0].end <= pair[1].start + EPS, "{pair:?}");
            }

            // The last group is never cut, so the minimum duration always holds there.
            let last = groups.len() - 1;
            for f in frames.iter().filter(|f| f.group_index == last) {
                assert!(f.duration() >= config.min_duration - EPS);
            }
        }
    }
}
