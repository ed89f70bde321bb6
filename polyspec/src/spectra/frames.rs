//! Frame segmentation for streaming datasets.
//!
//! A frame bundles `m` consecutive analysis windows. Sampled datasets are
//! sliced into contiguous (optionally overlapping) blocks; event datasets are
//! walked with a monotone cursor over sorted timestamps so that frames can
//! stream without re-scanning from the start.

use crate::kernel::ConfigError;

/// Cursor over a sampled dataset, yielding frame start offsets.
///
/// Frame `i` covers samples `[start_i, start_i + m·window_points)` where
/// `start_i` advances by `window_shift` frames per step. `window_shift < 1`
/// produces overlapping frames; `window_shift = 1` tiles the dataset with no
/// gap and no overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrames {
    window_points: usize,
    m: usize,
    window_shift: f64,
    data_len: usize,
    cursor: f64,
}

impl SampledFrames {
    /// Build a frame cursor over `data_len` samples.
    pub fn try_new(
        data_len: usize,
        window_points: usize,
        m: usize,
        window_shift: f64,
    ) -> Result<Self, ConfigError> {
        if window_points == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "window_points",
                reason: "window length must be greater than zero",
            });
        }
        if m == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "at least one window per frame is required",
            });
        }
        if !window_shift.is_finite() || window_shift <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "window_shift",
                reason: "window_shift must be finite and > 0",
            });
        }
        Ok(Self {
            window_points,
            m,
            window_shift,
            data_len,
            cursor: 0.0,
        })
    }

    /// Samples covered by one frame.
    pub fn frame_points(&self) -> usize {
        self.window_points * self.m
    }

    /// Number of frames the cursor will yield in total.
    pub fn frame_count(&self) -> usize {
        let frame = self.frame_points();
        if self.data_len < frame {
            return 0;
        }
        let span = (self.data_len - frame) as f64;
        let step = self.window_shift * frame as f64;
        (span / step) as usize + 1
    }

    /// Start offset of the next frame, advancing the cursor.
    pub fn next_start(&mut self) -> Option<usize> {
        let start = (self.cursor * self.frame_points() as f64).round() as usize;
        if start + self.frame_points() > self.data_len {
            return None;
        }
        self.cursor += self.window_shift;
        Some(start)
    }
}

/// Outcome of advancing the event cursor across one sub-window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndIndex {
    /// Index one past the last timestamp strictly before `end_time`.
    Boundary(usize),
    /// `end_time` lies beyond the last timestamp; the dataset cannot fill
    /// another complete sub-window. Normal end-of-data, not an error.
    InsufficientData,
}

/// Scan forward from `start_index` for the boundary of the sub-window ending
/// at `end_time`. Membership is strictly `t < end_time`; a timestamp exactly
/// at the boundary belongs to the following sub-window.
pub fn find_end_index(times: &[f64], start_index: usize, end_time: f64) -> EndIndex {
    match times.last() {
        Some(&last) if end_time <= last => {}
        _ => return EndIndex::InsufficientData,
    }
    let mut idx = start_index;
    while idx < times.len() && times[idx] < end_time {
        idx += 1;
    }
    EndIndex::Boundary(idx)
}

/// One sub-window of an event frame: its absolute start time and the index
/// range of timestamps falling inside it. The range may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SubWindow {
    /// Absolute start time of the sub-window.
    pub start_time: f64,
    /// Half-open range into the timestamp array.
    pub events: core::ops::Range<usize>,
}

/// Cursor over sorted event timestamps, yielding frames of `m` sub-windows of
/// duration `t_window` each. `start_index` is monotone, never rewound.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrames {
    t_window: f64,
    m: usize,
    start_index: usize,
    frame_number: usize,
}

impl EventFrames {
    /// Build an event-frame cursor.
    pub fn try_new(t_window: f64, m: usize) -> Result<Self, ConfigError> {
        if !t_window.is_finite() || t_window <= 0.0 {
            return Err(ConfigError::InvalidArgument {
                arg: "t_window",
                reason: "t_window must be finite and > 0",
            });
        }
        if m == 0 {
            return Err(ConfigError::InvalidArgument {
                arg: "m",
                reason: "at least one window per frame is required",
            });
        }
        Ok(Self {
            t_window,
            m,
            start_index: 0,
            frame_number: 0,
        })
    }

    /// Current cursor position into the timestamp array.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Number of complete frames `times` can supply.
    pub fn expected_frames(&self, times: &[f64]) -> usize {
        match times.last() {
            Some(&last) => (last / (self.m as f64 * self.t_window)) as usize,
            None => 0,
        }
    }

    /// Slice the next frame out of `times`, advancing the cursor.
    ///
    /// Returns `None` when the dataset cannot fill another complete frame;
    /// results accumulated through the previous frame remain valid.
    pub fn next_frame(&mut self, times: &[f64]) -> Option<Vec<SubWindow>> {
        let mut subs = Vec::with_capacity(self.m);
        let mut idx = self.start_index;
        for sub in 0..self.m {
            let end_time = self.t_window * (self.m * self.frame_number + sub + 1) as f64;
            let end = match find_end_index(times, idx, end_time) {
                EndIndex::Boundary(end) => end,
                EndIndex::InsufficientData => return None,
            };
            subs.push(SubWindow {
                start_time: end_time - self.t_window,
                events: idx..end,
            });
            idx = end;
        }
        self.start_index = idx;
        self.frame_number += 1;
        Some(subs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampled_frames_tile_without_gap_or_overlap() {
        let mut frames = SampledFrames::try_new(100, 5, 4, 1.0).expect("valid config");
        assert_eq!(frames.frame_count(), 5);
        let starts: Vec<usize> = core::iter::from_fn(|| frames.next_start()).collect();
        assert_eq!(starts, vec![0, 20, 40, 60, 80]);
    }

    #[test]
    fn fractional_shift_overlaps_frames() {
        let mut frames = SampledFrames::try_new(40, 5, 4, 0.5).expect("valid config");
        let starts: Vec<usize> = core::iter::from_fn(|| frames.next_start()).collect();
        assert_eq!(starts, vec![0, 10, 20]);
        assert_eq!(frames.frame_count(), 3);
    }

    #[test]
    fn short_dataset_yields_no_frames() {
        let mut frames = SampledFrames::try_new(19, 5, 4, 1.0).expect("valid config");
        assert_eq!(frames.frame_count(), 0);
        assert_eq!(frames.next_start(), None);
    }

    #[test]
    fn boundary_membership_is_strict() {
        // Events at exact multiples of the sub-window length.
        let times = [0.0, 1.0, 1.5, 2.0, 3.0];
        assert_eq!(find_end_index(&times, 0, 1.0), EndIndex::Boundary(1));
        assert_eq!(find_end_index(&times, 1, 2.0), EndIndex::Boundary(3));
        assert_eq!(find_end_index(&times, 3, 3.0), EndIndex::Boundary(4));
    }

    #[test]
    fn end_time_past_last_timestamp_signals_insufficient_data() {
        let times = [0.0, 0.5, 0.9];
        assert_eq!(find_end_index(&times, 0, 1.0), EndIndex::InsufficientData);
    }

    #[test]
    fn empty_sub_window_leaves_cursor_in_place() {
        // No events in [1, 2); the earlier boundary index is returned again.
        let times = [0.2, 0.7, 2.3, 2.9, 3.5];
        let EndIndex::Boundary(first) = find_end_index(&times, 0, 1.0) else {
            panic!("expected boundary");
        };
        assert_eq!(first, 2);
        assert_eq!(find_end_index(&times, first, 2.0), EndIndex::Boundary(2));
    }

    #[test]
    fn event_cursor_is_monotone_and_counts_frames() {
        // Two frames of m=2 sub-windows of 1s each, sentinel event at 4s.
        let times = [0.1, 0.4, 1.2, 2.5, 3.1, 3.9, 4.0];
        let mut frames = EventFrames::try_new(1.0, 2).expect("valid config");
        assert_eq!(frames.expected_frames(&times), 2);

        let f0 = frames.next_frame(&times).expect("first frame");
        assert_eq!(f0[0].events, 0..2);
        assert_eq!(f0[1].events, 2..3);
        let after_first = frames.start_index();

        let f1 = frames.next_frame(&times).expect("second frame");
        assert!(frames.start_index() >= after_first);
        assert_eq!(f1[0].events, 3..4);
        assert_eq!(f1[1].events, 4..6);

        assert_eq!(frames.next_frame(&times), None);
    }

    #[test]
    fn event_frame_may_contain_empty_sub_windows() {
        let times = [0.1, 3.2, 4.0];
        let mut frames = EventFrames::try_new(1.0, 4).expect("valid config");
        let frame = frames.next_frame(&times).expect("one frame");
        assert_eq!(frame[0].events, 0..1);
        assert!(frame[1].events.is_empty());
        assert!(frame[2].events.is_empty());
        assert_eq!(frame[3].events, 1..2);
    }
}
