//! Sliding-window vibration filter.
//!
//! Each raw piezo sample contributes the absolute delta against the
//! previous sample, pre-scaled by the window size, into a fixed 50-slot
//! ring. The filtered magnitude is the window sum, i.e. a moving average
//! of the sample-to-sample deltas. Until the window has wrapped once the
//! output is pinned to zero so a cold start cannot trip the override.

use heapless::HistoryBuffer;

use iiot_common::consts::WINDOW_SIZE;

#[derive(Debug, Default)]
pub struct VibrationFilter {
    window: HistoryBuffer<f64, WINDOW_SIZE>,
    prev_raw: u16,
    samples_seen: u64,
}

impl VibrationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw ADC sample, returning the filtered magnitude.
    ///
    /// Returns 0 until `WINDOW_SIZE + 1` samples have been seen: the
    /// first sample has no predecessor and the window must be full of
    /// real deltas before the sum means anything.
    pub fn update(&mut self, raw: u16) -> i32 {
        let delta = f64::from(raw.abs_diff(self.prev_raw));
        self.prev_raw = raw;
        self.window.write(delta / WINDOW_SIZE as f64);
        self.samples_seen += 1;

        if self.samples_seen > WINDOW_SIZE as u64 {
            self.window.oldest_ordered().sum::<f64>().round() as i32
        } else {
            0
        }
    }

    /// Discard all history. The next `WINDOW_SIZE` samples read as zero.
    pub fn reset(&mut self) {
        self.window.clear();
        self.prev_raw = 0;
        self.samples_seen = 0;
    }
}
