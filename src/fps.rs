//! Frame-rate tracking
//!
//! Rolling time-window average over recent frame durations, measured in the
//! host's monotonic counter ticks.

use std::time::Duration;

/// Ring buffer capacity
pub const MAX_SAMPLES: usize = 256;

/// Rolling-window FPS tracker
#[derive(Debug, Clone)]
pub struct FpsTracker {
    window: Duration,

    last_counter: u64,
    freq: u64,
    window_ticks: u64,

    /// Frame durations, oldest at `head`
    samples: [u64; MAX_SAMPLES],
    head: usize,
    count: usize,
    sum: u64,

    fps: u32,
    initialized: bool,
}

impl FpsTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_counter: 0,
            freq: 0,
            window_ticks: 0,
            samples: [0; MAX_SAMPLES],
            head: 0,
            count: 0,
            sum: 0,
            fps: 0,
            initialized: false,
        }
    }

    /// Record a frame at `counter` ticks of a clock running at `freq` ticks/s.
    ///
    /// Returns true only when the rounded FPS changed.
    pub fn on_frame(&mut self, counter: u64, freq: u64) -> bool {
        if freq == 0 {
            return false;
        }

        if !self.initialized || self.freq != freq {
            self.reset(counter, freq);
            return false;
        }

        let dt = counter.wrapping_sub(self.last_counter);
        self.last_counter = counter;

        if dt == 0 {
            return false;
        }

        // a counter that stepped backwards shows up as a huge delta
        if self.sum.checked_add(dt).is_none() {
            self.reset(counter, freq);
            return false;
        }

        self.push(dt);
        self.trim();

        if self.sum == 0 || self.count == 0 {
            return false;
        }

        // round(count * freq / sum)
        let num = self.count as u128 * self.freq as u128;
        let sum = self.sum as u128;
        let fps = ((num + sum / 2) / sum).min(u32::MAX as u128) as u32;

        if fps != self.fps {
            self.fps = fps;
            return true;
        }
        false
    }

    /// Last rounded FPS (0 until enough frames were seen)
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Number of samples currently inside the window
    pub fn sample_count(&self) -> usize {
        self.count
    }

    fn reset(&mut self, counter: u64, freq: u64) {
        *self = Self::new(self.window);
        self.initialized = true;
        self.last_counter = counter;
        self.freq = freq;
        self.window_ticks = window_ticks(self.window, freq);
    }

    fn push(&mut self, dt: u64) {
        if self.count < MAX_SAMPLES {
            let idx = (self.head + self.count) % MAX_SAMPLES;
            self.samples[idx] = dt;
            self.count += 1;
            self.sum += dt;
            return;
        }

        // overwrite oldest
        self.sum -= self.samples[self.head];
        self.samples[self.head] = dt;
        self.sum += dt;
        self.head = (self.head + 1) % MAX_SAMPLES;
    }

    fn trim(&mut self) {
        while self.count > 1 && self.sum > self.window_ticks {
            self.sum -= self.samples[self.head];
            self.head = (self.head + 1) % MAX_SAMPLES;
            self.count -= 1;
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

fn window_ticks(window: Duration, freq: u64) -> u64 {
    let ticks = freq as u128 * window.as_nanos() / 1_000_000_000;
    (ticks.min(u64::MAX as u128) as u64).max(1)
}
