//! Host frame timing
//!
//! The host wraps each of its per-frame callbacks with [`FrameTimer::measure`]
//! and calls [`FrameTimer::end_frame`] once the frame is rendered. The
//! resulting [`FrameTimes`] feed the server's status line.

use std::time::{Duration, Instant};

/// Per-frame host callbacks that are timed separately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Main update callback
    Tick,
    /// Per-scanline callback
    Scanline,
    /// Per-border-row callback
    Border,
}

/// One frame's host time, in tenths of a millisecond
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimes {
    pub tick_ms10: u32,
    pub scanline_ms10: u32,
    pub border_ms10: u32,
    pub total_ms10: u32,
}

impl FrameTimes {
    /// `123` → `12.3ms`
    pub fn format_ms10(ms10: u32) -> String {
        format!("{}.{}ms", ms10 / 10, ms10 % 10)
    }
}

/// Accumulates time spent in host callbacks during the current frame
#[derive(Debug, Default)]
pub struct FrameTimer {
    current: [Duration; 3],
    last: FrameTimes,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, charging its wall time to `phase`
    pub fn measure<R>(&mut self, phase: Phase, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.record(phase, start.elapsed());
        result
    }

    /// Charge an externally measured duration to `phase`
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        self.current[phase as usize] += elapsed;
    }

    /// Close the frame: snapshot the accumulated times and start over
    pub fn end_frame(&mut self) -> FrameTimes {
        let [tick, scanline, border] = self.current;
        self.last = FrameTimes {
            tick_ms10: to_ms10(tick),
            scanline_ms10: to_ms10(scanline),
            border_ms10: to_ms10(border),
            total_ms10: to_ms10(tick + scanline + border),
        };
        self.current = [Duration::ZERO; 3];
        self.last
    }

    /// Snapshot from the last completed frame
    pub fn last(&self) -> FrameTimes {
        self.last
    }
}

/// Round a duration to tenths of a millisecond
fn to_ms10(d: Duration) -> u32 {
    // 1 ms10 = 100µs
    let micros = d.as_micros();
    ((micros + 50) / 100).min(u32::MAX as u128) as u32
}
