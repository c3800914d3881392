use std::time::Instant;

/// Frames-per-second over fixed-size windows of frames.
pub struct FrameRateCounter {
    window: usize,
    frames: usize,
    window_start: Instant,
}

impl FrameRateCounter {
    pub fn new(window: usize) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: usize, start: Instant) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            window_start: start,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// Counts one frame. When the window fills, returns the rate since the
    /// window began and starts a new window at `now`.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames < self.window {
            return None;
        }
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            f64::INFINITY
        };
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}
