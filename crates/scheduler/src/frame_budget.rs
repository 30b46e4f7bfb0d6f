//! Frame budget for position passes
//!
//! A notification pass runs inside one animation frame. Its duration is
//! measured against the display's frame time so slow subscriber sets show up
//! in the logs.
//!
//! - 60 Hz: 16.67ms per frame
//! - 120 Hz (ProMotion): 8.33ms per frame

use std::time::{Duration, Instant};

/// Default frame budget for 60 FPS displays (16.67ms)
pub const FRAME_BUDGET_60FPS: Duration = Duration::from_micros(16_667);

/// Frame budget for 120 FPS displays (8.33ms)
pub const FRAME_BUDGET_120FPS: Duration = Duration::from_micros(8_333);

/// Clock for one pass, started on construction
///
/// ```
/// use sticker_scheduler::frame_budget::{FrameBudget, FRAME_BUDGET_120FPS};
///
/// let pass = FrameBudget::new(FRAME_BUDGET_120FPS);
/// // ... run subscribers ...
/// if let Some(over) = pass.overrun() {
///     eprintln!("pass ran {over:?} over budget");
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    started: Instant,
    budget: Duration,
}

impl FrameBudget {
    pub fn new(budget: Duration) -> Self {
        Self { started: Instant::now(), budget }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time spent beyond the budget once the budget is used up
    pub fn overrun(&self) -> Option<Duration> {
        let elapsed = self.elapsed();
        (elapsed >= self.budget).then(|| elapsed - self.budget)
    }

    pub fn is_exceeded(&self) -> bool {
        self.overrun().is_some()
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::new(FRAME_BUDGET_60FPS)
    }
}
