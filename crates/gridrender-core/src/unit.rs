//! Render units: contiguous two-frame batches derived from an iteration index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::CoreError;

/// Number of frames rendered by a single job.
pub const FRAMES_PER_UNIT: u32 = 2;

/// One batch of rendering work, covering an inclusive frame range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderUnit {
    /// 1-based iteration that produced this unit.
    pub iteration: u32,
    /// First frame (inclusive).
    pub start_frame: u32,
    /// Last frame (inclusive).
    pub end_frame: u32,
}

impl RenderUnit {
    /// Unit for iteration `i`: frames `2i-1` and `2i`.
    pub fn for_iteration(iteration: u32) -> Result<Self, CoreError> {
        if iteration == 0 {
            return Err(CoreError::InvalidIteration(iteration));
        }
        let end_frame = iteration
            .checked_mul(FRAMES_PER_UNIT)
            .ok_or(CoreError::InvalidIteration(iteration))?;
        Ok(Self {
            iteration,
            start_frame: end_frame - (FRAMES_PER_UNIT - 1),
            end_frame,
        })
    }

    /// Frames covered by this unit, in increasing order.
    pub fn frames(&self) -> RangeInclusive<u32> {
        self.start_frame..=self.end_frame
    }
}

impl fmt::Display for RenderUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_frame, self.end_frame)
    }
}

/// Units for iterations `1..=total`, in submission order.
pub fn render_units(total: u32) -> impl Iterator<Item = Result<RenderUnit, CoreError>> {
    (1..=total).map(RenderUnit::for_iteration)
}
