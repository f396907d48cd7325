use crate::foundation::error::{PasslineError, PasslineResult};

/// Inclusive frame range with a render step, as host render globals store it.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// First frame.
    pub start: f64,
    /// Last frame, inclusive.
    pub end: f64,
    /// Frame increment, > 0.
    pub step: f64,
}

impl FrameRange {
    /// Validating constructor: finite values, `start <= end`, positive step.
    pub fn new(start: f64, end: f64, step: f64) -> PasslineResult<Self> {
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(PasslineError::validation("FrameRange values must be finite"));
        }
        if start > end {
            return Err(PasslineError::validation("FrameRange start must be <= end"));
        }
        if step <= 0.0 {
            return Err(PasslineError::validation("FrameRange step must be > 0"));
        }
        Ok(Self { start, end, step })
    }

    /// Number of frames the range renders, step included.
    pub fn frame_count(self) -> u64 {
        ((self.end - self.start) / self.step).floor() as u64 + 1
    }
}

/// Output image dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}
