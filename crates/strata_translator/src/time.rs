//! Frame and motion blur window of a read.

use serde::{Deserialize, Serialize};
use strata_math::Interval;

/// Current frame and shutter offsets relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSettings {
    pub frame: f32,
    pub motion_blur: bool,
    /// Shutter open, relative to `frame`
    pub motion_start: f32,
    /// Shutter close, relative to `frame`
    pub motion_end: f32,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            frame: 1.0,
            motion_blur: false,
            motion_start: 0.0,
            motion_end: 0.0,
        }
    }
}

impl TimeSettings {
    /// Absolute shutter open time.
    pub fn start(&self) -> f32 {
        if self.motion_blur {
            self.frame + self.motion_start
        } else {
            self.frame
        }
    }

    /// Absolute shutter close time.
    pub fn end(&self) -> f32 {
        if self.motion_blur {
            self.frame + self.motion_end
        } else {
            self.frame
        }
    }

    pub fn shutter(&self) -> Interval {
        Interval::new(self.start(), self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutter_follows_motion_blur() {
        let mut time = TimeSettings {
            frame: 10.0,
            motion_blur: false,
            motion_start: -0.25,
            motion_end: 0.25,
        };
        assert_eq!(time.shutter(), Interval::new(10.0, 10.0));

        time.motion_blur = true;
        assert_eq!(time.start(), 9.75);
        assert_eq!(time.end(), 10.25);
    }
}
