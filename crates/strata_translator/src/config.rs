//! Reader configuration.

use serde::{Deserialize, Serialize};
use strata_render::NodeMask;

use crate::time::TimeSettings;

/// Settings a [`crate::Reader`] translates with.
///
/// Every field has a default, so a JSON file only needs the ones it
/// changes:
///
/// ```
/// use strata_translator::ReaderConfig;
///
/// let config: ReaderConfig = serde_json::from_str(r#"{ "thread_count": 4 }"#).unwrap();
/// assert_eq!(config.thread_count, 4);
/// assert_eq!(config.purpose, "render");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub frame: f32,
    pub motion_blur: bool,
    pub motion_start: f32,
    pub motion_end: f32,

    /// 0 walks on one thread and converts prims as pool jobs,
    /// 1 is strictly single threaded, N splits the prims over N threads
    pub thread_count: usize,

    /// Node categories that may be created
    pub mask: NodeMask,

    /// Prims with another purpose than this one (or `default`) are skipped
    pub purpose: String,

    /// Stamped on shapes created under a parent node
    pub id: u32,

    /// Log every converted prim at info level
    pub debug: bool,

    /// Convert implicit primitives (sphere, cube, cylinder, cone)
    pub convert_primitives: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let time = TimeSettings::default();
        Self {
            frame: time.frame,
            motion_blur: time.motion_blur,
            motion_start: time.motion_start,
            motion_end: time.motion_end,
            thread_count: 1,
            mask: NodeMask::ALL,
            purpose: "render".to_string(),
            id: 0,
            debug: false,
            convert_primitives: true,
        }
    }
}

impl ReaderConfig {
    pub fn time(&self) -> TimeSettings {
        TimeSettings {
            frame: self.frame,
            motion_blur: self.motion_blur,
            motion_start: self.motion_start,
            motion_end: self.motion_end,
        }
    }

    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json() {
        let config = ReaderConfig::from_json(r#"{ "frame": 12, "mask": 24, "debug": true }"#).unwrap();
        assert_eq!(config.frame, 12.0);
        assert_eq!(config.mask, NodeMask::SHAPE | NodeMask::SHADER);
        assert!(config.debug);
        assert_eq!(config.thread_count, 1);
        assert!(config.convert_primitives);
    }

    #[test]
    fn test_time_settings() {
        let config = ReaderConfig {
            motion_blur: true,
            motion_start: -0.5,
            motion_end: 0.5,
            ..Default::default()
        };
        let time = config.time();
        assert_eq!(time.start(), 0.5);
        assert_eq!(time.end(), 1.5);
    }
}
