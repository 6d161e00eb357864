/// A closed time window, used for the camera shutter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns the size of the interval (max - min).
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// Returns `count` evenly spaced times from `min` to `max`.
    ///
    /// The first and last entries are exactly `min` and `max`, so samples taken
    /// at them match the shutter bounds without rounding drift.
    pub fn uniform_samples(&self, count: usize) -> Vec<f32> {
        match count {
            0 => Vec::new(),
            1 => vec![self.min],
            _ => {
                let step = self.size() / (count - 1) as f32;
                let mut times: Vec<f32> = (0..count).map(|i| self.min + step * i as f32).collect();
                times[count - 1] = self.max;
                times
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_size() {
        let interval = Interval::new(2.0, 7.0);
        assert_eq!(interval.size(), 5.0);

        let negative = Interval::new(-0.5, 0.5);
        assert_eq!(negative.size(), 1.0);
    }

    #[test]
    fn test_uniform_samples_hit_bounds() {
        let shutter = Interval::new(0.75, 1.25);
        let times = shutter.uniform_samples(3);

        assert_eq!(times.len(), 3);
        assert_eq!(times[0], 0.75);
        assert_eq!(times[1], 1.0);
        assert_eq!(times[2], 1.25);
    }

    #[test]
    fn test_uniform_samples_degenerate_counts() {
        let shutter = Interval::new(-0.1, 0.3);
        assert!(shutter.uniform_samples(0).is_empty());
        assert_eq!(shutter.uniform_samples(1), vec![-0.1]);
    }
}
