//! Host-side frame sampling.

/// Frames skipped between two processed frames by default.
pub const DEFAULT_SAMPLE_INTERVAL: u32 = 30;

/// Picks every `interval`-th frame for expensive processing.
///
/// The first frame is never processed; the `interval`-th one is.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval: u32,
    counter: u32,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

impl FrameSampler {
    /// An interval of 0 is treated as 1 (every frame).
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Count one frame and report whether it should be processed.
    pub fn should_process(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_nth_frame() {
        let mut sampler = FrameSampler::new(3);
        let picked: Vec<bool> = (0..7).map(|_| sampler.should_process()).collect();
        assert_eq!(picked, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_zero_interval_processes_everything() {
        let mut sampler = FrameSampler::new(0);
        assert_eq!(sampler.interval(), 1);
        assert!(sampler.should_process());
        assert!(sampler.should_process());
    }

    #[test]
    fn test_default_interval() {
        let mut sampler = FrameSampler::default();
        assert_eq!((0..60).filter(|_| sampler.should_process()).count(), 2);
    }
}
