use std::{collections::VecDeque, convert::TryFrom as _, time::Duration};

/// Rolling average of frame durations over a time window.
pub struct FpsCounter {
    samples: VecDeque<u32>,
    sum: u32,
    window: u32,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        let window = u32::try_from(window.as_micros()).unwrap_or(u32::MAX);
        FpsCounter {
            samples: VecDeque::new(),
            sum: 0,
            window,
        }
    }

    pub fn add_sample(&mut self, sample: Duration) {
        let sample = match u32::try_from(sample.as_micros()) {
            Ok(sample) if sample < self.window => sample,
            Ok(sample) => {
                self.samples.clear();
                self.samples.push_back(sample);
                self.sum = sample;
                return;
            }
            Err(_) => {
                self.samples.clear();
                self.samples.push_back(!0);
                self.sum = !0;
                return;
            }
        };

        // Evict oldest samples until the new one fits into the window.
        while self.sum.checked_add(sample).map_or(true, |s| s > self.window) {
            match self.samples.pop_front() {
                Some(old) => self.sum = self.sum.saturating_sub(old),
                None => {
                    self.sum = 0;
                    break;
                }
            }
        }

        self.sum += sample;
        self.samples.push_back(sample);
    }

    pub fn average(&self) -> Duration {
        let micros = match u32::try_from(self.samples.len()) {
            Ok(0) => 0,
            Ok(num) => self.sum / num,
            Err(_) => 0,
        };
        Duration::from_micros(micros.into())
    }

    pub fn fps(&self) -> f32 {
        let average = self.average().as_secs_f32();
        if average > 0.0 {
            1.0 / average
        } else {
            0.0
        }
    }
}
