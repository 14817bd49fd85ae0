//! Summary statistics over frame samples.

use std::ops::AddAssign;

use rayon::prelude::*;
use serde_derive::*;

use crate::{frame::Frame, temperature::TemperatureModel};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.,
        }
    }
}

impl AddAssign<f64> for Stats {
    fn add_assign(&mut self, val: f64) {
        self.count += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);
        self.mean += (val - self.mean) / self.count as f64;
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        if other.count == 0 {
            return;
        }
        let total = self.count + other.count;
        self.mean += (other.mean - self.mean) * other.count as f64 / total as f64;
        self.count = total;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

impl Stats {
    /// Statistics of `frame` in degrees Celsius.
    pub fn from_frame(frame: &Frame, model: &TemperatureModel) -> Self {
        frame
            .pixels()
            .as_slice()
            .map(|slice| {
                slice
                    .par_iter()
                    .fold(Stats::default, |mut acc, &val| {
                        acc += model.to_celsius(val);
                        acc
                    })
                    .reduce(Stats::default, |mut acc, part| {
                        acc += &part;
                        acc
                    })
            })
            .unwrap_or_else(|| {
                let mut acc = Stats::default();
                for &val in frame.pixels().iter() {
                    acc += model.to_celsius(val);
                }
                acc
            })
    }
}
