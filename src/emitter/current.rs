use crate::config::{Config, CurrentMode};
use rand::Rng;

/// Phase current substituted into the telegram, one value per telegram.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentSource {
    Constant(u32),
    /// Counts up from `start` to `max` and wraps around
    Ramp { start: u32, max: u32, next: u32 },
    /// Uniformly distributed in `min..=max`
    Random { min: u32, max: u32 },
}

impl CurrentSource {
    pub fn from_config(config: &Config) -> Self {
        match config.current_mode {
            CurrentMode::Constant => CurrentSource::Constant(config.current),
            CurrentMode::Ramp => CurrentSource::Ramp {
                start: config.current,
                max: config.current_max.max(config.current),
                next: config.current,
            },
            CurrentMode::Random => CurrentSource::Random {
                min: config.current,
                max: config.current_max.max(config.current),
            },
        }
    }

    pub fn next_value(&mut self) -> u32 {
        match self {
            CurrentSource::Constant(v) => *v,
            CurrentSource::Ramp { start, max, next } => {
                let value = *next;
                *next = if value >= *max { *start } else { value + 1 };
                value
            }
            CurrentSource::Random { min, max } => rand::thread_rng().gen_range(*min..=*max),
        }
    }
}
