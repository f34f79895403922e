/// Euclidean-style pulse distribution over a fixed number of steps
use std::fmt;

use crate::error::ValidationError;

/// A fixed-length cycle of hit/rest steps. Never resized after generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    steps: Vec<bool>,
}

impl Pattern {
    /// Spread `pulses` hits across `step_count` steps, rotated by `offset`.
    ///
    /// Hits are placed by walking the steps with a travel accumulator: a hit
    /// lands on the first step and afterwards whenever the accumulator reaches
    /// the rounded gap, at which point the exact (fractional) gap is subtracted
    /// so the remainder carries into the next interval. Every step is visited;
    /// the number of hits is whatever that process produces and may differ from
    /// `pulses` for non-integral ratios.
    ///
    /// The offset is applied to each hit index modulo `step_count`, so negative
    /// offsets rotate the other way.
    pub fn generate(step_count: usize, pulses: usize, offset: i64) -> Result<Self, ValidationError> {
        if step_count == 0 {
            return Err(ValidationError::InvalidStepCount);
        }
        if pulses > step_count {
            return Err(ValidationError::PulsesOutOfRange {
                pulses,
                steps: step_count,
            });
        }

        let mut steps = vec![false; step_count];
        if pulses == 0 {
            return Ok(Self { steps });
        }

        let gap = step_count as f64 / pulses as f64;
        let threshold = gap.round();
        let mut travel = 0.0_f64;
        for i in 0..step_count {
            if travel == 0.0 || travel >= threshold {
                let ix = (i as i64 + offset).rem_euclid(step_count as i64) as usize;
                steps[ix] = true;
                if travel > 0.0 {
                    travel -= gap;
                }
            }
            travel += 1.0;
        }

        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the step at an unbounded global index is a hit.
    pub fn is_pulse(&self, step: u64) -> bool {
        let ix = (step % self.steps.len() as u64) as usize;
        self.steps[ix]
    }

    pub fn steps(&self) -> &[bool] {
        &self.steps
    }

    pub fn hit_count(&self) -> usize {
        self.steps.iter().filter(|&&hit| hit).count()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hit) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(if *hit { "1" } else { "0" })?;
        }
        Ok(())
    }
}
