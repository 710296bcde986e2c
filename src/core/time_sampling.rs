//! Time sampling: mapping between sample indices and times.
//!
//! A sampling is immutable once built. Archives keep a table of them and
//! properties refer to an entry by index.

use crate::util::{Chrono, Error, Result};

/// Slack, in units of one interval, applied when dividing by the interval so
/// that `start + k * dt` always resolves to `k`.
const INDEX_EPSILON: f64 = 1e-9;

/// Stored interval marking an acyclic sampling.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = f64::MAX / 32.0;

/// Sampling discipline and its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// `start_time + index * time_per_cycle`.
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },
    /// `times` repeats every `time_per_cycle`.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },
    /// One explicit time per sample.
    Acyclic { times: Vec<Chrono> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimeSampling {
    sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// Uniform sampling at one unit per sample starting at 0. Always entry 0
    /// of an archive's table.
    pub fn identity() -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle: 1.0,
                start_time: 0.0,
            },
        }
    }

    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Result<Self> {
        if !(time_per_cycle.is_finite() && time_per_cycle > 0.0) || !start_time.is_finite() {
            return Err(Error::InvalidTimeSampling(format!(
                "uniform interval {time_per_cycle} from {start_time}"
            )));
        }
        Ok(Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        })
    }

    /// Times must be strictly increasing and fit inside one cycle.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Result<Self> {
        check_ascending(&times)?;
        let span = times[times.len() - 1] - times[0];
        if !(time_per_cycle.is_finite() && time_per_cycle > span) {
            return Err(Error::InvalidTimeSampling(format!(
                "cycle {time_per_cycle} shorter than its times"
            )));
        }
        Ok(Self {
            sampling_type: TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            },
        })
    }

    /// Times must be strictly increasing.
    pub fn acyclic(times: Vec<Chrono>) -> Result<Self> {
        check_ascending(&times)?;
        Ok(Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        })
    }

    /// Rebuild from the stored (interval, times) pair.
    pub fn from_stored(time_per_cycle: Chrono, times: Vec<Chrono>) -> Result<Self> {
        if time_per_cycle == ACYCLIC_TIME_PER_CYCLE {
            Self::acyclic(times)
        } else if times.len() == 1 {
            Self::uniform(time_per_cycle, times[0])
        } else {
            Self::cyclic(time_per_cycle, times)
        }
    }

    pub fn sampling_type(&self) -> &TimeSamplingType {
        &self.sampling_type
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Interval as written to the archive table.
    pub fn stored_time_per_cycle(&self) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Uniform { time_per_cycle, .. }
            | TimeSamplingType::Cyclic { time_per_cycle, .. } => *time_per_cycle,
            TimeSamplingType::Acyclic { .. } => ACYCLIC_TIME_PER_CYCLE,
        }
    }

    /// Times as written to the archive table.
    pub fn stored_times(&self) -> &[Chrono] {
        match &self.sampling_type {
            TimeSamplingType::Uniform { start_time, .. } => std::slice::from_ref(start_time),
            TimeSamplingType::Cyclic { times, .. } | TimeSamplingType::Acyclic { times } => times,
        }
    }

    /// Largest sample count this sampling can describe, if bounded.
    pub fn max_supported_samples(&self) -> Option<usize> {
        match &self.sampling_type {
            TimeSamplingType::Acyclic { times } => Some(times.len()),
            _ => None,
        }
    }

    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => start_time + index as Chrono * time_per_cycle,
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                let cycle = index / times.len();
                times[index % times.len()] + cycle as Chrono * time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => times[index.min(times.len() - 1)],
        }
    }

    /// Largest index whose time is `<= time`, clamped into `[0, n-1]`.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }
        let last = self.last_index(num_samples);
        let index = match &self.sampling_type {
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => {
                if time <= *start_time {
                    0
                } else {
                    let steps = ((time - start_time) / time_per_cycle + INDEX_EPSILON).floor();
                    clamp_steps(steps, last)
                }
            }
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                if time <= times[0] {
                    0
                } else {
                    let cycle = ((time - times[0]) / time_per_cycle + INDEX_EPSILON).floor();
                    let local = time - cycle * time_per_cycle + INDEX_EPSILON * time_per_cycle;
                    let within = times.partition_point(|&t| t <= local).saturating_sub(1);
                    clamp_steps(cycle * times.len() as f64 + within as f64, last)
                }
            }
            TimeSamplingType::Acyclic { times } => {
                times[..=last].partition_point(|&t| t <= time).saturating_sub(1)
            }
        };
        (index, self.sample_time(index))
    }

    /// Smallest index whose time is `>= time`, clamped into `[0, n-1]`.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }
        let last = self.last_index(num_samples);
        let (floor, floor_time) = self.floor_index(time, num_samples);
        if floor == last || self.same_time(floor_time, time) || floor_time >= time {
            return (floor, floor_time);
        }
        (floor + 1, self.sample_time(floor + 1))
    }

    /// Closest index to `time`; a tie goes to the later sample.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }
        let (floor, floor_time) = self.floor_index(time, num_samples);
        let (ceil, ceil_time) = self.ceil_index(time, num_samples);
        if time - floor_time < ceil_time - time {
            (floor, floor_time)
        } else {
            (ceil, ceil_time)
        }
    }

    fn last_index(&self, num_samples: usize) -> usize {
        let last = num_samples - 1;
        match self.max_supported_samples() {
            Some(max) => last.min(max - 1),
            None => last,
        }
    }

    fn same_time(&self, a: Chrono, b: Chrono) -> bool {
        let scale = match &self.sampling_type {
            TimeSamplingType::Uniform { time_per_cycle, .. }
            | TimeSamplingType::Cyclic { time_per_cycle, .. } => *time_per_cycle,
            TimeSamplingType::Acyclic { .. } => 0.0,
        };
        (a - b).abs() <= INDEX_EPSILON * scale
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::identity()
    }
}

fn check_ascending(times: &[Chrono]) -> Result<()> {
    if times.is_empty() {
        return Err(Error::InvalidTimeSampling("no sample times".into()));
    }
    if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::InvalidTimeSampling(
            "sample times must be finite and strictly increasing".into(),
        ));
    }
    Ok(())
}

fn clamp_steps(steps: f64, last: usize) -> usize {
    if steps <= 0.0 {
        0
    } else if steps >= last as f64 {
        last
    } else {
        steps as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 24.0;

    #[test]
    fn test_uniform_boundaries() {
        let t0 = 1.5;
        let n = 48;
        let ts = TimeSampling::uniform(DT, t0).unwrap();

        assert_eq!(ts.floor_index(t0 - 1000.0 * DT, n).0, 0);
        assert_eq!(ts.floor_index(t0 + (n + 1000) as f64 * DT, n).0, n - 1);
        for k in 0..n {
            let t = t0 + k as f64 * DT;
            assert_eq!(ts.floor_index(t, n).0, k, "floor at sample {k}");
            assert_eq!(ts.ceil_index(t, n).0, k, "ceil at sample {k}");
            assert_eq!(ts.near_index(t, n).0, k, "near at sample {k}");
        }
    }

    #[test]
    fn test_uniform_between_samples() {
        let ts = TimeSampling::uniform(1.0, 0.0).unwrap();
        assert_eq!(ts.floor_index(1.25, 10), (1, 1.0));
        assert_eq!(ts.ceil_index(1.25, 10), (2, 2.0));
        assert_eq!(ts.near_index(1.25, 10), (1, 1.0));
        assert_eq!(ts.near_index(1.5, 10), (2, 2.0));
        assert_eq!(ts.near_index(1.75, 10), (2, 2.0));
        assert_eq!(ts.ceil_index(50.0, 10), (9, 9.0));
        assert_eq!(ts.floor_index(3.0, 0), (0, 0.0));
    }

    #[test]
    fn test_acyclic_search() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]).unwrap();
        assert_eq!(ts.floor_index(1.0, 4), (2, 1.0));
        assert_eq!(ts.floor_index(1.9, 4), (2, 1.0));
        assert_eq!(ts.ceil_index(1.1, 4), (3, 2.0));
        assert_eq!(ts.floor_index(-3.0, 4), (0, 0.0));
        assert_eq!(ts.floor_index(99.0, 4), (3, 2.0));
        assert_eq!(ts.floor_index(99.0, 2), (1, 0.5));
        // more samples than times clamps to the last defined time
        assert_eq!(ts.floor_index(99.0, 10), (3, 2.0));
        assert_eq!(ts.max_supported_samples(), Some(4));
    }

    #[test]
    fn test_cyclic() {
        // two samples per unit cycle: 0.0, 0.25, 1.0, 1.25, ...
        let ts = TimeSampling::cyclic(1.0, vec![0.0, 0.25]).unwrap();
        assert_eq!(ts.sample_time(3), 1.25);
        assert_eq!(ts.floor_index(1.1, 10), (2, 1.0));
        assert_eq!(ts.floor_index(1.25, 10), (3, 1.25));
        assert_eq!(ts.floor_index(1.9, 10), (3, 1.25));
        assert_eq!(ts.ceil_index(1.3, 10), (4, 2.0));
        assert_eq!(ts.floor_index(100.0, 10), (9, 4.25));
    }

    #[test]
    fn test_stored_form() {
        let uniform = TimeSampling::uniform(DT, 2.0).unwrap();
        let stored = TimeSampling::from_stored(
            uniform.stored_time_per_cycle(),
            uniform.stored_times().to_vec(),
        )
        .unwrap();
        assert_eq!(stored, uniform);

        let acyclic = TimeSampling::acyclic(vec![1.0, 3.0]).unwrap();
        assert_eq!(acyclic.stored_time_per_cycle(), ACYCLIC_TIME_PER_CYCLE);
        assert_eq!(
            TimeSampling::from_stored(ACYCLIC_TIME_PER_CYCLE, vec![1.0, 3.0]).unwrap(),
            acyclic
        );
        assert!(TimeSampling::default().is_identity());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(TimeSampling::uniform(0.0, 0.0).is_err());
        assert!(TimeSampling::acyclic(vec![]).is_err());
        assert!(TimeSampling::acyclic(vec![1.0, 1.0]).is_err());
        assert!(TimeSampling::cyclic(0.5, vec![0.0, 0.75]).is_err());
    }
}
