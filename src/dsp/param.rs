//! Automatable parameter with WebAudio-style `setValueAtTime` and
//! `setTargetAtTime` events.

use std::collections::VecDeque;

use crate::error::ToneError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue {
        time: f64,
        value: f64,
    },
    SetTarget {
        time: f64,
        target: f64,
        time_constant: f64,
    },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. } | Automation::SetTarget { time, .. } => time,
        }
    }
}

/// A parameter advanced one sample at a time by the renderer.
///
/// Scheduled events take effect once the render clock reaches their time.
/// A target ramp moves the value a fixed fraction of the remaining
/// distance each sample, so it never passes its target.
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f64,
    events: VecDeque<Automation>,
    /// Active ramp as (target, time constant in seconds).
    ramp: Option<(f64, f64)>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        AudioParam {
            value,
            events: VecDeque::new(),
            ramp: None,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> Result<(), ToneError> {
        check_finite(value)?;
        check_finite(time)?;
        self.schedule(Automation::SetValue { time, value });
        Ok(())
    }

    pub fn set_target_at_time(
        &mut self,
        target: f64,
        time: f64,
        time_constant: f64,
    ) -> Result<(), ToneError> {
        check_finite(target)?;
        check_finite(time)?;
        check_finite(time_constant)?;
        if time_constant < 0.0 {
            return Err(ToneError::InvalidParameter {
                value: time_constant,
            });
        }
        self.schedule(Automation::SetTarget {
            time,
            target,
            time_constant,
        });
        Ok(())
    }

    /// A new event cancels every queued event at or after its time, so
    /// the queue stays sorted and a frozen clock cannot pile events up.
    fn schedule(&mut self, event: Automation) {
        let at = self.events.partition_point(|e| e.time() < event.time());
        self.events.truncate(at);
        self.events.push_back(event);
    }

    /// Value for the sample at `now`, then step any ramp one sample on.
    pub fn advance(&mut self, now: f64, sample_rate: f64) -> f64 {
        while self.events.front().is_some_and(|e| e.time() <= now) {
            match self.events.pop_front() {
                Some(Automation::SetValue { value, .. }) => {
                    self.value = value;
                    self.ramp = None;
                }
                Some(Automation::SetTarget {
                    target,
                    time_constant,
                    ..
                }) => {
                    self.ramp = Some((target, time_constant));
                }
                None => break,
            }
        }

        let out = self.value;
        if let Some((target, time_constant)) = self.ramp {
            if time_constant == 0.0 {
                self.value = target;
                self.ramp = None;
            } else {
                let k = 1.0 - (-1.0 / (time_constant * sample_rate)).exp();
                self.value += (target - self.value) * k;
            }
        }
        out
    }
}

fn check_finite(value: f64) -> Result<(), ToneError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ToneError::InvalidParameter { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    fn run(param: &mut AudioParam, from: usize, samples: usize) -> Vec<f64> {
        (from..from + samples)
            .map(|i| param.advance(i as f64 / SR, SR))
            .collect()
    }

    #[test]
    fn set_value_jumps_at_its_time() {
        let mut p = AudioParam::new(1.0);
        p.set_value_at_time(5.0, 10.0 / SR).expect("finite");
        let out = run(&mut p, 0, 12);
        assert_eq!(out[9], 1.0);
        assert_eq!(out[10], 5.0);
        assert_eq!(out[11], 5.0);
    }

    #[test]
    fn target_ramp_is_monotonic_without_overshoot() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(0.5, 0.0, 0.01).expect("finite");
        let out = run(&mut p, 0, 4800);
        assert!(out.windows(2).all(|w| w[1] >= w[0]), "Ramp should be monotonic");
        assert!(out.iter().all(|&v| v <= 0.5), "Ramp should not overshoot");
        // 100 ms is ten time constants
        assert!((out[4799] - 0.5).abs() < 1e-4, "Should settle near 0.5, got {}", out[4799]);
    }

    #[test]
    fn one_time_constant_covers_about_63_percent() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(1.0, 0.0, 0.01).expect("finite");
        let out = run(&mut p, 0, 481);
        assert!((out[480] - 0.632).abs() < 0.01, "Got {}", out[480]);
    }

    #[test]
    fn downward_ramp() {
        let mut p = AudioParam::new(0.9);
        p.set_target_at_time(0.0, 0.0, 0.02).expect("finite");
        let out = run(&mut p, 0, 9600);
        assert!(out.windows(2).all(|w| w[1] <= w[0]));
        assert!(out.iter().all(|&v| v >= 0.0));
        assert!(out[9599] < 0.9 * 0.01);
    }

    #[test]
    fn retarget_redirects_in_flight_ramp() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(1.0, 0.0, 0.01).expect("finite");
        run(&mut p, 0, 240);
        let peak = p.value();
        p.set_target_at_time(0.2, 240.0 / SR, 0.01).expect("finite");
        let second = run(&mut p, 240, 4800);
        assert!(second.iter().all(|&v| v <= peak + 1e-12));
        assert!((second[4799] - 0.2).abs() < 1e-3);
    }

    #[test]
    fn set_value_cancels_ramp() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(1.0, 0.0, 0.01).expect("finite");
        run(&mut p, 0, 100);
        p.set_value_at_time(0.25, 100.0 / SR).expect("finite");
        let out = run(&mut p, 100, 100);
        assert!(out.iter().all(|&v| v == 0.25));
    }

    #[test]
    fn zero_time_constant_jumps() {
        let mut p = AudioParam::new(0.0);
        p.set_target_at_time(0.7, 0.0, 0.0).expect("finite");
        let out = run(&mut p, 0, 2);
        assert_eq!(out[1], 0.7);
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut p = AudioParam::new(0.0);
        assert!(p.set_value_at_time(f64::NAN, 0.0).is_err());
        assert!(p.set_target_at_time(f64::INFINITY, 0.0, 0.01).is_err());
        assert!(p.set_target_at_time(1.0, 0.0, -0.01).is_err());
        assert_eq!(p.value(), 0.0);
    }

    #[test]
    fn later_event_replaces_pending_ones() {
        let mut p = AudioParam::new(440.0);
        for i in 0..100_000 {
            p.set_value_at_time(440.0 + i as f64 * 0.01, 0.0).expect("finite");
        }
        assert_eq!(p.events.len(), 1, "Only the newest event should stay queued");
        let out = run(&mut p, 0, 1);
        assert!((out[0] - (440.0 + 99_999.0 * 0.01)).abs() < 1e-9);
    }

    #[test]
    fn scheduling_earlier_cancels_later_events() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 10.0 / SR).expect("finite");
        p.set_value_at_time(2.0, 20.0 / SR).expect("finite");
        p.set_value_at_time(3.0, 15.0 / SR).expect("finite");
        assert_eq!(p.events.len(), 2);
        let out = run(&mut p, 0, 25);
        assert_eq!(out[12], 1.0);
        assert_eq!(out[24], 3.0, "Event at sample 20 should have been cancelled");
    }
}
