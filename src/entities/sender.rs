use tracing::debug;

use crate::{
    packet::Feedback,
    time::Delta,
    units::{Bytes, Kbps},
};

// Ramp-up
const QUEUING_DELAY_BOUND: Delta = Delta::new(10.0);
const RAMP_UP_DELAY: Delta = Delta::new(50.0); // T_th
const GAMMA_MAX: f64 = 0.5;

// Ramp-down
const RAMP_DOWN_DELAY: Delta = Delta::new(40.0);
const RAMP_DOWN_GAMMA_MAX: f64 = 0.9;

// Gradual update
const TAU: f64 = 500.0; // ms
const ETA: f64 = 2.0;
const KAPPA: f64 = 1.0;
const REFERENCE_DELAY: f64 = 10.0; // x_ref, ms
const PRIORITY_WEIGHT: f64 = 1.0;

/// Which generation of the control law the sender runs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    derivative::Derivative,
    serde::Serialize,
    serde::Deserialize,
)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[derivative(Default)]
    Original,
    /// Adds an accelerated ramp-down, accounts for self-inflicted queuing, and damps increases at
    /// low bitrates.
    Refined,
}

/// The regime taken on a feedback.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Regime {
    RampUp,
    RampDown,
    Gradual,
}

impl Mode {
    fn should_ramp_up(self, fb: &Feedback, extra_delay: Delta) -> bool {
        let calm = fb.loss_ratio == 0.0
            && fb.queuing_delay < QUEUING_DELAY_BOUND
            && fb.derivative < QUEUING_DELAY_BOUND.into_f64() / fb.interval.into_f64();
        match self {
            Mode::Original => calm,
            Mode::Refined => {
                let bound = QUEUING_DELAY_BOUND.scale_by(1.0 / 3.0);
                calm && (fb.smoothed_delay < bound || fb.smoothed_delay - extra_delay < bound)
                    && fb.receiving_rate > Sender::MIN_BITRATE
            }
        }
    }

    fn should_ramp_down(self, fb: &Feedback) -> bool {
        match self {
            Mode::Original => false,
            Mode::Refined => fb.congestion_signal.max(fb.smoothed_delay) > RAMP_DOWN_DELAY,
        }
    }

    fn ramp_up(self, fb: &Feedback) -> Kbps {
        let headroom = fb.baseline_delay + fb.interval;
        let mut gamma = (RAMP_UP_DELAY.into_f64() / headroom.into_f64()).min(GAMMA_MAX);
        if self == Mode::Refined {
            gamma /= 2.0;
        }
        fb.receiving_rate.scale_by(1.0 + gamma)
    }

    fn ramp_down(self, fb: &Feedback) -> Kbps {
        let combined = (fb.congestion_signal + fb.smoothed_delay).into_f64();
        let gamma = (2.0 * RAMP_DOWN_DELAY.into_f64() / combined)
            .sqrt()
            .min(RAMP_DOWN_GAMMA_MAX);
        fb.receiving_rate.scale_by(gamma)
    }

    fn gradual(self, bitrate: Kbps, fb: &Feedback, extra_delay: Delta) -> Kbps {
        let signal = match self {
            Mode::Original => fb.congestion_signal,
            Mode::Refined => (fb.congestion_signal - extra_delay).max(Delta::ZERO),
        };
        let x_hat = signal.into_f64() + ETA * TAU * fb.derivative;
        let range = (Sender::MAX_BITRATE - Sender::MIN_BITRATE).into_f64();
        let theta = PRIORITY_WEIGHT * range * REFERENCE_DELAY;
        let above_min = (bitrate - Sender::MIN_BITRATE).into_f64();
        let mut increase = KAPPA * fb.delta.into_f64() * (theta - x_hat * above_min) / TAU.powi(2);
        if self == Mode::Refined && increase > 0.0 {
            // Close to the floor the law overshoots, so damp increases there.
            increase *= (3.0 * above_min / range).powi(2).min(1.0);
        }
        bitrate + Kbps::new(increase)
    }
}

/// Converts receiver feedback into the sending bitrate.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Sender {
    #[builder(default)]
    mode: Mode,
    #[builder(default = Sender::INITIAL_BITRATE, setter(into))]
    bitrate: Kbps,

    // Shortest per-packet travel time seen so far, used to estimate self-inflicted queuing
    #[builder(default = Delta::INFINITY, setter(skip))]
    min_travel: Delta,
}

impl Sender {
    pub const INITIAL_BITRATE: Kbps = Kbps::new(300.0);
    pub const MIN_BITRATE: Kbps = Kbps::new(50.0);
    pub const MAX_BITRATE: Kbps = Kbps::new(2_500.0);
    pub const PAYLOAD_SIZE: Bytes = Bytes::new(1_200.0);

    pub fn bitrate(&self) -> Kbps {
        self.bitrate
    }

    /// Picks exactly one regime for this feedback, updates the bitrate and clamps it to
    /// `[MIN_BITRATE, MAX_BITRATE]`.
    pub fn apply(&mut self, fb: &Feedback) -> Regime {
        let extra_delay = self.self_inflicted_delay();
        let (regime, bitrate) = if self.mode.should_ramp_up(fb, extra_delay) {
            (Regime::RampUp, self.mode.ramp_up(fb))
        } else if self.mode.should_ramp_down(fb) {
            (Regime::RampDown, self.mode.ramp_down(fb))
        } else {
            (Regime::Gradual, self.mode.gradual(self.bitrate, fb, extra_delay))
        };
        let previous = self.bitrate;
        self.bitrate = bitrate.clamp(Self::MIN_BITRATE, Self::MAX_BITRATE);
        debug!(%regime, %previous, bitrate = %self.bitrate, "updated bitrate");
        regime
    }

    fn self_inflicted_delay(&mut self) -> Delta {
        if self.mode == Mode::Original {
            return Delta::ZERO;
        }
        let travel = self.bitrate.length(Self::PAYLOAD_SIZE);
        self.min_travel = self.min_travel.min(travel);
        travel - self.min_travel
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn calm() -> Feedback {
        Feedback::builder()
            .queuing_delay(Delta::ZERO)
            .loss_ratio(0.0)
            .congestion_signal(Delta::ZERO)
            .derivative(0.0)
            .baseline_delay(Delta::new(60.0))
            .delta(Delta::new(100.0))
            .interval(Delta::new(100.0))
            .receiving_rate(Kbps::new(400.0))
            .smoothed_delay(Delta::ZERO)
            .build()
    }

    #[test]
    fn original_ramp_up() {
        let mut tx = Sender::builder().build();
        assert_eq!(tx.apply(&calm()), Regime::RampUp);
        let gamma = (50.0_f64 / 160.0).min(0.5);
        assert_eq!(tx.bitrate(), Kbps::new(400.0).scale_by(1.0 + gamma));
    }

    #[test]
    fn refined_ramp_up_is_halved() {
        let mut tx = Sender::builder().mode(Mode::Refined).build();
        assert_eq!(tx.apply(&calm()), Regime::RampUp);
        let gamma = (50.0_f64 / 160.0).min(0.5) / 2.0;
        assert_eq!(tx.bitrate(), Kbps::new(400.0).scale_by(1.0 + gamma));
    }

    #[test]
    fn refined_requires_low_smoothed_delay() {
        let fb = Feedback {
            smoothed_delay: Delta::new(8.0),
            ..calm()
        };
        let mut original = Sender::builder().build();
        let mut refined = Sender::builder().mode(Mode::Refined).build();
        assert_eq!(original.apply(&fb), Regime::RampUp);
        assert_eq!(refined.apply(&fb), Regime::Gradual);
    }

    #[test]
    fn any_loss_prevents_ramp_up() {
        let fb = Feedback {
            loss_ratio: 0.01,
            congestion_signal: Delta::new(10.0),
            ..calm()
        };
        let mut tx = Sender::builder().build();
        assert_eq!(tx.apply(&fb), Regime::Gradual);
    }

    #[test]
    fn refined_ramp_down() {
        let fb = Feedback {
            queuing_delay: Delta::new(45.0),
            congestion_signal: Delta::new(45.0),
            smoothed_delay: Delta::new(45.0),
            receiving_rate: Kbps::new(1_000.0),
            ..calm()
        };
        let mut tx = Sender::builder().mode(Mode::Refined).bitrate(1_200.0).build();
        assert_eq!(tx.apply(&fb), Regime::RampDown);
        let gamma = (80.0_f64 / 90.0).sqrt().min(0.9);
        assert_eq!(tx.bitrate(), Kbps::new(1_000.0).scale_by(gamma));

        // The original law never ramps down.
        let mut tx = Sender::builder().bitrate(1_200.0).build();
        assert_eq!(tx.apply(&fb), Regime::Gradual);
    }

    #[test]
    fn gradual_update_follows_control_law() {
        let fb = Feedback {
            queuing_delay: Delta::new(20.0),
            congestion_signal: Delta::new(20.0),
            derivative: 0.01,
            ..calm()
        };
        let mut tx = Sender::builder().bitrate(1_000.0).build();
        assert_eq!(tx.apply(&fb), Regime::Gradual);
        let x_hat = 20.0 + 2.0 * 500.0 * 0.01;
        let theta = 2_450.0 * 10.0;
        let expected = 1_000.0 + 100.0 * (theta - x_hat * 950.0) / 250_000.0;
        assert!((tx.bitrate().into_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn refined_damps_increases_near_the_floor() {
        let fb = Feedback {
            queuing_delay: Delta::new(20.0),
            congestion_signal: Delta::new(20.0),
            ..calm()
        };
        let mut original = Sender::builder().bitrate(100.0).build();
        let mut refined = Sender::builder().mode(Mode::Refined).bitrate(100.0).build();
        original.apply(&fb);
        refined.apply(&fb);
        let raw = original.bitrate().into_f64() - 100.0;
        let damped = refined.bitrate().into_f64() - 100.0;
        let scale = (3.0 * 50.0 / 2_450.0_f64).powi(2);
        assert!(raw > 0.0);
        assert!((damped - raw * scale).abs() < 1e-9);
    }

    #[test]
    fn self_inflicted_delay_tracks_fastest_rate() {
        let mut tx = Sender::builder().mode(Mode::Refined).bitrate(2_400.0).build();
        assert_eq!(tx.self_inflicted_delay(), Delta::ZERO);
        tx.bitrate = Kbps::new(1_200.0);
        let extra = tx.self_inflicted_delay().into_f64();
        assert!((extra - (8.0 - 4.0)).abs() < 1e-9);

        let mut tx = Sender::builder().bitrate(2_400.0).build();
        tx.bitrate = Kbps::new(1_200.0);
        assert_eq!(tx.self_inflicted_delay(), Delta::ZERO);
    }

    #[test]
    fn refined_requires_receiving_rate_above_floor() {
        let fb = Feedback {
            receiving_rate: Kbps::new(40.0),
            ..calm()
        };
        let mut original = Sender::builder().build();
        let mut refined = Sender::builder().mode(Mode::Refined).build();
        assert_eq!(original.apply(&fb), Regime::RampUp);
        assert_eq!(refined.apply(&fb), Regime::Gradual);
    }

    // Runs at 2400 kbps once, then drops to 1200 kbps: 8 ms per packet against a best of 4 ms.
    fn slowed_down() -> Sender {
        let mut tx = Sender::builder().mode(Mode::Refined).bitrate(2_400.0).build();
        tx.apply(&calm());
        tx.bitrate = Kbps::new(1_200.0);
        tx
    }

    #[test]
    fn self_inflicted_delay_allows_ramp_up() {
        // Above 10/3 ms on its own, below it once the 4 ms of self-inflicted queuing is removed.
        let fb = Feedback {
            smoothed_delay: Delta::new(5.0),
            ..calm()
        };
        let mut tx = slowed_down();
        assert_eq!(tx.apply(&fb), Regime::RampUp);

        let mut fresh = Sender::builder().mode(Mode::Refined).bitrate(1_200.0).build();
        assert_eq!(fresh.apply(&fb), Regime::Gradual);
    }

    #[test]
    fn self_inflicted_delay_is_removed_from_gradual_signal() {
        let theta = 2_450.0 * 10.0;
        let above_min = 1_150.0;
        for (signal, corrected) in [(20.0, 16.0), (2.0, 0.0)] {
            let fb = Feedback {
                queuing_delay: Delta::new(20.0),
                congestion_signal: Delta::new(signal),
                ..calm()
            };
            let mut tx = slowed_down();
            assert_eq!(tx.apply(&fb), Regime::Gradual);
            // Far enough above the floor that no damping applies.
            let expected = 1_200.0 + 100.0 * (theta - corrected * above_min) / 250_000.0;
            assert!(
                (tx.bitrate().into_f64() - expected).abs() < 1e-9,
                "signal {signal}: {} != {expected}",
                tx.bitrate()
            );
        }
    }

    #[test]
    fn bitrate_stays_clamped() {
        let mut rng = StdRng::seed_from_u64(5);
        for mode in [Mode::Original, Mode::Refined] {
            let mut tx = Sender::builder().mode(mode).build();
            for _ in 0..10_000 {
                let signal = Delta::new(rng.gen_range(0.0..1e6));
                let fb = Feedback::builder()
                    .queuing_delay(Delta::new(rng.gen_range(0.0..60.0)))
                    .loss_ratio(if rng.gen_bool(0.5) { 0.0 } else { rng.gen() })
                    .congestion_signal(signal)
                    .derivative(rng.gen_range(-1e3..1e3))
                    .baseline_delay(Delta::new(rng.gen_range(0.0..500.0)))
                    .delta(Delta::new(rng.gen_range(100.0..1_000.0)))
                    .interval(Delta::new(100.0))
                    .receiving_rate(Kbps::new(rng.gen_range(0.0..1e5)))
                    .smoothed_delay(Delta::new(rng.gen_range(0.0..1e3)))
                    .build();
                tx.apply(&fb);
                let bitrate = tx.bitrate();
                assert!(bitrate >= Sender::MIN_BITRATE && bitrate <= Sender::MAX_BITRATE);
            }
        }
    }

    #[test]
    fn zero_receiving_rate_hits_the_floor() {
        let fb = Feedback {
            receiving_rate: Kbps::ZERO,
            ..calm()
        };
        let mut tx = Sender::builder().build();
        assert_eq!(tx.apply(&fb), Regime::RampUp);
        assert_eq!(tx.bitrate(), Sender::MIN_BITRATE);
    }
}
