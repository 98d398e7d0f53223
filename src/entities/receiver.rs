use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    entities::sender::Mode,
    error::Error,
    packet::{Feedback, Packet},
    stats,
    time::{Delta, Time},
    units::Kbps,
};

// Delay-signal pipeline constants
const FILTER_LEN: usize = 5;
const SMOOTHING_ALPHA: f64 = 0.9;
const WARP_THRESHOLD: Delta = Delta::new(50.0); // d_th
const WARP_CEILING: Delta = Delta::new(400.0); // d_max
const LOSS_PENALTY: Delta = Delta::new(1_000.0);

/// How the trailing delay samples are collapsed into one filtered value.
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
pub enum FilterMode {
    #[derivative(Default)]
    Median,
    Minimum,
}

impl FilterMode {
    fn apply(self, samples: &[Delta]) -> Delta {
        let mut values = samples
            .iter()
            .map(|d| d.into_f64())
            .collect::<SmallVec<[f64; FILTER_LEN]>>();
        if values.is_empty() {
            return Delta::ZERO;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let filtered = match self {
            FilterMode::Median if n % 2 == 1 => values[n / 2],
            FilterMode::Median => (values[n / 2 - 1] + values[n / 2]) / 2.0,
            FilterMode::Minimum => values[0],
        };
        Delta::new(filtered)
    }
}

impl From<Mode> for FilterMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Original => FilterMode::Median,
            Mode::Refined => FilterMode::Minimum,
        }
    }
}

/// Dampens large delays: linear up to `d_th`, a quartic fall-off up to `d_max`, zero beyond.
fn warp(smoothed: Delta) -> Delta {
    if smoothed <= WARP_THRESHOLD {
        smoothed
    } else if smoothed < WARP_CEILING {
        let span = WARP_CEILING - WARP_THRESHOLD;
        let ratio = (WARP_CEILING - smoothed).into_f64() / span.into_f64();
        WARP_THRESHOLD.scale_by(ratio.powi(4))
    } else {
        Delta::ZERO
    }
}

/// Append-only packet history, sorted by arrival time.
#[derive(Debug, Default, Clone)]
pub(crate) struct PacketLog {
    inner: Vec<Packet>,
}

impl PacketLog {
    delegate::delegate! {
        to self.inner {
            pub(crate) fn push(&mut self, pkt: Packet);
            pub(crate) fn len(&self) -> usize;
            pub(crate) fn as_slice(&self) -> &[Packet];
        }
    }
}

/// Per-arrival signals, kept for reporting. Entry `i` of each series belongs to the `i`th
/// packet received.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Series {
    pub arrival_times: Vec<Time>,
    pub delay_signals: Vec<Delta>,
    pub filtered_delays: Vec<Delta>,
    pub smoothed_delays: Vec<Delta>,
    pub queuing_delays: Vec<Delta>,
    pub congestion_signals: Vec<Delta>,
    pub loss_ratios: Vec<f64>,
    pub receiving_rates: Vec<Kbps>,
}

/// Turns arrivals into a congestion signal and emits rate-limited feedback.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Receiver {
    #[builder(default)]
    filter: FilterMode,
    #[builder(default = Receiver::FEEDBACK_INTERVAL)]
    interval: Delta,
    #[builder(default = Receiver::STATS_WINDOW)]
    loss_window: Delta,
    #[builder(default = Receiver::STATS_WINDOW)]
    rate_window: Delta,

    #[builder(default, setter(skip))]
    history: PacketLog,
    #[builder(default = Delta::INFINITY, setter(skip))]
    baseline_delay: Delta,
    #[builder(default, setter(skip))]
    series: Series,
    #[builder(default, setter(skip))]
    latest_feedback: Time,
}

impl Receiver {
    pub const FEEDBACK_INTERVAL: Delta = Delta::new(100.0);
    pub const STATS_WINDOW: Delta = Delta::new(500.0);

    /// Ingests an arrived packet and extends every signal series by one sample.
    pub fn receive(&mut self, pkt: Packet) -> Result<(), Error> {
        let arrival = pkt.arrival_time().ok_or(Error::Lost(pkt.id()))?;
        if let Some(&latest) = self.series.arrival_times.last() {
            if arrival < latest {
                return Err(Error::OutOfOrder {
                    id: pkt.id(),
                    arrival,
                    latest,
                });
            }
        }
        self.history.push(pkt);
        let series = &mut self.series;
        series.arrival_times.push(arrival);

        // Baseline removal, then the trailing-window filter
        let delay = arrival - pkt.send_time();
        self.baseline_delay = self.baseline_delay.min(delay);
        series.delay_signals.push(delay - self.baseline_delay);
        let tail = series.delay_signals.len().saturating_sub(FILTER_LEN);
        let filtered = self.filter.apply(&series.delay_signals[tail..]);
        series.filtered_delays.push(filtered);

        // Exponential smoothing, then warping
        let smoothed = match series.smoothed_delays.last() {
            Some(&prev) => {
                prev.scale_by(SMOOTHING_ALPHA) + filtered.scale_by(1.0 - SMOOTHING_ALPHA)
            }
            None => filtered,
        };
        series.smoothed_delays.push(smoothed);
        let queuing_delay = warp(smoothed);
        series.queuing_delays.push(queuing_delay);

        let packets = self.history.as_slice();
        let loss = stats::loss_ratio(packets, self.loss_window);
        let rate = stats::receiving_rate(packets, self.rate_window);
        series.loss_ratios.push(loss);
        series.receiving_rates.push(rate);
        series.congestion_signals.push(queuing_delay + LOSS_PENALTY.scale_by(loss));

        trace!(
            id = %pkt.id(),
            %arrival,
            %delay,
            %queuing_delay,
            loss,
            "received packet"
        );
        Ok(())
    }

    /// Returns a report if at least one interval has passed since the previous one, judged by the
    /// latest arrival time.
    pub fn feedback(&mut self) -> Option<Feedback> {
        let series = &self.series;
        let now = *series.arrival_times.last()?;
        let delta = now - self.latest_feedback;
        if delta < self.interval {
            return None;
        }
        self.latest_feedback = now;

        let derivative = match series.congestion_signals.as_slice() {
            [.., prev, last] => (*last - *prev).into_f64() / delta.into_f64(),
            _ => 0.0,
        };
        let feedback = Feedback::builder()
            .queuing_delay(*series.queuing_delays.last()?)
            .loss_ratio(*series.loss_ratios.last()?)
            .congestion_signal(*series.congestion_signals.last()?)
            .derivative(derivative)
            .baseline_delay(self.baseline_delay)
            .delta(delta)
            .interval(self.interval)
            .receiving_rate(*series.receiving_rates.last()?)
            .smoothed_delay(*series.smoothed_delays.last()?)
            .build();
        debug!(
            %now,
            congestion_signal = %feedback.congestion_signal,
            receiving_rate = %feedback.receiving_rate,
            loss = feedback.loss_ratio,
            "emitting feedback"
        );
        Some(feedback)
    }

    /// Every packet received so far, in arrival order.
    pub fn packets(&self) -> &[Packet] {
        self.history.as_slice()
    }

    pub fn received(&self) -> usize {
        self.history.len()
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn baseline_delay(&self) -> Delta {
        self.baseline_delay
    }

    pub fn into_parts(self) -> (Vec<Packet>, Series) {
        (self.history.inner, self.series)
    }
}
