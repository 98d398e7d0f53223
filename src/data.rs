use crate::{
    driver::CapacityStep,
    entities::{receiver::Series, sender::Regime},
    error::Error,
    packet::Packet,
    time::{Delta, Time},
    units::Kbps,
};

/// A bitrate decision taken by the sender.
#[derive(Debug, Clone, Copy, PartialEq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct RateSample {
    /// When the triggering feedback was generated, i.e. the arrival time of the packet behind it.
    pub time: Time,
    /// The bitrate after clamping.
    pub bitrate: Kbps,
    pub regime: Regime,
}

/// Everything a run produced.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Report {
    /// The capacity schedule that was simulated.
    pub steps: Vec<CapacityStep>,
    /// Packets that reached the receiver, in arrival order.
    pub packets: Vec<Packet>,
    /// The receiver's per-arrival signals.
    pub series: Series,
    pub rates: Vec<RateSample>,
    pub sent: usize,
    pub lost: usize,
    pub average_bitrate: Kbps,
    pub average_delay: Delta,
    /// Loss inferred from id gaps among the received packets.
    pub global_loss_ratio: f64,
}

impl Report {
    /// Mean of the receiver's rate estimates for arrivals in `[from, to)`.
    pub fn mean_receiving_rate(&self, from: Time, to: Time) -> Kbps {
        let (sum, count) = self
            .series
            .arrival_times
            .iter()
            .zip(&self.series.receiving_rates)
            .filter(|(&t, _)| from <= t && t < to)
            .fold((Kbps::ZERO, 0), |(sum, count), (_, &rate)| (sum + rate, count + 1));
        if count == 0 {
            return Kbps::ZERO;
        }
        sum.scale_by(1.0 / count as f64)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}
