use typed_builder::TypedBuilder;

use crate::{
    time::{Delta, Time},
    units::{Bytes, Kbps},
};

identifier!(PacketId);

/// A media packet travelling from the sender to the receiver.
///
/// Packets are stamped by [`crate::PacketSource`] and given an arrival time by
/// [`crate::LinkSimulator`]. After that they are read-only.
#[derive(Debug, Clone, Copy, TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct Packet {
    pub(crate) id: PacketId,
    pub(crate) send_time: Time,
    /// `None` until the link delivers the packet, and forever if it is lost.
    #[builder(default, setter(strip_option))]
    pub(crate) arrival_time: Option<Time>,
    #[builder(setter(into))]
    pub(crate) size: Bytes,
}

impl Packet {
    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn send_time(&self) -> Time {
        self.send_time
    }

    pub fn arrival_time(&self) -> Option<Time> {
        self.arrival_time
    }

    pub fn size(&self) -> Bytes {
        self.size
    }

    pub fn is_lost(&self) -> bool {
        self.arrival_time.is_none()
    }

    /// One-way delay, if the packet arrived.
    pub fn delay(&self) -> Option<Delta> {
        self.arrival_time.map(|t| t - self.send_time)
    }
}

/// A receiver report consumed by the sender's rate controller.
#[derive(Debug, Clone, Copy, PartialEq, TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct Feedback {
    pub queuing_delay: Delta,
    pub loss_ratio: f64,
    pub congestion_signal: Delta,
    /// Change of the congestion signal per millisecond since the previous report.
    pub derivative: f64,
    pub baseline_delay: Delta,
    /// Time elapsed since the previous report.
    pub delta: Delta,
    /// The nominal reporting interval.
    pub interval: Delta,
    pub receiving_rate: Kbps,
    pub smoothed_delay: Delta,
}
