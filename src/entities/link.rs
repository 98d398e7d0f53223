use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::trace;

use crate::{
    packet::Packet,
    queue::ChokeQ,
    time::{Delta, Time},
    units::Kbps,
};

/// Fixed propagation delay between the endpoints.
pub const ONE_WAY_PATH_DELAY: Delta = Delta::new(50.0);
/// Longest a packet may wait at the bottleneck before it is dropped.
pub const BOTTLENECK_QUEUE_SIZE: Delta = Delta::new(300.0);

/// How much random delay the last hop adds.
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
pub enum Jitter {
    None,
    Gentle,
    /// The RMCAT evaluation default.
    #[derivative(Default)]
    #[serde(alias = "default")]
    Rmcat,
}

impl Jitter {
    /// The truncation bound and the standard deviation of the jitter draw.
    pub fn params(self) -> (Delta, Delta) {
        match self {
            Jitter::None => (Delta::ZERO, Delta::ZERO),
            Jitter::Gentle => (Delta::new(15.0), Delta::new(5.0)),
            Jitter::Rmcat => (Delta::new(30.0), Delta::new(15.0)),
        }
    }
}

/// A last-mile path: propagation delay, then a bottleneck queue, then jitter.
///
/// The choke and jitter stages keep independent departure clocks. The jitter clock is what keeps
/// packets from overtaking each other.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct LinkSimulator<R> {
    #[builder(setter(into))]
    capacity: Kbps,
    #[builder(default)]
    jitter: Jitter,
    rng: R,

    #[builder(default = ONE_WAY_PATH_DELAY)]
    path_delay: Delta,
    #[builder(default = BOTTLENECK_QUEUE_SIZE)]
    queue_budget: Delta,

    #[builder(default, setter(skip))]
    choke: ChokeQ,
    #[builder(default, setter(skip))]
    last_jitter: Time,
}

impl LinkSimulator<StdRng> {
    pub fn seeded(capacity: Kbps, jitter: Jitter, seed: u64) -> Self {
        LinkSimulator::builder()
            .capacity(capacity)
            .jitter(jitter)
            .rng(StdRng::seed_from_u64(seed))
            .build()
    }
}

impl<R: Rng> LinkSimulator<R> {
    /// Sets the packet's arrival time, or clears it if the bottleneck drops the packet.
    ///
    /// # Panics
    ///
    /// Panics if the link capacity is not positive.
    pub fn send(&mut self, pkt: &mut Packet) -> Option<Time> {
        let arrival = pkt.send_time + self.path_delay;
        let service = self.capacity.length(pkt.size);
        let Some(departure) = self.choke.admit(arrival, service, self.queue_budget) else {
            trace!(
                id = %pkt.id,
                capacity = %self.capacity,
                backlog = %(self.choke.last_departure() - arrival),
                "bottleneck overflow, dropping packet"
            );
            pkt.arrival_time = None;
            return None;
        };
        let arrival = self.add_jitter(departure);
        pkt.arrival_time = Some(arrival);
        Some(arrival)
    }

    fn add_jitter(&mut self, arrival: Time) -> Time {
        let (max, sigma) = self.jitter.params();
        let jitter = if sigma == Delta::ZERO {
            Delta::ZERO
        } else {
            let normal = Normal::new(0.0, sigma.into_f64()).expect("jitter sigma is finite");
            Delta::new(normal.sample(&mut self.rng).abs()).min(max)
        };
        let arrival = (arrival + jitter).max(self.last_jitter);
        self.last_jitter = arrival;
        arrival
    }

    pub fn capacity(&self) -> Kbps {
        self.capacity
    }

    /// Takes effect for the next packet. Packets already queued keep their departure times.
    pub fn set_capacity(&mut self, capacity: Kbps) {
        self.capacity = capacity;
    }

    pub fn set_jitter(&mut self, jitter: Jitter) {
        self.jitter = jitter;
    }

    pub fn max_jitter(&self) -> Delta {
        self.jitter.params().0
    }

    pub fn path_delay(&self) -> Delta {
        self.path_delay
    }
}
