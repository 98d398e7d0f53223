use crate::time::{Delta, Time};

/// The single FIFO queue in front of the bottleneck link.
///
/// Admission is bounded by queueing delay, not by bytes: a packet is dropped if it would wait
/// `budget` or longer before leaving the link.
#[derive(Debug, Default, Clone, derive_new::new)]
pub(crate) struct ChokeQ {
    #[new(default)]
    last_departure: Time,
}

impl ChokeQ {
    /// Returns the departure time of an admitted packet, or `None` if it overflows the queue.
    #[must_use]
    pub(crate) fn admit(&mut self, arrival: Time, service: Delta, budget: Delta) -> Option<Time> {
        let departure = self.last_departure.max(arrival) + service;
        if departure - arrival < budget {
            self.last_departure = departure;
            Some(departure)
        } else {
            None
        }
    }

    pub(crate) fn last_departure(&self) -> Time {
        self.last_departure
    }
}
