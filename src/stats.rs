//! Windowed statistics over an arrival-ordered packet history.
//!
//! Every function here is read-only and returns zero for an empty history. Packets without an
//! arrival time are skipped by the time-based functions.

use crate::{
    packet::{Packet, PacketId},
    time::{Delta, Time},
    units::{Bytes, Kbps},
};

/// Newest-first iterator over the packets that actually arrived.
fn arrivals_rev(packets: &[Packet]) -> impl Iterator<Item = (&Packet, Time)> {
    packets
        .iter()
        .rev()
        .filter_map(|pkt| pkt.arrival_time().map(|t| (pkt, t)))
}

fn loss_from_ids(received: usize, oldest: PacketId, newest: PacketId) -> f64 {
    let span = (newest - oldest).into_f64() + 1.0;
    1.0 - received as f64 / span
}

/// Fraction of packets lost among those that arrived within `window` of the newest arrival.
///
/// Losses are inferred from gaps in the otherwise contiguous packet ids.
pub fn loss_ratio(packets: &[Packet], window: Delta) -> f64 {
    let mut iter = arrivals_rev(packets).peekable();
    let Some(&(_, newest_arrival)) = iter.peek() else {
        return 0.0;
    };
    let limit = newest_arrival - window;
    let mut received = 0;
    let (mut oldest, mut newest) = (PacketId::MAX, PacketId::ZERO);
    for (pkt, arrival) in iter {
        if arrival < limit {
            break;
        }
        received += 1;
        oldest = oldest.min(pkt.id());
        newest = newest.max(pkt.id());
    }
    if received == 0 {
        return 0.0;
    }
    loss_from_ids(received, oldest, newest)
}

/// Loss ratio over the whole set. Only ids are read, so order does not matter.
pub fn global_loss_ratio(packets: &[Packet]) -> f64 {
    let Some(oldest) = packets.iter().map(Packet::id).min() else {
        return 0.0;
    };
    let newest = packets.iter().map(Packet::id).max().unwrap_or(oldest);
    loss_from_ids(packets.len(), oldest, newest)
}

/// Receiving rate over the last `window`, counting up to and including the first packet that
/// falls outside of it.
pub fn receiving_rate(packets: &[Packet], window: Delta) -> Kbps {
    let mut iter = arrivals_rev(packets);
    let Some((first, newest_arrival)) = iter.next() else {
        return Kbps::ZERO;
    };
    let limit = newest_arrival - window;
    let mut bytes = first.size();
    let mut count = 1;
    let mut oldest_arrival = newest_arrival;
    for (pkt, arrival) in iter {
        bytes += pkt.size();
        count += 1;
        oldest_arrival = arrival;
        if arrival < limit {
            break;
        }
    }
    corrected_rate(bytes, count, oldest_arrival, newest_arrival, window)
}

// `n` payloads cover only `n - 1` inter-arrival gaps, hence the correction factor.
fn corrected_rate(bytes: Bytes, count: usize, oldest: Time, newest: Time, fallback: Delta) -> Kbps {
    let span = newest - oldest;
    if count == 1 || span <= Delta::ZERO {
        return Kbps::over(bytes, fallback);
    }
    let n = count as f64;
    Kbps::over(bytes, span).scale_by((n - 1.0) / n)
}

/// Average bitrate over the whole history.
pub fn average_bitrate(packets: &[Packet]) -> Kbps {
    let Some((_, newest)) = arrivals_rev(packets).next() else {
        return Kbps::ZERO;
    };
    let (bytes, count, oldest) = arrivals_rev(packets).fold(
        (Bytes::ZERO, 0, newest),
        |(bytes, count, _), (pkt, arrival)| (bytes + pkt.size(), count + 1, arrival),
    );
    // A lone packet is measured from the start of the simulation.
    corrected_rate(bytes, count, oldest, newest, newest.into_delta())
}

/// Mean one-way delay over the whole history.
pub fn average_delay(packets: &[Packet]) -> Delta {
    let (sum, count) = packets
        .iter()
        .filter_map(Packet::delay)
        .fold((0.0, 0), |(sum, count), d| (sum + d.into_f64(), count + 1));
    if count == 0 {
        return Delta::ZERO;
    }
    Delta::new(sum / count as f64)
}
