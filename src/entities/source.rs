use crate::{
    packet::{Packet, PacketId},
    time::Time,
    units::{Bytes, Kbps},
};

/// Stamps a stream of fixed-size packets paced at the bitrate given on each call.
#[derive(Debug, Clone, derive_new::new)]
pub struct PacketSource {
    size: Bytes,
    #[new(default)]
    latest_id: PacketId,
    #[new(default)]
    latest_time: Time,
}

impl PacketSource {
    /// Creates the next packet. Its send time is advanced by the time `bitrate` needs to emit
    /// one payload.
    ///
    /// # Panics
    ///
    /// Panics if `bitrate` is not positive.
    pub fn create(&mut self, bitrate: Kbps) -> Packet {
        self.latest_id = self.latest_id.next();
        self.latest_time += bitrate.length(self.size);
        Packet::builder()
            .id(self.latest_id)
            .send_time(self.latest_time)
            .size(self.size)
            .build()
    }

    pub fn size(&self) -> Bytes {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    const SIZE: Bytes = Bytes::new(1_200.0);

    #[test]
    fn constant_bitrate() {
        let bitrate = Kbps::new(1_500.0);
        let mut source = PacketSource::new(SIZE);
        for i in 1..=10 {
            let pkt = source.create(bitrate);
            assert_eq!(pkt.id(), PacketId::new(i));
            let expected = i as f64 * 8.0 * SIZE.into_f64() / bitrate.into_f64();
            assert!((pkt.send_time().into_f64() - expected).abs() < 0.01);
            assert!(pkt.is_lost());
        }
    }

    #[test]
    fn variable_bitrate() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut source = PacketSource::new(SIZE);
        let mut time = 0.0;
        for i in 1..=10 {
            let bitrate = Kbps::new(rng.gen_range(150.0..2_500.0));
            let pkt = source.create(bitrate);
            time += 8.0 * SIZE.into_f64() / bitrate.into_f64();
            assert_eq!(pkt.id(), PacketId::new(i));
            assert!((pkt.send_time().into_f64() - time).abs() < 0.01);
        }
    }

    #[test]
    #[should_panic]
    fn zero_bitrate() {
        PacketSource::new(SIZE).create(Kbps::ZERO);
    }
}
