use crate::{packet::PacketId, time::Time};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("packet {0} was lost in transit")]
    Lost(PacketId),

    #[error("packet {id} arrived at {arrival} ms, before the latest arrival at {latest} ms")]
    OutOfOrder {
        id: PacketId,
        arrival: Time,
        latest: Time,
    },

    #[error("serde error")]
    Serde(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}
