#[macro_use]
mod ident;

pub mod driver;
pub mod stats;
pub mod time;
pub mod units;

pub(crate) mod data;
pub(crate) mod entities;
pub(crate) mod error;
pub(crate) mod packet;
pub(crate) mod queue;
pub(crate) mod simulation;

pub use data::{RateSample, Report};
pub use driver::{CapacityStep, Config};
pub use entities::{
    link::{Jitter, LinkSimulator, BOTTLENECK_QUEUE_SIZE, ONE_WAY_PATH_DELAY},
    receiver::{FilterMode, Receiver, Series},
    sender::{Mode, Regime, Sender},
    source::PacketSource,
};
pub use error::Error;
pub use packet::{Feedback, Packet, PacketId};
