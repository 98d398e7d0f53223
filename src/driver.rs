use std::path::Path;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    entities::{
        link::{Jitter, LinkSimulator},
        receiver::{FilterMode, Receiver},
        sender::{Mode, Sender},
        source::PacketSource,
    },
    error::Error,
    simulation::Simulation,
    time::{Delta, Time},
    units::{Bytes, Kbps},
    Report,
};

/// Link capacity held until `until`.
#[derive(Debug, Clone, Copy, PartialEq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct CapacityStep {
    pub capacity: Kbps,
    pub until: Time,
}

#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Config {
    steps: Vec<CapacityStep>,
    #[builder(default)]
    jitter: Jitter,
    #[builder(default)]
    mode: Mode,
    /// Defaults to the filter that pairs with `mode`.
    #[builder(default, setter(strip_option))]
    filter: Option<FilterMode>,
    #[builder(default)]
    seed: u64,
    #[builder(default = Sender::PAYLOAD_SIZE, setter(into))]
    payload_size: Bytes,
}

pub fn run(cfg: Config) -> Result<Report, Error> {
    let initial = cfg
        .steps
        .first()
        .map_or(Sender::MAX_BITRATE, |step| step.capacity);
    let link = LinkSimulator::builder()
        .capacity(initial)
        .jitter(cfg.jitter)
        .rng(StdRng::seed_from_u64(cfg.seed))
        .build();
    let receiver = Receiver::builder()
        .filter(cfg.filter.unwrap_or_else(|| cfg.mode.into()))
        .build();
    let sender = Sender::builder().mode(cfg.mode).build();
    let sim = Simulation::builder()
        .source(PacketSource::new(cfg.payload_size))
        .link(link)
        .receiver(receiver)
        .sender(sender)
        .build();
    sim.run(cfg.steps)
}

pub fn constant_capacity(capacity: Kbps, duration: Delta) -> Vec<CapacityStep> {
    vec![CapacityStep::new(capacity, duration.into_time())]
}

/// RMCAT test case 1: variable available capacity on a single flow.
pub fn rmcat_test_1() -> Vec<CapacityStep> {
    [(1_000.0, 40.0), (2_500.0, 60.0), (600.0, 80.0), (1_000.0, 99.0)]
        .into_iter()
        .map(|(kbps, secs)| CapacityStep::new(Kbps::new(kbps), Time::from_secs(secs)))
        .collect()
}

pub fn read_steps(path: impl AsRef<Path>) -> Result<Vec<CapacityStep>, Error> {
    let s = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}
