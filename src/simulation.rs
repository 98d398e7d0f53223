use rand::Rng;
use tracing::info;

use crate::{
    data::{RateSample, Report},
    driver::CapacityStep,
    entities::{link::LinkSimulator, receiver::Receiver, sender::Sender, source::PacketSource},
    error::Error,
    stats,
    time::Time,
};

/// The closed loop: source, link, receiver and sender, one packet at a time.
#[derive(Debug, typed_builder::TypedBuilder)]
pub(crate) struct Simulation<R> {
    // Run-time
    #[builder(default, setter(skip))]
    cur_time: Time,
    #[builder(default, setter(skip))]
    sent: usize,
    #[builder(default, setter(skip))]
    lost: usize,
    #[builder(default, setter(skip))]
    rates: Vec<RateSample>,

    // Entities
    source: PacketSource,
    link: LinkSimulator<R>,
    receiver: Receiver,
    sender: Sender,
}

impl<R: Rng> Simulation<R> {
    pub(crate) fn run(mut self, steps: Vec<CapacityStep>) -> Result<Report, Error> {
        for step in &steps {
            info!(capacity = %step.capacity, until = %step.until, "capacity step");
            self.link.set_capacity(step.capacity);
            while self.cur_time < step.until {
                self.step()?;
            }
        }
        Ok(self.finish(steps))
    }

    fn step(&mut self) -> Result<(), Error> {
        let mut pkt = self.source.create(self.sender.bitrate());
        self.sent += 1;
        self.cur_time = pkt.send_time();
        let Some(arrival) = self.link.send(&mut pkt) else {
            // Nothing new reached the receiver, so there is nothing to report on.
            self.lost += 1;
            return Ok(());
        };
        self.receiver.receive(pkt)?;
        if let Some(fb) = self.receiver.feedback() {
            let regime = self.sender.apply(&fb);
            self.rates
                .push(RateSample::new(arrival, self.sender.bitrate(), regime));
        }
        Ok(())
    }

    fn finish(self, steps: Vec<CapacityStep>) -> Report {
        let (packets, series) = self.receiver.into_parts();
        let report = Report {
            average_bitrate: stats::average_bitrate(&packets),
            average_delay: stats::average_delay(&packets),
            global_loss_ratio: stats::global_loss_ratio(&packets),
            sent: self.sent,
            lost: self.lost,
            steps,
            packets,
            series,
            rates: self.rates,
        };
        info!(
            sent = report.sent,
            lost = report.lost,
            average_bitrate = %report.average_bitrate,
            average_delay = %report.average_delay,
            "simulation finished"
        );
        report
    }
}
