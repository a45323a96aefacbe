use crate::channel::Channel;
use crate::config::Config;
use crate::telegram::{self, EncodingError, Template};
use log::{debug, info};
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod current;

pub use current::CurrentSource;

#[derive(Error, Debug)]
pub enum EmitterError {
    #[error("Channel {port} unavailable: {source}")]
    ChannelUnavailable {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("Writing to channel failed: {0}")]
    ChannelWrite(#[source] io::Error),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Writes one telegram per interval to an exclusively owned channel.
pub struct Emitter {
    channel: Channel,
    status: Box<dyn Write + Send>,
    template: Template,
    current: CurrentSource,
    interval: Duration,
    limit: Option<u64>,
    telegrams: u64,
}

impl Emitter {
    pub fn new(channel: Channel, template: Template, current: CurrentSource, interval: Duration) -> Self {
        return Emitter {
            channel,
            status: Box::new(io::stdout()),
            template,
            current,
            interval,
            limit: None,
            telegrams: 0,
        };
    }

    pub fn from_config(config: &Config, template: Template, channel: Channel) -> Self {
        return Emitter::new(channel, template, CurrentSource::from_config(config), config.interval_duration())
            .with_limit(config.count);
    }

    /// Replace the console the progress line is written to.
    pub fn with_status(mut self, status: Box<dyn Write + Send>) -> Self {
        self.status = status;
        return self;
    }

    /// Stop after `limit` telegrams instead of running until cancelled.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        return self;
    }

    #[cfg(test)]
    fn telegrams(&self) -> u64 {
        return self.telegrams;
    }

    /// Render the next telegram and write it to the channel line by line.
    pub fn send_telegram(&mut self) -> Result<(), EmitterError> {
        self.telegrams += 1;
        let current = self.current.next_value();

        /* Progress overwrites itself, console errors are not worth stopping for */
        let _ = write!(self.status, "Sending telegram {}\r", self.telegrams);
        let _ = self.status.flush();

        let frames = telegram::encode_telegram(&self.template.render(current))?;
        for frame in frames.iter() {
            self.channel.write_all(frame).map_err(EmitterError::ChannelWrite)?;
        }
        self.channel.flush().map_err(EmitterError::ChannelWrite)?;

        debug!("Telegram {} sent with current {:03} A", self.telegrams, current);
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        return self.limit.is_some_and(|l| self.telegrams >= l);
    }

    /// Send telegrams until `cancel` fires or the telegram limit is reached.
    ///
    /// Consumes the emitter, the channel is closed before the result is
    /// returned, on errors as well.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<u64, EmitterError> {
        info!(
            "Sending {} .. {} every {:?}",
            self.template.header(),
            self.template.trailer(),
            self.interval
        );

        while !cancel.is_cancelled() && !self.limit_reached() {
            self.send_telegram()?;
            if self.limit_reached() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Cancelled while waiting for the next telegram");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Stopped after {} telegrams", self.telegrams);
        Ok(self.telegrams)
    }
}
