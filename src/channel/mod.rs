use crate::config::{ChannelKind, Config};
use crate::emitter::EmitterError;
use log::info;
use std::fs::OpenOptions;
use std::io::{self, Write};
#[cfg(feature = "serial")]
use std::time::Duration;

/// Byte sink the telegrams are written to. Closed when dropped.
pub type Channel = Box<dyn Write + Send>;

/// Serial writes block at most this long before the write counts as failed.
#[cfg(feature = "serial")]
pub const SERIAL_WRITE_TIMEOUT: Duration = Duration::from_secs(3600);

pub fn open_channel(config: &Config) -> Result<Channel, EmitterError> {
    let channel = match config.channel {
        ChannelKind::Serial => open_serial(&config.port, config.baud_rate),
        ChannelKind::File => open_file(&config.port),
    };

    return channel.map_err(|e| EmitterError::ChannelUnavailable {
        port: config.port.clone(),
        source: e,
    });
}

#[cfg(feature = "serial")]
fn open_serial(port: &str, baud_rate: u32) -> io::Result<Channel> {
    let serial = serialport::new(port, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(SERIAL_WRITE_TIMEOUT)
        .open()?;

    info!("Opened serial port {} at {} baud", port, baud_rate);
    return Ok(Box::new(serial));
}

#[cfg(not(feature = "serial"))]
fn open_serial(_port: &str, _baud_rate: u32) -> io::Result<Channel> {
    return Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "built without the serial feature",
    ));
}

/// Open an existing file, FIFO or pseudo terminal for writing.
fn open_file(path: &str) -> io::Result<Channel> {
    let file = OpenOptions::new().write(true).open(path)?;
    info!("Opened {} for writing", path);
    return Ok(Box::new(file));
}
