//! Real-time MIDI output ports via `midir`.
//!
//! Only compiled with the `device` feature. Policy is to use the first
//! enumerated output; an empty port list is a `ResourceUnavailable` error.

use crate::error::{Error, Result};
use crate::sink::MidiPort;
use log::info;
use midir::{MidiOutput, MidiOutputConnection};

pub const CLIENT_NAME: &str = "chaos-midi";

/// Names of every MIDI output port currently visible.
pub fn output_port_names() -> Result<Vec<String>> {
    let out = MidiOutput::new(CLIENT_NAME).map_err(|e| Error::Midi(e.to_string()))?;
    Ok(out
        .ports()
        .iter()
        .filter_map(|p| out.port_name(p).ok())
        .collect())
}

pub struct MidirPort {
    conn: MidiOutputConnection,
    name: String,
}

impl MidirPort {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MidiPort for MidirPort {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.conn
            .send(bytes)
            .map_err(|e| Error::Midi(format!("{}: {}", self.name, e)))
    }
}

/// Connect to the first enumerated output port.
pub fn open_default_port() -> Result<MidirPort> {
    let out = MidiOutput::new(CLIENT_NAME).map_err(|e| Error::Midi(e.to_string()))?;
    let ports = out.ports();
    let port = ports
        .first()
        .ok_or_else(|| Error::ResourceUnavailable("No MIDI output devices found".into()))?;
    let name = out
        .port_name(port)
        .map_err(|e| Error::Midi(e.to_string()))?;
    let conn = out
        .connect(port, "chaos-midi-out")
        .map_err(|e| Error::Midi(e.to_string()))?;
    info!("Using MIDI output device: {}", name);
    Ok(MidirPort { conn, name })
}
