//! JSONL event log — a human-readable companion to the MIDI recording.
//!
//! First line is a header (format, program, tempo); each following line is
//! one `NoteMessage` with its sequence number and absolute tick position,
//! computed with the same note-duration rule as the SMF recording.

use crate::config::Tempo;
use crate::error::Result;
use crate::sink::EventSink;
use crate::types::NoteMessage;
use log::info;
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const LOG_FORMAT: &str = "chaos-midi";

#[derive(Debug, Serialize)]
struct LogLine<'a> {
    seq: u64,
    tick: u64,
    #[serde(flatten)]
    msg: &'a NoteMessage,
}

pub struct EventLog<W: Write> {
    writer: BufWriter<W>,
    tempo: Tempo,
    seq: u64,
    tick: u64,
}

impl EventLog<File> {
    pub fn create(path: &Path, program: &str, tempo: Tempo) -> Result<Self> {
        info!("Event log → {:?}", path);
        Self::new(File::create(path)?, program, tempo)
    }
}

impl<W: Write> EventLog<W> {
    pub fn new(out: W, program: &str, tempo: Tempo) -> Result<Self> {
        let mut writer = BufWriter::new(out);
        let header = json!({
            "format": LOG_FORMAT,
            "version": env!("CARGO_PKG_VERSION"),
            "program": program,
            "tempo": tempo,
            "note_duration_ticks": tempo.note_duration_ticks(),
        });
        writeln!(writer, "{}", header)?;
        Ok(Self {
            writer,
            tempo,
            seq: 0,
            tick: 0,
        })
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::Error::Io(e.into_error()))
    }
}

impl<W: Write> EventSink for EventLog<W> {
    fn name(&self) -> &str {
        "event-log"
    }

    fn send(&mut self, msg: &NoteMessage) -> Result<()> {
        if let NoteMessage::NoteOff { .. } = msg {
            self.tick += self.tempo.note_duration_ticks() as u64;
        }
        let line = LogLine {
            seq: self.seq,
            tick: self.tick,
            msg,
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.seq += 1;

        if self.seq % 1000 == 0 {
            self.writer.flush()?;
            info!("Logged {} events", self.seq);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        info!("Event log closed: {} events, {} ticks", self.seq, self.tick);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::play;
    use crate::types::MusicalEvent;
    use serde_json::Value;

    #[test]
    fn test_log_lines() {
        let mut log = EventLog::new(Vec::new(), "bifurcation", Tempo::default()).unwrap();
        log.send(&NoteMessage::Sustain { value: 127 }).unwrap();
        play(&mut log, &MusicalEvent::new(40, 64, 127)).unwrap();
        play(&mut log, &MusicalEvent::new(41, 64, 127)).unwrap();
        log.finish().unwrap();

        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0]["format"], LOG_FORMAT);
        assert_eq!(lines[0]["program"], "bifurcation");
        assert_eq!(lines[0]["note_duration_ticks"], 192);

        assert_eq!(lines[1]["kind"], "sustain");
        assert_eq!(lines[2]["kind"], "note_on");
        assert_eq!(lines[2]["note"], 40);
        assert_eq!(lines[2]["tick"], 0);
        assert_eq!(lines[3]["kind"], "note_off");
        assert_eq!(lines[3]["tick"], 192);
        assert_eq!(lines[5]["tick"], 384);
        assert_eq!(lines[5]["seq"], 4);
    }
}
