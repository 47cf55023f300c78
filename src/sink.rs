//! Event sinks: destinations for the note stream.
//!
//! Every sink receives the identical sequence of `NoteMessage`s. The
//! recording sink turns them into SMF track events with tick deltas; the
//! device sink transmits them immediately and paces wall-clock time between
//! note-on and note-off. `SinkSet` fans one stream out to several sinks in
//! a fixed order.

use crate::config::Tempo;
use crate::error::Result;
use crate::types::{MusicalEvent, NoteMessage, MIDI_CHANNEL};
use log::{debug, info, warn};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub trait EventSink {
    fn name(&self) -> &str;

    /// Accept the next message. Sinks never reorder.
    fn send(&mut self, msg: &NoteMessage) -> Result<()>;

    /// Flush and close. Called once, after the last message.
    fn finish(&mut self) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&mut self, msg: &NoteMessage) -> Result<()> {
        (**self).send(msg)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&mut self, msg: &NoteMessage) -> Result<()> {
        (**self).send(msg)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// One musical event = note-on followed by its note-off.
pub fn play<S: EventSink + ?Sized>(sink: &mut S, event: &MusicalEvent) -> Result<()> {
    sink.send(&event.note_on())?;
    sink.send(&event.note_off())
}

// ─── Fan-out ────────────────────────────────────────────────────────────────

/// Ordered set of sinks sharing one event stream.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn EventSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        info!("Sink attached: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for SinkSet {
    fn name(&self) -> &str {
        "sink-set"
    }

    fn send(&mut self, msg: &NoteMessage) -> Result<()> {
        for sink in &mut self.sinks {
            sink.send(msg)?;
        }
        Ok(())
    }

    /// Finishes every sink even if an earlier one fails; reports the first error.
    fn finish(&mut self) -> Result<()> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish() {
                warn!("Sink {} failed to finish: {}", sink.name(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ─── Recording ──────────────────────────────────────────────────────────────

/// Largest variable-length delta an SMF event can carry (28 bits).
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Offline accumulator producing a single-track Standard MIDI File.
///
/// Note-offs carry a delta of one note duration in ticks; everything else
/// lands at delta 0. Nothing touches the filesystem until `finish`, so a
/// run that fails midway leaves no partial file behind.
pub struct MidiFileSink {
    path: PathBuf,
    tempo: Tempo,
    events: Vec<TrackEvent<'static>>,
    finished: bool,
}

impl MidiFileSink {
    pub fn new(path: impl Into<PathBuf>, tempo: Tempo) -> Self {
        let events = vec![TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo.micros_per_beat()))),
        }];
        Self {
            path: path.into(),
            tempo,
            events,
            finished: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Track events recorded so far (tempo meta first).
    pub fn events(&self) -> &[TrackEvent<'static>] {
        &self.events
    }

    /// Encode the recording as SMF bytes, end-of-track included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut track = self.events.clone();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(self.tempo.ticks_per_beat)),
        ));
        smf.tracks.push(track);
        let mut buf = Vec::new();
        smf.write_std(&mut buf)?;
        Ok(buf)
    }
}

impl EventSink for MidiFileSink {
    fn name(&self) -> &str {
        "midi-file"
    }

    fn send(&mut self, msg: &NoteMessage) -> Result<()> {
        let channel = u4::new(MIDI_CHANNEL);
        let (delta, message) = match *msg {
            NoteMessage::Sustain { value } => (
                0,
                MidiMessage::Controller {
                    controller: u7::new(crate::types::SUSTAIN_CONTROLLER),
                    value: u7::new(value.min(127)),
                },
            ),
            NoteMessage::NoteOn { note, velocity } => (
                0,
                MidiMessage::NoteOn {
                    key: u7::new(note.min(127)),
                    vel: u7::new(velocity.min(127)),
                },
            ),
            NoteMessage::NoteOff { note, velocity } => (
                self.tempo.note_duration_ticks(),
                MidiMessage::NoteOff {
                    key: u7::new(note.min(127)),
                    vel: u7::new(velocity.min(127)),
                },
            ),
        };
        self.events.push(TrackEvent {
            delta: u28::new(delta.min(MAX_DELTA)),
            kind: TrackEventKind::Midi { channel, message },
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let buf = self.to_bytes()?;
        std::fs::write(&self.path, &buf)?;
        self.finished = true;
        info!(
            "Recording saved: {} events, {} bytes → {:?}",
            self.events.len() - 1,
            buf.len(),
            self.path
        );
        Ok(())
    }
}

// ─── Live output ────────────────────────────────────────────────────────────

/// A connected real-time MIDI destination.
pub trait MidiPort {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Captures raw messages in memory.
impl MidiPort for Vec<Vec<u8>> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.push(bytes.to_vec());
        Ok(())
    }
}

/// Blocks the pipeline to hold a note for its wall-clock duration.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// `thread::sleep` pacing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepPacer;

impl Pacer for SleepPacer {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Sends each message as soon as it arrives and holds every note for
/// `1 / iterations_per_second` before its note-off goes out.
pub struct DeviceSink<P: MidiPort> {
    port: P,
    pacer: Box<dyn Pacer>,
    hold: Duration,
    label: String,
    /// Note currently sounding, released on drop if the run ends early
    sounding: Option<u8>,
    sent: u64,
}

impl<P: MidiPort> DeviceSink<P> {
    pub fn new(port: P, label: impl Into<String>, tempo: Tempo) -> Self {
        Self {
            port,
            pacer: Box::new(SleepPacer),
            hold: tempo.note_duration(),
            label: label.into(),
            sounding: None,
            sent: 0,
        }
    }

    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent
    }

    fn transmit(&mut self, msg: &NoteMessage) -> Result<()> {
        self.port.send(&msg.to_bytes(MIDI_CHANNEL))?;
        self.sent += 1;
        Ok(())
    }
}

impl<P: MidiPort> EventSink for DeviceSink<P> {
    fn name(&self) -> &str {
        &self.label
    }

    fn send(&mut self, msg: &NoteMessage) -> Result<()> {
        match *msg {
            NoteMessage::NoteOn { note, .. } => {
                self.transmit(msg)?;
                self.sounding = Some(note);
            }
            NoteMessage::NoteOff { .. } => {
                self.pacer.pause(self.hold);
                self.transmit(msg)?;
                self.sounding = None;
            }
            NoteMessage::Sustain { .. } => self.transmit(msg)?,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("Device {} closed after {} messages", self.label, self.sent);
        Ok(())
    }
}

impl<P: MidiPort> Drop for DeviceSink<P> {
    fn drop(&mut self) {
        if let Some(note) = self.sounding.take() {
            debug!("Releasing hanging note {} on {}", note, self.label);
            let off = NoteMessage::NoteOff { note, velocity: 0 };
            let _ = self.port.send(&off.to_bytes(MIDI_CHANNEL));
        }
    }
}
