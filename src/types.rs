use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Trajectory samples ─────────────────────────────────────────────────────

/// One sample of a two-variable map (Hénon-type orbits).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both components are finite (not NaN, not ±∞).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

// ─── Orbits ─────────────────────────────────────────────────────────────────

/// One sub-trajectory of the expanding-orbit program: iterate from
/// `(radius, radius)` for `iterations` steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitDescriptor {
    /// 0-based position in the orbit sequence
    pub index: usize,
    pub radius: f64,
    pub iterations: usize,
}

impl OrbitDescriptor {
    pub fn start(&self) -> Point {
        Point::new(self.radius, self.radius)
    }
}

// ─── Musical events ─────────────────────────────────────────────────────────

/// A quantized note: pitch plus attack/release velocities, all 7-bit.
/// Duration is not stored; each sink derives it from the shared `Tempo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicalEvent {
    pub note: u8,
    pub velocity: u8,
    pub release_velocity: u8,
}

impl MusicalEvent {
    pub fn new(note: u8, velocity: u8, release_velocity: u8) -> Self {
        Self {
            note: note.min(MIDI_MAX),
            velocity: velocity.min(MIDI_MAX),
            release_velocity: release_velocity.min(MIDI_MAX),
        }
    }

    pub fn note_on(&self) -> NoteMessage {
        NoteMessage::NoteOn {
            note: self.note,
            velocity: self.velocity,
        }
    }

    pub fn note_off(&self) -> NoteMessage {
        NoteMessage::NoteOff {
            note: self.note,
            velocity: self.release_velocity,
        }
    }
}

impl fmt::Display for MusicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "note={:>3} vel={:>3} rel={:>3}",
            self.note, self.velocity, self.release_velocity
        )
    }
}

/// The record every sink consumes. Serializes with a `kind` tag for the
/// JSONL event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteMessage {
    /// Sustain pedal (CC 64)
    Sustain { value: u8 },
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
}

impl NoteMessage {
    /// Raw MIDI bytes on the given channel (0–15).
    pub fn to_bytes(&self, channel: u8) -> [u8; 3] {
        let ch = channel & 0x0F;
        match *self {
            NoteMessage::Sustain { value } => [0xB0 | ch, SUSTAIN_CONTROLLER, value & 0x7F],
            NoteMessage::NoteOn { note, velocity } => [0x90 | ch, note & 0x7F, velocity & 0x7F],
            NoteMessage::NoteOff { note, velocity } => [0x80 | ch, note & 0x7F, velocity & 0x7F],
        }
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

pub const MIDI_MAX: u8 = 127;
pub const SUSTAIN_CONTROLLER: u8 = 64;
/// Key count of a piano; bifurcation values in [0,1] scale onto 0..=88.
pub const PIANO_KEYS: f64 = 88.0;
pub const MIDI_CHANNEL: u8 = 0;
