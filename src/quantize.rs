//! Trajectory → musical parameter reduction.
//!
//! Two policies, one per map family:
//! - bifurcation: distinct long-run values of a logistic trajectory, one
//!   picked per sweep step, scaled onto the 88 piano keys;
//! - Hénon: every sample maps directly, x → note and y → velocity.

use crate::types::{MusicalEvent, Point, MIDI_MAX, PIANO_KEYS};
use std::collections::BTreeSet;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: usize) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Samples rounded to hundredths, deduplicated and sorted ascending.
pub fn distinct_rounded(samples: &[f64]) -> Vec<f64> {
    // Integer hundredths give exact dedup and ordering
    let keys: BTreeSet<i64> = samples
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| (v * 100.0).round() as i64)
        .collect();
    keys.into_iter().map(|k| k as f64 / 100.0).collect()
}

/// The distinct value at `sweep_index mod distinct_count`, or `None` when
/// the trajectory is empty.
pub fn select_bifurcation_value(samples: &[f64], sweep_index: usize) -> Option<f64> {
    let distinct = distinct_rounded(samples);
    if distinct.is_empty() {
        return None;
    }
    Some(distinct[sweep_index % distinct.len()])
}

/// round(value · 88), kept within 0..=88.
pub fn piano_note(value: f64) -> u8 {
    (value * PIANO_KEYS).round().clamp(0.0, PIANO_KEYS) as u8
}

/// clamp(round(|v + 1| / 2 · 127), 0, 127): maps roughly [-1, 1] onto the
/// 7-bit MIDI range, clamping anything outside.
pub fn scale_to_midi(v: f64) -> u8 {
    let max = MIDI_MAX as f64;
    let scaled = ((v + 1.0).abs() / 2.0 * max).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, max) as u8
}

/// Hénon sample → event. Note from x, velocity (attack and release) from y.
pub fn henon_event(p: Point) -> MusicalEvent {
    let velocity = scale_to_midi(p.y);
    MusicalEvent::new(scale_to_midi(p.x), velocity, velocity)
}
