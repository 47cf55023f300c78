//! End-to-end tests for the chaos-midi pipelines.
//!
//! These run the coordinator against real sinks:
//!   sweep/orbits → generator → quantizer → SinkSet → {SMF file, device port, event log}
//!
//! The device port is an in-memory capture and the pacer records its pauses
//! instead of sleeping, so the live path runs at full speed.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use chaos_midi::config::{BifurcationConfig, DivergencePolicy, HenonConfig, RunConfig, Tempo};
use chaos_midi::coordinator::{Coordinator, RunState};
use chaos_midi::event_log::EventLog;
use chaos_midi::maps::SplitMap;
use chaos_midi::sink::{DeviceSink, EventSink, MidiFileSink, MidiPort, Pacer, SinkSet};
use chaos_midi::Result;
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ─── Helpers ───────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CapturePort(Rc<RefCell<Vec<Vec<u8>>>>);

impl MidiPort for CapturePort {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.0.borrow_mut().push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingPacer(Rc<RefCell<Vec<Duration>>>);

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("chaos_midi_it_{}_{}", name, std::process::id()))
}

fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Short bifurcation sweep: r = 3.500 ..= 3.519, 20 notes.
fn short_sweep() -> RunConfig {
    RunConfig {
        bifurcation: BifurcationConfig {
            r_start: 3.5,
            r_end: 3.5205,
            r_step: 0.001,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// (is_note_on, note, velocity, delta) for every channel message of track 0.
fn channel_messages(bytes: &[u8]) -> Vec<(Option<bool>, u8, u8, u32)> {
    let smf = Smf::parse(bytes).unwrap();
    smf.tracks[0]
        .iter()
        .filter_map(|e| match e.kind {
            TrackEventKind::Midi { message, .. } => Some(match message {
                MidiMessage::NoteOn { key, vel } => (Some(true), key.as_int(), vel.as_int(), e.delta.as_int()),
                MidiMessage::NoteOff { key, vel } => (Some(false), key.as_int(), vel.as_int(), e.delta.as_int()),
                MidiMessage::Controller { controller, value } => {
                    (None, controller.as_int(), value.as_int(), e.delta.as_int())
                }
                other => panic!("unexpected message {:?}", other),
            }),
            _ => None,
        })
        .collect()
}

// ─── Bifurcation ───────────────────────────────────────────────────────────

#[test]
fn test_recording_and_device_see_the_same_stream() {
    let path = scratch("dual.mid");
    let port = CapturePort::default();
    let pacer = RecordingPacer::default();

    let sinks = SinkSet::new()
        .with(DeviceSink::new(port.clone(), "capture", Tempo::default()).with_pacer(pacer.clone()))
        .with(MidiFileSink::new(&path, Tempo::default()));
    let mut coordinator = Coordinator::new(short_sweep(), sinks, rng(2024));
    let summary = coordinator.run_bifurcation().unwrap();
    assert_eq!(coordinator.state(), RunState::Done);
    assert_eq!(summary.events, 20);
    assert_eq!(summary.steps, 20);

    let bytes = std::fs::read(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    // Recording: tempo first, sustain, then strict on/off alternation
    let smf = Smf::parse(&bytes).unwrap();
    assert!(matches!(
        smf.tracks[0][0].kind,
        TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000
    ));
    let recorded = channel_messages(&bytes);
    assert_eq!(recorded.len(), 1 + 2 * 20);
    assert_eq!(recorded[0], (None, 64, 127, 0));
    for pair in recorded[1..].chunks(2) {
        let (on, off) = (pair[0], pair[1]);
        assert_eq!(on.0, Some(true));
        assert_eq!(off.0, Some(false));
        assert_eq!(on.1, off.1, "note-off must close the same note");
        assert!(on.1 <= 88);
        assert_eq!((on.2, on.3), (64, 0));
        assert_eq!((off.2, off.3), (127, 192));
    }

    // Device: same values as raw bytes, one pause per note
    let sent = port.0.borrow();
    assert_eq!(sent.len(), recorded.len());
    assert_eq!(sent[0], vec![0xB0, 64, 127]);
    for (bytes, rec) in sent[1..].iter().zip(&recorded[1..]) {
        let status = if rec.0 == Some(true) { 0x90 } else { 0x80 };
        assert_eq!(bytes, &vec![status, rec.1, rec.2]);
    }
    let pauses = pacer.0.borrow();
    assert_eq!(pauses.len(), 20);
    assert!(pauses.iter().all(|d| *d == Duration::from_millis(100)));
}

#[test]
fn test_same_seed_same_recording() {
    let record = |name: &str, seed: u64| {
        let path = scratch(name);
        let sink = MidiFileSink::new(&path, Tempo::default());
        Coordinator::new(short_sweep(), sink, rng(seed))
            .run_bifurcation()
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        bytes
    };
    assert_eq!(record("seed_a.mid", 99), record("seed_b.mid", 99));
}

#[test]
fn test_single_r_value_gives_one_event() {
    let config = RunConfig {
        bifurcation: BifurcationConfig {
            r_start: 3.0,
            r_end: 3.0015,
            r_step: 0.001,
            iterations: 1000,
            burn_in: 994,
            ..Default::default()
        },
        ..Default::default()
    };
    let path = scratch("single.mid");
    let sink = MidiFileSink::new(&path, Tempo::default());
    let summary = Coordinator::new(config, sink, rng(7)).run_bifurcation().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(summary.events, 1);
    let recorded = channel_messages(&bytes);
    assert_eq!(recorded.len(), 3);
    assert!(recorded[1].1 <= 88);
}

#[test]
fn test_invalid_config_writes_nothing() {
    let mut config = short_sweep();
    config.bifurcation.iterations = 1000;
    config.bifurcation.burn_in = 1000;
    let path = scratch("invalid.mid");
    let _ = std::fs::remove_file(&path);
    let port = CapturePort::default();

    let sinks = SinkSet::new()
        .with(DeviceSink::new(port.clone(), "capture", Tempo::default()).with_pacer(RecordingPacer::default()))
        .with(MidiFileSink::new(&path, Tempo::default()));
    let mut coordinator = Coordinator::new(config, sinks, rng(1));
    assert!(matches!(
        coordinator.run_bifurcation(),
        Err(chaos_midi::Error::InvalidArgument(_))
    ));
    drop(coordinator);

    assert!(!path.exists());
    assert!(port.0.borrow().is_empty());
}

#[test]
fn test_event_log_alongside_recording() {
    let log_path = scratch("events.jsonl");
    let mid_path = scratch("events.mid");
    let sinks = SinkSet::new()
        .with(MidiFileSink::new(&mid_path, Tempo::default()))
        .with(EventLog::create(&log_path, "bifurcation", Tempo::default()).unwrap());
    Coordinator::new(short_sweep(), sinks, rng(3))
        .run_bifurcation()
        .unwrap();

    let text = std::fs::read_to_string(&log_path).unwrap();
    let recorded = channel_messages(&std::fs::read(&mid_path).unwrap());
    let _ = std::fs::remove_file(&log_path);
    let _ = std::fs::remove_file(&mid_path);

    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    // header + sustain + 20 × (on, off)
    assert_eq!(lines.len(), 1 + recorded.len());
    for (line, rec) in lines[2..].iter().zip(&recorded[1..]) {
        assert_eq!(line["note"], rec.1 as u64);
    }
    assert_eq!(lines.last().unwrap()["tick"], 20 * 192);
}

// ─── Hénon ─────────────────────────────────────────────────────────────────

fn henon_config(orbits: usize, on_divergence: DivergencePolicy) -> RunConfig {
    RunConfig {
        henon: HenonConfig {
            iterations_per_orbit: 16,
            number_of_orbits: orbits,
            starting_radius: 0.0,
            on_divergence,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// x' = 1e50·x², y' = y: overflows on the third step from any radius in
/// [0.5, 1].
fn exploding_map() -> SplitMap {
    SplitMap::new(0.0, |x, _, _| x * x * 1e50, |_, y, _| y)
}

#[test]
fn test_reference_henon_run() {
    let port = CapturePort::default();
    let sink = DeviceSink::new(port.clone(), "capture", Tempo::default())
        .with_pacer(RecordingPacer::default());
    let mut coordinator = Coordinator::new(RunConfig::default(), sink, rng(5));
    let summary = coordinator.run_henon().unwrap();

    assert_eq!(summary.steps, 33);
    assert!(summary.events > 0);
    // The outermost orbits leave the finite range before 32 iterations
    assert!(summary.diverged_orbits > 0);
    assert!(summary.events < 33 * 32);
    let sent = port.0.borrow();
    assert_eq!(sent.len(), 1 + 2 * summary.events);
    assert_eq!(sent[0], vec![0xB0, 64, 127]);
    for pair in sent[1..].chunks(2) {
        assert_eq!(pair[0][0], 0x90);
        assert_eq!(pair[1][0], 0x80);
        assert_eq!(pair[0][1], pair[1][1]);
        // Hénon note-offs repeat the attack velocity
        assert_eq!(pair[0][2], pair[1][2]);
        assert!(pair[0][1] <= 127 && pair[0][2] <= 127);
    }
}

#[test]
fn test_diverging_orbit_is_cut_short_and_run_continues() {
    let path = scratch("diverge.mid");
    let sink = MidiFileSink::new(&path, Tempo::default());
    let mut coordinator = Coordinator::new(henon_config(2, DivergencePolicy::SkipOrbit), sink, rng(1));
    let summary = coordinator.run_orbits(exploding_map()).unwrap();
    assert_eq!(coordinator.state(), RunState::Done);

    // Both orbits (radius 0.5 and 1.0) overflow at iteration 2
    assert_eq!(summary.steps, 2);
    assert_eq!(summary.diverged_orbits, 2);
    assert_eq!(summary.events, 4);
    assert!(summary.events < 16);

    // Recording is still written after divergence, sustain first
    let recorded = channel_messages(&std::fs::read(&path).unwrap());
    let _ = std::fs::remove_file(&path);
    assert_eq!(recorded.len(), 1 + 8);
    assert_eq!(recorded[0], (None, 64, 127, 0));
}

#[test]
fn test_end_run_policy_stops_at_first_divergence() {
    let port = CapturePort::default();
    let sink = DeviceSink::new(port.clone(), "capture", Tempo::default())
        .with_pacer(RecordingPacer::default());
    let mut coordinator = Coordinator::new(henon_config(2, DivergencePolicy::EndRun), sink, rng(1));
    let summary = coordinator.run_orbits(exploding_map()).unwrap();

    assert_eq!(summary.steps, 1);
    assert_eq!(summary.diverged_orbits, 1);
    assert_eq!(summary.events, 2);
    // sustain + one orbit's two notes
    assert_eq!(port.0.borrow().len(), 5);
}

#[test]
fn test_plot_feed_colors_per_orbit() {
    use chaos_midi::plot::PlotFeed;
    use crossbeam_channel::bounded;

    let (tx, rx) = bounded(1024);
    let mut sink = SinkSet::new();
    let mut coordinator = Coordinator::new(henon_config(3, DivergencePolicy::SkipOrbit), &mut sink, rng(8))
        .with_plot(PlotFeed::new(tx));
    let summary = coordinator.run_henon().unwrap();
    drop(coordinator);

    let points: Vec<_> = rx.try_iter().collect();
    assert_eq!(points.len(), summary.events);
    for orbit in 0..3 {
        let colors: Vec<[f32; 3]> = points.iter().filter(|p| p.orbit == orbit).map(|p| p.color).collect();
        assert!(colors.windows(2).all(|w| w[0] == w[1]), "orbit {} changed color", orbit);
    }
    assert!(sink.finish().is_ok());
}
