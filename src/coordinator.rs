use crate::config::{DivergencePolicy, RunConfig};
use crate::error::{Error, Result};
use crate::maps::{logistic_trajectory, HenonMap, Orbit, PlanarMap, Step};
use crate::plot::{orbit_color, PlotFeed, PlotPoint};
use crate::quantize::{henon_event, piano_note, select_bifurcation_value};
use crate::sink::{play, EventSink};
use crate::sweep::{orbit_radii, sweep};
use crate::types::{MusicalEvent, NoteMessage, MIDI_MAX};
use log::{debug, info, warn};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Musical events emitted (each one note-on + note-off)
    pub events: usize,
    /// Sweep steps or orbits visited
    pub steps: usize,
    pub diverged_orbits: usize,
    /// Sweep steps with no finite sample to select from
    pub skipped_steps: usize,
}

/// The coordinator drives one performance: it validates the configuration,
/// walks the sweep (or orbit sequence), turns each trajectory into musical
/// events and hands every event to its sink.
///
/// # Lifecycle
///
/// `Idle → Running → Done`. Configuration errors are raised while still
/// `Idle`, before the sink has seen a single message. A diverging Hénon orbit
/// is an ordinary end-of-orbit, not an error. On success the sink is
/// finished (recordings written); on error it is left unfinished and its
/// `Drop` releases whatever it holds.
///
/// The offline and live bifurcation programs are the same run with
/// different sinks: pass a `MidiFileSink`, a `DeviceSink`, or a `SinkSet`
/// holding both.
pub struct Coordinator<S: EventSink, R: Rng> {
    config: RunConfig,
    sink: S,
    rng: R,
    plot: Option<PlotFeed>,
    state: RunState,
}

impl<S: EventSink, R: Rng> Coordinator<S, R> {
    pub fn new(config: RunConfig, sink: S, rng: R) -> Self {
        Self {
            config,
            sink,
            rng,
            plot: None,
            state: RunState::Idle,
        }
    }

    /// Feed every raw Hénon sample to a visualization consumer.
    pub fn with_plot(mut self, feed: PlotFeed) -> Self {
        self.plot = Some(feed);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // ─── Bifurcation ────────────────────────────────────────────────────

    /// Sonify the logistic bifurcation diagram: one note per r value.
    pub fn run_bifurcation(&mut self) -> Result<RunSummary> {
        self.ensure_idle()?;
        self.config.tempo.validate()?;
        self.config.bifurcation.validate()?;
        let b = &self.config.bifurcation;
        let r_values = sweep(b.r_start, b.r_end, b.r_step)?;
        info!(
            "Bifurcation sweep: {} values of r in [{}, {}), {} iterations, burn-in {}",
            r_values.len(),
            b.r_start,
            b.r_end,
            b.iterations,
            b.burn_in
        );

        self.transition(RunState::Running);
        let result = self.perform_bifurcation(&r_values);
        self.close(result)
    }

    fn perform_bifurcation(&mut self, r_values: &[f64]) -> Result<RunSummary> {
        let cfg = self.config.bifurcation.clone();
        let mut summary = RunSummary::default();

        self.sink.send(&NoteMessage::Sustain { value: MIDI_MAX })?;

        for (i, &r) in r_values.iter().enumerate() {
            summary.steps += 1;
            let x0: f64 = self.rng.gen();
            let trajectory = logistic_trajectory(r, x0, cfg.iterations, cfg.burn_in)?;

            let value = match select_bifurcation_value(&trajectory, i) {
                Some(v) => v,
                None => {
                    warn!("r={}: no finite samples, step skipped", r);
                    summary.skipped_steps += 1;
                    continue;
                }
            };
            let event = MusicalEvent::new(piano_note(value), cfg.velocity, cfg.release_velocity);
            debug!("[{:>4}] r={:<7} x0={:.4} value={:.2} {}", i, r, x0, value, event);
            play(&mut self.sink, &event)?;
            summary.events += 1;

            if summary.steps % 100 == 0 {
                info!("{} / {} sweep steps played", summary.steps, r_values.len());
            }
        }
        Ok(summary)
    }

    // ─── Hénon orbits ───────────────────────────────────────────────────

    /// Play radially expanding orbits of the rotation Hénon map.
    pub fn run_henon(&mut self) -> Result<RunSummary> {
        let map = HenonMap::new(self.config.henon.a);
        self.run_orbits(map)
    }

    /// Play radially expanding orbits of any planar map.
    pub fn run_orbits<M: PlanarMap + Clone>(&mut self, map: M) -> Result<RunSummary> {
        self.ensure_idle()?;
        self.config.tempo.validate()?;
        self.config.henon.validate()?;
        let h = &self.config.henon;
        let orbits = orbit_radii(h.starting_radius, h.number_of_orbits, h.iterations_per_orbit)?;
        info!(
            "Hénon run: a={}, {} orbits × {} iterations from radius {}",
            h.a,
            orbits.len(),
            h.iterations_per_orbit,
            h.starting_radius
        );

        self.transition(RunState::Running);
        let result = self.perform_orbits(map, &orbits);
        self.close(result)
    }

    fn perform_orbits<M: PlanarMap + Clone>(
        &mut self,
        map: M,
        orbits: &[crate::types::OrbitDescriptor],
    ) -> Result<RunSummary> {
        let policy = self.config.henon.on_divergence;
        let mut summary = RunSummary::default();

        self.sink.send(&NoteMessage::Sustain { value: MIDI_MAX })?;

        for orbit in orbits {
            summary.steps += 1;
            let color = orbit_color(&mut self.rng);
            let mut diverged = false;

            for step in Orbit::new(map.clone(), orbit.start(), orbit.iterations) {
                match step {
                    Step::Sample(p) => {
                        if let Some(feed) = self.plot.as_mut() {
                            feed.push(PlotPoint {
                                orbit: orbit.index,
                                x: p.x,
                                y: p.y,
                                color,
                            });
                        }
                        let event = henon_event(p);
                        debug!(
                            "Note: {}, Velocity: {}, X: {}, Y: {}",
                            event.note, event.velocity, p.x, p.y
                        );
                        play(&mut self.sink, &event)?;
                        summary.events += 1;
                    }
                    Step::Diverged { iteration } => {
                        warn!(
                            "Orbit {} (radius {:.4}) diverged at iteration {}",
                            orbit.index, orbit.radius, iteration
                        );
                        diverged = true;
                    }
                }
            }

            if diverged {
                summary.diverged_orbits += 1;
                if policy == DivergencePolicy::EndRun {
                    info!("Ending run after divergence");
                    break;
                }
            }
        }
        Ok(summary)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    fn ensure_idle(&self) -> Result<()> {
        if self.state != RunState::Idle {
            return Err(Error::invalid(format!(
                "coordinator can run once; current state is {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} → {:?}", self.state, next);
        self.state = next;
    }

    fn close(&mut self, result: Result<RunSummary>) -> Result<RunSummary> {
        self.transition(RunState::Done);
        let summary = result?;
        self.sink.finish()?;
        info!(
            "Run complete: {} events over {} steps ({} diverged, {} skipped)",
            summary.events, summary.steps, summary.diverged_orbits, summary.skipped_steps
        );
        Ok(summary)
    }
}
