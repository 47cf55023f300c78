//! Iterated chaotic maps: the logistic map and a Hénon-type rotation map.
//!
//! Both generators are lazy iterators that advance one step per `next()`.
//! They are restartable only by constructing a new iterator.

use crate::error::{Error, Result};
use crate::types::Point;

// ─── Logistic map ───────────────────────────────────────────────────────────

/// x_{n+1} = r · x_n · (1 − x_n)
pub fn logistic_step(x: f64, r: f64) -> f64 {
    r * x * (1.0 - x)
}

/// Lazy logistic trajectory: runs `iterations` steps from `x0` and yields
/// every sample after the first `burn_in`.
#[derive(Debug, Clone)]
pub struct LogisticTrajectory {
    r: f64,
    x: f64,
    step: usize,
    iterations: usize,
    burn_in: usize,
}

impl LogisticTrajectory {
    pub fn new(r: f64, x0: f64, iterations: usize, burn_in: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&x0) {
            return Err(Error::invalid(format!(
                "initial x must be between 0 and 1, got {}",
                x0
            )));
        }
        if burn_in >= iterations {
            return Err(Error::invalid(format!(
                "burn-in ({}) must be less than the iteration count ({})",
                burn_in, iterations
            )));
        }
        Ok(Self {
            r,
            x: x0,
            step: 0,
            iterations,
            burn_in,
        })
    }
}

impl Iterator for LogisticTrajectory {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        while self.step < self.iterations {
            self.x = logistic_step(self.x, self.r);
            self.step += 1;
            if self.step > self.burn_in {
                return Some(self.x);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.iterations - self.step.max(self.burn_in);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for LogisticTrajectory {}

/// Eager form of [`LogisticTrajectory`]: `iterations − burn_in` samples.
pub fn logistic_trajectory(r: f64, x0: f64, iterations: usize, burn_in: usize) -> Result<Vec<f64>> {
    Ok(LogisticTrajectory::new(r, x0, iterations, burn_in)?.collect())
}

// ─── Planar maps ────────────────────────────────────────────────────────────

/// A two-variable recurrence. `Orbit` drives any implementation with the
/// same sequencing and divergence rules.
pub trait PlanarMap {
    fn step(&self, p: Point) -> Point;
}

impl<F> PlanarMap for F
where
    F: Fn(Point) -> Point,
{
    fn step(&self, p: Point) -> Point {
        self(p)
    }
}

/// Rotation form of the Hénon map with angle `a`:
///   x' = x·cos(a) − (y − x²)·sin(a)
///   y' = x·sin(a) + (y − x²)·cos(a)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HenonMap {
    pub a: f64,
    sin_a: f64,
    cos_a: f64,
}

impl HenonMap {
    pub fn new(a: f64) -> Self {
        Self {
            a,
            sin_a: a.sin(),
            cos_a: a.cos(),
        }
    }
}

impl PlanarMap for HenonMap {
    fn step(&self, p: Point) -> Point {
        let w = p.y - p.x * p.x;
        Point::new(
            p.x * self.cos_a - w * self.sin_a,
            p.x * self.sin_a + w * self.cos_a,
        )
    }
}

/// Scalar equation of one output component: `f(x, y, a)`.
pub type Equation = fn(f64, f64, f64) -> f64;

pub fn henon_x(x: f64, y: f64, a: f64) -> f64 {
    x * a.cos() - (y - x * x) * a.sin()
}

pub fn henon_y(x: f64, y: f64, a: f64) -> f64 {
    x * a.sin() + (y - x * x) * a.cos()
}

/// A planar map assembled from two independent component equations sharing
/// one parameter. `SplitMap::henon(a)` is equivalent to `HenonMap::new(a)`.
#[derive(Debug, Clone, Copy)]
pub struct SplitMap {
    pub a: f64,
    pub fx: Equation,
    pub fy: Equation,
}

impl SplitMap {
    pub fn new(a: f64, fx: Equation, fy: Equation) -> Self {
        Self { a, fx, fy }
    }

    pub fn henon(a: f64) -> Self {
        Self::new(a, henon_x, henon_y)
    }
}

impl PlanarMap for SplitMap {
    fn step(&self, p: Point) -> Point {
        Point::new((self.fx)(p.x, p.y, self.a), (self.fy)(p.x, p.y, self.a))
    }
}

// ─── Orbit iteration ────────────────────────────────────────────────────────

/// Outcome of one orbit step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Sample(Point),
    /// The step produced a non-finite component. `iteration` is 0-based.
    Diverged { iteration: usize },
}

impl Step {
    pub fn into_sample(self) -> Result<Point> {
        match self {
            Step::Sample(p) => Ok(p),
            Step::Diverged { iteration } => Err(Error::NumericDivergence { iteration }),
        }
    }
}

/// Lazy orbit of a planar map. Yields up to `iterations` steps; after a
/// `Step::Diverged` it yields nothing more.
#[derive(Debug, Clone)]
pub struct Orbit<M> {
    map: M,
    state: Point,
    iteration: usize,
    iterations: usize,
    diverged: bool,
}

impl<M: PlanarMap> Orbit<M> {
    pub fn new(map: M, start: Point, iterations: usize) -> Self {
        Self {
            map,
            state: start,
            iteration: 0,
            iterations,
            diverged: false,
        }
    }
}

impl<M: PlanarMap> Iterator for Orbit<M> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.diverged || self.iteration >= self.iterations {
            return None;
        }
        let next = self.map.step(self.state);
        let iteration = self.iteration;
        self.iteration += 1;
        if !next.is_finite() {
            self.diverged = true;
            return Some(Step::Diverged { iteration });
        }
        self.state = next;
        Some(Step::Sample(next))
    }
}

impl<M: PlanarMap> std::iter::FusedIterator for Orbit<M> {}

/// Eager orbit: all `iterations` samples, or `NumericDivergence` at the
/// first non-finite step.
pub fn henon_trajectory<M: PlanarMap>(map: M, start: Point, iterations: usize) -> Result<Vec<Point>> {
    Orbit::new(map, start, iterations)
        .map(Step::into_sample)
        .collect()
}
