//! Control-parameter sweeps (logistic r) and orbit radii (Hénon).

use crate::error::{Error, Result};
use crate::quantize::round_to;
use crate::types::OrbitDescriptor;

/// Radii within this distance above 1.0 still count as ≤ 1.
const RADIUS_EPSILON: f64 = 1e-9;

/// Longest sweep accepted; one note per value.
pub const MAX_SWEEP_LEN: usize = 1 << 24;

/// Number of digits after the decimal point in the shortest decimal
/// representation of `step` (0.001 → 3, 0.25 → 2).
///
/// A step with no fractional part has no defined precision and is rejected.
pub fn decimal_places(step: f64) -> Result<usize> {
    if !step.is_finite() {
        return Err(Error::invalid(format!("step must be finite, got {}", step)));
    }
    let repr = format!("{}", step);
    match repr.split_once('.') {
        Some((_, frac)) if !frac.is_empty() => Ok(frac.len()),
        _ => Err(Error::invalid(format!(
            "step {} has no fractional part; sweep precision is undefined",
            step
        ))),
    }
}

/// `floor((end − start) / step)` values `start + i·step`, each rounded to
/// one more decimal place than `step` carries.
pub fn sweep(start: f64, end: f64, step: f64) -> Result<Vec<f64>> {
    if !start.is_finite() || !end.is_finite() {
        return Err(Error::invalid(format!(
            "sweep bounds must be finite, got [{}, {})",
            start, end
        )));
    }
    if !(step > 0.0) {
        return Err(Error::invalid(format!("sweep step must be positive, got {}", step)));
    }
    let precision = decimal_places(step)? + 1;
    let span = ((end - start) / step).floor().max(0.0);
    if !(span <= MAX_SWEEP_LEN as f64) {
        return Err(Error::invalid(format!(
            "sweep [{}, {}) by {} has more than {} values",
            start, end, step, MAX_SWEEP_LEN
        )));
    }
    let count = span as usize;
    Ok((0..count)
        .map(|i| round_to(start + i as f64 * step, precision))
        .collect())
}

/// Orbits of the expanding-radius program. The radius grows by
/// `(1 − starting_radius) / number_of_orbits` per orbit, beginning one step
/// above `starting_radius`, and stops once it would exceed 1.
pub fn orbit_radii(
    starting_radius: f64,
    number_of_orbits: usize,
    iterations_per_orbit: usize,
) -> Result<Vec<OrbitDescriptor>> {
    if number_of_orbits == 0 {
        return Err(Error::invalid("number of orbits must be at least 1"));
    }
    if !(0.0..1.0).contains(&starting_radius) {
        return Err(Error::invalid(format!(
            "starting radius must be in [0, 1), got {}",
            starting_radius
        )));
    }
    let radius_step = (1.0 - starting_radius) / number_of_orbits as f64;

    // Index-multiplied rather than accumulated so the last radius lands on 1.0.
    // An accumulate-then-test loop overshoots to a 34th orbit at ~1.027.
    let orbits = (1..)
        .map(|k| starting_radius + k as f64 * radius_step)
        .take_while(|&r| r <= 1.0 + RADIUS_EPSILON)
        .enumerate()
        .map(|(index, radius)| OrbitDescriptor {
            index,
            radius,
            iterations: iterations_per_orbit,
        })
        .collect();
    Ok(orbits)
}
