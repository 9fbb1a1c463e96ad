// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::state::QuantumState;
use crate::{Error, Result};
use amplitude_backend::AmplitudeBackend;
use log::trace;
use num_complex::Complex64;

/// Branches with less probability mass than this are never selected.
pub const MEASUREMENT_EPSILON: f64 = 1e-12;

/// Measures `qubit` in the computational basis and collapses the state onto the outcome.
///
/// One uniform draw is consumed per call, including when the outcome is certain.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if `qubit` is outside the register and
/// [`Error::InvalidArgument`] if the state has no probability mass.
pub fn apply_measure<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    qubit: usize,
) -> Result<bool> {
    if qubit >= state.n_qubits() {
        return Err(Error::DimensionMismatch {
            required: qubit + 1,
            available: state.n_qubits(),
        });
    }
    let mask = 1 << qubit;
    let p1 = state.backend().conditional_collect(mask, mask);
    let p0 = state.backend().conditional_collect(mask, 0);
    let total = p0 + p1;
    if total < MEASUREMENT_EPSILON {
        return Err(Error::InvalidArgument(
            "cannot measure a state with zero norm".to_string(),
        ));
    }

    let r = state.sample_uniform();
    let mut outcome = r < (p1 / total).clamp(0.0, 1.0);
    if (if outcome { p1 } else { p0 }) < MEASUREMENT_EPSILON {
        outcome = !outcome;
    }
    let (mass, condition) = if outcome { (p1, mask) } else { (p0, 0) };

    state.backend_mut().conditional_mul(
        mask,
        condition,
        Complex64::new(mass.sqrt().recip(), 0.0),
        Complex64::new(0.0, 0.0),
    );
    trace!("measured qubit {qubit} as {} with p1 = {p1}", u8::from(outcome));
    Ok(outcome)
}
