// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::gate::Channel;
use crate::state::QuantumState;
use crate::{Error, Result};
use amplitude_backend::matrices::fits_qubits;
use amplitude_backend::{AmplitudeBackend, Matrix};
use log::trace;
use ndarray::array;
use num_complex::Complex64;

/// Damping is skipped when the excited amplitude of the target is below this.
pub const DAMPING_THRESHOLD: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Damping {
    Amplitude,
    Phase,
}

/// Applies one stochastically selected branch of `channel` to `qubit`.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if `qubit` is outside the register and
/// [`Error::InvalidArgument`] if a Kraus operator is not a single-qubit matrix or none has a
/// nonzero branch probability.
pub fn apply_channel<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    channel: &Channel,
    qubit: usize,
) -> Result<()> {
    if qubit >= state.n_qubits() {
        return Err(Error::DimensionMismatch {
            required: qubit + 1,
            available: state.n_qubits(),
        });
    }
    match channel {
        Channel::Pauli { px, py, pz } => {
            apply_pauli_channel(state, [*px, *py, *pz], qubit);
            Ok(())
        }
        Channel::Kraus(operators) => apply_kraus(state, operators, qubit),
        Channel::AmplitudeDamping(gamma) => {
            apply_damping(state, *gamma, qubit, Damping::Amplitude);
            Ok(())
        }
        Channel::PhaseDamping(gamma) => {
            apply_damping(state, *gamma, qubit, Damping::Phase);
            Ok(())
        }
    }
}

fn apply_pauli_channel<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    [px, py, pz]: [f64; 3],
    qubit: usize,
) {
    let cumulative = [0.0, px, px + py, px + py + pz];
    let r = state.sample_uniform();
    let index = cumulative.partition_point(|c| *c <= r).saturating_sub(1);
    let backend = state.backend_mut();
    match index {
        0 => backend.x(&[qubit], &[]),
        1 => backend.y(&[qubit], &[]),
        2 => backend.z(&[qubit], &[]),
        _ => {}
    }
    trace!("pauli channel on qubit {qubit} selected branch {index}");
}

fn apply_kraus<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    operators: &[Matrix],
    qubit: usize,
) -> Result<()> {
    if let Some(index) = operators.iter().position(|k| !fits_qubits(k, 1)) {
        return Err(Error::InvalidArgument(format!(
            "Kraus operator {index} is not a single-qubit matrix"
        )));
    }
    let mut cumulative = 0.0;
    let mut fallback = None;
    for (index, operator) in operators.iter().enumerate() {
        let mut candidate = state.backend().clone();
        candidate.apply_matrix(&[qubit], &[], operator, false);
        let p = candidate.norm_squared();
        if p <= 0.0 {
            continue;
        }
        let remaining = 1.0 - cumulative;
        let r = state.sample_uniform();
        if remaining <= p || r < p / remaining {
            accept_kraus(state, candidate, p, qubit, index);
            return Ok(());
        }
        cumulative += p;
        fallback = Some((candidate, p, index));
    }
    // Rounding can leave the last nonzero branch just short of certain.
    let (candidate, p, index) = fallback.ok_or_else(|| {
        Error::InvalidArgument("no Kraus operator has a nonzero probability".to_string())
    })?;
    accept_kraus(state, candidate, p, qubit, index);
    Ok(())
}

fn accept_kraus<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    mut candidate: B,
    p: f64,
    qubit: usize,
    index: usize,
) {
    candidate.scale(Complex64::new(p.sqrt().recip(), 0.0));
    *state.backend_mut() = candidate;
    trace!("kraus channel on qubit {qubit} selected operator {index} with p = {p}");
}

fn apply_damping<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    gamma: f64,
    qubit: usize,
    damping: Damping,
) {
    let mask = 1 << qubit;
    let b_squared = state.backend().conditional_collect(mask, mask);
    let b = b_squared.sqrt();
    if b < DAMPING_THRESHOLD {
        return;
    }
    let p = gamma * b_squared;
    let decayed = state.sample_uniform() < p;
    let backend = state.backend_mut();
    if decayed {
        match damping {
            Damping::Amplitude => {
                let zero = Complex64::new(0.0, 0.0);
                let kernel: Matrix = array![[zero, Complex64::new(b.recip(), 0.0)], [zero, zero]];
                backend.apply_matrix(&[qubit], &[], &kernel, false);
            }
            Damping::Phase => backend.conditional_mul(
                mask,
                mask,
                Complex64::new(b.recip(), 0.0),
                Complex64::new(0.0, 0.0),
            ),
        }
    } else {
        let keep = (1.0 - p).sqrt().recip();
        backend.conditional_mul(
            mask,
            mask,
            Complex64::new((1.0 - gamma).sqrt() * keep, 0.0),
            Complex64::new(keep, 0.0),
        );
    }
    trace!("{damping:?} damping on qubit {qubit}: decayed = {decayed}, p = {p}");
}
