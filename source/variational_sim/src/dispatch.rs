// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(test)]
mod tests;

use crate::gate::{Circuit, CustomMatrix, FixedGate, Gate, GateKind, RotationGate};
use crate::parameter::ParameterBinding;
use crate::state::QuantumState;
use crate::{Error, Result, channel, measure};
use amplitude_backend::matrices::{self, dagger};
use amplitude_backend::{AmplitudeBackend, Matrix};
use num_complex::Complex64;
use rustc_hash::FxHashSet;

/// Applies `gate` to `state`, or its derivative with respect to the gate's angle when
/// `differentiate` is set.
///
/// Returns the outcome for measurement gates and `None` for every other kind. Gates without
/// symbolic angles ignore `differentiate`.
///
/// # Errors
/// - [`Error::InvalidArgument`] for a wrong operand count, a repeated qubit, a custom matrix of
///   the wrong size, or a derivative request on a measurement, a channel, or a parameterized
///   multi-angle gate.
/// - [`Error::DimensionMismatch`] if the gate touches a qubit outside the register.
/// - [`Error::MissingParameter`] if an angle symbol has no bound value.
pub fn apply_gate<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    gate: &Gate,
    binding: &ParameterBinding,
    differentiate: bool,
) -> Result<Option<bool>> {
    validate(state, gate)?;
    let diff = differentiate && gate.is_parameterized();
    let (objs, ctrls) = (gate.obj_qubits.as_slice(), gate.ctrl_qubits.as_slice());
    match &gate.kind {
        GateKind::Fixed(fixed) => apply_fixed(state.backend_mut(), *fixed, gate),
        GateKind::Rotation(rotation, angle) => {
            let value = angle.combination(binding)?.value;
            apply_rotation(state.backend_mut(), *rotation, gate, value, diff);
        }
        GateKind::U3 { .. } | GateKind::FSim { .. } => {
            if diff {
                return Err(Error::InvalidArgument(format!(
                    "{gate} has several angles, differentiate it one angle at a time"
                )));
            }
            let values = angle_values(gate, binding)?;
            let matrix = multi_angle_matrix(&gate.kind, &values, None);
            let matrix = if gate.daggered { dagger(&matrix) } else { matrix };
            state.backend_mut().apply_matrix(objs, ctrls, &matrix, false);
        }
        GateKind::Custom(custom, angle) => {
            let value = angle.combination(binding)?.value;
            let matrix = custom_matrix(gate, custom, value, diff)?;
            state.backend_mut().apply_matrix(objs, ctrls, &matrix, diff);
        }
        GateKind::Measure(_) => {
            reject_derivative(gate, differentiate)?;
            return measure::apply_measure(state, objs[0]).map(Some);
        }
        GateKind::Channel(noise) => {
            reject_derivative(gate, differentiate)?;
            channel::apply_channel(state, noise, objs[0])?;
        }
    }
    Ok(None)
}

/// Applies the partial derivative of `gate` with respect to its angle `angle_index`, in the order
/// given by [`Gate::angles`]. Controls are honoured by zeroing the control-off subspace.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if the gate has no angle at `angle_index`, plus every error
/// [`apply_gate`] reports.
pub fn apply_angle_derivative<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    gate: &Gate,
    binding: &ParameterBinding,
    angle_index: usize,
) -> Result<()> {
    validate(state, gate)?;
    let n_angles = gate.angles().len();
    if angle_index >= n_angles {
        return Err(Error::InvalidArgument(format!(
            "{gate} has {n_angles} angles, derivative {angle_index} requested"
        )));
    }
    match &gate.kind {
        GateKind::U3 { .. } | GateKind::FSim { .. } => {
            let values = angle_values(gate, binding)?;
            let matrix = multi_angle_matrix(&gate.kind, &values, Some(angle_index));
            let matrix = if gate.daggered { dagger(&matrix) } else { matrix };
            state
                .backend_mut()
                .apply_matrix(&gate.obj_qubits, &gate.ctrl_qubits, &matrix, true);
        }
        GateKind::Rotation(rotation, angle) => {
            let value = angle.combination(binding)?.value;
            apply_rotation(state.backend_mut(), *rotation, gate, value, true);
        }
        GateKind::Custom(custom, angle) => {
            let value = angle.combination(binding)?.value;
            let matrix = custom_matrix(gate, custom, value, true)?;
            state
                .backend_mut()
                .apply_matrix(&gate.obj_qubits, &gate.ctrl_qubits, &matrix, true);
        }
        GateKind::Fixed(_) | GateKind::Measure(_) | GateKind::Channel(_) => {
            unreachable!("gates without angles are rejected above")
        }
    }
    Ok(())
}

/// Applies every gate of `circuit` in order and returns the measurement outcomes by key, in gate
/// order.
pub fn apply_circuit<'c, B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    circuit: &'c Circuit,
    binding: &ParameterBinding,
) -> Result<Vec<(&'c str, bool)>> {
    let mut outcomes = Vec::new();
    for gate in circuit {
        let outcome = apply_gate(state, gate, binding, false)?;
        if let (GateKind::Measure(key), Some(bit)) = (&gate.kind, outcome) {
            outcomes.push((key.as_str(), bit));
        }
    }
    Ok(outcomes)
}

fn validate<B: AmplitudeBackend>(state: &QuantumState<B>, gate: &Gate) -> Result<()> {
    let expected = gate.expected_objs();
    if gate.obj_qubits.len() != expected {
        return Err(Error::InvalidArgument(format!(
            "{gate} acts on {expected} qubits, got {}",
            gate.obj_qubits.len()
        )));
    }
    if gate.is_stochastic() && !gate.ctrl_qubits.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "{gate} cannot be controlled"
        )));
    }
    state.check_qubits(gate)?;
    let mut seen = FxHashSet::default();
    if let Some(repeated) = gate.qubits().find(|q| !seen.insert(*q)) {
        return Err(Error::InvalidArgument(format!(
            "{gate} uses qubit {repeated} more than once"
        )));
    }
    Ok(())
}

fn reject_derivative(gate: &Gate, differentiate: bool) -> Result<()> {
    if differentiate {
        Err(Error::InvalidArgument(format!("{gate} has no derivative")))
    } else {
        Ok(())
    }
}

fn angle_values(gate: &Gate, binding: &ParameterBinding) -> Result<Vec<f64>> {
    gate.angles()
        .into_iter()
        .map(|angle| Ok(angle.combination(binding)?.value))
        .collect()
}

/// The custom gate's matrix, or its derivative, with the gate's dagger applied.
fn custom_matrix(gate: &Gate, custom: &CustomMatrix, value: f64, diff: bool) -> Result<Matrix> {
    let matrix = if diff {
        custom.derivative(value)
    } else {
        custom.matrix(value)
    };
    if !matrices::fits_qubits(&matrix, custom.n_qubits()) {
        return Err(Error::InvalidArgument(format!(
            "{gate} produced a {}x{} matrix at angle {value}",
            matrix.nrows(),
            matrix.ncols()
        )));
    }
    Ok(if gate.daggered { dagger(&matrix) } else { matrix })
}

fn multi_angle_matrix(kind: &GateKind, values: &[f64], diff: Option<usize>) -> Matrix {
    match (kind, values) {
        (GateKind::U3 { .. }, &[theta, phi, lambda]) => matrices::u3(theta, phi, lambda, diff),
        (GateKind::FSim { .. }, &[theta, phi]) => matrices::fsim(theta, phi, diff),
        _ => unreachable!("angle values always match the gate kind"),
    }
}

fn apply_fixed<B: AmplitudeBackend>(backend: &mut B, fixed: FixedGate, gate: &Gate) {
    let (objs, ctrls) = (gate.obj_qubits.as_slice(), gate.ctrl_qubits.as_slice());
    match fixed {
        FixedGate::I => {}
        FixedGate::X => backend.x(objs, ctrls),
        FixedGate::Y => backend.y(objs, ctrls),
        FixedGate::Z => backend.z(objs, ctrls),
        FixedGate::H => backend.h(objs, ctrls),
        FixedGate::S => backend.s(objs, ctrls, gate.daggered),
        FixedGate::T => backend.t(objs, ctrls, gate.daggered),
        FixedGate::Swap => backend.swap(objs, ctrls),
        FixedGate::ISwap => backend.iswap(objs, ctrls, gate.daggered),
    }
}

/// A daggered rotation is `R(-θ)`, whose derivative with respect to `θ` is `-R'(-θ)`.
fn apply_rotation<B: AmplitudeBackend>(
    backend: &mut B,
    rotation: RotationGate,
    gate: &Gate,
    value: f64,
    diff: bool,
) {
    let (objs, ctrls) = (gate.obj_qubits.as_slice(), gate.ctrl_qubits.as_slice());
    let theta = if gate.daggered { -value } else { value };
    match rotation {
        RotationGate::Rx => backend.rx(objs, ctrls, theta, diff),
        RotationGate::Ry => backend.ry(objs, ctrls, theta, diff),
        RotationGate::Rz => backend.rz(objs, ctrls, theta, diff),
        RotationGate::PhaseShift => backend.phase_shift(objs, ctrls, theta, diff),
        RotationGate::Rxx => backend.rxx(objs, ctrls, theta, diff),
        RotationGate::Ryy => backend.ryy(objs, ctrls, theta, diff),
        RotationGate::Rzz => backend.rzz(objs, ctrls, theta, diff),
        RotationGate::GlobalPhase => backend.global_phase(objs, ctrls, theta, diff),
    }
    if diff && gate.daggered {
        backend.scale(Complex64::new(-1.0, 0.0));
    }
}
