// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expectation values and analytic gradients by bra/ket co-evolution.
//!
//! For `f = ⟨ψ|U† H U|ψ⟩` with `U = U_N ⋯ U_1`, the ket is evolved through the whole circuit and
//! a bra `H U|ψ⟩` is derived from it. Walking the circuit backwards, each step undoes `U_k` on
//! the ket, contracts the bra with `U_k'` applied to the ket, and then undoes `U_k` on the bra.
//! The walk stops at the first gate carrying a differentiable parameter.
//!
//! Several observables share one walk: the ket is stepped once per gate and every bra is
//! contracted against the same derivative ket.


use crate::dispatch::{apply_angle_derivative, apply_gate};
use crate::gate::{Circuit, Gate, GateKind};
use crate::hamiltonian::Hamiltonian;
use crate::parameter::{Combination, ParameterBinding, ParameterIndex};
use crate::state::QuantumState;
use crate::{Error, Result};
use amplitude_backend::AmplitudeBackend;
use log::trace;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rustc_hash::FxHashMap;

/// How a raw derivative contraction `⟨bra|∂ket⟩` enters the gradient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contribution {
    /// `2 Re(raw)`, for `⟨ψ|H|ψ⟩` with Hermitian `H`.
    Hermitian,
    /// `raw` as is, for one side of `⟨L|H|R⟩`.
    OneSided,
}

impl Contribution {
    fn fold(self, raw: Complex64) -> Complex64 {
        match self {
            Contribution::Hermitian => Complex64::new(2.0 * raw.re, 0.0),
            Contribution::OneSided => raw,
        }
    }
}

/// Evolves `state` through `circuit`.
///
/// # Errors
/// Returns [`Error::UnsupportedOperation`] if the circuit measures or applies noise, since
/// neither has a derivative.
pub fn evolve<B: AmplitudeBackend>(
    state: &mut QuantumState<B>,
    circuit: &Circuit,
    binding: &ParameterBinding,
) -> Result<()> {
    if let Some(gate) = circuit.iter().find(|gate| gate.is_stochastic()) {
        return Err(Error::UnsupportedOperation(format!(
            "{gate} cannot be part of a differentiated circuit"
        )));
    }
    for gate in circuit {
        apply_gate(state, gate, binding, false)?;
    }
    Ok(())
}

/// Returns `[f, ∂f/∂p_0, ∂f/∂p_1, ...]` for `f = ⟨ψ|U† H U|ψ⟩`, with parameters numbered by
/// `index`.
pub fn expectation_with_grad<B: AmplitudeBackend>(
    ham: &Hamiltonian,
    circuit: &Circuit,
    init: &QuantumState<B>,
    binding: &ParameterBinding,
    index: &ParameterIndex,
) -> Result<Vec<Complex64>> {
    let mut all =
        expectation_with_grad_multi(std::slice::from_ref(ham), circuit, init, binding, index)?;
    Ok(all.swap_remove(0))
}

/// [`expectation_with_grad`] for several observables sharing one evolution and one walk.
pub fn expectation_with_grad_multi<B: AmplitudeBackend>(
    hams: &[Hamiltonian],
    circuit: &Circuit,
    init: &QuantumState<B>,
    binding: &ParameterBinding,
    index: &ParameterIndex,
) -> Result<Vec<Vec<Complex64>>> {
    check_observables(hams, init.n_qubits())?;
    let mut ket = init.clone();
    evolve(&mut ket, circuit, binding)?;
    let mut bras = hams
        .iter()
        .map(|ham| observed(ham, &ket))
        .collect::<Vec<_>>();
    let mut grads = leading_expectations(&bras, &ket, index);
    co_evolve(
        &mut ket,
        &mut bras,
        circuit,
        binding,
        index,
        Contribution::Hermitian,
        &mut grads,
    )?;
    Ok(grads)
}

/// Returns `[f, ∂f/∂p_0, ...]` for `f = ⟨L|H|R⟩`, where `|L⟩` and `|R⟩` are `left_init` and
/// `right_init` evolved through `left` and `right`. The gradient entries are complex.
pub fn non_hermitian_expectation_with_grad_multi<B: AmplitudeBackend>(
    hams: &[Hamiltonian],
    left: &Circuit,
    right: &Circuit,
    left_init: &QuantumState<B>,
    right_init: &QuantumState<B>,
    binding: &ParameterBinding,
    index: &ParameterIndex,
) -> Result<Vec<Vec<Complex64>>> {
    if left_init.n_qubits() != right_init.n_qubits() {
        return Err(Error::DimensionMismatch {
            required: right_init.n_qubits(),
            available: left_init.n_qubits(),
        });
    }
    check_observables(hams, right_init.n_qubits())?;
    let mut ket_left = left_init.clone();
    evolve(&mut ket_left, left, binding)?;
    let mut ket_right = right_init.clone();
    evolve(&mut ket_right, right, binding)?;

    // ⟨H†L| ∂R⟩
    let mut bras = hams
        .iter()
        .map(|ham| observed(&ham.hermitian_conjugate(), &ket_left))
        .collect::<Vec<_>>();
    let mut grads = leading_expectations(&bras, &ket_right, index);
    // Co-evolution rewinds its ket, and the evolved right ket is needed again below.
    co_evolve(
        &mut ket_right.clone(),
        &mut bras,
        right,
        binding,
        index,
        Contribution::OneSided,
        &mut grads,
    )?;

    // ⟨HR| ∂L⟩ = conj(⟨∂L|H|R⟩)
    let mut bras = hams
        .iter()
        .map(|ham| observed(ham, &ket_right))
        .collect::<Vec<_>>();
    let mut left_grads = vec![vec![Complex64::new(0.0, 0.0); 1 + index.len()]; hams.len()];
    co_evolve(
        &mut ket_left,
        &mut bras,
        left,
        binding,
        index,
        Contribution::OneSided,
        &mut left_grads,
    )?;

    for (grad, left_grad) in grads.iter_mut().zip(&left_grads) {
        for (entry, left_entry) in grad.iter_mut().zip(left_grad).skip(1) {
            *entry += left_entry.conj();
        }
    }
    Ok(grads)
}

fn check_observables(hams: &[Hamiltonian], n_qubits: usize) -> Result<()> {
    hams.iter().try_for_each(|ham| ham.check_fits(n_qubits))
}

fn observed<B: AmplitudeBackend>(ham: &Hamiltonian, ket: &QuantumState<B>) -> QuantumState<B> {
    let mut bra = ket.clone();
    ham.apply(bra.backend_mut());
    bra
}

fn leading_expectations<B: AmplitudeBackend>(
    bras: &[QuantumState<B>],
    ket: &QuantumState<B>,
    index: &ParameterIndex,
) -> Vec<Vec<Complex64>> {
    bras.iter()
        .map(|bra| {
            let mut grad = vec![Complex64::new(0.0, 0.0); 1 + index.len()];
            grad[0] = bra.backend().vdot(ket.backend());
            grad
        })
        .collect()
}

fn has_grad(combinations: &[Combination<'_>]) -> bool {
    combinations.iter().any(|c| !c.requires_grad.is_empty())
}

fn combinations<'g>(gate: &'g Gate, binding: &ParameterBinding) -> Result<Vec<Combination<'g>>> {
    gate.angles()
        .into_iter()
        .map(|angle| angle.combination(binding))
        .collect()
}

/// Walks `circuit` backwards from its evolved `ket`, adding each gate's derivative contraction
/// against every bra into the matching row of `grads`.
fn co_evolve<B: AmplitudeBackend>(
    ket: &mut QuantumState<B>,
    bras: &mut [QuantumState<B>],
    circuit: &Circuit,
    binding: &ParameterBinding,
    index: &ParameterIndex,
    contribution: Contribution,
    grads: &mut [Vec<Complex64>],
) -> Result<()> {
    let gates = circuit.gates();
    let mut first = None;
    for (pos, gate) in gates.iter().enumerate() {
        if has_grad(&combinations(gate, binding)?) {
            first = Some(pos);
            break;
        }
    }
    let Some(first) = first else {
        return Ok(());
    };
    trace!(
        "co-evolving {} gates against {} observables",
        gates.len() - first,
        bras.len()
    );

    for gate in gates[first..].iter().rev() {
        let adjoint = gate.hermitian();
        apply_gate(ket, &adjoint, binding, false)?;

        let combos = combinations(gate, binding)?;
        if has_grad(&combos) {
            if let [combo] = combos.as_slice() {
                let mut derivative = ket.clone();
                apply_gate(&mut derivative, gate, binding, true)?;
                for (bra, grad) in bras.iter().zip(grads.iter_mut()) {
                    let raw = bra.backend().vdot(derivative.backend());
                    for &(name, coeff) in &combo.requires_grad {
                        scatter(grad, index, name, contribution.fold(raw) * coeff);
                    }
                }
            } else {
                multi_angle_contribution(
                    ket,
                    bras,
                    gate,
                    &combos,
                    binding,
                    index,
                    contribution,
                    grads,
                )?;
            }
        }

        for bra in bras.iter_mut() {
            apply_gate(bra, &adjoint, binding, false)?;
        }
    }
    Ok(())
}

/// Contracts each angle derivative separately and maps the per-angle results onto named
/// parameters through the gate-local Jacobian `J[name, angle] = coeff`.
#[allow(clippy::too_many_arguments)]
fn multi_angle_contribution<B: AmplitudeBackend>(
    ket: &QuantumState<B>,
    bras: &[QuantumState<B>],
    gate: &Gate,
    combos: &[Combination<'_>],
    binding: &ParameterBinding,
    index: &ParameterIndex,
    contribution: Contribution,
    grads: &mut [Vec<Complex64>],
) -> Result<()> {
    debug_assert!(matches!(gate.kind, GateKind::U3 { .. } | GateKind::FSim { .. }));
    let (names, jacobian) = jacobian(combos);

    let mut derivatives = Vec::with_capacity(combos.len());
    for (angle_index, combo) in combos.iter().enumerate() {
        if combo.requires_grad.is_empty() {
            derivatives.push(None);
        } else {
            let mut derivative = ket.clone();
            apply_angle_derivative(&mut derivative, gate, binding, angle_index)?;
            derivatives.push(Some(derivative));
        }
    }

    let jacobian = jacobian.mapv(Complex64::from);
    for (bra, grad) in bras.iter().zip(grads.iter_mut()) {
        let raw = derivatives
            .iter()
            .map(|derivative| {
                derivative
                    .as_ref()
                    .map_or(Complex64::new(0.0, 0.0), |d| bra.backend().vdot(d.backend()))
            })
            .collect::<Array1<_>>();
        let per_name = jacobian.dot(&raw);
        for (name, value) in names.iter().zip(per_name.iter()) {
            scatter(grad, index, name, contribution.fold(*value));
        }
    }
    Ok(())
}

/// Builds the `names × angles` coefficient matrix for a multi-angle gate.
fn jacobian<'a>(combos: &[Combination<'a>]) -> (Vec<&'a str>, Array2<f64>) {
    let mut rows = FxHashMap::default();
    let mut names = Vec::new();
    let mut entries = Vec::new();
    for (angle, combo) in combos.iter().enumerate() {
        for &(name, coeff) in &combo.requires_grad {
            let row = *rows.entry(name).or_insert_with(|| {
                names.push(name);
                names.len() - 1
            });
            entries.push((row, angle, coeff));
        }
    }
    let mut jacobian = Array2::zeros((names.len(), combos.len()));
    for (row, angle, coeff) in entries {
        jacobian[[row, angle]] += coeff;
    }
    (names, jacobian)
}

fn scatter(grad: &mut [Complex64], index: &ParameterIndex, name: &str, value: Complex64) {
    if let Some(&slot) = index.get(name) {
        grad[1 + slot] += value;
    }
}
