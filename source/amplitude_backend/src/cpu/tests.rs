// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;
use crate::matrices;
use std::f64::consts::FRAC_1_SQRT_2;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn assert_amplitudes(state: &CpuStateVector, expected: &[Complex64]) {
    assert_eq!(expected.len(), state.amplitudes().len());
    for (actual, expected) in state.amplitudes().iter().zip(expected) {
        assert!(
            (actual - expected).norm() < 1e-12,
            "{:?} vs {expected:?}",
            state.amplitudes()
        );
    }
}

#[test]
fn new_state_is_all_zeros_ket() {
    let state = CpuStateVector::new(2);
    assert_eq!(4, state.dim());
    assert_amplitudes(&state, &[c(1.0, 0.0), ZERO, ZERO, ZERO]);
}

#[test]
fn bell_state_from_h_and_cnot() {
    let mut state = CpuStateVector::new(2);
    state.h(&[0], &[]);
    state.x(&[1], &[0]);
    let f = c(FRAC_1_SQRT_2, 0.0);
    assert_amplitudes(&state, &[f, ZERO, ZERO, f]);
}

#[test]
fn specialized_x_matches_dense_kernel() {
    let mut state = CpuStateVector::new(3);
    state.h(&[0], &[]);
    state.ry(&[2], &[], 0.7, false);
    let mut dense = state.clone();
    state.x(&[1], &[0, 2]);
    dense.apply_matrix(&[1], &[0, 2], &matrices::X, false);
    assert_amplitudes(&state, dense.amplitudes());
}

#[test]
fn first_target_is_least_significant_operand_bit() {
    let mut state = CpuStateVector::new(2);
    state.x(&[0], &[]);
    // CNOT written as a dense two-qubit matrix with the control on operand bit 0.
    let o = ZERO;
    let l = c(1.0, 0.0);
    let cnot = ndarray::array![[l, o, o, o], [o, o, o, l], [o, o, l, o], [o, l, o, o]];
    state.apply_matrix(&[0, 1], &[], &cnot, false);
    assert_amplitudes(&state, &[o, o, o, l]);
}

#[test]
fn controlled_derivative_zeroes_inactive_subspace() {
    let mut state = CpuStateVector::new(2);
    state.h(&[0], &[]);
    state.h(&[1], &[]);
    state.rx(&[1], &[0], 0.4, true);
    assert!(state.conditional_collect(0b01, 0) < 1e-30);
    assert!(state.conditional_collect(0b01, 0b01) > 0.0);
}

#[test]
fn controlled_gate_leaves_inactive_subspace() {
    let mut state = CpuStateVector::new(2);
    state.h(&[1], &[]);
    let before = state.clone();
    state.rx(&[1], &[0], 0.4, false);
    assert_amplitudes(&state, before.amplitudes());
}

#[test]
fn set_amplitudes_rejects_wrong_length() {
    let mut state = CpuStateVector::new(1);
    let err = state
        .set_amplitudes(&[ZERO; 4])
        .expect_err("length mismatch should fail");
    assert_eq!(
        Error::LengthMismatch {
            expected: 2,
            found: 4
        },
        err
    );
}

#[test]
fn reset_returns_to_zero_ket() {
    let mut state = CpuStateVector::new(2);
    state.h(&[0], &[]);
    state.reset();
    assert_eq!(CpuStateVector::new(2), state);
}

#[test]
fn conditional_helpers_partition_probability() {
    let mut state = CpuStateVector::new(2);
    state.ry(&[0], &[], 1.0, false);
    let p1 = state.conditional_collect(0b01, 0b01);
    let p0 = state.conditional_collect(0b01, 0);
    assert!((p0 + p1 - 1.0).abs() < 1e-12);
    assert!((p1 - (0.5f64).sin().powi(2)).abs() < 1e-12);

    state.conditional_mul(0b01, 0b01, c(1.0 / p1.sqrt(), 0.0), ZERO);
    assert!((state.norm_squared() - 1.0).abs() < 1e-12);
    assert!(state.conditional_collect(0b01, 0) < 1e-30);
}

#[test]
fn vdot_is_conjugate_linear_in_bra() {
    let mut ket = CpuStateVector::new(1);
    ket.h(&[0], &[]);
    let mut bra = ket.clone();
    bra.s(&[0], &[], false);
    // ⟨+|S|+⟩ = (1 + i) / 2
    assert!((ket.vdot(&bra) - c(0.5, 0.5)).norm() < 1e-12);
    assert!((bra.vdot(&ket) - c(0.5, -0.5)).norm() < 1e-12);
    assert!((ket.vdot_subspace(&bra, 1, 1) - c(0.0, 0.5)).norm() < 1e-12);
}

#[test]
fn pauli_terms_act_as_weighted_sum() {
    let mut state = CpuStateVector::new(2);
    state.x(&[0], &[]);
    let terms = [
        PauliTerm::parse("Z0", 0.5).expect("term should parse"),
        PauliTerm::parse("Y1", 2.0).expect("term should parse"),
    ];
    state.apply_pauli_terms(&terms);
    // 0.5 Z0 |01⟩ = -0.5 |01⟩, 2 Y1 |01⟩ = 2i |11⟩
    assert_amplitudes(&state, &[ZERO, c(-0.5, 0.0), ZERO, c(0.0, 2.0)]);
}

#[test]
fn csr_pair_is_summed() {
    let mut state = CpuStateVector::new(1);
    state.h(&[0], &[]);
    let primary = CsrMatrix::from_triplets(2, &[(0, 1, c(1.0, 0.0))]).expect("valid matrix");
    let secondary = primary.adjoint();
    state.apply_csr(&primary, Some(&secondary));
    let f = c(FRAC_1_SQRT_2, 0.0);
    assert_amplitudes(&state, &[f, f]);
}

#[test]
fn global_phase_is_uniform() {
    let mut state = CpuStateVector::new(1);
    state.h(&[0], &[]);
    state.global_phase(&[0], &[], 0.3, false);
    let f = Complex64::from_polar(FRAC_1_SQRT_2, -0.3);
    assert_amplitudes(&state, &[f, f]);
}
