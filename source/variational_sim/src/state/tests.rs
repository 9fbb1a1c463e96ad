// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;
use crate::gate::{FixedGate, Gate};
use expect_test::expect;

#[test]
fn ket_rendering_lists_nonzero_amplitudes() {
    let mut state = QuantumState::<CpuStateVector>::new(2, 1);
    state.backend_mut().h(&[0], &[]);
    state.backend_mut().x(&[1], &[0]);
    expect![[r#"
        0.70711¦00⟩
        0.70711¦11⟩"#]]
    .assert_eq(&state.to_string());
}

#[test]
fn ket_rendering_shows_complex_amplitudes() {
    let mut state = QuantumState::<CpuStateVector>::new(1, 1);
    state.backend_mut().h(&[0], &[]);
    state.backend_mut().s(&[0], &[], false);
    state.backend_mut().rz(&[0], &[], 0.5, false);
    expect![[r#"
        (0.68512-0.17494j)¦0⟩
        (-0.17494+0.68512j)¦1⟩"#]]
    .assert_eq(&state.to_string());
}

#[test]
fn clone_replays_rng_stream() {
    let mut state = QuantumState::<CpuStateVector>::new(1, 7);
    state.sample_uniform();
    let mut copy = state.clone();
    assert_eq!(state.sample_uniform().to_bits(), copy.sample_uniform().to_bits());
}

#[test]
fn reseed_restarts_stream() {
    let mut state = QuantumState::<CpuStateVector>::new(1, 7);
    let first = state.sample_uniform();
    state.sample_uniform();
    state.reseed(7);
    assert_eq!(first.to_bits(), state.sample_uniform().to_bits());
    assert_eq!(7, state.seed());
}

#[test]
fn samples_lie_in_unit_interval() {
    let mut state = QuantumState::<CpuStateVector>::new(1, 3);
    for _ in 0..1000 {
        let r = state.sample_uniform();
        assert!((0.0..1.0).contains(&r));
    }
}

#[test]
fn check_qubits_reports_required_width() {
    let state = QuantumState::<CpuStateVector>::new(2, 0);
    assert!(state.check_qubits(&Gate::fixed(FixedGate::X, &[1])).is_ok());
    assert_eq!(
        Err(Error::DimensionMismatch {
            required: 4,
            available: 2
        }),
        state.check_qubits(&Gate::fixed(FixedGate::X, &[0]).controlled_by(&[3]))
    );
}

#[test]
fn set_amplitudes_checks_length() {
    let mut state = QuantumState::<CpuStateVector>::new(2, 0);
    let err = state
        .set_amplitudes(&[Complex64::new(1.0, 0.0); 8])
        .expect_err("eight amplitudes do not fit two qubits");
    assert_eq!(
        Error::DimensionMismatch {
            required: 3,
            available: 2
        },
        err
    );
    let ones = [Complex64::new(0.5, 0.0); 4];
    state.set_amplitudes(&ones).expect("length matches");
    assert_eq!(&ones, state.amplitudes());
}

#[test]
fn reset_keeps_rng_position() {
    let mut state = QuantumState::<CpuStateVector>::new(1, 11);
    let mut reference = state.clone();
    state.backend_mut().h(&[0], &[]);
    state.reset();
    reference.sample_uniform();
    state.sample_uniform();
    assert_eq!(reference.sample_uniform().to_bits(), state.sample_uniform().to_bits());
    assert_eq!(QuantumState::<CpuStateVector>::new(1, 0).amplitudes(), state.amplitudes());
}
