// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;
use crate::gate::{Channel, CustomMatrix};
use crate::parameter::ParameterExpr;
use amplitude_backend::CpuStateVector;
use expect_test::expect;

const STEP: f64 = 1e-6;
const THETA: f64 = 0.83;

/// A three-qubit state with no zero amplitudes.
fn prepared() -> QuantumState<CpuStateVector> {
    let mut state = QuantumState::<CpuStateVector>::new(3, 0);
    let backend = state.backend_mut();
    backend.h(&[0], &[]);
    backend.ry(&[1], &[], 0.7, false);
    backend.rx(&[2], &[0], 1.9, false);
    backend.h(&[2], &[]);
    backend.rz(&[1], &[2], -0.4, false);
    backend.ry(&[0], &[1], 2.3, false);
    state
}

fn theta(value: f64) -> ParameterBinding {
    ParameterBinding::new().with("t", value)
}

fn assert_same(expected: &QuantumState<CpuStateVector>, actual: &QuantumState<CpuStateVector>) {
    for (e, a) in expected.amplitudes().iter().zip(actual.amplitudes()) {
        assert!(
            (e - a).norm() < 1e-6,
            "{:?} vs {:?}",
            expected.amplitudes(),
            actual.amplitudes()
        );
    }
}

/// `(U(θ + h) - U(θ - h)) / 2h` applied to the prepared state.
fn finite_difference(gate: &Gate, at: f64) -> QuantumState<CpuStateVector> {
    let mut plus = prepared();
    apply_gate(&mut plus, gate, &theta(at + STEP), false).expect("gate applies");
    let mut minus = prepared();
    apply_gate(&mut minus, gate, &theta(at - STEP), false).expect("gate applies");
    let amplitudes = plus
        .amplitudes()
        .iter()
        .zip(minus.amplitudes())
        .map(|(p, m)| (p - m) / (2.0 * STEP))
        .collect::<Vec<_>>();
    let mut numeric = QuantumState::<CpuStateVector>::new(3, 0);
    numeric
        .backend_mut()
        .set_amplitudes(&amplitudes)
        .expect("same length");
    numeric
}

fn custom_ry() -> CustomMatrix {
    CustomMatrix::new(
        "MyRY",
        1,
        |t| matrices::ry(t, false),
        |t| matrices::ry(t, true),
    )
    .expect("valid custom gate")
}

fn single_angle_gates() -> Vec<Gate> {
    let mut gates = Vec::new();
    for rotation in [
        RotationGate::Rx,
        RotationGate::Ry,
        RotationGate::Rz,
        RotationGate::PhaseShift,
        RotationGate::GlobalPhase,
    ] {
        gates.push(Gate::rotation(rotation, "t", &[1]));
        gates.push(Gate::rotation(rotation, "t", &[1]).controlled_by(&[2]));
    }
    for rotation in [RotationGate::Rxx, RotationGate::Ryy, RotationGate::Rzz] {
        gates.push(Gate::rotation(rotation, "t", &[2, 0]));
        gates.push(Gate::rotation(rotation, "t", &[0, 1]).controlled_by(&[2]));
    }
    gates.push(Gate::custom(custom_ry(), "t", &[0]));
    gates.push(Gate::custom(custom_ry(), "t", &[0]).controlled_by(&[1, 2]));
    let daggered = gates.iter().map(Gate::hermitian).collect::<Vec<_>>();
    gates.extend(daggered);
    gates
}

#[test]
fn adjoint_undoes_every_gate() {
    let binding = theta(THETA);
    let mut gates = single_angle_gates();
    gates.extend([
        Gate::u3("t", 0.4, -1.3, 2).controlled_by(&[0]),
        Gate::fsim(0.9, "t", [0, 2]),
        Gate::fixed(FixedGate::S, &[1]),
        Gate::fixed(FixedGate::T, &[0]).controlled_by(&[2]),
        Gate::fixed(FixedGate::ISwap, &[1, 2]),
        Gate::fixed(FixedGate::Swap, &[0, 2]).controlled_by(&[1]),
        Gate::fixed(FixedGate::Y, &[1]),
    ]);
    for gate in &gates {
        let mut state = prepared();
        apply_gate(&mut state, gate, &binding, false).expect("gate applies");
        apply_gate(&mut state, &gate.hermitian(), &binding, false).expect("adjoint applies");
        assert_same(&prepared(), &state);
    }
}

#[test]
fn single_angle_derivatives_match_finite_differences() {
    for gate in single_angle_gates() {
        let mut analytic = prepared();
        assert_eq!(
            Ok(None),
            apply_gate(&mut analytic, &gate, &theta(THETA), true),
            "{gate}"
        );
        assert_same(&finite_difference(&gate, THETA), &analytic);
    }
}

#[test]
fn angle_derivative_of_single_angle_gate_matches_differentiated_gate() {
    for gate in single_angle_gates() {
        let mut differentiated = prepared();
        apply_gate(&mut differentiated, &gate, &theta(THETA), true).expect("gate applies");
        let mut by_index = prepared();
        apply_angle_derivative(&mut by_index, &gate, &theta(THETA), 0).expect("angle exists");
        assert_same(&differentiated, &by_index);
    }
}

#[test]
fn multi_angle_derivatives_match_finite_differences() {
    for n_angles in 0..3 {
        let mut angles = [
            ParameterExpr::constant(0.4),
            ParameterExpr::constant(-1.3),
            ParameterExpr::constant(0.6),
        ];
        angles[n_angles] = ParameterExpr::symbol("t");
        let [a, b, c] = angles;
        let u3 = Gate::u3(a.clone(), b.clone(), c, 1).controlled_by(&[0]);
        let mut gates = vec![u3.hermitian(), u3];
        if n_angles < 2 {
            let fsim = Gate::fsim(a, b, [2, 0]);
            gates.push(fsim.hermitian());
            gates.push(fsim);
        }
        for gate in gates {
            let mut analytic = prepared();
            apply_angle_derivative(&mut analytic, &gate, &theta(THETA), n_angles)
                .expect("angle exists");
            assert_same(&finite_difference(&gate, THETA), &analytic);
        }
    }
}

#[test]
fn parameterized_multi_angle_gate_cannot_be_differentiated_whole() {
    let mut state = prepared();
    let gate = Gate::u3("t", 0.1, 0.2, 0);
    assert!(matches!(
        apply_gate(&mut state, &gate, &theta(THETA), true),
        Err(Error::InvalidArgument(_))
    ));
    let constant = Gate::u3(0.3, 0.1, 0.2, 0);
    assert_eq!(
        Ok(None),
        apply_gate(&mut state, &constant, &theta(THETA), true)
    );
}

#[test]
fn angle_index_out_of_range_is_rejected() {
    let mut state = prepared();
    let gate = Gate::rotation(RotationGate::Rx, "t", &[0]);
    expect!["invalid argument: RX(t) [0] has 1 angles, derivative 1 requested"].assert_eq(
        &apply_angle_derivative(&mut state, &gate, &theta(THETA), 1)
            .expect_err("only one angle")
            .to_string(),
    );
    let fixed = Gate::fixed(FixedGate::H, &[0]);
    assert!(matches!(
        apply_angle_derivative(&mut state, &fixed, &theta(THETA), 0),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn operand_errors() {
    let mut state = prepared();
    let binding = ParameterBinding::new();
    let errors = [
        Gate::rotation(RotationGate::Rzz, 0.3, &[0]),
        Gate::fixed(FixedGate::X, &[1]).controlled_by(&[1]),
        Gate::fixed(FixedGate::Swap, &[0, 5]),
        Gate::measure("m", 0).controlled_by(&[1]),
    ]
    .map(|gate| {
        apply_gate(&mut state, &gate, &binding, false)
            .expect_err("gate is malformed")
            .to_string()
    });
    expect![[r#"
        [
            "invalid argument: Rzz(0.3) [0] acts on 2 qubits, got 1",
            "invalid argument: X [1] ctrl [1] uses qubit 1 more than once",
            "operation requires 6 qubits but the state has 3",
            "invalid argument: M(m) [0] ctrl [1] cannot be controlled",
        ]
    "#]]
    .assert_debug_eq(&errors);
    assert_same(&prepared(), &state);
}

#[test]
fn unbound_symbol_is_missing_parameter() {
    let mut state = prepared();
    let angle = ParameterExpr::symbol("t").with_term("u", 2.0);
    let gate = Gate::rotation(RotationGate::Ry, angle, &[0]);
    assert_eq!(
        Err(Error::MissingParameter("u".to_string())),
        apply_gate(&mut state, &gate, &theta(THETA), false)
    );
}

#[test]
fn stochastic_gates_have_no_derivative() {
    let mut state = prepared();
    let binding = ParameterBinding::new();
    let channel = Channel::bit_flip(0.5).expect("valid channel");
    for gate in [Gate::measure("m", 0), Gate::channel(channel, 1)] {
        assert!(matches!(
            apply_gate(&mut state, &gate, &binding, true),
            Err(Error::InvalidArgument(_))
        ));
    }
    assert_same(&prepared(), &state);
}

#[test]
fn daggered_s_is_minus_i_on_one() {
    let mut state = QuantumState::<CpuStateVector>::new(1, 0);
    let binding = ParameterBinding::new();
    apply_gate(&mut state, &Gate::fixed(FixedGate::X, &[0]), &binding, false)
        .expect("gate applies");
    apply_gate(
        &mut state,
        &Gate::fixed(FixedGate::S, &[0]).hermitian(),
        &binding,
        false,
    )
    .expect("gate applies");
    assert!((state.amplitudes()[1] - Complex64::new(0.0, -1.0)).norm() < 1e-12);
}

#[test]
fn circuit_reports_outcomes_in_gate_order() {
    let mut state = QuantumState::<CpuStateVector>::new(2, 3);
    let circuit = Circuit::new()
        .with(Gate::fixed(FixedGate::X, &[0]))
        .with(Gate::measure("a", 0))
        .with(Gate::rotation(RotationGate::Rx, "t", &[1]))
        .with(Gate::measure("b", 1));
    let outcomes = apply_circuit(&mut state, &circuit, &theta(0.0)).expect("circuit runs");
    assert_eq!(vec![("a", true), ("b", false)], outcomes);
}

#[test]
fn malformed_operator_payloads_are_rejected() {
    let mut state = prepared();
    let binding = theta(THETA);
    let shape_shifting = CustomMatrix::new(
        "Grow",
        1,
        |t| {
            if t.abs() < 1e-9 {
                matrices::ry(t, false)
            } else {
                Matrix::eye(4)
            }
        },
        |t| matrices::ry(t, true),
    )
    .expect("matrices fit at zero");
    let gate = Gate::custom(shape_shifting, "t", &[0]);
    assert!(matches!(
        apply_gate(&mut state, &gate, &binding, false),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(Ok(None), apply_gate(&mut state, &gate, &theta(0.0), false));
    assert!(matches!(
        apply_angle_derivative(&mut state, &gate.hermitian(), &binding, 0),
        Ok(())
    ));

    let mut state = prepared();
    let unchecked = Gate::channel(Channel::Kraus(vec![Matrix::zeros((1, 1))]), 0);
    expect!["invalid argument: Kraus operator 0 is not a single-qubit matrix"].assert_eq(
        &apply_gate(&mut state, &unchecked, &binding, false)
            .expect_err("operator is the wrong size")
            .to_string(),
    );
    assert_same(&prepared(), &state);
}
