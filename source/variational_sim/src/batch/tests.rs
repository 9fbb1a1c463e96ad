// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;
use crate::gate::{FixedGate, Gate, RotationGate};
use crate::parameter::{ParameterExpr, parameter_index};
use amplitude_backend::{CpuStateVector, PauliTerm};
use expect_test::expect;
use ndarray::array;

fn term(ops: &str, coeff: f64) -> PauliTerm {
    PauliTerm::parse(ops, coeff).expect("valid term")
}

fn hams() -> Vec<Hamiltonian> {
    vec![
        Hamiltonian::terms(vec![term("Z0", 1.0)]),
        Hamiltonian::terms(vec![term("X0 X1", 0.5), term("Z1", -0.2)]),
        Hamiltonian::terms(vec![term("Y1", 1.0)]),
    ]
}

fn circuit() -> Circuit {
    let encoder = Circuit::new()
        .with(Gate::rotation(RotationGate::Ry, "x", &[0]))
        .with(Gate::rotation(RotationGate::Rx, "y", &[1]))
        .as_encoder();
    let mut circuit = encoder;
    circuit.append(
        &Circuit::new()
            .with(Gate::fixed(FixedGate::H, &[1]))
            .with(Gate::rotation(RotationGate::Rzz, "a", &[0, 1]))
            .with(Gate::rotation(
                RotationGate::Ry,
                ParameterExpr::symbol("b").with_term("a", 0.5),
                &[1],
            ))
            .with(Gate::u3("b", 0.3, "a", 0))
            .as_ansatz(),
    );
    circuit
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn assert_close(expected: &[Vec<Gradient>], actual: &[Vec<Gradient>]) {
    assert_eq!(expected.len(), actual.len());
    for (expected, actual) in expected.iter().zip(actual) {
        assert_eq!(expected.len(), actual.len());
        for (expected, actual) in expected.iter().zip(actual) {
            assert_eq!(expected.len(), actual.len());
            for (e, a) in expected.iter().zip(actual) {
                assert!((e - a).norm() < 1e-12, "{expected:?} vs {actual:?}");
            }
        }
    }
}

#[test]
fn thread_balance_splits_workers_between_axes() {
    let table = [
        (2, 3, Some(8)),
        (10, 2, Some(4)),
        (3, 10, Some(4)),
        (100, 100, Some(8)),
        (4, 3, Some(6)),
        (20, 3, Some(12)),
        (0, 0, Some(0)),
    ]
    .map(|(samples, hams, workers)| thread_balance(samples, hams, workers));
    expect!["[(2, 3), (4, 1), (1, 4), (1, 8), (4, 1), (12, 1), (1, 1)]"]
        .assert_eq(&format!("{table:?}"));
}

#[test]
fn thread_balance_defaults_to_machine_parallelism() {
    let (batch_threads, mea_threads) = thread_balance(5, 2, None);
    assert!((1..=5).contains(&batch_threads));
    assert!((1..=2).contains(&mea_threads));
}

#[test]
fn batched_samples_match_sequential_evaluation() {
    let hams = hams();
    let circuit = circuit();
    let init = QuantumState::<CpuStateVector>::new(2, 0);
    let encoder_names = names(&["x", "y"]);
    let ansatz_names = names(&["a", "b"]);
    let encoder_data = array![[0.1, 0.2], [0.5, -0.4], [1.3, 0.0], [-0.7, 2.1], [0.9, 0.9]];
    let ansatz_data = [0.6, -1.2];
    let samples = Samples {
        encoder_names: &encoder_names,
        encoder_data: encoder_data.view(),
        ansatz_names: &ansatz_names,
        ansatz_data: &ansatz_data,
    };
    let index = parameter_index(&["x", "y", "a", "b"]);
    let objective = Objective::Hermitian { circuit: &circuit };

    let sequential = (0..samples.len())
        .map(|i| {
            let binding = samples.binding(i).expect("sample binds");
            expectation_with_grad_multi(&hams, &circuit, &init, &binding, &index)
                .expect("gradient evaluates")
        })
        .collect::<Vec<_>>();

    for threads in [(1, 1), (2, 3), (5, 2), (3, 1)] {
        let batched = batch_samples(&hams, objective, &init, samples, &index, threads)
            .expect("batch evaluates");
        assert_close(&sequential, &batched);
    }
}

#[test]
fn batched_non_hermitian_objective_matches_direct_evaluation() {
    let hams = hams();
    let right = circuit();
    let left = Circuit::new()
        .with(Gate::rotation(RotationGate::Rx, "a", &[0]))
        .with(Gate::fixed(FixedGate::H, &[1]))
        .as_ansatz();
    let init = QuantumState::<CpuStateVector>::new(2, 0);
    let mut left_init = QuantumState::<CpuStateVector>::new(2, 0);
    left_init.backend_mut().h(&[0], &[]);
    let binding = ParameterBinding::new()
        .with("x", 0.4)
        .with("y", -0.3)
        .with("a", 1.1)
        .with("b", 0.2);
    let index = parameter_index(&["x", "y", "a", "b"]);
    let objective = Objective::NonHermitian {
        left: &left,
        right: &right,
        left_init: &left_init,
    };

    let direct = non_hermitian_expectation_with_grad_multi(
        &hams, &left, &right, &left_init, &init, &binding, &index,
    )
    .expect("gradient evaluates");
    let batched = batch_observables(&hams, objective, &init, &binding, &index, 2)
        .expect("batch evaluates");
    assert_close(&[direct], &[batched]);
}

#[test]
fn observable_groups_keep_their_order() {
    let hams = hams();
    let circuit = circuit();
    let init = QuantumState::<CpuStateVector>::new(2, 0);
    let binding = ParameterBinding::new()
        .with("x", 0.4)
        .with("y", -0.3)
        .with("a", 1.1)
        .with("b", 0.2);
    let index = parameter_index(&["a", "b"]);
    let objective = Objective::Hermitian { circuit: &circuit };
    for mea_threads in 1..=4 {
        let batched = batch_observables(&hams, objective, &init, &binding, &index, mea_threads)
            .expect("batch evaluates");
        for (ham, grad) in hams.iter().zip(&batched) {
            let single = crate::gradient::expectation_with_grad(
                ham, &circuit, &init, &binding, &index,
            )
            .expect("gradient evaluates");
            assert_close(&[vec![single]], &[vec![grad.clone()]]);
        }
    }
}

#[test]
fn worker_errors_reach_the_caller() {
    let mut hams = hams();
    hams.push(Hamiltonian::terms(vec![term("Z3", 1.0)]));
    let circuit = circuit();
    let init = QuantumState::<CpuStateVector>::new(2, 0);
    let encoder_names = names(&["x", "y"]);
    let ansatz_names = names(&["a", "b"]);
    let encoder_data = array![[0.1, 0.2], [0.5, -0.4]];
    let samples = Samples {
        encoder_names: &encoder_names,
        encoder_data: encoder_data.view(),
        ansatz_names: &ansatz_names,
        ansatz_data: &[0.6, -1.2],
    };
    let index = parameter_index(&["x", "y", "a", "b"]);
    let objective = Objective::Hermitian { circuit: &circuit };
    assert_eq!(
        Err(Error::DimensionMismatch {
            required: 4,
            available: 2
        }),
        batch_samples(&hams, objective, &init, samples, &index, (2, 2))
    );
}

#[test]
fn mismatched_ansatz_values_are_rejected() {
    let encoder_names = names(&["x"]);
    let ansatz_names = names(&["a", "b"]);
    let encoder_data = array![[0.1]];
    let samples = Samples {
        encoder_names: &encoder_names,
        encoder_data: encoder_data.view(),
        ansatz_names: &ansatz_names,
        ansatz_data: &[0.6],
    };
    expect!["invalid argument: 2 ansatz parameters but 1 values"].assert_eq(
        &samples
            .binding(0)
            .expect_err("ansatz values are short")
            .to_string(),
    );
}

#[test]
fn empty_sample_set_yields_no_rows() {
    let hams = hams();
    let circuit = circuit();
    let init = QuantumState::<CpuStateVector>::new(2, 0);
    let encoder_data = ndarray::Array2::<f64>::zeros((0, 2));
    let encoder_names = names(&["x", "y"]);
    let samples = Samples {
        encoder_names: &encoder_names,
        encoder_data: encoder_data.view(),
        ansatz_names: &[],
        ansatz_data: &[],
    };
    assert!(samples.is_empty());
    let output = batch_samples(
        &hams,
        Objective::Hermitian { circuit: &circuit },
        &init,
        samples,
        &ParameterIndex::default(),
        (4, 4),
    )
    .expect("nothing to evaluate");
    assert!(output.is_empty());
}
