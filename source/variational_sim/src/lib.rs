// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A state-vector engine for parameterized circuits with analytic gradients.
//!
//! Circuits are evolved on a [`QuantumState`], a seeded handle over any
//! [`AmplitudeBackend`]. Expectation values and their gradients with respect to named
//! parameters are computed by walking the circuit backwards while co-evolving a bra and a
//! ket, and the [`batch`] module fans that walk out over observables and parameter samples.

pub mod batch;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod gate;
pub mod gradient;
pub mod hamiltonian;
pub mod measure;
pub mod parameter;
pub mod simulator;
pub mod state;

pub use amplitude_backend::{AmplitudeBackend, CpuStateVector};
pub use config::SimulatorConfig;
pub use gate::{Channel, Circuit, CustomMatrix, FixedGate, Gate, GateKind, RotationGate};
pub use hamiltonian::Hamiltonian;
pub use parameter::{ParameterBinding, ParameterExpr, ParameterIndex};
pub use simulator::{GradOps, GradOutput, MeasureResult, Simulator};
pub use state::QuantumState;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Clone, Debug, Diagnostic, Error, PartialEq)]
pub enum Error {
    #[error("unsupported operation: {0}")]
    #[diagnostic(code("VariationalSim.UnsupportedOperation"))]
    UnsupportedOperation(String),
    #[error("invalid argument: {0}")]
    #[diagnostic(code("VariationalSim.InvalidArgument"))]
    InvalidArgument(String),
    #[error("operation requires {required} qubits but the state has {available}")]
    #[diagnostic(code("VariationalSim.DimensionMismatch"))]
    DimensionMismatch { required: usize, available: usize },
    #[error("parameter `{0}` has no bound value")]
    #[diagnostic(
        code("VariationalSim.MissingParameter"),
        help("bind every symbol of the circuit before evolving it")
    )]
    MissingParameter(String),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] amplitude_backend::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
