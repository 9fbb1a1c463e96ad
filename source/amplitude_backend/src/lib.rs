// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dense amplitude storage and the primitive kernels a state-vector engine is built on.
//!
//! Amplitudes are stored little endian: qubit `k` is bit `k` of the basis index. Every
//! multi-qubit matrix uses the same convention for its operands, so the first target
//! qubit selects the least significant bit of the row and column index.

pub mod cpu;
pub mod matrices;
pub mod pauli;
pub mod sparse;

pub use cpu::CpuStateVector;
pub use matrices::Matrix;
pub use pauli::{Pauli, PauliTerm};
pub use sparse::CsrMatrix;

use miette::Diagnostic;
use num_complex::Complex64;
use thiserror::Error;

#[derive(Clone, Debug, Diagnostic, Eq, Error, PartialEq)]
pub enum Error {
    #[error("expected {expected} amplitudes, found {found}")]
    #[diagnostic(code("AmplitudeBackend.LengthMismatch"))]
    LengthMismatch { expected: usize, found: usize },
    #[error("malformed sparse matrix: {0}")]
    #[diagnostic(code("AmplitudeBackend.MalformedSparseMatrix"))]
    MalformedSparseMatrix(String),
    #[error("invalid Pauli string `{0}`")]
    #[diagnostic(
        code("AmplitudeBackend.InvalidPauliString"),
        help("terms are written as space separated factors such as `X0 Z3`")
    )]
    InvalidPauliString(String),
}

/// The trait implemented by an amplitude buffer owner.
///
/// Only the buffer lifecycle, the dense matrix kernel, the collapse helpers, inner products and
/// observable application are required. Named gate primitives default to the dense kernel over
/// the shared [`matrices`] table and may be overridden with specialized kernels.
///
/// Primitives taking a `diff` flag apply the analytic derivative of the gate with respect to its
/// angle instead of the gate itself. A derivative is not unitary, and for controlled gates it
/// vanishes outside the control subspace, which is therefore zeroed.
pub trait AmplitudeBackend: Clone + Send + Sync {
    /// Creates a buffer for `n_qubits` qubits in the `|0...0⟩` state.
    fn new(n_qubits: usize) -> Self;

    fn n_qubits(&self) -> usize;

    fn dim(&self) -> usize {
        1 << self.n_qubits()
    }

    /// Returns the buffer to `|0...0⟩`.
    fn reset(&mut self);

    fn amplitudes(&self) -> &[Complex64];

    /// Overwrites the buffer. The slice length must match [`AmplitudeBackend::dim`].
    fn set_amplitudes(&mut self, amplitudes: &[Complex64]) -> Result<(), Error>;

    /// Applies a dense `2^k × 2^k` matrix to the `k` qubits in `objs`, conditioned on every qubit
    /// in `ctrls` being set.
    fn apply_matrix(&mut self, objs: &[usize], ctrls: &[usize], matrix: &Matrix, diff: bool);

    /// Sums `|a_i|²` over the basis states with `i & mask == condition`.
    fn conditional_collect(&self, mask: usize, condition: usize) -> f64;

    /// Multiplies the amplitudes with `i & mask == condition` by `succ_coeff` and all others by
    /// `fail_coeff`.
    fn conditional_mul(
        &mut self,
        mask: usize,
        condition: usize,
        succ_coeff: Complex64,
        fail_coeff: Complex64,
    );

    /// Computes `⟨self|other⟩`.
    fn vdot(&self, other: &Self) -> Complex64;

    /// Computes `⟨self|other⟩` restricted to the basis states with `i & mask == condition`.
    fn vdot_subspace(&self, other: &Self, mask: usize, condition: usize) -> Complex64;

    /// Replaces the state with `Σ_k c_k P_k |ψ⟩`.
    fn apply_pauli_terms(&mut self, terms: &[PauliTerm]);

    /// Replaces the state with `(primary + secondary) |ψ⟩`.
    fn apply_csr(&mut self, primary: &CsrMatrix, secondary: Option<&CsrMatrix>);

    fn norm_squared(&self) -> f64 {
        self.conditional_collect(0, 0)
    }

    fn scale(&mut self, coeff: Complex64) {
        self.conditional_mul(0, 0, coeff, coeff);
    }

    fn x(&mut self, objs: &[usize], ctrls: &[usize]) {
        self.apply_matrix(objs, ctrls, &matrices::X, false);
    }
    fn y(&mut self, objs: &[usize], ctrls: &[usize]) {
        self.apply_matrix(objs, ctrls, &matrices::Y, false);
    }
    fn z(&mut self, objs: &[usize], ctrls: &[usize]) {
        self.apply_matrix(objs, ctrls, &matrices::Z, false);
    }
    fn h(&mut self, objs: &[usize], ctrls: &[usize]) {
        self.apply_matrix(objs, ctrls, &matrices::H, false);
    }
    fn s(&mut self, objs: &[usize], ctrls: &[usize], dagger: bool) {
        let matrix = if dagger { &matrices::S_ADJ } else { &matrices::S };
        self.apply_matrix(objs, ctrls, matrix, false);
    }
    fn t(&mut self, objs: &[usize], ctrls: &[usize], dagger: bool) {
        let matrix = if dagger { &matrices::T_ADJ } else { &matrices::T };
        self.apply_matrix(objs, ctrls, matrix, false);
    }
    fn swap(&mut self, objs: &[usize], ctrls: &[usize]) {
        self.apply_matrix(objs, ctrls, &matrices::SWAP, false);
    }
    fn iswap(&mut self, objs: &[usize], ctrls: &[usize], dagger: bool) {
        let matrix = if dagger {
            &matrices::ISWAP_ADJ
        } else {
            &matrices::ISWAP
        };
        self.apply_matrix(objs, ctrls, matrix, false);
    }

    fn rx(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::rx(theta, diff), diff);
    }
    fn ry(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::ry(theta, diff), diff);
    }
    fn rz(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::rz(theta, diff), diff);
    }
    fn phase_shift(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::phase_shift(theta, diff), diff);
    }
    fn rxx(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::rxx(theta, diff), diff);
    }
    fn ryy(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::ryy(theta, diff), diff);
    }
    fn rzz(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::rzz(theta, diff), diff);
    }
    fn global_phase(&mut self, objs: &[usize], ctrls: &[usize], theta: f64, diff: bool) {
        self.apply_matrix(objs, ctrls, &matrices::global_phase(theta, diff), diff);
    }
}
