// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::{Error, Result};
use amplitude_backend::{AmplitudeBackend, CsrMatrix, PauliTerm};
use num_complex::Complex64;

/// An observable in exactly one storage mode.
#[derive(Clone, Debug, PartialEq)]
pub enum Hamiltonian {
    /// A weighted sum of Pauli products.
    Terms(Vec<PauliTerm>),
    /// A sparse operator split as `primary + secondary`. [`Hamiltonian::sparse`] stores the
    /// diagonal and upper triangle in `primary` and the remaining lower triangle in
    /// `secondary`.
    SparsePair {
        primary: CsrMatrix,
        secondary: Option<CsrMatrix>,
    },
    /// A sparse operator given directly as a matrix.
    Matrix(CsrMatrix),
}

impl Hamiltonian {
    #[must_use]
    pub fn terms(terms: Vec<PauliTerm>) -> Self {
        Hamiltonian::Terms(terms)
    }

    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the matrix side is not a power of two.
    pub fn from_matrix(matrix: CsrMatrix) -> Result<Self> {
        if !matrix.dim().is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "observable dimension {} is not a power of two",
                matrix.dim()
            )));
        }
        Ok(Hamiltonian::Matrix(matrix))
    }

    /// Converts a term list into its sparse pair form on `n_qubits` qubits.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the observable is not a term list and
    /// [`Error::DimensionMismatch`] if a term acts beyond `n_qubits`.
    pub fn sparse(&self, n_qubits: usize) -> Result<Self> {
        let Hamiltonian::Terms(terms) = self else {
            return Err(Error::InvalidArgument(
                "only a term list observable can be converted to sparse form".to_string(),
            ));
        };
        self.check_fits(n_qubits)?;
        let dim = 1 << n_qubits;
        let mut upper = Vec::new();
        let mut lower = Vec::new();
        for term in terms {
            let flip = term.flip_mask();
            let coeff = Complex64::new(term.coeff(), 0.0);
            for col in 0..dim {
                let row = col ^ flip;
                let entry = (row, col, coeff * term.phase(col));
                if row <= col {
                    upper.push(entry);
                } else {
                    lower.push(entry);
                }
            }
        }
        let primary = CsrMatrix::from_triplets(dim, &upper)?;
        let secondary = if lower.is_empty() {
            None
        } else {
            Some(CsrMatrix::from_triplets(dim, &lower)?)
        };
        Ok(Hamiltonian::SparsePair { primary, secondary })
    }

    /// The smallest register the observable can act on.
    #[must_use]
    pub fn n_qubits(&self) -> usize {
        match self {
            Hamiltonian::Terms(terms) => terms.iter().map(PauliTerm::n_qubits).max().unwrap_or(0),
            Hamiltonian::SparsePair { primary, secondary } => secondary
                .iter()
                .map(|m| width(m.dim()))
                .fold(width(primary.dim()), usize::max),
            Hamiltonian::Matrix(matrix) => width(matrix.dim()),
        }
    }

    /// Checks that the observable can act on an `n_qubits` register. Matrix forms must match the
    /// register exactly, and both halves of a sparse pair must have the same side.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] otherwise.
    pub fn check_fits(&self, n_qubits: usize) -> Result<()> {
        let required = self.n_qubits();
        let dim = 1usize.checked_shl(u32::try_from(n_qubits).unwrap_or(u32::MAX));
        let fits = match self {
            Hamiltonian::Terms(_) => required <= n_qubits,
            Hamiltonian::SparsePair { primary, secondary } => {
                Some(primary.dim()) == dim
                    && secondary.as_ref().is_none_or(|m| m.dim() == primary.dim())
            }
            Hamiltonian::Matrix(matrix) => Some(matrix.dim()) == dim,
        };
        if fits {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                required,
                available: n_qubits,
            })
        }
    }

    /// The adjoint observable, in the same mode.
    #[must_use]
    pub fn hermitian_conjugate(&self) -> Self {
        match self {
            // Real weighted Pauli products are self adjoint.
            Hamiltonian::Terms(terms) => Hamiltonian::Terms(terms.clone()),
            Hamiltonian::SparsePair { primary, secondary } => Hamiltonian::SparsePair {
                primary: primary.adjoint(),
                secondary: secondary.as_ref().map(CsrMatrix::adjoint),
            },
            Hamiltonian::Matrix(matrix) => Hamiltonian::Matrix(matrix.adjoint()),
        }
    }

    /// Replaces the backend state `|ψ⟩` with `H|ψ⟩`. The caller checks the size with
    /// [`Hamiltonian::check_fits`].
    pub fn apply<B: AmplitudeBackend>(&self, backend: &mut B) {
        match self {
            Hamiltonian::Terms(terms) => backend.apply_pauli_terms(terms),
            Hamiltonian::SparsePair { primary, secondary } => {
                backend.apply_csr(primary, secondary.as_ref());
            }
            Hamiltonian::Matrix(matrix) => backend.apply_csr(matrix, None),
        }
    }
}

/// Qubits needed to index a side of `dim`.
fn width(dim: usize) -> usize {
    dim.next_power_of_two().trailing_zeros() as usize
}
