// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::Error;
use num_complex::Complex64;
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pauli {
    X,
    Y,
    Z,
}

impl Pauli {
    fn flips(self) -> bool {
        matches!(self, Pauli::X | Pauli::Y)
    }

    /// The factor picked up when acting on a basis state whose target bit is `bit`.
    fn phase(self, bit: bool) -> Complex64 {
        match (self, bit) {
            (Pauli::X, _) | (Pauli::Z, false) => Complex64::new(1.0, 0.0),
            (Pauli::Z, true) => Complex64::new(-1.0, 0.0),
            (Pauli::Y, false) => Complex64::new(0.0, 1.0),
            (Pauli::Y, true) => Complex64::new(0.0, -1.0),
        }
    }
}

impl Display for Pauli {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Pauli::X => write!(f, "X"),
            Pauli::Y => write!(f, "Y"),
            Pauli::Z => write!(f, "Z"),
        }
    }
}

/// A real-weighted Pauli product such as `0.5 [X0 Z2]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PauliTerm {
    ops: Vec<(usize, Pauli)>,
    coeff: f64,
}

impl PauliTerm {
    /// Builds a term from `(qubit, pauli)` factors. Factors are sorted by qubit.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPauliString`] if a qubit appears more than once.
    pub fn new(mut ops: Vec<(usize, Pauli)>, coeff: f64) -> Result<Self, Error> {
        ops.sort_by_key(|(q, _)| *q);
        if ops.windows(2).any(|w| w[0].0 == w[1].0) {
            let rendered = ops
                .iter()
                .map(|(q, p)| format!("{p}{q}"))
                .collect::<Vec<_>>()
                .join(" ");
            return Err(Error::InvalidPauliString(rendered));
        }
        Ok(Self { ops, coeff })
    }

    #[must_use]
    pub fn identity(coeff: f64) -> Self {
        Self {
            ops: Vec::new(),
            coeff,
        }
    }

    /// Parses a term written as `"X0 Y1 Z3"`. The empty string is the identity.
    pub fn parse(term: &str, coeff: f64) -> Result<Self, Error> {
        let invalid = || Error::InvalidPauliString(term.to_string());
        let ops = term
            .split_whitespace()
            .map(|factor| {
                let mut chars = factor.chars();
                let pauli = match chars.next() {
                    Some('X' | 'x') => Pauli::X,
                    Some('Y' | 'y') => Pauli::Y,
                    Some('Z' | 'z') => Pauli::Z,
                    _ => return Err(invalid()),
                };
                let qubit = chars.as_str().parse::<usize>().map_err(|_| invalid())?;
                Ok((qubit, pauli))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ops, coeff).map_err(|_| invalid())
    }

    #[must_use]
    pub fn ops(&self) -> &[(usize, Pauli)] {
        &self.ops
    }

    #[must_use]
    pub fn coeff(&self) -> f64 {
        self.coeff
    }

    /// The number of qubits needed to hold this term.
    #[must_use]
    pub fn n_qubits(&self) -> usize {
        self.ops.last().map_or(0, |(q, _)| q + 1)
    }

    /// Bits flipped by the term when applied to a basis state.
    #[must_use]
    pub fn flip_mask(&self) -> usize {
        self.ops
            .iter()
            .filter(|(_, p)| p.flips())
            .fold(0, |mask, (q, _)| mask | 1 << q)
    }

    /// The phase picked up by basis state `index`, excluding the coefficient.
    #[must_use]
    pub fn phase(&self, index: usize) -> Complex64 {
        self.ops
            .iter()
            .map(|(q, p)| p.phase((index >> q) & 1 == 1))
            .product()
    }
}

impl Display for PauliTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.coeff)?;
        for (i, (q, p)) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{p}{q}")?;
        }
        write!(f, "]")
    }
}
