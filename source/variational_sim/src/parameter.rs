// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::{Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{self, Display, Formatter};

/// Maps a parameter name to its position in a gradient vector, excluding the leading
/// expectation slot.
pub type ParameterIndex = FxHashMap<String, usize>;

/// Builds a [`ParameterIndex`] that numbers `names` in order.
pub fn parameter_index<S: AsRef<str>>(names: &[S]) -> ParameterIndex {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_ref().to_string(), i))
        .collect()
}

/// An angle written as `constant + Σ coeff · symbol`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterExpr {
    constant: f64,
    terms: Vec<(String, f64)>,
}

/// An angle expression evaluated against a binding.
#[derive(Clone, Debug, PartialEq)]
pub struct Combination<'a> {
    pub value: f64,
    /// The symbols the angle depends on that take part in gradients, with their coefficient.
    pub requires_grad: Vec<(&'a str, f64)>,
}

impl ParameterExpr {
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: Vec::new(),
        }
    }

    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Self::default().with_term(name, 1.0)
    }

    /// Adds `coeff · name`, merging with an existing term on the same symbol.
    #[must_use]
    pub fn with_term(mut self, name: &str, coeff: f64) -> Self {
        if let Some((_, existing)) = self.terms.iter_mut().find(|(n, _)| n == name) {
            *existing += coeff;
        } else {
            self.terms.push((name.to_string(), coeff));
        }
        self
    }

    #[must_use]
    pub fn with_constant(self, constant: f64) -> Self {
        Self { constant, ..self }
    }

    #[must_use]
    pub fn is_const(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(name, _)| name.as_str())
    }

    /// Evaluates the expression.
    ///
    /// # Errors
    /// Returns [`Error::MissingParameter`] for the first symbol without a bound value.
    pub fn combination(&self, binding: &ParameterBinding) -> Result<Combination<'_>> {
        let mut value = self.constant;
        let mut requires_grad = Vec::new();
        for (name, coeff) in &self.terms {
            let bound = binding
                .get(name)
                .ok_or_else(|| Error::MissingParameter(name.clone()))?;
            value += coeff * bound;
            if binding.is_grad_required(name) {
                requires_grad.push((name.as_str(), *coeff));
            }
        }
        Ok(Combination {
            value,
            requires_grad,
        })
    }
}

impl From<f64> for ParameterExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<&str> for ParameterExpr {
    fn from(name: &str) -> Self {
        Self::symbol(name)
    }
}

impl Display for ParameterExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if self.constant != 0.0 || self.terms.is_empty() {
            write!(f, "{}", self.constant)?;
            wrote = true;
        }
        for (name, coeff) in &self.terms {
            if wrote {
                write!(f, " + ")?;
            }
            if (coeff - 1.0).abs() > f64::EPSILON {
                write!(f, "{coeff}*")?;
            }
            write!(f, "{name}")?;
            wrote = true;
        }
        Ok(())
    }
}

/// Values for named parameters, plus the names excluded from gradients.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterBinding {
    values: FxHashMap<String, f64>,
    no_grad: FxHashSet<String>,
}

impl ParameterBinding {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<S: AsRef<str>>(names: &[S], values: &[f64]) -> Result<Self> {
        if names.len() != values.len() {
            return Err(Error::InvalidArgument(format!(
                "{} parameter names but {} values",
                names.len(),
                values.len()
            )));
        }
        let mut binding = Self::new();
        for (name, value) in names.iter().zip(values) {
            binding.set(name.as_ref(), *value);
        }
        Ok(binding)
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Excludes `name` from gradient computation while keeping its value.
    #[must_use]
    pub fn no_grad(mut self, name: &str) -> Self {
        self.no_grad.insert(name.to_string());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    #[must_use]
    pub fn is_grad_required(&self, name: &str) -> bool {
        !self.no_grad.contains(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
