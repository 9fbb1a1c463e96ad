// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(test)]
mod tests;

use crate::gate::Gate;
use crate::{Error, Result};
use amplitude_backend::{AmplitudeBackend, CpuStateVector};
use num_complex::Complex64;
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use std::fmt::{self, Display, Formatter};

/// Amplitudes below this magnitude are left out of the ket rendering.
const DISPLAY_CUTOFF: f64 = 1e-8;

/// An amplitude buffer paired with the RNG stream its measurements and channels draw from.
///
/// Cloning copies both the amplitudes and the position in the RNG stream, so a clone replays the
/// same outcomes as the original.
#[derive(Clone, Debug)]
pub struct QuantumState<B: AmplitudeBackend = CpuStateVector> {
    backend: B,
    rng: StdRng,
    seed: u64,
}

impl<B: AmplitudeBackend> QuantumState<B> {
    /// Creates `|0...0⟩` on `n_qubits` qubits.
    #[must_use]
    pub fn new(n_qubits: usize, seed: u64) -> Self {
        Self::from_backend(B::new(n_qubits), seed)
    }

    #[must_use]
    pub fn from_backend(backend: B, seed: u64) -> Self {
        Self {
            backend,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn n_qubits(&self) -> usize {
        self.backend.n_qubits()
    }

    pub fn dim(&self) -> usize {
        self.backend.dim()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        self.backend.amplitudes()
    }

    /// Overwrites the amplitudes as given. No normalization is applied.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the length does not match the register.
    pub fn set_amplitudes(&mut self, amplitudes: &[Complex64]) -> Result<()> {
        if amplitudes.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                required: amplitudes.len().max(1).ilog2() as usize,
                available: self.n_qubits(),
            });
        }
        self.backend.set_amplitudes(amplitudes)?;
        Ok(())
    }

    /// Returns the register to `|0...0⟩`. The RNG stream continues where it was.
    pub fn reset(&mut self) {
        self.backend.reset();
    }

    /// Restarts the RNG stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Draws `r` uniformly from `[0, 1)`.
    pub fn sample_uniform(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    /// Checks that every qubit the gate touches exists.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] naming the register size the gate needs.
    pub fn check_qubits(&self, gate: &Gate) -> Result<()> {
        match gate.qubits().max() {
            Some(max) if max >= self.n_qubits() => Err(Error::DimensionMismatch {
                required: max + 1,
                available: self.n_qubits(),
            }),
            _ => Ok(()),
        }
    }
}

fn round(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}

fn format_amplitude(amp: Complex64) -> String {
    let (re, im) = (round(amp.re), round(amp.im));
    if im == 0.0 {
        format!("{re}")
    } else if re == 0.0 {
        format!("{im}j")
    } else {
        format!("({re}{im:+}j)")
    }
}

/// Renders the nonzero amplitudes one per line as `amplitude¦bits⟩`, highest qubit first.
impl<B: AmplitudeBackend> Display for QuantumState<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let width = self.n_qubits();
        let mut first = true;
        for (index, amp) in self.amplitudes().iter().enumerate() {
            if amp.norm() < DISPLAY_CUTOFF {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{}¦{index:0width$b}⟩", format_amplitude(*amp))?;
        }
        Ok(())
    }
}
