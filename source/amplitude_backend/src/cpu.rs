// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(test)]
mod tests;

use crate::{AmplitudeBackend, CsrMatrix, Error, Matrix, PauliTerm};
use num_complex::Complex64;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// A dense state vector held in host memory.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuStateVector {
    n_qubits: usize,
    amplitudes: Vec<Complex64>,
}

fn mask_of(qubits: &[usize]) -> usize {
    qubits.iter().fold(0, |mask, q| mask | 1 << q)
}

/// For every local index `j` of a `k`-qubit operand, the global offset obtained by scattering the
/// bits of `j` onto `objs`.
fn local_offsets(objs: &[usize]) -> Vec<usize> {
    (0..1usize << objs.len())
        .map(|j| {
            objs.iter()
                .enumerate()
                .filter(|(bit, _)| (j >> bit) & 1 == 1)
                .fold(0, |offset, (_, q)| offset | 1 << q)
        })
        .collect()
}

impl CpuStateVector {
    fn zeroed(&self) -> Vec<Complex64> {
        vec![ZERO; self.amplitudes.len()]
    }
}

impl AmplitudeBackend for CpuStateVector {
    fn new(n_qubits: usize) -> Self {
        let mut amplitudes = vec![ZERO; 1 << n_qubits];
        amplitudes[0] = ONE;
        Self {
            n_qubits,
            amplitudes,
        }
    }

    fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    fn reset(&mut self) {
        self.amplitudes.fill(ZERO);
        self.amplitudes[0] = ONE;
    }

    fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    fn set_amplitudes(&mut self, amplitudes: &[Complex64]) -> Result<(), Error> {
        if amplitudes.len() != self.amplitudes.len() {
            return Err(Error::LengthMismatch {
                expected: self.amplitudes.len(),
                found: amplitudes.len(),
            });
        }
        self.amplitudes.copy_from_slice(amplitudes);
        Ok(())
    }

    fn apply_matrix(&mut self, objs: &[usize], ctrls: &[usize], matrix: &Matrix, diff: bool) {
        let obj_mask = mask_of(objs);
        let ctrl_mask = mask_of(ctrls);
        let offsets = local_offsets(objs);
        let mut gathered = vec![ZERO; offsets.len()];

        for base in (0..self.amplitudes.len()).filter(|i| i & obj_mask == 0) {
            if base & ctrl_mask != ctrl_mask {
                if diff {
                    for offset in &offsets {
                        self.amplitudes[base | offset] = ZERO;
                    }
                }
                continue;
            }
            for (slot, offset) in gathered.iter_mut().zip(&offsets) {
                *slot = self.amplitudes[base | offset];
            }
            for (row, offset) in offsets.iter().enumerate() {
                self.amplitudes[base | offset] = gathered
                    .iter()
                    .enumerate()
                    .map(|(col, amp)| matrix[[row, col]] * amp)
                    .sum();
            }
        }
    }

    fn x(&mut self, objs: &[usize], ctrls: &[usize]) {
        let [obj] = objs else {
            self.apply_matrix(objs, ctrls, &crate::matrices::X, false);
            return;
        };
        let bit = 1usize << obj;
        let ctrl_mask = mask_of(ctrls);
        for i in 0..self.amplitudes.len() {
            if i & bit == 0 && i & ctrl_mask == ctrl_mask {
                self.amplitudes.swap(i, i | bit);
            }
        }
    }

    fn conditional_collect(&self, mask: usize, condition: usize) -> f64 {
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask == condition)
            .map(|(_, amp)| amp.norm_sqr())
            .sum()
    }

    fn conditional_mul(
        &mut self,
        mask: usize,
        condition: usize,
        succ_coeff: Complex64,
        fail_coeff: Complex64,
    ) {
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            *amp *= if i & mask == condition {
                succ_coeff
            } else {
                fail_coeff
            };
        }
    }

    fn vdot(&self, other: &Self) -> Complex64 {
        self.vdot_subspace(other, 0, 0)
    }

    fn vdot_subspace(&self, other: &Self, mask: usize, condition: usize) -> Complex64 {
        self.amplitudes
            .iter()
            .zip(&other.amplitudes)
            .enumerate()
            .filter(|(i, _)| i & mask == condition)
            .map(|(_, (a, b))| a.conj() * b)
            .sum()
    }

    fn apply_pauli_terms(&mut self, terms: &[PauliTerm]) {
        let mut out = self.zeroed();
        for term in terms {
            let flip = term.flip_mask();
            let coeff = Complex64::new(term.coeff(), 0.0);
            for (i, amp) in self.amplitudes.iter().enumerate() {
                out[i ^ flip] += coeff * term.phase(i) * amp;
            }
        }
        self.amplitudes = out;
    }

    fn apply_csr(&mut self, primary: &CsrMatrix, secondary: Option<&CsrMatrix>) {
        let mut out = primary.dot(&self.amplitudes);
        if let Some(secondary) = secondary {
            for (acc, value) in out.iter_mut().zip(secondary.dot(&self.amplitudes)) {
                *acc += value;
            }
        }
        self.amplitudes = out;
    }
}
