// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(test)]
mod tests;

use crate::gate::Circuit;
use crate::gradient::{expectation_with_grad_multi, non_hermitian_expectation_with_grad_multi};
use crate::hamiltonian::Hamiltonian;
use crate::parameter::{ParameterBinding, ParameterIndex};
use crate::state::QuantumState;
use crate::{Error, Result};
use amplitude_backend::AmplitudeBackend;
use log::debug;
use ndarray::ArrayView2;
use num_complex::Complex64;
use std::num::NonZeroUsize;
use std::thread::{self, ScopedJoinHandle};

/// `[f, ∂f/∂p_0, ...]` for one observable.
pub type Gradient = Vec<Complex64>;

/// Splits `parallel_worker` threads between parameter samples and observables.
///
/// When every (sample, observable) pair can have its own thread, both axes get one thread per
/// item. Otherwise the longer axis is served first and the other gets what is left, with at least
/// one thread each. Neither count exceeds its number of items. `None` uses the available
/// parallelism of the machine.
#[must_use]
pub fn thread_balance(
    n_samples: usize,
    n_hams: usize,
    parallel_worker: Option<usize>,
) -> (usize, usize) {
    let workers = parallel_worker.map_or_else(
        || thread::available_parallelism().map_or(1, NonZeroUsize::get),
        |workers| workers.max(1),
    );
    let (n_samples, n_hams) = (n_samples.max(1), n_hams.max(1));
    if n_samples * n_hams <= workers {
        (n_samples, n_hams)
    } else if n_hams < n_samples {
        let batch_threads = n_samples.min(workers);
        (batch_threads, n_hams.min((workers / batch_threads).max(1)))
    } else {
        let mea_threads = n_hams.min(workers);
        (n_samples.min((workers / mea_threads).max(1)), mea_threads)
    }
}

/// What a gradient batch differentiates.
#[derive(Debug)]
pub enum Objective<'a, B: AmplitudeBackend> {
    /// `⟨ψ|U† H U|ψ⟩`.
    Hermitian { circuit: &'a Circuit },
    /// `⟨L|H|R⟩` with `|L⟩ = left · left_init` and `|R⟩ = right · init`.
    NonHermitian {
        left: &'a Circuit,
        right: &'a Circuit,
        left_init: &'a QuantumState<B>,
    },
}

impl<B: AmplitudeBackend> Clone for Objective<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: AmplitudeBackend> Copy for Objective<'_, B> {}

/// Encoder rows, one per sample, plus the ansatz values shared by every sample.
#[derive(Clone, Copy, Debug)]
pub struct Samples<'a> {
    pub encoder_names: &'a [String],
    pub encoder_data: ArrayView2<'a, f64>,
    pub ansatz_names: &'a [String],
    pub ansatz_data: &'a [f64],
}

impl Samples<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.encoder_data.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The binding for sample `i`: its encoder row and the shared ansatz values.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the row or the ansatz values do not match the names.
    pub fn binding(&self, i: usize) -> Result<ParameterBinding> {
        let row = self.encoder_data.row(i);
        let row = row.to_vec();
        let mut binding = ParameterBinding::from_pairs(self.encoder_names, &row)?;
        if self.ansatz_names.len() != self.ansatz_data.len() {
            return Err(Error::InvalidArgument(format!(
                "{} ansatz parameters but {} values",
                self.ansatz_names.len(),
                self.ansatz_data.len()
            )));
        }
        for (name, value) in self.ansatz_names.iter().zip(self.ansatz_data) {
            binding.set(name, *value);
        }
        Ok(binding)
    }
}

/// Runs `task(start, chunk)` over contiguous chunks of `output` on at most `workers` scoped
/// threads. A single worker runs inline.
///
/// The first error in slot order is returned. A worker panic is resumed on the caller.
fn for_each_chunk<T, F>(output: &mut [T], workers: usize, task: F) -> Result<()>
where
    T: Send,
    F: Fn(usize, &mut [T]) -> Result<()> + Sync,
{
    if output.is_empty() {
        return Ok(());
    }
    let workers = workers.clamp(1, output.len());
    if workers == 1 {
        return task(0, output);
    }
    let chunk_size = output.len().div_ceil(workers);
    thread::scope(|scope| {
        let task = &task;
        let handles = output
            .chunks_mut(chunk_size)
            .enumerate()
            .map(|(i, chunk)| scope.spawn(move || task(i * chunk_size, chunk)))
            .collect::<Vec<_>>();
        join_all(handles)
    })
}

fn join_all(handles: Vec<ScopedJoinHandle<'_, Result<()>>>) -> Result<()> {
    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
    first_error.map_or(Ok(()), Err)
}

fn evaluate<B: AmplitudeBackend>(
    hams: &[Hamiltonian],
    objective: Objective<'_, B>,
    init: &QuantumState<B>,
    binding: &ParameterBinding,
    index: &ParameterIndex,
) -> Result<Vec<Gradient>> {
    match objective {
        Objective::Hermitian { circuit } => {
            expectation_with_grad_multi(hams, circuit, init, binding, index)
        }
        Objective::NonHermitian {
            left,
            right,
            left_init,
        } => non_hermitian_expectation_with_grad_multi(
            hams, left, right, left_init, init, binding, index,
        ),
    }
}

/// Evaluates every observable for one binding, splitting the observables into at most
/// `mea_threads` contiguous groups. Each group evolves its own ket and shares one walk.
pub fn batch_observables<B: AmplitudeBackend>(
    hams: &[Hamiltonian],
    objective: Objective<'_, B>,
    init: &QuantumState<B>,
    binding: &ParameterBinding,
    index: &ParameterIndex,
    mea_threads: usize,
) -> Result<Vec<Gradient>> {
    let mut output = vec![Gradient::new(); hams.len()];
    for_each_chunk(&mut output, mea_threads, |start, slots| {
        let group = &hams[start..start + slots.len()];
        for (slot, gradient) in slots
            .iter_mut()
            .zip(evaluate(group, objective, init, binding, index)?)
        {
            *slot = gradient;
        }
        Ok(())
    })?;
    Ok(output)
}

/// Evaluates every observable for every sample. Samples are split into contiguous ranges over
/// `batch_threads` threads and each sample runs [`batch_observables`] with `mea_threads`.
///
/// The result is indexed `[sample][observable][1 + parameter]`.
pub fn batch_samples<B: AmplitudeBackend>(
    hams: &[Hamiltonian],
    objective: Objective<'_, B>,
    init: &QuantumState<B>,
    samples: Samples<'_>,
    index: &ParameterIndex,
    (batch_threads, mea_threads): (usize, usize),
) -> Result<Vec<Vec<Gradient>>> {
    debug!(
        "evaluating {} samples x {} observables on {batch_threads} x {mea_threads} threads",
        samples.len(),
        hams.len()
    );
    let mut output = vec![Vec::new(); samples.len()];
    for_each_chunk(&mut output, batch_threads, |start, slots| {
        for (offset, slot) in slots.iter_mut().enumerate() {
            let binding = samples.binding(start + offset)?;
            *slot = batch_observables(hams, objective, init, &binding, index, mea_threads)?;
        }
        Ok(())
    })?;
    Ok(output)
}
