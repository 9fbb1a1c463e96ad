// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::batch::{Objective, Samples, batch_samples, thread_balance};
use crate::config::SimulatorConfig;
use crate::dispatch;
use crate::gate::{Circuit, Gate};
use crate::hamiltonian::Hamiltonian;
use crate::parameter::{ParameterBinding, parameter_index};
use crate::state::QuantumState;
use crate::{Error, Result};
use amplitude_backend::{AmplitudeBackend, CpuStateVector, Matrix};
use log::debug;
use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
use rand::{RngCore as _, SeedableRng as _, rngs::StdRng};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Measurement outcomes of one or more shots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeasureResult {
    keys: Vec<String>,
    samples: Vec<Vec<bool>>,
}

impl MeasureResult {
    fn new(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(ToString::to_string).collect(),
            samples: Vec::new(),
        }
    }

    fn record(&mut self, outcomes: &[(&str, bool)]) {
        let mut sample = vec![false; self.keys.len()];
        for (key, bit) in outcomes {
            if let Some(slot) = self.keys.iter().position(|k| k == key) {
                sample[slot] = *bit;
            }
        }
        self.samples.push(sample);
    }

    /// Measurement keys in order of first appearance in the circuit.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// One row per shot, one bit per key.
    #[must_use]
    pub fn samples(&self) -> &[Vec<bool>] {
        &self.samples
    }

    #[must_use]
    pub fn shots(&self) -> usize {
        self.samples.len()
    }

    /// Counts shots by bit string. The last key is the leftmost character.
    #[must_use]
    pub fn bit_string_data(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            let bits = sample
                .iter()
                .rev()
                .map(|bit| if *bit { '1' } else { '0' })
                .collect::<String>();
            *counts.entry(bits).or_insert(0) += 1;
        }
        counts
    }
}

impl Display for MeasureResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "shots: {}, keys: [{}]", self.shots(), self.keys.join(", "))?;
        for (bits, count) in self.bit_string_data() {
            write!(f, "\n{bits}: {count}")?;
        }
        Ok(())
    }
}

/// Expectation values and gradients for every observable of every sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GradOutput {
    /// `f[sample][observable]`.
    pub f: Vec<Vec<Complex64>>,
    /// `g_encoder[sample][observable][encoder parameter]`.
    pub g_encoder: Vec<Vec<Vec<Complex64>>>,
    /// `g_ansatz[sample][observable][ansatz parameter]`.
    pub g_ansatz: Vec<Vec<Vec<Complex64>>>,
}

/// A prepared gradient evaluation, returned by [`Simulator::get_expectation_with_grad`].
///
/// Holds its own copies of the observables, circuits and initial states, so it can be called
/// repeatedly while the simulator that built it moves on.
#[derive(Clone, Debug)]
pub struct GradOps<B: AmplitudeBackend = CpuStateVector> {
    hams: Vec<Hamiltonian>,
    right: Circuit,
    left: Option<(Circuit, QuantumState<B>)>,
    init: QuantumState<B>,
    encoder_names: Vec<String>,
    ansatz_names: Vec<String>,
    workers: usize,
}

impl<B: AmplitudeBackend> GradOps<B> {
    #[must_use]
    pub fn encoder_params_name(&self) -> &[String] {
        &self.encoder_names
    }

    #[must_use]
    pub fn ansatz_params_name(&self) -> &[String] {
        &self.ansatz_names
    }

    /// Evaluates every observable for each row of `encoder_data`, with `ansatz_data` shared by
    /// all rows. Without encoder parameters an empty `encoder_data` counts as one sample.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the data does not match the parameter names, plus
    /// every error the gradient evaluation reports.
    pub fn call(
        &self,
        encoder_data: ArrayView2<'_, f64>,
        ansatz_data: &[f64],
    ) -> Result<GradOutput> {
        let n_enc = self.encoder_names.len();
        if encoder_data.ncols() != n_enc {
            return Err(Error::InvalidArgument(format!(
                "{n_enc} encoder parameters but rows of {} values",
                encoder_data.ncols()
            )));
        }
        if ansatz_data.len() != self.ansatz_names.len() {
            return Err(Error::InvalidArgument(format!(
                "{} ansatz parameters but {} values",
                self.ansatz_names.len(),
                ansatz_data.len()
            )));
        }
        let single = Array2::<f64>::zeros((1, 0));
        let encoder_data = if n_enc == 0 && encoder_data.nrows() == 0 {
            single.view()
        } else {
            encoder_data.view()
        };

        let samples = Samples {
            encoder_names: &self.encoder_names,
            encoder_data,
            ansatz_names: &self.ansatz_names,
            ansatz_data,
        };
        let names = self
            .encoder_names
            .iter()
            .chain(&self.ansatz_names)
            .collect::<Vec<_>>();
        let index = parameter_index(&names);
        let objective = match &self.left {
            None => Objective::Hermitian {
                circuit: &self.right,
            },
            Some((left, left_init)) => Objective::NonHermitian {
                left,
                right: &self.right,
                left_init,
            },
        };
        let threads = thread_balance(samples.len(), self.hams.len(), Some(self.workers));
        let raw = batch_samples(&self.hams, objective, &self.init, samples, &index, threads)?;

        let mut output = GradOutput::default();
        for per_sample in raw {
            let mut f = Vec::with_capacity(per_sample.len());
            let mut g_encoder = Vec::with_capacity(per_sample.len());
            let mut g_ansatz = Vec::with_capacity(per_sample.len());
            for grad in per_sample {
                f.push(grad[0]);
                g_encoder.push(grad[1..=n_enc].to_vec());
                g_ansatz.push(grad[1 + n_enc..].to_vec());
            }
            output.f.push(f);
            output.g_encoder.push(g_encoder);
            output.g_ansatz.push(g_ansatz);
        }
        Ok(output)
    }
}

/// A seeded state vector with the user-level operations of a variational simulator.
#[derive(Clone, Debug)]
pub struct Simulator<B: AmplitudeBackend = CpuStateVector> {
    state: QuantumState<B>,
    config: SimulatorConfig,
}

impl<B: AmplitudeBackend> Simulator<B> {
    /// Creates `|0...0⟩` on `n_qubits` qubits with the default configuration and `seed`.
    #[must_use]
    pub fn new(n_qubits: usize, seed: u64) -> Self {
        Self::with_config(n_qubits, SimulatorConfig::DEFAULT.with_seed(seed))
    }

    #[must_use]
    pub fn with_config(n_qubits: usize, config: SimulatorConfig) -> Self {
        Self {
            state: QuantumState::new(n_qubits, config.seed),
            config,
        }
    }

    pub fn n_qubits(&self) -> usize {
        self.state.n_qubits()
    }

    pub fn seed(&self) -> u64 {
        self.state.seed()
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn state(&self) -> &QuantumState<B> {
        &self.state
    }

    /// Returns the register to `|0...0⟩`.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Applies `gate`, or its derivative when `diff` is set. Returns the outcome of a
    /// measurement.
    pub fn apply_gate(
        &mut self,
        gate: &Gate,
        binding: &ParameterBinding,
        diff: bool,
    ) -> Result<Option<bool>> {
        dispatch::apply_gate(&mut self.state, gate, binding, diff)
    }

    /// Applies `circuit` once. Returns a single-shot [`MeasureResult`] if the circuit measures.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if a parameterized circuit has no binding or a
    /// measurement key repeats.
    pub fn apply_circuit(
        &mut self,
        circuit: &Circuit,
        binding: Option<&ParameterBinding>,
    ) -> Result<Option<MeasureResult>> {
        let binding = resolve_binding(circuit, binding)?;
        let keys = check_measure_keys(circuit)?;
        let outcomes = dispatch::apply_circuit(&mut self.state, circuit, &binding)?;
        if keys.is_empty() {
            return Ok(None);
        }
        let mut result = MeasureResult::new(&keys);
        result.record(&outcomes);
        Ok(Some(result))
    }

    /// Replaces the state `|ψ⟩` with `H|ψ⟩`, which is generally not normalized.
    pub fn apply_hamiltonian(&mut self, ham: &Hamiltonian) -> Result<()> {
        ham.check_fits(self.n_qubits())?;
        ham.apply(self.state.backend_mut());
        Ok(())
    }

    /// Returns `⟨ψ|H|ψ⟩`.
    pub fn get_expectation(&self, ham: &Hamiltonian) -> Result<Complex64> {
        ham.check_fits(self.n_qubits())?;
        let mut bra = self.state.backend().clone();
        ham.apply(&mut bra);
        Ok(self.state.backend().vdot(&bra))
    }

    /// Returns the unitary of `circuit` on this register. Column `j` is the circuit applied to
    /// the basis state `|j⟩`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for a circuit with measurements or noise channels or a
    /// parameterized circuit without a binding, and [`Error::DimensionMismatch`] if the circuit
    /// is wider than the register.
    pub fn get_circuit_matrix(
        &self,
        circuit: &Circuit,
        binding: Option<&ParameterBinding>,
    ) -> Result<Matrix> {
        if circuit.has_measure_gate() || circuit.is_noise_circuit() {
            return Err(Error::InvalidArgument(
                "a circuit matrix cannot contain measurements or noise channels".to_string(),
            ));
        }
        let binding = resolve_binding(circuit, binding)?;
        let dim = self.state.dim();
        debug!("building the {dim}x{dim} matrix of a {}-gate circuit", circuit.len());
        let mut matrix = Matrix::zeros((dim, dim));
        let mut basis = vec![Complex64::new(0.0, 0.0); dim];
        for col in 0..dim {
            basis[col] = Complex64::new(1.0, 0.0);
            let mut column = QuantumState::<B>::new(self.n_qubits(), self.seed());
            column.set_amplitudes(&basis)?;
            basis[col] = Complex64::new(0.0, 0.0);
            dispatch::apply_circuit(&mut column, circuit, &binding)?;
            for (row, amp) in column.amplitudes().iter().enumerate() {
                matrix[[row, col]] = *amp;
            }
        }
        Ok(matrix)
    }

    pub fn get_qs(&self) -> &[Complex64] {
        self.state.amplitudes()
    }

    /// Overwrites the amplitudes with `amplitudes` normalized to unit length.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the length is not `2^n_qubits` and
    /// [`Error::InvalidArgument`] for a zero vector.
    pub fn set_qs(&mut self, amplitudes: &[Complex64]) -> Result<()> {
        let norm = amplitudes.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt();
        if amplitudes.len() == self.state.dim() && norm == 0.0 {
            return Err(Error::InvalidArgument(
                "cannot normalize a zero state".to_string(),
            ));
        }
        let normalized = amplitudes.iter().map(|amp| amp / norm).collect::<Vec<_>>();
        self.state.set_amplitudes(&normalized)
    }

    /// Runs `circuit` for `shots` shots from the current state and collects the outcomes.
    ///
    /// Shot seeds are drawn from a master RNG seeded with `seed`, so the result is reproducible.
    /// When every measurement comes after the last gate on its qubit and there is no noise, the
    /// unitary part is evolved once and only the measurements are repeated. The simulator state
    /// is left unchanged.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for zero shots, a circuit without measurements, a
    /// repeated measurement key, or a parameterized circuit without a binding.
    pub fn sampling(
        &self,
        circuit: &Circuit,
        binding: Option<&ParameterBinding>,
        shots: usize,
        seed: u64,
    ) -> Result<MeasureResult> {
        if shots == 0 {
            return Err(Error::InvalidArgument(
                "sampling needs at least one shot".to_string(),
            ));
        }
        if !circuit.has_measure_gate() {
            return Err(Error::InvalidArgument(
                "sampling needs a circuit with measurements".to_string(),
            ));
        }
        let binding = resolve_binding(circuit, binding)?;
        let keys = check_measure_keys(circuit)?;
        let mut result = MeasureResult::new(&keys);
        let mut master = StdRng::seed_from_u64(seed);

        if circuit.is_measure_end() && !circuit.is_noise_circuit() {
            debug!("sampling {shots} shots from one evolution");
            let (unitary, measures) = circuit.split_measures();
            let mut evolved = self.state.clone();
            dispatch::apply_circuit(&mut evolved, &unitary, &binding)?;
            for _ in 0..shots {
                let mut shot = evolved.clone();
                shot.reseed(master.next_u64());
                result.record(&dispatch::apply_circuit(&mut shot, &measures, &binding)?);
            }
        } else {
            debug!("sampling {shots} shots with one evolution each");
            for _ in 0..shots {
                let mut shot = self.state.clone();
                shot.reseed(master.next_u64());
                result.record(&dispatch::apply_circuit(&mut shot, circuit, &binding)?);
            }
        }
        Ok(result)
    }

    /// Prepares the gradient of `⟨ψ|U† H U|ψ⟩` for each observable, with `U = circ_right` and
    /// `|ψ⟩` the current state.
    ///
    /// Passing `circ_left` or `simulator_left` switches to `⟨L|H|R⟩` with `|R⟩ = circ_right|ψ⟩`
    /// and `|L⟩ = circ_left|φ⟩`, where `|φ⟩` is the state of `simulator_left`. Either one
    /// defaults to its right-hand counterpart. Encoder and ansatz names of both circuits are
    /// merged in order of appearance.
    ///
    /// `parallel_worker` bounds the worker threads of every call and defaults to the
    /// configured limit.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] for no observables, a circuit with measurements or noise, or
    ///   a parameter used both as encoder and ansatz.
    /// - [`Error::DimensionMismatch`] if an observable, a circuit or the left state does not fit
    ///   the register.
    pub fn get_expectation_with_grad(
        &self,
        hams: &[Hamiltonian],
        circ_right: &Circuit,
        circ_left: Option<&Circuit>,
        simulator_left: Option<&Simulator<B>>,
        parallel_worker: Option<usize>,
    ) -> Result<GradOps<B>> {
        if hams.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one observable is required".to_string(),
            ));
        }
        let n_qubits = self.n_qubits();
        for ham in hams {
            ham.check_fits(n_qubits)?;
        }

        let non_hermitian = circ_left.is_some() || simulator_left.is_some();
        let left = non_hermitian.then(|| {
            let circuit = circ_left.unwrap_or(circ_right).clone();
            let init = simulator_left
                .map_or_else(|| self.state.clone(), |sim| sim.state.clone());
            (circuit, init)
        });

        let mut circuits = vec![circ_right];
        if let Some((circuit, init)) = &left {
            if init.n_qubits() != n_qubits {
                return Err(Error::DimensionMismatch {
                    required: n_qubits,
                    available: init.n_qubits(),
                });
            }
            circuits.push(circuit);
        }
        let mut encoder_names = Vec::new();
        let mut ansatz_names = Vec::new();
        for circuit in &circuits {
            check_differentiable(circuit, n_qubits)?;
            merge_names(&mut encoder_names, circuit.encoder_params_name());
            merge_names(&mut ansatz_names, circuit.ansatz_params_name());
        }
        if let Some(name) = encoder_names.iter().find(|name| ansatz_names.contains(*name)) {
            return Err(Error::InvalidArgument(format!(
                "parameter `{name}` is used as both encoder and ansatz"
            )));
        }

        let workers = parallel_worker.map_or_else(|| self.config.worker_limit(), |w| w.max(1));
        debug!(
            "prepared gradient of {} observables over {} encoder and {} ansatz parameters",
            hams.len(),
            encoder_names.len(),
            ansatz_names.len()
        );
        Ok(GradOps {
            hams: hams.to_vec(),
            right: circ_right.clone(),
            left,
            init: self.state.clone(),
            encoder_names,
            ansatz_names,
            workers,
        })
    }
}

impl<B: AmplitudeBackend> Display for Simulator<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)
    }
}

fn resolve_binding(
    circuit: &Circuit,
    binding: Option<&ParameterBinding>,
) -> Result<ParameterBinding> {
    match binding {
        Some(binding) => Ok(binding.clone()),
        None if circuit.is_parameterized() => Err(Error::InvalidArgument(
            "a parameterized circuit needs a parameter binding".to_string(),
        )),
        None => Ok(ParameterBinding::new()),
    }
}

fn check_measure_keys(circuit: &Circuit) -> Result<Vec<&str>> {
    let keys = circuit.measure_keys();
    let mut seen = FxHashSet::default();
    if let Some(key) = keys.iter().find(|key| !seen.insert(**key)) {
        return Err(Error::InvalidArgument(format!(
            "measurement key `{key}` is used more than once"
        )));
    }
    Ok(keys)
}

fn check_differentiable(circuit: &Circuit, n_qubits: usize) -> Result<()> {
    if circuit.has_measure_gate() || circuit.is_noise_circuit() {
        return Err(Error::InvalidArgument(
            "gradient circuits cannot contain measurements or noise channels".to_string(),
        ));
    }
    let required = circuit.n_qubits();
    if required > n_qubits {
        return Err(Error::DimensionMismatch {
            required,
            available: n_qubits,
        });
    }
    Ok(())
}

fn merge_names(names: &mut Vec<String>, more: Vec<String>) {
    for name in more {
        if !names.contains(&name) {
            names.push(name);
        }
    }
}
