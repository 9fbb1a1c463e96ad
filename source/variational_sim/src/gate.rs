// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::parameter::ParameterExpr;
use crate::{Error, Result};
use amplitude_backend::Matrix;
use amplitude_backend::matrices::{dagger, fits_qubits};
use num_complex::Complex64;
use rustc_hash::FxHashSet;
use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Tolerance used when checking that a Kraus set is trace preserving.
const COMPLETENESS_TOLERANCE: f64 = 1e-8;

const PROBABILITY_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FixedGate {
    I,
    X,
    Y,
    Z,
    H,
    S,
    T,
    Swap,
    ISwap,
}

impl FixedGate {
    #[must_use]
    pub fn n_qubits(self) -> usize {
        match self {
            FixedGate::Swap | FixedGate::ISwap => 2,
            _ => 1,
        }
    }
}

impl FromStr for FixedGate {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "I" => Ok(FixedGate::I),
            "X" => Ok(FixedGate::X),
            "Y" => Ok(FixedGate::Y),
            "Z" => Ok(FixedGate::Z),
            "H" => Ok(FixedGate::H),
            "S" => Ok(FixedGate::S),
            "T" => Ok(FixedGate::T),
            "SWAP" => Ok(FixedGate::Swap),
            "ISWAP" => Ok(FixedGate::ISwap),
            _ => Err(Error::UnsupportedOperation(format!("unknown gate `{name}`"))),
        }
    }
}

impl Display for FixedGate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixedGate::I => "I",
            FixedGate::X => "X",
            FixedGate::Y => "Y",
            FixedGate::Z => "Z",
            FixedGate::H => "H",
            FixedGate::S => "S",
            FixedGate::T => "T",
            FixedGate::Swap => "SWAP",
            FixedGate::ISwap => "ISWAP",
        };
        write!(f, "{name}")
    }
}

/// Single-angle gates with a backend derivative primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RotationGate {
    Rx,
    Ry,
    Rz,
    PhaseShift,
    Rxx,
    Ryy,
    Rzz,
    GlobalPhase,
}

impl RotationGate {
    #[must_use]
    pub fn n_qubits(self) -> usize {
        match self {
            RotationGate::Rxx | RotationGate::Ryy | RotationGate::Rzz => 2,
            _ => 1,
        }
    }
}

impl FromStr for RotationGate {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "RX" => Ok(RotationGate::Rx),
            "RY" => Ok(RotationGate::Ry),
            "RZ" => Ok(RotationGate::Rz),
            "PS" => Ok(RotationGate::PhaseShift),
            "XX" | "Rxx" => Ok(RotationGate::Rxx),
            "YY" | "Ryy" => Ok(RotationGate::Ryy),
            "ZZ" | "Rzz" => Ok(RotationGate::Rzz),
            "GP" => Ok(RotationGate::GlobalPhase),
            _ => Err(Error::UnsupportedOperation(format!(
                "unknown parameterized gate `{name}`"
            ))),
        }
    }
}

impl Display for RotationGate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationGate::Rx => "RX",
            RotationGate::Ry => "RY",
            RotationGate::Rz => "RZ",
            RotationGate::PhaseShift => "PS",
            RotationGate::Rxx => "Rxx",
            RotationGate::Ryy => "Ryy",
            RotationGate::Rzz => "Rzz",
            RotationGate::GlobalPhase => "GP",
        };
        write!(f, "{name}")
    }
}

type MatrixFn = Arc<dyn Fn(f64) -> Matrix + Send + Sync>;

/// A user supplied single-angle gate: its matrix and the derivative of that matrix.
#[derive(Clone)]
pub struct CustomMatrix {
    name: String,
    n_qubits: usize,
    matrix: MatrixFn,
    derivative: MatrixFn,
}

impl CustomMatrix {
    /// # Errors
    /// Returns [`Error::InvalidArgument`] unless the gate acts on one or two qubits and both
    /// functions produce matrices of that size.
    pub fn new(
        name: &str,
        n_qubits: usize,
        matrix: impl Fn(f64) -> Matrix + Send + Sync + 'static,
        derivative: impl Fn(f64) -> Matrix + Send + Sync + 'static,
    ) -> Result<Self> {
        if !(1..=2).contains(&n_qubits) {
            return Err(Error::InvalidArgument(format!(
                "custom gate `{name}` acts on {n_qubits} qubits, only 1 or 2 are supported"
            )));
        }
        if !fits_qubits(&matrix(0.0), n_qubits) || !fits_qubits(&derivative(0.0), n_qubits) {
            return Err(Error::InvalidArgument(format!(
                "custom gate `{name}` does not produce {n_qubits}-qubit matrices"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            n_qubits,
            matrix: Arc::new(matrix),
            derivative: Arc::new(derivative),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    #[must_use]
    pub fn matrix(&self, theta: f64) -> Matrix {
        (self.matrix)(theta)
    }

    #[must_use]
    pub fn derivative(&self, theta: f64) -> Matrix {
        (self.derivative)(theta)
    }
}

impl Debug for CustomMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMatrix")
            .field("name", &self.name)
            .field("n_qubits", &self.n_qubits)
            .finish_non_exhaustive()
    }
}

/// A single-qubit noise channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Channel {
    /// Applies X, Y or Z with the given probabilities, identity otherwise.
    Pauli { px: f64, py: f64, pz: f64 },
    Kraus(Vec<Matrix>),
    AmplitudeDamping(f64),
    PhaseDamping(f64),
}

fn check_probability(what: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{what} must be in [0, 1], got {p}"
        )))
    }
}

impl Channel {
    pub fn pauli(px: f64, py: f64, pz: f64) -> Result<Self> {
        check_probability("px", px)?;
        check_probability("py", py)?;
        check_probability("pz", pz)?;
        let total = px + py + pz;
        if total > 1.0 + PROBABILITY_TOLERANCE {
            return Err(Error::InvalidArgument(format!(
                "px + py + pz must not exceed 1, got {total}"
            )));
        }
        Ok(Channel::Pauli { px, py, pz })
    }

    pub fn bit_flip(p: f64) -> Result<Self> {
        Self::pauli(p, 0.0, 0.0)
    }

    pub fn phase_flip(p: f64) -> Result<Self> {
        Self::pauli(0.0, 0.0, p)
    }

    pub fn bit_phase_flip(p: f64) -> Result<Self> {
        Self::pauli(0.0, p, 0.0)
    }

    pub fn depolarizing(p: f64) -> Result<Self> {
        check_probability("p", p)?;
        Self::pauli(p / 3.0, p / 3.0, p / 3.0)
    }

    pub fn amplitude_damping(gamma: f64) -> Result<Self> {
        check_probability("gamma", gamma)?;
        Ok(Channel::AmplitudeDamping(gamma))
    }

    pub fn phase_damping(gamma: f64) -> Result<Self> {
        check_probability("gamma", gamma)?;
        Ok(Channel::PhaseDamping(gamma))
    }

    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the set is empty, an operator is not 2x2, or
    /// `Σ K†K` is not the identity.
    pub fn kraus(operators: Vec<Matrix>) -> Result<Self> {
        if operators.is_empty() {
            return Err(Error::InvalidArgument(
                "Kraus channel needs at least one operator".to_string(),
            ));
        }
        if operators.iter().any(|k| !fits_qubits(k, 1)) {
            return Err(Error::InvalidArgument(
                "Kraus operators must be single-qubit matrices".to_string(),
            ));
        }
        let sum = operators
            .iter()
            .map(|k| dagger(k).dot(k))
            .fold(Matrix::zeros((2, 2)), |acc, term| acc + term);
        let complete = sum.indexed_iter().all(|((r, c), value)| {
            let expected = if r == c { 1.0 } else { 0.0 };
            (value - Complex64::new(expected, 0.0)).norm() < COMPLETENESS_TOLERANCE
        });
        if !complete {
            return Err(Error::InvalidArgument(
                "Kraus operators are not trace preserving".to_string(),
            ));
        }
        Ok(Channel::Kraus(operators))
    }
}

#[derive(Clone, Debug)]
pub enum GateKind {
    Fixed(FixedGate),
    Rotation(RotationGate, ParameterExpr),
    U3 {
        theta: ParameterExpr,
        phi: ParameterExpr,
        lambda: ParameterExpr,
    },
    FSim {
        theta: ParameterExpr,
        phi: ParameterExpr,
    },
    Custom(CustomMatrix, ParameterExpr),
    Measure(String),
    Channel(Channel),
}

/// A gate applied to `obj_qubits`, conditioned on every qubit in `ctrl_qubits` being set.
#[derive(Clone, Debug)]
pub struct Gate {
    pub kind: GateKind,
    pub obj_qubits: Vec<usize>,
    pub ctrl_qubits: Vec<usize>,
    pub daggered: bool,
}

impl Gate {
    #[must_use]
    pub fn new(kind: GateKind, obj_qubits: &[usize]) -> Self {
        Self {
            kind,
            obj_qubits: obj_qubits.to_vec(),
            ctrl_qubits: Vec::new(),
            daggered: false,
        }
    }

    #[must_use]
    pub fn fixed(gate: FixedGate, obj_qubits: &[usize]) -> Self {
        Self::new(GateKind::Fixed(gate), obj_qubits)
    }

    #[must_use]
    pub fn rotation(
        gate: RotationGate,
        angle: impl Into<ParameterExpr>,
        obj_qubits: &[usize],
    ) -> Self {
        Self::new(GateKind::Rotation(gate, angle.into()), obj_qubits)
    }

    #[must_use]
    pub fn u3(
        theta: impl Into<ParameterExpr>,
        phi: impl Into<ParameterExpr>,
        lambda: impl Into<ParameterExpr>,
        obj_qubit: usize,
    ) -> Self {
        Self::new(
            GateKind::U3 {
                theta: theta.into(),
                phi: phi.into(),
                lambda: lambda.into(),
            },
            &[obj_qubit],
        )
    }

    #[must_use]
    pub fn fsim(
        theta: impl Into<ParameterExpr>,
        phi: impl Into<ParameterExpr>,
        obj_qubits: [usize; 2],
    ) -> Self {
        Self::new(
            GateKind::FSim {
                theta: theta.into(),
                phi: phi.into(),
            },
            &obj_qubits,
        )
    }

    #[must_use]
    pub fn custom(
        matrix: CustomMatrix,
        angle: impl Into<ParameterExpr>,
        obj_qubits: &[usize],
    ) -> Self {
        Self::new(GateKind::Custom(matrix, angle.into()), obj_qubits)
    }

    #[must_use]
    pub fn measure(key: &str, qubit: usize) -> Self {
        Self::new(GateKind::Measure(key.to_string()), &[qubit])
    }

    #[must_use]
    pub fn channel(channel: Channel, qubit: usize) -> Self {
        Self::new(GateKind::Channel(channel), &[qubit])
    }

    #[must_use]
    pub fn controlled_by(mut self, ctrl_qubits: &[usize]) -> Self {
        self.ctrl_qubits.extend_from_slice(ctrl_qubits);
        self
    }

    /// Returns the adjoint gate. Measurements and channels have no adjoint and are returned
    /// unchanged.
    #[must_use]
    pub fn hermitian(&self) -> Self {
        let mut gate = self.clone();
        if !self.is_stochastic() {
            gate.daggered = !gate.daggered;
        }
        gate
    }

    /// The number of target qubits the gate kind acts on.
    #[must_use]
    pub fn expected_objs(&self) -> usize {
        match &self.kind {
            GateKind::Fixed(gate) => gate.n_qubits(),
            GateKind::Rotation(gate, _) => gate.n_qubits(),
            GateKind::FSim { .. } => 2,
            GateKind::Custom(matrix, _) => matrix.n_qubits(),
            GateKind::U3 { .. } | GateKind::Measure(_) | GateKind::Channel(_) => 1,
        }
    }

    /// The angle expressions of the gate, in derivative-index order.
    #[must_use]
    pub fn angles(&self) -> Vec<&ParameterExpr> {
        match &self.kind {
            GateKind::Rotation(_, angle) | GateKind::Custom(_, angle) => vec![angle],
            GateKind::U3 { theta, phi, lambda } => vec![theta, phi, lambda],
            GateKind::FSim { theta, phi } => vec![theta, phi],
            GateKind::Fixed(_) | GateKind::Measure(_) | GateKind::Channel(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_parameterized(&self) -> bool {
        self.angles().iter().any(|angle| !angle.is_const())
    }

    /// Measurements and channels, which draw from the state RNG.
    #[must_use]
    pub fn is_stochastic(&self) -> bool {
        matches!(self.kind, GateKind::Measure(_) | GateKind::Channel(_))
    }

    pub fn qubits(&self) -> impl Iterator<Item = usize> + '_ {
        self.obj_qubits.iter().chain(&self.ctrl_qubits).copied()
    }

    fn touches(&self, qubit: usize) -> bool {
        self.qubits().any(|q| q == qubit)
    }
}

impl Display for Gate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GateKind::Fixed(gate) => write!(f, "{gate}")?,
            GateKind::Rotation(gate, angle) => write!(f, "{gate}({angle})")?,
            GateKind::U3 { theta, phi, lambda } => write!(f, "U3({theta}, {phi}, {lambda})")?,
            GateKind::FSim { theta, phi } => write!(f, "FSim({theta}, {phi})")?,
            GateKind::Custom(matrix, angle) => write!(f, "{}({angle})", matrix.name())?,
            GateKind::Measure(key) => write!(f, "M({key})")?,
            GateKind::Channel(channel) => match channel {
                Channel::Pauli { px, py, pz } => write!(f, "PC({px}, {py}, {pz})")?,
                Channel::Kraus(ops) => write!(f, "KC[{}]", ops.len())?,
                Channel::AmplitudeDamping(gamma) => write!(f, "ADC({gamma})")?,
                Channel::PhaseDamping(gamma) => write!(f, "PDC({gamma})")?,
            },
        }
        if self.daggered {
            write!(f, "†")?;
        }
        write!(f, " {:?}", self.obj_qubits)?;
        if !self.ctrl_qubits.is_empty() {
            write!(f, " ctrl {:?}", self.ctrl_qubits)?;
        }
        Ok(())
    }
}

/// An ordered gate list plus the set of parameter names treated as encoder inputs.
#[derive(Clone, Debug, Default)]
pub struct Circuit {
    gates: Vec<Gate>,
    encoder: FxHashSet<String>,
}

impl Circuit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, gate: Gate) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn push(&mut self, gate: Gate) {
        self.gates.push(gate);
    }

    /// Appends the gates of `other`, keeping its encoder marks.
    pub fn append(&mut self, other: &Circuit) {
        self.gates.extend(other.gates.iter().cloned());
        self.encoder.extend(other.encoder.iter().cloned());
    }

    /// Marks every current parameter as an encoder parameter.
    #[must_use]
    pub fn as_encoder(mut self) -> Self {
        self.encoder = self.params_name().into_iter().collect();
        self
    }

    /// Marks every current parameter as an ansatz parameter.
    #[must_use]
    pub fn as_ansatz(mut self) -> Self {
        self.encoder.clear();
        self
    }

    #[must_use]
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Gate> {
        self.gates.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// The adjoint circuit: gates reversed and daggered.
    #[must_use]
    pub fn hermitian(&self) -> Self {
        Self {
            gates: self.gates.iter().rev().map(Gate::hermitian).collect(),
            encoder: self.encoder.clone(),
        }
    }

    /// Parameter names in order of first appearance.
    #[must_use]
    pub fn params_name(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();
        for gate in &self.gates {
            for angle in gate.angles() {
                for name in angle.symbols() {
                    if seen.insert(name) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names
    }

    #[must_use]
    pub fn encoder_params_name(&self) -> Vec<String> {
        self.params_name()
            .into_iter()
            .filter(|name| self.encoder.contains(name))
            .collect()
    }

    #[must_use]
    pub fn ansatz_params_name(&self) -> Vec<String> {
        self.params_name()
            .into_iter()
            .filter(|name| !self.encoder.contains(name))
            .collect()
    }

    #[must_use]
    pub fn is_parameterized(&self) -> bool {
        self.gates.iter().any(Gate::is_parameterized)
    }

    /// The number of qubits needed to run the circuit.
    #[must_use]
    pub fn n_qubits(&self) -> usize {
        self.gates
            .iter()
            .flat_map(|gate| gate.qubits())
            .max()
            .map_or(0, |q| q + 1)
    }

    #[must_use]
    pub fn has_measure_gate(&self) -> bool {
        self.gates
            .iter()
            .any(|gate| matches!(gate.kind, GateKind::Measure(_)))
    }

    #[must_use]
    pub fn is_noise_circuit(&self) -> bool {
        self.gates
            .iter()
            .any(|gate| matches!(gate.kind, GateKind::Channel(_)))
    }

    /// Measurement keys in order of first appearance.
    #[must_use]
    pub fn measure_keys(&self) -> Vec<&str> {
        self.gates
            .iter()
            .filter_map(|gate| match &gate.kind {
                GateKind::Measure(key) => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if no gate acts on a qubit after it has been measured.
    #[must_use]
    pub fn is_measure_end(&self) -> bool {
        self.gates.iter().enumerate().all(|(i, gate)| {
            let GateKind::Measure(_) = gate.kind else {
                return true;
            };
            let Some(&qubit) = gate.obj_qubits.first() else {
                return true;
            };
            self.gates[i + 1..]
                .iter()
                .all(|later| matches!(later.kind, GateKind::Measure(_)) || !later.touches(qubit))
        })
    }

    /// Splits the circuit into its unitary part and its measurements, keeping order within each.
    #[must_use]
    pub fn split_measures(&self) -> (Circuit, Circuit) {
        let (measures, unitary): (Vec<_>, Vec<_>) = self
            .gates
            .iter()
            .cloned()
            .partition(|gate| matches!(gate.kind, GateKind::Measure(_)));
        (
            Circuit {
                gates: unitary,
                encoder: self.encoder.clone(),
            },
            Circuit {
                gates: measures,
                encoder: FxHashSet::default(),
            },
        )
    }
}

impl<'a> IntoIterator for &'a Circuit {
    type Item = &'a Gate;
    type IntoIter = std::slice::Iter<'a, Gate>;

    fn into_iter(self) -> Self::IntoIter {
        self.gates.iter()
    }
}

impl FromIterator<Gate> for Circuit {
    fn from_iter<T: IntoIterator<Item = Gate>>(iter: T) -> Self {
        Self {
            gates: iter.into_iter().collect(),
            encoder: FxHashSet::default(),
        }
    }
}
