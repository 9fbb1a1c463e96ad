// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use ndarray::{Array2, array};
use num_complex::Complex64;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};
use std::sync::LazyLock;

/// A dense gate matrix, indexed `[row, column]`.
pub type Matrix = Array2<Complex64>;

const O: Complex64 = Complex64::new(0.0, 0.0);
const L: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

pub static X: LazyLock<Matrix> = LazyLock::new(|| array![[O, L], [L, O]]);

pub static Y: LazyLock<Matrix> = LazyLock::new(|| array![[O, -I], [I, O]]);

pub static Z: LazyLock<Matrix> = LazyLock::new(|| array![[L, O], [O, -L]]);

pub static H: LazyLock<Matrix> = LazyLock::new(|| {
    let f = Complex64::new(FRAC_1_SQRT_2, 0.0);
    array![[f, f], [f, -f]]
});

pub static S: LazyLock<Matrix> = LazyLock::new(|| array![[L, O], [O, I]]);

pub static S_ADJ: LazyLock<Matrix> = LazyLock::new(|| array![[L, O], [O, -I]]);

pub static T: LazyLock<Matrix> = LazyLock::new(|| {
    array![[L, O], [O, Complex64::from_polar(1.0, FRAC_PI_4)]]
});

pub static T_ADJ: LazyLock<Matrix> = LazyLock::new(|| {
    array![[L, O], [O, Complex64::from_polar(1.0, -FRAC_PI_4)]]
});

pub static SWAP: LazyLock<Matrix> = LazyLock::new(|| {
    array![[L, O, O, O],
           [O, O, L, O],
           [O, L, O, O],
           [O, O, O, L]]
});

pub static ISWAP: LazyLock<Matrix> = LazyLock::new(|| {
    array![[L, O, O, O],
           [O, O, I, O],
           [O, I, O, O],
           [O, O, O, L]]
});

pub static ISWAP_ADJ: LazyLock<Matrix> = LazyLock::new(|| {
    array![[L, O, O, O],
           [O, O, -I, O],
           [O, -I, O, O],
           [O, O, O, L]]
});

fn real(value: f64) -> Complex64 {
    Complex64::new(value, 0.0)
}

fn imag(value: f64) -> Complex64 {
    Complex64::new(0.0, value)
}

/// Returns `(cos(θ/2), sin(θ/2))`, or their derivatives with respect to `θ` when `diff` is set.
fn half_angle(theta: f64, diff: bool) -> (f64, f64) {
    let (sin, cos) = (theta / 2.0).sin_cos();
    if diff {
        (-sin / 2.0, cos / 2.0)
    } else {
        (cos, sin)
    }
}

/// `exp(-iθX/2)`.
#[must_use]
pub fn rx(theta: f64, diff: bool) -> Matrix {
    let (c, s) = half_angle(theta, diff);
    array![[real(c), imag(-s)],
           [imag(-s), real(c)]]
}

/// `exp(-iθY/2)`.
#[must_use]
pub fn ry(theta: f64, diff: bool) -> Matrix {
    let (c, s) = half_angle(theta, diff);
    array![[real(c), real(-s)],
           [real(s), real(c)]]
}

/// `exp(-iθZ/2)`.
#[must_use]
pub fn rz(theta: f64, diff: bool) -> Matrix {
    let mut a = Complex64::from_polar(1.0, -theta / 2.0);
    let mut b = Complex64::from_polar(1.0, theta / 2.0);
    if diff {
        a *= imag(-0.5);
        b *= imag(0.5);
    }
    array![[a, O],
           [O, b]]
}

/// `diag(1, e^{iθ})`.
#[must_use]
pub fn phase_shift(theta: f64, diff: bool) -> Matrix {
    let phase = Complex64::from_polar(1.0, theta);
    if diff {
        array![[O, O],
               [O, I * phase]]
    } else {
        array![[L, O],
               [O, phase]]
    }
}

/// `e^{-iθ} 𝟙` on a single target.
#[must_use]
pub fn global_phase(theta: f64, diff: bool) -> Matrix {
    let mut phase = Complex64::from_polar(1.0, -theta);
    if diff {
        phase *= -I;
    }
    array![[phase, O],
           [O, phase]]
}

/// `exp(-iθ X⊗X/2)`.
#[must_use]
pub fn rxx(theta: f64, diff: bool) -> Matrix {
    let (c, s) = half_angle(theta, diff);
    let b = real(c);
    let a = imag(-s);
    array![[b, O, O, a],
           [O, b, a, O],
           [O, a, b, O],
           [a, O, O, b]]
}

/// `exp(-iθ Y⊗Y/2)`.
#[must_use]
pub fn ryy(theta: f64, diff: bool) -> Matrix {
    let (c, s) = half_angle(theta, diff);
    let b = real(c);
    let a = imag(s);
    array![[b, O, O, a],
           [O, b, -a, O],
           [O, -a, b, O],
           [a, O, O, b]]
}

/// `exp(-iθ Z⊗Z/2)`.
#[must_use]
pub fn rzz(theta: f64, diff: bool) -> Matrix {
    let mut a = Complex64::from_polar(1.0, -theta / 2.0);
    let mut b = Complex64::from_polar(1.0, theta / 2.0);
    if diff {
        a *= imag(-0.5);
        b *= imag(0.5);
    }
    array![[a, O, O, O],
           [O, b, O, O],
           [O, O, b, O],
           [O, O, O, a]]
}

/// The general single-qubit rotation
/// `[[cos(θ/2), -e^{iλ} sin(θ/2)], [e^{iφ} sin(θ/2), e^{i(φ+λ)} cos(θ/2)]]`.
///
/// With `diff = Some(k)` the partial derivative with respect to angle `k` (`0 = θ`, `1 = φ`,
/// `2 = λ`) is returned instead.
#[must_use]
pub fn u3(theta: f64, phi: f64, lambda: f64, diff: Option<usize>) -> Matrix {
    let (c, s) = half_angle(theta, false);
    let e_phi = Complex64::from_polar(1.0, phi);
    let e_lambda = Complex64::from_polar(1.0, lambda);
    let e_both = Complex64::from_polar(1.0, phi + lambda);
    match diff {
        None => array![[real(c), -e_lambda * s],
                       [e_phi * s, e_both * c]],
        Some(0) => array![[real(-s / 2.0), -e_lambda * (c / 2.0)],
                          [e_phi * (c / 2.0), -e_both * (s / 2.0)]],
        Some(1) => array![[O, O],
                          [I * e_phi * s, I * e_both * c]],
        Some(2) => array![[O, -I * e_lambda * s],
                          [O, I * e_both * c]],
        Some(k) => panic!("u3 has three angles, derivative {k} requested"),
    }
}

/// The fermionic simulation gate
/// `[[1, 0, 0, 0], [0, cos θ, -i sin θ, 0], [0, -i sin θ, cos θ, 0], [0, 0, 0, e^{-iφ}]]`.
///
/// With `diff = Some(k)` the partial derivative with respect to angle `k` (`0 = θ`, `1 = φ`) is
/// returned instead.
#[must_use]
pub fn fsim(theta: f64, phi: f64, diff: Option<usize>) -> Matrix {
    let (s, c) = theta.sin_cos();
    let e_phi = Complex64::from_polar(1.0, -phi);
    match diff {
        None => array![[L, O, O, O],
                       [O, real(c), imag(-s), O],
                       [O, imag(-s), real(c), O],
                       [O, O, O, e_phi]],
        Some(0) => array![[O, O, O, O],
                          [O, real(-s), imag(-c), O],
                          [O, imag(-c), real(-s), O],
                          [O, O, O, O]],
        Some(1) => array![[O, O, O, O],
                          [O, O, O, O],
                          [O, O, O, O],
                          [O, O, O, -I * e_phi]],
        Some(k) => panic!("fsim has two angles, derivative {k} requested"),
    }
}

/// Returns the conjugate transpose of `matrix`.
#[must_use]
pub fn dagger(matrix: &Matrix) -> Matrix {
    matrix.t().mapv(|c| c.conj())
}

/// Returns `true` if `matrix` is square with a side of `2^n_qubits`.
#[must_use]
pub fn fits_qubits(matrix: &Matrix, n_qubits: usize) -> bool {
    let side = 1 << n_qubits;
    matrix.dim() == (side, side)
}
