// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use crate::Error;
use num_complex::Complex64;
use num_traits::Zero;

/// A square complex matrix in compressed sparse row form.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    dim: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<Complex64>,
}

impl CsrMatrix {
    /// Builds a matrix from raw CSR arrays.
    ///
    /// # Errors
    /// Returns [`Error::MalformedSparseMatrix`] if the row pointer is not monotone, does not
    /// cover `indices`, or a column index falls outside `dim`.
    pub fn new(
        dim: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<Complex64>,
    ) -> Result<Self, Error> {
        let malformed = |reason: &str| Err(Error::MalformedSparseMatrix(reason.to_string()));
        if indptr.len() != dim + 1 {
            return malformed("row pointer length must be dim + 1");
        }
        if indices.len() != data.len() {
            return malformed("indices and data differ in length");
        }
        if indptr.first() != Some(&0) || indptr.last() != Some(&indices.len()) {
            return malformed("row pointer must span the stored entries");
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return malformed("row pointer must be non-decreasing");
        }
        if indices.iter().any(|&col| col >= dim) {
            return malformed("column index out of range");
        }
        Ok(Self {
            dim,
            indptr,
            indices,
            data,
        })
    }

    /// Builds a matrix from `(row, column, value)` entries. Repeated positions are summed.
    pub fn from_triplets(dim: usize, entries: &[(usize, usize, Complex64)]) -> Result<Self, Error> {
        if entries.iter().any(|&(row, col, _)| row >= dim || col >= dim) {
            return Err(Error::MalformedSparseMatrix(
                "entry position out of range".to_string(),
            ));
        }
        let mut sorted = entries.to_vec();
        sorted.sort_by_key(|&(row, col, _)| (row, col));

        let mut indptr = vec![0; dim + 1];
        let mut indices = Vec::with_capacity(sorted.len());
        let mut data: Vec<Complex64> = Vec::with_capacity(sorted.len());
        let mut last = None;
        for (row, col, value) in sorted {
            if last == Some((row, col))
                && let Some(acc) = data.last_mut()
            {
                *acc += value;
                continue;
            }
            last = Some((row, col));
            indptr[row + 1] += 1;
            indices.push(col);
            data.push(value);
        }
        for row in 0..dim {
            indptr[row + 1] += indptr[row];
        }
        Self::new(dim, indptr, indices, data)
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Returns the stored value at `(row, col)`, or zero.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.row(row)
            .find(|&(c, _)| c == col)
            .map_or_else(Complex64::zero, |(_, value)| value)
    }

    fn row(&self, row: usize) -> impl Iterator<Item = (usize, Complex64)> + '_ {
        let range = self.indptr[row]..self.indptr[row + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.data[range].iter().copied())
    }

    /// Computes `self · vector`. `vector` must have `dim` entries.
    #[must_use]
    pub fn dot(&self, vector: &[Complex64]) -> Vec<Complex64> {
        (0..self.dim)
            .map(|row| self.row(row).map(|(col, value)| value * vector[col]).sum())
            .collect()
    }

    /// Returns the conjugate transpose.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        let mut entries = Vec::with_capacity(self.nnz());
        for row in 0..self.dim {
            entries.extend(self.row(row).map(|(col, value)| (col, row, value.conj())));
        }
        let mut indptr = vec![0; self.dim + 1];
        for &(row, _, _) in &entries {
            indptr[row + 1] += 1;
        }
        for row in 0..self.dim {
            indptr[row + 1] += indptr[row];
        }
        // Rows of the source are visited in order, so a stable sort keeps columns ascending.
        entries.sort_by_key(|&(row, _, _)| row);
        let (indices, data) = entries.into_iter().map(|(_, col, value)| (col, value)).unzip();
        Self {
            dim: self.dim,
            indptr,
            indices,
            data,
        }
    }
}
