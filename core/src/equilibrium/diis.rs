use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};

/// Number of samples collected before extrapolating.
const WARMUP: usize = 3;

struct Sample {
    residual: DVector<f64>,
    update: DVector<f64>,
}

/// Pulay's direct inversion in the iterative subspace, over flattened states.
pub(crate) struct Diis {
    history: usize,
    previous_samples: VecDeque<Sample>,
}

impl Diis {
    pub fn new(history: usize) -> Self {
        Self {
            history,
            previous_samples: VecDeque::with_capacity(history),
        }
    }

    /// Records f(y) with its residual f(y) - y and returns the linear combination of
    /// the recorded updates that minimizes the combined residual. Returns `None`
    /// while warming up or when the DIIS system is singular.
    pub fn extrapolate(
        &mut self,
        residual: DVector<f64>,
        update: DVector<f64>,
    ) -> Option<DVector<f64>> {
        self.previous_samples.push_front(Sample { residual, update });
        self.previous_samples.truncate(self.history);

        let n = self.previous_samples.len();
        if n < WARMUP.min(self.history) {
            return None;
        }

        // the weights are invariant under scaling of the residual block
        let scale = self
            .previous_samples
            .iter()
            .map(|sample| sample.residual.norm_squared())
            .fold(0.0, f64::max);
        if scale == 0.0 {
            return None;
        }

        let matrix = DMatrix::from_fn(n + 1, n + 1, |i, j| match (i, j) {
            (i, j) if i == n && j == n => 0.0,
            (i, j) if i == n || j == n => 1.0,
            _ => {
                self.previous_samples[j]
                    .residual
                    .dot(&self.previous_samples[i].residual)
                    / scale
            }
        });

        let b = DVector::from_fn(n + 1, |i, _| if i == n { 1.0 } else { 0.0 });

        let solution = matrix.qr().solve(&b)?;
        if solution.iter().any(|weight| !weight.is_finite()) {
            return None;
        }

        Some(
            solution
                .iter()
                .take(n)
                .zip(&self.previous_samples)
                .map(|(&weight, Sample { update, .. })| update * weight)
                .sum(),
        )
    }
}
