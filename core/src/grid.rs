//! Integration grids. The Hamiltonian only needs sample points, one quadrature
//! weight per point and a weighted sum, so any grid implementing [`Grid`] works.
use nalgebra::{DVector, Vector3};

use crate::error::{DftError, Result};

pub trait Grid {
    /// Sample points, in bohr
    fn points(&self) -> &[Vector3<f64>];

    /// Quadrature weight (volume element) of each point
    fn weights(&self) -> &DVector<f64>;

    fn len(&self) -> usize {
        self.points().len()
    }

    fn is_empty(&self) -> bool {
        self.points().is_empty()
    }

    /// Integral of a field sampled at the grid points.
    fn integrate(&self, field: &DVector<f64>) -> Result<f64> {
        if field.len() != self.len() {
            return Err(DftError::LengthMismatch {
                what: "grid field",
                expected: self.len(),
                found: field.len(),
            });
        }

        Ok(self.weights().dot(field))
    }
}

/// A grid given by explicit points and weights.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadratureGrid {
    points: Vec<Vector3<f64>>,
    weights: DVector<f64>,
}

impl QuadratureGrid {
    pub fn new(points: Vec<Vector3<f64>>, weights: DVector<f64>) -> Result<Self> {
        if points.len() != weights.len() {
            return Err(DftError::LengthMismatch {
                what: "grid weights",
                expected: points.len(),
                found: weights.len(),
            });
        }

        Ok(Self { points, weights })
    }

    /// Regular grid over the box [lower, upper] with trapezoidal weights. The number
    /// of intervals along each axis is chosen so that the step does not exceed
    /// `spacing`.
    pub fn uniform_box(lower: Vector3<f64>, upper: Vector3<f64>, spacing: f64) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(DftError::InvalidConfig(format!(
                "grid spacing must be positive, got {spacing}"
            )));
        }

        let mut axes: [(Vec<f64>, Vec<f64>); 3] = Default::default();
        for (axis, (coordinates, weights)) in axes.iter_mut().enumerate() {
            let (low, high) = (lower[axis], upper[axis]);
            if !(low.is_finite() && high.is_finite() && high > low) {
                return Err(DftError::InvalidConfig(format!(
                    "empty grid extent [{low}, {high}] along axis {axis}"
                )));
            }

            let intervals = ((high - low) / spacing).ceil().max(1.0) as usize;
            let step = (high - low) / intervals as f64;

            *coordinates = (0..=intervals)
                .map(|i| low + i as f64 * step)
                .collect();
            *weights = (0..=intervals)
                .map(|i| {
                    if i == 0 || i == intervals {
                        0.5 * step
                    } else {
                        step
                    }
                })
                .collect();
        }

        let [(xs, wxs), (ys, wys), (zs, wzs)] = &axes;
        let n = xs.len() * ys.len() * zs.len();
        let mut points = Vec::with_capacity(n);
        let mut weights = Vec::with_capacity(n);

        for ((x, wx), (y, wy), (z, wz)) in itertools::iproduct!(
            xs.iter().zip(wxs),
            ys.iter().zip(wys),
            zs.iter().zip(wzs)
        ) {
            points.push(Vector3::new(*x, *y, *z));
            weights.push(wx * wy * wz);
        }

        log::debug!(
            "uniform grid of {} x {} x {} points",
            xs.len(),
            ys.len(),
            zs.len()
        );

        Self::new(points, DVector::from_vec(weights))
    }

    /// Box grid enclosing every center with `margin` bohr to spare on each side.
    pub fn enclosing(centers: &[Vector3<f64>], margin: f64, spacing: f64) -> Result<Self> {
        let Some(first) = centers.first() else {
            return Err(DftError::InvalidConfig(
                "cannot enclose an empty set of centers".to_string(),
            ));
        };

        let (lower, upper) = centers[1..].iter().fold((*first, *first), |(lower, upper), center| {
            (lower.inf(center), upper.sup(center))
        });
        let margin = Vector3::repeat(margin);

        Self::uniform_box(lower - margin, upper + margin, spacing)
    }
}

impl Grid for QuadratureGrid {
    fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    fn weights(&self) -> &DVector<f64> {
        &self.weights
    }
}
