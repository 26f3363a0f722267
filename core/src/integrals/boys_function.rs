//! The Boys function F_n(T) = int_0^1 t^(2n) exp(-T t^2) dt.
//!
//! Equivalently F_n(T) = gamma(n + 1/2, T) / (2 T^(n + 1/2)) with the lower
//! incomplete gamma function. For small and moderate arguments the incomplete gamma
//! function is summed through its power series
//!
//!   F_n(T) = exp(-T) sum_k (2T)^k / ((2n + 1)(2n + 3) ... (2n + 2k + 1)),
//!
//! whose terms are all positive, so the result keeps full relative precision at
//! every order. Past `2n + SERIES_LIMIT` the series needs too many terms, and F_n
//! follows from F_0 by the upward recursion
//!
//!   F_(k+1)(T) = ((2k + 1) F_k(T) - exp(-T)) / (2T),
//!
//! which is stable there because (2k + 1) / 2T < 1.
//!
//! The argument is offset by [`BOYS_EPSILON`] so that T = 0 never reaches a division
//! by zero and the derivative stays finite.
//!
//! Reference: Helgaker, T., Jorgensen, P., Olsen, J. Molecular Electronic-Structure
//! Theory (2000), ch. 9.8
use std::f64::consts::PI;

use nalgebra::DVector;

use crate::basis::MAX_ANGULAR;

/// Offset added to every Boys argument before evaluation.
pub const BOYS_EPSILON: f64 = 1e-12;

/// Highest order the nuclear attraction integrals request: the total angular
/// momentum of a pair of primitives.
pub const MAX_BOYS_ORDER: u32 = 2 * MAX_ANGULAR as u32;

/// Arguments below `2n + SERIES_LIMIT` are summed as a series. Above it erf(sqrt(T))
/// is 1 to double precision.
const SERIES_LIMIT: f64 = 40.0;

const MAX_SERIES_TERMS: usize = 1000;

/// F_n(T) for a single argument. T must be nonnegative.
#[inline]
pub fn boys_function(n: u32, t: f64) -> f64 {
    debug_assert!(t >= 0.0, "boys function argument must be nonnegative, got {t}");
    let t = t + BOYS_EPSILON;

    if t < 2.0 * n as f64 + SERIES_LIMIT {
        series(n, t)
    } else {
        upward_recursion(n, t)
    }
}

/// F_0(T), ..., F_n_max(T) at once. The top order comes from [`boys_function`], the
/// rest from the downward recursion F_k = (2T F_(k+1) + exp(-T)) / (2k + 1).
pub fn boys_function_orders(n_max: u32, t: f64) -> Vec<f64> {
    let mut values = vec![0.0; n_max as usize + 1];
    values[n_max as usize] = boys_function(n_max, t);

    let t = t + BOYS_EPSILON;
    let exp = (-t).exp();
    for k in (0..n_max as usize).rev() {
        values[k] = (2.0 * t * values[k + 1] + exp) / (2 * k + 1) as f64;
    }

    values
}

/// F_n(T) for a batch of arguments.
pub fn boys_function_batch(n: u32, t: &DVector<f64>) -> DVector<f64> {
    t.map(|t| boys_function(n, t))
}

/// dF_n/dT = -F_(n+1)(T)
#[inline]
pub fn boys_derivative(n: u32, t: f64) -> f64 {
    -boys_function(n + 1, t)
}

fn series(n: u32, t: f64) -> f64 {
    let mut denominator = 2.0 * n as f64 + 1.0;
    let mut term = denominator.recip();
    let mut sum = term;

    for _ in 0..MAX_SERIES_TERMS {
        denominator += 2.0;
        term *= 2.0 * t / denominator;
        sum += term;
        if term < sum * f64::EPSILON {
            break;
        }
    }

    (-t).exp() * sum
}

fn upward_recursion(n: u32, t: f64) -> f64 {
    let exp = (-t).exp();
    let mut value = 0.5 * (PI / t).sqrt();
    for k in 0..n {
        value = ((2 * k + 1) as f64 * value - exp) / (2.0 * t);
    }
    value
}
