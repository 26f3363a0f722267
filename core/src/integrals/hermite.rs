//! Hermite expansion coefficients (E) and Hermite coulomb auxiliary integrals (R)
//! of the McMurchie-Davidson scheme.
//!
//! Both are computed by recursion and memoized. A cache only ever holds values for a
//! single primitive pair (and, for R, a single nucleus): the keys encode the orders,
//! not the exponents or the geometry, so a cache must never outlive its pair.
//!
//! Reference:
//!
//! [1] Goings, J. Integrals. https://joshuagoings.com/2017/04/28/integrals/
//! [2] Helgaker, T., Jorgensen, P., Olsen, J. Molecular Electronic-Structure Theory (2000), ch. 9
use std::collections::HashMap;

use nalgebra::Vector3;

use super::boys_function::{boys_function, boys_function_orders};

/// Radix of the packed cache keys. Every packed order must stay below it.
const KEY_RADIX: u32 = 64;

/// A packed (i, j, t, axis) key of an expansion coefficient.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct ExpansionIndex(u32);

impl ExpansionIndex {
    #[inline(always)]
    pub(crate) const fn new(i: i32, j: i32, t: i32, axis: usize) -> Self {
        debug_assert!(i >= 0 && j >= 0 && t >= 0 && axis < 3);
        debug_assert!((i as u32) < KEY_RADIX && (j as u32) < KEY_RADIX && (t as u32) < KEY_RADIX);

        Self((((axis as u32 * KEY_RADIX) + i as u32) * KEY_RADIX + j as u32) * KEY_RADIX + t as u32)
    }
}

/// A packed (r, s, t, n) key of a coulomb auxiliary integral.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct CoulombIndex(u32);

impl CoulombIndex {
    #[inline(always)]
    pub(crate) const fn new(r: i32, s: i32, t: i32, n: i32) -> Self {
        debug_assert!(r >= 0 && s >= 0 && t >= 0 && n >= 0);

        Self(
            ((r as u32 * KEY_RADIX + s as u32) * KEY_RADIX + t as u32) * KEY_RADIX + n as u32,
        )
    }
}

/// Expansion of the product of two cartesian gaussians into hermite gaussians,
/// for one primitive pair.
pub(crate) struct HermiteExpansion {
    exponent_a: f64,
    exponent_b: f64,
    /// exponent sum
    p: f64,
    /// reduced exponent a*b/p
    mu: f64,
    /// A - B
    separation: Vector3<f64>,
    product_center: Vector3<f64>,
    memory: HashMap<ExpansionIndex, f64>,
}

impl HermiteExpansion {
    pub(crate) fn new(
        exponent_a: f64,
        center_a: Vector3<f64>,
        exponent_b: f64,
        center_b: Vector3<f64>,
    ) -> Self {
        let p = exponent_a + exponent_b;
        let mu = exponent_a * exponent_b / p;
        let separation = center_a - center_b;

        let mut memory = HashMap::with_capacity(32);
        for axis in 0..3 {
            memory.insert(
                ExpansionIndex::new(0, 0, 0, axis),
                (-mu * separation[axis].powi(2)).exp(),
            );
        }

        Self {
            exponent_a,
            exponent_b,
            p,
            mu,
            separation,
            product_center: (exponent_a * center_a + exponent_b * center_b) / p,
            memory,
        }
    }

    pub(crate) fn exponent_sum(&self) -> f64 {
        self.p
    }

    pub(crate) fn exponent_b(&self) -> f64 {
        self.exponent_b
    }

    pub(crate) fn product_center(&self) -> Vector3<f64> {
        self.product_center
    }

    /// E^{ij}_t along one axis. Zero whenever an index is negative or t > i + j.
    pub(crate) fn coefficient(&mut self, i: i32, j: i32, t: i32, axis: usize) -> f64 {
        if i < 0 || j < 0 || t < 0 || t > i + j {
            return 0.0;
        }

        let index = ExpansionIndex::new(i, j, t, axis);
        if let Some(&value) = self.memory.get(&index) {
            return value;
        }

        let q = self.separation[axis];
        let half_inv_p = 0.5 / self.p;
        let value = if i > 0 {
            half_inv_p * self.coefficient(i - 1, j, t - 1, axis)
                - self.mu * q / self.exponent_a * self.coefficient(i - 1, j, t, axis)
                + (t + 1) as f64 * self.coefficient(i - 1, j, t + 1, axis)
        } else {
            half_inv_p * self.coefficient(i, j - 1, t - 1, axis)
                + self.mu * q / self.exponent_b * self.coefficient(i, j - 1, t, axis)
                + (t + 1) as f64 * self.coefficient(i, j - 1, t + 1, axis)
        };

        self.memory.insert(index, value);
        value
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.memory.len()
    }
}

/// Hermite coulomb auxiliary integrals R_{rst}^n for one primitive pair and one
/// nucleus.
pub(crate) struct HermiteCoulomb {
    /// exponent sum of the primitive pair
    p: f64,
    /// product center minus nucleus position
    displacement: Vector3<f64>,
    /// F_0 .. F_max_order at p |PC|^2
    boys: Vec<f64>,
    memory: HashMap<CoulombIndex, f64>,
}

impl HermiteCoulomb {
    /// `max_order` is the largest r + s + t that will be requested, the total angular
    /// momentum of the pair.
    pub(crate) fn new(p: f64, displacement: Vector3<f64>, max_order: u32) -> Self {
        Self {
            p,
            displacement,
            boys: boys_function_orders(max_order, p * displacement.norm_squared()),
            memory: HashMap::with_capacity(32),
        }
    }

    /// R_{rst}^n. Zero whenever one of r, s, t is negative.
    pub(crate) fn coefficient(&mut self, r: i32, s: i32, t: i32, n: i32) -> f64 {
        if r < 0 || s < 0 || t < 0 {
            return 0.0;
        }

        let index = CoulombIndex::new(r, s, t, n);
        if let Some(&value) = self.memory.get(&index) {
            return value;
        }

        let value = if r > 0 {
            (r - 1) as f64 * self.coefficient(r - 2, s, t, n + 1)
                + self.displacement.x * self.coefficient(r - 1, s, t, n + 1)
        } else if s > 0 {
            (s - 1) as f64 * self.coefficient(r, s - 2, t, n + 1)
                + self.displacement.y * self.coefficient(r, s - 1, t, n + 1)
        } else if t > 0 {
            (t - 1) as f64 * self.coefficient(r, s, t - 2, n + 1)
                + self.displacement.z * self.coefficient(r, s, t - 1, n + 1)
        } else {
            let boys = match self.boys.get(n as usize) {
                Some(&value) => value,
                None => boys_function(n as u32, self.p * self.displacement.norm_squared()),
            };
            (-2.0 * self.p).powi(n) * boys
        };

        self.memory.insert(index, value);
        value
    }
}
