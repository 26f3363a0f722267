//! Density dependent potentials, composed as an expression tree.
//!
//! Leaves are either fixed fields (a constant or an array sampled on the grid) or
//! density functionals implementing [`Functional`]. The arithmetic operators build
//! inner nodes, so `PotentialExpr::from(PowerLda::slater_exchange()) * 0.5 + external`
//! is a potential on its own.
use std::{
    fmt::Debug,
    ops::{Add, Div, Mul, Neg, Sub},
    sync::Arc,
};

use nalgebra::DVector;

use crate::error::{DftError, Result};

/// A local density functional E[rho] = int e(rho(r)) dr.
pub trait Functional: Debug + Send + Sync {
    /// e(rho) at every grid point
    fn energy_density(&self, density: &DVector<f64>) -> DVector<f64>;

    /// de/drho at every grid point
    fn potential(&self, density: &DVector<f64>) -> DVector<f64>;
}

/// e(rho) = a * rho^p
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PowerLda {
    pub a: f64,
    pub p: f64,
}

impl PowerLda {
    pub fn new(a: f64, p: f64) -> Self {
        Self { a, p }
    }

    /// Dirac-Slater exchange of the spin unpolarized electron gas,
    /// e(rho) = -3/4 (3/pi)^(1/3) rho^(4/3).
    pub fn slater_exchange() -> Self {
        Self {
            a: -0.75 * (3.0 / std::f64::consts::PI).cbrt(),
            p: 4.0 / 3.0,
        }
    }
}

impl Functional for PowerLda {
    fn energy_density(&self, density: &DVector<f64>) -> DVector<f64> {
        density.map(|rho| self.a * rho.abs().powf(self.p))
    }

    fn potential(&self, density: &DVector<f64>) -> DVector<f64> {
        density.map(|rho| self.a * self.p * rho.abs().powf(self.p - 1.0))
    }
}

#[derive(Clone, Debug)]
pub enum PotentialExpr {
    /// The same value at every grid point
    Constant(f64),
    /// A fixed field, one value per grid point
    FromArray(DVector<f64>),
    Functional(Arc<dyn Functional>),
    Negate(Box<PotentialExpr>),
    Add(Box<PotentialExpr>, Box<PotentialExpr>),
    Multiply(Box<PotentialExpr>, Box<PotentialExpr>),
    Divide(Box<PotentialExpr>, Box<PotentialExpr>),
}

impl PotentialExpr {
    pub fn functional(functional: impl Functional + 'static) -> Self {
        Self::Functional(Arc::new(functional))
    }

    /// Potential field for the given density.
    pub fn evaluate(&self, density: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(match self {
            Self::Constant(value) => DVector::from_element(density.len(), *value),
            Self::FromArray(field) => {
                check_len(field, density)?;
                field.clone()
            }
            Self::Functional(functional) => functional.potential(density),
            Self::Negate(expr) => -expr.evaluate(density)?,
            Self::Add(lhs, rhs) => lhs.evaluate(density)? + rhs.evaluate(density)?,
            Self::Multiply(lhs, rhs) => lhs
                .evaluate(density)?
                .component_mul(&rhs.evaluate(density)?),
            Self::Divide(lhs, rhs) => lhs
                .evaluate(density)?
                .component_div(&rhs.evaluate(density)?),
        })
    }

    /// Energy density whose functional derivative is this potential, if the tree is
    /// linear in its leaves. Fixed fields v contribute v * rho. Products and
    /// quotients are only supported with a constant factor or divisor; anything
    /// else has no energy density and yields `None`.
    pub fn energy_density(&self, density: &DVector<f64>) -> Result<Option<DVector<f64>>> {
        Ok(match self {
            Self::Constant(value) => Some(density * *value),
            Self::FromArray(field) => {
                check_len(field, density)?;
                Some(field.component_mul(density))
            }
            Self::Functional(functional) => Some(functional.energy_density(density)),
            Self::Negate(expr) => expr.energy_density(density)?.map(|energy| -energy),
            Self::Add(lhs, rhs) => {
                match (lhs.energy_density(density)?, rhs.energy_density(density)?) {
                    (Some(lhs), Some(rhs)) => Some(lhs + rhs),
                    _ => None,
                }
            }
            Self::Multiply(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (Self::Constant(factor), expr) | (expr, Self::Constant(factor)) => expr
                    .energy_density(density)?
                    .map(|energy| energy * *factor),
                _ => None,
            },
            Self::Divide(lhs, rhs) => match rhs.as_ref() {
                Self::Constant(divisor) => lhs
                    .energy_density(density)?
                    .map(|energy| energy / *divisor),
                _ => None,
            },
        })
    }
}

fn check_len(field: &DVector<f64>, density: &DVector<f64>) -> Result<()> {
    if field.len() != density.len() {
        return Err(DftError::LengthMismatch {
            what: "fixed potential field",
            expected: density.len(),
            found: field.len(),
        });
    }
    Ok(())
}

impl From<f64> for PotentialExpr {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<DVector<f64>> for PotentialExpr {
    fn from(field: DVector<f64>) -> Self {
        Self::FromArray(field)
    }
}

impl From<PowerLda> for PotentialExpr {
    fn from(functional: PowerLda) -> Self {
        Self::functional(functional)
    }
}

impl Neg for PotentialExpr {
    type Output = PotentialExpr;

    fn neg(self) -> Self::Output {
        Self::Negate(Box::new(self))
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, |$lhs:ident, $rhs:ident| $body:expr) => {
        impl<T: Into<PotentialExpr>> $trait<T> for PotentialExpr {
            type Output = PotentialExpr;

            fn $method(self, rhs: T) -> Self::Output {
                let $lhs = Box::new(self);
                let $rhs = Box::new(rhs.into());
                $body
            }
        }
    };
}

binary_op!(Add, add, |lhs, rhs| PotentialExpr::Add(lhs, rhs));
binary_op!(Sub, sub, |lhs, rhs| PotentialExpr::Add(
    lhs,
    Box::new(PotentialExpr::Negate(rhs))
));
binary_op!(Mul, mul, |lhs, rhs| PotentialExpr::Multiply(lhs, rhs));
binary_op!(Div, div, |lhs, rhs| PotentialExpr::Divide(lhs, rhs));
