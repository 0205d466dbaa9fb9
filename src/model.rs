//! Curve-family and coordinate-system metadata (§3, §4.3 — component C3).
//!
//! [`CurveModel`] and [`CoordinateModel`] are typed metadata: symbolic
//! assignment lists parsed once (via [`crate::expr::Assignment::parse`]) and
//! consumed elsewhere — by [`crate::curve::EllipticCurve`] for affine
//! reference arithmetic, and by [`crate::point::Point`] for coordinate
//! conversion. Their own behavior is limited to lookup by name.
//!
//! `CoordinateModel` tracks the name of its owning `CurveModel` as an
//! identity token (a `String`) rather than an owning/`Rc` back-reference —
//! the same information content as spec §3's "by identity, not ownership"
//! requirement, without the construction-order problems a literal circular
//! reference would introduce (see `DESIGN.md`).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::expr::{Assignment, Expr};
use crate::formula::Formula;

/// A named curve family: short Weierstrass, Montgomery, (twisted) Edwards, ...
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveModel {
    pub name: String,
    pub parameter_names: Vec<String>,
    pub coordinates: BTreeMap<String, Arc<CoordinateModel>>,
    pub base_addition: Vec<Assignment>,
    pub base_doubling: Vec<Assignment>,
    pub base_negation: Vec<Assignment>,
    pub base_neutral: Vec<Assignment>,
    /// The right-hand side of `y^2 = ysquared(x)`.
    pub ysquared: Expr,
    /// `(lhs, rhs)` of the curve's defining equation, e.g. `(y**2, x**3 + a*x + b)`.
    pub equation: (Expr, Expr),
}

impl CurveModel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        parameter_names: Vec<String>,
        base_addition: Vec<Assignment>,
        base_doubling: Vec<Assignment>,
        base_negation: Vec<Assignment>,
        base_neutral: Vec<Assignment>,
        ysquared: Expr,
        equation: (Expr, Expr),
    ) -> Self {
        CurveModel {
            name: name.into(),
            parameter_names,
            coordinates: BTreeMap::new(),
            base_addition,
            base_doubling,
            base_negation,
            base_neutral,
            ysquared,
            equation,
        }
    }

    /// Registers a coordinate system under `name`. Typically called while
    /// assembling a `CurveModel` before wrapping it in an `Arc`.
    pub fn with_coordinate_model(mut self, name: impl Into<String>, model: CoordinateModel) -> Self {
        self.coordinates.insert(name.into(), Arc::new(model));
        self
    }

    /// Whether the neutral element has an affine representation (§4.5).
    pub fn neutral_is_affine(&self) -> bool {
        !self.base_neutral.is_empty()
    }
}

/// A coordinate system (e.g. affine, Jacobian, projective, xz) belonging to
/// one `CurveModel`, carrying its variable names, the symbolic recipe for
/// recovering affine `(x, y)` from those variables (`satisfying`), and its
/// catalogue of named [`Formula`]s.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateModel {
    pub name: String,
    pub curve_model: String,
    pub variables: Vec<String>,
    pub satisfying: Vec<Assignment>,
    pub formulas: BTreeMap<String, Arc<Formula>>,
}

impl CoordinateModel {
    pub fn new(name: impl Into<String>, variables: Vec<String>, satisfying: Vec<Assignment>) -> Self {
        CoordinateModel {
            name: name.into(),
            curve_model: String::new(),
            variables,
            satisfying,
            formulas: BTreeMap::new(),
        }
    }

    pub fn with_curve_model(mut self, curve_model: impl Into<String>) -> Self {
        self.curve_model = curve_model.into();
        self
    }

    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formulas.insert(formula.name().to_string(), Arc::new(formula));
        self
    }

    /// The distinguished affine coordinate system for a curve model: plain
    /// `(x, y)`, no conversion recipe needed (it *is* the affine point).
    pub fn affine(curve_model: impl Into<String>) -> Self {
        CoordinateModel::new("affine", vec!["x".to_string(), "y".to_string()], Vec::new())
            .with_curve_model(curve_model)
    }

    pub fn is_affine(&self) -> bool {
        self.name == "affine"
    }
}
