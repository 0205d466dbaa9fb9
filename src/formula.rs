//! Formula intermediate representation (§3, §4.2 — component C2).
//!
//! A [`Formula`] is a pre-parsed, named sequence of [`Assignment`]s plus the
//! arity metadata needed to marshal points in and out of its variable
//! environment. The core never re-derives a formula's correctness: op
//! counters are metadata supplied by whoever constructed it (typically a
//! loader reading EFD-derived formula catalogues), not computed here.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::Assignment;
use crate::field::FieldElement;
use crate::model::CoordinateModel;
use crate::point::Point;

/// Metadata-only operation tally, as reported by a formula's origin (§4.2).
/// The core neither verifies nor derives these; they exist for side-channel
/// cost modeling downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperationCounts {
    pub mul: usize,
    pub sqr: usize,
    pub addsub: usize,
    pub div: usize,
    pub inv: usize,
    pub pow: usize,
}

impl OperationCounts {
    pub fn total(&self) -> usize {
        self.mul + self.sqr + self.addsub + self.div + self.inv + self.pow
    }
}

/// One named formula: `input_index` points in, `output_index` points out,
/// evaluated over a fixed [`CoordinateModel`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Formula {
    name: String,
    coordinate_model: Arc<CoordinateModel>,
    input_index: usize,
    output_index: usize,
    assignments: Vec<Assignment>,
    pub counts: OperationCounts,
}

impl Formula {
    /// Builds a formula with zeroed operation counters; attach real ones
    /// with [`Formula::with_counts`] if the origin reports them.
    ///
    /// Fails if `input_index` or `output_index` is zero — a formula always
    /// consumes and produces at least one point.
    pub fn new(
        name: String,
        coordinate_model: Arc<CoordinateModel>,
        input_index: usize,
        output_index: usize,
        assignments: Vec<Assignment>,
    ) -> Result<Self> {
        if input_index == 0 || output_index == 0 {
            return Err(Error::FormulaArityError {
                formula: name,
                expected: 1,
                actual: 0,
            });
        }
        Ok(Formula {
            name,
            coordinate_model,
            input_index,
            output_index,
            assignments,
            counts: OperationCounts::default(),
        })
    }

    pub fn with_counts(mut self, counts: OperationCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinate_model(&self) -> &Arc<CoordinateModel> {
        &self.coordinate_model
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn output_index(&self) -> usize {
        self.output_index
    }

    /// Evaluates the formula against `points` (exactly `input_index` of
    /// them, each sharing this formula's coordinate model) and curve
    /// `params`, returning `output_index` reconstructed points.
    ///
    /// Input point `i` (1-indexed) contributes its coordinate variables
    /// under names `{var}{i}`; output point `input_index + j` is read back
    /// the same way once every assignment has run. This positional
    /// convention is the EFD naming scheme the formula catalogues assume.
    pub fn evaluate(&self, points: &[&Point], params: &BTreeMap<String, FieldElement>) -> Result<Vec<Point>> {
        if points.len() != self.input_index {
            return Err(Error::FormulaArityError {
                formula: self.name.clone(),
                expected: self.input_index,
                actual: points.len(),
            });
        }

        let mut env: BTreeMap<String, FieldElement> = BTreeMap::new();
        for (i, point) in points.iter().enumerate() {
            if !Arc::ptr_eq(point.coordinate_model(), &self.coordinate_model) {
                return Err(Error::CoordinateMismatch {
                    point: point.coordinate_model().name.clone(),
                    expected: self.coordinate_model.name.clone(),
                });
            }
            let coords = point.coords().ok_or_else(|| Error::WrongPointType {
                expected: "finite point".to_string(),
                actual: "infinity".to_string(),
            })?;
            for (var, val) in coords {
                env.insert(format!("{var}{}", i + 1), val.clone());
            }
        }
        for (name, val) in params {
            env.insert(name.clone(), val.clone());
        }

        for assignment in &self.assignments {
            let value = assignment.expr.eval(&env)?;
            env.insert(assignment.output.clone(), value);
        }

        let mut outputs = Vec::with_capacity(self.output_index);
        for j in 1..=self.output_index {
            let point_index = self.input_index + j;
            let mut coords = BTreeMap::new();
            for var in &self.coordinate_model.variables {
                let key = format!("{var}{point_index}");
                let value = env
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| Error::ConversionFailure { variable: key.clone() })?;
                coords.insert(var.clone(), value);
            }
            outputs.push(Point::finite(self.coordinate_model.clone(), coords)?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Assignment;
    use num_bigint::BigUint;

    fn weierstrass_jacobian_model() -> Arc<CoordinateModel> {
        Arc::new(CoordinateModel::new(
            "jacobian",
            vec!["X".to_string(), "Y".to_string(), "Z".to_string()],
            Vec::new(),
        ))
    }

    #[test]
    fn rejects_zero_arity() {
        let model = weierstrass_jacobian_model();
        assert!(Formula::new("bad".to_string(), model.clone(), 0, 1, Vec::new()).is_err());
        assert!(Formula::new("bad".to_string(), model, 1, 0, Vec::new()).is_err());
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let model = weierstrass_jacobian_model();
        let formula = Formula::new("dbl".to_string(), model.clone(), 1, 1, Vec::new()).unwrap();
        let p = BigUint::from(101u32);
        let mut coords = BTreeMap::new();
        coords.insert("X".to_string(), FieldElement::new(BigUint::from(1u32), p.clone()));
        coords.insert("Y".to_string(), FieldElement::new(BigUint::from(2u32), p.clone()));
        coords.insert("Z".to_string(), FieldElement::new(BigUint::from(1u32), p));
        let pt = Point::finite(model, coords).unwrap();
        let params = BTreeMap::new();
        let err = formula.evaluate(&[&pt, &pt], &params).unwrap_err();
        assert!(matches!(err, Error::FormulaArityError { .. }));
    }

    /// Operation-count metadata round-trips unchanged: the core trusts but
    /// never recomputes it. Counters match the well-known EFD `add-2007-bl`
    /// Jacobian addition formula (17M + 6S + 10 add/sub, no divisions or
    /// inversions).
    #[test]
    fn add_2007_bl_operation_counts_round_trip() {
        let model = weierstrass_jacobian_model();
        let assignments = vec![
            Assignment::parse("z1z1 = z1 ** 2").unwrap(),
            Assignment::parse("z2z2 = z2 ** 2").unwrap(),
            Assignment::parse("u1 = x1 * z2z2").unwrap(),
            Assignment::parse("u2 = x2 * z1z1").unwrap(),
            Assignment::parse("s1 = y1 * z2 * z2z2").unwrap(),
            Assignment::parse("s2 = y2 * z1 * z1z1").unwrap(),
            Assignment::parse("h = u2 - u1").unwrap(),
            Assignment::parse("i = (2 * h) ** 2").unwrap(),
            Assignment::parse("j = h * i").unwrap(),
            Assignment::parse("r = 2 * (s2 - s1)").unwrap(),
            Assignment::parse("v = u1 * i").unwrap(),
            Assignment::parse("x3 = r ** 2 - j - 2 * v").unwrap(),
            Assignment::parse("y3 = r * (v - x3) - 2 * s1 * j").unwrap(),
            Assignment::parse("z3 = ((z1 + z2) ** 2 - z1z1 - z2z2) * h").unwrap(),
        ];
        let counts = OperationCounts { mul: 17, sqr: 6, addsub: 10, div: 0, inv: 0, pow: 0 };
        let formula = Formula::new("add-2007-bl".to_string(), model, 2, 1, assignments)
            .unwrap()
            .with_counts(counts);
        assert_eq!(formula.counts.total(), 33);
        assert_eq!(formula.counts, counts);
    }
}
