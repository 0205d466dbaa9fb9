//! Points (§3, §4.4 — component C4).
//!
//! A [`Point`] is either a finite point — a coordinate model plus a binding
//! for each of its variables — or the point at infinity, tagged with the
//! coordinate model it notionally belongs to (needed so `Formula::evaluate`
//! can still arity- and model-check it). Coordinate-model conversion goes
//! through the symbolic `satisfying`/fallback recipes rather than hardcoded
//! per-curve-family logic, matching how the formula layer treats everything
//! else.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::model::CoordinateModel;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Point {
    Finite { model: Arc<CoordinateModel>, coords: BTreeMap<String, FieldElement> },
    Infinity { model: Arc<CoordinateModel> },
}

impl Point {
    /// Builds a finite point, checking that `coords` binds exactly the
    /// model's variables (no more, no fewer).
    pub fn finite(model: Arc<CoordinateModel>, coords: BTreeMap<String, FieldElement>) -> Result<Self> {
        for var in &model.variables {
            if !coords.contains_key(var) {
                return Err(Error::ConversionFailure { variable: var.clone() });
            }
        }
        if coords.len() != model.variables.len() {
            let extra = coords
                .keys()
                .find(|k| !model.variables.contains(k))
                .cloned()
                .unwrap_or_default();
            return Err(Error::ConversionFailure { variable: extra });
        }
        Ok(Point::Finite { model, coords })
    }

    pub fn infinity(model: Arc<CoordinateModel>) -> Self {
        Point::Infinity { model }
    }

    pub fn coordinate_model(&self) -> &Arc<CoordinateModel> {
        match self {
            Point::Finite { model, .. } => model,
            Point::Infinity { model } => model,
        }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity { .. })
    }

    pub fn coords(&self) -> Option<&BTreeMap<String, FieldElement>> {
        match self {
            Point::Finite { coords, .. } => Some(coords),
            Point::Infinity { .. } => None,
        }
    }

    /// The field modulus shared by this point's coordinates, if any.
    pub fn modulus(&self) -> Option<BigUint> {
        self.coords().and_then(|c| c.values().next()).and_then(|fe| fe.modulus().cloned())
    }

    /// Converts to the affine representation of the same curve model.
    ///
    /// Evaluates the coordinate model's `satisfying` assignments in order
    /// against an environment seeded with this point's own coordinates,
    /// skipping any assignment whose inputs aren't yet bound (its inputs may
    /// be produced by a later assignment, or never produced at all — a
    /// genuine gap in the conversion recipe). Fails with
    /// [`Error::ConversionFailure`] naming the affine variable (`x` or `y`)
    /// that never got bound.
    pub fn to_affine(&self) -> Result<Point> {
        match self {
            Point::Finite { model, coords } if model.is_affine() => {
                Ok(Point::Finite { model: model.clone(), coords: coords.clone() })
            }
            Point::Finite { model, coords } => {
                let affine_model = Arc::new(CoordinateModel::affine(model.curve_model.clone()));
                let mut env = coords.clone();
                for assignment in &model.satisfying {
                    match assignment.expr.eval(&env) {
                        Ok(value) => {
                            env.insert(assignment.output.clone(), value);
                        }
                        Err(Error::UnboundVariable(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                let mut out = BTreeMap::new();
                for var in &affine_model.variables {
                    let value = env
                        .get(var)
                        .cloned()
                        .ok_or_else(|| Error::ConversionFailure { variable: var.clone() })?;
                    out.insert(var.clone(), value);
                }
                Ok(Point::Finite { model: affine_model, coords: out })
            }
            Point::Infinity { model } => Err(Error::ConversionFailure { variable: model.curve_model.clone() }),
        }
    }

    /// Lifts an affine point into `target`, a coordinate model of the same
    /// curve. `X`/`Y` copy the affine `x`/`y` directly, `Z`-prefixed
    /// variables are set to the field's multiplicative identity, `T`
    /// (extended twisted-Edwards coordinates) is `x * y`; anything else
    /// fails — this is a fallback recipe, not a general formula evaluator.
    pub fn to_model(&self, target: Arc<CoordinateModel>) -> Result<Point> {
        if Arc::ptr_eq(self.coordinate_model(), &target) {
            return Ok(self.clone());
        }
        let affine = self.to_affine()?;
        let coords = affine.coords().expect("to_affine never returns Infinity for a finite point");
        let x = coords.get("x").cloned().ok_or_else(|| Error::ConversionFailure { variable: "x".to_string() })?;
        let y = coords.get("y").cloned().ok_or_else(|| Error::ConversionFailure { variable: "y".to_string() })?;
        let modulus = x.modulus().ok_or_else(|| Error::ConversionFailure { variable: "x".to_string() })?.clone();
        let one = FieldElement::from_i64(1, &modulus);

        let mut out = BTreeMap::new();
        for var in &target.variables {
            let value = if var == "X" {
                x.clone()
            } else if var == "Y" {
                y.clone()
            } else if var.starts_with('Z') {
                one.clone()
            } else if var == "T" {
                x.mul(&y)?
            } else {
                return Err(Error::ConversionFailure { variable: var.clone() });
            };
            out.insert(var.clone(), value);
        }
        Point::finite(target, out)
    }

    /// Cross-coordinate-model equality: both sides are brought to affine
    /// form and compared field-element-wise.
    pub fn equals(&self, other: &Point) -> Result<bool> {
        match (self, other) {
            (Point::Infinity { .. }, Point::Infinity { .. }) => Ok(true),
            (Point::Infinity { .. }, _) | (_, Point::Infinity { .. }) => Ok(false),
            _ => {
                let a = self.to_affine()?;
                let b = other.to_affine()?;
                let (a_coords, b_coords) = (a.coords().unwrap(), b.coords().unwrap());
                Ok(a_coords.get("x") == b_coords.get("x") && a_coords.get("y") == b_coords.get("y"))
            }
        }
    }

    /// ANSI X9.62-flavored encoding: `0x00` for infinity, `0x04` followed by
    /// each affine coordinate (sorted by variable name, so `x` then `y`) as
    /// a fixed-width big-endian integer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.is_infinity() {
            return Ok(vec![0x00]);
        }
        let affine = self.to_affine()?;
        let coords = affine.coords().unwrap();
        let modulus = coords.values().next().and_then(|v| v.modulus()).expect("finite point has a modulus");
        let byte_len = (modulus.bits() as usize + 7) / 8;
        let mut out = vec![0x04u8];
        for (_, value) in coords {
            out.extend(value.to_bytes(byte_len)?);
        }
        Ok(out)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Point::Infinity { model: m1 }, Point::Infinity { model: m2 }) => m1.curve_model == m2.curve_model,
            (Point::Finite { model: m1, coords: c1 }, Point::Finite { model: m2, coords: c2 }) => {
                m1.name == m2.name && m1.curve_model == m2.curve_model && c1 == c2
            }
            _ => false,
        }
    }
}
impl Eq for Point {}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Infinity { model } => write!(f, "Infinity[{}]", model.name),
            Point::Finite { model, coords } => {
                write!(f, "Point[{}](", model.name)?;
                for (i, var) in model.variables.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{var}={}", coords[var])?;
                }
                write!(f, ")")
            }
        }
    }
}
