//! Elliptic curves and the affine reference group law (§3, §4.5 — component C5).
//!
//! [`EllipticCurve`] ties a [`CurveModel`] to concrete parameters and a prime
//! field, and provides the slow-but-trustworthy affine arithmetic
//! (`affine_add`, `affine_double`, `affine_multiply`, ...) that every
//! `ScalarMultiplier` in `src/mult.rs` is checked against. These operations
//! are not meant to be fast or side-channel resistant — they exist as the
//! oracle, evaluated straight through `CurveModel`'s symbolic templates
//! rather than through the `Formula`/`ObservationContext` machinery
//! multipliers use.

use std::collections::BTreeMap;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::model::{CoordinateModel, CurveModel};
use crate::point::Point;

#[derive(Debug, Clone)]
pub struct EllipticCurve {
    pub model: Arc<CurveModel>,
    pub coordinate_model: Arc<CoordinateModel>,
    pub prime: BigUint,
    pub parameters: BTreeMap<String, FieldElement>,
}

impl EllipticCurve {
    pub fn new(
        model: Arc<CurveModel>,
        coordinate_model: Arc<CoordinateModel>,
        prime: BigUint,
        parameters: BTreeMap<String, FieldElement>,
    ) -> Result<Self> {
        for name in &model.parameter_names {
            if !parameters.contains_key(name) {
                return Err(Error::ConversionFailure { variable: name.clone() });
            }
        }
        Ok(EllipticCurve { model, coordinate_model, prime, parameters })
    }

    fn affine_model(&self) -> Arc<CoordinateModel> {
        Arc::new(CoordinateModel::affine(self.model.name.clone()))
    }

    fn env_with_params(&self) -> BTreeMap<String, FieldElement> {
        self.parameters.clone()
    }

    fn run(&self, assignments: &[crate::expr::Assignment], mut env: BTreeMap<String, FieldElement>) -> Result<BTreeMap<String, FieldElement>> {
        for assignment in assignments {
            let value = assignment.expr.eval(&env)?;
            env.insert(assignment.output.clone(), value);
        }
        Ok(env)
    }

    fn affine_xy(&self, p: &Point) -> Result<(FieldElement, FieldElement)> {
        let affine = p.to_affine()?;
        let coords = affine.coords().expect("finite point after to_affine");
        let x = coords.get("x").cloned().ok_or_else(|| Error::ConversionFailure { variable: "x".to_string() })?;
        let y = coords.get("y").cloned().ok_or_else(|| Error::ConversionFailure { variable: "y".to_string() })?;
        Ok((x, y))
    }

    /// Affine point addition, `P1 != P2`, `P1`/`P2` not the neutral element.
    pub fn affine_add(&self, p1: &Point, p2: &Point) -> Result<Point> {
        let (x1, y1) = self.affine_xy(p1)?;
        let (x2, y2) = self.affine_xy(p2)?;
        let mut env = self.env_with_params();
        env.insert("x1".to_string(), x1);
        env.insert("y1".to_string(), y1);
        env.insert("x2".to_string(), x2);
        env.insert("y2".to_string(), y2);
        let env = self.run(&self.model.base_addition, env)?;
        self.point_from(&env, "x3", "y3")
    }

    /// Affine point doubling.
    pub fn affine_double(&self, p: &Point) -> Result<Point> {
        let (x1, y1) = self.affine_xy(p)?;
        let mut env = self.env_with_params();
        env.insert("x1".to_string(), x1);
        env.insert("y1".to_string(), y1);
        let env = self.run(&self.model.base_doubling, env)?;
        self.point_from(&env, "x3", "y3")
    }

    /// Affine point negation.
    pub fn affine_negate(&self, p: &Point) -> Result<Point> {
        let (x1, y1) = self.affine_xy(p)?;
        let mut env = self.env_with_params();
        env.insert("x1".to_string(), x1);
        env.insert("y1".to_string(), y1);
        let env = self.run(&self.model.base_negation, env)?;
        self.point_from(&env, "x2", "y2")
    }

    fn point_from(&self, env: &BTreeMap<String, FieldElement>, x_name: &str, y_name: &str) -> Result<Point> {
        let x = env.get(x_name).cloned().ok_or_else(|| Error::ConversionFailure { variable: x_name.to_string() })?;
        let y = env.get(y_name).cloned().ok_or_else(|| Error::ConversionFailure { variable: y_name.to_string() })?;
        let mut coords = BTreeMap::new();
        coords.insert("x".to_string(), x);
        coords.insert("y".to_string(), y);
        Point::finite(self.affine_model(), coords)
    }

    /// The neutral element, affine if the curve model defines one
    /// symbolically, otherwise the generic point at infinity.
    pub fn affine_neutral(&self) -> Result<Point> {
        if self.model.base_neutral.is_empty() {
            return Ok(Point::infinity(self.affine_model()));
        }
        let env = self.run(&self.model.base_neutral, self.env_with_params())?;
        self.point_from(&env, "x", "y")
    }

    pub fn is_neutral(&self, p: &Point) -> Result<bool> {
        if p.is_infinity() {
            return Ok(self.model.base_neutral.is_empty());
        }
        p.equals(&self.affine_neutral()?)
    }

    /// Whether `p` satisfies the curve equation, after conversion to affine.
    pub fn is_on_curve(&self, p: &Point) -> Result<bool> {
        if p.is_infinity() {
            return Ok(self.model.base_neutral.is_empty());
        }
        let (x, y) = self.affine_xy(p)?;
        let mut env = self.env_with_params();
        env.insert("x".to_string(), x);
        env.insert("y".to_string(), y);
        let lhs = self.model.equation.0.eval(&env)?;
        let rhs = self.model.equation.1.eval(&env)?;
        Ok(lhs == rhs)
    }

    /// `y^2` for a given `x`, per the curve model's `ysquared` template.
    pub fn ysquared(&self, x: &FieldElement) -> Result<FieldElement> {
        let mut env = self.env_with_params();
        env.insert("x".to_string(), x.clone());
        self.model.ysquared.eval(&env)
    }

    /// Left-to-right double-and-add, the reference implementation every
    /// `ScalarMultiplier` in `src/mult.rs` is checked against. `k == 0`
    /// returns the neutral element.
    pub fn affine_multiply(&self, p: &Point, k: &BigUint) -> Result<Point> {
        if k.is_zero() {
            return self.affine_neutral();
        }
        let bits = k.bits();
        if bits == 1 {
            return Ok(p.clone());
        }
        let mut r = p.clone();
        for i in (0..bits - 1).rev() {
            r = self.affine_double(&r)?;
            if k.bit(i) {
                r = self.affine_add(&r, p)?;
            }
        }
        Ok(r)
    }

    /// Samples a uniformly random point on the curve by rejection sampling
    /// on `x`, then choosing a random sign for `y`.
    pub fn affine_random(&self) -> Result<Point> {
        loop {
            let x = FieldElement::random(&self.prime);
            let ysq = self.ysquared(&x)?;
            if !ysq.is_residue()? {
                continue;
            }
            let y = ysq.sqrt()?;
            let y = if FieldElement::random_bit() { y } else { y.neg()? };
            let mut coords = BTreeMap::new();
            coords.insert("x".to_string(), x);
            coords.insert("y".to_string(), y);
            return Point::finite(self.affine_model(), coords);
        }
    }

    fn byte_len(&self) -> usize {
        ((self.prime.bits() as usize) + 7) / 8
    }

    /// Decodes an ANSI X9.62-style encoded point: `0x00` for infinity,
    /// `0x04`/`0x06` uncompressed (`x` then `y`), `0x02`/`0x03` compressed
    /// (`x` plus the parity of `y`). Fails with [`Error::NotOnCurve`] if the
    /// decoded point does not satisfy the curve equation.
    pub fn decode_point(&self, bytes: &[u8]) -> Result<Point> {
        if !self.coordinate_model.is_affine() {
            return Err(Error::CoordinateMismatch {
                point: self.coordinate_model.name.clone(),
                expected: "affine".to_string(),
            });
        }
        if bytes.is_empty() {
            return Err(Error::BadEncoding { reason: "empty input".to_string() });
        }
        let tag = bytes[0];
        if tag == 0x00 {
            return Ok(Point::infinity(self.affine_model()));
        }
        let n = self.byte_len();
        let point = match tag {
            0x04 | 0x06 => {
                if bytes.len() != 1 + 2 * n {
                    return Err(Error::BadEncoding { reason: "wrong length for uncompressed point".to_string() });
                }
                let x = FieldElement::from_bytes(&bytes[1..1 + n], self.prime.clone());
                let y = FieldElement::from_bytes(&bytes[1 + n..1 + 2 * n], self.prime.clone());
                let mut coords = BTreeMap::new();
                coords.insert("x".to_string(), x);
                coords.insert("y".to_string(), y);
                Point::finite(self.affine_model(), coords)?
            }
            0x02 | 0x03 => {
                if bytes.len() != 1 + n {
                    return Err(Error::BadEncoding { reason: "wrong length for compressed point".to_string() });
                }
                let x = FieldElement::from_bytes(&bytes[1..1 + n], self.prime.clone());
                let ysq = self.ysquared(&x)?;
                let root = match ysq.sqrt() {
                    Ok(root) => root,
                    Err(Error::NotResidue { .. }) => return Err(Error::NotOnCurve),
                    Err(e) => return Err(e),
                };
                let root_is_odd = root.value()?.bit(0);
                let wants_odd = tag == 0x03;
                let y = if root_is_odd == wants_odd { root } else { root.neg()? };
                let mut coords = BTreeMap::new();
                coords.insert("x".to_string(), x);
                coords.insert("y".to_string(), y);
                Point::finite(self.affine_model(), coords)?
            }
            _ => return Err(Error::BadEncoding { reason: format!("unknown point tag 0x{tag:02x}") }),
        };
        if !self.is_on_curve(&point)? {
            return Err(Error::NotOnCurve);
        }
        Ok(point)
    }
}
