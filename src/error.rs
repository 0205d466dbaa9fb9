//! Error taxonomy for the core (§7).
//!
//! Every fallible operation in this crate returns a [`Result<T, Error>`]. No
//! error is recovered internally: it propagates to the caller and, if raised
//! inside a formula execution, unwinds through any open
//! [`crate::context::ObservationContext`] frames, which close in LIFO order
//! via `Drop` regardless of the outcome.

use num_bigint::BigUint;
use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// The failure taxonomy described in spec §7.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A binary field operation was attempted across two elements of differing moduli.
    #[error("modulus mismatch: {lhs} != {rhs}")]
    ModulusMismatch { lhs: BigUint, rhs: BigUint },

    /// `inverse()` was called on a value that shares a nontrivial factor with the modulus.
    #[error("{value} has no inverse modulo {modulus}")]
    NotInvertible { value: BigUint, modulus: BigUint },

    /// `sqrt()` was called on a non-residue.
    #[error("{value} is not a quadratic residue modulo {modulus}")]
    NotResidue { value: BigUint, modulus: BigUint },

    /// An arithmetic operation was attempted on the `Undefined` field element sentinel.
    #[error("operation attempted on an undefined field element")]
    UndefinedOp,

    /// A formula was invoked with the wrong number (or type) of point arguments.
    #[error("formula `{formula}` expects {expected} input point(s), got {actual}")]
    FormulaArityError {
        formula: String,
        expected: usize,
        actual: usize,
    },

    /// A multiplier was asked to perform an operation whose formula slot is empty.
    #[error("multiplier has no `{0}` formula configured")]
    MissingFormula(&'static str),

    /// A point and the group/formula set it was paired with disagree on coordinate model.
    #[error("coordinate model mismatch: point uses `{point}`, expected `{expected}`")]
    CoordinateMismatch { point: String, expected: String },

    /// An affine point was expected where a projective one (or vice versa) was given.
    #[error("wrong point type: expected {expected}, got {actual}")]
    WrongPointType { expected: String, actual: String },

    /// A coordinate conversion could not supply all the variables its target required.
    #[error("could not convert point to the requested coordinate model: missing `{variable}`")]
    ConversionFailure { variable: String },

    /// A byte-encoded point did not follow the ANSI X9.62 rules this crate understands.
    #[error("bad point encoding: {reason}")]
    BadEncoding { reason: String },

    /// A decoded point does not satisfy the curve equation.
    #[error("decoded point is not on the curve")]
    NotOnCurve,

    /// A `ScalarMultiplier` was constructed from formulas spanning more than one coordinate model.
    #[error("formulas passed to a single multiplier must share a coordinate model")]
    FormulaMismatch,

    /// An expression referenced a variable that was never bound in its evaluation environment.
    #[error("unbound variable `{0}` in formula expression")]
    UnboundVariable(String),

    /// The symbolic expression text could not be parsed (§6, §9).
    #[error("could not parse expression `{0}`")]
    ExprParse(String),
}
