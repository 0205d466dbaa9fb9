//! Prime-field arithmetic (§3, §4.1 — component C1).
//!
//! [`FieldElement`] is the `FE` of the spec: a `(value, modulus)` pair with
//! `0 <= value < modulus`, plus a distinguished [`FieldElement::Undefined`]
//! sentinel used as the infinity point's coordinates. Every arithmetic
//! operation returns a fresh value — there is no in-place mutation.
//!
//! The modulus is a runtime `BigUint` rather than a compile-time constant:
//! curves are loaded, not chosen ahead of time, so a fixed-width `ff`-style
//! representation does not fit (see `DESIGN.md`).

use std::fmt;

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Pow, Zero};
use rand::Rng;

use crate::error::{Error, Result};

/// An element of a prime field, or the `Undefined` sentinel (§3, §9).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldElement {
    Value { v: BigUint, p: BigUint },
    Undefined,
}

impl FieldElement {
    /// Constructs `v mod p`. Does not check that `p` is prime — callers that
    /// need that guarantee should run [`FieldElement::miller_rabin`] first.
    pub fn new(v: BigUint, p: BigUint) -> Self {
        FieldElement::Value { v: v.mod_floor(&p), p }
    }

    /// Constructs a field element from a (possibly negative) `i64` literal,
    /// used by the expression interpreter (`src/expr.rs`) for integer literals.
    pub fn from_i64(v: i64, p: &BigUint) -> Self {
        let modulus = BigInt::from_biguint(Sign::Plus, p.clone());
        let reduced = BigInt::from(v).mod_floor(&modulus);
        FieldElement::Value { v: reduced.to_biguint().unwrap(), p: p.clone() }
    }

    pub fn modulus(&self) -> Option<&BigUint> {
        match self {
            FieldElement::Value { p, .. } => Some(p),
            FieldElement::Undefined => None,
        }
    }

    pub fn value(&self) -> Result<&BigUint> {
        match self {
            FieldElement::Value { v, .. } => Ok(v),
            FieldElement::Undefined => Err(Error::UndefinedOp),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldElement::Undefined)
    }

    fn same_field<'a>(&'a self, other: &'a Self) -> Result<(&'a BigUint, &'a BigUint, &'a BigUint)> {
        let (a, p1) = match self {
            FieldElement::Value { v, p } => (v, p),
            FieldElement::Undefined => return Err(Error::UndefinedOp),
        };
        let (b, p2) = match other {
            FieldElement::Value { v, p } => (v, p),
            FieldElement::Undefined => return Err(Error::UndefinedOp),
        };
        if p1 != p2 {
            return Err(Error::ModulusMismatch { lhs: p1.clone(), rhs: p2.clone() });
        }
        Ok((a, b, p1))
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        let (a, b, p) = self.same_field(other)?;
        Ok(FieldElement::new((a + b).mod_floor(p), p.clone()))
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        let (a, b, p) = self.same_field(other)?;
        let a = BigInt::from_biguint(Sign::Plus, a.clone());
        let b = BigInt::from_biguint(Sign::Plus, b.clone());
        let modulus = BigInt::from_biguint(Sign::Plus, p.clone());
        let r = (a - b).mod_floor(&modulus);
        Ok(FieldElement::new(r.to_biguint().unwrap(), p.clone()))
    }

    pub fn mul(&self, other: &Self) -> Result<Self> {
        let (a, b, p) = self.same_field(other)?;
        Ok(FieldElement::new((a * b).mod_floor(p), p.clone()))
    }

    pub fn neg(&self) -> Result<Self> {
        match self {
            FieldElement::Value { v, p } => {
                if v.is_zero() {
                    Ok(FieldElement::new(BigUint::zero(), p.clone()))
                } else {
                    Ok(FieldElement::new(p - v, p.clone()))
                }
            }
            FieldElement::Undefined => Err(Error::UndefinedOp),
        }
    }

    /// Modular inverse via the extended Euclidean algorithm.
    pub fn inverse(&self) -> Result<Self> {
        let (v, p) = match self {
            FieldElement::Value { v, p } => (v, p),
            FieldElement::Undefined => return Err(Error::UndefinedOp),
        };
        let (g, x, _) = extgcd(
            &BigInt::from_biguint(Sign::Plus, v.clone()),
            &BigInt::from_biguint(Sign::Plus, p.clone()),
        );
        if g != BigInt::one() {
            return Err(Error::NotInvertible { value: v.clone(), modulus: p.clone() });
        }
        let modulus = BigInt::from_biguint(Sign::Plus, p.clone());
        let inv = x.mod_floor(&modulus).to_biguint().unwrap();
        Ok(FieldElement::new(inv, p.clone()))
    }

    pub fn div(&self, other: &Self) -> Result<Self> {
        self.mul(&other.inverse()?)
    }

    /// Raises to an integer exponent, positive or negative (negative goes
    /// through `inverse` first), by square-and-multiply.
    pub fn pow(&self, mut exponent: i64) -> Result<Self> {
        let p = self.modulus().cloned().ok_or(Error::UndefinedOp)?;
        let base = if exponent < 0 {
            exponent = -exponent;
            self.inverse()?
        } else {
            self.clone()
        };
        let mut result = FieldElement::new(BigUint::one(), p);
        let mut b = base;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.mul(&b)?;
            }
            b = b.mul(&b)?;
            exponent >>= 1;
        }
        Ok(result)
    }

    /// Euler's criterion: `v^((p-1)/2) == 1 mod p` (zero is a residue).
    pub fn is_residue(&self) -> Result<bool> {
        let (v, p) = match self {
            FieldElement::Value { v, p } => (v, p),
            FieldElement::Undefined => return Err(Error::UndefinedOp),
        };
        if v.is_zero() {
            return Ok(true);
        }
        if p == &BigUint::from(2u32) {
            return Ok(true);
        }
        let exp = (p - BigUint::one()) >> 1u32;
        let r = v.modpow(&exp, p);
        Ok(r == BigUint::one())
    }

    /// Modular square root via Tonelli–Shanks (odd primes) or the identity
    /// map for `p == 2`. Fails with [`Error::NotResidue`] if `self` is not a
    /// residue. Per §4.1, the tie-break between the two valid roots is not
    /// part of this contract — callers needing a specific parity (e.g.
    /// `EllipticCurve::decode_point`) apply it themselves.
    pub fn sqrt(&self) -> Result<Self> {
        let (v, p) = match self {
            FieldElement::Value { v, p } => (v, p),
            FieldElement::Undefined => return Err(Error::UndefinedOp),
        };
        if !self.is_residue()? {
            return Err(Error::NotResidue { value: v.clone(), modulus: p.clone() });
        }
        if v.is_zero() {
            return Ok(FieldElement::new(BigUint::zero(), p.clone()));
        }
        if p == &BigUint::from(2u32) {
            return Ok(FieldElement::new(v.clone(), p.clone()));
        }

        // p == 3 mod 4: direct formula.
        let three = BigUint::from(3u32);
        let four = BigUint::from(4u32);
        if p.mod_floor(&four) == three {
            let exp = (p + BigUint::one()) >> 2u32;
            let root = v.modpow(&exp, p);
            return Ok(FieldElement::new(root, p.clone()));
        }

        // General Tonelli-Shanks: write p - 1 = q * 2^s with q odd.
        let one = BigUint::one();
        let mut q = p - &one;
        let mut s: u64 = 0;
        while (&q).is_even() {
            q >>= 1u32;
            s += 1;
        }

        // Find a quadratic non-residue z.
        let mut z = BigUint::from(2u32);
        loop {
            let elem = FieldElement::new(z.clone(), p.clone());
            if !elem.is_residue()? {
                break;
            }
            z += &one;
        }

        let mut m = s;
        let mut c = z.modpow(&q, p);
        let mut t = v.modpow(&q, p);
        let mut r = v.modpow(&((&q + &one) >> 1u32), p);

        while t != one {
            // Find least i, 0 < i < m, such that t^(2^i) == 1.
            let mut i = 0u64;
            let mut t2i = t.clone();
            while t2i != one {
                t2i = (&t2i * &t2i).mod_floor(p);
                i += 1;
                if i == m {
                    return Err(Error::NotResidue { value: v.clone(), modulus: p.clone() });
                }
            }
            let exp = BigUint::from(2u32).pow((m - i - 1) as u32);
            let b = c.modpow(&exp, p);
            m = i;
            c = (&b * &b).mod_floor(p);
            t = (&t * &c).mod_floor(p);
            r = (&r * &b).mod_floor(p);
        }
        Ok(FieldElement::new(r, p.clone()))
    }

    /// Samples a uniformly random element of `Z_p` (not a field residue —
    /// just a random representative, used by `EllipticCurve::affine_random`).
    pub fn random(p: &BigUint) -> Self {
        let mut rng = rand::thread_rng();
        let v = rng.gen_biguint_below(p);
        FieldElement::new(v, p.clone())
    }

    /// Samples a uniformly random element of `Z_n` for small `n` (used for the
    /// coin flip in `EllipticCurve::affine_random`'s sign choice).
    pub fn random_bit() -> bool {
        rand::thread_rng().gen_bool(0.5)
    }

    /// Big-endian encoding, zero-padded to `byte_len` bytes.
    pub fn to_bytes(&self, byte_len: usize) -> Result<Vec<u8>> {
        let v = self.value()?;
        let mut bytes = v.to_bytes_be();
        if bytes.len() > byte_len {
            return Err(Error::BadEncoding { reason: "value too large for byte length".to_string() });
        }
        let mut out = vec![0u8; byte_len - bytes.len()];
        out.append(&mut bytes);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8], p: BigUint) -> Self {
        FieldElement::new(BigUint::from_bytes_be(bytes), p)
    }

    /// Greatest common divisor, standard Euclidean algorithm.
    pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
        a.gcd(b)
    }

    /// Extended Euclidean algorithm: returns `(g, x, y)` with `a*x + b*y == g`.
    pub fn extgcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
        extgcd(a, b)
    }

    /// A probabilistic primality test (Miller-Rabin) sufficient for
    /// rejecting obvious composites — not a cryptographic-strength test (§4.1).
    pub fn miller_rabin(n: &BigUint) -> bool {
        miller_rabin(n, 40)
    }
}

fn extgcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    if b.is_zero() {
        return (a.clone(), BigInt::one(), BigInt::zero());
    }
    let (g, x1, y1) = extgcd(b, &(a.mod_floor(b)));
    let x = y1.clone();
    let y = x1 - (a / b) * y1;
    (g, x, y)
}

fn miller_rabin(n: &BigUint, rounds: u32) -> bool {
    let zero = BigUint::zero();
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    if n == &two || n == &BigUint::from(3u32) {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut r = 0u32;
    while (&d).is_even() {
        d >>= 1u32;
        r += 1;
    }

    let small_witnesses: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    let mut rng = rand::thread_rng();

    let witness_is_composite = |a: &BigUint| -> bool {
        if a == &zero || a >= n {
            return false;
        }
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            return false;
        }
        for _ in 0..r.saturating_sub(1) {
            x = (&x * &x).mod_floor(n);
            if x == n_minus_one {
                return false;
            }
        }
        true
    };

    for w in small_witnesses {
        let a = BigUint::from(w);
        if &a >= n {
            continue;
        }
        if witness_is_composite(&a) {
            return false;
        }
    }

    let extra_rounds = rounds.saturating_sub(small_witnesses.len() as u32);
    for _ in 0..extra_rounds {
        let a = rng.gen_biguint_range(&two, &(n - &one));
        if witness_is_composite(&a) {
            return false;
        }
    }
    true
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldElement::Value { v: v1, p: p1 }, FieldElement::Value { v: v2, p: p2 }) => {
                v1 == v2 && p1 == p2
            }
            _ => false,
        }
    }
}
impl Eq for FieldElement {}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldElement::Value { v, p } => write!(f, "{v} (mod {p})"),
            FieldElement::Undefined => write!(f, "Undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p256() -> BigUint {
        // p = 2^256 - 2^224 + 2^192 + 2^96 - 1 (NIST P-256 prime).
        BigUint::parse_bytes(
            b"ffffffff00000001000000000000000000000000ffffffffffffffffffffffff",
            16,
        )
        .unwrap()
    }

    #[test]
    fn add_sub_mul_roundtrip() {
        let p = BigUint::from(101u32);
        let a = FieldElement::new(BigUint::from(40u32), p.clone());
        let b = FieldElement::new(BigUint::from(90u32), p.clone());
        let sum = a.add(&b).unwrap();
        assert_eq!(sum, FieldElement::new(BigUint::from(29u32), p.clone()));
        let diff = sum.sub(&b).unwrap();
        assert_eq!(diff, a);
    }

    #[test]
    fn modulus_mismatch_is_rejected() {
        let a = FieldElement::new(BigUint::from(1u32), BigUint::from(7u32));
        let b = FieldElement::new(BigUint::from(1u32), BigUint::from(11u32));
        assert!(matches!(a.add(&b), Err(Error::ModulusMismatch { .. })));
    }

    #[test]
    fn undefined_fails_every_op() {
        let u = FieldElement::Undefined;
        let v = FieldElement::new(BigUint::from(1u32), BigUint::from(7u32));
        assert!(matches!(u.add(&v), Err(Error::UndefinedOp)));
        assert!(matches!(v.add(&u), Err(Error::UndefinedOp)));
        assert!(matches!(u.inverse(), Err(Error::UndefinedOp)));
        assert_ne!(u, u); // equality is always false for Undefined, even against itself
    }

    #[test]
    fn inverse_and_division() {
        let p = BigUint::from(101u32);
        let a = FieldElement::new(BigUint::from(17u32), p.clone());
        let inv = a.inverse().unwrap();
        let one = a.mul(&inv).unwrap();
        assert_eq!(one, FieldElement::new(BigUint::one(), p));
    }

    #[test]
    fn not_invertible_on_shared_factor() {
        let p = BigUint::from(9u32); // deliberately non-prime to exercise the failure path
        let a = FieldElement::new(BigUint::from(3u32), p);
        assert!(matches!(a.inverse(), Err(Error::NotInvertible { .. })));
    }

    #[test]
    fn legendre_and_sqrt_small_prime() {
        let p = BigUint::from(101u32);
        let four = FieldElement::new(BigUint::from(4u32), p.clone());
        assert!(four.is_residue().unwrap());
        let root = four.sqrt().unwrap();
        let squared = root.mul(&root).unwrap();
        assert_eq!(squared, four);
    }

    #[test]
    fn non_residue_sqrt_fails() {
        let p = BigUint::from(7u32); // 3 is a non-residue mod 7
        let three = FieldElement::new(BigUint::from(3u32), p);
        assert!(!three.is_residue().unwrap());
        assert!(matches!(three.sqrt(), Err(Error::NotResidue { .. })));
    }

    #[test]
    fn sqrt_of_p_minus_three_on_p256() {
        // p = 2^256 - 2^224 + 2^192 + 2^96 - 1; the two roots of p - 3 are
        // the exact constants from the reference test corpus.
        let p = p256();
        let value = (&p - BigUint::from(3u32)).mod_floor(&p);
        let fe = FieldElement::new(value, p.clone());
        let a = BigUint::parse_bytes(
            b"9add512515b70d9ec471151c1dec46625cd18b37bde7ca7fb2c8b31d7033599d",
            16,
        )
        .unwrap();
        let b = BigUint::parse_bytes(
            b"6522aed9ea48f2623b8eeae3e213b99da32e74c9421835804d374ce28fcca662",
            16,
        )
        .unwrap();
        assert_eq!(&a + &b, p, "the two roots are complementary mod p");
        let root = fe.sqrt().unwrap();
        assert!(*root.value().unwrap() == a || *root.value().unwrap() == b, "root must be one of the two spec constants");
        let neg_root = root.neg().unwrap();
        assert_ne!(root, neg_root);
        assert_eq!(root.mul(&root).unwrap(), fe);
        assert_eq!(neg_root.mul(&neg_root).unwrap(), fe);
    }

    #[test]
    fn miller_rabin_matches_spec_vectors() {
        assert!(FieldElement::miller_rabin(&BigUint::from(2u32)));
        assert!(FieldElement::miller_rabin(&BigUint::from(3u32)));
        assert!(FieldElement::miller_rabin(&BigUint::from(5u32)));
        assert!(!FieldElement::miller_rabin(&BigUint::from(8u32)));

        assert!(FieldElement::miller_rabin(&p256()));
        let composite = &p256() + BigUint::one();
        assert!(!FieldElement::miller_rabin(&composite));

        let prime = BigUint::parse_bytes(b"e807561107ccf8fa82af74fd492543a918ca2e9c13750233a9", 16).unwrap();
        let composite = BigUint::parse_bytes(b"6f6889deb08da211927370810f026eb4c17b17755f72ea005", 16).unwrap();
        assert!(FieldElement::miller_rabin(&prime));
        assert!(!FieldElement::miller_rabin(&composite));
    }

    #[test]
    fn pow_negative_exponent_uses_inverse() {
        let p = BigUint::from(101u32);
        let a = FieldElement::new(BigUint::from(5u32), p.clone());
        let inv = a.inverse().unwrap();
        assert_eq!(a.pow(-1).unwrap(), inv);
    }

    #[test]
    fn byte_encoding_round_trips() {
        let p = BigUint::from(65537u32);
        let a = FieldElement::new(BigUint::from(12345u32), p.clone());
        let bytes = a.to_bytes(4).unwrap();
        assert_eq!(bytes.len(), 4);
        let back = FieldElement::from_bytes(&bytes, p);
        assert_eq!(a, back);
    }
}
