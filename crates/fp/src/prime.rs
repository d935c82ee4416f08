use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

use crate::FpError;

pub const TWO: ValidPrime = ValidPrime::new(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimeError {
    NotAnInteger(std::num::ParseIntError),
    InvalidPrime(u32),
}

impl std::fmt::Display for PrimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnInteger(s) => write!(f, "Not an integer: {s}"),
            Self::InvalidPrime(p) => write!(f, "{p} is not a valid prime"),
        }
    }
}

impl std::error::Error for PrimeError {}

pub const fn is_prime(p: u32) -> bool {
    if p < 2 {
        return false;
    }
    let mut k = 2;
    while k * k <= p {
        if p % k == 0 {
            return false;
        }
        k += 1;
    }
    true
}

/// A prime chosen at runtime. All field arithmetic in this crate goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidPrime {
    p: u32,
}

impl ValidPrime {
    pub const fn new(p: u32) -> Self {
        // Products of two residues have to fit in a u64 without reduction.
        assert!(p < (1 << 31), "Tried to construct a prime larger than 2^31");
        assert!(is_prime(p), "Tried to construct a composite dynamic prime");
        Self { p }
    }

    pub const fn as_u32(self) -> u32 {
        self.p
    }

    pub const fn as_usize(self) -> usize {
        self.p as usize
    }

    /// Computes the sum mod p. This takes care of overflow.
    pub fn sum(self, n1: u32, n2: u32) -> u32 {
        ((n1 as u64 + n2 as u64) % self.p as u64) as u32
    }

    /// Computes the product mod p. This takes care of overflow.
    pub fn product(self, n1: u32, n2: u32) -> u32 {
        ((n1 as u64 * n2 as u64) % self.p as u64) as u32
    }

    pub fn negate(self, n: u32) -> u32 {
        let n = n % self.p;
        if n == 0 {
            0
        } else {
            self.p - n
        }
    }

    pub fn pow_mod(self, mut b: u32, mut e: u32) -> u32 {
        let mut result: u32 = 1;
        b %= self.p;
        while e > 0 {
            if (e & 1) == 1 {
                result = self.product(result, b);
            }
            b = self.product(b, b);
            e >>= 1;
        }
        result
    }

    /// The multiplicative inverse of `k`, by Fermat's little theorem.
    pub fn inverse(self, k: u32) -> Result<u32, FpError> {
        if k % self.p == 0 {
            return Err(FpError::NotInvertible {
                value: k,
                p: self.p,
            });
        }
        Ok(self.pow_mod(k, self.p - 2))
    }
}

impl TryFrom<u32> for ValidPrime {
    type Error = PrimeError;

    fn try_from(p: u32) -> Result<Self, PrimeError> {
        if p < (1 << 31) && is_prime(p) {
            Ok(Self { p })
        } else {
            Err(PrimeError::InvalidPrime(p))
        }
    }
}

impl std::str::FromStr for ValidPrime {
    type Err = PrimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let p: u32 = s.parse().map_err(PrimeError::NotAnInteger)?;
        Self::try_from(p)
    }
}

impl From<ValidPrime> for u32 {
    fn from(value: ValidPrime) -> u32 {
        value.p
    }
}

impl std::fmt::Display for ValidPrime {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        <u32 as std::fmt::Display>::fmt(&self.p, f)
    }
}

impl Serialize for ValidPrime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.p.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValidPrime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p: u32 = u32::deserialize(deserializer)?;
        Self::try_from(p).map_err(D::Error::custom)
    }
}

/// Factor $n$ as $p^k m$. Returns $(k, m)$.
pub fn factor_pk(p: ValidPrime, mut n: usize) -> (u32, usize) {
    if n == 0 {
        return (0, 0);
    }
    let mut k = 0;
    while n % p.as_usize() == 0 {
        n /= p.as_usize();
        k += 1;
    }
    (k, n)
}
