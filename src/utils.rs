use std::convert::TryFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fp::prime::{factor_pk, is_prime, ValidPrime, TWO};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algebra::{AlgebraContext, MonomialOrdering};
use crate::error::{Error, Result};

const STATIC_ALGEBRAS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/algebras");

/// The two constants steering when kernel work is interleaved with image work. Both are counted
/// in degree steps without progress. There are no defaults: good values depend on the group, and
/// the caller has to pick them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heuristics {
    /// A foundation system with an unfinished dependent pauses after this many unfruitful steps.
    pub max_unfruitful: usize,
    /// A relative system forces kernel work after this many unfruitful image steps.
    pub overshoot: usize,
}

/// A flag checked by the engine before every degree step and every candidate vector. Setting it
/// makes the running computation return [`Error::Interrupted`] at the next check, leaving the
/// generating systems in a state from which the computation can be resumed.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self, degree: usize) -> Result<()> {
        if self.is_triggered() {
            tracing::warn!(degree, "interrupt received");
            return Err(Error::Interrupted { degree });
        }
        Ok(())
    }
}

/// Where the algebra comes from.
#[derive(Clone, Debug)]
pub enum AlgebraSource {
    Json(Value),
    /// The group algebra of the cyclic group of order `n`, a power of `p`.
    Cyclic { p: ValidPrime, n: usize },
    /// The group algebra of $(C_p)^{rank}$.
    Elementary { p: ValidPrime, rank: usize },
    Free { arrows: usize, max_length: usize },
}

/// A config object specifies how the algebra should be constructed.
#[derive(Clone, Debug)]
pub struct Config {
    pub source: AlgebraSource,
    /// Overrides the ordering of the source if set.
    pub ordering: Option<MonomialOrdering>,
}

impl Config {
    pub fn build(&self) -> Result<AlgebraContext> {
        let ordering = self.ordering.unwrap_or(MonomialOrdering::ReverseLengthLex);
        match &self.source {
            AlgebraSource::Json(json) => {
                let mut json = json.clone();
                if let (Some(ordering), Some(obj)) = (self.ordering, json.as_object_mut()) {
                    obj.insert("ordering".into(), serde_json::to_value(ordering)?);
                }
                AlgebraContext::from_json(&json)
            }
            &AlgebraSource::Cyclic { p, n } => {
                AlgebraContext::truncated_commutative(p, &[n], ordering)
            }
            &AlgebraSource::Elementary { p, rank } => {
                AlgebraContext::truncated_commutative(p, &vec![p.as_usize(); rank], ordering)
            }
            &AlgebraSource::Free { arrows, max_length } => match self.ordering {
                None | Some(MonomialOrdering::LengthLex) => {
                    AlgebraContext::truncated_free(TWO, arrows, max_length)
                }
                Some(other) => Err(Error::invalid_algebra(format!(
                    "truncated free algebras only support the length lexicographic ordering, not {other:?}"
                ))),
            },
        }
    }
}

/// Parses the name of an algebra. Accepted are
///  - `C<n>` for the group algebra of a cyclic group of prime power order `n`;
///  - `V<k>` for the elementary abelian 2-group of rank `k`, and `V<k>_<p>` for odd `p`;
///  - `Free<a>_<l>` for the free algebra on `a` generators truncated above length `l`;
///  - anything else is the name of a JSON file, searched in the current directory,
///    `$CWD/algebras` and the `algebras` directory of this crate.
///
/// Any of these may be followed by `@R`, `@L` or `@J` to pick the monomial ordering.
impl TryFrom<&str> for Config {
    type Error = Error;

    fn try_from(spec: &str) -> Result<Self> {
        let (name, ordering) = match spec.split_once('@') {
            Some((name, code)) => (name, Some(parse_ordering(code)?)),
            None => (spec, None),
        };
        let source = if let Some(n) = name.strip_prefix('C').and_then(|x| x.parse().ok()) {
            AlgebraSource::Cyclic {
                p: prime_of_order(n)?,
                n,
            }
        } else if let Some(rest) = name.strip_prefix('V') {
            let (rank, p) = match rest.split_once('_') {
                Some((rank, p)) => (rank, p.parse().ok()),
                None => (rest, Some(TWO)),
            };
            match (rank.parse::<usize>(), p) {
                (Ok(rank), Some(p)) => AlgebraSource::Elementary { p, rank },
                _ => AlgebraSource::Json(load_algebra_json(name)?),
            }
        } else if let Some((arrows, max_length)) = name
            .strip_prefix("Free")
            .and_then(|x| x.split_once('_'))
            .and_then(|(a, l)| Some((a.parse::<usize>().ok()?, l.parse::<usize>().ok()?)))
        {
            AlgebraSource::Free { arrows, max_length }
        } else {
            AlgebraSource::Json(load_algebra_json(name)?)
        };
        Ok(Self { source, ordering })
    }
}

fn parse_ordering(code: &str) -> Result<MonomialOrdering> {
    Ok(match code {
        "R" => MonomialOrdering::ReverseLengthLex,
        "L" => MonomialOrdering::LengthLex,
        "J" => MonomialOrdering::Jennings,
        _ => {
            return Err(Error::invalid_algebra(format!(
                "unknown ordering {code}; expected R, L or J"
            )))
        }
    })
}

fn prime_of_order(n: usize) -> Result<ValidPrime> {
    let p = (2..=n)
        .find(|&d| n % d == 0)
        .ok_or_else(|| Error::invalid_algebra(format!("C{n} is not a p-group")))?;
    let p = u32::try_from(p)
        .ok()
        .filter(|&p| is_prime(p))
        .ok_or_else(|| Error::invalid_algebra(format!("C{n} is not a p-group")))?;
    let p = ValidPrime::new(p);
    if factor_pk(p, n).1 != 1 {
        return Err(Error::invalid_algebra(format!("C{n} is not a p-group")));
    }
    Ok(p)
}

pub fn load_algebra_json(name: &str) -> Result<Value> {
    let current_dir = std::env::current_dir()?;
    let relative_dir = current_dir.join("algebras");

    for path in &[current_dir, relative_dir, PathBuf::from(STATIC_ALGEBRAS_PATH)] {
        let mut path = path.clone();
        path.push(name);
        path.set_extension("json");
        if let Ok(s) = std::fs::read_to_string(&path) {
            tracing::debug!("loading algebra from {}", path.to_string_lossy());
            return Ok(serde_json::from_str(&s)?);
        }
    }
    Err(Error::invalid_algebra(format!(
        "algebra file '{name}' not found on path"
    )))
}
