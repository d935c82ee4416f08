//! This module exports the [`AlgebraContext`], the read-only description of the algebra a
//! resolution is computed over.
//!
//! The algebra is given by a monomial basis $m_0 = 1, m_1, \ldots, m_{N-1}$ sorted by degree, and
//! for each generator ("arrow") $g$ the matrix of right multiplication by $g$ in this basis. For
//! a group algebra $\mathbb{F}_p G$ of a $p$-group, the generators are elements $g_i - 1$ of the
//! augmentation ideal and the degree is the length of a monomial (or its Jennings weight).
//!
//! Every action strictly raises degree. Consequently the term of least index in a vector is the
//! one of lowest degree, and it stays the leading term under right multiplication. The engine in
//! [`crate::ngs`] relies on this throughout.


use fp::matrix::Matrix;
use fp::prime::{factor_pk, ValidPrime};
use fp::vector::FpVector;
use fp::FpError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonomialOrdering {
    #[serde(rename = "R")]
    ReverseLengthLex,
    #[serde(rename = "L")]
    LengthLex,
    #[serde(rename = "J")]
    Jennings,
}

impl MonomialOrdering {
    pub fn code(self) -> char {
        match self {
            Self::ReverseLengthLex => 'R',
            Self::LengthLex => 'L',
            Self::Jennings => 'J',
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReverseLengthLex => "Reverse length lexicographical",
            Self::LengthLex => "Length lexicographical",
            Self::Jennings => "Jennings",
        }
    }
}

/// The JSON shape accepted by [`AlgebraContext::from_json`]. Each action is a list of
/// `[source, target, coefficient]` triples.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AlgebraSpec {
    name: String,
    p: ValidPrime,
    #[serde(default = "default_ordering")]
    ordering: MonomialOrdering,
    degrees: Vec<usize>,
    actions: Vec<Vec<(usize, usize, u32)>>,
    #[serde(default)]
    jennings_weights: Option<Vec<usize>>,
}

fn default_ordering() -> MonomialOrdering {
    MonomialOrdering::ReverseLengthLex
}

#[derive(Debug, Clone)]
pub struct AlgebraContext {
    name: String,
    p: ValidPrime,
    ordering: MonomialOrdering,
    degrees: Vec<usize>,
    max_length: usize,
    actions: Vec<Matrix>,
    /// For every monomial but the unit, a monomial and an arrow whose product is exactly it.
    parents: Vec<Option<(usize, usize)>>,
    jennings_weights: Option<Vec<usize>>,
}

impl AlgebraContext {
    /// Builds an algebra from the degrees of its monomials and the matrices of its generators.
    /// See the module documentation for the conditions checked here.
    pub fn new(
        name: impl Into<String>,
        p: ValidPrime,
        ordering: MonomialOrdering,
        degrees: Vec<usize>,
        actions: Vec<Matrix>,
        jennings_weights: Option<Vec<usize>>,
    ) -> Result<Self> {
        let name = name.into();
        let dim = degrees.len();
        if dim == 0 {
            return Err(Error::invalid_algebra("an algebra needs at least the unit"));
        }
        if degrees[0] != 0 || degrees[1..].contains(&0) {
            return Err(Error::invalid_algebra(
                "monomial 0 must be the unit and the only monomial of degree 0",
            ));
        }
        if let Some((i, _)) = degrees.iter().tuple_windows().find_position(|(a, b)| a > b) {
            return Err(Error::invalid_algebra(format!(
                "degrees decrease between monomials {i} and {}",
                i + 1
            )));
        }
        if ordering == MonomialOrdering::Jennings {
            match &jennings_weights {
                Some(w) if w.len() == actions.len() => (),
                _ => {
                    return Err(Error::invalid_algebra(
                        "Jennings ordering requires one weight per generator",
                    ))
                }
            }
        }

        for (g, action) in actions.iter().enumerate() {
            if action.prime() != p || action.rows() != dim || action.columns() != dim {
                return Err(Error::invalid_algebra(format!(
                    "action of generator {g} is not a {dim} x {dim} matrix over F_{p}"
                )));
            }
            for (m, row) in action.iter().enumerate() {
                if let Some((target, _)) = row.iter_nonzero().find(|&(t, _)| degrees[t] <= degrees[m]) {
                    return Err(Error::invalid_algebra(format!(
                        "generator {g} sends monomial {m} to monomial {target}, which does not raise degree"
                    )));
                }
            }
        }

        let mut parents = vec![None; dim];
        for (m, parent) in parents.iter_mut().enumerate().skip(1) {
            *parent = (0..m)
                .cartesian_product(0..actions.len())
                .find(|&(q, g)| {
                    let row = actions[g].row(q);
                    row.entry(m) == 1 && row.iter_nonzero().count() == 1
                });
            if parent.is_none() {
                return Err(Error::invalid_algebra(format!(
                    "monomial {m} is not a generator times a smaller monomial"
                )));
            }
        }

        let max_length = degrees[dim - 1];

        Ok(Self {
            name,
            p,
            ordering,
            degrees,
            max_length,
            actions,
            parents,
            jennings_weights,
        })
    }

    /// Reads an algebra from its JSON description, for instance
    ///
    /// ```json
    /// {"name": "C4", "p": 2, "ordering": "R", "degrees": [0, 1, 2, 3],
    ///  "actions": [[[0, 1, 1], [1, 2, 1], [2, 3, 1]]]}
    /// ```
    pub fn from_json(json: &Value) -> Result<Self> {
        let spec: AlgebraSpec = serde_json::from_value(json.clone())?;
        let dim = spec.degrees.len();
        let actions = spec
            .actions
            .iter()
            .enumerate()
            .map(|(g, entries)| {
                let mut matrix = Matrix::new(spec.p, dim, dim);
                for &(source, target, c) in entries {
                    if source >= dim || target >= dim {
                        return Err(Error::invalid_algebra(format!(
                            "action of generator {g} mentions monomial {} but there are only {dim}",
                            source.max(target)
                        )));
                    }
                    matrix[source].add_basis_element(target, c);
                }
                Ok(matrix)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(
            spec.name,
            spec.p,
            spec.ordering,
            spec.degrees,
            actions,
            spec.jennings_weights,
        )
    }

    pub fn to_json(&self) -> Value {
        let spec = AlgebraSpec {
            name: self.name.clone(),
            p: self.p,
            ordering: self.ordering,
            degrees: self.degrees.clone(),
            actions: self
                .actions
                .iter()
                .map(|action| {
                    action
                        .iter()
                        .enumerate()
                        .flat_map(|(m, row)| row.iter_nonzero().map(move |(t, c)| (m, t, c)))
                        .collect()
                })
                .collect(),
            jennings_weights: self.jennings_weights.clone(),
        };
        // Serializing plain data into a `Value` cannot fail.
        serde_json::to_value(spec).unwrap_or(Value::Null)
    }

    /// The group algebra of a cyclic group of order `n`, i.e. $\mathbb{F}_p[x]/x^n$ with
    /// $x = g - 1$. For `n` not a power of `p` this is still a valid truncated polynomial algebra.
    pub fn truncated_polynomial(p: ValidPrime, n: usize) -> Result<Self> {
        Self::truncated_commutative(p, &[n], MonomialOrdering::ReverseLengthLex)
    }

    /// $\mathbb{F}_p[x_1, \ldots, x_k]/(x_1^{n_1}, \ldots, x_k^{n_k})$, which is the group algebra
    /// of $C_{n_1} \times \cdots \times C_{n_k}$ when every $n_i$ is a power of $p$.
    pub fn truncated_commutative(
        p: ValidPrime,
        exponents: &[usize],
        ordering: MonomialOrdering,
    ) -> Result<Self> {
        if exponents.is_empty() || exponents.contains(&0) {
            return Err(Error::invalid_algebra("exponents must be positive"));
        }
        if ordering == MonomialOrdering::Jennings {
            return Err(Error::invalid_algebra(
                "Jennings weights cannot be inferred; describe the algebra in JSON instead",
            ));
        }
        let mut monomials: Vec<Vec<usize>> = exponents
            .iter()
            .map(|&n| 0..n)
            .multi_cartesian_product()
            .collect();
        monomials.sort_by(|a, b| {
            let (da, db) = (a.iter().sum::<usize>(), b.iter().sum::<usize>());
            da.cmp(&db).then_with(|| match ordering {
                MonomialOrdering::LengthLex => b.cmp(a),
                _ => a.cmp(b),
            })
        });
        let index = |e: &[usize]| monomials.iter().position(|m| m == e);

        let dim = monomials.len();
        let mut actions = Vec::with_capacity(exponents.len());
        for (i, &n) in exponents.iter().enumerate() {
            let mut matrix = Matrix::new(p, dim, dim);
            for (m, e) in monomials.iter().enumerate() {
                if e[i] + 1 < n {
                    let mut f = e.clone();
                    f[i] += 1;
                    if let Some(t) = index(&f) {
                        matrix[m].set_entry(t, 1);
                    }
                }
            }
            actions.push(matrix);
        }
        let degrees = monomials.iter().map(|e| e.iter().sum()).collect();

        let name = if exponents
            .iter()
            .all(|&n| factor_pk(p, n).1 == 1)
        {
            exponents.iter().map(|n| format!("C{n}")).join("x")
        } else {
            format!(
                "F{p}[{}]/({})",
                (1..=exponents.len()).map(|i| format!("x{i}")).join(","),
                exponents
                    .iter()
                    .enumerate()
                    .map(|(i, n)| format!("x{}^{n}", i + 1))
                    .join(",")
            )
        };
        Self::new(name, p, ordering, degrees, actions, None)
    }

    /// The free associative algebra on `arrows` generators modulo all words longer than
    /// `max_length`.
    pub fn truncated_free(p: ValidPrime, arrows: usize, max_length: usize) -> Result<Self> {
        if arrows == 0 {
            return Err(Error::invalid_algebra("need at least one generator"));
        }
        let mut words: Vec<Vec<usize>> = vec![Vec::new()];
        for len in 1..=max_length {
            words.extend((0..len).map(|_| 0..arrows).multi_cartesian_product());
        }
        let dim = words.len();
        let mut actions = Vec::with_capacity(arrows);
        for g in 0..arrows {
            let mut matrix = Matrix::new(p, dim, dim);
            for (m, w) in words.iter().enumerate() {
                if w.len() < max_length {
                    let mut extended = w.clone();
                    extended.push(g);
                    if let Some(t) = words.iter().position(|x| *x == extended) {
                        matrix[m].set_entry(t, 1);
                    }
                }
            }
            actions.push(matrix);
        }
        let degrees = words.iter().map(Vec::len).collect();
        Self::new(
            format!("Free{arrows}_{max_length}"),
            p,
            MonomialOrdering::LengthLex,
            degrees,
            actions,
            None,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prime(&self) -> ValidPrime {
        self.p
    }

    pub fn ordering(&self) -> MonomialOrdering {
        self.ordering
    }

    /// The number of monomials, usually written $N$.
    pub fn dimension(&self) -> usize {
        self.degrees.len()
    }

    /// The number of generators.
    pub fn arrows(&self) -> usize {
        self.actions.len()
    }

    /// The largest degree of a monomial.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn degree(&self, monomial: usize) -> usize {
        self.degrees[monomial]
    }

    pub fn action(&self, arrow: usize) -> &Matrix {
        &self.actions[arrow]
    }

    /// The arrows whose product, in order, is the monomial.
    pub fn path(&self, monomial: usize) -> Vec<usize> {
        let mut path = Vec::with_capacity(self.degrees[monomial]);
        let mut m = monomial;
        while let Some((q, g)) = self.parents[m] {
            path.push(g);
            m = q;
        }
        path.reverse();
        path
    }

    /// Adds `v * g` to `result`, where `v` is an element of a free module of rank `blocks`.
    pub fn multiply(
        &self,
        v: &FpVector,
        blocks: usize,
        arrow: usize,
        result: &mut FpVector,
    ) -> Result<(), FpError> {
        let n = self.dimension();
        if v.len() != blocks * n {
            return Err(FpError::DimensionMismatch {
                expected: blocks * n,
                found: v.len(),
            });
        }
        if result.len() != v.len() {
            return Err(FpError::DimensionMismatch {
                expected: v.len(),
                found: result.len(),
            });
        }
        let action = &self.actions[arrow];
        for (i, c) in v.iter_nonzero() {
            let (block, m) = (i / n, i % n);
            result.add_offset(action.row(m), c, block * n)?;
        }
        Ok(())
    }

    /// `v * m` for a monomial `m`, computed along the path of `m`.
    pub fn multiply_by_monomial(
        &self,
        v: &FpVector,
        blocks: usize,
        monomial: usize,
    ) -> Result<FpVector, FpError> {
        let mut current = v.clone();
        for g in self.path(monomial) {
            let mut next = FpVector::new(self.p, current.len());
            self.multiply(&current, blocks, g, &mut next)?;
            current = next;
        }
        Ok(current)
    }

    /// A checksum of the algebra, written into save files so that data computed over one algebra
    /// is never loaded for another.
    pub fn magic(&self) -> u32 {
        let mut adler = adler::Adler32::new();
        adler.write_slice(self.name.as_bytes());
        adler.write_slice(&self.p.as_u32().to_le_bytes());
        adler.write_slice(&[self.ordering.code() as u8]);
        for &d in &self.degrees {
            adler.write_slice(&(d as u32).to_le_bytes());
        }
        for action in &self.actions {
            for (m, row) in action.iter().enumerate() {
                for (t, c) in row.iter_nonzero() {
                    adler.write_slice(&(m as u32).to_le_bytes());
                    adler.write_slice(&(t as u32).to_le_bytes());
                    adler.write_slice(&c.to_le_bytes());
                }
            }
        }
        adler.checksum()
    }
}

impl std::fmt::Display for AlgebraContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Algebra name          : {}", self.name)?;
        match factor_pk(self.p, self.dimension()) {
            (k, 1) => writeln!(f, "Order                 : {}^{k}", self.p)?,
            _ => writeln!(f, "Dimension             : {}", self.dimension())?,
        }
        writeln!(f, "Chosen ordering       : {}", self.ordering.description())?;
        writeln!(f, "Number of generators  : {}", self.arrows())?;
        writeln!(f, "Maximal nontip length : {}", self.max_length())?;
        if let Some(weights) = &self.jennings_weights {
            writeln!(
                f,
                "Dimensions of Jennings generators: {}",
                weights.iter().join(", ")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use expect_test::expect;
    use rstest::rstest;

    #[rstest]
    #[case(2, &[2], 2, 1)]
    #[case(2, &[4], 4, 3)]
    #[case(3, &[3], 3, 2)]
    #[case(2, &[2, 2], 4, 2)]
    #[case(2, &[2, 2, 2], 8, 3)]
    fn truncated_dimensions(
        #[case] p: u32,
        #[case] exponents: &[usize],
        #[case] dim: usize,
        #[case] max_length: usize,
    ) {
        let algebra = AlgebraContext::truncated_commutative(
            ValidPrime::new(p),
            exponents,
            MonomialOrdering::ReverseLengthLex,
        )
        .unwrap();
        assert_eq!(algebra.dimension(), dim);
        assert_eq!(algebra.max_length(), max_length);
        let covered = (0..=max_length)
            .filter(|&d| (0..dim).any(|m| algebra.degree(m) == d))
            .count();
        assert_eq!(covered, max_length + 1);
    }

    #[test]
    fn klein_four_group() {
        let algebra = AlgebraContext::truncated_commutative(
            fp::prime::TWO,
            &[2, 2],
            MonomialOrdering::ReverseLengthLex,
        )
        .unwrap();
        expect![[r#"
            Algebra name          : C2xC2
            Order                 : 2^2
            Chosen ordering       : Reverse length lexicographical
            Number of generators  : 2
            Maximal nontip length : 2
        "#]]
        .assert_eq(&algebra.to_string());
        // 1, y, x, xy in reverse length lexicographic order
        assert_eq!((1..3).map(|m| algebra.degree(m)).collect::<Vec<_>>(), [1, 1]);
        assert_eq!(algebra.path(3).len(), 2);

        let p = algebra.prime();
        let unit = FpVector::from_slice(p, &[1, 0, 0, 0]);
        let xy = algebra.multiply_by_monomial(&unit, 1, 3).unwrap();
        assert_eq!(xy, FpVector::from_slice(p, &[0, 0, 0, 1]));
    }

    #[test]
    fn free_algebra() {
        let algebra = AlgebraContext::truncated_free(fp::prime::TWO, 2, 3).unwrap();
        assert_eq!(algebra.dimension(), 15);
        assert_eq!(algebra.max_length(), 3);
        assert_eq!((3..7).map(|m| algebra.degree(m)).collect::<Vec<_>>(), [2; 4]);
        assert_eq!(algebra.degree(7), 3);
        assert_eq!(algebra.path(14).len(), 3);
    }

    #[test]
    fn json_roundtrip() {
        let json: Value = serde_json::from_str(
            r#"{"name": "C4", "p": 2, "degrees": [0, 1, 2, 3],
                "actions": [[[0, 1, 1], [1, 2, 1], [2, 3, 1]]]}"#,
        )
        .unwrap();
        let algebra = AlgebraContext::from_json(&json).unwrap();
        let builtin = AlgebraContext::truncated_polynomial(fp::prime::TWO, 4).unwrap();
        assert_eq!(algebra.magic(), builtin.magic());
        assert_eq!(
            AlgebraContext::from_json(&algebra.to_json()).unwrap().magic(),
            algebra.magic()
        );
    }

    #[rstest]
    #[case(r#"{"name": "x", "p": 4, "degrees": [0], "actions": []}"#)]
    #[case(r#"{"name": "x", "p": 2, "degrees": [0, 0], "actions": []}"#)]
    #[case(r#"{"name": "x", "p": 2, "degrees": [0, 2, 1], "actions": [[[0, 1, 1]], [[0, 2, 1]]]}"#)]
    #[case(r#"{"name": "x", "p": 2, "degrees": [0, 1], "actions": [[[1, 1, 1]]]}"#)]
    #[case(r#"{"name": "x", "p": 2, "degrees": [0, 1, 2], "actions": [[[0, 1, 1]]]}"#)]
    #[case(r#"{"name": "x", "p": 2, "degrees": [0, 1], "actions": [[[0, 5, 1]]]}"#)]
    #[case(r#"{"name": "x", "p": 2, "ordering": "J", "degrees": [0, 1], "actions": [[[0, 1, 1]]]}"#)]
    fn invalid_algebras(#[case] json: &str) {
        let json: Value = serde_json::from_str(json).unwrap();
        assert!(AlgebraContext::from_json(&json).is_err());
    }
}
