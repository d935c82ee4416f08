use super::BasisHandle;
use crate::error::{Error, Result};

/// What is known about the product of a basis vector with one generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ChildSlot {
    /// Not computed yet.
    #[default]
    Empty,
    /// The product had a nonzero leading part and was queued for insertion.
    Spanning,
    /// The product had no leading part. It is either zero or a pure relation.
    Relation,
}

/// For one free generator, the table of monomials that are leading monomials of some basis
/// vector, together with the classification of their one-generator extensions.
///
/// Since leading monomials are pairwise distinct, every monomial has at most one divisor and
/// every child slot belongs to exactly one basis vector.
#[derive(Debug, Clone)]
pub struct DivisorTable {
    arrows: usize,
    divisors: Vec<Option<BasisHandle>>,
    children: Vec<ChildSlot>,
}

impl DivisorTable {
    pub fn new(monomials: usize, arrows: usize) -> Self {
        Self {
            arrows,
            divisors: vec![None; monomials],
            children: vec![ChildSlot::Empty; monomials * arrows],
        }
    }

    pub fn divisor(&self, monomial: usize) -> Option<BasisHandle> {
        self.divisors[monomial]
    }

    pub fn set_divisor(&mut self, monomial: usize, handle: BasisHandle) -> Result<()> {
        match self.divisors[monomial] {
            Some(old) => Err(Error::invalid_state(format!(
                "monomial {monomial} is already the leading monomial of basis vector {}",
                old.0
            ))),
            None => {
                self.divisors[monomial] = Some(handle);
                Ok(())
            }
        }
    }

    /// Records the classification of `monomial * arrow`. A slot is only ever written once.
    pub fn set_child(&mut self, monomial: usize, arrow: usize, slot: ChildSlot) -> Result<()> {
        let entry = &mut self.children[monomial * self.arrows + arrow];
        if *entry != ChildSlot::Empty || slot == ChildSlot::Empty {
            return Err(Error::invalid_state(format!(
                "child slot ({monomial}, {arrow}) cannot go from {entry:?} to {slot:?}"
            )));
        }
        *entry = slot;
        Ok(())
    }

    /// The arrows whose product with `monomial` has not been computed.
    pub fn empty_children(&self, monomial: usize) -> impl Iterator<Item = usize> + '_ {
        let start = monomial * self.arrows;
        self.children[start..start + self.arrows]
            .iter()
            .enumerate()
            .filter(|(_, &slot)| slot == ChildSlot::Empty)
            .map(|(g, _)| g)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slots_are_written_once() {
        let mut table = DivisorTable::new(4, 2);
        table.set_divisor(1, BasisHandle(0)).unwrap();
        assert!(table.set_divisor(1, BasisHandle(1)).is_err());
        assert_eq!(table.divisor(1), Some(BasisHandle(0)));
        assert_eq!(table.divisor(2), None);

        assert_eq!(table.empty_children(1).collect::<Vec<_>>(), vec![0, 1]);
        table.set_child(1, 1, ChildSlot::Relation).unwrap();
        assert!(table.set_child(1, 1, ChildSlot::Spanning).is_err());
        assert_eq!(table.children[3], ChildSlot::Relation);
        assert_eq!(table.empty_children(1).collect::<Vec<_>>(), vec![0]);
    }
}
