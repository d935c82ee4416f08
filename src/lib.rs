//! `modres` computes minimal free resolutions of modules over finite dimensional local algebras,
//! most importantly the modular group algebras $\mathbb{F}_p G$ of finite $p$-groups.
//!
//! # Overview
//! The algebra is fixed once and for all by an [`AlgebraContext`](algebra::AlgebraContext): a
//! monomial basis sorted by degree and the right action of every generator on that basis. A free
//! module $A^r$ is then a vector space of dimension $rN$ whose coordinates are grouped in $r$
//! blocks of $N$ monomials.
//!
//! A submodule of a free module is computed by a Buchberger style saturation. A
//! [`Ngs`](ngs::Ngs) keeps a basis of vectors with pairwise distinct leading monomials and
//! multiplies each basis vector by each generator, one degree at a time, reducing the products
//! against the basis. Two flavours sit on top of it:
//!
//!  - a [`FoundationSystem`](fgs::FoundationSystem) computes the span of a set of generators and
//!    extracts a minimal generating set at the end;
//!  - a [`RelativeSystem`](rgs::RelativeSystem) computes the image of a differential, whose
//!    generators are rows $[d(e_j) \mid e_j]$. Products whose image part reduces to zero are
//!    kernel elements, and are fed to a nested foundation system that computes the kernel.
//!
//! The two are interleaved by the [`Scheduler`](scheduler::Scheduler) according to the
//! [`Heuristics`](utils::Heuristics), and the [`Resolution`](resolution::Resolution) chains the
//! steps together, one homological degree at a time.
//!
//! # Saving
//! If a save directory is supplied, every differential and every preimage basis is written to
//! disk as soon as it is computed, and a later run with the same directory resumes from the saved
//! data. See [`save`] for the file format.
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::upper_case_acronyms)]
#![warn(clippy::default_trait_access)]
#![warn(clippy::if_not_else)]
#![warn(clippy::needless_continue)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::explicit_into_iter_loop)]

pub mod algebra;
pub mod error;
pub mod fgs;
pub mod homomorphism;
pub mod ngs;
pub mod resolution;
pub mod rgs;
pub mod save;
pub mod scheduler;
pub mod urbild;
pub mod utils;

pub use error::{Error, Result};
