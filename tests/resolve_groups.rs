use std::convert::TryFrom;
use std::sync::Arc;

use fp::vector::FpVector;
use modres::resolution::Resolution;
use modres::utils::{Config, Heuristics};
use rstest::rstest;

fn heuristics() -> Heuristics {
    Heuristics {
        max_unfruitful: 2,
        overshoot: 3,
    }
}

fn construct(name: &str) -> Resolution {
    let algebra = Config::try_from(name).unwrap().build().unwrap();
    Resolution::trivial_module(Arc::new(algebra), heuristics())
}

#[rstest]
#[case("C2", "1 1 1 1 1 1")]
#[case("C4", "1 1 1 1 1 1")]
#[case("C8", "1 1 1 1 1 1")]
#[case("C3", "1 1 1 1 1 1")]
#[case("C9", "1 1 1 1 1 1")]
#[case("V2", "1 2 3 4 5 6")]
#[case("V2@L", "1 2 3 4 5 6")]
#[case("V2_3", "1 2 3 4 5 6")]
#[case("D8", "1 2 3 4 5 6")]
#[case("C3xC3", "1 2 3 4 5 6")]
fn ranks(#[case] name: &str, #[case] expected: &str) {
    let mut res = construct(name);
    res.compute_through(5).unwrap();
    assert_eq!(res.rank_string(), expected);
}

#[test]
fn rank_three_elementary_abelian() {
    let mut res = construct("V3");
    res.compute_through(3).unwrap();
    assert_eq!(res.ranks(), &[1, 3, 6, 10]);
}

/// `d_{n - 1} d_n = 0`, and every differential lands in the radical, which is what makes the
/// resolution minimal.
#[rstest]
#[case("V2")]
#[case("D8")]
#[case("C3xC3")]
#[case("C4")]
fn differentials_are_minimal_and_compose_to_zero(#[case] name: &str) {
    let mut res = construct(name);
    res.compute_through(4).unwrap();
    let algebra = Arc::clone(res.algebra());
    let n = algebra.dimension();
    let p = algebra.prime();

    for s in 1..=4 {
        let d = res.differential(s).unwrap();
        for output in d.outputs() {
            for block in 0..d.target_rank() {
                assert_eq!(output.entry(block * n), 0, "d_{s} is not minimal");
            }
        }
        if s >= 2 {
            let previous = res.differential(s - 1).unwrap();
            for output in d.outputs() {
                let mut result = FpVector::new(p, previous.target_rank() * n);
                previous.apply(&mut result, 1, output).unwrap();
                assert!(result.is_zero(), "d_{} d_{s} != 0", s - 1);
            }
        }
    }
}

#[rstest]
#[case("V2")]
#[case("D8")]
#[case("C9")]
fn preimages_lift_images(#[case] name: &str) {
    let mut res = construct(name);
    res.compute_through(3).unwrap();
    let algebra = Arc::clone(res.algebra());
    let n = algebra.dimension();
    let p = algebra.prime();

    for s in 1..=2 {
        let d = res.differential(s).unwrap();
        let urbild = res.urbild_basis(s).unwrap();
        assert_eq!(Some(urbild.dimension()), res.image_dimension(s));
        for input in 0..d.source_rank() * n {
            let mut y = FpVector::new(p, d.target_rank() * n);
            d.apply_to_basis_element(&mut y, 1, input).unwrap();
            let x = urbild.preimage(&y).unwrap().unwrap();
            let mut image = FpVector::new(p, d.target_rank() * n);
            d.apply(&mut image, 1, &x).unwrap();
            assert_eq!(image, y);
        }
    }

    // The unit of P_0 is not hit by d_1.
    let mut unit = FpVector::new(p, n);
    unit.set_entry(0, 1);
    assert_eq!(res.urbild_basis(1).unwrap().preimage(&unit).unwrap(), None);
}

/// The dimension of the image of $d_n$ plus that of $d_{n + 1}$ is the dimension of $P_n$.
#[test]
fn rank_nullity() {
    let mut res = construct("D8");
    res.compute_through(5).unwrap();
    let n = res.algebra().dimension();
    for s in 0..4 {
        assert_eq!(
            res.image_dimension(s).unwrap() + res.image_dimension(s + 1).unwrap(),
            res.rank(s).unwrap() * n
        );
    }
}
