use std::convert::TryFrom;
use std::path::Path;
use std::sync::Arc;

use modres::algebra::AlgebraContext;
use modres::resolution::Resolution;
use modres::save::{SaveDirectory, SaveFile, SaveKind};
use modres::utils::{Config, Heuristics, Interrupt};
use modres::Error;

fn heuristics() -> Heuristics {
    Heuristics {
        max_unfruitful: 2,
        overshoot: 3,
    }
}

fn algebra(name: &str) -> Arc<AlgebraContext> {
    Arc::new(Config::try_from(name).unwrap().build().unwrap())
}

fn with_save_dir(algebra: &Arc<AlgebraContext>, save_dir: SaveDirectory) -> Resolution {
    let mut res = Resolution::trivial_module(Arc::clone(algebra), heuristics());
    res.set_save_dir(save_dir).unwrap();
    res
}

fn file_exists(dir: &Path, algebra: &AlgebraContext, kind: SaveKind, degree: usize) -> bool {
    SaveFile {
        kind,
        algebra_magic: algebra.magic(),
        degree,
    }
    .exists(dir.into())
}

fn assert_same(a: &Resolution, b: &Resolution) {
    assert_eq!(a.ranks(), b.ranks());
    for s in 1..=a.max_degree() {
        assert_eq!(
            a.differential(s).unwrap().outputs(),
            b.differential(s).unwrap().outputs()
        );
        assert_eq!(a.image_dimension(s - 1), b.image_dimension(s - 1));
    }
}

#[test]
fn resume_from_save_dir() {
    let tempdir = tempfile::TempDir::new().unwrap();
    let algebra = algebra("D8");

    let mut res1 = with_save_dir(&algebra, SaveDirectory::Combined(tempdir.path().to_owned()));
    res1.compute_through(3).unwrap();
    for s in 1..=3 {
        assert!(file_exists(tempdir.path(), &algebra, SaveKind::Differential, s));
    }
    assert!(file_exists(tempdir.path(), &algebra, SaveKind::UrbildBasis, 2));
    assert!(!file_exists(tempdir.path(), &algebra, SaveKind::UrbildBasis, 3));

    let mut res2 = with_save_dir(&algebra, SaveDirectory::Combined(tempdir.path().to_owned()));
    res2.compute_through(3).unwrap();
    assert_same(&res1, &res2);
    assert_eq!(
        res2.urbild_basis(2).unwrap().rows(),
        res1.urbild_basis(2).unwrap().rows()
    );

    res1.compute_through(5).unwrap();
    res2.compute_through(5).unwrap();
    assert_same(&res1, &res2);

    let mut fresh = Resolution::trivial_module(Arc::clone(&algebra), heuristics());
    fresh.compute_through(5).unwrap();
    assert_same(&res1, &fresh);
}

#[test]
fn split_save_dir() {
    let read = tempfile::TempDir::new().unwrap();
    let write = tempfile::TempDir::new().unwrap();
    let algebra = algebra("V2");

    let mut res1 = with_save_dir(&algebra, SaveDirectory::Combined(read.path().to_owned()));
    res1.compute_through(2).unwrap();

    let mut res2 = with_save_dir(
        &algebra,
        SaveDirectory::Split {
            read: read.path().to_owned(),
            write: write.path().to_owned(),
        },
    );
    res2.compute_through(4).unwrap();
    assert_eq!(res2.rank_string(), "1 2 3 4 5");

    assert!(!file_exists(write.path(), &algebra, SaveKind::Differential, 2));
    assert!(file_exists(write.path(), &algebra, SaveKind::Differential, 3));
    assert!(!file_exists(read.path(), &algebra, SaveKind::Differential, 3));
}

#[test]
fn mismatched_algebra_is_rejected() {
    let tempdir = tempfile::TempDir::new().unwrap();
    let c4 = algebra("C4");
    let mut res = with_save_dir(&c4, SaveDirectory::Combined(tempdir.path().to_owned()));
    res.compute_through(1).unwrap();

    // Same path, different algebra.
    let path = SaveFile {
        kind: SaveKind::Differential,
        algebra_magic: c4.magic(),
        degree: 1,
    }
    .get_save_path(tempdir.path().into());
    let c8 = algebra("C8");
    let target = SaveFile {
        kind: SaveKind::Differential,
        algebra_magic: c8.magic(),
        degree: 1,
    }
    .get_save_path(tempdir.path().into());
    assert_ne!(c4.magic(), c8.magic());
    std::fs::rename(path, target).unwrap();

    // The file is found under the name for C8 but its header names C4.
    let mut res = with_save_dir(&c8, SaveDirectory::Combined(tempdir.path().to_owned()));
    assert!(matches!(res.compute_through(1), Err(Error::Corrupt(_))));
}

#[test]
fn spilling_gives_identical_results() {
    let algebra = algebra("D8");
    let mut plain = Resolution::trivial_module(Arc::clone(&algebra), heuristics());
    plain.compute_through(4).unwrap();

    let mut in_memory = Resolution::trivial_module(Arc::clone(&algebra), heuristics());
    in_memory.spill = true;
    in_memory.compute_through(4).unwrap();
    assert_same(&plain, &in_memory);

    let tempdir = tempfile::TempDir::new().unwrap();
    let mut on_disk = with_save_dir(&algebra, SaveDirectory::Combined(tempdir.path().to_owned()));
    on_disk.spill = true;
    on_disk.compute_through(4).unwrap();
    assert_same(&plain, &on_disk);
    assert!(!tempdir.path().join("scratch/4").exists());
}

#[test]
fn interrupted_resolution_resumes() {
    let algebra = algebra("V2");
    let interrupt = Interrupt::new();
    let mut res = Resolution::trivial_module(Arc::clone(&algebra), heuristics());
    res.set_interrupt(interrupt.clone());
    res.compute_through(2).unwrap();

    interrupt.trigger();
    assert!(matches!(
        res.compute_through(4),
        Err(Error::Interrupted { .. })
    ));
    assert_eq!(res.max_degree(), 2);

    interrupt.reset();
    res.compute_through(4).unwrap();
    assert_eq!(res.rank_string(), "1 2 3 4 5");
}
