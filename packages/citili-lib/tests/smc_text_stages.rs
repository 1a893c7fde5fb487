//! Runs in its own test binary: `PATH` is changed for the whole process.

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use citili_lib::{
    formula::{EXISTS_PATH, FINALLY, Formula, FormulaCategory, Operator},
    net::{Model, NetVariant},
    oracle::{FilterSubject, filter, smc::SmcOracle},
};

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("citili_stages_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn which(program: &str) -> PathBuf {
    let path = std::env::var_os("PATH").unwrap();
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .unwrap()
}

fn executable(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn fireable(transition: &str) -> Formula {
    let atom = Formula::new(
        Operator::is_fireable(),
        vec![Formula::leaf(Operator::literal(transition))],
    );
    Formula::new(
        Operator::new(EXISTS_PATH, 1, 1, false),
        vec![Formula::new(Operator::new(FINALLY, 1, 1, false), vec![atom])],
    )
}

#[test]
fn failing_cut_keeps_its_output() {
    let dir = test_dir("cut");
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).unwrap();

    // a `cut` that does its job and then exits with 1
    let real_cut = which("cut");
    executable(
        &bin.join("cut"),
        &format!("#!/bin/sh\n\"{}\" \"$@\"\nexit 1\n", real_cut.display()),
    );
    let path = std::env::var_os("PATH").unwrap();
    let path = std::env::join_paths(
        std::iter::once(bin.clone()).chain(std::env::split_paths(&path)),
    )
    .unwrap();
    // SAFETY: this binary has a single test, no other thread reads the environment
    unsafe { std::env::set_var("PATH", path) };

    let script = dir.join("fake_smc.sh");
    std::fs::write(
        &script,
        "echo \"FORMULA M-PT-1-CTLFireability-00 TRUE TECHNIQUES\"\n\
         echo \"FORMULA M-PT-1-CTLFireability-01 ? TECHNIQUES\"\n",
    )
    .unwrap();

    let model = Model::new("M", "1", NetVariant::PlaceTransition, dir.join("M-PT-1"))
        .with_identifiers(vec!["P.0".to_string()], vec!["T.0".to_string()]);
    let oracle = SmcOracle::new("sh", &script, &dir, 100);
    let batch = vec![fireable("T.0"); 2];

    let kept = filter(
        &oracle,
        &FilterSubject::Direct(&model),
        FormulaCategory::CTLFireability,
        &batch,
        2,
    );
    assert_eq!(kept, vec![1]);
}
