//! CLI integration tests for Kiln.
//!
//! These tests drive the `kiln` binary against small projects written to
//! temporary directories. Tests that compile real code need a host `cc`.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the kiln binary command.
fn kiln() -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env_remove("KILN_TIMEOUT");
    cmd
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A host-buildable project: app `apps/hello` using `libs/greet`, which
/// needs the `console` API provided by the BSP.
fn sample_project(bsp_apis: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write(root, "project.toml", "[project]\nname = \"sample\"\n");

    write(
        root,
        "apps/hello/pkg.toml",
        "[package]\nname = \"apps/hello\"\ntype = \"app\"\n\n[build]\ndeps = [\"libs/greet\"]\n",
    );
    write(
        root,
        "apps/hello/src/main.c",
        "#include \"greet.h\"\n\nint main(void)\n{\n    return greet() == 42 ? 0 : 1;\n}\n",
    );

    write(
        root,
        "libs/greet/pkg.toml",
        "[package]\nname = \"libs/greet\"\n\n[build]\nreq_apis = [\"console\"]\n",
    );
    write(root, "libs/greet/include/greet.h", "int greet(void);\n");
    write(
        root,
        "libs/greet/src/greet.c",
        "#include \"greet.h\"\n\nint greet(void)\n{\n    return 42;\n}\n",
    );
    write(
        root,
        "libs/greet/src/test/test_greet.c",
        "#include \"greet.h\"\n\n#ifdef KILN_SELFTEST\nint main(void)\n{\n    return greet() == 42 ? 0 : 1;\n}\n#endif\n",
    );

    write(
        root,
        "hw/bsp/host/pkg.toml",
        &format!(
            "[package]\nname = \"hw/bsp/host\"\ntype = \"bsp\"\n\n[bsp]\narch = \"host\"\ncompiler = \"compiler/host\"\n\n[build]\napis = [{}]\n",
            bsp_apis
        ),
    );
    write(root, "hw/bsp/host/src/console.c", "int console_ready = 1;\n");

    write(
        root,
        "compiler/host/pkg.toml",
        "[package]\nname = \"compiler/host\"\ntype = \"compiler\"\n\n[compiler]\ncc = \"cc\"\ncflags = [\"-Wall\"]\n",
    );

    write(
        root,
        "targets/hello/pkg.toml",
        "[package]\nname = \"targets/hello\"\ntype = \"target\"\n\n[target]\napp = \"apps/hello\"\nbsp = \"hw/bsp/host\"\n",
    );
    write(
        root,
        "targets/unittest/pkg.toml",
        "[package]\nname = \"targets/unittest\"\ntype = \"target\"\n\n[target]\nbsp = \"hw/bsp/host\"\n",
    );

    tmp
}

fn have_cc() -> bool {
    cfg!(target_os = "linux") && which::which("cc").is_ok()
}

// ============================================================================
// kiln build
// ============================================================================

#[test]
fn test_build_fails_without_project() {
    let tmp = TempDir::new().unwrap();

    kiln()
        .args(["build", "hello"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find `project.toml`"));
}

#[test]
fn test_build_requires_target_argument() {
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["build"])
        .current_dir(tmp.path())
        .assert()
        .failure();
}

#[test]
fn test_build_unknown_target() {
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["build", "nope"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("target `nope` not found"));
}

#[test]
fn test_build_reports_unsatisfied_api() {
    let tmp = sample_project("");

    kiln()
        .args(["build", "hello"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsatisfied API requirements"))
        .stderr(predicate::str::contains("`libs/greet` requires API \"console\""));
}

#[test]
fn test_quiet_build_still_warns_on_api_conflict() {
    let tmp = sample_project("\"console\"");
    write(
        tmp.path(),
        "apps/hello/pkg.toml",
        "[package]\nname = \"apps/hello\"\ntype = \"app\"\n\n[build]\ndeps = [\"libs/greet\", \"libs/uart\"]\n",
    );
    write(
        tmp.path(),
        "libs/uart/pkg.toml",
        "[package]\nname = \"libs/uart\"\n\n[build]\napis = [\"console\"]\n",
    );

    kiln()
        .args(["build", "hello", "--quiet"])
        .current_dir(tmp.path())
        .assert()
        .stderr(predicate::str::contains(
            "API conflict: console (hw/bsp/host <-> libs/uart)",
        ));
}

#[test]
fn test_build_links_application() {
    if !have_cc() {
        eprintln!("skipping: no host cc");
        return;
    }
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["build", "hello"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Finished"));

    let bin = tmp.path().join("bin/hello");
    assert!(bin.join("apps/hello/hello.elf").is_file());
    assert!(bin.join("libs/greet/greet.a").is_file());
    assert!(bin.join("hw/bsp/host/host.a").is_file());

    let manifest = fs::read_to_string(bin.join("manifest.json")).unwrap();
    assert!(manifest.contains("\"console\": \"hw/bsp/host\""));

    Command::new(bin.join("apps/hello/hello.elf"))
        .assert()
        .success();
}

#[test]
fn test_silent_build_prints_nothing() {
    if !have_cc() {
        eprintln!("skipping: no host cc");
        return;
    }
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["build", "hello", "--silent"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// kiln test
// ============================================================================

#[test]
fn test_test_runs_selftest() {
    if !have_cc() {
        eprintln!("skipping: no host cc");
        return;
    }
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["test", "all"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Passed"));

    assert!(tmp
        .path()
        .join("bin/unittest/libs/greet/test_greet")
        .is_file());
}

#[test]
fn test_test_reports_failure() {
    if !have_cc() {
        eprintln!("skipping: no host cc");
        return;
    }
    let tmp = sample_project("\"console\"");
    write(
        tmp.path(),
        "libs/greet/src/test/test_greet.c",
        "#include <stdio.h>\n\nint main(void)\n{\n    printf(\"greet broken\\n\");\n    return 3;\n}\n",
    );

    kiln()
        .args(["test", "libs/greet"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Test failure (libs/greet)"))
        .stderr(predicate::str::contains("greet broken"));
}

#[test]
fn test_test_unknown_package() {
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["test", "libs/nope"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("package `libs/nope` not found"));
}

// ============================================================================
// kiln clean
// ============================================================================

#[test]
fn test_clean_target_and_all() {
    let tmp = sample_project("\"console\"");
    write(tmp.path(), "bin/hello/libs/greet/greet.a", "");
    write(tmp.path(), "bin/unittest/libs/greet/greet.a", "");

    kiln()
        .args(["clean", "hello"])
        .current_dir(tmp.path())
        .assert()
        .success();
    assert!(!tmp.path().join("bin/hello").exists());
    assert!(tmp.path().join("bin/unittest").exists());

    kiln()
        .args(["clean", "all"])
        .current_dir(tmp.path())
        .assert()
        .success();
    assert!(!tmp.path().join("bin").exists());
}

#[test]
fn test_conflicting_verbosity_flags() {
    let tmp = sample_project("\"console\"");

    kiln()
        .args(["clean", "all", "--verbose", "--quiet"])
        .current_dir(tmp.path())
        .assert()
        .failure();
}
