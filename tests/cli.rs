use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Project whose scripts run under `sh`, so no JavaScript runtime is needed
fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("kickstart.toml"),
        "[paths]\nmode = \"after-eject\"\n\n[runtime]\nexecutable = \"sh\"\n",
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("scripts")).unwrap();
    dir
}

fn kickstart(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kickstart").unwrap();
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("NODE_ENV")
        .env_remove("BABEL_ENV")
        .env_remove("PUBLIC_URL")
        .env_remove("KICKSTART_RUNTIME")
        .env_remove("KICKSTART_PATHS_MODE")
        .env_remove("CI");
    cmd
}

#[test]
fn unknown_script_is_rejected() {
    let dir = project();
    kickstart(dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown script 'deploy'"));
}

#[test]
fn unknown_flag_is_rejected() {
    let dir = project();
    kickstart(dir.path())
        .args(["build", "--bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown flag '--bogus'"));
}

#[test]
fn logfile_requires_a_real_value() {
    let dir = project();
    kickstart(dir.path())
        .args(["build", "--logfile", "--no-color"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("flag '--logfile' requires a value"));
    assert!(!dir.path().join("--no-color").exists());
}

#[test]
fn missing_script_is_rejected() {
    let dir = project();
    kickstart(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no script given"));
}

#[test]
fn help_lists_scripts() {
    let dir = project();
    kickstart(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build").and(predicate::str::contains("--logfile")));
}

#[test]
fn version_is_printed() {
    let dir = project();
    kickstart(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[cfg(unix)]
#[test]
fn build_runs_script_with_layered_env() {
    let dir = project();
    fs::write(
        dir.path().join("scripts/build.js"),
        "echo \"$NODE_ENV $REACT_APP_LAYER $REACT_APP_SHELL\" > env.txt\n\
         printf '%s' \"$KICKSTART_BUNDLER_OPTIONS\" > options.json\n\
         exit 3\n",
    )
    .unwrap();
    fs::write(dir.path().join(".env"), "REACT_APP_LAYER=base\nREACT_APP_SHELL=file\n").unwrap();
    fs::write(dir.path().join(".env.local"), "REACT_APP_LAYER=local\n").unwrap();
    fs::write(dir.path().join(".env.production"), "REACT_APP_LAYER=production\n").unwrap();

    kickstart(dir.path())
        .arg("build")
        .env("REACT_APP_SHELL", "shell")
        .assert()
        .code(3);

    assert_eq!(
        fs::read_to_string(dir.path().join("env.txt")).unwrap(),
        "production production shell\n"
    );

    let options: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("options.json")).unwrap()).unwrap();
    assert_eq!(options["script"], "build");
    assert_eq!(options["publicUrl"], "/");
    assert_eq!(options["define"]["process.env.REACT_APP_SHELL"], "\"shell\"");
}

#[cfg(unix)]
#[test]
fn passthrough_args_reach_the_script() {
    let dir = project();
    fs::write(
        dir.path().join("scripts/init.js"),
        "printf '%s|' \"$@\" > args.txt\n",
    )
    .unwrap();

    kickstart(dir.path())
        .args(["init", "--verbose", "--", "my-app", "--template", "typescript"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dir.path().join("args.txt")).unwrap(),
        "--verbose|my-app|--template|typescript|"
    );
}
