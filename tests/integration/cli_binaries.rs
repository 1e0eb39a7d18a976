//! Integration tests for the `isoenv` and `in_env` binaries

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

use crate::integration::{file_list, snapshot, Layers};

fn binary(name: &str, config_home: &Path) -> Command {
    let path = match name {
        "isoenv" => env!("CARGO_BIN_EXE_isoenv"),
        _ => env!("CARGO_BIN_EXE_in_env"),
    };
    let mut command = Command::new(path);
    command
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("ISOENV_LOG")
        .env_remove("ISOENV_LOG_FORMAT");
    command
}

fn sources_args(layers: &Layers) -> Vec<String> {
    let mut args = vec!["--sources".to_string()];
    for source in layers.sources() {
        args.push(source.to_string_lossy().into_owned());
    }
    args
}

fn run(command: &mut Command) -> Output {
    command.output().expect("binary should start")
}

#[test]
fn test_isoenv_compiles_destination() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let dest = layers.dest();

    let output = run(binary("isoenv", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "dev", "--quiet"])
        .arg(&dest));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        file_list(&dest),
        vec!["a.conf", "b.conf", "etc/mapped_files.json"]
    );
}

#[test]
fn test_isoenv_dry_run_twice_leaves_empty_destination_empty() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let dest = layers.dest();
    fs::create_dir_all(&dest).unwrap();

    for _ in 0..2 {
        let output = run(binary("isoenv", config_home.path())
            .args(sources_args(&layers))
            .args(["--environment", "prod", "--dryrun"])
            .arg(&dest));
        assert!(output.status.success());
    }

    assert!(snapshot(&dest).is_empty());
}

#[test]
fn test_isoenv_log_file_records_run_mode() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let log_file = config_home.path().join("logs").join("isoenv.log");

    let output = run(binary("isoenv", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "prod", "-d", "--quiet", "--logging-file"])
        .arg(&log_file)
        .arg(layers.dest()));

    assert!(output.status.success());
    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.contains(" - INFO - dry run - compiling prod from "));
    assert!(log.contains("compile complete"));
}

#[test]
fn test_isoenv_dry_run_logs_mapping_and_overrides() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let log_file = config_home.path().join("isoenv.log");
    let dest = layers.dest();

    let output = run(binary("isoenv", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "dev", "--dryrun", "--quiet", "--logging-file"])
        .arg(&log_file)
        .arg(&dest));

    assert!(output.status.success());
    assert!(!dest.exists());
    let log = fs::read_to_string(&log_file).unwrap();

    let would_copy = [
        (layers.site.join("a.conf"), dest.join("a.conf")),
        (
            layers.base.join("ENVIRONMENT_SPECIFIC/dev/b.conf"),
            dest.join("b.conf"),
        ),
    ];
    for (src, target) in &would_copy {
        let expected = format!("Would copy {} to {}", src.display(), target.display());
        assert!(log.contains(&expected), "missing '{}' in:\n{}", expected, log);
    }

    let override_line = log
        .lines()
        .find(|line| line.contains("has multiple sources"))
        .expect("override warning logged");
    assert!(override_line.contains(" - WARN - dry run - "));
    assert!(override_line.ends_with(&format!(
        "{} has multiple sources, overriding {} with {}",
        dest.join("a.conf").display(),
        layers.base.join("a.conf").display(),
        layers.site.join("a.conf").display()
    )));
}

#[test]
fn test_isoenv_missing_source_fails() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let missing = layers.root.path().join("missing");

    let output = run(binary("isoenv", config_home.path())
        .arg("--sources")
        .arg(&missing)
        .args(["--environment", "prod", "--quiet"])
        .arg(layers.dest()));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Source directory not found"));
    assert!(stderr.contains("check --sources"));
}

#[test]
fn test_isoenv_bad_config_exits_with_config_code() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let config = config_home.path().join("bad.toml");
    fs::write(&config, "[logging]\nlevel = \"chatty\"\n").unwrap();

    let output = run(binary("isoenv", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "prod", "--config"])
        .arg(&config)
        .arg(layers.dest()));

    assert_eq!(output.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn test_in_env_propagates_exit_code() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();

    let output = run(binary("in_env", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "prod", "--quiet", "--", "exit", "4"]));

    assert_eq!(output.status.code(), Some(4));
}

#[cfg(unix)]
#[test]
fn test_in_env_exposes_compiled_dir_and_cleans_up() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let capture = config_home.path().join("captured");
    let command = format!(
        "printf '%s\\n' \"$COMPILED_DIR\" > '{}' && cat a.conf >> '{}'",
        capture.display(),
        capture.display()
    );

    let output = run(binary("in_env", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "dev", "--quiet", "--"])
        .arg(&command));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let captured = fs::read_to_string(&capture).unwrap();
    let mut lines = captured.lines();
    let dir = lines.next().unwrap();
    assert_eq!(lines.next(), Some("site-a"));
    assert!(!Path::new(dir).exists());
}

#[cfg(unix)]
#[test]
fn test_in_env_with_destination_removes_it() {
    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let destination = layers.root.path().join("session");

    let output = run(binary("in_env", config_home.path())
        .args(sources_args(&layers))
        .args(["--environment", "dev", "--quiet", "--destination"])
        .arg(&destination)
        .args(["--", "test", "-f", "b.conf"]));

    assert!(output.status.success());
    assert!(!destination.exists());
}

#[cfg(unix)]
#[test]
fn test_in_env_sigterm_stops_command_and_removes_tree() {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::time::{Duration, Instant};

    let layers = Layers::new();
    let config_home = TempDir::new().unwrap();
    let tmpdir = TempDir::new().unwrap();
    let pid_file = config_home.path().join("child.pid");
    let command = format!("echo $$ > '{}' && exec sleep 30", pid_file.display());

    let mut parent = binary("in_env", config_home.path())
        .env("TMPDIR", tmpdir.path())
        .args(sources_args(&layers))
        .args(["--environment", "dev", "--quiet", "--"])
        .arg(&command)
        .spawn()
        .unwrap();

    let started = Instant::now();
    let child_pid = loop {
        if let Some(pid) = fs::read_to_string(&pid_file)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
        {
            break pid;
        }
        assert!(started.elapsed() < Duration::from_secs(10), "command never started");
        std::thread::sleep(Duration::from_millis(20));
    };

    kill(Pid::from_raw(parent.id() as i32), Signal::SIGTERM).unwrap();
    let status = parent.wait().unwrap();

    assert_eq!(status.code(), Some(128 + 15));
    assert_eq!(kill(Pid::from_raw(child_pid), None::<Signal>), Err(Errno::ESRCH));
    assert!(fs::read_dir(tmpdir.path()).unwrap().next().is_none());
    assert!(started.elapsed() < Duration::from_secs(10));
}
