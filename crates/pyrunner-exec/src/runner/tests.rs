use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pyrunner_core::config::{InterpreterConfig, RunnerConfig};

use super::*;
use crate::gate::MinimumVersionGate;
use crate::locator::{MemoryKey, MemoryStore, RootScope};

#[test]
fn test_run_mode_parsing() {
    assert_eq!("block".parse::<RunMode>().unwrap(), RunMode::BlockUntilExit);
    assert_eq!(
        "BlockUntilExit".parse::<RunMode>().unwrap(),
        RunMode::BlockUntilExit
    );
    assert_eq!("stream".parse::<RunMode>().unwrap(), RunMode::StreamEvents);
    assert_eq!(
        "stream-events".parse::<RunMode>().unwrap(),
        RunMode::StreamEvents
    );
    assert!(matches!(
        "fire-and-forget".parse::<RunMode>(),
        Err(Error::UnknownRunMode(ref m)) if m == "fire-and-forget"
    ));
}

#[test]
fn test_configuration_from_runner_config() {
    let cfg = RunnerConfig {
        run_mode: "stream".to_string(),
        timeout_secs: Some(30),
        workdir: Some(PathBuf::from("/srv/jobs")),
    };
    let config = RunConfiguration::from_config(&cfg).unwrap();
    assert_eq!(config.mode, RunMode::StreamEvents);
    assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.working_dir.as_deref(), Some(Path::new("/srv/jobs")));

    let bad = RunnerConfig {
        run_mode: "later".to_string(),
        timeout_secs: None,
        workdir: None,
    };
    assert!(matches!(
        RunConfiguration::from_config(&bad),
        Err(Error::UnknownRunMode(_))
    ));
}

#[test]
fn test_pip_command_lines() {
    assert_eq!(PIP_UPGRADE_COMMAND, "-m pip install --upgrade pip");
    assert_eq!(ENSUREPIP_COMMAND, "-m ensurepip --upgrade");
    assert_eq!(
        pip_install_command(Path::new("/srv/app/requirements.txt")),
        "-m pip install -r \"/srv/app/requirements.txt\""
    );
}

#[test]
fn test_discover_stops_at_gate() {
    let tmp = tempfile::tempdir().unwrap();
    let exe = tmp.path().join(crate::installation::PYTHON_EXECUTABLE);
    std::fs::write(&exe, b"").unwrap();
    let install_path = MemoryKey::new().with_child(
        "InstallPath",
        MemoryKey::new().with_value("ExecutablePath", exe.to_string_lossy()),
    );
    let software = MemoryKey::new().with_child(
        "SOFTWARE",
        MemoryKey::new().with_child(
            "Python",
            MemoryKey::new().with_child("PythonCore", MemoryKey::new().with_child("3.11", install_path)),
        ),
    );
    let store = MemoryStore::new().with_root(RootScope::CurrentUser, software);
    let locator = InterpreterLocator::new(store);
    let interpreter = InterpreterConfig {
        python: None,
        path_fallback: false,
    };

    let stale = MinimumVersionGate::new("999.0");
    let err = ProcessRunner::discover(&stale, &locator, &interpreter, RunConfiguration::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::OutOfDate { .. }));

    let runner = ProcessRunner::discover(
        &crate::gate::AlwaysCurrent,
        &locator,
        &interpreter,
        RunConfiguration::default(),
    )
    .unwrap();
    assert_eq!(runner.installation().executable_path(), exe.as_path());
}

#[cfg(unix)]
fn sh_runner(config: RunConfiguration) -> ProcessRunner {
    let installation = InterpreterInstallation::new("/bin/sh").unwrap();
    let config = match config.working_dir {
        Some(_) => config,
        None => config.with_working_dir(std::env::temp_dir()),
    };
    ProcessRunner::new(installation, config)
}

#[cfg(unix)]
#[test]
fn test_block_mode_drops_blank_lines() {
    let runner = sh_runner(RunConfiguration::new(RunMode::BlockUntilExit));
    let result = runner.run(r#"-c "printf 'a\n\nb\n'""#).unwrap();
    assert_eq!(result.output_lines, vec!["a", "b"]);
    assert!(result.error_lines.is_empty());
    assert!(result.succeeded);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(runner.output_lines(), vec!["a", "b"]);
}

#[cfg(unix)]
#[test]
fn test_stderr_output_fails_despite_zero_exit() {
    let runner = sh_runner(RunConfiguration::default());
    let result = runner.run(r#"-c "echo oops 1>&2; exit 0""#).unwrap();
    assert_eq!(result.error_lines, vec!["oops"]);
    assert_eq!(result.exit_code, Some(0));
    assert!(!result.succeeded);
}

#[cfg(unix)]
#[test]
fn test_nonzero_exit_without_stderr_succeeds() {
    let runner = sh_runner(RunConfiguration::default());
    let result = runner.run(r#"-c "echo done; exit 3""#).unwrap();
    assert_eq!(result.exit_code, Some(3));
    assert!(result.succeeded);
}

#[cfg(unix)]
#[test]
fn test_logs_reset_between_runs() {
    let runner = sh_runner(RunConfiguration::default());
    runner.run(r#"-c "echo first""#).unwrap();
    let second = runner.run(r#"-c "echo second""#).unwrap();
    assert_eq!(second.output_lines, vec!["second"]);
    assert_eq!(runner.output_lines(), vec!["second"]);
}

#[cfg(unix)]
#[test]
fn test_run_script_passes_quoted_arguments() {
    let tmp = tempfile::tempdir().unwrap();
    let script = tmp.path().join("args.sh");
    std::fs::write(&script, "for a in \"$@\"; do echo \"[$a]\"; done\n").unwrap();
    let runner = sh_runner(RunConfiguration::default().with_working_dir(tmp.path()));

    let result = runner.run_script("args.sh", &["x y", "z"]).unwrap();
    assert_eq!(result.output_lines, vec!["[x y]", "[z]"]);
}

#[cfg(unix)]
#[test]
fn test_working_directory_is_applied() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = sh_runner(RunConfiguration::default().with_working_dir(tmp.path()));
    let result = runner.run(r#"-c "pwd -P""#).unwrap();
    assert_eq!(
        Path::new(&result.output_lines[0]),
        tmp.path().canonicalize().unwrap()
    );
}

#[cfg(unix)]
#[test]
fn test_stream_mode_delivers_lines_before_exit() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let lines = Arc::clone(&events);
    let exits = Arc::clone(&events);
    let observer = CallbackObserver::new()
        .on_output(move |line| lines.lock().unwrap().push(format!("out:{line}")))
        .on_exit(move |result| {
            exits
                .lock()
                .unwrap()
                .push(format!("exit:{}", result.output_lines.len()))
        });
    let runner = sh_runner(RunConfiguration::new(RunMode::StreamEvents).with_observer(observer));

    let handle = runner
        .start(r#"-c "for i in 1 2 3; do echo line$i; done""#)
        .unwrap();
    let result = handle.wait().unwrap();

    assert_eq!(result.output_lines, vec!["line1", "line2", "line3"]);
    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec!["out:line1", "out:line2", "out:line3", "exit:3"]
    );
}

#[cfg(unix)]
#[test]
fn test_stream_mode_channel_and_multiple_observers() {
    let (tx, rx) = mpsc::channel();
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let config = RunConfiguration::new(RunMode::StreamEvents)
        .with_observer(tx)
        .with_observer(CallbackObserver::new().on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
    let runner = sh_runner(config);

    runner.run(r#"-c "echo ok; echo bad 1>&2""#).unwrap();

    let events: Vec<RunEvent> = rx.try_iter().collect();
    assert!(events.contains(&RunEvent::OutputLine("ok".to_string())));
    assert!(events.contains(&RunEvent::ErrorLine("bad".to_string())));
    match events.last() {
        Some(RunEvent::Exited(result)) => assert!(!result.succeeded),
        other => panic!("expected exit event last, got {other:?}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[test]
fn test_block_mode_ignores_observers() {
    let (tx, rx) = mpsc::channel();
    let runner = sh_runner(RunConfiguration::new(RunMode::BlockUntilExit).with_observer(tx));
    runner.run(r#"-c "echo quiet""#).unwrap();
    assert_eq!(rx.try_iter().count(), 0);
}

#[cfg(unix)]
#[test]
fn test_second_start_is_rejected_while_running() {
    let mut runner = sh_runner(RunConfiguration::new(RunMode::StreamEvents));
    let handle = runner.start(r#"-c "sleep 1""#).unwrap();

    assert!(runner.is_running());
    assert!(matches!(
        runner.start(r#"-c "echo nope""#),
        Err(Error::RunInProgress)
    ));
    assert!(matches!(
        runner.set_mode(RunMode::BlockUntilExit),
        Err(Error::RunInProgress)
    ));

    handle.cancel();
    handle.wait().unwrap();
    assert!(!runner.is_running());
    runner.set_mode(RunMode::BlockUntilExit).unwrap();
    assert!(runner.run(r#"-c "echo again""#).unwrap().succeeded);
}

#[test]
fn test_result_serializes_for_reports() {
    let result = RunResult {
        output_lines: vec!["ok".to_string()],
        error_lines: Vec::new(),
        succeeded: false,
        exit_code: None,
        termination: Some(Termination::TimedOut),
    };
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["output_lines"][0], "ok");
    assert_eq!(value["exit_code"], serde_json::Value::Null);
    assert_eq!(value["termination"], "timed_out");
}

#[cfg(unix)]
#[test]
fn test_cancel_stops_the_child() {
    let runner = sh_runner(RunConfiguration::new(RunMode::StreamEvents));
    let handle = runner.start(r#"-c "sleep 5""#).unwrap();
    handle.cancel_token().cancel();
    let result = handle.wait().unwrap();
    assert_eq!(result.termination, Some(Termination::Cancelled));
    assert!(!result.succeeded);
}

#[cfg(unix)]
#[test]
fn test_timeout_kills_block_mode_run() {
    let runner = sh_runner(RunConfiguration::default().with_timeout(Duration::from_millis(200)));
    let started = std::time::Instant::now();
    let result = runner.run(r#"-c "sleep 5""#).unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(result.termination, Some(Termination::TimedOut));
    assert!(!result.succeeded);
}

#[cfg(unix)]
#[test]
fn test_timeout_kills_processes_started_by_the_interpreter() {
    // `sleep` runs as a separate process that inherits both pipes.
    let runner = sh_runner(RunConfiguration::default().with_timeout(Duration::from_millis(200)));
    let started = std::time::Instant::now();
    let result = runner.run(r#"-c "sleep 4; echo late""#).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(result.termination, Some(Termination::TimedOut));
    assert!(!result.output_lines.iter().any(|l| l == "late"));
}

#[cfg(unix)]
#[test]
fn test_cancel_kills_processes_started_by_the_interpreter() {
    let runner = sh_runner(RunConfiguration::new(RunMode::StreamEvents));
    let handle = runner.start(r#"-c "echo started; sleep 4; echo late""#).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    let started = std::time::Instant::now();
    handle.cancel();
    let result = handle.wait().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(result.termination, Some(Termination::Cancelled));
    assert_eq!(result.output_lines, vec!["started"]);
    assert!(!runner.is_running());
}

#[cfg(unix)]
#[test]
fn test_large_output_on_both_streams_is_fully_captured() {
    let runner = sh_runner(RunConfiguration::new(RunMode::BlockUntilExit));
    let result = runner
        .run(r#"-c "i=0; while [ $i -lt 20000 ]; do echo out$i; echo err$i 1>&2; i=$((i+1)); done""#)
        .unwrap();
    assert_eq!(result.output_lines.len(), 20000);
    assert_eq!(result.error_lines.len(), 20000);
    assert_eq!(result.output_lines[0], "out0");
    assert_eq!(result.output_lines[19999], "out19999");
    assert_eq!(result.error_lines[19999], "err19999");
    assert_eq!(result.exit_code, Some(0));
}

#[cfg(unix)]
#[test]
fn test_default_working_directory_is_executable_directory() {
    let installation = InterpreterInstallation::new("/bin/sh").unwrap();
    let runner = ProcessRunner::new(installation, RunConfiguration::default());
    let result = runner.run(r#"-c "pwd -P""#).unwrap();
    let exe = std::env::current_exe().unwrap();
    let expected = exe.parent().unwrap().canonicalize().unwrap();
    assert_eq!(result.output_lines, vec![expected.to_string_lossy().to_string()]);
}

#[cfg(unix)]
#[test]
fn test_abort_reports_failed_run_to_observers() {
    let tmp = tempfile::tempdir().unwrap();
    let state = Arc::new(RunState::default());
    let slot = RunSlot::acquire(&state).unwrap();
    let (tx, rx) = mpsc::channel();
    let supervisor = super::launch::Supervisor::launch(super::launch::LaunchRequest {
        program: Path::new("/bin/sh"),
        command_line: r#"-c "echo partial; sleep 5""#,
        working_dir: tmp.path(),
        observers: vec![Arc::new(tx) as Arc<dyn RunObserver>],
        cancel: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        timeout: None,
        slot,
    })
    .unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let error = supervisor.abort(std::io::Error::other("wait failed"));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(matches!(error, Error::Wait(_)));
    assert!(!state.running.load(Ordering::SeqCst));

    let exited = rx
        .try_iter()
        .find_map(|event| match event {
            RunEvent::Exited(result) => Some(result),
            _ => None,
        })
        .expect("exit event");
    assert!(!exited.succeeded);
    assert_eq!(exited.output_lines, vec!["partial"]);
}

/// Stand-in interpreter that logs its arguments and fails the pip upgrade.
#[cfg(unix)]
fn fake_python(dir: &Path) -> InterpreterInstallation {
    use std::os::unix::fs::PermissionsExt;

    let source = dir.join("python.sh");
    std::fs::write(
        &source,
        "#!/bin/sh\necho \"$*\" >> calls.log\ncase \"$*\" in *--upgrade\\ pip) echo 'no pip' 1>&2 ;; esac\n",
    )
    .unwrap();
    // No write fd of ours may be open when a test forks (ETXTBSY on exec).
    let exe = dir.join("python");
    let copied = std::process::Command::new("cp")
        .arg(&source)
        .arg(&exe)
        .status()
        .unwrap();
    assert!(copied.success());
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
    InterpreterInstallation::new(exe).unwrap()
}

#[cfg(unix)]
#[test]
fn test_update_package_manager_falls_back_to_ensurepip() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new(
        fake_python(tmp.path()),
        RunConfiguration::default().with_working_dir(tmp.path()),
    );

    assert!(runner.update_package_manager().unwrap());
    let calls = std::fs::read_to_string(tmp.path().join("calls.log")).unwrap();
    assert_eq!(
        calls.lines().collect::<Vec<_>>(),
        vec!["-m pip install --upgrade pip", "-m ensurepip --upgrade"]
    );
}

#[cfg(unix)]
#[test]
fn test_install_packages_quotes_manifest_path() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new(
        fake_python(tmp.path()),
        RunConfiguration::default().with_working_dir(tmp.path()),
    );
    let manifest = tmp.path().join("my reqs.txt");

    assert!(runner.install_packages(&manifest).unwrap());
    let calls = std::fs::read_to_string(tmp.path().join("calls.log")).unwrap();
    assert_eq!(
        calls.trim_end(),
        format!("-m pip install -r {}", manifest.display())
    );
}

#[cfg(unix)]
#[test]
fn test_spawn_failure_releases_runner() {
    let tmp = tempfile::tempdir().unwrap();
    let installation = InterpreterInstallation::new("/bin/sh").unwrap();
    let missing = tmp.path().join("gone");
    let runner = ProcessRunner::new(
        installation,
        RunConfiguration::default().with_working_dir(&missing),
    );
    assert!(matches!(runner.run("-c true"), Err(Error::Spawn { .. })));
    assert!(!runner.is_running());
}
