#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use apiforge::ApiforgeError;
use apiforge::config::RunnerSettings;
use apiforge::runner::{LoadSettings, RunMode, RunnerState, SampleCollector, TestRunner};
use apiforge::scenario::{RequestSpec, Scenario};

/// 用 sh 模拟 worker：参数为 `--report-file <report> <program>`
const FAILING_WORKER: &str = r#"
report="$2"
echo '{"test_case": "test_00000_http_x_ping", "test_suite": "TestRequests", "status": "PASSED", "start_time": 1700000000.0, "duration": 0.01}' >> "$report"
echo "starting"
echo "boom" >&2
exit 2
"#;

/// 忽略 SIGTERM，只能被强制结束
const STUBBORN_WORKER: &str = "trap '' TERM\nexec sleep 30\n";

const PASSING_WORKER: &str = r#"
report="$2"
test -f "$3" || exit 9
echo '{"test_case": "test_00000_http_x_ping", "status": "PASSED", "start_time": 1700000000.0, "duration": 0.01}' >> "$report"
echo '{"test_case": "test_00001_http_x_pong", "status": "FAILED", "start_time": 1700000001.0, "duration": 0.02, "error_msg": "AssertionError"}' >> "$report"
"#;

fn settings(dir: &Path, worker: &str) -> RunnerSettings {
    let script = dir.join("worker.sh");
    fs::write(&script, worker).unwrap();

    RunnerSettings {
        interpreter: "sh".into(),
        worker_script: script,
        artifacts_dir: dir.join("artifacts"),
        poll_interval: Duration::from_millis(10),
        functional: true,
        grace_period: Duration::from_millis(500),
    }
}

fn scenario() -> Scenario {
    Scenario::with_requests(vec![
        RequestSpec::new("GET", "http://x/ping").into(),
        RequestSpec::new("GET", "http://x/pong").into(),
    ])
}

fn wait_finished(runner: &mut TestRunner) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if runner.poll().unwrap() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_worker_failure_surfaces_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let mut collector = SampleCollector::new(RunMode::Functional);
    let mut runner = TestRunner::new("api", scenario(), settings(dir.path(), FAILING_WORKER))
        .with_required_tools(vec![]);

    runner.prepare(Some(&mut collector)).unwrap();
    runner.start().unwrap();
    assert!(wait_finished(&mut runner));
    assert_eq!(runner.state(), RunnerState::Failed);

    let failure = runner.failure().unwrap();
    match failure {
        ApiforgeError::ToolFailed { code, stderr, .. } => {
            assert_eq!(*code, 2);
            assert_eq!(stderr, "boom");
        }
        other => panic!("unexpected failure: {:?}", other),
    }
    assert!(failure.to_string().contains("exit code 2"));
    assert!(failure.to_string().contains("boom"));

    // 失败后仍然可以汇总已写出的记录
    let samples = collector.collect().unwrap();
    assert_eq!(samples.len(), 1);
    assert!(runner.has_results());

    let stdout = fs::read_to_string(&runner.paths().unwrap().stdout).unwrap();
    assert_eq!(stdout.trim(), "starting");

    runner.shutdown();
    assert_eq!(runner.state(), RunnerState::ShutDown);
}

#[test]
fn test_worker_success_streams_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut collector = SampleCollector::new(RunMode::Functional);
    let mut runner = TestRunner::new("api", scenario(), settings(dir.path(), PASSING_WORKER))
        .with_required_tools(vec![]);

    runner.prepare(Some(&mut collector)).unwrap();
    let program = runner.invocation().unwrap().program.clone();
    let source = fs::read_to_string(&program).unwrap();
    assert!(source.contains("def test_00000_http_x_ping(self):"));
    assert!(source.contains("def test_00001_http_x_pong(self):"));

    runner.start().unwrap();
    assert!(wait_finished(&mut runner));
    assert_eq!(runner.state(), RunnerState::Succeeded);
    assert!(runner.failure().is_none());

    let samples = collector.collect().unwrap();
    let labels: Vec<&str> = samples.iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["test_00000_http_x_ping", "test_00001_http_x_pong"]);
    assert_eq!(collector.summary().passed, 1);
    assert_eq!(collector.summary().failed, 1);
}

#[test]
fn test_shutdown_terminates_running_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = TestRunner::new(
        "slow",
        scenario(),
        settings(dir.path(), "sleep 30\n"),
    )
    .with_required_tools(vec![]);

    runner.prepare(None).unwrap();
    runner.start().unwrap();
    assert!(!runner.poll().unwrap());

    let started = Instant::now();
    runner.shutdown();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(runner.state(), RunnerState::ShutDown);
    assert!(!runner.has_results());

    runner.shutdown();
    assert_eq!(runner.state(), RunnerState::ShutDown);
}

#[test]
fn test_timeout_does_not_block_on_stubborn_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path(), STUBBORN_WORKER);
    settings.grace_period = Duration::from_secs(3);
    let mut runner = TestRunner::new("stubborn", scenario(), settings)
        .with_required_tools(vec![])
        .with_load(LoadSettings {
            max_duration: Some(Duration::from_millis(100)),
            ..LoadSettings::default()
        });

    runner.prepare(None).unwrap();
    runner.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let err = loop {
        let polled = Instant::now();
        match runner.poll() {
            Ok(finished) => {
                assert!(!finished, "worker exited on its own");
                assert!(Instant::now() < deadline, "timeout never fired");
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                // 超时检查只发出信号，不等待宽限期
                assert!(polled.elapsed() < Duration::from_secs(1));
                break e;
            }
        }
    };
    assert!(matches!(err, ApiforgeError::Timeout(d) if d == Duration::from_millis(100)));
    assert_eq!(runner.state(), RunnerState::ShutDown);

    // 强制结束发生在 shutdown 中
    let started = Instant::now();
    runner.shutdown();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(runner.state(), RunnerState::ShutDown);
}
