//! End-to-end runs against real child processes.
//!
//! The "model server" is a shell script; readiness is served by an
//! in-process HTTP server so the timing is under the test's control.

#![cfg(unix)]

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use loadbench_benchmark::{
    BenchmarkRunner, LaunchConfig, LocalLauncher, RunnerConfig, ServerCommand, ServerLauncher, ServerProcess,
};
use loadbench_common::{ProcessResult, RunStatus, TeardownOutcome};
use loadbench_process::LaunchCommand;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

fn runner_config() -> RunnerConfig {
    RunnerConfig {
        probe_host: "127.0.0.1".to_string(),
        poll_interval: Duration::from_millis(100),
        probe_timeout: Duration::from_millis(500),
        graceful_timeout: Duration::from_secs(2),
        force_kill_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// A server command running `script` under `sh`. The rendered model flags
/// land in the script's positional parameters and are ignored.
fn shell(script: &str) -> ServerCommand {
    ServerCommand {
        program: "sh".to_string(),
        base_args: vec!["-c".to_string(), script.to_string(), "model-server".to_string()],
        ..Default::default()
    }
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Serve `/health`: 503 until `ready_after` has passed, then 200.
async fn serve_health(ready_after: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let started = Instant::now();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let io = TokioIo::new(stream);
            tokio::spawn(async move {
                let service = service_fn(move |_req: Request<Incoming>| async move {
                    let status = if started.elapsed() >= ready_after {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, hyper::Error>(
                        Response::builder()
                            .status(status)
                            .body(Full::new(Bytes::from("OK\n")))
                            .unwrap(),
                    )
                });
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    port
}

#[tokio::test]
async fn test_ready_server_is_measured_and_stopped_gracefully() {
    let port = serve_health(Duration::from_millis(500)).await;
    let config = RunnerConfig {
        // The health server already owns the port
        preflight_port_check: false,
        ..runner_config()
    };
    let runner = BenchmarkRunner::new(config, shell("sleep 30"));

    let result = runner
        .run_one(&LaunchConfig::standard("test-model", port), Duration::from_secs(10))
        .await;

    assert_eq!(result.status, RunStatus::Ready, "{:?}", result);
    let elapsed = result.elapsed().unwrap();
    assert!(elapsed >= 0.4 && elapsed < 5.0, "elapsed={}", elapsed);
    assert!(result.polls >= 2);
    assert_eq!(result.teardown, TeardownOutcome::Graceful);
}

#[tokio::test]
async fn test_never_ready_server_times_out() {
    let port = free_port().await;
    let runner = BenchmarkRunner::new(runner_config(), shell("sleep 30"));
    let timeout = Duration::from_secs(1);

    let begin = Instant::now();
    let result = runner.run_one(&LaunchConfig::standard("test-model", port), timeout).await;

    assert_eq!(result.status, RunStatus::TimedOut);
    assert_eq!(result.elapsed(), None);
    assert!(begin.elapsed() >= timeout);
    assert_eq!(result.teardown, TeardownOutcome::Graceful);
}

#[tokio::test]
async fn test_server_ignoring_sigterm_is_force_killed() {
    let port = free_port().await;
    let config = RunnerConfig {
        graceful_timeout: Duration::from_millis(300),
        ..runner_config()
    };
    let runner = BenchmarkRunner::new(config, shell("trap '' TERM; sleep 30"));

    let result = runner
        .run_one(&LaunchConfig::standard("test-model", port), Duration::from_millis(500))
        .await;

    assert_eq!(result.status, RunStatus::TimedOut);
    assert_eq!(result.teardown, TeardownOutcome::Forced);
}

#[tokio::test]
async fn test_missing_binary_is_process_error() {
    let port = free_port().await;
    let server = ServerCommand {
        program: "/nonexistent/loadbench-model-server".to_string(),
        ..Default::default()
    };
    let runner = BenchmarkRunner::new(runner_config(), server);

    let result = runner
        .run_one(&LaunchConfig::standard("test-model", port), Duration::from_secs(5))
        .await;

    assert_eq!(result.status, RunStatus::ProcessError);
    assert_eq!(result.elapsed(), None);
    assert_eq!(result.polls, 0);
    assert_eq!(result.teardown, TeardownOutcome::NotNeeded);
}

#[tokio::test]
async fn test_server_exiting_early_stops_polling() {
    let port = free_port().await;
    let runner = BenchmarkRunner::new(runner_config(), shell("exit 3"));

    let begin = Instant::now();
    let result = runner
        .run_one(&LaunchConfig::standard("test-model", port), Duration::from_secs(30))
        .await;

    assert_eq!(result.status, RunStatus::ProcessError);
    assert!(result.detail.as_deref().unwrap_or("").contains("3"), "{:?}", result.detail);
    assert!(begin.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_busy_port_skips_spawn() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let runner = BenchmarkRunner::new(runner_config(), shell("sleep 30"));

    let result = runner
        .run_one(&LaunchConfig::standard("test-model", port), Duration::from_secs(5))
        .await;

    assert_eq!(result.status, RunStatus::ProcessError);
    assert_eq!(result.detail, Some(format!("Port {} already in use", port)));
    assert_eq!(result.teardown, TeardownOutcome::NotNeeded);
    drop(listener);
}

#[tokio::test]
async fn test_shutdown_stops_server_with_sigterm() {
    let port = free_port().await;
    let marker = std::env::temp_dir().join(format!("loadbench-sigterm-{}-{}", std::process::id(), port));
    let _ = std::fs::remove_file(&marker);
    let script = format!(
        "trap 'touch {}; exit 0' TERM; while true; do sleep 0.05; done",
        marker.display()
    );

    let (tx, rx) = tokio::sync::watch::channel(false);
    let runner = BenchmarkRunner::new(runner_config(), shell(&script)).with_shutdown(rx);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = tx.send(true);
    });

    let begin = Instant::now();
    let result = runner
        .run_one(&LaunchConfig::standard("test-model", port), Duration::from_secs(30))
        .await;

    assert!(begin.elapsed() < Duration::from_secs(10));
    assert_eq!(result.status, RunStatus::TimedOut);
    assert!(result.detail.as_deref().unwrap_or("").contains("Interrupted"), "{:?}", result.detail);
    assert_eq!(result.teardown, TeardownOutcome::Graceful);
    assert!(marker.exists(), "server never saw SIGTERM");
    let _ = std::fs::remove_file(&marker);
}

/// Local launcher that remembers the PID it started.
struct RecordingLauncher {
    inner: LocalLauncher,
    pid: Arc<Mutex<Option<u32>>>,
}

impl ServerLauncher for RecordingLauncher {
    fn launch(&self, command: &LaunchCommand) -> ProcessResult<Box<dyn ServerProcess>> {
        let process = self.inner.launch(command)?;
        *self.pid.lock().unwrap() = process.pid();
        Ok(process)
    }
}

/// Gone or a zombie awaiting reaping.
#[cfg(target_os = "linux")]
fn is_dead(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map_or(false, |rest| rest.trim_start().starts_with('Z')),
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_cancelled_run_kills_server() {
    use loadbench_monitoring::HttpReadinessProbe;

    let port = free_port().await;
    let pid = Arc::new(Mutex::new(None));
    let config = runner_config();
    let launcher = RecordingLauncher {
        inner: LocalLauncher::default(),
        pid: pid.clone(),
    };
    let runner = BenchmarkRunner::with_parts(
        config.clone(),
        shell("exec sleep 30"),
        Box::new(launcher),
        Box::new(HttpReadinessProbe::new(config.probe_timeout)),
    );

    let config = LaunchConfig::standard("test-model", port);
    let run = runner.run_one(&config, Duration::from_secs(30));
    assert!(tokio::time::timeout(Duration::from_millis(500), run).await.is_err());

    let pid = pid.lock().unwrap().expect("server was launched");
    let deadline = Instant::now() + Duration::from_secs(3);
    while !is_dead(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(is_dead(pid), "PID {} survived cancellation", pid);
}
