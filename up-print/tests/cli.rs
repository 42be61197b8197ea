use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

const AUTH_ENV: &[&str] = &[
    "TENANT_ID",
    "CLIENT_ID",
    "CLIENT_SECRET",
    "PRINTER_ID",
    "FILE_PATH",
];

/// The binary with none of the credential variables inherited from the caller.
fn up_print() -> Command {
    let mut cmd = Command::cargo_bin("up-print").expect("Binary exists");
    for var in AUTH_ENV {
        cmd.env_remove(var);
    }
    cmd.current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn print_without_inputs_lists_every_missing_argument() {
    up_print()
        .arg("print")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "Missing required arguments: --tenant-id --client-id --client-secret --printer-id --file",
        ));
}

#[test]
fn device_code_does_not_need_a_client_secret() {
    up_print()
        .args(["print", "--device-code", "--tenant-id", "t", "--client-id", "c"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Missing required arguments: --printer-id --file"))
        .stderr(predicate::str::contains("--client-secret").not());
}

#[test]
fn inputs_are_read_from_the_environment() {
    up_print()
        .arg("print")
        .env("TENANT_ID", "t")
        .env("CLIENT_ID", "c")
        .env("CLIENT_SECRET", "s")
        .env("PRINTER_ID", "p1")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Missing required arguments: --file"));
}

#[test]
fn missing_file_exits_with_code_two() {
    up_print()
        .args([
            "print",
            "--tenant-id",
            "t",
            "--client-id",
            "c",
            "--client-secret",
            "s",
            "--printer-id",
            "p1",
            "--file",
            "/definitely/not/here.pdf",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("File not found: /definitely/not/here.pdf"));
}

#[test]
fn zero_poll_interval_is_rejected_before_any_request() {
    let file = NamedTempFile::new().expect("temp file");
    up_print()
        .args([
            "print",
            "--tenant-id",
            "t",
            "--client-id",
            "c",
            "--client-secret",
            "s",
            "--printer-id",
            "p1",
            "--poll",
            "--poll-interval",
            "0",
            "--file",
        ])
        .arg(file.path())
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("--poll-interval must be at least 1 second"));
}

#[test]
fn diagnose_validates_like_print() {
    let file = NamedTempFile::new().expect("temp file");
    up_print()
        .args(["diagnose", "--printer-id", "p1", "--file"])
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Missing required arguments: --tenant-id --client-id --client-secret",
        ));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use up_print::cli::{exit_code, run, Cli, Commands, PrintArgs};

    // No inputs at all: run stops at validation, after the trace event.
    let cli = Cli {
        command: Commands::Print(PrintArgs::default()),
    };

    let err = run(cli).await.expect_err("validation should fail");
    assert_eq!(exit_code(&err), 2);

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
