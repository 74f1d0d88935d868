#![cfg(feature = "sqlite")]

use serde_json::Value;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const USERS_MODEL: &str = r#"
[[tables]]
name = "users"

[[tables.columns]]
name = "id"
type = "integer"
primary_key = true

[[tables.columns]]
name = "email"
type = "text"
"#;

const USERS_WITHOUT_EMAIL: &str = r#"
[[tables]]
name = "users"

[[tables.columns]]
name = "id"
type = "integer"
primary_key = true
"#;

fn devpush_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_devpush"))
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.dir.path().join("app.db").display())
    }

    fn model(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(devpush_bin());
        cmd.args(args)
            .env("DATABASE_URL", self.database_url())
            .env("DEVPUSH_HOME", self.dir.path())
            .env_remove("DEVPUSH_ENV")
            .env_remove("DEVPUSH_DROP_DATABASE")
            .env_remove("DEVPUSH_MIGRATING")
            .env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .expect("failed to execute devpush")
    }

    /// Run with `answer` written to stdin, as an operator typing at the prompt.
    fn run_answering(&self, args: &[&str], answer: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to execute devpush");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(answer.as_bytes())
            .unwrap();
        child.wait_with_output().unwrap()
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "devpush {} failed\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn insert_user(&self, email: &str) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let pool = sqlx::SqlitePool::connect(&self.database_url()).await.unwrap();
            sqlx::query("INSERT INTO users (email) VALUES (?)")
                .bind(email)
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;
        });
    }

    /// Users table with one row, and a model that removes its email column.
    fn pending_data_loss(&self) -> PathBuf {
        let full = self.model("full.toml", USERS_MODEL);
        let slim = self.model("slim.toml", USERS_WITHOUT_EMAIL);
        self.run_ok(&["push", "--model", full.to_str().unwrap()]);
        self.insert_user("a@example.com");
        slim
    }

    fn plan_json(&self, model: &Path) -> Value {
        let stdout = self.run_ok(&["plan", "--model", model.to_str().unwrap(), "--json"]);
        serde_json::from_str(&stdout).unwrap()
    }
}

#[test]
fn test_push_creates_tables_and_sentinel() {
    let ws = Workspace::new();
    let model = ws.model("schema.toml", USERS_MODEL);

    let stdout = ws.run_ok(&["push", "--model", model.to_str().unwrap()]);
    assert!(stdout.contains("Schema pushed: 2 statement(s), risk: safe."), "{}", stdout);

    let status: Value =
        serde_json::from_str(&ws.run_ok(&["status", "--json"])).unwrap();
    assert_eq!(status["name"], "dev");
    assert_eq!(status["batch"], -1);

    let plan = ws.plan_json(&model);
    assert_eq!(plan["risk"], "no_changes");
    assert_eq!(plan["statements"].as_array().unwrap().len(), 0);
}

#[test]
fn test_second_push_refreshes_sentinel() {
    let ws = Workspace::new();
    let model = ws.model("schema.toml", USERS_MODEL);

    ws.run_ok(&["push", "--model", model.to_str().unwrap()]);
    let stdout = ws.run_ok(&["push", "--model", model.to_str().unwrap()]);

    assert!(stdout.contains("No schema changes. Dev push recorded (Refreshed)."), "{}", stdout);
}

#[test]
fn test_plan_does_not_apply() {
    let ws = Workspace::new();
    let model = ws.model("schema.json", r#"{"tables": [{"name": "notes", "columns": [{"name": "body", "type": "text"}]}]}"#);

    let first = ws.plan_json(&model);
    let second = ws.plan_json(&model);

    assert_eq!(first["risk"], "safe");
    assert_eq!(first, second);
    let statements = first["statements"].as_array().unwrap();
    assert!(statements[0].as_str().unwrap().starts_with("CREATE TABLE \"migrations\""));
    assert!(statements[1].as_str().unwrap().starts_with("CREATE TABLE \"notes\""));
}

#[test]
fn test_production_skips_push() {
    let ws = Workspace::new();
    let model = ws.model("schema.toml", USERS_MODEL);

    let stdout = ws.run_ok(&["push", "--model", model.to_str().unwrap(), "--env", "production"]);
    assert!(stdout.contains("Skipping schema push: running in production."), "{}", stdout);

    let plan = ws.plan_json(&model);
    assert_eq!(plan["risk"], "safe");
}

#[test]
fn test_data_loss_without_answer_is_aborted() {
    let ws = Workspace::new();
    let slim = ws.pending_data_loss();

    let stdout = ws.run_ok(&["push", "--model", slim.to_str().unwrap()]);
    assert!(stdout.contains("Schema push aborted"), "{}", stdout);

    let plan = ws.plan_json(&slim);
    assert_eq!(plan["risk"], "data_loss");
    assert_eq!(plan["has_data_loss"], true);

    let stdout = ws.run_ok(&["push", "--model", slim.to_str().unwrap(), "--yes"]);
    assert!(stdout.contains("risk: data loss"), "{}", stdout);
    assert_eq!(ws.plan_json(&slim)["risk"], "no_changes");
}

#[test]
fn test_invalid_model_exits_with_error() {
    let ws = Workspace::new();
    let model = ws.model("schema.toml", "[[tables]]\nname = \"empty\"\ncolumns = []\n");

    let output = ws.run(&["push", "--model", model.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("declares no columns"));
}

#[test]
fn test_unreachable_database_exits_with_error() {
    let ws = Workspace::new();
    let model = ws.model("schema.toml", USERS_MODEL);

    let output = ws.run(&[
        "push",
        "--model",
        model.to_str().unwrap(),
        "--database-url",
        "sqlite:/nonexistent-dir/devpush/app.db?mode=ro",
    ]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_answering_no_keeps_column() {
    let ws = Workspace::new();
    let slim = ws.pending_data_loss();

    let output = ws.run_answering(&["push", "--model", slim.to_str().unwrap()], "n\n");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Schema push aborted: operator declined"), "{}", stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Accept warnings and push schema to database? (y/N)"), "{}", stderr);
    assert_eq!(ws.plan_json(&slim)["risk"], "data_loss");
}

#[test]
fn test_answering_yes_applies_plan() {
    let ws = Workspace::new();
    let slim = ws.pending_data_loss();

    let output = ws.run_answering(&["push", "--model", slim.to_str().unwrap()], "y\n");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("risk: data loss"), "{}", stdout);
    assert_eq!(ws.plan_json(&slim)["risk"], "no_changes");
}

/// Wait for the child to exit, killing it after `timeout`.
#[cfg(unix)]
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let _ = child.kill();
    let _ = child.wait();
    None
}

#[cfg(unix)]
#[test]
fn test_ctrl_c_at_prompt_exits() {
    let ws = Workspace::new();
    let slim = ws.pending_data_loss();

    let mut child = ws
        .command(&["push", "--model", slim.to_str().unwrap()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute devpush");
    // stdin stays open: the only way out is the interrupt
    let _stdin = child.stdin.take().unwrap();

    let mut stderr = child.stderr.take().unwrap();
    let mut seen = Vec::new();
    let mut buf = [0u8; 256];
    while !String::from_utf8_lossy(&seen).contains("(y/N)") {
        let n = stderr.read(&mut buf).unwrap();
        assert!(n > 0, "prompt never shown: {}", String::from_utf8_lossy(&seen));
        seen.extend_from_slice(&buf[..n]);
    }
    // let the prompt start listening for the signal
    std::thread::sleep(Duration::from_millis(300));

    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let exit = wait_with_timeout(&mut child, Duration::from_secs(10));
    assert_eq!(exit.and_then(|s| s.code()), Some(0), "devpush kept running after SIGINT");

    let mut stdout = String::new();
    child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    assert!(stdout.contains("operator cancelled the confirmation prompt"), "{}", stdout);
    assert_eq!(ws.plan_json(&slim)["risk"], "data_loss");
}
