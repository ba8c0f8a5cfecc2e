use arena_application::config::Config;
use arena_domain::repositories::payload::{PayloadLocation, PayloadSource};
use arena_infrastructure::series::FilesystemSeriesReader;
use arena_worker::{execute_with, WorkerArgs, WorkerOutput};
use serde_json::json;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Serves every location from a fixed body and records what was asked for.
struct FakePayloads {
    body: Result<String, String>,
    fetched: RefCell<Vec<PayloadLocation>>,
}

impl FakePayloads {
    fn ok(body: &str) -> Self {
        Self {
            body: Ok(body.to_string()),
            fetched: RefCell::new(Vec::new()),
        }
    }

    fn failing(err: &str) -> Self {
        Self {
            body: Err(err.to_string()),
            fetched: RefCell::new(Vec::new()),
        }
    }
}

impl PayloadSource for FakePayloads {
    fn fetch(&self, location: &PayloadLocation) -> Result<String, String> {
        self.fetched.borrow_mut().push(location.clone());
        match (&self.body, location) {
            (_, PayloadLocation::Inline(text)) => Ok(text.clone()),
            (body, _) => body.clone(),
        }
    }
}

fn args(command: &str, json_args: Option<&str>) -> WorkerArgs {
    WorkerArgs {
        command: command.to_string(),
        json_args: json_args.map(str::to_string),
        input: None,
    }
}

fn run(args: &WorkerArgs, payloads: &FakePayloads) -> WorkerOutput {
    execute_with(args, &Config::default(), payloads, &FilesystemSeriesReader::new())
}

fn unique_tmp_path(name: &str, ext: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("arena_worker_{name}_{}_{}.{ext}", std::process::id(), now))
}

#[test]
fn success_envelope_wraps_command_data() {
    let output = run(
        &args("returns-stats", Some(r#"{"returns": [0.01, -0.02, 0.015]}"#)),
        &FakePayloads::ok("{}"),
    );
    assert_eq!(output.exit_code, 0);
    assert_eq!(output.envelope["success"], json!(true));
    assert_eq!(output.envelope["command"], json!("returns-stats"));
    assert_eq!(output.envelope["data"]["periods"], json!(3));
}

#[test]
fn rendered_envelope_is_a_single_line() {
    let output = run(&args("commands", None), &FakePayloads::ok("{}"));
    let line = output.render();
    assert!(!line.contains('\n'));
    let parsed: serde_json::Value = serde_json::from_str(&line).expect("valid json");
    assert_eq!(parsed["data"]["commands"].as_array().map(Vec::len), Some(10));
}

#[test]
fn unknown_command_is_a_usage_error_with_null_command() {
    let payloads = FakePayloads::ok("{}");
    let output = run(&args("sharpe", Some("{}")), &payloads);
    assert_eq!(output.exit_code, 2);
    assert_eq!(output.envelope["success"], json!(false));
    assert!(output.envelope["command"].is_null());
    assert_eq!(output.envelope["error"], json!("unknown command: sharpe"));
    assert!(payloads.fetched.borrow().is_empty());
}

#[test]
fn malformed_json_is_a_usage_error() {
    let output = run(&args("var", Some("{\"returns\": [0.1,")), &FakePayloads::ok("{}"));
    assert_eq!(output.exit_code, 2);
    assert_eq!(output.envelope["command"], json!("var"));
    assert!(output.envelope["error"]
        .as_str()
        .unwrap_or_default()
        .contains("failed to parse JSON arguments"));
}

#[test]
fn compute_errors_exit_with_one() {
    let output = run(
        &args("rolling-sharpe", Some(r#"{"returns": [0.01, 0.02], "window": 1}"#)),
        &FakePayloads::ok("{}"),
    );
    assert_eq!(output.exit_code, 1);
    assert_eq!(output.envelope["command"], json!("rolling-sharpe"));
    assert!(output.envelope["error"]
        .as_str()
        .unwrap_or_default()
        .contains("window"));
}

#[test]
fn payload_fetch_failures_are_input_errors() {
    let payloads = FakePayloads::failing("payload request to http://x failed: status 429 after 3 attempt(s)");
    let output = run(&args("var", Some("http://x/payload.json")), &payloads);
    assert_eq!(output.exit_code, 1);
    assert!(output.envelope["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("input error:"));
    assert_eq!(
        payloads.fetched.borrow().as_slice(),
        [PayloadLocation::Http("http://x/payload.json".to_string())]
    );
}

#[test]
fn input_flag_reads_from_the_payload_source() {
    let payloads = FakePayloads::ok(r#"{"returns": [-0.03, -0.01, 0.0, 0.02, 0.04]}"#);
    let worker_args = WorkerArgs {
        command: "var".to_string(),
        json_args: None,
        input: Some("-".to_string()),
    };
    let output = run(&worker_args, &payloads);
    assert_eq!(output.exit_code, 0);
    assert_eq!(output.envelope["data"]["observations"], json!(5));
    assert_eq!(payloads.fetched.borrow().as_slice(), [PayloadLocation::Stdin]);
}

#[test]
fn positional_and_input_payloads_conflict() {
    let worker_args = WorkerArgs {
        command: "var".to_string(),
        json_args: Some("{}".to_string()),
        input: Some("-".to_string()),
    };
    let output = run(&worker_args, &FakePayloads::ok("{}"));
    assert_eq!(output.exit_code, 2);
}

#[test]
fn csv_argument_is_read_as_a_series() {
    let path = unique_tmp_path("equity", "csv");
    fs::write(&path, "timestamp,equity\n1,100\n2,120\n3,90\n4,95\n").expect("write csv");
    let path_str = path.display().to_string();
    let payloads = FakePayloads::ok("{}");
    let output = run(&args("drawdowns", Some(&path_str)), &payloads);
    let _ = fs::remove_file(&path);

    assert_eq!(output.exit_code, 0, "{}", output.render());
    let max_dd = output.envelope["data"]["max_drawdown"].as_f64().unwrap_or(-1.0);
    assert!((max_dd - 0.25).abs() < 1e-9);
    assert!(payloads.fetched.borrow().is_empty());
}

#[test]
fn guardrail_rejection_is_still_a_successful_command() {
    let output = run(
        &args(
            "guardrail-check",
            Some(
                r#"{"decision": {"symbol": "BTCUSD", "action": "sell", "quantity": 1.0, "price": 100.0},
                    "account": {"cash": 1000.0, "equity": 1000.0}}"#,
            ),
        ),
        &FakePayloads::ok("{}"),
    );
    assert_eq!(output.exit_code, 0);
    let data = &output.envelope["data"];
    assert_eq!(data["approved"], json!(false));
    assert_eq!(data["adjusted_quantity"], json!(0.0));
    assert_eq!(data["violations"][0]["rule"], json!("short_not_allowed"));
}
