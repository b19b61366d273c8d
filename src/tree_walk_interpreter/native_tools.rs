//! Bridge to the external scanning executables and the HTTP client.
//!
//! Tools live in the configured tools directory, are spawned with plain
//! argument vectors and print one JSON document on stdout. Every failure is
//! reported to the script as an `{error: message}` object rather than raised.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Output,
    time::Duration,
};

use log::{debug, warn};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::process::Command;

use super::{builtins::string_arg, ExecutionErrorKind, Interpreter, Value};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not built")]
    NotBuilt(String),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

/// `<directory of the running executable>/tools`, or `./tools` when the
/// executable path is unknown.
pub fn default_tools_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("tools")))
        .unwrap_or_else(|| PathBuf::from("tools"))
}

/// Runs `command` to completion on a throwaway current-thread runtime. The
/// child is killed if the deadline passes.
fn run_command(mut command: Command, timeout: Option<Duration>) -> Result<Output, ToolError> {
    command.kill_on_drop(true);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| ToolError::Timeout(limit))?,
            None => command.output().await,
        };
        output.map_err(ToolError::from)
    })
}

fn invoke(path: &Path, tool: &str, args: &[String], timeout: Option<Duration>) -> Result<Value, ToolError> {
    if !path.exists() {
        return Err(ToolError::NotBuilt(tool.to_string()));
    }

    let mut command = Command::new(path);
    command.args(args);
    let output = run_command(command, timeout)?;
    if !output.status.success() {
        return Err(ToolError::Failed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let json: JsonValue = serde_json::from_slice(&output.stdout)?;
    Ok(Value::from_json(&json))
}

fn run_tool(interpreter: &Interpreter, tool: &str, args: Vec<String>, timeout: Option<Duration>) -> Value {
    let executable = format!("{}{}", tool, std::env::consts::EXE_SUFFIX);
    let path = interpreter.options.tools_dir.join(executable);
    debug!("running {} {:?}", path.display(), args);

    match invoke(&path, tool, &args, timeout) {
        Ok(value) => value,
        Err(e) => {
            warn!("{}: {}", tool, e);
            Value::error_object(e.to_string())
        }
    }
}

/// Argument `i` as text when truthy, otherwise `default`.
fn arg_or(args: &[Value], i: usize, default: &str) -> String {
    match args.get(i) {
        Some(value) if value.is_truthy() => value.to_key(),
        _ => default.to_string(),
    }
}

pub fn scan_ports(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let mut tool_args = vec![string_arg(&args, 0)];
    if let Some(Value::List(ports)) = args.get(1) {
        let ports: Vec<String> = ports.borrow().iter().map(Value::to_key).collect();
        tool_args.push(ports.join(","));
    }
    Ok(run_tool(interpreter, "portscanner", tool_args, None))
}

pub fn dirbuster(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let mut tool_args = vec![string_arg(&args, 0)];
    if let Some(wordlist) = args.get(1).filter(|value| value.is_truthy()) {
        tool_args.push(wordlist.to_key());
    }
    Ok(run_tool(interpreter, "dirbuster", tool_args, Some(Duration::from_secs(60))))
}

pub fn dns_resolve(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    Ok(run_tool(interpreter, "dns_resolver", vec![string_arg(&args, 0)], None))
}

pub fn dns_bruteforce(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let tool_args = vec!["--bruteforce".to_string(), string_arg(&args, 0)];
    Ok(run_tool(interpreter, "dns_resolver", tool_args, Some(Duration::from_secs(60))))
}

pub fn subnet_scan(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let tool_args = vec![
        string_arg(&args, 0),
        format!("--timeout={}", arg_or(&args, 1, "2")),
        format!("--workers={}", arg_or(&args, 2, "100")),
    ];
    Ok(run_tool(interpreter, "subnet_scanner", tool_args, Some(Duration::from_secs(120))))
}

/// Runs a shell command line and returns its standard output as text.
pub fn execute(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let line = string_arg(&args, 0);
    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let mut command = Command::new(shell);
    command.arg(flag).arg(&line);
    debug!("executing {:?}", line);

    Ok(Value::String(match run_command(command, None) {
        Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout).into_owned(),
        Ok(output) => format!(
            "Command failed: {}\n{}",
            line,
            String::from_utf8_lossy(&output.stderr)
        ),
        Err(e) => format!("Command failed: {}\n{}", line, e),
    }))
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some_and(|e| {
            matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        })
}

fn response_value(response: ureq::Response) -> Value {
    let status = Value::Number(f64::from(response.status()));
    let headers: BTreeMap<String, Value> = response
        .headers_names()
        .into_iter()
        .filter_map(|name| {
            let value = response.header(&name)?.to_string();
            Some((name.to_ascii_lowercase(), Value::String(value)))
        })
        .collect();

    match response.into_string() {
        Ok(body) => Value::object(BTreeMap::from([
            ("status".to_string(), status),
            ("headers".to_string(), Value::object(headers)),
            ("body".to_string(), Value::String(body)),
        ])),
        Err(e) => Value::error_object(e.to_string()),
    }
}

/// GET `url`. Non-2xx statuses are still responses; only transport failures
/// become error objects.
pub fn requete_http(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, ExecutionErrorKind> {
    let url = string_arg(&args, 0);
    let agent = ureq::AgentBuilder::new()
        .timeout(interpreter.options.http_timeout)
        .build();
    debug!("GET {}", url);

    Ok(match agent.get(&url).call() {
        Ok(response) | Err(ureq::Error::Status(_, response)) => response_value(response),
        Err(ureq::Error::Transport(transport)) if is_timeout(&transport) => Value::error_object("Timeout"),
        Err(ureq::Error::Transport(transport)) => {
            warn!("requete_http {}: {}", url, transport);
            Value::error_object(transport.to_string())
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_run_command_times_out() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 5");
        let result = run_command(command, Some(Duration::from_millis(100)));
        assert!(matches!(result, Err(ToolError::Timeout(_))));
    }

    #[test]
    fn test_missing_tool_is_not_built() {
        let dir = tempfile::tempdir().unwrap();
        let result = invoke(&dir.path().join("portscanner"), "portscanner", &[], None);
        assert_eq!(result.unwrap_err().to_string(), "portscanner not built");
    }

    #[test]
    fn test_arg_or() {
        assert_eq!(arg_or(&[Value::Number(5.0)], 0, "2"), "5");
        assert_eq!(arg_or(&[Value::Null], 0, "2"), "2");
        assert_eq!(arg_or(&[], 2, "100"), "100");
    }
}
