//! A compiler backed by an external executable.
//!
//! The executable receives a standard-JSON style request on stdin and must
//! write a single JSON object to stdout:
//!
//! ```json
//! {
//!   "bytecode": "0x6080...",
//!   "interface": [ ... ],
//!   "diagnostics": [
//!     { "severity": "error", "message": "...", "unit": "a.sol", "line": 3, "column": 5 }
//!   ]
//! }
//! ```
//!
//! All fields are optional. `interface` may be any JSON value; it is kept as
//! compact JSON text. A non-zero exit status fails the invocation even if
//! the output parsed.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use kiln_config::CompilerVersion;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, Severity};
use kiln_source::{SourcePosition, UnitId};
use serde::Deserialize;
use serde_json::Value;

use crate::compiler::{Compiler, CompilerInput, CompilerOutput};
use crate::failure::CompilerFailure;

/// Default value of the request's `language` field.
pub const DEFAULT_LANGUAGE: &str = "Solidity";

/// How often a running child is checked against its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external compiler executable once per invocation.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    version: CompilerVersion,
    program: PathBuf,
    args: Vec<String>,
    language: String,
    timeout: Option<Duration>,
}

impl ProcessCompiler {
    /// A compiler for `version` that runs `program` with no arguments.
    pub fn new(version: CompilerVersion, program: impl Into<PathBuf>) -> Self {
        Self {
            version,
            program: program.into(),
            args: Vec::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            timeout: None,
        }
    }

    /// Appends a command-line argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the `language` field of the request.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Kills the child process once it has run for `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The executable this compiler runs.
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Waits for the child, killing it if it outlives the timeout.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus, CompilerFailure> {
        let waiting = |e: std::io::Error| {
            CompilerFailure::process_error(format!("waiting for {}: {e}", self.program.display()))
        };
        let Some(limit) = self.timeout else {
            return child.wait().map_err(waiting);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(waiting)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                tracing::warn!(program = %self.program.display(), "killing compiler after timeout");
                // The child may exit between the check and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(CompilerFailure::timeout(limit));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Compiler for ProcessCompiler {
    fn version(&self) -> &CompilerVersion {
        &self.version
    }

    fn compile(&self, input: &CompilerInput) -> Result<CompilerOutput, CompilerFailure> {
        let request = serde_json::to_vec(&input.to_standard_json(&self.language))
            .map_err(|e| CompilerFailure::process_error(format!("cannot encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CompilerFailure::process_error(format!(
                    "cannot run {}: {e}",
                    self.program.display()
                ))
            })?;

        // Pipes are serviced on their own threads so a compiler that fills
        // stdout before draining stdin cannot deadlock against us.
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&request),
            None => Ok(()),
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child)?;
        let stdout = join_output(stdout)?;
        let stderr = join_output(stderr)?;
        let write_result = writer
            .join()
            .map_err(|_| CompilerFailure::process_error("stdin writer panicked"))?;

        let parsed = parse_response(&stdout);

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let mut message = format!("{} exited with {status}", self.program.display());
            if let Some(line) = stderr.lines().find(|l| !l.trim().is_empty()) {
                message.push_str(": ");
                message.push_str(line.trim());
            }
            let diagnostics = parsed.map(|o| o.diagnostics).unwrap_or_default();
            return Err(CompilerFailure::process_error(message).with_diagnostics(diagnostics));
        }

        if let Err(e) = write_result {
            return Err(CompilerFailure::process_error(format!(
                "writing request to {}: {e}",
                self.program.display()
            )));
        }

        parsed.map_err(|reason| {
            let note = Diagnostic::error(DiagnosticCode::TOOLCHAIN_OUTPUT, reason.clone());
            CompilerFailure::process_error(format!("unreadable compiler output: {reason}"))
                .with_diagnostics(vec![note])
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_output(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, CompilerFailure> {
    reader
        .join()
        .map_err(|_| CompilerFailure::process_error("output reader panicked"))?
        .map_err(|e| CompilerFailure::process_error(format!("reading compiler output: {e}")))
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    bytecode: String,
    #[serde(default)]
    interface: Value,
    #[serde(default)]
    diagnostics: Vec<RawDiagnostic>,
}

#[derive(Deserialize)]
struct RawDiagnostic {
    severity: String,
    message: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
}

impl RawDiagnostic {
    fn into_diagnostic(self) -> Diagnostic {
        let (severity, code) = match self.severity.to_ascii_lowercase().as_str() {
            "error" | "fatal" => (Severity::Error, DiagnosticCode::COMPILER_ERROR),
            "warning" => (Severity::Warning, DiagnosticCode::COMPILER_WARNING),
            _ => (Severity::Info, DiagnosticCode::COMPILER_INFO),
        };
        let mut diag = Diagnostic::new(severity, code, self.message);
        if let Some(unit) = self.unit {
            diag = diag.with_unit(UnitId::from(unit));
        }
        if let Some(line) = self.line {
            diag = diag.with_position(SourcePosition::new(line, self.column.unwrap_or(1)));
        }
        diag
    }
}

fn parse_response(stdout: &[u8]) -> Result<CompilerOutput, String> {
    let raw: RawResponse = serde_json::from_slice(stdout).map_err(|e| e.to_string())?;
    let digits = raw.bytecode.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    let bytecode = hex::decode(digits).map_err(|e| format!("bytecode is not hex: {e}"))?;
    let interface = match raw.interface {
        Value::Null => "[]".to_string(),
        Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(CompilerOutput {
        bytecode,
        interface,
        diagnostics: raw
            .diagnostics
            .into_iter()
            .map(RawDiagnostic::into_diagnostic)
            .collect(),
    })
}
