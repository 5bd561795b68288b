//! Ping invocation and batch execution.
//!
//! Runs one ping per target — either by launching the system ping binary or
//! by reading a pre-captured transcript file — under a hard deadline, then
//! hands the raw output to the parser. Batch coordination across many
//! targets lives in [`batch`].

pub mod batch;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use crate::parser::{self, Dialect, PingStats};

/// One thing to ping: a live destination or a captured transcript.
///
/// Classification happens once, up front, by checking whether the input
/// string names an existing file. A [`PingTarget::File`] never launches a
/// process, even if its path has since disappeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingTarget {
    /// Hostname or IP address to hand to the ping binary.
    Host(String),
    /// Path to a file holding captured ping output.
    File(PathBuf),
}

impl PingTarget {
    /// Classify a raw input string: existing files are transcripts,
    /// everything else is a destination to ping.
    pub fn from_input(input: &str) -> PingTarget {
        let path = Path::new(input);
        if path.exists() {
            PingTarget::File(path.to_path_buf())
        } else {
            PingTarget::Host(input.to_string())
        }
    }
}

impl std::fmt::Display for PingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PingTarget::Host(host) => write!(f, "{}", host),
            PingTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How to run ping for every target of a batch.
///
/// Built once by the caller and shared read-only by all workers. The
/// command line in `argv` arrives fully resolved — which flags a given
/// platform's ping accepts is the caller's concern, the destination is
/// appended per target.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    /// Packets per invocation (informational; already baked into `argv`).
    pub count: u32,
    /// Hard wall-clock bound per invocation.
    pub deadline: Option<Duration>,
    /// Network interface the invocation is bound to, when any.
    pub interface: Option<String>,
    /// Skip detection and parse with this dialect.
    pub dialect_override: Option<Dialect>,
    /// Keep per-reply detail in the parsed stats.
    pub record_replies: bool,
    /// Ping program and arguments, without the trailing destination.
    pub argv: Vec<String>,
}

impl Default for InvocationSpec {
    fn default() -> Self {
        Self {
            count: 4,
            deadline: None,
            interface: None,
            dialect_override: None,
            record_replies: false,
            argv: vec!["ping".to_string()],
        }
    }
}

/// Raw output of one invocation before parsing.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub stdout: String,
    /// Exit code of the ping process; `None` for transcript files and for
    /// processes killed by a signal.
    pub status: Option<i32>,
}

/// Failure classification exposed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Invocation,
    Timeout,
    Parse,
    HostUnreachable,
}

/// Why one target produced no statistics.
///
/// Every variant is per-target data: it ends up as a failure entry in the
/// batch report and never aborts the batch.
#[derive(Debug, Clone, Error)]
pub enum ProbeFailure {
    #[error("invocation failed: {0}")]
    Invocation(String),
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),
    #[error("unparsable ping output: {0}")]
    Parse(String),
    #[error("host unreachable: {0}")]
    HostUnreachable(String),
}

impl ProbeFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeFailure::Invocation(_) => FailureKind::Invocation,
            ProbeFailure::Timeout(_) => FailureKind::Timeout,
            ProbeFailure::Parse(_) => FailureKind::Parse,
            ProbeFailure::HostUnreachable(_) => FailureKind::HostUnreachable,
        }
    }
}

/// Run one invocation (or read one transcript) and capture its output.
pub async fn invoke(target: &PingTarget, spec: &InvocationSpec) -> Result<RawCapture, ProbeFailure> {
    invoke_with_deadline(target, spec, spec.deadline).await
}

/// Like [`invoke`], with the deadline capped externally (batch deadlines
/// shrink the per-invocation bound for late targets).
pub(crate) async fn invoke_with_deadline(
    target: &PingTarget,
    spec: &InvocationSpec,
    deadline: Option<Duration>,
) -> Result<RawCapture, ProbeFailure> {
    match target {
        PingTarget::File(path) => {
            let stdout = tokio::fs::read_to_string(path).await.map_err(|e| {
                ProbeFailure::Invocation(format!(
                    "failed to read transcript {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Ok(RawCapture {
                stdout,
                status: None,
            })
        }
        PingTarget::Host(host) => invoke_ping(host, spec, deadline).await,
    }
}

async fn invoke_ping(
    host: &str,
    spec: &InvocationSpec,
    deadline: Option<Duration>,
) -> Result<RawCapture, ProbeFailure> {
    let (program, args) = spec
        .argv
        .split_first()
        .ok_or_else(|| ProbeFailure::Invocation("empty ping command line".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(host = %host, program = %program, "launching ping");

    let output = match deadline {
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(host = %host, ?limit, "ping deadline expired, child killed");
                return Err(ProbeFailure::Timeout(limit));
            }
        },
        None => cmd.output().await,
    };

    let output = output.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ProbeFailure::Invocation(format!("ping binary '{}' not found", program))
        }
        std::io::ErrorKind::PermissionDenied => {
            ProbeFailure::Invocation(format!("permission denied running '{}'", program))
        }
        _ => ProbeFailure::Invocation(format!("failed to run '{}': {}", program, e)),
    })?;

    Ok(RawCapture {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        status: output.status.code(),
    })
}

/// Whether a nonzero exit code still counts as "ran, but with loss" for the
/// given dialect. There is no uniform rule across implementations: iputils
/// and BusyBox exit 1 when replies are missing, the BSD family uses 2, and
/// ping.exe uses 1. An unknown dialect accepts anything once a complete
/// summary parsed.
pub(crate) fn exit_code_tolerated(dialect: Dialect, code: i32) -> bool {
    match dialect {
        Dialect::Linux | Dialect::Busybox => code == 1,
        Dialect::MacosBsd => code == 1 || code == 2,
        Dialect::Windows => code == 1,
        Dialect::Unknown => true,
    }
}

/// Turn one raw capture into statistics or a per-target failure.
pub(crate) fn classify(capture: &RawCapture, spec: &InvocationSpec) -> Result<PingStats, ProbeFailure> {
    let dialect = spec
        .dialect_override
        .unwrap_or_else(|| Dialect::detect(&capture.stdout));

    if let Some(code) = capture.status {
        if code != 0 && capture.stdout.trim().is_empty() {
            return Err(ProbeFailure::Invocation(format!(
                "ping exited with status {} and produced no output",
                code
            )));
        }
    }

    let parsed = parser::parse(dialect, &capture.stdout);

    if !parsed.partial {
        if let Some(code) = capture.status {
            if code != 0 && !exit_code_tolerated(dialect, code) {
                return Err(ProbeFailure::Invocation(format!(
                    "ping exited with unexpected status {}: {}",
                    code,
                    tail_excerpt(&capture.stdout)
                )));
            }
        }
        let mut stats = parsed.stats;
        if !spec.record_replies {
            stats.replies.clear();
        }
        return Ok(stats);
    }

    if let Some(message) = parser::host_failure(&capture.stdout) {
        return Err(ProbeFailure::HostUnreachable(message));
    }

    Err(ProbeFailure::Parse(format!(
        "no {} summary found in output: {}",
        dialect,
        tail_excerpt(&capture.stdout)
    )))
}

/// Last line of output, for failure messages.
fn tail_excerpt(text: &str) -> String {
    match text.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => line.trim().to_string(),
        None => "<empty>".to_string(),
    }
}
