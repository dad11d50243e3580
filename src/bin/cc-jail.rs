//! `cc-jail` - JSON-lines front end for the compile / analyze / ast tools.
//!
//! Reads one request per stdin line:
//!
//! ```text
//! {"id": 7, "tool": "compile", "arguments": {"source_code": "int main(){return 0;}"}}
//! ```
//!
//! and writes one response per stdout line, echoing `id` when given. Requests
//! run concurrently up to the configured ceiling, so responses may come back
//! out of order. Logs go to stderr.

use anyhow::{Context, Result};
use cc_jail::{
    telemetry, ErrorKind, Isolation, Jail, JailConfig, JailConfigBuilder, Response, ToolCall,
    DEFAULT_BWRAP,
};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IsolationArg {
    /// Namespace sandbox via bwrap
    Bubblewrap,
    /// Resource limits only (development)
    Unconfined,
}

#[derive(Parser)]
#[command(name = "cc-jail")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sandboxed clang compile / analyze / AST service over JSON lines", long_about = None)]
struct Cli {
    /// Absolute path to clang (searched on the default PATH if omitted)
    #[arg(long, env = "CC_JAIL_COMPILER")]
    compiler: Option<PathBuf>,

    /// Directory for per-request job directories
    #[arg(long, env = "CC_JAIL_WORK_ROOT")]
    work_root: Option<PathBuf>,

    /// Isolation backend
    #[arg(long, value_enum, env = "CC_JAIL_ISOLATION", default_value_t = IsolationArg::Bubblewrap)]
    isolation: IsolationArg,

    /// Absolute path to bwrap
    #[arg(long, env = "CC_JAIL_BWRAP", default_value = DEFAULT_BWRAP)]
    bwrap: PathBuf,

    /// Maximum simultaneous toolchain processes
    #[arg(long, env = "CC_JAIL_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Seconds a request may wait for a free slot
    #[arg(long, env = "CC_JAIL_QUEUE_WAIT_SECS")]
    queue_wait_secs: Option<u64>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Result<JailConfig> {
        // Limits without a flag (memory, CPU, output) still come from CC_JAIL_*.
        let mut builder = JailConfigBuilder::from_env()?;

        if let Some(compiler) = &self.compiler {
            builder = builder.compiler(compiler);
        }
        if let Some(root) = &self.work_root {
            builder = builder.work_root(root);
        }
        builder = builder.isolation(match self.isolation {
            IsolationArg::Bubblewrap => Isolation::bubblewrap(&self.bwrap),
            IsolationArg::Unconfined => Isolation::Unconfined,
        });
        if let Some(max) = self.max_concurrent {
            builder = builder.max_concurrent(max);
        }
        if let Some(secs) = self.queue_wait_secs {
            builder = builder.queue_wait(Duration::from_secs(secs));
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    telemetry::init_tracing(cli.json_logs, level);

    let config = cli.config().context("invalid configuration")?;
    info!(
        compiler = %config.compiler().display(),
        work_root = %config.work_root().display(),
        isolation = config.isolation().name(),
        max_concurrent = config.max_concurrent(),
        "cc-jail ready"
    );
    if *config.isolation() == Isolation::Unconfined {
        tracing::warn!("running without namespace isolation; use only for development");
    }
    let jail = Jail::new(config).context("invalid configuration")?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let jail = jail.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let reply = handle_line(&jail, &line).await;
            let _ = tx.send(reply);
        });
    }

    while tasks.join_next().await.is_some() {}
    drop(tx);
    writer
        .await
        .context("writer task panicked")?
        .context("failed to write stdout")?;
    Ok(())
}

/// Decode one envelope, run it, and encode the response line.
async fn handle_line(jail: &Jail, line: &str) -> String {
    let mut envelope: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return reject(None, format!("request is not valid JSON: {e}")),
    };
    let id = envelope.as_object_mut().and_then(|obj| obj.remove("id"));

    let call: ToolCall = match serde_json::from_value(envelope) {
        Ok(call) => call,
        Err(e) => {
            return reject(
                id,
                format!("expected {{\"tool\": \"compile\"|\"analyze\"|\"ast\", \"arguments\": {{...}}}}: {e}"),
            )
        }
    };

    match jail.call(call).await {
        Ok(response) => encode(id, response),
        Err(e) => encode(
            id,
            failure(ErrorKind::InternalError, format!("failed to encode response: {e}")),
        ),
    }
}

fn reject(id: Option<Value>, message: String) -> String {
    encode(id, failure(ErrorKind::ValidationError, message))
}

fn failure(kind: ErrorKind, message: String) -> Value {
    let response: Response<()> = Response::Failure {
        kind,
        message,
        details: BTreeMap::new(),
        elapsed_ms: 0,
    };
    serde_json::to_value(response).unwrap_or(Value::Null)
}

fn encode(id: Option<Value>, mut response: Value) -> String {
    if let (Some(id), Some(obj)) = (id, response.as_object_mut()) {
        obj.insert("id".to_string(), id);
    }
    response.to_string()
}
