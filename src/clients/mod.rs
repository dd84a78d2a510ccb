pub mod aggregator;
pub mod refresh;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::models::cluster::{Node, Pod, Usage};
use crate::parsers::{self, TopKind};

const CONTEXT_TEMPLATE: &str = "--template='{{ index . \"current-context\" }}'";

/// What a finished command printed.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. `run` yields `None` only when the command could
/// not be spawned.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn locate(&self, command: &str) -> Option<PathBuf>;

    async fn run(&self, path: &Path, args: &[String]) -> Option<CommandOutput>;
}

/// Executor backed by real processes.
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn locate(&self, command: &str) -> Option<PathBuf> {
        let expanded = expand_home(command);
        if expanded.components().count() > 1 {
            return expanded.is_file().then_some(expanded);
        }

        let search = std::env::var_os("PATH")?;
        std::env::split_paths(&search)
            .map(|dir| dir.join(&expanded))
            .find(|candidate| candidate.is_file())
    }

    async fn run(&self, path: &Path, args: &[String]) -> Option<CommandOutput> {
        let output = match Command::new(path).args(args).output().await {
            Ok(output) => output,
            Err(e) => {
                warn!("failed to run {}: {}", path.display(), e);
                return None;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(
                "{} {:?} exited with {}: {}",
                path.display(),
                args,
                output.status,
                stderr.trim()
            );
        }

        Some(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn expand_home(command: &str) -> PathBuf {
    match (command.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(command),
    }
}

/// The kubectl invocations the monitor makes. Every call locates the binary
/// afresh, so a config reload pointing at a new path takes effect at once.
#[derive(Clone)]
pub struct Kubectl {
    executor: Arc<dyn CommandExecutor>,
    path: String,
}

impl Kubectl {
    pub fn new(executor: Arc<dyn CommandExecutor>, path: impl Into<String>) -> Self {
        Self {
            executor,
            path: path.into(),
        }
    }

    pub async fn is_available(&self) -> bool {
        self.executor.locate(&self.path).await.is_some()
    }

    pub async fn list_pods(&self) -> Vec<Pod> {
        match self.run(&["get", "pods", "--all-namespaces", "-o=json"]).await {
            Some(text) => parsers::parse_pods(&text),
            None => Vec::new(),
        }
    }

    pub async fn list_nodes(&self) -> Vec<Node> {
        match self.run(&["get", "nodes", "-o=json"]).await {
            Some(text) => parsers::parse_nodes(&text),
            None => Vec::new(),
        }
    }

    /// Name of the current context, without the quoting the template adds.
    pub async fn current_context(&self) -> Option<String> {
        let raw = self
            .run(&["config", "view", "-o=template", CONTEXT_TEMPLATE])
            .await?;
        let name = raw.replace('\'', "").trim().to_string();
        if name.is_empty() { None } else { Some(name) }
    }

    pub async fn top_pod(&self, namespace: &str, name: &str) -> Option<Usage> {
        let ns = format!("--namespace={}", namespace);
        let text = self
            .run(&["top", TopKind::Pod.as_arg(), name, ns.as_str()])
            .await?;
        parsers::parse_top(&text, TopKind::Pod)
    }

    pub async fn top_node(&self, name: &str) -> Option<Usage> {
        let text = self.run(&["top", TopKind::Node.as_arg(), name]).await?;
        parsers::parse_top(&text, TopKind::Node)
    }

    /// Delete a pod, returning kubectl's own message for the user. A failed
    /// delete prints only to stderr, so that is the fallback.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Option<String> {
        let output = self
            .output(&["--namespace", namespace, "delete", "pod", name])
            .await?;
        [output.stdout, output.stderr]
            .into_iter()
            .find(|text| !text.trim().is_empty())
    }

    /// Stdout of a kubectl call, `None` when there was none.
    async fn run(&self, args: &[&str]) -> Option<String> {
        let output = self.output(args).await?;
        if output.stdout.is_empty() { None } else { Some(output.stdout) }
    }

    async fn output(&self, args: &[&str]) -> Option<CommandOutput> {
        let Some(path) = self.executor.locate(&self.path).await else {
            debug!("kubectl not found at {:?}", self.path);
            return None;
        };
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.executor.run(&path, &args).await
    }
}
