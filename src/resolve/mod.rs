//! Command name resolution
//!
//! A requested name becomes exactly one [`ExecutionPlan`], in this order:
//!
//! 1. a script declared by the workspace (unless `binaries_only`)
//! 2. a binary the workspace can reach through its dependencies
//! 3. the platform shell, with the name and arguments joined by spaces
//!
//! Nothing here fails because a name is unknown. Unknown names fall through
//! to the shell, whose own exit code becomes the result.

mod runner;

pub use runner::{Runner, RunnerSettings};

use crate::cache::BinaryCache;
use crate::error::LightrunResult;
use crate::project::{BinaryEntry, WorkspaceContext};
use std::path::PathBuf;
use tracing::debug;

/// Interpreter debugging flags forwarded when a binary is launched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectFlags {
    /// `--inspect`, optionally with `host:port`
    pub inspect: Option<Option<String>>,
    /// `--inspect-brk`, optionally with `host:port`
    pub inspect_brk: Option<Option<String>>,
}

impl InspectFlags {
    /// Interpreter arguments placed before the binary path
    pub fn node_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (flag, value) in [("--inspect", &self.inspect), ("--inspect-brk", &self.inspect_brk)] {
            match value {
                Some(Some(addr)) => args.push(format!("{flag}={addr}")),
                Some(None) => args.push(flag.to_string()),
                None => {}
            }
        }
        args
    }
}

/// One invocation of `lightrun run`
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub name: String,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    pub inspect: InspectFlags,
    /// Skip declared scripts
    pub binaries_only: bool,
    /// Resolve against the project's top-level workspace
    pub top_level: bool,
}

/// What a request resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Declared script. `argv[0]` is the script's first token; `binary` is
    /// the accessible binary it names, or `None` to run `argv` via the shell.
    RunScript {
        argv: Vec<String>,
        binary: Option<BinaryEntry>,
    },
    /// Accessible binary launched through the interpreter
    RunBinary { program: PathBuf, args: Vec<String> },
    /// Raw command line for the platform shell
    ShellFallback { command_line: String },
}

/// Split script text on whitespace
///
/// Quotes, escapes and shell operators get no special treatment:
/// `echo "a b"` yields `echo`, `"a`, `b"`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Join a name and its arguments into one shell command line
pub fn command_line<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies the resolution order against a workspace
pub struct Resolver<'a> {
    cache: &'a BinaryCache,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a BinaryCache) -> Self {
        Self { cache }
    }

    pub async fn resolve(
        &self,
        request: &ExecutionRequest,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<ExecutionPlan> {
        if !request.binaries_only {
            if let Some(script) = workspace.declared_scripts.get(&request.name) {
                let mut argv = tokenize(script);
                argv.extend(request.args.iter().cloned());

                let binary = match argv.first() {
                    Some(first) => self.find_binary(first, workspace).await?,
                    None => None,
                };

                debug!(
                    "Resolved {} to script `{}` (binary: {})",
                    request.name,
                    script,
                    binary.is_some()
                );
                return Ok(ExecutionPlan::RunScript { argv, binary });
            }
        }

        if let Some(entry) = self.find_binary(&request.name, workspace).await? {
            debug!(
                "Resolved {} to {} from {}",
                request.name,
                entry.path.display(),
                entry.owner
            );
            return Ok(ExecutionPlan::RunBinary {
                program: entry.path,
                args: request.args.clone(),
            });
        }

        debug!("No script or binary named {}, using the shell", request.name);
        let mut parts = vec![request.name.clone()];
        parts.extend(request.args.iter().cloned());
        Ok(ExecutionPlan::ShellFallback {
            command_line: command_line(&parts),
        })
    }

    async fn find_binary(
        &self,
        name: &str,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<Option<BinaryEntry>> {
        let mut binaries = self.cache.lookup(&workspace.working_directory).await?;
        Ok(binaries.remove(name))
    }
}
