//! Plan execution
//!
//! Binaries and scripts run with a fresh shim directory on the search path.
//! The directory lives exactly as long as the child: it is closed after the
//! child exits and dropped (removed) on every error path.
//!
//! Every await before the child starts is raced against [`Signals`], so a
//! termination request during setup unwinds and removes the directory too.

use crate::cache::BinaryCache;
use crate::env::{self, EnvMap};
use crate::error::{LightrunError, LightrunResult};
use crate::process::{Launch, LaunchSpec, ProcessExecutor, ShellCommand, Signals, Stdio};
use crate::project::{AccessibleBinaryMap, WorkspaceContext};
use crate::resolve::{command_line, ExecutionPlan, ExecutionRequest, Resolver};
use crate::shim::ShimDirectory;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How children are started
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Interpreter name or path, looked up on `PATH`
    pub interpreter: String,
    /// Shell for raw command lines
    pub shell: ShellCommand,
    /// Dependency loader preloaded into the interpreter, if the project has one
    pub pnp_loader: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            interpreter: "node".to_string(),
            shell: ShellCommand::platform_default(),
            pnp_loader: None,
        }
    }
}

/// Resolves requests and runs the resulting plans
pub struct Runner<'a> {
    cache: &'a BinaryCache,
    settings: RunnerSettings,
    executor: ProcessExecutor,
    signals: Signals,
    base_env: EnvMap,
}

impl<'a> Runner<'a> {
    pub fn new(cache: &'a BinaryCache, settings: RunnerSettings, signals: Signals) -> Self {
        let executor = ProcessExecutor::new(settings.shell.clone());
        Self {
            cache,
            settings,
            executor,
            signals,
            base_env: env::from_process(),
        }
    }

    /// Replace the environment children inherit
    pub fn with_base_env(mut self, base_env: EnvMap) -> Self {
        self.base_env = base_env;
        self
    }

    /// Resolve `request` against `workspace` and run it
    pub async fn run(
        &mut self,
        request: &ExecutionRequest,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<i32> {
        let resolver = Resolver::new(self.cache);
        let plan = self
            .signals
            .cancellable(resolver.resolve(request, workspace))
            .await?;
        self.execute(plan, request, workspace).await
    }

    /// Run an already resolved plan
    pub async fn execute(
        &mut self,
        plan: ExecutionPlan,
        request: &ExecutionRequest,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<i32> {
        match plan {
            ExecutionPlan::RunBinary { program, args } => {
                let binaries = self.binaries(workspace).await?;
                let interpreter = self.interpreter(&request.working_directory)?;
                let launch = interpreter_launch(&interpreter, request, program, args);
                self.launch_with_shims(
                    &binaries,
                    &interpreter,
                    request.working_directory.clone(),
                    |_| launch,
                )
                .await
            }

            ExecutionPlan::RunScript {
                argv,
                binary: Some(entry),
            } => {
                let binaries = self.binaries(workspace).await?;
                let interpreter = self.interpreter(&workspace.working_directory)?;
                let args = argv.into_iter().skip(1).collect();
                let launch = interpreter_launch(&interpreter, request, entry.path, args);
                self.launch_with_shims(
                    &binaries,
                    &interpreter,
                    workspace.working_directory.clone(),
                    |_| launch,
                )
                .await
            }

            ExecutionPlan::RunScript { argv, binary: None } => {
                if argv.is_empty() {
                    debug!("Script {} is empty, nothing to run", request.name);
                    return Ok(0);
                }
                let binaries = self.binaries(workspace).await?;
                let interpreter = self.interpreter(&workspace.working_directory)?;
                let launch = Launch::Shell {
                    command_line: command_line(&argv),
                };
                self.launch_with_shims(
                    &binaries,
                    &interpreter,
                    workspace.working_directory.clone(),
                    |_| launch,
                )
                .await
            }

            ExecutionPlan::ShellFallback { command_line } => {
                let spec = LaunchSpec {
                    launch: Launch::Shell { command_line },
                    cwd: request.working_directory.clone(),
                    env: self.base_env.clone(),
                    stdio: Stdio::Inherit,
                };
                self.executor.run(spec, &mut self.signals).await
            }
        }
    }

    /// Run `command` directly, with the workspace's binaries on the search path
    pub async fn exec(
        &mut self,
        command: &str,
        args: Vec<String>,
        cwd: &Path,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<i32> {
        let binaries = self.binaries(workspace).await?;
        let interpreter = self.interpreter(cwd)?;
        self.launch_with_shims(&binaries, &interpreter, cwd.to_path_buf(), |env| {
            Launch::Argv {
                program: find_program(command, env, cwd),
                args,
            }
        })
        .await
    }

    /// Run the interpreter itself inside the workspace environment
    pub async fn interpreter_only(
        &mut self,
        args: Vec<String>,
        cwd: &Path,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<i32> {
        let binaries = self.binaries(workspace).await?;
        let interpreter = self.interpreter(cwd)?;
        let program = interpreter.clone();
        self.launch_with_shims(&binaries, &interpreter, cwd.to_path_buf(), |_| {
            Launch::Argv { program, args }
        })
        .await
    }

    async fn binaries(
        &mut self,
        workspace: &WorkspaceContext,
    ) -> LightrunResult<AccessibleBinaryMap> {
        let cache = self.cache;
        self.signals
            .cancellable(cache.lookup(&workspace.working_directory))
            .await
    }

    async fn launch_with_shims<F>(
        &mut self,
        binaries: &AccessibleBinaryMap,
        interpreter: &Path,
        cwd: PathBuf,
        launch: F,
    ) -> LightrunResult<i32>
    where
        F: FnOnce(&EnvMap) -> Launch,
    {
        let base_env = self.base_env.clone();
        let pnp_loader = self.settings.pnp_loader.clone();
        let prepare = async move {
            let shims = ShimDirectory::with_binaries(binaries, interpreter).await?;
            let env = env::compose(base_env, shims.path(), pnp_loader.as_deref())?;
            Ok::<_, LightrunError>((shims, env))
        };
        let (shims, env) = self.signals.cancellable(prepare).await?;

        let spec = LaunchSpec {
            launch: launch(&env),
            cwd,
            env,
            stdio: Stdio::Inherit,
        };
        let code = self.executor.run(spec, &mut self.signals).await?;

        if let Err(e) = shims.close().await {
            warn!("Failed to remove shim directory: {}", e);
        }
        Ok(code)
    }

    fn interpreter(&self, cwd: &Path) -> LightrunResult<PathBuf> {
        let name = &self.settings.interpreter;
        which::which_in(name, self.base_env.get(OsStr::new("PATH")), cwd).map_err(|e| {
            debug!("Interpreter lookup for {} failed: {}", name, e);
            LightrunError::InterpreterNotFound { name: name.clone() }
        })
    }
}

/// `<interpreter> [inspect flags] <script> <args>`
fn interpreter_launch(
    interpreter: &Path,
    request: &ExecutionRequest,
    script: PathBuf,
    args: Vec<String>,
) -> Launch {
    let mut argv = request.inspect.node_args();
    argv.push(script.to_string_lossy().into_owned());
    argv.extend(args);
    Launch::Argv {
        program: interpreter.to_path_buf(),
        args: argv,
    }
}

/// Look `command` up on the child's search path so shims take precedence
fn find_program(command: &str, env: &EnvMap, cwd: &Path) -> PathBuf {
    let path = env
        .iter()
        .find(|(k, _)| {
            if cfg!(windows) {
                k.to_string_lossy().eq_ignore_ascii_case("PATH")
            } else {
                k.as_os_str() == "PATH"
            }
        })
        .map(|(_, v)| v);
    which::which_in(command, path, cwd).unwrap_or_else(|_| PathBuf::from(command))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::process::Shutdown;
    use crate::project::{BinaryEntry, BinaryEnumerator, Locator};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedBinaries(AccessibleBinaryMap);

    #[async_trait]
    impl BinaryEnumerator for FixedBinaries {
        async fn enumerate(&self, _directory: &Path) -> LightrunResult<AccessibleBinaryMap> {
            Ok(self.0.clone())
        }
    }

    /// Workspace with two binaries writing the shim folder, then their
    /// arguments, to `$RECORD_TO`: `record` exits, `linger` keeps running
    struct Fixture {
        root: TempDir,
        cache: BinaryCache,
        record: PathBuf,
    }

    impl Fixture {
        async fn new() -> Self {
            let root = TempDir::new().unwrap();
            let script = root.path().join("record.sh");
            std::fs::write(
                &script,
                "printf '%s\\n' \"$LIGHTRUN_BIN_FOLDER\" \"$@\" > \"$RECORD_TO\"\n",
            )
            .unwrap();

            let linger = root.path().join("linger.sh");
            std::fs::write(
                &linger,
                "printf '%s\\n' \"$LIGHTRUN_BIN_FOLDER\" > \"$RECORD_TO\"\nsleep 5\n",
            )
            .unwrap();

            let mut binaries = AccessibleBinaryMap::new();
            binaries.insert(
                "record".to_string(),
                BinaryEntry {
                    owner: Locator::new("record@npm:1.0.0"),
                    path: script,
                },
            );
            binaries.insert(
                "linger".to_string(),
                BinaryEntry {
                    owner: Locator::new("linger@npm:1.0.0"),
                    path: linger,
                },
            );

            let cache = BinaryCache::open(
                root.path().join("cache"),
                Arc::new(FixedBinaries(binaries)),
                CacheOptions {
                    persist: false,
                    ..CacheOptions::default()
                },
            )
            .await
            .unwrap();

            let record = root.path().join("record.txt");
            Self {
                root,
                cache,
                record,
            }
        }

        fn runner(&self) -> Runner<'_> {
            self.runner_with(Signals::channel().1)
        }

        fn runner_with(&self, signals: Signals) -> Runner<'_> {
            let settings = RunnerSettings {
                interpreter: "sh".to_string(),
                ..RunnerSettings::default()
            };
            let mut env = env::from_process();
            env.insert(OsString::from("RECORD_TO"), self.record.clone().into_os_string());
            Runner::new(&self.cache, settings, signals).with_base_env(env)
        }

        fn workspace(&self, scripts: &[(&str, &str)]) -> WorkspaceContext {
            WorkspaceContext {
                working_directory: self.root.path().to_path_buf(),
                declared_scripts: scripts
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<HashMap<_, _>>(),
                owner: Locator::new("app@workspace:."),
            }
        }

        fn request(&self, name: &str, args: &[&str]) -> ExecutionRequest {
            ExecutionRequest {
                name: name.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
                working_directory: self.root.path().to_path_buf(),
                ..ExecutionRequest::default()
            }
        }

        /// Resolves once the child has written its record
        async fn child_started(&self) {
            loop {
                let content = std::fs::read_to_string(&self.record).unwrap_or_default();
                if content.ends_with('\n') {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        }

        /// Shim folder seen by the child, then its arguments
        fn recorded(&self) -> (PathBuf, Vec<String>) {
            let content = std::fs::read_to_string(&self.record).unwrap();
            let mut lines = content.lines().map(str::to_string);
            let folder = PathBuf::from(lines.next().unwrap());
            (folder, lines.collect())
        }
    }

    #[tokio::test]
    async fn binary_runs_and_shims_are_removed() {
        let fx = Fixture::new().await;

        let code = fx
            .runner()
            .run(&fx.request("record", &["a", "b c"]), &fx.workspace(&[]))
            .await
            .unwrap();

        assert_eq!(code, 0);
        let (folder, args) = fx.recorded();
        assert_eq!(args, vec!["a", "b c"]);
        assert!(!folder.exists());
    }

    #[tokio::test]
    async fn script_reaches_binaries_through_shims() {
        let fx = Fixture::new().await;
        let ws = fx.workspace(&[("hello", "sh -c record")]);

        let code = fx.runner().run(&fx.request("hello", &[]), &ws).await.unwrap();

        assert_eq!(code, 0);
        let (folder, args) = fx.recorded();
        assert!(args.is_empty());
        assert!(!folder.as_os_str().is_empty());
        assert!(!folder.exists());
    }

    #[tokio::test]
    async fn script_naming_binary_gets_trailing_args() {
        let fx = Fixture::new().await;
        let ws = fx.workspace(&[("rec", "record --first")]);

        fx.runner()
            .run(&fx.request("rec", &["--second"]), &ws)
            .await
            .unwrap();

        let (_, args) = fx.recorded();
        assert_eq!(args, vec!["--first", "--second"]);
    }

    #[tokio::test]
    async fn exit_code_passes_through_and_shims_still_removed() {
        let fx = Fixture::new().await;
        let ws = fx.workspace(&[("fail", "sh -c \"record;exit 7\"")]);

        // naive tokenization hands the shell `sh -c "record;exit 7"`
        let code = fx.runner().run(&fx.request("fail", &[]), &ws).await.unwrap();

        assert_eq!(code, 7);
        let (folder, _) = fx.recorded();
        assert!(!folder.exists());
    }

    #[tokio::test]
    async fn unknown_name_reports_shell_exit_code() {
        let fx = Fixture::new().await;

        let code = fx
            .runner()
            .run(
                &fx.request("lightrun-definitely-not-a-command", &[]),
                &fx.workspace(&[]),
            )
            .await
            .unwrap();

        assert_eq!(code, 127);
    }

    #[tokio::test]
    async fn exec_prefers_shims() {
        let fx = Fixture::new().await;

        let code = fx
            .runner()
            .exec("record", vec!["x".to_string()], fx.root.path(), &fx.workspace(&[]))
            .await
            .unwrap();

        assert_eq!(code, 0);
        let (_, args) = fx.recorded();
        assert_eq!(args, vec!["x"]);
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let fx = Fixture::new().await;
        let settings = RunnerSettings {
            interpreter: "lightrun-no-such-interpreter".to_string(),
            ..RunnerSettings::default()
        };
        let mut runner = Runner::new(&fx.cache, settings, Signals::channel().1);

        let err = runner
            .run(&fx.request("record", &[]), &fx.workspace(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, LightrunError::InterpreterNotFound { .. }));
    }

    #[tokio::test]
    async fn dropped_run_removes_shims() {
        let fx = Fixture::new().await;
        let mut runner = fx.runner();
        let request = fx.request("linger", &[]);
        let ws = fx.workspace(&[]);

        tokio::select! {
            _ = runner.run(&request, &ws) => panic!("linger exited on its own"),
            () = fx.child_started() => {}
        }

        let (folder, _) = fx.recorded();
        assert!(!folder.exists());
    }

    #[tokio::test]
    async fn terminate_reaches_child_and_shims_are_removed() {
        let fx = Fixture::new().await;
        let (tx, signals) = Signals::channel();
        let mut runner = fx.runner_with(signals);
        let request = fx.request("linger", &[]);
        let ws = fx.workspace(&[]);

        let send = async {
            fx.child_started().await;
            tx.send(Shutdown::Terminate).unwrap();
        };
        let (code, ()) = tokio::join!(runner.run(&request, &ws), send);

        // the interpreter's own death by SIGTERM
        assert_eq!(code.unwrap(), 128 + 15);
        let (folder, _) = fx.recorded();
        assert!(!folder.exists());
    }

    #[tokio::test]
    async fn signal_during_setup_cancels_before_spawn() {
        let fx = Fixture::new().await;
        let (tx, signals) = Signals::channel();
        tx.send(Shutdown::Interrupt).unwrap();

        let err = fx
            .runner_with(signals)
            .run(&fx.request("record", &[]), &fx.workspace(&[]))
            .await
            .unwrap_err();

        assert!(matches!(err, LightrunError::Cancelled));
        assert!(!fx.record.exists());
    }

    #[test]
    fn inspect_flags_precede_script() {
        let mut request = ExecutionRequest::default();
        request.inspect.inspect_brk = Some(None);

        let launch = interpreter_launch(
            Path::new("/usr/bin/node"),
            &request,
            PathBuf::from("/deps/webpack/bin.js"),
            vec!["--watch".to_string()],
        );
        assert_eq!(
            launch,
            Launch::Argv {
                program: PathBuf::from("/usr/bin/node"),
                args: vec![
                    "--inspect-brk".to_string(),
                    "/deps/webpack/bin.js".to_string(),
                    "--watch".to_string(),
                ],
            }
        );
    }
}
