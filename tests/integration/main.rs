//! Integration tests for lightrun

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn lightrun() -> Command {
        cargo_bin_cmd!("lightrun")
    }

    #[test]
    fn help_displays() {
        lightrun()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run workspace scripts"));
    }

    #[test]
    fn version_displays() {
        lightrun()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("lightrun"));
    }

    #[test]
    fn run_help_lists_flags() {
        lightrun()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--binaries-only"))
            .stdout(predicate::str::contains("--inspect-brk"));
    }

    #[test]
    fn run_requires_name() {
        lightrun().arg("run").assert().failure();
    }

    #[test]
    fn unknown_hook_fails() {
        lightrun().args(["hook", "before-install"]).assert().failure();
    }
}

#[cfg(unix)]
mod workspace_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Package with one dependency binary, `hello`, run through `sh`
    struct Workspace {
        root: TempDir,
        config: PathBuf,
        cache_dir: PathBuf,
    }

    impl Workspace {
        fn new(scripts: &str) -> Self {
            let root = TempDir::new().unwrap();
            let app = root.path().join("app");
            let dep = app.join("node_modules/hello");
            fs::create_dir_all(dep.join("bin")).unwrap();

            fs::write(
                app.join("package.json"),
                format!(
                    r#"{{"name": "app", "scripts": {{{scripts}}}, "dependencies": {{"hello": "^1.0.0"}}}}"#
                ),
            )
            .unwrap();
            fs::write(
                dep.join("package.json"),
                r#"{"name": "hello", "version": "1.0.0", "bin": {"hello": "bin/hello.sh"}}"#,
            )
            .unwrap();
            fs::write(dep.join("bin/hello.sh"), "echo \"hello $*\"\n").unwrap();

            let cache_dir = root.path().join("cache");
            let config = root.path().join("config.toml");
            fs::write(
                &config,
                format!(
                    "[cache]\ndirectory = {:?}\n\n[runtime]\ninterpreter = \"sh\"\n",
                    cache_dir.display().to_string()
                ),
            )
            .unwrap();

            Self {
                root,
                config,
                cache_dir,
            }
        }

        fn app(&self) -> PathBuf {
            self.root.path().join("app")
        }

        fn lightrun(&self, dir: &Path) -> Command {
            let mut cmd = cargo_bin_cmd!("lightrun");
            cmd.current_dir(dir).env("LIGHTRUN_CONFIG", &self.config);
            cmd
        }
    }

    #[test]
    fn runs_dependency_binary() {
        let ws = Workspace::new("");
        ws.lightrun(&ws.app())
            .args(["run", "hello", "world"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello world"));
    }

    #[test]
    fn runs_declared_script_through_shell() {
        let ws = Workspace::new(r#""greet": "echo from-script""#);
        ws.lightrun(&ws.app())
            .args(["run", "greet", "extra"])
            .assert()
            .success()
            .stdout(predicate::str::contains("from-script extra"));
    }

    #[test]
    fn script_sees_binaries_on_path() {
        let ws = Workspace::new(r#""wrap": "sh -c hello""#);
        ws.lightrun(&ws.app())
            .args(["run", "wrap"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello"));
    }

    #[test]
    fn binaries_only_ignores_scripts() {
        let ws = Workspace::new(r#""hello": "echo remapped""#);
        ws.lightrun(&ws.app())
            .args(["run", "-B", "hello"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello").and(predicate::str::contains("remapped").not()));
    }

    #[test]
    fn unknown_name_exits_127() {
        let ws = Workspace::new("");
        ws.lightrun(&ws.app())
            .args(["run", "lightrun-definitely-not-a-command"])
            .assert()
            .code(127);
    }

    #[test]
    fn script_exit_code_passes_through() {
        let ws = Workspace::new(r#""fail": "exit 3""#);
        ws.lightrun(&ws.app())
            .args(["run", "fail"])
            .assert()
            .code(3);
    }

    #[test]
    fn outside_a_package_is_setup_failure() {
        let ws = Workspace::new("");
        ws.lightrun(ws.root.path())
            .args(["run", "hello"])
            .assert()
            .code(125)
            .stderr(predicate::str::contains("No package.json"));
    }

    #[test]
    fn exec_runs_command_with_shims() {
        let ws = Workspace::new("");
        ws.lightrun(&ws.app())
            .args(["exec", "hello", "from-exec"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello from-exec"));
    }

    #[test]
    fn cache_path_uses_config() {
        let ws = Workspace::new("");
        ws.lightrun(&ws.app())
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(ws.cache_dir.display().to_string()));
    }

    #[test]
    fn hook_clears_cached_workspaces() {
        let ws = Workspace::new("");
        ws.lightrun(&ws.app())
            .args(["run", "hello"])
            .assert()
            .success();

        ws.lightrun(&ws.app())
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("app"));

        ws.lightrun(&ws.app())
            .args(["hook", "after-install"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Invalidating lightweight cache"));

        ws.lightrun(&ws.app())
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        // lock files go with their records
        assert_eq!(fs::read_dir(&ws.cache_dir).unwrap().count(), 0);
    }
}
