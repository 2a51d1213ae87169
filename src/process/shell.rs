//! Platform shell used for raw command lines

use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Shell program plus the flags that make it run one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: PathBuf,
    flags: Vec<String>,
}

impl ShellCommand {
    /// `/bin/sh -c` on unix, `%ComSpec% /d /s /c` on Windows
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            let comspec = std::env::var_os("ComSpec")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cmd.exe"));
            Self::new(comspec)
        } else {
            Self::new("/bin/sh")
        }
    }

    /// Use `program`, choosing flags by whether it is `cmd`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let flags = if is_cmd(&program) {
            vec!["/d".to_string(), "/s".to_string(), "/c".to_string()]
        } else {
            vec!["-c".to_string()]
        };
        Self { program, flags }
    }

    /// Honour a configured override, else the platform default
    pub fn from_config(program: Option<&Path>) -> Self {
        program.map_or_else(Self::platform_default, Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Command that runs `command_line` through this shell
    pub fn command(&self, command_line: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.flags);
        self.push_line(&mut cmd, command_line);
        cmd
    }

    #[cfg(windows)]
    fn push_line(&self, cmd: &mut Command, command_line: &str) {
        // `cmd /s /c` strips exactly one pair of outer quotes and runs the rest
        // verbatim, so the line must not be re-escaped by argv quoting.
        if is_cmd(&self.program) {
            cmd.raw_arg(format!("\"{}\"", command_line));
        } else {
            cmd.arg(command_line);
        }
    }

    #[cfg(not(windows))]
    fn push_line(&self, cmd: &mut Command, command_line: &str) {
        cmd.arg(command_line);
    }
}

fn is_cmd(program: &Path) -> bool {
    program
        .file_stem()
        .map(|stem| stem.to_string_lossy().eq_ignore_ascii_case("cmd"))
        .unwrap_or(false)
}
