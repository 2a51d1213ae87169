//! Launcher wrappers for accessible binaries
//!
//! Every binary gets two wrappers in the shim directory:
//! - `<name>`: POSIX shell script, mode 0755
//! - `<name>.cmd`: native command-shell batch file
//!
//! Both call the interpreter with the binary's script path followed by the
//! caller's arguments, untouched. The OS picks whichever form it understands.

mod dir;

pub use dir::ShimDirectory;

use crate::error::{LightrunError, LightrunResult};
use crate::project::AccessibleBinaryMap;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Write one wrapper pair per binary into `target`
pub async fn materialize(
    binaries: &AccessibleBinaryMap,
    target: &Path,
    interpreter: &Path,
) -> LightrunResult<()> {
    for (name, entry) in binaries {
        validate_name(name)?;

        let posix = target.join(name);
        fs::write(&posix, posix_wrapper(interpreter, &entry.path))
            .await
            .map_err(|e| LightrunError::setup(format!("writing shim {}", posix.display()), e))?;
        set_executable(&posix).await?;

        let cmd = target.join(format!("{name}.cmd"));
        fs::write(&cmd, cmd_wrapper(interpreter, &entry.path))
            .await
            .map_err(|e| LightrunError::setup(format!("writing shim {}", cmd.display()), e))?;
    }

    debug!("Wrote {} shims to {}", binaries.len(), target.display());
    Ok(())
}

/// A binary name must produce a file directly inside the shim directory
fn validate_name(name: &str) -> LightrunResult<()> {
    let invalid = name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']);
    if invalid {
        return Err(LightrunError::setup(
            format!("invalid binary name {name:?}"),
            io::Error::new(io::ErrorKind::InvalidInput, "binary name is not a file name"),
        ));
    }
    Ok(())
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

fn cmd_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\"").replace('%', "%%"))
}

/// POSIX wrapper forwarding `"$@"` verbatim
pub fn posix_wrapper(interpreter: &Path, target: &Path) -> String {
    format!(
        "#!/bin/sh\nexec {} {} \"$@\"\n",
        sh_quote(&interpreter.to_string_lossy()),
        sh_quote(&target.to_string_lossy())
    )
}

/// Batch wrapper forwarding `%*`
pub fn cmd_wrapper(interpreter: &Path, target: &Path) -> String {
    format!(
        "@{} {} %*\r\n",
        cmd_quote(&interpreter.to_string_lossy()),
        cmd_quote(&target.to_string_lossy())
    )
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> LightrunResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| LightrunError::setup(format!("marking {} executable", path.display()), e))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> LightrunResult<()> {
    Ok(())
}
