//! Child environment composition
//!
//! The child sees the caller's environment with three changes: the shim
//! directory leads the search path, the dependency loader is preloaded
//! through `NODE_OPTIONS` when the project has one, and
//! `LIGHTRUN_BIN_FOLDER` points at the shim directory.

use crate::error::{LightrunError, LightrunResult};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use tracing::debug;

/// Full environment handed to a child process
pub type EnvMap = BTreeMap<OsString, OsString>;

/// Variable exposing the shim directory to scripts
pub const BIN_FOLDER_VAR: &str = "LIGHTRUN_BIN_FOLDER";

const PATH_VAR: &str = "PATH";
const NODE_OPTIONS_VAR: &str = "NODE_OPTIONS";

/// Snapshot of the current process environment
pub fn from_process() -> EnvMap {
    std::env::vars_os().collect()
}

/// Build the child environment from `base`
pub fn compose(
    mut env: EnvMap,
    shim_dir: &Path,
    pnp_loader: Option<&Path>,
) -> LightrunResult<EnvMap> {
    prepend_path(&mut env, shim_dir)?;

    if let Some(loader) = pnp_loader {
        append_require(&mut env, loader);
    }

    env.insert(OsString::from(BIN_FOLDER_VAR), shim_dir.as_os_str().to_owned());
    Ok(env)
}

/// Name of the search path variable as it appears in `env`
///
/// Windows treats variable names case-insensitively and commonly spells it
/// `Path`; reuse whatever spelling is present so no duplicate is created.
fn path_key(env: &EnvMap) -> OsString {
    if cfg!(windows) {
        if let Some(key) = env
            .keys()
            .find(|k| k.to_string_lossy().eq_ignore_ascii_case(PATH_VAR))
        {
            return key.clone();
        }
    }
    OsString::from(PATH_VAR)
}

fn prepend_path(env: &mut EnvMap, dir: &Path) -> LightrunResult<()> {
    let key = path_key(env);

    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = env.get(&key) {
        paths.extend(std::env::split_paths(existing));
    }

    let joined = std::env::join_paths(paths).map_err(|e| {
        LightrunError::setup(
            format!("adding {} to {}", dir.display(), PATH_VAR),
            io::Error::new(io::ErrorKind::InvalidInput, e),
        )
    })?;

    debug!("Prepended {} to {}", dir.display(), PATH_VAR);
    env.insert(key, joined);
    Ok(())
}

fn append_require(env: &mut EnvMap, loader: &Path) {
    let mut flag = OsString::from("--require ");
    flag.push(quote_if_needed(loader.as_os_str()));

    let value = match env.get(OsStr::new(NODE_OPTIONS_VAR)) {
        Some(existing) if !existing.to_string_lossy().trim().is_empty() => {
            let mut value = existing.clone();
            value.push(" ");
            value.push(flag);
            value
        }
        _ => flag,
    };

    env.insert(OsString::from(NODE_OPTIONS_VAR), value);
}

/// `NODE_OPTIONS` is split on whitespace unless the value is double-quoted
fn quote_if_needed(value: &OsStr) -> OsString {
    let text = value.to_string_lossy();
    if text.contains(char::is_whitespace) {
        OsString::from(format!("\"{}\"", text))
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;

    fn base(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    fn get<'a>(env: &'a EnvMap, key: &str) -> Option<&'a OsString> {
        env.get(OsStr::new(key))
    }

    #[test]
    fn shim_dir_leads_search_path() {
        let existing = std::env::join_paths(["/usr/bin", "/bin"]).unwrap();
        let mut env = EnvMap::new();
        env.insert(OsString::from("PATH"), existing);

        let env = compose(env, Path::new("/tmp/shims"), None).unwrap();

        let paths: Vec<PathBuf> = std::env::split_paths(get(&env, "PATH").unwrap()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/tmp/shims"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
            ]
        );
    }

    #[test]
    fn missing_path_becomes_shim_dir() {
        let env = compose(EnvMap::new(), Path::new("/tmp/shims"), None).unwrap();
        assert_eq!(get(&env, "PATH").unwrap(), "/tmp/shims");
    }

    #[test]
    fn require_flag_appended_to_existing_options() {
        let env = base(&[("NODE_OPTIONS", "--max-old-space-size=4096")]);
        let env = compose(env, Path::new("/tmp/shims"), Some(Path::new("/repo/.pnp.js"))).unwrap();

        assert_eq!(
            get(&env, "NODE_OPTIONS").unwrap(),
            "--max-old-space-size=4096 --require /repo/.pnp.js"
        );
    }

    #[test]
    fn require_flag_without_prior_options_has_no_leading_space() {
        let env = compose(EnvMap::new(), Path::new("/tmp/shims"), Some(Path::new("/repo/.pnp.js")))
            .unwrap();
        assert_eq!(get(&env, "NODE_OPTIONS").unwrap(), "--require /repo/.pnp.js");
    }

    #[test]
    fn conflicting_require_flags_are_kept() {
        let env = base(&[("NODE_OPTIONS", "--require /other/.pnp.js")]);
        let env = compose(env, Path::new("/tmp/shims"), Some(Path::new("/repo/.pnp.js"))).unwrap();

        assert_eq!(
            get(&env, "NODE_OPTIONS").unwrap(),
            "--require /other/.pnp.js --require /repo/.pnp.js"
        );
    }

    #[test]
    fn loader_path_with_spaces_is_quoted() {
        let env = compose(
            EnvMap::new(),
            Path::new("/tmp/shims"),
            Some(Path::new("/my repo/.pnp.js")),
        )
        .unwrap();
        assert_eq!(
            get(&env, "NODE_OPTIONS").unwrap(),
            "--require \"/my repo/.pnp.js\""
        );
    }

    #[test]
    fn no_loader_leaves_node_options_alone() {
        let env = base(&[("NODE_OPTIONS", "--enable-source-maps")]);
        let env = compose(env, Path::new("/tmp/shims"), None).unwrap();
        assert_eq!(get(&env, "NODE_OPTIONS").unwrap(), "--enable-source-maps");
    }

    #[test]
    fn other_variables_pass_through() {
        let env = base(&[("HOME", "/home/dev"), ("CI", "1")]);
        let env = compose(env, Path::new("/tmp/shims"), None).unwrap();

        assert_eq!(get(&env, "HOME").unwrap(), "/home/dev");
        assert_eq!(get(&env, "CI").unwrap(), "1");
        assert_eq!(get(&env, BIN_FOLDER_VAR).unwrap(), "/tmp/shims");
    }

    #[cfg(unix)]
    #[test]
    fn separator_in_shim_dir_is_setup_failure() {
        let err = compose(EnvMap::new(), Path::new("/tmp/a:b"), None).unwrap_err();
        assert!(matches!(err, LightrunError::EnvironmentSetup { .. }));
    }

    #[test]
    #[serial]
    fn snapshot_reflects_process_environment() {
        std::env::set_var("LIGHTRUN_ENV_TEST", "present");
        let env = from_process();
        std::env::remove_var("LIGHTRUN_ENV_TEST");

        assert_eq!(get(&env, "LIGHTRUN_ENV_TEST").unwrap(), "present");
    }
}
