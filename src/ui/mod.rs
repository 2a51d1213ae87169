//! Styled status output on stderr
//!
//! stdout belongs to the child process, so every message lightrun prints
//! itself goes to stderr. Fancy symbols are used on a terminal; CI and pipes
//! get bracketed plain prefixes.

mod context;
mod output;

pub use context::UiContext;
pub use output::{error, hint, key_value, step_info, step_ok};
