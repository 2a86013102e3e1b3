//! Terminal detection

use is_terminal::IsTerminal;
use std::env;
use std::io::stdout;

/// Whether stdout is an interactive terminal outside CI
pub fn is_interactive() -> bool {
    if !stdout().is_terminal() {
        return false;
    }
    if is_ci_environment() {
        return false;
    }
    env::var("TERM").unwrap_or_default() != "dumb"
}

fn is_ci_environment() -> bool {
    ["CI", "CONTINUOUS_INTEGRATION", "GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE"]
        .iter()
        .any(|var| env::var_os(var).is_some())
}

/// Disable colors when output is piped or `NO_COLOR` is set
pub fn configure_colors() {
    if env::var_os("NO_COLOR").is_some() || !is_interactive() {
        colored::control::set_override(false);
    }
}
