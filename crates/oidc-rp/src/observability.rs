//! Log output for the engine and its command-line front end.
//!
//! # Overview
//!
//! Levels are given the way [`OidcSettings::log_level`](crate::OidcSettings)
//! holds them. A bare level such as `debug` is scoped to this crate and the
//! CLI, while every other crate stays at [`DEFAULT_LEVEL`]. Anything
//! containing `=` or `,` is taken as a full `EnvFilter` directive string.
//! `RUST_LOG`, when set, replaces both.
//!
//! The filter sits behind a reload layer so [`apply_logging_level`] can
//! change it after settings are loaded.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Level for dependencies, and for this crate when nothing is configured.
pub const DEFAULT_LEVEL: &str = "warn";

const SCOPED_TARGETS: [&str; 2] = ["oidc_rp", "oidc_rp_cli"];

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Expand a configured level into filter directives.
fn directives(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return DEFAULT_LEVEL.to_string();
    }
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut out = String::from(DEFAULT_LEVEL);
    for target in SCOPED_TARGETS {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

/// Build the filter for `level`, falling back to [`DEFAULT_LEVEL`] when the
/// directives do not parse.
pub fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_new(directives(level)).unwrap_or_else(|e| {
        eprintln!("Ignoring log level {level:?}: {e}");
        EnvFilter::new(DEFAULT_LEVEL)
    })
}

/// Installs the global subscriber writing to stderr.
///
/// Calling it again, or after another subscriber was installed, does nothing.
pub fn init_tracing_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(level));

    let (reload_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Swap in the filter for `level`. Returns `false` before
/// [`init_tracing_with_level`] has run.
pub fn apply_logging_level(level: &str) -> bool {
    FILTER_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|f| *f = filter_for(level)).is_ok())
}
