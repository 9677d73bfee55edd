//! Logging bootstrap.
//!
//! The Manager drives `tracing-subscriber` from the same `Properties` tree it
//! parses `rtc.conf` into: `logger.enable` gates the subscriber entirely,
//! `logger.log_level` sets the default filter, and `logger.file_name` names a
//! destination with `%p` (pid) and `%h` (hostname) substitution, or the
//! literal value `stdout`. A `<MANAGER>_DEBUG=1` environment variable (the
//! constant prefix is the crate name, upper-cased) forces `debug` regardless
//! of what the config says — an emergency escape hatch for turning on
//! verbose logging without touching the config file.

use std::fs::OpenOptions;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::properties::Properties;

const DEBUG_ENV_VAR: &str = "RTCOMP_DEBUG";

static INIT: Once = Once::new();

fn substitute_tokens(pattern: &str) -> String {
    let pid = std::process::id().to_string();
    let host = hostname();
    pattern.replace("%p", &pid).replace("%h", &host)
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Initialize the global `tracing` subscriber from `logger.*` properties.
/// Safe to call more than once; only the first call takes effect.
pub fn init_from_properties(props: &Properties) {
    if !props.has("logger") && std::env::var(DEBUG_ENV_VAR).is_err() {
        return;
    }
    let enabled = props.get("logger.enable");
    let forced_debug = std::env::var(DEBUG_ENV_VAR).map(|v| v == "1").unwrap_or(false);
    if enabled.eq_ignore_ascii_case("no") && !forced_debug {
        return;
    }

    let default_level = if forced_debug {
        "debug"
    } else {
        let level = props.get("logger.log_level");
        if level.is_empty() {
            "info"
        } else {
            level.leak()
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    INIT.call_once(|| {
        let destination = props.get("logger.file_name");
        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

        if destination.is_empty() || destination == "stdout" {
            builder.init();
        } else {
            let path = substitute_tokens(&destination);
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => {
                    builder.with_writer(move || file.try_clone().expect("clone log file handle")).init();
                }
                Err(_) => builder.init(),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_tokens_replaces_pid_and_host() {
        std::env::set_var("HOSTNAME", "test-host");
        let rendered = substitute_tokens("/var/log/rtc-%p-%h.log");
        assert!(rendered.contains(&std::process::id().to_string()));
        assert!(rendered.contains("test-host"));
    }

    #[test]
    fn init_is_a_no_op_without_logger_config_or_debug_env() {
        std::env::remove_var(DEBUG_ENV_VAR);
        let props = Properties::new_root();
        // Must not panic even though no subscriber is installed.
        init_from_properties(&props);
    }
}
