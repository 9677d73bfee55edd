//! Configuration file loading and process-exit-code plumbing.
//! The `key.path = value` grammar itself belongs to `rtcomp_core::Properties`;
//! this module layers the recognized top-level sections, the
//! `<MANAGER>_CONFIG`/`<MANAGER>_DEBUG` environment overrides, and logging
//! bootstrap on top of it.

use std::env;
use std::path::PathBuf;

use rtcomp_core::{Properties, Result, RtcError};

pub const CONFIG_ENV_VAR: &str = "RTCOMP_MANAGER_CONFIG";
pub const DEBUG_ENV_VAR: &str = "RTCOMP_MANAGER_DEBUG";

/// Process exit codes for the manager binary. Component-reported fatal
/// errors use `64 + n` directly rather than a named variant (the `n` is the
/// component's own choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Normal = 0,
    InitFailure = 1,
    ConfigParseError = 2,
    BrokerInitFailure = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub fn component_fatal_code(n: u8) -> i32 {
    64 + i32::from(n)
}

/// The parsed, typed view of a configuration file's recognized sections.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub module_load_path: Vec<PathBuf>,
    pub preload_modules: Vec<String>,
    pub preconnect: Vec<(String, String)>,
    pub naming_schemes: Vec<String>,
    pub naming_format: String,
    pub exec_context_type: String,
    pub exec_context_rate_hz: f64,
    pub logger_enable: bool,
    pub logger_file_name: Option<String>,
    pub debug: bool,
    /// The full tree `self` was parsed from, kept so [`install_logging`] can
    /// delegate to `rtcomp_core::logging` instead of re-deriving `logger.*`.
    properties: Properties,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            module_load_path: Vec::new(),
            preload_modules: Vec::new(),
            preconnect: Vec::new(),
            naming_schemes: vec!["mem".to_string()],
            naming_format: "%n".to_string(),
            exec_context_type: "PeriodicExecutionContext".to_string(),
            exec_context_rate_hz: 1000.0,
            logger_enable: true,
            logger_file_name: None,
            debug: false,
            properties: Properties::new_root(),
        }
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

impl ManagerConfig {
    pub fn from_properties(props: &Properties) -> Self {
        let mut config = Self::default();

        if props.has("manager.modules.load_path") {
            config.module_load_path = props
                .get("manager.modules.load_path")
                .split(':')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if props.has("manager.modules.preload") {
            config.preload_modules = split_csv(&props.get("manager.modules.preload"));
        }
        if props.has("manager.components.preconnect") {
            config.preconnect = split_csv(&props.get("manager.components.preconnect"))
                .into_iter()
                .filter_map(|pair| pair.split_once(':').map(|(a, b)| (a.to_string(), b.to_string())))
                .collect();
        }
        if props.has("naming.type") {
            config.naming_schemes = split_csv(&props.get("naming.type"));
        }
        if props.has("naming.formats") {
            config.naming_format = props.get("naming.formats");
        }
        if props.has("exec_cxt.periodic.type") {
            config.exec_context_type = props.get("exec_cxt.periodic.type");
        }
        if props.has("exec_cxt.periodic.rate") {
            if let Ok(rate) = props.get("exec_cxt.periodic.rate").parse::<f64>() {
                config.exec_context_rate_hz = rate;
            }
        }
        if props.has("logger.enable") {
            config.logger_enable = props.get("logger.enable").eq_ignore_ascii_case("yes");
        }
        if props.has("logger.file_name") {
            config.logger_file_name = Some(props.get("logger.file_name"));
        }
        config.properties = props.clone();
        config
    }
}

fn parse_config_flag(argv: &[String]) -> Option<String> {
    argv.iter().position(|a| a == "--config").and_then(|i| argv.get(i + 1)).cloned()
}

/// Resolve the config path (`RTCOMP_MANAGER_CONFIG` beats `argv`'s
/// `--config`), parse it, and layer `RTCOMP_MANAGER_DEBUG=1` on top. A
/// missing `--config`/env var is not an error — the Manager starts with
/// defaults, so it works with zero configuration.
pub fn load_config(argv: &[String]) -> Result<ManagerConfig> {
    let config_path = env::var(CONFIG_ENV_VAR).ok().or_else(|| parse_config_flag(argv));

    let mut config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| RtcError::bad_parameter(format!("cannot read config file {path}: {e}")))?;
            ManagerConfig::from_properties(&Properties::load(&text))
        }
        None => ManagerConfig::default(),
    };

    if env::var(DEBUG_ENV_VAR).as_deref() == Ok("1") {
        config.debug = true;
    }
    Ok(config)
}

/// Delegate to `rtcomp_core::logging::init_from_properties`, which is the
/// one place `logger.file_name`'s `%p`/`%h` substitution and file-vs-stdout
/// destination logic actually live. `RTCOMP_MANAGER_DEBUG=1` is folded into
/// `logger.log_level` before handing the tree over, and `logger.enable` is
/// set as a default (not an override) so an explicit value from the config
/// file still wins. Safe to call more than once per process — only the
/// first call wins, matching `tracing`'s own set-global-default-once
/// contract; callers only reach this once anyway, guarded by the Manager's
/// own singleton init.
pub fn install_logging(config: &ManagerConfig) {
    let mut props = config.properties.clone();
    props.set_default("logger.enable", if config.logger_enable { "yes" } else { "no" });
    if config.debug {
        props.set("logger.log_level", "debug");
    }
    rtcomp_core::logging::init_from_properties(&props);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_recognized_sections() {
        let text = "manager.modules.load_path = /a:/b\n\
                     manager.modules.preload = Echo, Logger\n\
                     manager.components.preconnect = out1:in1, out2:in2\n\
                     naming.type = corba, mem\n\
                     exec_cxt.periodic.rate = 50\n\
                     logger.enable = NO\n";
        let config = ManagerConfig::from_properties(&Properties::load(text));
        assert_eq!(config.module_load_path, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(config.preload_modules, vec!["Echo".to_string(), "Logger".to_string()]);
        assert_eq!(config.preconnect, vec![("out1".to_string(), "in1".to_string()), ("out2".to_string(), "in2".to_string())]);
        assert_eq!(config.naming_schemes, vec!["corba".to_string(), "mem".to_string()]);
        assert_eq!(config.exec_context_rate_hz, 50.0);
        assert!(!config.logger_enable);
    }

    #[test]
    fn missing_sections_keep_defaults() {
        let config = ManagerConfig::from_properties(&Properties::new_root());
        assert_eq!(config.exec_context_rate_hz, 1000.0);
        assert!(config.logger_enable);
    }

    #[test]
    fn logger_file_name_is_parsed_into_the_typed_config() {
        let text = "logger.file_name = /var/log/manager-%p-%h.log\n";
        let config = ManagerConfig::from_properties(&Properties::load(text));
        assert_eq!(config.logger_file_name.as_deref(), Some("/var/log/manager-%p-%h.log"));
    }
}
