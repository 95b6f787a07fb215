use std::env;

/// Environment variable that turns on skip diagnostics on stderr.
pub const DEBUG_ENV_VAR: &str = "BITEYDEBUG";

/// Options controlling which functions get wrapped and how failures are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapOptions {
    /// Print unwrappable functions and the reason to stderr.
    pub debug: bool,
    /// Functions whose name starts with this prefix are internal and never wrapped.
    pub internal_prefix: String,
}

impl Default for WrapOptions {
    fn default() -> Self {
        WrapOptions {
            debug: false,
            internal_prefix: "_".to_string(),
        }
    }
}

impl WrapOptions {
    /// Default options, with `debug` set when `BITEYDEBUG` is present in the environment.
    pub fn from_env() -> Self {
        WrapOptions {
            debug: env::var_os(DEBUG_ENV_VAR).is_some(),
            ..WrapOptions::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
