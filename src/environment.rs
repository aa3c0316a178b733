//! Production flag source.
//!
//! The gate asks for the environment once per cycle. Nothing here caches
//! the answer, so flipping `CB0TENV` takes effect on the next cycle.

use crate::types::Environment;

#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentSignal: Send + Sync {
    fn current(&self) -> Environment;
}

/// Reads an environment variable on every call. Unset means `DEV`.
#[derive(Debug, Clone)]
pub struct EnvVarSignal {
    var_name: String,
}

impl EnvVarSignal {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }

    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl Default for EnvVarSignal {
    fn default() -> Self {
        Self::new("CB0TENV")
    }
}

impl EnvironmentSignal for EnvVarSignal {
    fn current(&self) -> Environment {
        match std::env::var(&self.var_name) {
            Ok(raw) => Environment::parse(&raw),
            Err(_) => Environment::Dev,
        }
    }
}

/// Fixed environment, for tests and one-off runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticEnvironment(pub Environment);

impl EnvironmentSignal for StaticEnvironment {
    fn current(&self) -> Environment {
        self.0
    }
}
