use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::sys::NativeApi;

/// Environment variable selecting the backend (`reference`, `libtorch`)
pub const BACKEND_ENV: &str = "TORCH_BRIDGE_BACKEND";
/// Environment variable enabling strict error-channel checks (`1`/`true`)
pub const STRICT_ERRORS_ENV: &str = "TORCH_BRIDGE_STRICT_ERRORS";

/// Native engine backing tensors and operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backend {
    /// In-process CPU engine shipped with this crate
    Reference,
    /// LibTorchSharp (requires the `libtorch` feature)
    LibTorch,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Reference
    }
}

impl Backend {
    /// Function table of this backend.
    pub fn api(self) -> Result<&'static NativeApi> {
        match self {
            Backend::Reference => Ok(&crate::engine::REFERENCE_API),
            #[cfg(feature = "libtorch")]
            Backend::LibTorch => Ok(&crate::sys::libtorch::LIBTORCH_API),
            #[cfg(not(feature = "libtorch"))]
            Backend::LibTorch => Err(Error::Config(
                "backend 'libtorch' requires the `libtorch` feature".to_string(),
            )),
        }
    }
}

/// Options for the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Engine used for new tensors and operators
    pub backend: Backend,
    /// Fail construction when the error slot already holds a diagnostic,
    /// instead of discarding it with a warning
    pub strict_error_channel: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Reference,
            strict_error_channel: false,
        }
    }
}

impl BridgeOptions {
    /// Create a new options object
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend
    pub fn set_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Enable or disable strict error-channel checks
    pub fn strict_error_channel(mut self, strict: bool) -> Self {
        self.strict_error_channel = strict;
        self
    }

    /// Load options from `TORCH_BRIDGE_*` environment variables, falling back
    /// to defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the configured backend's function table.
    pub fn api(&self) -> Result<&'static NativeApi> {
        let api = self.backend.api()?;
        log::debug!("using native engine '{}'", api.name);
        Ok(api)
    }

    fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = lookup(BACKEND_ENV) {
            options.backend = Backend::from_str(value.trim())
                .map_err(|_| Error::Config(format!("{}: unknown backend '{}'", BACKEND_ENV, value)))?;
        }

        if let Some(value) = lookup(STRICT_ERRORS_ENV) {
            options.strict_error_channel = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(Error::Config(format!(
                        "{}: expected a boolean, got '{}'",
                        STRICT_ERRORS_ENV, other
                    )))
                }
            };
        }

        Ok(options)
    }
}
