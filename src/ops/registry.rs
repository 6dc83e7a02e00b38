use crate::error::{Error, Result};
use crate::sys::{NativeApi, OperatorEntry};

/// Lookup of the operators an engine can construct
#[derive(Debug, Clone, Copy)]
pub struct OperatorRegistry {
    api: &'static NativeApi,
}

impl OperatorRegistry {
    /// Registry over the operator table of `api`
    pub fn new(api: &'static NativeApi) -> Self {
        Self { api }
    }

    /// Engine this registry describes
    pub fn api(&self) -> &'static NativeApi {
        self.api
    }

    /// Get an operator by name
    pub fn get_operator(&self, name: &str) -> Option<&'static OperatorEntry> {
        self.api.operators.iter().find(|entry| entry.name == name)
    }

    /// Get an operator by name, failing if the engine does not export it
    pub fn require(&self, name: &str) -> Result<&'static OperatorEntry> {
        self.get_operator(name).ok_or_else(|| {
            Error::UnsupportedOperator(format!(
                "Operator {} not exported by engine '{}'",
                name, self.api.name
            ))
        })
    }

    /// Whether the engine exports `name`
    pub fn contains(&self, name: &str) -> bool {
        self.get_operator(name).is_some()
    }

    /// Names of all exported operators, in table order
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.api.operators.iter().map(|entry| entry.name)
    }
}
