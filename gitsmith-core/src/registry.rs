//! Registry of supported operations.
//!
//! Maps operation names to their [`Operation`] implementations. The
//! dispatcher only ever looks operations up by name, so new operations are
//! added here without touching dispatch logic.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::operation::Operation;
use crate::operations;
use crate::schema::InputSchema;

/// No operation is registered under the requested name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation: {name}")]
pub struct UnknownOperation {
    pub name: String,
}

/// Catalogue entry describing one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: InputSchema,
}

/// Registry of operations keyed by name.
///
/// # Example
///
/// ```
/// use gitsmith_core::OperationRegistry;
///
/// let registry = OperationRegistry::with_defaults();
/// let op = registry.lookup("list_repositories").unwrap();
/// assert_eq!(op.name(), "list_repositories");
/// assert!(registry.lookup("delete_everything").is_err());
/// ```
#[derive(Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<&'static str, Arc<dyn Operation>>,
}

impl OperationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in GitHub operations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for operation in operations::builtin() {
            registry.register(operation);
        }
        registry
    }

    /// Register an operation.
    ///
    /// An operation with the same name is replaced.
    pub fn register(&mut self, operation: Arc<dyn Operation>) {
        self.operations.insert(operation.name(), operation);
    }

    /// Find an operation by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Operation>, UnknownOperation> {
        self.operations
            .get(name)
            .cloned()
            .ok_or_else(|| UnknownOperation {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Describe every operation, sorted by name.
    pub fn describe(&self) -> Vec<OperationDescriptor> {
        self.names()
            .into_iter()
            .filter_map(|name| self.operations.get(name))
            .map(|op| OperationDescriptor {
                name: op.name(),
                description: op.description(),
                parameters: op.schema().clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
