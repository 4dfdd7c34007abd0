//! Registry of live child applications, keyed by application name.

use std::collections::BTreeMap;

use tracing::info;

use crate::child::{BoxedChild, ChildHandle};
use crate::{AppError, Result};

/// Exclusive owner of the session's child handles.
#[derive(Default)]
pub struct ChildRegistry {
    children: BTreeMap<String, BoxedChild>,
}

impl ChildRegistry {
    /// Add `child` under its own name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Child` if a child with the same name is registered.
    pub fn register(&mut self, child: BoxedChild) -> Result<()> {
        let name = child.name().to_owned();
        if self.children.contains_key(&name) {
            return Err(AppError::Child(format!("child '{name}' already registered")));
        }
        self.children.insert(name, child);
        Ok(())
    }

    /// Registered application names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.children.keys().map(String::as_str).collect()
    }

    /// Borrow every handle, sorted by name.
    #[must_use]
    pub fn handles(&self) -> Vec<&dyn ChildHandle> {
        self.children.values().map(AsRef::as_ref).collect()
    }

    /// Look up a child by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ChildHandle> {
        self.children.get(name).map(AsRef::as_ref)
    }

    /// Number of registered children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether no child is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Remove every child and shut each one down.
    pub async fn shutdown_all(&mut self) {
        let children = std::mem::take(&mut self.children);
        for (name, child) in children {
            child.shutdown().await;
            info!(child = %name, "child deregistered");
        }
    }
}
