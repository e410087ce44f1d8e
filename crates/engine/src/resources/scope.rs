use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceSourceKind {
    Directory,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceSource {
    pub kind: ResourceSourceKind,
    pub path: PathBuf,
}

impl ResourceSource {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ResourceSourceKind::Directory,
            path: path.into(),
        }
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ResourceSourceKind::Archive,
            path: path.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource scope '{label}' has no sources")]
    EmptyScope { label: String },
    #[error("resource source {path} rejected: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

/// The external resource manager.
///
/// Registering a scope must be exactly reversed by unregistering its token.
pub trait ResourceSystem: Send + Sync {
    fn register_scope(&self, sources: &[ResourceSource]) -> Result<ScopeToken, ResourceError>;
    fn unregister_scope(&self, token: ScopeToken);
}

/// Owns one registered batch of resource sources and unregisters it on drop.
pub struct ResourceScope {
    system: Arc<dyn ResourceSystem>,
    token: Option<ScopeToken>,
    label: String,
}

impl ResourceScope {
    pub fn acquire(
        system: &Arc<dyn ResourceSystem>,
        label: impl Into<String>,
        sources: &[ResourceSource],
    ) -> Result<Self, ResourceError> {
        let label = label.into();
        if sources.is_empty() {
            return Err(ResourceError::EmptyScope { label });
        }
        let token = system.register_scope(sources)?;
        debug!(scope = %label, token = token.0, source_count = sources.len(), "resource_scope_acquired");
        Ok(Self {
            system: Arc::clone(system),
            token: Some(token),
            label,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn token(&self) -> Option<ScopeToken> {
        self.token
    }

    /// Explicit release; equivalent to dropping but reads better at call
    /// sites where release order matters.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(token) = self.token.take() {
            self.system.unregister_scope(token);
            debug!(scope = %self.label, token = token.0, "resource_scope_released");
        }
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceScope")
            .field("label", &self.label)
            .field("token", &self.token)
            .finish()
    }
}
