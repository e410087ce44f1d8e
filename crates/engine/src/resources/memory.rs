use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use super::scope::{ResourceError, ResourceSource, ResourceSystem, ScopeToken};

static REGISTRY_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_registry_lock_poison_once() {
    if REGISTRY_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!("resource registry lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEvent {
    Registered(ScopeToken),
    Unregistered(ScopeToken),
}

#[derive(Debug, Default)]
struct Registry {
    next_token: u64,
    active: Vec<(ScopeToken, Vec<ResourceSource>)>,
    history: Vec<ScopeEvent>,
    rejected: Vec<PathBuf>,
}

/// Resource system that only tracks registrations.
///
/// Used by the headless host and by tests that check scope balance.
#[derive(Debug, Default)]
pub struct MemoryResourceSystem {
    registry: Mutex<Registry>,
}

impl MemoryResourceSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any registration that includes `path` fails with [`ResourceError::Rejected`].
    pub fn reject_path(&self, path: impl Into<PathBuf>) {
        self.lock().rejected.push(path.into());
    }

    pub fn active_scopes(&self) -> Vec<ScopeToken> {
        self.lock().active.iter().map(|(token, _)| *token).collect()
    }

    pub fn active_sources(&self) -> Vec<ResourceSource> {
        self.lock()
            .active
            .iter()
            .flat_map(|(_, sources)| sources.iter().cloned())
            .collect()
    }

    pub fn history(&self) -> Vec<ScopeEvent> {
        self.lock().history.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().active.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_registry_lock_poison_once();
                poisoned.into_inner()
            }
        }
    }
}

impl ResourceSystem for MemoryResourceSystem {
    fn register_scope(&self, sources: &[ResourceSource]) -> Result<ScopeToken, ResourceError> {
        let mut registry = self.lock();
        if let Some(source) = sources
            .iter()
            .find(|source| registry.rejected.contains(&source.path))
        {
            return Err(ResourceError::Rejected {
                path: source.path.clone(),
                reason: "source is not readable".to_string(),
            });
        }
        registry.next_token = registry.next_token.saturating_add(1);
        let token = ScopeToken(registry.next_token);
        registry.active.push((token, sources.to_vec()));
        registry.history.push(ScopeEvent::Registered(token));
        Ok(token)
    }

    fn unregister_scope(&self, token: ScopeToken) {
        let mut registry = self.lock();
        let before = registry.active.len();
        registry.active.retain(|(active, _)| *active != token);
        if registry.active.len() == before {
            warn!(token = token.0, "unregister of unknown resource scope");
            return;
        }
        registry.history.push(ScopeEvent::Unregistered(token));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resources::{ResourceScope, ResourceSource};

    fn system() -> (Arc<MemoryResourceSystem>, Arc<dyn ResourceSystem>) {
        let concrete = Arc::new(MemoryResourceSystem::new());
        let shared: Arc<dyn ResourceSystem> = concrete.clone();
        (concrete, shared)
    }

    #[test]
    fn dropping_a_scope_reverses_its_registration() {
        let (concrete, shared) = system();
        let scope = ResourceScope::acquire(
            &shared,
            "module:harbour",
            &[ResourceSource::directory("modules/harbour")],
        )
        .expect("acquire");
        let token = scope.token().expect("token");
        assert_eq!(concrete.active_scopes(), vec![token]);

        drop(scope);

        assert!(concrete.is_empty());
        assert_eq!(
            concrete.history(),
            vec![ScopeEvent::Registered(token), ScopeEvent::Unregistered(token)]
        );
    }

    #[test]
    fn explicit_release_order_is_preserved_in_history() {
        let (concrete, shared) = system();
        let module = ResourceScope::acquire(&shared, "module", &[ResourceSource::directory("m")])
            .expect("module");
        let textures = ResourceScope::acquire(&shared, "textures", &[ResourceSource::archive("t.erf")])
            .expect("textures");
        let module_token = module.token().expect("module token");
        let texture_token = textures.token().expect("texture token");

        textures.release();
        module.release();

        assert_eq!(
            concrete.history()[2..],
            [
                ScopeEvent::Unregistered(texture_token),
                ScopeEvent::Unregistered(module_token)
            ]
        );
    }

    #[test]
    fn empty_scope_is_refused_without_registering() {
        let (concrete, shared) = system();
        let error = ResourceScope::acquire(&shared, "nothing", &[]).expect_err("empty");
        assert!(matches!(error, ResourceError::EmptyScope { .. }));
        assert!(concrete.history().is_empty());
    }

    #[test]
    fn rejected_path_fails_registration() {
        let (concrete, shared) = system();
        concrete.reject_path("broken.erf");
        let error = ResourceScope::acquire(
            &shared,
            "textures",
            &[ResourceSource::archive("broken.erf")],
        )
        .expect_err("rejected");
        assert!(matches!(error, ResourceError::Rejected { .. }));
        assert!(concrete.is_empty());
    }
}
