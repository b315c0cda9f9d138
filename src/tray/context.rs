//! Name-keyed resource lookup for modules.
//!
//! The tray builds one `Context` per module: the module's inbox, its
//! instance name, and every service registered on the tray. While a module
//! runs a phase, its context is installed in the active slot so code deep
//! inside the call can resolve services without having the context passed
//! down explicitly.
//!
//! The active slot is thread-local and holds exactly one context. That is
//! only sound because traversal is strictly sequential: a module's phase
//! call finishes and clears the slot before any downstream module starts.
//! Driving one module graph from several threads at once is not supported.

use crate::error::{TrayError, TrayResult};
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Context key for the module's inbox queue id.
pub const INBOX: &str = "InBox";

/// Context key for the module's instance name.
pub const INSTANCE_NAME: &str = "InstanceName";

type Resource = Arc<dyn Any + Send + Sync>;

/// Typed, name-keyed resource table.
#[derive(Clone, Default)]
pub struct Context {
    owner: String,
    resources: HashMap<String, Resource>,
}

impl Context {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            resources: HashMap::new(),
        }
    }

    /// Copy of this table handed to a different owner.
    pub fn with_owner(&self, owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            resources: self.resources.clone(),
        }
    }

    /// Name of the module this context belongs to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Store a resource, replacing any previous one under the same name.
    pub fn put<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.resources.insert(name.into(), Arc::new(value));
    }

    /// Store an already shared resource.
    pub fn put_shared(&mut self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.resources.insert(name.into(), value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Look up a resource. Missing names and type mismatches are errors.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> TrayResult<Arc<T>> {
        let resource = self.resources.get(name).ok_or_else(|| {
            TrayError::MissingResource {
                module: self.owner.clone(),
                name: name.to_string(),
            }
            .logged()
        })?;
        Arc::clone(resource).downcast::<T>().map_err(|_| {
            TrayError::WrongResourceType {
                module: self.owner.clone(),
                name: name.to_string(),
                expected: type_name::<T>(),
            }
            .logged()
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.resources.keys().collect();
        names.sort();
        f.debug_struct("Context")
            .field("owner", &self.owner)
            .field("resources", &names)
            .finish()
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Arc<Context>>> = const { RefCell::new(None) };
}

/// Installs a context in the active slot for the lifetime of the guard.
///
/// Dropping the guard empties the slot, including when the phase call
/// returned an error.
pub struct ActiveContextGuard {
    _private: (),
}

impl ActiveContextGuard {
    pub fn activate(context: Arc<Context>) -> Self {
        ACTIVE.with(|slot| *slot.borrow_mut() = Some(context));
        Self { _private: () }
    }
}

impl Drop for ActiveContextGuard {
    fn drop(&mut self) {
        ACTIVE.with(|slot| *slot.borrow_mut() = None);
    }
}

/// The currently active context, if a phase call is in progress.
pub fn active() -> Option<Arc<Context>> {
    ACTIVE.with(|slot| slot.borrow().clone())
}

/// Resolve a resource through the active context.
pub fn get_service<T: Any + Send + Sync>(name: &str) -> TrayResult<Arc<T>> {
    let context = active().ok_or_else(|| TrayError::NoActiveContext(name.to_string()).logged())?;
    context.get(name)
}
