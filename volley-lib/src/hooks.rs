//! Hooks which run for every resolved request, on every dispatcher.
//!
//! An after-request hook runs right after the response slot of a request has
//! been filled and before the cache setter and any `on_complete` callback.

use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;

use crate::Request;

/// A hook receiving each resolved request
pub type AfterRequestHook = Arc<dyn Fn(&Request) + Send + Sync>;

static GLOBAL_HOOKS: LazyLock<HookRegistry> = LazyLock::new(HookRegistry::default);

/// An ordered list of after-request hooks
#[derive(Default)]
pub struct HookRegistry {
    after_request: RwLock<Vec<AfterRequestHook>>,
}

impl HookRegistry {
    /// Append a hook
    pub fn register<F>(&self, hook: F)
    where
        F: Fn(&Request) + Send + Sync + 'static,
    {
        self.after_request.write().push(Arc::new(hook));
    }

    /// Remove all hooks
    pub fn clear(&self) {
        self.after_request.write().clear();
    }

    /// Number of registered hooks
    #[must_use]
    pub fn len(&self) -> usize {
        self.after_request.read().len()
    }

    /// Whether no hook is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.after_request.read().is_empty()
    }

    /// Run all hooks in registration order.
    ///
    /// Hooks registered while this runs take effect for the next request.
    pub fn run(&self, request: &Request) {
        let hooks = self.after_request.read().clone();
        for hook in hooks {
            hook(request);
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("after_request", &self.len())
            .finish()
    }
}

/// Register a hook for every dispatcher in this process
pub fn register_after_request_hook<F>(hook: F)
where
    F: Fn(&Request) + Send + Sync + 'static,
{
    GLOBAL_HOOKS.register(hook);
}

/// Remove all process-wide hooks
pub fn clear_global_hooks() {
    GLOBAL_HOOKS.clear();
}

pub(crate) fn run_after_request_hooks(request: &Request) {
    GLOBAL_HOOKS.run(request);
}
