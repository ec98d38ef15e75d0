//! Patchable method slots
//!
//! A [`MethodSlot`] is the shared "class attribute" every client instance of
//! one HTTP library dispatches its `request` method through. Swapping the
//! method in the slot changes behaviour for every caller at once; the
//! previous method is handed back so it can be restored exactly.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// A request method: `receiver.request(args) -> Result<response, error>`
pub type RequestMethod<C, A, R, E> = Arc<dyn Fn(&C, &A) -> Result<R, E> + Send + Sync>;

/// Shared, swappable slot holding one request method
pub struct MethodSlot<C, A, R, E> {
    qualified_name: String,
    method: ArcSwap<RequestMethod<C, A, R, E>>,
}

impl<C, A, R, E> MethodSlot<C, A, R, E> {
    pub fn new(qualified_name: impl Into<String>, method: RequestMethod<C, A, R, E>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            method: ArcSwap::from_pointee(method),
        }
    }

    pub fn from_fn<F>(qualified_name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&C, &A) -> Result<R, E> + Send + Sync + 'static,
    {
        Self::new(qualified_name, Arc::new(method))
    }

    /// Fully-qualified name of the method held by this slot
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// The method currently installed
    pub fn current(&self) -> RequestMethod<C, A, R, E> {
        Arc::clone(&**self.method.load())
    }

    /// Install `method`, returning the one it replaced
    pub fn replace(&self, method: RequestMethod<C, A, R, E>) -> RequestMethod<C, A, R, E> {
        Arc::clone(&*self.method.swap(Arc::new(method)))
    }

    /// Dispatch through whatever method is installed right now
    ///
    /// Dispatch takes no lock, so a call may overlap with a swap.
    pub fn call(&self, receiver: &C, args: &A) -> Result<R, E> {
        let method = self.current();
        method(receiver, args)
    }
}

impl<C, A, R, E> fmt::Debug for MethodSlot<C, A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSlot")
            .field("qualified_name", &self.qualified_name)
            .finish_non_exhaustive()
    }
}
