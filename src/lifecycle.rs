//! Instrumentation lifecycle
//!
//! [`Instrumentation`] swaps wrapped methods into the request slots of its
//! targets on [`enable`](Instrumentation::enable) and puts the captured
//! originals back on [`disable`](Instrumentation::disable).
//!
//! Enabling an already enabled instance restores the previous patches first
//! and then patches again, so the method captured as "original" is always the
//! real unwrapped one and the last configuration wins.

use crate::attribution::StackAttributor;
use crate::config::WatchConfig;
use crate::interceptor::{CallArguments, CallInterceptor};
use crate::locator::{ModuleLocator, SearchPathLocator};
use crate::recorder::Recorder;
use crate::slot::{MethodSlot, RequestMethod};
use crate::stack_unwind::{BacktraceProvider, StackProvider};
use crate::watcher::{WatchError, WatchedModuleSet};
use serde::Serialize;
use std::sync::Arc;

/// An installed wrapper that can put the original method back
pub trait Patch: Send + Sync {
    fn target(&self) -> &str;

    /// Reinstall the method captured when the patch was applied
    fn restore(self: Box<Self>);
}

/// Something holding a request method that can be wrapped in place
pub trait Instrumentable: Send + Sync {
    fn qualified_name(&self) -> &str;

    /// Replace the current method with an intercepted one
    fn install(self: Arc<Self>, interceptor: &Arc<CallInterceptor>) -> Box<dyn Patch>;
}

impl<C, A, R, E> Instrumentable for MethodSlot<C, A, R, E>
where
    C: 'static,
    A: CallArguments + 'static,
    R: Serialize + 'static,
    E: 'static,
{
    fn qualified_name(&self) -> &str {
        MethodSlot::qualified_name(self)
    }

    fn install(self: Arc<Self>, interceptor: &Arc<CallInterceptor>) -> Box<dyn Patch> {
        let original = self.current();
        let wrapped = interceptor.wrap(self.qualified_name(), Arc::clone(&original));
        self.replace(wrapped);
        Box::new(SlotPatch {
            slot: self,
            original,
        })
    }
}

struct SlotPatch<C, A, R, E> {
    slot: Arc<MethodSlot<C, A, R, E>>,
    original: RequestMethod<C, A, R, E>,
}

impl<C, A, R, E> Patch for SlotPatch<C, A, R, E> {
    fn target(&self) -> &str {
        self.slot.qualified_name()
    }

    fn restore(self: Box<Self>) {
        let SlotPatch { slot, original } = *self;
        slot.replace(original);
    }
}

struct ActiveSession {
    interceptor: Arc<CallInterceptor>,
    patches: Vec<Box<dyn Patch>>,
}

impl ActiveSession {
    fn restore(self) {
        // Reverse order so overlapping patches unwind cleanly
        for patch in self.patches.into_iter().rev() {
            tracing::debug!(target_method = patch.target(), "restoring original method");
            patch.restore();
        }
    }
}

/// Install/uninstall pair over a fixed list of targets
///
/// Dropping an enabled instance disables it.
pub struct Instrumentation {
    targets: Vec<Arc<dyn Instrumentable>>,
    locator: Option<Arc<dyn ModuleLocator>>,
    provider: Arc<dyn StackProvider>,
    active: Option<ActiveSession>,
    last_recorder: Option<Arc<Recorder>>,
}

impl Instrumentation {
    pub fn new(targets: Vec<Arc<dyn Instrumentable>>) -> Self {
        Self {
            targets,
            locator: None,
            provider: Arc::new(BacktraceProvider::new()),
            active: None,
            last_recorder: None,
        }
    }

    /// Replaces the default search of the configured path and cargo registry
    pub fn with_locator(mut self, locator: Arc<dyn ModuleLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_stack_provider(mut self, provider: Arc<dyn StackProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Recorder of the current session, or of the last one after `disable`
    pub fn recorder(&self) -> Option<Arc<Recorder>> {
        self.last_recorder.clone()
    }

    pub fn interceptor(&self) -> Option<&Arc<CallInterceptor>> {
        self.active.as_ref().map(|session| &session.interceptor)
    }

    /// Wrap every target's request method
    ///
    /// Watched modules are resolved before any slot is touched; on error the
    /// targets (and any session already active) are left exactly as they were.
    pub fn enable(&mut self, config: &WatchConfig) -> Result<Arc<Recorder>, WatchError> {
        let locator: Arc<dyn ModuleLocator> = match &self.locator {
            Some(locator) => Arc::clone(locator),
            None => Arc::new(SearchPathLocator::for_config(config)),
        };
        let watched = Arc::new(WatchedModuleSet::resolve(config, locator.as_ref())?);

        if let Some(previous) = self.active.take() {
            tracing::debug!("already enabled, restoring previous patches first");
            previous.restore();
        }

        let recorder = Arc::new(Recorder::new());
        let attributor =
            StackAttributor::new(Arc::clone(&watched), config.trace_stack, Arc::clone(&self.provider));
        let interceptor = Arc::new(CallInterceptor::new(attributor, Arc::clone(&recorder)));

        let patches: Vec<Box<dyn Patch>> = self
            .targets
            .iter()
            .map(|target| Arc::clone(target).install(&interceptor))
            .collect();

        tracing::info!(
            targets = patches.len(),
            clients = watched.clients().len(),
            others = watched.others().len(),
            trace_stack = config.trace_stack,
            "HTTP instrumentation enabled"
        );

        self.active = Some(ActiveSession {
            interceptor,
            patches,
        });
        self.last_recorder = Some(Arc::clone(&recorder));
        Ok(recorder)
    }

    /// Put back the methods captured by the most recent `enable`; no-op when not enabled
    pub fn disable(&mut self) {
        if let Some(session) = self.active.take() {
            let calls = session.interceptor.call_count();
            session.restore();
            tracing::info!(calls, "HTTP instrumentation disabled");
        }
    }
}

impl Drop for Instrumentation {
    fn drop(&mut self) {
        self.disable();
    }
}
