//! Error channel of the reconciler.
//!
//! Structural failures (a node that lost its host binding, an unsupported
//! host capability) propagate as [`RenderError`] results and abort the
//! current pass. Failures inside user-supplied callbacks never abort
//! reconciliation; they are handed to the [`ErrorSink`] and the pass
//! continues.

use std::rc::Rc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A mounted node was asked for a host handle it never received.
    #[error("virtual node has no bound {0} handle")]
    Unbound(&'static str),
    /// Static-content nodes need `insert_static_content` or `clone_node`
    /// support from the host.
    #[error("host does not support precompiled static content")]
    StaticContentUnsupported,
    /// A component node reached an operation that requires a mounted
    /// instance.
    #[error("component node has no mounted instance")]
    MissingInstance,
    /// Payload raised by a user callback (setup, hook, ref, transition).
    #[error("{0}")]
    Hook(String),
}

impl RenderError {
    pub fn hook(message: impl Into<String>) -> RenderError {
        RenderError::Hook(message.into())
    }
}

/// Which user-facing surface produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSource {
    Setup,
    Render,
    LifecycleHook,
    VNodeHook,
    DirectiveHook,
    FunctionRef,
    Transition,
    SchedulerJob,
}

impl ErrorSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorSource::Setup => "setup",
            ErrorSource::Render => "render",
            ErrorSource::LifecycleHook => "lifecycle hook",
            ErrorSource::VNodeHook => "vnode hook",
            ErrorSource::DirectiveHook => "directive hook",
            ErrorSource::FunctionRef => "function ref",
            ErrorSource::Transition => "transition",
            ErrorSource::SchedulerJob => "scheduler job",
        }
    }
}

/// Destination for errors raised by user callbacks during a pass. Cloning
/// shares the underlying handler.
#[derive(Clone)]
pub struct ErrorSink(Rc<dyn Fn(ErrorSource, &RenderError)>);

impl ErrorSink {
    pub fn new(handler: impl Fn(ErrorSource, &RenderError) + 'static) -> Self {
        ErrorSink(Rc::new(handler))
    }

    pub fn report(&self, source: ErrorSource, error: &RenderError) {
        (self.0)(source, error);
    }

    /// Runs a fallible user callback, routing any error to the sink.
    pub fn guard(&self, source: ErrorSource, f: impl FnOnce() -> Result<(), RenderError>) {
        if let Err(error) = f() {
            self.report(source, &error);
        }
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        ErrorSink::new(|source, error| {
            tracing::error!(source = source.as_str(), %error, "user callback failed");
        })
    }
}
