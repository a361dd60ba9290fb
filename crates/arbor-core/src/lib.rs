#![doc = r"Virtual node model, host adapter contract and scheduling queues for the Arbor reconciler."]

pub mod api;
pub mod component;
pub mod error;
pub mod host;
pub mod scheduler;
pub mod suspense;
pub mod vnode;

pub use api::{MountArgs, MoveType, RendererApi};
pub use component::{
    should_update_component, AsyncDep, ComponentDef, ComponentInstance, EffectHandle, HookFn,
    KeepAliveContext, LifecycleHooks, RenderFn, SetupFn, SetupOutcome,
};
pub use error::{ErrorSink, ErrorSource, RenderError};
pub use host::{HostId, HostOp, HostOps, MemoryHost, PropValue};
pub use scheduler::{PostJob, PreJob, Scheduler};
pub use suspense::{SuspenseBehavior, SuspenseBoundary, TeleportBehavior};
pub use vnode::{
    props, same_node_type, Children, DirectiveHooks, Key, NodeKind, PatchHints, Props, Ref,
    RefSlot, RefValue, TransitionBehavior, VNode, VNodeHook, VNodeHooks,
};

/// Hash map used on the hot reconciliation paths.
pub type FastMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
