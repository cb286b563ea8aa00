//! prograreno-runtime: the isolation runtime seam
//!
//! prograreno never creates namespaces or applies rlimits itself. It hands a
//! finalized document to an [`IsolationRuntime`], which launches the program
//! with the caller's current standard descriptors and tears it down on
//! request. [`CrunRuntime`] drives the `crun` OCI runtime.

pub mod crun;

pub use crun::{CrunConfig, CrunContext, CrunRuntime, CrunSpec};

use prograreno_core::Result;
use serde_json::Value;

/// Operations prograreno needs from a container runtime
pub trait IsolationRuntime {
    /// A loaded, validated document ready to run
    type Spec;
    /// Per-run bookkeeping, owned by exactly one contained process
    type Context;

    /// Baseline configuration document to merge settings into
    fn default_spec(&self) -> Result<Value>;

    /// Parse and validate a serialized document
    fn load_spec(&self, document: &str) -> Result<Self::Spec>;

    /// Allocate a context named `id`. A detached context outlives `run`.
    fn make_context(&self, id: &str, detach: bool) -> Result<Self::Context>;

    /// Launch the program. It inherits the caller's descriptors 0, 1 and 2
    /// as they are at call time. Returns once launched when detached.
    fn run(&self, context: &mut Self::Context, spec: &Self::Spec) -> Result<()>;

    /// Release a context. `force` kills a program that is still running.
    fn delete(&self, context: Self::Context, id: &str, force: bool) -> Result<()>;
}

impl<R: IsolationRuntime + ?Sized> IsolationRuntime for &R {
    type Spec = R::Spec;
    type Context = R::Context;

    fn default_spec(&self) -> Result<Value> {
        (**self).default_spec()
    }

    fn load_spec(&self, document: &str) -> Result<Self::Spec> {
        (**self).load_spec(document)
    }

    fn make_context(&self, id: &str, detach: bool) -> Result<Self::Context> {
        (**self).make_context(id, detach)
    }

    fn run(&self, context: &mut Self::Context, spec: &Self::Spec) -> Result<()> {
        (**self).run(context, spec)
    }

    fn delete(&self, context: Self::Context, id: &str, force: bool) -> Result<()> {
        (**self).delete(context, id, force)
    }
}
