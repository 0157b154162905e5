//! file: core/src/bridge.rs
//! description: capability traits the loader composes.
//!
//! The loader never compiles or runs anything itself. It drives three
//! collaborators: a `ByteSource` (see `source.rs`), an `Instantiator` for the
//! binary format and a `BridgeFactory` producing one `RuntimeBridge` per load.
//! Bridge implementations are generated or hand-written outside this crate;
//! only the contract below is known here.

use async_trait::async_trait;

use crate::env::ExecutionEnvironment;
use crate::error::{ExecutionError, InstantiateError};
use crate::imports::ImportObject;
use crate::source::ByteStream;

/// Compiles a module binary and links it against an import object.
#[async_trait]
pub trait Instantiator: Send + Sync {
    type Instance: Send + 'static;

    /// Consume `bytes` and produce a linked instance.
    ///
    /// Implementations may compile while chunks are still arriving. Malformed
    /// input maps to `InstantiateError::Compile`, unsatisfied or mismatched
    /// imports to `InstantiateError::Link` and stream failures to
    /// `InstantiateError::Fetch`.
    async fn compile_and_instantiate(
        &self,
        bytes: ByteStream,
        imports: &ImportObject,
    ) -> Result<Self::Instance, InstantiateError>;
}

/// Adapter between host capabilities and the module's expectations.
///
/// One bridge serves exactly one load. It owns the import object the module is
/// linked against and, once `run` is called, the instance itself.
#[async_trait]
pub trait RuntimeBridge: Send {
    type Instance: Send + 'static;

    /// The capabilities offered to the module. Complete as soon as the bridge
    /// is constructed.
    fn import_object(&self) -> &ImportObject;

    /// Transfer control to the module's entry point.
    ///
    /// Resolves once the entry point has returned, at which point everything
    /// the module registered in `env` is visible. A bridge hosting a module
    /// that keeps running must return after the module has registered its
    /// exports; an entry point that never returns leaves the load pending
    /// forever. Traps are reported as `ExecutionError`.
    async fn run(&mut self, instance: Self::Instance, env: &ExecutionEnvironment) -> Result<(), ExecutionError>;
}

/// Creates a fresh `RuntimeBridge` for each load.
pub trait BridgeFactory: Send + Sync {
    type Bridge: RuntimeBridge;

    fn create_bridge(&self) -> Self::Bridge;
}

impl<F, B> BridgeFactory for F
where
    F: Fn() -> B + Send + Sync,
    B: RuntimeBridge,
{
    type Bridge = B;

    fn create_bridge(&self) -> B {
        self()
    }
}
