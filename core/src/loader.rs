//! file: core/src/loader.rs
//! description: the module loading pipeline.
//!
//! `ModuleLoader` composes a byte source, an instantiator and a bridge
//! factory. Each call to `load_module` runs the same sequence:
//!
//! 1. construct a fresh bridge (its import object is needed to instantiate),
//! 2. start fetching the binary,
//! 3. compile and instantiate the stream against the bridge's imports,
//! 4. run the entry point through the bridge,
//! 5. hand back the shared environment.
//!
//! Every failure ends the load; nothing is retried or cached.

use std::fmt;

use futures::executor::block_on;
use log::debug;
use uuid::Uuid;

use crate::bridge::{BridgeFactory, Instantiator, RuntimeBridge};
use crate::config::LoaderConfig;
use crate::env::ExecutionEnvironment;
use crate::error::LoadError;
use crate::location::ModuleLocation;
use crate::source::ByteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    Unloaded,
    Fetching,
    Instantiating,
    Running,
    Ready,
    Failed,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed)
    }

    pub fn can_transition_to(self, next: LoadState) -> bool {
        use LoadState::*;
        match (self, next) {
            (Unloaded, Fetching) | (Fetching, Instantiating) | (Instantiating, Running) | (Running, Ready) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Fetching => "fetching",
            LoadState::Instantiating => "instantiating",
            LoadState::Running => "running",
            LoadState::Ready => "ready",
            LoadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Bookkeeping for a single load: its id, target and current state.
#[derive(Debug, Clone)]
pub struct LoadOperation {
    id: Uuid,
    location: ModuleLocation,
    state: LoadState,
}

impl LoadOperation {
    pub fn new(location: ModuleLocation) -> Self {
        Self { id: Uuid::new_v4(), location, state: LoadState::Unloaded }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn location(&self) -> &ModuleLocation {
        &self.location
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Move to `next` if the state machine allows it. Returns whether the
    /// transition happened.
    pub fn advance(&mut self, next: LoadState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!("load {}: rejected transition {} -> {}", self.id, self.state, next);
            return false;
        }
        debug!("load {} [{}]: {} -> {}", self.id, self.location, self.state, next);
        self.state = next;
        true
    }
}

pub struct ModuleLoader<S, C, F> {
    source: S,
    compiler: C,
    bridges: F,
    env: ExecutionEnvironment,
}

impl<S, C, F> ModuleLoader<S, C, F>
where
    S: ByteSource,
    C: Instantiator,
    F: BridgeFactory,
    F::Bridge: RuntimeBridge<Instance = C::Instance>,
{
    /// Create a loader populating its own, initially empty, environment.
    pub fn new(source: S, compiler: C, bridges: F) -> Self {
        Self::with_environment(source, compiler, bridges, ExecutionEnvironment::new())
    }

    /// Create a loader populating a caller-supplied environment.
    pub fn with_environment(source: S, compiler: C, bridges: F, env: ExecutionEnvironment) -> Self {
        Self { source, compiler, bridges, env }
    }

    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.env
    }

    /// Load, instantiate and run the module at `path`, or at
    /// `DEFAULT_MODULE_PATH` when `path` is `None`.
    pub async fn load_module(&self, path: Option<&str>) -> Result<ExecutionEnvironment, LoadError> {
        let location = path.map(ModuleLocation::from).unwrap_or_default();
        self.load_location(location).await
    }

    /// Same as `load_module`, taking the location from `config`.
    pub async fn load(&self, config: &LoaderConfig) -> Result<ExecutionEnvironment, LoadError> {
        self.load_location(config.path.clone()).await
    }

    /// Run `load_module` to completion on the current thread.
    pub fn load_module_blocking(&self, path: Option<&str>) -> Result<ExecutionEnvironment, LoadError> {
        block_on(self.load_module(path))
    }

    async fn load_location(&self, location: ModuleLocation) -> Result<ExecutionEnvironment, LoadError> {
        let mut op = LoadOperation::new(location);
        let result = self.drive(&mut op).await;
        match &result {
            Ok(_) => {
                op.advance(LoadState::Ready);
                debug!("load {}: module '{}' ready", op.id(), op.location());
            }
            Err(e) => {
                op.advance(LoadState::Failed);
                debug!("load {}: module '{}' failed with {}", op.id(), op.location(), e.kind());
            }
        }
        result
    }

    async fn drive(&self, op: &mut LoadOperation) -> Result<ExecutionEnvironment, LoadError> {
        let location = op.location().clone();

        // The bridge exists before anything is fetched: instantiation binds
        // against its import object.
        let mut bridge = self.bridges.create_bridge();

        op.advance(LoadState::Fetching);
        let bytes = self.source.fetch(&location).await?;

        op.advance(LoadState::Instantiating);
        let instance = self
            .compiler
            .compile_and_instantiate(bytes, bridge.import_object())
            .await
            .map_err(|e| locate(LoadError::from(e), &location))?;

        op.advance(LoadState::Running);
        bridge
            .run(instance, &self.env)
            .await
            .map_err(|e| locate(LoadError::from(e), &location))?;

        Ok(self.env.clone())
    }
}

/// Fill in the module location on errors raised by collaborators that never
/// saw it.
fn locate(err: LoadError, location: &ModuleLocation) -> LoadError {
    match err {
        LoadError::Compile(e) if e.location.is_none() => LoadError::Compile(e.with_location(location.as_str())),
        LoadError::Link(e) if e.location.is_none() => LoadError::Link(e.with_location(location.as_str())),
        LoadError::Execution(e) if e.location.is_none() => {
            LoadError::Execution(e.with_location(location.as_str()))
        }
        other => other,
    }
}
