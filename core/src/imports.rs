//! file: core/src/imports.rs
//! description: import object handed to the instantiator.
//!
//! An `ImportObject` maps `(module, name)` pairs to host functions or host
//! values. Instantiation binds the binary's import declarations against it,
//! so it must be complete before `compile_and_instantiate` is called.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LinkError;
use crate::value::Value;

/// A host-provided function a module may import.
#[async_trait]
pub trait HostFunction: Send + Sync {
    /// Declared parameter count, if fixed.
    fn arity(&self) -> Option<usize> { None }

    async fn call(&self, args: Vec<Value>) -> Result<Value, String>;
}

/// Adapts a synchronous closure into a `HostFunction`.
pub struct FnHost<F> {
    arity: Option<usize>,
    func: F,
}

impl<F> FnHost<F>
where
    F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync,
{
    pub fn new(arity: Option<usize>, func: F) -> Self {
        Self { arity, func }
    }
}

#[async_trait]
impl<F> HostFunction for FnHost<F>
where
    F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync,
{
    fn arity(&self) -> Option<usize> { self.arity }

    async fn call(&self, args: Vec<Value>) -> Result<Value, String> {
        (self.func)(args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Function,
    Value,
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportKind::Function => f.write_str("function"),
            ImportKind::Value => f.write_str("value"),
        }
    }
}

#[derive(Clone)]
pub enum Import {
    Function(Arc<dyn HostFunction>),
    Value(Value),
}

impl Import {
    pub fn kind(&self) -> ImportKind {
        match self {
            Import::Function(_) => ImportKind::Function,
            Import::Value(_) => ImportKind::Value,
        }
    }
}

impl fmt::Debug for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Import::Function(func) => write!(f, "Function(arity: {:?})", func.arity()),
            Import::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// One import a module binary declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
    /// Parameter count for function imports, when the binary records it.
    pub arity: Option<usize>,
}

impl ImportDecl {
    pub fn function(module: &str, name: &str, arity: Option<usize>) -> Self {
        Self { module: module.to_string(), name: name.to_string(), kind: ImportKind::Function, arity }
    }

    pub fn value(module: &str, name: &str) -> Self {
        Self { module: module.to_string(), name: name.to_string(), kind: ImportKind::Value, arity: None }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImportObject {
    modules: HashMap<String, HashMap<String, Import>>,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, module: &str, name: &str, import: Import) -> &mut Self {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string(), import);
        self
    }

    pub fn define_function(&mut self, module: &str, name: &str, func: Arc<dyn HostFunction>) -> &mut Self {
        self.define(module, name, Import::Function(func))
    }

    pub fn define_value(&mut self, module: &str, name: &str, value: Value) -> &mut Self {
        self.define(module, name, Import::Value(value))
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&Import> {
        self.modules.get(module).and_then(|m| m.get(name))
    }

    /// Module namespaces present, sorted.
    pub fn modules(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        out.sort();
        out
    }

    /// Total number of defined imports across all modules.
    pub fn len(&self) -> usize {
        self.modules.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind a single declaration, failing with `LinkError` when it is
    /// unknown or its kind or arity does not match what the host provides.
    pub fn resolve(&self, decl: &ImportDecl) -> Result<&Import, LinkError> {
        let import = self
            .get(&decl.module, &decl.name)
            .ok_or_else(|| LinkError::unknown_import(&decl.module, &decl.name))?;

        if import.kind() != decl.kind {
            return Err(LinkError::new(
                &decl.module,
                &decl.name,
                format!("expected {}, host provides {}", decl.kind, import.kind()),
            ));
        }

        if let (Import::Function(func), Some(wanted)) = (import, decl.arity) {
            if let Some(provided) = func.arity() {
                if provided != wanted {
                    return Err(LinkError::new(
                        &decl.module,
                        &decl.name,
                        format!("expected {} parameters, host function takes {}", wanted, provided),
                    ));
                }
            }
        }

        Ok(import)
    }

    /// Resolve every declaration, stopping at the first mismatch.
    pub fn check(&self, decls: &[ImportDecl]) -> Result<(), LinkError> {
        for decl in decls {
            self.resolve(decl)?;
        }
        Ok(())
    }
}
