//! file: core/src/env.rs
//! description: the shared execution environment populated by loaded modules.
//!
//! `ExecutionEnvironment` is a cheap, cloneable handle. Every clone points at
//! the same symbol table, so a module's entry point registering an export is
//! immediately visible to whoever holds the handle returned by the loader.
//! There is no removal: modules populate the table additively and the last
//! writer of a name wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::value::{Value, values_to_json_array};

/// A callable symbol a module exposes to the host.
#[async_trait]
pub trait Export: Send + Sync {
    fn name(&self) -> &str;

    /// Number of parameters the function expects, if it declares one.
    fn arity(&self) -> Option<usize> { None }

    async fn call(&self, args: Vec<Value>) -> Result<Value, String>;
}

#[derive(Clone)]
pub enum Symbol {
    Value(Value),
    Function(Arc<dyn Export>),
}

impl Symbol {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Symbol::Value(v) => Some(v),
            Symbol::Function(_) => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Symbol::Function(_))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Symbol::Function(func) => write!(f, "Function({})", func.name()),
        }
    }
}

#[derive(Clone, Default)]
pub struct ExecutionEnvironment {
    symbols: Arc<RwLock<HashMap<String, Symbol>>>,
}

impl ExecutionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Symbol>> {
        self.symbols.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Symbol>> {
        self.symbols.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `symbol` under `name`, returning whatever it replaced.
    pub fn set(&self, name: impl Into<String>, symbol: Symbol) -> Option<Symbol> {
        self.write().insert(name.into(), symbol)
    }

    pub fn set_value(&self, name: impl Into<String>, value: Value) -> Option<Symbol> {
        self.set(name, Symbol::Value(value))
    }

    /// Register a callable under its own name.
    pub fn set_function(&self, func: Arc<dyn Export>) -> Option<Symbol> {
        let name = func.name().to_string();
        self.set(name, Symbol::Function(func))
    }

    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.read().get(name).cloned()
    }

    pub fn value(&self, name: &str) -> Option<Value> {
        self.read().get(name).and_then(|s| s.as_value().cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered symbol names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// True when both handles share one symbol table.
    pub fn same_environment(&self, other: &ExecutionEnvironment) -> bool {
        Arc::ptr_eq(&self.symbols, &other.symbols)
    }

    /// Call an exported function by name.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, String> {
        let func = match self.get(name) {
            Some(Symbol::Function(f)) => f,
            Some(Symbol::Value(_)) => return Err(format!("symbol '{}' is not callable", name)),
            None => return Err(format!("symbol '{}' not found", name)),
        };
        if let Some(expected) = func.arity() {
            if expected != args.len() {
                return Err(format!("expected {} parameters, got {}", expected, args.len()));
            }
        }
        func.call(args).await
    }

    /// Call an exported function using the JSON convention modules speak:
    /// `args_json` is a JSON array of parameters (empty input means none) and
    /// the result comes back as a JSON array.
    ///
    /// Exports have no separate "no result" value, so a function returning
    /// nothing and one returning `Value::Null` both serialize as `[]`. Use
    /// `call` when the distinction matters.
    pub async fn call_json(&self, name: &str, args_json: &str) -> Result<String, String> {
        let args = if args_json.trim().is_empty() {
            Vec::new()
        } else {
            let parsed: serde_json::Value = serde_json::from_str(args_json)
                .map_err(|e| format!("invalid JSON input: {}", e))?;
            match parsed {
                serde_json::Value::Array(items) => items.iter().map(Value::from).collect(),
                other => {
                    return Err(format!(
                        "invalid JSON input: expected an array of parameters, got {}",
                        Value::from(&other).type_name()
                    ));
                }
            }
        };

        let results = match self.call(name, args).await? {
            Value::Null => Vec::new(),
            v => vec![v],
        };
        serde_json::to_string(&values_to_json_array(&results))
            .map_err(|e| format!("failed to marshal results: {}", e))
    }
}

impl fmt::Debug for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEnvironment").field("symbols", &self.names()).finish()
    }
}
