pub mod binary;
pub mod bridge;
pub mod config;
pub mod env;
pub mod error;
pub mod imports;
pub mod loader;
pub mod location;
pub mod source;
pub mod value;

pub use binary::{ModuleBinary, validate_wasm_header};
pub use bridge::{BridgeFactory, Instantiator, RuntimeBridge};
pub use config::LoaderConfig;
pub use env::{ExecutionEnvironment, Export, Symbol};
pub use error::{
    CompileError, ExecutionError, FetchError, FetchErrorKind, InstantiateError, Level, LinkError, LoadError,
    LoaderErrorExt,
};
pub use imports::{FnHost, HostFunction, Import, ImportDecl, ImportKind, ImportObject};
pub use loader::{LoadOperation, LoadState, ModuleLoader};
pub use location::{DEFAULT_MODULE_PATH, ModuleLocation};
pub use source::{ByteSource, ByteStream, FileSource, MemorySource};
pub use value::Value;

pub fn generate_error_report<E: LoaderErrorExt + ?Sized>(error: &E) -> String {
    let level = error.level();
    let location = error.location().unwrap_or_else(|| "unknown location".to_string());
    let message = error.message();

    format!("WASMBOOT | {} | {} | {}", level, location, message)
}
