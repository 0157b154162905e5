// Shared test doubles: a toy module format ("TMOD"), an instantiator that
// parses and links it, and a bridge that runs its entry point by
// registering the module's exports in the environment.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::executor::block_on;
use futures::future::{Either, select};

use wasmboot_core::{
    ByteSource, ByteStream, CompileError, ExecutionEnvironment, ExecutionError, Export, FnHost, ImportDecl,
    ImportObject, InstantiateError, Instantiator, MemorySource, ModuleBinary, ModuleLoader, RuntimeBridge, Value,
};

pub const MAGIC: &[u8; 4] = b"TMOD";
const NO_ARITY: u32 = u32::MAX;

fn write_u32_le(buf: &mut Vec<u8>, v: u32) {
    buf.extend(&v.to_le_bytes());
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_u32_le(buf, s.len() as u32);
    buf.extend(s.as_bytes());
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToyExport {
    Int(i64),
    Str(String),
    /// Function summing its integer arguments.
    Sum(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Return,
    Trap(String),
    Hang,
}

/// Builder for TMOD images.
#[derive(Debug, Clone)]
pub struct ModuleImage {
    imports: Vec<ImportDecl>,
    exports: Vec<(String, ToyExport)>,
    entry: Entry,
}

impl ModuleImage {
    pub fn new() -> Self {
        Self { imports: Vec::new(), exports: Vec::new(), entry: Entry::Return }
    }

    pub fn import_fn(mut self, module: &str, name: &str, arity: Option<usize>) -> Self {
        self.imports.push(ImportDecl::function(module, name, arity));
        self
    }

    pub fn import_value(mut self, module: &str, name: &str) -> Self {
        self.imports.push(ImportDecl::value(module, name));
        self
    }

    pub fn export_int(mut self, name: &str, v: i64) -> Self {
        self.exports.push((name.to_string(), ToyExport::Int(v)));
        self
    }

    pub fn export_str(mut self, name: &str, v: &str) -> Self {
        self.exports.push((name.to_string(), ToyExport::Str(v.to_string())));
        self
    }

    pub fn export_sum(mut self, name: &str, arity: u32) -> Self {
        self.exports.push((name.to_string(), ToyExport::Sum(arity)));
        self
    }

    pub fn trap(mut self, msg: &str) -> Self {
        self.entry = Entry::Trap(msg.to_string());
        self
    }

    pub fn hang(mut self) -> Self {
        self.entry = Entry::Hang;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(MAGIC);

        write_u32_le(&mut buf, self.imports.len() as u32);
        for decl in &self.imports {
            write_string(&mut buf, &decl.module);
            write_string(&mut buf, &decl.name);
            match decl.kind {
                wasmboot_core::ImportKind::Function => buf.push(0),
                wasmboot_core::ImportKind::Value => buf.push(1),
            }
            write_u32_le(&mut buf, decl.arity.map(|a| a as u32).unwrap_or(NO_ARITY));
        }

        write_u32_le(&mut buf, self.exports.len() as u32);
        for (name, export) in &self.exports {
            write_string(&mut buf, name);
            match export {
                ToyExport::Int(v) => {
                    buf.push(0);
                    buf.extend(&v.to_le_bytes());
                }
                ToyExport::Str(s) => {
                    buf.push(1);
                    write_string(&mut buf, s);
                }
                ToyExport::Sum(arity) => {
                    buf.push(2);
                    write_u32_le(&mut buf, *arity);
                }
            }
        }

        match &self.entry {
            Entry::Return => buf.push(0),
            Entry::Trap(msg) => {
                buf.push(1);
                write_string(&mut buf, msg);
            }
            Entry::Hang => buf.push(2),
        }
        buf
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CompileError> {
        if self.pos + n > self.bytes.len() {
            return Err(CompileError::new(format!("unexpected end of binary at offset {}", self.pos)));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CompileError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CompileError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, CompileError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(i64::from_le_bytes(arr))
    }

    fn string(&mut self) -> Result<String, CompileError> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|e| CompileError::new(format!("invalid utf-8: {}", e)))
    }
}

pub struct ParsedModule {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<(String, ToyExport)>,
    pub entry: Entry,
}

pub fn parse_module(bytes: &[u8]) -> Result<ParsedModule, CompileError> {
    let mut r = Reader { bytes, pos: 0 };
    if r.take(4)? != MAGIC {
        return Err(CompileError::new("bad magic"));
    }

    let mut imports = Vec::new();
    for _ in 0..r.u32()? {
        let module = r.string()?;
        let name = r.string()?;
        let kind = r.u8()?;
        let arity = match r.u32()? {
            NO_ARITY => None,
            n => Some(n as usize),
        };
        match kind {
            0 => imports.push(ImportDecl::function(&module, &name, arity)),
            1 => imports.push(ImportDecl::value(&module, &name)),
            k => return Err(CompileError::new(format!("unknown import kind {}", k))),
        }
    }

    let mut exports = Vec::new();
    for _ in 0..r.u32()? {
        let name = r.string()?;
        let export = match r.u8()? {
            0 => ToyExport::Int(r.i64()?),
            1 => ToyExport::Str(r.string()?),
            2 => ToyExport::Sum(r.u32()?),
            t => return Err(CompileError::new(format!("unknown export tag {}", t))),
        };
        exports.push((name, export));
    }

    let entry = match r.u8()? {
        0 => Entry::Return,
        1 => Entry::Trap(r.string()?),
        2 => Entry::Hang,
        t => return Err(CompileError::new(format!("unknown entry tag {}", t))),
    };

    if r.pos != bytes.len() {
        return Err(CompileError::new("trailing bytes after entry section"));
    }

    Ok(ParsedModule { imports, exports, entry })
}

/// Counters shared by the toy instantiator and bridges.
#[derive(Clone, Default)]
pub struct Tally {
    pub bridges: Arc<AtomicUsize>,
    pub instances: Arc<AtomicUsize>,
    /// (bridge id, instance id) for every `run` call.
    pub runs: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl Tally {
    pub fn bridges(&self) -> usize {
        self.bridges.load(Ordering::SeqCst)
    }

    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> Vec<(usize, usize)> {
        self.runs.lock().unwrap().clone()
    }
}

pub struct ToyInstance {
    pub id: usize,
    pub exports: Vec<(String, ToyExport)>,
    pub entry: Entry,
}

pub struct ToyCompiler {
    tally: Tally,
}

impl ToyCompiler {
    pub fn new(tally: Tally) -> Self {
        Self { tally }
    }
}

#[async_trait]
impl Instantiator for ToyCompiler {
    type Instance = ToyInstance;

    async fn compile_and_instantiate(
        &self,
        bytes: ByteStream,
        imports: &ImportObject,
    ) -> Result<ToyInstance, InstantiateError> {
        let binary = ModuleBinary::collect(bytes).await?;
        let module = parse_module(binary.bytes())?;
        imports.check(&module.imports)?;
        let id = self.tally.instances.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ToyInstance { id, exports: module.exports, entry: module.entry })
    }
}

struct SumExport {
    name: String,
    arity: usize,
}

#[async_trait]
impl Export for SumExport {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Option<usize> {
        Some(self.arity)
    }

    async fn call(&self, args: Vec<Value>) -> Result<Value, String> {
        let mut total = 0i64;
        for (i, a) in args.iter().enumerate() {
            match a {
                Value::Int(v) => total += v,
                other => return Err(format!("parameter {}: expected int, got {}", i, other.type_name())),
            }
        }
        Ok(Value::Int(total))
    }
}

pub struct ToyBridge {
    id: usize,
    imports: ImportObject,
    tally: Tally,
}

impl ToyBridge {
    pub fn new(tally: Tally) -> Self {
        let id = tally.bridges.fetch_add(1, Ordering::SeqCst) + 1;
        let mut imports = ImportObject::new();
        imports
            .define_function("env", "log", Arc::new(FnHost::new(Some(1), |_args| Ok(Value::Null))))
            .define_value("env", "memory_pages", Value::Int(1));
        Self { id, imports, tally }
    }
}

#[async_trait]
impl RuntimeBridge for ToyBridge {
    type Instance = ToyInstance;

    fn import_object(&self) -> &ImportObject {
        &self.imports
    }

    async fn run(&mut self, instance: ToyInstance, env: &ExecutionEnvironment) -> Result<(), ExecutionError> {
        self.tally.runs.lock().unwrap().push((self.id, instance.id));
        for (name, export) in instance.exports {
            match export {
                ToyExport::Int(v) => {
                    env.set_value(name, Value::Int(v));
                }
                ToyExport::Str(s) => {
                    env.set_value(name, Value::Str(s));
                }
                ToyExport::Sum(arity) => {
                    env.set_function(Arc::new(SumExport { name, arity: arity as usize }));
                }
            }
        }
        match instance.entry {
            Entry::Return => Ok(()),
            Entry::Trap(msg) => Err(ExecutionError::trap(msg)),
            Entry::Hang => {
                futures::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

pub fn toy_loader<S: ByteSource>(
    source: S,
    tally: &Tally,
) -> ModuleLoader<S, ToyCompiler, impl Fn() -> ToyBridge + Send + Sync> {
    let bridge_tally = tally.clone();
    ModuleLoader::new(source, ToyCompiler::new(tally.clone()), move || ToyBridge::new(bridge_tally.clone()))
}

pub fn memory_source(images: &[(&str, Vec<u8>)]) -> MemorySource {
    let mut source = MemorySource::new().with_chunk_size(7);
    for (loc, bytes) in images {
        source.insert(*loc, bytes.clone());
    }
    source
}

/// Drive `fut` for at most `window`. `None` means it did not settle.
pub fn settles_within<Fut: Future>(fut: Fut, window: Duration) -> Option<Fut::Output> {
    let (tx, rx) = futures::channel::oneshot::channel::<()>();
    std::thread::spawn(move || {
        std::thread::sleep(window);
        let _ = tx.send(());
    });
    block_on(async move {
        futures::pin_mut!(fut);
        match select(fut, rx).await {
            Either::Left((out, _)) => Some(out),
            Either::Right(_) => None,
        }
    })
}
