//! Owns the shared state every [`VmThread`](crate::vm::VmThread) runs
//! against: the global table, the compiled chunk table, the token table
//! used for diagnostics, and the registry of host-provided native
//! functions.

use std::collections::HashMap;

use gc_arena::MutationContext;
use indexmap::IndexMap;

use crate::compiler::chunk::Chunk;
use crate::compiler::compile;
use crate::error::{EngineError, ErrorPresenter, RuntimeError};
use crate::intern::{murmur32, NameHash, TokenTable};
use crate::obj::{self, Class, NativeFn, NativeFunction, ObjData};
use crate::value::Value;
use crate::vm::VmThread;

/// `lock`/`unlock` guard a region of globals (e.g. a class's static
/// fields) against redefinition while scripts are hot-reloaded; most
/// hosts never need more than the default unlocked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

pub struct ScriptManager<'gc> {
    chunks: Vec<Chunk<'gc>>,
    chunk_names: Vec<String>,
    /// Parallel to `chunks`: the module every chunk at that index was
    /// compiled as part of. Every chunk a single `load_module` call
    /// produces (the top-level chunk plus one per function/method) shares
    /// the same module object.
    chunk_modules: Vec<obj::Obj<'gc>>,
    globals: IndexMap<NameHash, Value<'gc>>,
    lock_state: HashMap<NameHash, LockState>,
    /// Instances registered by class name as they're constructed, so a
    /// `with ("ClassName")` receiver has something to resolve against.
    object_lists: IndexMap<NameHash, Vec<Value<'gc>>>,
    tokens: TokenTable,
}

impl<'gc> Default for ScriptManager<'gc> {
    fn default() -> Self {
        ScriptManager {
            chunks: Vec::new(),
            chunk_names: Vec::new(),
            chunk_modules: Vec::new(),
            globals: IndexMap::new(),
            lock_state: HashMap::new(),
            object_lists: IndexMap::new(),
            tokens: TokenTable::new(),
        }
    }
}

impl<'gc> ScriptManager<'gc> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    /// Compiles and registers one module's source, returning the chunk
    /// index a [`VmThread`] can be started against. Every function and
    /// method declared in the module gets its own chunk, registered
    /// alongside the module's own top-level chunk in the same table.
    pub fn load_module(&mut self, mc: MutationContext<'gc, '_>, name: &str, source: &str) -> Result<u32, EngineError> {
        let base_index = self.chunks.len() as u32;
        let module = obj::new_module(mc, name.to_string());
        let mut compiled = compile(mc, source, &mut self.tokens, base_index, module)?;
        let entry_index = base_index;
        self.chunk_names.push(name.to_string());
        for i in 1..compiled.len() {
            self.chunk_names.push(format!("{name}#{i}"));
        }
        for _ in 0..compiled.len() {
            self.chunk_modules.push(module);
        }
        self.chunks.append(&mut compiled);
        Ok(entry_index)
    }

    pub fn run_module(
        &mut self,
        mc: MutationContext<'gc, '_>,
        chunk_index: u32,
        presenter: &mut dyn ErrorPresenter,
    ) -> Result<Value<'gc>, RuntimeError> {
        let mut thread = VmThread::new();
        let module = self.chunk_modules.get(chunk_index as usize).copied();
        thread.run(
            mc,
            &self.chunks,
            chunk_index,
            module,
            &mut self.globals,
            &mut self.object_lists,
            &self.tokens,
            presenter,
        )
    }

    pub fn define_global(&mut self, name: &str, value: Value<'gc>) {
        let hash = self.tokens.intern(name);
        self.globals.insert(hash, value);
    }

    pub fn global(&self, name: &str) -> Option<Value<'gc>> {
        let hash = murmur32(name.as_bytes());
        self.globals.get(&hash).copied()
    }

    pub fn register_native(&mut self, mc: MutationContext<'gc, '_>, name: &'static str, arity: i8, func: NativeFn<'gc>) {
        let hash = self.tokens.intern(name);
        let obj = gc_arena::Gc::allocate(mc, gc_arena::GcCell::allocate(mc, ObjData::Native(NativeFunction { name, arity, func })));
        self.globals.insert(hash, Value::Object(obj));
    }

    pub fn lock(&mut self, name: &str) {
        let hash = self.tokens.intern(name);
        self.lock_state.insert(hash, LockState::Locked);
    }

    pub fn unlock(&mut self, name: &str) {
        let hash = self.tokens.intern(name);
        self.lock_state.insert(hash, LockState::Unlocked);
    }

    pub fn is_locked(&self, name: &str) -> bool {
        let hash = murmur32(name.as_bytes());
        matches!(self.lock_state.get(&hash), Some(LockState::Locked))
    }

    /// Appends a method table onto an already-defined class by name,
    /// without touching its base methods. Extensions added later shadow
    /// ones added earlier and the class's own base methods, matching
    /// field-shadowing-over-methods lookup order at read time.
    pub fn extend_class(&mut self, mc: MutationContext<'gc, '_>, class_name: &str, extension_methods: Vec<(&str, crate::obj::Obj<'gc>)>) {
        let Some(class_value) = self.global(class_name) else { return };
        let Value::Object(class_obj) = class_value else { return };

        let mut methods = IndexMap::new();
        for (method_name, method_obj) in extension_methods {
            let hash = self.tokens.intern(method_name);
            methods.insert(hash, method_obj);
        }
        let extension = gc_arena::Gc::allocate(
            mc,
            gc_arena::GcCell::allocate(
                mc,
                ObjData::Class(Class {
                    name: format!("{class_name}$ext"),
                    parent: None,
                    methods,
                    extensions: Vec::new(),
                }),
            ),
        );
        if let ObjData::Class(class) = &mut *class_obj.write(mc) {
            class.extensions.push(extension);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_state_round_trips() {
        let mut manager: ScriptManager = ScriptManager::new();
        manager.lock("Player");
        assert!(manager.is_locked("Player"));
        manager.unlock("Player");
        assert!(!manager.is_locked("Player"));
    }

    #[test]
    fn unknown_name_is_unlocked_by_default() {
        let manager: ScriptManager = ScriptManager::new();
        assert!(!manager.is_locked("Nothing"));
    }
}
