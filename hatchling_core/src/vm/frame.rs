//! One activation record on the VM's call stack.

use crate::obj::Obj;
use crate::value::Value;

pub const FRAMES_MAX: usize = 255;
pub const STACK_MAX: usize = FRAMES_MAX * 256;

#[derive(Debug, Clone)]
pub struct CallFrame<'gc> {
    pub chunk_index: u32,
    pub ip: usize,
    pub slot_base: usize,
    pub function_name: String,
    pub module_path: Option<String>,
    /// The module this frame's function was compiled in, if any --
    /// `GetModuleLocal`/`SetModuleLocal`/`DefineModuleLocal` read and write
    /// through this rather than the global table.
    pub current_module: Option<Obj<'gc>>,
    /// Set only for a frame running a class initializer: overrides
    /// whatever value `Return` popped with the constructed instance, so
    /// `new C(...)` always yields the instance regardless of what (if
    /// anything) the initializer body returns.
    pub constructor_result: Option<Value<'gc>>,
}

impl<'gc> CallFrame<'gc> {
    pub fn new(chunk_index: u32, slot_base: usize, function_name: impl Into<String>) -> Self {
        CallFrame {
            chunk_index,
            ip: 0,
            slot_base,
            function_name: function_name.into(),
            module_path: None,
            current_module: None,
            constructor_result: None,
        }
    }

    pub fn with_module(chunk_index: u32, slot_base: usize, function_name: impl Into<String>, module: Option<Obj<'gc>>) -> Self {
        let mut frame = Self::new(chunk_index, slot_base, function_name);
        frame.current_module = module;
        frame
    }

    pub fn with_constructor_result(
        chunk_index: u32,
        slot_base: usize,
        function_name: impl Into<String>,
        module: Option<Obj<'gc>>,
        result: Value<'gc>,
    ) -> Self {
        let mut frame = Self::with_module(chunk_index, slot_base, function_name, module);
        frame.constructor_result = Some(result);
        frame
    }
}
