//! The bytecode interpreter's fetch-decode-execute loop.

use std::collections::HashSet;

use gc_arena::MutationContext;
use indexmap::IndexMap;

use super::call::{new_instance, resolve_callee, CallTarget};
use super::frame::{CallFrame, FRAMES_MAX, STACK_MAX};
use super::opcode::OpCode;
use super::with::{WithFrame, WithSource};
use crate::compiler::chunk::Chunk;
use crate::error::{ErrorChoice, ErrorKind, ErrorPresenter, RuntimeError, TraceFrame};
use crate::intern::{murmur32, NameHash, TokenTable};
use crate::obj::{self, Class, ObjData};
use crate::value::{self, Value};

fn bool_value<'gc>(b: bool) -> Value<'gc> {
    Value::Integer(if b { 1 } else { 0 })
}

/// One script's execution context: its own stack, call frames, and
/// `with`-statement state, sharing the heap and global table with every
/// other thread the script manager drives.
pub struct VmThread<'gc> {
    stack: Vec<Value<'gc>>,
    frames: Vec<CallFrame<'gc>>,
    with_stack: Vec<WithFrame<'gc>>,
    ignored_sites: HashSet<(u32, usize)>,
}

impl<'gc> Default for VmThread<'gc> {
    fn default() -> Self {
        VmThread {
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(16),
            with_stack: Vec::new(),
            ignored_sites: HashSet::new(),
        }
    }
}

impl<'gc> VmThread<'gc> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value<'gc>) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::new(ErrorKind::StackOverflow, "value stack exhausted").fatal());
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value<'gc>, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::new(ErrorKind::StackUnderflow, "popped an empty stack").fatal())
    }

    fn peek(&self, distance: usize) -> Result<Value<'gc>, RuntimeError> {
        let len = self.stack.len();
        if distance >= len {
            return Err(RuntimeError::new(ErrorKind::StackUnderflow, "stack peek out of range").fatal());
        }
        Ok(self.stack[len - 1 - distance])
    }

    fn trace(&self, chunks: &[Chunk<'gc>]) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let line_info = chunks
                    .get(frame.chunk_index as usize)
                    .and_then(|chunk| chunk.line_at(frame.ip))
                    .cloned()
                    .unwrap_or_default();
                TraceFrame {
                    function_name: frame.function_name.clone(),
                    module_path: frame.module_path.clone(),
                    line: line_info.line,
                    column: line_info.column,
                }
            })
            .collect()
    }

    /// Runs `chunks[entry_chunk]` to completion, returning its top-level
    /// return value. `globals` and the object heap are shared with every
    /// other thread the calling script manager owns.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        mc: MutationContext<'gc, '_>,
        chunks: &[Chunk<'gc>],
        entry_chunk: u32,
        entry_module: Option<obj::Obj<'gc>>,
        globals: &mut IndexMap<NameHash, Value<'gc>>,
        object_lists: &mut IndexMap<NameHash, Vec<Value<'gc>>>,
        tokens: &TokenTable,
        presenter: &mut dyn ErrorPresenter,
    ) -> Result<Value<'gc>, RuntimeError> {
        self.frames.push(CallFrame::with_module(entry_chunk, 0, "script", entry_module));

        loop {
            let result = self.step(mc, chunks, globals, object_lists, tokens);
            match result {
                Ok(StepOutcome::Continue) => continue,
                Ok(StepOutcome::Return(value)) => {
                    if self.frames.is_empty() {
                        return Ok(value);
                    }
                }
                Err(mut error) => {
                    error.trace = self.trace(chunks);
                    if error.fatal {
                        return Err(error);
                    }
                    let frame = self.frames.last().expect("error raised with an active frame");
                    let site = (frame.chunk_index, frame.ip);
                    if self.ignored_sites.contains(&site) {
                        self.push(Value::Null)?;
                        continue;
                    }
                    match presenter.present(&error) {
                        ErrorChoice::Exit => return Err(error.fatal()),
                        ErrorChoice::IgnoreAll => {
                            self.ignored_sites.insert(site);
                            self.push(Value::Null)?;
                        }
                        ErrorChoice::Continue => {
                            self.push(Value::Null)?;
                        }
                    }
                }
            }
        }
    }

    fn current_chunk<'a>(&self, chunks: &'a [Chunk<'gc>]) -> &'a Chunk<'gc> {
        let frame = self.frames.last().expect("step called with no active frame");
        &chunks[frame.chunk_index as usize]
    }

    fn read_byte(&mut self, chunks: &[Chunk<'gc>]) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let chunk = &chunks[frame.chunk_index as usize];
        let byte = chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self, chunks: &[Chunk<'gc>]) -> u16 {
        let hi = self.read_byte(chunks);
        let lo = self.read_byte(chunks);
        u16::from_be_bytes([hi, lo])
    }

    fn read_name(&mut self, chunks: &[Chunk<'gc>]) -> NameHash {
        let idx = self.read_u16(chunks);
        match self.current_chunk(chunks).constants[idx as usize] {
            Value::Integer(hash) => hash as u32,
            _ => 0,
        }
    }

    fn step(
        &mut self,
        mc: MutationContext<'gc, '_>,
        chunks: &[Chunk<'gc>],
        globals: &mut IndexMap<NameHash, Value<'gc>>,
        object_lists: &mut IndexMap<NameHash, Vec<Value<'gc>>>,
        tokens: &TokenTable,
    ) -> Result<StepOutcome<'gc>, RuntimeError> {
        let frame_ip = self.frames.last().unwrap().ip;
        let _ = frame_ip;
        let byte = self.read_byte(chunks);
        let op = OpCode::from_byte(byte)
            .ok_or_else(|| RuntimeError::new(ErrorKind::InternalInvariant, format!("unknown opcode byte {byte}")).fatal())?;

        match op {
            OpCode::Constant => {
                let idx = self.read_u16(chunks);
                let value = self.current_chunk(chunks).constants[idx as usize];
                self.push(value)?;
            }
            OpCode::Integer => {
                let bytes = [
                    self.read_byte(chunks),
                    self.read_byte(chunks),
                    self.read_byte(chunks),
                    self.read_byte(chunks),
                ];
                self.push(Value::Integer(i32::from_be_bytes(bytes)))?;
            }
            OpCode::Decimal => {
                let idx = self.read_u16(chunks);
                let value = self.current_chunk(chunks).constants[idx as usize];
                self.push(value)?;
            }
            OpCode::Null => self.push(Value::Null)?,
            OpCode::True => self.push(Value::Integer(1))?,
            OpCode::False => self.push(Value::Integer(0))?,
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Popn => {
                let count = self.read_byte(chunks);
                for _ in 0..count {
                    self.pop()?;
                }
            }
            OpCode::Copy => {
                let top = self.peek(0)?;
                self.push(top)?;
            }

            OpCode::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(value::add(mc, &a, &b).map_err(arith_error)?)?;
            }
            OpCode::Subtract => self.binary(value::subtract)?,
            OpCode::Multiply => self.binary(value::multiply)?,
            OpCode::Divide => self.binary(value::divide)?,
            OpCode::Modulo => self.binary(value::modulo)?,

            OpCode::Negate => {
                let v = self.pop()?;
                let out = match v {
                    Value::Integer(i) => Value::Integer(-i),
                    Value::Decimal(d) => Value::Decimal(-d),
                    other => match other.as_number() {
                        Some(n) => Value::Decimal(-n),
                        None => return Err(RuntimeError::new(ErrorKind::TypeMismatch, "cannot negate a non-numeric value")),
                    },
                };
                self.push(out)?;
            }
            OpCode::Increment => {
                let v = self.pop()?;
                self.push(value::add(mc, &v, &Value::Integer(1)).map_err(arith_error)?)?;
            }
            OpCode::Decrement => {
                let v = self.pop()?;
                self.push(value::subtract(&v, &Value::Integer(1)).map_err(arith_error)?)?;
            }

            OpCode::BwNot => {
                let v = self.pop()?;
                let i = v.as_integer().ok_or_else(|| RuntimeError::new(ErrorKind::TypeMismatch, "~ requires an integer"))?;
                self.push(Value::Integer(!i))?;
            }
            OpCode::BwAnd => self.binary_int(|a, b| a & b)?,
            OpCode::BwOr => self.binary_int(|a, b| a | b)?,
            OpCode::BwXor => self.binary_int(|a, b| a ^ b)?,
            OpCode::BitshiftLeft => self.binary_int(|a, b| a << (b & 31))?,
            OpCode::BitshiftRight => self.binary_int(|a, b| a >> (b & 31))?,

            OpCode::LgNot => {
                let v = self.pop()?;
                self.push(bool_value(!v.is_truthy()))?;
            }
            OpCode::LgAnd => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(bool_value(a.is_truthy() && b.is_truthy()))?;
            }
            OpCode::LgOr => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(bool_value(a.is_truthy() || b.is_truthy()))?;
            }

            OpCode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(bool_value(value::values_equal(&a, &b)))?;
            }
            OpCode::EqualNot => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(bool_value(!value::values_equal(&a, &b)))?;
            }
            OpCode::SortaEqual => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(bool_value(value::values_sorta_equal(&a, &b)))?;
            }
            OpCode::Greater => self.compare(|o| o == std::cmp::Ordering::Greater)?,
            OpCode::GreaterEqual => self.compare(|o| o != std::cmp::Ordering::Less)?,
            OpCode::Less => self.compare(|o| o == std::cmp::Ordering::Less)?,
            OpCode::LessEqual => self.compare(|o| o != std::cmp::Ordering::Greater)?,

            OpCode::Jump => {
                let offset = self.read_u16(chunks);
                self.frames.last_mut().unwrap().ip += offset as usize;
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16(chunks);
                if !self.peek(0)?.is_truthy() {
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
            }
            OpCode::JumpBack => {
                let offset = self.read_u16(chunks);
                self.frames.last_mut().unwrap().ip -= offset as usize;
            }

            OpCode::DefineGlobal => {
                let name = self.read_name(chunks);
                let value = self.pop()?;
                globals.insert(name, value);
            }
            OpCode::GetGlobal => {
                let name = self.read_name(chunks);
                let value = globals
                    .get(&name)
                    .copied()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::NameResolution, "undefined global"))?;
                self.push(value)?;
            }
            OpCode::SetGlobal => {
                let name = self.read_name(chunks);
                let value = self.peek(0)?;
                if !globals.contains_key(&name) {
                    return Err(RuntimeError::new(ErrorKind::NameResolution, "assignment to undeclared global"));
                }
                globals.insert(name, value);
            }
            OpCode::GetLocal => {
                let slot = self.read_byte(chunks) as usize;
                let base = self.frames.last().unwrap().slot_base;
                let value = self.stack[base + slot];
                self.push(value)?;
            }
            OpCode::SetLocal => {
                let slot = self.read_byte(chunks) as usize;
                let base = self.frames.last().unwrap().slot_base;
                let value = self.peek(0)?;
                self.stack[base + slot] = value;
            }
            OpCode::GetModuleLocal | OpCode::SetModuleLocal | OpCode::DefineModuleLocal => {
                let name = self.read_name(chunks);
                let module = self
                    .frames
                    .last()
                    .unwrap()
                    .current_module
                    .ok_or_else(|| RuntimeError::new(ErrorKind::InternalInvariant, "module-local opcode outside a module").fatal())?;
                match op {
                    OpCode::DefineModuleLocal => {
                        let value = self.pop()?;
                        if let ObjData::Module(m) = &mut *module.write(mc) {
                            m.locals.insert(name, value);
                        }
                    }
                    OpCode::SetModuleLocal => {
                        let value = self.peek(0)?;
                        if let ObjData::Module(m) = &mut *module.write(mc) {
                            m.locals.insert(name, value);
                        }
                    }
                    _ => {
                        let value = match &*module.read() {
                            ObjData::Module(m) => m.locals.get(&name).copied().unwrap_or(Value::Null),
                            _ => Value::Null,
                        };
                        self.push(value)?;
                    }
                }
            }
            OpCode::DefineConstant => {
                let name = self.read_name(chunks);
                let value = self.pop()?;
                globals.insert(name, value);
            }

            OpCode::GetProperty | OpCode::HasProperty => {
                let name = self.read_name(chunks);
                let receiver = self.pop()?;
                match op {
                    OpCode::HasProperty => {
                        let has = get_field(&receiver, name).is_some();
                        self.push(bool_value(has))?;
                    }
                    _ => {
                        let value = get_field(&receiver, name)
                            .ok_or_else(|| RuntimeError::new(ErrorKind::NameResolution, "undefined property"))?;
                        self.push(value)?;
                    }
                }
            }
            OpCode::SetProperty => {
                let name = self.read_name(chunks);
                let value = self.pop()?;
                let receiver = self.pop()?;
                set_field(mc, &receiver, name, value)?;
                self.push(value)?;
            }
            OpCode::GetElement => {
                let index = self.pop()?;
                let receiver = self.pop()?;
                self.push(get_element(&receiver, &index)?)?;
            }
            OpCode::SetElement => {
                let value = self.pop()?;
                let index = self.pop()?;
                let receiver = self.pop()?;
                set_element(mc, &receiver, &index, value)?;
                self.push(value)?;
            }

            OpCode::NewArray => {
                let count = self.read_byte(chunks) as usize;
                let mut items = vec![Value::Null; count];
                for slot in items.iter_mut().rev() {
                    *slot = self.pop()?;
                }
                self.push(Value::Object(obj::new_array(mc, items)))?;
            }
            OpCode::NewMap => {
                let count = self.read_byte(chunks) as usize;
                let mut entries = IndexMap::new();
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    pairs.push((key, value));
                }
                for (key, value) in pairs.into_iter().rev() {
                    entries.insert(map_key(&key), value);
                }
                self.push(Value::Object(obj::new_map(mc, entries)))?;
            }

            OpCode::Print => {
                let value = self.pop()?;
                tracing::info!(target: "script", "{:?}", value);
            }
            OpCode::PrintStack => {
                tracing::info!(target: "script", stack_depth = self.stack.len(), "stack dump requested");
            }

            OpCode::Typeof => {
                let value = self.pop()?;
                self.push(Value::Object(obj::new_string(mc, value.type_name())))?;
            }

            OpCode::Class => {
                let name = self.read_name(chunks);
                let class_name = name_text(tokens, name).unwrap_or_default();
                let class_obj = obj::ObjData::Class(Class {
                    name: class_name,
                    parent: None,
                    methods: IndexMap::new(),
                    extensions: Vec::new(),
                });
                let allocated = gc_arena::Gc::allocate(mc, gc_arena::GcCell::allocate(mc, class_obj));
                self.push(Value::Object(allocated))?;
            }
            OpCode::Inherit => {
                let parent = self.pop()?;
                let child = self.peek(0)?;
                if let (Value::Object(parent_obj), Value::Object(child_obj)) = (parent, child) {
                    if let ObjData::Class(child_class) = &mut *child_obj.write(mc) {
                        child_class.parent = Some(parent_obj);
                    }
                }
            }
            OpCode::Method => {
                let name = self.read_name(chunks);
                let method = self.pop()?;
                let class = self.peek(0)?;
                if let (Value::Object(class_obj), Value::Object(method_obj)) = (class, method) {
                    if let ObjData::Class(class_data) = &mut *class_obj.write(mc) {
                        class_data.methods.insert(name, method_obj);
                    }
                }
            }
            OpCode::GetSuperclass => {
                let value = self.pop()?;
                if let Value::Object(obj) = value {
                    if let ObjData::Class(class) = &*obj.read() {
                        self.push(class.parent.map(Value::Object).unwrap_or(Value::Null))?;
                    } else {
                        self.push(Value::Null)?;
                    }
                } else {
                    self.push(Value::Null)?;
                }
            }
            OpCode::Super => {
                let method_name = self.read_name(chunks);
                let slot = self.frames.last().unwrap().slot_base;
                let this_value = self.stack[slot];
                let parent_class = match this_value {
                    Value::Object(obj) => match &*obj.read() {
                        ObjData::Instance(instance) => match &*instance.class.read() {
                            ObjData::Class(class) => class.parent,
                            _ => None,
                        },
                        _ => None,
                    },
                    _ => None,
                };
                let method = parent_class.and_then(|parent_obj| match &*parent_obj.read() {
                    ObjData::Class(class) => class.resolve_method(method_name),
                    _ => None,
                });
                let method =
                    method.ok_or_else(|| RuntimeError::new(ErrorKind::UnknownMethod, "no superclass method with that name"))?;
                let bound = gc_arena::Gc::allocate(
                    mc,
                    gc_arena::GcCell::allocate(mc, ObjData::BoundMethod(obj::BoundMethod { receiver: this_value, method })),
                );
                self.push(Value::Object(bound))?;
            }

            OpCode::New => {
                let arg_count = self.read_byte(chunks);
                let class = self.peek(arg_count as usize)?;
                if let Value::Object(class_obj) = class {
                    self.construct(mc, class_obj, arg_count, object_lists)?;
                } else {
                    return Err(RuntimeError::new(ErrorKind::TypeMismatch, "new requires a class value"));
                }
            }

            OpCode::Call => {
                let arg_count = self.read_byte(chunks);
                self.dispatch_call(mc, chunks, globals, object_lists, arg_count)?;
            }
            OpCode::Invoke => {
                let arg_count = self.read_byte(chunks);
                let method_name = self.read_name(chunks);
                self.dispatch_invoke(mc, chunks, globals, object_lists, arg_count, method_name)?;
            }
            OpCode::Return => {
                let value = self.pop()?;
                let frame = self.frames.pop().unwrap();
                let value = frame.constructor_result.unwrap_or(value);
                self.stack.truncate(frame.slot_base);
                if self.frames.is_empty() {
                    return Ok(StepOutcome::Return(value));
                }
                self.push(value)?;
            }

            OpCode::With => {
                let receiver = self.pop()?;
                let slot = self.frames.last().unwrap().slot_base;
                let saved_receiver = self.stack[slot];
                let source = match receiver {
                    Value::Object(obj) => match &*obj.read() {
                        ObjData::Array(items) => WithSource::List(items.clone()),
                        ObjData::Str(name) => {
                            WithSource::List(object_lists.get(&murmur32(name.as_bytes())).cloned().unwrap_or_default())
                        }
                        _ => WithSource::Single(Value::Object(obj)),
                    },
                    Value::Null => WithSource::List(Vec::new()),
                    other => WithSource::Single(other),
                };
                self.with_stack.push(WithFrame::enter(source, saved_receiver, slot));
            }
            OpCode::WithNext => {
                let frame = self
                    .with_stack
                    .last_mut()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::InternalInvariant, "with-loop stack underflow").fatal())?;
                match frame.advance() {
                    Some(value) => {
                        let slot = frame.slot;
                        self.stack[slot] = value;
                        self.push(Value::Integer(1))?;
                    }
                    None => self.push(Value::Integer(0))?,
                }
            }
            OpCode::WithFinish => {
                let frame = self
                    .with_stack
                    .pop()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::InternalInvariant, "with-loop stack underflow").fatal())?;
                self.stack[frame.slot] = frame.saved_receiver;
            }
            OpCode::EnumNext => {
                let iterator_slot = self.peek(0)?;
                let has_next = !matches!(iterator_slot, Value::Null);
                self.push(bool_value(has_next))?;
            }

            OpCode::SaveValue => {
                let value = self.pop()?;
                self.push(value)?;
            }
            OpCode::LoadValue => {
                let value = self.peek(0)?;
                self.push(value)?;
            }

            OpCode::SwitchTable | OpCode::Switch => {
                let _jump_count = self.read_u16(chunks);
            }
            OpCode::Failsafe => {}

            OpCode::Event => {
                let _arg_count = self.read_byte(chunks);
            }

            OpCode::Import | OpCode::ImportModule => {
                let module_name = self.read_name(chunks);
                if !globals.contains_key(&module_name) {
                    return Err(RuntimeError::new(ErrorKind::ImportFailure, "imported module is not loaded"));
                }
            }
            OpCode::UseNamespace => {
                let namespace_name = self.read_name(chunks);
                let namespace_value = globals
                    .get(&namespace_name)
                    .copied()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::ImportFailure, "undefined namespace"))?;
                let Value::Object(ns_obj) = namespace_value else {
                    return Err(RuntimeError::new(ErrorKind::ImportFailure, "using namespace target is not a namespace"));
                };
                let members: Vec<(NameHash, Value<'gc>)> = match &*ns_obj.read() {
                    ObjData::Namespace(ns) => ns.members.iter().map(|(k, v)| (*k, *v)).collect(),
                    _ => return Err(RuntimeError::new(ErrorKind::ImportFailure, "using namespace target is not a namespace")),
                };
                for (member_name, member_value) in members {
                    merge_namespace_member(mc, globals, member_name, member_value);
                }
            }
            OpCode::NewEnum => {
                let name = self.read_name(chunks);
                let name_text = name_text(tokens, name).unwrap_or_default();
                let enum_obj = obj::ObjData::Enum(obj::EnumObj { name: name_text, variants: IndexMap::new() });
                let allocated = gc_arena::Gc::allocate(mc, gc_arena::GcCell::allocate(mc, enum_obj));
                self.push(Value::Object(allocated))?;
            }
            OpCode::AddEnum => {
                let name = self.read_name(chunks);
                let value = self.pop()?;
                let enum_val = self.peek(0)?;
                if let Value::Object(obj) = enum_val {
                    if let ObjData::Enum(e) = &mut *obj.write(mc) {
                        e.variants.insert(name, value);
                    }
                }
            }

            OpCode::Error => {
                return Err(RuntimeError::new(ErrorKind::InternalInvariant, "OP_ERROR reached at runtime").fatal());
            }
        }

        Ok(StepOutcome::Continue)
    }

    fn binary(&mut self, op: fn(&Value<'gc>, &Value<'gc>) -> Result<Value<'gc>, crate::value::ArithmeticError>) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(op(&a, &b).map_err(arith_error)?)
    }

    fn binary_int(&mut self, op: fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let (Some(x), Some(y)) = (a.as_integer(), b.as_integer()) else {
            return Err(RuntimeError::new(ErrorKind::TypeMismatch, "bitwise operator requires integers"));
        };
        self.push(Value::Integer(op(x, y)))
    }

    fn compare(&mut self, pred: fn(std::cmp::Ordering) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop()?;
        let a = self.pop()?;
        let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
            return Err(RuntimeError::new(ErrorKind::TypeMismatch, "comparison requires numeric operands"));
        };
        let ordering = x.partial_cmp(&y).ok_or_else(|| RuntimeError::new(ErrorKind::Arithmetic, "NaN comparison"))?;
        self.push(bool_value(pred(ordering)))
    }

    fn dispatch_call(
        &mut self,
        mc: MutationContext<'gc, '_>,
        chunks: &[Chunk<'gc>],
        globals: &mut IndexMap<NameHash, Value<'gc>>,
        object_lists: &mut IndexMap<NameHash, Vec<Value<'gc>>>,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        let callee = self.peek(arg_count as usize)?;
        match resolve_callee(&callee, arg_count)? {
            CallTarget::Script { chunk_index, name, bind_receiver, module, .. } => {
                if self.frames.len() >= FRAMES_MAX {
                    return Err(RuntimeError::new(ErrorKind::FrameOverflow, "call stack too deep").fatal());
                }
                let slot_base = self.stack.len() - arg_count as usize - 1;
                if let Some(receiver) = bind_receiver {
                    self.stack[slot_base] = receiver;
                }
                self.frames.push(CallFrame::with_module(chunk_index, slot_base, name, module));
                let _ = globals;
            }
            CallTarget::Native(native) => self.call_native(native, arg_count)?,
            CallTarget::Constructor { class } => self.construct(mc, class, arg_count, object_lists)?,
        }
        let _ = chunks;
        Ok(())
    }

    fn dispatch_invoke(
        &mut self,
        mc: MutationContext<'gc, '_>,
        chunks: &[Chunk<'gc>],
        globals: &mut IndexMap<NameHash, Value<'gc>>,
        object_lists: &mut IndexMap<NameHash, Vec<Value<'gc>>>,
        arg_count: u8,
        method_name: NameHash,
    ) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize)?;
        let method = get_field(&receiver, method_name)
            .ok_or_else(|| RuntimeError::new(ErrorKind::UnknownMethod, "undefined method"))?;
        // Re-push the resolved method in place of the bare receiver isn't
        // needed here: calls resolve straight from the looked-up value.
        let target = resolve_callee(&method, arg_count)?;
        match target {
            CallTarget::Script { chunk_index, name, bind_receiver, module, .. } => {
                if self.frames.len() >= FRAMES_MAX {
                    return Err(RuntimeError::new(ErrorKind::FrameOverflow, "call stack too deep").fatal());
                }
                let slot_base = self.stack.len() - arg_count as usize - 1;
                if let Some(receiver) = bind_receiver {
                    self.stack[slot_base] = receiver;
                }
                self.frames.push(CallFrame::with_module(chunk_index, slot_base, name, module));
            }
            CallTarget::Native(native) => self.call_native(native, arg_count)?,
            CallTarget::Constructor { class } => self.construct(mc, class, arg_count, object_lists)?,
        }
        let _ = (chunks, globals);
        Ok(())
    }

    /// Pops `arg_count` arguments plus the callee and invokes a host
    /// function directly, per the ABI in `NativeFn`: argument count, a
    /// pointer to the (reversed-back-to-order) argument slice, and this
    /// thread's id.
    fn call_native(&mut self, native: obj::NativeFunction<'gc>, arg_count: u8) -> Result<(), RuntimeError> {
        let mut args = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            args.push(self.pop()?);
        }
        args.reverse();
        self.pop()?; // callee
        let result = (native.func)(args.len() as u32, args.as_ptr(), 0);
        self.push(result)
    }

    /// Allocates an instance of `class`, resolves its initializer (a
    /// method named the same as the class, looked up the same way any
    /// other method is), and if one exists pushes a frame to run it with
    /// the instance bound in place of the callee slot -- `Return` reads
    /// the frame's `constructor_result` instead of whatever the
    /// initializer body itself returns, so the expression always yields
    /// the instance. Registers the instance into `object_lists` under its
    /// class name either way, so `with (ClassName)` can find it.
    fn construct(
        &mut self,
        mc: MutationContext<'gc, '_>,
        class: obj::Obj<'gc>,
        arg_count: u8,
        object_lists: &mut IndexMap<NameHash, Vec<Value<'gc>>>,
    ) -> Result<(), RuntimeError> {
        let (class_name, initializer) = match &*class.read() {
            ObjData::Class(class_data) => {
                let hash = murmur32(class_data.name.as_bytes());
                (class_data.name.clone(), class_data.resolve_method(hash))
            }
            _ => return Err(RuntimeError::new(ErrorKind::TypeMismatch, "new requires a class value").fatal()),
        };
        let instance = new_instance(mc, class);
        let class_slot = self.stack.len() - arg_count as usize - 1;
        self.stack[class_slot] = Value::Object(instance);

        object_lists.entry(murmur32(class_name.as_bytes())).or_default().push(Value::Object(instance));

        match initializer {
            Some(method_obj) => {
                let (arity, chunk_index, name, module) = match &*method_obj.read() {
                    ObjData::Function(f) => (f.arity, f.chunk_index, f.name.clone(), f.module),
                    _ => return Err(RuntimeError::new(ErrorKind::InternalInvariant, "initializer is not a script function").fatal()),
                };
                if arity != arg_count {
                    return Err(RuntimeError::new(
                        ErrorKind::TypeMismatch,
                        format!("'{class_name}' initializer expects {arity} argument(s), got {arg_count}"),
                    ));
                }
                if self.frames.len() >= FRAMES_MAX {
                    return Err(RuntimeError::new(ErrorKind::FrameOverflow, "call stack too deep").fatal());
                }
                self.frames
                    .push(CallFrame::with_constructor_result(chunk_index, class_slot, name, module, Value::Object(instance)));
            }
            None => {
                self.stack.truncate(class_slot);
                self.push(Value::Object(instance))?;
            }
        }
        Ok(())
    }
}

enum StepOutcome<'gc> {
    Continue,
    Return(Value<'gc>),
}

fn arith_error(err: crate::value::ArithmeticError) -> RuntimeError {
    match err {
        crate::value::ArithmeticError::DivideByZero => RuntimeError::new(ErrorKind::Arithmetic, "division by zero"),
        crate::value::ArithmeticError::Unsupported(a, b) => {
            RuntimeError::new(ErrorKind::TypeMismatch, format!("cannot apply operator to {a} and {b}"))
        }
    }
}

fn get_field<'gc>(receiver: &Value<'gc>, name: NameHash) -> Option<Value<'gc>> {
    match receiver {
        Value::Object(obj) => match &*obj.read() {
            ObjData::Instance(instance) => instance
                .fields
                .get(&name)
                .copied()
                .or_else(|| match &*instance.class.read() {
                    ObjData::Class(class) => class.resolve_method(name).map(Value::Object),
                    _ => None,
                }),
            ObjData::Namespace(ns) => ns.members.get(&name).copied(),
            ObjData::Map(map) => map.get(&name).copied(),
            ObjData::Enum(e) => e.variants.get(&name).copied(),
            ObjData::Class(class) => class.resolve_method(name).map(Value::Object),
            _ => None,
        },
        _ => None,
    }
}

fn set_field<'gc>(
    mc: MutationContext<'gc, '_>,
    receiver: &Value<'gc>,
    name: NameHash,
    value: Value<'gc>,
) -> Result<(), RuntimeError> {
    match receiver {
        Value::Object(obj) => match &mut *obj.write(mc) {
            ObjData::Instance(instance) => {
                instance.fields.insert(name, value);
                Ok(())
            }
            ObjData::Namespace(ns) => {
                ns.members.insert(name, value);
                Ok(())
            }
            ObjData::Map(map) => {
                map.insert(name, value);
                Ok(())
            }
            _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, "value does not support property assignment")),
        },
        _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, "cannot set a property on a non-object value")),
    }
}

/// Maps are keyed by the stringified form of whatever index expression was
/// used -- `m[5]` and `m["5"]` name the same entry -- hashed the same way
/// every other name in the VM is hashed, so no interning is needed at the
/// point of use.
fn map_key(index: &Value) -> NameHash {
    murmur32(index.stringify().as_bytes())
}

fn array_index(i: i32, len: usize) -> Result<usize, RuntimeError> {
    if i < 0 || i as usize >= len {
        return Err(RuntimeError::new(ErrorKind::IndexOutOfRange, "array index out of range"));
    }
    Ok(i as usize)
}

fn get_element<'gc>(receiver: &Value<'gc>, index: &Value<'gc>) -> Result<Value<'gc>, RuntimeError> {
    match receiver {
        Value::Object(obj) => match &*obj.read() {
            ObjData::Array(items) => {
                let i = index
                    .as_integer()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::TypeMismatch, "array index must be an integer"))?;
                let idx = array_index(i, items.len())?;
                Ok(items[idx])
            }
            ObjData::Map(map) => {
                let key = map_key(index);
                map.get(&key)
                    .copied()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::IndexOutOfRange, "map key not found"))
            }
            _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, "value is not indexable")),
        },
        _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, "value is not indexable")),
    }
}

fn set_element<'gc>(
    mc: MutationContext<'gc, '_>,
    receiver: &Value<'gc>,
    index: &Value<'gc>,
    value: Value<'gc>,
) -> Result<(), RuntimeError> {
    match receiver {
        Value::Object(obj) => match &mut *obj.write(mc) {
            ObjData::Array(items) => {
                let i = index
                    .as_integer()
                    .ok_or_else(|| RuntimeError::new(ErrorKind::TypeMismatch, "array index must be an integer"))?;
                let idx = array_index(i, items.len())?;
                items[idx] = value;
                Ok(())
            }
            ObjData::Map(map) => {
                let key = map_key(index);
                map.insert(key, value);
                Ok(())
            }
            _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, "value does not support element assignment")),
        },
        _ => Err(RuntimeError::new(ErrorKind::TypeMismatch, "value is not indexable")),
    }
}

fn merge_namespace_member<'gc>(
    mc: MutationContext<'gc, '_>,
    globals: &mut IndexMap<NameHash, Value<'gc>>,
    name: NameHash,
    incoming: Value<'gc>,
) {
    if let Value::Object(incoming_obj) = incoming {
        if let Some(Value::Object(existing_obj)) = globals.get(&name).copied() {
            let both_classes =
                matches!(&*incoming_obj.read(), ObjData::Class(_)) && matches!(&*existing_obj.read(), ObjData::Class(_));
            if both_classes {
                if let ObjData::Class(existing_class) = &mut *existing_obj.write(mc) {
                    existing_class.extensions.push(incoming_obj);
                }
                return;
            }
        }
    }
    globals.insert(name, incoming);
}

fn name_text(tokens: &TokenTable, hash: NameHash) -> Option<String> {
    tokens.text(hash).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_frame_starts_at_init() {
        let frame = WithFrame::enter(WithSource::Single(Value::Null), Value::Null, 0);
        assert_eq!(frame.phase, super::super::with::WithPhase::Init);
    }
}
