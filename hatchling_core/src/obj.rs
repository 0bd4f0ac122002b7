//! The garbage-collected object heap: every non-primitive `Value` variant
//! ultimately points here. Mirrors a small, closed set of object kinds
//! rather than open-ended trait objects, since the bytecode only ever
//! constructs instances of the kinds listed in [`ObjData`].

use gc_arena::{Collect, Gc, GcCell, MutationContext};
use indexmap::IndexMap;

use crate::intern::NameHash;
use crate::value::Value;

pub type Obj<'gc> = Gc<'gc, GcCell<'gc, ObjData<'gc>>>;

#[derive(Collect)]
#[collect(no_drop)]
pub enum ObjData<'gc> {
    Str(String),
    Array(Vec<Value<'gc>>),
    Map(IndexMap<NameHash, Value<'gc>>),
    Instance(Instance<'gc>),
    Class(Class<'gc>),
    Function(Function<'gc>),
    BoundMethod(BoundMethod<'gc>),
    Native(NativeFunction<'gc>),
    Namespace(Namespace<'gc>),
    Enum(EnumObj<'gc>),
    Module(Module<'gc>),
    LinkedInteger(i32),
    LinkedDecimal(f32),
    /// A function value closing over upvalues captured from an enclosing
    /// scope; distinct from a bare [`Function`] so `typeof` can tell them
    /// apart the way the original engine's `OBJ_CLOSURE` does.
    Closure(Closure<'gc>),
    /// A captured variable cell a [`Closure`] reaches through, open while
    /// the enclosing frame is live and closed once it returns.
    Upvalue(Upvalue<'gc>),
    /// A suspended `event` coroutine: its own call stack, parked at a
    /// yield point until resumed.
    Stream(Stream<'gc>),
    /// An opaque handle to host-side render/physics material state.
    Material(MaterialHandle),
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Instance<'gc> {
    pub class: Obj<'gc>,
    pub fields: IndexMap<NameHash, Value<'gc>>,
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Class<'gc> {
    pub name: String,
    pub parent: Option<Obj<'gc>>,
    pub methods: IndexMap<NameHash, Obj<'gc>>,
    /// Entries added by `extend` after first definition, kept in
    /// application order so later `extend`s win ties deterministically.
    pub extensions: Vec<Obj<'gc>>,
}

impl<'gc> Class<'gc> {
    /// Resolves a method by walking extensions most-recent-first, then the
    /// base class, then the parent chain -- the same order field lookup on
    /// an instance shadows methods of the same name.
    pub fn resolve_method(&self, name: NameHash) -> Option<Obj<'gc>> {
        for ext in self.extensions.iter().rev() {
            if let ObjData::Class(c) = &*ext.read() {
                if let Some(m) = c.methods.get(&name) {
                    return Some(*m);
                }
            }
        }
        if let Some(m) = self.methods.get(&name) {
            return Some(*m);
        }
        self.parent.and_then(|p| match &*p.read() {
            ObjData::Class(c) => c.resolve_method(name),
            _ => None,
        })
    }
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Function<'gc> {
    pub name: String,
    pub arity: u8,
    pub chunk_index: u32,
    pub upvalue_count: u8,
    pub is_native_event_handler: bool,
    pub module: Option<Obj<'gc>>,
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct BoundMethod<'gc> {
    pub receiver: Value<'gc>,
    pub method: Obj<'gc>,
}

/// The host ABI signature every registered native follows: argument count,
/// a pointer to the argument slice, and the calling thread's id, returning
/// the call's result value directly.
pub type NativeFn<'gc> = fn(argc: u32, args: *const Value<'gc>, thread_id: u32) -> Value<'gc>;

/// A host-provided function registered into the global table, distinct
/// from bytecode [`Function`]s. The `fn` pointer itself is not GC-traced,
/// since it is never heap allocated by the collector.
#[derive(Clone, Copy)]
pub struct NativeFunction<'gc> {
    pub name: &'static str,
    pub arity: i8,
    pub func: NativeFn<'gc>,
}

unsafe impl<'gc> Collect for NativeFunction<'gc> {
    fn needs_trace() -> bool {
        false
    }
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Closure<'gc> {
    pub function: Obj<'gc>,
    pub upvalues: Vec<Obj<'gc>>,
}

/// A captured local, open while it still aliases a live call frame's slot
/// and closed (holding its own value) once that frame returns.
#[derive(Collect)]
#[collect(no_drop)]
pub enum Upvalue<'gc> {
    Open(usize),
    Closed(Value<'gc>),
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Stream<'gc> {
    pub name: String,
    pub chunk_index: u32,
    pub finished: bool,
    pub saved_locals: Vec<Value<'gc>>,
}

/// Opaque handle into a host-owned material/shader table; the VM only
/// ever moves the id around, never reads behind it.
#[derive(Clone, Copy)]
pub struct MaterialHandle(pub u32);

unsafe impl Collect for MaterialHandle {
    fn needs_trace() -> bool {
        false
    }
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Namespace<'gc> {
    pub name: String,
    pub members: IndexMap<NameHash, Value<'gc>>,
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct EnumObj<'gc> {
    pub name: String,
    pub variants: IndexMap<NameHash, Value<'gc>>,
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Module<'gc> {
    pub path: String,
    pub locals: IndexMap<NameHash, Value<'gc>>,
    pub finished_loading: bool,
}

pub trait ObjExt<'gc> {
    fn type_name(&self) -> &'static str;
    fn as_string(&self) -> Option<String>;
    fn as_linked_integer(&self) -> Option<i32>;
    fn as_linked_decimal(&self) -> Option<f32>;
    fn ptr_eq(a: &Self, b: &Self) -> bool;
}

impl<'gc> ObjExt<'gc> for Obj<'gc> {
    fn type_name(&self) -> &'static str {
        match &*self.read() {
            ObjData::Str(_) => "string",
            ObjData::Array(_) => "array",
            ObjData::Map(_) => "map",
            ObjData::Instance(_) => "instance",
            ObjData::Class(_) => "class",
            ObjData::Function(fun) => {
                if fun.is_native_event_handler {
                    "event"
                } else {
                    "function"
                }
            }
            ObjData::BoundMethod(_) => "function",
            ObjData::Native(_) => "function",
            ObjData::Namespace(_) => "namespace",
            ObjData::Enum(_) => "enum",
            ObjData::Module(_) => "module",
            ObjData::LinkedInteger(_) => "integer",
            ObjData::LinkedDecimal(_) => "decimal",
            ObjData::Closure(_) => "closure",
            ObjData::Upvalue(_) => "upvalue",
            ObjData::Stream(_) => "stream",
            ObjData::Material(_) => "material",
        }
    }

    fn as_string(&self) -> Option<String> {
        match &*self.read() {
            ObjData::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn as_linked_integer(&self) -> Option<i32> {
        match &*self.read() {
            ObjData::LinkedInteger(i) => Some(*i),
            _ => None,
        }
    }

    fn as_linked_decimal(&self) -> Option<f32> {
        match &*self.read() {
            ObjData::LinkedDecimal(d) => Some(*d),
            _ => None,
        }
    }

    fn ptr_eq(a: &Self, b: &Self) -> bool {
        Gc::ptr_eq(*a, *b)
    }
}

impl std::fmt::Debug for ObjData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjData::Str(s) => write!(f, "{s:?}"),
            ObjData::Array(items) => write!(f, "array[{}]", items.len()),
            ObjData::Map(m) => write!(f, "map[{}]", m.len()),
            ObjData::Instance(i) => write!(f, "instance of {:?}", i.class.read().debug_name()),
            ObjData::Class(c) => write!(f, "class {}", c.name),
            ObjData::Function(fun) => write!(f, "fn {}", fun.name),
            ObjData::BoundMethod(_) => write!(f, "bound method"),
            ObjData::Native(n) => write!(f, "native fn {}", n.name),
            ObjData::Namespace(n) => write!(f, "namespace {}", n.name),
            ObjData::Enum(e) => write!(f, "enum {}", e.name),
            ObjData::Module(m) => write!(f, "module {}", m.path),
            ObjData::LinkedInteger(i) => write!(f, "&{i}"),
            ObjData::LinkedDecimal(d) => write!(f, "&{d}"),
            ObjData::Closure(c) => write!(f, "closure[{}]", c.upvalues.len()),
            ObjData::Upvalue(_) => write!(f, "upvalue"),
            ObjData::Stream(s) => write!(f, "stream {}", s.name),
            ObjData::Material(m) => write!(f, "material#{}", m.0),
        }
    }
}

impl ObjData<'_> {
    fn debug_name(&self) -> &str {
        match self {
            ObjData::Class(c) => &c.name,
            _ => "?",
        }
    }
}

pub fn new_string<'gc>(mc: MutationContext<'gc, '_>, s: impl Into<String>) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::Str(s.into())))
}

pub fn new_array<'gc>(mc: MutationContext<'gc, '_>, items: Vec<Value<'gc>>) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::Array(items)))
}

pub fn new_map<'gc>(mc: MutationContext<'gc, '_>, entries: IndexMap<NameHash, Value<'gc>>) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::Map(entries)))
}

pub fn new_linked_integer<'gc>(mc: MutationContext<'gc, '_>, value: i32) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::LinkedInteger(value)))
}

pub fn new_linked_decimal<'gc>(mc: MutationContext<'gc, '_>, value: f32) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::LinkedDecimal(value)))
}

pub fn new_function<'gc>(mc: MutationContext<'gc, '_>, function: Function<'gc>) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::Function(function)))
}

pub fn new_module<'gc>(mc: MutationContext<'gc, '_>, path: String) -> Obj<'gc> {
    Gc::allocate(mc, GcCell::allocate(mc, ObjData::Module(Module { path, locals: IndexMap::new(), finished_loading: false })))
}
