//! The scripting runtime and scene driver: a stack-based bytecode VM with
//! a garbage-collected object heap, plus the frame-by-frame scene/entity
//! driver and tile collision physics that sit on top of it.

pub mod backend;
pub mod compiler;
pub mod error;
pub mod intern;
pub mod manager;
pub mod obj;
pub mod physics;
pub mod runtime;
pub mod scene;
pub mod value;
pub mod vm;

pub use error::{CompileError, EngineError, ErrorChoice, ErrorKind, ErrorPresenter, RuntimeError};
pub use manager::ScriptManager;
pub use runtime::{EngineState, HatchArena, Root};
pub use value::Value;

pub type Result<T> = std::result::Result<T, EngineError>;
