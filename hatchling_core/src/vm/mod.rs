//! The stack-based bytecode interpreter.

pub mod call;
pub mod dispatch;
pub mod frame;
pub mod opcode;
pub mod with;

pub use dispatch::VmThread;
