//! Source-to-bytecode compiler: lexer, recursive-descent parser, and a
//! tree-walking code generator producing a [`chunk::Chunk`].

pub mod ast;
pub mod chunk;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod token;

use gc_arena::MutationContext;

use crate::error::CompileError;
use crate::intern::TokenTable;
use chunk::Chunk;
use codegen::Codegen;
use parser::Parser;

/// Parses and compiles one module's source in a single call, the unit the
/// script manager loads at a time. Returns the module's own chunk first,
/// followed by one chunk per function/method declared anywhere in it;
/// `base_index` is the index the first of these will occupy once the
/// caller appends them to its flat chunk table, so that `Function`
/// objects built during codegen carry correct indices immediately.
pub fn compile<'gc>(
    mc: MutationContext<'gc, '_>,
    source: &str,
    tokens: &mut TokenTable,
    base_index: u32,
    module: crate::obj::Obj<'gc>,
) -> Result<Vec<Chunk<'gc>>, CompileError> {
    let program = Parser::new(source).parse_program()?;
    Codegen::new(mc, base_index, module).compile_script(&program, tokens)
}
