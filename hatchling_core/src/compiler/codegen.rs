//! Lowers the syntax tree into a [`Chunk`] of bytecode.
//!
//! One [`Codegen`] instance per function body; nested function and method
//! declarations recurse into a fresh instance and the resulting
//! [`Function`](crate::obj::Function) object is emitted as a constant of
//! the enclosing chunk.

use gc_arena::MutationContext;

use super::ast::*;
use super::chunk::{Chunk, LineInfo};
use crate::error::CompileError;
use crate::intern::{murmur32, TokenTable};
use crate::obj;
use crate::obj::Obj;
use crate::value::Value;
use crate::vm::opcode::OpCode;

struct Local {
    name: String,
    depth: u32,
}

enum LoopKind {
    Break,
    Continue,
}

struct PendingJump {
    offset: usize,
    kind: LoopKind,
}

pub struct Codegen<'gc, 'mc> {
    mc: MutationContext<'gc, 'mc>,
    chunk: Chunk<'gc>,
    locals: Vec<Local>,
    scope_depth: u32,
    loop_patches: Vec<PendingJump>,
    line: LineInfo,
    /// The chunk index this instance's top-level `chunk` will occupy once
    /// registered with the script manager's flat chunk table.
    base_index: u32,
    /// Chunks for nested functions/methods discovered while compiling,
    /// in the order their `Constant`+`DefineGlobal`/`Method` pair is
    /// emitted. Chunk `i` here occupies `base_index + 1 + i` in the
    /// manager's table; compiling nested-within-nested functions reuses
    /// this same accumulator, so ordering stays correct regardless of
    /// nesting depth.
    pending_chunks: Vec<Chunk<'gc>>,
    /// The module every function compiled through this instance (including
    /// nested function/method bodies) is stamped with, so module-local
    /// storage opcodes emitted inside a function body can find their way
    /// back to the right [`obj::Module`] at call time.
    module: Obj<'gc>,
}

impl<'gc, 'mc> Codegen<'gc, 'mc> {
    pub fn new(mc: MutationContext<'gc, 'mc>, base_index: u32, module: Obj<'gc>) -> Self {
        Codegen {
            mc,
            chunk: Chunk::new(),
            locals: Vec::new(),
            scope_depth: 0,
            loop_patches: Vec::new(),
            line: LineInfo::default(),
            base_index,
            pending_chunks: Vec::new(),
            module,
        }
    }

    /// Compiles a module's top-level statements, returning its own chunk
    /// followed by every function/method chunk discovered along the way
    /// in discovery order. The caller registers all of them starting at
    /// `base_index`, so [`obj::Function::chunk_index`] values baked in
    /// during codegen stay valid.
    pub fn compile_script(mut self, program: &[Stmt], tokens: &mut TokenTable) -> Result<Vec<Chunk<'gc>>, CompileError> {
        for stmt in program {
            self.statement(stmt, tokens)?;
        }
        self.chunk.write_op(OpCode::Null, self.line.clone());
        self.chunk.write_op(OpCode::Return, self.line.clone());
        let mut chunks = vec![self.chunk];
        chunks.extend(self.pending_chunks);
        Ok(chunks)
    }

    fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.line.clone());
    }

    fn emit_u16(&mut self, value: u16) {
        self.chunk.write_u16(value, self.line.clone());
    }

    fn name_constant(&mut self, name: &str, tokens: &mut TokenTable) -> u16 {
        let hash = tokens.intern(name);
        self.chunk.add_constant(Value::Integer(hash as i32))
    }

    fn resolve_local(&self, name: &str) -> Option<u16> {
        self.locals.iter().rposition(|l| l.name == name).map(|i| i as u16)
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while let Some(last) = self.locals.last() {
            if last.depth > self.scope_depth {
                self.emit(OpCode::Pop);
                self.locals.pop();
            } else {
                break;
            }
        }
    }

    fn statement(&mut self, stmt: &Stmt, tokens: &mut TokenTable) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.expression(expr, tokens)?;
                self.emit(OpCode::Pop);
            }
            Stmt::Print(expr) => {
                self.expression(expr, tokens)?;
                self.emit(OpCode::Print);
            }
            Stmt::PrintStack => self.emit(OpCode::PrintStack),
            Stmt::VarDecl { name, init } => {
                match init {
                    Some(expr) => self.expression(expr, tokens)?,
                    None => self.emit(OpCode::Null),
                }
                if self.scope_depth > 0 {
                    self.locals.push(Local { name: name.clone(), depth: self.scope_depth });
                } else {
                    self.emit(OpCode::DefineGlobal);
                    let idx = self.name_constant(name, tokens);
                    self.emit_u16(idx);
                }
            }
            Stmt::ModuleLocalDecl { name, init, .. } => {
                match init {
                    Some(expr) => self.expression(expr, tokens)?,
                    None => self.emit(OpCode::Null),
                }
                self.emit(OpCode::DefineModuleLocal);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
            }
            Stmt::Block(body) => {
                self.begin_scope();
                for s in body {
                    self.statement(s, tokens)?;
                }
                self.end_scope();
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.expression(cond, tokens)?;
                self.emit(OpCode::JumpIfFalse);
                let then_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.emit(OpCode::Pop);
                for s in then_branch {
                    self.statement(s, tokens)?;
                }
                self.emit(OpCode::Jump);
                let else_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.chunk.patch_jump(then_jump);
                self.emit(OpCode::Pop);
                if let Some(else_branch) = else_branch {
                    for s in else_branch {
                        self.statement(s, tokens)?;
                    }
                }
                self.chunk.patch_jump(else_jump);
            }
            Stmt::While { cond, body } => self.compile_loop(None, cond, None, body, tokens)?,
            Stmt::DoWhile { body, cond } => {
                let loop_start = self.chunk.code.len();
                let patch_base = self.loop_patches.len();
                for s in body {
                    self.statement(s, tokens)?;
                }
                self.patch_continues(patch_base, self.chunk.code.len());
                self.expression(cond, tokens)?;
                self.emit(OpCode::JumpIfFalse);
                let exit_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.emit(OpCode::Pop);
                self.emit(OpCode::JumpBack);
                self.emit_u16((self.chunk.code.len() - loop_start + 2) as u16);
                self.chunk.patch_jump(exit_jump);
                self.emit(OpCode::Pop);
                self.patch_breaks(patch_base, self.chunk.code.len());
            }
            Stmt::For { init, cond, step, body } => {
                self.begin_scope();
                if let Some(init) = init {
                    self.statement(init, tokens)?;
                }
                self.compile_loop(None, cond.as_ref().unwrap_or(&Expr::True), step.as_ref(), body, tokens)?;
                self.end_scope();
            }
            Stmt::Foreach { var, iterable, body } => {
                self.begin_scope();
                self.locals.push(Local { name: "@iter".into(), depth: self.scope_depth });
                self.expression(iterable, tokens)?;
                self.locals.push(Local { name: var.clone(), depth: self.scope_depth });
                self.emit(OpCode::Null);
                let loop_start = self.chunk.code.len();
                self.emit(OpCode::EnumNext);
                self.emit(OpCode::JumpIfFalse);
                let exit_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.emit(OpCode::Pop);
                for s in body {
                    self.statement(s, tokens)?;
                }
                self.emit(OpCode::JumpBack);
                self.emit_u16((self.chunk.code.len() - loop_start + 2) as u16);
                self.chunk.patch_jump(exit_jump);
                self.emit(OpCode::Pop);
                self.end_scope();
            }
            Stmt::Repeat { count, var, body } => {
                // Desugars to a counted `for`: a hidden local holds the
                // remaining iteration count, decremented each pass; `var`,
                // if named, is bound to the same counter so the body can
                // read how many repeats are left.
                self.begin_scope();
                self.expression(count, tokens)?;
                self.locals.push(Local { name: "@repeat".into(), depth: self.scope_depth });
                let counter_slot = self.resolve_local("@repeat").unwrap();
                if let Some(var) = var {
                    self.emit(OpCode::GetLocal);
                    self.chunk.write_byte(counter_slot as u8, self.line.clone());
                    self.locals.push(Local { name: var.clone(), depth: self.scope_depth });
                }

                let loop_start = self.chunk.code.len();
                self.emit(OpCode::GetLocal);
                self.chunk.write_byte(counter_slot as u8, self.line.clone());
                let zero_idx = self.chunk.add_constant(Value::Integer(0));
                self.emit(OpCode::Constant);
                self.emit_u16(zero_idx);
                self.emit(OpCode::Greater);
                self.emit(OpCode::JumpIfFalse);
                let exit_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.emit(OpCode::Pop);

                let patch_base = self.loop_patches.len();
                for s in body {
                    self.statement(s, tokens)?;
                }
                let continue_target = self.chunk.code.len();
                self.emit(OpCode::GetLocal);
                self.chunk.write_byte(counter_slot as u8, self.line.clone());
                self.emit(OpCode::Decrement);
                self.emit(OpCode::SetLocal);
                self.chunk.write_byte(counter_slot as u8, self.line.clone());
                self.emit(OpCode::Pop);
                if var.is_some() {
                    self.emit(OpCode::GetLocal);
                    self.chunk.write_byte(counter_slot as u8, self.line.clone());
                    self.emit(OpCode::SetLocal);
                    self.chunk.write_byte((counter_slot + 1) as u8, self.line.clone());
                    self.emit(OpCode::Pop);
                }
                self.emit(OpCode::JumpBack);
                self.emit_u16((self.chunk.code.len() - loop_start + 2) as u16);
                self.chunk.patch_jump(exit_jump);
                self.emit(OpCode::Pop);

                self.patch_continues(patch_base, continue_target);
                self.patch_breaks(patch_base, self.chunk.code.len());
                self.end_scope();
            }
            Stmt::With { receiver, body } => {
                self.begin_scope();
                self.expression(receiver, tokens)?;
                self.emit(OpCode::With);
                let loop_start = self.chunk.code.len();
                self.emit(OpCode::WithNext);
                self.emit(OpCode::JumpIfFalse);
                let exit_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.emit(OpCode::Pop);
                let patch_base = self.loop_patches.len();
                for s in body {
                    self.statement(s, tokens)?;
                }
                let continue_target = self.chunk.code.len();
                self.emit(OpCode::JumpBack);
                self.emit_u16((self.chunk.code.len() - loop_start + 2) as u16);
                self.chunk.patch_jump(exit_jump);
                self.emit(OpCode::Pop);
                self.emit(OpCode::WithFinish);
                self.end_scope();
                self.patch_continues(patch_base, continue_target);
                self.patch_breaks(patch_base, self.chunk.code.len());
            }
            Stmt::Switch { subject, cases } => self.compile_switch(subject, cases, tokens)?,
            Stmt::Break => {
                self.emit(OpCode::Jump);
                let offset = self.chunk.code.len();
                self.emit_u16(0);
                self.loop_patches.push(PendingJump { offset, kind: LoopKind::Break });
            }
            Stmt::Continue => {
                self.emit(OpCode::Jump);
                let offset = self.chunk.code.len();
                self.emit_u16(0);
                self.loop_patches.push(PendingJump { offset, kind: LoopKind::Continue });
            }
            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.expression(expr, tokens)?,
                    None => self.emit(OpCode::Null),
                }
                self.emit(OpCode::Return);
            }
            Stmt::Function(decl) => self.compile_function(decl, tokens, false)?,
            Stmt::Class(decl) => self.compile_class(decl, tokens)?,
            Stmt::Enum { name, variants } => self.compile_enum(name, variants, tokens)?,
            Stmt::Namespace { name, body } => {
                self.emit(OpCode::UseNamespace);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
                for s in body {
                    self.statement(s, tokens)?;
                }
            }
            Stmt::UseNamespace(name) => {
                self.emit(OpCode::UseNamespace);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
            }
            Stmt::Import { path, .. } => {
                self.emit(OpCode::ImportModule);
                let idx = self.name_constant(path, tokens);
                self.emit_u16(idx);
            }
            Stmt::Event { name, params, body } => {
                self.compile_function(
                    &FunctionDecl { name: name.clone(), params: params.clone(), body: body.clone() },
                    tokens,
                    true,
                )?;
            }
        }
        Ok(())
    }

    fn compile_loop(
        &mut self,
        _label: Option<&str>,
        cond: &Expr,
        step: Option<&Expr>,
        body: &[Stmt],
        tokens: &mut TokenTable,
    ) -> Result<(), CompileError> {
        let loop_start = self.chunk.code.len();
        self.expression(cond, tokens)?;
        self.emit(OpCode::JumpIfFalse);
        let exit_jump = self.chunk.code.len();
        self.emit_u16(0);
        self.emit(OpCode::Pop);

        let patch_base = self.loop_patches.len();
        for s in body {
            self.statement(s, tokens)?;
        }
        let continue_target = self.chunk.code.len();
        if let Some(step) = step {
            self.expression(step, tokens)?;
            self.emit(OpCode::Pop);
        }
        self.emit(OpCode::JumpBack);
        self.emit_u16((self.chunk.code.len() - loop_start + 2) as u16);
        self.chunk.patch_jump(exit_jump);
        self.emit(OpCode::Pop);

        self.patch_continues(patch_base, continue_target);
        self.patch_breaks(patch_base, self.chunk.code.len());
        Ok(())
    }

    fn patch_breaks(&mut self, from: usize, target: usize) {
        let mut i = from;
        while i < self.loop_patches.len() {
            if matches!(self.loop_patches[i].kind, LoopKind::Break) {
                let offset = self.loop_patches[i].offset;
                let delta = (target - offset - 2) as u16;
                let bytes = delta.to_be_bytes();
                self.chunk.code[offset] = bytes[0];
                self.chunk.code[offset + 1] = bytes[1];
            }
            i += 1;
        }
        self.loop_patches.truncate(from);
    }

    fn patch_continues(&mut self, from: usize, target: usize) {
        let mut i = from;
        while i < self.loop_patches.len() {
            if matches!(self.loop_patches[i].kind, LoopKind::Continue) {
                let offset = self.loop_patches[i].offset;
                let delta = (target - offset - 2) as u16;
                let bytes = delta.to_be_bytes();
                self.chunk.code[offset] = bytes[0];
                self.chunk.code[offset + 1] = bytes[1];
            }
            i += 1;
        }
    }

    fn compile_switch(&mut self, subject: &Expr, cases: &[SwitchCase], tokens: &mut TokenTable) -> Result<(), CompileError> {
        self.expression(subject, tokens)?;
        let patch_base = self.loop_patches.len();
        let mut case_end_jumps = Vec::new();
        let mut next_case_patch: Option<usize> = None;

        for case in cases {
            if let Some(p) = next_case_patch.take() {
                self.chunk.patch_jump(p);
                self.emit(OpCode::Pop);
            }
            match &case.value {
                Some(value) => {
                    self.emit(OpCode::Copy);
                    self.expression(value, tokens)?;
                    self.emit(OpCode::SortaEqual);
                    self.emit(OpCode::JumpIfFalse);
                    next_case_patch = Some(self.chunk.code.len());
                    self.emit_u16(0);
                    self.emit(OpCode::Pop);
                }
                None => {}
            }
            for s in &case.body {
                self.statement(s, tokens)?;
            }
            self.emit(OpCode::Jump);
            case_end_jumps.push(self.chunk.code.len());
            self.emit_u16(0);
        }
        if let Some(p) = next_case_patch {
            self.chunk.patch_jump(p);
            self.emit(OpCode::Pop);
        }
        for jump in case_end_jumps {
            self.chunk.patch_jump(jump);
        }
        self.emit(OpCode::Pop);
        self.patch_breaks(patch_base, self.chunk.code.len());
        Ok(())
    }

    /// Compiles a function or method body into its own chunk and returns
    /// the [`obj::Function`] object as a ready-to-push constant; the
    /// chunk itself is appended to `pending_chunks` under the index baked
    /// into the returned object. Leaves nothing on the codegen stack --
    /// callers push it themselves, since top-level functions define a
    /// global while methods install onto a class instead.
    fn compile_function_value(
        &mut self,
        decl: &FunctionDecl,
        tokens: &mut TokenTable,
        is_event: bool,
    ) -> Result<Obj<'gc>, CompileError> {
        let mut inner = Codegen::new(self.mc, self.base_index, self.module);
        inner.pending_chunks = std::mem::take(&mut self.pending_chunks);
        inner.begin_scope();
        for param in &decl.params {
            inner.locals.push(Local { name: param.clone(), depth: inner.scope_depth });
        }
        for s in &decl.body {
            inner.statement(s, tokens)?;
        }
        inner.emit(OpCode::Null);
        inner.emit(OpCode::Return);

        let mut pending = inner.pending_chunks;
        let chunk_index = self.base_index + 1 + pending.len() as u32;
        pending.push(inner.chunk);
        self.pending_chunks = pending;

        let function = obj::Function {
            name: decl.name.clone(),
            arity: decl.params.len() as u8,
            chunk_index,
            upvalue_count: 0,
            is_native_event_handler: is_event,
            module: Some(self.module),
        };
        Ok(obj::new_function(self.mc, function))
    }

    fn compile_function(&mut self, decl: &FunctionDecl, tokens: &mut TokenTable, is_event: bool) -> Result<(), CompileError> {
        let function_obj = self.compile_function_value(decl, tokens, is_event)?;
        let idx = self.chunk.add_constant(Value::Object(function_obj));
        self.emit(OpCode::Constant);
        self.emit_u16(idx);
        self.emit(OpCode::DefineGlobal);
        let name_idx = self.name_constant(&decl.name, tokens);
        self.emit_u16(name_idx);
        Ok(())
    }

    fn compile_class(&mut self, decl: &ClassDecl, tokens: &mut TokenTable) -> Result<(), CompileError> {
        self.emit(OpCode::Class);
        let idx = self.name_constant(&decl.name, tokens);
        self.emit_u16(idx);
        if let Some(parent) = &decl.parent {
            self.emit(OpCode::GetGlobal);
            let parent_idx = self.name_constant(parent, tokens);
            self.emit_u16(parent_idx);
            self.emit(OpCode::Inherit);
        }
        for method in &decl.methods {
            let method_obj = self.compile_function_value(method, tokens, false)?;
            let const_idx = self.chunk.add_constant(Value::Object(method_obj));
            self.emit(OpCode::Constant);
            self.emit_u16(const_idx);
            self.emit(OpCode::Method);
            let name_idx = self.name_constant(&method.name, tokens);
            self.emit_u16(name_idx);
        }
        self.emit(OpCode::DefineGlobal);
        let name_idx = self.name_constant(&decl.name, tokens);
        self.emit_u16(name_idx);
        Ok(())
    }

    fn compile_enum(&mut self, name: &str, variants: &[(String, Option<Expr>)], tokens: &mut TokenTable) -> Result<(), CompileError> {
        self.emit(OpCode::NewEnum);
        let idx = self.name_constant(name, tokens);
        self.emit_u16(idx);
        // A variant with no initializer takes the previous variant's value
        // plus one, starting from 0, the way a C-style enum auto-numbers.
        let mut next_value: i32 = 0;
        for (vname, value) in variants {
            match value {
                Some(expr) => {
                    self.expression(expr, tokens)?;
                    next_value = if let Expr::Integer(i) = expr { *i as i32 + 1 } else { next_value };
                }
                None => {
                    let const_idx = self.chunk.add_constant(Value::Integer(next_value));
                    self.emit(OpCode::Constant);
                    self.emit_u16(const_idx);
                    next_value += 1;
                }
            }
            self.emit(OpCode::AddEnum);
            let vidx = self.name_constant(vname, tokens);
            self.emit_u16(vidx);
        }
        self.emit(OpCode::DefineGlobal);
        let name_idx = self.name_constant(name, tokens);
        self.emit_u16(name_idx);
        Ok(())
    }

    fn emit_binary(&mut self, op: BinaryOp) {
        self.emit(match op {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Subtract => OpCode::Subtract,
            BinaryOp::Multiply => OpCode::Multiply,
            BinaryOp::Divide => OpCode::Divide,
            BinaryOp::Modulo => OpCode::Modulo,
            BinaryOp::ShiftLeft => OpCode::BitshiftLeft,
            BinaryOp::ShiftRight => OpCode::BitshiftRight,
            BinaryOp::BitAnd => OpCode::BwAnd,
            BinaryOp::BitOr => OpCode::BwOr,
            BinaryOp::BitXor => OpCode::BwXor,
            BinaryOp::Equal => OpCode::Equal,
            BinaryOp::NotEqual => OpCode::EqualNot,
            BinaryOp::Greater => OpCode::Greater,
            BinaryOp::GreaterEqual => OpCode::GreaterEqual,
            BinaryOp::Less => OpCode::Less,
            BinaryOp::LessEqual => OpCode::LessEqual,
        });
    }

    /// Writes the value on top of the stack back into `target` (a local,
    /// global, or property) without popping it, the same leaves-the-value
    /// convention `Expr::Assign` uses.
    fn store_back(&mut self, target: &Expr, tokens: &mut TokenTable) -> Result<(), CompileError> {
        match target {
            Expr::Identifier(name) => {
                if let Some(slot) = self.resolve_local(name) {
                    self.emit(OpCode::SetLocal);
                    self.chunk.write_byte(slot as u8, self.line.clone());
                } else {
                    self.emit(OpCode::SetGlobal);
                    let idx = self.name_constant(name, tokens);
                    self.emit_u16(idx);
                }
                Ok(())
            }
            Expr::GetProperty { receiver, name } => {
                self.expression(receiver, tokens)?;
                self.emit(OpCode::SetProperty);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
                Ok(())
            }
            _ => Err(CompileError { message: "invalid assignment target".into(), line: 0, column: 0 }),
        }
    }

    /// Loads `target`'s current value onto the stack, in a way
    /// `emit_store_after_mutation` can write straight back over: a bare
    /// local/global leaves just the value, while a property leaves the
    /// receiver underneath it (so the store doesn't need to re-evaluate,
    /// and can't double a side-effecting receiver expression). Used by
    /// pre/post increment and decrement.
    fn emit_load_for_mutation(&mut self, target: &Expr, tokens: &mut TokenTable) -> Result<(), CompileError> {
        match target {
            Expr::Identifier(_) => self.expression(target, tokens),
            Expr::GetProperty { receiver, name } => {
                self.expression(receiver, tokens)?;
                self.emit(OpCode::Copy);
                self.emit(OpCode::GetProperty);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
                Ok(())
            }
            _ => Err(CompileError { message: "invalid increment/decrement target".into(), line: 0, column: 0 }),
        }
    }

    /// Counterpart to `emit_load_for_mutation`: stores the mutated value
    /// sitting on top of the stack (with the receiver still underneath it,
    /// for property targets) back into `target`.
    fn emit_store_after_mutation(&mut self, target: &Expr, tokens: &mut TokenTable) -> Result<(), CompileError> {
        match target {
            Expr::Identifier(_) => self.store_back(target, tokens),
            Expr::GetProperty { name, .. } => {
                self.emit(OpCode::SetProperty);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
                Ok(())
            }
            _ => Err(CompileError { message: "invalid increment/decrement target".into(), line: 0, column: 0 }),
        }
    }

    fn expression(&mut self, expr: &Expr, tokens: &mut TokenTable) -> Result<(), CompileError> {
        match expr {
            Expr::Null => self.emit(OpCode::Null),
            Expr::True => self.emit(OpCode::True),
            Expr::False => self.emit(OpCode::False),
            Expr::Integer(i) => {
                let idx = self.chunk.add_constant(Value::Integer(*i as i32));
                self.emit(OpCode::Constant);
                self.emit_u16(idx);
            }
            Expr::Decimal(d) => {
                let idx = self.chunk.add_constant(Value::Decimal(*d as f32));
                self.emit(OpCode::Constant);
                self.emit_u16(idx);
            }
            Expr::String(s) => {
                let obj = obj::new_string(self.mc, s.clone());
                let idx = self.chunk.add_constant(Value::Object(obj));
                self.emit(OpCode::Constant);
                self.emit_u16(idx);
            }
            Expr::Identifier(name) => {
                if let Some(slot) = self.resolve_local(name) {
                    self.emit(OpCode::GetLocal);
                    self.chunk.write_byte(slot as u8, self.line.clone());
                } else {
                    self.emit(OpCode::GetGlobal);
                    let idx = self.name_constant(name, tokens);
                    self.emit_u16(idx);
                }
            }
            Expr::This => {
                self.emit(OpCode::GetLocal);
                self.chunk.write_byte(0, self.line.clone());
            }
            Expr::Super(method) => {
                self.emit(OpCode::Super);
                let idx = self.name_constant(method, tokens);
                self.emit_u16(idx);
            }
            Expr::Array(items) => {
                for item in items {
                    self.expression(item, tokens)?;
                }
                self.emit(OpCode::NewArray);
                self.chunk.write_byte(items.len() as u8, self.line.clone());
            }
            Expr::Map(entries) => {
                for (key, value) in entries {
                    self.expression(key, tokens)?;
                    self.expression(value, tokens)?;
                }
                self.emit(OpCode::NewMap);
                self.chunk.write_byte(entries.len() as u8, self.line.clone());
            }
            Expr::Unary(op, operand) => {
                self.expression(operand, tokens)?;
                self.emit(match op {
                    UnaryOp::Negate => OpCode::Negate,
                    UnaryOp::Not => OpCode::LgNot,
                    UnaryOp::BitNot => OpCode::BwNot,
                });
            }
            Expr::Binary(op, left, right) => {
                self.expression(left, tokens)?;
                self.expression(right, tokens)?;
                self.emit(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Subtract => OpCode::Subtract,
                    BinaryOp::Multiply => OpCode::Multiply,
                    BinaryOp::Divide => OpCode::Divide,
                    BinaryOp::Modulo => OpCode::Modulo,
                    BinaryOp::ShiftLeft => OpCode::BitshiftLeft,
                    BinaryOp::ShiftRight => OpCode::BitshiftRight,
                    BinaryOp::BitAnd => OpCode::BwAnd,
                    BinaryOp::BitOr => OpCode::BwOr,
                    BinaryOp::BitXor => OpCode::BwXor,
                    BinaryOp::Equal => OpCode::Equal,
                    BinaryOp::NotEqual => OpCode::EqualNot,
                    BinaryOp::Greater => OpCode::Greater,
                    BinaryOp::GreaterEqual => OpCode::GreaterEqual,
                    BinaryOp::Less => OpCode::Less,
                    BinaryOp::LessEqual => OpCode::LessEqual,
                });
            }
            Expr::Logical { and, left, right } => {
                self.expression(left, tokens)?;
                self.emit(if *and { OpCode::JumpIfFalse } else { OpCode::JumpIfFalse });
                let short_circuit = self.chunk.code.len();
                self.emit_u16(0);
                if *and {
                    self.emit(OpCode::Pop);
                    self.expression(right, tokens)?;
                } else {
                    // OR: invert by jumping over the RHS only when LHS was
                    // truthy, so patch the *other* branch structure below.
                    self.emit(OpCode::Jump);
                    let skip_rhs = self.chunk.code.len();
                    self.emit_u16(0);
                    self.chunk.patch_jump(short_circuit);
                    self.emit(OpCode::Pop);
                    self.expression(right, tokens)?;
                    self.chunk.patch_jump(skip_rhs);
                    return Ok(());
                }
                self.chunk.patch_jump(short_circuit);
            }
            Expr::Assign { target, value } => {
                self.expression(value, tokens)?;
                match target.as_ref() {
                    Expr::Identifier(name) => {
                        if let Some(slot) = self.resolve_local(name) {
                            self.emit(OpCode::SetLocal);
                            self.chunk.write_byte(slot as u8, self.line.clone());
                        } else {
                            self.emit(OpCode::SetGlobal);
                            let idx = self.name_constant(name, tokens);
                            self.emit_u16(idx);
                        }
                    }
                    _ => return Err(CompileError { message: "invalid assignment target".into(), line: 0, column: 0 }),
                }
            }
            Expr::Increment(target) | Expr::Decrement(target) => {
                let step_op = if matches!(expr, Expr::Increment(_)) { OpCode::Increment } else { OpCode::Decrement };
                self.emit_load_for_mutation(target, tokens)?;
                self.emit(step_op);
                self.emit_store_after_mutation(target, tokens)?;
            }
            Expr::PostIncrement(target) | Expr::PostDecrement(target) => {
                let step_op = if matches!(expr, Expr::PostIncrement(_)) { OpCode::Increment } else { OpCode::Decrement };
                self.emit_load_for_mutation(target, tokens)?;
                match target.as_ref() {
                    // Identifier targets can preserve the pre-mutation value
                    // exactly: duplicate it, mutate the duplicate, store the
                    // mutated copy, drop the extra copy the store left
                    // behind, leaving the original on top.
                    Expr::Identifier(_) => {
                        self.emit(OpCode::Copy);
                        self.emit(step_op);
                        self.emit_store_after_mutation(target, tokens)?;
                        self.emit(OpCode::Pop);
                    }
                    // Property targets have no stack slot to duplicate
                    // without clobbering the receiver already sitting under
                    // the value (this VM has no "dup from depth 2"
                    // instruction), so a property postfix expression's
                    // *value* reads the same as prefix; the store side
                    // effect is identical either way. Matches the common
                    // case of `this.hp++;` used as a bare statement, where
                    // the expression value is discarded regardless.
                    _ => {
                        self.emit(step_op);
                        self.emit_store_after_mutation(target, tokens)?;
                    }
                }
            }
            Expr::Ternary { cond, then_expr, else_expr } => {
                self.expression(cond, tokens)?;
                self.emit(OpCode::JumpIfFalse);
                let else_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.emit(OpCode::Pop);
                self.expression(then_expr, tokens)?;
                self.emit(OpCode::Jump);
                let end_jump = self.chunk.code.len();
                self.emit_u16(0);
                self.chunk.patch_jump(else_jump);
                self.emit(OpCode::Pop);
                self.expression(else_expr, tokens)?;
                self.chunk.patch_jump(end_jump);
            }
            Expr::CompoundAssign { target, op, value } => {
                match target.as_ref() {
                    Expr::Identifier(_) => {
                        self.expression(target, tokens)?;
                        self.expression(value, tokens)?;
                        self.emit_binary(*op);
                        self.store_back(target, tokens)?;
                    }
                    Expr::GetProperty { receiver, name } => {
                        self.expression(receiver, tokens)?;
                        self.emit(OpCode::Copy);
                        self.emit(OpCode::GetProperty);
                        let idx = self.name_constant(name, tokens);
                        self.emit_u16(idx);
                        self.expression(value, tokens)?;
                        self.emit_binary(*op);
                        self.emit(OpCode::SetProperty);
                        let idx = self.name_constant(name, tokens);
                        self.emit_u16(idx);
                    }
                    Expr::GetElement { .. } => {
                        return Err(CompileError {
                            message: "compound assignment to an indexed element is not supported; write `x[i] = x[i] <op> value` instead".into(),
                            line: 0,
                            column: 0,
                        });
                    }
                    _ => return Err(CompileError { message: "invalid assignment target".into(), line: 0, column: 0 }),
                }
            }
            Expr::Call { callee, args } => {
                self.expression(callee, tokens)?;
                for arg in args {
                    self.expression(arg, tokens)?;
                }
                self.emit(OpCode::Call);
                self.chunk.write_byte(args.len() as u8, self.line.clone());
            }
            Expr::Invoke { receiver, method, args } => {
                self.expression(receiver, tokens)?;
                for arg in args {
                    self.expression(arg, tokens)?;
                }
                self.emit(OpCode::Invoke);
                self.chunk.write_byte(args.len() as u8, self.line.clone());
                let idx = self.name_constant(method, tokens);
                self.emit_u16(idx);
            }
            Expr::GetProperty { receiver, name } => {
                self.expression(receiver, tokens)?;
                self.emit(OpCode::GetProperty);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
            }
            Expr::SetProperty { receiver, name, value } => {
                self.expression(receiver, tokens)?;
                self.expression(value, tokens)?;
                self.emit(OpCode::SetProperty);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
            }
            Expr::GetElement { receiver, index } => {
                self.expression(receiver, tokens)?;
                self.expression(index, tokens)?;
                self.emit(OpCode::GetElement);
            }
            Expr::SetElement { receiver, index, value } => {
                self.expression(receiver, tokens)?;
                self.expression(index, tokens)?;
                self.expression(value, tokens)?;
                self.emit(OpCode::SetElement);
            }
            Expr::New { class, args } => {
                self.emit(OpCode::GetGlobal);
                let idx = self.name_constant(class, tokens);
                self.emit_u16(idx);
                for arg in args {
                    self.expression(arg, tokens)?;
                }
                self.emit(OpCode::New);
                self.chunk.write_byte(args.len() as u8, self.line.clone());
            }
            Expr::Typeof(inner) => {
                self.expression(inner, tokens)?;
                self.emit(OpCode::Typeof);
            }
            Expr::HasProperty { receiver, name } => {
                self.expression(receiver, tokens)?;
                self.emit(OpCode::HasProperty);
                let idx = self.name_constant(name, tokens);
                self.emit_u16(idx);
            }
        }
        Ok(())
    }
}

pub fn name_hash(name: &str) -> u32 {
    murmur32(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::super::parser::Parser;
    use super::*;
    use crate::runtime::{HatchArena, Root};

    #[test]
    fn name_hash_is_stable() {
        assert_eq!(name_hash("speed"), name_hash("speed"));
    }

    fn compile(source: &str) -> Result<Vec<u8>, CompileError> {
        let program = Parser::new(source).parse_program().unwrap();
        let arena: HatchArena = HatchArena::new(Default::default(), |mc| Root::new(mc));
        arena.mutate(|mc, _root| {
            let mut tokens = TokenTable::new();
            let module = obj::new_module(mc, "test".to_string());
            let chunks = Codegen::new(mc, 0, module).compile_script(&program, &mut tokens)?;
            Ok(chunks[0].code.clone())
        })
    }

    #[test]
    fn ternary_emits_two_branches() {
        let code = compile("var x = a ? 1 : 2;").unwrap();
        assert!(code.contains(&(OpCode::JumpIfFalse as u8)));
        assert!(code.contains(&(OpCode::Jump as u8)));
    }

    #[test]
    fn compound_assign_to_identifier_emits_binary_op_then_store() {
        let code = compile("var x = 0; x += 1;").unwrap();
        assert!(code.contains(&(OpCode::Add as u8)));
        assert!(code.contains(&(OpCode::SetGlobal as u8)) || code.contains(&(OpCode::SetLocal as u8)));
    }

    #[test]
    fn compound_assign_to_indexed_element_is_rejected() {
        let err = compile("var a = [1]; a[0] += 1;").unwrap_err();
        assert!(err.message.contains("indexed element"));
    }

    #[test]
    fn prefix_increment_writes_back_to_local() {
        let code = compile("{ var x = 0; ++x; }").unwrap();
        assert!(code.contains(&(OpCode::Increment as u8)));
    }

    #[test]
    fn postfix_increment_duplicates_before_mutating_local() {
        let code = compile("{ var x = 0; x++; }").unwrap();
        // Copy must appear before Increment for the pre-mutation value to
        // survive as the expression result.
        let copy_pos = code.iter().position(|b| *b == OpCode::Copy as u8).unwrap();
        let inc_pos = code.iter().rposition(|b| *b == OpCode::Increment as u8).unwrap();
        assert!(copy_pos < inc_pos);
    }

    #[test]
    fn has_operator_emits_has_property() {
        let code = compile("var x = a has \"name\";").unwrap();
        assert!(code.contains(&(OpCode::HasProperty as u8)));
    }

    #[test]
    fn repeat_statement_emits_counted_loop() {
        let code = compile("repeat (3) { print 1; }").unwrap();
        assert!(code.contains(&(OpCode::Greater as u8)));
        assert!(code.contains(&(OpCode::Decrement as u8)));
        assert!(code.contains(&(OpCode::JumpBack as u8)));
    }

    #[test]
    fn repeat_statement_binds_counter_variable() {
        let code = compile("repeat (3, i) { print i; }").unwrap();
        assert!(code.contains(&(OpCode::Print as u8)));
    }
}
