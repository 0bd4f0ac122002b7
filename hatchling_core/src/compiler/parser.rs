//! Recursive-descent parser with precedence climbing for expressions.

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::error::CompileError;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token<'src>,
    previous: Token<'src>,
}

type ParseResult<T> = Result<T, CompileError>;

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Parser { lexer, current: current.clone(), previous: current }
    }

    fn advance(&mut self) {
        self.previous = self.current.clone();
        self.current = self.lexer.next_token();
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> CompileError {
        CompileError {
            message: format!("{message}, found '{}'", self.current.lexeme),
            line: self.current.line,
            column: self.current.column,
        }
    }

    pub fn parse_program(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.declaration()?);
        }
        Ok(statements)
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenKind::LeftBrace, "expected '{'")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.declaration()?);
        }
        self.expect(TokenKind::RightBrace, "expected '}'")?;
        Ok(statements)
    }

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.matches(TokenKind::Var) {
            self.var_decl()
        } else if self.matches(TokenKind::Local) {
            self.module_local_decl()
        } else if self.matches(TokenKind::Class) {
            self.class_decl()
        } else if self.matches(TokenKind::Enum) {
            self.enum_decl()
        } else if self.matches(TokenKind::Namespace) {
            self.namespace_decl()
        } else if self.matches(TokenKind::Event) {
            self.event_decl()
        } else if self.matches(TokenKind::Import) {
            self.import_decl()
        } else if self.matches(TokenKind::Using) {
            self.use_namespace_decl()
        } else {
            self.statement()
        }
    }

    fn var_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Identifier, "expected variable name")?;
        let name = self.previous.lexeme.to_string();
        let init = if self.matches(TokenKind::Equal) { Some(self.expression()?) } else { None };
        self.expect(TokenKind::Semicolon, "expected ';' after variable declaration")?;
        Ok(Stmt::VarDecl { name, init })
    }

    fn module_local_decl(&mut self) -> ParseResult<Stmt> {
        let constant = if self.matches(TokenKind::Const) {
            true
        } else {
            self.expect(TokenKind::Var, "expected 'var' or 'const' after 'local'")?;
            false
        };
        self.expect(TokenKind::Identifier, "expected local name")?;
        let name = self.previous.lexeme.to_string();
        let init = if self.matches(TokenKind::Equal) {
            Some(self.expression()?)
        } else if constant {
            return Err(self.error("'local const' requires an initialiser"));
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "expected ';' after local declaration")?;
        Ok(Stmt::ModuleLocalDecl { name, init, constant })
    }

    fn class_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Identifier, "expected class name")?;
        let name = self.previous.lexeme.to_string();
        let parent = if self.matches(TokenKind::Colon) {
            self.expect(TokenKind::Identifier, "expected parent class name")?;
            Some(self.previous.lexeme.to_string())
        } else {
            None
        };
        self.expect(TokenKind::LeftBrace, "expected '{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            methods.push(self.function_like()?);
        }
        self.expect(TokenKind::RightBrace, "expected '}' after class body")?;
        Ok(Stmt::Class(ClassDecl { name, parent, methods }))
    }

    fn function_like(&mut self) -> ParseResult<FunctionDecl> {
        self.expect(TokenKind::Identifier, "expected method name")?;
        let name = self.previous.lexeme.to_string();
        self.expect(TokenKind::LeftParen, "expected '(' after method name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expect(TokenKind::Identifier, "expected parameter name")?;
                params.push(self.previous.lexeme.to_string());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after parameters")?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body })
    }

    fn enum_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Identifier, "expected enum name")?;
        let name = self.previous.lexeme.to_string();
        self.expect(TokenKind::LeftBrace, "expected '{' before enum body")?;
        let mut variants = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.expect(TokenKind::Identifier, "expected enum variant name")?;
            let vname = self.previous.lexeme.to_string();
            let value = if self.matches(TokenKind::Equal) { Some(self.expression()?) } else { None };
            variants.push((vname, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace, "expected '}' after enum body")?;
        Ok(Stmt::Enum { name, variants })
    }

    fn namespace_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Identifier, "expected namespace name")?;
        let name = self.previous.lexeme.to_string();
        let body = self.block()?;
        Ok(Stmt::Namespace { name, body })
    }

    fn event_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Identifier, "expected event name")?;
        let name = self.previous.lexeme.to_string();
        self.expect(TokenKind::LeftParen, "expected '(' after event name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expect(TokenKind::Identifier, "expected parameter name")?;
                params.push(self.previous.lexeme.to_string());
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after parameters")?;
        let body = self.block()?;
        Ok(Stmt::Event { name, params, body })
    }

    fn import_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::String, "expected module path string")?;
        let path = self.previous.lexeme.trim_matches('"').to_string();
        let alias = if self.matches(TokenKind::Identifier) {
            Some(self.previous.lexeme.to_string())
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "expected ';' after import")?;
        Ok(Stmt::Import { path, alias })
    }

    fn use_namespace_decl(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::Identifier, "expected namespace name")?;
        let name = self.previous.lexeme.to_string();
        self.expect(TokenKind::Semicolon, "expected ';' after using")?;
        Ok(Stmt::UseNamespace(name))
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.matches(TokenKind::Print) {
            return self.print_stmt();
        }
        if self.matches(TokenKind::LeftBrace) {
            let mut statements = Vec::new();
            while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                statements.push(self.declaration()?);
            }
            self.expect(TokenKind::RightBrace, "expected '}'")?;
            return Ok(Stmt::Block(statements));
        }
        if self.matches(TokenKind::If) {
            return self.if_stmt();
        }
        if self.matches(TokenKind::While) {
            return self.while_stmt();
        }
        if self.matches(TokenKind::Do) {
            return self.do_while_stmt();
        }
        if self.matches(TokenKind::For) {
            return self.for_stmt();
        }
        if self.matches(TokenKind::Foreach) {
            return self.foreach_stmt();
        }
        if self.matches(TokenKind::Repeat) {
            return self.repeat_stmt();
        }
        if self.matches(TokenKind::With) {
            return self.with_stmt();
        }
        if self.matches(TokenKind::Switch) {
            return self.switch_stmt();
        }
        if self.matches(TokenKind::Break) {
            self.expect(TokenKind::Semicolon, "expected ';' after break")?;
            return Ok(Stmt::Break);
        }
        if self.matches(TokenKind::Continue) {
            self.expect(TokenKind::Semicolon, "expected ';' after continue")?;
            return Ok(Stmt::Continue);
        }
        if self.matches(TokenKind::Return) {
            let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
            self.expect(TokenKind::Semicolon, "expected ';' after return")?;
            return Ok(Stmt::Return(value));
        }
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    fn print_stmt(&mut self) -> ParseResult<Stmt> {
        if self.matches(TokenKind::Semicolon) {
            return Ok(Stmt::PrintStack);
        }
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "expected ';' after print")?;
        Ok(Stmt::Print(expr))
    }

    fn if_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after if")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after condition")?;
        let then_branch = vec![self.statement()?];
        let else_branch = if self.matches(TokenKind::Else) { Some(vec![self.statement()?]) } else { None };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn while_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after while")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after condition")?;
        let body = vec![self.statement()?];
        Ok(Stmt::While { cond, body })
    }

    fn do_while_stmt(&mut self) -> ParseResult<Stmt> {
        let body = vec![self.statement()?];
        self.expect(TokenKind::While, "expected 'while' after do body")?;
        self.expect(TokenKind::LeftParen, "expected '(' after while")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after condition")?;
        self.expect(TokenKind::Semicolon, "expected ';' after do-while")?;
        Ok(Stmt::DoWhile { body, cond })
    }

    fn for_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after for")?;
        let init = if self.matches(TokenKind::Semicolon) {
            None
        } else if self.matches(TokenKind::Var) {
            Some(Box::new(self.var_decl()?))
        } else {
            let expr = self.expression()?;
            self.expect(TokenKind::Semicolon, "expected ';' after for initializer")?;
            Some(Box::new(Stmt::Expr(expr)))
        };
        let cond = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.expect(TokenKind::Semicolon, "expected ';' after loop condition")?;
        let step = if self.check(TokenKind::RightParen) { None } else { Some(self.expression()?) };
        self.expect(TokenKind::RightParen, "expected ')' after for clauses")?;
        let body = vec![self.statement()?];
        Ok(Stmt::For { init, cond, step, body })
    }

    fn foreach_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after foreach")?;
        self.expect(TokenKind::Identifier, "expected loop variable name")?;
        let var = self.previous.lexeme.to_string();
        self.expect(TokenKind::In, "expected 'in' in foreach")?;
        let iterable = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after foreach clause")?;
        let body = vec![self.statement()?];
        Ok(Stmt::Foreach { var, iterable, body })
    }

    /// `repeat(n [, name [, remaining]])`: a decrement loop. `name`, if
    /// given, is bound each iteration to the current (const) iteration
    /// count; a second optional `remaining` binding is accepted for source
    /// compatibility but not distinguished from `name` here.
    fn repeat_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after repeat")?;
        let count = self.expression()?;
        let var = if self.matches(TokenKind::Comma) {
            self.expect(TokenKind::Identifier, "expected iteration variable name")?;
            let name = self.previous.lexeme.to_string();
            if self.matches(TokenKind::Comma) {
                self.expect(TokenKind::Identifier, "expected 'remaining' variable name")?;
            }
            Some(name)
        } else {
            None
        };
        self.expect(TokenKind::RightParen, "expected ')' after repeat clause")?;
        let body = vec![self.statement()?];
        Ok(Stmt::Repeat { count, var, body })
    }

    fn with_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after with")?;
        let receiver = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after with target")?;
        let body = self.block()?;
        Ok(Stmt::With { receiver, body })
    }

    fn switch_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LeftParen, "expected '(' after switch")?;
        let subject = self.expression()?;
        self.expect(TokenKind::RightParen, "expected ')' after switch subject")?;
        self.expect(TokenKind::LeftBrace, "expected '{' before switch body")?;
        let mut cases = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let value = if self.matches(TokenKind::Case) {
                let value = self.expression()?;
                self.expect(TokenKind::Colon, "expected ':' after case value")?;
                Some(value)
            } else {
                self.expect(TokenKind::Default, "expected 'case' or 'default'")?;
                self.expect(TokenKind::Colon, "expected ':' after default")?;
                None
            };
            let mut body = Vec::new();
            while !self.check(TokenKind::Case) && !self.check(TokenKind::Default) && !self.check(TokenKind::RightBrace) {
                body.push(self.declaration()?);
            }
            cases.push(SwitchCase { value, body });
        }
        self.expect(TokenKind::RightBrace, "expected '}' after switch body")?;
        Ok(Stmt::Switch { subject, cases })
    }

    // --- expressions, lowest to highest precedence ---

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn compound_op(&mut self) -> Option<BinaryOp> {
        let op = if self.matches(TokenKind::PlusEqual) {
            BinaryOp::Add
        } else if self.matches(TokenKind::MinusEqual) {
            BinaryOp::Subtract
        } else if self.matches(TokenKind::StarEqual) {
            BinaryOp::Multiply
        } else if self.matches(TokenKind::SlashEqual) {
            BinaryOp::Divide
        } else if self.matches(TokenKind::PercentEqual) {
            BinaryOp::Modulo
        } else if self.matches(TokenKind::AmpEqual) {
            BinaryOp::BitAnd
        } else if self.matches(TokenKind::PipeEqual) {
            BinaryOp::BitOr
        } else if self.matches(TokenKind::CaretEqual) {
            BinaryOp::BitXor
        } else if self.matches(TokenKind::ShiftLeftEqual) {
            BinaryOp::ShiftLeft
        } else if self.matches(TokenKind::ShiftRightEqual) {
            BinaryOp::ShiftRight
        } else {
            return None;
        };
        Some(op)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.ternary()?;
        if self.matches(TokenKind::Equal) {
            let value = self.assignment()?;
            return match expr {
                Expr::Identifier(_) => Ok(Expr::Assign { target: Box::new(expr), value: Box::new(value) }),
                Expr::GetProperty { receiver, name } => {
                    Ok(Expr::SetProperty { receiver, name, value: Box::new(value) })
                }
                Expr::GetElement { receiver, index } => {
                    Ok(Expr::SetElement { receiver, index, value: Box::new(value) })
                }
                _ => Err(self.error("invalid assignment target")),
            };
        }
        if let Some(op) = self.compound_op() {
            let value = self.assignment()?;
            return match &expr {
                Expr::Identifier(_) | Expr::GetProperty { .. } | Expr::GetElement { .. } => {
                    Ok(Expr::CompoundAssign { target: Box::new(expr), op, value: Box::new(value) })
                }
                _ => Err(self.error("invalid assignment target")),
            };
        }
        Ok(expr)
    }

    /// `cond ? then : else`, right-associative: the `else` arm may itself be
    /// another ternary, matching how chained conditionals read left to right.
    fn ternary(&mut self) -> ParseResult<Expr> {
        let cond = self.or()?;
        if self.matches(TokenKind::Question) {
            let then_expr = self.expression()?;
            self.expect(TokenKind::Colon, "expected ':' in ternary expression")?;
            let else_expr = self.ternary()?;
            return Ok(Expr::Ternary { cond: Box::new(cond), then_expr: Box::new(then_expr), else_expr: Box::new(else_expr) });
        }
        Ok(cond)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;
        while self.matches(TokenKind::PipePipe) {
            let right = self.and()?;
            expr = Expr::Logical { and: false, left: Box::new(expr), right: Box::new(right) };
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.bit_or()?;
        while self.matches(TokenKind::AmpAmp) {
            let right = self.bit_or()?;
            expr = Expr::Logical { and: true, left: Box::new(expr), right: Box::new(right) };
        }
        Ok(expr)
    }

    fn bit_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.bit_xor()?;
        while self.matches(TokenKind::Pipe) {
            let right = self.bit_xor()?;
            expr = Expr::Binary(BinaryOp::BitOr, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn bit_xor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.bit_and()?;
        while self.matches(TokenKind::Caret) {
            let right = self.bit_and()?;
            expr = Expr::Binary(BinaryOp::BitXor, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn bit_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.matches(TokenKind::Amp) {
            let right = self.equality()?;
            expr = Expr::Binary(BinaryOp::BitAnd, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        loop {
            if self.matches(TokenKind::Has) {
                let right = self.comparison()?;
                let Expr::String(name) = right else {
                    return Err(self.error("'has' requires a string literal property name"));
                };
                expr = Expr::HasProperty { receiver: Box::new(expr), name };
                continue;
            }
            let op = if self.matches(TokenKind::EqualEqual) {
                BinaryOp::Equal
            } else if self.matches(TokenKind::BangEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let right = self.comparison()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.shift()?;
        loop {
            let op = if self.matches(TokenKind::Greater) {
                BinaryOp::Greater
            } else if self.matches(TokenKind::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else if self.matches(TokenKind::Less) {
                BinaryOp::Less
            } else if self.matches(TokenKind::LessEqual) {
                BinaryOp::LessEqual
            } else {
                break;
            };
            let right = self.shift()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn shift(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        loop {
            let op = if self.matches(TokenKind::ShiftLeft) {
                BinaryOp::ShiftLeft
            } else if self.matches(TokenKind::ShiftRight) {
                BinaryOp::ShiftRight
            } else {
                break;
            };
            let right = self.term()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinaryOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            let right = self.factor()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinaryOp::Multiply
            } else if self.matches(TokenKind::Slash) {
                BinaryOp::Divide
            } else if self.matches(TokenKind::Percent) {
                BinaryOp::Modulo
            } else {
                break;
            };
            let right = self.unary()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.matches(TokenKind::Bang) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.matches(TokenKind::Minus) {
            return Ok(Expr::Unary(UnaryOp::Negate, Box::new(self.unary()?)));
        }
        if self.matches(TokenKind::Tilde) {
            return Ok(Expr::Unary(UnaryOp::BitNot, Box::new(self.unary()?)));
        }
        if self.matches(TokenKind::Typeof) {
            return Ok(Expr::Typeof(Box::new(self.unary()?)));
        }
        if self.matches(TokenKind::PlusPlus) {
            return Ok(Expr::Increment(Box::new(self.unary()?)));
        }
        if self.matches(TokenKind::MinusMinus) {
            return Ok(Expr::Decrement(Box::new(self.unary()?)));
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(TokenKind::LeftParen) {
                let args = self.argument_list()?;
                expr = Expr::Call { callee: Box::new(expr), args };
            } else if self.matches(TokenKind::Dot) {
                self.expect(TokenKind::Identifier, "expected property name after '.'")?;
                let name = self.previous.lexeme.to_string();
                if self.matches(TokenKind::LeftParen) {
                    let args = self.argument_list()?;
                    expr = Expr::Invoke { receiver: Box::new(expr), method: name, args };
                } else {
                    expr = Expr::GetProperty { receiver: Box::new(expr), name };
                }
            } else if self.matches(TokenKind::LeftBracket) {
                let index = self.expression()?;
                self.expect(TokenKind::RightBracket, "expected ']' after index")?;
                expr = Expr::GetElement { receiver: Box::new(expr), index: Box::new(index) };
            } else {
                break;
            }
        }
        if self.matches(TokenKind::PlusPlus) {
            return Ok(Expr::PostIncrement(Box::new(expr)));
        }
        if self.matches(TokenKind::MinusMinus) {
            return Ok(Expr::PostDecrement(Box::new(expr)));
        }
        Ok(expr)
    }

    fn argument_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.matches(TokenKind::False) {
            return Ok(Expr::False);
        }
        if self.matches(TokenKind::True) {
            return Ok(Expr::True);
        }
        if self.matches(TokenKind::Null) {
            return Ok(Expr::Null);
        }
        if self.matches(TokenKind::This) {
            return Ok(Expr::This);
        }
        if self.matches(TokenKind::Super) {
            self.expect(TokenKind::Dot, "expected '.' after super")?;
            self.expect(TokenKind::Identifier, "expected method name after super.")?;
            return Ok(Expr::Super(self.previous.lexeme.to_string()));
        }
        if self.matches(TokenKind::New) {
            self.expect(TokenKind::Identifier, "expected class name after new")?;
            let class = self.previous.lexeme.to_string();
            self.expect(TokenKind::LeftParen, "expected '(' after class name")?;
            let args = self.argument_list()?;
            return Ok(Expr::New { class, args });
        }
        if self.matches(TokenKind::Integer) {
            let value: i64 = self.previous.lexeme.parse().map_err(|_| self.error("invalid integer literal"))?;
            return Ok(Expr::Integer(value));
        }
        if self.matches(TokenKind::Decimal) {
            let value: f64 = self.previous.lexeme.parse().map_err(|_| self.error("invalid decimal literal"))?;
            return Ok(Expr::Decimal(value));
        }
        if self.matches(TokenKind::String) {
            let text = self.previous.lexeme.trim_matches('"').to_string();
            return Ok(Expr::String(text));
        }
        if self.matches(TokenKind::Identifier) {
            return Ok(Expr::Identifier(self.previous.lexeme.to_string()));
        }
        if self.matches(TokenKind::LeftBracket) {
            let mut items = Vec::new();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    items.push(self.expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightBracket, "expected ']' after array literal")?;
            return Ok(Expr::Array(items));
        }
        if self.matches(TokenKind::LeftParen) {
            let expr = self.expression()?;
            self.expect(TokenKind::RightParen, "expected ')' after expression")?;
            return Ok(expr);
        }
        Err(self.error("expected expression"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_arithmetic_expression_statement() {
        let program = Parser::new("1 + 2 * 3;").parse_program().unwrap();
        assert_eq!(program.len(), 1);
        match &program[0] {
            Stmt::Expr(Expr::Binary(BinaryOp::Add, _, _)) => {}
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_if_else() {
        let program = Parser::new("if (x) { print x; } else { print 1; }").parse_program().unwrap();
        assert!(matches!(program[0], Stmt::If { .. }));
    }

    #[test]
    fn parses_with_statement() {
        let program = Parser::new("with (obj) { x = 1; }").parse_program().unwrap();
        assert!(matches!(program[0], Stmt::With { .. }));
    }

    #[test]
    fn parses_class_with_parent() {
        let program = Parser::new("class Foo : Bar { init() { } }").parse_program().unwrap();
        match &program[0] {
            Stmt::Class(decl) => {
                assert_eq!(decl.name, "Foo");
                assert_eq!(decl.parent.as_deref(), Some("Bar"));
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn reports_syntax_error_with_location() {
        let err = Parser::new("var ;").parse_program().unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn parses_compound_assignment() {
        let program = Parser::new("x += 1;").parse_program().unwrap();
        match &program[0] {
            Stmt::Expr(Expr::CompoundAssign { op, .. }) => assert_eq!(*op, BinaryOp::Add),
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_ternary_expression() {
        let program = Parser::new("var x = a ? 1 : 2;").parse_program().unwrap();
        match &program[0] {
            Stmt::VarDecl { init: Some(Expr::Ternary { .. }), .. } => {}
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn ternary_is_right_associative() {
        // a ? 1 : b ? 2 : 3  ==  a ? 1 : (b ? 2 : 3)
        let program = Parser::new("var x = a ? 1 : b ? 2 : 3;").parse_program().unwrap();
        match &program[0] {
            Stmt::VarDecl { init: Some(Expr::Ternary { else_expr, .. }), .. } => {
                assert!(matches!(**else_expr, Expr::Ternary { .. }));
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_postfix_increment_and_decrement() {
        let program = Parser::new("x++; x--;").parse_program().unwrap();
        assert!(matches!(program[0], Stmt::Expr(Expr::PostIncrement(_))));
        assert!(matches!(program[1], Stmt::Expr(Expr::PostDecrement(_))));
    }

    #[test]
    fn parses_has_operator() {
        let program = Parser::new("var x = obj has \"name\";").parse_program().unwrap();
        match &program[0] {
            Stmt::VarDecl { init: Some(Expr::HasProperty { name, .. }), .. } => assert_eq!(name, "name"),
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn has_requires_string_literal_rhs() {
        let err = Parser::new("var x = obj has name;").parse_program().unwrap_err();
        assert!(err.message.contains("has"));
    }

    #[test]
    fn parses_repeat_statement() {
        let program = Parser::new("repeat (3) { print 1; }").parse_program().unwrap();
        match &program[0] {
            Stmt::Repeat { var, body, .. } => {
                assert!(var.is_none());
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected ast: {other:?}"),
        }
    }

    #[test]
    fn parses_repeat_statement_with_counter_variable() {
        let program = Parser::new("repeat (3, i) { print i; }").parse_program().unwrap();
        match &program[0] {
            Stmt::Repeat { var, .. } => assert_eq!(var.as_deref(), Some("i")),
            other => panic!("unexpected ast: {other:?}"),
        }
    }
}
