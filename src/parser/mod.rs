//! Parser for primer
//!
//! A recursive descent parser that produces an AST from a token stream.
//! Binary operators are parsed by precedence climbing.

pub mod template;

use crate::ast::*;
use crate::common::Span;
use crate::diagnostics::{EvalError, Result};
use crate::lexer::{Token, TokenKind};

/// Parse a token stream into a program
pub fn parse(tokens: &[Token], _source: &str) -> Result<Program> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Parse a single expression that starts `base` bytes into an enclosing source
pub fn parse_expression(source: &str, base: usize) -> Result<Expr> {
    let tokens = crate::lexer::lex_at(source, base)?;
    let mut parser = Parser::new(&tokens);
    // Line breaks never end an embedded expression
    parser.depth = 1;
    let expr = parser.parse_expr()?;
    if !parser.at(TokenKind::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

/// Parser state
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Bracket nesting; line breaks are only significant at depth 0
    depth: usize,
    /// Inside a method body, where `self.field` names the field binding
    in_method: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            in_method: false,
        }
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_n(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    /// True when the current token starts a new line outside any brackets
    fn at_line_break(&self) -> bool {
        self.depth == 0 && self.current().newline_before
    }

    fn advance(&mut self) -> &Token {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{}`", kind)))
        }
    }

    fn unexpected(&self, expected: &str) -> EvalError {
        let tok = self.current();
        if tok.kind == TokenKind::Eof {
            EvalError::UnexpectedEof {
                expected: expected.to_string(),
                span: Some(tok.span.into()),
            }
        } else {
            EvalError::UnexpectedToken {
                expected: expected.to_string(),
                found: format!("`{}`", tok.text),
                span: Some(tok.span.into()),
            }
        }
    }

    fn span(&self) -> Span {
        self.current().span
    }

    /// Span of the most recently consumed token
    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn since(&self, start: Span) -> Span {
        start.merge(self.prev_span())
    }

    // ==================== PROGRAM ====================

    fn parse_program(&mut self) -> Result<Program> {
        let mut stmts = Vec::new();

        loop {
            while self.at(TokenKind::Semi) {
                self.advance();
            }
            if self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
            self.end_stmt()?;
        }

        tracing::debug!("parsed {} statements", stmts.len());
        Ok(Program { stmts })
    }

    fn end_stmt(&mut self) -> Result<()> {
        if self.at(TokenKind::Semi) || self.at(TokenKind::Eof) || self.at_line_break() {
            Ok(())
        } else {
            Err(self.unexpected("`;` or a line break"))
        }
    }

    // ==================== STATEMENTS ====================

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            TokenKind::Let | TokenKind::Var => self.parse_let(),
            TokenKind::Struct | TokenKind::Class => self.parse_record(),
            TokenKind::Ident
                if self.current().text == "print" && self.peek_n(1) == TokenKind::LParen =>
            {
                self.parse_print()
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_let(&mut self) -> Result<Stmt> {
        let start = self.span();
        let mutable = self.at(TokenKind::Var);
        self.advance();

        let name_span = self.span();
        let name = self.parse_ident()?;
        let ty = self.parse_type_annotation()?;

        let value = if self.at(TokenKind::Eq) {
            self.advance();
            self.parse_expr()?
        } else if ty.as_ref().is_some_and(|t| t.optional) {
            // `var x: String?` starts out nil
            Expr::new(ExprKind::Literal(Literal::Nil), name_span)
        } else {
            return Err(self.unexpected("`=`"));
        };

        Ok(Stmt::Let {
            name,
            mutable,
            ty,
            value,
            span: self.since(start),
        })
    }

    fn parse_type_annotation(&mut self) -> Result<Option<TypeAnn>> {
        if !self.at(TokenKind::Colon) {
            return Ok(None);
        }
        self.advance();
        self.parse_type().map(Some)
    }

    fn parse_type(&mut self) -> Result<TypeAnn> {
        let (name, list) = if self.at(TokenKind::LBracket) {
            self.advance();
            let name = self.parse_ident()?;
            self.expect(TokenKind::RBracket)?;
            (name, true)
        } else {
            (self.parse_ident()?, false)
        };

        let optional = self.at(TokenKind::Question) && !self.current().newline_before;
        if optional {
            self.advance();
        }

        Ok(TypeAnn {
            name,
            list,
            optional,
        })
    }

    fn parse_record(&mut self) -> Result<Stmt> {
        let start = self.span();
        let kind = if self.at(TokenKind::Class) {
            RecordDeclKind::Class
        } else {
            RecordDeclKind::Struct
        };
        self.advance();

        let name = self.parse_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at(TokenKind::RBrace) {
            match self.peek() {
                TokenKind::Func | TokenKind::Mutating => methods.push(self.parse_method()?),
                _ => fields.push(self.parse_field()?),
            }
            while self.at(TokenKind::Semi) || self.at(TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Stmt::Record(RecordDecl {
            name,
            kind,
            fields,
            methods,
            span: self.since(start),
        }))
    }

    fn parse_method(&mut self) -> Result<MethodDecl> {
        let start = self.span();
        let mutating = self.at(TokenKind::Mutating);
        if mutating {
            self.advance();
        }
        self.expect(TokenKind::Func)?;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        self.depth += 1;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let param_start = self.span();
            let name = self.parse_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            params.push(Param {
                name,
                ty,
                span: self.since(param_start),
            });
            if !self.at(TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.depth -= 1;
        self.expect(TokenKind::RParen)?;

        let ret = if self.at(TokenKind::Arrow) {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_body()?;

        Ok(MethodDecl {
            name,
            mutating,
            params,
            ret,
            body,
            span: self.since(start),
        })
    }

    /// `{ stmt; stmt }`: a statement list where line breaks separate
    /// statements again
    fn parse_body(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let depth = std::mem::replace(&mut self.depth, 0);
        let in_method = std::mem::replace(&mut self.in_method, true);

        let mut stmts = Vec::new();
        loop {
            while self.at(TokenKind::Semi) {
                self.advance();
            }
            if self.at(TokenKind::RBrace) || self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
            if !self.at(TokenKind::RBrace) {
                self.end_stmt()?;
            }
        }

        self.depth = depth;
        self.in_method = in_method;
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_field(&mut self) -> Result<FieldDecl> {
        let start = self.span();
        let mutable = match self.peek() {
            TokenKind::Let => false,
            TokenKind::Var => true,
            _ => return Err(self.unexpected("`let` or `var` field")),
        };
        self.advance();

        let name = self.parse_ident()?;
        let ty = self.parse_type_annotation()?;
        let default = if self.at(TokenKind::Eq) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(FieldDecl {
            name,
            mutable,
            ty,
            default,
            span: self.since(start),
        })
    }

    fn parse_print(&mut self) -> Result<Stmt> {
        let start = self.span();
        self.advance();
        let args = self
            .parse_args()?
            .into_iter()
            .map(|arg| arg.value)
            .collect();
        Ok(Stmt::Print {
            args,
            span: self.since(start),
        })
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt> {
        let expr = self.parse_expr()?;

        if self.at(TokenKind::Eq) {
            let target = self.place_from(&expr)?;
            self.advance();
            let value = self.parse_expr()?;
            let span = expr.span.merge(value.span);
            return Ok(Stmt::Assign {
                target,
                value,
                span,
            });
        }

        if let ExprKind::MethodCall {
            receiver,
            method,
            args,
        } = &expr.kind
        {
            if let Ok(target) = self.place_from(receiver) {
                match (method.as_str(), args.as_slice()) {
                    ("append", [arg]) => {
                        return Ok(Stmt::Mutate {
                            target,
                            op: MutateOp::Append(arg.value.clone()),
                            span: expr.span,
                        });
                    }
                    ("shuffle", []) => {
                        return Ok(Stmt::Mutate {
                            target,
                            op: MutateOp::Shuffle,
                            span: expr.span,
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok(Stmt::Expr(expr))
    }

    /// Interpret an already-parsed expression as an assignment target
    fn place_from(&self, expr: &Expr) -> Result<Place> {
        match &expr.kind {
            ExprKind::Ident(name) => Ok(Place {
                base: name.clone(),
                field: None,
                span: expr.span,
            }),
            ExprKind::Field { base, field } => match &base.kind {
                ExprKind::Ident(name) => Ok(Place {
                    base: name.clone(),
                    field: Some(field.clone()),
                    span: expr.span,
                }),
                _ => Err(self.unexpected("a binding or `binding.field`")),
            },
            _ => Err(self.unexpected("a binding or `binding.field`")),
        }
    }

    // ==================== EXPRESSIONS ====================

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_with_precedence(0)
    }

    fn parse_expr_with_precedence(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        while let Some((op, prec, assoc)) = self.binary_op_info() {
            if prec < min_prec || self.at_line_break() {
                break;
            }

            self.advance();
            let next_min = if assoc == Assoc::Left { prec + 1 } else { prec };
            let right = self.parse_expr_with_precedence(next_min)?;
            let span = left.span.merge(right.span);

            let kind = match op {
                InfixOp::Binary(op) => ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                InfixOp::Coalesce => ExprKind::Coalesce {
                    value: Box::new(left),
                    default: Box::new(right),
                },
                InfixOp::Range { inclusive } => ExprKind::Range {
                    low: Box::new(left),
                    high: Box::new(right),
                    inclusive,
                },
            };
            left = Expr::new(kind, span);
        }

        Ok(left)
    }

    fn binary_op_info(&self) -> Option<(InfixOp, u8, Assoc)> {
        let (op, prec, assoc) = match self.peek() {
            TokenKind::PipePipe => (InfixOp::Binary(BinaryOp::Or), 1, Assoc::Left),
            TokenKind::AmpAmp => (InfixOp::Binary(BinaryOp::And), 2, Assoc::Left),
            TokenKind::EqEq => (InfixOp::Binary(BinaryOp::Eq), 3, Assoc::Left),
            TokenKind::Ne => (InfixOp::Binary(BinaryOp::Ne), 3, Assoc::Left),
            TokenKind::Lt => (InfixOp::Binary(BinaryOp::Lt), 3, Assoc::Left),
            TokenKind::Le => (InfixOp::Binary(BinaryOp::Le), 3, Assoc::Left),
            TokenKind::Gt => (InfixOp::Binary(BinaryOp::Gt), 3, Assoc::Left),
            TokenKind::Ge => (InfixOp::Binary(BinaryOp::Ge), 3, Assoc::Left),
            TokenKind::QuestionQuestion => (InfixOp::Coalesce, 4, Assoc::Right),
            TokenKind::DotDotDot => (InfixOp::Range { inclusive: true }, 5, Assoc::Left),
            TokenKind::DotDotLt => (InfixOp::Range { inclusive: false }, 5, Assoc::Left),
            TokenKind::Plus => (InfixOp::Binary(BinaryOp::Add), 6, Assoc::Left),
            TokenKind::Minus => (InfixOp::Binary(BinaryOp::Sub), 6, Assoc::Left),
            TokenKind::Star => (InfixOp::Binary(BinaryOp::Mul), 7, Assoc::Left),
            TokenKind::Slash => (InfixOp::Binary(BinaryOp::Div), 7, Assoc::Left),
            TokenKind::Percent => (InfixOp::Binary(BinaryOp::Rem), 7, Assoc::Left),
            _ => return None,
        };
        Some((op, prec, assoc))
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let start = self.span();
        self.advance();
        let expr = self.parse_unary()?;
        let span = start.merge(expr.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                TokenKind::Bang if !self.current().newline_before => {
                    self.advance();
                    let span = self.since(expr.span);
                    expr = Expr::new(ExprKind::ForceUnwrap(Box::new(expr)), span);
                }
                TokenKind::Dot => {
                    let start = expr.span;
                    self.advance();
                    let name = self.parse_ident()?;
                    let on_self =
                        self.in_method && matches!(&expr.kind, ExprKind::Ident(n) if n == "self");
                    let kind = if self.at(TokenKind::LParen) && !self.current().newline_before {
                        let args = self.parse_args()?;
                        ExprKind::MethodCall {
                            receiver: Box::new(expr),
                            method: name,
                            args,
                        }
                    } else if on_self {
                        ExprKind::Ident(name)
                    } else {
                        ExprKind::Field {
                            base: Box::new(expr),
                            field: name,
                        }
                    };
                    expr = Expr::new(kind, self.since(start));
                }
                TokenKind::QuestionDot => return self.parse_chain(expr),
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Parse everything after the first `?.` into one chain, so a nil base
    /// short-circuits the whole remainder
    fn parse_chain(&mut self, base: Expr) -> Result<Expr> {
        let mut accesses = Vec::new();

        loop {
            match self.peek() {
                TokenKind::QuestionDot => {
                    let span = self.span();
                    self.advance();
                    if !accesses.is_empty() {
                        accesses.push(Access::Propagate { span });
                    }
                    accesses.push(self.parse_member()?);
                }
                TokenKind::Dot => {
                    self.advance();
                    accesses.push(self.parse_member()?);
                }
                TokenKind::Bang if !self.current().newline_before => {
                    let span = self.span();
                    self.advance();
                    accesses.push(Access::Unwrap { span });
                }
                _ => break,
            }
        }

        let span = self.since(base.span);
        Ok(Expr::new(
            ExprKind::OptionalChain {
                base: Box::new(base),
                accesses,
            },
            span,
        ))
    }

    fn parse_member(&mut self) -> Result<Access> {
        let start = self.span();
        let name = self.parse_ident()?;
        if self.at(TokenKind::LParen) && !self.current().newline_before {
            let args = self.parse_args()?;
            Ok(Access::Method {
                name,
                args,
                span: self.since(start),
            })
        } else {
            Ok(Access::Field { name, span: start })
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        self.expect(TokenKind::LParen)?;
        self.depth += 1;

        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            let label = if self.at(TokenKind::Ident) && self.peek_n(1) == TokenKind::Colon {
                let label = self.advance().text.clone();
                self.advance();
                Some(label)
            } else {
                None
            };
            let value = self.parse_expr()?;
            args.push(Arg { label, value });

            if !self.at(TokenKind::RParen) {
                self.expect(TokenKind::Comma)?;
            }
        }

        self.depth -= 1;
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.span();
        match self.peek() {
            // Literals
            TokenKind::IntLit => {
                let text = self.advance().text.replace('_', "");
                let value: i64 = text.parse().map_err(|_| EvalError::Overflow {
                    op: "integer literal".to_string(),
                    span: Some(start.into()),
                })?;
                Ok(Expr::new(ExprKind::Literal(Literal::Int(value)), start))
            }
            TokenKind::FloatLit => {
                let text = self.advance().text.replace('_', "");
                let value: f64 = text.parse().unwrap_or(f64::NAN);
                Ok(Expr::new(ExprKind::Literal(Literal::Float(value)), start))
            }
            TokenKind::StringLit => {
                let text = self.advance().text.clone();
                // Strip the quotes; segment spans start after the opening one
                let raw = &text[1..text.len() - 1];
                let mut segments = template::parse_template(raw, start.start + 1)?;
                let plain = segments.len() <= 1
                    && segments.iter().all(|s| matches!(s, Segment::Text(_)));
                let kind = if plain {
                    let text = match segments.pop() {
                        Some(Segment::Text(text)) => text,
                        _ => String::new(),
                    };
                    ExprKind::Literal(Literal::String(text))
                } else {
                    ExprKind::Template(segments)
                };
                Ok(Expr::new(kind, start))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(true)), start))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(false)), start))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Nil), start))
            }

            // Names and calls
            TokenKind::Ident => {
                let name = self.advance().text.clone();
                if self.at(TokenKind::LParen) && !self.current().newline_before {
                    let args = self.parse_args()?;
                    Ok(Expr::new(
                        ExprKind::Call { callee: name, args },
                        self.since(start),
                    ))
                } else {
                    Ok(Expr::new(ExprKind::Ident(name), start))
                }
            }

            // List literal
            TokenKind::LBracket => {
                self.advance();
                self.depth += 1;
                let mut elements = Vec::new();
                while !self.at(TokenKind::RBracket) {
                    elements.push(self.parse_expr()?);
                    if !self.at(TokenKind::RBracket) {
                        self.expect(TokenKind::Comma)?;
                    }
                }
                self.depth -= 1;
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::new(ExprKind::List(elements), self.since(start)))
            }

            // Grouping
            TokenKind::LParen => {
                self.advance();
                self.depth += 1;
                let inner = self.parse_expr()?;
                self.depth -= 1;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::new(inner.kind, self.since(start)))
            }

            TokenKind::If => self.parse_if(),

            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let start = self.span();
        self.expect(TokenKind::If)?;

        let binding = if self.at(TokenKind::Let) {
            self.advance();
            let name = self.parse_ident()?;
            self.expect(TokenKind::Eq)?;
            Some(name)
        } else {
            None
        };

        let head = self.parse_expr()?;
        let then_branch = Box::new(self.parse_block()?);

        let else_branch = if self.at(TokenKind::Else) {
            self.advance();
            if self.at(TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(self.parse_block()?))
            }
        } else {
            None
        };

        let kind = match binding {
            Some(name) => ExprKind::IfLet {
                name,
                value: Box::new(head),
                then_branch,
                else_branch,
            },
            None => ExprKind::If {
                condition: Box::new(head),
                then_branch,
                else_branch,
            },
        };
        Ok(Expr::new(kind, self.since(start)))
    }

    /// `{ expr }`; an empty block evaluates to nil
    fn parse_block(&mut self) -> Result<Expr> {
        let start = self.span();
        self.expect(TokenKind::LBrace)?;
        self.depth += 1;

        let expr = if self.at(TokenKind::RBrace) {
            Expr::new(ExprKind::Literal(Literal::Nil), start)
        } else {
            self.parse_expr()?
        };

        self.depth -= 1;
        self.expect(TokenKind::RBrace)?;
        Ok(expr)
    }

    // ==================== HELPERS ====================

    fn parse_ident(&mut self) -> Result<String> {
        if self.at(TokenKind::Ident) {
            Ok(self.advance().text.clone())
        } else {
            Err(self.unexpected("identifier"))
        }
    }
}

/// Operators handled by precedence climbing
#[derive(Clone, Copy)]
enum InfixOp {
    Binary(BinaryOp),
    Coalesce,
    Range { inclusive: bool },
}

/// Associativity for binary operators
#[derive(Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}
