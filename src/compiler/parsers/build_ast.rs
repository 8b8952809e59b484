//! Recursive-descent parser for the accepted Go subset.
//!
//! The grammar is deliberately small: package clause, single-path imports,
//! struct/function type declarations, global `var` declarations and function
//! declarations. Statements and expressions cover exactly what the lowering
//! pipeline translates. Anything else is a syntax error here or an
//! "unsupported construct" error later.
//!
//! Composite literals are suppressed while parsing `if`/`for` headers (the
//! usual Go ambiguity between `Point{}` and the block opening brace) and
//! re-enabled inside any parenthesised subexpression.

use crate::compiler::compiler_errors::{CompileError, ErrorLocation, ErrorType};
use crate::compiler::parsers::ast_nodes::*;
use crate::compiler::parsers::tokens::{TextLocation, Token, TokenKind};
use crate::return_syntax_error;
use std::path::Path;

pub fn parse_file(
    path: &Path,
    source: String,
    tokens: Vec<Token>,
) -> Result<SourceFile, CompileError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        composite_ok: true,
    };
    let file = parser.parse_source_file(path, source);
    file.map_err(|e| e.with_file_path(path))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    composite_ok: bool,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn location(&self) -> TextLocation {
        self.tokens[self.pos.min(self.tokens.len() - 1)].location
    }

    fn prev_location(&self) -> TextLocation {
        if self.pos == 0 {
            return self.location();
        }
        self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].location
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        if self.peek() == &kind {
            return Ok(self.advance());
        }
        return_syntax_error!(
            ErrorLocation::from_span(&self.location()),
            "expected '{}', found '{}'",
            kind,
            self.peek()
        )
    }

    fn expect_ident(&mut self) -> Result<Ident, CompileError> {
        if let TokenKind::Ident(name) = self.peek().clone() {
            let token = self.advance();
            return Ok(Ident {
                name,
                object: None,
                location: token.location,
            });
        }
        return_syntax_error!(
            ErrorLocation::from_span(&self.location()),
            "expected an identifier, found '{}'",
            self.peek()
        )
    }

    /// Skip statement separators and discard comments, returning the
    /// discarded comment texts (callers that want doc blocks keep them).
    fn skip_separators(&mut self, docs: &mut Vec<String>) {
        loop {
            match self.peek() {
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Comment(text) => {
                    docs.push(text.clone());
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn parse_source_file(
        &mut self,
        path: &Path,
        source: String,
    ) -> Result<SourceFile, CompileError> {
        let mut docs = Vec::new();
        self.skip_separators(&mut docs);
        self.expect(TokenKind::Package)?;
        let package_clause = self.expect_ident()?.name;

        let mut decls = Vec::new();
        loop {
            let mut pending_docs = Vec::new();
            self.skip_separators(&mut pending_docs);
            if self.peek() == &TokenKind::Eof {
                break;
            }
            decls.push(self.parse_decl(pending_docs)?);
        }

        Ok(SourceFile {
            path: path.to_path_buf(),
            package_clause,
            decls,
            source,
        })
    }

    fn parse_decl(&mut self, docs: Vec<String>) -> Result<Decl, CompileError> {
        let start = self.location();
        match self.peek() {
            TokenKind::Import => {
                self.advance();
                let token = self.advance();
                let path = match token.kind {
                    TokenKind::StringLiteral(path) => path,
                    other => {
                        return_syntax_error!(
                            ErrorLocation::from_span(&token.location),
                            "expected an import path string, found '{}'",
                            other
                        );
                    }
                };
                Ok(Decl::Import(ImportDecl {
                    path,
                    location: start.merge(&self.prev_location()),
                }))
            }
            TokenKind::Type => {
                self.advance();
                let name = self.expect_ident()?;
                let ty = self.parse_type_expr()?;
                Ok(Decl::Type(TypeDecl {
                    name: name.name,
                    ty,
                    location: start.merge(&self.prev_location()),
                }))
            }
            TokenKind::Var => {
                self.advance();
                let name = self.expect_ident()?;
                let ty = self.parse_type_expr()?;
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Decl::Var(GlobalDecl {
                    name,
                    ty,
                    init,
                    location: start.merge(&self.prev_location()),
                }))
            }
            TokenKind::Func => {
                self.advance();
                let name = self.expect_ident()?;
                let params = self.parse_param_list()?;
                let results = self.parse_result_list()?;
                let body = self.parse_block_body()?;
                Ok(Decl::Func(FuncDecl {
                    doc: docs,
                    name,
                    params,
                    results,
                    body,
                    location: start.merge(&self.prev_location()),
                }))
            }
            other => {
                return_syntax_error!(
                    ErrorLocation::from_span(&start),
                    "expected a declaration, found '{}'",
                    other
                )
            }
        }
    }

    /// `(a, b int32, c float32)` - names pend until their group's type.
    fn parse_param_list(&mut self) -> Result<Vec<ParamDecl>, CompileError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut pending: Vec<Ident> = Vec::new();
        loop {
            if self.peek() == &TokenKind::RParen {
                break;
            }
            let name = self.expect_ident()?;
            if self.peek() == &TokenKind::Comma {
                self.advance();
                pending.push(name);
                continue;
            }
            let ty = self.parse_type_expr()?;
            pending.push(name);
            for name in pending.drain(..) {
                params.push(ParamDecl {
                    name,
                    ty: ty.clone(),
                });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        if !pending.is_empty() {
            return_syntax_error!(
                ErrorLocation::from_span(&self.prev_location()),
                "parameters without a type in the parameter list"
            );
        }
        Ok(params)
    }

    fn parse_result_list(&mut self) -> Result<Vec<TypeExpr>, CompileError> {
        match self.peek() {
            TokenKind::LBrace | TokenKind::Semicolon | TokenKind::Eof => Ok(Vec::new()),
            TokenKind::LParen => {
                self.advance();
                let mut results = Vec::new();
                loop {
                    results.push(self.parse_type_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                Ok(results)
            }
            _ => Ok(vec![self.parse_type_expr()?]),
        }
    }

    fn parse_type_expr(&mut self) -> Result<TypeExpr, CompileError> {
        let start = self.location();
        match self.peek().clone() {
            TokenKind::Star => {
                self.advance();
                let base = self.parse_type_expr()?;
                Ok(TypeExpr::Pointer {
                    base: Box::new(base),
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::LBracket => {
                self.advance();
                let length = if self.eat(&TokenKind::Ellipsis) {
                    None
                } else {
                    Some(Box::new(self.parse_expr()?))
                };
                self.expect(TokenKind::RBracket)?;
                let elem = self.parse_type_expr()?;
                Ok(TypeExpr::Array {
                    length,
                    elem: Box::new(elem),
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::Struct => {
                self.advance();
                self.parse_struct_type(start)
            }
            TokenKind::Func => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let mut params = Vec::new();
                if self.peek() != &TokenKind::RParen {
                    loop {
                        params.push(self.parse_type_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                let results = self.parse_result_list()?;
                Ok(TypeExpr::Func {
                    params,
                    results,
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::Dot) {
                    let sel = self.expect_ident()?;
                    return Ok(TypeExpr::Qualified {
                        package: name,
                        name: sel.name,
                        location: start.merge(&self.prev_location()),
                    });
                }
                Ok(TypeExpr::Name {
                    name,
                    location: start,
                })
            }
            other => {
                return_syntax_error!(
                    ErrorLocation::from_span(&start),
                    "expected a type, found '{}'",
                    other
                )
            }
        }
    }

    /// Struct bodies. A multi-name field line (`x, y int32`) is expanded
    /// into one field per name, in declaration order.
    fn parse_struct_type(&mut self, start: TextLocation) -> Result<TypeExpr, CompileError> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        loop {
            let mut docs = Vec::new();
            self.skip_separators(&mut docs);
            if self.peek() == &TokenKind::RBrace {
                break;
            }
            let field_start = self.location();
            let mut names = vec![self.expect_ident()?];
            while self.eat(&TokenKind::Comma) {
                names.push(self.expect_ident()?);
            }
            let ty = self.parse_type_expr()?;
            let field_location = field_start.merge(&self.prev_location());
            for name in names {
                fields.push(FieldDecl {
                    name: name.name,
                    ty: ty.clone(),
                    location: field_location,
                });
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(TypeExpr::Struct {
            fields,
            location: start.merge(&self.prev_location()),
        })
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        loop {
            let mut docs = Vec::new();
            self.skip_separators(&mut docs);
            if self.peek() == &TokenKind::RBrace {
                break;
            }
            if self.peek() == &TokenKind::Eof {
                return_syntax_error!(
                    ErrorLocation::from_span(&self.location()),
                    "unexpected end of file inside a block"
                );
            }
            body.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let start = self.location();
        match self.peek() {
            TokenKind::Var => {
                self.advance();
                let name = self.expect_ident()?;
                let ty = self.parse_type_expr()?;
                Ok(Stmt::VarDecl(VarDeclStmt {
                    name,
                    ty,
                    location: start.merge(&self.prev_location()),
                }))
            }
            TokenKind::Return => {
                self.advance();
                let mut values = Vec::new();
                if !matches!(
                    self.peek(),
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                ) {
                    loop {
                        values.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                Ok(Stmt::Return {
                    values,
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::LBrace => {
                let body = self.parse_block_body()?;
                Ok(Stmt::Block {
                    body,
                    location: start.merge(&self.prev_location()),
                })
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// Expression statements, assignments, define-assignments and `++`/`--`.
    fn parse_simple_stmt(&mut self) -> Result<Stmt, CompileError> {
        let start = self.location();
        let mut lhs = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            lhs.push(self.parse_expr()?);
        }

        match self.peek() {
            TokenKind::Assign | TokenKind::Define => {
                let define = self.advance().kind == TokenKind::Define;
                let mut rhs = vec![self.parse_expr()?];
                while self.eat(&TokenKind::Comma) {
                    rhs.push(self.parse_expr()?);
                }
                Ok(Stmt::Assign {
                    lhs,
                    rhs,
                    define,
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::Inc | TokenKind::Dec => {
                let increment = self.advance().kind == TokenKind::Inc;
                if lhs.len() != 1 {
                    return_syntax_error!(
                        ErrorLocation::from_span(&start),
                        "expected a single operand for '++'/'--'"
                    );
                }
                Ok(Stmt::IncDec {
                    x: lhs.remove(0),
                    increment,
                    location: start.merge(&self.prev_location()),
                })
            }
            _ => {
                if lhs.len() != 1 {
                    return_syntax_error!(
                        ErrorLocation::from_span(&start),
                        "expected an assignment after an expression list"
                    );
                }
                Ok(Stmt::Expr {
                    expr: lhs.remove(0),
                    location: start.merge(&self.prev_location()),
                })
            }
        }
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, CompileError> {
        let start = self.location();
        self.expect(TokenKind::If)?;

        let saved = self.composite_ok;
        self.composite_ok = false;
        let first = self.parse_simple_stmt();
        self.composite_ok = saved;
        let first = first?;

        if self.peek() == &TokenKind::Semicolon || !matches!(first, Stmt::Expr { .. }) {
            // `if x := f(); cond {` - init clauses are outside the subset
            return Err(CompileError::new(
                "if statements with an init clause are not supported",
                ErrorLocation::from_span(&start),
                ErrorType::Unsupported,
            ));
        }
        let cond = match first {
            Stmt::Expr { expr, .. } => expr,
            _ => unreachable!(),
        };

        let body = self.parse_block_body()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            let else_start = self.location();
            match self.peek() {
                TokenKind::If => Some(Box::new(self.parse_if_stmt()?)),
                TokenKind::LBrace => {
                    let body = self.parse_block_body()?;
                    Some(Box::new(Stmt::Block {
                        body,
                        location: else_start.merge(&self.prev_location()),
                    }))
                }
                other => {
                    return_syntax_error!(
                        ErrorLocation::from_span(&else_start),
                        "expected a block or 'if' after 'else', found '{}'",
                        other
                    );
                }
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            body,
            else_branch,
            location: start.merge(&self.prev_location()),
        })
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, CompileError> {
        let start = self.location();
        self.expect(TokenKind::For)?;

        let saved = self.composite_ok;
        self.composite_ok = false;
        let header = self.parse_for_header();
        self.composite_ok = saved;
        let (init, cond, post) = header?;

        let body = self.parse_block_body()?;
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
            location: start.merge(&self.prev_location()),
        })
    }

    #[allow(clippy::type_complexity)]
    fn parse_for_header(
        &mut self,
    ) -> Result<(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>), CompileError> {
        if self.peek() == &TokenKind::LBrace {
            return Ok((None, None, None));
        }

        // Either `for cond {` or `for init; cond; post {`
        let first = if self.peek() == &TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_simple_stmt()?)
        };

        if self.peek() == &TokenKind::LBrace {
            return match first {
                Some(Stmt::Expr { expr, .. }) => Ok((None, Some(expr), None)),
                Some(other) => {
                    return_syntax_error!(
                        ErrorLocation::from_span(&other.location()),
                        "expected a condition expression in the for header"
                    )
                }
                None => Ok((None, None, None)),
            };
        }

        self.expect(TokenKind::Semicolon)?;
        let cond = if self.peek() == &TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let post = if self.peek() == &TokenKind::LBrace {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        Ok((first.map(Box::new), cond, post))
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_expr(1)
    }

    fn parse_binary_expr(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let start = self.location();
        let mut x = self.parse_unary_expr()?;
        loop {
            let (op, prec) = match binary_op(self.peek()) {
                Some(pair) => pair,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let y = self.parse_binary_expr(prec + 1)?;
            x = Expr::Binary {
                op,
                x: Box::new(x),
                y: Box::new(y),
                location: start.merge(&self.prev_location()),
            };
        }
        Ok(x)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, CompileError> {
        let start = self.location();
        match self.peek() {
            TokenKind::Ampersand => {
                self.advance();
                let x = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::AddressOf,
                    x: Box::new(x),
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::Caret => {
                self.advance();
                let x = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Complement,
                    x: Box::new(x),
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::Star => {
                self.advance();
                let x = self.parse_unary_expr()?;
                Ok(Expr::Star {
                    x: Box::new(x),
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::Sub => {
                // Negative numbers are folded into the literal
                self.advance();
                match self.peek().clone() {
                    TokenKind::IntLiteral(text) => {
                        self.advance();
                        Ok(Expr::IntLit {
                            text: format!("-{}", text),
                            location: start.merge(&self.prev_location()),
                        })
                    }
                    TokenKind::FloatLiteral(text) => {
                        self.advance();
                        Ok(Expr::FloatLit {
                            text: format!("-{}", text),
                            location: start.merge(&self.prev_location()),
                        })
                    }
                    other => {
                        return_syntax_error!(
                            ErrorLocation::from_span(&start),
                            "unary minus is only supported on numeric literals, found '{}'",
                            other
                        )
                    }
                }
            }
            _ => self.parse_postfix_expr(),
        }
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, CompileError> {
        let start = self.location();
        let mut x = self.parse_primary_expr()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let saved = self.composite_ok;
                    self.composite_ok = true;
                    let args = self.parse_call_args();
                    self.composite_ok = saved;
                    let args = args?;
                    x = Expr::Call {
                        fun: Box::new(x),
                        args,
                        location: start.merge(&self.prev_location()),
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let saved = self.composite_ok;
                    self.composite_ok = true;
                    let index = self.parse_expr();
                    self.composite_ok = saved;
                    let index = index?;
                    self.expect(TokenKind::RBracket)?;
                    x = Expr::Index {
                        x: Box::new(x),
                        index: Box::new(index),
                        location: start.merge(&self.prev_location()),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let sel = self.expect_ident()?;
                    x = Expr::Selector {
                        x: Box::new(x),
                        sel: sel.name,
                        location: start.merge(&self.prev_location()),
                    };
                }
                TokenKind::LBrace if self.composite_ok => {
                    // `Point{...}` - only a type name can precede the brace
                    let ty = match &x {
                        Expr::Ident(ident) => TypeExpr::Name {
                            name: ident.name.clone(),
                            location: ident.location,
                        },
                        _ => break,
                    };
                    let elts = self.parse_composite_body()?;
                    x = Expr::Composite {
                        ty,
                        elts,
                        location: start.merge(&self.prev_location()),
                    };
                }
                _ => break,
            }
        }
        Ok(x)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.peek() != &TokenKind::RParen {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_composite_body(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(TokenKind::LBrace)?;
        let mut elts = Vec::new();
        if self.peek() != &TokenKind::RBrace {
            loop {
                elts.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(elts)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, CompileError> {
        let start = self.location();
        match self.peek().clone() {
            TokenKind::IntLiteral(text) => {
                self.advance();
                Ok(Expr::IntLit {
                    text,
                    location: start,
                })
            }
            TokenKind::FloatLiteral(text) => {
                self.advance();
                Ok(Expr::FloatLit {
                    text,
                    location: start,
                })
            }
            TokenKind::CharLiteral(value) => {
                self.advance();
                Ok(Expr::CharLit {
                    value,
                    location: start,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(Ident {
                    name,
                    object: None,
                    location: start,
                }))
            }
            TokenKind::LParen => {
                self.advance();
                let saved = self.composite_ok;
                self.composite_ok = true;
                let x = self.parse_expr();
                self.composite_ok = saved;
                let x = x?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren {
                    x: Box::new(x),
                    location: start.merge(&self.prev_location()),
                })
            }
            TokenKind::LBracket => {
                // An array composite literal: `[...]int8{13, 15, 17}`
                let ty = self.parse_type_expr()?;
                let elts = self.parse_composite_body()?;
                Ok(Expr::Composite {
                    ty,
                    elts,
                    location: start.merge(&self.prev_location()),
                })
            }
            other => {
                return_syntax_error!(
                    ErrorLocation::from_span(&start),
                    "expected an expression, found '{}'",
                    other
                )
            }
        }
    }
}

/// Go operator precedence for the subset: higher binds tighter.
fn binary_op(kind: &TokenKind) -> Option<(BinOpToken, u8)> {
    let pair = match kind {
        TokenKind::LogOr => (BinOpToken::LogOr, 1),
        TokenKind::LogAnd => (BinOpToken::LogAnd, 2),
        TokenKind::Eq => (BinOpToken::Eq, 3),
        TokenKind::Ne => (BinOpToken::Ne, 3),
        TokenKind::Lt => (BinOpToken::Lt, 3),
        TokenKind::Le => (BinOpToken::Le, 3),
        TokenKind::Gt => (BinOpToken::Gt, 3),
        TokenKind::Ge => (BinOpToken::Ge, 3),
        TokenKind::Add => (BinOpToken::Add, 4),
        TokenKind::Sub => (BinOpToken::Sub, 4),
        TokenKind::Pipe => (BinOpToken::BitOr, 4),
        TokenKind::Caret => (BinOpToken::Xor, 4),
        TokenKind::Star => (BinOpToken::Mul, 5),
        TokenKind::Slash => (BinOpToken::Div, 5),
        TokenKind::Percent => (BinOpToken::Rem, 5),
        TokenKind::Shl => (BinOpToken::Shl, 5),
        TokenKind::Shr => (BinOpToken::Shr, 5),
        TokenKind::Ampersand => (BinOpToken::BitAnd, 5),
        _ => return None,
    };
    Some(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parsers::tokenizer::tokenize;
    use std::path::PathBuf;

    fn parse(source: &str) -> SourceFile {
        let tokens = tokenize(source).unwrap();
        parse_file(&PathBuf::from("test/test.go"), source.to_string(), tokens).unwrap()
    }

    #[test]
    fn function_with_grouped_params() {
        let file = parse("package i32\nfunc Add(a, b int32) int32 {\n\treturn a + b\n}\n");
        assert_eq!(file.package_clause, "i32");
        assert_eq!(file.decls.len(), 1);
        match &file.decls[0] {
            Decl::Func(f) => {
                assert_eq!(f.name.name, "Add");
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.params[0].name.name, "a");
                assert_eq!(f.params[1].name.name, "b");
                assert_eq!(f.results.len(), 1);
                assert_eq!(f.body.len(), 1);
            }
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn struct_fields_expand_per_name() {
        let file = parse("package mem\ntype Point struct {\n\tx, y int32\n}\n");
        match &file.decls[0] {
            Decl::Type(t) => match &t.ty {
                TypeExpr::Struct { fields, .. } => {
                    assert_eq!(fields.len(), 2);
                    assert_eq!(fields[0].name, "x");
                    assert_eq!(fields[1].name, "y");
                }
                other => panic!("expected a struct type, got {:?}", other),
            },
            other => panic!("expected a type declaration, got {:?}", other),
        }
    }

    #[test]
    fn if_header_brace_is_not_a_composite() {
        let file = parse(
            "package t\nfunc F(a int32) int32 {\n\tif a > 0 {\n\t\treturn a\n\t}\n\treturn 0\n}\n",
        );
        match &file.decls[0] {
            Decl::Func(f) => {
                assert!(matches!(f.body[0], Stmt::If { .. }));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn composite_literal_behind_address_of() {
        let file = parse("package t\nfunc F() {\n\tp := &Point{}\n\tp.x = 1\n}\n");
        match &file.decls[0] {
            Decl::Func(f) => match &f.body[0] {
                Stmt::Assign { rhs, define, .. } => {
                    assert!(*define);
                    assert!(matches!(
                        rhs[0],
                        Expr::Unary {
                            op: UnaryOp::AddressOf,
                            ..
                        }
                    ));
                }
                other => panic!("expected a define-assign, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn for_header_with_init_cond_post() {
        let file = parse(
            "package t\nfunc F(a int32) int32 {\n\tsum := int32(0)\n\tfor i := int32(0); i < a; i++ {\n\t\tsum = sum + 1\n\t}\n\treturn sum\n}\n",
        );
        match &file.decls[0] {
            Decl::Func(f) => match &f.body[1] {
                Stmt::For {
                    init, cond, post, ..
                } => {
                    assert!(init.is_some());
                    assert!(cond.is_some());
                    assert!(post.is_some());
                }
                other => panic!("expected a for statement, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn ellipsis_array_composite() {
        let file = parse("package t\nfunc F() {\n\ta := [...]int8{13, 15, 17}\n\t_ = a\n}\n");
        match &file.decls[0] {
            Decl::Func(f) => match &f.body[0] {
                Stmt::Assign { rhs, .. } => match &rhs[0] {
                    Expr::Composite { ty, elts, .. } => {
                        assert!(matches!(ty, TypeExpr::Array { length: None, .. }));
                        assert_eq!(elts.len(), 3);
                    }
                    other => panic!("expected a composite literal, got {:?}", other),
                },
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn multi_value_return_is_parsed_for_later_rejection() {
        let file = parse("package t\nfunc F() (int32, int32) {\n\treturn 1, 2\n}\n");
        match &file.decls[0] {
            Decl::Func(f) => {
                assert_eq!(f.results.len(), 2);
                match &f.body[0] {
                    Stmt::Return { values, .. } => assert_eq!(values.len(), 2),
                    _ => unreachable!(),
                }
            }
            _ => unreachable!(),
        }
    }
}
