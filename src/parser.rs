//! Parser for tGo source files and annotation condition strings.
//!
//! The surface language is a small Go-like subset: top-level `func`
//! declarations with named input and output parameters, parallel
//! assignment, `var` declarations, `if`/`else`, condition-only `for`
//! loops, `return`, and call statements. Annotations are call statements
//! whose head is `PRE`, `POST` or `INV` with a single string-literal
//! argument; the string content is parsed with [`parse_condition`] into
//! the same expression grammar.
//!
//! # Supported expression syntax
//!
//! - Literals: integers (`42`), double-quoted escape-free strings
//! - References: identifiers (`x`, `n`)
//! - Comparisons: `==`, `!=`, `<`, `<=`, `>`, `>=`
//! - Arithmetic: `+`, `-`, `*`, `/`, `%`
//! - Logical: `&&`, `||`, `!`
//! - Calls: `f(a, b)`, including `Implies(p, q)`, `ForAll(x, T, p)`,
//!   `Exists("x", T, p)`
//! - Indexing: `a[i]` (recognized; rejected later by the WP calculus)
//! - Parentheses: `(a + b) * c` — produces an explicit `Paren` node

use crate::expr::{BinOp, Expr, FuncDecl, LitKind, Param, SourceFile, Stmt, UnOp};
use thiserror::Error;

/// Parse failure with the 1-based source line it occurred on.
#[derive(Debug, Clone, Error)]
#[error("parse error at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Parse a complete source file into its top-level procedure declarations.
///
/// # Errors
/// Returns a [`ParseError`] on any lexical or syntactic violation.
pub fn parse_file(src: &str) -> Result<SourceFile, ParseError> {
    let tokens = lex(src)?;
    let mut p = Parser::new(tokens);
    let mut decls = Vec::new();
    while !p.at_eof() {
        decls.push(p.func_decl()?);
    }
    Ok(SourceFile { decls })
}

/// Parse a condition string (an annotation body or a persisted contract
/// condition) into an expression.
///
/// # Errors
/// Returns a [`ParseError`] if the text is not a single well-formed
/// expression.
pub fn parse_condition(text: &str) -> Result<Expr, ParseError> {
    let tokens = lex(text)?;
    let mut p = Parser::new(tokens);
    let expr = p.expr()?;
    if !p.at_eof() {
        return Err(ParseError::new(
            p.line(),
            format!("trailing input after expression: {}", p.describe_current()),
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Int(String),
    /// String literal, quotes included.
    Str(String),
    KwFunc,
    KwVar,
    KwIf,
    KwElse,
    KwFor,
    KwReturn,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Assign,
    Op(BinOp),
    Bang,
    Minus,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

fn lex(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    let mut line = 1;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b' ' | b'\t' | b'\r' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'(' => push(&mut tokens, Tok::LParen, line, &mut i),
            b')' => push(&mut tokens, Tok::RParen, line, &mut i),
            b'{' => push(&mut tokens, Tok::LBrace, line, &mut i),
            b'}' => push(&mut tokens, Tok::RBrace, line, &mut i),
            b'[' => push(&mut tokens, Tok::LBracket, line, &mut i),
            b']' => push(&mut tokens, Tok::RBracket, line, &mut i),
            b',' => push(&mut tokens, Tok::Comma, line, &mut i),
            b';' => push(&mut tokens, Tok::Semi, line, &mut i),
            b'+' => push(&mut tokens, Tok::Op(BinOp::Add), line, &mut i),
            b'-' => push(&mut tokens, Tok::Minus, line, &mut i),
            b'*' => push(&mut tokens, Tok::Op(BinOp::Mul), line, &mut i),
            b'/' => push(&mut tokens, Tok::Op(BinOp::Div), line, &mut i),
            b'%' => push(&mut tokens, Tok::Op(BinOp::Rem), line, &mut i),
            b'&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token {
                        tok: Tok::Op(BinOp::And),
                        line,
                    });
                    i += 2;
                } else {
                    return Err(ParseError::new(line, "single '&' is not an operator"));
                }
            }
            b'|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token {
                        tok: Tok::Op(BinOp::Or),
                        line,
                    });
                    i += 2;
                } else {
                    return Err(ParseError::new(line, "single '|' is not an operator"));
                }
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        tok: Tok::Op(BinOp::Eq),
                        line,
                    });
                    i += 2;
                } else {
                    push(&mut tokens, Tok::Assign, line, &mut i);
                }
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        tok: Tok::Op(BinOp::Ne),
                        line,
                    });
                    i += 2;
                } else {
                    push(&mut tokens, Tok::Bang, line, &mut i);
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        tok: Tok::Op(BinOp::Le),
                        line,
                    });
                    i += 2;
                } else {
                    push(&mut tokens, Tok::Op(BinOp::Lt), line, &mut i);
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token {
                        tok: Tok::Op(BinOp::Ge),
                        line,
                    });
                    i += 2;
                } else {
                    push(&mut tokens, Tok::Op(BinOp::Gt), line, &mut i);
                }
            }
            b'"' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\n' {
                        return Err(ParseError::new(line, "unterminated string literal"));
                    }
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(ParseError::new(line, "unterminated string literal"));
                }
                i += 1;
                tokens.push(Token {
                    tok: Tok::Str(src[start..i].to_string()),
                    line,
                });
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Int(src[start..i].to_string()),
                    line,
                });
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &src[start..i];
                let tok = match word {
                    "func" => Tok::KwFunc,
                    "var" => Tok::KwVar,
                    "if" => Tok::KwIf,
                    "else" => Tok::KwElse,
                    "for" => Tok::KwFor,
                    "return" => Tok::KwReturn,
                    _ => Tok::Ident(word.to_string()),
                };
                tokens.push(Token { tok, line });
            }
            other => {
                return Err(ParseError::new(
                    line,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        }
    }
    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, tok: Tok, line: usize, i: &mut usize) {
    tokens.push(Token { tok, line });
    *i += 1;
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(tok) => format!("{tok:?}"),
            None => "end of input".to_string(),
        }
    }

    fn expect(&mut self, want: &Tok, what: &str) -> Result<(), ParseError> {
        if self.peek() == Some(want) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::new(
                self.line(),
                format!("expected {what}, found {}", self.describe_current()),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.bump() {
            Some(Tok::Ident(name)) => Ok(name),
            other => Err(ParseError::new(
                self.line(),
                format!("expected {what}, found {other:?}"),
            )),
        }
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ---- declarations ----

    fn func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        self.expect(&Tok::KwFunc, "'func'")?;
        let name = self.expect_ident("procedure name")?;
        self.expect(&Tok::LParen, "'('")?;
        let inputs = self.param_list()?;
        self.expect(&Tok::RParen, "')'")?;

        let outputs = if self.eat(&Tok::LParen) {
            let outs = self.param_list()?;
            self.expect(&Tok::RParen, "')'")?;
            outs
        } else {
            Vec::new()
        };

        let body = self.block()?;
        Ok(FuncDecl {
            name,
            inputs,
            outputs,
            body,
        })
    }

    /// Parameter groups in the Go style: `a int, b int` or `a, b int`.
    fn param_list(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        while !matches!(self.peek(), Some(Tok::RParen) | None) {
            let name = self.expect_ident("parameter name")?;
            pending.push(name);
            if self.eat(&Tok::Comma) {
                continue;
            }
            let ty = self.type_expr()?;
            for name in pending.drain(..) {
                params.push(Param {
                    name,
                    ty: ty.clone(),
                });
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }

        if !pending.is_empty() {
            return Err(ParseError::new(
                self.line(),
                "parameter names without a type",
            ));
        }
        Ok(params)
    }

    fn type_expr(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Tok::LBracket) {
            self.expect(&Tok::RBracket, "']' in array type")?;
            let elem = self.type_expr()?;
            Ok(Expr::ArrayType {
                elem: Box::new(elem),
            })
        } else {
            let name = self.expect_ident("type name")?;
            Ok(Expr::Ident(name))
        }
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Tok::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        loop {
            while self.eat(&Tok::Semi) {}
            if self.eat(&Tok::RBrace) {
                return Ok(stmts);
            }
            if self.at_eof() {
                return Err(ParseError::new(self.line(), "unterminated block"));
            }
            stmts.push(self.stmt()?);
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Tok::KwVar) => self.var_decl(),
            Some(Tok::KwIf) => self.if_stmt(),
            Some(Tok::KwFor) => {
                self.pos += 1;
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Stmt::For { cond, body })
            }
            Some(Tok::KwReturn) => {
                self.pos += 1;
                Ok(Stmt::Return)
            }
            Some(Tok::LBrace) => Ok(Stmt::Block(self.block()?)),
            _ => self.simple_stmt(),
        }
    }

    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::KwVar, "'var'")?;
        let mut names = vec![self.expect_ident("variable name")?];
        while self.eat(&Tok::Comma) {
            names.push(self.expect_ident("variable name")?);
        }
        let ty = self.type_expr()?;
        Ok(Stmt::Decl { names, ty })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&Tok::KwIf, "'if'")?;
        let cond = self.expr()?;
        let then_block = self.block()?;
        let else_stmt = if self.eat(&Tok::KwElse) {
            let stmt = if matches!(self.peek(), Some(Tok::KwIf)) {
                self.if_stmt()?
            } else {
                Stmt::Block(self.block()?)
            };
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_stmt,
        })
    }

    /// Assignment or a bare call statement.
    fn simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        let mut lhs = vec![self.expr()?];
        while self.eat(&Tok::Comma) {
            lhs.push(self.expr()?);
        }

        if self.eat(&Tok::Assign) {
            let mut rhs = vec![self.expr()?];
            while self.eat(&Tok::Comma) {
                rhs.push(self.expr()?);
            }
            if lhs.len() != rhs.len() && rhs.len() != 1 {
                return Err(ParseError::new(
                    line,
                    format!(
                        "assignment count mismatch: {} targets, {} values",
                        lhs.len(),
                        rhs.len()
                    ),
                ));
            }
            return Ok(Stmt::Assign { lhs, rhs });
        }

        if lhs.len() != 1 {
            return Err(ParseError::new(line, "expression list without assignment"));
        }
        match lhs.pop() {
            Some(expr @ Expr::Call { .. }) => Ok(Stmt::Expr(expr)),
            _ => Err(ParseError::new(
                line,
                "expression statement must be a call",
            )),
        }
    }

    // ---- expressions ----

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Tok::Op(BinOp::Or)) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.cmp_expr()?;
        while self.peek() == Some(&Tok::Op(BinOp::And)) {
            self.pos += 1;
            let rhs = self.cmp_expr()?;
            lhs = Expr::binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.add_expr()?;
        while let Some(Tok::Op(
            op @ (BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge),
        )) = self.peek()
        {
            let op = *op;
            self.pos += 1;
            let rhs = self.add_expr()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op(BinOp::Add)) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.mul_expr()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        while let Some(Tok::Op(op @ (BinOp::Mul | BinOp::Div | BinOp::Rem))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.pos += 1;
                let operand = self.unary_expr()?;
                Ok(Expr::unary(UnOp::Neg, operand))
            }
            Some(Tok::Bang) => {
                self.pos += 1;
                let operand = self.unary_expr()?;
                Ok(Expr::unary(UnOp::Not, operand))
            }
            _ => self.postfix_expr(),
        }
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek() {
                Some(Tok::LParen) => {
                    let Some(func) = expr.as_ident().map(str::to_string) else {
                        return Err(ParseError::new(
                            self.line(),
                            "call head must be an identifier",
                        ));
                    };
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if !self.eat(&Tok::Comma) {
                                break;
                            }
                        }
                        self.expect(&Tok::RParen, "')' after call arguments")?;
                    }
                    expr = Expr::Call { func, args };
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    let index = self.expr()?;
                    self.expect(&Tok::RBracket, "']' after index")?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        match self.bump() {
            Some(Tok::Int(value)) => Ok(Expr::Lit {
                kind: LitKind::Int,
                value,
            }),
            Some(Tok::Str(value)) => Ok(Expr::Lit {
                kind: LitKind::Str,
                value,
            }),
            Some(Tok::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            other => Err(ParseError::new(
                line,
                format!("expected expression, found {other:?}"),
            )),
        }
    }
}
