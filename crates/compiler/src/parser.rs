//! Recursive-descent parser for Decaf
//!
//! The surface syntax is a small Java-like language: program-level fields
//! and methods, classes and interfaces, `if`/`for`/`while`/`do-while`
//! control flow and C-like expression precedence. `callout("name", ...)`
//! calls an external routine by string name.
//!
//! Parse errors are fatal and carry the offending line and column;
//! semantic errors are deferred to the analyzer so they can accumulate.

use crate::ast::{
    Block, ClassDecl, Expr, ExprKind, FieldDecl, Ident, InterfaceDecl, LoopLabels, MethodDecl,
    MethodProto, Pos, Program, Stmt, StmtKind, VarDecl,
};
use crate::symtab::SymbolTable;
use crate::types::{AssignOp, BinaryOp, BooleanOp, Type};

/// A token with its source position (1-based line and column).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    IntLit,
    DoubleLit,
    CharLit,
    StringLit,
    Symbol,
}

impl Token {
    fn new(kind: TokenKind, text: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            text,
            line,
            column,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }
}

/// Split source text into tokens. Strings keep their escape sequences
/// verbatim (the assembler consumes them as written); character literals
/// are decoded here.
pub fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut column = 1;

    let bump = |c: char, line: &mut usize, column: &mut usize| {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            bump(c, &mut line, &mut column);
            i += 1;
            continue;
        }

        // line comment
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // block comment
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '*' {
            let (start_line, start_col) = (line, column);
            bump(chars[i], &mut line, &mut column);
            bump(chars[i + 1], &mut line, &mut column);
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(format!(
                        "unterminated block comment starting at line {}, column {}",
                        start_line, start_col
                    ));
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    bump(chars[i], &mut line, &mut column);
                    bump(chars[i + 1], &mut line, &mut column);
                    i += 2;
                    break;
                }
                bump(chars[i], &mut line, &mut column);
                i += 1;
            }
            continue;
        }

        let (tok_line, tok_col) = (line, column);

        if c.is_ascii_alphabetic() || c == '_' {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                text.push(chars[i]);
                bump(chars[i], &mut line, &mut column);
                i += 1;
            }
            tokens.push(Token::new(TokenKind::Ident, text, tok_line, tok_col));
            continue;
        }

        if c.is_ascii_digit() {
            let mut text = String::new();
            // hex literal
            if c == '0' && i + 1 < chars.len() && (chars[i + 1] == 'x' || chars[i + 1] == 'X') {
                text.push(chars[i]);
                text.push(chars[i + 1]);
                bump(chars[i], &mut line, &mut column);
                bump(chars[i + 1], &mut line, &mut column);
                i += 2;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    text.push(chars[i]);
                    bump(chars[i], &mut line, &mut column);
                    i += 1;
                }
                tokens.push(Token::new(TokenKind::IntLit, text, tok_line, tok_col));
                continue;
            }
            while i < chars.len() && chars[i].is_ascii_digit() {
                text.push(chars[i]);
                bump(chars[i], &mut line, &mut column);
                i += 1;
            }
            let mut kind = TokenKind::IntLit;
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                kind = TokenKind::DoubleLit;
                text.push('.');
                bump(chars[i], &mut line, &mut column);
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    text.push(chars[i]);
                    bump(chars[i], &mut line, &mut column);
                    i += 1;
                }
            }
            tokens.push(Token::new(kind, text, tok_line, tok_col));
            continue;
        }

        if c == '"' {
            bump(c, &mut line, &mut column);
            i += 1;
            let mut text = String::new();
            loop {
                if i >= chars.len() || chars[i] == '\n' {
                    return Err(format!(
                        "unclosed string literal at line {}, column {} - missing closing quote",
                        tok_line, tok_col
                    ));
                }
                if chars[i] == '"' {
                    bump(chars[i], &mut line, &mut column);
                    i += 1;
                    break;
                }
                if chars[i] == '\\' && i + 1 < chars.len() {
                    text.push(chars[i]);
                    text.push(chars[i + 1]);
                    bump(chars[i], &mut line, &mut column);
                    bump(chars[i + 1], &mut line, &mut column);
                    i += 2;
                    continue;
                }
                text.push(chars[i]);
                bump(chars[i], &mut line, &mut column);
                i += 1;
            }
            tokens.push(Token::new(TokenKind::StringLit, text, tok_line, tok_col));
            continue;
        }

        if c == '\'' {
            bump(c, &mut line, &mut column);
            i += 1;
            let value = if i < chars.len() && chars[i] == '\\' {
                if i + 1 >= chars.len() {
                    return Err(format!(
                        "unterminated character literal at line {}, column {}",
                        tok_line, tok_col
                    ));
                }
                let decoded = match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    '\\' => '\\',
                    '\'' => '\'',
                    '"' => '"',
                    other => {
                        return Err(format!(
                            "unknown escape '\\{}' at line {}, column {}",
                            other, tok_line, tok_col
                        ));
                    }
                };
                bump(chars[i], &mut line, &mut column);
                bump(chars[i + 1], &mut line, &mut column);
                i += 2;
                decoded
            } else if i < chars.len() {
                let decoded = chars[i];
                bump(chars[i], &mut line, &mut column);
                i += 1;
                decoded
            } else {
                return Err(format!(
                    "unterminated character literal at line {}, column {}",
                    tok_line, tok_col
                ));
            };
            if i >= chars.len() || chars[i] != '\'' {
                return Err(format!(
                    "unterminated character literal at line {}, column {}",
                    tok_line, tok_col
                ));
            }
            bump(chars[i], &mut line, &mut column);
            i += 1;
            tokens.push(Token::new(
                TokenKind::CharLit,
                value.to_string(),
                tok_line,
                tok_col,
            ));
            continue;
        }

        // multi-character operators first
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        if matches!(
            two.as_str(),
            "==" | "!=" | "<=" | ">=" | "&&" | "||" | "+=" | "-="
        ) {
            bump(chars[i], &mut line, &mut column);
            bump(chars[i + 1], &mut line, &mut column);
            i += 2;
            tokens.push(Token::new(TokenKind::Symbol, two, tok_line, tok_col));
            continue;
        }

        if "+-*/%<>=!;,(){}[]".contains(c) {
            bump(c, &mut line, &mut column);
            i += 1;
            tokens.push(Token::new(
                TokenKind::Symbol,
                c.to_string(),
                tok_line,
                tok_col,
            ));
            continue;
        }

        return Err(format!(
            "unexpected character '{}' at line {}, column {}",
            c, line, column
        ));
    }

    Ok(tokens)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, String> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    pub fn parse(&mut self) -> Result<Program, String> {
        let mut program = Program::new();
        if let Some(tok) = self.peek() {
            program.pos = tok.pos();
        }

        while !self.is_at_end() {
            if self.check("class") {
                program.classes.push(self.parse_class()?);
            } else if self.check("interface") {
                program.interfaces.push(self.parse_interface()?);
            } else {
                self.parse_field_or_method(&mut program.fields, &mut program.methods)?;
            }
        }

        Ok(program)
    }

    // ----- token plumbing -----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.text == text)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn consume(&mut self, text: &str) -> bool {
        if self.check(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<Token, String> {
        match self.peek() {
            Some(tok) if tok.text == text => Ok(self.advance().unwrap()),
            Some(tok) => Err(format!(
                "expected '{}' at line {}, column {}, found '{}'",
                text, tok.line, tok.column, tok.text
            )),
            None => Err(format!("expected '{}', found end of input", text)),
        }
    }

    fn expect_ident(&mut self) -> Result<Ident, String> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident && !is_keyword(&tok.text) => {
                let tok = self.advance().unwrap();
                Ok(Ident::new(tok.text, Pos::new(tok.line, tok.column)))
            }
            Some(tok) => Err(format!(
                "expected identifier at line {}, column {}, found '{}'",
                tok.line, tok.column, tok.text
            )),
            None => Err("expected identifier, found end of input".to_string()),
        }
    }

    fn error_here(&self, message: &str) -> String {
        match self.peek() {
            Some(tok) => format!(
                "{} at line {}, column {}, found '{}'",
                message, tok.line, tok.column, tok.text
            ),
            None => format!("{}, found end of input", message),
        }
    }

    // ----- declarations -----

    fn parse_type(&mut self) -> Result<Type, String> {
        let tok = self
            .advance()
            .ok_or_else(|| "expected type, found end of input".to_string())?;
        type_keyword(&tok.text).ok_or(format!(
            "expected type at line {}, column {}, found '{}'",
            tok.line, tok.column, tok.text
        ))
    }

    fn parse_class(&mut self) -> Result<ClassDecl, String> {
        let kw = self.expect("class")?;
        let name = self.expect_ident()?;

        let extends = if self.consume("extends") {
            Some(self.expect_ident()?.name)
        } else {
            None
        };

        let mut implements = Vec::new();
        if self.consume("implements") {
            implements.push(self.expect_ident()?.name);
            while self.consume(",") {
                implements.push(self.expect_ident()?.name);
            }
        }

        self.expect("{")?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check("}") && !self.is_at_end() {
            self.parse_field_or_method(&mut fields, &mut methods)?;
        }
        self.expect("}")?;

        Ok(ClassDecl {
            pos: kw.pos(),
            name: name.name,
            extends,
            implements,
            fields,
            methods,
            symbols: SymbolTable::global(),
        })
    }

    fn parse_interface(&mut self) -> Result<InterfaceDecl, String> {
        let kw = self.expect("interface")?;
        let name = self.expect_ident()?;
        self.expect("{")?;

        let mut prototypes = Vec::new();
        while !self.check("}") && !self.is_at_end() {
            let ret = self.parse_type()?;
            let proto_name = self.expect_ident()?;
            self.expect("(")?;
            let mut arg_types = Vec::new();
            if !self.check(")") {
                loop {
                    arg_types.push(self.parse_type()?);
                    self.expect_ident()?;
                    if !self.consume(",") {
                        break;
                    }
                }
            }
            self.expect(")")?;
            self.expect(";")?;
            prototypes.push(MethodProto {
                pos: proto_name.pos,
                name: proto_name.name,
                return_type: ret,
                arg_types,
            });
        }
        self.expect("}")?;

        Ok(InterfaceDecl {
            pos: kw.pos(),
            name: name.name,
            prototypes,
        })
    }

    /// Fields and methods share a `type name` prefix; the paren after the
    /// name disambiguates.
    fn parse_field_or_method(
        &mut self,
        fields: &mut Vec<FieldDecl>,
        methods: &mut Vec<MethodDecl>,
    ) -> Result<(), String> {
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;

        if self.check("(") {
            methods.push(self.parse_method_rest(ty, name)?);
            return Ok(());
        }

        // one FieldDecl per declared name
        let mut current = name;
        loop {
            let size = if self.consume("[") {
                let size = self.parse_expr()?;
                self.expect("]")?;
                Some(size)
            } else {
                None
            };
            fields.push(FieldDecl {
                pos: current.pos,
                name: current,
                ty,
                size,
            });
            if !self.consume(",") {
                break;
            }
            current = self.expect_ident()?;
        }
        self.expect(";")?;
        Ok(())
    }

    fn parse_method_rest(&mut self, return_type: Type, name: Ident) -> Result<MethodDecl, String> {
        self.expect("(")?;
        let mut args = Vec::new();
        if !self.check(")") {
            loop {
                let arg_ty = self.parse_type()?;
                let arg_name = self.expect_ident()?;
                args.push(VarDecl {
                    pos: arg_name.pos,
                    names: vec![arg_name],
                    ty: arg_ty,
                });
                if !self.consume(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        let body = self.parse_block()?;

        Ok(MethodDecl {
            pos: name.pos,
            name: name.name,
            return_type,
            args,
            body,
            symbols: SymbolTable::local(),
            frame_size: 0,
        })
    }

    // ----- statements -----

    fn parse_block(&mut self) -> Result<Block, String> {
        let open = self.expect("{")?;
        let mut block = Block::new(open.pos());

        // declarations come first within a block
        while self.peek().is_some_and(|t| type_keyword(&t.text).is_some())
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident)
        {
            let ty = self.parse_type()?;
            let mut names = vec![self.expect_ident()?];
            while self.consume(",") {
                names.push(self.expect_ident()?);
            }
            self.expect(";")?;
            let pos = names[0].pos;
            block.decls.push(VarDecl { pos, names, ty });
        }

        while !self.check("}") && !self.is_at_end() {
            block.stmts.push(self.parse_stmt()?);
        }
        self.expect("}")?;
        Ok(block)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, String> {
        let tok = self
            .peek()
            .ok_or_else(|| "expected statement, found end of input".to_string())?
            .clone();
        let pos = tok.pos();

        match tok.text.as_str() {
            "{" => {
                let block = self.parse_block()?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Block(block),
                })
            }
            "if" => {
                self.advance();
                self.expect("(")?;
                let cond = self.parse_expr()?;
                self.expect(")")?;
                let then_block = self.parse_block()?;
                let else_block = if self.consume("else") {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(Stmt {
                    pos,
                    kind: StmtKind::If {
                        cond,
                        then_block,
                        else_block,
                    },
                })
            }
            "for" => {
                self.advance();
                self.expect("(")?;
                let var = self.expect_ident()?;
                self.expect("=")?;
                let init = self.parse_expr()?;
                self.expect(",")?;
                let end = self.parse_expr()?;
                self.expect(")")?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::For {
                        var,
                        init,
                        end,
                        body,
                        symbols: SymbolTable::local(),
                        labels: LoopLabels::default(),
                        end_temp: String::new(),
                        diff_temp: String::new(),
                    },
                })
            }
            "while" => {
                self.advance();
                self.expect("(")?;
                let cond = self.parse_expr()?;
                self.expect(")")?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::While {
                        cond,
                        body,
                        labels: LoopLabels::default(),
                    },
                })
            }
            "do" => {
                self.advance();
                let body = self.parse_block()?;
                self.expect("while")?;
                self.expect("(")?;
                let cond = self.parse_expr()?;
                self.expect(")")?;
                self.expect(";")?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::DoWhile {
                        body,
                        cond,
                        labels: LoopLabels::default(),
                    },
                })
            }
            "break" => {
                self.advance();
                self.expect(";")?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Break {
                        target: String::new(),
                    },
                })
            }
            "continue" => {
                self.advance();
                self.expect(";")?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Continue {
                        target: String::new(),
                    },
                })
            }
            "return" => {
                self.advance();
                let value = if self.check(";") {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(";")?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Return { value },
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(";")?;
                Ok(Stmt {
                    pos,
                    kind: StmtKind::Expr(expr),
                })
            }
        }
    }

    // ----- expressions, lowest precedence first -----

    pub fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_or()?;

        let op = match self.peek().map(|t| t.text.as_str()) {
            Some("=") => Some(AssignOp::Assign),
            Some("+=") => Some(AssignOp::IncAssign),
            Some("-=") => Some(AssignOp::DecAssign),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_assignment()?;
            let pos = lhs.pos;
            return Ok(Expr::new(
                ExprKind::Assign {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            ));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.consume("||") {
            let rhs = self.parse_and()?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Boolean {
                    op: BooleanOp::Or,
                    lhs: Some(Box::new(lhs)),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_equality()?;
        while self.consume("&&") {
            let rhs = self.parse_equality()?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Boolean {
                    op: BooleanOp::And,
                    lhs: Some(Box::new(lhs)),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek().map(|t| t.text.as_str()) {
                Some("==") => BooleanOp::Eq,
                Some("!=") => BooleanOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Boolean {
                    op,
                    lhs: Some(Box::new(lhs)),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| t.text.as_str()) {
                Some("<") => BooleanOp::Lt,
                Some("<=") => BooleanOp::Le,
                Some(">") => BooleanOp::Gt,
                Some(">=") => BooleanOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Boolean {
                    op,
                    lhs: Some(Box::new(lhs)),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().map(|t| t.text.as_str()) {
                Some("+") => BinaryOp::Add,
                Some("-") => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|t| t.text.as_str()) {
                Some("*") => BinaryOp::Mul,
                Some("/") => BinaryOp::Div,
                Some("%") => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            let pos = lhs.pos;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.check("!") {
            let bang = self.advance().unwrap();
            let rhs = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Boolean {
                    op: BooleanOp::Not,
                    lhs: None,
                    rhs: Box::new(rhs),
                },
                bang.pos(),
            ));
        }
        if self.check("-") {
            let minus = self.advance().unwrap();
            let rhs = self.parse_unary()?;
            let pos = minus.pos();
            // negative literals fold directly; anything else is 0 - x
            return Ok(match rhs.kind {
                ExprKind::IntLit(v) => Expr::literal(ExprKind::IntLit(-v), Type::Int, pos),
                ExprKind::DoubleLit(v) => {
                    Expr::literal(ExprKind::DoubleLit(-v), Type::Double, pos)
                }
                _ => {
                    let zero = Expr::literal(ExprKind::IntLit(0), Type::Int, pos);
                    Expr::new(
                        ExprKind::Binary {
                            op: BinaryOp::Sub,
                            lhs: Box::new(zero),
                            rhs: Box::new(rhs),
                        },
                        pos,
                    )
                }
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let tok = self
            .peek()
            .ok_or_else(|| "expected expression, found end of input".to_string())?
            .clone();
        let pos = tok.pos();

        match tok.kind {
            TokenKind::IntLit => {
                self.advance();
                let value = parse_int(&tok.text).ok_or(format!(
                    "invalid integer literal '{}' at line {}, column {}",
                    tok.text, tok.line, tok.column
                ))?;
                Ok(Expr::literal(ExprKind::IntLit(value), Type::Int, pos))
            }
            TokenKind::DoubleLit => {
                self.advance();
                let value: f64 = tok.text.parse().map_err(|_| {
                    format!(
                        "invalid double literal '{}' at line {}, column {}",
                        tok.text, tok.line, tok.column
                    )
                })?;
                Ok(Expr::literal(ExprKind::DoubleLit(value), Type::Double, pos))
            }
            TokenKind::CharLit => {
                self.advance();
                let value = tok.text.chars().next().unwrap_or('\0');
                Ok(Expr::literal(ExprKind::CharLit(value), Type::Char, pos))
            }
            TokenKind::StringLit => {
                self.advance();
                Ok(Expr::literal(
                    ExprKind::StringLit(tok.text),
                    Type::String,
                    pos,
                ))
            }
            TokenKind::Symbol if tok.text == "(" => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            TokenKind::Ident if tok.text == "true" || tok.text == "false" => {
                self.advance();
                Ok(Expr::literal(
                    ExprKind::BoolLit(tok.text == "true"),
                    Type::Bool,
                    pos,
                ))
            }
            TokenKind::Ident if tok.text == "callout" => {
                self.advance();
                self.expect("(")?;
                let name_tok = self
                    .advance()
                    .ok_or_else(|| "expected callout name, found end of input".to_string())?;
                if name_tok.kind != TokenKind::StringLit {
                    return Err(format!(
                        "callout name must be a string literal at line {}, column {}",
                        name_tok.line, name_tok.column
                    ));
                }
                let mut args = Vec::new();
                while self.consume(",") {
                    args.push(self.parse_expr()?);
                }
                self.expect(")")?;
                Ok(Expr::new(
                    ExprKind::Call {
                        name: Ident::new(name_tok.text, Pos::new(name_tok.line, name_tok.column)),
                        external: true,
                        args,
                    },
                    pos,
                ))
            }
            TokenKind::Ident if !is_keyword(&tok.text) => {
                let name = self.expect_ident()?;
                if self.consume("(") {
                    let mut args = Vec::new();
                    if !self.check(")") {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.consume(",") {
                                break;
                            }
                        }
                    }
                    self.expect(")")?;
                    return Ok(Expr::new(
                        ExprKind::Call {
                            name,
                            external: false,
                            args,
                        },
                        pos,
                    ));
                }
                let index = if self.consume("[") {
                    let index = self.parse_expr()?;
                    self.expect("]")?;
                    Some(Box::new(index))
                } else {
                    None
                };
                Ok(Expr::new(ExprKind::Location { name, index }, pos))
            }
            _ => Err(self.error_here("expected expression")),
        }
    }
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn type_keyword(text: &str) -> Option<Type> {
    match text {
        "int" => Some(Type::Int),
        "boolean" => Some(Type::Bool),
        "double" => Some(Type::Double),
        "char" => Some(Type::Char),
        "string" => Some(Type::String),
        "void" => Some(Type::Void),
        _ => None,
    }
}

fn is_keyword(text: &str) -> bool {
    matches!(
        text,
        "int"
            | "boolean"
            | "double"
            | "char"
            | "string"
            | "void"
            | "class"
            | "interface"
            | "extends"
            | "implements"
            | "if"
            | "else"
            | "for"
            | "while"
            | "do"
            | "break"
            | "continue"
            | "return"
            | "true"
            | "false"
            | "callout"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).unwrap().parse().unwrap()
    }

    #[test]
    fn test_tokenize_tracks_positions() {
        let tokens = tokenize("int x;\nx = 5;").unwrap();
        assert_eq!(tokens[0].text, "int");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!(tokens[3].text, "x");
        assert_eq!((tokens[3].line, tokens[3].column), (2, 1));
    }

    #[test]
    fn test_tokenize_string_keeps_escapes() {
        let tokens = tokenize(r#""a\nb""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!(tokens[0].text, "a\\nb");
    }

    #[test]
    fn test_tokenize_unclosed_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert!(err.contains("unclosed string literal"));
    }

    #[test]
    fn test_parse_fields_and_method() {
        let program = parse("int a;\nint b[10];\nvoid main() { }\n");
        assert_eq!(program.fields.len(), 2);
        assert_eq!(program.fields[1].name.name, "b");
        assert!(program.fields[1].size.is_some());
        assert_eq!(program.methods.len(), 1);
        assert_eq!(program.methods[0].name, "main");
        assert_eq!(program.methods[0].return_type, Type::Void);
    }

    #[test]
    fn test_parse_method_args() {
        let program = parse("int add(int a, int b) { return a + b; }");
        let method = &program.methods[0];
        assert_eq!(method.args.len(), 2);
        assert_eq!(method.args[0].names[0].name, "a");
        assert!(matches!(
            method.body.stmts[0].kind,
            StmtKind::Return { value: Some(_) }
        ));
    }

    #[test]
    fn test_parse_precedence() {
        // a + b * c parses as a + (b * c)
        let program = parse("void main() { x = a + b * c; }");
        let StmtKind::Expr(expr) = &program.methods[0].body.stmts[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { rhs, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { op, rhs: mul, .. } = &rhs.kind else {
            panic!("expected binary add");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            mul.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_short_circuit_condition() {
        let program = parse("void main() { if (a && b) { } else { } }");
        let StmtKind::If { cond, else_block, .. } = &program.methods[0].body.stmts[0].kind else {
            panic!("expected if");
        };
        assert!(matches!(
            cond.kind,
            ExprKind::Boolean {
                op: BooleanOp::And,
                ..
            }
        ));
        assert!(else_block.is_some());
    }

    #[test]
    fn test_parse_for_loop() {
        let program = parse("void main() { for (i = 0, 10) { break; } }");
        let StmtKind::For { var, body, .. } = &program.methods[0].body.stmts[0].kind else {
            panic!("expected for");
        };
        assert_eq!(var.name, "i");
        assert!(matches!(body.stmts[0].kind, StmtKind::Break { .. }));
    }

    #[test]
    fn test_parse_do_while() {
        let program = parse("void main() { do { x = x - 1; } while (x > 0); }");
        assert!(matches!(
            program.methods[0].body.stmts[0].kind,
            StmtKind::DoWhile { .. }
        ));
    }

    #[test]
    fn test_parse_callout() {
        let program = parse("void main() { callout(\"printf\", msg); }");
        let StmtKind::Expr(expr) = &program.methods[0].body.stmts[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call {
            name,
            external,
            args,
        } = &expr.kind
        else {
            panic!("expected call");
        };
        assert!(*external);
        assert_eq!(name.name, "printf");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_parse_class_and_interface() {
        let program = parse(
            "interface Shape { int area(int scale); }\n\
             class Program implements Shape { int side; int area(int scale) { return side; } \
             void main() { } }",
        );
        assert_eq!(program.interfaces.len(), 1);
        assert_eq!(program.interfaces[0].prototypes[0].name, "area");
        assert_eq!(program.classes.len(), 1);
        let class = &program.classes[0];
        assert_eq!(class.implements, vec!["Shape".to_string()]);
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.methods.len(), 2);
    }

    #[test]
    fn test_parse_unary_minus_desugars() {
        let program = parse("void main() { x = -y; }");
        let StmtKind::Expr(expr) = &program.methods[0].body.stmts[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { rhs, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { op, lhs, .. } = &rhs.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Sub);
        assert_eq!(lhs.as_int_literal(), Some(0));
    }

    #[test]
    fn test_parse_negative_literal_folds() {
        let program = parse("void main() { x = -3; }");
        let StmtKind::Expr(expr) = &program.methods[0].body.stmts[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Assign { rhs, .. } = &expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(rhs.as_int_literal(), Some(-3));
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = Parser::new("void main( { }").unwrap().parse().unwrap_err();
        assert!(err.contains("line 1"), "unexpected message: {}", err);
    }
}
