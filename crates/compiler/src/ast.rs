//! Abstract syntax tree for Decaf
//!
//! Nodes are tagged unions grouped by syntactic category. Every node
//! carries its source coordinates; expressions additionally carry the
//! fields the semantic passes fill in: the propagated type, array and
//! write-context flags, and the synthesized result identifier naming the
//! value the expression produces.
//!
//! Ownership is tree-shaped: children are owned by their structural
//! parent, and each scope-introducing node owns its symbol table. Loop
//! statements store their control labels as plain strings once analysis
//! has minted them, so `break`/`continue` resolve to a cloned label value
//! rather than a back-pointer.

use crate::symtab::SymbolTable;
use crate::types::{AssignOp, BinaryOp, BooleanOp, Type};

/// Source coordinates, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Pos { line, column }
    }
}

/// A bare identifier occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Ident {
            name: name.into(),
            pos,
        }
    }
}

/// Labels minted for one loop statement during analysis.
///
/// Empty strings until the analyze pass runs; `break` jumps to `end`,
/// `continue` to `cont`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopLabels {
    pub top: String,
    pub cont: String,
    pub end: String,
}

/// Program root: top-level fields, methods, classes and interfaces.
#[derive(Debug)]
pub struct Program {
    pub pos: Pos,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub classes: Vec<ClassDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub symbols: SymbolTable,
}

impl Program {
    pub fn new() -> Self {
        Program {
            pos: Pos::default(),
            fields: Vec::new(),
            methods: Vec::new(),
            classes: Vec::new(),
            interfaces: Vec::new(),
            symbols: SymbolTable::global(),
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// A class declaration. Fields live in static storage like program-level
/// fields; methods are emitted under their own names.
#[derive(Debug)]
pub struct ClassDecl {
    pub pos: Pos,
    pub name: String,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub symbols: SymbolTable,
}

/// An interface declaration: method prototypes only.
#[derive(Debug)]
pub struct InterfaceDecl {
    pub pos: Pos,
    pub name: String,
    pub prototypes: Vec<MethodProto>,
}

/// A bodiless method signature inside an interface.
#[derive(Debug)]
pub struct MethodProto {
    pub pos: Pos,
    pub name: String,
    pub return_type: Type,
    pub arg_types: Vec<Type>,
}

/// A field declaration at program or class scope. `size` is present for
/// array fields and must be a positive integer literal.
#[derive(Debug)]
pub struct FieldDecl {
    pub pos: Pos,
    pub name: Ident,
    pub ty: Type,
    pub size: Option<Expr>,
}

/// One or more local variables sharing a declared type.
#[derive(Debug)]
pub struct VarDecl {
    pub pos: Pos,
    pub names: Vec<Ident>,
    pub ty: Type,
}

/// A method declaration. `frame_size` is filled by the allocate pass:
/// the bytes needed for arguments, locals and synthesized temporaries.
#[derive(Debug)]
pub struct MethodDecl {
    pub pos: Pos,
    pub name: String,
    pub return_type: Type,
    pub args: Vec<VarDecl>,
    pub body: Block,
    pub symbols: SymbolTable,
    pub frame_size: usize,
}

/// A brace-delimited block: declarations first, then statements.
#[derive(Debug)]
pub struct Block {
    pub pos: Pos,
    pub decls: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
    pub symbols: SymbolTable,
}

impl Block {
    pub fn new(pos: Pos) -> Self {
        Block {
            pos,
            decls: Vec::new(),
            stmts: Vec::new(),
            symbols: SymbolTable::local(),
        }
    }
}

#[derive(Debug)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Debug)]
pub enum StmtKind {
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// `for (var = init, end) body`; the loop variable is implicitly an
    /// integer declared in the loop's own scope. `end_temp` holds the
    /// evaluated terminating value and `diff_temp` the per-iteration
    /// difference; both are minted during analysis.
    For {
        var: Ident,
        init: Expr,
        end: Expr,
        body: Block,
        symbols: SymbolTable,
        labels: LoopLabels,
        end_temp: String,
        diff_temp: String,
    },
    While {
        cond: Expr,
        body: Block,
        labels: LoopLabels,
    },
    DoWhile {
        body: Block,
        cond: Expr,
        labels: LoopLabels,
    },
    /// `target` is the enclosing loop's end label, captured during analysis.
    Break { target: String },
    /// `target` is the enclosing for-loop's continue label.
    Continue { target: String },
    Return { value: Option<Expr> },
    Goto { label: String },
    Label { label: String },
    Expr(Expr),
    Block(Block),
}

/// An expression node: the shared header plus the variant payload.
#[derive(Debug)]
pub struct Expr {
    pub pos: Pos,
    /// Propagated type; `Unknown` only before type propagation.
    pub ty: Type,
    /// True when this names a whole array rather than an element.
    pub is_array: bool,
    /// Set by the parent when this location is the target of a store.
    pub used_as_write: bool,
    /// Name of the synthesized temporary holding this expression's value,
    /// assigned during analysis for every expression consumed as a value.
    pub result: Option<String>,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Expr {
            pos,
            ty: Type::Unknown,
            is_array: false,
            used_as_write: false,
            result: None,
            kind,
        }
    }

    /// Literal constructors carry their type up front.
    pub fn literal(kind: ExprKind, ty: Type, pos: Pos) -> Self {
        let mut e = Expr::new(kind, pos);
        e.ty = ty;
        e
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::IntLit(_)
                | ExprKind::DoubleLit(_)
                | ExprKind::BoolLit(_)
                | ExprKind::CharLit(_)
                | ExprKind::StringLit(_)
        )
    }

    pub fn as_int_literal(&self) -> Option<i64> {
        match self.kind {
            ExprKind::IntLit(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_location(&self) -> bool {
        matches!(self.kind, ExprKind::Location { .. })
    }
}

#[derive(Debug)]
pub enum ExprKind {
    IntLit(i64),
    DoubleLit(f64),
    BoolLit(bool),
    CharLit(char),
    StringLit(String),
    /// A variable reference, optionally indexed into an array.
    Location {
        name: Ident,
        index: Option<Box<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `lhs` is `None` for the unary `Not`.
    Boolean {
        op: BooleanOp,
        lhs: Option<Box<Expr>>,
        rhs: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `external` calls name a runtime routine by string and skip
    /// signature checking.
    Call {
        name: Ident,
        external: bool,
        args: Vec<Expr>,
    },
}
