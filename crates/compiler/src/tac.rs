//! Three-address-code statement model
//!
//! A TAC statement is a 5-tuple `{opcode, src0, src1, dst, info}`. The
//! `info` payload carries byte sizes for `Global`, array lengths for
//! `Load`/`Store` and argument indices for `Param`/`GetParam`. Statements
//! own their operand names outright so the stream can be reordered and
//! rewritten without touching the AST.

use crate::types::{Opcode, Type};

/// A memory operand: a named local, argument or global.
#[derive(Debug, Clone, PartialEq)]
pub struct TacIdent {
    pub name: String,
    pub ty: Type,
    /// Byte offset from the frame base; unused for globals.
    pub addr: usize,
    pub global: bool,
}

/// One operand slot of a TAC statement.
#[derive(Debug, Clone, PartialEq)]
pub enum TacArg {
    Unused,
    IntLit(i64),
    DoubleLit(f64),
    BoolLit(bool),
    /// Raw text payload, only used by `String` data statements.
    StrLit(String),
    Ident(TacIdent),
    Label(String),
    /// Scratch/parameter register, assigned by the emitter only.
    Reg { idx: usize, ty: Type },
}

impl TacArg {
    pub fn ident(name: impl Into<String>, ty: Type, addr: usize, global: bool) -> Self {
        TacArg::Ident(TacIdent {
            name: name.into(),
            ty,
            addr,
            global,
        })
    }

    pub fn label(name: impl Into<String>) -> Self {
        TacArg::Label(name.into())
    }

    pub fn is_used(&self) -> bool {
        !matches!(self, TacArg::Unused)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TacArg::IntLit(_) | TacArg::DoubleLit(_) | TacArg::BoolLit(_) | TacArg::StrLit(_)
        )
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, TacArg::Ident(_))
    }

    pub fn is_double(&self) -> bool {
        match self {
            TacArg::DoubleLit(_) => true,
            TacArg::Ident(id) => id.ty == Type::Double,
            TacArg::Reg { ty, .. } => *ty == Type::Double,
            _ => false,
        }
    }

    /// The identifier name, when this operand is one.
    pub fn name(&self) -> Option<&str> {
        match self {
            TacArg::Ident(id) => Some(&id.name),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TacArg::IntLit(v) => Some(*v),
            _ => None,
        }
    }

    /// Compiler temporaries are named `.LC<n>` by the analyzer.
    pub fn is_temp(&self) -> bool {
        matches!(self, TacArg::Ident(id) if id.name.starts_with(".LC"))
    }

    pub fn is_int_zero(&self) -> bool {
        matches!(self, TacArg::IntLit(0))
    }

    pub fn is_int_one(&self) -> bool {
        matches!(self, TacArg::IntLit(1))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, TacArg::BoolLit(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, TacArg::BoolLit(false))
    }

    /// Stable key for value numbering: literals key by value, identifiers
    /// and labels by name.
    pub fn vn_key(&self) -> String {
        match self {
            TacArg::Unused => String::new(),
            TacArg::IntLit(v) => v.to_string(),
            TacArg::DoubleLit(v) => format!("{:?}", v),
            TacArg::BoolLit(v) => (if *v { "1" } else { "0" }).to_string(),
            TacArg::StrLit(s) => s.clone(),
            TacArg::Ident(id) => id.name.clone(),
            TacArg::Label(name) => name.clone(),
            TacArg::Reg { idx, .. } => format!("%{}", idx),
        }
    }
}

impl std::fmt::Display for TacArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TacArg::Unused => Ok(()),
            TacArg::IntLit(v) => write!(f, "${}", v),
            TacArg::DoubleLit(v) => write!(f, "${}", v),
            TacArg::BoolLit(v) => write!(f, "${}", if *v { 1 } else { 0 }),
            TacArg::StrLit(s) => write!(f, "${}", s),
            TacArg::Ident(id) => write!(f, "${}", id.name),
            TacArg::Label(name) => write!(f, "${}", name),
            TacArg::Reg { idx, .. } => write!(f, "%r{}", idx),
        }
    }
}

/// A single three-address-code statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Tac {
    pub op: Opcode,
    pub src0: TacArg,
    pub src1: TacArg,
    pub dst: TacArg,
    pub info: i64,
    /// Source line the statement was lowered from, for runtime diagnostics.
    pub line: usize,
}

impl Tac {
    pub fn new(op: Opcode, line: usize) -> Self {
        Tac {
            op,
            src0: TacArg::Unused,
            src1: TacArg::Unused,
            dst: TacArg::Unused,
            info: 0,
            line,
        }
    }

    pub fn has_src0(&self) -> bool {
        self.src0.is_used()
    }

    pub fn has_src1(&self) -> bool {
        self.src1.is_used()
    }

    pub fn has_dst(&self) -> bool {
        self.dst.is_used()
    }

    /// Turn this statement into `Mov src -> dst`, keeping the destination.
    pub fn rewrite_to_mov(&mut self, src: TacArg) {
        self.op = Opcode::Mov;
        self.src0 = src;
        self.src1 = TacArg::Unused;
    }

    /// Erase this statement entirely.
    pub fn rewrite_to_noop(&mut self) {
        self.op = Opcode::Noop;
        self.src0 = TacArg::Unused;
        self.src1 = TacArg::Unused;
        self.dst = TacArg::Unused;
    }
}

impl std::fmt::Display for Tac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.op)?;
        if self.op == Opcode::Label {
            if let TacArg::Label(name) = &self.src0 {
                write!(f, "{} ", name)?;
            }
        } else {
            if self.has_src0() {
                write!(f, "{}", self.src0)?;
            }
            if self.has_src1() {
                if self.has_src0() {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.src1)?;
            }
            if self.has_dst() {
                write!(f, ", {}", self.dst)?;
            }
        }
        write!(f, "\t// {}", self.info)
    }
}

/// Render a whole TAC stream, one statement per line.
pub fn print_tac(statements: &[Tac]) -> String {
    let mut out = String::new();
    for stmt in statements {
        out.push_str(&stmt.to_string());
        out.push('\n');
    }
    out
}
