//! Target code emission
//!
//! Walks the optimized TAC stream and writes assembly text. Every
//! temporary lives in its frame slot; registers are pure scratch, so
//! emission is a deterministic per-statement expansion:
//!
//! * memory-to-memory moves stage through the scratch register,
//! * mul/div/mod run through `%rax`/`%rdx`,
//! * comparisons lower to `cmp` + `setcc` + `movzb`,
//! * array accesses check their index against the length carried in the
//!   statement's `info` payload before touching memory,
//! * call parameters buffer until the `Call` and then fill the System-V
//!   registers, overflowing onto a 16-byte-aligned stack.
//!
//! The emitter does not fail on valid TAC; opcodes it does not know are
//! skipped, since analysis can never produce them.

pub mod error;
pub mod target;

pub use error::CodeGenError;

use std::fmt::Write as _;

use crate::config::TargetArch;
use crate::tac::{Tac, TacArg};
use crate::types::{Opcode, Type};
use target::{
    NUM_DOUBLE_PARAM_REGS, NUM_INT_PARAM_REGS, REG_DOUBLE_RET, REG_INDEX, REG_OUTPUT, REG_RET,
    REG_RET_BYTE, REG_TEMP, Target, double_param_reg, int_param_reg, reg,
};

pub struct CodeGen {
    output: String,
    target: Target,
    /// Buffered `Param` operands awaiting the next `Call`.
    pending_params: Vec<TacArg>,
    /// Incoming-parameter mirrors, reset at every `FBegin`.
    next_int_param: usize,
    next_double_param: usize,
    next_stack_param: usize,
    /// Fresh labels for inline bounds-check continuations.
    bounds_counter: usize,
}

impl CodeGen {
    pub fn new(arch: TargetArch) -> Self {
        CodeGen {
            output: String::new(),
            target: Target::new(arch),
            pending_params: Vec::new(),
            next_int_param: 0,
            next_double_param: 0,
            next_stack_param: 0,
            bounds_counter: 0,
        }
    }

    /// Emit the whole stream as one assembly translation unit.
    pub fn generate(
        &mut self,
        source_filename: &str,
        statements: &[Tac],
    ) -> Result<String, CodeGenError> {
        if !source_filename.is_empty() {
            writeln!(self.output, ".file \"{}\"", source_filename)?;
        }
        writeln!(self.output, ".text")?;

        for stmt in statements {
            self.gen_stmt(stmt)?;
        }

        Ok(std::mem::take(&mut self.output))
    }

    fn gen_stmt(&mut self, stmt: &Tac) -> Result<(), CodeGenError> {
        match stmt.op {
            Opcode::Mov => self.gen_mov(&stmt.src0, &stmt.dst)?,

            Opcode::Load => self.gen_load(stmt)?,
            Opcode::Store => self.gen_store(stmt)?,

            Opcode::Add | Opcode::Sub => {
                let temp = reg(REG_TEMP, Type::Int);
                self.gen_mov(&stmt.src0, &temp)?;
                let mnemonic = if stmt.op == Opcode::Add { "add" } else { "sub" };
                writeln!(
                    self.output,
                    "{} {}, {}",
                    mnemonic,
                    self.operand(&stmt.src1),
                    self.operand(&temp)
                )?;
                self.gen_mov(&temp, &stmt.dst)?;
            }

            Opcode::Mul | Opcode::Div | Opcode::Mod => {
                let ret = reg(REG_RET, Type::Int);
                let out = reg(REG_OUTPUT, Type::Int);
                let temp = reg(REG_TEMP, Type::Int);

                if stmt.op == Opcode::Mul {
                    // clear the high half that imul spills into
                    writeln!(
                        self.output,
                        "xor {}, {}",
                        self.operand(&out),
                        self.operand(&out)
                    )?;
                }
                self.gen_mov(&stmt.src0, &ret)?;
                if stmt.op != Opcode::Mul {
                    writeln!(self.output, "{}", self.target.sign_extend)?;
                }
                // the divisor may not be an immediate or memory operand
                self.gen_mov(&stmt.src1, &temp)?;
                let mnemonic = if stmt.op == Opcode::Mul { "imul" } else { "idiv" };
                writeln!(self.output, "{} {}", mnemonic, self.operand(&temp))?;

                let result = if stmt.op == Opcode::Mod { out } else { ret };
                self.gen_mov(&result, &stmt.dst)?;
            }

            Opcode::Call => {
                let overflow_bytes = self.gen_param_push()?;
                writeln!(self.output, "call {}", label_text(&stmt.src0))?;
                if overflow_bytes > 0 {
                    writeln!(self.output, "add ${}, {}", overflow_bytes, self.target.stack)?;
                }
                if stmt.has_src1() {
                    let ret = if stmt.src1.is_double() {
                        reg(REG_DOUBLE_RET, Type::Double)
                    } else {
                        reg(REG_RET, Type::Int)
                    };
                    self.gen_mov(&ret, &stmt.src1)?;
                }
            }

            Opcode::FBegin => {
                writeln!(self.output, ".global {}", label_text(&stmt.src0))?;
                writeln!(self.output, "{}:", label_text(&stmt.src0))?;
                writeln!(self.output, "enter ${}, $0", stmt.info)?;
                self.next_int_param = 0;
                self.next_double_param = 0;
                self.next_stack_param = 0;
            }

            Opcode::FEnd => {}

            Opcode::Return => {
                if stmt.has_src0() {
                    let ret = if stmt.src0.is_double() {
                        reg(REG_DOUBLE_RET, Type::Double)
                    } else {
                        reg(REG_RET, Type::Int)
                    };
                    self.gen_mov(&stmt.src0, &ret)?;
                }
                writeln!(self.output, "leave")?;
                writeln!(self.output, "ret")?;
            }

            Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                self.gen_comparison(stmt)?;
            }

            Opcode::And | Opcode::Or => {
                let temp = reg(REG_TEMP, Type::Int);
                // the second operand may not be an immediate or memory
                self.gen_mov(&stmt.src1, &temp)?;
                let mnemonic = if stmt.op == Opcode::And { "and" } else { "or" };
                writeln!(
                    self.output,
                    "{} {}, {}",
                    mnemonic,
                    self.operand(&stmt.src0),
                    self.operand(&temp)
                )?;
                self.gen_mov(&temp, &stmt.dst)?;
            }

            Opcode::Not => {
                let temp = reg(REG_TEMP, Type::Int);
                self.gen_mov(&stmt.src1, &temp)?;
                // bitwise invert, then keep the boolean bit
                writeln!(self.output, "not {}", self.operand(&temp))?;
                writeln!(self.output, "and $1, {}", self.operand(&temp))?;
                self.gen_mov(&temp, &stmt.dst)?;
            }

            Opcode::Label => writeln!(self.output, "{}:", label_text(&stmt.src0))?,

            Opcode::Jump => writeln!(self.output, "jmp {}", label_text(&stmt.src0))?,

            Opcode::IfZ | Opcode::IfNZ => {
                if stmt.src0.is_literal() {
                    // stage the immediate through the scratch register
                    let temp = reg(REG_TEMP, Type::Int);
                    self.gen_mov(&stmt.src0, &temp)?;
                    writeln!(self.output, "cmp $0, {}", self.operand(&temp))?;
                } else {
                    writeln!(self.output, "cmp $0, {}", self.operand(&stmt.src0))?;
                }
                let jump = if stmt.op == Opcode::IfZ { "jz" } else { "jnz" };
                writeln!(self.output, "{} {}", jump, label_text(&stmt.src1))?;
            }

            Opcode::Param => self.pending_params.push(stmt.src0.clone()),

            Opcode::GetParam => self.gen_get_param(stmt)?,

            Opcode::String => {
                writeln!(self.output, "{}:", label_text(&stmt.src0))?;
                writeln!(self.output, ".string \"{}\"", label_text(&stmt.src1))?;
            }

            Opcode::Double => {
                writeln!(self.output, "{}:", label_text(&stmt.src0))?;
                if let TacArg::DoubleLit(value) = stmt.src1 {
                    writeln!(self.output, ".double {}", format_double(value))?;
                }
            }

            Opcode::Global => {
                // zero-initialized storage lands in bss
                writeln!(
                    self.output,
                    ".lcomm {},{}",
                    label_text(&stmt.src0),
                    stmt.info
                )?;
            }

            // Noop and anything unexpected emit nothing
            _ => {}
        }
        Ok(())
    }

    /// Move between two operands, staging memory-to-memory transfers
    /// through the scratch register and switching to `movsd` when either
    /// side is a double.
    fn gen_mov(&mut self, src: &TacArg, dst: &TacArg) -> Result<(), CodeGenError> {
        if src.is_double() || dst.is_double() {
            return self.gen_mov_double(src, dst);
        }
        if src.is_memory() && dst.is_memory() {
            let temp = reg(REG_TEMP, Type::Int);
            writeln!(
                self.output,
                "{} {}, {}",
                self.target.mov,
                self.operand(src),
                self.operand(&temp)
            )?;
            writeln!(
                self.output,
                "{} {}, {}",
                self.target.mov,
                self.operand(&temp),
                self.operand(dst)
            )?;
        } else {
            writeln!(
                self.output,
                "{} {}, {}",
                self.target.mov,
                self.operand(src),
                self.operand(dst)
            )?;
        }
        Ok(())
    }

    fn gen_mov_double(&mut self, src: &TacArg, dst: &TacArg) -> Result<(), CodeGenError> {
        let direct = matches!(src, TacArg::Reg { .. }) || matches!(dst, TacArg::Reg { .. });
        if direct {
            writeln!(
                self.output,
                "movsd {}, {}",
                self.double_operand(src),
                self.double_operand(dst)
            )?;
        } else {
            let temp = reg(target::REG_DOUBLE_TEMP, Type::Double);
            writeln!(
                self.output,
                "movsd {}, {}",
                self.double_operand(src),
                self.double_operand(&temp)
            )?;
            writeln!(
                self.output,
                "movsd {}, {}",
                self.double_operand(&temp),
                self.double_operand(dst)
            )?;
        }
        Ok(())
    }

    /// `cmp` + `setcc` + `movzb`, result normalized to 0/1.
    fn gen_comparison(&mut self, stmt: &Tac) -> Result<(), CodeGenError> {
        let ret = reg(REG_RET, Type::Int);
        let ret_byte = reg(REG_RET_BYTE, Type::Int);
        let temp = reg(REG_TEMP, Type::Int);

        writeln!(
            self.output,
            "xor {}, {}",
            self.operand(&ret),
            self.operand(&ret)
        )?;
        // the first operand may not be an immediate or memory operand
        self.gen_mov(&stmt.src0, &temp)?;
        writeln!(
            self.output,
            "cmp {}, {}",
            self.operand(&stmt.src1),
            self.operand(&temp)
        )?;

        let setcc = match stmt.op {
            Opcode::Eq => "sete",
            Opcode::Ne => "setne",
            Opcode::Lt => "setl",
            Opcode::Le => "setle",
            Opcode::Gt => "setg",
            Opcode::Ge => "setge",
            _ => return Err(CodeGenError::Logic("comparison opcode expected".into())),
        };
        writeln!(self.output, "{} {}", setcc, self.operand(&ret_byte))?;
        writeln!(
            self.output,
            "movzb {}, {}",
            self.operand(&ret_byte),
            self.operand(&ret)
        )?;
        self.gen_mov(&ret, &stmt.dst)
    }

    /// Runtime bounds check against the array length in `info`. Only
    /// non-literal indices reach this; literal indices were range-checked
    /// during analysis. The unsigned compare also catches negatives.
    fn gen_bounds_check(&mut self, count: i64, line: usize) -> Result<(), CodeGenError> {
        let index = self.target.reg_name(REG_INDEX);
        let ok_label = format!(".LBC{}", self.bounds_counter);
        self.bounds_counter += 1;

        writeln!(self.output, "cmp ${}, {}", count, index)?;
        writeln!(self.output, "jb {}", ok_label)?;
        let mov = self.target.mov;
        writeln!(self.output, "{} $.BOUNDSMSG, {}", mov, self.target.reg_name(target::REG_INT_PARAM0))?;
        writeln!(self.output, "{} $.DCFFILE, {}", mov, self.target.reg_name(target::REG_INT_PARAM0 + 1))?;
        writeln!(self.output, "{} ${}, {}", mov, line, self.target.reg_name(target::REG_INT_PARAM0 + 2))?;
        writeln!(self.output, "{} $0, {}", mov, self.target.reg_name(REG_RET))?;
        writeln!(self.output, "call printf")?;
        writeln!(self.output, "{} $1, {}", mov, self.target.reg_name(target::REG_INT_PARAM0))?;
        writeln!(self.output, "call exit")?;
        writeln!(self.output, "{}:", ok_label)?;
        Ok(())
    }

    /// `*[base + index] -> dst`
    fn gen_load(&mut self, stmt: &Tac) -> Result<(), CodeGenError> {
        let index_reg = reg(REG_INDEX, Type::Int);
        let temp = reg(REG_TEMP, Type::Int);
        let base = label_text(&stmt.src0);

        if let Some(index) = stmt.src1.as_int() {
            writeln!(
                self.output,
                "{} {}+{}, {}",
                self.target.mov,
                base,
                index as usize * self.target.scale,
                self.operand(&temp)
            )?;
        } else {
            self.gen_mov(&stmt.src1, &index_reg)?;
            self.gen_bounds_check(stmt.info, stmt.line)?;
            writeln!(
                self.output,
                "{} {}(,{},{}), {}",
                self.target.mov,
                base,
                self.target.reg_name(REG_INDEX),
                self.target.scale,
                self.operand(&temp)
            )?;
        }
        self.gen_mov(&temp, &stmt.dst)
    }

    /// `src0 -> *[base + index]`
    fn gen_store(&mut self, stmt: &Tac) -> Result<(), CodeGenError> {
        let index_reg = reg(REG_INDEX, Type::Int);
        let temp = reg(REG_TEMP, Type::Int);
        let base = label_text(&stmt.src1);

        self.gen_mov(&stmt.src0, &temp)?;

        if let Some(index) = stmt.dst.as_int() {
            writeln!(
                self.output,
                "{} {}, {}+{}",
                self.target.mov,
                self.operand(&temp),
                base,
                index as usize * self.target.scale
            )?;
        } else {
            self.gen_mov(&stmt.dst, &index_reg)?;
            self.gen_bounds_check(stmt.info, stmt.line)?;
            writeln!(
                self.output,
                "{} {}, {}(,{},{})",
                self.target.mov,
                self.operand(&temp),
                base,
                self.target.reg_name(REG_INDEX),
                self.target.scale
            )?;
        }
        Ok(())
    }

    /// Assign buffered call arguments: leading integers and doubles into
    /// their parameter registers, the rest pushed in reverse order with
    /// 16-byte alignment padding. Returns the overflow bytes the caller
    /// must reclaim after the call.
    fn gen_param_push(&mut self) -> Result<usize, CodeGenError> {
        let params = std::mem::take(&mut self.pending_params);
        let mut overflow = Vec::new();

        if self.target.register_params {
            let mut next_int = 0;
            let mut next_double = 0;
            for param in &params {
                if param.is_double() {
                    if next_double < NUM_DOUBLE_PARAM_REGS {
                        self.gen_mov(param, &double_param_reg(next_double))?;
                        next_double += 1;
                    } else {
                        overflow.push(param.clone());
                    }
                } else if next_int < NUM_INT_PARAM_REGS {
                    self.gen_mov(param, &int_param_reg(next_int))?;
                    next_int += 1;
                } else {
                    overflow.push(param.clone());
                }
            }
        } else {
            overflow = params;
        }

        if overflow.is_empty() {
            return Ok(0);
        }

        let mut pushed = overflow.len();
        if overflow.len() % 2 == 1 {
            // keep the stack 16-byte aligned at the call
            writeln!(self.output, "push $0")?;
            pushed += 1;
        }
        for param in overflow.iter().rev() {
            writeln!(self.output, "push {}", self.operand(param))?;
        }
        Ok(pushed * 8)
    }

    fn gen_get_param(&mut self, stmt: &Tac) -> Result<(), CodeGenError> {
        let on_stack = if self.target.register_params {
            if stmt.src0.is_double() {
                if self.next_double_param < NUM_DOUBLE_PARAM_REGS {
                    let src = double_param_reg(self.next_double_param);
                    self.gen_mov(&src, &stmt.src0)?;
                    self.next_double_param += 1;
                    false
                } else {
                    true
                }
            } else if self.next_int_param < NUM_INT_PARAM_REGS {
                let src = int_param_reg(self.next_int_param);
                self.gen_mov(&src, &stmt.src0)?;
                self.next_int_param += 1;
                false
            } else {
                true
            }
        } else {
            true
        };

        if on_stack {
            let temp = reg(REG_TEMP, Type::Int);
            let offset = self.next_stack_param * 8 + 16;
            writeln!(
                self.output,
                "{} {}({}), {}",
                self.target.mov,
                offset,
                self.target.frame,
                self.operand(&temp)
            )?;
            self.gen_mov(&temp, &stmt.src0)?;
            self.next_stack_param += 1;
        }
        Ok(())
    }

    /// Render one operand: `$` immediates, frame-relative locals, plain
    /// symbol names for globals, register names from the target table.
    fn operand(&self, arg: &TacArg) -> String {
        match arg {
            TacArg::IntLit(v) => format!("${}", v),
            TacArg::BoolLit(b) => format!("${}", *b as i64),
            TacArg::DoubleLit(v) => format!("${}", v),
            TacArg::StrLit(s) => format!("${}", s),
            TacArg::Label(name) => format!("${}", name),
            TacArg::Ident(id) => {
                if id.global {
                    id.name.clone()
                } else {
                    format!("-{}({})", id.addr + 8, self.target.frame)
                }
            }
            TacArg::Reg { idx, .. } => self.target.reg_name(*idx).to_string(),
            TacArg::Unused => String::new(),
        }
    }

    /// Double operands address interned labels through `%rip`.
    fn double_operand(&self, arg: &TacArg) -> String {
        match arg {
            TacArg::Label(name) => format!("{}(%rip)", name),
            _ => self.operand(arg),
        }
    }
}

/// Bare text of a label or symbol operand.
fn label_text(arg: &TacArg) -> &str {
    match arg {
        TacArg::Label(name) => name,
        TacArg::Ident(id) => &id.name,
        TacArg::StrLit(s) => s,
        _ => "",
    }
}

/// `.double` literals always carry a decimal point.
fn format_double(value: f64) -> String {
    if value == value.trunc() && value.is_finite() {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
