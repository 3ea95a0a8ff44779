//! Target register tables and addressing parameters.
//!
//! The x86-64 target follows the System-V AMD64 convention: six integer
//! and eight floating-point parameter registers, 8-byte stack slots.
//! The IA-32 flavor passes every argument on the stack and uses 4-byte
//! scaled addressing; it reuses the same register indices.

use crate::config::TargetArch;
use crate::tac::TacArg;
use crate::types::Type;

// Register indices shared by both targets.
pub const REG_TEMP: usize = 0;
pub const REG_RET: usize = 1;
pub const REG_RET_BYTE: usize = 2;
pub const REG_OUTPUT: usize = 3;
pub const REG_OUTPUT_BYTE: usize = 4;
pub const REG_DOUBLE_TEMP: usize = 5;
pub const REG_DOUBLE_RET: usize = 6;
pub const REG_INDEX: usize = 7;
pub const REG_INT_PARAM0: usize = 8;
pub const REG_DOUBLE_PARAM0: usize = 14;

pub const NUM_INT_PARAM_REGS: usize = 6;
pub const NUM_DOUBLE_PARAM_REGS: usize = 8;

const NUM_REGS: usize = 22;

const X86_64_NAMES: [&str; NUM_REGS] = [
    "%r10",  // temp
    "%rax",  // ret
    "%al",   // ret byte
    "%rdx",  // output
    "%dl",   // output byte
    "%xmm7", // double temp
    "%xmm0", // double ret
    "%rsi",  // index
    // integer parameters
    "%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9",
    // double parameters
    "%xmm0", "%xmm1", "%xmm2", "%xmm3", "%xmm4", "%xmm5", "%xmm6", "%xmm7",
];

const IA32_NAMES: [&str; NUM_REGS] = [
    "%eax",  // temp
    "%eax",  // ret
    "%al",   // ret byte
    "%edx",  // output
    "%dl",   // output byte
    "%xmm7", // double temp
    "%xmm0", // double ret
    "%esi",  // index
    // parameters always travel on the stack
    "---", "---", "---", "---", "---", "---",
    "---", "---", "---", "---", "---", "---", "---", "---",
];

#[derive(Debug, Clone, Copy)]
pub struct Target {
    names: &'static [&'static str; NUM_REGS],
    /// Integer move mnemonic.
    pub mov: &'static str,
    /// Element scale for indexed addressing.
    pub scale: usize,
    /// Frame base register.
    pub frame: &'static str,
    /// Stack pointer register.
    pub stack: &'static str,
    /// Sign extension before `idiv`.
    pub sign_extend: &'static str,
    /// Whether leading arguments travel in registers.
    pub register_params: bool,
}

impl Target {
    pub fn new(arch: TargetArch) -> Self {
        match arch {
            TargetArch::X86_64 => Target {
                names: &X86_64_NAMES,
                mov: "movq",
                scale: 8,
                frame: "%rbp",
                stack: "%rsp",
                sign_extend: "cqto",
                register_params: true,
            },
            TargetArch::Ia32 => Target {
                names: &IA32_NAMES,
                mov: "movl",
                scale: 4,
                frame: "%ebp",
                stack: "%esp",
                sign_extend: "cltd",
                register_params: false,
            },
        }
    }

    pub fn reg_name(&self, idx: usize) -> &'static str {
        self.names[idx]
    }
}

/// A scratch or parameter register as a TAC operand.
pub fn reg(idx: usize, ty: Type) -> TacArg {
    TacArg::Reg { idx, ty }
}

pub fn int_param_reg(n: usize) -> TacArg {
    reg(REG_INT_PARAM0 + n, Type::Int)
}

pub fn double_param_reg(n: usize) -> TacArg {
    reg(REG_DOUBLE_PARAM0 + n, Type::Double)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x86_64_registers() {
        let target = Target::new(TargetArch::X86_64);
        assert_eq!(target.reg_name(REG_TEMP), "%r10");
        assert_eq!(target.reg_name(REG_RET), "%rax");
        assert_eq!(target.reg_name(REG_INT_PARAM0), "%rdi");
        assert_eq!(target.reg_name(REG_DOUBLE_PARAM0), "%xmm0");
        assert_eq!(target.scale, 8);
        assert!(target.register_params);
    }

    #[test]
    fn test_ia32_registers() {
        let target = Target::new(TargetArch::Ia32);
        assert_eq!(target.mov, "movl");
        assert_eq!(target.frame, "%ebp");
        assert_eq!(target.scale, 4);
        assert!(!target.register_params);
    }
}
