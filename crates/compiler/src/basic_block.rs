//! Basic blocks and the intra-block optimizations
//!
//! A block is a maximal single-entry single-exit run of TAC statements.
//! Five classical passes operate on one block at a time, each guarded by
//! a bit in the optimization mask and applied in mask declaration order:
//! constant folding/propagation, algebraic simplification, local value
//! numbering CSE, copy propagation, and dead-code elimination.
//!
//! Passes rewrite statements in place; eliminated statements become
//! `Noop` so positions stay stable within the pass and are dropped when
//! the optimizer reassembles the stream.

use std::collections::{HashMap, HashSet};

use crate::config::{OptPass, OptPasses};
use crate::tac::{Tac, TacArg};
use crate::types::Opcode;

#[derive(Debug, Default)]
pub struct BasicBlock {
    statements: Vec<Tac>,
    /// Names defined by this block; filled by `generate_definitions` for
    /// the global CSE pass.
    definitions: HashSet<String>,
}

impl BasicBlock {
    pub fn new() -> Self {
        BasicBlock::default()
    }

    pub fn append(&mut self, tac: Tac) {
        self.statements.push(tac);
    }

    pub fn statements(&self) -> &[Tac] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn definitions(&self) -> &HashSet<String> {
        &self.definitions
    }

    /// True when this block contains `label:`.
    pub fn defines_label(&self, label: &str) -> bool {
        self.statements
            .iter()
            .any(|t| t.op == Opcode::Label && t.src0.vn_key() == label)
    }

    /// True when this block's final statement transfers control to
    /// `label`.
    pub fn uses_label(&self, label: &str) -> bool {
        let Some(last) = self.statements.last() else {
            return false;
        };
        match last.op {
            Opcode::Jump => last.src0.vn_key() == label,
            Opcode::IfZ | Opcode::IfNZ => last.src1.vn_key() == label,
            _ => false,
        }
    }

    /// Run the selected passes over this block. `live_out` carries the
    /// names referenced by other blocks, so dead-code elimination never
    /// drops a temporary that survives a block boundary.
    pub fn optimize(&mut self, which: OptPasses, live_out: &HashSet<String>) {
        if which.contains(OptPass::ConstantFolding) {
            self.constant_folding();
        }
        if which.contains(OptPass::AlgebraicSimp) {
            self.algebraic_simplification();
        }
        if which.contains(OptPass::Cse) {
            self.local_cse();
        }
        if which.contains(OptPass::CopyProp) {
            self.copy_propagation();
        }
        if which.contains(OptPass::DeadCodeElim) {
            self.dead_code_elimination(live_out);
        }
    }

    /// Statements eligible for the rewriting passes: `dst = src0 op src1`
    /// shapes over scalars.
    fn is_rewritable(op: Opcode) -> bool {
        op.is_binary() || op.is_move() || op.is_logic()
    }

    /// Fold expressions whose operands are known integers and propagate
    /// constants through a per-block table keyed by identifier name.
    fn constant_folding(&mut self) {
        let mut constants: HashMap<String, i64> = HashMap::new();

        for stmt in &mut self.statements {
            if !Self::is_rewritable(stmt.op) {
                continue;
            }
            let Some(dst_name) = stmt.dst.name().map(str::to_string) else {
                continue;
            };

            let src0 = constant_of(&stmt.src0, &constants);
            let src1 = if stmt.has_src1() {
                constant_of(&stmt.src1, &constants)
            } else {
                Some(0)
            };

            let folded = match (src0, src1) {
                (Some(a), Some(b)) => eval_const(stmt.op, a, b),
                _ => None,
            };

            match folded {
                Some(value) => {
                    constants.insert(dst_name, value);
                    let literal = literal_for(&stmt.dst, value);
                    stmt.rewrite_to_mov(literal);
                }
                None => {
                    constants.remove(&dst_name);
                }
            }
        }
    }

    /// Rewrite statements where one side is a neutral or absorbing
    /// element.
    fn algebraic_simplification(&mut self) {
        for stmt in &mut self.statements {
            if !Self::is_rewritable(stmt.op) {
                continue;
            }
            match stmt.op {
                Opcode::Add => {
                    if stmt.src0.is_int_zero() {
                        let src = stmt.src1.clone();
                        stmt.rewrite_to_mov(src);
                    } else if stmt.src1.is_int_zero() {
                        let src = stmt.src0.clone();
                        stmt.rewrite_to_mov(src);
                    }
                }
                Opcode::Sub => {
                    if stmt.src1.is_int_zero() {
                        let src = stmt.src0.clone();
                        stmt.rewrite_to_mov(src);
                    }
                }
                Opcode::Mul => {
                    if stmt.src0.is_int_zero() || stmt.src1.is_int_zero() {
                        stmt.rewrite_to_mov(TacArg::IntLit(0));
                    } else if stmt.src0.is_int_one() {
                        let src = stmt.src1.clone();
                        stmt.rewrite_to_mov(src);
                    } else if stmt.src1.is_int_one() {
                        let src = stmt.src0.clone();
                        stmt.rewrite_to_mov(src);
                    }
                }
                Opcode::Or => {
                    if stmt.src0.is_true() || stmt.src1.is_true() {
                        stmt.rewrite_to_mov(TacArg::BoolLit(true));
                    }
                }
                Opcode::And => {
                    if stmt.src0.is_false() || stmt.src1.is_false() {
                        stmt.rewrite_to_mov(TacArg::BoolLit(false));
                    }
                }
                _ => {}
            }
        }
    }

    /// Local value numbering. Every identifier and literal gets a value
    /// number; expressions are keyed by `(vn_lhs, opcode, vn_rhs)`. When
    /// a key recurs and its first destination was a temporary, the
    /// recomputation becomes a move from that temporary.
    fn local_cse(&mut self) {
        let mut next_vn = 0i32;
        let mut value_numbers: HashMap<String, i32> = HashMap::new();
        let mut expr_values: HashMap<(i32, Opcode, i32), i32> = HashMap::new();
        let mut expr_temps: HashMap<(i32, Opcode, i32), TacArg> = HashMap::new();

        fn vn_of(
            arg: &TacArg,
            value_numbers: &mut HashMap<String, i32>,
            next_vn: &mut i32,
        ) -> i32 {
            *value_numbers.entry(arg.vn_key()).or_insert_with(|| {
                let vn = *next_vn;
                *next_vn += 1;
                vn
            })
        }

        for stmt in &mut self.statements {
            if !Self::is_rewritable(stmt.op) {
                continue;
            }
            let Some(dst_name) = stmt.dst.name().map(str::to_string) else {
                continue;
            };

            let vn0 = vn_of(&stmt.src0, &mut value_numbers, &mut next_vn);
            let vn1 = if stmt.has_src1() {
                vn_of(&stmt.src1, &mut value_numbers, &mut next_vn)
            } else {
                -1
            };
            let key = (vn0, stmt.op, vn1);

            if stmt.dst.is_temp() {
                expr_temps.entry(key).or_insert_with(|| stmt.dst.clone());
            }

            match expr_values.get(&key) {
                None => {
                    let vn = next_vn;
                    next_vn += 1;
                    expr_values.insert(key, vn);
                    value_numbers.insert(dst_name, vn);
                }
                Some(&vn) => {
                    value_numbers.insert(dst_name, vn);
                    if let Some(prior) = expr_temps.get(&key)
                        && prior.name() != stmt.dst.name()
                    {
                        let prior = prior.clone();
                        stmt.rewrite_to_mov(prior);
                    }
                }
            }
        }
    }

    /// Replace uses of a temporary that merely copies a variable with the
    /// variable itself. The mapping dies when the variable is rewritten.
    fn copy_propagation(&mut self) {
        let mut temp_to_var: HashMap<String, TacArg> = HashMap::new();
        let mut var_to_temp: HashMap<String, String> = HashMap::new();

        for stmt in &mut self.statements {
            if !Self::is_rewritable(stmt.op) {
                continue;
            }

            if stmt.src0.is_temp()
                && let Some(mapped) = temp_to_var.get(&stmt.src0.vn_key())
            {
                stmt.src0 = mapped.clone();
            }
            if stmt.has_src1()
                && stmt.src1.is_temp()
                && let Some(mapped) = temp_to_var.get(&stmt.src1.vn_key())
            {
                stmt.src1 = mapped.clone();
            }

            if stmt.dst.is_temp() {
                if stmt.op.is_move() {
                    let dst_name = stmt.dst.vn_key();
                    if let Some(src_name) = stmt.src0.name() {
                        var_to_temp.insert(src_name.to_string(), dst_name.clone());
                    }
                    temp_to_var.insert(dst_name, stmt.src0.clone());
                }
            } else if let Some(dst_name) = stmt.dst.name()
                && let Some(temp) = var_to_temp.remove(dst_name)
            {
                temp_to_var.remove(&temp);
            }
        }
    }

    /// Reverse-scan liveness. A move into a temporary nothing later reads
    /// is erased.
    fn dead_code_elimination(&mut self, live_out: &HashSet<String>) {
        let mut live: HashSet<String> = live_out.clone();

        for stmt in self.statements.iter_mut().rev() {
            if stmt.op == Opcode::Noop {
                continue;
            }

            if stmt.op.is_move()
                && stmt.dst.is_temp()
                && !live.contains(&stmt.dst.vn_key())
            {
                stmt.rewrite_to_noop();
                continue;
            }

            if let Some(written) = written_name(stmt) {
                live.remove(&written);
            }
            for name in read_names(stmt) {
                live.insert(name);
            }
        }
    }

    /// Collect the names this block assigns, for the global CSE pass.
    pub fn generate_definitions(&mut self) {
        self.definitions = self
            .statements
            .iter()
            .filter_map(written_name)
            .collect();
    }

    /// Names this block reads or writes anywhere.
    pub fn referenced_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for stmt in &self.statements {
            names.extend(read_names(stmt));
            if let Some(written) = written_name(stmt) {
                names.insert(written);
            }
        }
        names
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        if !self.statements.is_empty() {
            out.push_str("----Begin----\n");
            for stmt in &self.statements {
                out.push_str(&stmt.to_string());
                out.push('\n');
            }
            out.push_str("----End----\n");
        }
        out
    }
}

/// Identifier name a statement writes, if any.
fn written_name(stmt: &Tac) -> Option<String> {
    let op = stmt.op;
    if op.is_binary() || op.is_logic() || op.is_comparison() || op.is_move()
        || matches!(op, Opcode::Load | Opcode::Not)
    {
        return stmt.dst.name().map(str::to_string);
    }
    match op {
        Opcode::Call => stmt.src1.name().map(str::to_string),
        Opcode::GetParam => stmt.src0.name().map(str::to_string),
        _ => None,
    }
}

/// Identifier names a statement reads.
fn read_names(stmt: &Tac) -> Vec<String> {
    let mut names = Vec::new();
    let mut push = |arg: &TacArg| {
        if let Some(name) = arg.name() {
            names.push(name.to_string());
        }
    };
    match stmt.op {
        // value, base and index are all reads
        Opcode::Store => {
            push(&stmt.src0);
            push(&stmt.src1);
            push(&stmt.dst);
        }
        Opcode::Load => {
            push(&stmt.src0);
            push(&stmt.src1);
        }
        Opcode::Call => {}
        Opcode::GetParam => {}
        Opcode::IfZ | Opcode::IfNZ | Opcode::Param | Opcode::Return => push(&stmt.src0),
        Opcode::Not => push(&stmt.src1),
        _ => {
            push(&stmt.src0);
            push(&stmt.src1);
        }
    }
    names
}

fn constant_of(arg: &TacArg, constants: &HashMap<String, i64>) -> Option<i64> {
    match arg {
        TacArg::IntLit(v) => Some(*v),
        TacArg::BoolLit(b) => Some(*b as i64),
        TacArg::Ident(id) if id.ty == crate::types::Type::Int => {
            constants.get(&id.name).copied()
        }
        _ => None,
    }
}

/// Evaluate a constant expression. Division and modulo by zero are left
/// to the runtime.
fn eval_const(op: Opcode, src0: i64, src1: i64) -> Option<i64> {
    match op {
        Opcode::Add => Some(src0.wrapping_add(src1)),
        Opcode::Sub => Some(src0.wrapping_sub(src1)),
        Opcode::Mul => Some(src0.wrapping_mul(src1)),
        Opcode::Div => (src1 != 0).then(|| src0.wrapping_div(src1)),
        Opcode::Mod => (src1 != 0).then(|| src0.wrapping_rem(src1)),
        Opcode::And => Some(((src0 != 0) && (src1 != 0)) as i64),
        Opcode::Or => Some(((src0 != 0) || (src1 != 0)) as i64),
        Opcode::Mov => Some(src0),
        _ => None,
    }
}

/// A literal of the destination's own type.
fn literal_for(dst: &TacArg, value: i64) -> TacArg {
    match dst {
        TacArg::Ident(id) if id.ty == crate::types::Type::Bool => TacArg::BoolLit(value != 0),
        _ => TacArg::IntLit(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use enumflags2::BitFlags;

    fn temp(name: &str) -> TacArg {
        TacArg::ident(name, Type::Int, 0, false)
    }

    fn var(name: &str) -> TacArg {
        TacArg::ident(name, Type::Int, 0, false)
    }

    fn stmt3(op: Opcode, src0: TacArg, src1: TacArg, dst: TacArg) -> Tac {
        let mut tac = Tac::new(op, 0);
        tac.src0 = src0;
        tac.src1 = src1;
        tac.dst = dst;
        tac
    }

    fn mov(src: TacArg, dst: TacArg) -> Tac {
        let mut tac = Tac::new(Opcode::Mov, 0);
        tac.src0 = src;
        tac.dst = dst;
        tac
    }

    fn block(stmts: Vec<Tac>) -> BasicBlock {
        let mut block = BasicBlock::new();
        for stmt in stmts {
            block.append(stmt);
        }
        block
    }

    fn no_live_out() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_constant_fold_and_dead_code() {
        // Mov 2->t0; Mov 3->t1; Add t0, t1 -> t2; Mov t2 -> x
        let mut b = block(vec![
            mov(TacArg::IntLit(2), temp(".LC0")),
            mov(TacArg::IntLit(3), temp(".LC1")),
            stmt3(Opcode::Add, temp(".LC0"), temp(".LC1"), temp(".LC2")),
            mov(temp(".LC2"), var("x")),
        ]);

        b.optimize(OptPass::ConstantFolding.into(), &no_live_out());
        assert_eq!(b.statements()[2].op, Opcode::Mov);
        assert_eq!(b.statements()[2].src0, TacArg::IntLit(5));

        b.optimize(OptPass::DeadCodeElim.into(), &no_live_out());
        assert_eq!(b.statements()[0].op, Opcode::Noop);
        assert_eq!(b.statements()[1].op, Opcode::Noop);
        assert_eq!(b.statements()[2].op, Opcode::Mov);
        assert_eq!(b.statements()[3].op, Opcode::Mov);
    }

    #[test]
    fn test_constant_propagation_through_variables() {
        // Mov 4->n; Mul n, 2 -> t0
        let mut b = block(vec![
            mov(TacArg::IntLit(4), var("n")),
            stmt3(Opcode::Mul, var("n"), TacArg::IntLit(2), temp(".LC0")),
        ]);
        b.optimize(OptPass::ConstantFolding.into(), &no_live_out());
        assert_eq!(b.statements()[1].op, Opcode::Mov);
        assert_eq!(b.statements()[1].src0, TacArg::IntLit(8));
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        let mut b = block(vec![stmt3(
            Opcode::Div,
            TacArg::IntLit(4),
            TacArg::IntLit(0),
            temp(".LC0"),
        )]);
        b.optimize(OptPass::ConstantFolding.into(), &no_live_out());
        assert_eq!(b.statements()[0].op, Opcode::Div);
    }

    #[test]
    fn test_algebraic_simp_then_copy_prop_then_dce() {
        // Add x, 0 -> t; Mov t -> y
        let mut b = block(vec![
            stmt3(Opcode::Add, var("x"), TacArg::IntLit(0), temp(".LC0")),
            mov(temp(".LC0"), var("y")),
        ]);

        b.optimize(OptPass::AlgebraicSimp.into(), &no_live_out());
        assert_eq!(b.statements()[0].op, Opcode::Mov);
        assert_eq!(b.statements()[0].src0, var("x"));

        b.optimize(
            OptPass::CopyProp | OptPass::DeadCodeElim,
            &no_live_out(),
        );
        assert_eq!(b.statements()[0].op, Opcode::Noop);
        assert_eq!(b.statements()[1].op, Opcode::Mov);
        assert_eq!(b.statements()[1].src0, var("x"));
        assert_eq!(b.statements()[1].dst, var("y"));
    }

    #[test]
    fn test_algebraic_absorbing_elements() {
        let t = |n| temp(n);
        let bool_arg = |name| TacArg::ident(name, Type::Bool, 0, false);
        let mut b = block(vec![
            stmt3(Opcode::Mul, var("a"), TacArg::IntLit(0), t(".LC0")),
            stmt3(Opcode::Or, bool_arg("p"), TacArg::BoolLit(true), t(".LC1")),
            stmt3(Opcode::And, TacArg::BoolLit(false), bool_arg("q"), t(".LC2")),
        ]);
        b.optimize(OptPass::AlgebraicSimp.into(), &no_live_out());
        assert_eq!(b.statements()[0].src0, TacArg::IntLit(0));
        assert_eq!(b.statements()[0].op, Opcode::Mov);
        assert_eq!(b.statements()[1].src0, TacArg::BoolLit(true));
        assert_eq!(b.statements()[2].src0, TacArg::BoolLit(false));
    }

    #[test]
    fn test_local_cse_rewrites_recomputation() {
        // Mul a, b -> t1; Mov t1 -> u; Mul a, b -> t2; Mov t2 -> v
        let mut b = block(vec![
            stmt3(Opcode::Mul, var("a"), var("b"), temp(".LC1")),
            mov(temp(".LC1"), var("u")),
            stmt3(Opcode::Mul, var("a"), var("b"), temp(".LC2")),
            mov(temp(".LC2"), var("v")),
        ]);
        b.optimize(OptPass::Cse.into(), &no_live_out());

        assert_eq!(b.statements()[0].op, Opcode::Mul);
        assert_eq!(b.statements()[2].op, Opcode::Mov);
        assert_eq!(b.statements()[2].src0, temp(".LC1"));
        assert_eq!(b.statements()[2].dst, temp(".LC2"));
        assert_eq!(b.statements()[3].op, Opcode::Mov);
        assert_eq!(b.statements()[3].src0, temp(".LC2"));
    }

    #[test]
    fn test_cse_respects_operand_rewrites() {
        // Mul a, b -> t1; Mov 7 -> a; Mul a, b -> t2 must NOT be reused
        let mut b = block(vec![
            stmt3(Opcode::Mul, var("a"), var("b"), temp(".LC1")),
            mov(TacArg::IntLit(7), var("a")),
            stmt3(Opcode::Mul, var("a"), var("b"), temp(".LC2")),
        ]);
        b.optimize(OptPass::Cse.into(), &no_live_out());
        // `a` was reassigned, so the second Mul keeps computing
        assert_eq!(b.statements()[2].op, Opcode::Mul);
    }

    #[test]
    fn test_copy_propagation_substitutes_uses() {
        // Mov n -> t; Add t, 1 -> t2
        let mut b = block(vec![
            mov(var("n"), temp(".LC0")),
            stmt3(Opcode::Add, temp(".LC0"), TacArg::IntLit(1), temp(".LC1")),
        ]);
        b.optimize(OptPass::CopyProp.into(), &no_live_out());
        assert_eq!(b.statements()[1].src0, var("n"));
    }

    #[test]
    fn test_copy_propagation_invalidated_by_rewrite() {
        // Mov n -> t; Mov 3 -> n; Add t, 1 -> t2: t must keep the old n
        let mut b = block(vec![
            mov(var("n"), temp(".LC0")),
            mov(TacArg::IntLit(3), var("n")),
            stmt3(Opcode::Add, temp(".LC0"), TacArg::IntLit(1), temp(".LC1")),
        ]);
        b.optimize(OptPass::CopyProp.into(), &no_live_out());
        assert_eq!(b.statements()[2].src0, temp(".LC0"));
    }

    #[test]
    fn test_dce_keeps_temp_live_in_other_blocks() {
        let mut b = block(vec![mov(TacArg::IntLit(5), temp(".LC0"))]);
        let live: HashSet<String> = [".LC0".to_string()].into();
        b.optimize(OptPass::DeadCodeElim.into(), &live);
        assert_eq!(b.statements()[0].op, Opcode::Mov);
    }

    #[test]
    fn test_dce_keeps_temps_read_by_params_and_branches() {
        let mut param = Tac::new(Opcode::Param, 0);
        param.src0 = temp(".LC0");
        let mut b = block(vec![mov(var("x"), temp(".LC0")), param]);
        b.optimize(OptPass::DeadCodeElim.into(), &no_live_out());
        assert_eq!(b.statements()[0].op, Opcode::Mov);
    }

    #[test]
    fn test_dce_never_drops_stores_to_variables() {
        let mut b = block(vec![mov(TacArg::IntLit(1), var("x"))]);
        b.optimize(OptPass::DeadCodeElim.into(), &no_live_out());
        assert_eq!(b.statements()[0].op, Opcode::Mov);
    }

    #[test]
    fn test_full_mask_runs_in_order() {
        // Mov 2 -> t0; Add t0, 0 -> t1; Mov t1 -> x
        let mut b = block(vec![
            mov(TacArg::IntLit(2), temp(".LC0")),
            stmt3(Opcode::Add, temp(".LC0"), TacArg::IntLit(0), temp(".LC1")),
            mov(temp(".LC1"), var("x")),
        ]);
        b.optimize(BitFlags::all(), &no_live_out());
        // everything folds into a single live move of the constant
        let survivors: Vec<_> = b
            .statements()
            .iter()
            .filter(|t| t.op != Opcode::Noop)
            .collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].src0, TacArg::IntLit(2));
        assert_eq!(survivors[0].dst, var("x"));
    }

    #[test]
    fn test_generate_definitions() {
        let mut call = Tac::new(Opcode::Call, 0);
        call.src0 = TacArg::label("f");
        call.src1 = temp(".LC3");
        let mut b = block(vec![
            mov(TacArg::IntLit(1), var("x")),
            stmt3(Opcode::Add, var("x"), TacArg::IntLit(1), temp(".LC0")),
            call,
        ]);
        b.generate_definitions();
        assert!(b.definitions().contains("x"));
        assert!(b.definitions().contains(".LC0"));
        assert!(b.definitions().contains(".LC3"));
    }

    #[test]
    fn test_label_queries() {
        let mut label = Tac::new(Opcode::Label, 0);
        label.src0 = TacArg::label(".L1");
        let mut jump = Tac::new(Opcode::Jump, 0);
        jump.src0 = TacArg::label(".L2");
        let b = block(vec![label, jump]);
        assert!(b.defines_label(".L1"));
        assert!(!b.defines_label(".L2"));
        assert!(b.uses_label(".L2"));
        assert!(!b.uses_label(".L1"));
    }
}
