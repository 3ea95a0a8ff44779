//! TAC lowering
//!
//! A single visitor pass over the analyzed AST that appends a flat
//! sequence of TAC statements to the traversal context. Lowering assumes
//! analysis succeeded; names resolve through the same scope stack the
//! analyzer used, and every value-producing expression carries its result
//! identifier.
//!
//! Short-circuit evaluation exists only at `if` conditions: an `&&` or
//! `||` condition lowers its operands around conditional branches so the
//! right operand is never evaluated when the left decides. Everywhere
//! else the logical operators evaluate both sides and produce a 0/1
//! value.

use crate::ast::{
    Block, ClassDecl, Expr, ExprKind, FieldDecl, MethodDecl, Program, Stmt, StmtKind,
};
use crate::context::TravCtx;
use crate::symtab::SLOT_SIZE;
use crate::tac::{Tac, TacArg};
use crate::types::{AssignOp, BinaryOp, BooleanOp, Opcode, Type};

/// Lower the whole program, then append the interned string and double
/// constants to the stream.
pub fn lower(program: &mut Program, ctx: &mut TravCtx) {
    let table = std::mem::take(&mut program.symbols);
    ctx.push_scope(table);

    for field in &program.fields {
        lower_field(field, ctx);
    }
    for method in &mut program.methods {
        lower_method(method, ctx);
    }
    for class in &mut program.classes {
        lower_class(class, ctx);
    }

    program.symbols = ctx.pop_scope();
    ctx.emit_interned_data();
}

fn lower_field(field: &FieldDecl, ctx: &mut TravCtx) {
    let Some(symbol) = ctx.lookup(&field.name.name) else {
        return;
    };
    let count = symbol.count;
    let mut tac = Tac::new(Opcode::Global, field.pos.line);
    tac.src0 = TacArg::ident(field.name.name.clone(), field.ty, 0, true);
    tac.info = (count * SLOT_SIZE) as i64;
    ctx.append(tac);
}

fn lower_class(class: &mut ClassDecl, ctx: &mut TravCtx) {
    let table = std::mem::take(&mut class.symbols);
    ctx.push_scope(table);

    for field in &class.fields {
        lower_field(field, ctx);
    }
    for method in &mut class.methods {
        lower_method(method, ctx);
    }

    class.symbols = ctx.pop_scope();
}

fn lower_method(method: &mut MethodDecl, ctx: &mut TravCtx) {
    let table = std::mem::take(&mut method.symbols);
    ctx.push_scope(table);

    let mut begin = Tac::new(Opcode::FBegin, method.pos.line);
    begin.src0 = TacArg::label(method.name.clone());
    begin.info = method.frame_size as i64;
    ctx.append(begin);

    // materialize incoming arguments into their frame slots
    for (i, arg) in method.args.iter().enumerate() {
        let mut get = Tac::new(Opcode::GetParam, arg.pos.line);
        get.src0 = ident_arg(&arg.names[0].name, ctx);
        get.info = i as i64;
        ctx.append(get);
    }

    lower_block(&mut method.body, ctx);

    let mut end = Tac::new(Opcode::FEnd, method.pos.line);
    end.src0 = TacArg::label(method.name.clone());
    ctx.append(end);

    method.symbols = ctx.pop_scope();
}

fn lower_block(block: &mut Block, ctx: &mut TravCtx) {
    let table = std::mem::take(&mut block.symbols);
    ctx.push_scope(table);

    // declared locals start from a known zero value
    for decl in &block.decls {
        for name in &decl.names {
            let src = match decl.ty {
                Type::Int | Type::Char => TacArg::IntLit(0),
                Type::Bool => TacArg::BoolLit(false),
                Type::Double => {
                    let label = ctx.intern_double(0.0);
                    TacArg::label(label)
                }
                _ => continue,
            };
            let mut init = Tac::new(Opcode::Mov, name.pos.line);
            init.src0 = src;
            init.dst = ident_arg(&name.name, ctx);
            ctx.append(init);
        }
    }

    for stmt in &mut block.stmts {
        lower_stmt(stmt, ctx);
    }

    block.symbols = ctx.pop_scope();
}

fn lower_stmt(stmt: &mut Stmt, ctx: &mut TravCtx) {
    let line = stmt.pos.line;
    match &mut stmt.kind {
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => lower_if(cond, then_block, else_block.as_mut(), line, ctx),

        StmtKind::For {
            var,
            init,
            end,
            body,
            symbols,
            labels,
            end_temp,
            diff_temp,
        } => {
            let table = std::mem::take(symbols);
            ctx.push_scope(table);

            lower_expr(init, ctx);
            let init_op = operand_of(init, ctx);
            let loop_var = ident_arg(&var.name, ctx);
            let mut mov = Tac::new(Opcode::Mov, line);
            mov.src0 = init_op;
            mov.dst = loop_var.clone();
            ctx.append(mov);

            lower_expr(end, ctx);
            let end_op = operand_of(end, ctx);
            let end_var = ident_arg(end_temp, ctx);
            let mut mov = Tac::new(Opcode::Mov, line);
            mov.src0 = end_op;
            mov.dst = end_var.clone();
            ctx.append(mov);

            append_label(&labels.top, line, ctx);

            let diff_var = ident_arg(diff_temp, ctx);
            let mut sub = Tac::new(Opcode::Sub, line);
            sub.src0 = end_var;
            sub.src1 = loop_var.clone();
            sub.dst = diff_var.clone();
            ctx.append(sub);

            let mut ifz = Tac::new(Opcode::IfZ, line);
            ifz.src0 = diff_var;
            ifz.src1 = TacArg::label(labels.end.clone());
            ctx.append(ifz);

            lower_block(body, ctx);

            append_label(&labels.cont, line, ctx);

            let mut inc = Tac::new(Opcode::Add, line);
            inc.src0 = loop_var.clone();
            inc.src1 = TacArg::IntLit(1);
            inc.dst = loop_var;
            ctx.append(inc);

            append_jump(&labels.top, line, ctx);
            append_label(&labels.end, line, ctx);

            *symbols = ctx.pop_scope();
        }

        StmtKind::While { cond, body, labels } => {
            append_label(&labels.top, line, ctx);

            lower_expr(cond, ctx);
            let mut ifz = Tac::new(Opcode::IfZ, line);
            ifz.src0 = operand_of(cond, ctx);
            ifz.src1 = TacArg::label(labels.end.clone());
            ctx.append(ifz);

            lower_block(body, ctx);

            append_label(&labels.cont, line, ctx);
            append_jump(&labels.top, line, ctx);
            append_label(&labels.end, line, ctx);
        }

        StmtKind::DoWhile { body, cond, labels } => {
            // condition evaluates at the bottom; the body always runs once
            append_label(&labels.top, line, ctx);
            lower_block(body, ctx);
            append_label(&labels.cont, line, ctx);

            lower_expr(cond, ctx);
            let mut ifnz = Tac::new(Opcode::IfNZ, line);
            ifnz.src0 = operand_of(cond, ctx);
            ifnz.src1 = TacArg::label(labels.top.clone());
            ctx.append(ifnz);

            append_label(&labels.end, line, ctx);
        }

        StmtKind::Break { target } | StmtKind::Goto { label: target } => {
            append_jump(target, line, ctx);
        }
        StmtKind::Continue { target } => {
            append_jump(target, line, ctx);
        }
        StmtKind::Label { label } => {
            append_label(label, line, ctx);
        }

        StmtKind::Return { value } => {
            let mut tac = Tac::new(Opcode::Return, line);
            if let Some(value) = value {
                lower_expr(value, ctx);
                tac.src0 = operand_of(value, ctx);
            }
            ctx.append(tac);
        }

        StmtKind::Expr(expr) => lower_expr(expr, ctx),
        StmtKind::Block(block) => lower_block(block, ctx),
    }
}

/// The if template:
///
/// ```text
/// <evaluate condition(s), branching to label_false / label_end>
/// label_true:
/// <then body>
/// jmp label_end
/// label_false:
/// <else body>
/// jmp label_end
/// label_end:
/// ```
fn lower_if(
    cond: &mut Expr,
    then_block: &mut Block,
    else_block: Option<&mut Block>,
    line: usize,
    ctx: &mut TravCtx,
) {
    let label_true = ctx.new_label();
    let label_false = ctx.new_label();
    let label_end = ctx.new_label();

    let false_target = if else_block.is_some() {
        label_false.clone()
    } else {
        label_end.clone()
    };

    match &mut cond.kind {
        ExprKind::Boolean {
            op: op @ (BooleanOp::And | BooleanOp::Or),
            lhs: Some(lhs),
            rhs,
        } => {
            if *op == BooleanOp::And {
                // a && b: a false skips b entirely
                lower_expr(lhs, ctx);
                let mut ifz = Tac::new(Opcode::IfZ, line);
                ifz.src0 = operand_of(lhs, ctx);
                ifz.src1 = TacArg::label(false_target.clone());
                ctx.append(ifz);

                lower_expr(rhs, ctx);
                let mut ifz = Tac::new(Opcode::IfZ, line);
                ifz.src0 = operand_of(rhs, ctx);
                ifz.src1 = TacArg::label(false_target.clone());
                ctx.append(ifz);
            } else {
                // a || b: a true skips b entirely
                lower_expr(lhs, ctx);
                let mut ifnz = Tac::new(Opcode::IfNZ, line);
                ifnz.src0 = operand_of(lhs, ctx);
                ifnz.src1 = TacArg::label(label_true.clone());
                ctx.append(ifnz);

                lower_expr(rhs, ctx);
                let mut ifz = Tac::new(Opcode::IfZ, line);
                ifz.src0 = operand_of(rhs, ctx);
                ifz.src1 = TacArg::label(false_target.clone());
                ctx.append(ifz);
            }
        }
        _ => {
            lower_expr(cond, ctx);
            let mut ifz = Tac::new(Opcode::IfZ, line);
            ifz.src0 = operand_of(cond, ctx);
            ifz.src1 = TacArg::label(false_target.clone());
            ctx.append(ifz);
        }
    }

    append_label(&label_true, line, ctx);
    lower_block(then_block, ctx);
    append_jump(&label_end, line, ctx);

    if let Some(else_block) = else_block {
        append_label(&label_false, line, ctx);
        lower_block(else_block, ctx);
        append_jump(&label_end, line, ctx);
    }

    append_label(&label_end, line, ctx);
}

fn lower_expr(expr: &mut Expr, ctx: &mut TravCtx) {
    let line = expr.pos.line;
    match &mut expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::CharLit(_)
        | ExprKind::StringLit(_) => {}

        ExprKind::Location { name, index } => {
            // a plain variable produces no code; an element read lowers
            // its index and loads through the bounds-carrying descriptor
            if let Some(index) = index {
                lower_expr(index, ctx);
                let idx_op = operand_of(index, ctx);
                let count = ctx.lookup(&name.name).map_or(0, |s| s.count);

                let mut load = Tac::new(Opcode::Load, line);
                load.src0 = ident_arg(&name.name, ctx);
                load.src1 = idx_op;
                load.dst = result_arg(&expr.result, ctx);
                load.info = count as i64;
                ctx.append(load);
            }
        }

        ExprKind::Binary { op, lhs, rhs } => {
            let opcode = binary_opcode(*op);
            lower_expr(lhs, ctx);
            lower_expr(rhs, ctx);

            let mut tac = Tac::new(opcode, line);
            tac.src0 = operand_of(lhs, ctx);
            tac.src1 = operand_of(rhs, ctx);
            tac.dst = result_arg(&expr.result, ctx);
            ctx.append(tac);
        }

        ExprKind::Boolean { op, lhs, rhs } => {
            let opcode = boolean_opcode(*op);
            if let Some(lhs) = lhs.as_mut() {
                lower_expr(lhs, ctx);
            }
            lower_expr(rhs, ctx);

            let mut tac = Tac::new(opcode, line);
            if let Some(lhs) = lhs {
                tac.src0 = operand_of(lhs, ctx);
            }
            tac.src1 = operand_of(rhs, ctx);
            tac.dst = result_arg(&expr.result, ctx);
            ctx.append(tac);
        }

        ExprKind::Assign { op, lhs, rhs } => {
            let op = *op;
            lower_expr(rhs, ctx);
            let rhs_op = operand_of(rhs, ctx);

            let ExprKind::Location { name, index } = &mut lhs.kind else {
                // rejected during analysis
                return;
            };

            match index {
                None => {
                    let target = ident_arg(&name.name, ctx);
                    let mut tac = match op {
                        AssignOp::Assign => {
                            let mut mov = Tac::new(Opcode::Mov, line);
                            mov.src0 = rhs_op;
                            mov
                        }
                        AssignOp::IncAssign | AssignOp::DecAssign => {
                            let opcode = if op == AssignOp::IncAssign {
                                Opcode::Add
                            } else {
                                Opcode::Sub
                            };
                            let mut tac = Tac::new(opcode, line);
                            tac.src0 = target.clone();
                            tac.src1 = rhs_op;
                            tac
                        }
                    };
                    tac.dst = target;
                    ctx.append(tac);
                }
                Some(index) => {
                    lower_expr(index, ctx);
                    let idx_op = operand_of(index, ctx);
                    let base = ident_arg(&name.name, ctx);
                    let count = ctx.lookup(&name.name).map_or(0, |s| s.count) as i64;
                    let value = result_arg(&lhs.result, ctx);

                    match op {
                        AssignOp::Assign => {
                            let mut mov = Tac::new(Opcode::Mov, line);
                            mov.src0 = rhs_op;
                            mov.dst = value.clone();
                            ctx.append(mov);
                        }
                        AssignOp::IncAssign | AssignOp::DecAssign => {
                            let mut load = Tac::new(Opcode::Load, line);
                            load.src0 = base.clone();
                            load.src1 = idx_op.clone();
                            load.dst = value.clone();
                            load.info = count;
                            ctx.append(load);

                            let opcode = if op == AssignOp::IncAssign {
                                Opcode::Add
                            } else {
                                Opcode::Sub
                            };
                            let mut tac = Tac::new(opcode, line);
                            tac.src0 = value.clone();
                            tac.src1 = rhs_op;
                            tac.dst = value.clone();
                            ctx.append(tac);
                        }
                    }

                    let mut store = Tac::new(Opcode::Store, line);
                    store.src0 = value;
                    store.src1 = base;
                    store.dst = idx_op;
                    store.info = count;
                    ctx.append(store);
                }
            }
        }

        ExprKind::Call { name, args, .. } => {
            for arg in args.iter_mut() {
                lower_expr(arg, ctx);
            }
            for (i, arg) in args.iter().enumerate() {
                let mut param = Tac::new(Opcode::Param, arg.pos.line);
                param.src0 = operand_of(arg, ctx);
                param.info = i as i64;
                ctx.append(param);
            }

            let mut call = Tac::new(Opcode::Call, line);
            call.src0 = TacArg::label(name.name.clone());
            call.src1 = result_arg(&expr.result, ctx);
            ctx.append(call);
        }
    }
}

// ----- helpers -----

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
    }
}

fn boolean_opcode(op: BooleanOp) -> Opcode {
    match op {
        BooleanOp::Eq => Opcode::Eq,
        BooleanOp::Ne => Opcode::Ne,
        BooleanOp::Lt => Opcode::Lt,
        BooleanOp::Le => Opcode::Le,
        BooleanOp::Gt => Opcode::Gt,
        BooleanOp::Ge => Opcode::Ge,
        BooleanOp::And => Opcode::And,
        BooleanOp::Or => Opcode::Or,
        BooleanOp::Not => Opcode::Not,
    }
}

/// Resolve a name through the scope stack into a memory operand.
fn ident_arg(name: &str, ctx: &TravCtx) -> TacArg {
    match ctx.lookup(name) {
        Some(symbol) => TacArg::ident(
            symbol.name.clone(),
            symbol.ty,
            symbol.addr,
            symbol.storage == crate::types::Storage::Global,
        ),
        None => {
            debug_assert!(false, "unresolved name '{}' reached lowering", name);
            TacArg::Unused
        }
    }
}

/// Operand standing for an evaluated expression: the literal itself, a
/// label for interned constants, or the expression's result identifier.
fn operand_of(expr: &Expr, ctx: &mut TravCtx) -> TacArg {
    match &expr.kind {
        ExprKind::IntLit(v) => TacArg::IntLit(*v),
        ExprKind::BoolLit(v) => TacArg::BoolLit(*v),
        ExprKind::CharLit(c) => TacArg::IntLit(*c as i64),
        ExprKind::DoubleLit(v) => TacArg::label(ctx.intern_double(*v)),
        ExprKind::StringLit(s) => TacArg::label(ctx.intern_string(s)),
        _ => match &expr.result {
            Some(name) => ident_arg(name, ctx),
            None => TacArg::Unused,
        },
    }
}

/// An expression's result identifier as a destination operand.
fn result_arg(result: &Option<String>, ctx: &TravCtx) -> TacArg {
    match result {
        Some(name) => ident_arg(name, ctx),
        None => TacArg::Unused,
    }
}

fn append_label(label: &str, line: usize, ctx: &mut TravCtx) {
    let mut tac = Tac::new(Opcode::Label, line);
    tac.src0 = TacArg::label(label);
    ctx.append(tac);
}

fn append_jump(label: &str, line: usize, ctx: &mut TravCtx) {
    let mut tac = Tac::new(Opcode::Jump, line);
    tac.src0 = TacArg::label(label);
    ctx.append(tac);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSink;
    use crate::parser::Parser;
    use crate::semantic;

    fn lower_source(source: &str) -> Vec<Tac> {
        let mut program = Parser::new(source).unwrap().parse().unwrap();
        let mut ctx = TravCtx::new(DiagnosticSink::with_source("t.dcf", source));
        semantic::propagate_types(&mut program, &mut ctx);
        assert!(
            semantic::analyze(&mut program, &mut ctx),
            "analysis failed: {}",
            ctx.diagnostics.render()
        );
        semantic::allocate(&mut program);
        lower(&mut program, &mut ctx);
        ctx.take_statements()
    }

    fn ops(tacs: &[Tac]) -> Vec<Opcode> {
        tacs.iter().map(|t| t.op).collect()
    }

    #[test]
    fn test_method_frame_markers() {
        let tacs = lower_source("void main() { }");
        assert_eq!(tacs[0].op, Opcode::FBegin);
        assert_eq!(tacs[0].src0, TacArg::label("main"));
        let fend = tacs.iter().find(|t| t.op == Opcode::FEnd).unwrap();
        assert_eq!(fend.src0, TacArg::label("main"));
    }

    #[test]
    fn test_arguments_materialize_in_order() {
        let tacs = lower_source("int f(int a, int b) { return a; }\nvoid main() { }");
        let params: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::GetParam).collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].src0.name(), Some("a"));
        assert_eq!(params[0].info, 0);
        assert_eq!(params[1].src0.name(), Some("b"));
        assert_eq!(params[1].info, 1);
    }

    #[test]
    fn test_locals_are_zero_initialized() {
        let tacs = lower_source("void main() { int x; boolean b; }");
        let movs: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::Mov).collect();
        assert_eq!(movs[0].src0, TacArg::IntLit(0));
        assert_eq!(movs[0].dst.name(), Some("x"));
        assert_eq!(movs[1].src0, TacArg::BoolLit(false));
        assert_eq!(movs[1].dst.name(), Some("b"));
    }

    #[test]
    fn test_assignment_lowering() {
        let tacs = lower_source("void main() { int x; int y; x = y; }");
        let mov = tacs
            .iter()
            .filter(|t| t.op == Opcode::Mov)
            .find(|t| t.src0.name() == Some("y"))
            .unwrap();
        assert_eq!(mov.dst.name(), Some("x"));
    }

    #[test]
    fn test_compound_assignment_uses_lhs_twice() {
        let tacs = lower_source("void main() { int x; x += 3; }");
        let add = tacs.iter().find(|t| t.op == Opcode::Add).unwrap();
        assert_eq!(add.src0.name(), Some("x"));
        assert_eq!(add.src1, TacArg::IntLit(3));
        assert_eq!(add.dst.name(), Some("x"));
    }

    #[test]
    fn test_binary_expression_produces_temp() {
        let tacs = lower_source("void main() { int x; x = x + 2; }");
        let add = tacs.iter().find(|t| t.op == Opcode::Add).unwrap();
        assert!(add.dst.is_temp());
        // the temp then moves into x
        let mov = tacs
            .iter()
            .find(|t| t.op == Opcode::Mov && t.dst.name() == Some("x") && t.src0.is_temp())
            .unwrap();
        assert_eq!(mov.src0.name(), add.dst.name());
    }

    #[test]
    fn test_short_circuit_and_shape() {
        let tacs = lower_source(
            "void main() { boolean a; boolean b; int x; \
             if (a && b) { x = 1; } else { x = 2; } }",
        );
        // the condition lowers to two IfZ branches, never an AND statement
        assert!(!tacs.iter().any(|t| t.op == Opcode::And));
        let ifzs: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::IfZ).collect();
        assert_eq!(ifzs.len(), 2);
        assert_eq!(ifzs[0].src0.name(), Some("a"));
        assert_eq!(ifzs[1].src0.name(), Some("b"));
        // both branch to the same false label
        assert_eq!(ifzs[0].src1, ifzs[1].src1);

        // IfZ a, IfZ b, true label, then-body..., jump end, false label,
        // else-body..., jump end, end label
        let if_ops: Vec<Opcode> = ops(&tacs)
            .into_iter()
            .skip_while(|op| *op != Opcode::IfZ)
            .collect();
        assert_eq!(if_ops[0], Opcode::IfZ);
        assert_eq!(if_ops[1], Opcode::IfZ);
        assert_eq!(if_ops[2], Opcode::Label);
    }

    #[test]
    fn test_short_circuit_or_uses_ifnz() {
        let tacs = lower_source(
            "void main() { boolean a; boolean b; int x; if (a || b) { x = 1; } }",
        );
        let ifnz = tacs.iter().find(|t| t.op == Opcode::IfNZ).unwrap();
        assert_eq!(ifnz.src0.name(), Some("a"));
        let ifz = tacs.iter().find(|t| t.op == Opcode::IfZ).unwrap();
        assert_eq!(ifz.src0.name(), Some("b"));
    }

    #[test]
    fn test_logical_as_value_evaluates_both() {
        let tacs = lower_source("void main() { boolean a; boolean b; boolean c; c = a && b; }");
        assert!(tacs.iter().any(|t| t.op == Opcode::And));
    }

    #[test]
    fn test_while_shape() {
        let tacs = lower_source("void main() { int x; while (x > 0) { x -= 1; } }");
        let seq = ops(&tacs);
        // Label(top) ... Gt, IfZ(end), body..., Label(cont), Jump(top), Label(end)
        let top_idx = seq.iter().position(|op| *op == Opcode::Label).unwrap();
        let ifz_idx = seq.iter().position(|op| *op == Opcode::IfZ).unwrap();
        let jump_idx = seq.iter().position(|op| *op == Opcode::Jump).unwrap();
        assert!(top_idx < ifz_idx && ifz_idx < jump_idx);

        let jump = &tacs[jump_idx];
        let top = &tacs[top_idx];
        assert_eq!(jump.src0, top.src0);
    }

    #[test]
    fn test_do_while_condition_at_bottom() {
        let tacs = lower_source("void main() { int x; do { x += 1; } while (x < 10); }");
        let ifnz_idx = tacs.iter().position(|t| t.op == Opcode::IfNZ).unwrap();
        let lt_idx = tacs.iter().position(|t| t.op == Opcode::Lt).unwrap();
        let add_idx = tacs.iter().position(|t| t.op == Opcode::Add).unwrap();
        // body runs before the condition, which branches back to the top
        assert!(add_idx < lt_idx && lt_idx < ifnz_idx);
        let ifnz = &tacs[ifnz_idx];
        let first_label = tacs.iter().find(|t| t.op == Opcode::Label).unwrap();
        assert_eq!(ifnz.src1, first_label.src0);
    }

    #[test]
    fn test_for_shape() {
        let tacs = lower_source("void main() { int x; for (i = 0, 10) { x += i; } }");
        // init and terminating value both land in frame slots
        let movs: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::Mov).collect();
        assert!(movs.iter().any(|t| t.dst.name() == Some("i")));
        // the difference drives the exit test
        let sub = tacs.iter().find(|t| t.op == Opcode::Sub).unwrap();
        assert!(sub.dst.is_temp());
        let ifz = tacs.iter().find(|t| t.op == Opcode::IfZ).unwrap();
        assert_eq!(ifz.src0.name(), sub.dst.name());
        // the increment bumps the loop variable by one
        let inc = tacs
            .iter()
            .find(|t| t.op == Opcode::Add && t.dst.name() == Some("i"))
            .unwrap();
        assert_eq!(inc.src1, TacArg::IntLit(1));
    }

    #[test]
    fn test_break_targets_innermost_loop() {
        let tacs = lower_source(
            "void main() { boolean c; int x; \
             while (c) { for (i = 0, 10) { if (c) { break; } x += 1; } } }",
        );
        // the for loop's end label is the last label the break can reach;
        // find the jump lowered from the break statement (line 1, inside if)
        let for_ifz = tacs
            .iter()
            .find(|t| t.op == Opcode::IfZ && t.src0.is_temp())
            .unwrap();
        let for_end = for_ifz.src1.clone();
        let break_jump = tacs
            .iter()
            .filter(|t| t.op == Opcode::Jump)
            .find(|t| t.src0 == for_end);
        assert!(break_jump.is_some(), "break must jump to the for loop end");
    }

    #[test]
    fn test_array_load_and_store_carry_length() {
        let tacs = lower_source("int a[5];\nvoid main() { int x; x = a[x]; a[x] = 3; }");
        let load = tacs.iter().find(|t| t.op == Opcode::Load).unwrap();
        assert_eq!(load.info, 5);
        assert_eq!(load.src0.name(), Some("a"));
        assert!(load.dst.is_temp());

        let store = tacs.iter().find(|t| t.op == Opcode::Store).unwrap();
        assert_eq!(store.info, 5);
        assert_eq!(store.src1.name(), Some("a"));
        assert!(store.src0.is_temp());
        assert_eq!(store.dst.name(), Some("x"));
    }

    #[test]
    fn test_global_field_emits_allocation() {
        let tacs = lower_source("int a[5];\nint b;\nvoid main() { }");
        let globals: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::Global).collect();
        assert_eq!(globals.len(), 2);
        assert_eq!(globals[0].info, 40);
        assert_eq!(globals[1].info, 8);
    }

    #[test]
    fn test_call_params_and_result() {
        let tacs = lower_source(
            "int f(int a, int b) { return a; }\nvoid main() { int x; x = f(1, x); }",
        );
        let params: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::Param).collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].src0, TacArg::IntLit(1));
        assert_eq!(params[0].info, 0);
        assert_eq!(params[1].src0.name(), Some("x"));
        assert_eq!(params[1].info, 1);

        let call = tacs.iter().find(|t| t.op == Opcode::Call).unwrap();
        assert_eq!(call.src0, TacArg::label("f"));
        assert!(call.src1.is_temp());
    }

    #[test]
    fn test_nested_call_params_emit_after_inner_call() {
        let tacs = lower_source(
            "int g(int a) { return a; }\nint f(int a) { return a; }\n\
             void main() { int x; x = f(g(x)); }",
        );
        let main_start = tacs
            .iter()
            .position(|t| t.op == Opcode::FBegin && t.src0 == TacArg::label("main"))
            .unwrap();
        let calls: Vec<usize> = tacs[main_start..]
            .iter()
            .enumerate()
            .filter(|(_, t)| t.op == Opcode::Call)
            .map(|(i, _)| i + main_start)
            .collect();
        assert_eq!(calls.len(), 2);
        // g is called first; f's param is emitted after g's call completes
        assert_eq!(tacs[calls[0]].src0, TacArg::label("g"));
        assert_eq!(tacs[calls[1]].src0, TacArg::label("f"));
        let f_param = tacs[main_start..]
            .iter()
            .position(|t| t.op == Opcode::Param && t.src0.is_temp())
            .map(|i| i + main_start)
            .unwrap();
        assert!(calls[0] < f_param && f_param < calls[1]);
    }

    #[test]
    fn test_string_interning_is_shared() {
        let tacs = lower_source(
            "void main() { callout(\"printf\", \"hi\"); callout(\"printf\", \"hi\"); }",
        );
        let params: Vec<_> = tacs.iter().filter(|t| t.op == Opcode::Param).collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].src0, params[1].src0);

        // exactly one STRING data statement defines the shared literal
        let defs: Vec<_> = tacs
            .iter()
            .filter(|t| t.op == Opcode::String && t.src1 == TacArg::StrLit("hi".into()))
            .collect();
        assert_eq!(defs.len(), 1);
        assert_eq!(TacArg::label(defs[0].src0.vn_key()), params[0].src0);
    }

    #[test]
    fn test_double_interning_is_shared() {
        let tacs = lower_source("void main() { double d; d = 2.5; d = 2.5; }");
        let defs: Vec<_> = tacs
            .iter()
            .filter(|t| t.op == Opcode::Double && t.src1 == TacArg::DoubleLit(2.5))
            .collect();
        assert_eq!(defs.len(), 1);
    }

    #[test]
    fn test_bounds_and_filename_strings_present() {
        let tacs = lower_source("void main() { }");
        let labels: Vec<String> = tacs
            .iter()
            .filter(|t| t.op == Opcode::String)
            .map(|t| t.src0.vn_key())
            .collect();
        assert!(labels.contains(&".BOUNDSMSG".to_string()));
        assert!(labels.contains(&".DCFFILE".to_string()));
    }

    #[test]
    fn test_frame_size_on_fbegin() {
        let tacs = lower_source("void main() { int x; int y; x = y + 1; }");
        // x, y, and one temp for y + 1
        assert_eq!(tacs[0].op, Opcode::FBegin);
        assert_eq!(tacs[0].info, 24);
    }

    #[test]
    fn test_return_value_lowering() {
        let tacs = lower_source("int f() { return 41 + 1; }\nvoid main() { }");
        let ret = tacs.iter().find(|t| t.op == Opcode::Return).unwrap();
        assert!(ret.src0.is_temp());
    }
}
