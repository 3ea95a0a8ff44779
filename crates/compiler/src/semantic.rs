//! Semantic analysis
//!
//! Three passes over the AST, in order:
//!
//! 1. **propagate**: populate symbol tables from declarations and fill
//!    every expression's type bottom-up. Unresolved names are left
//!    `Unknown` here and reported by the next pass.
//! 2. **analyze**: enforce the typing and structural rules, accumulate
//!    diagnostics without stopping at the first error, mint the result
//!    temporary for every expression consumed as a value, and mint the
//!    control labels for loops so `break`/`continue` can capture them.
//! 3. **allocate**: assign frame offsets. Declared variables are laid out
//!    first in traversal order; temporaries are appended at the end so
//!    their offsets are stable. Records the frame size on each method.
//!
//! Symbol tables are moved out of their owning node onto the context's
//! scope stack while the node is being traversed, and moved back when the
//! traversal leaves it.

use crate::ast::{
    Block, ClassDecl, Expr, ExprKind, FieldDecl, InterfaceDecl, LoopLabels, MethodDecl, Program,
    Stmt, StmtKind, VarDecl,
};
use crate::context::{LoopFrame, TravCtx};
use crate::symtab::{MethodSymbol, SymbolTable, VarSymbol};
use crate::types::{AssignOp, BooleanOp, Storage, Type};

// ---------------------------------------------------------------------------
// Pass 1: type propagation
// ---------------------------------------------------------------------------

pub fn propagate_types(program: &mut Program, ctx: &mut TravCtx) {
    let mut table = std::mem::take(&mut program.symbols);

    for field in &program.fields {
        declare_field(&mut table, field, ctx);
    }
    for method in &program.methods {
        declare_method(&mut table, method, ctx);
    }

    ctx.push_scope(table);
    for method in &mut program.methods {
        propagate_method(method, ctx);
    }
    for class in &mut program.classes {
        propagate_class(class, ctx);
    }
    program.symbols = ctx.pop_scope();
}

/// Add a field to `table`, validating its array size. Idempotent for the
/// same declaration site so repeated propagation stays quiet.
fn declare_field(table: &mut SymbolTable, field: &FieldDecl, ctx: &mut TravCtx) {
    if table
        .get(&field.name.name)
        .is_some_and(|prev| prev.pos == field.pos)
    {
        return;
    }

    let mut count = 1usize;
    if let Some(size) = &field.size {
        match size.as_int_literal() {
            Some(n) if n > 0 => count = n as usize,
            _ => {
                ctx.error(
                    size.pos,
                    format!(
                        "field '{}' array size must be integer greater than zero.",
                        field.name.name
                    ),
                );
                return;
            }
        }
    }

    if let Err(prev) = table.add_variable(&field.name.name, field.ty, count, field.pos) {
        ctx.error(
            field.pos,
            format!(
                "field '{}' of type {} already declared in scope. First declared at line {}.",
                field.name.name, field.ty, prev.line
            ),
        );
    }
}

fn declare_method(table: &mut SymbolTable, method: &MethodDecl, ctx: &mut TravCtx) {
    if table
        .get_method(&method.name)
        .is_some_and(|prev| prev.pos == method.pos)
    {
        return;
    }

    let args = method
        .args
        .iter()
        .map(|arg| VarSymbol {
            name: arg.names[0].name.clone(),
            ty: arg.ty,
            storage: Storage::Local,
            count: 1,
            addr: 0,
            pos: arg.pos,
        })
        .collect();

    let symbol = MethodSymbol {
        name: method.name.clone(),
        return_type: method.return_type,
        args,
        pos: method.pos,
    };
    if let Err(prev) = table.add_method(symbol) {
        ctx.error(
            method.pos,
            format!(
                "method '{}' already declared in scope. First declared at line {}.",
                method.name, prev.line
            ),
        );
    }
}

fn declare_locals(table: &mut SymbolTable, decl: &VarDecl, ctx: &mut TravCtx) {
    for name in &decl.names {
        if table.get(&name.name).is_some_and(|prev| prev.pos == name.pos) {
            continue;
        }
        if let Err(prev) = table.add_variable(&name.name, decl.ty, 1, name.pos) {
            ctx.error(
                name.pos,
                format!(
                    "variable '{}' of type {} already declared in scope. First declared at line {}.",
                    name.name, decl.ty, prev.line
                ),
            );
        }
    }
}

fn propagate_class(class: &mut ClassDecl, ctx: &mut TravCtx) {
    let mut table = std::mem::take(&mut class.symbols);
    for field in &class.fields {
        declare_field(&mut table, field, ctx);
    }
    for method in &class.methods {
        declare_method(&mut table, method, ctx);
    }

    ctx.push_scope(table);
    for method in &mut class.methods {
        propagate_method(method, ctx);
    }
    class.symbols = ctx.pop_scope();
}

fn propagate_method(method: &mut MethodDecl, ctx: &mut TravCtx) {
    let mut table = std::mem::take(&mut method.symbols);
    for arg in &method.args {
        declare_locals(&mut table, arg, ctx);
    }
    ctx.push_scope(table);
    propagate_block(&mut method.body, ctx);
    method.symbols = ctx.pop_scope();
}

fn propagate_block(block: &mut Block, ctx: &mut TravCtx) {
    let mut table = std::mem::take(&mut block.symbols);
    for decl in &block.decls {
        declare_locals(&mut table, decl, ctx);
    }
    ctx.push_scope(table);
    for stmt in &mut block.stmts {
        propagate_stmt(stmt, ctx);
    }
    block.symbols = ctx.pop_scope();
}

fn propagate_stmt(stmt: &mut Stmt, ctx: &mut TravCtx) {
    match &mut stmt.kind {
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            propagate_expr(cond, ctx);
            propagate_block(then_block, ctx);
            if let Some(else_block) = else_block {
                propagate_block(else_block, ctx);
            }
        }
        StmtKind::For {
            var,
            init,
            end,
            body,
            symbols,
            ..
        } => {
            let mut table = std::mem::take(symbols);
            // the loop variable is implicitly an integer in the loop scope
            if !table.get(&var.name).is_some_and(|prev| prev.pos == var.pos)
                && let Err(prev) = table.add_variable(&var.name, Type::Int, 1, var.pos)
            {
                ctx.error(
                    var.pos,
                    format!(
                        "variable '{}' of type {} already declared in scope. First declared at line {}.",
                        var.name,
                        Type::Int,
                        prev.line
                    ),
                );
            }
            ctx.push_scope(table);
            propagate_expr(init, ctx);
            propagate_expr(end, ctx);
            propagate_block(body, ctx);
            *symbols = ctx.pop_scope();
        }
        StmtKind::While { cond, body, .. } => {
            propagate_expr(cond, ctx);
            propagate_block(body, ctx);
        }
        StmtKind::DoWhile { body, cond, .. } => {
            propagate_block(body, ctx);
            propagate_expr(cond, ctx);
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                propagate_expr(value, ctx);
            }
        }
        StmtKind::Expr(expr) => propagate_expr(expr, ctx),
        StmtKind::Block(block) => propagate_block(block, ctx),
        StmtKind::Break { .. }
        | StmtKind::Continue { .. }
        | StmtKind::Goto { .. }
        | StmtKind::Label { .. } => {}
    }
}

fn propagate_expr(expr: &mut Expr, ctx: &mut TravCtx) {
    match &mut expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::CharLit(_)
        | ExprKind::StringLit(_) => {}
        ExprKind::Location { name, index } => {
            if let Some(index) = index {
                propagate_expr(index, ctx);
            }
            if let Some(symbol) = ctx.lookup(&name.name) {
                let (ty, count) = (symbol.ty, symbol.count);
                expr.ty = ty;
                expr.is_array = index.is_none() && count > 1;
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            propagate_expr(lhs, ctx);
            propagate_expr(rhs, ctx);
            if expr.ty == Type::Unknown {
                expr.ty = lhs.ty;
            }
        }
        ExprKind::Boolean { lhs, rhs, .. } => {
            if let Some(lhs) = lhs {
                propagate_expr(lhs, ctx);
            }
            propagate_expr(rhs, ctx);
            if expr.ty == Type::Unknown {
                expr.ty = Type::Bool;
            }
        }
        ExprKind::Assign { lhs, rhs, .. } => {
            lhs.used_as_write = true;
            propagate_expr(lhs, ctx);
            propagate_expr(rhs, ctx);
            if expr.ty == Type::Unknown {
                expr.ty = lhs.ty;
            }
        }
        ExprKind::Call {
            name,
            external,
            args,
        } => {
            for arg in args {
                propagate_expr(arg, ctx);
            }
            if *external {
                // callouts produce an integer result by convention
                if expr.ty == Type::Unknown {
                    expr.ty = Type::Int;
                }
            } else if let Some(symbol) = ctx.lookup_method(&name.name) {
                expr.ty = symbol.return_type;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 2: analyze
// ---------------------------------------------------------------------------

pub fn analyze(program: &mut Program, ctx: &mut TravCtx) -> bool {
    let mut valid = true;

    if !has_entry_point(program) {
        ctx.error(program.pos, "program must contain a method 'main'.");
        valid = false;
    }

    let table = std::mem::take(&mut program.symbols);
    ctx.push_scope(table);

    for method in &mut program.methods {
        if !analyze_method(method, ctx) {
            valid = false;
        }
    }

    let interfaces = &program.interfaces;
    for class in &mut program.classes {
        if !analyze_class(class, interfaces, ctx) {
            valid = false;
        }
    }

    program.symbols = ctx.pop_scope();
    valid
}

/// A valid program has a free `main` taking no parameters and returning
/// void, or a class named `Program` containing one.
fn has_entry_point(program: &Program) -> bool {
    let is_main =
        |m: &MethodDecl| m.name == "main" && m.args.is_empty() && m.return_type == Type::Void;

    program.methods.iter().any(is_main)
        || program
            .classes
            .iter()
            .filter(|c| c.name == "Program")
            .any(|c| c.methods.iter().any(is_main))
}

fn analyze_class(
    class: &mut ClassDecl,
    interfaces: &[InterfaceDecl],
    ctx: &mut TravCtx,
) -> bool {
    let mut valid = true;

    for impl_name in &class.implements {
        let Some(interface) = interfaces.iter().find(|i| i.name == *impl_name) else {
            ctx.error(
                class.pos,
                format!("interface '{}' not declared.", impl_name),
            );
            valid = false;
            continue;
        };
        for proto in &interface.prototypes {
            let implemented = class.methods.iter().any(|m| {
                m.name == proto.name
                    && m.return_type == proto.return_type
                    && m.args.len() == proto.arg_types.len()
                    && m.args.iter().zip(&proto.arg_types).all(|(a, t)| a.ty == *t)
            });
            if !implemented {
                ctx.error(
                    class.pos,
                    format!(
                        "class '{}' does not implement method '{}' of interface '{}'.",
                        class.name, proto.name, interface.name
                    ),
                );
                valid = false;
            }
        }
    }

    let table = std::mem::take(&mut class.symbols);
    ctx.push_scope(table);
    for method in &mut class.methods {
        if !analyze_method(method, ctx) {
            valid = false;
        }
    }
    class.symbols = ctx.pop_scope();
    valid
}

fn analyze_method(method: &mut MethodDecl, ctx: &mut TravCtx) -> bool {
    let table = std::mem::take(&mut method.symbols);
    ctx.push_scope(table);
    let mut valid = analyze_block(&mut method.body, ctx);
    method.symbols = ctx.pop_scope();

    // Check top-level return statements against the declared type.
    let mut return_found = false;
    for stmt in &method.body.stmts {
        if let StmtKind::Return { value } = &stmt.kind {
            let ret_ty = value.as_ref().map_or(Type::Void, |v| v.ty);
            if ret_ty != method.return_type {
                ctx.error(
                    stmt.pos,
                    format!(
                        "incorrect return type. Expected {} but found {}.",
                        method.return_type, ret_ty
                    ),
                );
                valid = false;
            }
            return_found = true;
        }
    }
    if !return_found {
        if method.return_type != Type::Void {
            ctx.error(method.pos, "method must have a return statement.");
            valid = false;
        } else {
            // synthesize the implied return at the end of the body
            method.body.stmts.push(Stmt {
                pos: method.body.pos,
                kind: StmtKind::Return { value: None },
            });
        }
    }

    valid
}

fn analyze_block(block: &mut Block, ctx: &mut TravCtx) -> bool {
    let table = std::mem::take(&mut block.symbols);
    ctx.push_scope(table);
    let mut valid = true;
    for stmt in &mut block.stmts {
        if !analyze_stmt(stmt, ctx) {
            valid = false;
        }
    }
    block.symbols = ctx.pop_scope();
    valid
}

fn analyze_stmt(stmt: &mut Stmt, ctx: &mut TravCtx) -> bool {
    let pos = stmt.pos;
    match &mut stmt.kind {
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            let mut valid = analyze_expr(cond, ctx);
            if !analyze_block(then_block, ctx) {
                valid = false;
            }
            if let Some(else_block) = else_block
                && !analyze_block(else_block, ctx)
            {
                valid = false;
            }
            if cond.ty != Type::Bool {
                ctx.error(
                    pos,
                    format!(
                        "if conditional expression must be of type boolean. Got: {}.",
                        cond.ty
                    ),
                );
                valid = false;
            }
            valid
        }
        StmtKind::For {
            init,
            end,
            body,
            symbols,
            labels,
            end_temp,
            diff_temp,
            ..
        } => {
            *labels = LoopLabels {
                top: ctx.new_label(),
                cont: ctx.new_label(),
                end: ctx.new_label(),
            };

            let table = std::mem::take(symbols);
            ctx.push_scope(table);
            ctx.push_loop(LoopFrame {
                is_for: true,
                labels: labels.clone(),
            });

            let mut valid = analyze_expr(init, ctx);
            if !analyze_expr(end, ctx) {
                valid = false;
            }

            // temps for the terminating value and the iteration difference
            *end_temp = ctx.new_temp();
            *diff_temp = ctx.new_temp();
            if !ctx.add_temp_variable(&end_temp.clone(), Type::Int, pos)
                || !ctx.add_temp_variable(&diff_temp.clone(), Type::Int, pos)
            {
                ctx.error(
                    pos,
                    "Internal compiler error. Failed to add temporary variable to symbol table.",
                );
                valid = false;
            }

            if !analyze_block(body, ctx) {
                valid = false;
            }

            ctx.pop_loop();
            *symbols = ctx.pop_scope();

            if init.ty != Type::Int {
                ctx.error(
                    pos,
                    format!(
                        "for loop initial value expression must be of type integer. Got: {}.",
                        init.ty
                    ),
                );
                valid = false;
            }
            if end.ty != Type::Int {
                ctx.error(
                    pos,
                    format!(
                        "for loop ending value expression must be of type integer. Got: {}.",
                        end.ty
                    ),
                );
                valid = false;
            }
            valid
        }
        StmtKind::While { cond, body, labels } => {
            *labels = LoopLabels {
                top: ctx.new_label(),
                cont: ctx.new_label(),
                end: ctx.new_label(),
            };
            ctx.push_loop(LoopFrame {
                is_for: false,
                labels: labels.clone(),
            });
            let mut valid = analyze_expr(cond, ctx);
            if !analyze_block(body, ctx) {
                valid = false;
            }
            ctx.pop_loop();

            if cond.ty != Type::Bool {
                ctx.error(
                    pos,
                    format!(
                        "while loop expression must be of type boolean. Got: {}.",
                        cond.ty
                    ),
                );
                valid = false;
            }
            valid
        }
        StmtKind::DoWhile { body, cond, labels } => {
            *labels = LoopLabels {
                top: ctx.new_label(),
                cont: ctx.new_label(),
                end: ctx.new_label(),
            };
            ctx.push_loop(LoopFrame {
                is_for: false,
                labels: labels.clone(),
            });
            let mut valid = analyze_block(body, ctx);
            if !analyze_expr(cond, ctx) {
                valid = false;
            }
            ctx.pop_loop();

            if cond.ty != Type::Bool {
                ctx.error(
                    pos,
                    format!(
                        "do-while loop expression must be of type boolean. Got: {}.",
                        cond.ty
                    ),
                );
                valid = false;
            }
            valid
        }
        StmtKind::Break { target } => match ctx.innermost_loop() {
            Some(frame) => {
                *target = frame.labels.end.clone();
                true
            }
            None => {
                ctx.error(pos, "break statement not found in a loop.");
                false
            }
        },
        StmtKind::Continue { target } => match ctx.innermost_for_loop() {
            Some(frame) => {
                *target = frame.labels.cont.clone();
                true
            }
            None => {
                ctx.error(pos, "continue statement not found in a for-loop.");
                false
            }
        },
        StmtKind::Return { value } => match value {
            Some(value) => analyze_expr(value, ctx),
            None => true,
        },
        StmtKind::Expr(expr) => analyze_expr(expr, ctx),
        StmtKind::Block(block) => analyze_block(block, ctx),
        StmtKind::Goto { .. } | StmtKind::Label { .. } => true,
    }
}

fn analyze_expr(expr: &mut Expr, ctx: &mut TravCtx) -> bool {
    let pos = expr.pos;
    match &mut expr.kind {
        ExprKind::IntLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::CharLit(_)
        | ExprKind::StringLit(_) => true,

        ExprKind::Location { name, index } => {
            let mut valid = true;
            let symbol = ctx.lookup(&name.name).map(|s| (s.ty, s.count));
            if symbol.is_none() {
                ctx.error(pos, format!("variable '{}' not declared.", name.name));
                valid = false;
            }

            if let Some(index) = index {
                if !analyze_expr(index, ctx) {
                    valid = false;
                }
                if index.ty != Type::Int {
                    ctx.error(
                        pos,
                        format!(
                            "array '{}' index must be an integer expression. Got: {}.",
                            name.name, index.ty
                        ),
                    );
                    valid = false;
                } else if let (Some(value), Some((_, count))) = (index.as_int_literal(), symbol)
                    && (value < 0 || value as usize >= count)
                {
                    ctx.error(
                        pos,
                        format!(
                            "array '{}' index out of range. Max value: {} but given {}.",
                            name.name, count, value
                        ),
                    );
                    valid = false;
                }

                let temp = ctx.new_temp();
                if !ctx.add_temp_variable(&temp, expr.ty, pos) {
                    ctx.error(
                        pos,
                        "Internal compiler error. Failed to add temporary variable to symbol table.",
                    );
                    valid = false;
                }
                expr.result = Some(temp);
            } else {
                expr.result = Some(name.name.clone());
            }
            valid
        }

        ExprKind::Binary { lhs, rhs, .. } => {
            let mut valid = analyze_expr(lhs, ctx);
            if !analyze_expr(rhs, ctx) {
                valid = false;
            }

            if !lhs.ty.is_numeric() {
                ctx.error(pos, "lhs of binary expression must be of type integer or double.");
                valid = false;
            }
            if lhs.is_array {
                ctx.error(pos, "lhs of binary expression may not be an array name.");
                valid = false;
            }
            if !rhs.ty.is_numeric() {
                ctx.error(pos, "rhs of binary expression must be of type integer or double.");
                valid = false;
            }
            if rhs.is_array {
                ctx.error(pos, "rhs of binary expression may not be an array name.");
                valid = false;
            }
            if valid && lhs.ty != rhs.ty {
                ctx.error(pos, "lhs and rhs of binary expression must have the same type.");
                valid = false;
            }

            if valid {
                let temp = ctx.new_temp();
                if ctx.add_temp_variable(&temp, expr.ty, pos) {
                    expr.result = Some(temp);
                } else {
                    ctx.error(
                        pos,
                        "Internal compiler error. Failed to add temporary variable to symbol table.",
                    );
                    valid = false;
                }
            }
            valid
        }

        ExprKind::Boolean { op, lhs, rhs } => {
            let op = *op;
            let mut valid = true;
            if let Some(lhs) = lhs.as_mut()
                && !analyze_expr(lhs, ctx)
            {
                valid = false;
            }
            if !analyze_expr(rhs, ctx) {
                valid = false;
            }

            if op == BooleanOp::Not {
                if lhs.is_some() {
                    valid = false;
                }
                if rhs.ty != Type::Bool {
                    ctx.error(pos, "rhs of not operator(!) must be of type boolean.");
                    valid = false;
                }
                if rhs.is_array {
                    ctx.error(pos, "rhs of not operator(!) may not be an array name.");
                    valid = false;
                }
            } else if op.is_logical() {
                match lhs {
                    Some(lhs) => {
                        if lhs.ty != Type::Bool {
                            ctx.error(pos, "lhs of logical op must be of type boolean.");
                            valid = false;
                        }
                        if lhs.is_array {
                            ctx.error(pos, "lhs of logical op may not be an array name.");
                            valid = false;
                        }
                    }
                    None => {
                        ctx.error(pos, "boolean operator requires a lhs expression.");
                        valid = false;
                    }
                }
                if rhs.ty != Type::Bool {
                    ctx.error(pos, "rhs of logical op must be of type boolean.");
                    valid = false;
                }
                if rhs.is_array {
                    ctx.error(pos, "rhs of logical op may not be an array name.");
                    valid = false;
                }
            } else {
                // comparison: both sides integer, double or boolean
                if let Some(lhs) = lhs {
                    if !lhs.ty.is_comparable() {
                        ctx.error(
                            pos,
                            "lhs of boolean expression must be of type integer, double or boolean.",
                        );
                        valid = false;
                    }
                    if lhs.is_array {
                        ctx.error(pos, "lhs of boolean expression may not be an array name.");
                        valid = false;
                    }
                }
                if !rhs.ty.is_comparable() {
                    ctx.error(
                        pos,
                        "rhs of boolean expression must be of type integer, double or boolean.",
                    );
                    valid = false;
                }
                if rhs.is_array {
                    ctx.error(pos, "rhs of boolean expression may not be an array name.");
                    valid = false;
                }
            }

            if valid {
                let temp = ctx.new_temp();
                if ctx.add_temp_variable(&temp, Type::Bool, pos) {
                    expr.result = Some(temp);
                } else {
                    ctx.error(
                        pos,
                        "Internal compiler error. Failed to add temporary variable to symbol table.",
                    );
                    valid = false;
                }
            }
            valid
        }

        ExprKind::Assign { op, lhs, rhs } => {
            let op = *op;
            let mut valid = analyze_expr(lhs, ctx);
            if !analyze_expr(rhs, ctx) {
                valid = false;
            }

            if !lhs.is_location() {
                ctx.error(pos, "lhs of assignment operator must be assignable.");
                valid = false;
            }

            if op == AssignOp::Assign {
                if lhs.ty != rhs.ty {
                    ctx.error(pos, "lhs and rhs of assignment operator must be of the same type.");
                    valid = false;
                }
                if lhs.is_array {
                    ctx.error(pos, "lhs of assignment operator may not be an array name.");
                    valid = false;
                }
                if rhs.is_array {
                    ctx.error(pos, "rhs of assignment operator may not be an array name.");
                    valid = false;
                }
            } else {
                if lhs.ty != Type::Int {
                    ctx.error(
                        pos,
                        "lhs of increment/decrement assignment operator must be of type integer.",
                    );
                    valid = false;
                }
                if rhs.ty != Type::Int {
                    ctx.error(
                        pos,
                        "rhs of increment/decrement assignment operator must be of type integer.",
                    );
                    valid = false;
                }
                if lhs.is_array {
                    ctx.error(
                        pos,
                        "lhs of increment/decrement assignment operator may not be an array name.",
                    );
                    valid = false;
                }
                if rhs.is_array {
                    ctx.error(
                        pos,
                        "rhs of increment/decrement assignment operator may not be an array name.",
                    );
                    valid = false;
                }
            }

            // the assignment's value lives wherever the lhs put it
            expr.result = lhs.result.clone();
            valid
        }

        ExprKind::Call {
            name,
            external,
            args,
        } => {
            let mut valid = true;
            for arg in args.iter_mut() {
                if !analyze_expr(arg, ctx) {
                    valid = false;
                }
            }

            if *external {
                if name.name.is_empty() {
                    ctx.error(pos, "invalid external method name.");
                    valid = false;
                }
            } else {
                match ctx.lookup_method(&name.name).cloned() {
                    None => {
                        ctx.error(pos, format!("method '{}' not defined.", name.name));
                        valid = false;
                    }
                    Some(symbol) => {
                        if symbol.args.len() != args.len() {
                            ctx.error(
                                pos,
                                format!("method '{}' incorrect number of arguments.", name.name),
                            );
                            valid = false;
                        } else {
                            for (i, (arg, param)) in args.iter().zip(&symbol.args).enumerate() {
                                if arg.ty != param.ty {
                                    ctx.error(
                                        pos,
                                        format!(
                                            "method '{}' incorrect argument type for argument, {}. \
                                             Expected type {} but given {}.",
                                            name.name, i, param.ty, arg.ty
                                        ),
                                    );
                                    valid = false;
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            if expr.ty != Type::Void {
                let temp = ctx.new_temp();
                if ctx.add_temp_variable(&temp, expr.ty, pos) {
                    expr.result = Some(temp);
                } else {
                    ctx.error(
                        pos,
                        "Internal compiler error. Failed to add temporary variable to symbol table.",
                    );
                    valid = false;
                }
            }
            valid
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 3: allocate
// ---------------------------------------------------------------------------

pub fn allocate(program: &mut Program) {
    for method in &mut program.methods {
        allocate_method(method);
    }
    for class in &mut program.classes {
        for method in &mut class.methods {
            allocate_method(method);
        }
    }
}

/// Lay out one method's frame: arguments first, then locals of every
/// nested scope in traversal order, then all temporaries. The total
/// becomes the method's frame size.
fn allocate_method(method: &mut MethodDecl) {
    let mut next = method.symbols.assign_addresses(0, false);
    next = assign_block_addresses(&mut method.body, next, false);
    next = method.symbols.assign_addresses(next, true);
    next = assign_block_addresses(&mut method.body, next, true);
    method.frame_size = next;
}

fn assign_block_addresses(block: &mut Block, addr: usize, temps: bool) -> usize {
    let mut next = block.symbols.assign_addresses(addr, temps);
    for stmt in &mut block.stmts {
        next = assign_stmt_addresses(stmt, next, temps);
    }
    next
}

fn assign_stmt_addresses(stmt: &mut Stmt, addr: usize, temps: bool) -> usize {
    match &mut stmt.kind {
        StmtKind::If {
            then_block,
            else_block,
            ..
        } => {
            let mut next = assign_block_addresses(then_block, addr, temps);
            if let Some(else_block) = else_block {
                next = assign_block_addresses(else_block, next, temps);
            }
            next
        }
        StmtKind::For { body, symbols, .. } => {
            let next = symbols.assign_addresses(addr, temps);
            assign_block_addresses(body, next, temps)
        }
        StmtKind::While { body, .. } => assign_block_addresses(body, addr, temps),
        StmtKind::DoWhile { body, .. } => assign_block_addresses(body, addr, temps),
        StmtKind::Block(block) => assign_block_addresses(block, addr, temps),
        _ => addr,
    }
}
