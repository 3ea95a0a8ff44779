//! Traversal context
//!
//! One context is threaded through every pass over one compilation unit.
//! It owns the scope stack (tables are moved out of their AST node for
//! the duration of that node's traversal and moved back afterwards), the
//! enclosing-loop stack used by `break`/`continue`, the emitted TAC
//! buffer, the string/double intern tables, the diagnostic sink and the
//! fresh-name counter.

use crate::ast::{LoopLabels, Pos};
use crate::diagnostics::DiagnosticSink;
use crate::symtab::{MethodSymbol, SymbolTable, VarSymbol};
use crate::tac::{Tac, TacArg};
use crate::types::{Opcode, Type};

/// Label of the interned out-of-bounds message.
pub const BOUNDS_MSG_LABEL: &str = ".BOUNDSMSG";
/// Label of the interned source file name.
pub const SOURCE_FILE_LABEL: &str = ".DCFFILE";
/// printf-style payload of the runtime bounds error.
pub const BOUNDS_MSG: &str =
    "*** RUNTIME ERROR ***: Array out of bounds access in file \\\"%s\\\" at line %d.\\n";

/// One enclosing loop, innermost last.
#[derive(Debug, Clone)]
pub struct LoopFrame {
    /// Only for-loops admit `continue`.
    pub is_for: bool,
    pub labels: LoopLabels,
}

pub struct TravCtx {
    scopes: Vec<SymbolTable>,
    loops: Vec<LoopFrame>,
    statements: Vec<Tac>,
    strings: Vec<(String, String)>,
    doubles: Vec<(String, f64)>,
    /// Monotone counter feeding both `.LC<n>` temporaries and `.L<n>`
    /// labels; never reset within a compilation unit.
    name_counter: usize,
    pub diagnostics: DiagnosticSink,
}

impl TravCtx {
    pub fn new(diagnostics: DiagnosticSink) -> Self {
        TravCtx {
            scopes: Vec::new(),
            loops: Vec::new(),
            statements: Vec::new(),
            strings: Vec::new(),
            doubles: Vec::new(),
            name_counter: 0,
            diagnostics,
        }
    }

    // ----- scopes -----

    pub fn push_scope(&mut self, table: SymbolTable) {
        self.scopes.push(table);
    }

    pub fn pop_scope(&mut self) -> SymbolTable {
        self.scopes.pop().expect("scope stack underflow")
    }

    /// Walk the scope stack from innermost outward.
    pub fn lookup(&self, name: &str) -> Option<&VarSymbol> {
        self.scopes.iter().rev().find_map(|t| t.get(name))
    }

    pub fn lookup_method(&self, name: &str) -> Option<&MethodSymbol> {
        self.scopes.iter().rev().find_map(|t| t.get_method(name))
    }

    /// Add a synthesized temporary to the innermost scope. Temp names are
    /// fresh by construction, so a collision is an internal error.
    pub fn add_temp_variable(&mut self, name: &str, ty: Type, pos: Pos) -> bool {
        match self.scopes.last_mut() {
            Some(table) => table.add_variable(name, ty, 1, pos).is_ok(),
            None => false,
        }
    }

    // ----- loops -----

    pub fn push_loop(&mut self, frame: LoopFrame) {
        self.loops.push(frame);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    /// Innermost enclosing loop of any kind, for `break`.
    pub fn innermost_loop(&self) -> Option<&LoopFrame> {
        self.loops.last()
    }

    /// Innermost enclosing for-loop, for `continue`.
    pub fn innermost_for_loop(&self) -> Option<&LoopFrame> {
        self.loops.iter().rev().find(|f| f.is_for)
    }

    // ----- fresh names -----

    pub fn new_temp(&mut self) -> String {
        let name = format!(".LC{}", self.name_counter);
        self.name_counter += 1;
        name
    }

    pub fn new_label(&mut self) -> String {
        let name = format!(".L{}", self.name_counter);
        self.name_counter += 1;
        name
    }

    // ----- TAC buffer -----

    pub fn append(&mut self, stmt: Tac) {
        self.statements.push(stmt);
    }

    pub fn statements(&self) -> &[Tac] {
        &self.statements
    }

    pub fn take_statements(&mut self) -> Vec<Tac> {
        std::mem::take(&mut self.statements)
    }

    // ----- intern tables -----

    /// Label for a string constant; the first definition wins.
    pub fn intern_string(&mut self, value: &str) -> String {
        if let Some((label, _)) = self.strings.iter().find(|(_, v)| v == value) {
            return label.clone();
        }
        let label = self.new_label();
        self.strings.push((label.clone(), value.to_string()));
        label
    }

    /// Label for a double constant; the first definition wins.
    pub fn intern_double(&mut self, value: f64) -> String {
        if let Some((label, _)) = self
            .doubles
            .iter()
            .find(|(_, v)| v.to_bits() == value.to_bits())
        {
            return label.clone();
        }
        let label = self.new_label();
        self.doubles.push((label.clone(), value));
        label
    }

    /// Append the interned data to the TAC stream: one `String` per
    /// interned string, the standard bounds message and source file name,
    /// then one `Double` per interned double.
    pub fn emit_interned_data(&mut self) {
        let strings = std::mem::take(&mut self.strings);
        for (label, value) in &strings {
            let mut tac = Tac::new(Opcode::String, 0);
            tac.src0 = TacArg::label(label.clone());
            tac.src1 = TacArg::StrLit(value.clone());
            self.append(tac);
        }
        self.strings = strings;

        let mut bounds = Tac::new(Opcode::String, 0);
        bounds.src0 = TacArg::label(BOUNDS_MSG_LABEL);
        bounds.src1 = TacArg::StrLit(BOUNDS_MSG.to_string());
        self.append(bounds);

        let mut file = Tac::new(Opcode::String, 0);
        file.src0 = TacArg::label(SOURCE_FILE_LABEL);
        file.src1 = TacArg::StrLit(self.diagnostics.filename().to_string());
        self.append(file);

        let doubles = std::mem::take(&mut self.doubles);
        for (label, value) in &doubles {
            let mut tac = Tac::new(Opcode::Double, 0);
            tac.src0 = TacArg::label(label.clone());
            tac.src1 = TacArg::DoubleLit(*value);
            self.append(tac);
        }
        self.doubles = doubles;
    }

    // ----- diagnostics -----

    pub fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diagnostics.error(pos, message);
    }

    pub fn had_errors(&self) -> bool {
        self.diagnostics.had_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSink;

    fn ctx() -> TravCtx {
        TravCtx::new(DiagnosticSink::new("t.dcf"))
    }

    #[test]
    fn test_counter_is_shared_and_monotone() {
        let mut ctx = ctx();
        assert_eq!(ctx.new_temp(), ".LC0");
        assert_eq!(ctx.new_label(), ".L1");
        assert_eq!(ctx.new_temp(), ".LC2");
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut ctx = ctx();
        let mut outer = SymbolTable::local();
        outer.add_variable("x", Type::Int, 1, Pos::new(1, 1)).unwrap();
        let mut inner = SymbolTable::local();
        inner
            .add_variable("x", Type::Double, 1, Pos::new(2, 1))
            .unwrap();

        ctx.push_scope(outer);
        ctx.push_scope(inner);
        // Innermost declaration shadows the outer one.
        assert_eq!(ctx.lookup("x").unwrap().ty, Type::Double);
        ctx.pop_scope();
        assert_eq!(ctx.lookup("x").unwrap().ty, Type::Int);
    }

    #[test]
    fn test_string_interning_dedupes() {
        let mut ctx = ctx();
        let a = ctx.intern_string("hello");
        let b = ctx.intern_string("world");
        let c = ctx.intern_string("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
    }

    #[test]
    fn test_double_interning_dedupes() {
        let mut ctx = ctx();
        let a = ctx.intern_double(2.5);
        let b = ctx.intern_double(2.5);
        let c = ctx.intern_double(0.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_interned_data_includes_standard_strings() {
        let mut ctx = ctx();
        ctx.intern_string("hi");
        ctx.emit_interned_data();
        let labels: Vec<_> = ctx
            .statements()
            .iter()
            .map(|s| s.src0.vn_key())
            .collect();
        assert!(labels.contains(&BOUNDS_MSG_LABEL.to_string()));
        assert!(labels.contains(&SOURCE_FILE_LABEL.to_string()));
    }

    #[test]
    fn test_innermost_for_loop() {
        let mut ctx = ctx();
        ctx.push_loop(LoopFrame {
            is_for: true,
            labels: LoopLabels {
                top: ".L0".into(),
                cont: ".L1".into(),
                end: ".L2".into(),
            },
        });
        ctx.push_loop(LoopFrame {
            is_for: false,
            labels: LoopLabels {
                top: ".L3".into(),
                cont: ".L4".into(),
                end: ".L5".into(),
            },
        });
        // break targets the while, continue the enclosing for
        assert_eq!(ctx.innermost_loop().unwrap().labels.end, ".L5");
        assert_eq!(ctx.innermost_for_loop().unwrap().labels.cont, ".L1");
    }
}
