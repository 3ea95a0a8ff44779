//! Per-scope symbol tables
//!
//! Each scope-introducing AST node (program, class, method, block, for
//! loop) owns one table. Insertion order is preserved so that stack
//! offsets assigned by `set_start_address` are stable across runs.

use crate::ast::Pos;
use crate::types::{Storage, Type};

/// Stack slot size in bytes. Every scalar occupies one slot; arrays
/// occupy `count` consecutive slots.
pub const SLOT_SIZE: usize = 8;

/// A variable known to a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct VarSymbol {
    pub name: String,
    pub ty: Type,
    pub storage: Storage,
    /// Array length; 1 for scalars.
    pub count: usize,
    /// Byte offset from the frame base, assigned by `set_start_address`.
    pub addr: usize,
    /// Declaration site, cited by duplicate diagnostics.
    pub pos: Pos,
}

impl VarSymbol {
    /// Compiler temporaries are named `.LC<n>` by the analyzer.
    pub fn is_temp(&self) -> bool {
        self.name.starts_with(".LC")
    }
}

/// A method known to a scope, with its signature for call-site checking.
#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub name: String,
    pub return_type: Type,
    pub args: Vec<VarSymbol>,
    pub pos: Pos,
}

#[derive(Debug)]
pub struct SymbolTable {
    storage: Storage,
    variables: Vec<VarSymbol>,
    methods: Vec<MethodSymbol>,
}

/// Tables are moved out of their AST node while that node's scope is on
/// the context stack; the placeholder left behind is an empty local table.
impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::local()
    }
}

impl SymbolTable {
    /// A table whose variables live in static storage (program and class
    /// scope).
    pub fn global() -> Self {
        SymbolTable {
            storage: Storage::Global,
            variables: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// A table whose variables live on the enclosing frame.
    pub fn local() -> Self {
        SymbolTable {
            storage: Storage::Local,
            variables: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// Add a variable with the given array length. On a duplicate the
    /// position of the first declaration is returned so the caller can
    /// cite it.
    pub fn add_variable(
        &mut self,
        name: &str,
        ty: Type,
        count: usize,
        pos: Pos,
    ) -> Result<(), Pos> {
        if let Some(prev) = self.get(name) {
            return Err(prev.pos);
        }
        self.variables.push(VarSymbol {
            name: name.to_string(),
            ty,
            storage: self.storage,
            count,
            addr: 0,
            pos,
        });
        Ok(())
    }

    /// Add a method signature; duplicates report the first declaration.
    pub fn add_method(&mut self, symbol: MethodSymbol) -> Result<(), Pos> {
        if let Some(prev) = self.get_method(&symbol.name) {
            return Err(prev.pos);
        }
        self.methods.push(symbol);
        Ok(())
    }

    /// Exact-name lookup in this table only.
    pub fn get(&self, name: &str) -> Option<&VarSymbol> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn get_method(&self, name: &str) -> Option<&MethodSymbol> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Bytes needed for every variable in this table.
    pub fn allocation_size(&self) -> usize {
        self.variables.iter().map(|v| SLOT_SIZE * v.count).sum()
    }

    /// Assign increasing byte offsets to this table's variables starting
    /// at `addr`, returning the first unused offset.
    pub fn set_start_address(&mut self, addr: usize) -> usize {
        let mut next = addr;
        for var in &mut self.variables {
            var.addr = next;
            next += SLOT_SIZE * var.count;
        }
        next
    }

    /// Assign offsets to declared variables or to temporaries only.
    /// Declared variables are laid out first across the whole method;
    /// temporaries are appended at the end so their offsets stay stable.
    pub fn assign_addresses(&mut self, addr: usize, temps: bool) -> usize {
        let mut next = addr;
        for var in &mut self.variables {
            if var.is_temp() == temps {
                var.addr = next;
                next += SLOT_SIZE * var.count;
            }
        }
        next
    }

    pub fn variables(&self) -> &[VarSymbol] {
        &self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.methods.is_empty()
    }
}
