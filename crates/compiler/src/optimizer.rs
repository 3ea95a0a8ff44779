//! TAC stream optimizer
//!
//! Partitions the statement stream into basic blocks, builds a per-
//! function control-flow graph over them, runs the intra-block passes,
//! and reassembles the stream in original block order.
//!
//! A statement leads a new block when it is a `Label` or `FBegin`, or
//! when it follows a `Call`, `Return`, `Jump`, `IfZ` or `IfNZ`. Each
//! `FBegin`-headed block roots one function's control-flow graph.
//!
//! The adjacency matrix is observational (dumped by `--blocks`, never
//! consumed): cell `[n][m]` carries bit 1 when `m` is a successor of `n`
//! and bit 2 when `m` is a predecessor of `n`.

use std::collections::HashSet;

use crate::basic_block::BasicBlock;
use crate::config::OptPasses;
use crate::tac::Tac;
use crate::types::Opcode;

#[derive(Debug, Default)]
pub struct Optimizer {
    blocks: Vec<BasicBlock>,
    statements: Vec<Tac>,
    adjacency: Vec<u8>,
    cfg_roots: Vec<usize>,
}

/// A `Label` starts a new block; so does `FBegin`, which must head its
/// function's root block.
fn is_leader(stmt: &Tac) -> bool {
    matches!(stmt.op, Opcode::Label | Opcode::FBegin)
}

/// Control transfers end a block; their successor starts a new one.
fn is_leader_post(stmt: &Tac) -> bool {
    matches!(
        stmt.op,
        Opcode::Call | Opcode::Return | Opcode::Jump | Opcode::IfZ | Opcode::IfNZ
    )
}

impl Optimizer {
    pub fn new() -> Self {
        Optimizer::default()
    }

    /// Split the stream on leaders and build the CFG adjacency matrix.
    pub fn generate_basic_blocks(&mut self, statements: &[Tac]) {
        self.statements = statements.to_vec();
        self.blocks.clear();

        let mut current = BasicBlock::new();
        for stmt in statements {
            if is_leader(stmt) && !current.is_empty() {
                self.blocks.push(std::mem::take(&mut current));
            }
            current.append(stmt.clone());
            if is_leader_post(stmt) {
                self.blocks.push(std::mem::take(&mut current));
            }
        }
        self.blocks.push(current);

        self.build_cfg();
    }

    fn build_cfg(&mut self) {
        let n_blocks = self.blocks.len();
        self.adjacency = vec![0u8; n_blocks * n_blocks];
        self.cfg_roots.clear();

        for (n, block) in self.blocks.iter().enumerate() {
            let stmts = block.statements();
            let Some(first) = stmts.first() else {
                continue;
            };

            match first.op {
                Opcode::Label => {
                    // predecessors are the blocks branching to this label
                    let label = first.src0.vn_key();
                    let mut found = false;
                    for (nb, other) in self.blocks.iter().enumerate() {
                        if other.uses_label(&label) {
                            self.adjacency[n * n_blocks + nb] |= 2;
                            found = true;
                        }
                    }
                    if !found && n >= 1 {
                        self.adjacency[n * n_blocks + (n - 1)] |= 2;
                    }
                }
                Opcode::FBegin => {
                    self.cfg_roots.push(n);
                }
                _ => {
                    if n >= 1 {
                        self.adjacency[n * n_blocks + (n - 1)] |= 2;
                    }
                }
            }

            let last = stmts.last().expect("non-empty block");
            match last.op {
                Opcode::Jump => {
                    let target = last.src0.vn_key();
                    for (nb, other) in self.blocks.iter().enumerate() {
                        if other.defines_label(&target) {
                            self.adjacency[n * n_blocks + nb] |= 1;
                        }
                    }
                }
                Opcode::IfZ | Opcode::IfNZ => {
                    if n + 1 < n_blocks {
                        self.adjacency[n * n_blocks + (n + 1)] |= 1;
                    }
                    let target = last.src1.vn_key();
                    for (nb, other) in self.blocks.iter().enumerate() {
                        if other.defines_label(&target) {
                            self.adjacency[n * n_blocks + nb] |= 1;
                        }
                    }
                }
                Opcode::Return => {}
                _ => {
                    if n + 1 < n_blocks {
                        self.adjacency[n * n_blocks + (n + 1)] |= 1;
                    }
                }
            }
        }
    }

    /// Run the selected intra-block passes over every block. Each block
    /// receives the set of names referenced by the other blocks so its
    /// dead-code elimination stays conservative across block boundaries.
    pub fn basic_blocks_optimizations(&mut self, which: OptPasses) {
        let referenced: Vec<HashSet<String>> = self
            .blocks
            .iter()
            .map(BasicBlock::referenced_names)
            .collect();

        for (i, block) in self.blocks.iter_mut().enumerate() {
            let mut live_out = HashSet::new();
            for (j, names) in referenced.iter().enumerate() {
                if i != j {
                    live_out.extend(names.iter().cloned());
                }
            }
            block.optimize(which, &live_out);
        }
    }

    /// Cross-block CSE hook: computes every block's definition set per
    /// CFG root and reports the roots. The sets stay available on the
    /// blocks for a future rewrite phase.
    pub fn global_common_subexpression_elimination(&mut self) -> String {
        let mut report = String::new();
        for root in &self.cfg_roots {
            report.push_str(&format!("Root: {}\n", root));
        }
        for block in &mut self.blocks {
            block.generate_definitions();
        }
        report
    }

    /// Reassemble the statement stream from the blocks, in block order.
    pub fn generate_statements(&mut self) {
        self.statements.clear();
        for block in &self.blocks {
            self.statements.extend(block.statements().iter().cloned());
        }
    }

    pub fn optimized_statements(&self) -> &[Tac] {
        &self.statements
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn cfg_roots(&self) -> &[usize] {
        &self.cfg_roots
    }

    /// Successor block indices of block `n`.
    pub fn successors(&self, n: usize) -> Vec<usize> {
        let n_blocks = self.blocks.len();
        (0..n_blocks)
            .filter(|m| self.adjacency[n * n_blocks + m] & 1 != 0)
            .collect()
    }

    /// Human-readable dump of every block plus the CFG matrix.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("---------------------------\n");
        for (n, block) in self.blocks.iter().enumerate() {
            out.push_str(&format!(
                "Block[{}]:  NumStatements: {}\n",
                n,
                block.statements().len()
            ));
            out.push_str(&block.dump());
            out.push_str("---------------------------\n");
        }

        out.push_str("Control Flow Graph Roots: ");
        for root in &self.cfg_roots {
            out.push_str(&format!("{} ", root));
        }
        out.push('\n');

        let n_blocks = self.blocks.len();
        for n in 0..n_blocks {
            if n >= 10 {
                out.push_str(&format!(" {}", n / 10));
            } else {
                out.push_str("  ");
            }
        }
        out.push('\n');
        for n in 0..n_blocks {
            out.push_str(&format!(" {}", n % 10));
        }
        out.push('\n');
        for _ in 0..n_blocks {
            out.push_str("--");
        }
        out.push('\n');
        for n in 0..n_blocks {
            for m in 0..n_blocks {
                out.push_str(&format!(" {}", self.adjacency[n * n_blocks + m]));
            }
            out.push_str(&format!(" | {}\n", n));
        }
        out
    }
}
