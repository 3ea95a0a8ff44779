//! Decaf Compiler Library
//!
//! Compiles Decaf source to x86-64 (or IA-32) assembly text. The
//! pipeline is a pure function of source plus configuration:
//!
//! ```text
//! parse -> propagate types -> analyze -> allocate -> lower to TAC
//!       -> basic-block optimize -> emit assembly
//! ```
//!
//! Parsing errors are fatal and returned immediately. Semantic errors
//! accumulate in the diagnostic sink and are returned together, rendered
//! as `file:line:col: error:` records; no assembly is produced when
//! analysis fails. Lowering and emission assume a valid program.
//!
//! # Embedding
//!
//! ```rust,ignore
//! use dcc::{CompilerConfig, compile_source};
//!
//! let config = CompilerConfig::new().with_all_optimizations();
//! let artifacts = compile_source(source, "prog.dcf", &config)?;
//! std::fs::write("prog.s", artifacts.assembly)?;
//! ```

pub mod ast;
pub mod basic_block;
pub mod codegen;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod lower;
pub mod optimizer;
pub mod parser;
pub mod semantic;
pub mod symtab;
pub mod tac;
pub mod types;

pub use codegen::CodeGen;
pub use config::{CompilerConfig, OptPass, OptPasses, TargetArch};
pub use context::TravCtx;
pub use diagnostics::DiagnosticSink;
pub use optimizer::Optimizer;
pub use parser::Parser;

use std::fs;
use std::path::Path;

/// Everything one compilation produces.
#[derive(Debug)]
pub struct CompileArtifacts {
    /// The assembly translation unit.
    pub assembly: String,
    /// Lowered TAC stream, when `dump_ir` is set.
    pub ir_dump: Option<String>,
    /// Basic blocks and CFG matrix, when `dump_blocks` is set.
    pub blocks_dump: Option<String>,
    /// CFG roots report from the global CSE pass, when enabled.
    pub cse_report: Option<String>,
}

/// Compile one source text. On semantic errors the rendered diagnostics
/// are returned and no assembly is produced.
pub fn compile_source(
    source: &str,
    filename: &str,
    config: &CompilerConfig,
) -> Result<CompileArtifacts, String> {
    let mut parser = Parser::new(source)?;
    let mut program = parser.parse()?;
    let mut ctx = TravCtx::new(DiagnosticSink::with_source(filename, source));
    compile_program(&mut program, &mut ctx, config)
}

/// Run the pipeline over an already-built AST. This is the boundary an
/// alternative frontend would target: everything after here is
/// independent of how the tree was produced.
pub fn compile_program(
    program: &mut ast::Program,
    ctx: &mut TravCtx,
    config: &CompilerConfig,
) -> Result<CompileArtifacts, String> {
    let filename = ctx.diagnostics.filename().to_string();

    semantic::propagate_types(program, ctx);
    semantic::analyze(program, ctx);
    if ctx.had_errors() {
        return Err(ctx.diagnostics.render());
    }
    semantic::allocate(program);

    lower::lower(program, ctx);
    let ir_dump = config.dump_ir.then(|| tac::print_tac(ctx.statements()));

    let mut optimizer = Optimizer::new();
    optimizer.generate_basic_blocks(ctx.statements());
    if !config.opt_passes.is_empty() {
        optimizer.basic_blocks_optimizations(config.opt_passes);
    }
    let cse_report = config
        .global_cse
        .then(|| optimizer.global_common_subexpression_elimination());
    let blocks_dump = config.dump_blocks.then(|| optimizer.dump());
    optimizer.generate_statements();

    let mut codegen = CodeGen::new(config.target);
    let assembly = codegen
        .generate(&filename, optimizer.optimized_statements())
        .map_err(|e| e.to_string())?;

    Ok(CompileArtifacts {
        assembly,
        ir_dump,
        blocks_dump,
        cse_report,
    })
}

/// Compile a `.dcf` file and write the assembly next to `output_path`.
pub fn compile_file(
    input_path: &Path,
    output_path: &Path,
    config: &CompilerConfig,
) -> Result<CompileArtifacts, String> {
    let source = fs::read_to_string(input_path)
        .map_err(|e| format!("Failed to read source file: {}", e))?;
    let filename = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let artifacts = compile_source(&source, &filename, config)?;

    fs::write(output_path, &artifacts.assembly)
        .map_err(|e| format!("Failed to write assembly file: {}", e))?;

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUM_PROGRAM: &str = "\
int total;
int values[10];

int sum(int n) {
    int s;
    for (i = 0, 10) {
        if (i < n) {
            s += values[i];
        }
    }
    return s;
}

void main() {
    total = sum(10);
    callout(\"printf\", \"total: %d\\n\", total);
}
";

    #[test]
    fn test_compile_produces_required_directives() {
        let artifacts =
            compile_source(SUM_PROGRAM, "sum.dcf", &CompilerConfig::default()).unwrap();
        let asm = &artifacts.assembly;
        assert!(asm.contains(".file \"sum.dcf\""));
        assert!(asm.contains(".text"));
        assert!(asm.contains(".global main\nmain:"));
        assert!(asm.contains(".global sum\nsum:"));
        assert!(asm.contains(".lcomm total,8"));
        assert!(asm.contains(".lcomm values,80"));
        assert!(asm.contains(".BOUNDSMSG:"));
        assert!(asm.contains(".DCFFILE:\n.string \"sum.dcf\""));
    }

    #[test]
    fn test_optimized_compile_succeeds() {
        let config = CompilerConfig::new().with_all_optimizations();
        let artifacts = compile_source(SUM_PROGRAM, "sum.dcf", &config).unwrap();
        assert!(artifacts.assembly.contains("enter $"));
        let report = artifacts.cse_report.unwrap();
        assert!(report.contains("Root:"));
    }

    #[test]
    fn test_failing_analysis_returns_diagnostics_only() {
        let err = compile_source(
            "void main() { x = 1; }",
            "bad.dcf",
            &CompilerConfig::default(),
        )
        .unwrap_err();
        assert!(err.contains("bad.dcf:1:15: error: variable 'x' not declared."));
        // the offending line is reprinted with a caret
        assert!(err.contains("void main() { x = 1; }"));
        assert!(err.contains("^"));
    }

    #[test]
    fn test_missing_main_is_rejected() {
        let err = compile_source("int f() { return 1; }", "bad.dcf", &CompilerConfig::default())
            .unwrap_err();
        assert!(err.contains("program must contain a method 'main'."));
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let err = compile_source("void main( {", "bad.dcf", &CompilerConfig::default())
            .unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_dumps_follow_toggles() {
        let mut config = CompilerConfig::new();
        config.dump_ir = true;
        config.dump_blocks = true;
        let artifacts = compile_source(SUM_PROGRAM, "sum.dcf", &config).unwrap();

        let ir = artifacts.ir_dump.unwrap();
        assert!(ir.contains("FBEGIN"));
        assert!(ir.contains("RETURN"));

        let blocks = artifacts.blocks_dump.unwrap();
        assert!(blocks.contains("Block[0]:"));
        assert!(blocks.contains("Control Flow Graph Roots:"));

        let plain = compile_source(SUM_PROGRAM, "sum.dcf", &CompilerConfig::default()).unwrap();
        assert!(plain.ir_dump.is_none());
        assert!(plain.blocks_dump.is_none());
    }

    #[test]
    fn test_same_input_same_output() {
        let config = CompilerConfig::new().with_all_optimizations();
        let first = compile_source(SUM_PROGRAM, "sum.dcf", &config).unwrap();
        let second = compile_source(SUM_PROGRAM, "sum.dcf", &config).unwrap();
        assert_eq!(first.assembly, second.assembly);
    }

    #[test]
    fn test_optimization_shrinks_redundant_code() {
        let source = "\
void main() {
    int x;
    int y;
    x = 2 + 3;
    y = x * 1;
}
";
        let plain = compile_source(source, "t.dcf", &CompilerConfig::default()).unwrap();
        let optimized = compile_source(
            source,
            "t.dcf",
            &CompilerConfig::new().with_all_optimizations(),
        )
        .unwrap();
        assert!(optimized.assembly.len() < plain.assembly.len());
        // the folded sum appears as an immediate
        assert!(optimized.assembly.contains("$5"));
    }

    #[test]
    fn test_ia32_flavor() {
        let mut config = CompilerConfig::new();
        config.target = TargetArch::Ia32;
        let artifacts = compile_source(SUM_PROGRAM, "sum.dcf", &config).unwrap();
        assert!(artifacts.assembly.contains("movl"));
        assert!(artifacts.assembly.contains("(%ebp)"));
    }
}
