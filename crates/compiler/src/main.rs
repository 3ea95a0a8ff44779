//! Decaf Compiler CLI
//!
//! Command-line driver: parses flags into a [`dcc::CompilerConfig`],
//! runs the compilation pipeline and writes the assembly output.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use dcc::{CompilerConfig, OptPass, TargetArch};

#[derive(ClapParser)]
#[command(name = "dcc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Decaf compiler - compile .dcf programs to assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .dcf file to assembly
    Build {
        /// Input .dcf source file
        input: PathBuf,

        /// Output assembly path (defaults to input filename with .s extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to a TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Target flavor to emit
        #[arg(long, value_enum, default_value = "x86-64")]
        target: TargetFlag,

        /// Print the lowered intermediate representation
        #[arg(long)]
        ir: bool,

        /// Print the basic blocks and control flow graph
        #[arg(long)]
        blocks: bool,

        /// Enable all basic-blocks optimizations
        #[arg(long = "opt-basic-blocks")]
        opt_basic_blocks: bool,

        /// Enable basic-block constant propagation
        #[arg(long = "opt-basic-blocks-const-prop")]
        opt_const_prop: bool,

        /// Enable basic-block common subexpression elimination
        #[arg(long = "opt-basic-blocks-common-subexpr-elim")]
        opt_cse: bool,

        /// Enable basic-block algebraic simplification
        #[arg(long = "opt-basic-blocks-alg-simp")]
        opt_alg_simp: bool,

        /// Enable basic-block copy propagation
        #[arg(long = "opt-basic-blocks-copy-prop")]
        opt_copy_prop: bool,

        /// Enable basic-block dead code elimination
        #[arg(long = "opt-basic-blocks-dead-code")]
        opt_dead_code: bool,

        /// Enable global common subexpression elimination
        #[arg(long = "opt-common-subexpr-elim")]
        opt_global_cse: bool,

        /// Enable all optimizations
        #[arg(long = "opt-all")]
        opt_all: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum TargetFlag {
    #[value(name = "x86-64")]
    X86_64,
    #[value(name = "ia32")]
    Ia32,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            target,
            ir,
            blocks,
            opt_basic_blocks,
            opt_const_prop,
            opt_cse,
            opt_alg_simp,
            opt_copy_prop,
            opt_dead_code,
            opt_global_cse,
            opt_all,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("s"));

            let mut cfg = match config {
                Some(path) => load_config(&path),
                None => CompilerConfig::new(),
            };

            if opt_all || opt_basic_blocks {
                cfg.opt_passes = dcc::OptPasses::all();
            }
            if opt_const_prop {
                cfg.opt_passes |= OptPass::ConstantFolding;
            }
            if opt_cse {
                cfg.opt_passes |= OptPass::Cse;
            }
            if opt_alg_simp {
                cfg.opt_passes |= OptPass::AlgebraicSimp;
            }
            if opt_copy_prop {
                cfg.opt_passes |= OptPass::CopyProp;
            }
            if opt_dead_code {
                cfg.opt_passes |= OptPass::DeadCodeElim;
            }
            if opt_global_cse || opt_all {
                cfg.global_cse = true;
            }
            if ir {
                cfg.dump_ir = true;
            }
            if blocks {
                cfg.dump_blocks = true;
            }
            cfg.target = match target {
                TargetFlag::X86_64 => TargetArch::X86_64,
                TargetFlag::Ia32 => TargetArch::Ia32,
            };

            run_build(&input, &output, &cfg);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dcc", &mut io::stdout());
        }
    }
}

fn load_config(path: &Path) -> CompilerConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config file: {}", e);
            process::exit(1);
        }
    };
    match CompilerConfig::from_toml(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_build(input: &Path, output: &Path, config: &CompilerConfig) {
    match dcc::compile_file(input, output, config) {
        Ok(artifacts) => {
            if let Some(ir) = &artifacts.ir_dump {
                print!("{}", ir);
            }
            if let Some(report) = &artifacts.cse_report {
                print!("{}", report);
            }
            if let Some(blocks) = &artifacts.blocks_dump {
                print!("{}", blocks);
            }
            println!("Compiled {} -> {}", input.display(), output.display());
        }
        Err(e) => {
            eprint!("{}", e);
            if !e.ends_with('\n') {
                eprintln!();
            }
            process::exit(1);
        }
    }
}
