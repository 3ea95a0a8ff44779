//! Compiler configuration
//!
//! The driver (or an embedding project) describes a compilation with a
//! [`CompilerConfig`]: which basic-block optimizations to run, whether to
//! run the global CSE pass, which dumps to produce, and the target
//! flavor. Configurations can be built programmatically, from CLI flags,
//! or loaded from a TOML file.

use enumflags2::{BitFlags, bitflags};
use serde::Deserialize;

/// One intra-block optimization pass.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptPass {
    ConstantFolding = 0b00001,
    AlgebraicSimp = 0b00010,
    Cse = 0b00100,
    CopyProp = 0b01000,
    DeadCodeElim = 0b10000,
}

/// Set of enabled intra-block passes.
pub type OptPasses = BitFlags<OptPass>;

/// Output flavor of the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetArch {
    #[default]
    X86_64,
    Ia32,
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Intra-block passes to run, applied in declaration order.
    pub opt_passes: OptPasses,
    /// Run the cross-block CSE pass over each function's CFG.
    pub global_cse: bool,
    /// Produce a dump of the lowered TAC stream.
    pub dump_ir: bool,
    /// Produce a dump of the basic blocks and control flow graph.
    pub dump_blocks: bool,
    pub target: TargetArch,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            opt_passes: BitFlags::empty(),
            global_cse: false,
            dump_ir: false,
            dump_blocks: false,
            target: TargetArch::X86_64,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable every basic-block pass and the global CSE hook.
    pub fn with_all_optimizations(mut self) -> Self {
        self.opt_passes = BitFlags::all();
        self.global_cse = true;
        self
    }

    pub fn with_pass(mut self, pass: OptPass) -> Self {
        self.opt_passes |= pass;
        self
    }

    /// Parse a configuration from TOML:
    ///
    /// ```toml
    /// target = "x86-64"
    ///
    /// [optimize]
    /// basic-blocks = ["const-fold", "alg-simp", "cse", "copy-prop", "dead-code"]
    /// global-cse = true
    ///
    /// [output]
    /// ir = false
    /// blocks = false
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|e| format!("Failed to parse config: {}", e))?;

        let mut config = CompilerConfig::new();
        if let Some(target) = raw.target {
            config.target = target;
        }
        if let Some(optimize) = raw.optimize {
            for name in optimize.basic_blocks.unwrap_or_default() {
                config.opt_passes |= match name.as_str() {
                    "const-fold" => OptPass::ConstantFolding,
                    "alg-simp" => OptPass::AlgebraicSimp,
                    "cse" => OptPass::Cse,
                    "copy-prop" => OptPass::CopyProp,
                    "dead-code" => OptPass::DeadCodeElim,
                    "all" => return Ok(config.with_all_optimizations()),
                    other => return Err(format!("Unknown optimization pass '{}'", other)),
                };
            }
            config.global_cse = optimize.global_cse.unwrap_or(false);
        }
        if let Some(output) = raw.output {
            config.dump_ir = output.ir.unwrap_or(false);
            config.dump_blocks = output.blocks.unwrap_or(false);
        }
        Ok(config)
    }
}

/// Raw TOML shape, kept separate so the public config stays plain data.
#[derive(Debug, Deserialize)]
struct RawConfig {
    target: Option<TargetArch>,
    optimize: Option<RawOptimize>,
    output: Option<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawOptimize {
    #[serde(rename = "basic-blocks")]
    basic_blocks: Option<Vec<String>>,
    #[serde(rename = "global-cse")]
    global_cse: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    ir: Option<bool>,
    blocks: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runs_nothing() {
        let config = CompilerConfig::default();
        assert!(config.opt_passes.is_empty());
        assert!(!config.global_cse);
        assert_eq!(config.target, TargetArch::X86_64);
    }

    #[test]
    fn test_with_all() {
        let config = CompilerConfig::new().with_all_optimizations();
        assert!(config.opt_passes.contains(OptPass::ConstantFolding));
        assert!(config.opt_passes.contains(OptPass::DeadCodeElim));
        assert!(config.global_cse);
    }

    #[test]
    fn test_from_toml() {
        let config = CompilerConfig::from_toml(
            "[optimize]\nbasic-blocks = [\"const-fold\", \"dead-code\"]\nglobal-cse = true\n\
             [output]\nir = true\n",
        )
        .unwrap();
        assert!(config.opt_passes.contains(OptPass::ConstantFolding));
        assert!(config.opt_passes.contains(OptPass::DeadCodeElim));
        assert!(!config.opt_passes.contains(OptPass::Cse));
        assert!(config.global_cse);
        assert!(config.dump_ir);
        assert!(!config.dump_blocks);
    }

    #[test]
    fn test_from_toml_rejects_unknown_pass() {
        let err = CompilerConfig::from_toml("[optimize]\nbasic-blocks = [\"inline\"]\n")
            .unwrap_err();
        assert!(err.contains("inline"));
    }
}
