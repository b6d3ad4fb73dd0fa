//! Command line flags for every decompilation parameter.

use anyhow::bail;
use clap::Args;
use retdec_core::prelude::*;
use std::path::PathBuf;

/// Accepts the yes/no spelling the service uses as well as true/false.
pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        other => Err(format!("expected yes|no|true|false, got '{other}'")),
    }
}

/// Parses `0x`-prefixed hexadecimal or plain decimal addresses.
pub fn parse_address(value: &str) -> Result<u64, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{value}': {e}"))
}

#[derive(Args, Debug, Default)]
pub struct DecompileArgs {
    /// Output language: c|py.
    #[arg(long)]
    pub target_language: Option<TargetLanguage>,

    /// Graph format: png|svg|pdf.
    #[arg(long)]
    pub graph_format: Option<GraphFormat>,

    /// Variable naming: readable|address|hungarian|simple|unified.
    #[arg(long)]
    pub decomp_var_names: Option<VarNames>,

    /// Optimizations: none|limited|normal|aggressive.
    #[arg(long)]
    pub decomp_optimizations: Option<DecompOptimizations>,

    #[arg(long, value_parser = parse_flag)]
    pub decomp_unreachable_functions: Option<bool>,

    #[arg(long, value_parser = parse_flag)]
    pub decomp_emit_address: Option<bool>,

    #[arg(long, value_parser = parse_flag)]
    pub generate_call_graph: Option<bool>,

    #[arg(long, value_parser = parse_flag)]
    pub generate_control_flow_graphs: Option<bool>,

    #[arg(long, value_parser = parse_flag)]
    pub generate_archive: Option<bool>,

    /// auto|x86|arm|thumb|mips|pic32|powerpc.
    #[arg(long)]
    pub architecture: Option<Architecture>,

    /// elf|pe.
    #[arg(long)]
    pub file_format: Option<FileFormat>,

    /// gcc|clang. Only in c mode.
    #[arg(long)]
    pub comp_compiler: Option<Compiler>,

    /// -O0|-O1|-O2|-O3. Only in c mode.
    #[arg(long, allow_hyphen_values = true)]
    pub comp_optimizations: Option<CompOptimizations>,

    #[arg(long, value_parser = parse_flag)]
    pub comp_debug: Option<bool>,

    #[arg(long, value_parser = parse_flag)]
    pub comp_strip: Option<bool>,

    /// Comma separated function names. Only in bin mode.
    #[arg(long, value_delimiter = ',')]
    pub sel_decomp_funcs: Option<Vec<String>>,

    /// Comma separated address ranges. Only in bin mode.
    #[arg(long, value_delimiter = ',')]
    pub sel_decomp_ranges: Option<Vec<String>>,

    /// everything|only. Only in bin mode.
    #[arg(long)]
    pub sel_decomp_decoding: Option<SelectiveDecoding>,

    /// PDB file with debug information. Only in bin mode.
    #[arg(long)]
    pub pdb: Option<PathBuf>,

    /// little|big. Only in raw mode.
    #[arg(long)]
    pub raw_endian: Option<Endianness>,

    /// Only in raw mode.
    #[arg(long, value_parser = parse_address)]
    pub raw_entry_point: Option<u64>,

    /// Only in raw mode.
    #[arg(long, value_parser = parse_address)]
    pub raw_section_vma: Option<u64>,
}

/// Fails with the first flag in `given` that was set.
fn reject(mode: Mode, given: &[(&str, bool)]) -> anyhow::Result<()> {
    if let Some((name, _)) = given.iter().find(|(_, set)| *set) {
        bail!("--{name} cannot be used in {mode} mode");
    }
    Ok(())
}

impl DecompileArgs {
    pub fn into_descriptor(self, mode: Mode, input: InputFile) -> anyhow::Result<JobDescriptor> {
        let c_only = [
            ("comp-compiler", self.comp_compiler.is_some()),
            ("comp-optimizations", self.comp_optimizations.is_some()),
            ("comp-debug", self.comp_debug.is_some()),
            ("comp-strip", self.comp_strip.is_some()),
        ];
        let bin_only = [
            ("sel-decomp-funcs", self.sel_decomp_funcs.is_some()),
            ("sel-decomp-ranges", self.sel_decomp_ranges.is_some()),
            ("sel-decomp-decoding", self.sel_decomp_decoding.is_some()),
            ("pdb", self.pdb.is_some()),
        ];
        let raw_only = [
            ("raw-endian", self.raw_endian.is_some()),
            ("raw-entry-point", self.raw_entry_point.is_some()),
            ("raw-section-vma", self.raw_section_vma.is_some()),
        ];

        let options = match mode {
            Mode::C => {
                reject(mode, &bin_only)?;
                reject(mode, &raw_only)?;
                ModeOptions::C(COptions {
                    architecture: self.architecture,
                    file_format: self.file_format,
                    comp_compiler: self.comp_compiler,
                    comp_optimizations: self.comp_optimizations,
                    comp_debug: self.comp_debug,
                    comp_strip: self.comp_strip,
                })
            }
            Mode::Bin => {
                reject(mode, &c_only)?;
                reject(mode, &raw_only)?;
                reject(mode, &[("file-format", self.file_format.is_some())])?;
                ModeOptions::Bin(BinOptions {
                    architecture: self.architecture,
                    sel_decomp_funcs: self.sel_decomp_funcs,
                    sel_decomp_ranges: self.sel_decomp_ranges,
                    sel_decomp_decoding: self.sel_decomp_decoding,
                    pdb: self.pdb.map(InputFile::from_path),
                })
            }
            Mode::Raw => {
                reject(mode, &c_only)?;
                reject(mode, &bin_only)?;
                if self.architecture.is_none() || self.file_format.is_none() {
                    bail!("raw mode requires --architecture and --file-format");
                }
                ModeOptions::Raw(RawOptions {
                    architecture: self.architecture,
                    file_format: self.file_format,
                    raw_endian: self.raw_endian,
                    raw_entry_point: self.raw_entry_point,
                    raw_section_vma: self.raw_section_vma,
                })
            }
        };

        Ok(JobDescriptor::new(input, options).with_options(CommonOptions {
            target_language: self.target_language,
            graph_format: self.graph_format,
            decomp_var_names: self.decomp_var_names,
            decomp_optimizations: self.decomp_optimizations,
            decomp_unreachable_functions: self.decomp_unreachable_functions,
            decomp_emit_address: self.decomp_emit_address,
            generate_call_graph: self.generate_call_graph,
            generate_control_flow_graphs: self.generate_control_flow_graphs,
            generate_archive: self.generate_archive,
        }))
    }
}
