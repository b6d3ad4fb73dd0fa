use crate::wire::WireToken;
use bytes::Bytes;
use std::path::{Path, PathBuf};

wire_enum! {
    /// The decompilation mode, sent as the `mode` field.
    pub enum Mode {
        /// Compile the given C source on the service, then decompile the result.
        C => "c",
        /// Decompile an executable (ELF, PE, ...).
        Bin => "bin",
        /// Decompile raw machine code.
        Raw => "raw",
    }
}

wire_enum! {
    /// Type of the target high-level language.
    pub enum TargetLanguage {
        /// The C language (C99).
        C => "c",
        /// A Python-like language.
        Py => "py",
    }
}

wire_enum! {
    /// Format of the generated call and control-flow graphs.
    pub enum GraphFormat {
        Png => "png",
        Svg => "svg",
        Pdf => "pdf",
    }
}

wire_enum! {
    /// Variable naming style.
    pub enum VarNames {
        Readable => "readable",
        Address => "address",
        Hungarian => "hungarian",
        Simple => "simple",
        Unified => "unified",
    }
}

wire_enum! {
    /// Optimizations run by the decompiler.
    pub enum DecompOptimizations {
        None => "none",
        Limited => "limited",
        Normal => "normal",
        Aggressive => "aggressive",
    }
}

wire_enum! {
    pub enum Architecture {
        /// Let the service detect the architecture.
        Auto => "auto",
        X86 => "x86",
        Arm => "arm",
        /// arm+thumb
        Thumb => "thumb",
        Mips => "mips",
        Pic32 => "pic32",
        PowerPc => "powerpc",
    }
}

wire_enum! {
    pub enum FileFormat {
        Elf => "elf",
        Pe => "pe",
    }
}

wire_enum! {
    pub enum Compiler {
        Gcc => "gcc",
        Clang => "clang",
    }
}

wire_enum! {
    /// Optimization level used when compiling C input.
    pub enum CompOptimizations {
        O0 => "-O0",
        O1 => "-O1",
        O2 => "-O2",
        O3 => "-O3",
    }
}

wire_enum! {
    /// Which instructions are decoded during selective decompilation.
    pub enum SelectiveDecoding {
        Everything => "everything",
        /// Only instructions in the selected ranges.
        Only => "only",
    }
}

wire_enum! {
    pub enum Endianness {
        /// Little endian, e.g. x86.
        Little => "little",
        /// Big endian, e.g. PowerPC.
        Big => "big",
    }
}

/// Where the bytes of an uploaded file come from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Read from disk when the request is submitted.
    Path(PathBuf),
    Bytes(Bytes),
}

/// A file uploaded as a binary multipart body part.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub file_name: String,
    pub source: InputSource,
}

impl InputFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        Self {
            file_name,
            source: InputSource::Path(path),
        }
    }

    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            source: InputSource::Bytes(data.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            InputSource::Path(p) => Some(p),
            InputSource::Bytes(_) => None,
        }
    }
}

/// The value of a single multipart field.
#[derive(Debug, Clone)]
pub enum FormValue {
    /// Sent as a UTF-8 string.
    Text(String),
    /// Sent as `yes` or `no`.
    Flag(bool),
    /// Sent as the wire token of an enumerated value.
    Token(&'static str),
    /// Sent as a binary body part.
    File(InputFile),
}

impl FormValue {
    /// The text of a non-file field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Flag(true) => Some("yes"),
            Self::Flag(false) => Some("no"),
            Self::Token(t) => Some(t),
            Self::File(_) => None,
        }
    }
}

/// Parameters shared by every mode.
#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    pub target_language: Option<TargetLanguage>,
    pub graph_format: Option<GraphFormat>,
    pub decomp_var_names: Option<VarNames>,
    pub decomp_optimizations: Option<DecompOptimizations>,
    pub decomp_unreachable_functions: Option<bool>,
    pub decomp_emit_address: Option<bool>,
    pub generate_call_graph: Option<bool>,
    pub generate_control_flow_graphs: Option<bool>,
    pub generate_archive: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct COptions {
    pub architecture: Option<Architecture>,
    pub file_format: Option<FileFormat>,
    pub comp_compiler: Option<Compiler>,
    pub comp_optimizations: Option<CompOptimizations>,
    pub comp_debug: Option<bool>,
    pub comp_strip: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct BinOptions {
    pub architecture: Option<Architecture>,
    /// Functions to decompile, by name.
    pub sel_decomp_funcs: Option<Vec<String>>,
    /// Address ranges to decompile, e.g. `0x1000-0x2000`.
    pub sel_decomp_ranges: Option<Vec<String>>,
    pub sel_decomp_decoding: Option<SelectiveDecoding>,
    /// Debug information for PE input.
    pub pdb: Option<InputFile>,
}

#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub architecture: Option<Architecture>,
    pub file_format: Option<FileFormat>,
    pub raw_endian: Option<Endianness>,
    pub raw_entry_point: Option<u64>,
    pub raw_section_vma: Option<u64>,
}

/// Mode specific parameters; the variant decides the `mode` field.
#[derive(Debug, Clone)]
pub enum ModeOptions {
    C(COptions),
    Bin(BinOptions),
    Raw(RawOptions),
}

impl ModeOptions {
    pub fn mode(&self) -> Mode {
        match self {
            Self::C(_) => Mode::C,
            Self::Bin(_) => Mode::Bin,
            Self::Raw(_) => Mode::Raw,
        }
    }

    /// Empty parameters for `mode`.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::C => Self::C(COptions::default()),
            Mode::Bin => Self::Bin(BinOptions::default()),
            Mode::Raw => Self::Raw(RawOptions::default()),
        }
    }
}

/// One named multipart field.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: &'static str,
    pub value: FormValue,
}

/// A decompilation request.
///
/// Absent parameters are left out of the request entirely so the service
/// applies its own defaults.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub input: InputFile,
    pub options: CommonOptions,
    pub mode: ModeOptions,
}

impl JobDescriptor {
    pub fn new(input: InputFile, mode: ModeOptions) -> Self {
        Self {
            input,
            options: CommonOptions::default(),
            mode,
        }
    }

    pub fn c(input: InputFile) -> Self {
        Self::new(input, ModeOptions::C(COptions::default()))
    }

    pub fn bin(input: InputFile) -> Self {
        Self::new(input, ModeOptions::Bin(BinOptions::default()))
    }

    pub fn raw(input: InputFile, architecture: Architecture, file_format: FileFormat) -> Self {
        Self::new(
            input,
            ModeOptions::Raw(RawOptions {
                architecture: Some(architecture),
                file_format: Some(file_format),
                ..Default::default()
            }),
        )
    }

    pub fn with_options(mut self, options: CommonOptions) -> Self {
        self.options = options;
        self
    }

    /// Every present field, in the order they are sent.
    pub fn form_fields(&self) -> Vec<FormField> {
        let mut form = Form::default();
        form.token("mode", Some(self.mode.mode()));
        form.push("input", FormValue::File(self.input.clone()));

        let o = &self.options;
        form.token("target_language", o.target_language);
        form.token("graph_format", o.graph_format);
        form.token("decomp_var_names", o.decomp_var_names);
        form.token("decomp_optimizations", o.decomp_optimizations);
        form.flag("decomp_unreachable_functions", o.decomp_unreachable_functions);
        form.flag("decomp_emit_address", o.decomp_emit_address);
        form.flag("generate_call_graph", o.generate_call_graph);
        form.flag("generate_control_flow_graphs", o.generate_control_flow_graphs);
        form.flag("generate_archive", o.generate_archive);

        match &self.mode {
            ModeOptions::C(c) => {
                form.token("architecture", c.architecture);
                form.token("file_format", c.file_format);
                form.token("comp_compiler", c.comp_compiler);
                form.token("comp_optimizations", c.comp_optimizations);
                form.flag("comp_debug", c.comp_debug);
                form.flag("comp_strip", c.comp_strip);
            }
            ModeOptions::Bin(b) => {
                form.token("architecture", b.architecture);
                form.list("sel_decomp_funcs", b.sel_decomp_funcs.as_deref());
                form.list("sel_decomp_ranges", b.sel_decomp_ranges.as_deref());
                form.token("sel_decomp_decoding", b.sel_decomp_decoding);
                if let Some(pdb) = &b.pdb {
                    form.push("pdb", FormValue::File(pdb.clone()));
                }
            }
            ModeOptions::Raw(r) => {
                form.token("architecture", r.architecture);
                form.token("file_format", r.file_format);
                form.token("raw_endian", r.raw_endian);
                form.address("raw_entry_point", r.raw_entry_point);
                form.address("raw_section_vma", r.raw_section_vma);
            }
        }

        form.0
    }
}

#[derive(Default)]
struct Form(Vec<FormField>);

impl Form {
    fn push(&mut self, name: &'static str, value: FormValue) {
        self.0.push(FormField { name, value });
    }

    fn token<T: WireToken>(&mut self, name: &'static str, value: Option<T>) {
        if let Some(v) = value {
            self.push(name, FormValue::Token(v.token()));
        }
    }

    fn flag(&mut self, name: &'static str, value: Option<bool>) {
        if let Some(v) = value {
            self.push(name, FormValue::Flag(v));
        }
    }

    fn list(&mut self, name: &'static str, value: Option<&[String]>) {
        if let Some(v) = value {
            self.push(name, FormValue::Text(v.join(",")));
        }
    }

    fn address(&mut self, name: &'static str, value: Option<u64>) {
        if let Some(v) = value {
            self.push(name, FormValue::Text(format!("{v:#x}")));
        }
    }
}
