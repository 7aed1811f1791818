use std::{fs, path::Path};
use tracing::{debug, info};

use crate::{
    error::{Result, StructgenError},
    gen_c::generate,
    parser::parse_definitions,
    tokenizer::tokenize,
    types::{Dialect, Registry},
    verifier::verify_registry,
};

impl Dialect {
    /// `.struct` files use the plain dialect, everything else the Rust one.
    pub fn from_path(path: &Path) -> Dialect {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("struct") => Dialect::Plain,
            _ => Dialect::Rust,
        }
    }

    /// Prefix applied to object names when none is configured.
    pub fn default_prefix(self) -> &'static str {
        match self {
            Dialect::Plain => "FuStruct",
            Dialect::Rust => "",
        }
    }
}

/// Settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Forced source dialect; `compile_file` otherwise uses the extension.
    pub dialect:  Option<Dialect>,
    /// Prefix for type names, e.g. `FuStruct` turns `Hdr` into `FuStructHdr`.
    pub prefix:   Option<String>,
    /// File name of the generated header, included by the generated source.
    pub basename: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            dialect:  None,
            prefix:   None,
            basename: "fu-struct.h".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }

    fn resolved_dialect(&self) -> Dialect {
        self.dialect.unwrap_or_default()
    }

    fn resolved_prefix(&self) -> &str {
        self.prefix
            .as_deref()
            .unwrap_or_else(|| self.resolved_dialect().default_prefix())
    }
}

/// Output of a successful compilation.
#[derive(Debug, Clone)]
pub struct Generated {
    /// The implementation unit.
    pub c:        String,
    /// The interface unit.
    pub h:        String,
    pub registry: Registry,
}

/// Parse and verify a definition file into its registry of objects.
pub fn compile_registry(text: &str, opts: &CompileOptions) -> Result<Registry> {
    let lines = tokenize(text);
    let registry = parse_definitions(&lines, opts.resolved_dialect(), opts.resolved_prefix())?;
    verify_registry(&registry)?;
    debug!(
        "{} structs and {} enums",
        registry.structs.len(),
        registry.enums.len()
    );
    Ok(registry)
}

/// Compile a definition file into a C implementation and header.
/// Returns `Err(StructgenError)` if tokenization/parsing/verification fails;
/// nothing is generated in that case.
pub fn compile(text: &str, opts: &CompileOptions) -> Result<Generated> {
    let registry = compile_registry(text, opts)?;
    let (c, h) = generate(&registry, &opts.basename);
    Ok(Generated { c, h, registry })
}

/// Read and compile `path`, picking the dialect from its extension unless
/// one is forced. Errors carry the file name.
pub fn compile_file(path: &Path, opts: &CompileOptions) -> Result<Generated> {
    let mut opts = opts.clone();
    if opts.dialect.is_none() {
        opts.dialect = Some(Dialect::from_path(path));
    }
    info!("compiling {}", path.display());
    fs::read_to_string(path)
        .map_err(StructgenError::Io)
        .and_then(|text| compile(&text, &opts))
        .map_err(|err| StructgenError::in_file(path, err))
}
