use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use structgen_compiler::error::StructgenError;
use structgen_compiler::{compile_file, compile_registry, CompileOptions, Dialect, Record};

#[derive(Parser)]
#[command(name = "structgen")]
#[command(about = "Generate C accessors, parsers and validators from binary structure definitions", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    /// `name: TYPE: DEFAULT` members, as used by `.struct` files
    Plain,
    /// `#[derive(..)]` annotated Rust-like blocks, as used by `.rs` files
    Rust,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Plain => Dialect::Plain,
            DialectArg::Rust => Dialect::Rust,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the C source and header for a definition file
    Generate {
        /// Input `.struct` or `.rs` definition file
        src: PathBuf,

        /// Output `.c` file
        dst_c: PathBuf,

        /// Output `.h` file, included by the `.c` file using its base name
        dst_h: PathBuf,

        /// Source dialect (defaults to the one matching the file extension)
        #[arg(long, value_enum)]
        dialect: Option<DialectArg>,

        /// Prefix for generated type names
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Print the resolved structs and enums as JSON
    Dump {
        /// Input `.struct` or `.rs` definition file
        src: PathBuf,

        #[arg(long, value_enum)]
        dialect: Option<DialectArg>,

        #[arg(long)]
        prefix: Option<String>,
    },

    /// Parse a binary file against one struct and print it
    Decode {
        /// Input `.struct` or `.rs` definition file
        src: PathBuf,

        /// Struct name, with or without its prefix
        #[arg(short, long = "struct")]
        name: String,

        /// Binary file to decode
        #[arg(short, long)]
        input: PathBuf,

        /// Offset of the struct in the binary file
        #[arg(long, default_value = "0", value_parser = parse_offset)]
        offset: usize,
    },
}

fn parse_offset(text: &str) -> Result<usize, String> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid offset {}: {}", text, err))
}

fn options(dialect: Option<DialectArg>, prefix: Option<String>) -> CompileOptions {
    let mut opts = CompileOptions::new();
    if let Some(dialect) = dialect {
        opts = opts.dialect(dialect.into());
    }
    if let Some(prefix) = prefix {
        opts = opts.prefix(prefix);
    }
    opts
}

fn read_registry(src: &Path, opts: &CompileOptions) -> Result<structgen_compiler::types::Registry, StructgenError> {
    let mut opts = opts.clone();
    if opts.dialect.is_none() {
        opts.dialect = Some(Dialect::from_path(src));
    }
    fs::read_to_string(src)
        .map_err(StructgenError::Io)
        .and_then(|text| compile_registry(&text, &opts))
        .map_err(|err| StructgenError::in_file(src, err))
}

fn main() -> Result<(), StructgenError> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Generate { src, dst_c, dst_h, dialect, prefix } => {
            let basename = dst_h
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| dst_h.display().to_string());
            let opts = options(dialect, prefix).basename(basename);

            // Nothing is written unless the whole file compiled
            let out = compile_file(&src, &opts)?;
            fs::write(&dst_c, &out.c)?;
            fs::write(&dst_h, &out.h)?;
            info!("wrote {} and {}", dst_c.display(), dst_h.display());
            Ok(())
        }

        Commands::Dump { src, dialect, prefix } => {
            let registry = read_registry(&src, &options(dialect, prefix))?;
            let json = serde_json::to_string_pretty(&registry).map_err(std::io::Error::from)?;
            println!("{}", json);
            Ok(())
        }

        Commands::Decode { src, name, input, offset } => {
            let registry = read_registry(&src, &CompileOptions::new())?;
            let data = fs::read(&input)?;
            let st = Record::parse_by_name(&registry, &name, &data, offset)?;
            println!("{}", st);
            Ok(())
        }
    }
}
