//! structgen-compiler
//!
//! This crate implements:
//!  1) A line tokenizer + parser for `.struct` and `.rs` structure definitions,
//!  2) A verifier for the resolved layout (offsets, duplicate names, value ranges),
//!  3) Derive propagation between structs, members and enums,
//!  4) Code generation for C/GLib (`compile` → `.c` and `.h` text),
//!  5) A record interpreter executing the generated semantics in Rust,
//!  6) Error types (`StructgenError`, `RecordError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod verifier;
pub mod compiler;
pub mod gen_c;
pub mod record;

pub use compiler::compile;
pub use compiler::compile_file;
pub use compiler::compile_registry;
pub use compiler::CompileOptions;
pub use compiler::Generated;
pub use error::{RecordError, StructgenError};
pub use record::{enum_from_string, FieldValue, Record};
pub use types::Dialect;
