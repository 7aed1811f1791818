//! Runtime helpers for structures described by `.struct` and `.rs`
//! definition files.
//!
//! These are the byte-level primitives that both the generated C code
//! (through `fu_memread_*`, `fu_memwrite_*`, `fu_memchk_read` and
//! `fu_strsafe`) and the in-process record interpreter rely on:
//!
//! ```
//! use structgen_runtime::*;
//!
//! let mut st = ByteBufferMut::with_size(4);
//! st.write_uint(0, 2, 0x18, Endian::Little).unwrap();
//! assert_eq!(st.data(), &[0x18, 0x00, 0x00, 0x00]);
//! assert!(check_read(st.len(), 2, 4).is_err());
//! ```

pub mod bb;
pub mod text;

pub use bb::*;
pub use text::*;
