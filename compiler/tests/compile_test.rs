#![cfg(test)]

use pretty_assertions::assert_eq;
use std::io::Write;
use structgen_compiler::{compile, compile_file, CompileOptions, Dialect, StructgenError};

const USWID_RS: &str = r#"
// header of a coSWID container
#[derive(New, Parse, ParseBytes, ValidateBytes)]
struct FuStructUswid {
    magic: Guid == 0x5342_4F4D_D6BA_2EAC_A3E6_7A52_AAEE_3BAF,
    hdrver: u8 = 0x03,
    hdrsz: u16le = $struct_size,
    payloadsz: u32le,
    flags: u8,
    compression: u8,
}
"#;

fn rust_opts() -> CompileOptions {
    CompileOptions::new().basename("fu-uswid-struct.h")
}

#[test]
fn test_generate_header() {
    let input = r#"
    #[derive(New, Getters)]
    struct Foo {
        size: u16le = $struct_size,
        flags: u8,
    }
    "#;
    let out = compile(input, &rust_opts()).expect("compile failed");
    assert_eq!(
        out.h,
        "/* auto-generated, do not modify */
#pragma once

#include <glib.h>
#include <fwupd.h>

#define FOO_SIZE 0x3
#define FOO_OFFSET_SIZE 0x0
#define FOO_SIZE_SIZE 0x2
#define FOO_DEFAULT_SIZE 0x3
#define FOO_OFFSET_FLAGS 0x2
#define FOO_SIZE_FLAGS 0x1
guint16 foo_get_size(const GByteArray *st);
void foo_set_size(GByteArray *st, guint16 value);
guint8 foo_get_flags(const GByteArray *st);
void foo_set_flags(GByteArray *st, guint8 value);
GByteArray *foo_new(void);
"
    );
    assert!(out.c.contains("#include \"fu-uswid-struct.h\"\n"));
    assert!(out.c.contains(
        "
GByteArray *
foo_new(void)
{
    GByteArray *st = g_byte_array_sized_new(3);
    fu_byte_array_set_size(st, 3, 0x0);
    foo_set_size(st, 0x3);
    return st;
}
"
    ));
    assert!(out.c.contains("return (guint16) fu_memread_uint16(st->data + 0, G_LITTLE_ENDIAN);"));
    assert!(out.c.contains("st->data[2] = value;"));
}

#[test]
fn test_generate_uswid() {
    let out = compile(USWID_RS, &rust_opts()).expect("compile failed");

    // public surface
    assert!(out.h.contains("#define FU_STRUCT_USWID_SIZE 0x19\n"));
    assert!(out.h.contains("#define FU_STRUCT_USWID_OFFSET_HDRSZ 0x11\n"));
    assert!(out.h.contains("GByteArray *fu_struct_uswid_new(void);\n"));
    assert!(out.h.contains(
        "GByteArray *fu_struct_uswid_parse(const guint8 *buf, gsize bufsz, gsize offset, GError **error);\n"
    ));
    assert!(out.h.contains("GByteArray *fu_struct_uswid_parse_bytes(GBytes *blob, gsize offset, GError **error);\n"));
    assert!(out.h.contains("gboolean fu_struct_uswid_validate_bytes(GBytes *blob, gsize offset, GError **error);\n"));
    assert!(out.h.contains("guint32 fu_struct_uswid_get_payloadsz(const GByteArray *st);\n"));

    // constants never get public accessors
    assert!(!out.h.contains("fu_struct_uswid_get_magic"));
    assert!(!out.h.contains("fu_struct_uswid_set_magic"));
    assert!(!out.h.contains("_validate_internal"));
    assert!(!out.h.contains("fu_struct_uswid_to_string"));

    // private helpers
    assert!(out.c.contains("G_GNUC_UNUSED static gboolean\nfu_struct_uswid_validate_internal(GByteArray *st, GError **error)\n"));
    assert!(out.c.contains("G_GNUC_UNUSED static gchar *\nfu_struct_uswid_to_string(const GByteArray *st)\n"));
    assert!(out.c.contains("G_GNUC_UNUSED static const fwupd_guid_t *\nfu_struct_uswid_get_magic(const GByteArray *st)\n"));

    // constant checks, bounds checks and construction
    assert!(out.c.contains(
        "if (memcmp(st->data + 0, \"\\x53\\x42\\x4f\\x4d\\xd6\\xba\\x2e\\xac\\xa3\\xe6\\x7a\\x52\\xaa\\xee\\x3b\\xaf\", 16) != 0) {"
    ));
    assert!(out.c.contains("\"constant FuStructUswid.magic was not valid, expected 0x53424F4DD6BA2EACA3E67A52AAEE3BAF\""));
    assert!(out.c.contains("if (!fu_memchk_read(bufsz, offset, 25, error)) {"));
    assert!(out.c.contains("g_prefix_error(error, \"invalid struct FuStructUswid: \");"));
    assert!(out.c.contains("fwupd_guid_to_string(fu_struct_uswid_get_magic(st), FWUPD_GUID_FLAG_MIXED_ENDIAN)"));
    assert!(out.c.contains("    fu_struct_uswid_set_hdrsz(st, 0x19);\n"));
    assert!(out.c.contains("    fu_struct_uswid_set_hdrver(st, 0x3);\n"));
    assert!(out.c.contains("    g_debug(\"%s\", str);\n"));
}

#[test]
fn test_generate_plain_dialect() {
    let input = "struct UswidHdr {\n    magic: guid\n    hdrver: u8: 1\n    hdrsz: u16le: $struct_size\n    payloadsz: u32le\n    flags: u8\n}\n";
    let opts = CompileOptions::new().dialect(Dialect::Plain);
    let out = compile(input, &opts).expect("compile failed");
    assert!(out.h.contains("#define FU_STRUCT_USWID_HDR_SIZE 0x18\n"));
    assert!(out.h.contains("#define FU_STRUCT_USWID_HDR_DEFAULT_HDRSZ 0x18\n"));
    assert!(out.h.contains("GByteArray *fu_struct_uswid_hdr_new(void);\n"));
    assert!(out.h.contains("gchar *fu_struct_uswid_hdr_to_string(const GByteArray *st);\n"));
    // nothing to validate
    assert!(!out.c.contains("fu_struct_uswid_hdr_validate"));
    assert!(!out.c.contains("_validate_internal"));
}

#[test]
fn test_generate_enum() {
    let input = r#"
    #[derive(ToString, FromString, ToBitString)]
    #[repr(u8)]
    enum FuEfiFileAttrib {
        None = 0x00,
        LargeFile = 0x01,
        DataAlignment2 = 0x02,
        Fixed = 0x04,
    }

    #[derive(ToString)]
    #[repr(u16le)]
    enum FuKind {
        Alpha,
        Beta,
    }
    "#;
    let out = compile(input, &rust_opts()).expect("compile failed");
    assert!(out.h.contains(
        "typedef enum {
    FU_EFI_FILE_ATTRIB_NONE = 0x0,
    FU_EFI_FILE_ATTRIB_LARGE_FILE = 0x1,
    FU_EFI_FILE_ATTRIB_DATA_ALIGNMENT2 = 0x2,
    FU_EFI_FILE_ATTRIB_FIXED = 0x4,
} FuEfiFileAttrib;
"
    ));
    assert!(out.h.contains("typedef enum {\n    FU_KIND_ALPHA,\n    FU_KIND_BETA,\n    FU_KIND_LAST,\n} FuKind;\n"));
    assert!(out.h.contains("const gchar *fu_efi_file_attrib_to_string(FuEfiFileAttrib val);\n"));
    assert!(out.h.contains("gchar *fu_efi_file_attrib_to_bitstring(FuEfiFileAttrib val);\n"));
    assert!(out.h.contains(
        "gboolean fu_efi_file_attrib_from_string(const gchar *val, FuEfiFileAttrib *value, GError **error);\n"
    ));
    assert!(!out.h.contains("fu_kind_from_string"));
    assert!(out.c.contains("    if (val == FU_EFI_FILE_ATTRIB_LARGE_FILE)\n        return \"large-file\";\n"));
    assert!(out.c.contains("    if (val == FU_EFI_FILE_ATTRIB_NONE)\n        return g_strdup(\"none\");\n"));
    assert!(out.c.contains("    if (val & FU_EFI_FILE_ATTRIB_FIXED)\n        data[idx++] = \"fixed\";\n"));
    assert!(out.c.contains("G_IO_ERROR_NOT_FOUND"));
    assert!(out.c.contains("\"%s is not a valid FuEfiFileAttrib\""));
}

#[test]
fn test_generate_enum_field() {
    let input = r#"
    #[repr(u16le)]
    enum FuKind {
        Alpha,
        Beta,
    }

    #[derive(Parse, New)]
    struct FuStructItem {
        kind: FuKind = Beta,
        version: FuKind == Alpha,
    }
    "#;
    let out = compile(input, &rust_opts()).expect("compile failed");
    // the enum is only used internally
    assert!(!out.h.contains("fu_kind_to_string"));
    assert!(out.c.contains("G_GNUC_UNUSED static const gchar *\nfu_kind_to_string(FuKind val)\n"));
    assert!(out.h.contains("FuKind fu_struct_item_get_kind(const GByteArray *st);\n"));
    assert!(out.h.contains("#define FU_STRUCT_ITEM_DEFAULT_KIND FU_KIND_BETA\n"));
    assert!(out.c.contains("    fu_struct_item_set_kind(st, FU_KIND_BETA);\n"));
    assert!(out.c.contains("if (fu_struct_item_get_version(st) != FU_KIND_ALPHA) {"));
    assert!(out.c.contains("const gchar *tmp = fu_kind_to_string(fu_struct_item_get_kind(st));"));
}

#[test]
fn test_generate_nested() {
    let input = r#"
    struct FuStructInner {
        sig: [char; 4] == "INNR",
        len: u32be,
    }

    #[derive(New, Parse, Setters)]
    struct FuStructOuter {
        inner: FuStructInner,
        reserved: [u8; 3],
    }
    "#;
    let out = compile(input, &rust_opts()).expect("compile failed");
    assert!(out.h.contains("#define FU_STRUCT_OUTER_SIZE 0xb\n"));
    assert!(out.h.contains("GByteArray *fu_struct_outer_get_inner(const GByteArray *st);\n"));
    assert!(out.h.contains(
        "gboolean fu_struct_outer_set_inner(GByteArray *st, const GByteArray *st_donor, GError **error);\n"
    ));
    assert!(!out.h.contains("reserved("));
    assert!(out.c.contains("if (memcmp(st->data + 0, \"INNR\", 4) != 0) {"));
    assert!(out.c.contains("if (!fu_struct_inner_validate_internal(&st_tmp, error))"));
    assert!(out.c.contains("g_autofree gchar *tmp = fu_struct_inner_to_string(st_tmp);"));
    // nested constants make the outer struct validate too
    assert!(out.c.contains("    if (!fu_struct_outer_validate_internal(st, error))\n        return NULL;\n"));

    // the outer constructor starts the nested struct from its own defaults
    assert!(out.c.contains("\nG_GNUC_UNUSED static GByteArray *\nfu_struct_inner_new(void)\n{\n"));
    assert!(out.c.contains("    memcpy(st->data + 0, \"INNR\", 4);\n"));
    assert!(out.c.contains(
        "GByteArray *
fu_struct_outer_new(void)
{
    GByteArray *st = g_byte_array_sized_new(11);
    fu_byte_array_set_size(st, 11, 0x0);
    {
        g_autoptr(GByteArray) st_donor = fu_struct_inner_new();
        memcpy(st->data + 0, st_donor->data, st_donor->len);
    }
    return st;
}
"
    ));
    assert!(!out.h.contains("fu_struct_inner_new"));
}

#[test]
fn test_padding_and_default() {
    let input = r#"
    #[derive(New)]
    struct FuStructPad {
        pad: [u8; 4] = 0xFF,
        data: [u8; 2] = 0xAB12,
        name: [char; 8] = "fwupd",
    }
    "#;
    let out = compile(input, &rust_opts()).expect("compile failed");
    assert!(out.c.contains("    memset(st->data + 0, 0xff, 4);\n"));
    assert!(out.c.contains("    memcpy(st->data + 4, \"\\xab\\x12\", 2);\n"));
    assert!(out.c.contains("    memcpy(st->data + 6, \"fwupd\", 5);\n"));
    assert!(!out.h.contains("DEFAULT_PAD"));
}

#[test]
fn test_error_aborts_whole_file() {
    let input = "struct Good {\n    a: u8,\n}\nstruct Bad {\n    b: u8\n}\n";
    let err = compile(input, &rust_opts()).unwrap_err();
    assert_eq!(err.to_string(), "Parse error at line 5: invalid struct line: b: u8 -- needs trailing comma");
    assert_eq!(err.line(), Some(5));
}

#[test]
fn test_dialect_errors() {
    let cases = [
        ("struct Foo {\n    a: u17,\n}\n", "invalid type: u17", 2),
        ("struct Foo {\n    a: [u8; 2] = 0x010203,\n}\n", "data has to be 2 bytes exactly", 2),
        ("struct Foo {\n    a: guid = 0x00,\n}\n", "data has to be 16 bytes exactly", 2),
        ("struct Foo {\n    a: [char; 4] = DFU,\n}\n", "string default DFU needs double quotes", 2),
        ("struct Foo {\n    a: u8,\n}\nstruct Foo {\n    b: u8,\n}\n", "Foo already defined", 4),
        ("struct Foo {\n    a: Bar,\n}\nstruct Bar {\n    b: u8,\n}\n", "invalid type: Bar", 2),
        ("struct Foo {\n    a: u8,\n    a: u16,\n}\n", "defined twice", 3),
        ("struct Foo {\n}\n", "has no members", 1),
        ("struct Foo {\n    size: u8 = $struct_size,\n    data: [u8; 0x100],\n}\n", "does not fit in u8", 2),
        ("struct Foo {\n    a: [u64; 0x2000000000000000],\n}\n", "struct size overflow", 2),
        (
            "struct Foo {\n    a: [u8; 0x8000000000000000],\n    b: [u8; 0x8000000000000000],\n}\n",
            "struct size overflow",
            3,
        ),
    ];
    for (input, expected, line) in cases {
        let err = compile(input, &rust_opts()).unwrap_err();
        assert!(err.to_string().contains(expected), "{:?} does not mention {:?}", err.to_string(), expected);
        assert_eq!(err.line(), Some(line), "{}", err);
    }
}

#[test]
fn test_compile_file() {
    let dir = tempfile::tempdir().expect("tempdir failed");

    let path = dir.path().join("fu-uswid.struct");
    let mut file = std::fs::File::create(&path).expect("create failed");
    writeln!(file, "struct Uswid {{\n    magic: 4s:: USWD\n    hdrsz: u16le: $struct_size\n}}").expect("write failed");
    let out = compile_file(&path, &CompileOptions::default()).expect("compile_file failed");
    assert!(out.h.contains("gboolean fu_struct_uswid_validate(const guint8 *buf, gsize bufsz, gsize offset, GError **error);\n"));
    assert!(out.c.contains("if (memcmp(st->data + 0, \"USWD\", 4) != 0) {"));

    let path = dir.path().join("fu-bad.rs");
    std::fs::write(&path, "struct Bad {\n    a: u8\n}\n").expect("write failed");
    let err = compile_file(&path, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, StructgenError::InFile { .. }));
    assert!(err.to_string().starts_with("cannot process "));
    assert!(err.to_string().contains("fu-bad.rs: Parse error at line 2"));

    let err = compile_file(&dir.path().join("missing.rs"), &CompileOptions::default()).unwrap_err();
    assert!(err.to_string().contains("I/O error"));
}
