//! C/GLib backend.
//!
//! Every struct becomes a set of functions operating on a `GByteArray`
//! holding exactly the struct bytes; every enum becomes a `typedef enum`
//! plus optional string conversion helpers. Functions exported as
//! `Private` are emitted `static`, `Public` ones are also declared in the
//! header. Objects are emitted in declaration order so that a function
//! only ever calls functions emitted before it.

use structgen_runtime::Endian;

use crate::{
    types::{
        Derive, EnumObj, Export, IntType, ItemKind, ObjRef, Registry, StructId, StructItem,
        StructObj, Type, Value,
    },
    utils::{c_bytes, c_string},
};

const HEADER_PREAMBLE: &str = "/* auto-generated, do not modify */
#pragma once

#include <glib.h>
#include <fwupd.h>
";

/// Generates the implementation and header text for every object in the
/// registry, returning `(c, h)`.
pub fn generate(registry: &Registry, basename: &str) -> (String, String) {
    let mut out = Output {
        c: format!(
            "/* auto-generated, do not modify */
#ifdef G_LOG_DOMAIN
#undef G_LOG_DOMAIN
#endif
#define G_LOG_DOMAIN \"FuStruct\"

#include <string.h>
#include <gio/gio.h>

#include \"{}\"
#include \"fu-byte-array.h\"
#include \"fu-mem.h\"
#include \"fu-string.h\"
",
            basename
        ),
        h: HEADER_PREAMBLE.to_string(),
    };

    for obj in &registry.order {
        match *obj {
            ObjRef::Enum(id) => emit_enum(&mut out, registry.enum_obj(id)),
            ObjRef::Struct(id) => emit_struct(&mut out, registry, id),
        }
    }

    (out.c, out.h)
}

struct Output {
    c: String,
    h: String,
}

impl Output {
    /// Emit one function body, and its prototype when it is public.
    fn function(&mut self, export: Export, ret: &str, proto: &str, body: &str) {
        if export.is_none() {
            return;
        }
        if export == Export::Public {
            let sep = if ret.ends_with('*') { "" } else { " " };
            self.h.push_str(&format!("{}{}{};\n", ret, sep, proto));
        }
        self.c.push_str(&format!(
            "\n{}{}\n{}\n{{\n{}}}\n",
            export.c_linkage(),
            ret,
            proto,
            body
        ));
    }
}

fn endian_glib(endian: Endian) -> &'static str {
    match endian {
        Endian::Little => "G_LITTLE_ENDIAN",
        Endian::Big => "G_BIG_ENDIAN",
        Endian::Native => "G_BYTE_ORDER",
    }
}

/// Expression reading an integer at byte offset `pos` of `st`.
fn c_read(st: &str, int_type: IntType, endian: Endian, pos: &str) -> String {
    if int_type.width() == 1 {
        format!("{}->data[{}]", st, pos)
    } else {
        format!("fu_memread_{}({}->data + {}, {})", int_type.mem_name(), st, pos, endian_glib(endian))
    }
}

/// Statement writing `value` as an integer at byte offset `pos` of `st`.
fn c_write(int_type: IntType, endian: Endian, pos: &str, value: &str) -> String {
    if int_type.width() == 1 {
        format!("st->data[{}] = {};", pos, value)
    } else {
        format!(
            "fu_memwrite_{}(st->data + {}, {}, {});",
            int_type.mem_name(),
            pos,
            value,
            endian_glib(endian)
        )
    }
}

/// C literal for an integer value; negative values stay decimal.
fn c_int(value: i128) -> String {
    if value < 0 {
        format!("{}", value)
    } else {
        format!("0x{:x}", value)
    }
}

/// C expression for a default or constant value of `item`.
fn c_value(registry: &Registry, obj: &StructObj, item: &StructItem, value: &Value) -> String {
    match value {
        Value::Int(v) => c_int(*v),
        Value::EnumItem(name) => match item.type_ {
            Type::Enum { id, .. } => {
                let enum_obj = registry.enum_obj(id);
                match enum_obj.item(name) {
                    Some(enum_item) => enum_obj.c_define(enum_item),
                    None => name.clone(),
                }
            }
            _ => name.clone(),
        },
        Value::Str(text) => format!("\"{}\"", c_string(text)),
        Value::Bytes(data) => format!("\"{}\"", c_bytes(data)),
        Value::StructSize => obj.c_define("SIZE"),
    }
}

/// GLib type of one element of an integer or enum item.
fn c_elem_type(registry: &Registry, item: &StructItem) -> String {
    match item.type_ {
        Type::Enum { id, .. } => registry.enum_obj(id).type_name.clone(),
        Type::Int(int_type) => int_type.c_type().to_string(),
        _ => "guint8".to_string(),
    }
}

/// `printf` conversion and cast rendering an integer of `int_type` as hex.
/// Signed values are printed as their unsigned bit pattern.
fn c_hex_format(int_type: IntType) -> (&'static str, String) {
    if int_type.width() == 8 {
        ("0x%\" G_GINT64_MODIFIER \"x", "(guint64) ".to_string())
    } else if int_type.is_signed() {
        ("0x%x", format!("(guint) ({}) ", int_type.c_type_unsigned()))
    } else {
        ("0x%x", "(guint) ".to_string())
    }
}

fn emit_enum(out: &mut Output, obj: &EnumObj) {
    // the type itself is always needed by struct accessors
    out.h.push_str("\ntypedef enum {\n");
    for item in &obj.items {
        match item.explicit {
            Some(value) => out.h.push_str(&format!("    {} = {},\n", obj.c_define(item), c_int(value))),
            None => out.h.push_str(&format!("    {},\n", obj.c_define(item))),
        }
    }
    if !obj.has_explicit_values() {
        out.h.push_str(&format!("    {},\n", obj.c_define_last()));
    }
    out.h.push_str(&format!("}} {};\n", obj.type_name));

    let mut body = String::new();
    for item in &obj.items {
        body.push_str(&format!(
            "    if (val == {})\n        return \"{}\";\n",
            obj.c_define(item),
            c_string(&item.text())
        ));
    }
    body.push_str("    return NULL;\n");
    out.function(
        obj.export(Derive::ToString),
        "const gchar *",
        &format!("{}_to_string({} val)", obj.symbol, obj.type_name),
        &body,
    );

    let mut body = format!(
        "    const gchar *data[{}] = {{0}};\n    guint idx = 0;\n",
        obj.items.len() + 1
    );
    if let Some(zero) = obj.item_by_value(0) {
        body.push_str(&format!(
            "    if (val == {})\n        return g_strdup(\"{}\");\n",
            obj.c_define(zero),
            c_string(&zero.text())
        ));
    }
    for item in obj.items.iter().filter(|item| item.value != 0) {
        body.push_str(&format!(
            "    if (val & {})\n        data[idx++] = \"{}\";\n",
            obj.c_define(item),
            c_string(&item.text())
        ));
    }
    body.push_str("    return g_strjoinv(\",\", (gchar **) data);\n");
    out.function(
        obj.export(Derive::ToBitString),
        "gchar *",
        &format!("{}_to_bitstring({} val)", obj.symbol, obj.type_name),
        &body,
    );

    let mut body = String::from(
        "    g_return_val_if_fail(val != NULL, FALSE);\n    g_return_val_if_fail(value != NULL, FALSE);\n",
    );
    for item in &obj.items {
        body.push_str(&format!(
            "    if (g_strcmp0(val, \"{}\") == 0) {{\n        *value = {};\n        return TRUE;\n    }}\n",
            c_string(&item.text()),
            obj.c_define(item)
        ));
    }
    body.push_str(&format!(
        "    g_set_error(error,\n                G_IO_ERROR,\n                G_IO_ERROR_NOT_FOUND,\n                \"%s is not a valid {}\",\n                val);\n    return FALSE;\n",
        obj.type_name
    ));
    out.function(
        obj.export(Derive::FromString),
        "gboolean",
        &format!("{}_from_string(const gchar *val, {} *value, GError **error)", obj.symbol, obj.type_name),
        &body,
    );
}

fn emit_struct(out: &mut Output, registry: &Registry, id: StructId) {
    let obj = registry.struct_obj(id);
    let size = obj.size();
    let has_constant = registry.has_constant(id);

    out.h.push_str(&format!("\n#define {} 0x{:x}\n", obj.c_define("SIZE"), size));
    for item in &obj.items {
        let field = item.snake_name();
        out.h.push_str(&format!(
            "#define {} 0x{:x}\n",
            obj.c_define(&format!("OFFSET_{}", field)),
            item.offset
        ));
        out.h.push_str(&format!(
            "#define {} 0x{:x}\n",
            obj.c_define(&format!("SIZE_{}", field)),
            item.size()
        ));
        if item.kind() == ItemKind::IntArray {
            out.h.push_str(&format!(
                "#define {} {}\n",
                obj.c_define(&format!("N_ELEMENTS_{}", field)),
                item.multiplier
            ));
        }
        if let (ItemKind::Scalar, Some(value)) = (item.kind(), &item.default) {
            out.h.push_str(&format!(
                "#define {} {}\n",
                obj.c_define(&format!("DEFAULT_{}", field)),
                c_value(registry, obj, item, value)
            ));
        }
    }

    for item in obj.items.iter().filter(|item| item.enabled()) {
        emit_accessors(out, registry, obj, item);
    }
    emit_to_string(out, registry, obj);
    if has_constant {
        emit_validate_internal(out, registry, obj);
        emit_validate(out, obj);
    }
    emit_parse(out, obj, has_constant);
    emit_new(out, registry, obj);
}

fn emit_accessors(out: &mut Output, registry: &Registry, obj: &StructObj, item: &StructItem) {
    let getter = format!("{}_get_{}", obj.symbol, item.snake_name());
    let setter = format!("{}_set_{}", obj.symbol, item.snake_name());
    let off = item.offset;
    let size = item.size();
    let field = format!("{}.{}", obj.type_name, item.name);

    match item.kind() {
        ItemKind::Scalar => {
            let ctype = c_elem_type(registry, item);
            let int_type = item.type_.int_type().unwrap_or(IntType::U8);
            out.function(
                item.getters,
                &ctype,
                &format!("{}(const GByteArray *st)", getter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, 0x0);\n    return ({}) {};\n",
                    ctype,
                    c_read("st", int_type, item.endian, &off.to_string())
                ),
            );
            out.function(
                item.setters,
                "void",
                &format!("{}(GByteArray *st, {} value)", setter, ctype),
                &format!(
                    "    g_return_if_fail(st != NULL);\n    {}\n",
                    c_write(int_type, item.endian, &off.to_string(), "value")
                ),
            );
        }
        ItemKind::IntArray => {
            let ctype = c_elem_type(registry, item);
            let int_type = item.type_.int_type().unwrap_or(IntType::U8);
            let pos = format!("{} + ({} * idx)", off, int_type.width());
            out.function(
                item.getters,
                &ctype,
                &format!("{}(const GByteArray *st, guint idx)", getter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, 0x0);\n    g_return_val_if_fail(idx < {}, 0x0);\n    return ({}) {};\n",
                    item.multiplier,
                    ctype,
                    c_read("st", int_type, item.endian, &pos)
                ),
            );
            out.function(
                item.setters,
                "void",
                &format!("{}(GByteArray *st, guint idx, {} value)", setter, ctype),
                &format!(
                    "    g_return_if_fail(st != NULL);\n    g_return_if_fail(idx < {});\n    {}\n",
                    item.multiplier,
                    c_write(int_type, item.endian, &pos, "value")
                ),
            );
        }
        ItemKind::Blob => {
            out.function(
                item.getters,
                "const guint8 *",
                &format!("{}(const GByteArray *st, gsize *bufsz)", getter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, NULL);\n    if (bufsz != NULL)\n        *bufsz = {};\n    return st->data + {};\n",
                    size, off
                ),
            );
            out.function(
                item.setters,
                "gboolean",
                &format!("{}(GByteArray *st, const guint8 *buf, gsize bufsz, GError **error)", setter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, FALSE);
    g_return_val_if_fail(buf != NULL, FALSE);
    g_return_val_if_fail(error == NULL || *error == NULL, FALSE);
    if (bufsz > {size}) {{
        g_set_error(error,
                    G_IO_ERROR,
                    G_IO_ERROR_INVALID_DATA,
                    \"data of 0x%x bytes does not fit in {field} of 0x%x bytes\",
                    (guint) bufsz,
                    (guint) {size});
        return FALSE;
    }}
    return fu_memcpy_safe(st->data, st->len, {off}, buf, bufsz, 0x0, bufsz, error);
",
                    size = size,
                    off = off,
                    field = field
                ),
            );
        }
        ItemKind::Guid => {
            out.function(
                item.getters,
                "const fwupd_guid_t *",
                &format!("{}(const GByteArray *st)", getter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, NULL);\n    return (const fwupd_guid_t *) (st->data + {});\n",
                    off
                ),
            );
            out.function(
                item.setters,
                "void",
                &format!("{}(GByteArray *st, const fwupd_guid_t *value)", setter),
                &format!(
                    "    g_return_if_fail(st != NULL);\n    g_return_if_fail(value != NULL);\n    memcpy(st->data + {}, value, sizeof(*value));\n",
                    off
                ),
            );
        }
        ItemKind::String => {
            out.function(
                item.getters,
                "gchar *",
                &format!("{}(const GByteArray *st)", getter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, NULL);\n    return fu_strsafe((const gchar *) (st->data + {}), {});\n",
                    off, size
                ),
            );
            out.function(
                item.setters,
                "gboolean",
                &format!("{}(GByteArray *st, const gchar *value, GError **error)", setter),
                &format!(
                    "    gsize len;
    g_return_val_if_fail(st != NULL, FALSE);
    g_return_val_if_fail(error == NULL || *error == NULL, FALSE);
    if (value == NULL) {{
        memset(st->data + {off}, 0x0, {size});
        return TRUE;
    }}
    len = strlen(value);
    if (len > {size}) {{
        g_set_error(error,
                    G_IO_ERROR,
                    G_IO_ERROR_INVALID_DATA,
                    \"string '%s' (0x%x bytes) does not fit in {field} of 0x%x bytes\",
                    value,
                    (guint) len,
                    (guint) {size});
        return FALSE;
    }}
    memset(st->data + {off}, 0x0, {size});
    return fu_memcpy_safe(st->data, st->len, {off}, (const guint8 *) value, len, 0x0, len, error);
",
                    off = off,
                    size = size,
                    field = field
                ),
            );
        }
        ItemKind::Struct => {
            out.function(
                item.getters,
                "GByteArray *",
                &format!("{}(const GByteArray *st)", getter),
                &format!(
                    "    g_autoptr(GByteArray) buf = g_byte_array_new();\n    g_return_val_if_fail(st != NULL, NULL);\n    g_byte_array_append(buf, st->data + {}, {});\n    return g_steal_pointer(&buf);\n",
                    off, size
                ),
            );
            out.function(
                item.setters,
                "gboolean",
                &format!("{}(GByteArray *st, const GByteArray *st_donor, GError **error)", setter),
                &format!(
                    "    g_return_val_if_fail(st != NULL, FALSE);
    g_return_val_if_fail(st_donor != NULL, FALSE);
    g_return_val_if_fail(error == NULL || *error == NULL, FALSE);
    if (st_donor->len > {size}) {{
        g_set_error(error,
                    G_IO_ERROR,
                    G_IO_ERROR_INVALID_DATA,
                    \"data of 0x%x bytes does not fit in {field} of 0x%x bytes\",
                    (guint) st_donor->len,
                    (guint) {size});
        return FALSE;
    }}
    memcpy(st->data + {off}, st_donor->data, st_donor->len);
    return TRUE;
",
                    size = size,
                    off = off,
                    field = field
                ),
            );
        }
    }
}

fn emit_to_string(out: &mut Output, registry: &Registry, obj: &StructObj) {
    let mut body = format!(
        "    g_autoptr(GString) str = g_string_new(\"{}:\\n\");\n    g_return_val_if_fail(st != NULL, NULL);\n",
        obj.type_name
    );
    for item in obj.items.iter().filter(|item| item.enabled()) {
        let field = item.snake_name();
        let getter = format!("{}_get_{}", obj.symbol, field);
        match item.kind() {
            ItemKind::Scalar => {
                let int_type = item.type_.int_type().unwrap_or(IntType::U8);
                let (conv, cast) = c_hex_format(int_type);
                match item.type_ {
                    Type::Enum { id, .. } if item.constant.is_none() => {
                        let enum_obj = registry.enum_obj(id);
                        body.push_str(&format!(
                            "    {{
        const gchar *tmp = {esym}_to_string({getter}(st));
        if (tmp != NULL) {{
            g_string_append_printf(str, \"  {field}: {conv} [%s]\\n\", {cast}{getter}(st), tmp);
        }} else {{
            g_string_append_printf(str, \"  {field}: {conv}\\n\", {cast}{getter}(st));
        }}
    }}
",
                            esym = enum_obj.symbol,
                            getter = getter,
                            field = field,
                            conv = conv,
                            cast = cast
                        ));
                    }
                    _ => body.push_str(&format!(
                        "    g_string_append_printf(str, \"  {}: {}\\n\", {}{}(st));\n",
                        field, conv, cast, getter
                    )),
                }
            }
            ItemKind::IntArray => {
                let int_type = item.type_.int_type().unwrap_or(IntType::U8);
                let (conv, cast) = c_hex_format(int_type);
                body.push_str(&format!(
                    "    {{
        g_autoptr(GString) tmp = g_string_new(NULL);
        for (guint i = 0; i < {n}; i++)
            g_string_append_printf(tmp, \"{conv},\", {cast}{getter}(st, i));
        if (tmp->len > 0)
            g_string_set_size(tmp, tmp->len - 1);
        g_string_append_printf(str, \"  {field}: %s\\n\", tmp->str);
    }}
",
                    n = item.multiplier,
                    conv = conv,
                    cast = cast,
                    getter = getter,
                    field = field
                ));
            }
            ItemKind::Blob => body.push_str(&format!(
                "    {{
        gsize bufsz = 0;
        const guint8 *buf = {getter}(st, &bufsz);
        g_autoptr(GString) tmp = g_string_new(NULL);
        for (gsize i = 0; i < bufsz; i++)
            g_string_append_printf(tmp, \"%02X\", buf[i]);
        g_string_append_printf(str, \"  {field}: 0x%s\\n\", tmp->str);
    }}
",
                getter = getter,
                field = field
            )),
            ItemKind::Guid => body.push_str(&format!(
                "    {{
        g_autofree gchar *tmp = fwupd_guid_to_string({getter}(st), FWUPD_GUID_FLAG_MIXED_ENDIAN);
        g_string_append_printf(str, \"  {field}: %s\\n\", tmp);
    }}
",
                getter = getter,
                field = field
            )),
            ItemKind::String => body.push_str(&format!(
                "    {{
        g_autofree gchar *tmp = {getter}(st);
        if (tmp != NULL)
            g_string_append_printf(str, \"  {field}: %s\\n\", tmp);
    }}
",
                getter = getter,
                field = field
            )),
            ItemKind::Struct => {
                let inner = match item.type_ {
                    Type::Struct(inner) => registry.struct_obj(inner).symbol.clone(),
                    _ => continue,
                };
                body.push_str(&format!(
                    "    {{
        g_autoptr(GByteArray) st_tmp = {getter}(st);
        g_autofree gchar *tmp = {inner}_to_string(st_tmp);
        g_string_append_printf(str, \"  {field}: %s\\n\", tmp);
    }}
",
                    getter = getter,
                    inner = inner,
                    field = field
                ));
            }
        }
    }
    body.push_str(
        "    if (str->len > 0)\n        g_string_set_size(str, str->len - 1);\n    return g_string_free(g_steal_pointer(&str), FALSE);\n",
    );
    out.function(
        obj.export(Derive::ToString),
        "gchar *",
        &format!("{}_to_string(const GByteArray *st)", obj.symbol),
        &body,
    );
}

fn emit_validate_internal(out: &mut Output, registry: &Registry, obj: &StructObj) {
    let mut body = String::from("    g_return_val_if_fail(st != NULL, FALSE);\n");
    for item in &obj.items {
        if let Type::Struct(inner) = item.type_ {
            if registry.has_constant(inner) {
                body.push_str(&format!(
                    "    {{
        GByteArray st_tmp = {{
            .data = (guint8 *) st->data + {off},
            .len = {size},
        }};
        if (!{inner}_validate_internal(&st_tmp, error))
            return FALSE;
    }}
",
                    off = item.offset,
                    size = item.size(),
                    inner = registry.struct_obj(inner).symbol
                ));
            }
        }
        let constant = match &item.constant {
            Some(constant) => constant,
            None => continue,
        };
        let literal = c_value(registry, obj, item, constant);
        let check = match item.kind() {
            ItemKind::Scalar => {
                let read = if item.getters.is_none() {
                    let int_type = item.type_.int_type().unwrap_or(IntType::U8);
                    format!(
                        "({}) {}",
                        int_type.c_type(),
                        c_read("st", int_type, item.endian, &item.offset.to_string())
                    )
                } else {
                    format!("{}_get_{}(st)", obj.symbol, item.snake_name())
                };
                format!("{} != {}", read, literal)
            }
            ItemKind::String => {
                let len = match constant {
                    Value::Str(text) => text.len(),
                    _ => item.size(),
                };
                format!("memcmp(st->data + {}, {}, {}) != 0", item.offset, literal, len)
            }
            _ => format!("memcmp(st->data + {}, {}, {}) != 0", item.offset, literal, item.size()),
        };
        body.push_str(&format!(
            "    if ({}) {{
        g_set_error_literal(error,
                            G_IO_ERROR,
                            G_IO_ERROR_INVALID_DATA,
                            \"constant {}.{} was not valid, expected {}\");
        return FALSE;
    }}
",
            check,
            obj.type_name,
            item.name,
            c_string(&constant.to_string())
        ));
    }
    body.push_str("    return TRUE;\n");
    out.function(
        obj.export(Derive::ValidateInternal),
        "gboolean",
        &format!("{}_validate_internal(GByteArray *st, GError **error)", obj.symbol),
        &body,
    );
}

fn emit_validate(out: &mut Output, obj: &StructObj) {
    let size = obj.size();
    out.function(
        obj.export(Derive::Validate),
        "gboolean",
        &format!("{}_validate(const guint8 *buf, gsize bufsz, gsize offset, GError **error)", obj.symbol),
        &format!(
            "    GByteArray st = {{0}};
    g_return_val_if_fail(buf != NULL, FALSE);
    g_return_val_if_fail(error == NULL || *error == NULL, FALSE);
    if (!fu_memchk_read(bufsz, offset, {size}, error)) {{
        g_prefix_error(error, \"invalid struct {name}: \");
        return FALSE;
    }}
    st.data = (guint8 *) buf + offset;
    st.len = {size};
    if (!{sym}_validate_internal(&st, error))
        return FALSE;
    return TRUE;
",
            size = size,
            name = obj.type_name,
            sym = obj.symbol
        ),
    );
    out.function(
        obj.export(Derive::ValidateBytes),
        "gboolean",
        &format!("{}_validate_bytes(GBytes *blob, gsize offset, GError **error)", obj.symbol),
        &format!(
            "    gsize bufsz = 0;\n    const guint8 *buf = g_bytes_get_data(blob, &bufsz);\n    return {}_validate(buf, bufsz, offset, error);\n",
            obj.symbol
        ),
    );
}

fn emit_parse(out: &mut Output, obj: &StructObj, has_constant: bool) {
    let size = obj.size();
    let validate = if has_constant {
        format!("    if (!{}_validate_internal(st, error))\n        return NULL;\n", obj.symbol)
    } else {
        String::new()
    };
    out.function(
        obj.export(Derive::Parse),
        "GByteArray *",
        &format!("{}_parse(const guint8 *buf, gsize bufsz, gsize offset, GError **error)", obj.symbol),
        &format!(
            "    g_autoptr(GByteArray) st = g_byte_array_new();
    g_autofree gchar *str = NULL;
    g_return_val_if_fail(buf != NULL, NULL);
    g_return_val_if_fail(error == NULL || *error == NULL, NULL);
    if (!fu_memchk_read(bufsz, offset, {size}, error)) {{
        g_prefix_error(error, \"invalid struct {name}: \");
        return NULL;
    }}
    g_byte_array_append(st, buf + offset, {size});
{validate}    str = {sym}_to_string(st);
    g_debug(\"%s\", str);
    return g_steal_pointer(&st);
",
            size = size,
            name = obj.type_name,
            validate = validate,
            sym = obj.symbol
        ),
    );
    out.function(
        obj.export(Derive::ParseBytes),
        "GByteArray *",
        &format!("{}_parse_bytes(GBytes *blob, gsize offset, GError **error)", obj.symbol),
        &format!(
            "    gsize bufsz = 0;\n    const guint8 *buf = g_bytes_get_data(blob, &bufsz);\n    return {}_parse(buf, bufsz, offset, error);\n",
            obj.symbol
        ),
    );
}

fn emit_new(out: &mut Output, registry: &Registry, obj: &StructObj) {
    let size = obj.size();
    let mut body = format!(
        "    GByteArray *st = g_byte_array_sized_new({size});\n    fu_byte_array_set_size(st, {size}, 0x0);\n",
        size = size
    );
    for item in &obj.items {
        if let Some(fill) = item.padding {
            body.push_str(&format!(
                "    memset(st->data + {}, 0x{:x}, {});\n",
                item.offset,
                fill,
                item.size()
            ));
            continue;
        }
        let value = match (&item.default, item.type_) {
            (Some(value), _) => value,
            (None, Type::Struct(inner)) => {
                body.push_str(&format!(
                    "    {{
        g_autoptr(GByteArray) st_donor = {}_new();
        memcpy(st->data + {}, st_donor->data, st_donor->len);
    }}
",
                    registry.struct_obj(inner).symbol,
                    item.offset
                ));
                continue;
            }
            (None, _) => continue,
        };
        let literal = c_value(registry, obj, item, value);
        match (item.kind(), value) {
            (ItemKind::Scalar, _) if !item.setters.is_none() => {
                body.push_str(&format!("    {}_set_{}(st, {});\n", obj.symbol, item.snake_name(), literal));
            }
            (ItemKind::Scalar, _) => {
                let int_type = item.type_.int_type().unwrap_or(IntType::U8);
                body.push_str(&format!(
                    "    {}\n",
                    c_write(int_type, item.endian, &item.offset.to_string(), &literal)
                ));
            }
            (_, Value::Str(text)) => {
                body.push_str(&format!("    memcpy(st->data + {}, {}, {});\n", item.offset, literal, text.len()));
            }
            _ => {
                body.push_str(&format!("    memcpy(st->data + {}, {}, {});\n", item.offset, literal, item.size()));
            }
        }
    }
    body.push_str("    return st;\n");
    out.function(obj.export(Derive::New), "GByteArray *", &format!("{}_new(void)", obj.symbol), &body);
}
