use crate::{
    error::StructgenError,
    tokenizer::{Line, LineKind},
    types::{
        Derive, Dialect, EnumItem, EnumObj, IntType, ObjRef, Registry, StructItem, StructObj, Type,
        Value,
    },
    utils::{error, quote},
};
use lazy_static::lazy_static;
use regex::Regex;
use structgen_runtime::{Endian, GUID_SIZE};
use tracing::{debug, trace};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref ARRAY:      Regex = Regex::new(r"^\[\s*([^;\s]+)\s*;\s*(0x[0-9A-Fa-f]+|[0-9]+)\s*\]$").unwrap();
    static ref HEX:        Regex = Regex::new(r"^0x[0-9A-Fa-f_]+$").unwrap();
    static ref BIN:        Regex = Regex::new(r"^0b[01_]+$").unwrap();
    static ref DEC:        Regex = Regex::new(r"^-?[0-9][0-9_]*$").unwrap();
}

/// Names that are lowered to the `String` type.
const STRING_NAMES: [&str; 3] = ["s", "char", "string"];
/// Names that are lowered to the `Guid` type.
const GUID_NAMES: [&str; 2] = ["guid", "Guid"];

/// Parse a type token such as `u32le`, `3u16be`, `[u8; 0x10]`, `guid` or the
/// name of an earlier struct or enum.
///
/// Returns the type, its byte order and the element count (0 for scalars).
pub fn parse_type(token: &str, registry: &Registry) -> Result<(Type, Endian, usize), String> {
    let token = token.trim();
    let (mut typestr, multiplier) = if let Some(caps) = ARRAY.captures(token) {
        let count = &caps[2];
        let multiplier = match count.strip_prefix("0x") {
            Some(hex) => usize::from_str_radix(hex, 16),
            None => count.parse::<usize>(),
        }
        .map_err(|_| format!("invalid array size: {}", count))?;
        (caps[1].to_string(), multiplier)
    } else {
        let split = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
        let multiplier = if split > 0 {
            token[..split]
                .parse::<usize>()
                .map_err(|_| format!("invalid multiplier: {}", &token[..split]))?
        } else {
            0
        };
        (token[split..].to_string(), multiplier)
    };

    match registry.lookup(&typestr) {
        Some(ObjRef::Struct(id)) => {
            if multiplier > 0 {
                return Err(format!("nested struct {} cannot be an array", typestr));
            }
            let size = registry.struct_obj(id).size();
            return Ok((Type::Struct(id), Endian::Native, size));
        }
        Some(ObjRef::Enum(id)) => {
            let obj = registry.enum_obj(id);
            let repr = obj.repr.ok_or_else(|| format!("no repr for: {}", typestr))?;
            return Ok((Type::Enum { id, repr }, obj.repr_endian, multiplier));
        }
        None => {}
    }

    let mut endian = Endian::Native;
    for (suffix, order) in [("le", Endian::Little), ("be", Endian::Big)] {
        if let Some(base) = typestr.strip_suffix(suffix) {
            if IntType::from_name(base).is_some() {
                endian = order;
                typestr = base.to_string();
                break;
            }
        }
    }

    if let Some(int_type) = IntType::from_name(&typestr) {
        return Ok((Type::Int(int_type), endian, multiplier));
    }
    if STRING_NAMES.contains(&typestr.as_str()) {
        return Ok((Type::String, Endian::Native, multiplier));
    }
    if GUID_NAMES.contains(&typestr.as_str()) {
        return Ok((Type::Guid, Endian::Native, GUID_SIZE));
    }
    Err(format!("invalid type: {}", typestr))
}

/// Parse an integer literal: decimal, `0x` hex or `0b` binary, with
/// underscores allowed, plus the `uN::MAX` shorthands.
pub fn parse_int(text: &str) -> Option<i128> {
    let text = text.trim();
    let max = match text {
        "u8::MAX" => Some(IntType::U8.max()),
        "u16::MAX" => Some(IntType::U16.max()),
        "u24::MAX" => Some(IntType::U24.max()),
        "u32::MAX" => Some(IntType::U32.max()),
        "u64::MAX" => Some(IntType::U64.max()),
        _ => None,
    };
    if max.is_some() {
        return max;
    }
    if HEX.is_match(text) {
        return i128::from_str_radix(&text[2..].replace('_', ""), 16).ok();
    }
    if BIN.is_match(text) {
        return i128::from_str_radix(&text[2..].replace('_', ""), 2).ok();
    }
    if DEC.is_match(text) {
        return text.replace('_', "").parse::<i128>().ok();
    }
    None
}

/// Parse one `name: TYPE ...` member line of a struct block.
///
/// The returned item is stamped with `offset`; the caller advances the
/// running offset by `item.size()`.
pub fn parse_field_line(
    text: &str,
    line: usize,
    offset: usize,
    registry: &Registry,
    dialect: Dialect,
) -> Result<StructItem, StructgenError> {
    let body = match dialect {
        Dialect::Rust => text.strip_suffix(',').ok_or_else(|| {
            error(&format!("invalid struct line: {} -- needs trailing comma", text), line)
        })?,
        Dialect::Plain => text.strip_suffix(',').unwrap_or(text),
    };

    let (name, rest) = body
        .split_once(':')
        .ok_or_else(|| error(&format!("invalid struct line: {}", text), line))?;
    let name = name.trim();
    if !IDENTIFIER.is_match(name) {
        return Err(error(&format!("invalid field name {}", quote(name)), line));
    }

    let (type_token, default, constant) = match dialect {
        Dialect::Rust => split_rust_clauses(rest),
        Dialect::Plain => split_plain_clauses(rest),
    };

    let mut item = StructItem::new(name, line, offset);
    let (type_, endian, multiplier) =
        parse_type(&type_token, registry).map_err(|msg| error(&format!("{}: {}", msg, body), line))?;
    item.type_ = type_;
    item.endian = endian;
    item.multiplier = multiplier;
    if multiplier.max(1).checked_mul(item.type_.width()).is_none() {
        return Err(error("struct size overflow", line));
    }

    if let Some(text) = constant {
        let value = parse_value(&item, &text, registry, dialect).map_err(|msg| error(&msg, line))?;
        item.default = Some(value.clone());
        item.constant = Some(value);
    } else if let Some(text) = default {
        if let Some(fill) = padding_byte(&item, &text) {
            item.padding = Some(fill);
        } else {
            let value = parse_value(&item, &text, registry, dialect).map_err(|msg| error(&msg, line))?;
            item.default = Some(value);
        }
    }

    trace!("{}: {} bytes at 0x{:x}", item.name, item.size(), item.offset);
    Ok(item)
}

/// `TYPE`, `TYPE = DEFAULT` or `TYPE == CONSTANT`.
fn split_rust_clauses(rest: &str) -> (String, Option<String>, Option<String>) {
    match rest.split_once('=') {
        None => (rest.trim().to_string(), None, None),
        Some((ty, value)) => match value.strip_prefix('=') {
            Some(constant) => (ty.trim().to_string(), None, Some(constant.trim().to_string())),
            None => (ty.trim().to_string(), Some(value.trim().to_string()), None),
        },
    }
}

/// `TYPE[: DEFAULT][:: CONSTANT]`, where either clause may also be spelled
/// `default=VALUE` or `const=VALUE`.
fn split_plain_clauses(rest: &str) -> (String, Option<String>, Option<String>) {
    let mut parts = rest.splitn(3, ':');
    let ty = parts.next().unwrap_or_default().trim().to_string();
    let mut default = None;
    let mut constant = None;

    let clauses = [parts.next(), parts.next().map(|c| c.strip_prefix(':').unwrap_or(c))];
    for (idx, clause) in clauses.into_iter().enumerate() {
        let clause = match clause.map(str::trim) {
            Some(clause) if !clause.is_empty() => clause,
            _ => continue,
        };
        if let Some(value) = clause.strip_prefix("const=") {
            constant = Some(value.trim().to_string());
        } else if let Some(value) = clause.strip_prefix("default=") {
            default = Some(value.trim().to_string());
        } else if idx == 0 {
            default = Some(clause.to_string());
        } else {
            constant = Some(clause.to_string());
        }
    }
    (ty, default, constant)
}

/// A 4-character `0xNN` default on a byte array fills the whole field.
fn padding_byte(item: &StructItem, text: &str) -> Option<u8> {
    if item.type_ != Type::Int(IntType::U8) || item.multiplier == 0 || text.len() != 4 {
        return None;
    }
    let hex = text.strip_prefix("0x")?;
    u8::from_str_radix(hex, 16).ok()
}

fn parse_hex_data(item: &StructItem, text: &str) -> Result<Vec<u8>, String> {
    let hex = text
        .strip_prefix("0x")
        .ok_or_else(|| format!("0x prefix for hex number expected, got: {}", text))?
        .replace('_', "");
    if hex.len() % 2 != 0 || hex.len() / 2 != item.size() {
        return Err(format!("data has to be {} bytes exactly", item.size()));
    }
    hex::decode(&hex).map_err(|e| format!("invalid hex data {}: {}", text, e))
}

fn parse_value(
    item: &StructItem,
    text: &str,
    registry: &Registry,
    dialect: Dialect,
) -> Result<Value, String> {
    match item.type_ {
        Type::Enum { id, .. } => {
            let obj = registry.enum_obj(id);
            if item.multiplier > 0 {
                return Err(format!("cannot set a value on enum array {}", item.name));
            }
            match obj.item(text) {
                Some(enum_item) => Ok(Value::EnumItem(enum_item.name.clone())),
                None => {
                    let names: Vec<&str> = obj.items.iter().map(|i| i.name.as_str()).collect();
                    Err(format!("enum default unknown, got {} expected: {:?}", text, names))
                }
            }
        }
        Type::String => {
            let value = match dialect {
                Dialect::Rust => text
                    .strip_prefix('"')
                    .and_then(|t| t.strip_suffix('"'))
                    .ok_or_else(|| format!("string default {} needs double quotes", text))?,
                Dialect::Plain => text,
            };
            if value.len() > item.size() {
                return Err(format!(
                    "string {} is longer than the field size of {} bytes",
                    quote(value),
                    item.size()
                ));
            }
            Ok(Value::Str(value.to_string()))
        }
        Type::Guid | Type::Struct(_) => Ok(Value::Bytes(parse_hex_data(item, text)?)),
        Type::Int(IntType::U8) if item.multiplier > 0 => Ok(Value::Bytes(parse_hex_data(item, text)?)),
        Type::Int(_) if item.multiplier > 0 => {
            Err(format!("cannot set a value on integer array {}", item.name))
        }
        Type::Int(int_type) => {
            let value = match text {
                "$struct_size" => return Ok(Value::StructSize),
                "$struct_offset" => item.offset as i128,
                _ => parse_int(text).ok_or_else(|| format!("invalid integer {}", quote(text)))?,
            };
            if !int_type.contains(value) {
                return Err(format!("value {} does not fit in {}", text, int_type.name()));
            }
            Ok(Value::Int(value))
        }
    }
}

/// Parse one `Name[ = VALUE]` member line of an enum block.
fn parse_enum_line(
    obj: &EnumObj,
    text: &str,
    line: usize,
    dialect: Dialect,
) -> Result<EnumItem, StructgenError> {
    let body = match dialect {
        Dialect::Rust => text.strip_suffix(',').ok_or_else(|| {
            error(&format!("invalid enum line: {} -- needs trailing comma", text), line)
        })?,
        Dialect::Plain => text.strip_suffix(',').unwrap_or(text),
    };
    let (name, explicit) = match body.split_once('=') {
        Some((name, value)) => {
            let value = parse_int(value)
                .ok_or_else(|| error(&format!("invalid integer {}", quote(value.trim())), line))?;
            (name.trim(), Some(value))
        }
        None => (body.trim(), None),
    };
    if !IDENTIFIER.is_match(name) {
        return Err(error(&format!("invalid enum item name {}", quote(name)), line));
    }
    Ok(EnumItem {
        name: name.to_string(),
        line,
        explicit,
        value: explicit.unwrap_or_else(|| obj.next_value()),
    })
}

fn parse_repr(text: &str) -> Result<(IntType, Endian), String> {
    let mut endian = Endian::Native;
    let mut base = text;
    for (suffix, order) in [("le", Endian::Little), ("be", Endian::Big)] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            base = stripped;
            endian = order;
        }
    }
    IntType::from_name(base)
        .map(|int_type| (int_type, endian))
        .ok_or_else(|| format!("invalid type: {}", text))
}

enum Block {
    Struct { obj: StructObj, offset: usize },
    Enum(EnumObj),
}

/// Build the registry of every struct and enum in a tokenized file.
///
/// Objects are registered when their block closes, so a block can only
/// refer to objects closed before it.
pub fn parse_definitions(
    lines: &[Line],
    dialect: Dialect,
    prefix: &str,
) -> Result<Registry, StructgenError> {
    let mut registry = Registry::new();
    let mut block: Option<Block> = None;
    let mut derives: Vec<(String, usize)> = Vec::new();
    let mut repr: Option<(IntType, Endian)> = None;

    for line in lines {
        match &line.kind {
            LineKind::StructStart(name) | LineKind::EnumStart(name) => {
                if let Some(Block::Struct { obj, .. }) = &block {
                    return Err(error(&format!("struct {} is not closed", obj.name), line.line));
                }
                if let Some(Block::Enum(obj)) = &block {
                    return Err(error(&format!("enum {} is not closed", obj.name), line.line));
                }
                if registry.lookup(name).is_some() {
                    return Err(error(&format!("{} already defined", name), line.line));
                }
                block = Some(match &line.kind {
                    LineKind::StructStart(_) => {
                        if repr.is_some() {
                            return Err(error("repr is only valid for an enum", line.line));
                        }
                        Block::Struct { obj: StructObj::new(name, prefix, line.line), offset: 0 }
                    }
                    _ => {
                        let mut obj = EnumObj::new(name, prefix, line.line);
                        if let Some((int_type, endian)) = repr.take() {
                            obj.repr = Some(int_type);
                            obj.repr_endian = endian;
                        }
                        Block::Enum(obj)
                    }
                });
            }
            LineKind::Derive(names) => {
                if block.is_some() {
                    return Err(error("attributes are not allowed inside a block", line.line));
                }
                derives.extend(names.iter().map(|name| (name.clone(), line.line)));
            }
            LineKind::Repr(text) => {
                if block.is_some() {
                    return Err(error("attributes are not allowed inside a block", line.line));
                }
                repr = Some(parse_repr(text).map_err(|msg| error(&msg, line.line))?);
            }
            LineKind::BlockEnd => {
                let closed = block
                    .take()
                    .ok_or_else(|| error("unexpected } outside of a block", line.line))?;
                let requested = std::mem::take(&mut derives);
                close_block(&mut registry, closed, requested, dialect)?;
            }
            LineKind::Member(text) => match &mut block {
                None => {
                    return Err(error(&format!("{} is outside of a block", quote(text)), line.line));
                }
                Some(Block::Struct { obj, offset }) => {
                    let item = parse_field_line(text, line.line, *offset, &registry, dialect)?;
                    *offset = offset
                        .checked_add(item.size())
                        .ok_or_else(|| error("struct size overflow", line.line))?;
                    obj.items.push(item);
                }
                Some(Block::Enum(obj)) => {
                    let item = parse_enum_line(obj, text, line.line, dialect)?;
                    obj.items.push(item);
                }
            },
        }
    }

    match block {
        Some(Block::Struct { obj, .. }) => {
            Err(error(&format!("struct {} is not closed", obj.name), obj.line))
        }
        Some(Block::Enum(obj)) => Err(error(&format!("enum {} is not closed", obj.name), obj.line)),
        None => Ok(registry),
    }
}

fn close_block(
    registry: &mut Registry,
    block: Block,
    requested: Vec<(String, usize)>,
    dialect: Dialect,
) -> Result<(), StructgenError> {
    let (obj_ref, name, is_struct) = match block {
        Block::Struct { mut obj, offset } => {
            for item in &mut obj.items {
                if item.default == Some(Value::StructSize) {
                    item.default = Some(Value::Int(offset as i128));
                }
                if item.constant == Some(Value::StructSize) {
                    item.constant = Some(Value::Int(offset as i128));
                }
            }
            debug!("struct {}: {} items, {} bytes", obj.type_name, obj.items.len(), offset);
            let name = obj.name.clone();
            (ObjRef::Struct(registry.add_struct(obj)?), name, true)
        }
        Block::Enum(obj) => {
            debug!("enum {}: {} items", obj.type_name, obj.items.len());
            let name = obj.name.clone();
            (ObjRef::Enum(registry.add_enum(obj)?), name, false)
        }
    };

    let mut derives = Vec::new();
    for (text, line) in requested {
        let derive = Derive::from_name(&text)
            .ok_or_else(|| error(&format!("unknown derive: {}", text), line))?;
        let valid = if is_struct { derive.for_struct() } else { derive.for_enum() };
        if !valid {
            return Err(error(&format!("derive {} is not supported for {}", text, name), line));
        }
        derives.push(derive);
    }
    if derives.is_empty() && is_struct && dialect == Dialect::Plain {
        derives = vec![Derive::New, Derive::Parse, Derive::Validate, Derive::ToString];
    }
    for derive in derives {
        registry.add_public_export(obj_ref, derive);
    }
    Ok(())
}
