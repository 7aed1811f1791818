use std::fmt;
use structgen_runtime::{
    check_read, guid_to_string, hex_upper, ByteBuffer, ByteBufferMut, MemError, GUID_SIZE,
};
use tracing::{debug, trace};

use crate::{
    error::RecordError,
    types::{EnumObj, ItemKind, Registry, StructId, StructItem, StructObj, Type, Value},
};

/// The decoded value of one struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i128),
    IntArray(Vec<i128>),
    Bytes(Vec<u8>),
    /// Strings read back without their NUL padding; an empty field reads as `""`.
    Str(String),
    Guid([u8; GUID_SIZE]),
}

/// An owned instance of a struct, backed by exactly `size` bytes.
///
/// This applies the same rules as the generated C functions, so it can be
/// used to check a definition without compiling anything:
///
/// ```
/// use structgen_compiler::{compile_registry, CompileOptions, Record};
///
/// let registry = compile_registry(
///     "struct Hdr {\n  size: u16le = $struct_size,\n  flags: u8,\n}\n",
///     &CompileOptions::default(),
/// ).unwrap();
/// let st = Record::new_by_name(&registry, "Hdr").unwrap();
/// assert_eq!(st.data(), &[0x03, 0x00, 0x00]);
/// ```
#[derive(Debug, Clone)]
pub struct Record<'r> {
    registry: &'r Registry,
    id:       StructId,
    buf:      ByteBufferMut,
}

impl<'r> Record<'r> {
    /// A zero-filled record with padding and defaults applied in
    /// declaration order, including those of nested structs.
    pub fn new(registry: &'r Registry, id: StructId) -> Result<Self, RecordError> {
        let mut buf = ByteBufferMut::with_size(registry.struct_obj(id).size());
        apply_defaults(registry, id, &mut buf, 0)?;
        Ok(Record { registry, id, buf })
    }

    pub fn new_by_name(registry: &'r Registry, name: &str) -> Result<Self, RecordError> {
        Self::new(registry, lookup(registry, name)?)
    }

    /// Copy `size` bytes at `offset` out of `buf` and check every constant.
    pub fn parse(
        registry: &'r Registry,
        id: StructId,
        buf: &[u8],
        offset: usize,
    ) -> Result<Self, RecordError> {
        let view = checked_view(registry.struct_obj(id), buf, offset)?;
        let record = Record { registry, id, buf: ByteBufferMut::from_slice(view.data()) };
        check_constants(registry, id, record.buf.as_view(), 0)?;
        debug!("{}", record);
        Ok(record)
    }

    pub fn parse_by_name(
        registry: &'r Registry,
        name: &str,
        buf: &[u8],
        offset: usize,
    ) -> Result<Self, RecordError> {
        Self::parse(registry, lookup(registry, name)?, buf, offset)
    }

    /// Check bounds and constants of the struct at `offset` without copying.
    pub fn validate(
        registry: &Registry,
        id: StructId,
        buf: &[u8],
        offset: usize,
    ) -> Result<(), RecordError> {
        let view = checked_view(registry.struct_obj(id), buf, offset)?;
        check_constants(registry, id, view, 0)
    }

    pub fn obj(&self) -> &'r StructObj {
        self.registry.struct_obj(self.id)
    }

    pub fn data(&self) -> &[u8] {
        self.buf.data()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.into_vec()
    }

    /// Read a member by source or snake_case name.
    pub fn get(&self, field: &str) -> Result<FieldValue, RecordError> {
        let item = self.item(field)?;
        Ok(read_field(item, self.buf.as_view(), 0)?)
    }

    /// Write a member by source or snake_case name.
    pub fn set(&mut self, field: &str, value: FieldValue) -> Result<(), RecordError> {
        let obj = self.obj();
        let item = self.item(field)?;
        let mismatch = |expected: &str| RecordError::ValueMismatch {
            name:     obj.type_name.clone(),
            field:    item.name.clone(),
            expected: expected.to_string(),
        };
        trace!("{}.{} = {:?}", obj.type_name, item.name, value);

        match (item.kind(), value) {
            (ItemKind::Scalar, FieldValue::Int(v)) => {
                let int_type = item.type_.int_type().ok_or_else(|| mismatch("an integer"))?;
                if !int_type.contains(v) {
                    return Err(mismatch(int_type.name()));
                }
                self.buf.write_uint(item.offset, int_type.width(), int_type.to_bits(v), item.endian)?;
            }
            (ItemKind::IntArray, FieldValue::IntArray(values)) => {
                let int_type = item.type_.int_type().ok_or_else(|| mismatch("an integer array"))?;
                if values.len() != item.multiplier {
                    return Err(mismatch(&format!("{} elements", item.multiplier)));
                }
                if values.iter().any(|v| !int_type.contains(*v)) {
                    return Err(mismatch(int_type.name()));
                }
                for (idx, v) in values.iter().enumerate() {
                    let pos = item.offset + idx * int_type.width();
                    self.buf.write_uint(pos, int_type.width(), int_type.to_bits(*v), item.endian)?;
                }
            }
            (ItemKind::Blob | ItemKind::Struct, FieldValue::Bytes(data)) => {
                if data.len() > item.size() {
                    return Err(RecordError::BlobSize {
                        name:  obj.type_name.clone(),
                        field: item.name.clone(),
                        len:   data.len(),
                        size:  item.size(),
                    });
                }
                self.buf.write_bytes(item.offset, &data)?;
            }
            (ItemKind::Guid, FieldValue::Guid(guid)) => {
                self.buf.write_bytes(item.offset, &guid)?;
            }
            (ItemKind::String, FieldValue::Str(text)) => {
                // anything else would read back as `.`
                if !text.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
                    return Err(mismatch("printable ASCII"));
                }
                if text.len() > item.size() {
                    return Err(RecordError::StringTooLong {
                        name:  obj.type_name.clone(),
                        field: item.name.clone(),
                        len:   text.len(),
                        size:  item.size(),
                    });
                }
                self.buf.fill(item.offset, item.size(), 0)?;
                self.buf.write_bytes(item.offset, text.as_bytes())?;
            }
            (kind, _) => return Err(mismatch(&format!("{:?} value", kind).to_lowercase())),
        }
        Ok(())
    }

    /// Disabled members have no accessors.
    fn item(&self, field: &str) -> Result<&'r StructItem, RecordError> {
        let obj = self.obj();
        obj.item(field)
            .filter(|item| item.enabled())
            .ok_or_else(|| RecordError::UnknownField {
                name:  obj.type_name.clone(),
                field: field.to_string(),
            })
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = render(self.registry, self.id, self.buf.as_view(), 0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Look up a struct by its source or C type name.
fn lookup(registry: &Registry, name: &str) -> Result<StructId, RecordError> {
    registry
        .find_struct(name)
        .ok_or_else(|| RecordError::UnknownStruct(name.to_string()))
}

fn checked_view<'a>(obj: &StructObj, buf: &'a [u8], offset: usize) -> Result<ByteBuffer<'a>, RecordError> {
    let size = obj.size();
    check_read(buf.len(), offset, size).map_err(|source| RecordError::OutOfBounds {
        name: obj.type_name.clone(),
        source,
    })?;
    Ok(ByteBuffer::new(&buf[offset..offset + size]))
}

/// Integer value of a default or constant, resolving enum item names.
fn int_value(registry: &Registry, item: &StructItem, value: &Value) -> Option<i128> {
    match (value, item.type_) {
        (Value::Int(v), _) => Some(*v),
        (Value::EnumItem(name), Type::Enum { id, .. }) => {
            registry.enum_obj(id).item(name).map(|enum_item| enum_item.value)
        }
        _ => None,
    }
}

fn apply_defaults(
    registry: &Registry,
    id: StructId,
    buf: &mut ByteBufferMut,
    base: usize,
) -> Result<(), MemError> {
    for item in &registry.struct_obj(id).items {
        let pos = base + item.offset;
        if let Some(fill) = item.padding {
            buf.fill(pos, item.size(), fill)?;
            continue;
        }
        match (&item.default, item.type_) {
            (Some(value), _) => write_value(registry, buf, item, pos, value)?,
            (None, Type::Struct(inner)) => apply_defaults(registry, inner, buf, pos)?,
            _ => {}
        }
    }
    Ok(())
}

fn write_value(
    registry: &Registry,
    buf: &mut ByteBufferMut,
    item: &StructItem,
    pos: usize,
    value: &Value,
) -> Result<(), MemError> {
    match value {
        Value::Str(text) => buf.write_bytes(pos, text.as_bytes()),
        Value::Bytes(data) => buf.write_bytes(pos, data),
        _ => match (item.type_.int_type(), int_value(registry, item, value)) {
            (Some(int_type), Some(v)) => {
                buf.write_uint(pos, int_type.width(), int_type.to_bits(v), item.endian)
            }
            _ => Ok(()),
        },
    }
}

fn check_constants(
    registry: &Registry,
    id: StructId,
    view: ByteBuffer<'_>,
    base: usize,
) -> Result<(), RecordError> {
    let obj = registry.struct_obj(id);
    for item in &obj.items {
        if let Type::Struct(inner) = item.type_ {
            check_constants(registry, inner, view, base + item.offset)?;
        }
        let constant = match &item.constant {
            Some(constant) => constant,
            None => continue,
        };
        let pos = base + item.offset;
        let valid = match constant {
            Value::Str(text) => view.read_bytes(pos, text.len())? == text.as_bytes(),
            Value::Bytes(data) => view.read_bytes(pos, data.len())? == data.as_slice(),
            _ => match (item.type_.int_type(), int_value(registry, item, constant)) {
                (Some(int_type), Some(expected)) => {
                    let raw = view.read_uint(pos, int_type.width(), item.endian)?;
                    int_type.from_bits(raw) == expected
                }
                _ => true,
            },
        };
        if !valid {
            return Err(RecordError::ConstantMismatch {
                name:     obj.type_name.clone(),
                field:    item.name.clone(),
                expected: constant.to_string(),
            });
        }
    }
    Ok(())
}

fn read_field(item: &StructItem, view: ByteBuffer<'_>, base: usize) -> Result<FieldValue, MemError> {
    let pos = base + item.offset;
    let value = match item.kind() {
        ItemKind::Scalar | ItemKind::IntArray => {
            let int_type = item.type_.int_type().ok_or(MemError::InvalidWidth(0))?;
            let mut values = Vec::new();
            for idx in 0..item.multiplier.max(1) {
                let raw = view.read_uint(pos + idx * int_type.width(), int_type.width(), item.endian)?;
                values.push(int_type.from_bits(raw));
            }
            if item.kind() == ItemKind::Scalar {
                FieldValue::Int(values[0])
            } else {
                FieldValue::IntArray(values)
            }
        }
        ItemKind::Blob | ItemKind::Struct => FieldValue::Bytes(view.read_bytes(pos, item.size())?.to_vec()),
        ItemKind::Guid => {
            let mut guid = [0u8; GUID_SIZE];
            guid.copy_from_slice(view.read_bytes(pos, GUID_SIZE)?);
            FieldValue::Guid(guid)
        }
        ItemKind::String => FieldValue::Str(view.read_string(pos, item.size())?.unwrap_or_default()),
    };
    Ok(value)
}

fn render(registry: &Registry, id: StructId, view: ByteBuffer<'_>, base: usize) -> Result<String, MemError> {
    let obj = registry.struct_obj(id);
    let mut text = format!("{}:\n", obj.type_name);

    for item in obj.items.iter().filter(|item| item.enabled()) {
        let field = item.snake_name();
        let pos = base + item.offset;
        match item.kind() {
            ItemKind::Scalar | ItemKind::IntArray => {
                let int_type = item.type_.int_type().ok_or(MemError::InvalidWidth(0))?;
                let mut parts = Vec::new();
                for idx in 0..item.multiplier.max(1) {
                    let raw = view.read_uint(pos + idx * int_type.width(), int_type.width(), item.endian)?;
                    parts.push(format!("0x{:x}", int_type.to_bits(int_type.from_bits(raw))));
                }
                let mut line = parts.join(",");
                if let (ItemKind::Scalar, Type::Enum { id: enum_id, .. }) = (item.kind(), item.type_) {
                    if item.constant.is_none() {
                        let raw = view.read_uint(pos, int_type.width(), item.endian)?;
                        if let Some(name) = registry.enum_obj(enum_id).to_text(int_type.from_bits(raw)) {
                            line = format!("{} [{}]", line, name);
                        }
                    }
                }
                text.push_str(&format!("  {}: {}\n", field, line));
            }
            ItemKind::Blob => {
                let data = view.read_bytes(pos, item.size())?;
                text.push_str(&format!("  {}: 0x{}\n", field, hex_upper(data)));
            }
            ItemKind::Guid => {
                let mut guid = [0u8; GUID_SIZE];
                guid.copy_from_slice(view.read_bytes(pos, GUID_SIZE)?);
                text.push_str(&format!("  {}: {}\n", field, guid_to_string(&guid)));
            }
            ItemKind::String => {
                if let Some(value) = view.read_string(pos, item.size())? {
                    text.push_str(&format!("  {}: {}\n", field, value));
                }
            }
            ItemKind::Struct => {
                if let Type::Struct(inner) = item.type_ {
                    let nested = render(registry, inner, view, pos)?;
                    text.push_str(&format!("  {}: {}\n", field, nested));
                }
            }
        }
    }

    text.pop();
    Ok(text)
}

/// Look up the value of an enum item from its text form, e.g. `large-file`.
pub fn enum_from_string(obj: &EnumObj, text: &str) -> Result<i128, RecordError> {
    obj.from_text(text).ok_or_else(|| RecordError::EnumNotFound {
        name:  obj.type_name.clone(),
        value: text.to_string(),
    })
}
