use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use structgen_runtime::Endian;

use crate::{
    error::StructgenError,
    utils::{camel_to_snake, quote, verifier_error},
};

/// Source syntax of a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Dialect {
    /// `.struct` files: `name: TYPE[: DEFAULT][:: CONSTANT]`
    Plain,
    /// `.rs` files: `name: TYPE[ = DEFAULT | == CONSTANT],`
    #[default]
    Rust,
}

/// How a generated function is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum Export {
    #[default]
    None,
    Private,
    Public,
}

impl Export {
    /// Storage class prefix for a C function exported at this level.
    pub fn c_linkage(self) -> &'static str {
        match self {
            Export::Public => "",
            _ => "G_GNUC_UNUSED static ",
        }
    }

    pub fn is_none(self) -> bool {
        self == Export::None
    }
}

/// A generation capability requested with `#[derive(...)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Derive {
    New,
    Parse,
    ParseBytes,
    Validate,
    ValidateBytes,
    /// Constant checks shared by parse and validate; never requested directly.
    ValidateInternal,
    ToString,
    ToBitString,
    FromString,
    Getters,
    Setters,
}

impl Derive {
    /// Looks up a derive by the name used in `#[derive(...)]`.
    pub fn from_name(name: &str) -> Option<Derive> {
        let derive = match name {
            "New" => Derive::New,
            "Parse" => Derive::Parse,
            "ParseBytes" => Derive::ParseBytes,
            "Validate" => Derive::Validate,
            "ValidateBytes" => Derive::ValidateBytes,
            "ToString" => Derive::ToString,
            "ToBitString" => Derive::ToBitString,
            "FromString" => Derive::FromString,
            "Getters" => Derive::Getters,
            "Setters" => Derive::Setters,
            _ => return None,
        };
        Some(derive)
    }

    pub fn for_struct(self) -> bool {
        !matches!(self, Derive::ToBitString | Derive::FromString)
    }

    pub fn for_enum(self) -> bool {
        matches!(self, Derive::ToString | Derive::ToBitString | Derive::FromString)
    }
}

/// Integer storage types, including the width of enum representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntType {
    U8,
    U16,
    U24,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl IntType {
    pub fn from_name(name: &str) -> Option<IntType> {
        let ty = match name {
            "u8" => IntType::U8,
            "u16" => IntType::U16,
            "u24" => IntType::U24,
            "u32" => IntType::U32,
            "u64" => IntType::U64,
            "i8" => IntType::I8,
            "i16" => IntType::I16,
            "i32" => IntType::I32,
            "i64" => IntType::I64,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntType::U8 => "u8",
            IntType::U16 => "u16",
            IntType::U24 => "u24",
            IntType::U32 => "u32",
            IntType::U64 => "u64",
            IntType::I8 => "i8",
            IntType::I16 => "i16",
            IntType::I32 => "i32",
            IntType::I64 => "i64",
        }
    }

    /// Width in bytes.
    pub fn width(self) -> usize {
        match self {
            IntType::U8 | IntType::I8 => 1,
            IntType::U16 | IntType::I16 => 2,
            IntType::U24 => 3,
            IntType::U32 | IntType::I32 => 4,
            IntType::U64 | IntType::I64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, IntType::I8 | IntType::I16 | IntType::I32 | IntType::I64)
    }

    pub fn min(self) -> i128 {
        if self.is_signed() {
            -(1i128 << (self.width() * 8 - 1))
        } else {
            0
        }
    }

    pub fn max(self) -> i128 {
        if self.is_signed() {
            (1i128 << (self.width() * 8 - 1)) - 1
        } else {
            (1i128 << (self.width() * 8)) - 1
        }
    }

    pub fn contains(self, value: i128) -> bool {
        value >= self.min() && value <= self.max()
    }

    /// Interpret the low `width` bytes of `raw`, sign-extending signed types.
    pub fn from_bits(self, raw: u64) -> i128 {
        let bits = self.width() as u32 * 8;
        let raw = (raw as u128) & ((1u128 << bits) - 1);
        if self.is_signed() && raw & (1u128 << (bits - 1)) != 0 {
            raw as i128 - (1i128 << bits)
        } else {
            raw as i128
        }
    }

    /// Two's complement encoding of `value` truncated to the type width.
    pub fn to_bits(self, value: i128) -> u64 {
        let bits = self.width() as u32 * 8;
        ((value as u128) & ((1u128 << bits) - 1)) as u64
    }

    /// GLib type used for values of this type.
    pub fn c_type(self) -> &'static str {
        match self {
            IntType::U8 => "guint8",
            IntType::U16 => "guint16",
            IntType::U24 | IntType::U32 => "guint32",
            IntType::U64 => "guint64",
            IntType::I8 => "gint8",
            IntType::I16 => "gint16",
            IntType::I32 => "gint32",
            IntType::I64 => "gint64",
        }
    }

    /// Unsigned GLib type of the same width, used for raw memory access.
    pub fn c_type_unsigned(self) -> &'static str {
        match self {
            IntType::U8 | IntType::I8 => "guint8",
            IntType::U16 | IntType::I16 => "guint16",
            IntType::U24 | IntType::U32 | IntType::I32 => "guint32",
            IntType::U64 | IntType::I64 => "guint64",
        }
    }

    /// Suffix of the `fu_memread_*`/`fu_memwrite_*` helpers.
    pub fn mem_name(self) -> &'static str {
        match self {
            IntType::U8 | IntType::I8 => "uint8",
            IntType::U16 | IntType::I16 => "uint16",
            IntType::U24 => "uint24",
            IntType::U32 | IntType::I32 => "uint32",
            IntType::U64 | IntType::I64 => "uint64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StructId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjRef {
    Struct(StructId),
    Enum(EnumId),
}

/// The type of one struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Type {
    Int(IntType),
    Enum { id: EnumId, repr: IntType },
    String,
    Guid,
    Struct(StructId),
}

impl Type {
    /// Width of a single element in bytes.
    pub fn width(self) -> usize {
        match self {
            Type::Int(t) | Type::Enum { repr: t, .. } => t.width(),
            Type::String | Type::Guid | Type::Struct(_) => 1,
        }
    }

    pub fn int_type(self) -> Option<IntType> {
        match self {
            Type::Int(t) | Type::Enum { repr: t, .. } => Some(t),
            _ => None,
        }
    }
}

/// A typed default or constant literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    Int(i128),
    Str(String),
    Bytes(Vec<u8>),
    EnumItem(String),
    /// `$struct_size`, replaced once the enclosing struct is closed.
    StructSize,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) if *v < 0 => write!(f, "{}", v),
            Value::Int(v) => write!(f, "0x{:x}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode_upper(b)),
            Value::EnumItem(name) => write!(f, "{}", name),
            Value::StructSize => write!(f, "$struct_size"),
        }
    }
}

/// Accessor shape of a struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Single integer or enum value.
    Scalar,
    /// Fixed number of integers wider than a byte, or of enum values.
    IntArray,
    /// Opaque `u8` array.
    Blob,
    Guid,
    String,
    /// Serialized bytes of a previously defined struct.
    Struct,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructItem {
    pub name:       String,
    pub line:       usize,
    pub type_:      Type,
    pub endian:     Endian,
    pub multiplier: usize,
    pub offset:     usize,
    pub default:    Option<Value>,
    pub constant:   Option<Value>,
    pub padding:    Option<u8>,
    pub getters:    Export,
    pub setters:    Export,
}

impl StructItem {
    pub fn new(name: &str, line: usize, offset: usize) -> Self {
        StructItem {
            name: name.to_string(),
            line,
            type_: Type::Int(IntType::U8),
            endian: Endian::Native,
            multiplier: 0,
            offset,
            default: None,
            constant: None,
            padding: None,
            getters: Export::None,
            setters: Export::None,
        }
    }

    pub fn size(&self) -> usize {
        self.multiplier.max(1) * self.type_.width()
    }

    /// Reserved members are laid out but get no accessors.
    pub fn enabled(&self) -> bool {
        !(self.name.starts_with('_') || self.name == "reserved")
    }

    pub fn kind(&self) -> ItemKind {
        match self.type_ {
            Type::String => ItemKind::String,
            Type::Guid => ItemKind::Guid,
            Type::Struct(_) => ItemKind::Struct,
            Type::Int(IntType::U8) if self.multiplier > 0 => ItemKind::Blob,
            Type::Int(_) | Type::Enum { .. } if self.multiplier > 0 => ItemKind::IntArray,
            Type::Int(_) | Type::Enum { .. } => ItemKind::Scalar,
        }
    }

    pub fn snake_name(&self) -> String {
        camel_to_snake(&self.name)
    }

    pub fn export(&self, derive: Derive) -> Export {
        match derive {
            Derive::Getters => self.getters,
            Derive::Setters => self.setters,
            _ => Export::None,
        }
    }

    pub fn add_private_export(&mut self, derive: Derive) {
        if let Some(slot) = self.export_slot(derive) {
            if *slot == Export::None {
                *slot = Export::Private;
            }
        }
    }

    pub fn add_public_export(&mut self, derive: Derive) {
        if let Some(slot) = self.export_slot(derive) {
            *slot = Export::Public;
        }
    }

    fn export_slot(&mut self, derive: Derive) -> Option<&mut Export> {
        match derive {
            Derive::Getters => Some(&mut self.getters),
            Derive::Setters => Some(&mut self.setters),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructObj {
    pub name:      String,
    /// C type name, i.e. the name with the symbol prefix applied.
    pub type_name: String,
    /// snake_case prefix of every generated function.
    pub symbol:    String,
    pub line:      usize,
    pub items:     Vec<StructItem>,
    pub exports:   BTreeMap<Derive, Export>,
}

impl StructObj {
    pub fn new(name: &str, prefix: &str, line: usize) -> Self {
        let type_name = format!("{}{}", prefix, name);
        StructObj {
            name: name.to_string(),
            symbol: camel_to_snake(&type_name),
            type_name,
            line,
            items: Vec::new(),
            exports: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.items.iter().map(|item| item.size()).sum()
    }

    pub fn export(&self, derive: Derive) -> Export {
        self.exports.get(&derive).copied().unwrap_or_default()
    }

    /// Finds a member by its source name or its snake_case name.
    pub fn item(&self, name: &str) -> Option<&StructItem> {
        self.items
            .iter()
            .find(|item| item.name == name || item.snake_name() == name)
    }

    /// `FOO_BAR_<SUFFIX>` style define name.
    pub fn c_define(&self, suffix: &str) -> String {
        format!("{}_{}", self.symbol.to_uppercase(), suffix.to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumItem {
    pub name:     String,
    pub line:     usize,
    /// Value given in the source, if any.
    pub explicit: Option<i128>,
    /// Resolved value, counting up from the previous item when implicit.
    pub value:    i128,
}

impl EnumItem {
    /// Text used by `to_string` and `from_string`, e.g. `large-file`.
    pub fn text(&self) -> String {
        camel_to_snake(&self.name).replace('_', "-")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumObj {
    pub name:        String,
    pub type_name:   String,
    pub symbol:      String,
    pub line:        usize,
    pub repr:        Option<IntType>,
    pub repr_endian: Endian,
    pub items:       Vec<EnumItem>,
    pub exports:     BTreeMap<Derive, Export>,
}

impl EnumObj {
    pub fn new(name: &str, prefix: &str, line: usize) -> Self {
        let type_name = format!("{}{}", prefix, name);
        EnumObj {
            name: name.to_string(),
            symbol: camel_to_snake(&type_name),
            type_name,
            line,
            repr: None,
            repr_endian: Endian::Native,
            items: Vec::new(),
            exports: BTreeMap::new(),
        }
    }

    pub fn export(&self, derive: Derive) -> Export {
        self.exports.get(&derive).copied().unwrap_or_default()
    }

    pub fn item(&self, name: &str) -> Option<&EnumItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// The first item carrying `value`.
    pub fn item_by_value(&self, value: i128) -> Option<&EnumItem> {
        self.items.iter().find(|item| item.value == value)
    }

    pub fn next_value(&self) -> i128 {
        self.items.last().map(|item| item.value + 1).unwrap_or(0)
    }

    pub fn has_explicit_values(&self) -> bool {
        self.items.iter().any(|item| item.explicit.is_some())
    }

    /// Enumerator name of an item, e.g. `FU_EFI_FILE_ATTRIB_LARGE_FILE`.
    pub fn c_define(&self, item: &EnumItem) -> String {
        format!(
            "{}_{}",
            self.symbol.to_uppercase(),
            camel_to_snake(&item.name).replace('-', "_").to_uppercase()
        )
    }

    pub fn c_define_last(&self) -> String {
        format!("{}_LAST", self.symbol.to_uppercase())
    }

    pub fn to_text(&self, value: i128) -> Option<String> {
        self.item_by_value(value).map(|item| item.text())
    }

    pub fn from_text(&self, text: &str) -> Option<i128> {
        self.items
            .iter()
            .find(|item| item.text() == text)
            .map(|item| item.value)
    }

    /// Comma separated names of every flag set in `value`; a zero value
    /// maps to the name of the zero item when there is one.
    pub fn to_bitstring(&self, value: i128) -> String {
        if value == 0 {
            if let Some(item) = self.item_by_value(0) {
                return item.text();
            }
        }
        self.items
            .iter()
            .filter(|item| item.value != 0 && value & item.value != 0)
            .map(|item| item.text())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Every struct and enum of one definition file, in declaration order.
///
/// Names share a single namespace and are registered exactly once, when
/// their block closes; later blocks can only refer to earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Registry {
    pub structs: Vec<StructObj>,
    pub enums:   Vec<EnumObj>,
    pub order:   Vec<ObjRef>,
    #[serde(skip)]
    names:       HashMap<String, ObjRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<ObjRef> {
        self.names.get(name).copied()
    }

    pub fn struct_obj(&self, id: StructId) -> &StructObj {
        &self.structs[id.0]
    }

    pub fn enum_obj(&self, id: EnumId) -> &EnumObj {
        &self.enums[id.0]
    }

    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        match self.lookup(name) {
            Some(ObjRef::Struct(id)) => Some(id),
            _ => self
                .structs
                .iter()
                .position(|obj| obj.type_name == name)
                .map(StructId),
        }
    }

    pub fn find_enum(&self, name: &str) -> Option<EnumId> {
        match self.lookup(name) {
            Some(ObjRef::Enum(id)) => Some(id),
            _ => self
                .enums
                .iter()
                .position(|obj| obj.type_name == name)
                .map(EnumId),
        }
    }

    fn check_unique(&self, name: &str, line: usize) -> Result<(), StructgenError> {
        if self.names.contains_key(name) {
            return Err(verifier_error(
                format!("The type {} is defined twice", quote(name)),
                line,
            ));
        }
        Ok(())
    }

    pub fn add_struct(&mut self, obj: StructObj) -> Result<StructId, StructgenError> {
        self.check_unique(&obj.name, obj.line)?;
        let id = StructId(self.structs.len());
        self.names.insert(obj.name.clone(), ObjRef::Struct(id));
        self.order.push(ObjRef::Struct(id));
        self.structs.push(obj);
        Ok(id)
    }

    pub fn add_enum(&mut self, obj: EnumObj) -> Result<EnumId, StructgenError> {
        self.check_unique(&obj.name, obj.line)?;
        let id = EnumId(self.enums.len());
        self.names.insert(obj.name.clone(), ObjRef::Enum(id));
        self.order.push(ObjRef::Enum(id));
        self.enums.push(obj);
        Ok(id)
    }

    /// True when the struct, or any struct nested in it, has a constant.
    pub fn has_constant(&self, id: StructId) -> bool {
        self.struct_obj(id).items.iter().any(|item| {
            item.constant.is_some()
                || matches!(item.type_, Type::Struct(inner) if self.has_constant(inner))
        })
    }

    pub fn add_public_export(&mut self, obj: ObjRef, derive: Derive) {
        match obj {
            ObjRef::Struct(id) => self.struct_public_export(id, derive),
            ObjRef::Enum(id) => {
                self.enums[id.0].exports.insert(derive, Export::Public);
            }
        }
    }

    pub fn add_private_export(&mut self, obj: ObjRef, derive: Derive) {
        match obj {
            ObjRef::Struct(id) => self.struct_private_export(id, derive),
            ObjRef::Enum(id) => self.enum_private_export(id, derive),
        }
    }

    fn enum_private_export(&mut self, id: EnumId, derive: Derive) {
        let slot = self.enums[id.0].exports.entry(derive).or_default();
        if *slot == Export::None {
            *slot = Export::Private;
        }
    }

    fn struct_public_export(&mut self, id: StructId, derive: Derive) {
        match derive {
            // constants never get public accessors
            Derive::Getters | Derive::Setters => {
                for item in &mut self.structs[id.0].items {
                    if item.constant.is_none() && item.enabled() {
                        item.add_public_export(derive);
                    }
                }
            }
            _ => {
                self.struct_private_export(id, derive);
                self.structs[id.0].exports.insert(derive, Export::Public);
            }
        }

        match derive {
            Derive::Parse | Derive::ParseBytes => self.struct_public_export(id, Derive::Getters),
            Derive::New => self.struct_public_export(id, Derive::Setters),
            _ => {}
        }
    }

    fn struct_private_export(&mut self, id: StructId, derive: Derive) {
        if !self.structs[id.0].export(derive).is_none() {
            return;
        }
        if matches!(derive, Derive::Getters | Derive::Setters) {
            for item in &mut self.structs[id.0].items {
                if item.enabled() {
                    item.add_private_export(derive);
                }
            }
            return;
        }
        self.structs[id.0].exports.insert(derive, Export::Private);

        match derive {
            Derive::Validate => self.struct_private_export(id, Derive::ValidateInternal),
            Derive::ValidateBytes => self.struct_private_export(id, Derive::Validate),
            Derive::ParseBytes => self.struct_private_export(id, Derive::Parse),
            Derive::Parse => {
                self.struct_private_export(id, Derive::ToString);
                self.struct_private_export(id, Derive::ValidateInternal);
            }
            Derive::ValidateInternal => {
                let mut nested = Vec::new();
                for item in &mut self.structs[id.0].items {
                    if item.constant.is_some() && item.enabled() && item.kind() == ItemKind::Scalar {
                        item.add_private_export(Derive::Getters);
                    }
                    if let Type::Struct(inner) = item.type_ {
                        nested.push(inner);
                    }
                }
                for inner in nested {
                    self.struct_private_export(inner, Derive::ValidateInternal);
                }
            }
            Derive::ToString => {
                let mut nested = Vec::new();
                let mut enums = Vec::new();
                for item in &mut self.structs[id.0].items {
                    if !item.enabled() {
                        continue;
                    }
                    item.add_private_export(Derive::Getters);
                    match item.type_ {
                        Type::Struct(inner) => nested.push(inner),
                        Type::Enum { id: enum_id, .. } if item.constant.is_none() => {
                            enums.push(enum_id)
                        }
                        _ => {}
                    }
                }
                for inner in nested {
                    self.struct_private_export(inner, Derive::ToString);
                }
                for enum_id in enums {
                    self.enum_private_export(enum_id, Derive::ToString);
                }
            }
            Derive::New => {
                let mut nested = Vec::new();
                for item in &mut self.structs[id.0].items {
                    if item.enabled() && item.default.is_some() && item.kind() == ItemKind::Scalar {
                        item.add_private_export(Derive::Setters);
                    }
                    // nested structs without a default start from their own defaults
                    if let (Type::Struct(inner), None) = (item.type_, &item.default) {
                        nested.push(inner);
                    }
                }
                for inner in nested {
                    self.struct_private_export(inner, Derive::New);
                }
            }
            _ => {}
        }
    }
}
