#![cfg(test)]

use pretty_assertions::assert_eq;
use structgen_compiler::{
    compile_registry, enum_from_string, types::Derive, CompileOptions, Dialect, FieldValue, Record,
    RecordError,
};
use structgen_runtime::MemError;

const USWID_HDR: &str = "
struct UswidHdr {
    magic: guid
    hdrver: u8: 1
    hdrsz: u16le: $struct_size
    payloadsz: u32le
    flags: u8
}
";

const FIRMWARE: &str = r#"
#[derive(ToString, FromString, ToBitString)]
#[repr(u8)]
enum FuFirmwareFlag {
    None = 0x00,
    DedupeId = 0x01,
    HasChecksum = 0x02,
    HasVidPid = 0x04,
}

#[derive(ToString, FromString)]
#[repr(u16be)]
enum FuFirmwareKind {
    Unknown,
    Bios,
    Capsule = 0x10,
    Ifd,
}

#[derive(New, Validate, Parse)]
struct FuStructImageHdr {
    signature: [char; 4] == "IMGH",
    kind: FuFirmwareKind == Capsule,
    crc: u32le,
}

#[derive(New, ValidateBytes, ParseBytes, Getters, Setters)]
struct FuStructFirmware {
    magic: u32be == 0x5342_4F4D,
    flags: FuFirmwareFlag,
    kind: FuFirmwareKind = Bios,
    size: u24le = $struct_size,
    offset: u16 = $struct_offset,
    version: [char; 8] = "1.2",
    id: Guid,
    checksum: [u8; 4],
    counts: [u16be; 3],
    image: FuStructImageHdr,
    reserved: [u8; 2] = 0xFF,
}
"#;

fn firmware() -> structgen_compiler::types::Registry {
    compile_registry(FIRMWARE, &CompileOptions::default()).expect("compile_registry failed")
}

#[test]
fn test_uswid_hdr_new() {
    let opts = CompileOptions::new().dialect(Dialect::Plain);
    let registry = compile_registry(USWID_HDR, &opts).expect("compile_registry failed");
    let st = Record::new_by_name(&registry, "UswidHdr").expect("new failed");

    assert_eq!(st.data().len(), 24);
    // hdrsz follows the 16 byte magic and the 1 byte hdrver
    assert_eq!(st.obj().item("hdrsz").map(|item| item.offset), Some(17));
    assert_eq!(u16::from_le_bytes([st.data()[17], st.data()[18]]), 24);
    assert_eq!(st.get("hdrver"), Ok(FieldValue::Int(1)));
    assert_eq!(
        st.to_string(),
        "FuStructUswidHdr:
  magic: 00000000-0000-0000-0000-000000000000
  hdrver: 0x1
  hdrsz: 0x18
  payloadsz: 0x0
  flags: 0x0"
    );
}

#[test]
fn test_size_invariant() {
    let registry = firmware();
    for obj in &registry.structs {
        let mut offset = 0;
        for item in &obj.items {
            assert_eq!(item.offset, offset, "{}.{}", obj.name, item.name);
            offset += item.size();
        }
        assert_eq!(obj.size(), offset);
        let st = Record::new(&registry, registry.find_struct(&obj.name).unwrap()).expect("new failed");
        assert_eq!(st.data().len(), offset);
    }
    let id = registry.find_struct("FuStructFirmware").unwrap();
    assert_eq!(registry.struct_obj(id).size(), 4 + 1 + 2 + 3 + 2 + 8 + 16 + 4 + 6 + 10 + 2);
}

#[test]
fn test_defaults_and_placeholders() {
    let registry = firmware();
    let st = Record::new_by_name(&registry, "FuStructFirmware").expect("new failed");
    assert_eq!(st.get("magic"), Ok(FieldValue::Int(0x53424F4D)));
    assert_eq!(&st.data()[0..4], &[0x53, 0x42, 0x4F, 0x4D]);
    assert_eq!(st.get("kind"), Ok(FieldValue::Int(1)));
    assert_eq!(st.get("size"), Ok(FieldValue::Int(58)));
    assert_eq!(st.get("offset"), Ok(FieldValue::Int(10)));
    assert_eq!(st.get("version"), Ok(FieldValue::Str("1.2".into())));
    assert_eq!(&st.data()[12..20], b"1.2\0\0\0\0\0");
    assert_eq!(&st.data()[56..58], &[0xFF, 0xFF]);
    let image = Record::new_by_name(&registry, "FuStructImageHdr").expect("new failed");
    assert_eq!(st.get("image"), Ok(FieldValue::Bytes(image.data().to_vec())));
    assert_eq!(&st.data()[46..52], b"IMGH\x00\x10");
}

#[test]
fn test_round_trip() {
    let registry = firmware();
    let mut st = Record::new_by_name(&registry, "FuStructFirmware").expect("new failed");
    let guid = [
        0x53, 0x42, 0x4F, 0x4D, 0xD6, 0xBA, 0x2E, 0xAC, 0xA3, 0xE6, 0x7A, 0x52, 0xAA, 0xEE, 0x3B, 0xAF,
    ];
    let image = Record::new_by_name(&registry, "FuStructImageHdr").expect("new failed");

    let values = [
        ("flags", FieldValue::Int(0x06)),
        ("kind", FieldValue::Int(0x11)),
        ("size", FieldValue::Int(0xAB_CDEF)),
        ("offset", FieldValue::Int(0xFFFF)),
        ("version", FieldValue::Str("12345678".into())),
        ("id", FieldValue::Guid(guid)),
        ("checksum", FieldValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])),
        ("counts", FieldValue::IntArray(vec![1, 0x200, 0xFFFF])),
        ("image", FieldValue::Bytes(image.data().to_vec())),
    ];
    for (field, value) in values.iter() {
        st.set(field, value.clone()).expect("set failed");
    }
    for (field, value) in values.iter() {
        assert_eq!(st.get(field).as_ref(), Ok(value), "{}", field);
    }

    // shorter strings are NUL padded up to the field width
    st.set("version", FieldValue::Str("2.0".into())).expect("set failed");
    assert_eq!(st.get("version"), Ok(FieldValue::Str("2.0".into())));
    assert_eq!(&st.data()[12..20], b"2.0\0\0\0\0\0");

    assert_eq!(&st.data()[7..10], &[0xEF, 0xCD, 0xAB]);
    assert_eq!(&st.data()[40..46], &[0x00, 0x01, 0x02, 0x00, 0xFF, 0xFF]);
}

#[test]
fn test_set_errors() {
    let registry = firmware();
    let mut st = Record::new_by_name(&registry, "FuStructFirmware").expect("new failed");
    assert_eq!(
        st.set("version", FieldValue::Str("123456789".into())),
        Err(RecordError::StringTooLong {
            name:  "FuStructFirmware".into(),
            field: "version".into(),
            len:   9,
            size:  8,
        })
    );
    assert!(matches!(
        st.set("checksum", FieldValue::Bytes(vec![0; 5])),
        Err(RecordError::BlobSize { len: 5, size: 4, .. })
    ));
    assert!(matches!(st.set("size", FieldValue::Int(0x100_0000)), Err(RecordError::ValueMismatch { .. })));
    assert!(matches!(st.get("reserved"), Err(RecordError::UnknownField { .. })));
    assert!(matches!(st.get("missing"), Err(RecordError::UnknownField { .. })));
}

#[test]
fn test_constant_enforcement() {
    let registry = firmware();
    let id = registry.find_struct("FuStructFirmware").unwrap();
    let mut buf = Record::new(&registry, id).expect("new failed").into_vec();
    let st = Record::parse(&registry, id, &buf, 0).expect("parse failed");
    assert_eq!(st.data(), buf.as_slice());
    assert!(Record::validate(&registry, id, &buf, 0).is_ok());

    // a non-constant byte changes nothing
    buf[4] ^= 0xFF;
    assert!(Record::parse(&registry, id, &buf, 0).is_ok());

    // the constant range does
    for pos in 0..4 {
        let mut bad = buf.clone();
        bad[pos] ^= 0x01;
        assert_eq!(
            Record::parse(&registry, id, &bad, 0).unwrap_err(),
            RecordError::ConstantMismatch {
                name:     "FuStructFirmware".into(),
                field:    "magic".into(),
                expected: "0x53424f4d".into(),
            }
        );
        assert!(Record::validate(&registry, id, &bad, 0).is_err());
    }

    // and so does a nested constant
    let mut bad = buf.clone();
    bad[47] ^= 0x01;
    assert_eq!(
        Record::parse(&registry, id, &bad, 0).unwrap_err(),
        RecordError::ConstantMismatch {
            name:     "FuStructImageHdr".into(),
            field:    "signature".into(),
            expected: "IMGH".into(),
        }
    );
    let mut bad = buf.clone();
    bad[51] ^= 0x01;
    assert!(matches!(
        Record::validate(&registry, id, &bad, 0),
        Err(RecordError::ConstantMismatch { field, .. }) if field == "kind"
    ));
}

#[test]
fn test_string_constant_is_prefix_compared() {
    let registry = compile_registry(
        "#[derive(Parse)]\nstruct FuStructDfu {\n  sig: [char; 8] == \"DfuSe\",\n}\n",
        &CompileOptions::default(),
    )
    .expect("compile_registry failed");
    assert!(Record::parse_by_name(&registry, "FuStructDfu", b"DfuSe\0\0\0", 0).is_ok());
    assert!(Record::parse_by_name(&registry, "FuStructDfu", b"DfuSe123", 0).is_ok());
    assert!(Record::parse_by_name(&registry, "FuStructDfu", b"DfuSx\0\0\0", 0).is_err());
}

#[test]
fn test_bounds_enforcement() {
    let registry = compile_registry(
        "#[derive(Parse, Validate)]\nstruct FuStructSmall {\n  a: u32le,\n  b: u8 == 0x0,\n}\n",
        &CompileOptions::default(),
    )
    .expect("compile_registry failed");
    let id = registry.find_struct("FuStructSmall").unwrap();
    let size = registry.struct_obj(id).size();
    let data = [0u8; 16];

    for bufsz in 0..=data.len() {
        for offset in 0..=data.len() + 2 {
            let result = Record::parse(&registry, id, &data[..bufsz], offset);
            if offset + size <= bufsz {
                let st = result.expect("parse failed");
                assert_eq!(st.data().len(), size);
            } else {
                assert_eq!(
                    result.unwrap_err(),
                    RecordError::OutOfBounds {
                        name:   "FuStructSmall".into(),
                        source: MemError::OutOfBounds { bufsz, offset, n: size },
                    }
                );
                assert!(Record::validate(&registry, id, &data[..bufsz], offset).is_err());
            }
        }
    }
    assert!(Record::parse(&registry, id, &data, usize::MAX).is_err());
}

#[test]
fn test_parse_at_offset() {
    let registry = firmware();
    let image = Record::new_by_name(&registry, "FuStructImageHdr").expect("new failed");
    let mut buf = vec![0xAA; 3];
    buf.extend_from_slice(image.data());
    let st = Record::parse_by_name(&registry, "FuStructImageHdr", &buf, 3).expect("parse failed");
    assert_eq!(st.data(), image.data());
    assert_eq!(st.get("signature"), Ok(FieldValue::Str("IMGH".into())));
    assert_eq!(
        st.to_string(),
        "FuStructImageHdr:\n  signature: IMGH\n  kind: 0x10\n  crc: 0x0"
    );
}

#[test]
fn test_to_string() {
    let registry = firmware();
    let mut st = Record::new_by_name(&registry, "FuStructFirmware").expect("new failed");
    st.set("flags", FieldValue::Int(0x05)).expect("set failed");
    st.set("checksum", FieldValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])).expect("set failed");
    assert_eq!(
        st.to_string(),
        "FuStructFirmware:
  magic: 0x53424f4d
  flags: 0x5
  kind: 0x1 [bios]
  size: 0x3a
  offset: 0xa
  version: 1.2
  id: 00000000-0000-0000-0000-000000000000
  checksum: 0xDEADBEEF
  counts: 0x0,0x0,0x0
  image: FuStructImageHdr:
  signature: IMGH
  kind: 0x10
  crc: 0x0"
    );
}

#[test]
fn test_enum_round_trip() {
    let registry = firmware();
    for obj in &registry.enums {
        for item in &obj.items {
            let text = obj.to_text(item.value).expect("to_text failed");
            assert_eq!(enum_from_string(obj, &text), Ok(item.value));
        }
        assert_eq!(
            enum_from_string(obj, "not-a-real-name"),
            Err(RecordError::EnumNotFound {
                name:  obj.type_name.clone(),
                value: "not-a-real-name".into(),
            })
        );
    }

    let kind = &registry.enums[registry.find_enum("FuFirmwareKind").unwrap().0];
    let values: Vec<i128> = kind.items.iter().map(|item| item.value).collect();
    assert_eq!(values, vec![0, 1, 0x10, 0x11]);
    assert_eq!(kind.to_text(0x11), Some("ifd".to_string()));
    assert_eq!(kind.to_text(0x12), None);

    let flags = &registry.enums[registry.find_enum("FuFirmwareFlag").unwrap().0];
    assert_eq!(flags.to_bitstring(0), "none");
    assert_eq!(flags.to_bitstring(0x05), "dedupe-id,has-vid-pid");
    assert_eq!(flags.from_text("has-checksum"), Some(0x02));
}

#[test]
fn test_derive_idempotence() {
    let once = compile_registry(FIRMWARE, &CompileOptions::default()).expect("compile_registry failed");
    let twice = compile_registry(
        &FIRMWARE
            .replace("#[derive(New, Validate, Parse)]", "#[derive(New, Validate, Parse, New, Validate, Parse)]")
            .replace(
                "#[derive(ToString, FromString)]",
                "#[derive(ToString, FromString, FromString, ToString)]",
            ),
        &CompileOptions::default(),
    )
    .expect("compile_registry failed");
    assert_eq!(once.structs, twice.structs);
    assert_eq!(once.enums, twice.enums);

    let id = once.find_struct("FuStructImageHdr").unwrap();
    let obj = once.struct_obj(id);
    assert_eq!(obj.export(Derive::ValidateInternal), structgen_compiler::types::Export::Private);
}
