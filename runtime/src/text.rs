/// Size of a packed GUID in bytes.
pub const GUID_SIZE: usize = 16;

/// Format a packed GUID using the mixed-endian (Microsoft) layout: the
/// first three groups are stored little-endian, the last two as-is.
///
/// ```
/// use structgen_runtime::guid_to_string;
/// let guid = [
///     0x53, 0x42, 0x4F, 0x4D, 0xD6, 0xBA, 0x2E, 0xAC,
///     0xA3, 0xE6, 0x7A, 0x52, 0xAA, 0xEE, 0x3B, 0xAF,
/// ];
/// assert_eq!(guid_to_string(&guid), "4d4f4253-bad6-ac2e-a3e6-7a52aaee3baf");
/// ```
pub fn guid_to_string(guid: &[u8; GUID_SIZE]) -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{}",
        u32::from_le_bytes([guid[0], guid[1], guid[2], guid[3]]),
        u16::from_le_bytes([guid[4], guid[5]]),
        u16::from_le_bytes([guid[6], guid[7]]),
        guid[8],
        guid[9],
        hex::encode(&guid[10..]),
    )
}

/// Uppercase hex dump without separators, e.g. `DEADBEEF`.
pub fn hex_upper(buf: &[u8]) -> String {
    hex::encode_upper(buf)
}

#[test]
fn guid_mixed_endian() {
    let guid = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
    ];
    assert_eq!(guid_to_string(&guid), "33221100-5544-7766-8899-aabbccddeeff");
    assert_eq!(guid_to_string(&[0; GUID_SIZE]), "00000000-0000-0000-0000-000000000000");
}

#[test]
fn hex_dump() {
    assert_eq!(hex_upper(&[]), "");
    assert_eq!(hex_upper(&[0xde, 0xad, 0x01]), "DEAD01");
}
