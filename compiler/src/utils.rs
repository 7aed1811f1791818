use crate::error::StructgenError;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(msg: &str, line: usize) -> StructgenError {
    StructgenError::ParseError {
        msg: msg.to_string(),
        line,
    }
}

pub fn verifier_error(msg: String, line: usize) -> StructgenError {
    StructgenError::VerifierError { msg, line }
}

/// Converts a CamelCase name into snake_case.
/// Names given entirely in capitals are just lowercased, so `SHA256`
/// becomes `sha256` rather than `s_h_a256`.
pub fn camel_to_snake(name: &str) -> String {
    if name.to_uppercase() == name {
        return name.to_lowercase();
    }
    let mut snake = String::new();
    for c in name.chars() {
        if c.is_lowercase() || c.is_numeric() || c == '_' {
            snake.push(c);
            continue;
        }
        if !snake.is_empty() && !snake.ends_with('_') {
            snake.push('_');
        }
        snake.extend(c.to_lowercase());
    }
    snake
}

/// Escapes text for use inside a C string literal. Non-printable bytes use
/// three-digit octal escapes.
pub fn c_string(text: &str) -> String {
    let mut out = String::new();
    for b in text.bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b' '..=b'~' => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

/// Escapes raw bytes as a C string literal body of `\xNN` escapes.
pub fn c_bytes(data: &[u8]) -> String {
    data.iter().map(|b| format!("\\x{:02x}", b)).collect()
}
