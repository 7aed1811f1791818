use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STRUCT_START: Regex = Regex::new(r"^struct\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{$").unwrap();
    static ref ENUM_START:   Regex = Regex::new(r"^enum\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{$").unwrap();
    static ref BLOCK_END:    Regex = Regex::new(r"^\}[;,]?$").unwrap();
    static ref DERIVE:       Regex = Regex::new(r"^#\[derive\((.*)\)\]$").unwrap();
    static ref REPR:         Regex = Regex::new(r"^#\[repr\(([A-Za-z0-9]+)\)\]$").unwrap();
    static ref DERIVE_ARGS:  Regex = Regex::new(r"\([^)]*\)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    StructStart(String),
    EnumStart(String),
    BlockEnd,
    Derive(Vec<String>),
    Repr(String),
    /// Anything else; validated when the enclosing block is built.
    Member(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// 1-based line number in the source file.
    pub line: usize,
    pub kind: LineKind,
}

/// Split a definition file into classified logical lines.
///
/// Tabs become spaces, `//` comments are removed and blank lines dropped.
pub fn tokenize(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let mut text = raw.replace('\t', " ");
        if let Some(pos) = text.find("//") {
            text.truncate(pos);
        }
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        lines.push(Line {
            text: text.to_string(),
            line: idx + 1,
            kind: classify(text),
        });
    }

    lines
}

fn classify(text: &str) -> LineKind {
    if let Some(caps) = STRUCT_START.captures(text) {
        return LineKind::StructStart(caps[1].to_string());
    }
    if let Some(caps) = ENUM_START.captures(text) {
        return LineKind::EnumStart(caps[1].to_string());
    }
    if BLOCK_END.is_match(text) {
        return LineKind::BlockEnd;
    }
    if let Some(caps) = DERIVE.captures(text) {
        // arguments such as `ToString(enum)` only affect other backends
        let names = DERIVE_ARGS.replace_all(&caps[1], "");
        let derives = names
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        return LineKind::Derive(derives);
    }
    if let Some(caps) = REPR.captures(text) {
        return LineKind::Repr(caps[1].to_string());
    }
    LineKind::Member(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_skips_comments_and_blanks() {
        let lines = tokenize("// header\n\nstruct Foo {\n\tsize: u16le, // bytes\n}\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].kind, LineKind::StructStart("Foo".into()));
        assert_eq!(lines[0].line, 3);
        assert_eq!(lines[1].text, "size: u16le,");
        assert_eq!(lines[1].line, 4);
        assert_eq!(lines[2].kind, LineKind::BlockEnd);
    }

    #[test]
    fn test_classify_attributes() {
        assert_eq!(
            classify("#[derive(New, ToString(enum), Parse)]"),
            LineKind::Derive(vec!["New".into(), "ToString".into(), "Parse".into()])
        );
        assert_eq!(classify("#[repr(u16le)]"), LineKind::Repr("u16le".into()));
        assert_eq!(classify("enum Kind {"), LineKind::EnumStart("Kind".into()));
        assert_eq!(classify("};"), LineKind::BlockEnd);
        assert_eq!(classify("Alpha = 0x1,"), LineKind::Member("Alpha = 0x1,".into()));
    }
}
