use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstKind {
    Bool,
    String,
    Int,
    Float,
    Complex,
}

/// Value carried by a constant declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    String(String),
    Int(i128),
    Float(f64),
    Complex { re: f64, im: f64 },
}

impl ConstValue {
    pub fn kind(&self) -> ConstKind {
        match self {
            ConstValue::Bool(_) => ConstKind::Bool,
            ConstValue::String(_) => ConstKind::String,
            ConstValue::Int(_) => ConstKind::Int,
            ConstValue::Float(_) => ConstKind::Float,
            ConstValue::Complex { .. } => ConstKind::Complex,
        }
    }

    pub fn negate(self) -> Option<ConstValue> {
        match self {
            ConstValue::Int(v) => v.checked_neg().map(ConstValue::Int),
            ConstValue::Float(v) => Some(ConstValue::Float(-v)),
            ConstValue::Complex { re, im } => Some(ConstValue::Complex { re: -re, im: -im }),
            ConstValue::Bool(_) | ConstValue::String(_) => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::String(v) => f.write_str(&quote(v)),
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v:?}"),
            ConstValue::Complex { re, im } => write!(f, "({re:?} + {im:?}i)"),
        }
    }
}

/// Double-quoted form accepted by C-style preprocessors.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("\\x{byte:02x}"));
                }
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::{ConstKind, ConstValue};

    #[test]
    fn displays_values_for_header_output() {
        assert_eq!(ConstValue::Int(42).to_string(), "42");
        assert_eq!(ConstValue::Int(-7).to_string(), "-7");
        assert_eq!(ConstValue::Bool(true).to_string(), "true");
        assert_eq!(
            ConstValue::String("a\"b\n".to_string()).to_string(),
            "\"a\\\"b\\n\""
        );
        assert_eq!(ConstValue::Float(3.0).to_string(), "3.0");
    }

    #[test]
    fn negation_rejects_non_numeric_values() {
        assert_eq!(ConstValue::Int(5).negate(), Some(ConstValue::Int(-5)));
        assert_eq!(ConstValue::Bool(true).negate(), None);
        assert_eq!(
            ConstValue::Complex { re: 0.0, im: 2.0 }.negate().map(|v| v.kind()),
            Some(ConstKind::Complex)
        );
    }
}
