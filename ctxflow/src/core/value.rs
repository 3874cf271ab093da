//! Typed values stored in instrumentation contexts.

use std::fmt;

/// A value held by an instrumentation context.
///
/// Scalars mirror the primitive types that can travel in the
/// `Correlation-Context` header. `Object` carries structured payloads that
/// stay inside the process.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// A UTF-8 string.
    String(String),
    /// An 8-bit signed integer.
    Byte(i8),
    /// A 16-bit signed integer.
    Short(i16),
    /// A 32-bit signed integer.
    Int(i32),
    /// A 64-bit signed integer.
    Long(i64),
    /// A single-precision float.
    Float(f32),
    /// A double-precision float.
    Double(f64),
    /// A single character.
    Char(char),
    /// A boolean.
    Boolean(bool),
    /// An opaque structured value, never written to headers.
    Object(serde_json::Value),
}

impl DataValue {
    /// Returns the wire type code of this value.
    ///
    /// Strings and objects have no code: strings travel untagged and objects
    /// do not travel at all.
    #[must_use]
    pub fn type_code(&self) -> Option<TypeCode> {
        match self {
            Self::String(_) | Self::Object(_) => None,
            Self::Byte(_) => Some(TypeCode::Byte),
            Self::Short(_) => Some(TypeCode::Short),
            Self::Int(_) => Some(TypeCode::Int),
            Self::Long(_) => Some(TypeCode::Long),
            Self::Float(_) => Some(TypeCode::Float),
            Self::Double(_) => Some(TypeCode::Double),
            Self::Char(_) => Some(TypeCode::Char),
            Self::Boolean(_) => Some(TypeCode::Boolean),
        }
    }

    /// Whether this value may be written to a propagation header.
    #[must_use]
    pub fn is_header_eligible(&self) -> bool {
        !matches!(self, Self::Object(_))
    }

    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value the way it is published to a tag sink.
    #[must_use]
    pub fn to_tag_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) => f.write_str(v),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Object(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i8> for DataValue {
    fn from(value: i8) -> Self {
        Self::Byte(value)
    }
}

impl From<i16> for DataValue {
    fn from(value: i16) -> Self {
        Self::Short(value)
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for DataValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<char> for DataValue {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Object(value)
    }
}

/// Single-character type tags used in the `type` header property.
///
/// `a` marks bytes so that `b` stays free for booleans. The mapping is part
/// of the wire format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// `a`
    Byte,
    /// `s`
    Short,
    /// `i`
    Int,
    /// `l`
    Long,
    /// `f`
    Float,
    /// `d`
    Double,
    /// `c`
    Char,
    /// `b`
    Boolean,
}

impl TypeCode {
    /// All registered codes.
    pub const ALL: [Self; 8] = [
        Self::Byte,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Char,
        Self::Boolean,
    ];

    /// The wire character of this code.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Byte => 'a',
            Self::Short => 's',
            Self::Int => 'i',
            Self::Long => 'l',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::Char => 'c',
            Self::Boolean => 'b',
        }
    }

    /// Looks up a code from its wire form. Only single characters match.
    #[must_use]
    pub fn from_wire(id: &str) -> Option<Self> {
        let mut chars = id.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Self::ALL.into_iter().find(|code| code.as_char() == c)
    }

    /// Parses a textual value into a typed value of this code.
    ///
    /// Returns `None` if the text is not a valid literal for the type.
    #[must_use]
    pub fn parse(self, text: &str) -> Option<DataValue> {
        match self {
            Self::Byte => text.parse().ok().map(DataValue::Byte),
            Self::Short => text.parse().ok().map(DataValue::Short),
            Self::Int => text.parse().ok().map(DataValue::Int),
            Self::Long => text.parse().ok().map(DataValue::Long),
            Self::Float => text.parse().ok().map(DataValue::Float),
            Self::Double => text.parse().ok().map(DataValue::Double),
            Self::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(DataValue::Char(c)),
                    _ => None,
                }
            }
            Self::Boolean => {
                if text.eq_ignore_ascii_case("true") {
                    Some(DataValue::Boolean(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Some(DataValue::Boolean(false))
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_are_fixed() {
        let wire: String = TypeCode::ALL.iter().map(|c| c.as_char()).collect();
        assert_eq!(wire, "asilfdcb");
    }

    #[test]
    fn test_from_wire_rejects_unknown_and_long_ids() {
        assert_eq!(TypeCode::from_wire("l"), Some(TypeCode::Long));
        assert_eq!(TypeCode::from_wire("x"), None);
        assert_eq!(TypeCode::from_wire("ll"), None);
        assert_eq!(TypeCode::from_wire(""), None);
    }

    #[test]
    fn test_value_type_code() {
        assert_eq!(DataValue::from(7_i64).type_code(), Some(TypeCode::Long));
        assert_eq!(DataValue::from(7_i8).type_code(), Some(TypeCode::Byte));
        assert_eq!(DataValue::from("x").type_code(), None);
        assert_eq!(DataValue::from(serde_json::json!({})).type_code(), None);
    }

    #[test]
    fn test_parse_char_requires_single_char() {
        assert_eq!(TypeCode::Char.parse("x"), Some(DataValue::Char('x')));
        assert_eq!(TypeCode::Char.parse("é"), Some(DataValue::Char('é')));
        assert_eq!(TypeCode::Char.parse("xy"), None);
        assert_eq!(TypeCode::Char.parse(""), None);
    }

    #[test]
    fn test_parse_boolean_is_case_insensitive() {
        assert_eq!(TypeCode::Boolean.parse("TRUE"), Some(DataValue::Boolean(true)));
        assert_eq!(TypeCode::Boolean.parse("false"), Some(DataValue::Boolean(false)));
        assert_eq!(TypeCode::Boolean.parse("yes"), None);
    }

    #[test]
    fn test_parse_integer_out_of_range() {
        assert_eq!(TypeCode::Byte.parse("127"), Some(DataValue::Byte(127)));
        assert_eq!(TypeCode::Byte.parse("128"), None);
    }

    #[test]
    fn test_tag_value_rendering() {
        assert_eq!(DataValue::from(42_i32).to_tag_value(), "42");
        assert_eq!(DataValue::from(true).to_tag_value(), "true");
        assert_eq!(DataValue::from(1.5_f64).to_tag_value(), "1.5");
    }
}
