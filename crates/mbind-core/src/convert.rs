#![forbid(unsafe_code)]

//! String-to-value conversion for markup attributes.
//!
//! The markup loader hands over `(field, "string")` pairs. Each field
//! declares a [`ValueKind`] and optionally a named converter; the
//! [`ConverterRegistry`] resolves the converter and produces a typed
//! [`Value`] or a structured [`ConversionError`].
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Malformed input | `"abc"` for an int field | `Err(ConversionError::Invalid)` |
//! | Unknown converter name | typo in a field descriptor | `Err(ConversionError::UnknownConverter)` |
//! | Kind without converter | object fields | `Err(ConversionError::NoConverter)` |
//!
//! Conversion never panics; the caller decides whether to skip the field.

use std::rc::Rc;

use ahash::AHashMap;

use crate::color::Rgba;
use crate::value::{Length, Value, ValueKind};

/// Errors produced while converting a markup string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// The input could not be parsed as the requested kind.
    #[error("cannot convert {input:?} to {kind}: {reason}")]
    Invalid {
        input: String,
        kind: ValueKind,
        reason: &'static str,
    },
    /// No built-in converter exists for the kind.
    #[error("no converter for values of kind {0}")]
    NoConverter(ValueKind),
    /// A field referenced a named converter that was never registered.
    #[error("unknown converter {0:?}")]
    UnknownConverter(String),
}

impl ConversionError {
    fn invalid(input: &str, kind: ValueKind, reason: &'static str) -> Self {
        Self::Invalid {
            input: input.to_owned(),
            kind,
            reason,
        }
    }
}

/// Converts a markup string into a [`Value`].
pub trait ValueConverter {
    /// Kind of the values produced.
    fn kind(&self) -> ValueKind;

    fn convert(&self, raw: &str) -> Result<Value, ConversionError>;
}

// ---------------------------------------------------------------------------
// Built-in converters
// ---------------------------------------------------------------------------

/// Converter for one of the built-in kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinConverter(pub ValueKind);

impl ValueConverter for BuiltinConverter {
    fn kind(&self) -> ValueKind {
        self.0
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let kind = self.0;
        let s = raw.trim();
        match kind {
            ValueKind::Bool => parse_bool(s)
                .map(Value::Bool)
                .ok_or_else(|| ConversionError::invalid(raw, kind, "expected true/false")),
            ValueKind::Int => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ConversionError::invalid(raw, kind, "expected an integer")),
            ValueKind::Float => s
                .trim_end_matches(['f', 'F'])
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ConversionError::invalid(raw, kind, "expected a number")),
            ValueKind::Text => Ok(Value::Text(raw.to_owned())),
            ValueKind::Length => parse_length(s)
                .map(Value::Length)
                .ok_or_else(|| ConversionError::invalid(raw, kind, "expected auto, N, Npx or N%")),
            ValueKind::Color => Rgba::parse(s)
                .map(Value::Color)
                .ok_or_else(|| ConversionError::invalid(raw, kind, "expected a color")),
            ValueKind::Object => Err(ConversionError::NoConverter(kind)),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("no") || s == "0" {
        Some(false)
    } else {
        None
    }
}

/// Parse a markup length: `auto`, `10`, `10px`, `50%`.
#[must_use]
pub fn parse_length(s: &str) -> Option<Length> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("auto") {
        return Some(Length::Auto);
    }
    let finite = |v: f32| v.is_finite().then_some(v);
    if let Some(pct) = s.strip_suffix('%') {
        return pct.trim().parse().ok().and_then(finite).map(Length::Percent);
    }
    let px = s.strip_suffix("px").unwrap_or(s);
    px.trim().parse().ok().and_then(finite).map(Length::Pixels)
}

/// Maps a closed set of names (case-insensitive) to their canonical spelling.
///
/// Used for enum-like fields such as `Orientation="horizontal"`.
#[derive(Debug, Clone)]
pub struct EnumConverter {
    variants: Vec<&'static str>,
}

impl EnumConverter {
    #[must_use]
    pub fn new(variants: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            variants: variants.into_iter().collect(),
        }
    }
}

impl ValueConverter for EnumConverter {
    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let s = raw.trim();
        self.variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(s))
            .map(|v| Value::Text((*v).to_owned()))
            .ok_or_else(|| ConversionError::invalid(raw, ValueKind::Text, "unknown variant"))
    }
}

// ---------------------------------------------------------------------------
// ConverterRegistry
// ---------------------------------------------------------------------------

/// Pluggable converter lookup.
///
/// Built-in converters cover every kind except [`ValueKind::Object`]; named
/// converters extend or override them per field.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    named: AHashMap<String, Rc<dyn ValueConverter>>,
}

impl ConverterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named converter, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, converter: impl ValueConverter + 'static) {
        self.named.insert(name.into(), Rc::new(converter));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Convert `raw` for a field of `kind`, using `converter` when named.
    pub fn convert(
        &self,
        kind: ValueKind,
        converter: Option<&str>,
        raw: &str,
    ) -> Result<Value, ConversionError> {
        match converter {
            Some(name) => self
                .named
                .get(name)
                .ok_or_else(|| ConversionError::UnknownConverter(name.to_owned()))?
                .convert(raw),
            None => BuiltinConverter(kind).convert(raw),
        }
    }
}

impl core::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<_> = self.named.keys().collect();
        names.sort();
        f.debug_struct("ConverterRegistry")
            .field("named", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn conv(kind: ValueKind, raw: &str) -> Result<Value, ConversionError> {
        ConverterRegistry::new().convert(kind, None, raw)
    }

    #[test]
    fn lengths() {
        assert_eq!(conv(ValueKind::Length, "50%"), Ok(Value::Length(Length::Percent(50.0))));
        assert_eq!(conv(ValueKind::Length, "12px"), Ok(Value::Length(Length::Pixels(12.0))));
        assert_eq!(conv(ValueKind::Length, " 8 "), Ok(Value::Length(Length::Pixels(8.0))));
        assert_eq!(conv(ValueKind::Length, "Auto"), Ok(Value::Length(Length::Auto)));
        assert!(conv(ValueKind::Length, "wide").is_err());
        assert!(conv(ValueKind::Length, "inf%").is_err());
    }

    #[test]
    fn bools_and_numbers() {
        assert_eq!(conv(ValueKind::Bool, "True"), Ok(Value::Bool(true)));
        assert_eq!(conv(ValueKind::Bool, "0"), Ok(Value::Bool(false)));
        assert_eq!(conv(ValueKind::Int, "-4"), Ok(Value::Int(-4)));
        assert_eq!(conv(ValueKind::Float, "0.5f"), Ok(Value::Float(0.5)));
        assert_eq!(conv(ValueKind::Text, " padded "), Ok(Value::Text(" padded ".into())));
    }

    #[test]
    fn invalid_input_is_structured() {
        let err = conv(ValueKind::Int, "four").unwrap_err();
        match &err {
            ConversionError::Invalid { input, kind, .. } => {
                assert_eq!(input, "four");
                assert_eq!(*kind, ValueKind::Int);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("\"four\""));
    }

    #[test]
    fn object_kind_has_no_converter() {
        assert_eq!(
            conv(ValueKind::Object, "x"),
            Err(ConversionError::NoConverter(ValueKind::Object))
        );
    }

    #[test]
    fn named_converters() {
        let mut reg = ConverterRegistry::new();
        reg.register("orientation", EnumConverter::new(["Horizontal", "Vertical"]));
        assert!(reg.contains("orientation"));
        assert_eq!(
            reg.convert(ValueKind::Text, Some("orientation"), "vertical"),
            Ok(Value::Text("Vertical".into()))
        );
        assert!(reg.convert(ValueKind::Text, Some("orientation"), "diagonal").is_err());
        assert_eq!(
            reg.convert(ValueKind::Text, Some("missing"), "x"),
            Err(ConversionError::UnknownConverter("missing".into()))
        );
    }

    proptest! {
        #[test]
        fn int_conversion_matches_display(n in any::<i64>()) {
            prop_assert_eq!(conv(ValueKind::Int, &n.to_string()), Ok(Value::Int(n)));
        }

        #[test]
        fn conversion_never_panics(s in ".{0,16}") {
            for kind in [ValueKind::Bool, ValueKind::Int, ValueKind::Float, ValueKind::Length, ValueKind::Color] {
                let _ = conv(kind, &s);
            }
        }
    }
}
