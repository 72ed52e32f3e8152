#![forbid(unsafe_code)]

//! Dynamically typed field values.
//!
//! Every named field on a view stores a [`Value`]. Markup attributes arrive
//! as strings and are converted into values (see [`crate::convert`]); code
//! and animation write values directly.
//!
//! # Equality
//!
//! Equality decides whether a write is a change (and therefore whether
//! subscribers are notified):
//!
//! | Variant | Semantics |
//! |---------|-----------|
//! | primitives, [`Length`], [`Rgba`] | by value |
//! | `Float` | by value, `NaN == NaN` so repeated NaN writes stay no-ops |
//! | [`ObjectRef`] | by reference (`Rc::ptr_eq`) |

use core::any::Any;
use core::fmt;
use std::rc::Rc;

use crate::color::Rgba;

/// The type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
    Length,
    Color,
    Object,
}

impl ValueKind {
    /// The zero value for this kind, used when a field declares no default.
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Text => Value::Text(String::new()),
            Self::Length => Value::Length(Length::Auto),
            Self::Color => Value::Color(Rgba::TRANSPARENT),
            Self::Object => Value::Empty,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Length => "length",
            Self::Color => "color",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Length
// ---------------------------------------------------------------------------

/// A layout length as written in markup: `"auto"`, `"50%"`, `"10px"` or `"10"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Length {
    /// Size is computed by layout.
    #[default]
    Auto,
    /// Absolute size in pixels.
    Pixels(f32),
    /// Fraction of the parent size, in percent (`50.0` is half).
    Percent(f32),
}

impl Length {
    /// Resolve against the parent extent. `Auto` has no fixed size.
    #[must_use]
    pub fn resolve(self, parent: f32) -> Option<f32> {
        match self {
            Self::Auto => None,
            Self::Pixels(px) => Some(px),
            Self::Percent(pct) => Some(parent * pct / 100.0),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Pixels(px) => write!(f, "{px}px"),
            Self::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectRef
// ---------------------------------------------------------------------------

/// A shared handle to an arbitrary owned object (a list item, a data model).
///
/// Compared by reference: two handles are equal only when they point at the
/// same allocation.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl ObjectRef {
    /// Wrap a value in a fresh allocation.
    pub fn new<T: Any>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    /// Share an existing allocation.
    pub fn from_rc<T: Any>(rc: Rc<T>) -> Self {
        Self {
            inner: rc,
            type_name: core::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    #[must_use]
    pub fn downcast_rc<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.inner).downcast::<T>().ok()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Name of the wrapped type, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef<{}>({:p})", self.type_name, Rc::as_ptr(&self.inner))
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A field value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value (unbound object field).
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Length(Length),
    Color(Rgba),
    Object(ObjectRef),
}

impl Value {
    /// Wrap an arbitrary object, compared by reference from now on.
    pub fn object<T: Any>(value: T) -> Self {
        Self::Object(ObjectRef::new(value))
    }

    /// Kind of the stored value; `None` for [`Value::Empty`].
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Self::Empty => return None,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Length(_) => ValueKind::Length,
            Self::Color(_) => ValueKind::Color,
            Self::Object(_) => ValueKind::Object,
        })
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_length(&self) -> Option<Length> {
        match self {
            Self::Length(l) => Some(*l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow the wrapped object as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object().and_then(ObjectRef::downcast_ref::<T>)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Length(a), Self::Length(b)) => a == b,
            (Self::Color(a), Self::Color(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("<empty>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Length(l) => write!(f, "{l}"),
            Self::Color(c) => write!(f, "{c}"),
            Self::Object(o) => write!(f, "<{}>", o.type_name()),
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident $(as $cast:ty)?),+ $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )+
    };
}

impl_from!(
    bool => Bool,
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float,
    f32 => Float as f64,
    String => Text,
    Length => Length,
    Rgba => Color,
    ObjectRef => Object,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

// ---------------------------------------------------------------------------
// FieldValue — typed access on top of Value
// ---------------------------------------------------------------------------

/// A Rust type stored in a field of a fixed [`ValueKind`].
///
/// Typed field keys use this to read and write [`Value`]s without matching
/// on variants at every call site.
pub trait FieldValue: Sized {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_field_value {
    ($($t:ty => $kind:ident, $getter:ident);+ $(;)?) => {
        $(
            impl FieldValue for $t {
                const KIND: ValueKind = ValueKind::$kind;

                fn into_value(self) -> Value {
                    Value::from(self)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    value.$getter()
                }
            }
        )+
    };
}

impl_field_value!(
    bool => Bool, as_bool;
    i64 => Int, as_int;
    Length => Length, as_length;
    Rgba => Color, as_color;
);

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(str::to_owned)
    }
}

impl<T: Any> FieldValue for Rc<T> {
    const KIND: ValueKind = ValueKind::Object;

    fn into_value(self) -> Value {
        Value::Object(ObjectRef::from_rc(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_object().and_then(ObjectRef::downcast_rc::<T>)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from("a"), Value::Text("a".into()));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn nan_is_equal_to_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn objects_compare_by_reference() {
        let a = ObjectRef::new(String::from("row"));
        let b = ObjectRef::new(String::from("row"));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn object_downcast() {
        let v = Value::object(42u8);
        assert_eq!(v.downcast_ref::<u8>(), Some(&42));
        assert_eq!(v.downcast_ref::<u16>(), None);
        let rc = v.as_object().and_then(ObjectRef::downcast_rc::<u8>);
        assert_eq!(rc.as_deref(), Some(&42));
    }

    #[test]
    fn length_resolves_against_parent() {
        assert_eq!(Length::Percent(50.0).resolve(200.0), Some(100.0));
        assert_eq!(Length::Pixels(12.0).resolve(200.0), Some(12.0));
        assert_eq!(Length::Auto.resolve(200.0), None);
    }

    #[test]
    fn kind_zero_values() {
        assert_eq!(ValueKind::Bool.zero(), Value::Bool(false));
        assert_eq!(ValueKind::Length.zero(), Value::Length(Length::Auto));
        assert!(ValueKind::Object.zero().is_empty());
        assert_eq!(Value::Empty.kind(), None);
        assert_eq!(Value::Int(1).kind(), Some(ValueKind::Int));
    }

    #[test]
    fn as_float_widens_ints() {
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Text("2".into()).as_float(), None);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Length::Percent(50.0).to_string(), "50%");
        assert_eq!(Value::Length(Length::Pixels(4.0)).to_string(), "4px");
        assert_eq!(Value::Empty.to_string(), "<empty>");
    }

    #[test]
    fn field_value_roundtrip_keeps_identity() {
        let rc = Rc::new(vec![1, 2, 3]);
        let v = Rc::clone(&rc).into_value();
        let back = <Rc<Vec<i32>>>::from_value(&v).unwrap();
        assert!(Rc::ptr_eq(&rc, &back));
        assert_eq!(<Rc<Vec<i32>>>::KIND, ValueKind::Object);
        assert_eq!(bool::from_value(&Value::Int(1)), None);
        assert_eq!(f64::from_value(&Value::Int(1)), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn length_serde_roundtrip() {
        let json = serde_json::to_string(&Length::Percent(25.0)).unwrap();
        let back: Length = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Length::Percent(25.0));
    }
}
