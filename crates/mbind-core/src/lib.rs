#![forbid(unsafe_code)]

//! Field values and markup conversion for markbind.
//!
//! This crate provides:
//! - [`Value`] — the dynamically typed value stored in every view field
//! - [`Length`] and [`Rgba`] — layout lengths and colors as written in markup
//! - [`ConverterRegistry`] — pluggable string-to-value conversion with
//!   structured [`ConversionError`]s

pub mod color;
pub mod convert;
pub mod value;

pub use color::Rgba;
pub use convert::{BuiltinConverter, ConversionError, ConverterRegistry, EnumConverter, ValueConverter};
pub use value::{FieldValue, Length, ObjectRef, Value, ValueKind};
