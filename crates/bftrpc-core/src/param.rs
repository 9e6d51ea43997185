//! Parameter typing for registered functions.
//!
//! Every argument type of a registered function implements [`Param`], which
//! exposes a [`TypeTag`] (plain metadata used for query-string heuristics and
//! listings) and the conversion from a bound wire value into the concrete
//! Rust type.

use std::any::TypeId;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::BindError;
use crate::types::{Bytes, Polymorphic};

// ==============================================================================
// Type Tags
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Int,
    Uint,
    Float,
    Bool,
    String,
    Bytes,
    Optional(Box<TypeTag>),
    /// Any other structurally decoded type.
    Json(&'static str),
    /// An interface-shaped result carrying its concrete type tag.
    Interface,
    /// The error half of a function's two-value return.
    Error,
}

impl TypeTag {
    /// The tag with every `Optional` layer removed.
    pub fn pointee(&self) -> &TypeTag {
        match self {
            Self::Optional(inner) => inner.pointee(),
            other => other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Uint | Self::Float)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Tag for a function's result type.
    pub fn of_result<R: 'static>() -> TypeTag {
        if TypeId::of::<R>() == TypeId::of::<Polymorphic>() {
            Self::Interface
        } else {
            Self::Json(short_type_name::<R>())
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Json(name) => f.write_str(name),
            Self::Interface => f.write_str("interface"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Last path segment of a non-generic type name (`alloc::string::String` -> `String`).
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

// ==============================================================================
// Bound Arguments
// ==============================================================================

/// One argument after the binder has resolved its wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Not supplied: the target type's zero value is used.
    Absent,
    /// A JSON value to decode structurally.
    Json(Value),
    /// Raw bytes from a hex or quoted query argument.
    Bytes(Vec<u8>),
}

/// A type that can be bound from the wire as a registered function argument.
///
/// The zero value used for omitted arguments is `Default::default()`. Types
/// outside this crate opt in with [`json_param!`](crate::json_param).
pub trait Param: DeserializeOwned + Default + Send + 'static {
    fn type_tag() -> TypeTag;

    fn from_arg(arg: ArgValue) -> Result<Self, BindError> {
        match arg {
            ArgValue::Absent => Ok(Self::default()),
            ArgValue::Json(value) => Ok(serde_json::from_value(value)?),
            ArgValue::Bytes(_) => Err(BindError::BytesTarget(Self::type_tag())),
        }
    }
}

/// Implements [`Param`] for types decoded structurally from JSON.
#[macro_export]
macro_rules! json_param {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::param::Param for $ty {
                fn type_tag() -> $crate::param::TypeTag {
                    $crate::param::TypeTag::Json(stringify!($ty))
                }
            }
        )+
    };
}

macro_rules! tagged_param {
    ($tag:ident => $($ty:ty),+) => {
        $(
            impl Param for $ty {
                fn type_tag() -> TypeTag {
                    TypeTag::$tag
                }
            }
        )+
    };
}

tagged_param!(Int => i8, i16, i32, i64, isize);
tagged_param!(Uint => u8, u16, u32, u64, usize);
tagged_param!(Float => f32, f64);
tagged_param!(Bool => bool);

impl Param for String {
    fn type_tag() -> TypeTag {
        TypeTag::String
    }

    fn from_arg(arg: ArgValue) -> Result<Self, BindError> {
        match arg {
            ArgValue::Absent => Ok(String::new()),
            ArgValue::Json(value) => Ok(serde_json::from_value(value)?),
            ArgValue::Bytes(bytes) => Ok(String::from_utf8(bytes)?),
        }
    }
}

impl Param for Bytes {
    fn type_tag() -> TypeTag {
        TypeTag::Bytes
    }

    fn from_arg(arg: ArgValue) -> Result<Self, BindError> {
        match arg {
            ArgValue::Absent => Ok(Bytes::default()),
            ArgValue::Json(value) => Ok(serde_json::from_value(value)?),
            ArgValue::Bytes(bytes) => Ok(Bytes(bytes)),
        }
    }
}

impl<T: Param> Param for Option<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Optional(Box::new(T::type_tag()))
    }

    fn from_arg(arg: ArgValue) -> Result<Self, BindError> {
        match arg {
            ArgValue::Absent | ArgValue::Json(Value::Null) => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

impl<T: Param> Param for Vec<T> {
    fn type_tag() -> TypeTag {
        TypeTag::Json("array")
    }
}

impl Param for Value {
    fn type_tag() -> TypeTag {
        TypeTag::Json("any")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_arguments_take_zero_values() {
        assert_eq!(i64::from_arg(ArgValue::Absent).expect("bind"), 0);
        assert_eq!(String::from_arg(ArgValue::Absent).expect("bind"), "");
        assert_eq!(Bytes::from_arg(ArgValue::Absent).expect("bind"), Bytes::default());
        assert_eq!(Option::<u64>::from_arg(ArgValue::Absent).expect("bind"), None);
    }

    #[test]
    fn optional_wraps_only_produced_values() {
        let bound = Option::<u64>::from_arg(ArgValue::Json(json!(5))).expect("bind");
        assert_eq!(bound, Some(5));
        let null = Option::<u64>::from_arg(ArgValue::Json(Value::Null)).expect("bind");
        assert_eq!(null, None);
        let nested = Option::<Option<Bytes>>::from_arg(ArgValue::Bytes(vec![1])).expect("bind");
        assert_eq!(nested, Some(Some(Bytes(vec![1]))));
    }

    #[test]
    fn bytes_coerce_into_strings_but_not_integers() {
        let text = String::from_arg(ArgValue::Bytes(b"hello".to_vec())).expect("bind");
        assert_eq!(text, "hello");
        let err = i64::from_arg(ArgValue::Bytes(vec![1])).expect_err("ints reject bytes");
        assert!(matches!(err, BindError::BytesTarget(TypeTag::Int)));
    }

    #[test]
    fn tags_unwrap_optionals() {
        let tag = Option::<Option<u32>>::type_tag();
        assert!(tag.is_optional());
        assert_eq!(tag.pointee(), &TypeTag::Uint);
        assert!(tag.pointee().is_numeric());
        assert_eq!(tag.to_string(), "optional<optional<uint>>");
    }

    #[test]
    fn result_tags_detect_interfaces() {
        assert_eq!(TypeTag::of_result::<Polymorphic>(), TypeTag::Interface);
        assert_eq!(TypeTag::of_result::<String>(), TypeTag::Json("String"));
    }
}
