use crate::value::{MNumber, MValue};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

// ─── ValueKind ──────────────────────────────────────────────────────────────

/// Declared type of a contract parameter, and the runtime shape of an [`MValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Parameter accepts any value (declared as `MValue`).
    Any,
    Null,
    Bool,
    I64,
    U64,
    F64,
    Str,
    Array,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Any => "any",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::I64 => "i64",
            ValueKind::U64 => "u64",
            ValueKind::F64 => "f64",
            ValueKind::Str => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

// ─── FieldValue Trait ───────────────────────────────────────────────────────

/// Trait for typed contract fields that can be captured as an [`MValue`]
/// and bound back from one on replay.
///
/// `from_value` returns `None` when the value has the wrong shape; the caller
/// turns that into a `BindError::TypeMismatch`.
pub trait FieldValue: Sized {
    /// Kind recorded in the operation signature.
    const KIND: ValueKind;

    fn into_value(self) -> MValue;

    fn from_value(value: &MValue) -> Option<Self>;
}

impl FieldValue for MValue {
    const KIND: ValueKind = ValueKind::Any;

    #[inline]
    fn into_value(self) -> MValue {
        self
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Str;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::from(self)
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FieldValue for SmolStr {
    const KIND: ValueKind = ValueKind::Str;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::Str(self)
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        match value {
            MValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::Bool(self)
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for i64 {
    const KIND: ValueKind = ValueKind::I64;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::Number(MNumber::I64(self))
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        match value {
            MValue::Number(MNumber::F64(_)) => None,
            other => other.as_i64(),
        }
    }
}

impl FieldValue for i32 {
    const KIND: ValueKind = ValueKind::I64;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::Number(MNumber::I64(self as i64))
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        i64::from_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FieldValue for u64 {
    const KIND: ValueKind = ValueKind::U64;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::Number(MNumber::U64(self))
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        match value {
            MValue::Number(MNumber::F64(_)) => None,
            other => other.as_u64(),
        }
    }
}

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::F64;

    #[inline]
    fn into_value(self) -> MValue {
        MValue::Number(MNumber::F64(self))
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        value.as_f64()
    }
}

/// `None` is captured as `MValue::Null`.
impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    #[inline]
    fn into_value(self) -> MValue {
        match self {
            Some(v) => v.into_value(),
            None => MValue::Null,
        }
    }

    #[inline]
    fn from_value(value: &MValue) -> Option<Self> {
        match value {
            MValue::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    const KIND: ValueKind = ValueKind::Array;

    fn into_value(self) -> MValue {
        MValue::Array(self.into_iter().map(FieldValue::into_value).collect())
    }

    fn from_value(value: &MValue) -> Option<Self> {
        value.as_array()?.iter().map(T::from_value).collect()
    }
}
