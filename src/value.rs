use crate::field_value::ValueKind;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub type ObjectMap = BTreeMap<SmolStr, MValue>;

/// 2^63 and 2^64 as `f64`; `i64::MAX as f64` and `u64::MAX as f64` round up to these.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

// ─── MNumber ────────────────────────────────────────────────────────────────

/// Numeric payload of an [`MValue`].
///
/// Floats compare and hash by bit pattern, so `NaN == NaN` and `0.0 != -0.0`.
/// That keeps `Eq` and `Hash` lawful for records that carry floats.
#[derive(Clone, Copy)]
pub enum MNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl fmt::Debug for MNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MNumber::I64(i) => write!(f, "I64({})", i),
            MNumber::U64(u) => write!(f, "U64({})", u),
            MNumber::F64(v) => write!(f, "F64({})", v),
        }
    }
}

impl fmt::Display for MNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MNumber::I64(i) => write!(f, "{}", i),
            MNumber::U64(u) => write!(f, "{}", u),
            MNumber::F64(v) => write!(f, "{}", v),
        }
    }
}

impl PartialEq for MNumber {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MNumber::I64(a), MNumber::I64(b)) => a == b,
            (MNumber::U64(a), MNumber::U64(b)) => a == b,
            (MNumber::F64(a), MNumber::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for MNumber {}

impl Hash for MNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            MNumber::I64(i) => {
                state.write_u8(0);
                i.hash(state);
            }
            MNumber::U64(u) => {
                state.write_u8(1);
                u.hash(state);
            }
            MNumber::F64(f) => {
                state.write_u8(2);
                f.to_bits().hash(state);
            }
        }
    }
}

impl MNumber {
    pub fn as_f64(self) -> f64 {
        match self {
            MNumber::I64(i) => i as f64,
            MNumber::U64(u) => u as f64,
            MNumber::F64(f) => f,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            MNumber::I64(i) => Some(i),
            MNumber::U64(u) => i64::try_from(u).ok(),
            MNumber::F64(f) => {
                if f.fract() == 0.0 && f >= -I64_BOUND && f < I64_BOUND {
                    Some(f as i64)
                } else {
                    None
                }
            }
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            MNumber::U64(u) => Some(u),
            MNumber::I64(i) => u64::try_from(i).ok(),
            MNumber::F64(f) => {
                if f.fract() == 0.0 && f >= 0.0 && f < U64_BOUND {
                    Some(f as u64)
                } else {
                    None
                }
            }
        }
    }
}

// ─── MValue ─────────────────────────────────────────────────────────────────

/// A captured argument. Equality and hashing are deep and structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MValue {
    #[default]
    Null,
    Bool(bool),
    Number(MNumber),
    Str(SmolStr),
    Array(Vec<MValue>),
    Object(ObjectMap),
}

impl MValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MValue::Null => ValueKind::Null,
            MValue::Bool(_) => ValueKind::Bool,
            MValue::Number(MNumber::I64(_)) => ValueKind::I64,
            MValue::Number(MNumber::U64(_)) => ValueKind::U64,
            MValue::Number(MNumber::F64(_)) => ValueKind::F64,
            MValue::Str(_) => ValueKind::Str,
            MValue::Array(_) => ValueKind::Array,
            MValue::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MValue::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            MValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<MValue>> {
        match self {
            MValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&MValue> {
        self.as_object()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MValue::Null)
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

impl fmt::Display for MValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MValue::Null => f.write_str("null"),
            MValue::Bool(b) => write!(f, "{}", b),
            MValue::Number(n) => write!(f, "{}", n),
            MValue::Str(s) => f.write_str(s),
            MValue::Array(arr) => {
                f.write_str("[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            MValue::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ─── Serialize / Deserialize ────────────────────────────────────────────────

impl Serialize for MValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MValue::Null => serializer.serialize_none(),
            MValue::Bool(b) => serializer.serialize_bool(*b),
            MValue::Number(n) => match n {
                MNumber::I64(i) => serializer.serialize_i64(*i),
                MNumber::U64(u) => serializer.serialize_u64(*u),
                MNumber::F64(f) => serializer.serialize_f64(*f),
            },
            MValue::Str(s) => serializer.serialize_str(s.as_str()),
            MValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            MValue::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k.as_str(), v)?;
                }
                m.end()
            }
        }
    }
}

struct MValueVisitor;

impl<'de> Visitor<'de> for MValueVisitor {
    type Value = MValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any self-describing value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MValue, E> {
        Ok(MValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MValue, E> {
        Ok(MValue::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MValue, E> {
        // Small unsigned literals are indistinguishable from signed ones on
        // most formats; keep them signed so they compare equal to `i64` args.
        match i64::try_from(v) {
            Ok(i) => Ok(MValue::from(i)),
            Err(_) => Ok(MValue::from(v)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MValue, E> {
        Ok(MValue::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MValue, E> {
        Ok(MValue::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MValue, E> {
        Ok(MValue::from(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<MValue, E> {
        Ok(MValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<MValue, E> {
        Ok(MValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<MValue, D::Error> {
        MValue::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<MValue, A::Error> {
        let mut arr = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(v) = seq.next_element()? {
            arr.push(v);
        }
        Ok(MValue::Array(arr))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<MValue, A::Error> {
        let mut map = ObjectMap::new();
        while let Some((k, v)) = access.next_entry::<SmolStr, MValue>()? {
            map.insert(k, v);
        }
        Ok(MValue::Object(map))
    }
}

impl<'de> Deserialize<'de> for MValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MValueVisitor)
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<f64> for MValue {
    fn from(n: f64) -> Self {
        MValue::Number(MNumber::F64(n))
    }
}

impl From<i64> for MValue {
    fn from(n: i64) -> Self {
        MValue::Number(MNumber::I64(n))
    }
}

impl From<i32> for MValue {
    fn from(n: i32) -> Self {
        MValue::Number(MNumber::I64(n as i64))
    }
}

impl From<u64> for MValue {
    fn from(n: u64) -> Self {
        MValue::Number(MNumber::U64(n))
    }
}

impl From<bool> for MValue {
    fn from(b: bool) -> Self {
        MValue::Bool(b)
    }
}

impl From<&str> for MValue {
    fn from(s: &str) -> Self {
        MValue::Str(SmolStr::from(s))
    }
}

impl From<String> for MValue {
    fn from(s: String) -> Self {
        MValue::Str(SmolStr::from(s))
    }
}

impl From<SmolStr> for MValue {
    fn from(s: SmolStr) -> Self {
        MValue::Str(s)
    }
}

impl From<Vec<MValue>> for MValue {
    fn from(arr: Vec<MValue>) -> Self {
        MValue::Array(arr)
    }
}

impl From<ObjectMap> for MValue {
    fn from(map: ObjectMap) -> Self {
        MValue::Object(map)
    }
}

// ─── From/Into serde_json::Value ────────────────────────────────────────────

impl From<serde_json::Value> for MValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => MValue::Null,
            serde_json::Value::Bool(b) => MValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MValue::Number(MNumber::I64(i))
                } else if let Some(u) = n.as_u64() {
                    MValue::Number(MNumber::U64(u))
                } else {
                    MValue::Number(MNumber::F64(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => MValue::Str(SmolStr::from(s)),
            serde_json::Value::Array(arr) => {
                MValue::Array(arr.into_iter().map(MValue::from).collect())
            }
            serde_json::Value::Object(obj) => MValue::Object(
                obj.into_iter()
                    .map(|(k, v)| (SmolStr::from(k), MValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<MValue> for serde_json::Value {
    fn from(val: MValue) -> Self {
        match val {
            MValue::Null => serde_json::Value::Null,
            MValue::Bool(b) => serde_json::Value::Bool(b),
            MValue::Number(n) => match n {
                MNumber::I64(i) => serde_json::json!(i),
                MNumber::U64(u) => serde_json::json!(u),
                MNumber::F64(f) => serde_json::json!(f),
            },
            MValue::Str(s) => serde_json::Value::String(s.to_string()),
            MValue::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(|v| v.into()).collect())
            }
            MValue::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k.to_string(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Build an `MValue::Object` from `key => value` pairs. Nested `{ .. }`
/// blocks become nested objects.
///
/// ```
/// use mtuples::{mobj, MValue};
///
/// let user = mobj!({ "id" => "user:abc123", "profile" => { "age" => 28i64 } });
/// assert_eq!(user.get("id"), Some(&MValue::from("user:abc123")));
/// assert_eq!(
///     user.get("profile").and_then(|p| p.get("age")),
///     Some(&MValue::from(28i64))
/// );
/// ```
#[macro_export]
macro_rules! mobj {
    ({ $($key:expr => $val:tt),* $(,)? }) => {{
        let mut map = $crate::value::ObjectMap::new();
        $(
            map.insert(
                $crate::SmolStr::new($key),
                $crate::value::MValue::from($crate::mobj!(@value $val))
            );
        )*
        $crate::value::MValue::Object(map)
    }};

    (@value { $($inner:tt)* }) => {
        $crate::mobj!({ $($inner)* })
    };

    (@value $val:expr) => {
        $val
    };
}
