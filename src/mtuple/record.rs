use crate::contract::{Contract, OperationSignature, Parameter, signature_of};
use crate::error::{BindError, MTupleError, MethodSendingError};
use crate::field_value::FieldValue;
use crate::types::FieldMap;
use crate::value::MValue;
use once_cell::race::OnceBox;
use serde::ser::{Serialize, SerializeMap, SerializeStruct, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use xxhash_rust::xxh64::Xxh64;

// ─── MTuple ─────────────────────────────────────────────────────────────────

/// Immutable capture of one operation call on contract `C`: the operation's
/// signature plus its argument values in parameter order.
///
/// Equality and hashing are structural over signature and arguments. The
/// name → value projection is computed on first use and cached; concurrent
/// first readers may each compute it, the first one stored wins.
pub struct MTuple<C: Contract> {
    signature: &'static OperationSignature,
    args: Box<[MValue]>,
    fields: OnceBox<FieldMap>,
    _contract: PhantomData<fn() -> C>,
}

impl<C: Contract> MTuple<C> {
    // ════════════════════════════════════════════════════════════════════════
    // Construction
    // ════════════════════════════════════════════════════════════════════════

    /// Capture `call` directly, without going through a builder.
    pub fn from_call(call: C) -> Result<Self, MTupleError> {
        let signature = signature_of::<C>(call.operation_name())?;
        let args = call.into_args();
        Self::checked(signature, args)
    }

    /// Positional construction. `signature` must be declared on `C`, `args`
    /// must match its arity and bind onto the variant. Stored values take the
    /// declared parameter types, so `I64(3)` for a `u64` parameter is kept as
    /// `U64(3)`.
    pub fn over(signature: &OperationSignature, args: Vec<MValue>) -> Result<Self, MTupleError> {
        let declared = Self::declared(signature)?;
        Self::normalized(declared, args)
    }

    /// Name-indexed construction. Parameters missing from `fields` are null;
    /// names that are not parameters are ignored. Values are normalized as in
    /// [`over`](Self::over).
    pub fn over_map(signature: &OperationSignature, fields: &FieldMap) -> Result<Self, MTupleError> {
        let declared = Self::declared(signature)?;
        let args = declared
            .parameters()
            .iter()
            .map(|p| fields.get(p.name()).cloned().unwrap_or_default())
            .collect();
        Self::normalized(declared, args)
    }

    fn declared(signature: &OperationSignature) -> Result<&'static OperationSignature, MTupleError> {
        C::operations()
            .iter()
            .find(|s| *s == signature)
            .ok_or_else(|| MTupleError::UnsupportedOperation {
                contract: signature.contract().into(),
                operation: signature.name().into(),
            })
    }

    /// Bind `args` onto the variant and capture the result, so equal calls
    /// store identical values however they were supplied.
    fn normalized(signature: &'static OperationSignature, args: Vec<MValue>) -> Result<Self, MTupleError> {
        if args.len() != signature.arity() {
            return Err(MTupleError::Arity {
                operation: signature.name().into(),
                expected: signature.arity(),
                actual: args.len(),
            });
        }
        let call = C::bind(signature, &args).map_err(|source| Self::bind_failure(signature, source))?;
        Self::checked(signature, call.into_args())
    }

    fn bind_failure(signature: &OperationSignature, source: BindError) -> MTupleError {
        match source {
            BindError::UnknownOperation { operation } => MTupleError::UnsupportedOperation {
                contract: C::NAME.into(),
                operation,
            },
            source => MethodSendingError::Access {
                contract: C::NAME.into(),
                operation: signature.name().into(),
                source,
            }
            .into(),
        }
    }

    fn checked(signature: &'static OperationSignature, args: Vec<MValue>) -> Result<Self, MTupleError> {
        if args.len() != signature.arity() {
            return Err(MTupleError::Arity {
                operation: signature.name().into(),
                expected: signature.arity(),
                actual: args.len(),
            });
        }
        Ok(Self {
            signature,
            args: args.into_boxed_slice(),
            fields: OnceBox::new(),
            _contract: PhantomData,
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Accessors
    // ════════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn signature(&self) -> &'static OperationSignature {
        self.signature
    }

    #[inline]
    pub fn args(&self) -> &[MValue] {
        &self.args
    }

    #[inline]
    pub fn operation_name(&self) -> &str {
        self.signature.name()
    }

    /// Memoized name → value projection.
    pub fn to_map(&self) -> &FieldMap {
        self.fields.get_or_init(|| Box::new(self.create_map()))
    }

    fn create_map(&self) -> FieldMap {
        self.signature
            .parameters()
            .iter()
            .zip(self.args.iter())
            .map(|(p, v)| (p.name().into(), v.clone()))
            .collect()
    }

    /// Value bound to parameter `name`, or `None` if the captured operation
    /// declares no such parameter.
    pub fn get(&self, name: &str) -> Option<&MValue> {
        self.to_map().get(name)
    }

    /// Like [`get`](Self::get), converted to `T`. `None` also when the value
    /// does not convert.
    pub fn get_as<T: FieldValue>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(T::from_value)
    }

    /// Rebuild the captured call as a `C` variant.
    pub fn to_call(&self) -> Result<C, MTupleError> {
        C::bind(self.signature, &self.args).map_err(|source| Self::bind_failure(self.signature, source))
    }

    /// 64-bit xxh64 digest of the structural identity. Equal records have
    /// equal fingerprints, across processes on the same platform.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        self.hash(&mut hasher);
        hasher.finish()
    }
}

// ─── Identity ───────────────────────────────────────────────────────────────

impl<C: Contract> Clone for MTuple<C> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature,
            args: self.args.clone(),
            fields: OnceBox::new(),
            _contract: PhantomData,
        }
    }
}

impl<C: Contract> PartialEq for MTuple<C> {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature && self.args == other.args
    }
}

impl<C: Contract> Eq for MTuple<C> {}

impl<C: Contract> Hash for MTuple<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature.hash(state);
        self.args.hash(state);
    }
}

// ─── Rendering ──────────────────────────────────────────────────────────────

impl<C: Contract> fmt::Debug for MTuple<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MTuple")
            .field("signature", &format_args!("{}", self.signature))
            .field("args", &self.args)
            .finish()
    }
}

/// `Contract.operation{name=value, ...}`, fields in parameter order.
impl<C: Contract> fmt::Display for MTuple<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.to_map();
        write!(f, "{}.{}{{", self.signature.contract(), self.signature.name())?;
        for (i, p) in self.signature.parameters().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match map.get(p.name()) {
                Some(v) => write!(f, "{}={}", p.name(), v)?,
                None => write!(f, "{}=null", p.name())?,
            }
        }
        f.write_str("}")
    }
}

struct OrderedFields<'a> {
    parameters: &'a [Parameter],
    args: &'a [MValue],
}

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut m = serializer.serialize_map(Some(self.args.len()))?;
        for (p, v) in self.parameters.iter().zip(self.args.iter()) {
            m.serialize_entry(p.name(), v)?;
        }
        m.end()
    }
}

impl<C: Contract> Serialize for MTuple<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MTuple", 3)?;
        s.serialize_field("contract", self.signature.contract())?;
        s.serialize_field("operation", self.signature.name())?;
        s.serialize_field(
            "fields",
            &OrderedFields {
                parameters: self.signature.parameters(),
                args: &self.args,
            },
        )?;
        s.end()
    }
}
