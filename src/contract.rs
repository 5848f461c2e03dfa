use crate::error::{BindError, MTupleError};
use crate::field_value::{FieldValue, ValueKind};
use crate::types::FastHashSet;
use crate::value::MValue;
use serde::Serialize;
use smol_str::SmolStr;
use std::fmt;
use tracing::warn;

// ─── Signatures ─────────────────────────────────────────────────────────────

/// One named, typed parameter of a declared operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Parameter {
    name: SmolStr,
    kind: ValueKind,
}

impl Parameter {
    pub fn new(name: impl Into<SmolStr>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// Identity of one declared operation: owning contract, operation name and
/// ordered parameters. Two signatures are equal iff all three are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OperationSignature {
    contract: SmolStr,
    name: SmolStr,
    parameters: Vec<Parameter>,
}

impl OperationSignature {
    pub fn new(
        contract: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self {
            contract: contract.into(),
            name: name.into(),
            parameters,
        }
    }

    #[inline]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Position of the parameter called `name`, if declared.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.contract, self.name)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", p.name, p.kind)?;
        }
        f.write_str(")")
    }
}

// ─── Contract Trait ─────────────────────────────────────────────────────────

/// A closed set of operations, one enum variant per operation.
///
/// Usually generated with [`contract!`](crate::contract!). A hand-written impl
/// must keep `operations()` in sync with the variants: `operation_name` has to
/// name a declared signature, `into_args` has to yield values in parameter
/// order, and `bind` has to invert `into_args`.
pub trait Contract: Sized + 'static {
    /// Contract name used in signatures and rendering.
    const NAME: &'static str;

    /// Declared signatures, in declaration order.
    fn operations() -> &'static [OperationSignature];

    /// Name of the operation this value invokes.
    fn operation_name(&self) -> &'static str;

    /// Positional argument values, in parameter order.
    fn into_args(self) -> Vec<MValue>;

    /// Rebuild the variant for `signature` from positional values.
    fn bind(signature: &OperationSignature, args: &[MValue]) -> Result<Self, BindError>;
}

/// Look up the declared signature of `operation` on `C`.
pub fn signature_of<C: Contract>(operation: &str) -> Result<&'static OperationSignature, MTupleError> {
    C::operations()
        .iter()
        .find(|s| s.name() == operation)
        .ok_or_else(|| MTupleError::UnsupportedOperation {
            contract: C::NAME.into(),
            operation: operation.into(),
        })
}

/// Check that `C` is a pure operation declaration.
///
/// Rejects an empty contract name, signatures tagged with another contract,
/// duplicate operation names, and empty or duplicate parameter names.
pub fn validate<C: Contract>() -> Result<(), MTupleError> {
    let reject = |reason: String| {
        warn!(contract = C::NAME, %reason, "contract rejected");
        Err(MTupleError::Configuration {
            contract: C::NAME.into(),
            reason,
        })
    };

    if C::NAME.is_empty() {
        return reject("contract name is empty".to_string());
    }

    let mut seen_ops: FastHashSet<&str> = FastHashSet::default();
    for sig in C::operations() {
        if sig.contract() != C::NAME {
            return reject(format!(
                "operation `{}` is declared on `{}`",
                sig.name(),
                sig.contract()
            ));
        }
        if sig.name().is_empty() {
            return reject("operation with an empty name".to_string());
        }
        if !seen_ops.insert(sig.name()) {
            return reject(format!("operation `{}` is declared twice", sig.name()));
        }

        let mut seen_params: FastHashSet<&str> = FastHashSet::default();
        for p in sig.parameters() {
            if p.name().is_empty() {
                return reject(format!("operation `{}` has an unnamed parameter", sig.name()));
            }
            if !seen_params.insert(p.name()) {
                return reject(format!(
                    "operation `{}` declares parameter `{}` twice",
                    sig.name(),
                    p.name()
                ));
            }
        }
    }
    Ok(())
}

static NULL: MValue = MValue::Null;

/// Bind one positional value to a typed field. A missing value binds as null.
#[doc(hidden)]
pub fn bind_arg<T: FieldValue>(parameter: &str, value: Option<&MValue>) -> Result<T, BindError> {
    let value = value.unwrap_or(&NULL);
    T::from_value(value).ok_or_else(|| BindError::TypeMismatch {
        parameter: parameter.into(),
        expected: T::KIND,
        actual: value.kind(),
    })
}

/// Declare a contract as an enum with one struct-like variant per operation.
///
/// Variant names become operation names and field names become parameter
/// names. Every field type must implement [`FieldValue`](crate::FieldValue).
///
/// ```
/// mtuples::contract! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub enum Message {
///         ItemCreated { id: String, name: String },
///         ItemDeleted { id: String },
///     }
/// }
/// ```
#[macro_export]
macro_rules! contract {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident { $( $field:ident : $ty:ty ),* $(,)? }
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant { $( $field: $ty ),* }
            ),*
        }

        impl $crate::Contract for $name {
            const NAME: &'static str = stringify!($name);

            fn operations() -> &'static [$crate::OperationSignature] {
                static OPERATIONS: $crate::once_cell::sync::Lazy<::std::vec::Vec<$crate::OperationSignature>> =
                    $crate::once_cell::sync::Lazy::new(|| {
                        ::std::vec![
                            $(
                                $crate::OperationSignature::new(
                                    stringify!($name),
                                    stringify!($variant),
                                    ::std::vec![
                                        $(
                                            $crate::Parameter::new(
                                                stringify!($field),
                                                <$ty as $crate::FieldValue>::KIND,
                                            )
                                        ),*
                                    ],
                                )
                            ),*
                        ]
                    });
                OPERATIONS.as_slice()
            }

            fn operation_name(&self) -> &'static str {
                match *self {
                    $( $name::$variant { .. } => stringify!($variant) ),*
                }
            }

            fn into_args(self) -> ::std::vec::Vec<$crate::MValue> {
                match self {
                    $(
                        $name::$variant { $( $field ),* } => ::std::vec![
                            $( $crate::FieldValue::into_value($field) ),*
                        ]
                    ),*
                }
            }

            #[allow(unused_mut, unused_variables)]
            fn bind(
                signature: &$crate::OperationSignature,
                args: &[$crate::MValue],
            ) -> ::std::result::Result<Self, $crate::BindError> {
                if signature.contract() == <Self as $crate::Contract>::NAME {
                    if args.len() != signature.arity() {
                        return Err($crate::BindError::Arity {
                            expected: signature.arity(),
                            actual: args.len(),
                        });
                    }
                    let mut values = args.iter();
                    $(
                        if signature.name() == stringify!($variant) {
                            return Ok($name::$variant {
                                $( $field: $crate::contract::bind_arg::<$ty>(stringify!($field), values.next())? ),*
                            });
                        }
                    )*
                }
                Err($crate::BindError::UnknownOperation {
                    operation: signature.name().into(),
                })
            }
        }
    };
}
