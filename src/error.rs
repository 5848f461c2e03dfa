// ─── Error ──────────────────────────────────────────────────────────────────
use crate::field_value::ValueKind;
use smol_str::SmolStr;
use thiserror::Error;

/// Boxed failure raised by a receiver's own logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum MTupleError {
    /// The contract is not a pure operation declaration.
    #[error("contract `{contract}` is not a pure operation declaration: {reason}")]
    Configuration { contract: SmolStr, reason: String },
    #[error("operation `{operation}` is not declared on contract `{contract}`")]
    UnsupportedOperation { contract: SmolStr, operation: SmolStr },
    /// Only raised under `RepeatedCallPolicy::Reject`.
    #[error("capture on `{contract}` invoked `{first}` and then `{second}`")]
    RepeatedCapture {
        contract: SmolStr,
        first: SmolStr,
        second: SmolStr,
    },
    #[error("operation `{operation}` takes {expected} arguments, got {actual}")]
    Arity {
        operation: SmolStr,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    MethodSending(#[from] MethodSendingError),
}

/// Failure while sending a captured call to a receiver.
///
/// `Access` means the call never reached the receiver, `Replay` means the
/// receiver was reached and its own logic failed.
#[derive(Debug, Error)]
pub enum MethodSendingError {
    #[error("cannot send `{contract}.{operation}`: {source}")]
    Access {
        contract: SmolStr,
        operation: SmolStr,
        #[source]
        source: BindError,
    },
    #[error("`{contract}.{operation}` failed in the receiver: {source}")]
    Replay {
        contract: SmolStr,
        operation: SmolStr,
        #[source]
        source: BoxError,
    },
}

/// Why positional values could not be bound back onto a contract variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("parameter `{parameter}` expects {expected}, got {actual}")]
    TypeMismatch {
        parameter: SmolStr,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("no variant for operation `{operation}`")]
    UnknownOperation { operation: SmolStr },
}
