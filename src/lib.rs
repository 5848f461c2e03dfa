//! Structurally comparable records of a single contract operation.
//!
//! A contract is a closed enum of operations declared with [`contract!`].
//! [`MTuple`] captures one call, compares and hashes structurally, projects
//! its arguments by parameter name, and replays the call onto any
//! [`Receiver`]. An [`Extractor`] pulls one value out of a record whichever
//! operation it captured.

pub mod config;
pub mod contract;
pub mod error;
pub mod extractor;
pub mod field_value;
pub mod mtuple;
pub mod types;
pub mod value;

pub use config::{CaptureConfig, RepeatedCallPolicy};
pub use contract::{Contract, OperationSignature, Parameter, signature_of, validate};
pub use error::{BindError, BoxError, MTupleError, MethodSendingError};
pub use extractor::{Extractor, Receiver, Sink};
pub use field_value::{FieldValue, ValueKind};
pub use mtuple::{MTuple, MTupleBuilder};
pub use smol_str::SmolStr;

#[doc(hidden)]
pub use once_cell;
pub use types::FieldMap;
pub use value::{MNumber, MValue};
