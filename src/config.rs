use serde::{Deserialize, Serialize};

/// What a builder does when the capture function invokes more than one
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatedCallPolicy {
    /// Keep the last call, silently drop the earlier ones.
    #[default]
    LastCallWins,
    /// Fail the build with `MTupleError::RepeatedCapture`.
    Reject,
}

/// Configuration for [`MTupleBuilder::with_config`](crate::MTupleBuilder::with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Handling of repeated calls within one capture.
    ///
    /// Default: [`RepeatedCallPolicy::LastCallWins`].
    pub repeated_calls: RepeatedCallPolicy,
}

impl CaptureConfig {
    /// Reject captures that invoke more than one operation.
    pub fn strict() -> Self {
        Self {
            repeated_calls: RepeatedCallPolicy::Reject,
        }
    }
}
