use super::record::MTuple;
use crate::config::{CaptureConfig, RepeatedCallPolicy};
use crate::contract::{Contract, validate};
use crate::error::{BoxError, MTupleError};
use crate::extractor::Receiver;
use std::fmt;
use tracing::{debug, trace};

// ─── Builder ────────────────────────────────────────────────────────────────

/// Single-use stand-in for contract `C`: records the call made on it and
/// turns it into an [`MTuple`].
///
/// Under the default policy only the last call survives; earlier calls are
/// dropped without error.
pub struct MTupleBuilder<C: Contract> {
    config: CaptureConfig,
    captured: Option<C>,
    repeated: Option<(&'static str, &'static str)>,
}

impl<C: Contract> MTupleBuilder<C> {
    pub fn new() -> Self {
        Self::with_config(CaptureConfig::default())
    }

    pub fn with_config(config: CaptureConfig) -> Self {
        Self {
            config,
            captured: None,
            repeated: None,
        }
    }

    /// Record `call`, replacing any earlier capture.
    pub fn call(&mut self, call: C) {
        let operation = call.operation_name();
        trace!(contract = C::NAME, operation, "captured call");

        if let Some(previous) = self.captured.replace(call) {
            let first = previous.operation_name();
            match self.config.repeated_calls {
                RepeatedCallPolicy::LastCallWins => {
                    debug!(
                        contract = C::NAME,
                        discarded = first,
                        kept = operation,
                        "discarding earlier capture"
                    );
                }
                RepeatedCallPolicy::Reject => {
                    self.repeated.get_or_insert((first, operation));
                }
            }
        }
    }

    /// Validate `C`, run `capture` against this builder and convert the
    /// captured call. `Ok(None)` if `capture` made no call.
    pub fn build<F>(mut self, capture: F) -> Result<Option<MTuple<C>>, MTupleError>
    where
        F: FnOnce(&mut Self),
    {
        validate::<C>()?;
        capture(&mut self);

        if let Some((first, second)) = self.repeated {
            return Err(MTupleError::RepeatedCapture {
                contract: C::NAME.into(),
                first: first.into(),
                second: second.into(),
            });
        }
        self.captured.map(MTuple::from_call).transpose()
    }
}

impl<C: Contract> Default for MTupleBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Contract> fmt::Debug for MTupleBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MTupleBuilder")
            .field("contract", &C::NAME)
            .field("config", &self.config)
            .field(
                "captured",
                &self.captured.as_ref().map(Contract::operation_name),
            )
            .finish()
    }
}

impl<C: Contract> Receiver<C> for MTupleBuilder<C> {
    #[inline]
    fn receive(&mut self, call: C) -> Result<(), BoxError> {
        self.call(call);
        Ok(())
    }
}

impl<C: Contract> MTuple<C> {
    /// Build a record from whatever `capture` calls on a default builder.
    pub fn build<F>(capture: F) -> Result<Option<Self>, MTupleError>
    where
        F: FnOnce(&mut MTupleBuilder<C>),
    {
        MTupleBuilder::new().build(capture)
    }
}
