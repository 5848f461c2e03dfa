use super::record::MTuple;
use crate::contract::Contract;
use crate::error::{MTupleError, MethodSendingError};
use crate::extractor::{Extractor, Receiver, Sink};
use tracing::{debug, trace};

impl<C: Contract> MTuple<C> {
    // ════════════════════════════════════════════════════════════════════════
    // Replay
    // ════════════════════════════════════════════════════════════════════════

    /// Replay the captured call onto `target`.
    ///
    /// Fails with `MethodSendingError::Access` when the stored arguments cannot
    /// be bound back onto the variant, and with `MethodSendingError::Replay`
    /// when the receiver itself returns an error.
    pub fn accept<R>(&self, target: &mut R) -> Result<(), MTupleError>
    where
        R: Receiver<C> + ?Sized,
    {
        let call = self.to_call()?;
        trace!(contract = C::NAME, operation = self.operation_name(), "replaying call");
        target.receive(call).map_err(|source| {
            debug!(
                contract = C::NAME,
                operation = self.operation_name(),
                error = %source,
                "receiver failed during replay"
            );
            MTupleError::from(MethodSendingError::Replay {
                contract: C::NAME.into(),
                operation: self.operation_name().into(),
                source,
            })
        })
    }

    /// Replay onto the receiver `extractor` builds around a fresh sink and
    /// return what it stored. `Ok(None)` if the receiver never wrote to it.
    pub fn extract<V, E>(&self, extractor: E) -> Result<Option<V>, MTupleError>
    where
        E: Extractor<C, V>,
    {
        let sink = Sink::new();
        let mut receiver = extractor.apply(sink.clone());
        self.accept(&mut receiver)?;
        Ok(sink.take())
    }
}
