use crate::contract::Contract;
use crate::error::BoxError;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

// ─── Sink ───────────────────────────────────────────────────────────────────

/// Single-slot callback. `accept` stores a value, overwriting any earlier one.
///
/// Clones share the slot, so an extractor can move one clone into each
/// receiver it builds while the record keeps another to read the result.
pub struct Sink<V> {
    slot: Rc<Cell<Option<V>>>,
}

impl<V> Sink<V> {
    pub fn new() -> Self {
        Self {
            slot: Rc::new(Cell::new(None)),
        }
    }

    #[inline]
    pub fn accept(&self, value: V) {
        self.slot.set(Some(value));
    }

    /// Take the stored value, leaving the slot empty.
    #[inline]
    pub fn take(&self) -> Option<V> {
        self.slot.take()
    }
}

impl<V> Default for Sink<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Sink<V> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<V> fmt::Debug for Sink<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}

// ─── Receiver ───────────────────────────────────────────────────────────────

/// A live implementation of contract `C`: something a captured call can be
/// replayed onto.
///
/// Any `FnMut(C)` closure is an infallible receiver. Receivers whose logic can
/// fail implement the trait directly and return the failure, which replay
/// surfaces as `MethodSendingError::Replay`.
pub trait Receiver<C: Contract> {
    fn receive(&mut self, call: C) -> Result<(), BoxError>;
}

impl<C, F> Receiver<C> for F
where
    C: Contract,
    F: FnMut(C),
{
    #[inline]
    fn receive(&mut self, call: C) -> Result<(), BoxError> {
        self(call);
        Ok(())
    }
}

// ─── Extractor ──────────────────────────────────────────────────────────────

/// Deconstruction pattern: wraps a [`Sink`] in a receiver that forwards one
/// selected value for whichever operation is replayed onto it.
///
/// Any `Fn(Sink<V>) -> R` with `R: Receiver<C>` is an extractor, so the
/// usual shape is a function returning a closure with an exhaustive `match`:
///
/// ```
/// use mtuples::Sink;
///
/// mtuples::contract! {
///     pub enum Message {
///         ItemCreated { id: String, name: String },
///         ItemDeleted { id: String },
///     }
/// }
///
/// fn id(sink: Sink<String>) -> impl FnMut(Message) {
///     move |m| match m {
///         Message::ItemCreated { id, .. } | Message::ItemDeleted { id } => sink.accept(id),
///     }
/// }
/// ```
pub trait Extractor<C: Contract, V> {
    type Receiver: Receiver<C>;

    fn apply(&self, sink: Sink<V>) -> Self::Receiver;
}

impl<C, V, F, R> Extractor<C, V> for F
where
    C: Contract,
    F: Fn(Sink<V>) -> R,
    R: Receiver<C>,
{
    type Receiver = R;

    #[inline]
    fn apply(&self, sink: Sink<V>) -> R {
        self(sink)
    }
}
