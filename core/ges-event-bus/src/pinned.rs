//! Pinned data snapshots.

use crate::payload::{Payload, PayloadKind, Record, TypeDescriptor};

/// Private deep copy of the last pinned payload of an event.
///
/// The snapshot never aliases the emitter's value, so the emitter is free to
/// mutate or drop its payload as soon as the emit returns.
#[derive(Debug)]
pub struct PinnedData {
    descriptor: Option<TypeDescriptor>,
    value: Option<Payload>,
    owns_descriptor: bool,
}

impl PinnedData {
    /// Copy `payload` into a fresh snapshot.
    pub fn capture(payload: &Payload) -> Self {
        let descriptor = TypeDescriptor::of(payload);
        let owns_descriptor = descriptor.is_synthesized();
        Self {
            descriptor: Some(descriptor),
            value: Some(copy_to_pinned_buffer(payload)),
            owns_descriptor,
        }
    }

    /// The retained snapshot, `None` once released.
    pub fn payload(&self) -> Option<&Payload> {
        self.value.as_ref()
    }

    pub fn descriptor(&self) -> Option<&TypeDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn kind(&self) -> Option<PayloadKind> {
        self.descriptor.as_ref().map(TypeDescriptor::kind)
    }

    /// True when the descriptor was synthesized for this snapshot alone.
    pub fn owns_descriptor(&self) -> bool {
        self.owns_descriptor
    }

    pub fn is_released(&self) -> bool {
        self.value.is_none()
    }

    /// Drop the buffer, and the descriptor when owned. Shared record
    /// descriptors are only detached from this snapshot. Safe to call twice.
    pub fn release(&mut self) {
        self.value = None;
        // an owned descriptor dies here; a shared one only loses this reference
        self.descriptor = None;
        self.owns_descriptor = false;
    }
}

impl Drop for PinnedData {
    fn drop(&mut self) {
        self.release();
    }
}

/// Deep copy: record bytes go into a newly allocated buffer.
fn copy_to_pinned_buffer(payload: &Payload) -> Payload {
    match payload {
        Payload::Record(record) => {
            let buffer = record.bytes().to_vec().into_boxed_slice();
            // the buffer is sized from the same descriptor, so the length check cannot fail
            Record::new(record.record_type().clone(), buffer)
                .map(Payload::Record)
                .unwrap_or_else(|_| payload.clone())
        }
        other => other.clone(),
    }
}
