//! Chat widget for the AI tutor.
//!
//! [`ChatWidgetController`] owns an in-memory [`Transcript`] that is the
//! single source of truth for the conversation. User actions are applied
//! optimistically where the widget allows it, sent to a
//! [`tutor_client::ChatBackend`], and reconciled when the server answers.
//! Views implement [`RenderTarget`] and are told about every change as a
//! [`ViewPatch`].
//!
//! Every request carries a [`RequestSeq`] and occupies a [`Slot`]; a slot
//! admits one outstanding request, and responses that no longer match their
//! slot are discarded instead of being applied to the wrong message.

mod composer;
mod controller;
mod message;
mod transcript;
mod view;

pub use composer::Composer;
pub use controller::{
    ChatWidgetController, Dispatch, EDIT_FAILURE, GENERIC_FAILURE, Ignored, RequestSeq, Settled,
    Slot, THREAD_FAILURE,
};
pub use message::{Delivery, Message, MessageId, Role, SENTINEL_ID};
pub use transcript::{Entry, EntryKey, EntryKind, Thread, Transcript};
pub use view::{PatchLog, RenderTarget, ViewPatch};
