//! Session correlation for externally delegated work
//!
//! A session ties one unit of upstream work (plan or task generation) to the
//! result the external service later pushes back through the callback.
//!
//! State machine: `pending → completed | failed`. A completed session may be
//! overwritten by a later, different payload (last write wins); a failed
//! session is final.

pub mod store;
pub mod sweeper;

pub use store::{
    Session, SessionError, SessionPayload, SessionStatus, SessionStore, SweepReport, Transition,
};
pub use sweeper::spawn_sweeper;
