//! Game Logic
//!
//! Local player state and the tap batching state machine. Nothing in here
//! performs I/O; drivers in [`crate::session`] and the host engine decide
//! when requests go out.

pub mod model;
pub mod state;
pub mod tap;

pub use model::{CharacterModel, ModelError};
pub use state::{Archetype, PlayerSnapshot, PlayerState};
pub use tap::{FlushOutcome, FlushTicket, PendingTapCounter, TapBatcher, TapPresenter, TapReaction, WorldPoint};
