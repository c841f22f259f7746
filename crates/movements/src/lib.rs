//! Stock movements domain module (event-sourced).
//!
//! A movement is an incoming (supplier delivery) or outgoing stock transfer.
//! It only touches stock when it is accepted, and reverses exactly that when
//! an accepted movement is deleted.

pub mod movement;

pub use movement::{
    AcceptMovement, CreateMovement, DeleteMovement, Movement, MovementAccepted, MovementCommand,
    MovementCreated, MovementDeleted, MovementEvent, MovementId, MovementKind, MovementLine,
    MovementLineInput, MovementRejected, MovementRevised, MovementStatus, RejectMovement,
    ReviseMovement, SupplierId,
};
