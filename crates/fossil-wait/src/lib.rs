//! Asynchronous coordination for the Fossil composition runtime.
//!
//! This crate turns N outstanding asynchronous operations into a
//! single join point. Lifecycle listeners register work with their
//! module's [`Deferrable`]; the module's next transition settles only
//! once every registered operation has.
//!
//! # Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`Promise`] | explicit-state deferred: pending, resolved, rejected |
//! | [`Deferrable`] | owner of at most one active join ("Wait") |
//! | [`WaitOptions`] | per-operation timeout and failure policy |
//!
//! # Join Semantics
//!
//! ```text
//! wait_for(p1) ──┐
//! wait_for(p2) ──┼── Wait (one generation) ── composite outcome
//! wait_for(p3) ──┘
//! ```
//!
//! Results are recorded positionally by enqueue index, so the
//! composite resolution preserves enqueue order no matter the
//! completion order. Two failure policies:
//!
//! - **fail-fast** (default): the join rejects the instant any tracked
//!   promise rejects, with that promise's error. Remaining operations
//!   keep running but are ignored.
//! - **fail-silent**: the join waits for every operation to settle and
//!   only then rejects, with a generic join failure, if any failed.
//!
//! A join is consumed once: after resolution, rejection, or abort it
//! is torn down, and a later `wait_for` starts a fresh generation.
//! Settlements tagged with a stale generation are discarded, which is
//! what keeps a promise resolving after [`Deferrable::abort`] from
//! leaking into a newer join.
//!
//! # Vacuous Readiness
//!
//! An object with nothing in flight is ready by definition:
//! [`Deferrable::then`] with no active join invokes its callback
//! synchronously.
//!
//! # Timers
//!
//! Per-operation timeouts and the zero-delay wrapping of plain values
//! ([`Deferrable::wait_for_value`]) spawn Tokio timer tasks, so those
//! two paths need a runtime. Everything else is runtime-free.

mod deferrable;
mod error;
mod promise;

pub use deferrable::{Deferrable, WaitOptions, DEFAULT_ABORT_MESSAGE};
pub use error::WaitError;
pub use promise::{Outcome, Promise, PromiseState};
