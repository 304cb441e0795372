//! Core types for the Fossil composition runtime.
//!
//! This crate is the bottom of the Fossil workspace. It carries the
//! identifier types shared by every other crate plus the unified
//! error-code contract.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  fossil-types    : BusId, SubscriptionId, WaitId, ModuleId, │
//! │                    ErrorCode                    ◄── HERE    │
//! │  fossil-event    : Bus, event modifiers, PubSub, buffer     │
//! │  fossil-wait     : Promise, Wait join, Deferrable           │
//! │  fossil-module   : Module tree, lifecycle, Service contract │
//! │  fossil-services : routing, session, canvas, relay          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identity Strategy
//!
//! All identifiers are UUID v4 based. Buses, subscriptions, and wait
//! generations are anonymous, so a random identity is all they need.
//! [`ModuleId`] additionally carries a human-readable name for routing
//! and log output.
//!
//! # Error Codes
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! callers can branch on a stable machine-readable code instead of
//! display strings; see the trait docs for the conventions.

mod error;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{BusId, ModuleId, SubscriptionId, WaitId};
