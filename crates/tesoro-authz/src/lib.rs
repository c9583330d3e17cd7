//! Tesoro authorization engine.
//!
//! The payment-order state machine (`pending → approved | rejected`, with
//! the single permitted reversal `rejected → pending` by rectification) and
//! the capability gate in front of it. Every mutating operation re-validates
//! fields and re-resolves the actor's capabilities at the moment of action;
//! what a UI chose to show or hide is never trusted.
//!
//! Key properties:
//! - Transitions are repository-side conditional updates keyed on the
//!   expected prior status; a lost race fails loudly as `InvalidTransition`.
//! - `approved` is terminal; rectification permanently flags the record.
//! - One guard function (`require`) is the only permission check path.
//! - Deletion is reserved for the sentinel identity, bypassing no gate.

pub mod error;
pub mod fields;
pub mod machine;
pub mod permissions;

pub use error::{AuthzError, AuthzResult};
pub use fields::{validate, AuthorizationDraft};
pub use machine::{AuthorizationMachine, Verdict};
pub use permissions::{
    require, CapabilityGrants, PermissionResolver, Requirement, ResolvedActor, SENTINEL_IDENTITY,
};
