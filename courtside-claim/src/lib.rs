//! courtside-claim library - legacy subscription claim workflow
//!
//! A guardian's legacy ("migration") purchases are flattened into one
//! assignable unit per purchased quantity, and each unit is bound to one of
//! the guardian's players through the league API.
//!
//! Layering, leaves first:
//! - [`flatten`]: records to units, with an injectable subscription strategy
//! - [`tracker`]: assignment map reducer and partitioning
//! - [`cache`]: single-flight query cache with invalidation
//! - [`client`]: league API trait and reqwest implementation
//! - [`submitter`] / [`players`]: mutation flows
//! - [`session`]: orchestration, skip and completion

pub mod cache;
pub mod cli;
pub mod client;
pub mod error;
pub mod flatten;
pub mod pending;
pub mod players;
pub mod session;
pub mod submitter;
pub mod tracker;

pub use client::{HttpLeagueApi, LeagueApi};
pub use error::{ClaimError, ClaimResult};
pub use flatten::{flatten, FirstSubscription, FlattenedUnit, RoundRobinByPosition, SubscriptionStrategy};
pub use session::{ClaimSession, Completion, Redirect, SessionOptions};
pub use submitter::{SubmitterState, TransitionError};
pub use tracker::{AssignmentEvent, AssignmentMap, Partition};
