//! Data models for the offline sync agent.
//!
//! These models match the console frontend's JSON contracts exactly, so
//! persisted queue entries and synthetic responses interoperate with what the
//! UI already expects.

mod action;
mod contracts;

pub use action::*;
pub use contracts::*;
