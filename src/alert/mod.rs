//! Alert rules, cooldown registry and the evaluator.
//!
//! Each enabled [`AlertRule`] is evaluated once per configured station by
//! the [`Evaluator`]. An evaluation ends in one of four [`Outcome`]s; only
//! [`Outcome::Fired`] carries an [`AlertEvent`], and it is registered in the
//! [`AlertRegistry`] before being returned so that the next pass honours
//! the rule's cooldown.

mod duration;
mod evaluator;
mod registry;
mod rule;


pub use duration::*;
pub use evaluator::*;
pub use registry::*;
pub use rule::*;
