//! Hand-written data model for flags, segments and their constituent parts.
//!
//! Laid out one submodule per type, the way the teacher's build.rs-driven
//! OpenAPI codegen used to (see `DESIGN.md` for why the codegen path was
//! dropped); each type derives `serde` directly instead of being generated.

pub mod clause;
pub mod client_side_availability;
pub mod flag;
pub mod flags_state;
pub mod prerequisite;
pub mod rollout;
pub mod rule;
pub mod segment;
pub mod segment_rule;
pub mod target;
pub mod value;
pub mod variation_or_rollout;

pub use clause::{Clause, Operator};
pub use client_side_availability::ClientSideAvailability;
pub use flag::Flag;
pub use flags_state::{FlagMeta, FlagsState, FlagsStateOptions};
pub use prerequisite::Prerequisite;
pub use rollout::Rollout;
pub use rule::Rule;
pub use segment::Segment;
pub use segment_rule::SegmentRule;
pub use target::Target;
pub use value::AttributeValue;
pub use variation_or_rollout::{Fallthrough, VariationOrRollout};
