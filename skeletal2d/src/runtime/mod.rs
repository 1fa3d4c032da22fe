pub(crate) mod math;

mod animation;
mod animation_state;
mod bone;
mod curve;
mod ik;
mod path_constraint;
mod skeleton;
mod slot;
mod timeline;
mod track_entry;
mod transform_constraint;

pub use animation::*;
pub use animation_state::*;
pub use bone::*;
pub use curve::{BEZIER, BEZIER_SIZE, CurveFrames, LINEAR, STEPPED};
pub use ik::*;
pub use path_constraint::PathConstraint;
pub use skeleton::*;
pub use slot::*;
pub use timeline::*;
pub use track_entry::{TimelineMode, TrackEntry, TrackEntryHandle};
pub use transform_constraint::TransformConstraint;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod curve_tests;

#[cfg(test)]
mod timeline_tests;

#[cfg(test)]
mod animation_tests;

#[cfg(test)]
mod skeleton_tests;

#[cfg(test)]
mod ik_tests;

#[cfg(test)]
mod transform_constraint_tests;

#[cfg(test)]
mod path_constraint_tests;
