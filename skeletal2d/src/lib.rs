//! Renderer-agnostic 2D skeletal animation runtime.
//!
//! Load or build a [`SkeletonData`] once and share it through an `Arc`. Each on-screen instance
//! owns a [`Skeleton`] (the mutable pose) and usually an [`AnimationState`] that mixes
//! animations into it:
//!
//! ```text
//! state.update(dt);
//! state.apply(&mut skeleton);
//! skeleton.update_world_transform();
//! ```

#![forbid(unsafe_code)]

mod attachment;
mod bounds;
mod error;
mod ids;
mod model;
mod pose;
mod runtime;

pub use attachment::*;
pub use bounds::*;
pub use error::*;
pub use model::*;
pub use pose::*;
pub use runtime::*;


#[cfg(test)]
mod pose_tests;
