use crate::{Event, PropertyId, Skeleton, Timeline};
use std::collections::HashSet;

/// How a timeline combines its value with the current pose.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MixBlend {
    /// Start from the setup pose, then mix toward the keyed value.
    Setup,
    /// Like `Replace`, but before the first key the pose is mixed back toward setup.
    First,
    /// Mix from the current pose toward the keyed value.
    #[default]
    Replace,
    /// Add the keyed value, scaled by alpha, to the current pose.
    Add,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

/// A named, immutable set of timelines.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    timelines: Vec<Timeline>,
    property_ids: HashSet<PropertyId>,
    pub duration: f32,
}

impl Animation {
    pub fn new(name: impl Into<String>, timelines: Vec<Timeline>, duration: f32) -> Self {
        let property_ids = timelines.iter().flat_map(Timeline::property_ids).collect();
        Self {
            name: name.into(),
            timelines,
            property_ids,
            duration,
        }
    }

    /// Duration taken from the last key of any timeline.
    pub fn from_timelines(name: impl Into<String>, timelines: Vec<Timeline>) -> Self {
        let duration = timelines
            .iter()
            .map(Timeline::duration)
            .fold(0.0_f32, f32::max);
        Self::new(name, timelines, duration)
    }

    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    /// True if any of `ids` is keyed by this animation.
    pub fn has_timeline(&self, ids: &[PropertyId]) -> bool {
        ids.iter().any(|id| self.property_ids.contains(id))
    }

    /// Applies every timeline. Looping wraps both times into `[0, duration)`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        looped: bool,
        mut events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let (mut last_time, mut time) = (last_time, time);
        if looped && self.duration != 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }
        for timeline in &self.timelines {
            timeline.apply(
                skeleton,
                last_time,
                time,
                events.as_deref_mut(),
                alpha,
                blend,
                direction,
            );
        }
    }
}
