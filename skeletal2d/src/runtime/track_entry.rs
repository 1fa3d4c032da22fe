use crate::{Animation, AnimationState, AnimationStateListener, MixBlend};
use std::sync::Arc;

/// How a timeline of a mixing-out entry is blended, decided when the set of playing animations
/// changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TimelineMode {
    /// An earlier entry keys the same property; blend from the current pose.
    #[default]
    Subsequent,
    /// First entry to key the property; blend from the setup pose.
    First,
    /// Like `Subsequent`, but kept at full weight while the next entry mixes in.
    HoldSubsequent,
    /// Like `First`, kept at full weight because the next entry keys the property too.
    HoldFirst,
    /// Held while a later entry, which does not key the property, mixes in.
    HoldMix,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct EntryId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

/// One animation playing (or queued) on a track.
pub struct TrackEntry {
    pub(crate) animation: Arc<Animation>,
    pub(crate) track_index: usize,
    pub(crate) next: Option<EntryId>,
    pub(crate) mixing_from: Option<EntryId>,
    pub(crate) mixing_to: Option<EntryId>,
    pub(crate) listener: Option<Box<dyn AnimationStateListener>>,

    pub looped: bool,
    pub hold_previous: bool,
    pub reverse: bool,
    pub shortest_rotation: bool,
    /// Events keyed while the mix percentage is below this still fire while mixing out.
    pub event_threshold: f32,
    /// Attachment keys apply when the entry's alpha is at least this.
    pub alpha_attachment_threshold: f32,
    /// Attachment keys apply while mixing out until the mix percentage reaches this.
    pub mix_attachment_threshold: f32,
    pub mix_draw_order_threshold: f32,
    pub animation_start: f32,
    pub animation_end: f32,
    pub(crate) animation_last: f32,
    pub(crate) next_animation_last: f32,
    /// Seconds before the entry starts, counted in this entry's time scale.
    pub delay: f32,
    pub track_time: f32,
    pub(crate) track_last: f32,
    pub(crate) next_track_last: f32,
    pub track_end: f32,
    pub time_scale: f32,
    pub alpha: f32,
    pub mix_time: f32,
    pub mix_duration: f32,
    pub(crate) interrupt_alpha: f32,
    pub(crate) total_alpha: f32,
    pub mix_blend: MixBlend,

    pub(crate) timeline_mode: Vec<TimelineMode>,
    pub(crate) timeline_hold_mix: Vec<Option<EntryId>>,
    pub(crate) timelines_rotation: Vec<f32>,
}

impl std::fmt::Debug for TrackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEntry")
            .field("animation", &self.animation.name)
            .field("track_index", &self.track_index)
            .field("looped", &self.looped)
            .field("delay", &self.delay)
            .field("track_time", &self.track_time)
            .field("track_end", &self.track_end)
            .field("mix_time", &self.mix_time)
            .field("mix_duration", &self.mix_duration)
            .field("alpha", &self.alpha)
            .field("has_listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl TrackEntry {
    fn new(animation: Arc<Animation>) -> Self {
        let mut entry = Self {
            animation,
            track_index: 0,
            next: None,
            mixing_from: None,
            mixing_to: None,
            listener: None,
            looped: false,
            hold_previous: false,
            reverse: false,
            shortest_rotation: false,
            event_threshold: 0.0,
            alpha_attachment_threshold: 0.0,
            mix_attachment_threshold: 0.0,
            mix_draw_order_threshold: 0.0,
            animation_start: 0.0,
            animation_end: 0.0,
            animation_last: -1.0,
            next_animation_last: -1.0,
            delay: 0.0,
            track_time: 0.0,
            track_last: -1.0,
            next_track_last: -1.0,
            track_end: f32::MAX,
            time_scale: 1.0,
            alpha: 1.0,
            mix_time: 0.0,
            mix_duration: 0.0,
            interrupt_alpha: 1.0,
            total_alpha: 0.0,
            mix_blend: MixBlend::Replace,
            timeline_mode: Vec::new(),
            timeline_hold_mix: Vec::new(),
            timelines_rotation: Vec::new(),
        };
        entry.animation_end = entry.animation.duration;
        entry
    }

    /// Restores every field to its freshly obtained state. Scratch buffers keep their capacity.
    fn reset(&mut self, animation: Arc<Animation>) {
        let mut timeline_mode = std::mem::take(&mut self.timeline_mode);
        let mut timeline_hold_mix = std::mem::take(&mut self.timeline_hold_mix);
        let mut timelines_rotation = std::mem::take(&mut self.timelines_rotation);
        timeline_mode.clear();
        timeline_hold_mix.clear();
        timelines_rotation.clear();
        *self = Self {
            timeline_mode,
            timeline_hold_mix,
            timelines_rotation,
            ..Self::new(animation)
        };
    }

    pub fn animation(&self) -> &Arc<Animation> {
        &self.animation
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn animation_last(&self) -> f32 {
        self.animation_last
    }

    pub fn interrupt_alpha(&self) -> f32 {
        self.interrupt_alpha
    }

    pub fn timeline_mode(&self) -> &[TimelineMode] {
        &self.timeline_mode
    }

    /// Animation time for the current track time, wrapped when looping and clamped to
    /// `animation_end` otherwise.
    pub fn animation_time(&self) -> f32 {
        if self.looped {
            let duration = self.animation_end - self.animation_start;
            if duration == 0.0 {
                return self.animation_start;
            }
            return self.track_time % duration + self.animation_start;
        }
        (self.track_time + self.animation_start).min(self.animation_end)
    }

    /// Track time at which the current loop (or the whole animation) completes.
    pub fn track_complete(&self) -> f32 {
        let duration = self.animation_end - self.animation_start;
        if duration != 0.0 {
            if self.looped {
                return duration * (1.0 + (self.track_time / duration).trunc());
            }
            if self.track_time < duration {
                return duration;
            }
        }
        self.track_time
    }

    /// True once the track time has reached the animation's length at least once.
    pub fn is_complete(&self) -> bool {
        self.track_time >= self.animation_end - self.animation_start
    }

    /// Forgets the rotation direction memory so the next mix picks the shortest route again.
    pub fn reset_rotation_directions(&mut self) {
        self.timelines_rotation.clear();
    }

    pub fn is_empty_animation(&self) -> bool {
        self.animation.name == crate::runtime::animation_state::EMPTY_ANIMATION_NAME
    }
}

#[derive(Debug)]
struct PoolSlot {
    generation: u32,
    in_use: bool,
    entry: TrackEntry,
}

/// Free-list pool of track entries. A slot's generation advances when it is freed, so handles
/// to the previous occupant stop resolving.
#[derive(Debug, Default)]
pub(crate) struct TrackEntryPool {
    slots: Vec<PoolSlot>,
    free: Vec<usize>,
}

impl TrackEntryPool {
    pub(crate) fn obtain(&mut self, animation: Arc<Animation>) -> EntryId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.entry.reset(animation);
            slot.in_use = true;
            return EntryId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len();
        self.slots.push(PoolSlot {
            generation: 0,
            in_use: true,
            entry: TrackEntry::new(animation),
        });
        EntryId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn free(&mut self, id: EntryId, empty: &Arc<Animation>) {
        let Some(slot) = self.slots.get_mut(id.index) else {
            return;
        };
        if !slot.in_use || slot.generation != id.generation {
            return;
        }
        slot.entry.reset(empty.clone());
        slot.in_use = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    pub(crate) fn get(&self, id: EntryId) -> Option<&TrackEntry> {
        let slot = self.slots.get(id.index)?;
        (slot.in_use && slot.generation == id.generation).then_some(&slot.entry)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut TrackEntry> {
        let slot = self.slots.get_mut(id.index)?;
        (slot.in_use && slot.generation == id.generation).then_some(&mut slot.entry)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Stable reference to a [`TrackEntry`] owned by an [`AnimationState`]. Resolves to nothing once
/// the entry has been disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackEntryHandle {
    pub(crate) id: EntryId,
}

impl TrackEntryHandle {
    pub(crate) fn new(id: EntryId) -> Self {
        Self { id }
    }

    pub fn get<'a>(&self, state: &'a AnimationState) -> Option<&'a TrackEntry> {
        state.track_entry(*self)
    }

    pub fn is_alive(&self, state: &AnimationState) -> bool {
        self.get(state).is_some()
    }

    fn with_entry_mut(&self, state: &mut AnimationState, f: impl FnOnce(&mut TrackEntry)) {
        if let Some(entry) = state.track_entry_mut(*self) {
            f(entry);
        }
    }

    pub fn set_listener<L: AnimationStateListener + 'static>(
        &self,
        state: &mut AnimationState,
        listener: L,
    ) {
        self.with_entry_mut(state, |entry| entry.listener = Some(Box::new(listener)));
    }

    pub fn clear_listener(&self, state: &mut AnimationState) {
        self.with_entry_mut(state, |entry| entry.listener = None);
    }

    pub fn set_looped(&self, state: &mut AnimationState, looped: bool) {
        self.with_entry_mut(state, |entry| entry.looped = looped);
    }

    pub fn set_delay(&self, state: &mut AnimationState, delay: f32) {
        self.with_entry_mut(state, |entry| entry.delay = delay);
    }

    pub fn set_track_end(&self, state: &mut AnimationState, track_end: f32) {
        self.with_entry_mut(state, |entry| entry.track_end = track_end);
    }

    pub fn set_time_scale(&self, state: &mut AnimationState, time_scale: f32) {
        self.with_entry_mut(state, |entry| entry.time_scale = time_scale);
    }

    pub fn set_alpha(&self, state: &mut AnimationState, alpha: f32) {
        self.with_entry_mut(state, |entry| entry.alpha = alpha);
    }

    pub fn set_mix_duration(&self, state: &mut AnimationState, mix_duration: f32) {
        self.with_entry_mut(state, |entry| entry.mix_duration = mix_duration);
    }

    pub fn set_mix_blend(&self, state: &mut AnimationState, mix_blend: MixBlend) {
        self.with_entry_mut(state, |entry| entry.mix_blend = mix_blend);
    }

    /// Changing this after the entry started takes effect the next time the set of playing
    /// animations changes.
    pub fn set_hold_previous(&self, state: &mut AnimationState, hold_previous: bool) {
        self.with_entry_mut(state, |entry| entry.hold_previous = hold_previous);
    }

    pub fn set_reverse(&self, state: &mut AnimationState, reverse: bool) {
        self.with_entry_mut(state, |entry| entry.reverse = reverse);
    }

    pub fn set_shortest_rotation(&self, state: &mut AnimationState, shortest_rotation: bool) {
        self.with_entry_mut(state, |entry| entry.shortest_rotation = shortest_rotation);
    }

    pub fn reset_rotation_directions(&self, state: &mut AnimationState) {
        self.with_entry_mut(state, TrackEntry::reset_rotation_directions);
    }

    pub fn set_event_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.event_threshold = threshold);
    }

    pub fn set_alpha_attachment_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.alpha_attachment_threshold = threshold);
    }

    pub fn set_mix_attachment_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.mix_attachment_threshold = threshold);
    }

    pub fn set_mix_draw_order_threshold(&self, state: &mut AnimationState, threshold: f32) {
        self.with_entry_mut(state, |entry| entry.mix_draw_order_threshold = threshold);
    }

    pub fn set_animation_start(&self, state: &mut AnimationState, animation_start: f32) {
        self.with_entry_mut(state, |entry| entry.animation_start = animation_start);
    }

    pub fn set_animation_end(&self, state: &mut AnimationState, animation_end: f32) {
        self.with_entry_mut(state, |entry| entry.animation_end = animation_end);
    }

    /// Sets the time events and completion are detected from.
    pub fn set_animation_last(&self, state: &mut AnimationState, animation_last: f32) {
        self.with_entry_mut(state, |entry| {
            entry.animation_last = animation_last;
            entry.next_animation_last = animation_last;
        });
    }

    pub fn mixing_from(&self, state: &AnimationState) -> Option<TrackEntryHandle> {
        self.get(state)?.mixing_from.map(TrackEntryHandle::new)
    }

    pub fn mixing_to(&self, state: &AnimationState) -> Option<TrackEntryHandle> {
        self.get(state)?.mixing_to.map(TrackEntryHandle::new)
    }

    pub fn next(&self, state: &AnimationState) -> Option<TrackEntryHandle> {
        self.get(state)?.next.map(TrackEntryHandle::new)
    }
}
