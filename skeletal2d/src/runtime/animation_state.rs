use crate::runtime::math::{signum, wrap_degrees};
use crate::runtime::timeline::{AttachmentTimeline, BoneTimeline, set_slot_attachment, slot_bone_active};
use crate::runtime::track_entry::{EntryId, TimelineMode, TrackEntry, TrackEntryHandle, TrackEntryPool};
use crate::{
    Animation, Error, Event, MixBlend, MixDirection, PropertyId, Skeleton, SkeletonData, Timeline,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub(crate) const EMPTY_ANIMATION_NAME: &str = "<empty>";

/// Offsets added to `unkeyed_state` when a slot's attachment is written during an apply pass.
const SETUP: i32 = 1;
const CURRENT: i32 = 2;

fn check_mix_duration(duration: f32) -> Result<(), Error> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(Error::InvalidValue {
            message: "mix duration must be finite and >= 0".to_string(),
        });
    }
    Ok(())
}

/// Crossfade durations between pairs of animations.
#[derive(Clone, Debug)]
pub struct AnimationStateData {
    skeleton_data: Arc<SkeletonData>,
    /// Used when no duration was set for a pair.
    pub default_mix: f32,
    mixes: HashMap<(String, String), f32>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn skeleton_data(&self) -> &Arc<SkeletonData> {
        &self.skeleton_data
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        check_mix_duration(duration)?;
        for name in [from, to] {
            if self.skeleton_data.find_animation(name).is_none() {
                return Err(Error::UnknownAnimation {
                    name: name.to_string(),
                });
            }
        }
        self.mixes
            .insert((from.to_string(), to.to_string()), duration);
        Ok(())
    }

    /// Like [`set_mix`](Self::set_mix) for animations that need not belong to the skeleton data.
    pub fn set_mix_with(
        &mut self,
        from: &Animation,
        to: &Animation,
        duration: f32,
    ) -> Result<(), Error> {
        check_mix_duration(duration)?;
        self.mixes
            .insert((from.name.clone(), to.name.clone()), duration);
        Ok(())
    }

    pub fn mix(&self, from: &Animation, to: &Animation) -> f32 {
        self.mixes
            .get(&(from.name.clone(), to.name.clone()))
            .copied()
            .unwrap_or(self.default_mix)
    }
}

/// Receives track entry lifecycle notifications. Every method defaults to doing nothing.
///
/// Callbacks run while the state drains its queue, after `update`/`apply` or a track change has
/// finished, so they may freely start or clear animations on `state`.
#[allow(unused_variables)]
pub trait AnimationStateListener {
    /// The entry became the current entry of its track.
    fn start(&mut self, state: &mut AnimationState, entry: TrackEntryHandle) {}
    /// Another entry replaced this one as current.
    fn interrupt(&mut self, state: &mut AnimationState, entry: TrackEntryHandle) {}
    /// The entry will never be applied again.
    fn end(&mut self, state: &mut AnimationState, entry: TrackEntryHandle) {}
    /// The entry is about to return to the pool. Last notification for an entry.
    fn dispose(&mut self, state: &mut AnimationState, entry: TrackEntryHandle) {}
    /// A loop iteration, or the whole animation, completed.
    fn complete(&mut self, state: &mut AnimationState, entry: TrackEntryHandle) {}
    fn event(&mut self, state: &mut AnimationState, entry: TrackEntryHandle, event: &Event) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Debug)]
enum Notification {
    Start,
    Interrupt,
    End,
    Dispose,
    Complete,
    Event(Event),
}

fn notify(
    listener: &mut dyn AnimationStateListener,
    state: &mut AnimationState,
    entry: TrackEntryHandle,
    notification: &Notification,
) {
    match notification {
        Notification::Start => listener.start(state, entry),
        Notification::Interrupt => listener.interrupt(state, entry),
        Notification::End => listener.end(state, entry),
        Notification::Dispose => listener.dispose(state, entry),
        Notification::Complete => listener.complete(state, entry),
        Notification::Event(event) => listener.event(state, entry, event),
    }
}

/// Notifications collected while the state is being changed, delivered in order when the
/// state drains.
#[derive(Debug, Default)]
struct EventQueue {
    pending: Vec<(EntryId, Notification)>,
    drain_disabled: bool,
}

/// Applies animations over time, queues animations for later playback, mixes (crossfades)
/// between animations and layers animations on top of each other.
pub struct AnimationState {
    data: AnimationStateData,
    tracks: Vec<Option<EntryId>>,
    pool: TrackEntryPool,
    queue: EventQueue,
    events: Vec<Event>,
    listeners: Vec<(ListenerId, Box<dyn AnimationStateListener>)>,
    /// Set while state-wide listeners are being notified; listener changes made by a callback
    /// are recorded and applied once the notification has been delivered.
    dispatching: bool,
    removed_listeners: Vec<ListenerId>,
    listeners_cleared: bool,
    next_listener_id: u64,
    property_ids: HashSet<PropertyId>,
    animations_changed: bool,
    unkeyed_state: i32,
    empty_animation: Arc<Animation>,
    /// Multiplier for the delta passed to [`update`](Self::update).
    pub time_scale: f32,
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        Self {
            data,
            tracks: Vec::new(),
            pool: TrackEntryPool::default(),
            queue: EventQueue::default(),
            events: Vec::new(),
            listeners: Vec::new(),
            dispatching: false,
            removed_listeners: Vec::new(),
            listeners_cleared: false,
            next_listener_id: 0,
            property_ids: HashSet::new(),
            animations_changed: false,
            unkeyed_state: 0,
            empty_animation: Arc::new(Animation::new(EMPTY_ANIMATION_NAME, Vec::new(), 0.0)),
            time_scale: 1.0,
        }
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    /// Current entry of a track, if any.
    pub fn current(&self, track_index: usize) -> Option<TrackEntryHandle> {
        self.tracks
            .get(track_index)
            .copied()
            .flatten()
            .map(TrackEntryHandle::new)
    }

    pub fn track_entry(&self, handle: TrackEntryHandle) -> Option<&TrackEntry> {
        self.pool.get(handle.id)
    }

    pub fn track_entry_mut(&mut self, handle: TrackEntryHandle) -> Option<&mut TrackEntry> {
        self.pool.get_mut(handle.id)
    }

    /// Entries that have been obtained and not yet disposed.
    pub fn live_entries(&self) -> usize {
        self.pool.live_count()
    }

    pub fn add_listener<L: AnimationStateListener + 'static>(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener, _)| *listener != id);
        if self.dispatching {
            self.removed_listeners.push(id);
        }
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
        if self.dispatching {
            self.listeners_cleared = true;
        }
    }

    /// Drops queued notifications without delivering them. Entries waiting on their dispose
    /// notification are still returned to the pool.
    pub fn clear_listener_notifications(&mut self) {
        for (id, notification) in std::mem::take(&mut self.queue.pending) {
            if matches!(notification, Notification::Dispose) {
                self.pool.free(id, &self.empty_animation);
            }
        }
    }

    /// Advances every track by `delta` seconds.
    pub fn update(&mut self, delta: f32) {
        let delta = delta * self.time_scale;
        for i in 0..self.tracks.len() {
            let Some(current_id) = self.tracks[i] else {
                continue;
            };
            let Some(current) = self.pool.get_mut(current_id) else {
                self.tracks[i] = None;
                continue;
            };
            current.animation_last = current.next_animation_last;
            current.track_last = current.next_track_last;

            let mut current_delta = delta * current.time_scale;
            if current.delay > 0.0 {
                current.delay -= current_delta;
                if current.delay > 0.0 {
                    continue;
                }
                current_delta = -current.delay;
                current.delay = 0.0;
            }

            let track_last = current.track_last;
            let current_scale = current.time_scale;
            let track_end = current.track_end;
            let mixing_from = current.mixing_from;

            if let Some(next_id) = current.next {
                let next_delay = self.pool.get(next_id).map_or(0.0, |next| next.delay);
                // Leftover time past the next entry's delay carries over to it.
                let next_time = track_last - next_delay;
                if next_time >= 0.0 {
                    if let Some(next) = self.pool.get_mut(next_id) {
                        next.delay = 0.0;
                        next.track_time += if current_scale == 0.0 {
                            0.0
                        } else {
                            (next_time / current_scale + delta) * next.time_scale
                        };
                    }
                    if let Some(current) = self.pool.get_mut(current_id) {
                        current.track_time += current_delta;
                        current.next = None;
                    }
                    log::trace!("track {i}: next entry promoted");
                    self.set_current(i, next_id, true);
                    let mut link = Some(next_id);
                    while let Some(id) = link {
                        let Some(entry) = self.pool.get_mut(id) else {
                            break;
                        };
                        link = entry.mixing_from;
                        if link.is_some() {
                            entry.mix_time += delta;
                        }
                    }
                    continue;
                }
            } else if track_last >= track_end && mixing_from.is_none() {
                log::trace!("track {i}: reached track end");
                self.tracks[i] = None;
                self.queue_end(current_id);
                self.clear_next(current_id);
                continue;
            }

            if mixing_from.is_some() && self.update_mixing_from(current_id, delta) {
                let mut link = self
                    .pool
                    .get_mut(current_id)
                    .and_then(|current| current.mixing_from.take());
                while let Some(id) = link {
                    self.queue_end(id);
                    link = self.pool.get_mut(id).and_then(|entry| {
                        entry.mixing_to = None;
                        entry.mixing_from.take()
                    });
                }
            }
            if let Some(current) = self.pool.get_mut(current_id) {
                current.track_time += current_delta;
            }
        }
        self.drain();
    }

    /// Returns true when the whole chain behind `to` has finished mixing out.
    fn update_mixing_from(&mut self, to_id: EntryId, delta: f32) -> bool {
        let Some(from_id) = self.pool.get(to_id).and_then(|to| to.mixing_from) else {
            return true;
        };
        let finished = self.update_mixing_from(from_id, delta);

        let Some(from) = self.pool.get_mut(from_id) else {
            return finished;
        };
        from.animation_last = from.next_animation_last;
        from.track_last = from.next_track_last;
        let (from_total_alpha, from_mixing_from, from_interrupt_alpha) =
            (from.total_alpha, from.mixing_from, from.interrupt_alpha);

        let Some(to) = self.pool.get_mut(to_id) else {
            return finished;
        };
        // The to entry was applied at least once and the mix is complete.
        if to.next_track_last != -1.0 && to.mix_time >= to.mix_duration {
            // A single-frame mix, or one whose hold has fully faded, can drop the from entry.
            if from_total_alpha == 0.0 || to.mix_duration == 0.0 {
                to.mixing_from = from_mixing_from;
                to.interrupt_alpha = from_interrupt_alpha;
                if let Some(older) = from_mixing_from.and_then(|id| self.pool.get_mut(id)) {
                    older.mixing_to = Some(to_id);
                }
                if let Some(from) = self.pool.get_mut(from_id) {
                    from.mixing_from = None;
                    from.mixing_to = None;
                }
                self.queue_end(from_id);
            }
            return finished;
        }
        to.mix_time += delta;
        if let Some(from) = self.pool.get_mut(from_id) {
            from.track_time += delta * from.time_scale;
        }
        false
    }

    /// Poses `skeleton` with every track. Returns true if any entry was applied.
    pub fn apply(&mut self, skeleton: &mut Skeleton) -> bool {
        if self.animations_changed {
            self.refresh_timeline_modes();
        }

        let mut applied = false;
        for i in 0..self.tracks.len() {
            let Some(current_id) = self.tracks[i] else {
                continue;
            };
            let Some(current) = self.pool.get(current_id) else {
                continue;
            };
            if current.delay > 0.0 {
                continue;
            }
            applied = true;

            // Track 0 has nothing below it to mix with.
            let blend = if i == 0 {
                MixBlend::First
            } else {
                current.mix_blend
            };
            let mut alpha = current.alpha;
            if current.mixing_from.is_some() {
                alpha *= self.apply_mixing_from(current_id, skeleton, blend);
            } else if current.track_time >= current.track_end && current.next.is_none() {
                alpha = 0.0;
            }

            let Some(current) = self.pool.get_mut(current_id) else {
                continue;
            };
            let mut attachments = alpha >= current.alpha_attachment_threshold;
            let animation = current.animation.clone();
            let animation_last = current.animation_last;
            let animation_time = current.animation_time();
            let reverse = current.reverse;
            let apply_time = if reverse {
                animation.duration - animation_time
            } else {
                animation_time
            };
            let mut events = std::mem::take(&mut self.events);

            if (i == 0 && alpha == 1.0) || blend == MixBlend::Add {
                if i == 0 {
                    attachments = true;
                }
                for timeline in animation.timelines() {
                    if let Timeline::Attachment(attachment) = timeline {
                        self.apply_attachment_timeline(
                            attachment,
                            skeleton,
                            apply_time,
                            blend,
                            attachments,
                        );
                    } else {
                        let sink = if reverse { None } else { Some(&mut events) };
                        timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            sink,
                            alpha,
                            blend,
                            MixDirection::In,
                        );
                    }
                }
            } else {
                let shortest_rotation = current.shortest_rotation;
                let timeline_mode = std::mem::take(&mut current.timeline_mode);
                let mut rotation = std::mem::take(&mut current.timelines_rotation);
                let count = animation.timelines().len();
                let first_frame = !shortest_rotation && rotation.len() != count * 2;
                if first_frame {
                    rotation.clear();
                    rotation.resize(count * 2, 0.0);
                }
                for (ii, timeline) in animation.timelines().iter().enumerate() {
                    let timeline_blend = match timeline_mode.get(ii) {
                        Some(TimelineMode::Subsequent) => blend,
                        _ => MixBlend::Setup,
                    };
                    if let (false, Some(rotate)) = (shortest_rotation, timeline.as_rotate()) {
                        apply_rotate_timeline(
                            rotate,
                            skeleton,
                            apply_time,
                            alpha,
                            timeline_blend,
                            &mut rotation[ii * 2..ii * 2 + 2],
                            first_frame,
                        );
                    } else if let Timeline::Attachment(attachment) = timeline {
                        self.apply_attachment_timeline(
                            attachment,
                            skeleton,
                            apply_time,
                            blend,
                            attachments,
                        );
                    } else {
                        let sink = if reverse { None } else { Some(&mut events) };
                        timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            sink,
                            alpha,
                            timeline_blend,
                            MixDirection::In,
                        );
                    }
                }
                if let Some(current) = self.pool.get_mut(current_id) {
                    current.timeline_mode = timeline_mode;
                    current.timelines_rotation = rotation;
                }
            }

            self.queue_events(current_id, animation_time, &events);
            events.clear();
            self.events = events;
            if let Some(current) = self.pool.get_mut(current_id) {
                current.next_animation_last = animation_time;
                current.next_track_last = current.track_time;
            }
        }

        // Slots whose attachment was only written by entries mixing out (or before their first
        // key) go back to the setup attachment.
        let setup_state = self.unkeyed_state + SETUP;
        for slot_index in 0..skeleton.slots.len() {
            if skeleton.slots[slot_index].attachment_state != setup_state {
                continue;
            }
            let data_index = skeleton.slots[slot_index].data_index();
            let name = skeleton
                .data
                .slots
                .get(data_index)
                .and_then(|data| data.attachment_name.clone());
            set_slot_attachment(skeleton, slot_index, name.as_deref());
        }
        self.unkeyed_state += 2;

        self.drain();
        applied
    }

    /// Applies the entries `to` is mixing from and returns the mix percentage of `to`.
    fn apply_mixing_from(&mut self, to_id: EntryId, skeleton: &mut Skeleton, blend: MixBlend) -> f32 {
        let Some(from_id) = self.pool.get(to_id).and_then(|to| to.mixing_from) else {
            return 1.0;
        };
        if self
            .pool
            .get(from_id)
            .is_some_and(|from| from.mixing_from.is_some())
        {
            self.apply_mixing_from(from_id, skeleton, blend);
        }
        let (Some(to), Some(from)) = (self.pool.get(to_id), self.pool.get(from_id)) else {
            return 1.0;
        };

        let mut blend = blend;
        let mix = if to.mix_duration == 0.0 {
            // Single frame mix to undo the from entry's changes.
            if blend == MixBlend::First {
                blend = MixBlend::Setup;
            }
            1.0
        } else {
            if blend != MixBlend::First {
                blend = from.mix_blend;
            }
            (to.mix_time / to.mix_duration).min(1.0)
        };

        let attachments = mix < from.mix_attachment_threshold;
        let draw_order = mix < from.mix_draw_order_threshold;
        let alpha_hold = from.alpha * to.interrupt_alpha;
        let alpha_mix = alpha_hold * (1.0 - mix);
        let to_mix_duration = to.mix_duration;
        let animation = from.animation.clone();
        let animation_last = from.animation_last;
        let animation_time = from.animation_time();
        let reverse = from.reverse;
        let apply_time = if reverse {
            animation.duration - animation_time
        } else {
            animation_time
        };
        let collect_events = !reverse && mix < from.event_threshold;
        let mut events = std::mem::take(&mut self.events);

        if blend == MixBlend::Add {
            for timeline in animation.timelines() {
                let sink = if collect_events { Some(&mut events) } else { None };
                timeline.apply(
                    skeleton,
                    animation_last,
                    apply_time,
                    sink,
                    alpha_mix,
                    blend,
                    MixDirection::Out,
                );
            }
        } else if let Some(from) = self.pool.get_mut(from_id) {
            let timeline_mode = std::mem::take(&mut from.timeline_mode);
            let hold_mix = std::mem::take(&mut from.timeline_hold_mix);
            let mut rotation = std::mem::take(&mut from.timelines_rotation);
            let count = animation.timelines().len();
            let first_frame = rotation.len() != count * 2;
            if first_frame {
                rotation.clear();
                rotation.resize(count * 2, 0.0);
            }

            let mut total_alpha = 0.0;
            for (i, timeline) in animation.timelines().iter().enumerate() {
                let is_draw_order = matches!(timeline, Timeline::DrawOrder(_));
                let mode = timeline_mode.get(i).copied().unwrap_or(TimelineMode::First);
                let (timeline_blend, alpha) = match mode {
                    TimelineMode::Subsequent => {
                        if !draw_order && is_draw_order {
                            continue;
                        }
                        (blend, alpha_mix)
                    }
                    TimelineMode::First => (MixBlend::Setup, alpha_mix),
                    TimelineMode::HoldSubsequent => (blend, alpha_hold),
                    TimelineMode::HoldFirst => (MixBlend::Setup, alpha_hold),
                    TimelineMode::HoldMix => {
                        let fade = hold_mix
                            .get(i)
                            .copied()
                            .flatten()
                            .and_then(|id| self.pool.get(id))
                            .map_or(0.0, |holder| {
                                if holder.mix_duration > 0.0 {
                                    (1.0 - holder.mix_time / holder.mix_duration).max(0.0)
                                } else {
                                    0.0
                                }
                            });
                        (MixBlend::Setup, alpha_hold * fade)
                    }
                };
                total_alpha += alpha;

                if let Some(rotate) = timeline.as_rotate() {
                    apply_rotate_timeline(
                        rotate,
                        skeleton,
                        apply_time,
                        alpha,
                        timeline_blend,
                        &mut rotation[i * 2..i * 2 + 2],
                        first_frame,
                    );
                } else if let Timeline::Attachment(attachment) = timeline {
                    self.apply_attachment_timeline(
                        attachment,
                        skeleton,
                        apply_time,
                        timeline_blend,
                        attachments,
                    );
                } else {
                    let direction =
                        if draw_order && is_draw_order && timeline_blend == MixBlend::Setup {
                            MixDirection::In
                        } else {
                            MixDirection::Out
                        };
                    let sink = if collect_events { Some(&mut events) } else { None };
                    timeline.apply(
                        skeleton,
                        animation_last,
                        apply_time,
                        sink,
                        alpha,
                        timeline_blend,
                        direction,
                    );
                }
            }

            if let Some(from) = self.pool.get_mut(from_id) {
                from.timeline_mode = timeline_mode;
                from.timeline_hold_mix = hold_mix;
                from.timelines_rotation = rotation;
                from.total_alpha = total_alpha;
            }
        }

        if to_mix_duration > 0.0 {
            self.queue_events(from_id, animation_time, &events);
        }
        events.clear();
        self.events = events;
        if let Some(from) = self.pool.get_mut(from_id) {
            from.next_animation_last = animation_time;
            from.next_track_last = from.track_time;
        }
        mix
    }

    fn apply_attachment_timeline(
        &self,
        timeline: &AttachmentTimeline,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        attachments: bool,
    ) {
        let slot_index = timeline.slot_index;
        if !slot_bone_active(skeleton, slot_index) {
            return;
        }
        match timeline.name_at(time) {
            Some(name) => self.set_attachment(skeleton, slot_index, name, attachments),
            None => {
                if matches!(blend, MixBlend::Setup | MixBlend::First) {
                    let data_index = skeleton.slots[slot_index].data_index();
                    let name = skeleton
                        .data
                        .slots
                        .get(data_index)
                        .and_then(|data| data.attachment_name.clone());
                    self.set_attachment(skeleton, slot_index, name.as_deref(), attachments);
                }
            }
        }
        // Nothing keyed this slot this pass yet: restore the setup attachment at the end.
        let slot = &mut skeleton.slots[slot_index];
        if slot.attachment_state <= self.unkeyed_state {
            slot.attachment_state = self.unkeyed_state + SETUP;
        }
    }

    fn set_attachment(
        &self,
        skeleton: &mut Skeleton,
        slot_index: usize,
        name: Option<&str>,
        attachments: bool,
    ) {
        set_slot_attachment(skeleton, slot_index, name);
        if attachments {
            skeleton.slots[slot_index].attachment_state = self.unkeyed_state + CURRENT;
        }
    }

    fn queue_events(&mut self, id: EntryId, animation_time: f32, events: &[Event]) {
        let Some(entry) = self.pool.get(id) else {
            return;
        };
        let (start, end) = (entry.animation_start, entry.animation_end);
        let duration = end - start;
        let track_last_wrapped = entry.track_last % duration;

        let complete = if entry.looped {
            if duration == 0.0 {
                true
            } else {
                let cycles = (entry.track_time / duration).floor();
                cycles > 0.0 && cycles > (entry.track_last / duration).floor()
            }
        } else {
            animation_time >= end && entry.animation_last < end
        };

        // Events keyed before the loop wrapped are delivered before complete.
        let mut i = 0;
        while let Some(event) = events.get(i) {
            if event.time < track_last_wrapped {
                break;
            }
            if event.time <= end {
                self.queue
                    .pending
                    .push((id, Notification::Event(event.clone())));
            }
            i += 1;
        }
        if complete {
            self.queue.pending.push((id, Notification::Complete));
        }
        for event in &events[i..] {
            if event.time >= start {
                self.queue
                    .pending
                    .push((id, Notification::Event(event.clone())));
            }
        }
    }

    fn refresh_timeline_modes(&mut self) {
        self.animations_changed = false;
        self.property_ids.clear();
        for i in 0..self.tracks.len() {
            let Some(mut id) = self.tracks[i] else {
                continue;
            };
            while let Some(from) = self.pool.get(id).and_then(|entry| entry.mixing_from) {
                id = from;
            }
            let mut link = Some(id);
            while let Some(id) = link {
                let Some(entry) = self.pool.get(id) else {
                    break;
                };
                link = entry.mixing_to;
                if link.is_none() || entry.mix_blend != MixBlend::Add {
                    self.compute_hold(id);
                }
            }
        }
    }

    fn add_property_ids(&mut self, ids: &[PropertyId]) -> bool {
        let mut added = false;
        for id in ids {
            added |= self.property_ids.insert(*id);
        }
        added
    }

    /// Tags each timeline of `id` with how it mixes out, oldest entries first so a property is
    /// only `First` for the earliest entry keying it.
    fn compute_hold(&mut self, id: EntryId) {
        let Some(entry) = self.pool.get_mut(id) else {
            return;
        };
        let animation = entry.animation.clone();
        let to_id = entry.mixing_to;
        let mut modes = std::mem::take(&mut entry.timeline_mode);
        let mut hold_mix = std::mem::take(&mut entry.timeline_hold_mix);
        modes.clear();
        hold_mix.clear();
        hold_mix.resize(animation.timelines().len(), None);

        let to = to_id
            .and_then(|to| self.pool.get(to))
            .map(|to| (to.hold_previous, to.animation.clone(), to.mixing_to));

        if matches!(to, Some((true, _, _))) {
            for timeline in animation.timelines() {
                let ids = timeline.property_ids();
                modes.push(if self.add_property_ids(&ids) {
                    TimelineMode::HoldFirst
                } else {
                    TimelineMode::HoldSubsequent
                });
            }
        } else {
            for (i, timeline) in animation.timelines().iter().enumerate() {
                let ids = timeline.property_ids();
                if !self.add_property_ids(&ids) {
                    modes.push(TimelineMode::Subsequent);
                    continue;
                }
                let Some((_, to_animation, to_mixing_to)) = &to else {
                    modes.push(TimelineMode::First);
                    continue;
                };
                let always_first = matches!(
                    timeline,
                    Timeline::Attachment(_) | Timeline::DrawOrder(_) | Timeline::Event(_)
                );
                if always_first || !to_animation.has_timeline(&ids) {
                    modes.push(TimelineMode::First);
                    continue;
                }
                let mut mode = TimelineMode::HoldFirst;
                let mut next = *to_mixing_to;
                while let Some(next_id) = next {
                    let Some(later) = self.pool.get(next_id) else {
                        break;
                    };
                    if later.animation.has_timeline(&ids) {
                        next = later.mixing_to;
                        continue;
                    }
                    if later.mix_duration > 0.0 {
                        mode = TimelineMode::HoldMix;
                        hold_mix[i] = Some(next_id);
                    }
                    break;
                }
                modes.push(mode);
            }
        }

        if let Some(entry) = self.pool.get_mut(id) {
            entry.timeline_mode = modes;
            entry.timeline_hold_mix = hold_mix;
        }
    }

    fn expand_to_index(&mut self, index: usize) -> Option<EntryId> {
        if index >= self.tracks.len() {
            self.tracks.resize(index + 1, None);
        }
        self.tracks[index]
    }

    fn obtain_entry(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        last: Option<EntryId>,
    ) -> EntryId {
        let mix_duration = last
            .and_then(|last| self.pool.get(last))
            .map_or(0.0, |last| self.data.mix(&last.animation, &animation));
        let id = self.pool.obtain(animation);
        if let Some(entry) = self.pool.get_mut(id) {
            entry.track_index = track_index;
            entry.looped = looped;
            entry.mix_duration = mix_duration;
        }
        id
    }

    fn set_current(&mut self, index: usize, id: EntryId, interrupt: bool) {
        let from = self.expand_to_index(index);
        self.tracks[index] = Some(id);
        if let Some(from_id) = from {
            if interrupt {
                self.queue.pending.push((from_id, Notification::Interrupt));
            }
            let mut interrupted = None;
            if let Some(from) = self.pool.get_mut(from_id) {
                from.mixing_to = Some(id);
                // Rotation directions restart when an entry that mixed in starts mixing out.
                from.timelines_rotation.clear();
                if from.mixing_from.is_some() && from.mix_duration > 0.0 {
                    interrupted = Some((from.mix_time / from.mix_duration).min(1.0));
                }
            }
            if let Some(current) = self.pool.get_mut(id) {
                current.mixing_from = Some(from_id);
                current.mix_time = 0.0;
                if let Some(percent) = interrupted {
                    current.interrupt_alpha *= percent;
                }
            }
        }
        self.queue_start(id);
    }

    fn clear_next(&mut self, id: EntryId) {
        let mut next = self.pool.get_mut(id).and_then(|entry| entry.next.take());
        while let Some(next_id) = next {
            self.queue.pending.push((next_id, Notification::Dispose));
            next = self.pool.get_mut(next_id).and_then(|entry| entry.next.take());
        }
    }

    fn queue_start(&mut self, id: EntryId) {
        self.queue.pending.push((id, Notification::Start));
        self.animations_changed = true;
    }

    /// Queues end immediately followed by dispose.
    fn queue_end(&mut self, id: EntryId) {
        self.queue.pending.push((id, Notification::End));
        self.queue.pending.push((id, Notification::Dispose));
        self.animations_changed = true;
    }

    /// Sets the current animation of a track, discarding any queued animations.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(animation_name)?;
        Ok(self.set_animation_with(track_index, animation, looped))
    }

    /// If the current entry was never applied it is discarded instead of mixed from.
    pub fn set_animation_with(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
    ) -> TrackEntryHandle {
        log::trace!("track {track_index}: set animation '{}'", animation.name);
        let mut interrupt = true;
        let mut current = self.expand_to_index(track_index);
        if let Some(current_id) = current {
            let (never_applied, mixing_from) = self
                .pool
                .get(current_id)
                .map_or((false, None), |entry| {
                    (entry.next_track_last == -1.0, entry.mixing_from)
                });
            if never_applied {
                self.tracks[track_index] = mixing_from;
                self.queue_end(current_id);
                self.clear_next(current_id);
                if let Some(entry) = self.pool.get_mut(current_id) {
                    entry.mixing_from = None;
                }
                current = mixing_from;
                interrupt = false;
            } else {
                self.clear_next(current_id);
            }
        }
        let id = self.obtain_entry(track_index, animation, looped, current);
        self.set_current(track_index, id, interrupt);
        self.drain();
        TrackEntryHandle::new(id)
    }

    /// Queues an animation after the last entry of a track.
    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        let animation = self.find_animation(animation_name)?;
        Ok(self.add_animation_with(track_index, animation, looped, delay))
    }

    /// A `delay` <= 0 is relative to the end of the previous entry, minus the mix duration, plus
    /// `delay`.
    pub fn add_animation_with(
        &mut self,
        track_index: usize,
        animation: Arc<Animation>,
        looped: bool,
        delay: f32,
    ) -> TrackEntryHandle {
        log::trace!("track {track_index}: add animation '{}'", animation.name);
        let mut last = self.expand_to_index(track_index);
        while let Some(next) = last.and_then(|id| self.pool.get(id)).and_then(|e| e.next) {
            last = Some(next);
        }
        let id = self.obtain_entry(track_index, animation, looped, last);
        let mut delay = delay;
        match last {
            None => {
                self.set_current(track_index, id, true);
                self.drain();
            }
            Some(last_id) => {
                let complete = self.pool.get_mut(last_id).map_or(0.0, |last| {
                    last.next = Some(id);
                    last.track_complete()
                });
                if delay <= 0.0 {
                    let mix_duration = self.pool.get(id).map_or(0.0, |entry| entry.mix_duration);
                    delay += complete - mix_duration;
                }
            }
        }
        if let Some(entry) = self.pool.get_mut(id) {
            entry.delay = delay;
        }
        TrackEntryHandle::new(id)
    }

    /// Mixes from the current animation to the setup pose over `mix_duration`.
    pub fn set_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
    ) -> Result<TrackEntryHandle, Error> {
        check_mix_duration(mix_duration)?;
        let empty = self.empty_animation.clone();
        let handle = self.set_animation_with(track_index, empty, false);
        if let Some(entry) = self.pool.get_mut(handle.id) {
            entry.mix_duration = mix_duration;
            entry.track_end = mix_duration;
        }
        Ok(handle)
    }

    pub fn add_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
        delay: f32,
    ) -> Result<TrackEntryHandle, Error> {
        check_mix_duration(mix_duration)?;
        let empty = self.empty_animation.clone();
        let handle = self.add_animation_with(track_index, empty, false, delay);
        if let Some(entry) = self.pool.get_mut(handle.id) {
            if delay <= 0.0 {
                entry.delay += entry.mix_duration - mix_duration;
            }
            entry.mix_duration = mix_duration;
            entry.track_end = mix_duration;
        }
        Ok(handle)
    }

    /// Sets an empty animation on every track that has one playing.
    pub fn set_empty_animations(&mut self, mix_duration: f32) -> Result<(), Error> {
        check_mix_duration(mix_duration)?;
        let drain_disabled = self.queue.drain_disabled;
        self.queue.drain_disabled = true;
        for i in 0..self.tracks.len() {
            if self.tracks[i].is_some() {
                self.set_empty_animation(i, mix_duration)?;
            }
        }
        self.queue.drain_disabled = drain_disabled;
        self.drain();
        Ok(())
    }

    /// Removes every entry of a track. The skeleton keeps its last pose.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(Some(current_id)) = self.tracks.get(track_index).copied() else {
            return;
        };
        log::trace!("track {track_index}: cleared");
        self.queue_end(current_id);
        self.clear_next(current_id);
        let mut entry = current_id;
        while let Some(from) = self.pool.get(entry).and_then(|e| e.mixing_from) {
            self.queue_end(from);
            if let Some(e) = self.pool.get_mut(entry) {
                e.mixing_from = None;
                e.mixing_to = None;
            }
            entry = from;
        }
        if let Some(e) = self.pool.get_mut(entry) {
            e.mixing_to = None;
        }
        self.tracks[track_index] = None;
        self.drain();
    }

    pub fn clear_tracks(&mut self) {
        let drain_disabled = self.queue.drain_disabled;
        self.queue.drain_disabled = true;
        for i in 0..self.tracks.len() {
            self.clear_track(i);
        }
        self.tracks.clear();
        self.queue.drain_disabled = drain_disabled;
        self.drain();
    }

    fn find_animation(&self, name: &str) -> Result<Arc<Animation>, Error> {
        self.data
            .skeleton_data
            .find_animation(name)
            .cloned()
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })
    }

    /// Delivers queued notifications. A drain requested while one is running (or while changes
    /// are batched) is picked up by the running one.
    fn drain(&mut self) {
        if self.queue.drain_disabled {
            return;
        }
        self.queue.drain_disabled = true;
        let mut i = 0;
        while let Some((id, notification)) = self.queue.pending.get(i).cloned() {
            i += 1;
            self.dispatch(id, &notification);
        }
        self.queue.pending.clear();
        self.queue.drain_disabled = false;
    }

    fn dispatch(&mut self, id: EntryId, notification: &Notification) {
        let handle = TrackEntryHandle::new(id);

        let entry_listener = self
            .pool
            .get_mut(id)
            .and_then(|entry| entry.listener.take());
        if let Some(mut listener) = entry_listener {
            notify(listener.as_mut(), self, handle, notification);
            if let Some(entry) = self.pool.get_mut(id) {
                entry.listener.get_or_insert(listener);
            }
        }

        let mut listeners = std::mem::take(&mut self.listeners);
        self.dispatching = true;
        for (listener_id, listener) in listeners.iter_mut() {
            // Listeners removed by an earlier callback miss the rest of this notification.
            if self.listeners_cleared || self.removed_listeners.contains(listener_id) {
                continue;
            }
            notify(listener.as_mut(), self, handle, notification);
        }
        self.dispatching = false;
        if std::mem::take(&mut self.listeners_cleared) {
            listeners.clear();
        }
        listeners.append(&mut self.listeners);
        let removed = std::mem::take(&mut self.removed_listeners);
        listeners.retain(|(listener, _)| !removed.contains(listener));
        self.listeners = listeners;

        if matches!(notification, Notification::Dispose) {
            self.pool.free(id, &self.empty_animation);
        }
    }
}

/// Applies a rotate timeline at partial alpha, tracking the mix direction across frames so the
/// bone does not flip to the other side when the shortest route crosses 180 degrees.
/// `memory` holds the accumulated total and the last difference.
fn apply_rotate_timeline(
    timeline: &BoneTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    memory: &mut [f32],
    first_frame: bool,
) {
    if first_frame {
        memory[0] = 0.0;
    }
    if alpha == 1.0 {
        timeline.apply(skeleton, time, 1.0, blend, MixDirection::In);
        return;
    }
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active || timeline.frames.is_empty() {
        return;
    }
    let setup = skeleton.data.bones[bone.data_index()].rotation;

    let (r1, r2) = if time < timeline.frames.first_time() {
        match blend {
            MixBlend::Setup => {
                bone.rotation = setup;
                return;
            }
            MixBlend::First => (bone.rotation, setup),
            MixBlend::Replace | MixBlend::Add => return,
        }
    } else {
        let r1 = if blend == MixBlend::Setup {
            setup
        } else {
            bone.rotation
        };
        (r1, setup + timeline.rotation_at(time))
    };

    let diff = wrap_degrees(r2 - r1);
    let total = if diff == 0.0 {
        memory[0]
    } else {
        let (mut last_total, last_diff) = if first_frame {
            (0.0, diff)
        } else {
            (memory[0], memory[1])
        };
        let current = diff > 0.0;
        let mut dir = last_total >= 0.0;
        // A sign change near 0 (not near 180) means the mix crossed over.
        if signum(last_diff) != signum(diff) && last_diff.abs() <= 90.0 {
            if last_total.abs() > 180.0 {
                last_total += 360.0 * signum(last_total);
            }
            dir = current;
        }
        let mut total = diff + last_total - last_total % 360.0;
        if dir != current {
            total += 360.0 * signum(last_total);
        }
        memory[0] = total;
        total
    };
    memory[1] = diff;
    bone.rotation = r1 + total * alpha;
}
