//! Fixed pool of audio channels and the audio-device seam.

use serde::{Deserialize, Serialize};

use crate::config::{AttenuationCurve, CueId};
use crate::vector::Vec3;

/// Index of a channel in its [`ChannelPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub usize);

/// A single concurrently-playable 3-D audio output.
pub trait AudioChannel {
    fn set_clip(&mut self, cue: &CueId);
    fn set_position(&mut self, position: Vec3);
    fn set_rolloff(&mut self, min_distance: f64, max_distance: f64, curve: &AttenuationCurve);
    fn play(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;

    /// Called once per frame. Devices that track playback themselves ignore it.
    fn advance(&mut self, _dt: f64) {}
}

/// Channels created once at start-up; the count never changes.
///
/// `assigned` is per refresh cycle bookkeeping: reset at the start of each
/// allocation, set for every channel a cluster holds.
pub struct ChannelPool<C> {
    channels: Vec<C>,
    assigned: Vec<bool>,
}

impl<C: AudioChannel> ChannelPool<C> {
    pub fn new(channels: Vec<C>) -> Self {
        let assigned = vec![false; channels.len()];
        Self { channels, assigned }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, id: ChannelId) -> Option<&C> {
        self.channels.get(id.0)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut C> {
        self.channels.get_mut(id.0)
    }

    /// False for unknown ids.
    pub fn is_playing(&self, id: ChannelId) -> bool {
        self.get(id).is_some_and(|c| c.is_playing())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &C)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(i, c)| (ChannelId(i), c))
    }

    pub(crate) fn clear_assignments(&mut self) {
        self.assigned.fill(false);
    }

    pub(crate) fn mark_assigned(&mut self, id: ChannelId) {
        if let Some(flag) = self.assigned.get_mut(id.0) {
            *flag = true;
        }
    }

    /// First channel in pool order that is neither assigned this cycle nor
    /// playing. Marks it assigned.
    pub(crate) fn acquire_idle(&mut self) -> Option<ChannelId> {
        let idx = self
            .channels
            .iter()
            .zip(&self.assigned)
            .position(|(channel, &assigned)| !assigned && !channel.is_playing())?;
        self.assigned[idx] = true;
        Some(ChannelId(idx))
    }

    pub fn advance(&mut self, dt: f64) {
        for channel in &mut self.channels {
            channel.advance(dt);
        }
    }

    /// Stop every channel and drop all assignments.
    pub fn stop_all(&mut self) {
        for channel in &mut self.channels {
            channel.stop();
        }
        self.clear_assignments();
    }
}

/// A cue started on a [`SimulatedChannel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub cue: CueId,
    pub position: Vec3,
    pub min_distance: f64,
    pub max_distance: f64,
}

/// Channel whose clips all last `clip_duration` seconds of frame time.
/// Records every cue it plays.
#[derive(Clone, Debug)]
pub struct SimulatedChannel {
    clip_duration: f64,
    remaining: f64,
    clip: Option<CueId>,
    position: Vec3,
    rolloff: (f64, f64),
    events: Vec<PlayEvent>,
}

impl SimulatedChannel {
    pub fn new(clip_duration: f64) -> Self {
        Self {
            clip_duration,
            remaining: 0.0,
            clip: None,
            position: Vec3::ZERO,
            rolloff: (0.0, 0.0),
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[PlayEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<PlayEvent> {
        std::mem::take(&mut self.events)
    }

    /// Simulate the device cutting the clip short.
    pub fn interrupt(&mut self) {
        self.remaining = 0.0;
    }
}

impl AudioChannel for SimulatedChannel {
    fn set_clip(&mut self, cue: &CueId) {
        self.clip = Some(cue.clone());
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn set_rolloff(&mut self, min_distance: f64, max_distance: f64, _curve: &AttenuationCurve) {
        self.rolloff = (min_distance, max_distance);
    }

    fn play(&mut self) {
        let Some(cue) = self.clip.clone() else {
            return;
        };
        self.remaining = self.clip_duration;
        self.events.push(PlayEvent {
            cue,
            position: self.position,
            min_distance: self.rolloff.0,
            max_distance: self.rolloff.1,
        });
    }

    fn stop(&mut self) {
        self.remaining = 0.0;
    }

    fn is_playing(&self) -> bool {
        self.remaining > 0.0
    }

    fn advance(&mut self, dt: f64) {
        self.remaining = (self.remaining - dt).max(0.0);
    }
}
