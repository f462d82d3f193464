use super::Skeleton;
use glam::Vec2;
use std::collections::VecDeque;
use std::sync::Arc;

/// Named animation: per-bone timelines sampled by time. Track values are
/// offsets from the setup pose; scale tracks multiply.
pub struct Animation {
    pub name: Arc<str>,
    pub duration: f32,
    pub timelines: Arc<[BoneTimeline]>,
}

impl Animation {
    /// Applies the pose sampled at `time` on top of the skeleton's current
    /// local poses.
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32) {
        for timeline in self.timelines.iter() {
            let pose = skeleton.bone_pose_mut(timeline.bone);
            if let Some(track) = &timeline.translate {
                let offset = track.sample(time);
                pose.x += offset.x;
                pose.y += offset.y;
            }
            if let Some(track) = &timeline.rotate {
                pose.rotation += track.sample(time);
            }
            if let Some(track) = &timeline.scale {
                let factor = track.sample(time);
                pose.scale_x *= factor.x;
                pose.scale_y *= factor.y;
            }
        }
    }
}

pub struct BoneTimeline {
    pub bone: usize,
    pub translate: Option<Track<Vec2>>,
    pub rotate: Option<Track<f32>>,
    pub scale: Option<Track<Vec2>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

/// Keyframe curve with linear interpolation, clamped at both ends. Always
/// holds at least one keyframe.
pub struct Track<T> {
    keys: Arc<[Keyframe<T>]>,
}

impl<T: Interpolate> Track<T> {
    /// Returns `None` for an empty keyframe list.
    pub fn new(keys: Vec<Keyframe<T>>) -> Option<Self> {
        if keys.is_empty() {
            return None;
        }
        Some(Self { keys: Arc::from(keys.into_boxed_slice()) })
    }

    pub fn duration(&self) -> f32 {
        self.keys.last().map(|key| key.time).unwrap_or(0.0)
    }

    pub fn sample(&self, time: f32) -> T {
        let keys = self.keys.as_ref();
        let first = keys[0];
        if time <= first.time {
            return first.value;
        }
        for window in keys.windows(2) {
            let (start, end) = (window[0], window[1]);
            if time < end.time {
                let span = (end.time - start.time).max(f32::EPSILON);
                let t = (time - start.time) / span;
                return start.value.lerp(end.value, t);
            }
        }
        keys[keys.len() - 1].value
    }
}

pub trait Interpolate: Copy {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Vec2 {
    fn lerp(self, other: Self, t: f32) -> Self {
        Vec2::lerp(self, other, t)
    }
}

/// One playing or queued animation on a track.
pub struct TrackEntry {
    pub animation: Arc<Animation>,
    pub looping: bool,
    pub time: f32,
}

/// Per-unit animation-state machine: independent tracks, each a FIFO of
/// entries. A finished non-looping entry hands off to its successor with time
/// carryover; the last one leaves the track idle.
#[derive(Default)]
pub struct AnimationState {
    tracks: Vec<VecDeque<TrackEntry>>,
}

impl AnimationState {
    pub fn new() -> Self {
        Self::default()
    }

    fn track_mut(&mut self, track: usize) -> &mut VecDeque<TrackEntry> {
        if track >= self.tracks.len() {
            self.tracks.resize_with(track + 1, VecDeque::new);
        }
        &mut self.tracks[track]
    }

    /// Replaces the track's whole queue with a single entry.
    pub fn set_animation(&mut self, track: usize, animation: Arc<Animation>, looping: bool) {
        let entries = self.track_mut(track);
        entries.clear();
        entries.push_back(TrackEntry { animation, looping, time: 0.0 });
    }

    /// Appends an entry to play after the current queue drains. On an idle
    /// track this is the same as `set_animation`.
    pub fn add_animation(&mut self, track: usize, animation: Arc<Animation>, looping: bool) {
        let entries = self.track_mut(track);
        entries.push_back(TrackEntry { animation, looping, time: 0.0 });
    }

    /// Advances every track by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        for entries in &mut self.tracks {
            if let Some(entry) = entries.front_mut() {
                entry.time += dt;
            }
            while let Some(front) = entries.front() {
                if front.looping || front.time < front.animation.duration {
                    break;
                }
                let leftover = front.time - front.animation.duration;
                entries.pop_front();
                if let Some(next) = entries.front_mut() {
                    next.time += leftover;
                }
            }
        }
    }

    /// Applies every track's current entry onto the skeleton. The caller is
    /// expected to reset the skeleton to its setup pose first.
    pub fn apply(&self, skeleton: &mut Skeleton) {
        for entries in &self.tracks {
            let Some(entry) = entries.front() else { continue };
            let duration = entry.animation.duration;
            let time = if entry.looping {
                if duration > 0.0 {
                    entry.time % duration
                } else {
                    0.0
                }
            } else {
                entry.time.min(duration)
            };
            entry.animation.apply(skeleton, time);
        }
    }

    pub fn current(&self, track: usize) -> Option<&TrackEntry> {
        self.tracks.get(track).and_then(|entries| entries.front())
    }

    pub fn queued_len(&self, track: usize) -> usize {
        self.tracks.get(track).map_or(0, |entries| entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animation(name: &str, duration: f32) -> Arc<Animation> {
        Arc::new(Animation {
            name: Arc::from(name),
            duration,
            timelines: Arc::from(Vec::new().into_boxed_slice()),
        })
    }

    #[test]
    fn track_sample_clamps_and_interpolates() {
        let track = Track::new(vec![
            Keyframe { time: 0.0, value: 0.0_f32 },
            Keyframe { time: 1.0, value: 10.0_f32 },
        ])
        .expect("non-empty track");
        assert_eq!(track.sample(-1.0), 0.0);
        assert!((track.sample(0.25) - 2.5).abs() < 1e-5);
        assert_eq!(track.sample(2.0), 10.0);
    }

    #[test]
    fn queue_hands_off_with_carryover() {
        let mut state = AnimationState::new();
        state.set_animation(0, animation("a", 1.0), false);
        state.add_animation(0, animation("b", 1.0), false);
        state.update(1.25);
        let current = state.current(0).expect("entry b playing");
        assert_eq!(current.animation.name.as_ref(), "b");
        assert!((current.time - 0.25).abs() < 1e-5);
    }

    #[test]
    fn final_non_looping_entry_leaves_track_idle() {
        let mut state = AnimationState::new();
        state.set_animation(0, animation("once", 0.5), false);
        state.update(0.6);
        assert!(state.current(0).is_none());
    }

    #[test]
    fn looping_entry_never_expires() {
        let mut state = AnimationState::new();
        state.set_animation(0, animation("loop", 0.5), true);
        state.update(10.0);
        assert_eq!(state.current(0).expect("still playing").animation.name.as_ref(), "loop");
    }

    #[test]
    fn set_animation_discards_queued_entries() {
        let mut state = AnimationState::new();
        state.set_animation(0, animation("a", 1.0), false);
        state.add_animation(0, animation("b", 1.0), false);
        state.set_animation(0, animation("c", 1.0), true);
        assert_eq!(state.queued_len(0), 1);
        assert_eq!(state.current(0).expect("entry").animation.name.as_ref(), "c");
    }
}
