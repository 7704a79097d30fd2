use glam::{Quat, Vec3};

use super::clip::AnimationClip;
use crate::scene_graph::{ObjectId, SceneModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Repeat,
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackIcon {
    Play,
    Pause,
}

/// What the transport controls should show for the current player state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackDisplay {
    pub icon: PlaybackIcon,
    pub current_time: f32,
    pub total_time: f32,
    pub scrub_max: f32,
}

impl PlaybackDisplay {
    pub fn time_label(&self) -> String {
        format!("{:.2} / {:.2}", self.current_time, self.total_time)
    }
}

/// Live binding of one clip to the player clock.
#[derive(Debug, Clone)]
struct ClipHandle {
    clip_index: usize,
    time: f32,
    paused: bool,
    loop_mode: LoopMode,
    time_scale: f32,
}

#[derive(Debug, Clone, Copy)]
struct RestPose {
    object: ObjectId,
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

/// Clip selection and transport state for the current model.
///
/// At most one handle is bound; selecting another clip drops the previous
/// one before binding the new one.
pub struct AnimationPlayer {
    clips: Vec<AnimationClip>,
    handle: Option<ClipHandle>,
    rest_pose: Vec<RestPose>,
    restore_rest_pose: bool,
    speed: f32,
    loop_mode: LoopMode,
    scrub_max: f32,
    total_time: f32,
}

impl AnimationPlayer {
    pub fn new(speed: f32, loop_mode: LoopMode) -> Self {
        Self {
            clips: Vec::new(),
            handle: None,
            rest_pose: Vec::new(),
            restore_rest_pose: false,
            speed,
            loop_mode,
            scrub_max: 0.0,
            total_time: 0.0,
        }
    }

    /// Replaces the animation set. Any bound handle is dropped and the
    /// animated nodes' current transforms become the rest pose.
    pub fn set_clips(&mut self, clips: Vec<AnimationClip>, model: &SceneModel) {
        self.clear();

        let mut rest_pose: Vec<RestPose> = Vec::new();
        for object in clips.iter().flat_map(AnimationClip::targets) {
            if rest_pose.iter().any(|pose| pose.object == object) {
                continue;
            }
            if let Some(transform) = model.get_object_transform(object) {
                rest_pose.push(RestPose {
                    object,
                    translation: transform.translation(),
                    rotation: transform.rotation(),
                    scale: transform.scale(),
                });
            }
        }

        self.clips = clips;
        self.rest_pose = rest_pose;
    }

    pub fn clear(&mut self) {
        self.clips.clear();
        self.handle = None;
        self.rest_pose.clear();
        self.restore_rest_pose = false;
        self.scrub_max = 0.0;
        self.total_time = 0.0;
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn has_clips(&self) -> bool {
        !self.clips.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.handle.as_ref().map(|handle| handle.clip_index)
    }

    pub fn bound_clip(&self) -> Option<&AnimationClip> {
        self.selected_index().and_then(|index| self.clips.get(index))
    }

    pub fn state(&self) -> PlaybackState {
        match &self.handle {
            None => PlaybackState::Idle,
            Some(handle) if handle.paused => PlaybackState::Paused,
            Some(_) => PlaybackState::Playing,
        }
    }

    pub fn current_time(&self) -> f32 {
        self.handle.as_ref().map_or(0.0, |handle| handle.time)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    /// Stops whatever is bound and starts clip `index` from zero. Returns
    /// `false` for an out of range index.
    pub fn select(&mut self, index: usize) -> bool {
        let Some(clip) = self.clips.get(index) else {
            return false;
        };
        let duration = clip.duration;

        if self.handle.take().is_some() {
            self.restore_rest_pose = true;
        }

        self.handle = Some(ClipHandle {
            clip_index: index,
            time: 0.0,
            paused: false,
            loop_mode: self.loop_mode,
            time_scale: self.speed,
        });
        self.scrub_max = duration;
        self.total_time = duration;

        log::debug!("Playing clip {} ({:.2}s)", index, duration);
        true
    }

    pub fn toggle_pause(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };

        let duration = self.clips[handle.clip_index].duration;
        if handle.paused && handle.loop_mode == LoopMode::Once && handle.time >= duration {
            handle.time = 0.0;
        }
        handle.paused = !handle.paused;
        true
    }

    /// Unbinds the handle and rewinds the clock. The model returns to its
    /// rest pose on the next update.
    pub fn stop(&mut self) -> bool {
        if self.handle.take().is_none() {
            return false;
        }
        self.restore_rest_pose = true;
        true
    }

    /// Moves the clock of the bound handle, clamped to the clip duration.
    pub fn scrub(&mut self, time: f32) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };

        let duration = self.clips[handle.clip_index].duration;
        handle.time = time.clamp(0.0, duration);
        true
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        if let Some(handle) = self.handle.as_mut() {
            handle.time_scale = speed;
        }
    }

    pub fn set_loop_mode(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
        if let Some(handle) = self.handle.as_mut() {
            handle.loop_mode = loop_mode;
        }
    }

    pub fn display(&self) -> PlaybackDisplay {
        let icon = match self.state() {
            PlaybackState::Playing => PlaybackIcon::Pause,
            PlaybackState::Idle | PlaybackState::Paused => PlaybackIcon::Play,
        };

        PlaybackDisplay {
            icon,
            current_time: self.current_time(),
            total_time: self.total_time,
            scrub_max: self.scrub_max,
        }
    }

    /// Advances the bound handle by `delta` seconds and poses the model.
    pub fn update(&mut self, delta: f32, model: &mut SceneModel) {
        if std::mem::take(&mut self.restore_rest_pose) {
            for pose in &self.rest_pose {
                model.set_object_transform(pose.object, pose.translation, pose.rotation, pose.scale);
            }
        }

        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        let Some(clip) = self.clips.get(handle.clip_index) else {
            return;
        };

        if !handle.paused {
            advance(handle, clip.duration, delta);
        }

        clip.apply(handle.time, model);
    }
}

fn advance(handle: &mut ClipHandle, duration: f32, delta: f32) {
    handle.time += delta * handle.time_scale;

    match handle.loop_mode {
        LoopMode::Repeat => {
            handle.time = if duration > 0.0 {
                handle.time.rem_euclid(duration)
            } else {
                0.0
            };
        }
        LoopMode::Once => {
            if handle.time >= duration {
                handle.time = duration;
                handle.paused = true;
            } else if handle.time < 0.0 {
                handle.time = 0.0;
                handle.paused = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{Channel, Interpolation, Keyframes, Track};
    use crate::scene_graph::Object3D;

    fn walk_and_idle() -> (SceneModel, ObjectId, AnimationPlayer) {
        let mut model = SceneModel::new("Character");
        let hips = model.add_object(Object3D::named("Hips"), None);
        model.set_object_translation(hips, Vec3::new(0.0, 1.0, 0.0));

        let clip = |name: &str, duration: f32| {
            AnimationClip::new(
                name,
                vec![Channel {
                    target: hips,
                    track: Track::Translation(Keyframes::new(
                        vec![0.0, duration],
                        vec![Vec3::ZERO, Vec3::new(duration, 0.0, 0.0)],
                        Interpolation::Linear,
                    )),
                }],
            )
        };

        let mut player = AnimationPlayer::new(1.0, LoopMode::Repeat);
        player.set_clips(vec![clip("Walk", 2.0), clip("Idle", 4.0)], &model);
        (model, hips, player)
    }

    #[test]
    fn empty_animation_set_stays_idle() {
        let mut player = AnimationPlayer::new(1.0, LoopMode::Repeat);

        assert!(!player.select(0));
        assert!(!player.scrub(1.0));
        assert!(!player.toggle_pause());
        assert!(!player.stop());
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.display().icon, PlaybackIcon::Play);
    }

    #[test]
    fn selecting_another_clip_replaces_the_handle() {
        let (_, _, mut player) = walk_and_idle();

        assert!(player.select(0));
        assert_eq!(player.bound_clip().map(|c| c.name.as_str()), Some("Walk"));
        assert_eq!(player.display().scrub_max, 2.0);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.display().icon, PlaybackIcon::Pause);

        assert!(player.toggle_pause());
        assert_eq!(player.state(), PlaybackState::Paused);

        assert!(player.select(1));
        assert_eq!(player.bound_clip().map(|c| c.name.as_str()), Some("Idle"));
        assert_eq!(player.selected_index(), Some(1));
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.display().scrub_max, 4.0);
    }

    #[test]
    fn scrub_requires_a_bound_handle() {
        let (_, _, mut player) = walk_and_idle();
        player.select(0);
        player.toggle_pause();

        assert!(player.scrub(5.0));
        assert_eq!(player.current_time(), 2.0);
        assert_eq!(player.state(), PlaybackState::Paused);

        assert!(player.stop());
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(!player.scrub(1.0));
        assert_eq!(player.display().current_time, 0.0);
    }

    #[test]
    fn repeat_wraps_and_once_clamps() {
        let (mut model, hips, mut player) = walk_and_idle();
        player.select(0);

        player.update(2.5, &mut model);
        assert!((player.current_time() - 0.5).abs() < 1e-5);

        player.set_loop_mode(LoopMode::Once);
        player.update(3.0, &mut model);
        assert_eq!(player.current_time(), 2.0);
        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(
            model.get_object_transform(hips).unwrap().translation(),
            Vec3::new(2.0, 0.0, 0.0)
        );

        player.toggle_pause();
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn speed_scales_the_clock() {
        let (mut model, _, mut player) = walk_and_idle();
        player.set_speed(0.5);
        player.select(1);

        player.update(1.0, &mut model);
        assert!((player.current_time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stop_restores_rest_pose() {
        let (mut model, hips, mut player) = walk_and_idle();
        player.select(0);
        player.update(1.0, &mut model);
        assert_eq!(
            model.get_object_transform(hips).unwrap().translation(),
            Vec3::new(1.0, 0.0, 0.0)
        );

        player.stop();
        player.update(1.0, &mut model);
        assert_eq!(
            model.get_object_transform(hips).unwrap().translation(),
            Vec3::new(0.0, 1.0, 0.0)
        );
    }
}
