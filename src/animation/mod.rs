//! Keyframed clips and the playback state machine that drives them.

pub mod clip;
pub mod player;

pub use clip::{AnimationClip, Channel, Interpolation, Keyframes, Track};
pub use player::{AnimationPlayer, LoopMode, PlaybackIcon};
