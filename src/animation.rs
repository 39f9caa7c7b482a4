//! Joint keyframe tracks and time sampling.
//!
//! Each track holds time-ordered scale/rotation/translation keyframes for
//! one joint. Sampling resolves a time into one of three regions (before,
//! inside, after the keyframe range), applies the track's extrapolation
//! policy, and interpolates linearly inside a bracket. Tracks are read-only
//! after construction.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::document::{DeclaredBehavior, DeclaredInterpolation};
use crate::error::{ImportError, Result};
use crate::joint::JointHierarchy;

/// One sampled pose: time plus decomposed scale/rotation/translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub scale: Vec3,
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Keyframe {
    /// Composed joint-local matrix, T * R * S order.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Keyframe {
    fn default() -> Self {
        Self {
            time: 0.0,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
        }
    }
}

/// Supported out-of-range sampling policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    /// Clamp to the nearest boundary keyframe.
    Constant,
    /// Wrap time modulo the track duration (track start for before-range).
    Cycle,
}

impl Extrapolation {
    /// Maps the document's declared behavior onto a supported policy.
    /// Undefined means Constant; anything else unsupported is fatal rather
    /// than silently approximated.
    pub fn from_declared(behavior: DeclaredBehavior) -> Result<Self> {
        match behavior {
            DeclaredBehavior::Undefined | DeclaredBehavior::Constant => Ok(Self::Constant),
            DeclaredBehavior::Cycle => Ok(Self::Cycle),
            other => Err(ImportError::UnsupportedBehavior {
                behavior: other.name(),
            }),
        }
    }
}

/// Time-ordered keyframe track for one joint.
#[derive(Debug, Clone)]
pub struct JointAnimationTrack {
    target: u16,
    keyframes: Vec<Keyframe>,
    pre: Extrapolation,
    post: Extrapolation,
}

impl JointAnimationTrack {
    /// Validates and freezes a track. Non-linear declared interpolation is
    /// forced to Linear; unsupported behaviors and unordered or empty
    /// keyframe lists are fatal.
    pub fn new(
        target: u16,
        keyframes: Vec<Keyframe>,
        interpolation: DeclaredInterpolation,
        pre: DeclaredBehavior,
        post: DeclaredBehavior,
    ) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(ImportError::EmptyTrack { joint: target });
        }
        if keyframes.windows(2).any(|pair| pair[1].time < pair[0].time) {
            return Err(ImportError::UnorderedKeyframes { joint: target });
        }
        if interpolation != DeclaredInterpolation::Linear {
            tracing::warn!(
                "track for joint {}: interpolation {} is not supported, forced to LINEAR",
                target,
                interpolation.name()
            );
        }
        Ok(Self {
            target,
            keyframes,
            pre: Extrapolation::from_declared(pre)?,
            post: Extrapolation::from_declared(post)?,
        })
    }

    pub fn target(&self) -> u16 {
        self.target
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn start_time(&self) -> f32 {
        self.keyframes[0].time
    }

    pub fn end_time(&self) -> f32 {
        self.keyframes[self.keyframes.len() - 1].time
    }

    pub fn duration(&self) -> f32 {
        self.end_time() - self.start_time()
    }

    /// Composed joint-local transform at `time`.
    pub fn sample(&self, time: f32) -> Mat4 {
        self.sample_keyframe(time).local_matrix()
    }

    /// The interpolated pose at `time` after extrapolation handling.
    pub fn sample_keyframe(&self, time: f32) -> Keyframe {
        let first = self.keyframes[0];
        let last = self.keyframes[self.keyframes.len() - 1];
        if self.keyframes.len() == 1 {
            return first;
        }

        let time = if time < first.time {
            // Constant clamps to the first keyframe; Cycle maps before-range
            // time to the track start. Both land on the first pose.
            return first;
        } else if time > last.time {
            match self.post {
                Extrapolation::Constant => return last,
                Extrapolation::Cycle => {
                    let duration = self.duration();
                    if duration <= 0.0 {
                        return last;
                    }
                    first.time + (time - first.time).rem_euclid(duration)
                }
            }
        } else {
            time
        };

        // In-range: bracket (k, k+1) with k.time <= time < (k+1).time.
        let upper = self.keyframes.partition_point(|k| k.time <= time);
        let k0 = self.keyframes[upper - 1];
        if k0.time == time || upper == self.keyframes.len() {
            return k0;
        }
        let k1 = self.keyframes[upper];

        let factor = (time - k0.time) / (k1.time - k0.time);
        Keyframe {
            time,
            scale: k0.scale.lerp(k1.scale, factor),
            rotation: lerp_rotation(k0.rotation, k1.rotation, factor),
            translation: k0.translation.lerp(k1.translation, factor),
        }
    }
}

/// Shortest-path normalized linear interpolation between two rotations.
fn lerp_rotation(a: Quat, b: Quat, t: f32) -> Quat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    let blended = Vec4::from(a).lerp(Vec4::from(b), t);
    Quat::from_vec4(blended).normalize()
}

/// Recombines single-channel sub-tracks for one joint into one track.
///
/// Some documents split a joint's animation into separate channels (for
/// example per-axis translation tracks). All sub-tracks must share keyframe
/// count and aligned times; nothing is auto-resampled. Per keyframe index,
/// scales combine by multiplication, translations by addition, and
/// rotations by quaternion multiplication in input channel order. The
/// rotation order matches the upstream document convention and must not be
/// changed without a compatibility fixture.
pub fn combine_tracks(tracks: &[JointAnimationTrack]) -> Result<JointAnimationTrack> {
    let count = tracks.len();
    let first = tracks.first().ok_or(ImportError::MisalignedTracks { count })?;
    if count == 1 {
        return Ok(first.clone());
    }

    let key_count = first.keyframes.len();
    for track in &tracks[1..] {
        let aligned = track.target == first.target
            && track.keyframes.len() == key_count
            && track
                .keyframes
                .iter()
                .zip(&first.keyframes)
                .all(|(a, b)| (a.time - b.time).abs() < 1e-5);
        if !aligned {
            return Err(ImportError::MisalignedTracks { count });
        }
    }

    let keyframes = (0..key_count)
        .map(|i| {
            let mut combined = Keyframe {
                time: first.keyframes[i].time,
                ..Keyframe::default()
            };
            for track in tracks {
                let key = track.keyframes[i];
                combined.scale *= key.scale;
                combined.translation += key.translation;
                combined.rotation *= key.rotation;
            }
            combined
        })
        .collect();

    Ok(JointAnimationTrack {
        target: first.target,
        keyframes,
        pre: first.pre,
        post: first.post,
    })
}

/// All tracks of one animation clip, addressable by joint index.
#[derive(Debug, Clone, Default)]
pub struct AnimationSet {
    tracks: Vec<JointAnimationTrack>,
}

impl AnimationSet {
    pub fn new(tracks: Vec<JointAnimationTrack>) -> Self {
        Self { tracks }
    }

    pub fn push(&mut self, track: JointAnimationTrack) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[JointAnimationTrack] {
        &self.tracks
    }

    pub fn track_for(&self, joint: u16) -> Option<&JointAnimationTrack> {
        self.tracks.iter().find(|t| t.target == joint)
    }

    /// Latest keyframe time over all tracks.
    pub fn end_time(&self) -> f32 {
        self.tracks
            .iter()
            .map(JointAnimationTrack::end_time)
            .fold(0.0, f32::max)
    }

    /// Per-frame update: samples every track into its target joint's local
    /// transform, then recomputes absolute transforms root-first. Reading
    /// absolute transforms is only valid after this returns.
    pub fn sample_and_propagate(&self, time: f32, hierarchy: &mut JointHierarchy) {
        for track in &self.tracks {
            hierarchy.set_local_transform(track.target, track.sample(time));
        }
        hierarchy.update_absolute_transforms();
    }
}
