//! Import error types shared across the conversion passes.
//!
//! Every failure carries enough context (mesh name, vertex, joint, face) to
//! diagnose the offending document without re-running the import. There is
//! no transient failure class; errors unwind to the importer boundary.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Every mesh part must carry a position stream.
    #[error("mesh '{mesh}' has no position stream")]
    MissingPositions { mesh: String },

    /// Only triangle primitives are supported.
    #[error("mesh '{mesh}' face {face} has {count} vertices, only triangles are supported")]
    NonTriangleFace { mesh: String, face: usize, count: u32 },

    /// The corner count is not a whole number of triangles.
    #[error("mesh '{mesh}' has {corners} corners, not a whole number of triangles")]
    CornerCountNotTriangles { mesh: String, corners: usize },

    /// All index streams of one mesh part must iterate in lock-step.
    #[error("mesh '{mesh}' stream '{semantic}' has {len} indices, expected {expected}")]
    StreamLengthMismatch {
        mesh: String,
        semantic: &'static str,
        len: usize,
        expected: usize,
    },

    /// A declared skeleton reference did not match any scene node.
    #[error("skeleton reference '{reference}' does not match any scene node")]
    SkeletonRootNotFound { reference: String },

    /// A skin joint reference stayed unresolved after the sid fallback.
    #[error("skin for mesh '{mesh}' references joint '{joint}' which is not in the hierarchy")]
    UnresolvedJoint { mesh: String, joint: String },

    /// Extrapolation behaviors other than Constant and Cycle have no safe
    /// downgrade and must not be silently approximated.
    #[error("unsupported extrapolation behavior '{behavior}'")]
    UnsupportedBehavior { behavior: &'static str },

    /// An animation track must hold at least one keyframe.
    #[error("animation track for joint {joint} has no keyframes")]
    EmptyTrack { joint: u16 },

    /// Keyframes within one track must be time-ordered.
    #[error("animation track for joint {joint} has unordered keyframe times")]
    UnorderedKeyframes { joint: u16 },

    /// Sub-channel tracks must share keyframe count and aligned times.
    #[error("cannot combine {count} channel tracks: keyframe counts, times, or targets differ")]
    MisalignedTracks { count: usize },

    /// Normalized weights failed the sum-to-one corruption check.
    #[error("vertex {vertex} skin weights sum to {sum} after normalization")]
    WeightSumInvariant { vertex: usize, sum: f32 },

    /// An index stream pointed outside its attribute source. Internal
    /// invariant class: surfaced hard, never clamped.
    #[error("index {index} is out of range for '{semantic}' source with {len} values")]
    IndexOutOfRange {
        semantic: &'static str,
        index: usize,
        len: usize,
    },
}
