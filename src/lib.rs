//! rigmesh — converts a decoded 3D scene (face-varying, independently
//! indexed attribute streams, skin bindings, joint keyframe tracks) into
//! the data a real-time renderer consumes: one deduplicated interleaved
//! vertex buffer with a shared index buffer, a rooted joint hierarchy, and
//! sampled joint animation curves.
//!
//! Import order matters: the joint hierarchy is built first, skin weights
//! are reduced against it, then geometry streams (including skin channels)
//! are consolidated. At playback time [`AnimationSet::sample_and_propagate`]
//! updates joint local transforms and recomputes absolute transforms with a
//! root-first walk.
//!
//! Document parsing, materials, serialization, and rendering live outside
//! this crate; it receives already-decoded typed arrays (see [`document`]).

pub mod animation;
pub mod document;
pub mod error;
pub mod joint;
pub mod mesh;
pub mod packing;
pub mod skin;

pub use animation::{
    combine_tracks, AnimationSet, Extrapolation, JointAnimationTrack, Keyframe,
};
pub use document::{
    AttributeSource, AttributeStream, DeclaredBehavior, DeclaredInterpolation, JointRefKind,
    MeshPartInput, SceneNode, Semantic, SkinBinding,
};
pub use error::{ImportError, Result};
pub use joint::{Joint, JointHierarchy};
pub use mesh::{consolidate, reverse_winding, ChannelFormat, ChannelInfo, ConsolidatedMesh};
pub use packing::{pack_color_bits, unpack_color_bits};
pub use skin::{reduce_skin_weights, SkinVertexData, MAX_INFLUENCES};
