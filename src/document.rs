//! Decoded-document data contracts.
//!
//! The document parsing layer (out of scope for this crate) decodes the
//! source scene format into these plain typed arrays. The conversion passes
//! never see tags, namespaces, or attribute syntax; they receive already
//! decoded node trees, flat value arrays, per-corner index streams, and
//! declared animation enums.

use glam::Mat4;

/// One node of the decoded scene graph.
///
/// Children are owned top-down; the hierarchy builder walks this tree and
/// flattens the joints it finds into an indexed arena.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    /// Document-unique id.
    pub id: Option<String>,
    /// Locally unique sid.
    pub sid: Option<String>,
    pub transform: Mat4,
    /// Whether the document flagged this node as a joint.
    pub is_joint: bool,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(id: Option<&str>, transform: Mat4) -> Self {
        Self {
            name: id.map(str::to_owned),
            id: id.map(str::to_owned),
            sid: None,
            transform,
            is_joint: false,
            children: Vec::new(),
        }
    }
}

/// Closed set of vertex attribute semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Color,
    Tangent,
    Binormal,
    TexCoord,
    JointIndices,
    JointWeights,
}

impl Semantic {
    pub const fn name(self) -> &'static str {
        match self {
            Semantic::Position => "position",
            Semantic::Normal => "normal",
            Semantic::Color => "color",
            Semantic::Tangent => "tangent",
            Semantic::Binormal => "binormal",
            Semantic::TexCoord => "texcoord",
            Semantic::JointIndices => "joint-indices",
            Semantic::JointWeights => "joint-weights",
        }
    }
}

/// Flat array of one semantic's distinct values plus its component stride.
///
/// Immutable once read from the document.
#[derive(Debug, Clone)]
pub struct AttributeSource {
    data: Vec<f32>,
    stride: usize,
}

impl AttributeSource {
    pub fn new(data: Vec<f32>, stride: usize) -> Self {
        debug_assert!(stride > 0);
        Self { data, stride }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of values (tuples), not floats.
    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `index`-th tuple, or `None` when the index is out of range.
    pub fn value(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.stride)?;
        let end = start.checked_add(self.stride)?;
        self.data.get(start..end)
    }
}

/// A per-corner index stream for one attribute of one mesh part.
///
/// All streams of a part share the same length (3 × triangle count) and
/// iterate in lock-step: index `i` across every stream refers to the i-th
/// corner.
#[derive(Debug, Clone)]
pub struct AttributeStream {
    pub semantic: Semantic,
    pub source: AttributeSource,
    pub indices: Vec<u32>,
}

/// One mesh part as handed over by the document layer.
#[derive(Debug, Clone)]
pub struct MeshPartInput {
    pub name: String,
    /// Streams in source channel order; this order becomes the interleaved
    /// vertex record layout.
    pub streams: Vec<AttributeStream>,
    /// Per-face vertex counts, present when the document declared polygons.
    /// Any entry other than 3 is fatal.
    pub face_sizes: Option<Vec<u32>>,
}

/// How a skin's joint source addresses joints in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointRefKind {
    Name,
    IdRef,
    SidRef,
}

/// Decoded skin binding for one mesh.
#[derive(Debug, Clone)]
pub struct SkinBinding {
    /// Name of the mesh this skin deforms (context for diagnostics).
    pub mesh: String,
    /// Joint references in skin order; `ref_kind` says how to resolve them.
    pub joint_names: Vec<String>,
    pub ref_kind: JointRefKind,
    /// Inverse bind matrices aligned with `joint_names`; may be empty when
    /// the document omitted them.
    pub inverse_bind: Vec<Mat4>,
    /// Flat weight value array indexed by the influence pairs.
    pub weights: Vec<f32>,
    /// `influences[v]` lists (joint-source-index, weight-source-index)
    /// pairs for base vertex `v`.
    pub influences: Vec<Vec<(u32, u32)>>,
}

/// Interpolation mode as declared by the document.
///
/// Only linear sampling is implemented; everything else downgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredInterpolation {
    Linear,
    Bezier,
    Hermite,
    Step,
}

impl DeclaredInterpolation {
    pub const fn name(self) -> &'static str {
        match self {
            DeclaredInterpolation::Linear => "LINEAR",
            DeclaredInterpolation::Bezier => "BEZIER",
            DeclaredInterpolation::Hermite => "HERMITE",
            DeclaredInterpolation::Step => "STEP",
        }
    }
}

/// Pre/post-range extrapolation behavior as declared by the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredBehavior {
    Undefined,
    Constant,
    Cycle,
    Oscillate,
    CycleRelative,
    Gradient,
}

impl DeclaredBehavior {
    pub const fn name(self) -> &'static str {
        match self {
            DeclaredBehavior::Undefined => "UNDEFINED",
            DeclaredBehavior::Constant => "CONSTANT",
            DeclaredBehavior::Cycle => "CYCLE",
            DeclaredBehavior::Oscillate => "OSCILLATE",
            DeclaredBehavior::CycleRelative => "CYCLE_RELATIVE",
            DeclaredBehavior::Gradient => "GRADIENT",
        }
    }
}
