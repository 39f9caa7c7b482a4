//! Skin weight reduction and joint reference resolution.
//!
//! For every base vertex the skin binding declares a variable-length list
//! of joint/weight pairs. The renderer takes at most four influences, so
//! the reducer keeps the four most influential joints (a truncation policy,
//! not a mass-preserving approximation), renormalizes them to sum to one,
//! and resolves each joint reference to a hierarchy index.

use core::cmp::Ordering;

use crate::document::{JointRefKind, SkinBinding};
use crate::error::{ImportError, Result};
use crate::joint::JointHierarchy;

/// Maximum joints influencing one vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Tolerance of the post-normalization weight sum check.
const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Per base vertex skinning data: four hierarchy joint indices and three
/// explicit weights. The fourth weight is implicit as `1 - sum(first 3)`.
#[derive(Debug, Clone, Default)]
pub struct SkinVertexData {
    pub joint_indices: Vec<[u16; MAX_INFLUENCES]>,
    pub joint_weights: Vec<[f32; 3]>,
}

impl SkinVertexData {
    /// Number of base vertices covered.
    pub fn len(&self) -> usize {
        self.joint_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joint_indices.is_empty()
    }

    /// The implicit fourth weight for one base vertex.
    pub fn fourth_weight(&self, vertex: usize) -> f32 {
        let w = self.joint_weights[vertex];
        1.0 - w[0] - w[1] - w[2]
    }
}

/// Reduces a skin binding to per-vertex top-4 influences resolved against
/// the hierarchy, and copies the binding's inverse bind matrices onto the
/// referenced joints.
pub fn reduce_skin_weights(
    binding: &SkinBinding,
    hierarchy: &mut JointHierarchy,
) -> Result<SkinVertexData> {
    let resolved = resolve_joint_table(binding, hierarchy)?;

    for (source_index, &joint_index) in resolved.iter().enumerate() {
        if let Some(matrix) = binding.inverse_bind.get(source_index) {
            hierarchy.joint_mut(joint_index).inverse_bind_pose = *matrix;
        }
    }

    let mut out = SkinVertexData {
        joint_indices: Vec::with_capacity(binding.influences.len()),
        joint_weights: Vec::with_capacity(binding.influences.len()),
    };

    for (vertex, pairs) in binding.influences.iter().enumerate() {
        let mut influences: Vec<(u16, f32)> = Vec::with_capacity(pairs.len());
        for &(joint_source, weight_source) in pairs {
            let joint_index =
                *resolved
                    .get(joint_source as usize)
                    .ok_or(ImportError::IndexOutOfRange {
                        semantic: "skin-joints",
                        index: joint_source as usize,
                        len: resolved.len(),
                    })?;
            let weight =
                *binding
                    .weights
                    .get(weight_source as usize)
                    .ok_or(ImportError::IndexOutOfRange {
                        semantic: "skin-weights",
                        index: weight_source as usize,
                        len: binding.weights.len(),
                    })?;
            influences.push((joint_index, weight));
        }

        // Descending by weight; ties keep declaration order.
        influences.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        influences.truncate(MAX_INFLUENCES);

        let raw_sum: f32 = influences.iter().map(|(_, w)| w).sum();

        let mut indices = [0u16; MAX_INFLUENCES];
        let mut weights = [0.0f32; MAX_INFLUENCES];
        for (slot, (joint_index, weight)) in influences.iter().enumerate() {
            indices[slot] = *joint_index;
            weights[slot] = *weight;
        }

        if raw_sum > 0.0 {
            for weight in &mut weights {
                *weight /= raw_sum;
            }
            let sum: f32 = weights.iter().sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(ImportError::WeightSumInvariant { vertex, sum });
            }
        }
        // raw_sum == 0: tolerated; the vertex stays bound to joint 0 with
        // all-zero explicit weights.

        out.joint_indices.push(indices);
        out.joint_weights.push([weights[0], weights[1], weights[2]]);
    }

    tracing::debug!(
        "reduced skin for mesh '{}': {} vertices, {} joints",
        binding.mesh,
        out.len(),
        binding.joint_names.len()
    );
    Ok(out)
}

/// Resolves the skin's joint reference table to hierarchy indices.
///
/// The declared reference kind is tried first. When name-based resolution
/// fails for the first vertex's first joint, the whole table falls back to
/// sid-based resolution (a batch fallback, not per-vertex). Unresolvable
/// references after fallback are fatal.
fn resolve_joint_table(binding: &SkinBinding, hierarchy: &JointHierarchy) -> Result<Vec<u16>> {
    let mut kind = binding.ref_kind;

    if kind == JointRefKind::Name {
        let probe = binding
            .influences
            .iter()
            .find(|pairs| !pairs.is_empty())
            .and_then(|pairs| binding.joint_names.get(pairs[0].0 as usize));
        if let Some(name) = probe {
            if resolve_one(hierarchy, kind, name).is_none() {
                tracing::warn!(
                    "skin for mesh '{}': joint '{}' not found by name, \
                     falling back to sid resolution for the whole table",
                    binding.mesh,
                    name
                );
                kind = JointRefKind::SidRef;
            }
        }
    }

    binding
        .joint_names
        .iter()
        .map(|name| {
            resolve_one(hierarchy, kind, name).ok_or_else(|| ImportError::UnresolvedJoint {
                mesh: binding.mesh.clone(),
                joint: name.clone(),
            })
        })
        .collect()
}

fn resolve_one(hierarchy: &JointHierarchy, kind: JointRefKind, name: &str) -> Option<u16> {
    match kind {
        JointRefKind::Name => hierarchy.index_by_name(name),
        JointRefKind::IdRef => hierarchy.index_by_id(name),
        JointRefKind::SidRef => hierarchy.index_by_sid(name),
    }
}
