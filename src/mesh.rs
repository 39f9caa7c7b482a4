//! Vertex stream consolidation.
//!
//! The document indexes every attribute independently: one corner of one
//! triangle carries a separate index per attribute stream. The renderer
//! wants a single interleaved vertex buffer and one shared index buffer, so
//! the consolidator welds corners together: two corners with an identical
//! per-attribute index tuple are the same GPU vertex.
//!
//! Per-semantic canonicalization happens at fetch time: color tuples are
//! packed into one float (see [`crate::packing`]), and texture-coordinate V
//! is flipped to match the target renderer's UV origin. After all corners
//! are emitted, triangle winding is reversed to match the target front-face
//! rule.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use crate::document::{AttributeStream, MeshPartInput, Semantic};
use crate::error::{ImportError, Result};
use crate::packing::pack_color_bits;
use crate::skin::SkinVertexData;

/// How one channel's floats are to be interpreted by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFormat {
    /// Plain f32 components.
    Float32,
    /// Four unorm8 bytes in the bit pattern of one f32.
    PackedUnorm8x4,
}

/// One entry of the interleaved vertex record description.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub semantic: Semantic,
    pub format: ChannelFormat,
    /// Component count in floats.
    pub components: usize,
    /// Offset into one vertex record, in floats.
    pub offset: usize,
}

/// Output of a consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidatedMesh {
    /// Interleaved vertex records, `vertex_stride` floats per vertex, in
    /// source channel order.
    pub vertex_buffer: Vec<f32>,
    /// Floats per vertex.
    pub vertex_stride: usize,
    /// Triangle-list indices, winding reversed relative to the source.
    pub index_buffer: Vec<u32>,
    /// Ordered description of the interleaved layout.
    pub channels: Vec<ChannelInfo>,
}

impl ConsolidatedMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertex_buffer.len() / self.vertex_stride
    }

    pub fn triangle_count(&self) -> usize {
        self.index_buffer.len() / 3
    }

    /// The vertex buffer as raw bytes, ready for GPU upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertex_buffer)
    }

    pub fn channel(&self, semantic: Semantic) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.semantic == semantic)
    }
}

/// Composite deduplication key: the tuple of per-attribute indices for one
/// corner. Equality is structural over all components simultaneously.
#[derive(Debug, PartialEq, Eq, Hash)]
struct VertexKey(Box<[u32]>);

/// Welds a mesh part's independently-indexed attribute streams into one
/// deduplicated interleaved vertex buffer and one shared index buffer.
///
/// When `skin` is present, joint indices and weights are attached as two
/// additional channels addressed through POSITION's index stream: skin data
/// is vertex-rigid, not per-corner-varying, so it adds no dedup key
/// component beyond what position already encodes.
pub fn consolidate(
    part: &MeshPartInput,
    skin: Option<&SkinVertexData>,
) -> Result<ConsolidatedMesh> {
    let position = part
        .streams
        .iter()
        .find(|s| s.semantic == Semantic::Position)
        .ok_or_else(|| ImportError::MissingPositions {
            mesh: part.name.clone(),
        })?;
    let corner_count = position.indices.len();

    if corner_count % 3 != 0 {
        return Err(ImportError::CornerCountNotTriangles {
            mesh: part.name.clone(),
            corners: corner_count,
        });
    }
    if let Some(sizes) = &part.face_sizes {
        for (face, &count) in sizes.iter().enumerate() {
            if count != 3 {
                return Err(ImportError::NonTriangleFace {
                    mesh: part.name.clone(),
                    face,
                    count,
                });
            }
        }
    }
    for stream in &part.streams {
        if stream.indices.len() != corner_count {
            return Err(ImportError::StreamLengthMismatch {
                mesh: part.name.clone(),
                semantic: stream.semantic.name(),
                len: stream.indices.len(),
                expected: corner_count,
            });
        }
    }

    let channels = plan_channels(&part.streams, skin.is_some());
    let vertex_stride = channels
        .last()
        .map(|c| c.offset + c.components)
        .unwrap_or(0);

    let mut dedup: HashMap<VertexKey, u32> = HashMap::with_capacity(corner_count);
    let mut vertex_buffer: Vec<f32> = Vec::with_capacity(corner_count * vertex_stride / 2);
    let mut index_buffer: Vec<u32> = Vec::with_capacity(corner_count);
    let mut vertex_count: u32 = 0;

    for corner in 0..corner_count {
        let key: Vec<u32> = part.streams.iter().map(|s| s.indices[corner]).collect();
        match dedup.entry(VertexKey(key.into_boxed_slice())) {
            Entry::Occupied(existing) => index_buffer.push(*existing.get()),
            Entry::Vacant(slot) => {
                for stream in &part.streams {
                    emit_attribute(stream, corner, &mut vertex_buffer)?;
                }
                if let Some(skin) = skin {
                    emit_skin_channels(position, corner, skin, &mut vertex_buffer)?;
                }
                slot.insert(vertex_count);
                index_buffer.push(vertex_count);
                vertex_count += 1;
            }
        }
    }

    reverse_winding(&mut index_buffer);

    debug_assert!(index_buffer.len() % 3 == 0);
    debug_assert!(index_buffer.iter().all(|&i| i < vertex_count));

    tracing::info!(
        "consolidated mesh '{}': {} corners -> {} vertices, {} indices, stride {}",
        part.name,
        corner_count,
        vertex_count,
        index_buffer.len(),
        vertex_stride
    );

    Ok(ConsolidatedMesh {
        vertex_buffer,
        vertex_stride,
        index_buffer,
        channels,
    })
}

/// Swap indices 1 and 2 of every triangle, converting between the source
/// and target front-face conventions. Applying it twice restores the
/// original order.
pub fn reverse_winding(indices: &mut [u32]) {
    for triangle in indices.chunks_exact_mut(3) {
        triangle.swap(1, 2);
    }
}

/// Component count and format for one stream after canonicalization.
fn canonical_channel(semantic: Semantic, stride: usize) -> (usize, ChannelFormat) {
    match semantic {
        // 3- or 4-component float colors shrink to one packed float.
        Semantic::Color if stride == 3 || stride == 4 => (1, ChannelFormat::PackedUnorm8x4),
        _ => (stride, ChannelFormat::Float32),
    }
}

fn plan_channels(streams: &[AttributeStream], has_skin: bool) -> Vec<ChannelInfo> {
    let mut channels = Vec::with_capacity(streams.len() + 2);
    let mut offset = 0;
    for stream in streams {
        let (components, format) = canonical_channel(stream.semantic, stream.source.stride());
        channels.push(ChannelInfo {
            semantic: stream.semantic,
            format,
            components,
            offset,
        });
        offset += components;
    }
    if has_skin {
        channels.push(ChannelInfo {
            semantic: Semantic::JointIndices,
            format: ChannelFormat::Float32,
            components: 4,
            offset,
        });
        offset += 4;
        channels.push(ChannelInfo {
            semantic: Semantic::JointWeights,
            format: ChannelFormat::Float32,
            components: 3,
            offset,
        });
    }
    channels
}

/// Fetches one stream's value for a corner and appends it to the vertex
/// record, applying the per-semantic canonicalization.
fn emit_attribute(stream: &AttributeStream, corner: usize, out: &mut Vec<f32>) -> Result<()> {
    let index = stream.indices[corner] as usize;
    let value = stream
        .source
        .value(index)
        .ok_or(ImportError::IndexOutOfRange {
            semantic: stream.semantic.name(),
            index,
            len: stream.source.len(),
        })?;

    match stream.semantic {
        Semantic::Color if value.len() == 3 || value.len() == 4 => {
            let alpha = value.get(3).copied().unwrap_or(1.0);
            out.push(pack_color_bits(value[0], value[1], value[2], alpha));
        }
        Semantic::TexCoord => {
            // V is flipped to the target renderer's UV origin; any further
            // components pass through untouched.
            out.push(value[0]);
            if value.len() > 1 {
                out.push(1.0 - value[1]);
                out.extend_from_slice(&value[2..]);
            }
        }
        _ => out.extend_from_slice(value),
    }
    Ok(())
}

/// Appends the joint index/weight channels for the base vertex addressed by
/// POSITION's index at this corner.
fn emit_skin_channels(
    position: &AttributeStream,
    corner: usize,
    skin: &SkinVertexData,
    out: &mut Vec<f32>,
) -> Result<()> {
    let base_vertex = position.indices[corner] as usize;
    let indices = skin
        .joint_indices
        .get(base_vertex)
        .ok_or(ImportError::IndexOutOfRange {
            semantic: Semantic::JointIndices.name(),
            index: base_vertex,
            len: skin.joint_indices.len(),
        })?;
    let weights = &skin.joint_weights[base_vertex];

    out.extend(indices.iter().map(|&j| j as f32));
    out.extend_from_slice(weights);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::AttributeSource;
    use crate::packing::unpack_color_bits;

    fn stream(semantic: Semantic, data: Vec<f32>, stride: usize, indices: Vec<u32>) -> AttributeStream {
        AttributeStream {
            semantic,
            source: AttributeSource::new(data, stride),
            indices,
        }
    }

    fn quad_part() -> MeshPartInput {
        // Two triangles sharing one edge: positions 0-1-2 and 2-1-3.
        MeshPartInput {
            name: "quad".to_owned(),
            streams: vec![
                stream(
                    Semantic::Position,
                    vec![
                        0.0, 0.0, 0.0, //
                        1.0, 0.0, 0.0, //
                        0.0, 1.0, 0.0, //
                        1.0, 1.0, 0.0,
                    ],
                    3,
                    vec![0, 1, 2, 2, 1, 3],
                ),
                stream(
                    Semantic::TexCoord,
                    vec![
                        0.0, 0.0, //
                        1.0, 0.0, //
                        0.0, 1.0, //
                        1.0, 1.0,
                    ],
                    2,
                    vec![0, 1, 2, 2, 1, 3],
                ),
            ],
            face_sizes: Some(vec![3, 3]),
        }
    }

    #[test]
    fn test_shared_edge_corners_deduplicate() {
        let mesh = consolidate(&quad_part(), None).unwrap();

        // 6 corners, 4 distinct vertices, 6 index entries.
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_buffer.len(), 6);
        assert_eq!(mesh.triangle_count(), 2);

        // Corners sharing an index tuple map to the same vertex position.
        // Input corners: [0,1,2, 2,1,3]; after winding reversal each
        // triangle's last two indices are swapped.
        assert_eq!(mesh.index_buffer, vec![0, 2, 1, 2, 3, 1]);
    }

    #[test]
    fn test_index_buffer_validity() {
        let mesh = consolidate(&quad_part(), None).unwrap();
        assert_eq!(mesh.index_buffer.len() % 3, 0);
        let vertex_count = mesh.vertex_count() as u32;
        assert!(mesh.index_buffer.iter().all(|&i| i < vertex_count));
    }

    #[test]
    fn test_differing_attribute_index_splits_vertex() {
        // Same position index at every corner, but three distinct normals:
        // structural key equality must split them into three vertices.
        let part = MeshPartInput {
            name: "split".to_owned(),
            streams: vec![
                stream(
                    Semantic::Position,
                    vec![0.0, 0.0, 0.0],
                    3,
                    vec![0, 0, 0],
                ),
                stream(
                    Semantic::Normal,
                    vec![
                        1.0, 0.0, 0.0, //
                        0.0, 1.0, 0.0, //
                        0.0, 0.0, 1.0,
                    ],
                    3,
                    vec![0, 1, 2],
                ),
            ],
            face_sizes: None,
        };
        let mesh = consolidate(&part, None).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn test_winding_reversal_is_idempotent_when_applied_twice() {
        let mut indices = vec![0, 1, 2, 2, 1, 3, 4, 5, 6];
        let original = indices.clone();
        reverse_winding(&mut indices);
        assert_ne!(indices, original);
        reverse_winding(&mut indices);
        assert_eq!(indices, original);
    }

    #[test]
    fn test_texcoord_v_is_flipped() {
        let part = MeshPartInput {
            name: "uv".to_owned(),
            streams: vec![
                stream(
                    Semantic::Position,
                    vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                    3,
                    vec![0, 1, 2],
                ),
                stream(
                    Semantic::TexCoord,
                    vec![0.25, 0.25, 0.5, 0.75, 0.0, 1.0],
                    2,
                    vec![0, 1, 2],
                ),
            ],
            face_sizes: None,
        };
        let mesh = consolidate(&part, None).unwrap();
        let uv = mesh.channel(Semantic::TexCoord).unwrap();
        assert_eq!(uv.offset, 3);

        let stride = mesh.vertex_stride;
        let v_of = |vertex: usize| mesh.vertex_buffer[vertex * stride + uv.offset + 1];
        assert!((v_of(0) - 0.75).abs() < 1e-6);
        assert!((v_of(1) - 0.25).abs() < 1e-6);
        assert!((v_of(2) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_color_canonicalized_to_one_packed_float() {
        let part = MeshPartInput {
            name: "colored".to_owned(),
            streams: vec![
                stream(
                    Semantic::Position,
                    vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                    3,
                    vec![0, 1, 2],
                ),
                stream(
                    Semantic::Color,
                    vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                    3,
                    vec![0, 1, 2],
                ),
            ],
            face_sizes: None,
        };
        let mesh = consolidate(&part, None).unwrap();

        // Position (3 floats) + packed color (1 float).
        assert_eq!(mesh.vertex_stride, 4);
        let color = mesh.channel(Semantic::Color).unwrap();
        assert_eq!(color.components, 1);
        assert_eq!(color.format, ChannelFormat::PackedUnorm8x4);

        let packed = mesh.vertex_buffer[color.offset];
        assert_eq!(unpack_color_bits(packed), [255, 0, 0, 255]);
    }

    #[test]
    fn test_missing_position_stream_is_fatal() {
        let part = MeshPartInput {
            name: "no_pos".to_owned(),
            streams: vec![stream(
                Semantic::Normal,
                vec![0.0, 1.0, 0.0],
                3,
                vec![0, 0, 0],
            )],
            face_sizes: None,
        };
        assert!(matches!(
            consolidate(&part, None).unwrap_err(),
            ImportError::MissingPositions { mesh } if mesh == "no_pos"
        ));
    }

    #[test]
    fn test_non_triangle_face_is_fatal() {
        let mut part = quad_part();
        part.face_sizes = Some(vec![3, 4]);
        assert!(matches!(
            consolidate(&part, None).unwrap_err(),
            ImportError::NonTriangleFace { face: 1, count: 4, .. }
        ));
    }

    #[test]
    fn test_out_of_range_source_index_is_fatal() {
        let part = MeshPartInput {
            name: "broken".to_owned(),
            streams: vec![stream(
                Semantic::Position,
                vec![0.0, 0.0, 0.0],
                3,
                vec![0, 0, 7],
            )],
            face_sizes: None,
        };
        assert!(matches!(
            consolidate(&part, None).unwrap_err(),
            ImportError::IndexOutOfRange { index: 7, .. }
        ));
    }

    #[test]
    fn test_skin_channels_follow_position_indices() {
        let part = quad_part();
        let skin = SkinVertexData {
            joint_indices: vec![[0, 1, 0, 0], [1, 0, 0, 0], [2, 0, 0, 0], [3, 0, 0, 0]],
            joint_weights: vec![
                [0.5, 0.5, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
            ],
        };
        let mesh = consolidate(&part, Some(&skin)).unwrap();

        // position (3) + uv (2) + joint indices (4) + joint weights (3)
        assert_eq!(mesh.vertex_stride, 12);
        let ji = mesh.channel(Semantic::JointIndices).unwrap();
        let jw = mesh.channel(Semantic::JointWeights).unwrap();
        assert_eq!(ji.offset, 5);
        assert_eq!(jw.offset, 9);

        // Base vertex 1 (second emitted vertex) carries joint 1.
        let stride = mesh.vertex_stride;
        assert_eq!(mesh.vertex_buffer[stride + ji.offset], 1.0);
        assert_eq!(mesh.vertex_buffer[stride + jw.offset], 1.0);
    }

    #[test]
    fn test_vertex_bytes_length() {
        let mesh = consolidate(&quad_part(), None).unwrap();
        assert_eq!(mesh.vertex_bytes().len(), mesh.vertex_buffer.len() * 4);
    }
}
