//! Joint hierarchy construction and transform propagation.
//!
//! Joints live in a flat arena with dense indices assigned in pre-order,
//! depth-first visitation order. A synthetic root with identity local
//! transform is appended last; callers rely on "last index = root" as a
//! stable convention so downward child indices stay valid while joints are
//! added during the import walk. Parents are non-owning back indices;
//! children are owned downward as index lists.

use glam::Mat4;
use hashbrown::HashSet;

use crate::document::SceneNode;
use crate::error::{ImportError, Result};

/// One node of the imported joint tree.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Dense arena index, assigned on insertion.
    pub index: u16,
    pub name: Option<String>,
    /// Document-unique id, when the source node carried one.
    pub id: Option<String>,
    /// Locally unique sid, when the source node carried one.
    pub sid: Option<String>,
    /// Joint-local transform; mutated every animation sample.
    pub local_transform: Mat4,
    /// parent.absolute * local; root's absolute equals its local. Updated
    /// by [`JointHierarchy::update_absolute_transforms`].
    pub absolute_transform: Mat4,
    /// Set once from skin data; identity when unused.
    pub inverse_bind_pose: Mat4,
    /// Back index into the arena; `None` only for the synthetic root.
    pub parent: Option<u16>,
    pub children: Vec<u16>,
}

/// Flat, indexed joint collection with parent/child links.
#[derive(Debug, Clone)]
pub struct JointHierarchy {
    joints: Vec<Joint>,
}

impl JointHierarchy {
    /// Builds a hierarchy from the scene node forest.
    ///
    /// `skeleton_refs` are explicit root references (by node id); a dangling
    /// reference is fatal. When no references are declared, the first node
    /// flagged as a joint (depth-first) is the root candidate. A node
    /// already visited (matched by id) is skipped, so multiple reference
    /// paths to the same subtree do not produce duplicate joints.
    pub fn build(scene_roots: &[SceneNode], skeleton_refs: &[String]) -> Result<Self> {
        let mut walker = Walker {
            joints: Vec::new(),
            visited: HashSet::new(),
        };
        let mut top_level: Vec<u16> = Vec::new();

        if skeleton_refs.is_empty() {
            if let Some(node) = scene_roots.iter().find_map(first_joint_node) {
                if let Some(index) = walker.visit(node) {
                    top_level.push(index);
                }
            }
        } else {
            for reference in skeleton_refs {
                let node = scene_roots
                    .iter()
                    .find_map(|root| find_node_by_id(root, reference))
                    .ok_or_else(|| ImportError::SkeletonRootNotFound {
                        reference: reference.clone(),
                    })?;
                if let Some(index) = walker.visit(node) {
                    top_level.push(index);
                }
            }
        }

        let mut joints = walker.joints;
        let root_index = joints.len() as u16;
        for &child in &top_level {
            joints[child as usize].parent = Some(root_index);
        }
        joints.push(Joint {
            index: root_index,
            name: None,
            id: None,
            sid: None,
            local_transform: Mat4::IDENTITY,
            absolute_transform: Mat4::IDENTITY,
            inverse_bind_pose: Mat4::IDENTITY,
            parent: None,
            children: top_level,
        });

        tracing::debug!("built joint hierarchy: {} joints", joints.len());
        Ok(Self { joints })
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// The synthetic root, appended last by convention.
    pub fn root_index(&self) -> u16 {
        (self.joints.len() - 1) as u16
    }

    pub fn joint(&self, index: u16) -> &Joint {
        &self.joints[index as usize]
    }

    pub fn joint_mut(&mut self, index: u16) -> &mut Joint {
        &mut self.joints[index as usize]
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn index_by_name(&self, name: &str) -> Option<u16> {
        self.joints
            .iter()
            .find(|j| j.name.as_deref() == Some(name))
            .map(|j| j.index)
    }

    pub fn index_by_id(&self, id: &str) -> Option<u16> {
        self.joints
            .iter()
            .find(|j| j.id.as_deref() == Some(id))
            .map(|j| j.index)
    }

    pub fn index_by_sid(&self, sid: &str) -> Option<u16> {
        self.joints
            .iter()
            .find(|j| j.sid.as_deref() == Some(sid))
            .map(|j| j.index)
    }

    pub fn set_local_transform(&mut self, index: u16, transform: Mat4) {
        self.joints[index as usize].local_transform = transform;
    }

    /// Recomputes every joint's absolute transform, root first.
    ///
    /// Must happen after local transforms are updated for a frame and
    /// before any pass reads `absolute_transform`.
    pub fn update_absolute_transforms(&mut self) {
        if self.joints.is_empty() {
            return;
        }
        let mut stack = vec![self.root_index()];
        while let Some(index) = stack.pop() {
            let i = index as usize;
            let absolute = match self.joints[i].parent {
                Some(parent) => {
                    self.joints[parent as usize].absolute_transform * self.joints[i].local_transform
                }
                None => self.joints[i].local_transform,
            };
            self.joints[i].absolute_transform = absolute;
            stack.extend(self.joints[i].children.iter().copied());
        }
    }

    /// Skinning matrix for one joint: absolute * inverse bind pose.
    pub fn skinning_matrix(&self, index: u16) -> Mat4 {
        let joint = &self.joints[index as usize];
        joint.absolute_transform * joint.inverse_bind_pose
    }
}

/// Per-call walk state; the visited guard is owned by the single build
/// invocation, never global.
struct Walker {
    joints: Vec<Joint>,
    visited: HashSet<String>,
}

impl Walker {
    /// Pre-order, depth-first visit. Returns the created joint's index, or
    /// `None` when the node was already visited through another path.
    fn visit(&mut self, node: &SceneNode) -> Option<u16> {
        if let Some(id) = &node.id {
            if !self.visited.insert(id.clone()) {
                return None;
            }
        }

        let index = self.joints.len() as u16;
        self.joints.push(Joint {
            index,
            name: node.name.clone(),
            id: node.id.clone(),
            sid: node.sid.clone(),
            local_transform: node.transform,
            absolute_transform: node.transform,
            inverse_bind_pose: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
        });

        for child in &node.children {
            if let Some(child_index) = self.visit(child) {
                self.joints[child_index as usize].parent = Some(index);
                self.joints[index as usize].children.push(child_index);
            }
        }

        Some(index)
    }
}

fn find_node_by_id<'a>(node: &'a SceneNode, id: &str) -> Option<&'a SceneNode> {
    if node.id.as_deref() == Some(id) {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|child| find_node_by_id(child, id))
}

fn first_joint_node(node: &SceneNode) -> Option<&SceneNode> {
    if node.is_joint {
        return Some(node);
    }
    node.children.iter().find_map(first_joint_node)
}
