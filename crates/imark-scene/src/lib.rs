use std::collections::HashMap;

use imark_base::Guid;
use imark_geometry::{Pose, Quat, Ray, Transform, Vec3, identity_quat, ray_box, ray_sphere};
use thiserror::Error;

pub type NodeId = Guid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown scene node {0}")]
    UnknownNode(NodeId),
    #[error("the scene root cannot be removed")]
    RootRemoval,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Volume a node answers ray queries with, expressed in the node's frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitShape {
    Sphere { radius: f64 },
    Cuboid { half_extents: Vec3 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub point: Vec3,
    pub distance: f64,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub position: Vec3,
    pub orientation: Quat,
    pub visible: bool,
    pub shape: Option<HitShape>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::new(0.0, 0.0, 0.0),
            orientation: identity_quat(),
            visible: true,
            shape: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn local_transform(&self) -> Transform {
        Transform::new(self.position, self.orientation)
    }
}

/// Arena of transform nodes. Each node's world transform is the composition of
/// its ancestors' local transforms.
#[derive(Clone, Debug)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, SceneNode>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(root, SceneNode::new("scene", None));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes.get(&id).ok_or(Error::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))
    }

    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId> {
        let id = NodeId::new();
        self.node_mut(parent)?.children.push(id);
        self.nodes.insert(id, SceneNode::new(name, Some(parent)));
        Ok(id)
    }

    /// Detaches `id` from its parent and drops its whole subtree. Returns the
    /// removed ids, `id` first.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        if id == self.root {
            return Err(Error::RootRemoval);
        }
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children.iter().copied());
                removed.push(next);
            }
        }
        Ok(removed)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.nodes.get(&parent)?;
        node.children
            .iter()
            .copied()
            .find(|child| self.nodes.get(child).is_some_and(|node| node.name == name))
    }

    pub fn set_local_pose(&mut self, id: NodeId, pose: Pose) -> Result<()> {
        let node = self.node_mut(id)?;
        node.position = pose.position;
        node.orientation = pose.orientation;
        Ok(())
    }

    pub fn local_pose(&self, id: NodeId) -> Result<Pose> {
        let node = self.node(id)?;
        Ok(Pose::new(node.position, node.orientation))
    }

    pub fn set_shape(&mut self, id: NodeId, shape: Option<HitShape>) -> Result<()> {
        self.node_mut(id)?.shape = shape;
        Ok(())
    }

    /// `id` followed by each of its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            let Some(node) = self.nodes.get(&next) else {
                break;
            };
            chain.push(next);
            current = node.parent;
        }
        chain
    }

    pub fn world_transform(&self, id: NodeId) -> Result<Transform> {
        self.node(id)?;
        let chain = self.ancestors(id);
        let mut world = Transform::identity();
        for ancestor in chain.iter().rev() {
            let local = self.node(*ancestor)?.local_transform();
            world = world.then(&local);
        }
        Ok(world)
    }

    /// Hits against every visible shape in the subtree of `from`, nearest first.
    pub fn raycast(&self, ray: &Ray, from: NodeId) -> Vec<Hit> {
        let mut hits = Vec::new();
        let Ok(start) = self.world_transform(from) else {
            return hits;
        };

        let mut stack = vec![(from, start)];
        while let Some((id, world)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            if let Some(shape) = node.shape {
                if let Some(distance) = hit_shape(ray, &world, shape) {
                    hits.push(Hit {
                        node: id,
                        point: ray.at(distance),
                        distance,
                    });
                }
            }
            for child in &node.children {
                if let Some(child_node) = self.nodes.get(child) {
                    stack.push((*child, world.then(&child_node.local_transform())));
                }
            }
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }
}

fn hit_shape(ray: &Ray, world: &Transform, shape: HitShape) -> Option<f64> {
    let inv = world.inverse();
    let local = Ray {
        origin: inv.transform_point(ray.origin),
        direction: inv.transform_vector(ray.direction),
        precision: ray.precision,
    };
    match shape {
        HitShape::Sphere { radius } => ray_sphere(&local, Vec3::new(0.0, 0.0, 0.0), radius),
        HitShape::Cuboid { half_extents } => ray_box(&local, half_extents),
    }
}
