use slotmap::{SlotMap, new_key_type};

use crate::api::jobspec_dto::ResourceDto;

new_key_type! {
    pub struct ResourceKey;
}

/// One node of the requested-resource tree.
///
/// `typ` is an open vocabulary (`node`, `socket`, `core`, `gpu`, `slot`, ...), all counting
/// and matching logic treats it as an opaque string.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub typ: String,

    /// Instances of this type required inside *each* instance of the parent.
    pub count: u64,

    pub label: Option<String>,
    pub exclusive: bool,

    /// Children in document order.
    pub with: Vec<ResourceKey>,
    pub parent: Option<ResourceKey>,

    /// Location in the source document, e.g. `resources[0].with[1]`.
    pub path: String,
}

/// Arena holding every resource tree of a jobspec. Nodes reference each other by key only.
#[derive(Debug, Clone, Default)]
pub struct ResourceTree {
    nodes: SlotMap<ResourceKey, ResourceNode>,
    roots: Vec<ResourceKey>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key(), roots: Vec::new() }
    }

    /// Builds the arena from the document representation. Counts below one are stored as zero
    /// and left for validation to report.
    pub fn from_dtos(dtos: &[ResourceDto]) -> Self {
        let mut tree = ResourceTree::new();
        for dto in dtos {
            tree.insert_dto(None, dto);
        }
        tree
    }

    fn insert_dto(&mut self, parent: Option<ResourceKey>, dto: &ResourceDto) -> ResourceKey {
        let count = u64::try_from(dto.count).unwrap_or(0);
        let key = self.push(parent, &dto.typ, count, dto.label.clone(), dto.exclusive.unwrap_or(false));

        for child in &dto.with {
            self.insert_dto(Some(key), child);
        }
        key
    }

    /// Appends a node below `parent`, or as a new root when `parent` is `None`.
    pub fn push(&mut self, parent: Option<ResourceKey>, typ: &str, count: u64, label: Option<String>, exclusive: bool) -> ResourceKey {
        let path = match parent {
            Some(parent_key) => format!("{}.with[{}]", self.nodes[parent_key].path, self.nodes[parent_key].with.len()),
            None => format!("resources[{}]", self.roots.len()),
        };

        let key = self.nodes.insert(ResourceNode { typ: typ.to_string(), count, label, exclusive, with: Vec::new(), parent, path });

        match parent {
            Some(parent_key) => self.nodes[parent_key].with.push(key),
            None => self.roots.push(key),
        }
        key
    }

    pub fn roots(&self) -> &[ResourceKey] {
        &self.roots
    }

    /// Keys handed out by this tree are always valid for it.
    pub fn node(&self, key: ResourceKey) -> &ResourceNode {
        &self.nodes[key]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All keys in depth-first pre-order, roots in document order.
    pub fn walk(&self) -> Vec<ResourceKey> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<ResourceKey> = self.roots.iter().rev().copied().collect();

        while let Some(key) = stack.pop() {
            order.push(key);
            stack.extend(self.nodes[key].with.iter().rev().copied());
        }
        order
    }

    /// Keys of every node carrying `label`.
    pub fn labeled(&self, label: &str) -> Vec<ResourceKey> {
        self.walk().into_iter().filter(|key| self.nodes[*key].label.as_deref() == Some(label)).collect()
    }

    /// Total instances of `key` across the job: the product of counts from its root down to it.
    pub fn total_count(&self, key: ResourceKey) -> u64 {
        let mut total = 1u64;
        let mut current = Some(key);
        while let Some(node_key) = current {
            let node = &self.nodes[node_key];
            total = total.saturating_mul(node.count);
            current = node.parent;
        }
        total
    }

    /// Instances of `typ` required inside one instance of `ancestor`.
    pub fn count_within(&self, ancestor: ResourceKey, typ: &str) -> u64 {
        let mut total = 0u64;
        let mut stack: Vec<(ResourceKey, u64)> = self.nodes[ancestor].with.iter().map(|child| (*child, 1)).collect();

        while let Some((key, multiplier)) = stack.pop() {
            let node = &self.nodes[key];
            let instances = multiplier.saturating_mul(node.count);
            if node.typ == typ {
                total = total.saturating_add(instances);
            }
            stack.extend(node.with.iter().map(|child| (*child, instances)));
        }
        total
    }

    pub fn to_dtos(&self) -> Vec<ResourceDto> {
        self.roots.iter().map(|root| self.to_dto(*root)).collect()
    }

    fn to_dto(&self, key: ResourceKey) -> ResourceDto {
        let node = &self.nodes[key];
        ResourceDto {
            typ: node.typ.clone(),
            count: i64::try_from(node.count).unwrap_or(i64::MAX),
            with: node.with.iter().map(|child| self.to_dto(*child)).collect(),
            label: node.label.clone(),
            exclusive: if node.exclusive { Some(true) } else { None },
        }
    }
}
