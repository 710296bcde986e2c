//! Object writers.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::archive::{ArchiveCore, FinalizeContext};
use super::constants::OBJECT_TRAILER_SIZE;
use super::property::{CompoundNode, OCompoundProperty};
use super::write_util::push_object_entry;
use crate::core::{
    object_hash, CompoundPropertyWriter, Digest, DigestFold, MetaData, ObjectHeader, ObjectWriter,
    PropertyHeader,
};
use crate::util::{Error, Result};

struct ObjectSlot {
    node: Arc<Mutex<ObjectNode>>,
    handle: Weak<OObject>,
}

/// State of one object: its children and its root compound.
pub(crate) struct ObjectNode {
    header: ObjectHeader,
    children: Vec<ObjectSlot>,
    names: HashSet<String>,
    properties: Arc<Mutex<CompoundNode>>,
    closed: bool,
}

impl ObjectNode {
    pub(crate) fn new(header: ObjectHeader) -> Self {
        let properties = CompoundNode::new(PropertyHeader::compound(""), header.full_name.clone());
        Self {
            header,
            children: Vec::new(),
            names: HashSet::new(),
            properties: Arc::new(Mutex::new(properties)),
            closed: false,
        }
    }

    /// Write the properties, every child object, then the headers block and
    /// the group. Returns the group reference, the properties rollup and the
    /// fold of the children's hashes.
    pub(crate) fn finalize(&self, ctx: &mut FinalizeContext) -> Result<(u64, Digest, Digest)> {
        let (properties, properties_hash) = self.properties.lock().finalize(ctx)?;

        let mut refs = Vec::with_capacity(self.children.len() + 2);
        refs.push(properties);
        let mut headers = Vec::new();
        let mut fold = DigestFold::new();
        for slot in &self.children {
            let child = slot.node.lock();
            let (group, child_properties, child_children) = child.finalize(ctx)?;
            refs.push(group);

            let (md_index, md_text) = ctx.metadata.index_of(&child.header.meta_data);
            push_object_entry(&mut headers, &child.header.name, md_index, &md_text);
            fold.push(&object_hash(
                &child_children,
                &child_properties,
                &md_text,
                &child.header.name,
            ));
        }
        let children_hash = fold.finish();

        headers.reserve(OBJECT_TRAILER_SIZE);
        headers.extend_from_slice(properties_hash.as_bytes());
        headers.extend_from_slice(children_hash.as_bytes());
        refs.push(ctx.add_data(&headers)?);
        ctx.num_objects += 1;

        Ok((ctx.add_group(&refs)?, properties_hash, children_hash))
    }
}

/// Writer handle for an object.
pub struct OObject {
    core: Arc<ArchiveCore>,
    node: Arc<Mutex<ObjectNode>>,
    header: ObjectHeader,
}

impl OObject {
    pub(crate) fn new(core: Arc<ArchiveCore>, node: Arc<Mutex<ObjectNode>>) -> Self {
        let header = node.lock().header.clone();
        Self { core, node, header }
    }
}

impl ObjectWriter for OObject {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn create_child(&self, name: &str, meta_data: MetaData) -> Result<Arc<dyn ObjectWriter>> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::other(format!(
                "invalid object name {name:?} under '{}'",
                self.header.full_name
            )));
        }
        let mut node = self.node.lock();
        if node.closed {
            return Err(Error::Closed(self.header.full_name.clone()));
        }
        if !node.names.insert(name.to_string()) {
            return Err(Error::DuplicateName {
                parent: self.header.full_name.clone(),
                name: name.to_string(),
            });
        }
        if let Err(err) = self.core.shared.lock().check_writable() {
            node.names.remove(name);
            return Err(err);
        }

        let header = ObjectHeader::child_of(&self.header.full_name, name, meta_data);
        tracing::trace!(path = %header.full_name, "created object");
        let child = Arc::new(Mutex::new(ObjectNode::new(header)));
        let handle = Arc::new(OObject::new(self.core.clone(), child.clone()));
        node.children.push(ObjectSlot {
            node: child,
            handle: Arc::downgrade(&handle),
        });
        Ok(handle)
    }

    fn num_children(&self) -> usize {
        self.node.lock().children.len()
    }

    fn child_header(&self, index: usize) -> Result<ObjectHeader> {
        let node = self.node.lock();
        let count = node.children.len();
        let slot = node
            .children
            .get(index)
            .ok_or(Error::ChildOutOfBounds { index, count })?;
        let header = slot.node.lock().header.clone();
        Ok(header)
    }

    fn child(&self, name: &str) -> Option<Arc<dyn ObjectWriter>> {
        let node = self.node.lock();
        let slot = node.children.iter().find(|slot| slot.node.lock().header.name == name)?;
        let handle: Arc<dyn ObjectWriter> = slot.handle.upgrade()?;
        Some(handle)
    }

    fn properties(&self) -> Result<Arc<dyn CompoundPropertyWriter>> {
        let properties = self.node.lock().properties.clone();
        Ok(Arc::new(OCompoundProperty::new(self.core.clone(), properties)))
    }

    fn close(&self) {
        self.node.lock().closed = true;
    }
}
