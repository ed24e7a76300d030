//! DOM tree data structures.
//!
//! Nodes live in a per-document arena and refer to each other by [`NodeId`].
//! Children are owned through the arena in insertion order; the parent link is
//! a plain index and never extends a node's lifetime.

/// ID used to address nodes in the DOM arena.
pub type NodeId = usize;

/// Tag name of the synthetic element every document is rooted at.
pub const ROOT_TAG: &str = "document";

/// Element payload: lowercased tag, attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Looks up an attribute by case-insensitive name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the attribute value, or an empty string when it is absent.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or_default()
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Sets an attribute; names are lowercased and the last write wins.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr_or_empty("class").split_whitespace()
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes().any(|class| class == name)
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

/// Arena slot: payload plus the parent back-reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }
}

/// Parsed document: exactly one root element plus everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                data: NodeData::Element(Element::new(ROOT_TAG)),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id).map(|node| &mut node.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(Node::as_text)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map(Element::children).unwrap_or_default()
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent(id),
        }
    }

    /// Appends a new element under `parent`. Returns `None` when `parent` is
    /// not an element of this document.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.append(parent, NodeData::Element(Element::new(tag)))
    }

    /// Appends a text node under `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> Option<NodeId> {
        self.append(parent, NodeData::Text(text.into()))
    }

    fn append(&mut self, parent: NodeId, data: NodeData) -> Option<NodeId> {
        let id = self.nodes.len();
        self.element_mut(parent)?.children.push(id);
        self.nodes.push(Node {
            parent: Some(parent),
            data,
        });
        Some(id)
    }

    /// Concatenated text of every text node below `id`, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// First element with the given tag in depth-first document order.
    pub fn find_first(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root()).find(|id| {
            self.element(*id)
                .is_some_and(|element| element.tag.eq_ignore_ascii_case(tag))
        })
    }

    /// `id` followed by all of its descendants in depth-first document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            document: self,
            stack: vec![id],
        }
    }

    /// Whitespace-collapsed text of the first `<title>`, or empty.
    pub fn title(&self) -> String {
        self.find_first("title")
            .map(|id| {
                self.text_content(id)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}

/// Iterator over strict ancestors, nearest first.
#[derive(Debug)]
pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

/// Pre-order iterator over a subtree.
#[derive(Debug)]
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.document.children(current).iter().rev().copied());
        Some(current)
    }
}
