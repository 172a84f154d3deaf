//! arena-backed ownership tree
//!
//! nodes live in a single `Vec` and refer to each other by [`NodeId`]. every
//! node has one parent link, one next-sibling link and a head-of-children link,
//! so sibling order is a singly linked list exactly like a directory listing.
//!
//! children are populated lazily: the first time a node's children are asked
//! for, the tree consults its [`Source`] once and links whatever it yields, in
//! order. detached nodes keep their slot in the arena but are unreachable from
//! their former parent.

use std::ops::Deref;

use crate::error::{Error, Result};

/// stable index of a node inside its tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// one slot in the arena
#[derive(Debug)]
pub struct Node<D> {
    name: String,
    parent: Option<NodeId>,
    next: Option<NodeId>,
    first: Option<NodeId>,
    populated: bool,
    data: D,
}

impl<D> Node<D> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    /// has the source been consulted for this node's children
    pub fn is_populated(&self) -> bool {
        self.populated
    }
}

/// supplier of children for lazily populated nodes
pub trait Source {
    type Data;

    /// list the children of `parent` in the order they should be linked.
    /// called at most once per node (per successful call).
    fn list(&self, nodes: &Nodes<Self::Data>, parent: NodeId)
        -> Result<Vec<(String, Self::Data)>>;
}

/// the node arena; read-only navigation that never triggers population
#[derive(Debug)]
pub struct Nodes<D> {
    slots: Vec<Node<D>>,
}

impl<D> Nodes<D> {
    fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// allocate an unlinked node
    fn alloc(&mut self, name: String, data: D) -> Result<NodeId> {
        validate_name(&name)?;
        let id = NodeId(self.slots.len());
        self.slots.push(Node {
            name,
            parent: None,
            next: None,
            first: None,
            populated: false,
            data,
        });
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> &Node<D> {
        &self.slots[id.0]
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node<D> {
        &mut self.slots[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.get(id).name
    }

    pub fn data(&self, id: NodeId) -> &D {
        &self.get(id).data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    /// number of allocated slots, including detached nodes
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// children already linked under `id`; does not populate
    pub fn linked_children(&self, id: NodeId) -> Children<'_, D> {
        Children {
            nodes: self,
            cur: self.get(id).first,
        }
    }

    /// topmost ancestor (or `id` itself)
    pub fn root(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            cur = p;
        }
        cur
    }

    /// parents of `id`, nearest first, excluding `id`
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, D> {
        Ancestors {
            nodes: self,
            cur: self.parent(id),
        }
    }

    /// `id` followed by its parents, nearest first
    pub fn self_and_ancestors(&self, id: NodeId) -> Ancestors<'_, D> {
        Ancestors {
            nodes: self,
            cur: Some(id),
        }
    }

    /// is `ancestor` a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// chain from the root down to `id`, inclusive
    pub fn descent(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<_> = self.self_and_ancestors(id).collect();
        chain.reverse();
        chain
    }

    /// names from `id` upwards, excluding the root's own name
    pub fn names(&self, id: NodeId) -> Vec<&str> {
        self.self_and_ancestors(id)
            .filter(|n| self.parent(*n).is_some())
            .map(|n| self.name(n))
            .collect()
    }

    /// root-relative path with a leading separator; the root itself is `sep`
    pub fn path(&self, id: NodeId, sep: &str) -> String {
        let mut names = self.names(id);
        names.reverse();
        format!("{}{}", sep, names.join(sep))
    }

    /// names from `id` upwards until (excluding) `top`
    ///
    /// `top` must be a strict ancestor of `id`; walking off the root without
    /// meeting it means the tree has been corrupted.
    pub fn relative_names(&self, id: NodeId, top: NodeId) -> Result<Vec<&str>> {
        let mut out = Vec::new();
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            out.push(self.name(cur));
            if p == top {
                return Ok(out);
            }
            cur = p;
        }
        Err(Error::Internal(format!(
            "{:?} is not an ancestor of {}",
            self.name(top),
            self.path(id, "/")
        )))
    }

    /// '/'-joined path of `id` relative to its ancestor `top`
    pub fn relative_path(&self, id: NodeId, top: NodeId) -> Result<String> {
        let mut names = self.relative_names(id, top)?;
        names.reverse();
        Ok(names.join("/"))
    }

    /// link `child` as the last child of `parent`, no checks
    fn link_last(&mut self, parent: NodeId, child: NodeId) {
        match self.last_linked(parent) {
            Some(last) => self.get_mut(last).next = Some(child),
            None => self.get_mut(parent).first = Some(child),
        }
        let node = self.get_mut(child);
        node.parent = Some(parent);
        node.next = None;
    }

    fn last_linked(&self, parent: NodeId) -> Option<NodeId> {
        self.linked_children(parent).last()
    }

    /// unlink `child` from `parent`'s sibling list
    fn unlink(&mut self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let mut prev: Option<NodeId> = None;
        let mut cur = self.get(parent).first;
        while let Some(c) = cur {
            if c == child {
                let next = self.get(c).next;
                match prev {
                    None => self.get_mut(parent).first = next,
                    Some(p) => self.get_mut(p).next = next,
                }
                let node = self.get_mut(c);
                node.parent = None;
                node.next = None;
                return Some(c);
            }
            prev = cur;
            cur = self.get(c).next;
        }
        None
    }

    fn find_linked(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.linked_children(parent).find(|c| self.name(*c) == name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    Ok(())
}

/// iterator over a sibling chain
pub struct Children<'a, D> {
    nodes: &'a Nodes<D>,
    cur: Option<NodeId>,
}

impl<D> Iterator for Children<'_, D> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.cur?;
        self.cur = self.nodes.get(cur).next;
        Some(cur)
    }
}

/// iterator over a parent chain
pub struct Ancestors<'a, D> {
    nodes: &'a Nodes<D>,
    cur: Option<NodeId>,
}

impl<D> Iterator for Ancestors<'_, D> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.cur?;
        self.cur = self.nodes.parent(cur);
        Some(cur)
    }
}

/// a lazily populated tree over a [`Source`]
pub struct Tree<S: Source> {
    nodes: Nodes<S::Data>,
    source: S,
}

impl<S: Source> Deref for Tree<S> {
    type Target = Nodes<S::Data>;

    fn deref(&self) -> &Nodes<S::Data> {
        &self.nodes
    }
}

impl<S: Source> Tree<S> {
    pub fn new(source: S) -> Self {
        Self {
            nodes: Nodes::new(),
            source,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// create a parentless node
    pub fn add_root(&mut self, name: impl Into<String>, data: S::Data) -> Result<NodeId> {
        self.nodes.alloc(name.into(), data)
    }

    /// create a node that is not linked anywhere yet
    pub fn new_node(&mut self, name: impl Into<String>, data: S::Data) -> Result<NodeId> {
        self.nodes.alloc(name.into(), data)
    }

    /// make sure `id`'s children have been pulled from the source
    pub fn populate(&mut self, id: NodeId) -> Result<()> {
        if self.nodes.get(id).populated {
            return Ok(());
        }
        let items = self.source.list(&self.nodes, id)?;
        self.nodes.get_mut(id).populated = true;
        for (name, data) in items {
            let child = self.nodes.alloc(name, data)?;
            self.nodes.link_last(id, child);
        }
        Ok(())
    }

    /// head of the children list, populating on first access
    pub fn first_child(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.populate(id)?;
        Ok(self.nodes.get(id).first)
    }

    /// children of `id` in link order, populating on first access
    pub fn children(&mut self, id: NodeId) -> Result<Children<'_, S::Data>> {
        self.populate(id)?;
        Ok(self.nodes.linked_children(id))
    }

    /// children of `id` collected, for callers that need to keep mutating
    pub fn child_ids(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.children(id)?.collect())
    }

    pub fn last_child(&mut self, id: NodeId) -> Result<Option<NodeId>> {
        self.populate(id)?;
        Ok(self.nodes.last_linked(id))
    }

    /// previous sibling of `id`
    pub fn prior(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.parent(id)?;
        self.nodes
            .linked_children(parent)
            .take_while(|c| *c != id)
            .last()
    }

    /// link `child` as the last child of `parent`, detaching it first
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == parent || self.nodes.is_ancestor(child, parent) {
            return Err(Error::Internal(format!(
                "cannot move {} under its own descendant {}",
                self.nodes.path(child, "/"),
                self.nodes.path(parent, "/")
            )));
        }
        self.populate(parent)?;
        let name = self.nodes.name(child);
        if self
            .nodes
            .find_linked(parent, name)
            .is_some_and(|existing| existing != child)
        {
            return Err(Error::InvalidEntryName(format!("duplicate name: {}", name)));
        }
        self.detach(child);
        self.nodes.link_last(parent, child);
        Ok(())
    }

    /// append every node of `children`, in order
    pub fn extend(
        &mut self,
        parent: NodeId,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<()> {
        for child in children {
            self.append(parent, child)?;
        }
        Ok(())
    }

    /// unlink `child` from `parent`; returns None if it was not a child
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        if self.nodes.parent(child) != Some(parent) {
            return None;
        }
        self.nodes.unlink(parent, child)
    }

    /// unlink `id` from its parent; no-op for parentless nodes
    pub fn detach(&mut self, id: NodeId) -> NodeId {
        if let Some(parent) = self.nodes.parent(id) {
            self.nodes.unlink(parent, id);
        }
        id
    }

    /// put `new` in `old`'s place among `parent`'s children
    pub fn replace(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<()> {
        if self.nodes.parent(old) != Some(parent) {
            return Err(Error::NotFound(self.nodes.name(old).to_string()));
        }
        if new == old {
            return Ok(());
        }
        if new == parent || self.nodes.is_ancestor(new, parent) {
            return Err(Error::Internal(format!(
                "cannot move {} under its own descendant",
                self.nodes.path(new, "/")
            )));
        }
        let name = self.nodes.name(new);
        if self
            .nodes
            .linked_children(parent)
            .any(|c| c != old && c != new && self.nodes.name(c) == name)
        {
            return Err(Error::InvalidEntryName(format!("duplicate name: {}", name)));
        }
        self.detach(new);
        let prev = self.prior(old);
        let next = self.nodes.get(old).next;
        match prev {
            Some(p) => self.nodes.get_mut(p).next = Some(new),
            None => self.nodes.get_mut(parent).first = Some(new),
        }
        {
            let node = self.nodes.get_mut(new);
            node.parent = Some(parent);
            node.next = next;
        }
        let node = self.nodes.get_mut(old);
        node.parent = None;
        node.next = None;
        Ok(())
    }

    /// unlink every child of `id`; the source is not consulted again
    pub fn clear(&mut self, id: NodeId) {
        let children: Vec<_> = self.nodes.linked_children(id).collect();
        for c in children {
            let node = self.nodes.get_mut(c);
            node.parent = None;
            node.next = None;
        }
        let node = self.nodes.get_mut(id);
        node.first = None;
        node.populated = true;
    }

    /// swap the payload of `id` and forget its children so they are listed again
    pub fn set_data(&mut self, id: NodeId, data: S::Data) {
        self.clear(id);
        let node = self.nodes.get_mut(id);
        node.data = data;
        node.populated = false;
    }

    /// linear scan of `id`'s children for `name`
    pub fn get_child_by_name(&mut self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        validate_name(name)?;
        self.populate(id)?;
        Ok(self.nodes.find_linked(id, name))
    }

    /// child named `name`, created with `make` if missing
    pub fn intern(
        &mut self,
        id: NodeId,
        name: &str,
        make: impl FnOnce() -> S::Data,
    ) -> Result<NodeId> {
        if let Some(existing) = self.get_child_by_name(id, name)? {
            return Ok(existing);
        }
        let child = self.nodes.alloc(name.to_string(), make())?;
        self.nodes.link_last(id, child);
        Ok(child)
    }

    /// follow a sequence of child names down from `id`
    pub fn get_sub<N: AsRef<str>>(&mut self, id: NodeId, names: &[N]) -> Result<Option<NodeId>> {
        let mut cur = id;
        for name in names {
            match self.get_child_by_name(cur, name.as_ref())? {
                Some(c) => cur = c,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// every descendant of `id` in depth-first pre-order, populating as it goes
    pub fn descendants(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut stack = self.child_ids(id)?;
        stack.reverse();
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let mut kids = self.child_ids(cur)?;
            kids.reverse();
            stack.extend(kids);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// in-memory source keyed by '/'-joined path
    struct MapSource {
        dirs: HashMap<String, Vec<&'static str>>,
        calls: Cell<usize>,
    }

    impl MapSource {
        fn new(entries: &[(&str, &[&'static str])]) -> Self {
            Self {
                dirs: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl Source for MapSource {
        type Data = ();

        fn list(&self, nodes: &Nodes<()>, parent: NodeId) -> Result<Vec<(String, ())>> {
            self.calls.set(self.calls.get() + 1);
            let key = nodes.path(parent, "/");
            Ok(self
                .dirs
                .get(&key)
                .map(|names| names.iter().map(|n| (n.to_string(), ())).collect())
                .unwrap_or_default())
        }
    }

    fn sample() -> (Tree<MapSource>, NodeId) {
        let source = MapSource::new(&[
            ("/", &["a", "b", "c"]),
            ("/a", &["x", "y"]),
            ("/a/y", &["deep"]),
        ]);
        let mut tree = Tree::new(source);
        let root = tree.add_root("ROOT", ()).unwrap();
        (tree, root)
    }

    fn names(tree: &Tree<MapSource>, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.name(*id).to_string()).collect()
    }

    #[test]
    fn test_lazy_population_happens_once() {
        let (mut tree, root) = sample();
        assert_eq!(tree.source().calls.get(), 0);

        let first = tree.child_ids(root).unwrap();
        let second = tree.child_ids(root).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.source().calls.get(), 1);
        assert_eq!(names(&tree, &first), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_first_and_last_child() {
        let (mut tree, root) = sample();
        let first = tree.first_child(root).unwrap().unwrap();
        let last = tree.last_child(root).unwrap().unwrap();
        assert_eq!(tree.name(first), "a");
        assert_eq!(tree.name(last), "c");
        assert_eq!(tree.prior(last).map(|p| tree.name(p).to_string()), Some("b".into()));
        assert_eq!(tree.prior(first), None);
    }

    #[test]
    fn test_paths_and_names() {
        let (mut tree, root) = sample();
        let deep = tree.get_sub(root, &["a", "y", "deep"]).unwrap().unwrap();
        assert_eq!(tree.path(deep, "/"), "/a/y/deep");
        assert_eq!(tree.path(deep, "\\"), "\\a\\y\\deep");
        assert_eq!(tree.path(root, "/"), "/");
        assert_eq!(tree.root(deep), root);

        let a = tree.get_child_by_name(root, "a").unwrap().unwrap();
        assert_eq!(tree.relative_names(deep, a).unwrap(), vec!["deep", "y"]);
        assert_eq!(tree.relative_path(deep, root).unwrap(), "a/y/deep");
    }

    #[test]
    fn test_relative_names_requires_ancestor() {
        let (mut tree, root) = sample();
        let b = tree.get_child_by_name(root, "b").unwrap().unwrap();
        let x = tree.get_sub(root, &["a", "x"]).unwrap().unwrap();
        assert!(matches!(
            tree.relative_names(x, b),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_ancestors() {
        let (mut tree, root) = sample();
        let deep = tree.get_sub(root, &["a", "y", "deep"]).unwrap().unwrap();
        let up: Vec<_> = tree.ancestors(deep).map(|n| tree.name(n).to_string()).collect();
        assert_eq!(up, vec!["y", "a", "ROOT"]);
        let with_self: Vec<_> = tree.self_and_ancestors(deep).collect();
        assert_eq!(with_self.len(), 4);
        assert_eq!(tree.descent(deep)[0], root);
    }

    #[test]
    fn test_descendants_pre_order() {
        let (mut tree, root) = sample();
        let all = tree.descendants(root).unwrap();
        assert_eq!(names(&tree, &all), vec!["a", "x", "y", "deep", "b", "c"]);
    }

    #[test]
    fn test_detach_and_remove() {
        let (mut tree, root) = sample();
        let b = tree.get_child_by_name(root, "b").unwrap().unwrap();
        tree.detach(b);
        assert_eq!(tree.parent(b), None);
        let kids = tree.child_ids(root).unwrap();
        assert_eq!(names(&tree, &kids), vec!["a", "c"]);

        // detaching a parentless node is a no-op
        tree.detach(b);
        tree.detach(root);

        let a = kids[0];
        assert_eq!(tree.remove(root, a), Some(a));
        assert_eq!(tree.remove(root, a), None);
        let kids = tree.child_ids(root).unwrap();
        assert_eq!(names(&tree, &kids), vec!["c"]);
    }

    #[test]
    fn test_append_moves_node() {
        let (mut tree, root) = sample();
        let x = tree.get_sub(root, &["a", "x"]).unwrap().unwrap();
        let b = tree.get_child_by_name(root, "b").unwrap().unwrap();
        tree.append(b, x).unwrap();

        assert_eq!(tree.parent(x), Some(b));
        let a = tree.get_child_by_name(root, "a").unwrap().unwrap();
        let a_kids = tree.child_ids(a).unwrap();
        assert_eq!(names(&tree, &a_kids), vec!["y"]);
        // each node appears exactly once under its parent
        let b_kids = tree.child_ids(b).unwrap();
        assert_eq!(b_kids, vec![x]);
    }

    #[test]
    fn test_append_rejects_cycles_and_duplicates() {
        let (mut tree, root) = sample();
        let a = tree.get_child_by_name(root, "a").unwrap().unwrap();
        let y = tree.get_sub(root, &["a", "y"]).unwrap().unwrap();
        assert!(tree.append(y, a).is_err());
        assert!(tree.append(a, a).is_err());

        let dup = tree.new_node("b", ()).unwrap();
        assert!(tree.append(root, dup).is_err());
    }

    #[test]
    fn test_replace() {
        let (mut tree, root) = sample();
        let b = tree.get_child_by_name(root, "b").unwrap().unwrap();
        let z = tree.new_node("z", ()).unwrap();
        tree.replace(root, z, b).unwrap();
        let kids = tree.child_ids(root).unwrap();
        assert_eq!(names(&tree, &kids), vec!["a", "z", "c"]);
        assert_eq!(tree.parent(b), None);
    }

    #[test]
    fn test_replace_rejects_duplicate_name() {
        let (mut tree, root) = sample();
        let b = tree.get_child_by_name(root, "b").unwrap().unwrap();
        let other = tree.new_node("c", ()).unwrap();
        assert!(matches!(
            tree.replace(root, other, b),
            Err(Error::InvalidEntryName(_))
        ));
        let kids = tree.child_ids(root).unwrap();
        assert_eq!(names(&tree, &kids), vec!["a", "b", "c"]);
        assert_eq!(tree.parent(other), None);

        // taking over the name of the node being replaced is fine
        let b2 = tree.new_node("b", ()).unwrap();
        tree.replace(root, b2, b).unwrap();
        assert_eq!(tree.get_child_by_name(root, "b").unwrap(), Some(b2));
    }

    #[test]
    fn test_intern_and_extend() {
        let (mut tree, root) = sample();
        let b = tree.intern(root, "b", || ()).unwrap();
        assert_eq!(tree.get_child_by_name(root, "b").unwrap(), Some(b));

        let n = tree.intern(root, "new", || ()).unwrap();
        assert_eq!(tree.last_child(root).unwrap(), Some(n));

        let p = tree.new_node("p", ()).unwrap();
        let q = tree.new_node("q", ()).unwrap();
        tree.extend(n, [p, q]).unwrap();
        let kids = tree.child_ids(n).unwrap();
        assert_eq!(kids, vec![p, q]);
    }

    #[test]
    fn test_clear_and_set_data() {
        let (mut tree, root) = sample();
        let a = tree.get_child_by_name(root, "a").unwrap().unwrap();
        tree.clear(root);
        assert!(tree.child_ids(root).unwrap().is_empty());
        assert_eq!(tree.parent(a), None);
        let calls = tree.source().calls.get();

        tree.set_data(root, ());
        assert_eq!(tree.child_ids(root).unwrap().len(), 3);
        assert_eq!(tree.source().calls.get(), calls + 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let (mut tree, root) = sample();
        assert!(matches!(
            tree.add_root("", ()),
            Err(Error::InvalidEntryName(_))
        ));
        assert!(tree.get_child_by_name(root, "").is_err());
    }
}
