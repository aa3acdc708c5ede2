// Run tree - where the event stream currently is in the suite/hook/test/step nesting

/// Slot of a node in the tree arena. Slots of removed nodes are reused, so
/// ids say nothing about arrival order; use [`RunTree::arrived_before`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Suite,
    Hook,
    Test,
    Step,
}

#[derive(Debug, Clone)]
pub struct Node<H> {
    pub kind: NodeKind,
    pub label: String,
    pub handle: H,
    seq: u64,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<H> Node<H> {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Mutable n-ary tree with one "current" pointer per node kind.
///
/// Every pointer is either unset or names a live node reachable from the root.
#[derive(Debug, Clone)]
pub struct RunTree<H> {
    nodes: Vec<Option<Node<H>>>,
    free: Vec<NodeId>,
    live: usize,
    next_seq: u64,
    root: NodeId,
    current_suite: Option<NodeId>,
    current_hook: Option<NodeId>,
    current_test: Option<NodeId>,
    current_step: Option<NodeId>,
}

impl<H> RunTree<H> {
    pub fn new(root_handle: H) -> Self {
        let root = Node {
            kind: NodeKind::Root,
            label: String::new(),
            handle: root_handle,
            seq: 0,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            live: 1,
            next_seq: 1,
            root: NodeId(0),
            current_suite: None,
            current_hook: None,
            current_test: None,
            current_step: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<H>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<H>> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn handle(&self, id: NodeId) -> Option<&H> {
        self.node(id).map(|n| &n.handle)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    /// Slots allocated so far, live or free
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn current_suite(&self) -> Option<NodeId> {
        self.current_suite
    }

    pub fn current_hook(&self) -> Option<NodeId> {
        self.current_hook
    }

    pub fn current_test(&self) -> Option<NodeId> {
        self.current_test
    }

    pub fn current_step(&self) -> Option<NodeId> {
        self.current_step
    }

    /// Whether `a` was added to the tree before `b`
    pub fn arrived_before(&self, a: NodeId, b: NodeId) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => a.seq < b.seq,
            _ => false,
        }
    }

    fn insert(&mut self, parent: NodeId, kind: NodeKind, label: String, handle: H) -> NodeId {
        let node = Node {
            kind,
            label,
            handle,
            seq: self.next_seq,
            parent: Some(parent),
            children: Vec::new(),
        };
        self.next_seq += 1;
        self.live += 1;

        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    fn take(&mut self, id: NodeId) -> Option<Node<H>> {
        let node = self.nodes.get_mut(id.0).and_then(Option::take)?;
        self.free.push(id);
        self.live -= 1;
        Some(node)
    }

    fn container_context(&self) -> NodeId {
        self.current_suite.unwrap_or(self.root)
    }

    pub fn add_suite(&mut self, label: impl Into<String>, handle: H) -> NodeId {
        let parent = self.container_context();
        let id = self.insert(parent, NodeKind::Suite, label.into(), handle);
        self.current_suite = Some(id);
        id
    }

    pub fn add_hook(&mut self, label: impl Into<String>, handle: H) -> NodeId {
        let parent = self.container_context();
        let id = self.insert(parent, NodeKind::Hook, label.into(), handle);
        self.current_hook = Some(id);
        id
    }

    pub fn add_test(&mut self, label: impl Into<String>, handle: H) -> NodeId {
        let parent = self.container_context();
        let id = self.insert(parent, NodeKind::Test, label.into(), handle);
        self.current_test = Some(id);
        id
    }

    /// Nest a step under the open step, test or hook. Returns `None` when
    /// nothing executable is open.
    pub fn add_step(&mut self, label: impl Into<String>, handle: H) -> Option<NodeId> {
        let parent = self
            .current_step
            .or(self.current_test)
            .or(self.current_hook)?;
        let id = self.insert(parent, NodeKind::Step, label.into(), handle);
        self.current_step = Some(id);
        Some(id)
    }

    fn nearest_ancestor(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.ancestors(id, |node| node.kind == kind).into_iter().next()
    }

    pub fn end_step(&mut self) {
        if let Some(step) = self.current_step {
            self.current_step = self.nearest_ancestor(step, NodeKind::Step);
        }
    }

    pub fn end_all_steps(&mut self) {
        while self.current_step.is_some() {
            self.end_step();
        }
    }

    pub fn end_suite(&mut self) {
        if let Some(suite) = self.current_suite {
            self.current_suite = self.nearest_ancestor(suite, NodeKind::Suite);
        }
    }

    /// Also closes any step still open inside the hook
    pub fn end_hook(&mut self) {
        if let Some(hook) = self.current_hook {
            self.close_steps_within(hook);
            self.current_hook = self.nearest_ancestor(hook, NodeKind::Hook);
        }
    }

    /// Also closes any step still open inside the test
    pub fn end_test(&mut self) {
        if let Some(test) = self.current_test {
            self.close_steps_within(test);
            self.current_test = self.nearest_ancestor(test, NodeKind::Test);
        }
    }

    fn close_steps_within(&mut self, owner: NodeId) {
        if let Some(step) = self.current_step
            && self.is_descendant(step, owner)
        {
            self.current_step = None;
        }
    }

    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    /// Ancestors of `id` matching `pred`, nearest first
    pub fn ancestors<P>(&self, id: NodeId, pred: P) -> Vec<NodeId>
    where
        P: Fn(&Node<H>) -> bool,
    {
        let mut found = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(ancestor) = cursor {
            if let Some(node) = self.node(ancestor) {
                if pred(node) {
                    found.push(ancestor);
                }
                cursor = node.parent;
            } else {
                break;
            }
        }
        found
    }

    /// Other children of `id`'s parent matching `pred`, in arrival order
    pub fn siblings<P>(&self, id: NodeId, pred: P) -> Vec<NodeId>
    where
        P: Fn(&Node<H>) -> bool,
    {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        self.children(parent)
            .iter()
            .copied()
            .filter(|sibling| *sibling != id)
            .filter(|sibling| self.node(*sibling).is_some_and(&pred))
            .collect()
    }

    /// Hooks that arrived before the current suite at any level of its
    /// ancestor chain, in arrival order. Empty when no suite is open.
    pub fn find_hooks_for_current_suite(&self) -> Vec<NodeId> {
        let Some(suite) = self.current_suite else {
            return Vec::new();
        };

        let mut chain = vec![suite];
        chain.extend(self.ancestors(suite, |_| true));

        let mut hooks: Vec<NodeId> = chain
            .iter()
            .flat_map(|link| {
                self.siblings(*link, |node| node.kind == NodeKind::Hook)
                    .into_iter()
                    .filter(move |hook| self.arrived_before(*hook, *link))
            })
            .collect();
        hooks.sort_by_key(|hook| self.node(*hook).map(|n| n.seq));
        hooks
    }

    /// Delete `id` and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || self.node(id).is_none() {
            return false;
        }
        self.detach(id);
        self.unset_pointers_within(id);

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.take(next) {
                pending.extend(node.children);
            }
        }
        true
    }

    /// Delete `id` and splice its children into its parent at its position.
    pub fn remove_and_merge(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let Some(node) = self.take(id) else {
            return false;
        };

        for child in &node.children {
            if let Some(child) = self.node_mut(*child) {
                child.parent = Some(parent);
            }
        }
        if let Some(parent_node) = self.node_mut(parent) {
            let position = parent_node
                .children
                .iter()
                .position(|c| *c == id)
                .unwrap_or(parent_node.children.len());
            parent_node
                .children
                .splice(position..(position + 1).min(parent_node.children.len()), node.children);
        }

        let kind = node.kind;
        let ascend = |tree: &Self, start: NodeId| -> Option<NodeId> {
            std::iter::successors(Some(start), |n| tree.parent(*n))
                .find(|n| tree.kind(*n) == Some(kind))
        };
        let replacement = ascend(self, parent);
        for pointer in self.pointers_mut() {
            if *pointer == Some(id) {
                *pointer = replacement;
            }
        }
        true
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id)
            && let Some(parent) = self.node_mut(parent)
        {
            parent.children.retain(|c| *c != id);
        }
    }

    fn unset_pointers_within(&mut self, id: NodeId) {
        let inside: Vec<bool> = [
            self.current_suite,
            self.current_hook,
            self.current_test,
            self.current_step,
        ]
        .iter()
        .map(|p| p.is_some_and(|p| p == id || self.is_descendant(p, id)))
        .collect();

        let kinds = [NodeKind::Suite, NodeKind::Hook, NodeKind::Test, NodeKind::Step];
        let parent = self.parent(id);
        let replacements: Vec<Option<NodeId>> = kinds
            .iter()
            .map(|kind| {
                parent.and_then(|p| {
                    std::iter::successors(Some(p), |n| self.parent(*n))
                        .find(|n| self.kind(*n) == Some(*kind))
                })
            })
            .collect();

        for ((pointer, inside), replacement) in
            self.pointers_mut().into_iter().zip(inside).zip(replacements)
        {
            if inside {
                *pointer = replacement;
            }
        }
    }

    fn pointers_mut(&mut self) -> [&mut Option<NodeId>; 4] {
        [
            &mut self.current_suite,
            &mut self.current_hook,
            &mut self.current_test,
            &mut self.current_step,
        ]
    }
}
