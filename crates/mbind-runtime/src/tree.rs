#![forbid(unsafe_code)]

//! The view tree: arena-owned views, field propagation, lifecycle and the
//! per-tick update loop.
//!
//! # Ownership
//!
//! All views live in one [`SlotMap`] keyed by [`ViewId`]. A view owns the
//! ids of its children in order; its parent is a plain key. Destroying a view
//! removes its whole subtree from the arena, so stale ids simply stop
//! resolving.
//!
//! # Field writes
//!
//! Every field is an [`Observable<Value>`] whose change subscription records
//! a pending write. The tree drains that record ("pump") after each of its
//! own write operations and at the start of every tick. Draining a write:
//!
//! 1. queues the field's change handlers on the view (unless the write was
//!    animated or part of initialization),
//! 2. marks the view layout-dirty if the field affects layout,
//! 3. copies the value to every `MapTo` target, whose own mappings then
//!    apply in turn.
//!
//! # Invariants
//!
//! 1. Traversal helpers never yield destroyed views, and yield templates
//!    only with [`TraversalMode::IncludeTemplates`].
//! 2. A view is destroyed at most once; later calls log and return `false`.
//! 3. Within one tick each view is flushed at most once, in pre-order
//!    traversal order. Handlers queued during the flush run next tick.
//! 4. A chain of mappings longer than `max_propagation_depth` stops with an
//!    error log instead of recursing further.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown type / view / field | caller error | `Err(TreeError)` |
//! | Bad markup value | conversion failed | collected in [`InitReport`], field keeps its default |
//! | Missing mapping target | child not present | debug log, target skipped |
//! | Handler failure | handler returned `Err` | error log, remaining handlers still run |

use core::fmt;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bitflags::bitflags;
use mbind_core::{ConversionError, FieldValue, Value, ValueKind};
use slotmap::SlotMap;

use crate::capability::Animatable;
use crate::config::RuntimeConfig;
use crate::context::UiContext;
use crate::error::{FieldInitError, InitReport, TreeError};
use crate::id::ViewId;
use crate::reactive::{BindingScope, Observable, TwoWayBinding};
use crate::registry::{FieldKey, FieldPath, ViewType};
use crate::scheduler::ChangeHandlerQueue;

bitflags! {
    /// Per-view status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ViewFlags: u8 {
        /// Prototype for cloning; skipped by normal traversal and layout.
        const TEMPLATE = 1 << 0;
        const ACTIVE = 1 << 1;
        const DESTROYED = 1 << 2;
        /// A layout-affecting field changed since the last tick.
        const LAYOUT_DIRTY = 1 << 3;
    }
}

/// Lifecycle of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Initialized,
    Active,
    Inactive,
    Destroyed,
}

/// Whether traversal enters template subtrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMode {
    #[default]
    SkipTemplates,
    IncludeTemplates,
}

/// How a field write treats change handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Propagate and queue change handlers.
    #[default]
    Normal,
    /// Propagate only; used for intermediate animation frames.
    Animated,
}

// ---------------------------------------------------------------------------
// ViewNode
// ---------------------------------------------------------------------------

/// One view in the arena.
pub struct ViewNode {
    id: ViewId,
    name: Rc<str>,
    view_type: Rc<ViewType>,
    parent: Option<ViewId>,
    children: Vec<ViewId>,
    flags: ViewFlags,
    state: LifecycleState,
    fields: Vec<Observable<Value>>,
    handlers: ChangeHandlerQueue,
    scope: BindingScope,
}

impl ViewNode {
    #[must_use]
    pub fn id(&self) -> ViewId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.view_type.name()
    }

    #[must_use]
    pub fn view_type(&self) -> &Rc<ViewType> {
        &self.view_type
    }

    #[must_use]
    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    /// Child ids in order, templates included.
    #[must_use]
    pub fn children(&self) -> &[ViewId] {
        &self.children
    }

    #[must_use]
    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn is_template(&self) -> bool {
        self.flags.contains(ViewFlags::TEMPLATE)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.flags.contains(ViewFlags::ACTIVE)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Observable<Value>> {
        self.view_type.field_index(name).map(|i| &self.fields[i])
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.field(name).map(Observable::get)
    }

    /// Handler names waiting for the next flush.
    #[must_use]
    pub fn pending_handlers(&self) -> &[Rc<str>] {
        self.handlers.pending()
    }
}

impl fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.view_type.name())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Pending writes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct FieldWrite {
    view: ViewId,
    field: usize,
    depth: usize,
    queue_handlers: bool,
}

/// Context stamped on writes recorded while the tree is writing.
#[derive(Debug, Clone, Copy)]
struct Origin {
    depth: usize,
    queue_handlers: bool,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            depth: 0,
            queue_handlers: true,
        }
    }
}

#[derive(Debug, Default)]
struct PendingWrites {
    writes: VecDeque<FieldWrite>,
    origin: Origin,
}

impl PendingWrites {
    fn record(&mut self, view: ViewId, field: usize) {
        let Origin {
            depth,
            queue_handlers,
        } = self.origin;
        self.writes.push_back(FieldWrite {
            view,
            field,
            depth,
            queue_handlers,
        });
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of flushing one view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub ran: usize,
    pub failed: usize,
    pub unknown: usize,
    /// Names pushed to the next tick by `max_handlers_per_flush`.
    pub deferred: usize,
}

/// Outcome of one [`ViewTree::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub views_flushed: usize,
    pub handlers_run: usize,
    pub handler_failures: usize,
    pub layout_changed: usize,
}

// ---------------------------------------------------------------------------
// ViewTree
// ---------------------------------------------------------------------------

/// Arena of views plus the services they share.
pub struct ViewTree {
    nodes: SlotMap<ViewId, ViewNode>,
    roots: Vec<ViewId>,
    ctx: UiContext,
    pending: Rc<RefCell<PendingWrites>>,
    next_name: u64,
}

impl ViewTree {
    #[must_use]
    pub fn new(ctx: UiContext) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            ctx,
            pending: Rc::new(RefCell::new(PendingWrites::default())),
            next_name: 0,
        }
    }

    #[must_use]
    pub fn context(&self) -> &UiContext {
        &self.ctx
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.ctx.config
    }

    /// Number of live views, templates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node(&self, id: ViewId) -> Option<&ViewNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn roots(&self) -> &[ViewId] {
        &self.roots
    }

    /// Subscriptions and links that live exactly as long as the view.
    pub fn scope_mut(&mut self, id: ViewId) -> Option<&mut BindingScope> {
        self.nodes.get_mut(id).map(|n| &mut n.scope)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Create a view from markup.
    ///
    /// Order: defaults, declared components, markup values in the given
    /// order, then mapping propagation for every explicitly set field in
    /// declaration order. A view created under an active parent is
    /// activated.
    pub fn create_view<K, V>(
        &mut self,
        type_name: &str,
        parent: Option<ViewId>,
        name: Option<&str>,
        attrs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<InitReport, TreeError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let view_type = self
            .ctx
            .registry
            .get(type_name)
            .cloned()
            .ok_or_else(|| TreeError::UnknownType(type_name.to_owned()))?;
        if let Some(p) = parent
            && !self.nodes.contains_key(p)
        {
            return Err(TreeError::UnknownView(p));
        }

        let name = match name {
            Some(n) => Rc::from(n),
            None => self.generate_name(view_type.name()),
        };
        let id = self.insert_node(Rc::clone(&view_type), parent, name, None);
        let mut failures = Vec::new();

        for component in view_type.components() {
            let report = self.create_view(
                &component.view_type,
                Some(id),
                Some(&*component.name),
                std::iter::empty::<(&str, &str)>(),
            )?;
            failures.extend(report.failures);
        }

        for (field, raw) in attrs {
            if let Err(err) = self.apply_markup(id, field.as_ref(), raw.as_ref()) {
                failures.push(err);
            }
        }

        self.queue_initial_writes(id);
        self.notify_parent_of_child(id);
        self.pump();
        self.set_state(id, LifecycleState::Initialized);

        if parent.is_some_and(|p| self.is_active(p)) {
            self.activate(id)?;
        }
        tracing::trace!(view = ?id, view_type = type_name, "view created");
        Ok(InitReport { view: id, failures })
    }

    fn apply_markup(&self, id: ViewId, field: &str, raw: &str) -> Result<(), FieldInitError> {
        let node = &self.nodes[id];
        let Some(index) = node.view_type.field_index(field) else {
            tracing::warn!(view = ?id, view_name = %node.name, field, "markup names an unknown field");
            return Err(FieldInitError::UnknownField {
                view: id,
                field: field.to_owned(),
            });
        };
        let desc = &node.view_type.fields()[index];
        let converted = self
            .ctx
            .converters
            .convert(desc.kind, desc.converter.as_deref(), raw)
            .and_then(|value| {
                if value.is_empty() || value.kind() == Some(desc.kind) {
                    Ok(value)
                } else {
                    Err(ConversionError::Invalid {
                        input: raw.to_owned(),
                        kind: desc.kind,
                        reason: "converter produced a value of another kind",
                    })
                }
            });
        match converted {
            Ok(value) => {
                node.fields[index].set_direct(value);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(
                    view = ?id,
                    view_name = %node.name,
                    field,
                    error = %source,
                    "markup value rejected; field keeps its default"
                );
                Err(FieldInitError::Conversion {
                    view: id,
                    field: field.to_owned(),
                    source,
                })
            }
        }
    }

    fn insert_node(
        &mut self,
        view_type: Rc<ViewType>,
        parent: Option<ViewId>,
        name: Rc<str>,
        index: Option<usize>,
    ) -> ViewId {
        let pending = Rc::clone(&self.pending);
        let id = self.nodes.insert_with_key(|id| {
            let mut scope = BindingScope::new();
            let fields = view_type
                .fields()
                .iter()
                .enumerate()
                .map(|(i, desc)| {
                    let field = Observable::with_owner(desc.default.clone(), Some(id));
                    let pending = Rc::clone(&pending);
                    scope.hold(field.subscribe(move |_| pending.borrow_mut().record(id, i)));
                    field
                })
                .collect();
            ViewNode {
                id,
                name,
                view_type,
                parent,
                children: Vec::new(),
                flags: ViewFlags::empty(),
                state: LifecycleState::Constructed,
                fields,
                handlers: ChangeHandlerQueue::new(),
                scope,
            }
        });

        let siblings = match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(p) => &mut p.children,
            None => &mut self.roots,
        };
        let at = index.map_or(siblings.len(), |i| i.min(siblings.len()));
        siblings.insert(at, id);
        id
    }

    fn generate_name(&mut self, base: &str) -> Rc<str> {
        self.next_name += 1;
        Rc::from(format!("{base}#{}", self.next_name))
    }

    /// Record every explicitly set field for propagation, without handlers.
    fn queue_initial_writes(&self, id: ViewId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let mut pending = self.pending.borrow_mut();
        for (field, obs) in node.fields.iter().enumerate() {
            if obs.is_set() {
                pending.writes.push_back(FieldWrite {
                    view: id,
                    field,
                    depth: 0,
                    queue_handlers: false,
                });
            }
        }
    }

    /// A child appearing late may be the target of its parent's mappings.
    fn notify_parent_of_child(&self, id: ViewId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let Some(parent) = node.parent.and_then(|p| self.nodes.get(p)) else {
            return;
        };
        let child_name = &*node.name;
        let mut pending = self.pending.borrow_mut();
        for (field, desc) in parent.view_type.fields().iter().enumerate() {
            let targets_child = desc
                .map_to
                .iter()
                .any(|p| p.segments().first().is_some_and(|s| **s == *child_name));
            if targets_child && parent.fields[field].is_set() {
                pending.writes.push_back(FieldWrite {
                    view: parent.id,
                    field,
                    depth: 0,
                    queue_handlers: false,
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn set_state(&mut self, id: ViewId, state: LifecycleState) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = state;
        }
    }

    #[must_use]
    pub fn is_active(&self, id: ViewId) -> bool {
        self.nodes.get(id).is_some_and(ViewNode::is_active)
    }

    /// Activate a view and its non-template descendants.
    pub fn activate(&mut self, id: ViewId) -> Result<(), TreeError> {
        self.set_active(id, true)
    }

    /// Deactivate a view and its descendants. Field values are kept.
    pub fn deactivate(&mut self, id: ViewId) -> Result<(), TreeError> {
        self.set_active(id, false)
    }

    fn set_active(&mut self, id: ViewId, active: bool) -> Result<(), TreeError> {
        let node = self.nodes.get(id).ok_or(TreeError::UnknownView(id))?;
        if active && node.is_template() {
            tracing::debug!(view = ?id, "templates stay inactive");
            return Ok(());
        }
        let mode = if active {
            TraversalMode::SkipTemplates
        } else {
            TraversalMode::IncludeTemplates
        };
        for v in self.subtree(id, mode) {
            if let Some(node) = self.nodes.get_mut(v) {
                node.flags.set(ViewFlags::ACTIVE, active);
                node.state = if active {
                    LifecycleState::Active
                } else {
                    LifecycleState::Inactive
                };
            }
        }
        Ok(())
    }

    /// Destroy a view and its subtree.
    ///
    /// Field observables are released and every subscription the views hold
    /// is dropped. Returns `false` (with a warning) for an unknown or already
    /// destroyed view.
    pub fn destroy(&mut self, id: ViewId) -> bool {
        if !self.nodes.contains_key(id) {
            tracing::warn!(view = ?id, "destroy of an unknown or already destroyed view ignored");
            return false;
        }
        self.detach(id);
        let doomed = self.subtree(id, TraversalMode::IncludeTemplates);
        for v in doomed.into_iter().rev() {
            if let Some(mut node) = self.nodes.remove(v) {
                node.flags = ViewFlags::DESTROYED;
                node.state = LifecycleState::Destroyed;
                for field in &node.fields {
                    field.release();
                }
                node.scope.clear();
                tracing::trace!(view = ?v, view_name = %node.name, "view destroyed");
            }
        }
        true
    }

    fn detach(&mut self, id: ViewId) {
        let parent = self.nodes.get(id).and_then(|n| n.parent);
        let siblings = match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(p) => &mut p.children,
            None => &mut self.roots,
        };
        siblings.retain(|&c| c != id);
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    /// Turn a view into a template: deactivated and hidden from traversal.
    pub fn mark_template(&mut self, id: ViewId) -> Result<(), TreeError> {
        self.deactivate(id)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.flags.insert(ViewFlags::TEMPLATE);
        }
        Ok(())
    }

    /// Deep-clone a template under `parent` at child position `index`.
    ///
    /// Field values and their "is set" flags are copied. The clone goes
    /// through the same propagation as a view created from markup and is
    /// activated when the parent is active.
    pub fn instantiate(
        &mut self,
        template: ViewId,
        parent: ViewId,
        index: usize,
    ) -> Result<ViewId, TreeError> {
        let node = self
            .nodes
            .get(template)
            .ok_or(TreeError::UnknownView(template))?;
        if !node.is_template() {
            return Err(TreeError::NotATemplate(template));
        }
        if !self.nodes.contains_key(parent) {
            return Err(TreeError::UnknownView(parent));
        }
        let base = Rc::clone(&node.name);
        let name = self.generate_name(&base);
        let root = self.clone_subtree(template, parent, Some(index), Some(name));

        let cloned = self.subtree(root, TraversalMode::IncludeTemplates);
        for &v in &cloned {
            self.queue_initial_writes(v);
        }
        self.notify_parent_of_child(root);
        self.pump();
        for &v in &cloned {
            self.set_state(v, LifecycleState::Initialized);
        }
        if self.is_active(parent) {
            self.activate(root)?;
        }
        Ok(root)
    }

    fn clone_subtree(
        &mut self,
        source: ViewId,
        parent: ViewId,
        index: Option<usize>,
        name: Option<Rc<str>>,
    ) -> ViewId {
        let src = &self.nodes[source];
        let view_type = Rc::clone(&src.view_type);
        let name = name.unwrap_or_else(|| Rc::clone(&src.name));
        let values: Vec<(Value, bool)> = src.fields.iter().map(|f| (f.get(), f.is_set())).collect();
        let children = src.children.clone();

        let id = self.insert_node(view_type, Some(parent), name, index);
        for (field, (value, is_set)) in self.nodes[id].fields.iter().zip(values) {
            if is_set {
                field.set_direct(value);
            } else {
                field.set_default(value);
            }
        }
        for child in children {
            let nested_template = self.nodes[child].is_template();
            let copy = self.clone_subtree(child, id, None, None);
            if nested_template {
                self.nodes[copy].flags.insert(ViewFlags::TEMPLATE);
            }
        }
        id
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// `id` followed by its descendants in pre-order.
    fn subtree(&self, id: ViewId, mode: TraversalMode) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(v) = stack.pop() {
            let Some(node) = self.nodes.get(v) else {
                continue;
            };
            out.push(v);
            for &child in node.children.iter().rev() {
                if self.visible(child, mode) {
                    stack.push(child);
                }
            }
        }
        out
    }

    fn visible(&self, id: ViewId, mode: TraversalMode) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|n| mode == TraversalMode::IncludeTemplates || !n.is_template())
    }

    #[must_use]
    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: ViewId, mode: TraversalMode) -> Vec<ViewId> {
        self.nodes.get(id).map_or_else(Vec::new, |n| {
            n.children
                .iter()
                .copied()
                .filter(|&c| self.visible(c, mode))
                .collect()
        })
    }

    /// Descendants of `id` in pre-order, `id` excluded.
    #[must_use]
    pub fn descendants(&self, id: ViewId, mode: TraversalMode) -> Vec<ViewId> {
        let mut all = self.subtree(id, mode);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// Every view in pre-order, root by root.
    #[must_use]
    pub fn preorder(&self, mode: TraversalMode) -> Vec<ViewId> {
        self.roots
            .iter()
            .filter(|&&r| self.visible(r, mode))
            .flat_map(|&r| self.subtree(r, mode))
            .collect()
    }

    /// Position of `child` among `parent`'s children, templates counted.
    #[must_use]
    pub fn child_position(&self, parent: ViewId, child: ViewId) -> Option<usize> {
        self.nodes
            .get(parent)
            .and_then(|n| n.children.iter().position(|&c| c == child))
    }

    /// Nearest strict ancestor matching `pred`.
    pub fn find_ancestor(&self, id: ViewId, pred: impl Fn(&ViewNode) -> bool) -> Option<ViewId> {
        let mut current = self.parent(id);
        while let Some(v) = current {
            let node = self.nodes.get(v)?;
            if pred(node) {
                return Some(v);
            }
            current = node.parent;
        }
        None
    }

    #[must_use]
    pub fn find_ancestor_of_type(&self, id: ViewId, type_name: &str) -> Option<ViewId> {
        self.find_ancestor(id, |n| n.type_name() == type_name)
    }

    /// First descendant in pre-order matching `pred`.
    pub fn find_descendant(
        &self,
        id: ViewId,
        mode: TraversalMode,
        pred: impl Fn(&ViewNode) -> bool,
    ) -> Option<ViewId> {
        self.descendants(id, mode)
            .into_iter()
            .find(|&v| self.nodes.get(v).is_some_and(&pred))
    }

    pub fn for_each_descendant_of_type(
        &self,
        id: ViewId,
        type_name: &str,
        mode: TraversalMode,
        mut f: impl FnMut(ViewId),
    ) {
        for v in self.descendants(id, mode) {
            if self.nodes.get(v).is_some_and(|n| n.type_name() == type_name) {
                f(v);
            }
        }
    }

    #[must_use]
    pub fn find_child_by_name(
        &self,
        parent: ViewId,
        name: &str,
        mode: TraversalMode,
    ) -> Option<ViewId> {
        let node = self.nodes.get(parent)?;
        node.children
            .iter()
            .copied()
            .find(|&c| self.visible(c, mode) && self.nodes.get(c).is_some_and(|n| &*n.name == name))
    }

    fn resolve_path(&self, from: ViewId, path: &FieldPath) -> Option<ViewId> {
        path.segments().iter().try_fold(from, |view, segment| {
            self.find_child_by_name(view, segment, TraversalMode::IncludeTemplates)
        })
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    fn field_slot(&self, id: ViewId, name: &str) -> Result<(usize, &ViewNode), TreeError> {
        let node = self.nodes.get(id).ok_or(TreeError::UnknownView(id))?;
        let index = node
            .view_type
            .field_index(name)
            .ok_or_else(|| TreeError::UnknownField {
                view_type: node.type_name().to_owned(),
                field: name.to_owned(),
            })?;
        Ok((index, node))
    }

    #[must_use]
    pub fn get_field(&self, id: ViewId, name: &str) -> Option<Value> {
        self.nodes.get(id).and_then(|n| n.get(name))
    }

    /// Shared handle to a field. Writes through it are propagated at the
    /// next pump (any tree write, or the next tick).
    #[must_use]
    pub fn field(&self, id: ViewId, name: &str) -> Option<Observable<Value>> {
        self.nodes.get(id).and_then(|n| n.field(name).cloned())
    }

    #[must_use]
    pub fn is_field_set(&self, id: ViewId, name: &str) -> Option<bool> {
        self.nodes
            .get(id)
            .and_then(|n| n.field(name).map(Observable::is_set))
    }

    /// Write a field, propagate its mappings and queue its handlers.
    ///
    /// Returns whether the value changed.
    pub fn set_field(
        &mut self,
        id: ViewId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<bool, TreeError> {
        self.set_field_with(id, name, value, WriteMode::Normal)
    }

    pub fn set_field_with(
        &mut self,
        id: ViewId,
        name: &str,
        value: impl Into<Value>,
        mode: WriteMode,
    ) -> Result<bool, TreeError> {
        let value = value.into();
        let (index, node) = self.field_slot(id, name)?;
        let kind = node.view_type.fields()[index].kind;
        if !(value.kind() == Some(kind) || (value.is_empty() && kind == ValueKind::Object)) {
            return Err(TreeError::KindMismatch {
                field: name.to_owned(),
                expected: kind,
                actual: value.kind().map_or("empty", |k| k.name()),
            });
        }
        self.pump();
        let changed = self.write_field(id, index, value, 0, mode == WriteMode::Normal);
        self.pump();
        Ok(changed)
    }

    /// Write a field from its markup string form.
    pub fn set_field_str(&mut self, id: ViewId, name: &str, raw: &str) -> Result<bool, TreeError> {
        let (index, node) = self.field_slot(id, name)?;
        let desc = &node.view_type.fields()[index];
        let value = self
            .ctx
            .converters
            .convert(desc.kind, desc.converter.as_deref(), raw)
            .map_err(|source| TreeError::Conversion {
                field: name.to_owned(),
                source,
            })?;
        self.set_field(id, name, value)
    }

    /// Typed read.
    #[must_use]
    pub fn get<T: FieldValue>(&self, id: ViewId, key: FieldKey<T>) -> Option<T> {
        self.get_field(id, key.name())
            .and_then(|v| T::from_value(&v))
    }

    /// Typed write.
    pub fn set<T: FieldValue>(
        &mut self,
        id: ViewId,
        key: FieldKey<T>,
        value: T,
    ) -> Result<bool, TreeError> {
        self.set_field(id, key.name(), value.into_value())
    }

    /// Keep `model` and the view field in sync for the view's lifetime.
    pub fn bind_field<T>(
        &mut self,
        id: ViewId,
        name: &str,
        model: &Observable<T>,
    ) -> Result<(), TreeError>
    where
        T: FieldValue + Clone + PartialEq + 'static,
    {
        let (index, node) = self.field_slot(id, name)?;
        let expected = node.view_type.fields()[index].kind;
        if expected != T::KIND {
            return Err(TreeError::KindMismatch {
                field: name.to_owned(),
                expected,
                actual: T::KIND.name(),
            });
        }
        let field = node.fields[index].clone();
        let link = TwoWayBinding::field(model, &field);
        if let Some(scope) = self.scope_mut(id) {
            scope.hold_link(link);
        }
        self.pump();
        Ok(())
    }

    /// Set `IsSelected` (when declared) and run the type's selection hook.
    pub fn set_selected(&mut self, id: ViewId, selected: bool) -> Result<(), TreeError> {
        let node = self.nodes.get(id).ok_or(TreeError::UnknownView(id))?;
        let hook = node.view_type.selectable();
        if node.view_type.field_index("IsSelected").is_some() {
            self.set_field(id, "IsSelected", selected)?;
        }
        if let Some(hook) = hook {
            hook.selection_changed(self, id, selected);
        }
        Ok(())
    }

    fn write_field(
        &self,
        id: ViewId,
        index: usize,
        value: Value,
        depth: usize,
        queue_handlers: bool,
    ) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        let field = node.fields[index].clone();
        self.pending.borrow_mut().origin = Origin {
            depth,
            queue_handlers,
        };
        let changed = field.set(value);
        self.pending.borrow_mut().origin = Origin::default();
        changed
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    /// Drain recorded field writes.
    pub fn pump(&mut self) {
        loop {
            let next = self.pending.borrow_mut().writes.pop_front();
            let Some(write) = next else {
                break;
            };
            self.propagate(write);
        }
    }

    fn propagate(&mut self, write: FieldWrite) {
        let max_depth = self.ctx.config.max_propagation_depth;
        let Some(node) = self.nodes.get_mut(write.view) else {
            return;
        };
        let view_type = Rc::clone(&node.view_type);
        let desc = &view_type.fields()[write.field];

        if write.queue_handlers {
            for handler in &desc.change_handlers {
                node.handlers.queue(handler);
            }
        }
        if desc.affects_layout {
            node.flags.insert(ViewFlags::LAYOUT_DIRTY);
        }
        if desc.map_to.is_empty() {
            return;
        }
        if write.depth >= max_depth {
            tracing::error!(
                view = ?write.view,
                view_name = %node.name,
                field = %desc.name,
                depth = write.depth,
                "field mapping depth limit reached; propagation stopped"
            );
            return;
        }

        let value = node.fields[write.field].get();
        for path in &desc.map_to {
            let Some(target) = self.resolve_path(write.view, path) else {
                tracing::debug!(view = ?write.view, field = %desc.name, target = %path, "mapping target child missing");
                continue;
            };
            let target_type = Rc::clone(&self.nodes[target].view_type);
            let Some(index) = target_type.field_index(path.field()) else {
                tracing::debug!(view = ?write.view, field = %desc.name, target = %path, "mapping target field missing");
                continue;
            };
            let kind = target_type.fields()[index].kind;
            if !(value.is_empty() || value.kind() == Some(kind)) {
                tracing::debug!(view = ?write.view, field = %desc.name, target = %path, "mapping target has another kind");
                continue;
            }
            self.write_field(
                target,
                index,
                value.clone(),
                write.depth + 1,
                write.queue_handlers,
            );
        }
    }

    // -----------------------------------------------------------------------
    // Handlers and ticks
    // -----------------------------------------------------------------------

    /// Queue a handler by name on a view.
    pub fn queue_handler(&mut self, id: ViewId, name: &str) -> Result<bool, TreeError> {
        let node = self.nodes.get_mut(id).ok_or(TreeError::UnknownView(id))?;
        Ok(node.handlers.queue(&Rc::from(name)))
    }

    /// Run the view's queued handlers in first-queued order.
    pub fn flush(&mut self, id: ViewId) -> FlushReport {
        let mut report = FlushReport::default();
        let max = self.ctx.config.max_handlers_per_flush.max(1);
        let log_errors = self.ctx.config.log_handler_errors;
        let Some(node) = self.nodes.get_mut(id) else {
            return report;
        };
        if node.handlers.is_empty() {
            return report;
        }
        let view_type = Rc::clone(&node.view_type);
        let view_name = Rc::clone(&node.name);
        let mut batch = node.handlers.begin_flush();
        if batch.len() > max {
            let deferred = batch.split_off(max);
            report.deferred = deferred.len();
            for name in &deferred {
                node.handlers.queue(name);
            }
            tracing::warn!(
                view = ?id,
                view_name = %view_name,
                deferred = report.deferred,
                "handler budget exhausted; remaining handlers deferred"
            );
        }

        let _span = tracing::debug_span!("flush", view = ?id, view_name = %view_name, handlers = batch.len())
            .entered();
        for name in batch {
            if !self.nodes.contains_key(id) {
                break;
            }
            let Some(handler) = view_type.handler(&name) else {
                tracing::error!(view = ?id, view_name = %view_name, handler = %name, "unknown change handler skipped");
                report.unknown += 1;
                continue;
            };
            report.ran += 1;
            if let Err(err) = handler(self, id) {
                report.failed += 1;
                if log_errors {
                    tracing::error!(
                        view = ?id,
                        view_name = %view_name,
                        handler = %name,
                        error = %err,
                        "change handler failed"
                    );
                }
            }
            self.pump();
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.handlers.end_flush();
        }
        report
    }

    /// One update cycle: pump, flush every live view once in pre-order,
    /// then notify layout hooks of views whose layout fields changed.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.pump();

        for id in self.preorder(TraversalMode::SkipTemplates) {
            let queued = self.nodes.get(id).is_some_and(|n| !n.handlers.is_empty());
            if queued {
                let flushed = self.flush(id);
                report.views_flushed += 1;
                report.handlers_run += flushed.ran;
                report.handler_failures += flushed.failed;
            }
        }
        self.pump();

        for id in self.preorder(TraversalMode::SkipTemplates) {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if !node.flags.contains(ViewFlags::LAYOUT_DIRTY) {
                continue;
            }
            node.flags.remove(ViewFlags::LAYOUT_DIRTY);
            report.layout_changed += 1;
            let hook = node.view_type.layout();
            if let Some(hook) = hook {
                hook.layout_changed(self, id);
            }
        }
        report
    }
}

impl Animatable for ViewTree {
    fn is_alive(&self, view: ViewId) -> bool {
        self.contains(view)
    }

    fn current_value(&self, view: ViewId, field: &str) -> Option<Value> {
        self.get_field(view, field)
    }

    fn write_animated(
        &mut self,
        view: ViewId,
        field: &str,
        value: Value,
    ) -> Result<bool, TreeError> {
        self.set_field_with(view, field, value, WriteMode::Animated)
    }
}

impl fmt::Debug for ViewTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTree")
            .field("views", &self.nodes.len())
            .field("roots", &self.roots)
            .field("config", &self.ctx.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::registry::{FieldSpec, RegistryBuilder, ViewTypeBuilder};
    use mbind_core::Length;
    use std::cell::Cell;
    use tracing_test::traced_test;

    const NO_ATTRS: [(&str, &str); 0] = [];

    fn tree_with(types: impl IntoIterator<Item = ViewTypeBuilder>) -> ViewTree {
        let mut b = RegistryBuilder::new();
        for t in types {
            b.register(t);
        }
        ViewTree::new(UiContext::new(b.try_build().unwrap()))
    }

    fn region() -> ViewTypeBuilder {
        ViewTypeBuilder::new("Region")
            .field(FieldSpec::new("Width", ValueKind::Length).affects_layout())
            .field(FieldSpec::new("Margin", ValueKind::Length))
            .field(FieldSpec::new("Alpha", ValueKind::Float).default_value(1.0))
    }

    #[test]
    fn markup_values_are_converted_and_set() {
        let mut tree = tree_with([region()]);
        let report = tree
            .create_view("Region", None, Some("r"), [("Width", "50%"), ("Alpha", "0.5")])
            .unwrap();
        assert!(report.is_clean());
        let r = report.view;
        assert_eq!(tree.get_field(r, "Width"), Some(Value::Length(Length::Percent(50.0))));
        assert_eq!(tree.is_field_set(r, "Width"), Some(true));
        assert_eq!(tree.is_field_set(r, "Margin"), Some(false));
        assert_eq!(tree.node(r).unwrap().state(), LifecycleState::Initialized);
    }

    #[traced_test]
    #[test]
    fn bad_markup_is_reported_not_fatal() {
        let mut tree = tree_with([region()]);
        let report = tree
            .create_view("Region", None, None, [("Width", "wide"), ("Nope", "1"), ("Alpha", "0.25")])
            .unwrap();
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0], FieldInitError::Conversion { .. }));
        assert!(matches!(report.failures[1], FieldInitError::UnknownField { .. }));
        assert_eq!(tree.get_field(report.view, "Alpha"), Some(Value::Float(0.25)));
        assert_eq!(tree.get_field(report.view, "Width"), Some(Value::Length(Length::Auto)));
        assert!(logs_contain("markup value rejected"));
    }

    #[test]
    fn unknown_type_and_parent() {
        let mut tree = tree_with([region()]);
        assert_eq!(
            tree.create_view("Nope", None, None, NO_ATTRS),
            Err(TreeError::UnknownType("Nope".into()))
        );
        let r = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        assert!(tree.destroy(r));
        assert_eq!(
            tree.create_view("Region", Some(r), None, NO_ATTRS),
            Err(TreeError::UnknownView(r))
        );
    }

    #[test]
    fn mapping_fans_out_to_components() {
        let panel = ViewTypeBuilder::new("Panel")
            .component("Mask", "Region")
            .component("Frame", "Region")
            .field(
                FieldSpec::new("Margin", ValueKind::Length)
                    .map_to("Mask.Margin")
                    .map_to("Frame.Width"),
            );
        let mut tree = tree_with([region(), panel]);
        let p = tree
            .create_view("Panel", None, None, [("Margin", "4")])
            .unwrap()
            .view;
        let mask = tree.find_child_by_name(p, "Mask", TraversalMode::SkipTemplates).unwrap();
        let frame = tree.find_child_by_name(p, "Frame", TraversalMode::SkipTemplates).unwrap();
        let four = Value::Length(Length::Pixels(4.0));
        assert_eq!(tree.get_field(mask, "Margin"), Some(four.clone()));
        assert_eq!(tree.get_field(frame, "Width"), Some(four));

        tree.set_field(p, "Margin", Length::Pixels(9.0)).unwrap();
        assert_eq!(tree.get_field(mask, "Margin"), Some(Value::Length(Length::Pixels(9.0))));
        assert_eq!(tree.is_field_set(mask, "Margin"), Some(true));
    }

    #[test]
    fn markup_child_receives_parent_mapping() {
        let header = ViewTypeBuilder::new("Header").field(FieldSpec::new("Text", ValueKind::Text));
        let card = ViewTypeBuilder::new("Card")
            .field(FieldSpec::new("Title", ValueKind::Text).map_to("Header.Text"));
        let mut tree = tree_with([header, card]);
        let c = tree.create_view("Card", None, None, [("Title", "Hello")]).unwrap().view;
        let h = tree
            .create_view("Header", Some(c), Some("Header"), NO_ATTRS)
            .unwrap()
            .view;
        assert_eq!(tree.get_field(h, "Text"), Some(Value::from("Hello")));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut tree = tree_with([region()]);
        let r = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        assert!(matches!(
            tree.set_field(r, "Width", 3),
            Err(TreeError::KindMismatch { actual: "int", .. })
        ));
        assert!(matches!(
            tree.set_field(r, "Height", Length::Auto),
            Err(TreeError::UnknownField { .. })
        ));
        assert_eq!(tree.set_field_str(r, "Width", "12px"), Ok(true));
        assert!(matches!(
            tree.set_field_str(r, "Width", "big"),
            Err(TreeError::Conversion { .. })
        ));
    }

    #[test]
    fn typed_keys() {
        const WIDTH: FieldKey<Length> = FieldKey::new("Width");
        const ALPHA: FieldKey<f64> = FieldKey::new("Alpha");
        let mut tree = tree_with([region()]);
        let r = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        assert_eq!(tree.get(r, ALPHA), Some(1.0));
        assert_eq!(tree.set(r, WIDTH, Length::Percent(10.0)), Ok(true));
        assert_eq!(tree.get(r, WIDTH), Some(Length::Percent(10.0)));
    }

    #[test]
    fn handlers_run_once_per_tick_in_queue_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (Rc::clone(&log), Rc::clone(&log));
        let counter = ViewTypeBuilder::new("Counter")
            .handler("A", move |_: &mut ViewTree, _| {
                l1.borrow_mut().push("A");
                Ok(())
            })
            .handler("B", move |_: &mut ViewTree, _| {
                l2.borrow_mut().push("B");
                Ok(())
            })
            .field(FieldSpec::new("X", ValueKind::Int).on_change("B").on_change("A"))
            .field(FieldSpec::new("Y", ValueKind::Int).on_change("A"));
        let mut tree = tree_with([counter]);
        let v = tree.create_view("Counter", None, None, [("X", "1")]).unwrap().view;
        assert!(tree.node(v).unwrap().pending_handlers().is_empty());

        tree.set_field(v, "X", 2).unwrap();
        tree.set_field(v, "Y", 5).unwrap();
        tree.set_field(v, "X", 3).unwrap();
        let report = tree.tick();
        assert_eq!(report.handlers_run, 2);
        assert_eq!(*log.borrow(), vec!["B", "A"]);
        assert_eq!(tree.tick().handlers_run, 0);
    }

    #[traced_test]
    #[test]
    fn failing_handler_does_not_stop_the_flush() {
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        let ty = ViewTypeBuilder::new("T")
            .handler("Bad", |_: &mut ViewTree, _| Err(HandlerError::new("boom")))
            .handler("Good", move |_: &mut ViewTree, _| {
                r.set(true);
                Ok(())
            })
            .field(FieldSpec::new("X", ValueKind::Int).on_change("Bad").on_change("Good"));
        let mut tree = tree_with([ty]);
        let v = tree.create_view("T", None, Some("victim"), NO_ATTRS).unwrap().view;
        tree.set_field(v, "X", 1).unwrap();
        let report = tree.tick();
        assert_eq!(report.handler_failures, 1);
        assert!(ran.get());
        assert!(logs_contain("change handler failed"));
        assert!(logs_contain("victim"));
        assert!(logs_contain("boom"));
    }

    #[traced_test]
    #[test]
    fn depth_limit_stops_runaway_chains() {
        let link = ViewTypeBuilder::new("Link")
            .field(FieldSpec::new("V", ValueKind::Int).map_to("Next.V"));
        let mut b = RegistryBuilder::new();
        b.register(link);
        let ctx = UiContext::new(b.try_build().unwrap())
            .with_config(RuntimeConfig::default().with_max_propagation_depth(2));
        let mut tree = ViewTree::new(ctx);

        let mut chain = vec![tree.create_view("Link", None, None, NO_ATTRS).unwrap().view];
        for _ in 0..4 {
            let parent = *chain.last().unwrap();
            chain.push(
                tree.create_view("Link", Some(parent), Some("Next"), NO_ATTRS)
                    .unwrap()
                    .view,
            );
        }
        tree.set_field(chain[0], "V", 7).unwrap();
        let values: Vec<Option<Value>> = chain.iter().map(|&v| tree.get_field(v, "V")).collect();
        assert_eq!(
            values,
            vec![
                Some(Value::Int(7)),
                Some(Value::Int(7)),
                Some(Value::Int(7)),
                Some(Value::Int(0)),
                Some(Value::Int(0)),
            ]
        );
        assert!(logs_contain("field mapping depth limit reached"));
    }

    #[traced_test]
    #[test]
    fn destroy_is_recursive_and_once() {
        let mut tree = tree_with([region()]);
        let root = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        let child = tree.create_view("Region", Some(root), None, NO_ATTRS).unwrap().view;
        let handle = tree.field(child, "Margin").unwrap();

        assert!(tree.destroy(root));
        assert!(!tree.contains(child));
        assert!(tree.is_empty());
        assert!(handle.is_released());
        assert!(!handle.set(Value::Length(Length::Pixels(1.0))));
        assert!(!tree.destroy(root));
        assert!(logs_contain("already destroyed"));
    }

    #[test]
    fn activation_is_recursive_and_reaches_new_children() {
        let mut tree = tree_with([region()]);
        let root = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        let a = tree.create_view("Region", Some(root), None, NO_ATTRS).unwrap().view;
        tree.activate(root).unwrap();
        assert!(tree.is_active(a));

        let b = tree.create_view("Region", Some(root), None, NO_ATTRS).unwrap().view;
        assert!(tree.is_active(b));

        tree.set_field(a, "Margin", Length::Pixels(3.0)).unwrap();
        tree.deactivate(root).unwrap();
        assert!(!tree.is_active(a));
        assert_eq!(tree.node(a).unwrap().state(), LifecycleState::Inactive);
        assert_eq!(tree.get_field(a, "Margin"), Some(Value::Length(Length::Pixels(3.0))));
    }

    #[test]
    fn traversal_skips_templates_unless_asked() {
        let mut tree = tree_with([region(), ViewTypeBuilder::new("Label")]);
        let root = tree.create_view("Region", None, Some("root"), NO_ATTRS).unwrap().view;
        let tpl = tree.create_view("Label", Some(root), Some("Tpl"), NO_ATTRS).unwrap().view;
        let inner = tree.create_view("Region", Some(tpl), Some("Inner"), NO_ATTRS).unwrap().view;
        let label = tree.create_view("Label", Some(root), Some("Text"), NO_ATTRS).unwrap().view;
        tree.mark_template(tpl).unwrap();

        assert_eq!(tree.children(root, TraversalMode::SkipTemplates), vec![label]);
        assert_eq!(
            tree.descendants(root, TraversalMode::IncludeTemplates),
            vec![tpl, inner, label]
        );
        assert_eq!(tree.find_child_by_name(root, "Tpl", TraversalMode::SkipTemplates), None);
        assert_eq!(tree.find_ancestor_of_type(inner, "Region"), Some(root));
        assert_eq!(tree.find_ancestor(label, |n| n.name() == "root"), Some(root));

        let mut labels = Vec::new();
        tree.for_each_descendant_of_type(root, "Label", TraversalMode::SkipTemplates, |v| {
            labels.push(v);
        });
        assert_eq!(labels, vec![label]);
        assert_eq!(
            tree.find_descendant(root, TraversalMode::IncludeTemplates, |n| n.name() == "Inner"),
            Some(inner)
        );
        assert_eq!(tree.preorder(TraversalMode::SkipTemplates), vec![root, label]);
    }

    #[test]
    fn instantiate_clones_values_and_set_flags() {
        let item = ViewTypeBuilder::new("Item")
            .field(FieldSpec::new("Text", ValueKind::Text).map_to("Caption.Text"))
            .field(FieldSpec::new("Count", ValueKind::Int));
        let caption = ViewTypeBuilder::new("Caption").field(FieldSpec::new("Text", ValueKind::Text));
        let mut tree = tree_with([item, caption]);
        let root = tree.create_view("Item", None, Some("root"), NO_ATTRS).unwrap().view;
        let tpl = tree
            .create_view("Item", Some(root), Some("Row"), [("Text", "hi")])
            .unwrap()
            .view;
        let _caption = tree.create_view("Caption", Some(tpl), Some("Caption"), NO_ATTRS).unwrap();
        tree.mark_template(tpl).unwrap();
        tree.activate(root).unwrap();
        assert!(!tree.is_active(tpl));

        assert_eq!(tree.instantiate(root, root, 0), Err(TreeError::NotATemplate(root)));
        let copy = tree.instantiate(tpl, root, 5).unwrap();
        let node = tree.node(copy).unwrap();
        assert!(!node.is_template());
        assert!(node.is_active());
        assert_ne!(node.name(), "Row");
        assert_eq!(tree.is_field_set(copy, "Text"), Some(true));
        assert_eq!(tree.is_field_set(copy, "Count"), Some(false));
        assert_eq!(tree.child_position(root, copy), Some(1));

        let cap = tree.find_child_by_name(copy, "Caption", TraversalMode::SkipTemplates).unwrap();
        assert_eq!(tree.get_field(cap, "Text"), Some(Value::from("hi")));
        tree.set_field(copy, "Text", "bye").unwrap();
        assert_eq!(tree.get_field(cap, "Text"), Some(Value::from("bye")));
        let tpl_caption = tree.find_child_by_name(tpl, "Caption", TraversalMode::SkipTemplates).unwrap();
        assert_eq!(tree.get_field(tpl_caption, "Text"), Some(Value::from("hi")));
    }

    #[test]
    fn direct_handle_writes_propagate_on_tick() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let ty = ViewTypeBuilder::new("T")
            .handler("Changed", move |_: &mut ViewTree, _| {
                h.set(h.get() + 1);
                Ok(())
            })
            .field(FieldSpec::new("A", ValueKind::Int).map_to("B").on_change("Changed"))
            .field(FieldSpec::new("B", ValueKind::Int));
        let mut tree = tree_with([ty]);
        let v = tree.create_view("T", None, None, NO_ATTRS).unwrap().view;
        let a = tree.field(v, "A").unwrap();
        a.set(Value::Int(4));
        assert_eq!(tree.get_field(v, "B"), Some(Value::Int(0)));
        tree.tick();
        assert_eq!(tree.get_field(v, "B"), Some(Value::Int(4)));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn bound_model_follows_field() {
        let mut tree = tree_with([region()]);
        let v = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        let model = Observable::new(Length::Percent(25.0));
        tree.bind_field(v, "Width", &model).unwrap();
        assert_eq!(tree.get_field(v, "Width"), Some(Value::Length(Length::Percent(25.0))));

        tree.set_field(v, "Width", Length::Pixels(2.0)).unwrap();
        assert_eq!(model.get(), Length::Pixels(2.0));
        assert!(tree.bind_field(v, "Alpha", &model).is_err());

        tree.destroy(v);
        model.set(Length::Auto);
        assert_eq!(model.get(), Length::Auto);
    }

    #[test]
    fn layout_hook_runs_for_dirty_views() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let c = Rc::clone(&calls);
        let ty = region().layout(move |_: &mut ViewTree, v: ViewId| c.borrow_mut().push(v));
        let mut tree = tree_with([ty]);
        let v = tree.create_view("Region", None, None, NO_ATTRS).unwrap().view;
        tree.set_field(v, "Margin", Length::Pixels(1.0)).unwrap();
        assert_eq!(tree.tick().layout_changed, 0);
        tree.set_field(v, "Width", Length::Pixels(1.0)).unwrap();
        assert_eq!(tree.tick().layout_changed, 1);
        assert_eq!(*calls.borrow(), vec![v]);
        assert!(!tree.node(v).unwrap().flags().contains(ViewFlags::LAYOUT_DIRTY));
    }

    #[traced_test]
    #[test]
    fn handler_budget_defers_the_rest() {
        let ty = ViewTypeBuilder::new("T")
            .handler("A", |_: &mut ViewTree, _| Ok(()))
            .handler("B", |_: &mut ViewTree, _| Ok(()))
            .field(FieldSpec::new("X", ValueKind::Int).on_change("A").on_change("B"));
        let mut b = RegistryBuilder::new();
        b.register(ty);
        let ctx = UiContext::new(b.try_build().unwrap())
            .with_config(RuntimeConfig::default().with_max_handlers_per_flush(1));
        let mut tree = ViewTree::new(ctx);
        let v = tree.create_view("T", None, None, NO_ATTRS).unwrap().view;
        tree.set_field(v, "X", 1).unwrap();
        assert_eq!(tree.tick().handlers_run, 1);
        assert_eq!(tree.tick().handlers_run, 1);
        assert_eq!(tree.tick().handlers_run, 0);
        assert!(logs_contain("handler budget exhausted"));
    }
}
