#![forbid(unsafe_code)]

//! Static view-type registry.
//!
//! Every view type declares its fields up front: kind, default, optional
//! converter, field mappings (`MapTo`), change handlers and whether a change
//! affects layout. Types may also declare child components that are built
//! with every instance, which lets mapping paths like `"Mask.Margin"` be
//! checked before any view exists.
//!
//! The registry is validated once by [`RegistryBuilder::build`] and shared
//! immutably (`Rc<TypeRegistry>`) by every view afterwards.
//!
//! # Invariants
//!
//! 1. Field mappings never form a cycle among statically resolvable
//!    `(type, field)` pairs.
//! 2. A component never contains its own type, directly or transitively.
//! 3. Every change handler a field names exists on its type.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Bad entry | duplicate type/field, unknown component, unknown handler | [`RegistryError`], entry dropped |
//! | Mapping cycle | `A -> B -> A` | [`RegistryError::CyclicMapping`], the closing mapping dropped |
//! | Unresolved target | target path names a missing field of a component | [`RegistryError::UnresolvedMapping`], mapping dropped |
//!
//! Targets whose first segment is not a declared component are resolved at
//! runtime against markup children; missing ones are skipped then.

use core::fmt;
use core::marker::PhantomData;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use mbind_core::{FieldValue, Value, ValueKind};

use crate::capability::{Layoutable, Selectable};
use crate::error::{HandlerError, RegistryError};
use crate::id::ViewId;
use crate::tree::ViewTree;

/// A change handler: runs at flush time with mutable access to the tree.
pub type HandlerFn = Rc<dyn Fn(&mut ViewTree, ViewId) -> Result<(), HandlerError>>;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Dot-separated mapping target: child names followed by a field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Rc<str>>,
    field: Rc<str>,
}

impl FieldPath {
    /// Parse `"Field"` or `"Child.Grandchild.Field"`. Empty segments are rejected.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut parts: Vec<Rc<str>> = Vec::new();
        for part in path.split('.') {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            parts.push(Rc::from(part));
        }
        let field = parts.pop()?;
        Some(Self {
            segments: parts,
            field,
        })
    }

    /// Child names to walk, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[Rc<str>] {
        &self.segments
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Whether the target is a field of the same view.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            write!(f, "{seg}.")?;
        }
        f.write_str(&self.field)
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: Rc<str>,
    pub kind: ValueKind,
    pub default: Value,
    /// Named converter for markup strings; `None` uses the kind's built-in one.
    pub converter: Option<Rc<str>>,
    pub map_to: Vec<FieldPath>,
    pub change_handlers: Vec<Rc<str>>,
    pub affects_layout: bool,
}

/// A child view constructed with every instance of its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub name: Rc<str>,
    pub view_type: Rc<str>,
}

/// A validated view type.
pub struct ViewType {
    name: Rc<str>,
    fields: Vec<FieldDescriptor>,
    field_index: AHashMap<Rc<str>, usize>,
    components: Vec<ComponentDescriptor>,
    handlers: AHashMap<Rc<str>, HandlerFn>,
    layout: Option<Rc<dyn Layoutable>>,
    selectable: Option<Rc<dyn Selectable>>,
}

impl ViewType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_index.get(name).copied()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    #[must_use]
    pub fn components(&self) -> &[ComponentDescriptor] {
        &self.components
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<HandlerFn> {
        self.handlers.get(name).cloned()
    }

    #[must_use]
    pub fn layout(&self) -> Option<Rc<dyn Layoutable>> {
        self.layout.clone()
    }

    #[must_use]
    pub fn selectable(&self) -> Option<Rc<dyn Selectable>> {
        self.selectable.clone()
    }
}

impl fmt::Debug for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("ViewType")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("components", &self.components)
            .field("handlers", &handlers)
            .finish_non_exhaustive()
    }
}

/// Typed name of a field, for reads and writes without matching on [`Value`].
///
/// ```ignore
/// const WIDTH: FieldKey<Length> = FieldKey::new("Width");
/// tree.set(view, WIDTH, Length::Percent(50.0))?;
/// ```
pub struct FieldKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FieldValue> FieldKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for FieldKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldKey<T> {}

impl<T> fmt::Debug for FieldKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldKey({:?})", self.name)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Declaration of one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: Rc<str>,
    kind: ValueKind,
    default: Option<Value>,
    converter: Option<Rc<str>>,
    targets: Vec<String>,
    change_handlers: Vec<Rc<str>>,
    affects_layout: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: Rc::from(name),
            kind,
            default: None,
            converter: None,
            targets: Vec::new(),
            change_handlers: Vec::new(),
            affects_layout: false,
        }
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn converter(mut self, name: &str) -> Self {
        self.converter = Some(Rc::from(name));
        self
    }

    /// Propagate this field's value to `target` (`"Field"` or `"Child.Field"`).
    #[must_use]
    pub fn map_to(mut self, target: &str) -> Self {
        self.targets.push(target.to_owned());
        self
    }

    /// Queue `handler` on the owning view whenever this field changes.
    #[must_use]
    pub fn on_change(mut self, handler: &str) -> Self {
        self.change_handlers.push(Rc::from(handler));
        self
    }

    #[must_use]
    pub fn affects_layout(mut self) -> Self {
        self.affects_layout = true;
        self
    }
}

/// Declaration of one view type.
pub struct ViewTypeBuilder {
    name: Rc<str>,
    fields: Vec<FieldSpec>,
    components: Vec<ComponentDescriptor>,
    handlers: Vec<(Rc<str>, HandlerFn)>,
    layout: Option<Rc<dyn Layoutable>>,
    selectable: Option<Rc<dyn Selectable>>,
}

impl ViewTypeBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            fields: Vec::new(),
            components: Vec::new(),
            handlers: Vec::new(),
            layout: None,
            selectable: None,
        }
    }

    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Declare a child component named `name` of type `view_type`.
    #[must_use]
    pub fn component(mut self, name: &str, view_type: &str) -> Self {
        self.components.push(ComponentDescriptor {
            name: Rc::from(name),
            view_type: Rc::from(view_type),
        });
        self
    }

    #[must_use]
    pub fn handler(
        mut self,
        name: &str,
        handler: impl Fn(&mut ViewTree, ViewId) -> Result<(), HandlerError> + 'static,
    ) -> Self {
        self.handlers.push((Rc::from(name), Rc::new(handler)));
        self
    }

    #[must_use]
    pub fn layout(mut self, hook: impl Layoutable + 'static) -> Self {
        self.layout = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn selectable(mut self, hook: impl Selectable + 'static) -> Self {
        self.selectable = Some(Rc::new(hook));
        self
    }
}

/// Collects view types and validates them into a [`TypeRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    types: Vec<ViewTypeBuilder>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, view_type: ViewTypeBuilder) -> &mut Self {
        self.types.push(view_type);
        self
    }

    /// Validate, logging and dropping every invalid entry.
    ///
    /// The errors stay available through [`TypeRegistry::diagnostics`].
    #[must_use]
    pub fn build(self) -> TypeRegistry {
        let registry = validate(self.types);
        for err in &registry.diagnostics {
            tracing::error!(error = %err, "invalid view type configuration");
        }
        registry
    }

    /// Validate, failing on the first configuration error.
    pub fn try_build(self) -> Result<TypeRegistry, RegistryError> {
        let mut registry = validate(self.types);
        if registry.diagnostics.is_empty() {
            Ok(registry)
        } else {
            Err(registry.diagnostics.swap_remove(0))
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.types.iter().map(|t| &*t.name).collect();
        f.debug_struct("RegistryBuilder")
            .field("types", &names)
            .finish()
    }
}

/// Validated, immutable set of view types.
#[derive(Default)]
pub struct TypeRegistry {
    types: AHashMap<Rc<str>, Rc<ViewType>>,
    order: Vec<Rc<str>>,
    diagnostics: Vec<RegistryError>,
}

impl TypeRegistry {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rc<ViewType>> {
        self.types.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Type names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|n| &**n)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Configuration errors found (and dropped) while building.
    #[must_use]
    pub fn diagnostics(&self) -> &[RegistryError] {
        &self.diagnostics
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.order)
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

struct Draft {
    name: Rc<str>,
    fields: Vec<FieldDescriptor>,
    targets: Vec<Vec<String>>,
    /// Per field, per mapping: statically resolved `(draft, field)` target.
    resolved: Vec<Vec<Option<(usize, usize)>>>,
    components: Vec<ComponentDescriptor>,
    handlers: AHashMap<Rc<str>, HandlerFn>,
    layout: Option<Rc<dyn Layoutable>>,
    selectable: Option<Rc<dyn Selectable>>,
}

impl Draft {
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| &*f.name == name)
    }
}

fn validate(builders: Vec<ViewTypeBuilder>) -> TypeRegistry {
    let mut errors = Vec::new();
    let mut drafts: Vec<Draft> = Vec::new();
    let mut lookup: AHashMap<Rc<str>, usize> = AHashMap::new();

    for builder in builders {
        if lookup.contains_key(&builder.name) {
            errors.push(RegistryError::DuplicateType(builder.name.to_string()));
            continue;
        }
        lookup.insert(Rc::clone(&builder.name), drafts.len());
        drafts.push(draft_fields(builder, &mut errors));
    }

    check_components(&mut drafts, &lookup, &mut errors);
    resolve_mappings(&mut drafts, &lookup, &mut errors);
    break_mapping_cycles(&mut drafts, &mut errors);

    let mut registry = TypeRegistry {
        diagnostics: errors,
        ..TypeRegistry::default()
    };
    for draft in drafts {
        let field_index = draft
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (Rc::clone(&f.name), i))
            .collect();
        registry.order.push(Rc::clone(&draft.name));
        registry.types.insert(
            Rc::clone(&draft.name),
            Rc::new(ViewType {
                name: draft.name,
                fields: draft.fields,
                field_index,
                components: draft.components,
                handlers: draft.handlers,
                layout: draft.layout,
                selectable: draft.selectable,
            }),
        );
    }
    registry
}

fn draft_fields(builder: ViewTypeBuilder, errors: &mut Vec<RegistryError>) -> Draft {
    let view_type = builder.name.to_string();
    let handlers: AHashMap<Rc<str>, HandlerFn> = builder.handlers.into_iter().collect();
    let mut seen: AHashSet<Rc<str>> = AHashSet::new();
    let mut fields = Vec::new();
    let mut targets = Vec::new();

    for spec in builder.fields {
        if !seen.insert(Rc::clone(&spec.name)) {
            errors.push(RegistryError::DuplicateField {
                view_type: view_type.clone(),
                field: spec.name.to_string(),
            });
            continue;
        }
        let default = match spec.default {
            Some(v) if v.is_empty() || v.kind() == Some(spec.kind) => v,
            Some(v) => {
                errors.push(RegistryError::KindMismatch {
                    view_type: view_type.clone(),
                    field: spec.name.to_string(),
                    expected: spec.kind,
                    actual: v.kind().unwrap_or(spec.kind),
                });
                spec.kind.zero()
            }
            None => spec.kind.zero(),
        };
        let mut change_handlers = Vec::new();
        for handler in spec.change_handlers {
            if handlers.contains_key(&handler) {
                change_handlers.push(handler);
            } else {
                errors.push(RegistryError::UnknownHandler {
                    view_type: view_type.clone(),
                    field: spec.name.to_string(),
                    handler: handler.to_string(),
                });
            }
        }
        targets.push(spec.targets);
        fields.push(FieldDescriptor {
            name: spec.name,
            kind: spec.kind,
            default,
            converter: spec.converter,
            map_to: Vec::new(),
            change_handlers,
            affects_layout: spec.affects_layout,
        });
    }

    Draft {
        name: builder.name,
        resolved: vec![Vec::new(); fields.len()],
        fields,
        targets,
        components: builder.components,
        handlers,
        layout: builder.layout,
        selectable: builder.selectable,
    }
}

fn check_components(
    drafts: &mut [Draft],
    lookup: &AHashMap<Rc<str>, usize>,
    errors: &mut Vec<RegistryError>,
) {
    for draft in drafts.iter_mut() {
        let view_type = draft.name.to_string();
        draft.components.retain(|c| {
            let known = lookup.contains_key(&c.view_type);
            if !known {
                errors.push(RegistryError::UnknownComponentType {
                    view_type: view_type.clone(),
                    component: c.name.to_string(),
                    component_type: c.view_type.to_string(),
                });
            }
            known
        });
    }

    // Drop components that close a containment cycle.
    let mut marks = vec![Mark::White; drafts.len()];
    let mut cut: Vec<(usize, usize)> = Vec::new();
    for start in 0..drafts.len() {
        if marks[start] == Mark::White {
            visit_components(start, drafts, lookup, &mut marks, &mut cut);
        }
    }
    cut.sort_unstable();
    for &(d, c) in cut.iter().rev() {
        let removed = drafts[d].components.remove(c);
        errors.push(RegistryError::ComponentCycle {
            view_type: drafts[d].name.to_string(),
            component: removed.name.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

fn visit_components(
    node: usize,
    drafts: &[Draft],
    lookup: &AHashMap<Rc<str>, usize>,
    marks: &mut [Mark],
    cut: &mut Vec<(usize, usize)>,
) {
    marks[node] = Mark::Gray;
    for (ci, component) in drafts[node].components.iter().enumerate() {
        let Some(&target) = lookup.get(&component.view_type) else {
            continue;
        };
        match marks[target] {
            Mark::Gray => cut.push((node, ci)),
            Mark::White => visit_components(target, drafts, lookup, marks, cut),
            Mark::Black => {}
        }
    }
    marks[node] = Mark::Black;
}

fn resolve_mappings(
    drafts: &mut [Draft],
    lookup: &AHashMap<Rc<str>, usize>,
    errors: &mut Vec<RegistryError>,
) {
    for d in 0..drafts.len() {
        for f in 0..drafts[d].fields.len() {
            let raw_targets = std::mem::take(&mut drafts[d].targets[f]);
            let source_kind = drafts[d].fields[f].kind;
            let mut map_to = Vec::new();
            let mut resolved = Vec::new();

            for raw in raw_targets {
                let unresolved = || RegistryError::UnresolvedMapping {
                    view_type: drafts[d].name.to_string(),
                    field: drafts[d].fields[f].name.to_string(),
                    target: raw.clone(),
                };
                let Some(path) = FieldPath::parse(&raw) else {
                    errors.push(unresolved());
                    continue;
                };
                match resolve_static(d, &path, drafts, lookup) {
                    Resolution::Dynamic => {
                        map_to.push(path);
                        resolved.push(None);
                    }
                    Resolution::Static(td) => match drafts[td].field_index(path.field()) {
                        None => errors.push(unresolved()),
                        Some(tf) if drafts[td].fields[tf].kind != source_kind => {
                            errors.push(RegistryError::KindMismatch {
                                view_type: drafts[d].name.to_string(),
                                field: path.to_string(),
                                expected: drafts[td].fields[tf].kind,
                                actual: source_kind,
                            });
                        }
                        Some(tf) => {
                            map_to.push(path);
                            resolved.push(Some((td, tf)));
                        }
                    },
                }
            }

            drafts[d].fields[f].map_to = map_to;
            drafts[d].resolved[f] = resolved;
        }
    }
}

enum Resolution {
    /// The path walks into markup children; only checked at runtime.
    Dynamic,
    /// The path ends on a view of this draft.
    Static(usize),
}

fn resolve_static(
    from: usize,
    path: &FieldPath,
    drafts: &[Draft],
    lookup: &AHashMap<Rc<str>, usize>,
) -> Resolution {
    let mut current = from;
    for segment in path.segments() {
        let next = drafts[current]
            .components
            .iter()
            .find(|c| c.name == *segment)
            .and_then(|c| lookup.get(&c.view_type).copied());
        match next {
            Some(n) => current = n,
            None => return Resolution::Dynamic,
        }
    }
    Resolution::Static(current)
}

fn break_mapping_cycles(drafts: &mut [Draft], errors: &mut Vec<RegistryError>) {
    let mut marks: AHashMap<(usize, usize), Mark> = AHashMap::new();
    let mut path = Vec::new();
    let mut cut: Vec<(usize, usize, usize, Vec<String>)> = Vec::new();

    for d in 0..drafts.len() {
        for f in 0..drafts[d].fields.len() {
            if !marks.contains_key(&(d, f)) {
                visit_mappings((d, f), drafts, &mut marks, &mut path, &mut cut);
            }
        }
    }

    // Remove cut mappings back to front so indices stay valid.
    cut.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    for (d, f, m, cycle) in cut.into_iter().rev() {
        drafts[d].fields[f].map_to.remove(m);
        drafts[d].resolved[f].remove(m);
        errors.push(RegistryError::CyclicMapping { cycle });
    }
}

fn visit_mappings(
    node: (usize, usize),
    drafts: &[Draft],
    marks: &mut AHashMap<(usize, usize), Mark>,
    path: &mut Vec<(usize, usize)>,
    cut: &mut Vec<(usize, usize, usize, Vec<String>)>,
) {
    marks.insert(node, Mark::Gray);
    path.push(node);
    for (m, target) in drafts[node.0].resolved[node.1].iter().enumerate() {
        let Some(target) = *target else { continue };
        match marks.get(&target).copied().unwrap_or(Mark::White) {
            Mark::Gray => {
                let start = path.iter().position(|n| *n == target).unwrap_or(0);
                let cycle = path[start..]
                    .iter()
                    .chain(std::iter::once(&target))
                    .map(|&(d, f)| format!("{}.{}", drafts[d].name, drafts[d].fields[f].name))
                    .collect();
                cut.push((node.0, node.1, m, cycle));
            }
            Mark::White => visit_mappings(target, drafts, marks, path, cut),
            Mark::Black => {}
        }
    }
    path.pop();
    marks.insert(node, Mark::Black);
}
