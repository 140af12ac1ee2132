//! The definition side of spec.md §4.B: placed, decoded value instances
//! bound to a scope path, plus the qualified-name lookups variants and
//! sequences need.
//!
//! Per the cyclic-reference design note in spec.md §9, scopes are arena
//! allocated: a [`Scope`] owns every [`Definition`] produced while decoding
//! one packet, and definitions refer to each other by [`ScopeId`] index, not
//! by pointer. This makes the whole arena trivially droppable and keeps the
//! decode path free of `Rc`/`RefCell`.

use fxhash::FxHashMap;
use internment::Intern;

/// The six root scopes a field reference (spec.md §4.B/§4.C) may resolve
/// against, besides an immediate struct sibling. See `DESIGN.md` #4.
pub const ROOT_SCOPE_NAMES: [&str; 6] = [
    "trace.packet.header",
    "stream.packet.context",
    "stream.event.header",
    "stream.event.context",
    "event.context",
    "event.fields",
];

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ScopeId(u32);

#[derive(Clone, Debug)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    Str(String),
    Enum(i64, Option<Intern<String>>),
    Struct(Vec<(Intern<String>, ScopeId)>),
    Variant {
        arm: Intern<String>,
        child: ScopeId,
    },
    Array(Vec<ScopeId>),
    Sequence(Vec<ScopeId>),
    /// Placeholder used between `reserve` and `fill` for compound values.
    Unset,
}

#[derive(Debug)]
struct Node {
    parent: Option<ScopeId>,
    name: Intern<String>,
    depth: u32,
    field_index: u32,
    qualified_name: Intern<String>,
    value: Value,
}

/// Arena of placed definitions produced while decoding one packet.
#[derive(Debug, Default)]
pub struct Scope {
    nodes: Vec<Node>,
    roots: FxHashMap<&'static str, ScopeId>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// `definition_new(parent_scope, index, depth, fully_qualified_name)`
    /// (spec.md §4.B): reserves a node with a placeholder value so compound
    /// children can be decoded with a valid parent id before the compound's
    /// own value is known; call [`Scope::fill`] once it is.
    pub fn reserve(&mut self, parent: Option<ScopeId>, field_index: u32, name: &str) -> ScopeId {
        let depth = parent.map(|p| self.nodes[p.0 as usize].depth + 1).unwrap_or(0);
        let qualified_name = match parent {
            Some(p) => format!("{}.{}", self.nodes[p.0 as usize].qualified_name, name),
            None => name.to_owned(),
        };
        let id = ScopeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent,
            name: Intern::new(name.to_owned()),
            depth,
            field_index,
            qualified_name: Intern::new(qualified_name),
            value: Value::Unset,
        });
        id
    }

    pub fn fill(&mut self, id: ScopeId, value: Value) {
        self.nodes[id.0 as usize].value = value;
    }

    /// Convenience for leaf fields: reserve then immediately fill.
    pub fn push(&mut self, parent: Option<ScopeId>, field_index: u32, name: &str, value: Value) -> ScopeId {
        let id = self.reserve(parent, field_index, name);
        self.fill(id, value);
        id
    }

    pub fn register_root(&mut self, root_name: &'static str, id: ScopeId) {
        self.roots.insert(root_name, id);
    }

    pub fn root(&self, root_name: &str) -> Option<ScopeId> {
        self.roots.get(root_name).copied()
    }

    pub fn value(&self, id: ScopeId) -> &Value {
        &self.nodes[id.0 as usize].value
    }

    pub fn name(&self, id: ScopeId) -> Intern<String> {
        self.nodes[id.0 as usize].name
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.nodes[id.0 as usize].parent
    }

    pub fn qualified_name(&self, id: ScopeId) -> Intern<String> {
        self.nodes[id.0 as usize].qualified_name
    }

    pub fn depth(&self, id: ScopeId) -> u32 {
        self.nodes[id.0 as usize].depth
    }

    /// Find a named child of a struct (or, transparently, the selected arm
    /// of a variant) bound at `parent`.
    pub fn find_child(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        match self.value(parent) {
            Value::Struct(fields) => fields
                .iter()
                .find(|(n, _)| n.as_str() == name)
                .map(|(_, id)| *id),
            Value::Variant { child, .. } => self.find_child(*child, name),
            _ => None,
        }
    }

    pub fn lookup_integer(&self, parent: ScopeId, name: &str) -> Option<i64> {
        self.get_signed_int(self.find_child(parent, name)?)
    }

    pub fn lookup_enum(&self, parent: ScopeId, name: &str) -> Option<(i64, Option<Intern<String>>)> {
        match self.value(self.find_child(parent, name)?) {
            Value::Enum(v, label) => Some((*v, *label)),
            _ => None,
        }
    }

    pub fn lookup_variant(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        let id = self.find_child(parent, name)?;
        matches!(self.value(id), Value::Variant { .. }).then_some(id)
    }

    pub fn struct_definition_get_field_from_index(&self, parent: ScopeId, index: usize) -> Option<ScopeId> {
        match self.value(parent) {
            Value::Struct(fields) => fields.get(index).map(|(_, id)| *id),
            _ => None,
        }
    }

    pub fn array_len(&self, id: ScopeId) -> Option<usize> {
        match self.value(id) {
            Value::Array(v) | Value::Sequence(v) => Some(v.len()),
            _ => None,
        }
    }

    pub fn array_index(&self, id: ScopeId, i: usize) -> Option<ScopeId> {
        match self.value(id) {
            Value::Array(v) | Value::Sequence(v) => v.get(i).copied(),
            _ => None,
        }
    }

    pub fn get_unsigned_int(&self, id: ScopeId) -> Option<u64> {
        match self.value(id) {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => Some(*v as u64),
            Value::Enum(v, _) => Some(*v as u64),
            _ => None,
        }
    }

    pub fn get_signed_int(&self, id: ScopeId) -> Option<i64> {
        match self.value(id) {
            Value::UInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v),
            Value::Enum(v, _) => Some(*v),
            _ => None,
        }
    }

    /// Resolves a [`crate::decl::FieldRef`] against the current struct scope
    /// (`current`) and the set of registered root scopes, per the scoping
    /// decision in `DESIGN.md` #4.
    pub fn resolve_ref(&self, current: ScopeId, field_ref: &crate::decl::FieldRef) -> Option<ScopeId> {
        if let Some((root, rest)) = field_ref.root_and_rest() {
            let mut id = self.root(root)?;
            for segment in rest.split('.') {
                id = self.find_child(id, segment)?;
            }
            Some(id)
        } else {
            self.find_child(current, &field_ref.0)
        }
    }
}

/// A non-owning, ergonomic view of one placed definition, bound to its
/// scope path (spec.md §4.B). Thin wrapper over [`Scope`] lookups.
#[derive(Copy, Clone)]
pub struct Definition<'s> {
    pub scope: &'s Scope,
    pub id: ScopeId,
}

impl<'s> Definition<'s> {
    pub fn new(scope: &'s Scope, id: ScopeId) -> Self {
        Self { scope, id }
    }

    pub fn qualified_name(&self) -> Intern<String> {
        self.scope.qualified_name(self.id)
    }

    pub fn lookup_integer(&self, name: &str) -> Option<i64> {
        self.scope.lookup_integer(self.id, name)
    }

    pub fn lookup_enum(&self, name: &str) -> Option<(i64, Option<Intern<String>>)> {
        self.scope.lookup_enum(self.id, name)
    }

    pub fn lookup_variant(&self, name: &str) -> Option<Definition<'s>> {
        self.scope
            .lookup_variant(self.id, name)
            .map(|id| Definition::new(self.scope, id))
    }

    pub fn array_len(&self) -> Option<usize> {
        self.scope.array_len(self.id)
    }

    pub fn array_index(&self, i: usize) -> Option<Definition<'s>> {
        self.scope
            .array_index(self.id, i)
            .map(|id| Definition::new(self.scope, id))
    }

    pub fn get_unsigned_int(&self) -> Option<u64> {
        self.scope.get_unsigned_int(self.id)
    }
}
