//! Graph Data Model
//!
//! In-memory representation of one MDF model: nodes, edges between them,
//! properties owned by either, and the controlled-vocabulary terms that fill
//! value sets and annotate entities.
//!
//! Entities are stored in per-kind arenas and addressed by typed ids; the
//! model keeps lookup indices by handle (nodes), triplet (edges), owner plus
//! handle (properties) and identity key (terms). Edge topology is mirrored in
//! a petgraph `DiGraph` for in/out queries.

pub mod attrs;
pub mod entity;

pub use attrs::{AttrKind, AttrValue, EntityKind, EntityRef};
pub use entity::{
    Concept, ConceptId, Edge, EdgeId, EntityId, Node, NodeId, Owner, OwnerKey, PropId, PropKey,
    Property, Tag, Tags, Term, TermId, TermIdentity, TermKey, Triplet, ValueSet, ValueSetId,
    DEFAULT_MULTIPLICITY, DEFAULT_VALUE_DOMAIN, STANDARD_MULTIPLICITIES,
};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::BTreeMap;

use crate::error::{MdfError, Result};

/// A graph data model
#[derive(Debug, Clone)]
pub struct Model {
    pub handle: String,
    pub version: Option<String>,
    pub uri: Option<String>,

    /// Fields that decide whether two terms are the same term
    term_identity: TermIdentity,

    /// Edge topology; node weights are node ids, edge weights edge ids
    graph: DiGraph<NodeId, EdgeId>,

    // ========== Arenas ==========
    node_arena: Vec<Node>,
    edge_arena: Vec<Edge>,
    prop_arena: Vec<Property>,
    term_arena: Vec<Term>,
    concept_arena: Vec<Concept>,
    value_set_arena: Vec<ValueSet>,

    // ========== Indexes ==========
    /// Index: node handle -> node
    nodes: BTreeMap<String, NodeId>,
    /// Index: (handle, src, dst) -> edge
    edges: BTreeMap<Triplet, EdgeId>,
    /// Index: (owner, handle) -> property; shared properties appear once per owner
    props: BTreeMap<PropKey, PropId>,
    /// Index: identity key -> term
    terms: BTreeMap<TermKey, TermId>,
}

impl Model {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            version: None,
            uri: None,
            term_identity: TermIdentity::default(),
            graph: DiGraph::new(),
            node_arena: Vec::new(),
            edge_arena: Vec::new(),
            prop_arena: Vec::new(),
            term_arena: Vec::new(),
            concept_arena: Vec::new(),
            value_set_arena: Vec::new(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            props: BTreeMap::new(),
            terms: BTreeMap::new(),
        }
    }

    /// Use a different term identity; must be set before any term is added
    pub fn with_term_identity(mut self, identity: TermIdentity) -> Self {
        self.term_identity = identity;
        self
    }

    pub fn term_identity(&self) -> TermIdentity {
        self.term_identity
    }

    // ========== Construction ==========

    /// Add a node; its handle must be new to the model
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        if self.nodes.contains_key(&node.handle) {
            return Err(MdfError::invariant(format!(
                "node '{}' already exists in model '{}'",
                node.handle, self.handle
            )));
        }
        let id = NodeId(self.node_arena.len());
        let idx = self.graph.add_node(id);
        debug_assert_eq!(idx.index(), id.0);
        self.nodes.insert(node.handle.clone(), id);
        self.node_arena.push(node);
        Ok(id)
    }

    /// Add an edge; its triplet must be new to the model
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        let triplet = Triplet::new(
            edge.handle.clone(),
            self.node(edge.src).handle.clone(),
            self.node(edge.dst).handle.clone(),
        );
        if self.edges.contains_key(&triplet) {
            return Err(MdfError::invariant(format!(
                "edge '{}' already exists in model '{}'",
                triplet, self.handle
            )));
        }
        let id = EdgeId(self.edge_arena.len());
        self.graph
            .add_edge(NodeIndex::new(edge.src.0), NodeIndex::new(edge.dst.0), id);
        self.edges.insert(triplet, id);
        self.edge_arena.push(edge);
        Ok(id)
    }

    /// Store a property without attaching it to any owner
    pub fn new_prop(&mut self, prop: Property) -> PropId {
        let id = PropId(self.prop_arena.len());
        self.prop_arena.push(prop);
        id
    }

    /// Attach a stored property to a node or edge
    ///
    /// The same property may be attached to many owners; each attachment is
    /// indexed under its own [`PropKey`].
    pub fn attach_prop(&mut self, owner: Owner, prop: PropId) -> Result<()> {
        let handle = self.prop(prop).handle.clone();
        let key = PropKey::new(self.owner_key(owner), handle.clone());
        if self.props.contains_key(&key) {
            return Err(MdfError::invariant(format!(
                "property '{}' already attached in model '{}'",
                key, self.handle
            )));
        }
        match owner {
            Owner::Node(id) => self.node_arena[id.0].props.insert(handle, prop),
            Owner::Edge(id) => self.edge_arena[id.0].props.insert(handle, prop),
        };
        let belongs = &mut self.prop_arena[prop.0].belongs;
        if !belongs.contains(&owner) {
            belongs.push(owner);
        }
        self.props.insert(key, prop);
        Ok(())
    }

    /// Add a term, or return the existing term with the same identity key
    pub fn intern_term(&mut self, term: Term) -> TermId {
        let key = self.term_identity.key(&term);
        if let Some(id) = self.terms.get(&key) {
            return *id;
        }
        let id = TermId(self.term_arena.len());
        self.term_arena.push(term);
        self.terms.insert(key, id);
        id
    }

    /// Give a property a value set (replacing any it had)
    pub fn add_value_set(&mut self, prop: PropId, value_set: ValueSet) -> ValueSetId {
        let id = ValueSetId(self.value_set_arena.len());
        self.value_set_arena.push(value_set);
        self.prop_arena[prop.0].value_set = Some(id);
        id
    }

    /// Put terms into a property's value set, creating the value set on demand
    ///
    /// Terms are keyed by handle; a handle already present keeps its term.
    pub fn add_terms(&mut self, prop: PropId, terms: impl IntoIterator<Item = TermId>) -> ValueSetId {
        let vs = match self.prop(prop).value_set {
            Some(vs) => vs,
            None => self.add_value_set(prop, ValueSet::default()),
        };
        for term in terms {
            let handle = self.term_arena[term.0].handle.clone();
            self.value_set_arena[vs.0].terms.entry(handle).or_insert(term);
        }
        vs
    }

    /// Annotate an entity with a term, creating its concept on demand
    pub fn annotate(&mut self, entity: EntityId, term: TermId) -> ConceptId {
        let concept = match self.concept_of(entity) {
            Some(concept) => concept,
            None => {
                let concept = ConceptId(self.concept_arena.len());
                self.concept_arena.push(Concept::default());
                match entity {
                    EntityId::Node(id) => self.node_arena[id.0].concept = Some(concept),
                    EntityId::Edge(id) => self.edge_arena[id.0].concept = Some(concept),
                    EntityId::Property(id) => self.prop_arena[id.0].concept = Some(concept),
                    EntityId::Term(id) => self.term_arena[id.0].concept = Some(concept),
                }
                concept
            }
        };
        let key = self.term_key(term);
        self.concept_arena[concept.0].terms.entry(key).or_insert(term);
        concept
    }

    // ========== Lookup ==========

    pub fn node(&self, id: NodeId) -> &Node {
        &self.node_arena[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.node_arena[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edge_arena[id.0]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edge_arena[id.0]
    }

    pub fn prop(&self, id: PropId) -> &Property {
        &self.prop_arena[id.0]
    }

    pub fn prop_mut(&mut self, id: PropId) -> &mut Property {
        &mut self.prop_arena[id.0]
    }

    pub fn term(&self, id: TermId) -> &Term {
        &self.term_arena[id.0]
    }

    pub fn concept(&self, id: ConceptId) -> &Concept {
        &self.concept_arena[id.0]
    }

    pub fn value_set(&self, id: ValueSetId) -> &ValueSet {
        &self.value_set_arena[id.0]
    }

    pub fn node_id(&self, handle: &str) -> Option<NodeId> {
        self.nodes.get(handle).copied()
    }

    pub fn node_by_handle(&self, handle: &str) -> Option<&Node> {
        self.node_id(handle).map(|id| self.node(id))
    }

    pub fn edge_id(&self, triplet: &Triplet) -> Option<EdgeId> {
        self.edges.get(triplet).copied()
    }

    pub fn prop_id(&self, key: &PropKey) -> Option<PropId> {
        self.props.get(key).copied()
    }

    pub fn term_id(&self, key: &TermKey) -> Option<TermId> {
        self.terms.get(key).copied()
    }

    /// Identity key of a term under this model's term identity
    pub fn term_key(&self, id: TermId) -> TermKey {
        self.term_identity.key(self.term(id))
    }

    pub fn triplet(&self, id: EdgeId) -> Triplet {
        let edge = self.edge(id);
        Triplet::new(
            edge.handle.clone(),
            self.node(edge.src).handle.clone(),
            self.node(edge.dst).handle.clone(),
        )
    }

    pub fn owner_key(&self, owner: Owner) -> OwnerKey {
        match owner {
            Owner::Node(id) => OwnerKey::Node(self.node(id).handle.clone()),
            Owner::Edge(id) => OwnerKey::Edge(self.triplet(id)),
        }
    }

    pub fn owner_handle(&self, owner: Owner) -> &str {
        match owner {
            Owner::Node(id) => &self.node(id).handle,
            Owner::Edge(id) => &self.edge(id).handle,
        }
    }

    pub fn concept_of(&self, entity: EntityId) -> Option<ConceptId> {
        match entity {
            EntityId::Node(id) => self.node(id).concept,
            EntityId::Edge(id) => self.edge(id).concept,
            EntityId::Property(id) => self.prop(id).concept,
            EntityId::Term(id) => self.term(id).concept,
        }
    }

    /// Terms annotating an entity, in identity-key order
    pub fn annotations(&self, entity: EntityId) -> Vec<TermId> {
        self.concept_of(entity)
            .map(|c| self.concept(c).terms.values().copied().collect())
            .unwrap_or_default()
    }

    /// Terms in a property's value set, in handle order
    pub fn prop_terms(&self, prop: PropId) -> Vec<TermId> {
        self.prop(prop)
            .value_set
            .map(|vs| self.value_set(vs).terms.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn entity_ref(&self, entity: EntityId) -> EntityRef<'_> {
        match entity {
            EntityId::Node(id) => EntityRef::Node(self.node(id)),
            EntityId::Edge(id) => EntityRef::Edge(self.edge(id)),
            EntityId::Property(id) => EntityRef::Property(self.prop(id)),
            EntityId::Term(id) => EntityRef::Term(self.term(id)),
        }
    }

    // ========== Iteration ==========

    /// Nodes by handle
    pub fn nodes(&self) -> &BTreeMap<String, NodeId> {
        &self.nodes
    }

    /// Edges by triplet
    pub fn edges(&self) -> &BTreeMap<Triplet, EdgeId> {
        &self.edges
    }

    /// Property attachments by (owner, handle)
    pub fn props(&self) -> &BTreeMap<PropKey, PropId> {
        &self.props
    }

    /// Terms by identity key
    pub fn terms(&self) -> &BTreeMap<TermKey, TermId> {
        &self.terms
    }

    /// Every distinct property object, in creation order
    pub fn distinct_props(&self) -> impl Iterator<Item = (PropId, &Property)> {
        self.prop_arena.iter().enumerate().map(|(i, p)| (PropId(i), p))
    }

    // ========== Topology ==========

    /// Edges leaving a node
    pub fn edges_out(&self, node: NodeId) -> Vec<EdgeId> {
        self.edges_directed(node, Direction::Outgoing)
    }

    /// Edges entering a node
    pub fn edges_in(&self, node: NodeId) -> Vec<EdgeId> {
        self.edges_directed(node, Direction::Incoming)
    }

    /// Edges whose source node has the given handle
    pub fn edges_by_src(&self, handle: &str) -> Vec<EdgeId> {
        self.node_id(handle)
            .map(|id| self.edges_out(id))
            .unwrap_or_default()
    }

    /// Edges whose destination node has the given handle
    pub fn edges_by_dst(&self, handle: &str) -> Vec<EdgeId> {
        self.node_id(handle)
            .map(|id| self.edges_in(id))
            .unwrap_or_default()
    }

    /// All edges sharing one handle, in triplet order
    pub fn edges_by_handle(&self, handle: &str) -> Vec<EdgeId> {
        self.edges
            .iter()
            .filter(|(t, _)| t.handle == handle)
            .map(|(_, id)| *id)
            .collect()
    }

    fn edges_directed(&self, node: NodeId, direction: Direction) -> Vec<EdgeId> {
        let mut edges: Vec<EdgeId> = self
            .graph
            .edges_directed(NodeIndex::new(node.0), direction)
            .map(|e| *e.weight())
            .collect();
        edges.sort();
        edges
    }
}
