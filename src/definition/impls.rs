/*!
Structural accessors and predicates over the model arenas.

Everything here is read-only with respect to instances; qualified names are derived on demand
from the containment tree and the process-wide namespace separator, never stored.
*/

use crate::definition::types::*;
use crate::execution::Instance;
use crate::runtime;
use crate::tree;
use std::fmt::{Debug, Formatter};

// ------------------------------------------------------------------------------------------------
// Macros
// ------------------------------------------------------------------------------------------------

macro_rules! make_vertex_handle_impl {
    ($type_name:ident) => {
        impl From<$type_name> for Vertex {
            fn from(handle: $type_name) -> Self {
                Vertex(handle.0)
            }
        }

        impl From<$type_name> for Element {
            fn from(handle: $type_name) -> Self {
                Element::Vertex(Vertex(handle.0))
            }
        }
    };
}

make_vertex_handle_impl!(State);

make_vertex_handle_impl!(FinalState);

make_vertex_handle_impl!(PseudoState);

// ------------------------------------------------------------------------------------------------
// Implementations - handles
// ------------------------------------------------------------------------------------------------

impl From<FinalState> for State {
    fn from(handle: FinalState) -> Self {
        State(handle.0)
    }
}

impl From<Region> for Element {
    fn from(handle: Region) -> Self {
        Element::Region(handle)
    }
}

impl From<Vertex> for Element {
    fn from(handle: Vertex) -> Self {
        Element::Vertex(handle)
    }
}

// ------------------------------------------------------------------------------------------------
// Implementations - kinds and guards
// ------------------------------------------------------------------------------------------------

impl PseudoStateKind {
    /// An initial kind starts a region: plain initial or either history variant.
    pub fn is_initial(&self) -> bool {
        match self {
            PseudoStateKind::Initial
            | PseudoStateKind::ShallowHistory
            | PseudoStateKind::DeepHistory => true,
            _ => false,
        }
    }

    pub fn is_history(&self) -> bool {
        match self {
            PseudoStateKind::ShallowHistory | PseudoStateKind::DeepHistory => true,
            _ => false,
        }
    }
}

impl<M, I> Guard<M, I> {
    pub(crate) fn passes(&self, message: Option<&M>, instance: &I) -> bool {
        match self {
            Guard::Always => true,
            Guard::Else => false,
            Guard::When(predicate) => predicate(message, instance),
        }
    }

    pub(crate) fn is_else(&self) -> bool {
        match self {
            Guard::Else => true,
            _ => false,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Implementations - StateMachine
// ------------------------------------------------------------------------------------------------

impl<M, I: Instance> Debug for StateMachine<M, I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.vertices[0].name)
            .field("vertices", &format!("[..{}]", self.vertices.len()))
            .field("regions", &format!("[..{}]", self.regions.len()))
            .field("transitions", &format!("[..{}]", self.transitions.len()))
            .field("clean", &self.clean.get())
            .finish()
    }
}

impl<M, I: Instance> StateMachine<M, I> {
    /// The root state; the machine itself in handle form.
    pub fn root(&self) -> State {
        State(0)
    }

    pub fn name(&self, element: impl Into<Element>) -> &str {
        match element.into() {
            Element::Region(region) => &self.region_node(region).name,
            Element::Vertex(vertex) => &self.vertex(vertex).name,
        }
    }

    ///
    /// The element's name prefixed by all of its ancestors' names, joined with the process-wide
    /// namespace separator.
    ///
    pub fn qualified_name(&self, element: impl Into<Element>) -> String {
        let separator = runtime::namespace_separator();
        self.ancestry(element.into())
            .iter()
            .map(|el| self.name(*el).to_string())
            .collect::<Vec<String>>()
            .join(&separator)
    }

    pub fn parent(&self, element: impl Into<Element>) -> Option<Element> {
        match element.into() {
            Element::Region(region) => Some(Element::Vertex(self.region_node(region).parent)),
            Element::Vertex(vertex) => self.vertex(vertex).parent.map(Element::Region),
        }
    }

    /// `true` once the model has been compiled and no authoring mutation has happened since.
    pub fn clean(&self) -> bool {
        self.clean.get()
    }

    pub fn is_simple(&self, state: State) -> bool {
        self.child_regions(Vertex(state.0)).is_empty()
    }

    pub fn is_composite(&self, state: State) -> bool {
        self.child_regions(Vertex(state.0)).len() == 1
    }

    pub fn is_orthogonal(&self, state: State) -> bool {
        self.child_regions(Vertex(state.0)).len() >= 2
    }

    pub fn is_final(&self, vertex: impl Into<Vertex>) -> bool {
        self.vertex(vertex.into()).kind == VertexKind::Final
    }

    pub fn pseudo_state_kind(&self, pseudo: PseudoState) -> PseudoStateKind {
        match self.vertex(Vertex(pseudo.0)).kind {
            VertexKind::Pseudo(kind) => kind,
            _ => PseudoStateKind::Initial,
        }
    }

    pub fn transition_kind(&self, transition: Transition) -> TransitionKind {
        self.transition_node(transition).kind
    }

    pub fn source(&self, transition: Transition) -> Vertex {
        self.transition_node(transition).source
    }

    pub fn target(&self, transition: Transition) -> Option<Vertex> {
        self.transition_node(transition).target
    }

    /// The state's regions, in declaration order.
    pub fn regions_of(&self, state: State) -> Vec<Region> {
        self.child_regions(Vertex(state.0))
    }

    /// The region's vertices, in declaration order.
    pub fn vertices_in(&self, region: Region) -> Vec<Vertex> {
        self.region_node(region)
            .vertices
            .iter()
            .filter(|v| !self.vertex(**v).removed)
            .copied()
            .collect()
    }

    pub fn outgoing(&self, vertex: impl Into<Vertex>) -> Vec<Transition> {
        self.vertex(vertex.into())
            .outgoing
            .iter()
            .filter(|t| !self.transition_node(**t).removed)
            .copied()
            .collect()
    }

    pub fn incoming(&self, vertex: impl Into<Vertex>) -> Vec<Transition> {
        self.vertex(vertex.into())
            .incoming
            .iter()
            .filter(|t| !self.transition_node(**t).removed)
            .copied()
            .collect()
    }

    // --------------------------------------------------------------------------------------------

    pub(crate) fn vertex(&self, vertex: Vertex) -> &VertexNode<M, I> {
        &self.vertices[vertex.0 as usize]
    }

    pub(crate) fn vertex_mut(&mut self, vertex: Vertex) -> &mut VertexNode<M, I> {
        &mut self.vertices[vertex.0 as usize]
    }

    pub(crate) fn region_node(&self, region: Region) -> &RegionNode {
        &self.regions[region.0 as usize]
    }

    pub(crate) fn region_node_mut(&mut self, region: Region) -> &mut RegionNode {
        &mut self.regions[region.0 as usize]
    }

    pub(crate) fn transition_node(&self, transition: Transition) -> &TransitionNode<M, I> {
        &self.transitions[transition.0 as usize]
    }

    pub(crate) fn transition_node_mut(&mut self, transition: Transition) -> &mut TransitionNode<M, I> {
        &mut self.transitions[transition.0 as usize]
    }

    pub(crate) fn child_regions(&self, vertex: Vertex) -> Vec<Region> {
        self.vertex(vertex)
            .regions
            .iter()
            .filter(|r| !self.region_node(**r).removed)
            .copied()
            .collect()
    }

    pub(crate) fn pseudo_kind_of(&self, vertex: Vertex) -> Option<PseudoStateKind> {
        match self.vertex(vertex).kind {
            VertexKind::Pseudo(kind) => Some(kind),
            _ => None,
        }
    }

    pub(crate) fn is_pseudo(&self, vertex: Vertex) -> bool {
        self.pseudo_kind_of(vertex).is_some()
    }

    pub(crate) fn ancestry(&self, element: Element) -> Vec<Element> {
        tree::ancestors(element, |el| self.parent(el))
    }

    pub(crate) fn region_handles(&self) -> Vec<Region> {
        (0..self.regions.len() as u32)
            .map(Region)
            .filter(|r| !self.region_node(*r).removed)
            .collect()
    }

    pub(crate) fn vertex_handles(&self) -> Vec<Vertex> {
        (0..self.vertices.len() as u32)
            .map(Vertex)
            .filter(|v| !self.vertex(*v).removed)
            .collect()
    }

    pub(crate) fn transition_handles(&self) -> Vec<Transition> {
        (0..self.transitions.len() as u32)
            .map(Transition)
            .filter(|t| !self.transition_node(*t).removed)
            .collect()
    }
}
