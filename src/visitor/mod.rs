/*!
Provides a visitor pattern for clients that want to review the model but do not need the
details of ownership and hierarchy traversal.

Each `visit_*` method defaults to cascading into its more general form (a final state is also a
state, and every vertex is an element), so a visitor can hook in at whatever level of
specificity it cares about. `StateMachine::accept` drives the full structural walk:
regions before their vertices, each vertex's outgoing transitions, then its child regions.
*/

use crate::definition::types::*;
use crate::execution::Instance;

// ------------------------------------------------------------------------------------------------
// Public Traits
// ------------------------------------------------------------------------------------------------

pub trait Visitor<M, I: Instance> {
    fn visit_element(&mut self, model: &StateMachine<M, I>, element: Element) {
        let _ = (model, element);
    }

    fn visit_region(&mut self, model: &StateMachine<M, I>, region: Region) {
        self.visit_element(model, region.into());
    }

    fn visit_vertex(&mut self, model: &StateMachine<M, I>, vertex: Vertex) {
        self.visit_element(model, vertex.into());
    }

    fn visit_pseudo_state(&mut self, model: &StateMachine<M, I>, pseudo_state: PseudoState) {
        self.visit_vertex(model, pseudo_state.into());
    }

    fn visit_state(&mut self, model: &StateMachine<M, I>, state: State) {
        self.visit_vertex(model, state.into());
    }

    fn visit_final_state(&mut self, model: &StateMachine<M, I>, final_state: FinalState) {
        self.visit_state(model, final_state.into());
    }

    fn visit_state_machine(&mut self, model: &StateMachine<M, I>) {
        self.visit_state(model, model.root());
    }

    fn visit_transition(&mut self, model: &StateMachine<M, I>, transition: Transition) {
        let _ = (model, transition);
    }
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl<M, I: Instance> StateMachine<M, I> {
    /// Walk the whole model, machine first, regions before their contents.
    pub fn accept<V: Visitor<M, I>>(&self, visitor: &mut V) {
        visitor.visit_state_machine(self);
        for region in self.child_regions(Vertex(self.root().0)) {
            self.accept_region(region, visitor);
        }
    }

    /// Walk the subtree rooted at the given element.
    pub fn accept_element<V: Visitor<M, I>>(&self, element: impl Into<Element>, visitor: &mut V) {
        match element.into() {
            Element::Region(region) => self.accept_region(region, visitor),
            Element::Vertex(vertex) => self.accept_vertex(vertex, visitor),
        }
    }

    fn accept_region<V: Visitor<M, I>>(&self, region: Region, visitor: &mut V) {
        visitor.visit_region(self, region);
        for vertex in self.vertices_in(region) {
            self.accept_vertex(vertex, visitor);
        }
    }

    fn accept_vertex<V: Visitor<M, I>>(&self, vertex: Vertex, visitor: &mut V) {
        match self.vertex(vertex).kind {
            VertexKind::State => visitor.visit_state(self, State(vertex.0)),
            VertexKind::Final => visitor.visit_final_state(self, FinalState(vertex.0)),
            VertexKind::Pseudo(_) => visitor.visit_pseudo_state(self, PseudoState(vertex.0)),
        }
        for transition in self.outgoing(vertex) {
            visitor.visit_transition(self, transition);
        }
        for region in self.child_regions(vertex) {
            self.accept_region(region, visitor);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
