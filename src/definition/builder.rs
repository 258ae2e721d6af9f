/*!
The authoring API for constructing a state machine model.

Every constructor links the new element into its parent's collection and marks the owning
machine dirty; there are no separate `add` calls. Passing a `State` where a vertex parent is
expected resolves to that state's default region, synthesising it on first use. The fluent
`StateRef`/`FinalStateRef`/`TransitionRef` values borrow the machine to attach behaviors and
guards; call `id` to keep the plain handle.

# Example

```rust
use statecharts::{PseudoStateKind, StateMachine};

let mut model: StateMachine<&str> = StateMachine::new("lamp");
let root = model.root();
let region = model.region(root, "power");
let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
let off = model.state(region, "off").id();
let on = model.state(region, "on").id();
let _ = model.transition(initial, off);
let _ = model.transition(off, on).when(|message, _| message == Some(&"switch"));
let _ = model.transition(on, off).when(|message, _| message == Some(&"switch"));
```
*/

use crate::definition::types::*;
use crate::execution::Instance;
use crate::runtime;
use crate::tree;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ------------------------------------------------------------------------------------------------
// Public Traits
// ------------------------------------------------------------------------------------------------

///
/// Anything that can act as the parent of a new vertex: a `Region` directly, or a `State` whose
/// default region is resolved (and synthesised when missing).
///
pub trait VertexParent {
    fn resolve<M, I: Instance>(self, model: &mut StateMachine<M, I>) -> Region;
}

impl VertexParent for Region {
    fn resolve<M, I: Instance>(self, _: &mut StateMachine<M, I>) -> Region {
        self
    }
}

impl VertexParent for State {
    fn resolve<M, I: Instance>(self, model: &mut StateMachine<M, I>) -> Region {
        model.default_region_of(self)
    }
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

pub struct StateRef<'a, M, I: Instance> {
    model: &'a mut StateMachine<M, I>,
    id: State,
}

pub struct FinalStateRef<'a, M, I: Instance> {
    model: &'a mut StateMachine<M, I>,
    id: FinalState,
}

pub struct TransitionRef<'a, M, I: Instance> {
    model: &'a mut StateMachine<M, I>,
    id: Transition,
}

// ------------------------------------------------------------------------------------------------
// Macros
// ------------------------------------------------------------------------------------------------

macro_rules! make_behavior_builder_impl {
    ($type_name:ident, $handle:ident) => {
        impl<'a, M, I: Instance> $type_name<'a, M, I> {
            /// Append an entry action, run in declaration order when the state is entered.
            pub fn entry<F>(self, action: F) -> Self
            where
                F: Fn(Option<&M>, &mut I) + 'static,
            {
                self.model.vertices[self.id.0 as usize].entry.push(Rc::new(action));
                self.model.mark_dirty();
                self
            }

            /// Append an exit action, run in declaration order when the state is left.
            pub fn exit<F>(self, action: F) -> Self
            where
                F: Fn(Option<&M>, &mut I) + 'static,
            {
                self.model.vertices[self.id.0 as usize].exit.push(Rc::new(action));
                self.model.mark_dirty();
                self
            }

            pub fn id(&self) -> $handle {
                self.id
            }
        }
    };
}

make_behavior_builder_impl!(StateRef, State);

make_behavior_builder_impl!(FinalStateRef, FinalState);

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl<'a, M, I: Instance> TransitionRef<'a, M, I> {
    ///
    /// Replace the guard with the given predicate. The predicate sees the message being
    /// dispatched (`None` for completion evaluation) and the instance.
    ///
    pub fn when<F>(self, guard: F) -> Self
    where
        F: Fn(Option<&M>, &I) -> bool + 'static,
    {
        self.model.transitions[self.id.0 as usize].guard = Guard::When(Rc::new(guard));
        self.model.mark_dirty();
        self
    }

    ///
    /// Replace the guard with the else sentinel, selected by a Junction or Choice only when no
    /// other outgoing guard holds.
    ///
    pub fn otherwise(self) -> Self {
        self.model.transitions[self.id.0 as usize].guard = Guard::Else;
        self.model.mark_dirty();
        self
    }

    /// Append an effect action, run between the exit and entry phases of traversal.
    pub fn effect<F>(self, action: F) -> Self
    where
        F: Fn(Option<&M>, &mut I) + 'static,
    {
        self.model.transitions[self.id.0 as usize].effect.push(Rc::new(action));
        self.model.mark_dirty();
        self
    }

    ///
    /// Request local traversal. Honoured only when the target is an ancestor or descendant of
    /// the source on the same branch; otherwise the transition stays external.
    ///
    pub fn local(self) -> Self {
        let (source, target) = {
            let node = &self.model.transitions[self.id.0 as usize];
            (node.source, node.target)
        };
        if let Some(target) = target {
            if self.model.on_same_branch(source, target) {
                self.model.transitions[self.id.0 as usize].kind = TransitionKind::Local;
                self.model.mark_dirty();
            }
        }
        self
    }

    pub fn id(&self) -> Transition {
        self.id
    }
}

impl<M, I: Instance> StateMachine<M, I> {
    /// A new, dirty model consisting of just the named root state.
    pub fn new(name: &str) -> Self {
        StateMachine {
            vertices: vec![VertexNode {
                name: name.to_string(),
                parent: None,
                kind: VertexKind::State,
                regions: Vec::new(),
                outgoing: Vec::new(),
                incoming: Vec::new(),
                entry: Vec::new(),
                exit: Vec::new(),
                removed: false,
            }],
            regions: Vec::new(),
            transitions: Vec::new(),
            clean: Cell::new(false),
            compiled: RefCell::new(None),
        }
    }

    /// Add a region to the given state.
    pub fn region(&mut self, parent: State, name: &str) -> Region {
        let handle = Region(self.regions.len() as u32);
        self.regions.push(RegionNode {
            name: name.to_string(),
            parent: Vertex(parent.0),
            vertices: Vec::new(),
            removed: false,
        });
        self.vertex_mut(Vertex(parent.0)).regions.push(handle);
        self.mark_dirty();
        handle
    }

    /// Add a state under the given parent.
    pub fn state<P: VertexParent>(&mut self, parent: P, name: &str) -> StateRef<'_, M, I> {
        let region = parent.resolve(self);
        let vertex = self.add_vertex(region, name, VertexKind::State);
        StateRef {
            model: self,
            id: State(vertex.0),
        }
    }

    /// Add a final state under the given parent.
    pub fn final_state<P: VertexParent>(&mut self, parent: P, name: &str) -> FinalStateRef<'_, M, I> {
        let region = parent.resolve(self);
        let vertex = self.add_vertex(region, name, VertexKind::Final);
        FinalStateRef {
            model: self,
            id: FinalState(vertex.0),
        }
    }

    /// Add a pseudo state of the given kind under the given parent.
    pub fn pseudo_state<P: VertexParent>(
        &mut self,
        parent: P,
        kind: PseudoStateKind,
        name: &str,
    ) -> PseudoState {
        let region = parent.resolve(self);
        let vertex = self.add_vertex(region, name, VertexKind::Pseudo(kind));
        PseudoState(vertex.0)
    }

    ///
    /// Add a transition between two vertices. The kind defaults to external; use
    /// [`TransitionRef::local`] to request local traversal.
    ///
    pub fn transition(
        &mut self,
        source: impl Into<Vertex>,
        target: impl Into<Vertex>,
    ) -> TransitionRef<'_, M, I> {
        let source = source.into();
        let target = target.into();
        let handle = Transition(self.transitions.len() as u32);
        self.transitions.push(TransitionNode {
            source,
            target: Some(target),
            kind: TransitionKind::External,
            guard: Guard::Always,
            effect: Vec::new(),
            removed: false,
        });
        self.vertex_mut(source).outgoing.push(handle);
        self.vertex_mut(target).incoming.push(handle);
        self.mark_dirty();
        TransitionRef {
            model: self,
            id: handle,
        }
    }

    /// Add an internal transition: no target, no exits, no entries; effects only.
    pub fn internal_transition(&mut self, source: State) -> TransitionRef<'_, M, I> {
        let source = Vertex(source.0);
        let handle = Transition(self.transitions.len() as u32);
        self.transitions.push(TransitionNode {
            source,
            target: None,
            kind: TransitionKind::Internal,
            guard: Guard::Always,
            effect: Vec::new(),
            removed: false,
        });
        self.vertex_mut(source).outgoing.push(handle);
        self.mark_dirty();
        TransitionRef {
            model: self,
            id: handle,
        }
    }

    /// Detach a transition from the model.
    pub fn remove_transition(&mut self, transition: Transition) {
        let (source, target) = {
            let node = self.transition_node(transition);
            (node.source, node.target)
        };
        self.transition_node_mut(transition).removed = true;
        self.vertex_mut(source).outgoing.retain(|t| *t != transition);
        if let Some(target) = target {
            self.vertex_mut(target).incoming.retain(|t| *t != transition);
        }
        self.mark_dirty();
    }

    ///
    /// Detach a vertex, everything it contains, and every transition into or out of the detached
    /// subtree. The root state cannot be removed.
    ///
    pub fn remove_vertex(&mut self, vertex: impl Into<Vertex>) {
        let vertex = vertex.into();
        if vertex.0 == 0 {
            return;
        }
        if let Some(region) = self.vertex(vertex).parent {
            self.region_node_mut(region).vertices.retain(|v| *v != vertex);
        }
        self.remove_vertex_subtree(vertex);
        self.mark_dirty();
    }

    /// Detach a region and everything it contains.
    pub fn remove_region(&mut self, region: Region) {
        let parent = self.region_node(region).parent;
        self.vertex_mut(parent).regions.retain(|r| *r != region);
        self.remove_region_subtree(region);
        self.mark_dirty();
    }

    // --------------------------------------------------------------------------------------------

    pub(crate) fn mark_dirty(&self) {
        self.clean.set(false);
    }

    pub(crate) fn default_region_of(&mut self, state: State) -> Region {
        let wanted = runtime::default_region_name();
        let existing = self
            .child_regions(Vertex(state.0))
            .into_iter()
            .find(|r| self.region_node(*r).name == wanted);
        match existing {
            Some(region) => region,
            None => self.region(state, &wanted),
        }
    }

    pub(crate) fn on_same_branch(&self, source: Vertex, target: Vertex) -> bool {
        let source_ancestry = self.ancestry(Element::Vertex(source));
        let target_ancestry = self.ancestry(Element::Vertex(target));
        match tree::lowest_common_ancestor_index(&source_ancestry, &target_ancestry) {
            Some(index) => {
                index == source_ancestry.len() - 1 || index == target_ancestry.len() - 1
            }
            None => false,
        }
    }

    fn add_vertex(&mut self, region: Region, name: &str, kind: VertexKind) -> Vertex {
        let handle = Vertex(self.vertices.len() as u32);
        self.vertices.push(VertexNode {
            name: name.to_string(),
            parent: Some(region),
            kind,
            regions: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            removed: false,
        });
        self.region_node_mut(region).vertices.push(handle);
        self.mark_dirty();
        handle
    }

    fn remove_vertex_subtree(&mut self, vertex: Vertex) {
        self.vertex_mut(vertex).removed = true;
        for transition in self.outgoing(vertex) {
            self.remove_transition(transition);
        }
        for transition in self.incoming(vertex) {
            self.remove_transition(transition);
        }
        for region in self.child_regions(vertex) {
            self.remove_region_subtree(region);
        }
    }

    fn remove_region_subtree(&mut self, region: Region) {
        self.region_node_mut(region).removed = true;
        for vertex in self.vertices_in(region) {
            self.remove_vertex_subtree(vertex);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
