/*!
The descriptive model types.

The containment tree is held in three arenas on [`StateMachine`]: regions, vertices and
transitions. The public surface deals in copyable typed handles into those arenas, and
transitions store source and target handles, so the overlaid transition digraph never owns
nodes by value.
*/

use crate::compile::Compiled;
use crate::execution::{DefaultInstance, Instance};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// Handle to a region, a container of vertices and the slot a composite state's active child is
/// tracked in.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region(pub(crate) u32);

///
/// Handle to a state; simple, composite or orthogonal depending on how many regions it owns.
/// The machine root is a state with no parent.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct State(pub(crate) u32);

///
/// Handle to a final state. Entering one completes its containing region.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FinalState(pub(crate) u32);

///
/// Handle to a pseudo state, a transient vertex the instance never rests in.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PseudoState(pub(crate) u32);

///
/// Handle to any vertex; anything that can be the source or target of a transition.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Vertex(pub(crate) u32);

///
/// Handle to a transition between vertices.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Transition(pub(crate) u32);

///
/// Any element of the containment tree; the unit of ancestry computation and the argument of the
/// generic visitor callbacks.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Region(Region),
    Vertex(Vertex),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PseudoStateKind {
    Initial,
    ShallowHistory,
    DeepHistory,
    Junction,
    Choice,
    Terminate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    External,
    Local,
    Internal,
}

///
/// A transition guard predicate. The message is `None` when the guard is consulted during
/// completion evaluation or model initialisation.
///
pub type GuardFn<M, I> = Rc<dyn Fn(Option<&M>, &I) -> bool>;

///
/// An entry, exit or effect action.
///
pub type ActionFn<M, I> = Rc<dyn Fn(Option<&M>, &mut I)>;

///
/// The top-level model type: the root state of the containment tree plus the arenas holding
/// every element, the dirty flag, and the compiled behaviour tables.
///
pub struct StateMachine<M, I: Instance = DefaultInstance> {
    pub(crate) vertices: Vec<VertexNode<M, I>>,
    pub(crate) regions: Vec<RegionNode>,
    pub(crate) transitions: Vec<TransitionNode<M, I>>,
    pub(crate) clean: Cell<bool>,
    pub(crate) compiled: RefCell<Option<Compiled>>,
}

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

pub(crate) enum Guard<M, I> {
    Always,
    Else,
    When(GuardFn<M, I>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VertexKind {
    State,
    Final,
    Pseudo(PseudoStateKind),
}

pub(crate) struct VertexNode<M, I: Instance> {
    pub(crate) name: String,
    pub(crate) parent: Option<Region>,
    pub(crate) kind: VertexKind,
    pub(crate) regions: Vec<Region>,
    pub(crate) outgoing: Vec<Transition>,
    pub(crate) incoming: Vec<Transition>,
    pub(crate) entry: Vec<ActionFn<M, I>>,
    pub(crate) exit: Vec<ActionFn<M, I>>,
    pub(crate) removed: bool,
}

pub(crate) struct RegionNode {
    pub(crate) name: String,
    pub(crate) parent: Vertex,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) removed: bool,
}

pub(crate) struct TransitionNode<M, I: Instance> {
    pub(crate) source: Vertex,
    pub(crate) target: Option<Vertex>,
    pub(crate) kind: TransitionKind,
    pub(crate) guard: Guard<M, I>,
    pub(crate) effect: Vec<ActionFn<M, I>>,
    pub(crate) removed: bool,
}
