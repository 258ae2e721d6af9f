/*!
The descriptive model: element arenas, typed handles, and the authoring API.

The containment tree is strict: every region belongs to a state, every vertex to a region, and
the machine root is a state with no parent. Transitions overlay a digraph on the vertices.
Mutating the model in any way marks the owning machine dirty so the next initialisation
recompiles its behaviour tables.
*/

pub(crate) mod types;
pub use types::*;

pub(crate) mod impls;

pub(crate) mod builder;
pub use builder::{FinalStateRef, StateRef, TransitionRef, VertexParent};
