/*!
An executable model of [UML](https://www.omg.org/spec/UML/2.5.1/PDF) state machine semantics.

A model is authored once as a graph of composite and orthogonal states, pseudo states and
guarded transitions, compiled into per-element behaviour tables, and then driven by dispatching
messages into any number of independent instances. The crate covers the semantics that make
hierarchical machines interesting: least-common-ancestor traversal that distinguishes external,
local and internal transitions, shallow and deep history restoration, junction and choice
branching, completion transitions, and terminate.

The descriptive model elements live at the crate root, with instance state and dispatch in
[`execution`], the process-wide knobs in [`runtime`], structural conformance checking in
[`validate`], and a structural [`visitor`].

# Example

```rust
use statecharts::{DefaultInstance, PseudoStateKind, StateMachine};

# fn main() -> statecharts::error::Result<()> {
let mut model: StateMachine<&str> = StateMachine::new("player");
let root = model.root();
let region = model.region(root, "r");
let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
let idle = model.state(region, "idle").id();
let playing = model.state(region, "playing").id();
let _ = model.transition(initial, idle);
let _ = model
    .transition(idle, playing)
    .when(|message, _| message == Some(&"play"));
let _ = model
    .transition(playing, idle)
    .when(|message, _| message == Some(&"stop"));

let mut instance = DefaultInstance::new("deck");
model.initialise(&mut instance)?;
assert!(model.evaluate(&mut instance, &"play")?);
assert!(model.is_active(playing, &instance));
assert!(!model.evaluate(&mut instance, &"eject")?);
# Ok(())
# }
```

# See Also

* [OMG Unified Modeling Language, Version 2.5.1](https://www.omg.org/spec/UML/2.5.1/PDF), §14
* [UML State Machine (Wikipedia)](https://en.wikipedia.org/wiki/UML_state_machine)
* [Statecharts: A Visual Formalism for Complex Systems](https://www.inf.ed.ac.uk/teaching/courses/seoc/2005_2006/resources/statecharts.pdf)

*/

#![warn(
    // ---------- Stylistic
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    // ---------- Public
    unreachable_pub,
    // ---------- Unsafe
    unsafe_code,
    // ---------- Unused
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
)]

#[macro_use]
extern crate error_chain;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

// ------------------------------------------------------------------------------------------------
// Modules
// ------------------------------------------------------------------------------------------------

pub mod error;

pub mod runtime;

pub mod tree;

mod definition;
pub use definition::*;

mod compile;

pub mod execution;
pub use execution::{DefaultInstance, Instance};

mod validate;
pub use validate::validate;

pub mod visitor;
