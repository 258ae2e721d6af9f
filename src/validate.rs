/*!
Structural model validation.

Checks the model against its structural invariants and reports every violation through the log
sink: `error!` for conditions the compiler or evaluator will reject, `warn!` for constructs
that are legal but almost certainly mistakes. Validation never raises and is not invoked
automatically; it returns whether the model is conformant.
*/

use crate::definition::types::*;
use crate::execution::Instance;

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn validate<M, I: Instance>(model: &StateMachine<M, I>) -> bool {
    let mut errors = 0;

    for region in model.region_handles() {
        let initials = model
            .vertices_in(region)
            .into_iter()
            .filter(|v| {
                model
                    .pseudo_kind_of(*v)
                    .map(|k| k.is_initial())
                    .unwrap_or(false)
            })
            .count();
        if initials > 1 {
            error!(
                "region '{}' contains {} initial pseudo states",
                model.qualified_name(region),
                initials
            );
            errors += 1;
        } else if initials == 0 {
            warn!(
                "region '{}' has no initial pseudo state and cannot be entered without history",
                model.qualified_name(region)
            );
        }
    }

    for vertex in model.vertex_handles() {
        let outgoing = model.outgoing(vertex);
        match model.vertex(vertex).kind {
            VertexKind::Final => {
                if !outgoing.is_empty() {
                    error!(
                        "final state '{}' has outgoing transitions",
                        model.qualified_name(vertex)
                    );
                    errors += 1;
                }
            }
            VertexKind::Pseudo(kind) if kind.is_initial() => {
                if outgoing.len() != 1 {
                    error!(
                        "initial pseudo state '{}' has {} outgoing transitions, expected one",
                        model.qualified_name(vertex),
                        outgoing.len()
                    );
                    errors += 1;
                }
            }
            VertexKind::Pseudo(PseudoStateKind::Junction)
            | VertexKind::Pseudo(PseudoStateKind::Choice) => {
                let elses = outgoing
                    .iter()
                    .filter(|t| model.transition_node(**t).guard.is_else())
                    .count();
                if outgoing.len() - elses == 0 {
                    error!(
                        "'{}' has no non-else outgoing transition",
                        model.qualified_name(vertex)
                    );
                    errors += 1;
                }
                if elses > 1 {
                    error!(
                        "'{}' has {} else transitions, at most one is allowed",
                        model.qualified_name(vertex),
                        elses
                    );
                    errors += 1;
                }
            }
            VertexKind::Pseudo(PseudoStateKind::Terminate) => {
                if !outgoing.is_empty() {
                    warn!(
                        "terminate pseudo state '{}' has outgoing transitions that can never fire",
                        model.qualified_name(vertex)
                    );
                }
            }
            _ => (),
        }
    }

    for transition in model.transition_handles() {
        let node = model.transition_node(transition);
        let source_is_branch = matches!(
            model.pseudo_kind_of(node.source),
            Some(PseudoStateKind::Junction) | Some(PseudoStateKind::Choice)
        );
        if node.guard.is_else() && !source_is_branch {
            warn!(
                "else guard on a transition from '{}' can never be selected",
                model.qualified_name(node.source)
            );
        }
    }

    errors == 0
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
