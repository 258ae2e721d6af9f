/*!
The model compiler.

Walking a dirty model once, this produces a leave / begin-enter / end-enter cascade for every
region and vertex, a traverse plan for every transition, and the machine's `on_initialise` list
(the root state's enter cascade). Cascades and plans are flat vectors of [`Step`] command
records; the evaluator replays them as a straight-line walk, recomputing nothing. The only steps
deferred to run time are the ones whose outcome genuinely depends on the instance: region entry
(history restoration), initial pseudo state entry, junction and choice selection, local
traversal, completion evaluation, and terminate.

The traversal rules implemented by [`build_external_plan`] are the heart of the semantics: exit
the child of the lowest common ancestor on the source side, run the transition effects, then
enter the target-side ancestry outside-in, finishing with the target's end-enter cascade. A
pseudo state source that is not itself the exited child is left first; pseudo states do not
linger.
*/

use crate::definition::types::*;
use crate::error::*;
use crate::execution::Instance;
use crate::tree;

// ------------------------------------------------------------------------------------------------
// Crate Types
// ------------------------------------------------------------------------------------------------

///
/// One step of a compiled cascade or traverse plan. User actions are referenced by owner and
/// index so the step table stays free of the model's type parameters.
///
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Traversal breadcrumb, emitted through the log sink.
    Trace(String),
    EntryAction { vertex: Vertex, index: usize },
    ExitAction { vertex: Vertex, index: usize },
    EffectAction { transition: Transition, index: usize },
    /// Record the state as its region's current, making it part of the active configuration.
    SetCurrent { region: Region, state: State },
    /// Exit whatever state the region currently holds.
    ExitRegion { region: Region },
    /// Enter the region through its history or its initial pseudo state.
    EnterRegion { region: Region },
    /// Enter an initial or history pseudo state: restore history or take its one transition.
    EnterInitial { vertex: Vertex },
    SelectJunction { vertex: Vertex },
    SelectChoice { vertex: Vertex },
    /// Local traversal; the exit depth depends on the instance's active configuration.
    TraverseLocal { transition: Transition },
    EvaluateCompletions { state: Vertex },
    /// Completion re-evaluation after an internal transition, gated on the runtime switch.
    CompletionAfterInternal { state: Vertex },
    Terminate,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Cascade {
    pub(crate) leave: Vec<Step>,
    pub(crate) begin_enter: Vec<Step>,
    pub(crate) end_enter: Vec<Step>,
}

pub(crate) struct Compiled {
    pub(crate) regions: Vec<Cascade>,
    pub(crate) vertices: Vec<Cascade>,
    pub(crate) region_initial: Vec<Option<Vertex>>,
    pub(crate) plans: Vec<Vec<Step>>,
    pub(crate) on_initialise: Vec<Step>,
}

impl Compiled {
    pub(crate) fn cascade(&self, element: Element) -> &Cascade {
        match element {
            Element::Region(region) => &self.regions[region.0 as usize],
            Element::Vertex(vertex) => &self.vertices[vertex.0 as usize],
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Crate Functions
// ------------------------------------------------------------------------------------------------

pub(crate) fn compile<M, I: Instance>(model: &StateMachine<M, I>) -> Result<Compiled> {
    let region_initial = find_region_initials(model)?;
    check_vertices(model)?;

    let mut compiled = Compiled {
        regions: vec![Cascade::default(); model.regions.len()],
        vertices: vec![Cascade::default(); model.vertices.len()],
        region_initial,
        plans: vec![Vec::new(); model.transitions.len()],
        on_initialise: Vec::new(),
    };

    for region in model.region_handles() {
        compiled.regions[region.0 as usize] = build_region_cascade(model, region);
    }

    let mut vertex_cascades = vec![Cascade::default(); model.vertices.len()];
    for vertex in model.vertex_handles() {
        vertex_cascades[vertex.0 as usize] =
            build_vertex_cascade(model, &compiled.regions, vertex);
    }
    compiled.vertices = vertex_cascades;

    let mut plans = vec![Vec::new(); model.transitions.len()];
    for transition in model.transition_handles() {
        plans[transition.0 as usize] = build_plan(model, &compiled, transition)?;
    }
    compiled.plans = plans;

    let root = &compiled.vertices[0];
    compiled.on_initialise = root
        .begin_enter
        .iter()
        .chain(root.end_enter.iter())
        .cloned()
        .collect();
    Ok(compiled)
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn find_region_initials<M, I: Instance>(
    model: &StateMachine<M, I>,
) -> Result<Vec<Option<Vertex>>> {
    let mut initials = vec![None; model.regions.len()];
    for region in model.region_handles() {
        let found: Vec<Vertex> = model
            .vertices_in(region)
            .into_iter()
            .filter(|v| {
                model
                    .pseudo_kind_of(*v)
                    .map(|k| k.is_initial())
                    .unwrap_or(false)
            })
            .collect();
        if found.len() > 1 {
            return Err(ErrorKind::RegionMultipleInitial(model.qualified_name(region)).into());
        }
        initials[region.0 as usize] = found.first().copied();
    }
    Ok(initials)
}

fn check_vertices<M, I: Instance>(model: &StateMachine<M, I>) -> Result<()> {
    for vertex in model.vertex_handles() {
        match model.vertex(vertex).kind {
            VertexKind::Final => {
                if !model.outgoing(vertex).is_empty() {
                    return Err(
                        ErrorKind::FinalStateTransitions(model.qualified_name(vertex)).into()
                    );
                }
            }
            VertexKind::Pseudo(kind) if kind.is_initial() => {
                if model.outgoing(vertex).len() != 1 {
                    return Err(
                        ErrorKind::InitialTransitionCount(model.qualified_name(vertex)).into()
                    );
                }
            }
            _ => (),
        }
    }
    Ok(())
}

fn build_region_cascade<M, I: Instance>(model: &StateMachine<M, I>, region: Region) -> Cascade {
    let qualified = model.qualified_name(region);
    Cascade {
        leave: vec![
            Step::ExitRegion { region },
            Step::Trace(format!("leave {}", qualified)),
        ],
        begin_enter: vec![Step::Trace(format!("enter {}", qualified))],
        end_enter: vec![Step::EnterRegion { region }],
    }
}

fn build_vertex_cascade<M, I: Instance>(
    model: &StateMachine<M, I>,
    region_cascades: &[Cascade],
    vertex: Vertex,
) -> Cascade {
    let node = model.vertex(vertex);
    let qualified = model.qualified_name(vertex);
    match node.kind {
        VertexKind::Pseudo(kind) => {
            let mut begin_enter = vec![Step::Trace(format!("enter {}", qualified))];
            if kind == PseudoStateKind::Terminate {
                begin_enter.push(Step::Terminate);
            }
            let end_enter = match kind {
                PseudoStateKind::Initial
                | PseudoStateKind::ShallowHistory
                | PseudoStateKind::DeepHistory => vec![Step::EnterInitial { vertex }],
                PseudoStateKind::Junction => vec![Step::SelectJunction { vertex }],
                PseudoStateKind::Choice => vec![Step::SelectChoice { vertex }],
                PseudoStateKind::Terminate => Vec::new(),
            };
            Cascade {
                leave: vec![Step::Trace(format!("leave {}", qualified))],
                begin_enter,
                end_enter,
            }
        }
        VertexKind::State | VertexKind::Final => {
            let regions = model.child_regions(vertex);

            let mut leave = Vec::new();
            for region in regions.iter().rev() {
                leave.extend_from_slice(&region_cascades[region.0 as usize].leave);
            }
            leave.push(Step::Trace(format!("leave {}", qualified)));
            for index in 0..node.exit.len() {
                leave.push(Step::ExitAction { vertex, index });
            }

            let mut begin_enter = vec![Step::Trace(format!("enter {}", qualified))];
            if let Some(region) = node.parent {
                begin_enter.push(Step::SetCurrent {
                    region,
                    state: State(vertex.0),
                });
            }
            for index in 0..node.entry.len() {
                begin_enter.push(Step::EntryAction { vertex, index });
            }

            let mut end_enter = Vec::new();
            for region in &regions {
                let cascade = &region_cascades[region.0 as usize];
                end_enter.extend_from_slice(&cascade.begin_enter);
                end_enter.extend_from_slice(&cascade.end_enter);
            }
            if node.kind != VertexKind::Final && !model.outgoing(vertex).is_empty() {
                end_enter.push(Step::EvaluateCompletions { state: vertex });
            }

            Cascade {
                leave,
                begin_enter,
                end_enter,
            }
        }
    }
}

fn build_plan<M, I: Instance>(
    model: &StateMachine<M, I>,
    compiled: &Compiled,
    transition: Transition,
) -> Result<Vec<Step>> {
    let node = model.transition_node(transition);
    match (node.kind, node.target) {
        (TransitionKind::Internal, _) | (_, None) => {
            let mut plan = effect_steps(model, transition);
            plan.push(Step::CompletionAfterInternal {
                state: node.source,
            });
            Ok(plan)
        }
        (TransitionKind::Local, Some(_)) => Ok(vec![Step::TraverseLocal { transition }]),
        (TransitionKind::External, Some(target)) => {
            build_external_plan(model, compiled, transition, node.source, target)
        }
    }
}

fn build_external_plan<M, I: Instance>(
    model: &StateMachine<M, I>,
    compiled: &Compiled,
    transition: Transition,
    source: Vertex,
    target: Vertex,
) -> Result<Vec<Step>> {
    let source_ancestry = model.ancestry(Element::Vertex(source));
    let target_ancestry = model.ancestry(Element::Vertex(target));
    let lca = match tree::lowest_common_ancestor_index(&source_ancestry, &target_ancestry) {
        Some(lca) => lca,
        None => return Err(crossing_error(model, source, target)),
    };
    if let (Some(Element::Region(_)), Some(Element::Region(_))) =
        (source_ancestry.get(lca + 1), target_ancestry.get(lca + 1))
    {
        return Err(crossing_error(model, source, target));
    }

    let mut plan = Vec::new();
    let exited = source_ancestry
        .get(lca + 1)
        .copied()
        .unwrap_or(Element::Vertex(source));

    // a pseudo state source that is not the exited child must still be left; pseudo states do
    // not linger mid-traversal
    if model.is_pseudo(source) && exited != Element::Vertex(source) {
        plan.extend_from_slice(&compiled.vertices[source.0 as usize].leave);
    }
    plan.extend_from_slice(&compiled.cascade(exited).leave);
    plan.extend(effect_steps(model, transition));
    // a self-transition exits its own vertex, which must then be fully re-entered
    if exited == Element::Vertex(target) {
        plan.extend_from_slice(&compiled.vertices[target.0 as usize].begin_enter);
    }
    for element in &target_ancestry[lca + 1..] {
        plan.extend_from_slice(&compiled.cascade(*element).begin_enter);
    }
    plan.extend_from_slice(&compiled.vertices[target.0 as usize].end_enter);
    Ok(plan)
}

fn crossing_error<M, I: Instance>(
    model: &StateMachine<M, I>,
    source: Vertex,
    target: Vertex,
) -> Error {
    ErrorKind::TransitionCrossesRegions(
        model.qualified_name(source),
        model.qualified_name(target),
    )
    .into()
}

fn effect_steps<M, I: Instance>(model: &StateMachine<M, I>, transition: Transition) -> Vec<Step> {
    (0..model.transition_node(transition).effect.len())
        .map(|index| Step::EffectAction { transition, index })
        .collect()
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
