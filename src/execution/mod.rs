/*!
Instance state and message dispatch.

A model is passive; all run-time state lives in an [`Instance`]: the last-known state of every
region plus the terminated flag. The evaluator replays the compiled step tables against an
instance, so any number of instances can be driven against one compiled model. The core never
compares regions by name, only by handle identity.

Dispatch walks the active configuration from the root: a state's own outgoing transitions are
consulted first, then each currently-active child region in declaration order. At most one guard
may hold at a single state; two or more raise an ill-formed-machine error. A parent whose child
region consumed the message re-evaluates its own completion, which is how reaching a final state
bubbles outward.
*/

use crate::compile::{Compiled, Step};
use crate::definition::types::*;
use crate::error::*;
use crate::runtime;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

// ------------------------------------------------------------------------------------------------
// Public Traits
// ------------------------------------------------------------------------------------------------

///
/// The per-instance state contract. Implement this to store active-state bookkeeping alongside
/// your own data; the evaluator only ever calls these four methods.
///
pub trait Instance {
    /// Record the state as the region's current (and therefore last-known) state.
    fn set_current(&mut self, region: Region, state: State);

    /// The region's last-known state, if it has ever been entered.
    fn get_current(&self, region: Region) -> Option<State>;

    fn is_terminated(&self) -> bool;

    fn set_terminated(&mut self, terminated: bool);
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// The provided [`Instance`] implementation: a map from region to last-known state and the
/// terminated flag, with a name for log output.
///
#[derive(Clone, Debug)]
pub struct DefaultInstance {
    name: String,
    current: HashMap<Region, State>,
    terminated: bool,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Default for DefaultInstance {
    fn default() -> Self {
        Self::new(&blob_uuid::random_blob())
    }
}

impl Display for DefaultInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl DefaultInstance {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: HashMap::new(),
            terminated: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Instance for DefaultInstance {
    fn set_current(&mut self, region: Region, state: State) {
        let _ = self.current.insert(region, state);
    }

    fn get_current(&self, region: Region) -> Option<State> {
        self.current.get(&region).copied()
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn set_terminated(&mut self, terminated: bool) {
        self.terminated = terminated;
    }
}

// ------------------------------------------------------------------------------------------------

impl<M, I: Instance> StateMachine<M, I> {
    ///
    /// Compile the model's behaviour tables if it is dirty. Called automatically by
    /// [`initialise`](StateMachine::initialise) and [`evaluate`](StateMachine::evaluate).
    ///
    pub fn initialise_model(&self) -> Result<()> {
        if !self.clean() {
            let compiled = crate::compile::compile(self)?;
            *self.compiled.borrow_mut() = Some(compiled);
            self.clean.set(true);
        }
        Ok(())
    }

    /// Compile the model if required, then enter the instance's initial configuration.
    pub fn initialise(&self, instance: &mut I) -> Result<()> {
        self.initialise_with(instance, true)
    }

    pub fn initialise_with(&self, instance: &mut I, auto_initialise_model: bool) -> Result<()> {
        if auto_initialise_model {
            self.initialise_model()?;
        }
        let borrowed = self.compiled.borrow();
        let compiled = borrowed
            .as_ref()
            .ok_or_else(|| Error::from(ErrorKind::ModelNotInitialised))?;
        debug!("initialise instance of '{}'", self.vertices[0].name);
        instance.set_terminated(false);
        let runner = Runner {
            model: self,
            compiled,
            message: None,
        };
        runner.run(&compiled.on_initialise, instance, false)
    }

    ///
    /// Dispatch a message into the instance. Returns whether the message produced a traversal;
    /// a terminated instance consumes nothing and reports `Ok(false)`.
    ///
    pub fn evaluate(&self, instance: &mut I, message: &M) -> Result<bool> {
        self.evaluate_with(instance, message, true)
    }

    pub fn evaluate_with(
        &self,
        instance: &mut I,
        message: &M,
        auto_initialise_model: bool,
    ) -> Result<bool> {
        if instance.is_terminated() {
            return Ok(false);
        }
        if auto_initialise_model && !self.clean() {
            self.initialise_model()?;
        }
        let borrowed = self.compiled.borrow();
        let compiled = borrowed
            .as_ref()
            .ok_or_else(|| Error::from(ErrorKind::ModelNotInitialised))?;
        let runner = Runner {
            model: self,
            compiled,
            message: Some(message),
        };
        runner.evaluate_vertex(Vertex(0), instance)
    }

    ///
    /// Whether the vertex is part of the instance's active configuration: its region's current
    /// state, recursively up to the root.
    ///
    pub fn is_active(&self, vertex: impl Into<Vertex>, instance: &I) -> bool {
        self.element_active(Element::Vertex(vertex.into()), instance)
    }

    ///
    /// Whether a region's current state is a final state, or every region of a state is
    /// complete. A simple state is vacuously complete.
    ///
    pub fn is_complete(&self, element: impl Into<Element>, instance: &I) -> bool {
        match element.into() {
            Element::Region(region) => self.region_complete(region, instance),
            Element::Vertex(vertex) => self.vertex_complete(vertex, instance),
        }
    }

    // --------------------------------------------------------------------------------------------

    pub(crate) fn element_active(&self, element: Element, instance: &I) -> bool {
        match element {
            Element::Region(region) => {
                self.element_active(Element::Vertex(self.region_node(region).parent), instance)
            }
            Element::Vertex(vertex) => match self.vertex(vertex).parent {
                None => true,
                Some(region) => {
                    instance.get_current(region) == Some(State(vertex.0))
                        && self.element_active(Element::Region(region), instance)
                }
            },
        }
    }

    pub(crate) fn region_complete(&self, region: Region, instance: &I) -> bool {
        instance
            .get_current(region)
            .map(|state| self.is_final(Vertex(state.0)))
            .unwrap_or(false)
    }

    pub(crate) fn vertex_complete(&self, vertex: Vertex, instance: &I) -> bool {
        match self.vertex(vertex).kind {
            VertexKind::Pseudo(_) => false,
            _ => self
                .child_regions(vertex)
                .into_iter()
                .all(|region| self.region_complete(region, instance)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

///
/// Replays compiled step tables against one instance for the duration of a single `initialise`
/// or `evaluate` call. `message` is `None` during initialisation and completion evaluation.
///
struct Runner<'a, M, I: Instance> {
    model: &'a StateMachine<M, I>,
    compiled: &'a Compiled,
    message: Option<&'a M>,
}

impl<'a, M, I: Instance> Runner<'a, M, I> {
    fn run(&self, steps: &[Step], instance: &mut I, deep: bool) -> Result<()> {
        for step in steps {
            // terminate halts further traversal with no further actions
            if instance.is_terminated() {
                return Ok(());
            }
            match step {
                Step::Trace(text) => trace!("{}", text),
                Step::EntryAction { vertex, index } => {
                    (self.model.vertex(*vertex).entry[*index])(self.message, instance)
                }
                Step::ExitAction { vertex, index } => {
                    (self.model.vertex(*vertex).exit[*index])(self.message, instance)
                }
                Step::EffectAction { transition, index } => {
                    (self.model.transition_node(*transition).effect[*index])(self.message, instance)
                }
                Step::SetCurrent { region, state } => instance.set_current(*region, *state),
                Step::ExitRegion { region } => {
                    if let Some(current) = instance.get_current(*region) {
                        self.run(
                            &self.compiled.vertices[current.0 as usize].leave,
                            instance,
                            deep,
                        )?;
                    }
                }
                Step::EnterRegion { region } => self.enter_region(*region, instance, deep)?,
                Step::EnterInitial { vertex } => self.enter_initial(*vertex, instance, deep)?,
                Step::SelectJunction { vertex } => self.select_junction(*vertex, instance)?,
                Step::SelectChoice { vertex } => self.select_choice(*vertex, instance)?,
                Step::TraverseLocal { transition } => {
                    self.traverse_local(*transition, instance)?
                }
                Step::EvaluateCompletions { state } => {
                    self.evaluate_completions(*state, instance)?
                }
                Step::CompletionAfterInternal { state } => {
                    if runtime::internal_transitions_trigger_completion() {
                        self.evaluate_completions(*state, instance)?;
                    }
                }
                Step::Terminate => instance.set_terminated(true),
            }
        }
        Ok(())
    }

    fn enter_vertex(&self, vertex: Vertex, instance: &mut I, deep: bool) -> Result<()> {
        let cascade = &self.compiled.vertices[vertex.0 as usize];
        self.run(&cascade.begin_enter, instance, deep)?;
        self.run(&cascade.end_enter, instance, deep)
    }

    ///
    /// Enter a region: restore the last-known state when the deep flag is set or the region's
    /// initial pseudo state is a history kind, otherwise enter through the initial pseudo state.
    ///
    fn enter_region(&self, region: Region, instance: &mut I, deep: bool) -> Result<()> {
        let initial = self.compiled.region_initial[region.0 as usize];
        let kind = initial.and_then(|vertex| self.model.pseudo_kind_of(vertex));
        let history = kind.map(|k| k.is_history()).unwrap_or(false);
        let next_deep = deep || kind == Some(PseudoStateKind::DeepHistory);
        if deep || history {
            if let Some(current) = instance.get_current(region) {
                return self.enter_vertex(Vertex(current.0), instance, next_deep);
            }
        }
        match initial {
            Some(vertex) => self.enter_vertex(vertex, instance, next_deep),
            None => Err(ErrorKind::RegionNoInitial(self.model.qualified_name(region)).into()),
        }
    }

    fn enter_initial(&self, vertex: Vertex, instance: &mut I, deep: bool) -> Result<()> {
        let kind = match self.model.pseudo_kind_of(vertex) {
            Some(kind) => kind,
            None => return Ok(()),
        };
        if kind.is_history() {
            if let Some(region) = self.model.vertex(vertex).parent {
                if let Some(current) = instance.get_current(region) {
                    let next_deep = deep || kind == PseudoStateKind::DeepHistory;
                    return self.enter_vertex(Vertex(current.0), instance, next_deep);
                }
            }
        }
        match self.model.outgoing(vertex).first() {
            Some(transition) => {
                self.run(&self.compiled.plans[transition.0 as usize], instance, false)
            }
            None => {
                Err(ErrorKind::InitialTransitionCount(self.model.qualified_name(vertex)).into())
            }
        }
    }

    /// Evaluate each outgoing guard once; exactly one may hold, with the else as fallback.
    fn select_junction(&self, vertex: Vertex, instance: &mut I) -> Result<()> {
        let (enabled, fallback) = self.branch_outcomes(vertex, instance);
        let selected = match (enabled.as_slice(), fallback) {
            ([transition], _) => *transition,
            ([], Some(transition)) => transition,
            _ => {
                return Err(
                    ErrorKind::JunctionSelection(self.model.qualified_name(vertex)).into()
                )
            }
        };
        self.run(&self.compiled.plans[selected.0 as usize], instance, false)
    }

    /// Like a junction, but several holding guards are broken uniformly at random.
    fn select_choice(&self, vertex: Vertex, instance: &mut I) -> Result<()> {
        let (enabled, fallback) = self.branch_outcomes(vertex, instance);
        let selected = match (enabled.len(), fallback) {
            (0, Some(transition)) => transition,
            (0, None) => {
                return Err(ErrorKind::ChoiceSelection(self.model.qualified_name(vertex)).into())
            }
            (1, _) => enabled[0],
            (count, _) => enabled[runtime::random(count)],
        };
        self.run(&self.compiled.plans[selected.0 as usize], instance, false)
    }

    fn branch_outcomes(&self, vertex: Vertex, instance: &I) -> (Vec<Transition>, Option<Transition>) {
        let mut enabled = Vec::new();
        let mut fallback = None;
        for transition in self.model.outgoing(vertex) {
            let node = self.model.transition_node(transition);
            if node.guard.is_else() {
                if fallback.is_none() {
                    fallback = Some(transition);
                }
            } else if node.guard.passes(self.message, instance) {
                enabled.push(transition);
            }
        }
        (enabled, fallback)
    }

    ///
    /// Local traversal: exit the active branch below the first inactive element of the target
    /// ancestry, then enter down to the target. The containing composite is neither exited nor
    /// re-entered.
    ///
    fn traverse_local(&self, transition: Transition, instance: &mut I) -> Result<()> {
        let target = match self.model.transition_node(transition).target {
            Some(target) => target,
            None => return Ok(()),
        };
        let ancestry = self.model.ancestry(Element::Vertex(target));
        let first_inactive = ancestry
            .iter()
            .position(|element| !self.model.element_active(*element, instance));
        match first_inactive {
            Some(found) => {
                let index = match ancestry[found] {
                    Element::Region(_) => found + 1,
                    Element::Vertex(_) => found,
                };
                if let Element::Vertex(entered) = ancestry[index] {
                    if let Some(region) = self.model.vertex(entered).parent {
                        if let Some(current) = instance.get_current(region) {
                            self.run(
                                &self.compiled.vertices[current.0 as usize].leave,
                                instance,
                                false,
                            )?;
                        }
                    }
                }
                self.run_effects(transition, instance);
                for element in &ancestry[index..] {
                    self.run(&self.compiled.cascade(*element).begin_enter, instance, false)?;
                }
                self.run(
                    &self.compiled.vertices[target.0 as usize].end_enter,
                    instance,
                    false,
                )
            }
            None => {
                // the whole target ancestry is active: exit the target's contents, re-enter
                for region in self.model.child_regions(target).into_iter().rev() {
                    if let Some(current) = instance.get_current(region) {
                        self.run(
                            &self.compiled.vertices[current.0 as usize].leave,
                            instance,
                            false,
                        )?;
                    }
                }
                self.run_effects(transition, instance);
                self.run(
                    &self.compiled.vertices[target.0 as usize].end_enter,
                    instance,
                    false,
                )
            }
        }
    }

    fn run_effects(&self, transition: Transition, instance: &mut I) {
        for action in &self.model.transition_node(transition).effect {
            action(self.message, instance);
        }
    }

    ///
    /// Fire the state's completion transition if the state is complete and exactly one guard
    /// holds with no message. Completion traversals see `None` as their message.
    ///
    fn evaluate_completions(&self, vertex: Vertex, instance: &mut I) -> Result<()> {
        if !self.model.vertex_complete(vertex, instance) {
            return Ok(());
        }
        let mut enabled = Vec::new();
        for transition in self.model.outgoing(vertex) {
            let node = self.model.transition_node(transition);
            if !node.guard.is_else() && node.guard.passes(None, instance) {
                enabled.push(transition);
            }
        }
        match enabled.as_slice() {
            [] => Ok(()),
            [transition] => {
                debug!(
                    "completion transition from '{}'",
                    self.model.qualified_name(vertex)
                );
                let completion = Runner {
                    model: self.model,
                    compiled: self.compiled,
                    message: None,
                };
                completion.run(&self.compiled.plans[transition.0 as usize], instance, false)
            }
            _ => Err(
                ErrorKind::MultipleEnabledTransitions(self.model.qualified_name(vertex)).into(),
            ),
        }
    }

    ///
    /// The dispatch walk: the state's own transitions first, then every currently-active child
    /// region in declaration order, then a completion check if a child consumed the message.
    ///
    fn evaluate_vertex(&self, vertex: Vertex, instance: &mut I) -> Result<bool> {
        let mut enabled = Vec::new();
        for transition in self.model.outgoing(vertex) {
            let node = self.model.transition_node(transition);
            if node.guard.passes(self.message, instance) {
                enabled.push(transition);
            }
        }
        if enabled.len() > 1 {
            return Err(
                ErrorKind::MultipleEnabledTransitions(self.model.qualified_name(vertex)).into(),
            );
        }
        if let Some(transition) = enabled.first() {
            debug!("traverse from '{}'", self.model.qualified_name(vertex));
            self.run(&self.compiled.plans[transition.0 as usize], instance, false)?;
            return Ok(true);
        }
        let mut consumed = false;
        for region in self.model.child_regions(vertex) {
            if let Some(current) = instance.get_current(region) {
                if self.evaluate_vertex(Vertex(current.0), instance)? {
                    consumed = true;
                    if instance.is_terminated()
                        || !self.model.element_active(Element::Vertex(vertex), instance)
                    {
                        break;
                    }
                }
            }
        }
        if consumed && !instance.is_terminated() {
            self.evaluate_completions(vertex, instance)?;
        }
        Ok(consumed)
    }
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PseudoStateKind, StateMachine, StateRef};

    type Model = StateMachine<&'static str, TestInstance>;

    #[derive(Debug, Default)]
    struct TestInstance {
        current: HashMap<Region, State>,
        terminated: bool,
        trace: Vec<String>,
    }

    impl Instance for TestInstance {
        fn set_current(&mut self, region: Region, state: State) {
            let _ = self.current.insert(region, state);
        }

        fn get_current(&self, region: Region) -> Option<State> {
            self.current.get(&region).copied()
        }

        fn is_terminated(&self) -> bool {
            self.terminated
        }

        fn set_terminated(&mut self, terminated: bool) {
            self.terminated = terminated;
        }
    }

    fn traced(builder: StateRef<'_, &'static str, TestInstance>, name: &'static str) -> State {
        builder
            .entry(move |_, instance| instance.trace.push(format!("enter {}", name)))
            .exit(move |_, instance| instance.trace.push(format!("exit {}", name)))
            .id()
    }

    #[test]
    fn test_simple_two_state_toggle() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let off = traced(model.state(region, "off"), "off");
        let on = traced(model.state(region, "on"), "on");
        let _ = model.transition(initial, off);
        let _ = model
            .transition(off, on)
            .when(|message, _| message == Some(&"flip"));
        let _ = model
            .transition(on, off)
            .when(|message, _| message == Some(&"flip"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert_eq!(instance.trace, vec!["enter off".to_string()]);
        assert!(model.is_active(off, &instance));

        assert!(model.evaluate(&mut instance, &"flip").unwrap());
        assert!(model.evaluate(&mut instance, &"flip").unwrap());
        assert_eq!(
            instance.trace,
            vec![
                "enter off".to_string(),
                "exit off".to_string(),
                "enter on".to_string(),
                "exit on".to_string(),
                "enter off".to_string(),
            ]
        );
        assert!(model.is_active(off, &instance));
        assert!(!model.is_active(on, &instance));

        // an unmatched message is not consumed
        assert!(!model.evaluate(&mut instance, &"noise").unwrap());
    }

    #[test]
    fn test_orthogonal_regions_dispatch_independently() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let ortho = model.state(region, "s").id();
        let _ = model.transition(initial, ortho);

        let r1 = model.region(ortho, "r1");
        let i1 = model.pseudo_state(r1, PseudoStateKind::Initial, "i1");
        let a = traced(model.state(r1, "a"), "a");
        let b = traced(model.state(r1, "b"), "b");
        let _ = model.transition(i1, a);
        let _ = model
            .transition(a, b)
            .when(|message, _| message == Some(&"go"));

        let r2 = model.region(ortho, "r2");
        let i2 = model.pseudo_state(r2, PseudoStateKind::Initial, "i2");
        let x = traced(model.state(r2, "x"), "x");
        let _ = model.transition(i2, x);

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert_eq!(
            instance.trace,
            vec!["enter a".to_string(), "enter x".to_string()]
        );

        assert!(model.evaluate(&mut instance, &"go").unwrap());
        assert!(model.is_active(b, &instance));
        assert!(model.is_active(x, &instance));
        assert_eq!(
            instance.trace,
            vec![
                "enter a".to_string(),
                "enter x".to_string(),
                "exit a".to_string(),
                "enter b".to_string(),
            ]
        );
    }

    #[test]
    fn test_deep_history_restores_the_leaf() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let c = traced(model.state(region, "c"), "c");
        let outside = traced(model.state(region, "outside"), "outside");
        let _ = model.transition(initial, c);

        let rc = model.region(c, "rc");
        let history = model.pseudo_state(rc, PseudoStateKind::DeepHistory, "h");
        let d = traced(model.state(rc, "d"), "d");
        let _ = model.transition(history, d);

        let rd = model.region(d, "rd");
        let id = model.pseudo_state(rd, PseudoStateKind::Initial, "i");
        let p = traced(model.state(rd, "p"), "p");
        let q = traced(model.state(rd, "q"), "q");
        let _ = model.transition(id, p);

        let _ = model
            .transition(c, q)
            .when(|message, _| message == Some(&"toq"));
        let _ = model
            .transition(c, outside)
            .when(|message, _| message == Some(&"out"));
        let _ = model
            .transition(outside, c)
            .when(|message, _| message == Some(&"back"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.is_active(p, &instance));

        assert!(model.evaluate(&mut instance, &"toq").unwrap());
        assert!(model.is_active(q, &instance));

        assert!(model.evaluate(&mut instance, &"out").unwrap());
        assert!(model.is_active(outside, &instance));
        assert!(!model.is_active(q, &instance));

        instance.trace.clear();
        assert!(model.evaluate(&mut instance, &"back").unwrap());
        assert!(model.is_active(q, &instance));
        assert_eq!(
            instance.trace,
            vec![
                "exit outside".to_string(),
                "enter c".to_string(),
                "enter d".to_string(),
                "enter q".to_string(),
            ]
        );
    }

    #[test]
    fn test_shallow_history_initialises_subregions_fresh() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let c = model.state(region, "c").id();
        let outside = model.state(region, "outside").id();
        let _ = model.transition(initial, c);

        let rc = model.region(c, "rc");
        let history = model.pseudo_state(rc, PseudoStateKind::ShallowHistory, "h");
        let a = model.state(rc, "a").id();
        let b = model.state(rc, "b").id();
        let _ = model.transition(history, a);
        let _ = model
            .transition(a, b)
            .when(|message, _| message == Some(&"tob"));

        let rb = model.region(b, "rb");
        let ib = model.pseudo_state(rb, PseudoStateKind::Initial, "ib");
        let p = traced(model.state(rb, "p"), "p");
        let q = traced(model.state(rb, "q"), "q");
        let _ = model.transition(ib, p);
        let _ = model
            .transition(p, q)
            .when(|message, _| message == Some(&"toq"));

        let _ = model
            .transition(c, outside)
            .when(|message, _| message == Some(&"out"));
        let _ = model
            .transition(outside, c)
            .when(|message, _| message == Some(&"back"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"tob").unwrap());
        assert!(model.evaluate(&mut instance, &"toq").unwrap());
        assert!(model.is_active(q, &instance));

        assert!(model.evaluate(&mut instance, &"out").unwrap());
        assert!(model.evaluate(&mut instance, &"back").unwrap());

        // the last active child is restored, but its sub-regions start fresh
        assert!(model.is_active(b, &instance));
        assert!(model.is_active(p, &instance));
        assert!(!model.is_active(q, &instance));
    }

    fn pick_first(_: usize) -> usize {
        0
    }

    fn pick_second(_: usize) -> usize {
        1
    }

    fn choice_model() -> (Model, State, State, State) {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let _ = model.transition(initial, a);
        let choice = model.pseudo_state(region, PseudoStateKind::Choice, "c");
        let _ = model
            .transition(a, choice)
            .when(|message, _| message == Some(&"go"));
        let x = model.state(region, "x").id();
        let y = model.state(region, "y").id();
        let z = model.state(region, "z").id();
        let _ = model.transition(choice, x).when(|_, _| true);
        let _ = model.transition(choice, y).when(|_, _| true);
        let _ = model.transition(choice, z).when(|_, _| false);
        (model, x, y, z)
    }

    #[test]
    fn test_choice_uses_the_injected_random() {
        runtime::set_random(pick_second);
        let (model, x, y, z) = choice_model();
        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"go").unwrap());
        assert!(model.is_active(y, &instance));
        assert!(!model.is_active(x, &instance));
        assert!(!model.is_active(z, &instance));

        runtime::set_random(pick_first);
        let (model, x, _, _) = choice_model();
        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"go").unwrap());
        assert!(model.is_active(x, &instance));
    }

    #[test]
    fn test_choice_falls_back_to_else() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let _ = model.transition(initial, a);
        let choice = model.pseudo_state(region, PseudoStateKind::Choice, "c");
        let _ = model
            .transition(a, choice)
            .when(|message, _| message == Some(&"go"));
        let x = model.state(region, "x").id();
        let y = model.state(region, "y").id();
        let _ = model.transition(choice, x).when(|_, _| false);
        let _ = model.transition(choice, y).otherwise();

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"go").unwrap());
        assert!(model.is_active(y, &instance));
    }

    #[test]
    fn test_junction_selects_the_single_true_guard() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let _ = model.transition(initial, a);
        let junction = model.pseudo_state(region, PseudoStateKind::Junction, "j");
        let _ = model
            .transition(a, junction)
            .when(|message, _| message == Some(&"go"));
        let x = model.state(region, "x").id();
        let y = model.state(region, "y").id();
        let _ = model.transition(junction, x).when(|_, _| false);
        let _ = model.transition(junction, y).when(|_, _| true);

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"go").unwrap());
        assert!(model.is_active(y, &instance));
    }

    #[test]
    fn test_junction_with_two_true_guards_is_ill_formed() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let _ = model.transition(initial, a);
        let junction = model.pseudo_state(region, PseudoStateKind::Junction, "j");
        let _ = model
            .transition(a, junction)
            .when(|message, _| message == Some(&"go"));
        let x = model.state(region, "x").id();
        let y = model.state(region, "y").id();
        let _ = model.transition(junction, x).when(|_, _| true);
        let _ = model.transition(junction, y).when(|_, _| true);

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        let result = model.evaluate(&mut instance, &"go");
        assert!(result.is_err());
        match result.err().unwrap().0 {
            ErrorKind::JunctionSelection(_) => (),
            other => panic!("expecting ErrorKind::JunctionSelection, got {:?}", other),
        }
        // the active configuration is untouched by the failed dispatch
        assert_eq!(instance.get_current(region), Some(a));
    }

    #[test]
    fn test_junction_reached_through_the_initial_chain() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let junction = model.pseudo_state(region, PseudoStateKind::Junction, "j");
        let _ = model.transition(initial, junction);
        let a = traced(model.state(region, "a"), "a");
        let b = model.state(region, "b").id();
        let _ = model.transition(junction, a).when(|_, _| true);
        let _ = model.transition(junction, b).when(|_, _| false);

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.is_active(a, &instance));
        assert_eq!(instance.trace, vec!["enter a".to_string()]);
    }

    #[test]
    fn test_terminate_absorbs_all_further_input() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = traced(model.state(region, "a"), "a");
        let b = traced(model.state(region, "b"), "b");
        let terminate = model.pseudo_state(region, PseudoStateKind::Terminate, "t");
        let _ = model.transition(initial, a);
        let _ = model
            .transition(a, terminate)
            .when(|message, _| message == Some(&"end"));
        let _ = model
            .transition(a, b)
            .when(|message, _| message == Some(&"go"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"end").unwrap());
        assert!(instance.is_terminated());

        let trace_after_terminate = instance.trace.clone();
        assert!(!model.evaluate(&mut instance, &"go").unwrap());
        assert!(!model.evaluate(&mut instance, &"end").unwrap());
        assert_eq!(instance.trace, trace_after_terminate);
    }

    #[test]
    fn test_completion_chain_fires_once_when_regions_finalise() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let c = model.state(region, "c").id();
        let done = traced(model.state(region, "done"), "done");
        let _ = model.transition(initial, c);

        let rc = model.region(c, "rc");
        let ic = model.pseudo_state(rc, PseudoStateKind::Initial, "ic");
        let working = model.state(rc, "working").id();
        let finished = model.final_state(rc, "finished").id();
        let _ = model.transition(ic, working);
        let _ = model
            .transition(working, finished)
            .when(|message, _| message == Some(&"finish"));

        // completion transition: fires only when evaluated without a message
        let _ = model.transition(c, done).when(|message, _: &TestInstance| message.is_none());

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(!model.is_complete(c, &instance));

        assert!(model.evaluate(&mut instance, &"finish").unwrap());
        assert!(model.is_active(done, &instance));
        assert_eq!(
            instance.trace.iter().filter(|t| *t == "enter done").count(),
            1
        );
        let _ = working;
    }

    #[test]
    fn test_completion_fires_immediately_on_entering_a_complete_state() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let pass_through = model.state(region, "pass").id();
        let landed = model.state(region, "landed").id();
        let _ = model.transition(initial, pass_through);
        // a simple state is complete on entry; an unguarded transition is its completion
        let _ = model.transition(pass_through, landed);

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.is_active(landed, &instance));
    }

    #[test]
    fn test_multiple_enabled_transitions_raise() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let x = model.state(region, "x").id();
        let y = model.state(region, "y").id();
        let _ = model.transition(initial, a);
        let _ = model
            .transition(a, x)
            .when(|message, _| message == Some(&"go"));
        let _ = model
            .transition(a, y)
            .when(|message, _| message == Some(&"go"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        let result = model.evaluate(&mut instance, &"go");
        assert!(result.is_err());
        match result.err().unwrap().0 {
            ErrorKind::MultipleEnabledTransitions(_) => (),
            other => panic!(
                "expecting ErrorKind::MultipleEnabledTransitions, got {:?}",
                other
            ),
        }
    }

    #[test]
    fn test_internal_transition_runs_effect_only() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = traced(model.state(region, "a"), "a");
        let _ = model.transition(initial, a);
        let _ = model
            .internal_transition(a)
            .when(|message, _| message == Some(&"poke"))
            .effect(|_, instance| instance.trace.push("poked".to_string()));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"poke").unwrap());
        assert!(model.is_active(a, &instance));
        assert_eq!(
            instance.trace,
            vec!["enter a".to_string(), "poked".to_string()]
        );
    }

    #[test]
    fn test_internal_transition_completion_switch() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let b = model.state(region, "b").id();
        let _ = model.transition(initial, a);
        let _ = model
            .internal_transition(a)
            .when(|message, _| message == Some(&"poke"));
        let _ = model.transition(a, b).when(|message, _: &TestInstance| message.is_none());

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"poke").unwrap());
        assert!(model.is_active(a, &instance));

        runtime::set_internal_transitions_trigger_completion(true);
        assert!(model.evaluate(&mut instance, &"poke").unwrap());
        runtime::set_internal_transitions_trigger_completion(false);
        assert!(model.is_active(b, &instance));
    }

    #[test]
    fn test_local_transition_stays_inside_the_composite() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let c = traced(model.state(region, "c"), "c");
        let _ = model.transition(initial, c);

        let rc = model.region(c, "rc");
        let ic = model.pseudo_state(rc, PseudoStateKind::Initial, "ic");
        let a = traced(model.state(rc, "a"), "a");
        let b = traced(model.state(rc, "b"), "b");
        let _ = model.transition(ic, a);
        let _ = model
            .transition(c, b)
            .local()
            .when(|message, _| message == Some(&"go"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        instance.trace.clear();

        assert!(model.evaluate(&mut instance, &"go").unwrap());
        assert!(model.is_active(b, &instance));
        // the containing composite is neither exited nor re-entered
        assert_eq!(
            instance.trace,
            vec!["exit a".to_string(), "enter b".to_string()]
        );
        let _ = a;
    }

    #[test]
    fn test_external_exit_entry_ordering_across_depths() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let outer = traced(model.state(region, "outer"), "outer");
        let landing = traced(model.state(region, "landing"), "landing");
        let _ = model.transition(initial, outer);

        let ro = model.region(outer, "ro");
        let io = model.pseudo_state(ro, PseudoStateKind::Initial, "io");
        let mid = traced(model.state(ro, "mid"), "mid");
        let _ = model.transition(io, mid);

        let rm = model.region(mid, "rm");
        let im = model.pseudo_state(rm, PseudoStateKind::Initial, "im");
        let leaf = traced(model.state(rm, "leaf"), "leaf");
        let _ = model.transition(im, leaf);

        let _ = model
            .transition(leaf, landing)
            .when(|message, _| message == Some(&"jump"))
            .effect(|_, instance| instance.trace.push("effect".to_string()));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        instance.trace.clear();

        assert!(model.evaluate(&mut instance, &"jump").unwrap());
        // source-side exits inside-out, the effect, then target-side entries outside-in
        assert_eq!(
            instance.trace,
            vec![
                "exit leaf".to_string(),
                "exit mid".to_string(),
                "exit outer".to_string(),
                "effect".to_string(),
                "enter landing".to_string(),
            ]
        );
    }

    #[test]
    fn test_external_self_transition_exits_and_reenters() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = traced(model.state(region, "a"), "a");
        let _ = model.transition(initial, a);
        let _ = model
            .transition(a, a)
            .when(|message, _| message == Some(&"again"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        instance.trace.clear();

        assert!(model.evaluate(&mut instance, &"again").unwrap());
        assert!(model.is_active(a, &instance));
        assert_eq!(
            instance.trace,
            vec!["exit a".to_string(), "enter a".to_string()]
        );
    }

    #[test]
    fn test_identical_runs_are_deterministic() {
        fn build() -> (Model, State) {
            let mut model = Model::new("machine");
            let root = model.root();
            let region = model.region(root, "r");
            let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
            let a = traced(model.state(region, "a"), "a");
            let b = traced(model.state(region, "b"), "b");
            let _ = model.transition(initial, a);
            let _ = model
                .transition(a, b)
                .when(|message, _| message == Some(&"step"));
            let _ = model
                .transition(b, a)
                .when(|message, _| message == Some(&"step"));
            (model, a)
        }

        let messages = ["step", "step", "noise", "step"];
        let (model, _) = build();
        let mut first = TestInstance::default();
        model.initialise(&mut first).unwrap();
        for message in &messages {
            let _ = model.evaluate(&mut first, message).unwrap();
        }

        let (model, _) = build();
        let mut second = TestInstance::default();
        model.initialise(&mut second).unwrap();
        for message in &messages {
            let _ = model.evaluate(&mut second, message).unwrap();
        }

        assert_eq!(first.trace, second.trace);
    }

    #[test]
    fn test_initialise_clears_termination_and_restarts() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let terminate = model.pseudo_state(region, PseudoStateKind::Terminate, "t");
        let _ = model.transition(initial, a);
        let _ = model
            .transition(a, terminate)
            .when(|message, _| message == Some(&"end"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(model.evaluate(&mut instance, &"end").unwrap());
        assert!(instance.is_terminated());

        model.initialise(&mut instance).unwrap();
        assert!(!instance.is_terminated());
        assert!(model.is_active(a, &instance));
    }

    #[test]
    fn test_evaluate_without_auto_initialise_requires_a_compiled_model() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let a = model.state(region, "a").id();
        let _ = model.transition(initial, a);

        let mut instance = TestInstance::default();
        let result = model.evaluate_with(&mut instance, &"go", false);
        assert!(result.is_err());
        match result.err().unwrap().0 {
            ErrorKind::ModelNotInitialised => (),
            other => panic!("expecting ErrorKind::ModelNotInitialised, got {:?}", other),
        }
    }

    #[test]
    fn test_is_complete_for_regions_and_states() {
        let mut model = Model::new("machine");
        let root = model.root();
        let region = model.region(root, "r");
        let initial = model.pseudo_state(region, PseudoStateKind::Initial, "initial");
        let c = model.state(region, "c").id();
        let _ = model.transition(initial, c);
        let rc = model.region(c, "rc");
        let ic = model.pseudo_state(rc, PseudoStateKind::Initial, "ic");
        let w = model.state(rc, "w").id();
        let f = model.final_state(rc, "f").id();
        let _ = model.transition(ic, w);
        let _ = model
            .transition(w, f)
            .when(|message, _| message == Some(&"finish"));

        let mut instance = TestInstance::default();
        model.initialise(&mut instance).unwrap();
        assert!(!model.is_complete(rc, &instance));
        assert!(!model.is_complete(c, &instance));

        assert!(model.evaluate(&mut instance, &"finish").unwrap());
        assert!(model.is_complete(rc, &instance));
        assert!(model.is_complete(c, &instance));
        let _ = f;
    }

    #[test]
    fn test_default_instance_contract() {
        let mut instance = DefaultInstance::new("player-one");
        assert_eq!(instance.name(), "player-one");
        assert_eq!(instance.to_string(), "player-one".to_string());
        assert!(!instance.is_terminated());

        let region = Region(0);
        assert_eq!(instance.get_current(region), None);
        instance.set_current(region, State(3));
        instance.set_current(region, State(4));
        assert_eq!(instance.get_current(region), Some(State(4)));

        let generated = DefaultInstance::default();
        assert!(!generated.name().is_empty());
    }
}
