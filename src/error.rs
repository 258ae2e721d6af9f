/*!
Provides a common error implementation, error kind enumeration, and constrained result type.

Construction-class kinds are raised while compiling a dirty model; the ill-formed-machine kinds
are raised while a message is being dispatched. A terminated instance is not an error, `evaluate`
reports it by consuming nothing.
*/

error_chain! {
    errors {
        #[doc = "A `Region` may contain at most one initial pseudo state."]
        RegionMultipleInitial(region: String) {
            description("A `Region` may contain at most one initial pseudo state.")
            display("region '{}' contains more than one initial pseudo state", region)
        }

        #[doc = "An initial or history pseudo state must have exactly one outgoing transition."]
        InitialTransitionCount(vertex: String) {
            description("An initial or history pseudo state must have exactly one outgoing transition.")
            display("initial pseudo state '{}' must have exactly one outgoing transition", vertex)
        }

        #[doc = "A `FinalState` may not have outgoing transitions."]
        FinalStateTransitions(vertex: String) {
            description("A `FinalState` may not have outgoing transitions.")
            display("final state '{}' may not have outgoing transitions", vertex)
        }

        #[doc = "A transition may not cross between regions of the same orthogonal state."]
        TransitionCrossesRegions(source: String, target: String) {
            description("A transition may not cross between regions of the same orthogonal state.")
            display("transition from '{}' to '{}' crosses orthogonal regions", source, target)
        }

        #[doc = "A `Region` was entered that has neither an initial pseudo state nor usable history."]
        RegionNoInitial(region: String) {
            description("A `Region` was entered that has neither an initial pseudo state nor usable history.")
            display("region '{}' has no initial pseudo state to enter", region)
        }

        #[doc = "A `Junction` requires exactly one outgoing guard to hold, or an else fallback."]
        JunctionSelection(vertex: String) {
            description("A `Junction` requires exactly one outgoing guard to hold, or an else fallback.")
            display("junction '{}' did not select exactly one outgoing transition", vertex)
        }

        #[doc = "A `Choice` requires at least one outgoing guard to hold, or an else fallback."]
        ChoiceSelection(vertex: String) {
            description("A `Choice` requires at least one outgoing guard to hold, or an else fallback.")
            display("choice '{}' found no outgoing transition to select", vertex)
        }

        #[doc = "More than one transition guard held at a single state."]
        MultipleEnabledTransitions(vertex: String) {
            description("More than one transition guard held at a single state.")
            display("state '{}' has more than one enabled transition", vertex)
        }

        #[doc = "The model is dirty and automatic initialisation was disabled."]
        ModelNotInitialised {
            description("The model is dirty and automatic initialisation was disabled.")
            display("the model has not been initialised")
        }
    }
}
