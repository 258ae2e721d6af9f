/*!
Process-wide runtime settings.

The execution semantics carry a small number of knobs whose lifecycle is the process lifetime:
the namespace separator used when deriving qualified names, the name given to synthesised default
regions, the random source consulted by `Choice` pseudo states, and the switch that makes internal
transitions re-evaluate completion. Each knob has a getter/setter pair; setters are intended for
process start-up or test set-up, before models are compiled or instances driven.

Log output goes through the [`log`](https://docs.rs/log) facade; install any compatible logger to
see traversal breadcrumbs (`debug!`) and validation diagnostics (`warn!`/`error!`).
*/

use std::cell::{Cell, RefCell};
use std::time::{SystemTime, UNIX_EPOCH};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// The signature of the random source used by `Choice` pseudo states: given `max`, return a value
/// in `[0, max)`. Replace it with a constant function for deterministic tests.
///
pub type RandomFn = fn(usize) -> usize;

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

/// The separator joining element names into qualified names.
pub fn namespace_separator() -> String {
    SETTINGS.namespace_separator.borrow().clone()
}

pub fn set_namespace_separator(separator: &str) {
    *SETTINGS.namespace_separator.borrow_mut() = separator.to_string();
}

/// The name given to a region synthesised when a `State` is used as a vertex parent.
pub fn default_region_name() -> String {
    SETTINGS.default_region_name.borrow().clone()
}

pub fn set_default_region_name(name: &str) {
    *SETTINGS.default_region_name.borrow_mut() = name.to_string();
}

/// Draw from the installed random source; returns a value in `[0, max)`.
pub fn random(max: usize) -> usize {
    (SETTINGS.random.get())(max)
}

pub fn set_random(random: RandomFn) {
    SETTINGS.random.set(random);
}

///
/// When `true`, traversing an internal transition re-evaluates the source state's completion
/// transitions after the transition effect has run. Off by default; this is the only
/// runtime-tunable semantic switch.
///
pub fn internal_transitions_trigger_completion() -> bool {
    SETTINGS.internal_completion.get()
}

pub fn set_internal_transitions_trigger_completion(enabled: bool) {
    SETTINGS.internal_completion.set(enabled);
}

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

struct Settings {
    namespace_separator: RefCell<String>,
    default_region_name: RefCell<String>,
    random: Cell<RandomFn>,
    internal_completion: Cell<bool>,
    seed: Cell<u64>,
}

// Execution is single-threaded by contract; the settings block is only ever touched from the
// thread driving models and instances.
#[allow(unsafe_code)]
unsafe impl Sync for Settings {}

lazy_static! {
    static ref SETTINGS: Settings = Settings {
        namespace_separator: RefCell::new(".".to_string()),
        default_region_name: RefCell::new("default".to_string()),
        random: Cell::new(default_random),
        internal_completion: Cell::new(false),
        seed: Cell::new(0),
    };
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

fn default_random(max: usize) -> usize {
    if max < 2 {
        return 0;
    }
    let mut state = SETTINGS.seed.get();
    if state == 0 {
        state = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
            | 1;
    }
    // xorshift64
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    SETTINGS.seed.set(state);
    (state % max as u64) as usize
}

// ------------------------------------------------------------------------------------------------
// Unit Tests
// ------------------------------------------------------------------------------------------------
