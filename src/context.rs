//! The observation context (§3, §4.6, §5, §9 — component C6).
//!
//! Every formula execution is performed through
//! [`ObservationContext::execute`], which records the formula's identity,
//! its input points, and its output points as a tree of nested
//! [`Action`]s. The stack is `thread_local!`: concurrent multipliers running
//! on different threads each get their own trace, matching §5's concurrency
//! model. Frames are opened with [`ObservationContext::enter`] and always
//! closed — on success, on formula error, or if the caller panics mid-frame
//! — because closing happens in [`ActionGuard`]'s `Drop` impl rather than in
//! a fallible "pop" call the caller must remember to invoke.

use std::cell::RefCell;

use crate::error::Result;
use crate::formula::Formula;
use crate::point::Point;

/// A single recorded formula invocation.
#[derive(Debug, Clone)]
pub struct Action {
    pub formula_name: String,
    pub inputs: Vec<Point>,
    pub outputs: Vec<Point>,
    pub children: Vec<Action>,
    pub failed: bool,
}

impl Action {
    fn new(formula_name: String, inputs: Vec<Point>) -> Self {
        Action { formula_name, inputs, outputs: Vec::new(), children: Vec::new(), failed: false }
    }
}

thread_local! {
    static STACK: RefCell<Vec<Action>> = RefCell::new(Vec::new());
    static TRACE: RefCell<Vec<Action>> = RefCell::new(Vec::new());
}

/// A scoped guard for one pushed frame. Dropping it pops the frame and
/// attaches it — successful or not — to its parent (or to the root trace).
struct ActionGuard {
    closed: bool,
}

impl ActionGuard {
    fn close(&mut self, outputs: Vec<Point>, failed: bool) {
        if self.closed {
            return;
        }
        self.closed = true;
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let mut action = stack.pop().expect("ObservationContext frame underflow");
            action.outputs = outputs;
            action.failed = failed;
            match stack.last_mut() {
                Some(parent) => parent.children.push(action),
                None => TRACE.with(|trace| trace.borrow_mut().push(action)),
            }
        });
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        // If `close` was never called explicitly (a panic unwound through),
        // still close the frame so the stack discipline in §5 holds.
        self.close(Vec::new(), true);
    }
}

/// The thread-scoped recorder described in §4.6.
///
/// There is exactly one context per thread; it has no constructible state of
/// its own (the stack lives in thread-local storage), so `ObservationContext`
/// is a zero-sized handle obtained via [`ObservationContext::current`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ObservationContext;

impl ObservationContext {
    /// Returns the handle for the calling thread's observation context.
    pub fn current() -> Self {
        ObservationContext
    }

    /// Executes `formula` against `points` and `params`, recording the
    /// invocation as a child of the currently open frame (or as a new root
    /// action, if no frame is open). This is the single entry point every
    /// `ScalarMultiplier` helper (`_add`, `_dbl`, `_ladd`, ...) calls through.
    pub fn execute(
        &self,
        formula: &Formula,
        points: &[&Point],
        params: &std::collections::BTreeMap<String, crate::field::FieldElement>,
    ) -> Result<Vec<Point>> {
        let mut guard = self.enter(formula.name().to_string(), points.iter().map(|p| (*p).clone()).collect());
        tracing::trace!(formula = formula.name(), inputs = points.len(), "executing formula");
        let result = formula.evaluate(points, params);
        match &result {
            Ok(outputs) => guard.close(outputs.clone(), false),
            Err(error) => {
                tracing::debug!(formula = formula.name(), %error, "formula execution failed");
                guard.close(Vec::new(), true);
            }
        }
        result
    }

    fn enter(&self, formula_name: String, inputs: Vec<Point>) -> ActionGuard {
        STACK.with(|stack| stack.borrow_mut().push(Action::new(formula_name, inputs)));
        ActionGuard { closed: false }
    }

    /// Returns the root-level actions recorded so far on this thread, and
    /// clears the trace. Intended for downstream side-channel analysis
    /// tooling (out of scope for this crate) to drain.
    pub fn take_trace(&self) -> Vec<Action> {
        TRACE.with(|trace| trace.borrow_mut().drain(..).collect())
    }
}
