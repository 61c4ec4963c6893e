//! Runtime invariant checks with contract-test support
//!
//! Production paths call [`assert_invariant!`](crate::assert_invariant) at the
//! points where a session invariant must hold. Each check is recorded per
//! thread, so a test can afterwards demand that a given invariant was actually
//! exercised:
//!
//! ```rust,ignore
//! session.close()?;
//! crabpreview::invariants::contract_test("close", &[CLOSE_RETURNS_IDLE]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

/// Close always leaves the session idle with no device handle
pub const CLOSE_RETURNS_IDLE: &str = "close leaves the session idle without a device handle";
/// An open never starts while a device handle is still owned
pub const OPEN_STARTS_WITHOUT_DEVICE: &str = "open starts without an owned device handle";

thread_local! {
    static CHECKED: RefCell<HashMap<&'static str, u64>> = RefCell::new(HashMap::new());
}

/// Assert an invariant and record that it was checked.
///
/// Panics with the invariant text (and optional context) when the condition
/// is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $invariant:expr) => {
        $crate::invariants::__check($condition, $invariant, None)
    };
    ($condition:expr, $invariant:expr, $context:expr) => {
        $crate::invariants::__check($condition, $invariant, Some($context))
    };
}

#[doc(hidden)]
pub fn __check(condition: bool, invariant: &'static str, context: Option<&str>) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(invariant).or_insert(0) += 1;
    });

    if !condition {
        panic!(
            "invariant violated [{}]: {}",
            context.unwrap_or("unknown"),
            invariant
        );
    }
}

/// How many times `invariant` was checked on this thread
pub fn times_checked(invariant: &str) -> u64 {
    CHECKED.with(|checked| checked.borrow().get(invariant).copied().unwrap_or(0))
}

/// Panic unless every invariant in `required` was checked on this thread.
pub fn contract_test(name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|invariant| times_checked(invariant) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "contract [{}] not exercised:\n  - {}",
            name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_checked() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
