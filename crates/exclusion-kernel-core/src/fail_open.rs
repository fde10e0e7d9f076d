use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt::Display;

/// Boundary for feature integrations: a failing replacement falls back to the
/// host's original behavior, and each integration reports its first failure
/// only.
#[derive(Debug, Default)]
pub struct FailOpen {
    reported: RefCell<BTreeSet<String>>,
}

impl FailOpen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `replacement`; on error log once for `integration` and return
    /// `original()` instead.
    pub fn guard<T, E, R, O>(&self, integration: &str, replacement: R, original: O) -> T
    where
        E: Display,
        R: FnOnce() -> Result<T, E>,
        O: FnOnce() -> T,
    {
        match replacement() {
            Ok(value) => value,
            Err(err) => {
                self.report(integration, &err);
                original()
            }
        }
    }

    #[must_use]
    pub fn has_reported(&self, integration: &str) -> bool {
        self.reported.borrow().contains(integration)
    }

    fn report(&self, integration: &str, err: &dyn Display) {
        if self.reported.borrow_mut().insert(integration.to_string()) {
            tracing::error!(
                target: "exclusions",
                integration,
                error = %err,
                "exclusion integration failed; original behavior kept"
            );
        }
    }
}
