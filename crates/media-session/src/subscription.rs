use std::fmt;

/// Scoped event subscription.
///
/// Holds the revoke action of one OS event registration and runs it exactly
/// once, when the handle is dropped or [`revoke`](Self::revoke)d. Handles are
/// deliberately `!Send`: they belong to the thread that subscribed.
pub struct Subscription {
    name: &'static str,
    revoke: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(name: &'static str, revoke: impl FnOnce() + 'static) -> Self {
        Self {
            name,
            revoke: Some(Box::new(revoke)),
        }
    }

    /// A subscription with nothing to undo
    pub fn noop(name: &'static str) -> Self {
        Self { name, revoke: None }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn revoke(mut self) {
        self.run_revoke();
    }

    fn run_revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            tracing::trace!("Revoking {} subscription", self.name);
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("active", &self.revoke.is_some())
            .finish()
    }
}
