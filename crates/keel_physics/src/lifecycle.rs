//! Lifecycle state machine for components owning a native object.
//!
//! Every component that mirrors itself into the native engine carries a
//! [`NativeLifecycle`]. Transitions are explicit: creation and destruction
//! both pass through an intermediate state so re-entrant calls (a destroy
//! triggered from inside a create, or vice versa) can be detected instead of
//! corrupting the native mirror.

use log::error;

/// Where a component stands relative to its native counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No native object exists and none has ever been created.
    #[default]
    NotInitialized,
    /// Native creation is in progress.
    Initializing,
    /// The native object exists and is being mirrored.
    Initialized,
    /// Native destruction is in progress.
    Destroying,
    /// The native object was destroyed; creation may run again.
    Destroyed,
}

/// Lifecycle tracking plus a latch for absorbed creation failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLifecycle {
    state: LifecycleState,
    /// Set when a creation attempt failed; blocks silent retry loops.
    failed: bool,
}

impl NativeLifecycle {
    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether a native object currently exists.
    pub fn has_native(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Initializing | LifecycleState::Initialized | LifecycleState::Destroying
        )
    }

    /// Whether a fresh creation attempt is allowed.
    pub fn can_create(&self) -> bool {
        !self.failed
            && matches!(
                self.state,
                LifecycleState::NotInitialized | LifecycleState::Destroyed
            )
    }

    /// Whether the last creation attempt failed.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Enter the creating state.
    pub fn begin_create(&mut self) {
        debug_assert!(self.can_create());
        self.state = LifecycleState::Initializing;
    }

    /// Creation succeeded.
    pub fn finish_create(&mut self) {
        debug_assert_eq!(self.state, LifecycleState::Initializing);
        self.state = LifecycleState::Initialized;
    }

    /// Creation failed. The failure is logged and latched; the component
    /// stays inert until state is reset externally.
    pub fn fail_create(&mut self, what: &str, err: &crate::error::PhysicsError) {
        error!("failed to create native {what}: {err}");
        self.state = LifecycleState::NotInitialized;
        self.failed = true;
    }

    /// Enter the destroying state.
    pub fn begin_destroy(&mut self) {
        debug_assert_eq!(self.state, LifecycleState::Initialized);
        self.state = LifecycleState::Destroying;
    }

    /// Destruction finished (successfully or against a disposed world).
    pub fn finish_destroy(&mut self) {
        self.state = LifecycleState::Destroyed;
    }

    /// Clear the failure latch, allowing creation to be retried.
    pub fn clear_failure(&mut self) {
        self.failed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut lc = NativeLifecycle::default();
        assert!(lc.can_create());
        assert!(!lc.has_native());

        lc.begin_create();
        assert!(lc.has_native());
        assert!(!lc.can_create());
        lc.finish_create();
        assert_eq!(lc.state(), LifecycleState::Initialized);

        lc.begin_destroy();
        assert!(lc.has_native());
        lc.finish_destroy();
        assert!(!lc.has_native());
        assert!(lc.can_create());
    }

    #[test]
    fn failure_latches_until_cleared() {
        let mut lc = NativeLifecycle::default();
        lc.begin_create();
        lc.fail_create("body", &crate::error::PhysicsError::WorldDisposed);

        assert!(!lc.has_native());
        assert!(lc.has_failed());
        assert!(!lc.can_create());

        lc.clear_failure();
        assert!(lc.can_create());
    }
}
