//! Server lifecycle.
//!
//! `Uninitialized -> Initialized -> Active -> ShuttingDown`. Initialization
//! happens once; requests that arrive before it run against default settings.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initialized,
    Active,
    ShuttingDown,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns `false` if initialization already happened.
    pub fn initialize(&mut self) -> bool {
        if self.state == LifecycleState::Uninitialized {
            self.state = LifecycleState::Initialized;
            true
        } else {
            false
        }
    }

    /// The client acknowledged initialization.
    pub fn activate(&mut self) {
        if self.state == LifecycleState::Initialized {
            self.state = LifecycleState::Active;
        }
    }

    pub fn shutdown(&mut self) {
        self.state = LifecycleState::ShuttingDown;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == LifecycleState::ShuttingDown
    }
}
