//! Capture session state machine with thread-safe transitions.
//!
//! Valid transitions:
//! - Idle -> Recording (hotkey: start capture)
//! - Recording -> Polishing (hotkey: stop capture and deliver)
//! - Polishing -> Idle (delivery finished or session aborted)
//! - Recording -> Idle (session setup failed)
//!
//! A hotkey press while Polishing is dropped, never queued.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use voicepolish_core::error::PolishError;

/// Operational state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictationState {
    /// No session. Ready to start.
    Idle,
    /// The OS dictation feature is typing into the scratch surface.
    Recording,
    /// Captured text is being rewritten and delivered.
    Polishing,
}

impl fmt::Display for DictationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictationState::Idle => write!(f, "Idle"),
            DictationState::Recording => write!(f, "Recording"),
            DictationState::Polishing => write!(f, "Polishing"),
        }
    }
}

impl DictationState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &DictationState) -> bool {
        matches!(
            (self, target),
            (DictationState::Idle, DictationState::Recording)
                | (DictationState::Recording, DictationState::Polishing)
                | (DictationState::Polishing, DictationState::Idle)
                // Setup failure
                | (DictationState::Recording, DictationState::Idle)
        )
    }
}

/// Procedure a hotkey press launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Stop,
}

/// Thread-safe state machine shared by the hotkey thread and session tasks.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<DictationState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DictationState::Idle)),
        }
    }

    // The guarded value is a plain Copy enum, so a poisoned lock still holds
    // a meaningful state.
    fn lock(&self) -> MutexGuard<'_, DictationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current state.
    pub fn current(&self) -> DictationState {
        *self.lock()
    }

    /// Transition to `target` only if the machine is currently in `expected`.
    ///
    /// Fails without changing state when the machine has moved elsewhere or
    /// the transition is not allowed.
    pub fn transition_from(
        &self,
        expected: DictationState,
        target: DictationState,
    ) -> Result<(), PolishError> {
        let mut state = self.lock();
        if *state == expected && expected.can_transition_to(&target) {
            tracing::debug!("Dictation state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(PolishError::Dictation(format!(
                "Invalid state transition: {} -> {} (expected {})",
                *state, target, expected
            )))
        }
    }

    /// Apply a hotkey press under the lock.
    ///
    /// Idle moves to Recording and Recording moves to Polishing, returning the
    /// procedure to launch. Polishing is left untouched and returns `None`.
    pub fn begin_toggle(&self) -> Option<Trigger> {
        let mut state = self.lock();
        let (next, trigger) = match *state {
            DictationState::Idle => (DictationState::Recording, Trigger::Start),
            DictationState::Recording => (DictationState::Polishing, Trigger::Stop),
            DictationState::Polishing => return None,
        };
        tracing::debug!("Dictation state: {} -> {}", *state, next);
        *state = next;
        Some(trigger)
    }

    /// Force the state machine back to Idle (used for error recovery).
    pub fn reset(&self) {
        let mut state = self.lock();
        tracing::warn!("Dictation state machine reset to Idle from {}", *state);
        *state = DictationState::Idle;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(DictationState::Idle.to_string(), "Idle");
        assert_eq!(DictationState::Recording.to_string(), "Recording");
        assert_eq!(DictationState::Polishing.to_string(), "Polishing");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(DictationState::Idle.can_transition_to(&DictationState::Recording));
        assert!(DictationState::Recording.can_transition_to(&DictationState::Polishing));
        assert!(DictationState::Polishing.can_transition_to(&DictationState::Idle));
        assert!(DictationState::Recording.can_transition_to(&DictationState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!DictationState::Idle.can_transition_to(&DictationState::Polishing));
        assert!(!DictationState::Polishing.can_transition_to(&DictationState::Recording));

        assert!(!DictationState::Idle.can_transition_to(&DictationState::Idle));
        assert!(!DictationState::Recording.can_transition_to(&DictationState::Recording));
        assert!(!DictationState::Polishing.can_transition_to(&DictationState::Polishing));
    }

    #[test]
    fn test_state_machine_happy_path() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), DictationState::Idle);

        sm.transition_from(DictationState::Idle, DictationState::Recording)
            .unwrap();
        sm.transition_from(DictationState::Recording, DictationState::Polishing)
            .unwrap();
        sm.transition_from(DictationState::Polishing, DictationState::Idle)
            .unwrap();
        assert_eq!(sm.current(), DictationState::Idle);
    }

    #[test]
    fn test_state_machine_invalid_transition_error_message() {
        let sm = StateMachine::new();
        match sm.transition_from(DictationState::Idle, DictationState::Polishing) {
            Err(PolishError::Dictation(msg)) => {
                assert!(msg.contains("Idle"));
                assert!(msg.contains("Polishing"));
            }
            other => panic!("Expected Dictation error variant, got {:?}", other),
        }
        assert_eq!(sm.current(), DictationState::Idle);
    }

    #[test]
    fn test_begin_toggle_cycle() {
        let sm = StateMachine::new();

        assert_eq!(sm.begin_toggle(), Some(Trigger::Start));
        assert_eq!(sm.current(), DictationState::Recording);

        assert_eq!(sm.begin_toggle(), Some(Trigger::Stop));
        assert_eq!(sm.current(), DictationState::Polishing);

        // Dropped while polishing, state untouched.
        assert_eq!(sm.begin_toggle(), None);
        assert_eq!(sm.begin_toggle(), None);
        assert_eq!(sm.current(), DictationState::Polishing);

        sm.transition_from(DictationState::Polishing, DictationState::Idle)
            .unwrap();
        assert_eq!(sm.begin_toggle(), Some(Trigger::Start));
    }

    #[test]
    fn test_transition_from_requires_expected_state() {
        let sm = StateMachine::new();
        assert!(sm
            .transition_from(DictationState::Polishing, DictationState::Idle)
            .is_err());
        assert_eq!(sm.current(), DictationState::Idle);

        assert_eq!(sm.begin_toggle(), Some(Trigger::Start));
        assert!(sm
            .transition_from(DictationState::Recording, DictationState::Recording)
            .is_err());
        // A stop moved the state on before a failed start could reset it.
        assert_eq!(sm.begin_toggle(), Some(Trigger::Stop));
        match sm.transition_from(DictationState::Recording, DictationState::Idle) {
            Err(PolishError::Dictation(msg)) => assert!(msg.contains("expected Recording")),
            other => panic!("Expected Dictation error variant, got {:?}", other),
        }
        assert_eq!(sm.current(), DictationState::Polishing);
    }

    #[test]
    fn test_toggle_sequences_always_single_state() {
        // Every state reached through any toggle/finish interleaving is one of
        // the three, and toggles while Polishing never change it.
        let sm = StateMachine::new();
        for step in 0..60 {
            let before = sm.current();
            let trigger = sm.begin_toggle();
            match before {
                DictationState::Idle => assert_eq!(trigger, Some(Trigger::Start)),
                DictationState::Recording => assert_eq!(trigger, Some(Trigger::Stop)),
                DictationState::Polishing => {
                    assert_eq!(trigger, None);
                    assert_eq!(sm.current(), DictationState::Polishing);
                }
            }
            if step % 3 == 2 {
                sm.transition_from(DictationState::Polishing, DictationState::Idle)
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_state_machine_reset() {
        let sm = StateMachine::new();
        sm.begin_toggle();
        sm.begin_toggle();
        sm.reset();
        assert_eq!(sm.current(), DictationState::Idle);
    }

    #[test]
    fn test_state_machine_clone_is_shared() {
        let sm1 = StateMachine::new();
        let sm2 = sm1.clone();

        sm1.begin_toggle();
        assert_eq!(sm2.current(), DictationState::Recording);
    }
}
