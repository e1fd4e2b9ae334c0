use crate::nfa::MAX_PACKED_STATE;

/// Size limits and tuning for NFA generation.
///
/// ```
/// # use regex_nfa::NfaConfig;
/// let config = NfaConfig::new().with_max_states(10_000).with_max_tracked_conditions(4);
/// assert_eq!(config.max_states(), 10_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NfaConfig {
    max_states: u32,
    max_transitions: u32,
    max_tracked_conditions: usize,
}

impl Default for NfaConfig {
    fn default() -> Self {
        NfaConfig {
            max_states: 3500,
            max_transitions: 32767,
            max_tracked_conditions: 16,
        }
    }
}

impl NfaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of states. Values above what packed operation words
    /// can address are clamped.
    pub fn with_max_states(mut self, limit: u32) -> Self {
        self.max_states = limit.min(MAX_PACKED_STATE + 1);
        self
    }

    pub fn with_max_transitions(mut self, limit: u32) -> Self {
        self.max_transitions = limit;
        self
    }

    /// How many condition groups are folded into state identity. Further
    /// groups are checked at match time through guard constraints.
    pub fn with_max_tracked_conditions(mut self, limit: usize) -> Self {
        self.max_tracked_conditions = limit.min(64);
        self
    }

    #[inline]
    pub fn max_states(&self) -> u32 {
        self.max_states
    }

    #[inline]
    pub fn max_transitions(&self) -> u32 {
        self.max_transitions
    }

    #[inline]
    pub fn max_tracked_conditions(&self) -> usize {
        self.max_tracked_conditions
    }
}
