//! Runaway-loop guards for one turn.

use std::collections::HashMap;
use tripwright_core::{canonical_name, DispatchError, EngineConfig};

/// Counts dispatches in one turn, overall and per operation.
#[derive(Debug, Clone)]
pub struct RunawayGuard {
    max_dispatches: usize,
    max_repeats: usize,
    dispatched: usize,
    repeats: HashMap<String, usize>,
}

impl RunawayGuard {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_dispatches: config.max_dispatches_per_turn,
            max_repeats: config.max_repeats_per_operation,
            dispatched: 0,
            repeats: HashMap::new(),
        }
    }

    /// Count one dispatch of `operation`, or refuse it when a limit is hit.
    pub fn admit(&mut self, operation: &str) -> Result<(), DispatchError> {
        if self.dispatched >= self.max_dispatches {
            return Err(DispatchError::TooManyDispatches {
                dispatched: self.dispatched,
                limit: self.max_dispatches,
            });
        }
        let name = canonical_name(operation);
        let repeats = self.repeats.get(name).copied().unwrap_or(0);
        if repeats >= self.max_repeats {
            return Err(DispatchError::TooManyRepeats {
                operation: name.to_string(),
                repeats,
                limit: self.max_repeats,
            });
        }
        self.repeats.insert(name.to_string(), repeats + 1);
        self.dispatched += 1;
        Ok(())
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn guard(max_dispatches: usize, max_repeats: usize) -> RunawayGuard {
        RunawayGuard::new(&EngineConfig {
            max_dispatches_per_turn: max_dispatches,
            max_repeats_per_operation: max_repeats,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_repeat_limit_is_per_operation() {
        let mut g = guard(10, 2);
        assert!(g.admit("flight_quote_search").is_ok());
        assert!(g.admit("travel/flight_quote_search").is_ok());
        assert!(g.admit("hotel_quote_search").is_ok());
        let err = g.admit("flight_quote_search").unwrap_err();
        assert_eq!(
            err,
            DispatchError::TooManyRepeats {
                operation: "flight_quote_search".to_string(),
                repeats: 2,
                limit: 2,
            }
        );
        assert!(err.is_runaway());
        assert_eq!(g.dispatched(), 3);
    }

    #[test]
    fn test_dispatch_limit() {
        let mut g = guard(2, 5);
        assert!(g.admit("a").is_ok());
        assert!(g.admit("b").is_ok());
        assert!(matches!(
            g.admit("c"),
            Err(DispatchError::TooManyDispatches { dispatched: 2, limit: 2 })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Admitted dispatches never exceed either limit.
        #[test]
        fn prop_guard_bounds_dispatches(
            max_dispatches in 1usize..20,
            max_repeats in 1usize..5,
            names in prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..60),
        ) {
            let mut g = guard(max_dispatches, max_repeats);
            let mut admitted: HashMap<&str, usize> = HashMap::new();
            for name in names {
                if g.admit(name).is_ok() {
                    *admitted.entry(name).or_insert(0) += 1;
                }
            }
            prop_assert!(g.dispatched() <= max_dispatches);
            prop_assert!(admitted.values().all(|&n| n <= max_repeats));
            prop_assert_eq!(admitted.values().sum::<usize>(), g.dispatched());
        }
    }
}
