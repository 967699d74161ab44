//! Operation dispatch seam.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tripwright_core::{canonical_name, DispatchError, OperationCall};

/// Executes one named external operation.
pub trait OperationDispatcher: Send + Sync {
    fn invoke(&self, call: &OperationCall) -> Result<Value, DispatchError>;
}

impl<D: OperationDispatcher + ?Sized> OperationDispatcher for Arc<D> {
    fn invoke(&self, call: &OperationCall) -> Result<Value, DispatchError> {
        (**self).invoke(call)
    }
}

/// Names are `operation`, `namespace/operation` or `namespace/operation/sub`.
pub fn validate_operation_name(name: &str) -> Result<(), DispatchError> {
    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(DispatchError::InvalidOperationName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// The text surfaced to the user for a failed dispatch.
pub fn failure_text(err: &DispatchError) -> String {
    match err {
        DispatchError::OperationFailed { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// SCRIPTED DISPATCHER
// ============================================================================

type Script = VecDeque<Result<Value, String>>;

/// Replays canned responses per operation name.
///
/// Responses are consumed in order; the last one repeats. Every call is
/// recorded, namespaced or not, and looked up by its canonical name.
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<OperationCall>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result for `operation`.
    pub fn respond(self, operation: &str, result: Value) -> Self {
        self.push(operation, Ok(result));
        self
    }

    /// Queue a failure for `operation`.
    pub fn fail(self, operation: &str, error: impl Into<String>) -> Self {
        self.push(operation, Err(error.into()));
        self
    }

    fn push(&self, operation: &str, response: Result<Value, String>) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts
                .entry(canonical_name(operation).to_string())
                .or_default()
                .push_back(response);
        }
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<OperationCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        let wanted = canonical_name(operation);
        self.calls
            .lock()
            .map(|c| c.iter().filter(|call| canonical_name(&call.name) == wanted).count())
            .unwrap_or(0)
    }
}

impl OperationDispatcher for ScriptedDispatcher {
    fn invoke(&self, call: &OperationCall) -> Result<Value, DispatchError> {
        let name = canonical_name(&call.name).to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }

        let failed = |reason: String| DispatchError::OperationFailed {
            operation: name.clone(),
            reason,
        };
        let mut scripts = self
            .scripts
            .lock()
            .map_err(|_| failed("script lock poisoned".to_string()))?;
        let next = scripts.get_mut(&name).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(failed(reason)),
            None => Err(failed("no scripted response".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_name_shapes() {
        assert!(validate_operation_name("flight_quote_search").is_ok());
        assert!(validate_operation_name("travel/flight_quote_search").is_ok());
        assert!(validate_operation_name("travel/quotes/flight").is_ok());
        assert!(validate_operation_name("a/b/c/d").is_err());
        assert!(validate_operation_name("travel/").is_err());
        assert!(validate_operation_name("").is_err());
    }

    #[test]
    fn test_scripted_responses_replay_and_repeat_last() {
        let dispatcher = ScriptedDispatcher::new()
            .respond("flight_quote_search", json!({"options": [1]}))
            .respond("flight_quote_search", json!({"options": [2]}));
        let call = OperationCall::new("travel/flight_quote_search", json!({}));

        assert_eq!(dispatcher.invoke(&call).unwrap()["options"][0], 1);
        assert_eq!(dispatcher.invoke(&call).unwrap()["options"][0], 2);
        assert_eq!(dispatcher.invoke(&call).unwrap()["options"][0], 2);
        assert_eq!(dispatcher.call_count("flight_quote_search"), 3);
    }

    #[test]
    fn test_scripted_failure_and_unknown() {
        let dispatcher = ScriptedDispatcher::new().fail("hotel_quote_search", "upstream timeout");
        let err = dispatcher
            .invoke(&OperationCall::new("hotel_quote_search", json!({})))
            .unwrap_err();
        assert_eq!(failure_text(&err), "upstream timeout");

        let err = dispatcher
            .invoke(&OperationCall::new("trip_option_ranker", json!({})))
            .unwrap_err();
        assert_eq!(failure_text(&err), "no scripted response");
        assert_eq!(dispatcher.calls().len(), 2);
    }

    #[test]
    fn test_guard_errors_keep_full_text() {
        let err = DispatchError::TooManyDispatches {
            dispatched: 24,
            limit: 24,
        };
        assert!(failure_text(&err).starts_with("Dispatch limit reached"));
    }
}
