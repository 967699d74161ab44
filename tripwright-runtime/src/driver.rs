//! The turn driver.
//!
//! One turn: route the user's text to an event, decide, then run the
//! returned operations FIFO. Each result is folded into the document and
//! fed back to the decision engine, whose follow-up operations join the
//! queue. Failures of any kind come back in as `TOOL_ERROR`, which ends
//! the chain because the engine returns no operations for it.

use crate::dispatcher::{failure_text, validate_operation_name, OperationDispatcher};
use crate::guards::RunawayGuard;
use crate::router;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tripwright_core::{
    AuditEntry, EngineConfig, Event, OperationCall, Status, Timestamp, ToolResult, TripIntent,
    TripwrightResult, ValidationError,
};
use tripwright_reducer::{ConfirmationClassifier, Decision, DecisionEngine, TurnContext};
use tripwright_storage::DocumentStore;
use uuid::Uuid;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// What one turn did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReport {
    pub trip_id: String,
    pub status: Status,
    /// User-facing messages, in the order they were produced
    pub messages: Vec<String>,
    /// Operation names actually dispatched
    pub dispatched: Vec<String>,
}

impl TurnReport {
    fn new(trip_id: &str) -> Self {
        Self {
            trip_id: trip_id.to_string(),
            status: Status::default(),
            messages: Vec::new(),
            dispatched: Vec::new(),
        }
    }
}

pub struct TurnDriver<S, D> {
    engine: DecisionEngine,
    store: S,
    dispatcher: D,
    clock: Clock,
}

impl<S: DocumentStore, D: OperationDispatcher> TurnDriver<S, D> {
    pub fn new(config: EngineConfig, store: S, dispatcher: D) -> TripwrightResult<Self> {
        Ok(Self {
            engine: DecisionEngine::new(config)?,
            store,
            dispatcher,
            clock: Arc::new(Utc::now),
        })
    }

    /// Build with `TRIPWRIGHT_*` environment overrides over the defaults.
    pub fn from_env(store: S, dispatcher: D) -> TripwrightResult<Self> {
        Self::new(EngineConfig::from_env(), store, dispatcher)
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ConfirmationClassifier>) -> Self {
        self.engine = self.engine.with_classifier(classifier);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a new trip under a fresh id.
    pub fn start_trip(&self, user_text: &str, ctx: &TurnContext) -> TripwrightResult<TurnReport> {
        let trip_id = format!("trip_{}", Uuid::now_v7().simple());
        self.run_turn(&trip_id, user_text, ctx)
    }

    /// Run one user turn for `trip_id`, creating the trip if it is new.
    pub fn run_turn(
        &self,
        trip_id: &str,
        user_text: &str,
        ctx: &TurnContext,
    ) -> TripwrightResult<TurnReport> {
        let now = (self.clock)();
        let text = user_text.trim();

        let mut doc = match self.store.get(trip_id)? {
            Some(doc) => doc,
            None => {
                tracing::info!(trip_id = %trip_id, "Starting new trip");
                TripIntent::new(trip_id, text, now)
            }
        };
        doc.request.user_message = text.to_string();
        doc.request.now_date = Some(now.date_naive());
        if doc.request.timezone.is_empty() {
            doc.request.timezone = self.engine.config().default_timezone.clone();
        }
        doc.updated_at = Some(now);

        let event = router::route(text);
        record_event(&mut doc, &event, now);
        tracing::info!(trip_id = %trip_id, event = event.event_type(), "Turn started");

        let mut report = TurnReport::new(trip_id);
        let decision = self.step(&mut doc, &event, ctx, &mut report)?;
        self.drain(&mut doc, decision.operations, ctx, Some(text), &mut report)?;
        Ok(self.finish(&doc, report))
    }

    /// Run an externally prepared document from `INTENT_READY`.
    pub fn run_ready(&self, trip_intent: TripIntent, ctx: &TurnContext) -> TripwrightResult<TurnReport> {
        if trip_intent.trip_id.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "trip_id".to_string(),
            }
            .into());
        }
        let now = (self.clock)();
        let mut doc = trip_intent;
        doc.updated_at = Some(now);
        if doc.request.now_date.is_none() {
            doc.request.now_date = Some(now.date_naive());
        }

        let event = Event::IntentReady {};
        record_event(&mut doc, &event, now);
        tracing::info!(trip_id = %doc.trip_id, event = event.event_type(), "Turn started");

        let mut report = TurnReport::new(&doc.trip_id);
        let decision = self.step(&mut doc, &event, ctx, &mut report)?;
        self.drain(&mut doc, decision.operations, ctx, None, &mut report)?;
        Ok(self.finish(&doc, report))
    }

    /// Decide, persist, and collect the messages.
    fn step(
        &self,
        doc: &mut TripIntent,
        event: &Event,
        ctx: &TurnContext,
        report: &mut TurnReport,
    ) -> TripwrightResult<Decision> {
        let mut decision = self.engine.decide(doc, event, ctx);
        self.store.save(&doc.trip_id, doc)?;
        report.messages.append(&mut decision.messages);
        Ok(decision)
    }

    fn drain(
        &self,
        doc: &mut TripIntent,
        initial: Vec<OperationCall>,
        ctx: &TurnContext,
        user_text: Option<&str>,
        report: &mut TurnReport,
    ) -> TripwrightResult<()> {
        let mut queue: VecDeque<OperationCall> = initial.into();
        let mut guard = RunawayGuard::new(self.engine.config());

        while let Some(call) = queue.pop_front() {
            if let Err(err) = guard.admit(&call.name) {
                tracing::warn!(
                    trip_id = %doc.trip_id,
                    operation = %call.name,
                    error = %err,
                    "Runaway guard tripped; ending turn"
                );
                let event = Event::tool_error(call.name, call.arguments, failure_text(&err));
                self.step(doc, &event, ctx, report)?;
                queue.clear();
                break;
            }

            let event = self.execute(doc, &call, user_text, report)?;
            let decision = self.step(doc, &event, ctx, report)?;
            queue.extend(decision.operations);
        }

        tracing::debug!(trip_id = %doc.trip_id, dispatched = guard.dispatched(), "Queue drained");
        Ok(())
    }

    /// Dispatch and fold one call, turning any failure into `TOOL_ERROR`.
    fn execute(
        &self,
        doc: &mut TripIntent,
        call: &OperationCall,
        user_text: Option<&str>,
        report: &mut TurnReport,
    ) -> TripwrightResult<Event> {
        let failed = |error: String| Event::tool_error(call.name.clone(), call.arguments.clone(), error);

        if let Err(err) = validate_operation_name(&call.name) {
            tracing::warn!(operation = %call.name, "Refusing invalid operation name");
            return Ok(failed(failure_text(&err)));
        }

        report.dispatched.push(call.name.clone());
        let result = match self.dispatcher.invoke(call) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(
                    trip_id = %doc.trip_id,
                    operation = %call.name,
                    error = %err,
                    "Operation failed"
                );
                return Ok(failed(failure_text(&err)));
            }
        };

        if let Err(err) = tripwright_fold::fold(doc, &call.name, &result, &call.arguments) {
            tracing::warn!(
                trip_id = %doc.trip_id,
                operation = %call.name,
                error = %err,
                "Result could not be folded"
            );
            return Ok(failed(err.to_string()));
        }
        self.store.save(&doc.trip_id, doc)?;

        Ok(Event::ToolResult(ToolResult {
            operation: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            user_message: user_text.map(String::from),
        }))
    }

    fn finish(&self, doc: &TripIntent, mut report: TurnReport) -> TurnReport {
        report.status = doc.status.clone();
        tracing::info!(
            trip_id = %doc.trip_id,
            state = %doc.status.state(),
            dispatched = report.dispatched.len(),
            "Turn finished"
        );
        report
    }
}

/// Append the routed event to the audit trail.
fn record_event(doc: &mut TripIntent, event: &Event, at: Timestamp) {
    let data = serde_json::to_value(event)
        .ok()
        .and_then(|mut v| v.get_mut("data").map(Value::take))
        .unwrap_or(Value::Null);
    doc.audit.events.push(AuditEntry {
        at,
        event_type: event.event_type().to_string(),
        data,
    });
}
