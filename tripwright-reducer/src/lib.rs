//! Tripwright Reducer - Decision Engine
//!
//! The Trip Intent state machine. [`DecisionEngine::decide`] takes the
//! document and one [`Event`], applies the event's effects, and returns the
//! operations to run next plus the messages to show the user.
//!
//! Per turn:
//! 1. Apply event effects (`TOOL_ERROR` short-circuits here)
//! 2. Recompute missing required fields; if any, ask for them and stop
//! 3. After an extraction result, run the confirmation gate
//! 4. Once confirmed, quote the first unquoted leg, then the first
//!    unquoted stay, one call at a time
//! 5. Rank when everything is quoted and no bundles exist
//! 6. Render bundles, risk, holds and bookings from the cache
//!
//! The engine keeps no state between calls and never performs I/O.

pub mod args;
pub mod classifier;
pub mod render;
pub mod requirements;

pub use classifier::{ConfirmationClassifier, KeywordClassifier, RecoveryIntent};
pub use requirements::missing_required_fields;

use serde_json::Value;
use std::sync::Arc;
use tripwright_core::{
    canonical_name, ChatMessage, EngineConfig, Event, LastError, OperationCall, OperationKind,
    Selection, ToolFailure, ToolResult, TripIntent, TripwrightResult, WorkflowState,
};

/// Request-scoped inputs that are not part of the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnContext {
    pub conversation_history: Vec<ChatMessage>,
}

/// Output of one `decide` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Calls to dispatch, in order
    pub operations: Vec<OperationCall>,
    pub messages: Vec<String>,
}

impl Decision {
    fn say(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    fn emit(&mut self, call: OperationCall) {
        self.operations.push(call);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.messages.is_empty()
    }
}

/// States in which ranked bundles are (re)presented.
const PRESENTABLE: [WorkflowState; 5] = [
    WorkflowState::ReadyToQuote,
    WorkflowState::QuotingFlights,
    WorkflowState::QuotingHotels,
    WorkflowState::RankingBundles,
    WorkflowState::PresentingOptions,
];

/// The state a retried operation resumes in.
fn resume_state(kind: Option<OperationKind>) -> WorkflowState {
    match kind {
        Some(OperationKind::FlightQuoteSearch) => WorkflowState::QuotingFlights,
        Some(OperationKind::HotelQuoteSearch) => WorkflowState::QuotingHotels,
        Some(OperationKind::TripOptionRanker) => WorkflowState::RankingBundles,
        Some(OperationKind::PolicyAndRiskCheck) => WorkflowState::RiskChecking,
        Some(OperationKind::ReservationHoldCreate) => WorkflowState::PlacingHolds,
        Some(OperationKind::BookingConfirmAndPurchase) => WorkflowState::Purchasing,
        Some(OperationKind::RequirementsExtract)
        | Some(OperationKind::FollowupQuestions)
        | None => WorkflowState::CollectingRequirements,
    }
}

fn result_kind(event: &Event) -> Option<OperationKind> {
    match event {
        Event::ToolResult(result) => OperationKind::from_name(&result.operation),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// DECISION ENGINE
// ============================================================================

pub struct DecisionEngine {
    config: EngineConfig,
    classifier: Arc<dyn ConfirmationClassifier>,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Create an engine with the keyword classifier.
    pub fn new(config: EngineConfig) -> TripwrightResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classifier: Arc::new(KeywordClassifier::new()),
        })
    }

    /// Replace the confirmation classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn ConfirmationClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn call(&self, kind: OperationKind, arguments: Value) -> OperationCall {
        OperationCall::new(kind.qualified(&self.config.operation_namespace), arguments)
    }

    /// Decide what happens next for `doc` given `event`.
    pub fn decide(&self, doc: &mut TripIntent, event: &Event, ctx: &TurnContext) -> Decision {
        let mut decision = Decision::default();
        self.run(doc, event, ctx, &mut decision);

        tracing::debug!(
            trip_id = %doc.trip_id,
            event = event.event_type(),
            state = %doc.status.state(),
            operations = ?decision.operations.iter().map(|op| op.name.as_str()).collect::<Vec<_>>(),
            "Decision made"
        );
        decision
    }

    fn run(&self, doc: &mut TripIntent, event: &Event, ctx: &TurnContext, d: &mut Decision) {
        // --- 1. event effects ---
        match event {
            Event::ToolError(failure) => {
                self.record_failure(doc, failure, d);
                return;
            }
            Event::UserMessage { text } => {
                if let Some(call) = self.retry_call(doc, text) {
                    doc.status.last_error = None;
                    doc.status.set_state(resume_state(call.kind()));
                    d.say(format!("Retrying {}…", canonical_name(&call.name)));
                    d.emit(call);
                    return;
                }
                self.on_user_message(doc, text, ctx, d);
            }
            Event::UserSelectedBundle { bundle_id } => self.on_bundle_selected(doc, bundle_id, d),
            Event::UserRequestHold {} => self.on_hold_request(doc, d),
            Event::UserApprovedPurchase {
                approval_token,
                payment_method_id,
            } => self.on_purchase_approved(doc, approval_token, payment_method_id, d),
            Event::IntentReady {} => {
                doc.status.set_state(WorkflowState::ReadyToQuote);
                d.say(render::SEARCHING);
            }
            Event::ToolResult(_) => {
                if result_kind(event) == Some(OperationKind::FollowupQuestions) {
                    let questions = doc.working_memory.followup_questions.clone().unwrap_or_default();
                    d.messages.extend(questions);
                }
            }
        }

        // --- 2. required fields, recomputed from scratch ---
        let missing = missing_required_fields(&doc.itinerary, &doc.party);
        doc.status.missing_required = missing.clone();
        if !missing.is_empty() {
            doc.status.set_state(WorkflowState::CollectingRequirements);
            let asked = matches!(event, Event::UserMessage { .. })
                || result_kind(event) == Some(OperationKind::FollowupQuestions);
            if !asked {
                d.operations = vec![self.call(
                    OperationKind::FollowupQuestions,
                    args::followup_questions(doc, &missing),
                )];
            }
            return;
        }
        if matches!(event, Event::UserMessage { .. }) {
            return;
        }

        // --- 3. confirmation gate ---
        if let Event::ToolResult(result) = event {
            if result_kind(event) == Some(OperationKind::RequirementsExtract)
                && self.confirmation_gate(doc, result, ctx, d)
            {
                return;
            }
        }

        // --- 4/5. quoting walk and ranking ---
        let parked = matches!(
            doc.status.state(),
            WorkflowState::Completed | WorkflowState::Retryable
        );
        if doc.status.is_confirmed() && d.operations.is_empty() && !parked {
            self.plan_quotes(doc, d);
        }

        // --- 6. read-only rendering ---
        if d.operations.is_empty() {
            self.render_cache(doc, event, d);
        }
    }

    // ------------------------------------------------------------------------
    // Event effects
    // ------------------------------------------------------------------------

    fn record_failure(&self, doc: &mut TripIntent, failure: &ToolFailure, d: &mut Decision) {
        tracing::warn!(
            trip_id = %doc.trip_id,
            operation = %failure.operation,
            error = %failure.error,
            "Operation failed"
        );
        doc.status.last_error = Some(LastError {
            operation: failure.operation.clone(),
            error: failure.error.clone(),
            arguments: failure.arguments.clone(),
        });
        doc.status.set_state(WorkflowState::Retryable);
        doc.status.push_note(format!(
            "[tool_error] {} failed: {}. Say 'try again' or send a new message.",
            failure.operation, failure.error
        ));
        d.say(render::tool_error(&failure.operation, &failure.error));
    }

    /// The failed call to re-emit, when the user asks for a retry.
    fn retry_call(&self, doc: &TripIntent, text: &str) -> Option<OperationCall> {
        if doc.status.state() != WorkflowState::Retryable {
            return None;
        }
        let last = doc.status.last_error.as_ref()?;
        let intent = self
            .classifier
            .classify_error_recovery(text, &last.operation, &last.error);
        intent
            .retry
            .then(|| OperationCall::new(last.operation.clone(), last.arguments.clone()))
    }

    fn on_user_message(&self, doc: &mut TripIntent, text: &str, ctx: &TurnContext, d: &mut Decision) {
        doc.request.user_message = text.to_string();
        doc.status.last_error = None;
        if doc.status.state() != WorkflowState::AwaitingConfirmation {
            doc.status.set_state(WorkflowState::CollectingRequirements);
        }
        d.emit(self.call(
            OperationKind::RequirementsExtract,
            args::extraction(doc, text, &ctx.conversation_history),
        ));
    }

    fn on_bundle_selected(&self, doc: &mut TripIntent, bundle_id: &str, d: &mut Decision) {
        let Some(bundle) = doc.working_memory.find_bundle(bundle_id).cloned() else {
            tracing::warn!(trip_id = %doc.trip_id, bundle_id = %bundle_id, "Unknown bundle selected");
            d.say(render::unknown_bundle(bundle_id, doc.working_memory.bundles()));
            return;
        };

        let selection = Selection {
            bundle_id: Some(bundle.bundle_id),
            flight_option_ids: bundle.flight_option_ids,
            hotel_option_ids: bundle.hotel_option_ids,
        };
        let wm = &mut doc.working_memory;
        wm.risk_report = None;
        if wm.holds.take().is_some_and(|holds| !holds.is_empty()) {
            doc.status
                .push_note(format!("[selection] Selected {}; earlier holds dropped", bundle_id));
        }
        doc.working_memory.selected = Some(selection.clone());
        doc.status.set_state(WorkflowState::RiskChecking);
        d.emit(self.call(
            OperationKind::PolicyAndRiskCheck,
            args::risk_check(doc, &selection),
        ));
    }

    fn on_hold_request(&self, doc: &mut TripIntent, d: &mut Decision) {
        let wm = &doc.working_memory;
        let Some(selection) = wm.selected.clone().filter(|s| s.bundle_id.is_some()) else {
            d.say("Please pick a bundle_id first.");
            return;
        };
        if wm.risk_report.as_ref().is_some_and(|r| r.is_blocking()) {
            d.say("I can't place holds because the selected bundle has blocking policy issues.");
            return;
        }
        match args::hold(doc, &selection) {
            Some(arguments) => {
                doc.status.set_state(WorkflowState::PlacingHolds);
                d.emit(self.call(OperationKind::ReservationHoldCreate, arguments));
            }
            None => d.say("Missing selected flight/hotel option ids. Please select the bundle again."),
        }
    }

    fn on_purchase_approved(
        &self,
        doc: &mut TripIntent,
        approval_token: &str,
        payment_method_id: &str,
        d: &mut Decision,
    ) {
        let hold_ids = doc.working_memory.active_hold_ids();
        if hold_ids.is_empty() {
            d.say("No active holds found. Say 'hold' first, then approve purchase.");
            return;
        }
        if doc.policy.rules.require_user_approval_to_purchase && approval_token.trim().is_empty() {
            d.say("Purchases need your approval. Reply 'approve purchase approval_token=<token> payment_method_id=<id>'.");
            return;
        }
        doc.status.set_state(WorkflowState::Purchasing);
        d.emit(self.call(
            OperationKind::BookingConfirmAndPurchase,
            args::purchase(doc, approval_token, payment_method_id, &hold_ids),
        ));
    }

    // ------------------------------------------------------------------------
    // Confirmation gate
    // ------------------------------------------------------------------------

    /// Returns true when the turn ends at the gate.
    fn confirmation_gate(
        &self,
        doc: &mut TripIntent,
        result: &ToolResult,
        ctx: &TurnContext,
        d: &mut Decision,
    ) -> bool {
        if doc.status.state() != WorkflowState::AwaitingConfirmation {
            doc.status.set_state(WorkflowState::AwaitingConfirmation);
            d.say(render::confirmation_request(doc));
            return true;
        }

        let message = result
            .user_message
            .clone()
            .unwrap_or_else(|| doc.request.user_message.clone());
        let summary = render::trip_summary(doc);
        if self.classifier.classify_confirmation(&message, &summary) {
            doc.status.set_state(WorkflowState::ReadyToQuote);
            d.say(render::SEARCHING);
            return false;
        }

        let mut clarifying = string_list(result.result.get("clarifying_questions"));
        if clarifying.is_empty() && !message.trim().is_empty() {
            clarifying.extend(self.classifier.infer_clarifying_question(
                &message,
                &ctx.conversation_history,
                &summary,
            ));
        }
        if !clarifying.is_empty() {
            d.messages.extend(clarifying);
            return true;
        }

        let extractor_missing = string_list(result.result.get("missing_required_fields"));
        if !extractor_missing.is_empty() {
            d.emit(self.call(
                OperationKind::FollowupQuestions,
                args::followup_questions(doc, &extractor_missing),
            ));
            return true;
        }

        d.say(render::reconfirmation_request(doc));
        true
    }

    // ------------------------------------------------------------------------
    // Quoting walk
    // ------------------------------------------------------------------------

    fn plan_quotes(&self, doc: &mut TripIntent, d: &mut Decision) {
        if let Some(i) = doc.first_unquoted_flight_leg() {
            doc.status.set_state(WorkflowState::QuotingFlights);
            if let Some(arguments) = args::flight_quote(doc, i, &self.config) {
                d.emit(self.call(OperationKind::FlightQuoteSearch, arguments));
            }
            return;
        }
        if let Some(j) = doc.first_unquoted_stay() {
            doc.status.set_state(WorkflowState::QuotingHotels);
            if let Some(arguments) = args::hotel_quote(doc, j, &self.config) {
                d.emit(self.call(OperationKind::HotelQuoteSearch, arguments));
            }
            return;
        }
        if doc.working_memory.ranked_bundles.is_some() {
            return;
        }

        let empty = empty_quotes(doc);
        if !empty.is_empty() {
            d.say(format!(
                "I couldn't find options for {}. Tell me what to change and I'll search again.",
                empty.join(", ")
            ));
            return;
        }
        doc.status.set_state(WorkflowState::RankingBundles);
        d.emit(self.call(OperationKind::TripOptionRanker, args::ranker(doc, &self.config)));
    }

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------

    fn render_cache(&self, doc: &mut TripIntent, event: &Event, d: &mut Decision) {
        let kind = result_kind(event);
        let state = doc.status.state();
        let wm = &doc.working_memory;

        if wm.has_ranked_bundles() && PRESENTABLE.contains(&state) {
            d.say(render::bundles(wm.bundles(), self.config.bundles_presented));
            doc.status.set_state(WorkflowState::PresentingOptions);
            return;
        }
        if kind == Some(OperationKind::TripOptionRanker) && !wm.has_ranked_bundles() {
            d.say("No bundles could be built from these quotes. Tell me what to change and I'll search again.");
            return;
        }

        match state {
            WorkflowState::RiskChecking => {
                if let Some(report) = &wm.risk_report {
                    d.messages.extend(render::risk_report(report));
                }
            }
            WorkflowState::PlacingHolds if kind == Some(OperationKind::ReservationHoldCreate) => {
                d.say(render::holds_placed(wm.holds.as_deref().unwrap_or(&[])));
            }
            WorkflowState::Completed if kind == Some(OperationKind::BookingConfirmAndPurchase) => {
                let last = wm.bookings.as_ref().and_then(|b| b.last());
                d.say(render::booking_confirmed(last));
            }
            _ => {}
        }
    }
}

/// Legs and stays that were quoted but came back with no options.
fn empty_quotes(doc: &TripIntent) -> Vec<String> {
    let wm = &doc.working_memory;
    let mut out = Vec::new();
    for i in doc.itinerary.flight_segment_indices() {
        if wm.flight_quotes(i).is_some_and(|options| options.is_empty()) {
            let s = &doc.itinerary.segments[i];
            out.push(format!(
                "leg {} ({} → {})",
                i + 1,
                s.origin.code.as_deref().unwrap_or("?"),
                s.destination.code.as_deref().unwrap_or("?")
            ));
        }
    }
    for (j, stay) in doc.stays_to_quote().iter().enumerate() {
        let empty = wm
            .hotel_quotes(j)
            .is_some_and(|rooms| rooms.is_empty() || rooms.iter().any(Vec::is_empty));
        if empty {
            out.push(format!(
                "stay {} ({})",
                j + 1,
                stay.location_code.as_deref().unwrap_or("?")
            ));
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
