//! Requirements extraction: translate an extractor result into a [`Patch`].
//!
//! The extractor is a language-model service, so its output is read
//! leniently: codes may be bare strings or `{code}` maps, lists may be
//! `null`, and unusable dates are dropped with a note instead of failing
//! the fold.
//!
//! Existing segments and stays are never truncated. Extracted entries
//! overlay existing ones by position, only for the fields they specify,
//! and any surplus entries are appended. Surplus entries that specify
//! nothing are dropped, so the ones after them close up and land one
//! position earlier than their extracted index.

use chrono::Duration;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tripwright_core::{
    Date, OperationKind, Patch, Place, Segment, Stay, TimeWindow, TransportMode, TripIntent,
    TripType, ValidationError,
};

/// Patch source recorded in status notes.
pub const PATCH_SOURCE: &str = "trip_requirements_extract";

// ============================================================================
// EXTRACTOR OUTPUT
// ============================================================================

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A place given either as a bare code or as `{code}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlaceRef {
    Code(String),
    Place {
        #[serde(default)]
        code: Option<String>,
    },
}

impl PlaceRef {
    pub fn code(&self) -> Option<String> {
        let raw = match self {
            PlaceRef::Code(code) => Some(code.as_str()),
            PlaceRef::Place { code } => code.as_deref(),
        }?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

fn code_of(place: &Option<PlaceRef>, fallback: &Option<String>) -> Option<String> {
    place
        .as_ref()
        .and_then(PlaceRef::code)
        .or_else(|| fallback.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "nullable")]
    pub trip_intent: ExtractedIntent,
    #[serde(default, deserialize_with = "nullable")]
    pub missing_required_fields: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub clarifying_questions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedIntent {
    #[serde(default)]
    pub origin: Option<PlaceRef>,
    #[serde(default)]
    pub destination: Option<PlaceRef>,
    #[serde(default, deserialize_with = "nullable")]
    pub dates: ExtractedDates,
    #[serde(default)]
    pub trip_type: Option<String>,
    #[serde(default)]
    pub travelers: Option<ExtractedTravelers>,
    #[serde(default, deserialize_with = "nullable")]
    pub segments: Vec<ExtractedSegment>,
    #[serde(default, deserialize_with = "nullable")]
    pub stays: Vec<ExtractedStay>,
    #[serde(default, deserialize_with = "nullable")]
    pub lodging: ExtractedLodging,
    #[serde(default)]
    pub cabin: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub constraints: ExtractedConstraints,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedDates {
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedTravelers {
    #[serde(default)]
    pub adults: Option<u32>,
    #[serde(default)]
    pub children: Option<u32>,
    #[serde(default)]
    pub infants: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedSegment {
    #[serde(default)]
    pub segment_id: Option<String>,
    #[serde(default)]
    pub origin: Option<PlaceRef>,
    #[serde(default)]
    pub origin_code: Option<String>,
    #[serde(default)]
    pub destination: Option<PlaceRef>,
    #[serde(default)]
    pub destination_code: Option<String>,
    #[serde(default)]
    pub depart_date: Option<String>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub depart_time_window: Option<TimeWindow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedStay {
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default)]
    pub destination: Option<PlaceRef>,
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub location_hint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedLodging {
    #[serde(default)]
    pub needed: Option<bool>,
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub location_hint: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub stays: Vec<ExtractedStay>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedConstraints {
    #[serde(default)]
    pub max_stops: Option<u32>,
    #[serde(default)]
    pub avoid_red_eye: Option<bool>,
    #[serde(default)]
    pub preferred_airlines: Option<Vec<String>>,
    #[serde(default)]
    pub budget_total: Option<f64>,
    #[serde(default)]
    pub refundable_preference: Option<String>,
}

// ============================================================================
// DATES
// ============================================================================

/// Parses extracted dates and drops those before the reference date.
struct DateGate {
    now: Option<Date>,
    notes: Vec<String>,
}

impl DateGate {
    fn accept(&mut self, field: &str, raw: Option<&str>) -> Option<Date> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        let Some(date) = raw
            .get(..10)
            .and_then(|s| Date::parse_from_str(s, "%Y-%m-%d").ok())
        else {
            self.notes
                .push(format!("Ignored {}: '{}' is not a YYYY-MM-DD date", field, raw));
            return None;
        };
        if let Some(now) = self.now {
            if date < now {
                self.notes
                    .push(format!("Ignored {} {}: before {}", field, date, now));
                return None;
            }
        }
        Some(date)
    }
}

// ============================================================================
// OVERLAYS
// ============================================================================

/// The fields one extracted segment actually specified.
#[derive(Debug, Default)]
struct SegmentOverlay {
    segment_id: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    depart_date: Option<Date>,
    transport_mode: Option<TransportMode>,
    depart_time_window: Option<TimeWindow>,
}

fn airport(existing: &Place, code: &str) -> Place {
    Place {
        kind: existing.kind.clone().or_else(|| Some("airport".to_string())),
        code: Some(code.to_string()),
    }
}

impl SegmentOverlay {
    fn from_extracted(es: &ExtractedSegment, index: usize, gate: &mut DateGate) -> Self {
        Self {
            segment_id: es.segment_id.clone(),
            origin: code_of(&es.origin, &es.origin_code),
            destination: code_of(&es.destination, &es.destination_code),
            depart_date: gate.accept(
                &format!("segments[{}].depart_date", index),
                es.depart_date.as_deref(),
            ),
            transport_mode: es.transport_mode.as_deref().map(TransportMode::parse),
            depart_time_window: es.depart_time_window.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.destination.is_none()
            && self.depart_date.is_none()
            && self.transport_mode.is_none()
    }

    fn apply_to(&self, segment: &mut Segment) {
        if segment.segment_id.is_none() {
            segment.segment_id = self.segment_id.clone();
        }
        if let Some(code) = &self.origin {
            segment.origin = airport(&segment.origin, code);
        }
        if let Some(code) = &self.destination {
            segment.destination = airport(&segment.destination, code);
        }
        if let Some(date) = self.depart_date {
            segment.depart_date = Some(date);
        }
        if let Some(mode) = self.transport_mode {
            segment.transport_mode = mode;
        }
        if let Some(window) = &self.depart_time_window {
            segment.depart_time_window = window.clone();
        }
    }

    fn into_segment(self, default_id: String) -> Segment {
        let mut segment = Segment {
            segment_id: Some(default_id),
            ..Segment::default()
        };
        self.apply_to(&mut segment);
        if let Some(id) = self.segment_id {
            segment.segment_id = Some(id);
        }
        segment
    }
}

/// The fields one extracted stay actually specified.
#[derive(Debug, Default)]
struct StayOverlay {
    location_code: Option<String>,
    check_in: Option<Date>,
    check_out: Option<Date>,
    location_hint: Option<String>,
}

impl StayOverlay {
    fn from_extracted(es: &ExtractedStay, index: usize, gate: &mut DateGate) -> Self {
        Self {
            location_code: code_of(&es.destination, &es.location_code),
            check_in: gate.accept(&format!("stays[{}].check_in", index), es.check_in.as_deref()),
            check_out: gate.accept(
                &format!("stays[{}].check_out", index),
                es.check_out.as_deref(),
            ),
            location_hint: es.location_hint.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.location_code.is_none() && self.check_in.is_none() && self.check_out.is_none()
    }

    fn apply_to(&self, stay: &mut Stay) {
        let previous_check_out = stay.check_out;
        if let Some(code) = &self.location_code {
            stay.location_code = Some(code.clone());
        }
        if let Some(date) = self.check_in {
            stay.check_in = Some(date);
        }
        if let Some(date) = self.check_out {
            stay.check_out = Some(date);
        }
        if let Some(hint) = &self.location_hint {
            stay.location_hint = Some(hint.clone());
        }
        restore_check_out(stay, previous_check_out);
    }

    fn into_stay(self) -> Stay {
        Stay {
            location_code: self.location_code,
            check_in: self.check_in,
            check_out: self.check_out,
            location_hint: self.location_hint,
        }
    }
}

/// A correction that only moved check-in past check-out keeps the old
/// check-out when that one still works.
fn restore_check_out(stay: &mut Stay, previous: Option<Date>) {
    if let (Some(check_in), Some(check_out), Some(prev)) = (stay.check_in, stay.check_out, previous) {
        if check_out <= check_in && prev > check_in {
            stay.check_out = Some(prev);
        }
    }
}

// ============================================================================
// TRANSLATION
// ============================================================================

/// A translated extraction result.
#[derive(Debug, Clone)]
pub struct Translation {
    pub patch: Patch,
    /// Notes about ignored or adjusted values
    pub notes: Vec<String>,
    pub missing_required: Vec<String>,
    pub clarifying_questions: Vec<String>,
}

fn malformed(reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedResult {
        operation: OperationKind::RequirementsExtract.as_str().to_string(),
        reason: reason.into(),
    }
}

fn set(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(next) => next,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ValidationError> {
    serde_json::to_value(value).map_err(|e| malformed(e.to_string()))
}

/// Translate an extractor result against the current document.
///
/// Surplus extracted segments and stays are appended in order, skipping
/// empty ones; an appended segment without its own id is named
/// `seg_{position}` after the slot it lands in.
pub fn translate(doc: &TripIntent, result: &Value) -> Result<Translation, ValidationError> {
    if !result.is_object() {
        return Err(malformed("result must be an object"));
    }
    let extraction: ExtractionResult =
        serde_json::from_value(result.clone()).map_err(|e| malformed(e.to_string()))?;
    let x = &extraction.trip_intent;

    let mut gate = DateGate {
        now: doc.request.now_date,
        notes: Vec::new(),
    };
    let mut fields = Map::new();
    let mut summary: Vec<String> = Vec::new();

    set(
        &mut fields,
        &["status", "missing_required"],
        json!(extraction.missing_required_fields),
    );

    // --- travelers ---
    if let Some(travelers) = &x.travelers {
        let mut parts = Vec::new();
        for (name, count) in [
            ("adults", travelers.adults),
            ("children", travelers.children),
            ("infants", travelers.infants),
        ] {
            if let Some(count) = count {
                set(&mut fields, &["party", "travelers", name], json!(count));
                if count > 0 {
                    parts.push(format!("{} {}", count, name));
                }
            }
        }
        if !parts.is_empty() {
            summary.push(format!("travelers: {}", parts.join(", ")));
        }
    }

    // --- trip type ---
    let mut trip_type = doc.itinerary.trip_type;
    if let Some(raw) = x.trip_type.as_deref().filter(|s| !s.trim().is_empty()) {
        match TripType::parse(raw) {
            Some(parsed) => {
                trip_type = Some(parsed);
                set(&mut fields, &["itinerary", "trip_type"], to_json(&parsed)?);
                summary.push(format!("trip_type: {}", raw));
            }
            None => gate.notes.push(format!("Ignored unknown trip_type '{}'", raw)),
        }
    }

    let origin = x.origin.as_ref().and_then(PlaceRef::code);
    let destination = x.destination.as_ref().and_then(PlaceRef::code);
    let departure = gate.accept("dates.departure_date", x.dates.departure_date.as_deref());
    let return_date = gate.accept("dates.return_date", x.dates.return_date.as_deref());
    if let Some(code) = &origin {
        summary.push(format!("origin: {}", code));
    }
    if let Some(code) = &destination {
        summary.push(format!("destination: {}", code));
    }
    match (departure, return_date) {
        (Some(d), Some(r)) => summary.push(format!("dates: {} → {}", d, r)),
        (Some(d), None) => summary.push(format!("departure_date: {}", d)),
        (None, Some(r)) => summary.push(format!("return_date: {}", r)),
        (None, None) => {}
    }

    // --- stays (before segments: an inferred return leg may use the last check-out) ---
    let lodging = &doc.itinerary.lodging;
    let extracted_stays = if x.stays.is_empty() {
        &x.lodging.stays
    } else {
        &x.stays
    };
    let stay_overlays: Vec<StayOverlay> = extracted_stays
        .iter()
        .enumerate()
        .map(|(j, es)| StayOverlay::from_extracted(es, j, &mut gate))
        .collect();
    let lodging_check_in = gate
        .accept("lodging.check_in", x.lodging.check_in.as_deref())
        .or(departure);
    let lodging_check_out = gate
        .accept("lodging.check_out", x.lodging.check_out.as_deref())
        .or(return_date);

    let mut stays_out: Option<Vec<Stay>> = None;
    let mut single_in: Option<Date> = None;
    let mut single_out: Option<Date> = None;

    if !stay_overlays.is_empty() {
        let mut stays = if !lodging.stays.is_empty() {
            lodging.stays.clone()
        } else if lodging.check_in.is_some() || lodging.check_out.is_some() {
            vec![doc.itinerary.single_stay()]
        } else {
            Vec::new()
        };
        for (j, overlay) in stay_overlays.into_iter().enumerate() {
            if let Some(stay) = stays.get_mut(j) {
                overlay.apply_to(stay);
            } else if !overlay.is_empty() {
                stays.push(overlay.into_stay());
            }
        }
        stays_out = Some(stays);
    } else if lodging_check_in.is_some() || lodging_check_out.is_some() {
        if lodging.stays.is_empty() {
            single_in = lodging_check_in;
            single_out = lodging_check_out;
        } else {
            let mut stays = lodging.stays.clone();
            let last = stays.len() - 1;
            let previous = stays[last].check_out;
            if let Some(date) = lodging_check_in {
                stays[0].check_in = Some(date);
            }
            if let Some(date) = lodging_check_out {
                stays[last].check_out = Some(date);
            }
            restore_check_out(&mut stays[last], previous);
            stays_out = Some(stays);
        }
    }

    // --- segments ---
    let existing = &doc.itinerary.segments;
    let mut segments: Vec<Segment> = existing.clone();
    let mut segments_touched = false;
    let fresh = existing.is_empty();

    if !x.segments.is_empty() {
        let overlays: Vec<SegmentOverlay> = x
            .segments
            .iter()
            .enumerate()
            .map(|(i, es)| SegmentOverlay::from_extracted(es, i, &mut gate))
            .collect();
        for (i, overlay) in overlays.into_iter().enumerate() {
            if let Some(segment) = segments.get_mut(i) {
                overlay.apply_to(segment);
            } else if !overlay.is_empty() {
                let id = format!("seg_{}", segments.len());
                segments.push(overlay.into_segment(id));
            }
        }
        segments_touched = true;
    } else if fresh {
        if origin.is_some() || destination.is_some() {
            let outbound = SegmentOverlay {
                origin: origin.clone(),
                destination: destination.clone(),
                depart_date: departure,
                ..SegmentOverlay::default()
            };
            segments.push(outbound.into_segment("seg_outbound".to_string()));
            segments_touched = true;
        }
    } else if origin.is_some() || destination.is_some() || departure.is_some() || return_date.is_some() {
        let first = SegmentOverlay {
            origin: origin.clone(),
            destination: destination.clone(),
            depart_date: departure,
            ..SegmentOverlay::default()
        };
        first.apply_to(&mut segments[0]);
        let n = segments.len();
        if n == 2 && trip_type == Some(TripType::RoundTrip) {
            if let Some(code) = &origin {
                segments[1].destination = airport(&segments[1].destination, code);
            }
            if let Some(code) = &destination {
                segments[1].origin = airport(&segments[1].origin, code);
            }
        }
        if let Some(date) = return_date {
            if n > 1 {
                segments[n - 1].depart_date = Some(date);
            } else if trip_type != Some(TripType::OneWay) {
                if let Some(leg) = return_leg(&segments, Some(date)) {
                    segments.push(leg);
                }
            }
        }
        segments_touched = true;
    }

    if fresh && segments_touched && trip_type != Some(TripType::OneWay) {
        let last_check_out = stays_out
            .as_ref()
            .and_then(|stays| stays.last())
            .and_then(|stay| stay.check_out);
        if let Some(leg) = return_leg(&segments, return_date.or(last_check_out)) {
            segments.push(leg);
        }
    }

    // --- at least one night per stay; the following leg departs on check-out ---
    if let Some(stays) = stays_out.as_mut() {
        for (j, stay) in stays.iter_mut().enumerate() {
            if let (Some(check_in), Some(check_out)) = (stay.check_in, stay.check_out) {
                if check_out <= check_in {
                    let moved = check_in + Duration::days(1);
                    stay.check_out = Some(moved);
                    gate.notes.push(format!(
                        "Stay {} extended to one night: check-out {}",
                        j + 1,
                        moved
                    ));
                    if let Some(next) = segments.get_mut(j + 1) {
                        next.depart_date = Some(moved);
                        segments_touched = true;
                    }
                }
            }
        }
    } else if single_in.is_some() || single_out.is_some() {
        let check_in = single_in.or(lodging.check_in);
        let check_out = single_out.or(lodging.check_out);
        if let (Some(check_in), Some(check_out)) = (check_in, check_out) {
            if check_out <= check_in {
                let moved = check_in + Duration::days(1);
                single_out = Some(moved);
                gate.notes
                    .push(format!("Stay extended to one night: check-out {}", moved));
                if let Some(next) = segments.get_mut(1) {
                    next.depart_date = Some(moved);
                    segments_touched = true;
                }
            }
        }
    }

    if segments_touched {
        let bits: Vec<String> = segments.iter().map(describe_segment).collect();
        if !bits.is_empty() {
            summary.push(format!("segments: {}", bits.join(", ")));
        }
        set(&mut fields, &["itinerary", "segments"], to_json(&segments)?);
    }

    // --- lodging ---
    if let Some(needed) = x.lodging.needed {
        set(&mut fields, &["itinerary", "lodging", "needed"], json!(needed));
    }
    if let Some(stays) = &stays_out {
        set(&mut fields, &["itinerary", "lodging", "stays"], to_json(stays)?);
    }
    if let Some(date) = single_in {
        set(&mut fields, &["itinerary", "lodging", "check_in"], to_json(&date)?);
    }
    if let Some(date) = single_out {
        set(&mut fields, &["itinerary", "lodging", "check_out"], to_json(&date)?);
    }
    if single_in.is_some() || single_out.is_some() {
        let show = |d: Option<Date>| d.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string());
        summary.push(format!(
            "lodging: check_in {}, check_out {}",
            show(single_in),
            show(single_out)
        ));
    }
    if let Some(hint) = &x.lodging.location_hint {
        set(&mut fields, &["itinerary", "lodging", "location_hint"], json!(hint));
    }

    // --- flight preferences and constraints ---
    if let Some(cabin) = x.cabin.as_deref().filter(|s| !s.trim().is_empty()) {
        set(&mut fields, &["preferences", "flight", "cabin"], json!(cabin));
        summary.push(format!("cabin: {}", cabin));
    }
    let c = &x.constraints;
    if let Some(v) = c.max_stops {
        set(&mut fields, &["preferences", "flight", "max_stops"], json!(v));
    }
    if let Some(v) = c.avoid_red_eye {
        set(&mut fields, &["preferences", "flight", "avoid_red_eye"], json!(v));
    }
    if let Some(v) = &c.preferred_airlines {
        set(&mut fields, &["preferences", "flight", "preferred_airlines"], json!(v));
    }
    if let Some(v) = c.budget_total {
        set(&mut fields, &["constraints", "budget_total"], json!(v));
        summary.push(format!("budget_total: {}", v));
    }
    if let Some(v) = &c.refundable_preference {
        set(&mut fields, &["constraints", "refundable_preference"], json!(v));
    }

    if extraction.missing_required_fields.is_empty() {
        summary.push("missing_required: none".to_string());
    } else {
        summary.push(format!(
            "missing_required: {}",
            extraction.missing_required_fields.join(", ")
        ));
    }

    let patch = Patch::new(PATCH_SOURCE, fields).with_note(format!(
        "Applied extracted requirements: {}",
        summary.join("; ")
    ));

    Ok(Translation {
        patch,
        notes: gate.notes,
        missing_required: extraction.missing_required_fields,
        clarifying_questions: extraction.clarifying_questions,
    })
}

/// The leg home, when the trip ends somewhere other than where it began.
fn return_leg(segments: &[Segment], depart_date: Option<Date>) -> Option<Segment> {
    let first_origin = segments.first()?.origin.code.clone()?;
    let last_destination = segments.last()?.destination.code.clone()?;
    if first_origin == last_destination {
        return None;
    }
    Some(Segment {
        segment_id: Some("seg_return".to_string()),
        origin: Place::airport(last_destination),
        destination: Place::airport(first_origin),
        depart_date,
        ..Segment::default()
    })
}

fn describe_segment(segment: &Segment) -> String {
    let origin = segment.origin.code.as_deref().unwrap_or("?");
    let destination = segment.destination.code.as_deref().unwrap_or("?");
    match segment.depart_date {
        Some(date) => format!("{}→{} ({})", origin, destination, date),
        None => format!("{}→{}", origin, destination),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(month: u32, day: u32) -> Date {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn doc() -> TripIntent {
        let mut doc = TripIntent::default();
        doc.request.now_date = Some(d(5, 1));
        doc
    }

    fn segments_of(t: &Translation) -> Vec<Segment> {
        serde_json::from_value(t.patch.fields["itinerary"]["segments"].clone()).unwrap()
    }

    fn stays_of(t: &Translation) -> Vec<Stay> {
        serde_json::from_value(t.patch.fields["itinerary"]["lodging"]["stays"].clone()).unwrap()
    }

    #[test]
    fn test_fresh_round_trip_infers_return_leg() {
        let result = json!({
            "trip_intent": {
                "origin": "EWR",
                "destination": {"code": "DEN"},
                "trip_type": "round_trip",
                "dates": {"departure_date": "2026-06-01", "return_date": "2026-06-05"},
                "travelers": {"adults": 2}
            }
        });
        let t = translate(&doc(), &result).unwrap();
        let segments = segments_of(&t);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].origin.code.as_deref(), Some("DEN"));
        assert_eq!(segments[1].destination.code.as_deref(), Some("EWR"));
        assert_eq!(segments[1].depart_date, Some(d(6, 5)));
        assert_eq!(t.patch.fields["itinerary"]["lodging"]["check_in"], "2026-06-01");
        assert_eq!(t.patch.fields["itinerary"]["lodging"]["check_out"], "2026-06-05");
        assert_eq!(t.patch.fields["party"]["travelers"]["adults"], 2);
    }

    #[test]
    fn test_one_way_gets_no_return_leg() {
        let result = json!({
            "trip_intent": {"origin": "EWR", "destination": "DEN", "trip_type": "one_way"}
        });
        let t = translate(&doc(), &result).unwrap();
        assert_eq!(segments_of(&t).len(), 1);
    }

    #[test]
    fn test_return_date_falls_back_to_last_check_out() {
        let result = json!({
            "trip_intent": {
                "segments": [
                    {"origin": "EWR", "destination": "LIS", "depart_date": "2026-06-01"},
                    {"origin_code": "LIS", "destination_code": "OPO", "depart_date": "2026-06-04"}
                ],
                "stays": [
                    {"location_code": "LIS", "check_in": "2026-06-01", "check_out": "2026-06-04"},
                    {"location_code": "OPO", "check_in": "2026-06-04", "check_out": "2026-06-08"}
                ]
            }
        });
        let t = translate(&doc(), &result).unwrap();
        let segments = segments_of(&t);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].segment_id.as_deref(), Some("seg_return"));
        assert_eq!(segments[2].origin.code.as_deref(), Some("OPO"));
        assert_eq!(segments[2].depart_date, Some(d(6, 8)));
    }

    #[test]
    fn test_past_dates_are_ignored_with_note() {
        let result = json!({
            "trip_intent": {
                "origin": "EWR",
                "destination": "DEN",
                "trip_type": "one_way",
                "dates": {"departure_date": "2025-12-24"}
            }
        });
        let t = translate(&doc(), &result).unwrap();
        assert_eq!(segments_of(&t)[0].depart_date, None);
        assert!(t.notes.iter().any(|n| n.contains("2025-12-24")));
    }

    #[test]
    fn test_unparseable_date_is_ignored_with_note() {
        let result = json!({"trip_intent": {"dates": {"departure_date": "next friday"}}});
        let t = translate(&doc(), &result).unwrap();
        assert!(t.notes.iter().any(|n| n.contains("next friday")));
    }

    #[test]
    fn test_zero_night_stay_is_extended_and_next_leg_follows() {
        let result = json!({
            "trip_intent": {
                "segments": [
                    {"origin": "EWR", "destination": "LIS", "depart_date": "2026-06-01"},
                    {"origin": "LIS", "destination": "EWR", "depart_date": "2026-06-01"}
                ],
                "stays": [{"location_code": "LIS", "check_in": "2026-06-01", "check_out": "2026-06-01"}]
            }
        });
        let t = translate(&doc(), &result).unwrap();
        assert_eq!(stays_of(&t)[0].check_out, Some(d(6, 2)));
        assert_eq!(segments_of(&t)[1].depart_date, Some(d(6, 2)));
    }

    #[test]
    fn test_null_lists_are_tolerated() {
        let result = json!({
            "trip_intent": {"segments": null, "stays": null, "lodging": null, "constraints": null},
            "missing_required_fields": null,
            "clarifying_questions": null
        });
        let t = translate(&doc(), &result).unwrap();
        assert!(t.missing_required.is_empty());
        assert!(t.patch.fields["itinerary"].get("segments").is_none());
    }

    #[test]
    fn test_non_object_result_is_malformed() {
        assert!(translate(&doc(), &json!("EWR to DEN")).is_err());
        assert!(translate(&doc(), &json!({"trip_intent": {"travelers": {"adults": -1}}})).is_err());
    }

    #[test]
    fn test_constraints_and_preferences() {
        let result = json!({
            "trip_intent": {
                "cabin": "business",
                "constraints": {
                    "max_stops": 0,
                    "avoid_red_eye": true,
                    "preferred_airlines": ["UA"],
                    "budget_total": 4000,
                    "refundable_preference": "refundable"
                }
            }
        });
        let t = translate(&doc(), &result).unwrap();
        let f = &t.patch.fields;
        assert_eq!(f["preferences"]["flight"]["cabin"], "business");
        assert_eq!(f["preferences"]["flight"]["max_stops"], 0);
        assert_eq!(f["preferences"]["flight"]["preferred_airlines"], json!(["UA"]));
        assert_eq!(f["constraints"]["budget_total"], json!(4000.0));
        assert_eq!(f["constraints"]["refundable_preference"], "refundable");
    }

    #[test]
    fn test_round_trip_origin_correction_mirrors_return_leg() {
        let mut doc = doc();
        doc.itinerary.trip_type = Some(TripType::RoundTrip);
        doc.itinerary.segments = vec![
            Segment::flight("seg_outbound", "EWR", "DEN", Some(d(6, 1))),
            Segment::flight("seg_return", "DEN", "EWR", Some(d(6, 5))),
        ];
        let t = translate(&doc, &json!({"trip_intent": {"origin": "JFK"}})).unwrap();
        let segments = segments_of(&t);
        assert_eq!(segments[0].origin.code.as_deref(), Some("JFK"));
        assert_eq!(segments[1].destination.code.as_deref(), Some("JFK"));
        assert_eq!(segments[1].depart_date, Some(d(6, 5)));
    }

    #[test]
    fn test_unknown_trip_type_is_noted() {
        let t = translate(&doc(), &json!({"trip_intent": {"trip_type": "circle"}})).unwrap();
        assert!(t.notes.iter().any(|n| n.contains("circle")));
        assert!(t.patch.fields.get("itinerary").is_none());
    }

    #[test]
    fn test_empty_surplus_entries_close_up() {
        let mut doc = doc();
        doc.itinerary.segments = vec![Segment::flight("seg_0", "EWR", "LIS", Some(d(6, 1)))];
        doc.itinerary.lodging.stays = vec![Stay {
            location_code: Some("LIS".to_string()),
            check_in: Some(d(6, 1)),
            check_out: Some(d(6, 4)),
            location_hint: None,
        }];
        let result = json!({"trip_intent": {
            "segments": [{}, {}, {"origin": "LIS", "destination": "OPO", "depart_date": "2026-06-04"}],
            "stays": [{}, {}, {"location_code": "OPO"}]
        }});

        let t = translate(&doc, &result).unwrap();

        let segments = segments_of(&t);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], doc.itinerary.segments[0]);
        assert_eq!(segments[1].segment_id.as_deref(), Some("seg_1"));
        assert_eq!(segments[1].origin.code.as_deref(), Some("LIS"));
        assert_eq!(segments[1].destination.code.as_deref(), Some("OPO"));

        let stays = stays_of(&t);
        assert_eq!(stays.len(), 2);
        assert_eq!(stays[0], doc.itinerary.lodging.stays[0]);
        assert_eq!(stays[1].location_code.as_deref(), Some("OPO"));
    }
}
