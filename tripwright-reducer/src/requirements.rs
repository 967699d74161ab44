//! Required-field computation.
//!
//! Takes only `itinerary` and `party`, so the result cannot depend on the
//! derived cache.

use tripwright_core::{Itinerary, Party};

/// Paths of the fields that must be filled before quoting can start,
/// in document order.
pub fn missing_required_fields(itinerary: &Itinerary, party: &Party) -> Vec<String> {
    let mut missing = Vec::new();

    if itinerary.segments.is_empty() {
        missing.push("itinerary.segments".to_string());
    }
    for (i, segment) in itinerary.segments.iter().enumerate() {
        if segment.origin.code.is_none() {
            missing.push(format!("itinerary.segments[{}].origin.code", i));
        }
        if segment.destination.code.is_none() {
            missing.push(format!("itinerary.segments[{}].destination.code", i));
        }
        if segment.depart_date.is_none() {
            missing.push(format!("itinerary.segments[{}].depart_date", i));
        }
    }

    if party.travelers.adults < 1 {
        missing.push("party.travelers.adults".to_string());
    }

    let lodging = &itinerary.lodging;
    if lodging.needed {
        if lodging.stays.is_empty() {
            if lodging.check_in.is_none() {
                missing.push("itinerary.lodging.check_in".to_string());
            }
            if lodging.check_out.is_none() {
                missing.push("itinerary.lodging.check_out".to_string());
            }
        } else {
            for (j, stay) in lodging.stays.iter().enumerate() {
                if stay.location_code.is_none() {
                    missing.push(format!("itinerary.lodging.stays[{}].location_code", j));
                }
                if stay.check_in.is_none() {
                    missing.push(format!("itinerary.lodging.stays[{}].check_in", j));
                }
                if stay.check_out.is_none() {
                    missing.push(format!("itinerary.lodging.stays[{}].check_out", j));
                }
            }
        }
    }

    missing
}
