//! Free-text routing to decision-engine events.

use once_cell::sync::Lazy;
use regex::Regex;
use tripwright_core::Event;

static BUNDLE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(bndl_[A-Za-z0-9]+(?:[_-][A-Za-z0-9]+)*)\b").expect("Invalid bundle id regex")
});

static HOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(hold|holds|place hold)\b").expect("Invalid hold regex"));

static PURCHASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bapprove|\bconfirm purchase\b|\b(buy|purchase)\b").expect("Invalid purchase regex")
});

static APPROVAL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"approval_token\s*=\s*(\S+)").expect("Invalid approval token regex"));

static PAYMENT_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"payment_method_id\s*=\s*(\S+)").expect("Invalid payment method regex")
});

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['\'', '"', '.', ',']).to_string())
        .filter(|v| !v.is_empty())
}

/// Route one user message.
///
/// In order: a `bndl_…` token selects that bundle; the word "hold" asks for
/// holds; approval wording with both `approval_token=` and
/// `payment_method_id=` approves the purchase. Anything else, including
/// approval wording missing either value, is a plain message.
pub fn route(user_text: &str) -> Event {
    let text = user_text.trim();

    if let Some(m) = BUNDLE_ID.captures(text).and_then(|c| c.get(1)) {
        return Event::UserSelectedBundle {
            bundle_id: m.as_str().to_string(),
        };
    }
    if HOLD.is_match(text) {
        return Event::UserRequestHold {};
    }
    if PURCHASE.is_match(text) {
        if let (Some(approval_token), Some(payment_method_id)) = (
            capture(&APPROVAL_TOKEN, text),
            capture(&PAYMENT_METHOD, text),
        ) {
            return Event::UserApprovedPurchase {
                approval_token,
                payment_method_id,
            };
        }
    }
    Event::user_message(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_token() {
        assert_eq!(
            route("let's go with bndl_2 please"),
            Event::UserSelectedBundle {
                bundle_id: "bndl_2".to_string()
            }
        );
        assert_eq!(
            route("bndl_a1-b"),
            Event::UserSelectedBundle {
                bundle_id: "bndl_a1-b".to_string()
            }
        );
    }

    #[test]
    fn test_hold_words() {
        assert_eq!(route("Hold"), Event::UserRequestHold {});
        assert_eq!(route("please place hold"), Event::UserRequestHold {});
        assert_eq!(route("household goods"), Event::user_message("household goods"));
    }

    #[test]
    fn test_purchase_needs_both_values() {
        assert_eq!(
            route("approve purchase approval_token=tok_1 payment_method_id=pm_9."),
            Event::UserApprovedPurchase {
                approval_token: "tok_1".to_string(),
                payment_method_id: "pm_9".to_string(),
            }
        );
        assert_eq!(
            route("buy it approval_token=tok_1"),
            Event::user_message("buy it approval_token=tok_1")
        );
    }

    #[test]
    fn test_plain_message_is_trimmed() {
        assert_eq!(
            route("  EWR to DEN June 1-5 for 2 \n"),
            Event::user_message("EWR to DEN June 1-5 for 2")
        );
    }
}
