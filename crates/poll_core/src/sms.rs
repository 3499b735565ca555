use chrono::{DateTime, Utc};
use shared::{domain::SmsEvent, protocol::SmsPayload};

/// Turns a raw gateway payload into a normalized vote event.
///
/// Pure and total: a message with no text still produces an event, just
/// one with an empty normalized key, which downstream layers treat as an
/// invalid vote rather than an error.
pub fn parse_sms(payload: &SmsPayload) -> SmsEvent {
    let raw_text = payload.text.clone().unwrap_or_default();
    let normalized = raw_text.trim().to_uppercase();
    SmsEvent {
        sender: payload.from.clone(),
        received_at: received_at(payload.timestamp),
        raw_text,
        normalized,
    }
}

fn received_at(epoch_millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_millis).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Groups a digit string for on-screen display, `44 7937 985 836` style.
/// Display only: numbers that do not fit the expected shape come back
/// unchanged, so formatting can never block vote processing.
pub fn format_sender(from: &str) -> String {
    let digits = from.trim();
    if digits.len() < 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }
    format!(
        "{} {} {} {}",
        &digits[..2],
        &digits[2..6],
        &digits[6..9],
        &digits[9..]
    )
}

/// Short date and clock strings for the inbound-message ticker.
pub fn format_received(received_at: DateTime<Utc>) -> (String, String) {
    (
        received_at.format("%b %-d %Y").to_string(),
        received_at.format("%H:%M").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: Option<&str>) -> SmsPayload {
        SmsPayload {
            from: "447937985836".to_string(),
            timestamp: 1_700_000_000_000,
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn trims_and_uppercases_the_vote_text() {
        let event = parse_sms(&payload(Some(" b \n")));
        assert_eq!(event.normalized, "B");
        assert_eq!(event.raw_text, " b \n");
    }

    #[test]
    fn missing_text_yields_an_empty_key_instead_of_failing() {
        let event = parse_sms(&payload(None));
        assert_eq!(event.normalized, "");
        assert_eq!(event.raw_text, "");
    }

    #[test]
    fn gateway_timestamp_becomes_a_utc_instant() {
        let event = parse_sms(&payload(Some("A")));
        assert_eq!(event.received_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn out_of_range_timestamps_fall_back_to_the_epoch() {
        let broken = SmsPayload {
            timestamp: i64::MAX,
            ..payload(Some("A"))
        };
        assert_eq!(parse_sms(&broken).received_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn groups_sender_digits_for_display() {
        assert_eq!(format_sender("447937985836"), "44 7937 985 836");
    }

    #[test]
    fn leaves_unexpected_sender_shapes_alone() {
        assert_eq!(format_sender("+44 7937"), "+44 7937");
        assert_eq!(format_sender("12345"), "12345");
        assert_eq!(format_sender(""), "");
    }

    #[test]
    fn renders_ticker_date_and_time() {
        let instant = DateTime::from_timestamp_millis(1_700_000_000_000).expect("timestamp");
        let (day, time) = format_received(instant);
        assert_eq!(day, "Nov 14 2023");
        assert_eq!(time, "22:13");
    }
}
