use shared::domain::{OptionKey, SmsEvent, Tally};

/// Folds one vote event into a tally, returning the successor tally.
///
/// Events whose normalized text is not exactly one of the tally's option
/// keys leave the counts untouched; SMS noise is expected traffic, not an
/// error. The input is never mutated, so snapshots held elsewhere stay
/// frozen, and the outcome depends only on how many events matched each
/// key, never on their interleaving.
pub fn apply(tally: &Tally, event: &SmsEvent) -> Tally {
    match OptionKey::parse(&event.normalized) {
        Some(key) if tally.contains(key) => tally.incremented(key),
        _ => tally.clone(),
    }
}

#[cfg(test)]
mod tests {
    use shared::{
        domain::{Question, VoteOption},
        protocol::SmsPayload,
    };

    use super::*;
    use crate::sms::parse_sms;

    fn key(letter: char) -> OptionKey {
        OptionKey::new(letter).expect("key")
    }

    fn question() -> Question {
        let options = ['A', 'B', 'C', 'D']
            .into_iter()
            .map(|letter| VoteOption {
                key: key(letter),
                text: letter.to_string(),
                image_ref: None,
            })
            .collect();
        Question::new("Which biscuit is best?", options).expect("valid question")
    }

    fn vote(text: &str) -> SmsEvent {
        parse_sms(&SmsPayload {
            from: "447700900123".to_string(),
            timestamp: 0,
            text: Some(text.to_string()),
        })
    }

    #[test]
    fn accepted_vote_increments_only_its_key() {
        let zero = Tally::zero_for(&question());
        let next = apply(&zero, &vote(" b \n"));

        assert_eq!(next.count(key('B')), 1);
        for other in ['A', 'C', 'D'] {
            assert_eq!(next.count(key(other)), 0);
        }
    }

    #[test]
    fn unknown_key_returns_an_equal_tally() {
        let tally = Tally::zero_for(&question()).incremented(key('A'));
        assert_eq!(apply(&tally, &vote("E")), tally);
    }

    #[test]
    fn empty_text_is_rejected_without_panicking() {
        let tally = Tally::zero_for(&question());
        assert_eq!(apply(&tally, &vote("   ")), tally);
    }

    #[test]
    fn multi_letter_text_is_not_a_partial_match() {
        let tally = Tally::zero_for(&question());
        assert_eq!(apply(&tally, &vote("AB")), tally);
    }

    #[test]
    fn total_grows_by_one_per_accepted_vote_only() {
        let mut tally = Tally::zero_for(&question());
        let mut accepted = 0;
        for text in ["A", "E", "b", "", "c ", "??", "D"] {
            let next = apply(&tally, &vote(text));
            if next != tally {
                accepted += 1;
            }
            tally = next;
        }
        assert_eq!(accepted, 4);
        assert_eq!(tally.total(), 4);
    }

    #[test]
    fn input_tally_is_left_untouched() {
        let before = Tally::zero_for(&question()).incremented(key('A'));
        let copy = before.clone();
        let _ = apply(&before, &vote("B"));
        assert_eq!(before, copy);
    }

    #[test]
    fn arrival_order_does_not_change_the_outcome() {
        let zero = Tally::zero_for(&question());
        let forward = ["A", "B", "B", "E", "C"]
            .iter()
            .fold(zero.clone(), |tally, text| apply(&tally, &vote(text)));
        let shuffled = ["B", "E", "C", "A", "B"]
            .iter()
            .fold(zero, |tally, text| apply(&tally, &vote(text)));
        assert_eq!(forward, shuffled);
    }
}
