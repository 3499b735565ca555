use shared::domain::{OptionKey, Question, Tally};

/// One option row ready for rendering: the count plus an integer
/// percentage usable directly as a bar height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRow {
    pub key: OptionKey,
    pub text: String,
    pub count: u64,
    pub percentage: u8,
}

/// Derives display rows from a tally, in the question's option order.
/// Percentages floor; an empty poll renders every bar at zero.
pub fn bar_rows(question: &Question, tally: &Tally) -> Vec<BarRow> {
    let total = tally.total();
    question
        .options()
        .iter()
        .map(|option| {
            let count = tally.count(option.key);
            let percentage = if total == 0 {
                0
            } else {
                (count * 100 / total) as u8
            };
            BarRow {
                key: option.key,
                text: option.text.clone(),
                count,
                percentage,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use shared::domain::VoteOption;

    use super::*;

    fn key(letter: char) -> OptionKey {
        OptionKey::new(letter).expect("key")
    }

    fn question() -> Question {
        let options = ['A', 'B', 'C']
            .into_iter()
            .map(|letter| VoteOption {
                key: key(letter),
                text: format!("option {letter}"),
                image_ref: None,
            })
            .collect();
        Question::new("pick one", options).expect("valid question")
    }

    #[test]
    fn empty_poll_renders_all_zero_percentages() {
        let rows = bar_rows(&question(), &Tally::zero_for(&question()));
        assert!(rows.iter().all(|row| row.count == 0 && row.percentage == 0));
    }

    #[test]
    fn percentages_floor_and_never_sum_past_one_hundred() {
        let tally = Tally::zero_for(&question())
            .incremented(key('A'))
            .incremented(key('B'))
            .incremented(key('B'));
        let rows = bar_rows(&question(), &tally);

        assert_eq!(rows[0].percentage, 33);
        assert_eq!(rows[1].percentage, 66);
        assert_eq!(rows[2].percentage, 0);
        assert!(rows.iter().map(|row| u64::from(row.percentage)).sum::<u64>() <= 100);
    }

    #[test]
    fn rows_follow_question_order() {
        let rows = bar_rows(&question(), &Tally::zero_for(&question()));
        let keys: Vec<char> = rows.iter().map(|row| row.key.as_char()).collect();
        assert_eq!(keys, vec!['A', 'B', 'C']);
    }
}
