//! Free-text intent parsing: which meal slots does the user want filled?
//!
//! Parsing is pure and case-insensitive. Input is split into alphanumeric
//! tokens, so "breakfast and lunch", "breakfast & lunch" and
//! "breakfast/lunch" all name both slots. When no slot is named, a request
//! for a general plan (or one with no recognisable food in it) targets the
//! whole day, while a specific dish with no time cue goes to
//! [`IntentPolicy::food_without_time`].

mod vocabulary;

use serde::{Deserialize, Serialize};

use crate::MealSlot;

/// Configurable defaults for ambiguous requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentPolicy {
    /// Slot that "brunch" maps to.
    pub brunch: MealSlot,
    /// Slot for a specific food request that names no time of day.
    pub food_without_time: MealSlot,
}

impl Default for IntentPolicy {
    fn default() -> Self {
        Self {
            brunch: MealSlot::Lunch,
            food_without_time: MealSlot::Lunch,
        }
    }
}

/// Maps user text to target slots under an [`IntentPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentParser {
    policy: IntentPolicy,
}

impl IntentParser {
    pub fn new(policy: IntentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> IntentPolicy {
        self.policy
    }

    /// Target slots for `text`.
    ///
    /// The result is never empty, holds no duplicates and is in serving
    /// order.
    pub fn parse_slots(&self, text: &str) -> Vec<MealSlot> {
        let tokens = tokenize(text);

        let mut found = [false; 3];
        for token in &tokens {
            for (word, slot) in vocabulary::SLOT_WORDS {
                if word_matches(token, word) {
                    found[slot_index(*slot)] = true;
                }
            }
            if word_matches(token, vocabulary::BRUNCH) {
                found[slot_index(self.policy.brunch)] = true;
            }
        }

        let named: Vec<MealSlot> = MealSlot::ALL
            .into_iter()
            .filter(|slot| found[slot_index(*slot)])
            .collect();
        if !named.is_empty() {
            return named;
        }

        let general = vocabulary::GENERAL_PHRASES
            .iter()
            .any(|phrase| contains_phrase(&tokens, phrase));
        let food = tokens.iter().any(|token| {
            vocabulary::FOOD_TERMS
                .iter()
                .any(|term| word_matches(token, term))
        });

        if general || !food {
            MealSlot::ALL.to_vec()
        } else {
            vec![self.policy.food_without_time]
        }
    }
}

/// [`IntentParser::parse_slots`] under the default policy.
pub fn parse_slots(text: &str) -> Vec<MealSlot> {
    IntentParser::default().parse_slots(text)
}

// ---------------------------------------------------------------------------
// Matching helpers
// ---------------------------------------------------------------------------

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Whole-word match allowing a plain `s` or `es` plural.
fn word_matches(token: &str, term: &str) -> bool {
    match token.strip_prefix(term) {
        Some(rest) => matches!(rest, "" | "s" | "es"),
        None => false,
    }
}

fn contains_phrase(tokens: &[String], phrase: &[&str]) -> bool {
    if phrase.is_empty() || tokens.len() < phrase.len() {
        return false;
    }
    tokens.windows(phrase.len()).any(|window| {
        window
            .iter()
            .zip(phrase)
            .all(|(token, word)| word_matches(token, word))
    })
}

fn slot_index(slot: MealSlot) -> usize {
    match slot {
        MealSlot::Breakfast => 0,
        MealSlot::Lunch => 1,
        MealSlot::Dinner => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MealSlot::{Breakfast, Dinner, Lunch};

    #[test]
    fn time_of_day_synonyms_any_case() {
        assert_eq!(parse_slots("something for the MORNING"), vec![Breakfast]);
        assert_eq!(parse_slots("Noon"), vec![Lunch]);
        assert_eq!(parse_slots("a midday bite"), vec![Lunch]);
        assert_eq!(parse_slots("Evening meal"), vec![Dinner]);
        assert_eq!(parse_slots("late NIGHT"), vec![Dinner]);
        assert_eq!(parse_slots("Supper please"), vec![Dinner]);
        assert_eq!(parse_slots("cook me dinner tonight"), vec![Dinner]);
    }

    #[test]
    fn brunch_follows_policy() {
        assert_eq!(parse_slots("brunch"), vec![Lunch]);
        let parser = IntentParser::new(IntentPolicy {
            brunch: Breakfast,
            ..IntentPolicy::default()
        });
        assert_eq!(parser.parse_slots("Sunday brunch"), vec![Breakfast]);
    }

    #[test]
    fn conjunctions_name_several_slots() {
        assert_eq!(parse_slots("breakfast and lunch"), vec![Breakfast, Lunch]);
        assert_eq!(parse_slots("dinner & breakfast"), vec![Breakfast, Dinner]);
        assert_eq!(
            parse_slots("lunch/dinner/breakfast, high protein"),
            vec![Breakfast, Lunch, Dinner]
        );
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(parse_slots("dinner, dinners, supper"), vec![Dinner]);
    }

    #[test]
    fn empty_and_vague_input_returns_all_slots() {
        assert_eq!(parse_slots(""), MealSlot::ALL.to_vec());
        assert_eq!(parse_slots("   "), MealSlot::ALL.to_vec());
        assert_eq!(parse_slots("surprise me"), MealSlot::ALL.to_vec());
    }

    #[test]
    fn general_plan_vocabulary_returns_all_slots() {
        assert_eq!(parse_slots("a vegetarian meal plan"), MealSlot::ALL.to_vec());
        assert_eq!(parse_slots("plan the whole week"), MealSlot::ALL.to_vec());
        assert_eq!(parse_slots("pasta menu"), MealSlot::ALL.to_vec());
        assert_eq!(parse_slots("Three meals with chicken"), MealSlot::ALL.to_vec());
    }

    #[test]
    fn specific_food_without_time_goes_to_lunch() {
        assert_eq!(parse_slots("pasta"), vec![Lunch]);
        assert_eq!(parse_slots("Spicy TACOS"), vec![Lunch]);
        assert_eq!(parse_slots("sandwiches"), vec![Lunch]);
    }

    #[test]
    fn food_default_is_configurable() {
        let parser = IntentParser::new(IntentPolicy {
            food_without_time: Dinner,
            ..IntentPolicy::default()
        });
        assert_eq!(parser.parse_slots("salmon"), vec![Dinner]);
        assert_eq!(parser.parse_slots("salmon for lunch"), vec![Lunch]);
    }

    #[test]
    fn words_must_match_whole() {
        // "nightly" and "lunchbox" are not slot words.
        assert_eq!(parse_slots("nightly lunchbox"), MealSlot::ALL.to_vec());
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: IntentPolicy = serde_json::from_str(r#"{"brunch": "breakfast"}"#).unwrap();
        assert_eq!(policy.brunch, Breakfast);
        assert_eq!(policy.food_without_time, Lunch);
    }
}
