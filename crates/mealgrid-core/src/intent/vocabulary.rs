//! Word lists used by the intent parser.
//!
//! All entries are lowercase. Single words are matched against tokens after
//! plural stripping; phrases are matched against runs of tokens.

use crate::MealSlot;

/// Whole words that name a slot directly or by time of day.
pub(super) const SLOT_WORDS: &[(&str, MealSlot)] = &[
    ("breakfast", MealSlot::Breakfast),
    ("morning", MealSlot::Breakfast),
    ("lunch", MealSlot::Lunch),
    ("noon", MealSlot::Lunch),
    ("midday", MealSlot::Lunch),
    ("lunchtime", MealSlot::Lunch),
    ("dinner", MealSlot::Dinner),
    ("evening", MealSlot::Dinner),
    ("night", MealSlot::Dinner),
    ("tonight", MealSlot::Dinner),
    ("supper", MealSlot::Dinner),
];

/// Word whose slot comes from [`super::IntentPolicy::brunch`].
pub(super) const BRUNCH: &str = "brunch";

/// Phrases asking for a whole plan rather than particular slots.
pub(super) const GENERAL_PHRASES: &[&[&str]] = &[
    &["meal", "plan"],
    &["menu"],
    &["everything"],
    &["week"],
    &["weekly"],
    &["full", "day"],
    &["whole", "day"],
    &["all", "meal"],
    &["three", "meal"],
];

/// Dish and ingredient words that signal a concrete food request.
pub(super) const FOOD_TERMS: &[&str] = &[
    "pasta",
    "spaghetti",
    "lasagna",
    "risotto",
    "pizza",
    "salad",
    "soup",
    "stew",
    "chili",
    "curry",
    "sandwich",
    "wrap",
    "burger",
    "taco",
    "burrito",
    "sushi",
    "ramen",
    "noodle",
    "rice",
    "quinoa",
    "lentil",
    "bean",
    "tofu",
    "chicken",
    "beef",
    "steak",
    "pork",
    "lamb",
    "fish",
    "salmon",
    "tuna",
    "shrimp",
    "egg",
    "omelette",
    "pancake",
    "waffle",
    "oatmeal",
    "smoothie",
    "casserole",
    "quiche",
    "vegetable",
    "veggie",
];
