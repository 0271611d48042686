//! `mealgrid show` and `mealgrid plans`: read-only views of stored plans.

use std::fmt::Write as _;

use anyhow::{Context, Result};

use mealgrid_core::Day;
use mealgrid_core::backend::MealPlanBackend;
use mealgrid_core::grid::{Meal, MealPlan};
use mealgrid_core::week::WeekKey;

use crate::planner::Planner;

/// Which week and day a command works on. Unset fields keep the session's
/// defaults (the current week, today).
#[derive(Debug, Default, Clone, Copy)]
pub struct Target {
    pub week: Option<WeekKey>,
    pub day: Option<Day>,
}

/// Load the target week into the session and make the target day active.
pub async fn focus(planner: &mut Planner, target: Target) -> Result<()> {
    let load = match target.week {
        Some(week) => planner.session.switch_week(week).await,
        None => planner.session.refresh().await,
    };
    let load = load.context("failed to load week")?;
    tracing::debug!(week = %load.week, meals = load.meals, "week ready");
    if let Some(day) = target.day {
        planner.session.set_active_day(day);
    }
    Ok(())
}

/// Run the show command: print the target week's grid.
pub async fn run_show(planner: &mut Planner, target: Target) -> Result<()> {
    focus(planner, target).await?;
    let week = planner.session.displayed_week();
    print!("{}", render_week(week, &planner.session.plan()));
    if planner.session.reconciliation().is_guest() {
        println!();
        println!("(guest session: set a profile to load saved plans)");
    }
    planner.report_events();
    Ok(())
}

/// Run the plans command: list the profile's stored weeks, newest first.
pub async fn run_plans(backend: &dyn MealPlanBackend, profile: &str) -> Result<()> {
    let plans = backend
        .list_plans(profile)
        .await
        .with_context(|| format!("failed to list plans for {profile}"))?;

    if plans.is_empty() {
        println!("No plans found for {profile}.");
        return Ok(());
    }

    println!("{:<12} {:<38} {:>5}", "WEEK", "ID", "MEALS");
    println!("{}", "-".repeat(57));
    for plan in &plans {
        println!("{:<12} {:<38} {:>5}", plan.week, plan.id, plan.items.len());
    }
    Ok(())
}

/// One line per planned meal, grouped by day.
pub fn render_week(week: WeekKey, plan: &MealPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Week of {week}");
    if plan.is_empty() {
        let _ = writeln!(out, "  No meals planned.");
        return out;
    }
    for (key, meal) in plan.iter() {
        let _ = writeln!(
            out,
            "  {:<10} {:<10} {}",
            key.day.to_string(),
            key.slot.to_string(),
            describe(meal)
        );
    }
    out
}

pub fn describe(meal: &Meal) -> String {
    let mut text = format!(
        "{} ({} min, {} kcal",
        meal.title, meal.cook_time_minutes, meal.nutrition.calories
    );
    if let Some(grade) = meal.grade {
        let _ = write!(text, ", grade {grade}");
    }
    text.push(')');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealgrid_core::MealSlot;
    use mealgrid_test_utils::recipe;

    fn week() -> WeekKey {
        "2026-10-21".parse().unwrap()
    }

    #[test]
    fn empty_week_says_so() {
        let text = render_week(week(), &MealPlan::new());
        assert_eq!(text, "Week of 2026-10-19\n  No meals planned.\n");
    }

    #[test]
    fn meals_render_in_grid_order() {
        let mut plan = MealPlan::new();
        plan.set(Day::Friday, MealSlot::Lunch, Meal::from_recipe(&recipe("b")));
        plan.set(Day::Monday, MealSlot::Dinner, Meal::from_recipe(&recipe("a")));

        let text = render_week(week(), &plan);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("monday") && lines[1].contains("Recipe a"));
        assert!(lines[2].contains("friday") && lines[2].contains("lunch"));
    }

    #[test]
    fn describe_includes_grade_when_known() {
        let mut meal = Meal::from_recipe(&recipe("x"));
        assert_eq!(describe(&meal), "Recipe x (20 min, 450 kcal, grade B)");
        meal.grade = None;
        assert_eq!(describe(&meal), "Recipe x (20 min, 450 kcal)");
    }
}
