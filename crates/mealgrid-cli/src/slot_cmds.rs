//! Commands that act on slots of one day: `generate`, `regenerate`,
//! `remove` and `grocery`.

use anyhow::{Context, Result, bail};
use uuid::Uuid;

use mealgrid_core::MealSlot;
use mealgrid_core::grid::SlotKey;
use mealgrid_core::orchestrator::SlotOutcome;

use crate::plan_cmds::{Target, describe, focus};
use crate::planner::Planner;

/// Run the generate command.
///
/// Explicit `slots` are selected first and win over what `text` asks for.
/// Fails only when no slot produced a meal.
pub async fn run_generate(
    planner: &mut Planner,
    target: Target,
    slots: &[MealSlot],
    text: &str,
) -> Result<()> {
    focus(planner, target).await?;
    for slot in slots {
        planner.session.toggle(*slot);
    }
    let outcomes = planner.session.generate_from_text(text).settled().await;
    print_outcomes(planner, &outcomes);
    planner.report_events();
    require_any_filled(&outcomes)
}

/// Run the regenerate command: replace the meal in one slot.
pub async fn run_regenerate(
    planner: &mut Planner,
    target: Target,
    slot: MealSlot,
    text: &str,
) -> Result<()> {
    focus(planner, target).await?;
    let day = planner.session.active_day();
    let outcomes = planner.session.regenerate(day, slot, text).settled().await;
    print_outcomes(planner, &outcomes);
    planner.report_events();
    require_any_filled(&outcomes)
}

/// Run the remove command: empty one slot.
pub async fn run_remove(planner: &mut Planner, target: Target, slot: MealSlot) -> Result<()> {
    focus(planner, target).await?;
    let day = planner.session.active_day();
    let had_meal = planner.session.meal(day, slot).is_some();
    let deleted = planner
        .session
        .remove_meal(day, slot)
        .await
        .with_context(|| format!("failed to remove {day} {slot}"))?;

    let key = SlotKey::new(day, slot);
    match (had_meal, deleted) {
        (_, true) => println!("Removed {key}."),
        (true, false) => println!("Removed {key} (it was not saved)."),
        (false, false) => println!("Nothing planned for {key}."),
    }
    planner.report_events();
    Ok(())
}

/// Run the grocery command: print the saved item ids of the chosen slots
/// (every slot of the day when none are given).
pub async fn run_grocery(planner: &mut Planner, target: Target, slots: &[MealSlot]) -> Result<()> {
    let ids = grocery_ids(planner, target, slots).await?;
    if ids.is_empty() {
        println!("No saved meals selected.");
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

async fn grocery_ids(planner: &mut Planner, target: Target, slots: &[MealSlot]) -> Result<Vec<Uuid>> {
    focus(planner, target).await?;
    if slots.is_empty() {
        planner.session.toggle_all();
    } else {
        for slot in slots {
            planner.session.toggle(*slot);
        }
    }
    let ids = planner
        .session
        .grocery_item_ids()
        .await
        .context("failed to look up saved meals")?;
    planner.session.clear_selection();
    Ok(ids)
}

fn print_outcomes(planner: &Planner, outcomes: &[(SlotKey, SlotOutcome)]) {
    for (key, outcome) in outcomes {
        match outcome {
            SlotOutcome::Filled { persisted, .. } => {
                let meal = planner
                    .session
                    .meal(key.day, key.slot)
                    .map(|meal| describe(&meal))
                    .unwrap_or_default();
                let note = if *persisted { "" } else { " [not saved]" };
                println!("  {key}: {meal}{note}");
            }
            SlotOutcome::Failed { message } => println!("  {key}: failed: {message}"),
            SlotOutcome::Skipped => println!("  {key}: skipped, already generating"),
            SlotOutcome::Discarded => println!("  {key}: discarded"),
        }
    }
}

fn require_any_filled(outcomes: &[(SlotKey, SlotOutcome)]) -> Result<()> {
    if outcomes.iter().any(|(_, outcome)| outcome.is_filled()) {
        Ok(())
    } else {
        bail!("no meals were generated")
    }
}
