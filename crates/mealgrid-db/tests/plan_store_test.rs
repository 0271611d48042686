//! Tests for the `plans` and `plan_items` query modules.
//!
//! Each test gets its own database on the shared test server and skips
//! when no PostgreSQL is available.

use chrono::NaiveDate;

use mealgrid_db::models::{Day, MealSlot, Nutrition, Recipe};
use mealgrid_db::pool;
use mealgrid_db::queries::plan_items::{self, NewPlanItem};
use mealgrid_db::queries::plans;
use mealgrid_test_utils::{drop_test_db, try_create_test_db};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn recipe(id: &str) -> Recipe {
    Recipe {
        id: id.to_string(),
        title: format!("Recipe {id}"),
        servings: 2,
        cook_time_minutes: 25,
        nutrition: Nutrition {
            calories: 510,
            protein_g: 31.0,
            carbs_g: 40.0,
            fat_g: 18.5,
        },
        grade: Some("A".to_string()),
    }
}

fn item<'a>(day: Day, slot: MealSlot, recipe: &'a Recipe) -> NewPlanItem<'a> {
    NewPlanItem {
        day,
        meal_slot: slot,
        recipe_id: &recipe.id,
        recipe,
    }
}

#[tokio::test]
async fn insert_plan_is_idempotent_per_week() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    let first = plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    let second = plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    assert_eq!(first.id, second.id);

    let other = plans::insert_plan(&pool, "ben", monday()).await.unwrap();
    assert_ne!(first.id, other.id);

    let found = plans::get_plan_for_week(&pool, "ana", monday())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
    assert!(
        plans::get_plan_for_week(&pool, "ana", NaiveDate::from_ymd_opt(2026, 10, 26).unwrap())
            .await
            .unwrap()
            .is_none()
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn week_start_must_be_monday() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    let tuesday = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
    assert!(plans::insert_plan(&pool, "ana", tuesday).await.is_err());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_plans_newest_week_first() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    plans::insert_plan(&pool, "ana", NaiveDate::from_ymd_opt(2026, 10, 26).unwrap())
        .await
        .unwrap();
    plans::insert_plan(&pool, "ben", monday()).await.unwrap();

    let listed = plans::list_plans_for_profile(&pool, "ana").await.unwrap();
    let weeks: Vec<NaiveDate> = listed.iter().map(|p| p.week_start).collect();
    assert_eq!(
        weeks,
        vec![NaiveDate::from_ymd_opt(2026, 10, 26).unwrap(), monday()]
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn upsert_same_key_replaces_item() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    let plan = plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    let first_recipe = recipe("r-1");
    let second_recipe = recipe("r-2");

    let first = plan_items::upsert_item(
        &pool,
        plan.id,
        &item(Day::Monday, MealSlot::Dinner, &first_recipe),
    )
    .await
    .unwrap();
    let second = plan_items::upsert_item(
        &pool,
        plan.id,
        &item(Day::Monday, MealSlot::Dinner, &second_recipe),
    )
    .await
    .unwrap();

    assert_eq!(first.id, second.id, "replacement keeps the item id");
    assert_eq!(plan_items::count_items(&pool, plan.id).await.unwrap(), 1);

    let items = plan_items::list_items_for_plan(&pool, plan.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].recipe_id, "r-2");
    assert_eq!(items[0].recipe.0, second_recipe);
    assert!(items[0].updated_at >= items[0].created_at);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn items_listed_in_grid_order() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    let plan = plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    let r = recipe("r");
    for (day, slot) in [
        (Day::Sunday, MealSlot::Breakfast),
        (Day::Monday, MealSlot::Dinner),
        (Day::Wednesday, MealSlot::Lunch),
        (Day::Monday, MealSlot::Breakfast),
    ] {
        plan_items::upsert_item(&pool, plan.id, &item(day, slot, &r))
            .await
            .unwrap();
    }

    let keys: Vec<(Day, MealSlot)> = plan_items::list_items_for_plan(&pool, plan.id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| (i.day, i.meal_slot))
        .collect();
    assert_eq!(
        keys,
        vec![
            (Day::Monday, MealSlot::Breakfast),
            (Day::Monday, MealSlot::Dinner),
            (Day::Wednesday, MealSlot::Lunch),
            (Day::Sunday, MealSlot::Breakfast),
        ]
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_item_and_cascade() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    let plan = plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    let r = recipe("r");
    let saved = plan_items::upsert_item(&pool, plan.id, &item(Day::Friday, MealSlot::Lunch, &r))
        .await
        .unwrap();

    assert_eq!(plan_items::delete_item(&pool, plan.id, saved.id).await.unwrap(), 1);
    assert_eq!(plan_items::delete_item(&pool, plan.id, saved.id).await.unwrap(), 0);
    assert_eq!(plan_items::count_items(&pool, plan.id).await.unwrap(), 0);

    plan_items::upsert_item(&pool, plan.id, &item(Day::Friday, MealSlot::Lunch, &r))
        .await
        .unwrap();
    sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(plan.id)
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(plan_items::count_items(&pool, plan.id).await.unwrap(), 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn store_summary_counts_rows() {
    let Some((pool, db_name)) = try_create_test_db().await else {
        return;
    };

    let plan = plans::insert_plan(&pool, "ana", monday()).await.unwrap();
    let r = recipe("r");
    plan_items::upsert_item(&pool, plan.id, &item(Day::Monday, MealSlot::Lunch, &r))
        .await
        .unwrap();

    plans::insert_plan(&pool, "ana", monday() + chrono::Days::new(7))
        .await
        .unwrap();
    plans::insert_plan(&pool, "ben", monday()).await.unwrap();

    let summary = pool::store_summary(&pool).await.unwrap();
    assert_eq!(
        summary,
        pool::StoreSummary {
            profiles: 2,
            plans: 3,
            items: 1,
        }
    );

    pool.close().await;
    drop_test_db(&db_name).await;
}
