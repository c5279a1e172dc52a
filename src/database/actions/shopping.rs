use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError, RequestError},
    schema::{RecipeSummary, ShoppingListRow},
};

use super::recipes::get_recipe;

pub async fn is_in_shopping_cart(
    id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(i32,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM user_shopping_cart WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

pub async fn add_to_shopping_cart(
    id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, ApiError> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(RequestError::NotFound.new("No recipe exists with specified id")),
    };

    let result = sqlx::query(
        "INSERT INTO user_shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
    )
    .bind(user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(RequestError::Conflict.new("Recipe is already in the shopping cart"));
    }

    Ok(RecipeSummary {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_from_shopping_cart(
    id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM user_shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(RequestError::NotFound.new("Recipe is not in the shopping cart"));
    }

    Ok(())
}

/// Flattens the user's cart into one row per (ingredient name, unit) with
/// amounts summed across recipes, name-ascending. Pure read; identical cart
/// contents always produce identical output.
pub async fn fetch_shopping_list(
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListRow>, ApiError> {
    let rows: Vec<ShoppingListRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount) AS total_amount
        FROM user_shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// One text line per aggregated ingredient, in the order the rows arrive.
pub fn render_shopping_list(rows: &[ShoppingListRow]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "{} - {} {}.",
                row.name, row.total_amount, row.measurement_unit
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, total: i64) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            total_amount: total,
        }
    }

    #[test]
    fn renders_one_line_per_group() {
        let rows = vec![
            row("carrot", "g", 5),
            row("onion", "g", 1),
            row("salt", "g", 1),
        ];
        assert_eq!(
            render_shopping_list(&rows),
            "carrot - 5 g.\nonion - 1 g.\nsalt - 1 g."
        );
    }

    #[test]
    fn empty_cart_renders_nothing() {
        assert_eq!(render_shopping_list(&[]), "");
    }

    #[test]
    fn rendering_preserves_row_order() {
        let rows = vec![row("flour", "g", 400), row("milk", "ml", 250)];
        let text = render_shopping_list(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["flour - 400 g.", "milk - 250 ml."]);
    }
}
