use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::{
        MAX_INGREDIENT_AMOUNT, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, RECIPE_COUNT_PER_PAGE,
    },
    error::{ApiError, QueryError, RequestError},
    jwt::SessionData,
    pagination::PageContext,
    schema::{
        Recipe, RecipeDetail, RecipeForm, RecipeIngredientRow, RecipeRow, RecipeSummary, Tag,
        UserProfile, Uuid,
    },
};

use super::{shopping, users};

/// Paginated recipe listing, newest first. Every filter is optional; the
/// favorite/cart membership flags are computed against `viewer` and stay
/// false when there is none.
pub async fn fetch_recipes(
    author: Option<i32>,
    tag: Option<String>,
    favorited_by: Option<i32>,
    in_cart_of: Option<i32>,
    viewer: Option<i32>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, ApiError> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.image, r.cooking_time, r.created_at, \
         EXISTS(SELECT 1 FROM user_favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query.push_bind(viewer);
    query.push(
        ") AS is_favorited, \
         EXISTS(SELECT 1 FROM user_shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    query.push_bind(viewer);
    query.push(") AS is_in_shopping_cart, COUNT(*) OVER() AS count FROM recipes r");

    if let Some(tag) = tag {
        query.push(
            " INNER JOIN recipe_tags rt ON rt.recipe_id = r.id \
             INNER JOIN tags t ON t.id = rt.tag_id AND t.slug = ",
        );
        query.push_bind(tag);
    }

    query.push(" WHERE TRUE");
    if let Some(author) = author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }
    if let Some(user_id) = favorited_by {
        query.push(
            " AND EXISTS(SELECT 1 FROM user_favorites ff WHERE ff.recipe_id = r.id AND ff.user_id = ",
        );
        query.push_bind(user_id);
        query.push(")");
    }
    if let Some(user_id) = in_cart_of {
        query.push(
            " AND EXISTS(SELECT 1 FROM user_shopping_cart cc WHERE cc.recipe_id = r.id AND cc.user_id = ",
        );
        query.push_bind(user_id);
        query.push(")");
    }

    query.push(" ORDER BY r.created_at DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|r| r.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);
    Ok(page)
}

pub async fn get_recipe(id: i32, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Fetches a recipe for mutation: the session must own it, unless it may
/// manage all recipes.
pub async fn get_recipe_mut(
    id: i32,
    session: SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(RequestError::Forbidden.default())
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(RequestError::NotFound.new("No recipe exists with specified id")),
    }
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_id: i32,
) -> Result<Vec<RecipeIngredientRow>, ApiError> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_id: i32,
) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Full read-side projection of one recipe for a given viewer.
pub async fn get_recipe_detail(
    id: i32,
    viewer: Option<i32>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeDetail>, ApiError> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Ok(None),
    };

    let author = users::get_user_by_id(pool, recipe.author_id)
        .await?
        .ok_or_else(|| RequestError::InternalServerError.new("Recipe author does not exist"))?;

    let (is_favorited, is_in_shopping_cart, is_subscribed) = match viewer {
        Some(viewer) => (
            is_favorite(id, viewer, pool).await?,
            shopping::is_in_shopping_cart(id, viewer, pool).await?,
            users::is_subscribed(author.id, viewer, pool).await?,
        ),
        None => (false, false, false),
    };

    let tags = list_recipe_tags(pool, id).await?;
    let ingredients = list_recipe_ingredients(pool, id).await?;

    Ok(Some(RecipeDetail {
        id: recipe.id,
        author: UserProfile::from_user(author, is_subscribed),
        tags,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        created_at: recipe.created_at,
    }))
}

/// Rejects a write payload before anything touches the database: lists must
/// be non-empty with pairwise distinct ids, amounts and cooking time must be
/// in range. The violated field leads the message.
pub fn validate_recipe_form(form: &RecipeForm) -> Result<(), ApiError> {
    if form.cooking_time < MIN_COOKING_TIME {
        return Err(RequestError::BadRequest.new("cooking_time: must be at least 1 minute"));
    }

    if form.ingredients.is_empty() {
        return Err(RequestError::BadRequest.new("ingredients: at least one is required"));
    }
    let mut seen = HashSet::new();
    for part in &form.ingredients {
        if part.amount < MIN_INGREDIENT_AMOUNT || part.amount > MAX_INGREDIENT_AMOUNT {
            return Err(RequestError::BadRequest.new(&format!(
                "ingredients: amount must be within [{MIN_INGREDIENT_AMOUNT}, {MAX_INGREDIENT_AMOUNT}]"
            )));
        }
        if !seen.insert(part.id) {
            return Err(RequestError::BadRequest.new("ingredients: ids must not repeat"));
        }
    }

    if form.tags.is_empty() {
        return Err(RequestError::BadRequest.new("tags: at least one is required"));
    }
    let distinct: HashSet<Uuid> = form.tags.iter().copied().collect();
    if distinct.len() != form.tags.len() {
        return Err(RequestError::BadRequest.new("tags: ids must not repeat"));
    }

    Ok(())
}

async fn assert_references_exist(
    form: &RecipeForm,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    let ingredient_ids: Vec<Uuid> = form.ingredients.iter().map(|part| part.id).collect();
    let found: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids[..])
        .fetch_one(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    if found.0 != ingredient_ids.len() as i64 {
        return Err(RequestError::BadRequest.new("ingredients: unknown ingredient id"));
    }

    let found: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(&form.tags[..])
        .fetch_one(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    if found.0 != form.tags.len() as i64 {
        return Err(RequestError::BadRequest.new("tags: unknown tag id"));
    }

    Ok(())
}

async fn insert_recipe_links(
    recipe_id: Uuid,
    form: &RecipeForm,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(form.ingredients.iter(), |mut b, part| {
        b.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });
    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(form.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Creates the recipe row and both junction sets in one transaction; nothing
/// persists when any step fails.
pub async fn create_recipe(
    author_id: i32,
    form: &RecipeForm,
    pool: &Pool<Postgres>,
) -> Result<Uuid, ApiError> {
    validate_recipe_form(form)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    assert_references_exist(form, &mut tr).await?;

    let id: (i32,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(&form.image)
    .bind(form.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    insert_recipe_links(id.0, form, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(id.0)
}

/// Replaces the scalar fields and both junction sets wholesale, atomically.
pub async fn update_recipe(
    recipe_id: i32,
    form: &RecipeForm,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    validate_recipe_form(form)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    assert_references_exist(form, &mut tr).await?;

    sqlx::query("UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5")
        .bind(&form.name)
        .bind(&form.text)
        .bind(&form.image)
        .bind(form.cooking_time)
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    insert_recipe_links(recipe_id, form, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

/// Removes the recipe and every row referencing it in one transaction.
pub async fn delete_recipe(id: i32, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM user_favorites WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM user_shopping_cart WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

pub async fn is_favorite(id: i32, user_id: i32, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result: Option<(i32,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM user_favorites WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

pub async fn add_to_favorites(
    id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, ApiError> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(RequestError::NotFound.new("No recipe exists with specified id")),
    };

    let result = sqlx::query(
        "INSERT INTO user_favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
    )
    .bind(user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(RequestError::Conflict.new("Recipe is already in favorites"));
    }

    Ok(RecipeSummary {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_from_favorites(
    id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(RequestError::NotFound.new("Recipe is not in favorites"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecipeIngredientForm;

    fn form(ingredients: Vec<(Uuid, i32)>, tags: Vec<Uuid>) -> RecipeForm {
        RecipeForm {
            name: String::from("Korvapuusti"),
            text: String::from("Bake until golden."),
            image: None,
            cooking_time: 45,
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| RecipeIngredientForm { id, amount })
                .collect(),
            tags,
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(validate_recipe_form(&form(vec![(1, 2), (2, 3)], vec![1, 2])).is_ok());
    }

    #[test]
    fn duplicate_ingredient_ids_are_rejected() {
        let err = validate_recipe_form(&form(vec![(1, 2), (1, 3)], vec![1])).unwrap_err();
        assert_eq!(err.code, 400);
        assert!(err.info.unwrap().starts_with("ingredients:"));
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert!(validate_recipe_form(&form(vec![], vec![1])).is_err());
    }

    #[test]
    fn out_of_range_amounts_are_rejected() {
        assert!(validate_recipe_form(&form(vec![(1, 0)], vec![1])).is_err());
        assert!(validate_recipe_form(&form(vec![(1, 32768)], vec![1])).is_err());
        assert!(validate_recipe_form(&form(vec![(1, 32767)], vec![1])).is_ok());
    }

    #[test]
    fn empty_or_repeating_tags_are_rejected() {
        assert!(validate_recipe_form(&form(vec![(1, 1)], vec![])).is_err());
        let err = validate_recipe_form(&form(vec![(1, 1)], vec![2, 2])).unwrap_err();
        assert!(err.info.unwrap().starts_with("tags:"));
    }

    #[test]
    fn zero_cooking_time_is_rejected() {
        let mut form = form(vec![(1, 1)], vec![1]);
        form.cooking_time = 0;
        let err = validate_recipe_form(&form).unwrap_err();
        assert!(err.info.unwrap().starts_with("cooking_time:"));
    }
}
