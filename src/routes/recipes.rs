use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::{reply, Filter, Rejection, Reply};

use crate::{
    actions::{recipes, shopping},
    error::RequestError,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    permissions::ActionType,
    schema::{RecipeForm, RecipeQuery},
};

use super::with_pool;

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<RecipeQuery>())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(list);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("recipes" / i32)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(detail);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session())
        .and(warp::body::json())
        .and(with_pool(pool.clone()))
        .and_then(create);

    let update = warp::path!("recipes" / i32)
        .and(warp::patch())
        .and(with_session())
        .and(warp::body::json())
        .and(with_pool(pool.clone()))
        .and_then(update);

    let delete = warp::path!("recipes" / i32)
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(delete);

    let favorite = warp::path!("recipes" / i32 / "favorite")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(favorite);

    let unfavorite = warp::path!("recipes" / i32 / "favorite")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(unfavorite);

    let cart_add = warp::path!("recipes" / i32 / "shopping_cart")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(cart_add);

    let cart_remove = warp::path!("recipes" / i32 / "shopping_cart")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool))
        .and_then(cart_remove);

    list.or(download)
        .or(detail)
        .or(create)
        .or(update)
        .or(delete)
        .or(favorite)
        .or(unfavorite)
        .or(cart_add)
        .or(cart_remove)
}

async fn list(
    query: RecipeQuery,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);

    // Membership filters are viewer-relative; anonymous requests ignore them.
    let favorited_by = match query.is_favorited {
        Some(true) => viewer,
        _ => None,
    };
    let in_cart_of = match query.is_in_shopping_cart {
        Some(true) => viewer,
        _ => None,
    };

    let page = recipes::fetch_recipes(
        query.author,
        query.tag,
        favorited_by,
        in_cart_of,
        viewer,
        query.offset.unwrap_or(0),
        &pool,
    )
    .await?;

    Ok(reply::json(&page))
}

async fn detail(
    id: i32,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);

    match recipes::get_recipe_detail(id, viewer, &pool).await? {
        Some(detail) => Ok(reply::json(&detail)),
        None => Err(RequestError::NotFound
            .new("No recipe exists with specified id")
            .into()),
    }
}

async fn create(
    session: SessionData,
    form: RecipeForm,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let id = recipes::create_recipe(session.user_id, &form, &pool).await?;

    let detail = recipes::get_recipe_detail(id, Some(session.user_id), &pool)
        .await?
        .ok_or_else(|| RequestError::InternalServerError.default())?;

    Ok(reply::with_status(reply::json(&detail), StatusCode::CREATED))
}

async fn update(
    id: i32,
    session: SessionData,
    form: RecipeForm,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.user_id;
    let recipe = recipes::get_recipe_mut(id, session, &pool).await?;

    recipes::update_recipe(recipe.id, &form, &pool).await?;

    let detail = recipes::get_recipe_detail(recipe.id, Some(viewer), &pool)
        .await?
        .ok_or_else(|| RequestError::InternalServerError.default())?;

    Ok(reply::json(&detail))
}

async fn delete(id: i32, session: SessionData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let recipe = recipes::get_recipe_mut(id, session, &pool).await?;

    recipes::delete_recipe(recipe.id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

async fn favorite(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    let summary = recipes::add_to_favorites(id, session.user_id, &pool).await?;

    Ok(reply::with_status(
        reply::json(&summary),
        StatusCode::CREATED,
    ))
}

async fn unfavorite(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    recipes::remove_from_favorites(id, session.user_id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

async fn cart_add(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let summary = shopping::add_to_shopping_cart(id, session.user_id, &pool).await?;

    Ok(reply::with_status(
        reply::json(&summary),
        StatusCode::CREATED,
    ))
}

async fn cart_remove(
    id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    shopping::remove_from_shopping_cart(id, session.user_id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

async fn download_shopping_cart(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let rows = shopping::fetch_shopping_list(session.user_id, &pool).await?;
    let body = shopping::render_shopping_list(&rows);

    Ok(reply::with_header(
        reply::with_header(body, "Content-Type", "text/plain; charset=utf-8"),
        "Content-Disposition",
        "attachment; filename=\"shopping-list.txt\"",
    ))
}
