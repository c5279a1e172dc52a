use sqlx::{Pool, Postgres};
use warp::{reply, Filter, Rejection, Reply};

use crate::{actions::ingredients, error::RequestError, schema::IngredientQuery};

use super::with_pool;

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_pool(pool.clone()))
        .and_then(list);

    let detail = warp::path!("ingredients" / i32)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(detail);

    list.or(detail)
}

async fn list(query: IngredientQuery, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let rows = ingredients::list_ingredients(query.name.as_deref(), &pool).await?;
    Ok(reply::json(&rows))
}

async fn detail(id: i32, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match ingredients::get_ingredient(id, &pool).await? {
        Some(ingredient) => Ok(reply::json(&ingredient)),
        None => Err(RequestError::NotFound
            .new("No ingredient exists with specified id")
            .into()),
    }
}
