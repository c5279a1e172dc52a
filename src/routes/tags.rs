use sqlx::{Pool, Postgres};
use warp::{reply, Filter, Rejection, Reply};

use crate::{actions::tags, error::RequestError};

use super::with_pool;

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list);

    let detail = warp::path!("tags" / i32)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(detail);

    list.or(detail)
}

async fn list(pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let tags = tags::list_tags(&pool).await?;
    Ok(reply::json(&tags))
}

async fn detail(id: i32, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match tags::get_tag(id, &pool).await? {
        Some(tag) => Ok(reply::json(&tag)),
        None => Err(RequestError::NotFound
            .new("No tag exists with specified id")
            .into()),
    }
}
