mod database {
    pub mod error;
    pub mod pagination;
    pub mod schema;
    pub mod actions {
        pub mod ingredients;
        pub mod recipes;
        pub mod shopping;
        pub mod tags;
        pub mod users;
    }
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod routes {
    pub mod ingredients;
    pub mod recipes;
    pub mod tags;
    pub mod users;

    use sqlx::{Pool, Postgres};
    use warp::Filter;

    pub(crate) fn with_pool(
        pool: Pool<Postgres>,
    ) -> impl Filter<Extract = (Pool<Postgres>,), Error = std::convert::Infallible> + Clone {
        warp::any().map(move || pool.clone())
    }
}
mod constants;

pub use authentication::*;
pub use constants::*;
pub use database::*;

use std::convert::Infallible;

use sqlx::{Pool, Postgres};
use warp::{Filter, Reply};

/// Combined API filter: every resource route plus the rejection handler.
pub fn api(pool: Pool<Postgres>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    routes::users::routes(pool.clone())
        .or(routes::tags::routes(pool.clone()))
        .or(routes::ingredients::routes(pool.clone()))
        .or(routes::recipes::routes(pool))
        .recover(error::handle_rejection)
}
