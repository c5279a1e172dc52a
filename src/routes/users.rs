use sqlx::{Pool, Postgres};
use warp::http::StatusCode;
use warp::{reply, Filter, Rejection, Reply};

use crate::{
    actions::users,
    constants::{DEFAULT_RECIPES_LIMIT, SESSION_COOKIE},
    error::RequestError,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    permissions::ActionType,
    schema::{LoginForm, RegisterForm, SubscriptionsQuery},
};

use super::with_pool;

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let register = warp::path!("users")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_pool(pool.clone()))
        .and_then(register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_pool(pool.clone()))
        .and_then(login);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session())
        .and(warp::query::<SubscriptionsQuery>())
        .and(with_pool(pool.clone()))
        .and_then(subscriptions);

    let subscribe = warp::path!("users" / i32 / "subscribe")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / i32 / "subscribe")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(unsubscribe);

    let profile = warp::path!("users" / i32)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool))
        .and_then(profile);

    register
        .or(login)
        .or(subscriptions)
        .or(subscribe)
        .or(unsubscribe)
        .or(profile)
}

async fn register(form: RegisterForm, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let id = users::register_user(
        &form.username,
        &form.email,
        &form.first_name,
        &form.last_name,
        &form.password,
        &pool,
    )
    .await?;

    let profile = users::get_user_profile(id, None, &pool)
        .await?
        .ok_or_else(|| RequestError::InternalServerError.default())?;

    Ok(reply::with_status(
        reply::json(&profile),
        StatusCode::CREATED,
    ))
}

async fn login(form: LoginForm, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let token = users::login_user(&form.username, &form.password, &pool).await?;

    Ok(reply::with_header(
        reply::json(&serde_json::json!({ "session": token })),
        "Set-Cookie",
        format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/"),
    ))
}

async fn subscriptions(
    session: SessionData,
    query: SubscriptionsQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let page = users::fetch_subscriptions(
        session.user_id,
        query.offset.unwrap_or(0),
        query.recipes_limit.unwrap_or(DEFAULT_RECIPES_LIMIT),
        &pool,
    )
    .await?;

    Ok(reply::json(&page))
}

async fn subscribe(
    author_id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    users::subscribe(author_id, session.user_id, &pool).await?;

    let profile = users::get_user_profile(author_id, Some(session.user_id), &pool)
        .await?
        .ok_or_else(|| RequestError::InternalServerError.default())?;

    Ok(reply::with_status(
        reply::json(&profile),
        StatusCode::CREATED,
    ))
}

async fn unsubscribe(
    author_id: i32,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    users::unsubscribe(author_id, session.user_id, &pool).await?;

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

async fn profile(
    user_id: i32,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);

    match users::get_user_profile(user_id, viewer, &pool).await? {
        Some(profile) => Ok(reply::json(&profile)),
        None => Err(RequestError::NotFound
            .new("No user exists with specified id")
            .into()),
    }
}
