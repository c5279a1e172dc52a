use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    constants::USER_COUNT_PER_PAGE,
    error::{ApiError, QueryError, RequestError},
    pagination::PageContext,
    schema::{RecipeSummary, SubscriptionEntry, SubscriptionRow, User, UserProfile, Uuid},
};

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: i32) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user. The password is hashed before it reaches the database;
/// a taken username or email leaves the table untouched.
pub async fn register_user(
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, ApiError> {
    let password = hash_password(password)
        .map_err(|_| RequestError::InternalServerError.new("Failed to hash password"))?;

    let row: Option<(i32,)> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(username)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(password)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    match row {
        Some(id) => Ok(id.0),
        None => Err(RequestError::Conflict.new("Username or email is already taken")),
    }
}

pub async fn login_user(
    username: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let user = match get_user(pool, username).await? {
        Some(user) => user,
        None => return Err(RequestError::BadRequest.new("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| RequestError::InternalServerError.new("Corrupt password hash"))?;
    if !authenticated {
        return Err(RequestError::BadRequest.new("Invalid credentials"));
    }

    Ok(generate_jwt_session(&user))
}

pub async fn is_subscribed(
    author_id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(i32,)> = sqlx::query_as(
        "
        SELECT author_id FROM user_subscriptions WHERE author_id = $1 AND user_id = $2
    ",
    )
    .bind(author_id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Viewer-relative profile projection; `is_subscribed` is always false for
/// anonymous viewers.
pub async fn get_user_profile(
    user_id: i32,
    viewer: Option<i32>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserProfile>, ApiError> {
    let user = match get_user_by_id(pool, user_id).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    let subscribed = match viewer {
        Some(viewer) => is_subscribed(user.id, viewer, pool).await?,
        None => false,
    };

    Ok(Some(UserProfile::from_user(user, subscribed)))
}

pub async fn subscribe(
    author_id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    if author_id == user_id {
        return Err(RequestError::BadRequest.new("author: cannot subscribe to yourself"));
    }

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(RequestError::NotFound.new("No user exists with specified id"));
    }

    let result = sqlx::query(
        "INSERT INTO user_subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(RequestError::Conflict.new("Already subscribed to this author"));
    }

    Ok(())
}

pub async fn unsubscribe(
    author_id: i32,
    user_id: i32,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM user_subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(RequestError::NotFound.new("Not subscribed to this author"));
    }

    Ok(())
}

/// Authors the user follows, each with a bounded preview of their recipes
/// and the full recipe count.
pub async fn fetch_subscriptions(
    user_id: i32,
    offset: i64,
    recipes_limit: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionEntry>, ApiError> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM user_subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|r| r.count).unwrap_or(0);

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let recipes: Vec<RecipeSummary> = sqlx::query_as(
            "
            SELECT id, name, image, cooking_time
            FROM recipes
            WHERE author_id = $1
            ORDER BY created_at DESC
            LIMIT $2
        ",
        )
        .bind(row.id)
        .bind(recipes_limit)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        let recipes_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
                .bind(row.id)
                .fetch_one(pool)
                .await
                .map_err(|e| QueryError::from(e).into())?;

        entries.push(SubscriptionEntry {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes,
            recipes_count: recipes_count.0,
        });
    }

    Ok(PageContext::from_rows(
        entries,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}
