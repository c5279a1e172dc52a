use warp::{reject::Rejection, Filter};

use crate::constants::SESSION_COOKIE;
use crate::database::error::ApiError;

use super::jwt::{verify_jwt_session, SessionData};

pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    warp::cookie::<String>(SESSION_COOKIE).and_then(|session: String| async move {
        match verify_jwt_session(session) {
            Ok(data) => Ok(SessionData::from(data)),
            Err(e) => Err(warp::reject::custom(e)),
        }
    })
}

/// Like `with_session`, but anonymous requests pass through with `None`
/// instead of being rejected. An invalid token is still an error.
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Copy {
    warp::cookie::optional::<String>(SESSION_COOKIE).and_then(
        |session: Option<String>| async move {
            match session {
                Some(session) => match verify_jwt_session(session) {
                    Ok(data) => Ok::<_, Rejection>(Some(SessionData::from(data))),
                    Err(e) => Err(warp::reject::custom::<ApiError>(e)),
                },
                None => Ok(None),
            }
        },
    )
}
