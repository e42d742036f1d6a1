use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};

use crate::{RequestSession, Session};

impl<S> FromRequestParts<S> for Session
where
    S: Sync + Send,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request = parts.extensions.get::<RequestSession>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract session. Is `SessionManagerLayer` enabled?",
        ))?;

        request.resolve().await.map_err(|err| {
            tracing::error!(err = %err, "session resolution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to resolve session",
            )
        })
    }
}
