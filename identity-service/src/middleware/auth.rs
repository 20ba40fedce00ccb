use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

/// The raw bearer credential, if the request carried one.
///
/// Extraction never fails. A missing or malformed header is left for the
/// authorization gate to reject, so that the rejection happens inside the
/// audited section of the handler.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
            })
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Ok(BearerToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(value: Option<&str>) -> BearerToken {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerToken::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_bearer_scheme() {
        assert_eq!(extract(Some("Bearer abc")).await.token(), Some("abc"));
        assert_eq!(extract(Some("bearer abc")).await.token(), Some("abc"));
    }

    #[tokio::test]
    async fn test_missing_or_other_scheme() {
        assert_eq!(extract(None).await.token(), None);
        assert_eq!(extract(Some("Basic YWxpY2U6cHc=")).await.token(), None);
        assert_eq!(extract(Some("Bearer ")).await.token(), None);
    }
}
