// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request extractors.

use crate::error::AppError;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

/// JSON body that is deserialized and then checked with `validator`.
///
/// Both malformed JSON and failed validation are rejected as a 400
/// `{"message": ...}` rather than axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::Validation(describe(&errors)))?;

        Ok(Self(value))
    }
}

/// Query string counterpart of [`ValidatedJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::Validation(describe(&errors)))?;

        Ok(Self(value))
    }
}

/// One human-readable line for the first failing field (by name).
fn describe(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .find_map(|(field, errs)| {
            errs.first().map(|e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("Invalid value for {}", field),
            })
        })
        .unwrap_or_else(|| "Invalid request".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
        duration: u32,
        #[validate(length(min = 1))]
        label: String,
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let ValidatedJson(p) =
            ValidatedJson::<Payload>::from_request(request(r#"{"duration":5,"label":"x"}"#), &())
                .await
                .unwrap();
        assert_eq!(p.duration, 5);
    }

    #[tokio::test]
    async fn test_custom_message_surfaces() {
        let err = ValidatedJson::<Payload>::from_request(
            request(r#"{"duration":0,"label":"x"}"#),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Duration must be at least 1 minute");
    }

    #[tokio::test]
    async fn test_default_message_names_field() {
        let err = ValidatedJson::<Payload>::from_request(
            request(r#"{"duration":3,"label":""}"#),
            &(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for label");
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Params {
        #[validate(range(max = 100, message = "Limit is too large"))]
        limit: Option<u32>,
    }

    async fn query(uri: &str) -> Result<ValidatedQuery<Params>, AppError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        ValidatedQuery::<Params>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_query_rejections_are_validation_errors() {
        let ValidatedQuery(p) = query("/?limit=5").await.unwrap();
        assert_eq!(p.limit, Some(5));

        assert!(matches!(query("/?limit=many").await, Err(AppError::Validation(_))));
        assert!(matches!(
            query("/?limit=1&limit=2").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            query("/?limit=500").await.unwrap_err().to_string(),
            "Limit is too large"
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let err = ValidatedJson::<Payload>::from_request(request("{"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
