use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Upper bound on pages fetched when listing sessions
const MAX_LIST_PAGES: usize = 20;

#[derive(thiserror::Error, Debug)]
pub enum StripeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Stripe API error (status {status}): {message}")]
    ApiError { status: StatusCode, message: String },
}

/// Form body in Stripe's bracket notation, e.g. `line_items[0][quantity]=1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormParams(Vec<(String, String)>);

impl FormParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn push_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// The subset of a Checkout Session this site reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    pub payment_status: Option<String>,
    pub submit_type: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created: i64,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

#[derive(Debug, Deserialize)]
struct SessionList {
    data: Vec<CheckoutSession>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: Secret<String>,
}

impl StripeClient {
    pub fn new(api_base: &str, secret_key: Secret<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    /// Creates a hosted Checkout Session
    #[tracing::instrument(skip(self, params))]
    pub async fn create_checkout_session(
        &self,
        params: &FormParams,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(params.pairs())
            .send()
            .await?;

        let session: CheckoutSession = parse_response(response).await?;

        tracing::info!(session_id = %session.id, "Checkout session created");

        Ok(session)
    }

    /// Retrieves a session with its payment intent and customer expanded
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let url = format!("{}/v1/checkout/sessions/{}", self.api_base, session_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .query(&[("expand[]", "payment_intent"), ("expand[]", "customer")])
            .send()
            .await?;

        parse_response(response).await
    }

    /// Lists sessions created at or after `created_gte` (unix seconds),
    /// following pagination
    #[tracing::instrument(skip(self))]
    pub async fn list_checkout_sessions(
        &self,
        created_gte: i64,
    ) -> Result<Vec<CheckoutSession>, StripeError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let mut sessions = Vec::new();
        let mut starting_after: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut query = vec![
                ("limit".to_string(), "100".to_string()),
                ("created[gte]".to_string(), created_gte.to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after".to_string(), cursor.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(self.secret_key.expose_secret())
                .query(&query)
                .send()
                .await?;

            let page: SessionList = parse_response(response).await?;
            starting_after = page.data.last().map(|s| s.id.clone());
            sessions.extend(page.data);

            if !page.has_more || starting_after.is_none() {
                break;
            }
        }

        tracing::debug!(count = sessions.len(), "Listed checkout sessions");

        Ok(sessions)
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StripeError> {
    let status = response.status();

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or(body);

        tracing::error!(status = %status, error = %message, "Stripe API request failed");

        return Err(StripeError::ApiError { status, message });
    }

    Ok(response.json::<T>().await?)
}
