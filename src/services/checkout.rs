use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::AppError;
use crate::models::ShirtSize;
use crate::services::stripe::{CheckoutSession, FormParams, StripeClient, StripeError};

const MIN_DONATION_DOLLARS: f64 = 1.0;
const MAX_DONATION_DOLLARS: f64 = 100_000.0;
const NOTE_MAX_CHARS: usize = 250;
const DEFAULT_TEE_CENTS: i64 = 2500;
const DONATION_PRODUCT_NAME: &str = "AVAILABLE Donation";
const TEE_DESCRIPTION: &str = "Declare it. Wear it.";

#[derive(thiserror::Error, Debug)]
pub enum CheckoutError {
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Missing STRIPE_TEE_PRICE_ID or STRIPE_TEE_PRICE_CENTS in environment")]
    PricingNotConfigured,

    #[error("Missing Stripe Price ID for size {0}")]
    MissingSizePrice(ShirtSize),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidAmount | CheckoutError::PricingNotConfigured => {
                AppError::Validation(err.to_string())
            }
            CheckoutError::MissingSizePrice(_) => AppError::Internal(anyhow::anyhow!(err)),
        }
    }
}

// ---------------------------------------------------------------------------
// Donations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DonationRequest {
    #[serde(default)]
    pub amount: Value,
    pub name: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
}

/// Converts a dollar amount (JSON number or numeric string) into cents,
/// clamped to $1 – $100,000
pub fn parse_donation_amount(amount: &Value) -> Result<i64, CheckoutError> {
    let dollars = match amount {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or(CheckoutError::InvalidAmount)?;

    if !dollars.is_finite() || dollars <= 0.0 {
        return Err(CheckoutError::InvalidAmount);
    }

    let clamped = dollars.clamp(MIN_DONATION_DOLLARS, MAX_DONATION_DOLLARS);
    Ok((clamped * 100.0).round() as i64)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Session parameters shared by both donation attempts
pub fn donation_params(unit_amount: i64, request: &DonationRequest, base_url: &str) -> FormParams {
    let name = non_empty(request.name.as_deref());
    let email = non_empty(request.email.as_deref());
    let note = non_empty(request.note.as_deref());

    let mut params = FormParams::new();
    params
        .push("mode", "payment")
        .push("submit_type", "donate")
        .push("billing_address_collection", "auto")
        .push("line_items[0][price_data][currency]", "usd")
        .push("line_items[0][price_data][unit_amount]", unit_amount.to_string())
        .push(
            "line_items[0][price_data][product_data][name]",
            DONATION_PRODUCT_NAME,
        )
        .push_opt(
            "line_items[0][price_data][product_data][description]",
            note.map(|n| n.chars().take(NOTE_MAX_CHARS).collect::<String>()),
        )
        .push("line_items[0][quantity]", "1")
        .push_opt("customer_email", email)
        .push("metadata[donor_name]", name.unwrap_or(""))
        .push("metadata[donor_email]", email.unwrap_or(""))
        .push("metadata[note]", note.unwrap_or(""))
        .push("metadata[source]", "donation-form")
        .push(
            "success_url",
            format!("{}/thank-you?checkout=success&poll=1", base_url),
        )
        .push("cancel_url", format!("{}/?checkout=cancel", base_url));

    params
}

/// Creates the donation session, first letting Stripe choose payment methods
/// and falling back to card-only when that is rejected
#[tracing::instrument(skip(stripe, params))]
pub async fn create_donation_session(
    stripe: &StripeClient,
    params: &FormParams,
) -> Result<CheckoutSession, StripeError> {
    let mut automatic = params.clone();
    automatic.push("automatic_payment_methods[enabled]", "true");

    match stripe.create_checkout_session(&automatic).await {
        Ok(session) => Ok(session),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "automatic_payment_methods failed; retrying with card only"
            );
            let mut card_only = params.clone();
            card_only.push("payment_method_types[0]", "card");
            stripe.create_checkout_session(&card_only).await
        }
    }
}

// ---------------------------------------------------------------------------
// Shirts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShirtInput {
    pub size: Option<String>,
    pub attendee_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShirtCheckoutRequest {
    #[serde(default)]
    pub shirts: Vec<ShirtInput>,
    #[serde(default)]
    pub contact: ContactInput,
    pub registration_id: Option<String>,
    pub primary_shirt_size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShirtOrder {
    pub attendee_name: String,
    pub size: ShirtSize,
}

/// How shirt line items are priced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShirtPricing {
    /// One saved Stripe price for every size; quantity is adjustable
    SavedPrice(String),
    /// A saved Stripe price per size
    PerSize(Vec<(ShirtSize, String)>),
    /// Inline price data so each size gets its own product name
    Inline { unit_amount: i64 },
}

impl ShirtPricing {
    pub fn from_config(config: &Config) -> Result<Self, CheckoutError> {
        Self::select(
            config.stripe_tee_price_id.as_deref(),
            config.stripe_tee_price_cents.as_deref(),
            &config.stripe_size_price_ids,
        )
    }

    /// A saved `price_` id wins unless per-size ids exist; per-size ids win
    /// over inline pricing. One of the id or the cents must be set; cents
    /// that are not a positive number fall back to the default price.
    pub fn select(
        price_id: Option<&str>,
        price_cents: Option<&str>,
        size_price_ids: &[(ShirtSize, String)],
    ) -> Result<Self, CheckoutError> {
        if price_id.is_none() && price_cents.is_none() {
            return Err(CheckoutError::PricingNotConfigured);
        }

        match price_id {
            Some(id) if id.starts_with("price_") && size_price_ids.is_empty() => {
                Ok(ShirtPricing::SavedPrice(id.to_string()))
            }
            _ if !size_price_ids.is_empty() => Ok(ShirtPricing::PerSize(size_price_ids.to_vec())),
            _ => Ok(ShirtPricing::Inline {
                unit_amount: price_cents.map_or(DEFAULT_TEE_CENTS, parse_tee_cents),
            }),
        }
    }
}

fn parse_tee_cents(raw: &str) -> i64 {
    match raw.trim().parse::<f64>() {
        Ok(cents) if cents.is_finite() && cents >= 1.0 => cents.round() as i64,
        _ => {
            tracing::warn!(
                value = %raw,
                "STRIPE_TEE_PRICE_CENTS is not a positive number; using default price"
            );
            DEFAULT_TEE_CENTS
        }
    }
}

/// Normalises the requested shirts; with none requested, one shirt in the
/// primary size (default M) is ordered for the contact
pub fn normalize_shirts(request: &ShirtCheckoutRequest) -> Vec<ShirtOrder> {
    if request.shirts.is_empty() {
        return vec![ShirtOrder {
            attendee_name: request.contact.name.as_deref().unwrap_or("").trim().to_string(),
            size: request
                .primary_shirt_size
                .as_deref()
                .and_then(ShirtSize::parse)
                .unwrap_or(ShirtSize::M),
        }];
    }

    request
        .shirts
        .iter()
        .map(|s| ShirtOrder {
            attendee_name: s.attendee_name.as_deref().unwrap_or("").trim().to_string(),
            size: s
                .size
                .as_deref()
                .and_then(ShirtSize::parse)
                .unwrap_or(ShirtSize::M),
        })
        .collect()
}

pub fn count_by_size(shirts: &[ShirtOrder]) -> BTreeMap<ShirtSize, u32> {
    let mut counts = BTreeMap::new();
    for shirt in shirts {
        *counts.entry(shirt.size).or_insert(0) += 1;
    }
    counts
}

/// Absolute product image URL: the configured one when it is a valid
/// http(s) URL, otherwise the site's own tee image
pub fn tee_image_url(configured: Option<&str>, base_url: &str) -> String {
    let fallback = format!("{}/images/available-tee.png", base_url);

    configured
        .and_then(|candidate| url::Url::parse(candidate).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .unwrap_or(fallback)
}

fn push_line_items(
    params: &mut FormParams,
    pricing: &ShirtPricing,
    counts: &BTreeMap<ShirtSize, u32>,
    image_url: &str,
) -> Result<(), CheckoutError> {
    match pricing {
        ShirtPricing::SavedPrice(price_id) => {
            let total: u32 = counts.values().sum();
            params
                .push("line_items[0][price]", price_id.as_str())
                .push("line_items[0][quantity]", total.max(1).to_string())
                .push("line_items[0][adjustable_quantity][enabled]", "true")
                .push("line_items[0][adjustable_quantity][minimum]", "1")
                .push("line_items[0][adjustable_quantity][maximum]", "10");
        }
        ShirtPricing::PerSize(prices) => {
            for (i, (size, qty)) in counts.iter().enumerate() {
                let price_id = prices
                    .iter()
                    .find(|(s, _)| s == size)
                    .map(|(_, id)| id.as_str())
                    .ok_or(CheckoutError::MissingSizePrice(*size))?;
                params
                    .push(format!("line_items[{i}][price]"), price_id)
                    .push(format!("line_items[{i}][quantity]"), qty.to_string());
            }
        }
        ShirtPricing::Inline { unit_amount } => {
            for (i, (size, qty)) in counts.iter().enumerate() {
                let prefix = format!("line_items[{i}][price_data]");
                params
                    .push(format!("{prefix}[currency]"), "usd")
                    .push(format!("{prefix}[unit_amount]"), unit_amount.to_string())
                    .push(
                        format!("{prefix}[product_data][name]"),
                        format!("AVAILABLE Tee ({})", size),
                    )
                    .push(format!("{prefix}[product_data][description]"), TEE_DESCRIPTION)
                    .push(format!("{prefix}[product_data][images][0]"), image_url)
                    .push(format!("line_items[{i}][quantity]"), qty.to_string());
            }
        }
    }

    Ok(())
}

/// Builds the full shirt checkout session parameters
pub fn shirt_params(
    request: &ShirtCheckoutRequest,
    pricing: &ShirtPricing,
    image_url: &str,
    base_url: &str,
) -> Result<FormParams, CheckoutError> {
    let shirts = normalize_shirts(request);
    let counts = count_by_size(&shirts);
    let contact = &request.contact;
    let contact_email = non_empty(contact.email.as_deref());

    let sizes_csv = shirts
        .iter()
        .map(|s| s.size.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let shirts_json = serde_json::to_string(&shirts).unwrap_or_else(|_| "[]".to_string());

    let mut params = FormParams::new();
    params
        .push("mode", "payment")
        .push("locale", "auto")
        .push("submit_type", "pay")
        .push_opt("customer_email", contact_email)
        .push("customer_creation", "always")
        .push("billing_address_collection", "required")
        .push("shipping_address_collection[allowed_countries][0]", "US")
        .push("shipping_address_collection[allowed_countries][1]", "CA")
        .push("phone_number_collection[enabled]", "true");

    push_line_items(&mut params, pricing, &counts, image_url)?;

    params
        .push(
            "metadata[registration_id]",
            request.registration_id.as_deref().unwrap_or(""),
        )
        .push("metadata[contact_name]", contact.name.as_deref().unwrap_or(""))
        .push("metadata[contact_email]", contact_email.unwrap_or(""))
        .push("metadata[contact_phone]", contact.phone.as_deref().unwrap_or(""))
        .push("metadata[shirt_sizes]", sizes_csv)
        .push("metadata[shirts]", shirts_json)
        .push(
            "success_url",
            format!("{}/thank-you?checkout=success&poll=1", base_url),
        )
        .push("cancel_url", format!("{}/register?checkout=cancelled", base_url));

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use serde_json::json;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const BASE: &str = "https://example.org";

    fn request_with(sizes: &[&str]) -> ShirtCheckoutRequest {
        ShirtCheckoutRequest {
            shirts: sizes
                .iter()
                .map(|s| ShirtInput {
                    size: Some(s.to_string()),
                    attendee_name: Some(" Kid ".to_string()),
                })
                .collect(),
            contact: ContactInput {
                name: Some("Pat".to_string()),
                email: Some("pat@example.com".to_string()),
                phone: None,
            },
            registration_id: Some("reg-1".to_string()),
            primary_shirt_size: None,
        }
    }

    #[test]
    fn test_parse_donation_amount_accepts_numbers_and_strings() {
        assert_eq!(parse_donation_amount(&json!(25)).unwrap(), 2500);
        assert_eq!(parse_donation_amount(&json!("10.50")).unwrap(), 1050);
        assert_eq!(parse_donation_amount(&json!(" 42 ")).unwrap(), 4200);
    }

    #[test]
    fn test_parse_donation_amount_clamps() {
        assert_eq!(parse_donation_amount(&json!(0.5)).unwrap(), 100);
        assert_eq!(parse_donation_amount(&json!(250000)).unwrap(), 10_000_000);
    }

    #[test]
    fn test_parse_donation_amount_rejects_invalid() {
        for value in [json!(0), json!(-5), json!("abc"), json!(null), json!(true), json!("")] {
            assert!(
                matches!(parse_donation_amount(&value), Err(CheckoutError::InvalidAmount)),
                "expected {value} to be rejected"
            );
        }
    }

    #[test]
    fn test_donation_params() {
        let request = DonationRequest {
            amount: json!(20),
            name: Some("Pat".to_string()),
            email: Some("pat@example.com".to_string()),
            note: Some("x".repeat(300)),
        };
        let params = donation_params(2000, &request, BASE);

        assert_eq!(params.get("submit_type"), Some("donate"));
        assert_eq!(params.get("line_items[0][price_data][unit_amount]"), Some("2000"));
        assert_eq!(
            params
                .get("line_items[0][price_data][product_data][description]")
                .map(|d| d.len()),
            Some(250)
        );
        assert_eq!(params.get("customer_email"), Some("pat@example.com"));
        assert_eq!(params.get("metadata[source]"), Some("donation-form"));
        assert_eq!(
            params.get("success_url"),
            Some("https://example.org/thank-you?checkout=success&poll=1")
        );
        assert!(!params.contains_key("automatic_payment_methods[enabled]"));
    }

    #[test]
    fn test_donation_params_omit_blank_email() {
        let request = DonationRequest {
            amount: json!(5),
            email: Some("  ".to_string()),
            ..Default::default()
        };
        let params = donation_params(500, &request, BASE);
        assert!(!params.contains_key("customer_email"));
        assert!(!params.contains_key("line_items[0][price_data][product_data][description]"));
        assert_eq!(params.get("metadata[donor_email]"), Some(""));
    }

    #[test]
    fn test_pricing_selection() {
        let sizes = vec![(ShirtSize::L, "price_l".to_string())];

        assert!(matches!(
            ShirtPricing::select(None, None, &sizes),
            Err(CheckoutError::PricingNotConfigured)
        ));
        assert_eq!(
            ShirtPricing::select(Some("price_tee"), None, &[]).unwrap(),
            ShirtPricing::SavedPrice("price_tee".to_string())
        );
        assert_eq!(
            ShirtPricing::select(Some("price_tee"), None, &sizes).unwrap(),
            ShirtPricing::PerSize(sizes.clone())
        );
        assert_eq!(
            ShirtPricing::select(None, Some("3000"), &[]).unwrap(),
            ShirtPricing::Inline { unit_amount: 3000 }
        );
        // An id that is not a saved price falls back to inline pricing
        assert_eq!(
            ShirtPricing::select(Some("prod_tee"), None, &[]).unwrap(),
            ShirtPricing::Inline { unit_amount: 2500 }
        );
    }

    #[test]
    fn test_tee_cents_are_parsed_leniently() {
        assert_eq!(
            ShirtPricing::select(None, Some("25.00"), &[]).unwrap(),
            ShirtPricing::Inline { unit_amount: 25 }
        );
        assert_eq!(
            ShirtPricing::select(None, Some(" 3000 "), &[]).unwrap(),
            ShirtPricing::Inline { unit_amount: 3000 }
        );
        for raw in ["abc", "0", "-5", "NaN"] {
            assert_eq!(
                ShirtPricing::select(None, Some(raw), &[]).unwrap(),
                ShirtPricing::Inline { unit_amount: 2500 },
                "{raw}"
            );
        }
    }

    #[test]
    fn test_normalize_shirts_defaults_to_primary_size() {
        let request = ShirtCheckoutRequest {
            contact: ContactInput {
                name: Some(" Pat ".to_string()),
                ..Default::default()
            },
            primary_shirt_size: Some("xl".to_string()),
            ..Default::default()
        };
        assert_eq!(
            normalize_shirts(&request),
            vec![ShirtOrder {
                attendee_name: "Pat".to_string(),
                size: ShirtSize::Xl
            }]
        );

        let no_size = ShirtCheckoutRequest::default();
        assert_eq!(normalize_shirts(&no_size)[0].size, ShirtSize::M);
    }

    #[test]
    fn test_unknown_sizes_become_medium() {
        let shirts = normalize_shirts(&request_with(&["huge", "L"]));
        assert_eq!(shirts[0].size, ShirtSize::M);
        assert_eq!(shirts[0].attendee_name, "Kid");
        assert_eq!(shirts[1].size, ShirtSize::L);
    }

    #[test]
    fn test_inline_pricing_has_one_line_per_size() {
        let params = shirt_params(
            &request_with(&["L", "M", "L"]),
            &ShirtPricing::Inline { unit_amount: 2500 },
            "https://example.org/tee.png",
            BASE,
        )
        .unwrap();

        // Sizes are ordered smallest first
        assert_eq!(
            params.get("line_items[0][price_data][product_data][name]"),
            Some("AVAILABLE Tee (M)")
        );
        assert_eq!(params.get("line_items[0][quantity]"), Some("1"));
        assert_eq!(
            params.get("line_items[1][price_data][product_data][name]"),
            Some("AVAILABLE Tee (L)")
        );
        assert_eq!(params.get("line_items[1][quantity]"), Some("2"));
        assert_eq!(params.get("metadata[shirt_sizes]"), Some("L,M,L"));
        assert_eq!(
            params.get("cancel_url"),
            Some("https://example.org/register?checkout=cancelled")
        );

        let shirts: Value = serde_json::from_str(params.get("metadata[shirts]").unwrap()).unwrap();
        assert_eq!(shirts[0]["attendeeName"], "Kid");
        assert_eq!(shirts[0]["size"], "L");
    }

    #[test]
    fn test_saved_price_uses_total_quantity() {
        let params = shirt_params(
            &request_with(&["S", "XL"]),
            &ShirtPricing::SavedPrice("price_123".to_string()),
            "",
            BASE,
        )
        .unwrap();

        assert_eq!(params.get("line_items[0][price]"), Some("price_123"));
        assert_eq!(params.get("line_items[0][quantity]"), Some("2"));
        assert_eq!(params.get("line_items[0][adjustable_quantity][maximum]"), Some("10"));
        assert!(!params.contains_key("line_items[1][price]"));
    }

    #[test]
    fn test_per_size_pricing_requires_every_size() {
        let pricing = ShirtPricing::PerSize(vec![(ShirtSize::M, "price_m".to_string())]);

        let ok = shirt_params(&request_with(&["M", "M"]), &pricing, "", BASE).unwrap();
        assert_eq!(ok.get("line_items[0][price]"), Some("price_m"));
        assert_eq!(ok.get("line_items[0][quantity]"), Some("2"));

        let err = shirt_params(&request_with(&["2XL"]), &pricing, "", BASE).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingSizePrice(ShirtSize::Xxl)));
    }

    #[test]
    fn test_tee_image_url_validation() {
        assert_eq!(
            tee_image_url(Some("https://cdn.example.com/tee.png"), BASE),
            "https://cdn.example.com/tee.png"
        );
        assert_eq!(
            tee_image_url(Some("/images/tee.png"), BASE),
            "https://example.org/images/available-tee.png"
        );
        assert_eq!(
            tee_image_url(Some("ftp://example.com/tee.png"), BASE),
            "https://example.org/images/available-tee.png"
        );
        assert_eq!(tee_image_url(None, BASE), "https://example.org/images/available-tee.png");
    }

    #[tokio::test]
    async fn test_donation_falls_back_to_card_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("automatic_payment_methods"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "automatic_payment_methods is not supported" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("payment_method_types"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_card_only",
                "url": "https://checkout.stripe.com/c/pay/cs_card_only"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stripe = StripeClient::new(&server.uri(), Secret::new("sk_test".to_string()));
        let request = DonationRequest {
            amount: json!(10),
            ..Default::default()
        };
        let params = donation_params(1000, &request, BASE);

        let session = create_donation_session(&stripe, &params).await.unwrap();
        assert_eq!(session.id, "cs_card_only");
    }

    #[tokio::test]
    async fn test_donation_uses_automatic_methods_when_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("automatic_payment_methods"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_auto",
                "url": "https://checkout.stripe.com/c/pay/cs_auto"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stripe = StripeClient::new(&server.uri(), Secret::new("sk_test".to_string()));
        let params = donation_params(500, &DonationRequest::default(), BASE);

        let session = create_donation_session(&stripe, &params).await.unwrap();
        assert_eq!(session.id, "cs_auto");
    }
}
