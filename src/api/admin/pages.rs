use askama::Template;
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use chrono::{DateTime, Utc};

use super::reports::{PaymentQuery, RegistrationQuery};
use crate::api::middleware::session::AppState;
use crate::error::Result;
use crate::models::{speaker_poll, Payment, RegistrationWithAttendees, SpeakerPoll};
use crate::services::reporting;

fn display_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn dollars(cents: i64) -> String {
    format!("${:.2}", cents as f64 / 100.0)
}

pub struct AttendeeRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub shirt: String,
}

pub struct RegistrationRow {
    pub created_at: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub attendees: Vec<AttendeeRow>,
}

impl From<&RegistrationWithAttendees> for RegistrationRow {
    fn from(row: &RegistrationWithAttendees) -> Self {
        let reg = &row.registration;
        Self {
            created_at: display_time(&reg.created_at),
            contact_name: reg.contact_name.clone(),
            contact_email: reg.contact_email.clone(),
            contact_phone: reg.contact_phone.clone(),
            attendees: row
                .attendees
                .iter()
                .map(|a| AttendeeRow {
                    name: a.name.clone(),
                    email: or_dash(a.email.as_deref()),
                    phone: or_dash(a.phone.as_deref()),
                    shirt: if a.wants_shirt {
                        or_dash(a.shirt_size.as_deref())
                    } else {
                        "-".to_string()
                    },
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub registrations: i64,
    pub attendees: i64,
    pub shirts: Vec<(String, i64)>,
    pub donations: String,
    pub rows: Vec<RegistrationRow>,
    pub total: i64,
    pub q: String,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

/// Offsets for the previous and next page links, when those pages exist
pub fn neighbour_offsets(skip: i64, take: i64, total: i64) -> (Option<i64>, Option<i64>) {
    let prev = (skip > 0).then(|| (skip - take).max(0));
    let next_skip = skip.saturating_add(take);
    let next = (next_skip < total).then_some(next_skip);
    (prev, next)
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
) -> Result<DashboardTemplate> {
    let (take, skip) = (query.take(), query.skip());
    let q = query.q.as_deref().unwrap_or("").trim().to_string();

    let stats = reporting::load_stats(&state.pool, state.stripe.as_ref()).await?;
    let page = reporting::registrations_page(&state.pool, Some(q.as_str()), take, skip).await?;

    let href = |offset: i64| format!("/admin?q={}&take={}&skip={}", encode(&q), take, offset);
    let (prev, next) = neighbour_offsets(skip, take, page.total);
    let (prev_href, next_href) = (prev.map(href), next.map(href));

    Ok(DashboardTemplate {
        registrations: stats.registrations,
        attendees: stats.attendees,
        shirts: stats
            .shirts
            .into_iter()
            .map(|s| (s.size.unwrap_or_else(|| "?".to_string()), s.count))
            .collect(),
        donations: stats
            .donations_usd
            .map(|usd| format!("${:.2}", usd))
            .unwrap_or_else(|| "-".to_string()),
        rows: page.rows.iter().map(RegistrationRow::from).collect(),
        total: page.total,
        q,
        prev_href,
        next_href,
    })
}

pub struct PaymentRow {
    pub created_at: String,
    pub payment_type: String,
    pub amount: String,
    pub currency: String,
    pub name: String,
    pub email: String,
    pub shirt_size: String,
    pub stripe_id: String,
}

impl From<&Payment> for PaymentRow {
    fn from(p: &Payment) -> Self {
        Self {
            created_at: display_time(&p.created_at),
            payment_type: p.payment_type.clone(),
            amount: dollars(p.amount_cents),
            currency: p.currency.to_uppercase(),
            name: or_dash(p.name.as_deref()),
            email: or_dash(p.email.as_deref()),
            shirt_size: or_dash(p.shirt_size.as_deref()),
            stripe_id: p.stripe_id.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/payments.html")]
pub struct PaymentsTemplate {
    pub rows: Vec<PaymentRow>,
    pub total: i64,
    pub page: i64,
    pub q: String,
    pub payment_type: String,
    pub export_href: String,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

pub fn has_next_page(page: i64, take: i64, total: i64) -> bool {
    page.saturating_add(1).saturating_mul(take) < total
}

pub async fn payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<PaymentsTemplate> {
    let (take, page) = (query.take(), query.page());
    let q = query.q.as_deref().unwrap_or("").trim().to_string();
    let payment_type = query
        .payment_type
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let filter = reporting::payment_filter(Some(q.as_str()), Some(payment_type.as_str()));
    let result = reporting::payments_page(&state.pool, &filter, page, take).await?;

    let filters = format!("q={}&type={}", encode(&q), encode(&payment_type));
    let href = |p: i64| format!("/admin/payments?{}&take={}&page={}", filters, take, p);
    let has_next = has_next_page(page, take, result.total);

    Ok(PaymentsTemplate {
        rows: result.rows.iter().map(PaymentRow::from).collect(),
        total: result.total,
        page,
        export_href: format!("/api/admin/payments/export?{}", filters),
        prev_href: (page > 0).then(|| href(page - 1)),
        next_href: has_next.then(|| href(page + 1)),
        q,
        payment_type,
    })
}

pub struct PollRow {
    pub speaker: String,
    pub votes: i32,
    pub percent: String,
}

/// Share of the vote as a whole percentage
pub fn vote_share(votes: i32, total: i64) -> String {
    if total <= 0 {
        return "0%".to_string();
    }
    format!("{:.0}%", f64::from(votes.max(0)) * 100.0 / total as f64)
}

pub fn poll_rows(rows: &[SpeakerPoll]) -> (Vec<PollRow>, i64) {
    let total = speaker_poll::total_votes(rows);
    let view = rows
        .iter()
        .map(|r| PollRow {
            speaker: r.speaker.clone(),
            votes: r.votes,
            percent: vote_share(r.votes, total),
        })
        .collect();
    (view, total)
}

#[derive(Template)]
#[template(path = "admin/poll.html")]
pub struct PollTemplate {
    pub rows: Vec<PollRow>,
    pub total_votes: i64,
}

pub async fn poll(State(state): State<AppState>) -> Result<PollTemplate> {
    let rows = SpeakerPoll::list(&state.pool).await?;
    let (rows, total_votes) = poll_rows(&rows);
    Ok(PollTemplate { rows, total_votes })
}

pub async fn reset_poll(State(state): State<AppState>) -> Result<Redirect> {
    let reset = SpeakerPoll::reset_all(&state.pool).await?;
    tracing::info!(speakers = reset, "Poll votes reset from dashboard");
    Ok(Redirect::to("/admin/poll"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbour_offsets() {
        assert_eq!(neighbour_offsets(0, 50, 10), (None, None));
        assert_eq!(neighbour_offsets(0, 50, 120), (None, Some(50)));
        assert_eq!(neighbour_offsets(50, 50, 120), (Some(0), Some(100)));
        assert_eq!(neighbour_offsets(100, 50, 120), (Some(50), None));
        assert_eq!(neighbour_offsets(20, 50, 120), (Some(0), Some(70)));
    }

    #[test]
    fn test_neighbour_offsets_at_the_end_of_the_range() {
        assert_eq!(
            neighbour_offsets(i64::MAX, 50, 10),
            (Some(i64::MAX - 50), None)
        );
    }

    #[test]
    fn test_has_next_page() {
        assert!(has_next_page(0, 25, 26));
        assert!(!has_next_page(0, 25, 25));
        assert!(!has_next_page(i64::MAX / 100, 100, 10));
    }

    #[test]
    fn test_vote_share() {
        assert_eq!(vote_share(1, 3), "33%");
        assert_eq!(vote_share(0, 0), "0%");
        assert_eq!(vote_share(4, 4), "100%");
    }

    #[test]
    fn test_dollars() {
        assert_eq!(dollars(2550), "$25.50");
        assert_eq!(dollars(0), "$0.00");
    }
}
