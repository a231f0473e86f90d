//! Status page and JSON status

use axum::{extract::State, response::Html, Json};
use serde::Serialize;

use super::AppState;

const STATUS_PAGE: &str = include_str!("status_page.html");
const LOGIN_PAGE: &str = include_str!("login_page.html");

/// JSON body of GET /status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub authenticated: bool,
    pub count: u64,
    pub goal: u64,
    pub previous_goal: u64,
    pub clients: usize,
}

/// GET / - live status when signed in, sign-in prompt otherwise
pub async fn status_page(State(app): State<AppState>) -> Html<String> {
    let session = app.state.session().await;

    if !session.authenticated {
        return Html(LOGIN_PAGE.replace(
            "{{INTERVAL_SECS}}",
            &app.poll_interval.as_secs().to_string(),
        ));
    }

    let clients = app.state.client_count().await;
    Html(
        STATUS_PAGE
            .replace("{{COUNT}}", &group_thousands(session.current_value))
            .replace("{{GOAL}}", &group_thousands(session.goal.goal()))
            .replace("{{PREVIOUS_GOAL}}", &group_thousands(session.goal.previous_goal()))
            .replace("{{CLIENTS}}", &clients.to_string()),
    )
}

/// GET /status
pub async fn status_json(State(app): State<AppState>) -> Json<StatusResponse> {
    let session = app.state.session().await;
    let clients = app.state.client_count().await;

    Json(StatusResponse {
        authenticated: session.authenticated,
        count: session.current_value,
        goal: session.goal.goal(),
        previous_goal: session.goal.previous_goal(),
        clients,
    })
}

/// Format with comma thousands separators (1234567 → "1,234,567")
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
