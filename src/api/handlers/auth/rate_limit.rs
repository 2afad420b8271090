//! Fixed-window rate limiting for auth flows.
//!
//! The first admission layer: per-IP budgets per route class, checked before
//! any handler logic runs. Windows are fixed, resetting a full period after
//! the first request that opened them; a burst straddling a window boundary
//! can therefore admit up to twice the budget, which is the documented
//! tradeoff of this limiter shape. The finer-grained failed-attempt gate
//! lives in the login handler and consults the attempt ledger instead.

use axum::{
    Json,
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::state::AuthState;
use super::types::ApiResponse;
use super::utils::extract_client_ip;

const GENERAL_BUDGET: u32 = 100;
const GENERAL_WINDOW: Duration = Duration::from_secs(15 * 60);
const AUTH_BUDGET: u32 = 5;
const AUTH_WINDOW: Duration = Duration::from_secs(15 * 60);
const REGISTRATION_BUDGET: u32 = 3;
const REGISTRATION_WINDOW: Duration = Duration::from_secs(60 * 60);

pub(crate) const RATE_LIMITED_MESSAGE: &str =
    "Too many requests from this IP, please try again later";

/// Route classes with independent budgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Every route; the coarse outer gate.
    General,
    /// Auth-sensitive routes such as forgot-password.
    Auth,
    /// Account creation.
    Registration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, ip: Option<&str>, class: RouteClass) -> RateLimitDecision;
}

/// Limiter that admits everything; used in tests.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _ip: Option<&str>, _class: RouteClass) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
struct Budget {
    limit: u32,
    window: Duration,
}

struct Window {
    started_at: Instant,
    count: u32,
}

/// In-memory fixed-window limiter keyed by (route class, client IP).
///
/// The check-and-increment runs under one lock, so concurrent bursts from
/// the same key can never undercount. Requests with no derivable client IP
/// are admitted; the adaptive login gate still covers them by email.
pub struct FixedWindowLimiter {
    budgets: HashMap<RouteClass, Budget>,
    windows: Mutex<HashMap<(RouteClass, String), Window>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new() -> Self {
        let mut budgets = HashMap::new();
        budgets.insert(
            RouteClass::General,
            Budget {
                limit: GENERAL_BUDGET,
                window: GENERAL_WINDOW,
            },
        );
        budgets.insert(
            RouteClass::Auth,
            Budget {
                limit: AUTH_BUDGET,
                window: AUTH_WINDOW,
            },
        );
        budgets.insert(
            RouteClass::Registration,
            Budget {
                limit: REGISTRATION_BUDGET,
                window: REGISTRATION_WINDOW,
            },
        );
        Self {
            budgets,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Override one class budget; used to tighten windows in tests.
    #[must_use]
    pub fn with_budget(mut self, class: RouteClass, limit: u32, window: Duration) -> Self {
        self.budgets.insert(class, Budget { limit, window });
        self
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, ip: Option<&str>, class: RouteClass) -> RateLimitDecision {
        let Some(ip) = ip else {
            return RateLimitDecision::Allowed;
        };
        let Some(budget) = self.budgets.get(&class).copied() else {
            return RateLimitDecision::Allowed;
        };

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Drop stale windows so one-off clients do not accumulate forever.
        windows.retain(|(entry_class, _), window| {
            let entry_budget = self.budgets.get(entry_class).copied().unwrap_or(budget);
            window.started_at.elapsed() < entry_budget.window
        });

        let entry = windows
            .entry((class, ip.to_string()))
            .or_insert_with(|| Window {
                started_at: Instant::now(),
                count: 0,
            });

        if entry.started_at.elapsed() >= budget.window {
            entry.started_at = Instant::now();
            entry.count = 0;
        }

        if entry.count >= budget.limit {
            return RateLimitDecision::Limited;
        }
        entry.count += 1;
        RateLimitDecision::Allowed
    }
}

/// Coarse per-IP gate applied to the whole router.
pub async fn general_rate_limit(
    auth_state: Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let client_ip = extract_client_ip(request.headers());
    if auth_state
        .rate_limiter()
        .check(client_ip.as_deref(), RouteClass::General)
        == RateLimitDecision::Limited
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::fail(RATE_LIMITED_MESSAGE)),
        )
            .into_response();
    }
    next.run(request).await
}
