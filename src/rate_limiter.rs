/*!
 * Process-wide rate-limit ledger.
 *
 * Tracks request and token counts per (provider, model) against fixed
 * windows and answers "which model is usable right now". Counters are
 * provisionally incremented with `reserve` before the HTTP call, then
 * settled with `commit` (server-reported usage) or rolled back with
 * `release_on_error` when the call never reached the model.
 *
 * All mutation goes through one coarse lock; expired windows are rolled at
 * the top of every operation, never one window at a time.
 */

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::errors::TranslationError;

/// What a window counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Number of API requests
    Requests,
    /// Prompt-side tokens
    InputTokens,
    /// Completion-side tokens
    OutputTokens,
    /// Prompt + completion tokens
    TotalTokens,
}

impl WindowKind {
    /// True for the token-counting kinds.
    pub fn is_token_kind(&self) -> bool {
        !matches!(self, WindowKind::Requests)
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WindowKind::Requests => "requests",
            WindowKind::InputTokens => "input_tokens",
            WindowKind::OutputTokens => "output_tokens",
            WindowKind::TotalTokens => "total_tokens",
        };
        write!(f, "{}", label)
    }
}

/// Declared quota: kind, window length, cap.
#[derive(Debug, Clone, Copy)]
pub struct WindowSpec {
    /// What is counted
    pub kind: WindowKind,
    /// Window length
    pub duration: Duration,
    /// Maximum count inside one window
    pub cap: u64,
}

impl WindowSpec {
    /// Arbitrary window.
    pub fn new(kind: WindowKind, duration: Duration, cap: u64) -> Self {
        WindowSpec {
            kind,
            duration,
            cap,
        }
    }

    /// One-minute window.
    pub fn per_minute(kind: WindowKind, cap: u64) -> Self {
        Self::new(kind, Duration::from_secs(60), cap)
    }

    /// 24-hour window.
    pub fn per_day(kind: WindowKind, cap: u64) -> Self {
        Self::new(kind, Duration::from_secs(24 * 60 * 60), cap)
    }
}

/// Live counter for one window.
#[derive(Debug, Clone)]
struct Window {
    kind: WindowKind,
    duration: Duration,
    cap: u64,
    count: u64,
    reset_at: Instant,
}

impl Window {
    fn from_spec(spec: &WindowSpec, now: Instant) -> Self {
        Window {
            kind: spec.kind,
            duration: spec.duration,
            cap: spec.cap,
            count: 0,
            reset_at: now + spec.duration,
        }
    }

    fn roll_if_expired(&mut self, now: Instant) -> bool {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + self.duration;
            true
        } else {
            false
        }
    }

    /// Cost a reservation adds to this window.
    fn reservation_cost(&self, estimated_tokens: u64) -> u64 {
        match self.kind {
            WindowKind::Requests => 1,
            _ => estimated_tokens,
        }
    }

    fn seconds_until_reset(&self, now: Instant) -> u64 {
        ceil_secs(self.reset_at.saturating_duration_since(now))
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Proof of a successful `reserve`; hand it back to `commit` or
/// `release_on_error` so the ledger can settle the right counters.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// Provider the reservation was taken against
    pub provider: String,
    /// Model the reservation was taken against
    pub model: String,
    /// Token estimate every token window was charged with
    pub estimated_tokens: u64,
}

/// Server-reported usage for one completed call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Prompt-side tokens billed
    pub prompt_tokens: u64,
    /// Completion-side tokens billed
    pub completion_tokens: u64,
    /// Total tokens billed
    pub total_tokens: u64,
}

impl TokenUsage {
    fn actual_for(&self, kind: WindowKind) -> u64 {
        match kind {
            WindowKind::Requests => 0,
            WindowKind::InputTokens => self.prompt_tokens,
            WindowKind::OutputTokens => self.completion_tokens,
            WindowKind::TotalTokens => self.total_tokens,
        }
    }
}

/// Read-only copy of one window for diagnostics.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    /// What is counted
    pub kind: WindowKind,
    /// Window cap
    pub cap: u64,
    /// Current count
    pub count: u64,
    /// Time until the window rolls
    pub resets_in: Duration,
}

/// Read-only copy of one model's windows.
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    /// Provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Window states
    pub windows: Vec<WindowSnapshot>,
}

/// Read-only copy of the whole ledger, sorted by provider then model.
#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    /// One entry per registered (provider, model)
    pub models: Vec<ModelSnapshot>,
}

impl fmt::Display for RateLimiterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for model in &self.models {
            for w in &model.windows {
                writeln!(
                    f,
                    "{}/{} {} {}/{} resets in {}s",
                    model.provider,
                    model.model,
                    w.kind,
                    w.count,
                    w.cap,
                    w.resets_in.as_secs()
                )?;
            }
        }
        Ok(())
    }
}

/// The ledger. One per process, shared by every adapter through an `Arc`.
#[derive(Debug, Default)]
pub struct RateLimiter {
    ledger: Mutex<HashMap<(String, String), Vec<Window>>>,
}

impl RateLimiter {
    /// Empty ledger; models are registered by the provider factories.
    pub fn new() -> Self {
        RateLimiter {
            ledger: Mutex::new(HashMap::new()),
        }
    }

    /// Declare the quota windows for one (provider, model). Replaces any
    /// previous registration, counters restart at zero.
    pub fn register_model(&self, provider: &str, model: &str, specs: &[WindowSpec]) {
        let now = Instant::now();
        let windows = specs.iter().map(|s| Window::from_spec(s, now)).collect();
        let mut ledger = self.ledger.lock();
        ledger.insert((provider.to_string(), model.to_string()), windows);
        debug!(
            "Registered rate limits for {}/{} ({} windows)",
            provider,
            model,
            specs.len()
        );
    }

    /// First candidate model, in declared order, whose windows all have room
    /// for at least one more request. Expired windows roll on observation.
    pub fn pick_available(&self, provider: &str, candidate_models: &[String]) -> Option<String> {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();

        for model in candidate_models {
            let key = (provider.to_string(), model.clone());
            let windows = ledger.entry(key).or_default();
            for w in windows.iter_mut() {
                w.roll_if_expired(now);
            }
            if windows.iter().all(|w| w.count < w.cap) {
                trace!("pick_available: {}/{} has quota", provider, model);
                return Some(model.clone());
            }
        }

        None
    }

    /// Provisionally charge one request plus `estimated_tokens` on every
    /// token window, before the HTTP call. Refuses without mutating when any
    /// window would overflow, reporting the earliest offending reset.
    pub fn reserve(
        &self,
        provider: &str,
        model: &str,
        estimated_tokens: u64,
    ) -> Result<Reservation, TranslationError> {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        let key = (provider.to_string(), model.to_string());
        let windows = ledger.entry(key).or_default();

        for w in windows.iter_mut() {
            w.roll_if_expired(now);
        }

        let mut blocked_reset: Option<u64> = None;
        for w in windows.iter() {
            if w.count + w.reservation_cost(estimated_tokens) > w.cap {
                let secs = w.seconds_until_reset(now);
                blocked_reset = Some(blocked_reset.map_or(secs, |b: u64| b.min(secs)));
            }
        }
        if let Some(retry_after_secs) = blocked_reset {
            debug!(
                "reserve refused for {}/{}: quota exhausted, resets in {}s",
                provider, model, retry_after_secs
            );
            return Err(TranslationError::RateLimited {
                provider: provider.to_string(),
                retry_after_secs,
            });
        }

        for w in windows.iter_mut() {
            w.count += w.reservation_cost(estimated_tokens);
        }
        trace!(
            "reserved {}/{}: 1 request, ~{} tokens",
            provider,
            model,
            estimated_tokens
        );

        Ok(Reservation {
            provider: provider.to_string(),
            model: model.to_string(),
            estimated_tokens,
        })
    }

    /// Settle a reservation with what the server actually billed. Token
    /// windows absorb `actual - estimated` when the server reported more;
    /// under-reports never shrink the reservation and the requests counter
    /// is never decremented.
    pub fn commit(&self, reservation: &Reservation, usage: TokenUsage) {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        let key = (reservation.provider.clone(), reservation.model.clone());
        let Some(windows) = ledger.get_mut(&key) else {
            return;
        };

        for w in windows.iter_mut() {
            w.roll_if_expired(now);
        }

        for w in windows.iter_mut() {
            if !w.kind.is_token_kind() {
                continue;
            }
            let actual = usage.actual_for(w.kind);
            let delta = actual.saturating_sub(reservation.estimated_tokens);
            if delta > 0 {
                w.count = (w.count + delta).min(w.cap);
            }
        }
        trace!(
            "committed {}/{}: {} prompt + {} completion tokens",
            reservation.provider,
            reservation.model,
            usage.prompt_tokens,
            usage.completion_tokens
        );
    }

    /// Roll back a reservation whose call never reached the model
    /// (connection or authentication failure).
    pub fn release_on_error(&self, reservation: &Reservation) {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        let key = (reservation.provider.clone(), reservation.model.clone());
        let Some(windows) = ledger.get_mut(&key) else {
            return;
        };

        for w in windows.iter_mut() {
            w.roll_if_expired(now);
        }

        for w in windows.iter_mut() {
            let cost = w.reservation_cost(reservation.estimated_tokens);
            w.count = w.count.saturating_sub(cost);
        }
        trace!(
            "released reservation for {}/{}",
            reservation.provider,
            reservation.model
        );
    }

    /// Push a window's reset out to `now + retry_after`, after the server
    /// answered 429 for a model the ledger still thought had room.
    pub fn apply_server_retry_after(&self, provider: &str, model: &str, retry_after: Duration) {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        let key = (provider.to_string(), model.to_string());
        let Some(windows) = ledger.get_mut(&key) else {
            return;
        };

        for w in windows.iter_mut() {
            if w.kind == WindowKind::Requests {
                w.count = w.cap;
                w.reset_at = now + retry_after;
            }
        }
        debug!(
            "server retry-after for {}/{}: treating requests window as full for {}s",
            provider,
            model,
            retry_after.as_secs()
        );
    }

    /// Shortest wait until any saturated window across `models` resets.
    /// None when nothing is saturated.
    pub fn seconds_until_available(&self, provider: &str, models: &[String]) -> Option<u64> {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        let mut best: Option<u64> = None;

        for model in models {
            let key = (provider.to_string(), model.clone());
            let Some(windows) = ledger.get_mut(&key) else {
                continue;
            };
            for w in windows.iter_mut() {
                w.roll_if_expired(now);
            }
            for w in windows.iter() {
                if w.count >= w.cap {
                    let secs = w.seconds_until_reset(now);
                    best = Some(best.map_or(secs, |b: u64| b.min(secs)));
                }
            }
        }

        best
    }

    /// Read-only view of every registered window, for diagnostics.
    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();

        let mut models: Vec<ModelSnapshot> = ledger
            .iter_mut()
            .map(|((provider, model), windows)| {
                for w in windows.iter_mut() {
                    w.roll_if_expired(now);
                }
                ModelSnapshot {
                    provider: provider.clone(),
                    model: model.clone(),
                    windows: windows
                        .iter()
                        .map(|w| WindowSnapshot {
                            kind: w.kind,
                            cap: w.cap,
                            count: w.count,
                            resets_in: w.reset_at.saturating_duration_since(now),
                        })
                        .collect(),
                }
            })
            .collect();

        models.sort_by(|a, b| (&a.provider, &a.model).cmp(&(&b.provider, &b.model)));

        RateLimiterSnapshot { models }
    }
}
