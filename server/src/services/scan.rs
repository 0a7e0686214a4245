//! Venue check-in.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::EmittedTicket;
use crate::state::AppState;
use crate::store::ScanMark;
use crate::utils::error::{AppError, AppResult};

/// Remembers recent successful scans per (scanner, ticket).
///
/// Phone cameras tend to read the same QR several times in a row; a repeat
/// read by the same scanner inside the window returns the original success
/// instead of an "already scanned" error. Nothing is persisted.
pub struct ScanGuard {
    window: Duration,
    recent: Mutex<HashMap<(Uuid, Uuid), Instant>>,
}

impl ScanGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, scanner: Uuid, ticket: Uuid) {
        self.record_at(scanner, ticket, Instant::now());
    }

    pub fn is_repeat(&self, scanner: Uuid, ticket: Uuid) -> bool {
        self.is_repeat_at(scanner, ticket, Instant::now())
    }

    /// Same-scanner repeat judged from the stored scan, for a read that lands
    /// before the first one has been recorded here.
    pub fn is_repeat_of_stored(
        &self,
        ticket: &EmittedTicket,
        scanner: Uuid,
        now: DateTime<Utc>,
    ) -> bool {
        let Ok(window) = chrono::Duration::from_std(self.window) else {
            return false;
        };
        match (ticket.scanned_by, ticket.scanned_at) {
            (Some(by), Some(at)) => by == scanner && now.signed_duration_since(at) < window,
            _ => false,
        }
    }

    fn record_at(&self, scanner: Uuid, ticket: Uuid, now: Instant) {
        if let Ok(mut recent) = self.recent.lock() {
            let window = self.window;
            recent.retain(|_, at| now.saturating_duration_since(*at) < window);
            recent.insert((scanner, ticket), now);
        }
    }

    fn is_repeat_at(&self, scanner: Uuid, ticket: Uuid, now: Instant) -> bool {
        self.recent
            .lock()
            .ok()
            .and_then(|recent| recent.get(&(scanner, ticket)).copied())
            .map_or(false, |at| now.saturating_duration_since(at) < self.window)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub ticket_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub ticket_id: Uuid,
    pub ticket_group_id: Uuid,
    pub full_name: String,
    pub dni: String,
    pub ticket_type: String,
    pub scanned_at: Option<DateTime<Utc>>,
    pub duplicate: bool,
}

impl ScanResult {
    fn new(ticket: EmittedTicket, ticket_type: String, duplicate: bool) -> Self {
        Self {
            ticket_id: ticket.id,
            ticket_group_id: ticket.ticket_group_id,
            full_name: ticket.full_name,
            dni: ticket.dni,
            ticket_type,
            scanned_at: ticket.scanned_at,
            duplicate,
        }
    }
}

pub async fn scan_ticket(
    state: &AppState,
    scanner: AuthUser,
    event_id: Uuid,
    ticket_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<ScanResult> {
    let ticket = state.store.get_ticket(ticket_id).await?;
    if ticket.event_id != event_id {
        return Err(AppError::ValidationError(
            "Ticket belongs to a different event".to_string(),
        ));
    }

    let group = state.store.get_ticket_group(ticket.ticket_group_id).await?;
    if !group.group.status.is_settled() {
        return Err(AppError::Forbidden("Ticket has not been paid".to_string()));
    }

    let ticket_type = state.store.get_ticket_type(ticket.ticket_type_id).await?;
    if let Some(limit) = ticket_type.scan_limit {
        if now > limit {
            return Err(AppError::Forbidden(format!(
                "'{}' tickets are only valid until {}",
                ticket_type.name,
                limit.format("%Y-%m-%d %H:%M UTC")
            )));
        }
    }

    match state.store.mark_scanned(ticket_id, scanner.id, now).await? {
        ScanMark::Marked(ticket) => {
            state.scan_guard.record(scanner.id, ticket.id);
            tracing::info!(
                %event_id,
                ticket_id = %ticket.id,
                scanned_by = %scanner.id,
                "Ticket scanned"
            );
            Ok(ScanResult::new(ticket, ticket_type.name, false))
        }
        ScanMark::AlreadyScanned(ticket)
            if state.scan_guard.is_repeat(scanner.id, ticket.id)
                || state.scan_guard.is_repeat_of_stored(&ticket, scanner.id, now) =>
        {
            tracing::debug!(ticket_id = %ticket.id, "Repeated read inside scan window");
            Ok(ScanResult::new(ticket, ticket_type.name, true))
        }
        ScanMark::AlreadyScanned(ticket) => {
            let when = ticket
                .scanned_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "an unknown time".to_string());
            let by = ticket
                .scanned_by
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(AppError::Conflict(format!(
                "Ticket already scanned at {} by {}",
                when, by
            )))
        }
    }
}

pub async fn unscan_ticket(state: &AppState, ticket_id: Uuid) -> AppResult<EmittedTicket> {
    let ticket = state.store.clear_scan(ticket_id).await?;
    tracing::info!(ticket_id = %ticket.id, "Scan cleared");
    Ok(ticket)
}
