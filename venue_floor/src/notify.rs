//! Best-effort notifications.
//!
//! Components hand notifications to a [`Notifier`], which dispatches them on a
//! background task. Delivery failures are logged and never reach the caller.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::PlayerId;
use crate::tournament::TournamentId;
use crate::venue::VenueId;
use crate::waitlist::EntryId;

/// Delivery channels requested with a seat call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channels {
    pub sms: bool,
    pub push: bool,
}

/// Notification request sent to the external dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    SeatReady {
        venue_id: VenueId,
        entry_id: EntryId,
        player_id: Option<PlayerId>,
        phone: Option<String>,
        channels: Channels,
        message: String,
    },
    TournamentRegistered {
        venue_id: VenueId,
        tournament_id: TournamentId,
        player_id: PlayerId,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::SeatReady { .. } => "seat_ready",
            Notification::TournamentRegistered { .. } => "tournament_registered",
        }
    }
}

/// Sends notifications to an external system
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Fire-and-forget front for a dispatcher
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl Notifier {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Notifier that only logs
    pub fn logging() -> Self {
        Self::new(Arc::new(LogDispatcher))
    }

    /// Queue a notification; returns immediately
    pub fn send(&self, notification: Notification) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(&notification).await {
                tracing::warn!(
                    kind = notification.kind(),
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        });
    }
}

/// Dispatcher that writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(kind = notification.kind(), ?notification, "Notification");
        Ok(())
    }
}

/// Dispatcher that records notifications in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher whose every delivery fails after recording
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationDispatcher for MemoryDispatcher {
    async fn dispatch(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("dispatcher lock poisoned"))?
            .push(notification.clone());
        if self.fail {
            anyhow::bail!("delivery refused");
        }
        Ok(())
    }
}
