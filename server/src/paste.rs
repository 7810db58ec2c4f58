use chrono::{DateTime, Utc};
use ephemeral_common::PasteView;
use serde::{Deserialize, Serialize};

/// A stored snippet. `content` and every expiry field are fixed at creation;
/// the only mutation a paste ever sees is a decrement of
/// [`ViewBudget::remaining`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Paste {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub views: Option<ViewBudget>,
}

/// A finite number of views. `remaining <= max` always holds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewBudget {
    pub max: u32,
    pub remaining: u32,
}

impl ViewBudget {
    pub const fn new(max: u32) -> Self {
        Self {
            max,
            remaining: max,
        }
    }

    /// Consumes one view, returning what is left, or `None` if nothing was.
    pub fn consume(&mut self) -> Option<u32> {
        self.remaining = self.remaining.checked_sub(1)?;
        Some(self.remaining)
    }
}

/// Why a paste can no longer be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unavailable {
    Expired,
    Exhausted,
}

impl Paste {
    pub fn new(
        id: String,
        content: String,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        max_views: Option<u32>,
    ) -> Self {
        Self {
            id,
            content,
            created_at,
            expires_at,
            views: max_views.map(ViewBudget::new),
        }
    }

    /// Checks both expiry axes against `now`. The deadline itself is still
    /// readable; only instants strictly after it are not.
    pub fn availability(&self, now: DateTime<Utc>) -> Result<(), Unavailable> {
        if self.expires_at.is_some_and(|deadline| now > deadline) {
            return Err(Unavailable::Expired);
        }

        if self.views.is_some_and(|views| views.remaining == 0) {
            return Err(Unavailable::Exhausted);
        }

        Ok(())
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.availability(now).is_ok()
    }

    pub const fn max_views(&self) -> Option<u32> {
        match self.views {
            Some(views) => Some(views.max),
            None => None,
        }
    }

    pub const fn remaining_views(&self) -> Option<u32> {
        match self.views {
            Some(views) => Some(views.remaining),
            None => None,
        }
    }

    pub fn into_view(self, remaining_views: Option<u32>) -> PasteView {
        PasteView {
            content: self.content,
            remaining_views,
            expires_at: self.expires_at,
        }
    }
}
