//! Core data types for ZETA

use crate::{Result, ZetaError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest ticket allocation an event may declare
pub const MAX_EVENT_TICKETS: u32 = 65_536;

/// Largest transfer version and transfer limit (the low six state bits)
pub const MAX_TRANSFER_LIMIT: u8 = 0x3F;

/// Largest 7-bit ticket flag value
pub const MAX_FLAG_VALUE: u8 = 0x7F;

/// Largest number of rows a text search may return
pub const MAX_SEARCH_LIMIT: u32 = 64;

fn default_tickets() -> u32 {
    128
}

fn default_start() -> f64 {
    crate::envelope::epoch_now()
}

fn default_finish() -> f64 {
    crate::envelope::epoch_now() + 86_400.0
}

fn default_transfer_limit() -> u8 {
    MAX_TRANSFER_LIMIT
}

/// Client-supplied description of an event to create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    #[serde(default = "default_tickets")]
    pub tickets: u32,
    #[serde(default = "default_start")]
    pub start: f64,
    #[serde(default = "default_finish")]
    pub finish: f64,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default = "default_transfer_limit")]
    pub transfer_limit: u8,
    #[serde(default)]
    pub enable_flags: bool,
}

impl EventDraft {
    /// Range-check the draft
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ZetaError::validation("event name must not be empty"));
        }
        if self.tickets == 0 || self.tickets > MAX_EVENT_TICKETS {
            return Err(ZetaError::validation("event ticket count out of range"));
        }
        if self.transfer_limit > MAX_TRANSFER_LIMIT {
            return Err(ZetaError::validation("event transfer limit out of range"));
        }

        Ok(())
    }
}

/// Public event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tickets: u32,
    pub issued: u32,
    pub start: f64,
    pub finish: f64,
    pub restricted: bool,
    pub transfer_limit: u8,
    pub enable_flags: bool,
}

impl Event {
    /// Materialize a draft into a fresh record. The id is always generated
    /// here and issuance starts at zero, whatever the client sent.
    pub fn from_draft(draft: &EventDraft) -> Result<Self> {
        draft.validate()?;

        Ok(Event {
            id: Uuid::new_v4().to_string(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            tickets: draft.tickets,
            issued: 0,
            start: draft.start,
            finish: draft.finish,
            restricted: draft.restricted,
            transfer_limit: draft.transfer_limit,
            enable_flags: draft.enable_flags,
        })
    }
}

/// A delegated capability on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CancelTicket,
    SeeTicketFlag,
    UpdateTicketFlag,
    AuthorizeRegistration,
    SeeStampedTicket,
    StampTicket,
}

/// Per-(event, key) capability set. An absent row means all false; the
/// event owner holds every capability without a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub cancel_ticket: bool,
    #[serde(default)]
    pub see_ticket_flag: bool,
    #[serde(default)]
    pub update_ticket_flag: bool,
    #[serde(default)]
    pub authorize_registration: bool,
    #[serde(default)]
    pub see_stamped_ticket: bool,
    #[serde(default)]
    pub stamp_ticket: bool,
}

impl Permissions {
    /// The owner's implicit capability set
    pub fn grant_all() -> Self {
        Permissions {
            cancel_ticket: true,
            see_ticket_flag: true,
            update_ticket_flag: true,
            authorize_registration: true,
            see_stamped_ticket: true,
            stamp_ticket: true,
        }
    }

    /// True when no capability is set
    pub fn is_empty(&self) -> bool {
        !(self.cancel_ticket
            || self.see_ticket_flag
            || self.update_ticket_flag
            || self.authorize_registration
            || self.see_stamped_ticket
            || self.stamp_ticket)
    }

    /// Check a single capability
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::CancelTicket => self.cancel_ticket,
            Capability::SeeTicketFlag => self.see_ticket_flag,
            Capability::UpdateTicketFlag => self.update_ticket_flag,
            Capability::AuthorizeRegistration => self.authorize_registration,
            Capability::SeeStampedTicket => self.see_stamped_ticket,
            Capability::StampTicket => self.stamp_ticket,
        }
    }
}

/// Server-side ticket lifecycle byte.
///
/// The low six bits carry the transfer version. A byte at or above
/// `REDEEMED` is redeemed, at or above `STAMPED` is redeemed and stamped,
/// and a byte with both high bits set is terminally canceled. All bit
/// handling stays inside this module.
pub mod state {
    /// Redeemed marker, 0b0100_0000
    pub const REDEEMED: u8 = 1 << 6;

    /// Stamped marker, 0b1000_0000
    pub const STAMPED: u8 = 1 << 7;

    /// Terminal canceled marker, 0b1100_0000
    pub const CANCELED: u8 = (1 << 7) | (1 << 6);

    /// Transfer version held in the low six bits
    pub fn version(byte: u8) -> u8 {
        byte & (REDEEMED - 1)
    }

    pub fn is_redeemed(byte: u8) -> bool {
        byte >= REDEEMED
    }

    pub fn is_stamped(byte: u8) -> bool {
        byte >= STAMPED
    }

    pub fn is_canceled(byte: u8) -> bool {
        byte & CANCELED == CANCELED
    }

    /// Byte value after redeeming a ticket at `version`
    pub fn redeemed(version: u8) -> u8 {
        version | REDEEMED
    }

    /// Byte value after stamping a ticket at `version`
    pub fn stamped(version: u8) -> u8 {
        version | STAMPED
    }
}

/// Ticket flag byte: 7 value bits plus a high visibility bit.
pub mod flag {
    /// Public-visibility bit
    pub const PUBLIC: u8 = 1 << 7;

    /// 7-bit flag value
    pub fn value(byte: u8) -> u8 {
        byte & !PUBLIC
    }

    pub fn is_public(byte: u8) -> bool {
        byte & PUBLIC != 0
    }

    /// `(mask, bits)` pair for a partial read-modify-write of the value
    /// and/or the visibility bit: `new = (old & mask) | bits`.
    pub fn update(value: Option<u8>, public: Option<bool>) -> (u8, u8) {
        let mut mask = 0xFF;
        let mut bits = 0;

        if let Some(value) = value {
            mask &= PUBLIC;
            bits |= value & !PUBLIC;
        }
        if let Some(public) = public {
            mask &= !PUBLIC;
            if public {
                bits |= PUBLIC;
            }
        }

        (mask, bits)
    }
}
