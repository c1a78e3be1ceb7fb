//! Endpoint request flows
//!
//! Each flow authenticates the envelope, loads its context, checks the
//! caller's authority, performs a single state transition, and returns
//! the response body for the transport layer to sign.

use crate::AppState;
use serde_json::Value;
use zeta_core::envelope::Auth;
use zeta_core::protocol::*;
use zeta_core::types::{Capability, MAX_FLAG_VALUE};
use zeta_core::{Result, ZetaError};
use zeta_engine::{event, permissions, ticket};

pub async fn create(state: AppState, auth: Auth<CreateRequest>) -> Result<CreateResponse> {
    let request = auth.authenticate(&state.nonces).await?;
    let event = event::create(&state.store, &request.event, &auth.public_key).await?;

    Ok(CreateResponse { event_id: event.id })
}

pub async fn search(state: AppState, auth: Auth<SearchRequest>) -> Result<SearchResponse> {
    let request = auth.authenticate(&state.nonces).await?;
    let events = match request.mode {
        SearchMode::Id => vec![event::load(&state.store, &request.text).await?],
        SearchMode::Text => event::search(&state.store, &request.text, request.limit).await?,
    };

    Ok(SearchResponse { events })
}

pub async fn register(state: AppState, auth: Auth<RegisterRequest>) -> Result<RegisterResponse> {
    let request = auth.authenticate(&state.nonces).await?;
    let event = event::load(&state.store, &request.event_id).await?;

    let mut transfer_limit = event.transfer_limit;
    let mut metadata = Value::Null;

    if event.restricted {
        let verification = request
            .verification
            .as_ref()
            .ok_or_else(|| ZetaError::permission_denied("verification required"))?;
        let claims = verification.content();

        if claims.event_id != request.event_id {
            return Err(ZetaError::permission_denied("verification for different event"));
        }
        if claims.public_key != auth.public_key {
            return Err(ZetaError::permission_denied("verification for different user"));
        }

        // The block must be signed by the owner or a registration delegate
        let owner_public_key = event::owner_public_key(&state.store, &request.event_id).await?;
        if verification.public_key != owner_public_key {
            let signer =
                permissions::load(&state.store, &request.event_id, &verification.public_key)
                    .await?;
            if !signer.allows(Capability::AuthorizeRegistration) {
                return Err(ZetaError::permission_denied("unauthorized signer"));
            }
        }

        verification.authenticate(&state.nonces).await?;

        if let Some(limit) = claims.transfer_limit {
            transfer_limit = limit.min(event.transfer_limit);
        }
        metadata = claims.metadata.clone();
    }

    let issued = ticket::register(
        &state.store,
        &request.event_id,
        &auth.public_key,
        transfer_limit,
        metadata,
    )
    .await?;

    Ok(RegisterResponse {
        ticket: issued.seal()?,
    })
}

pub async fn transfer(state: AppState, auth: Auth<TransferRequest>) -> Result<TransferResponse> {
    let request = auth.authenticate(&state.nonces).await?;
    let block = &request.transfer;

    if block.content().transfer_public_key != auth.public_key {
        return Err(ZetaError::permission_denied("authorization for different user"));
    }
    block.authenticate(&state.nonces).await?;

    // Open the ticket under the block's signer, the current holder
    let current = ticket::load(
        &state.store,
        &request.event_id,
        &block.public_key,
        &block.content().ticket,
    )
    .await?;
    let reissued = ticket::reissue(&state.store, &current, &auth.public_key).await?;

    Ok(TransferResponse {
        ticket: reissued.seal()?,
    })
}

pub async fn redeem(state: AppState, auth: Auth<RedeemRequest>) -> Result<RedeemResponse> {
    let request = auth.authenticate(&state.nonces).await?;

    let held = ticket::load(
        &state.store,
        &request.event_id,
        &auth.public_key,
        &request.ticket,
    )
    .await?;
    held.redeem(&state.store).await?;

    Ok(RedeemResponse { success: true })
}

pub async fn validate(state: AppState, auth: Auth<ValidateRequest>) -> Result<ValidateResponse> {
    let request = auth.authenticate(&state.nonces).await?;

    if request.stamp {
        let caller = permissions::load(&state.store, &request.event_id, &auth.public_key).await?;
        if !caller.allows(Capability::StampTicket) {
            return Err(ZetaError::permission_denied("permission denied"));
        }
    }

    let checked = ticket::load(
        &state.store,
        &request.event_id,
        &request.check_public_key,
        &request.ticket,
    )
    .await?;

    let (redeemed, stamped) = if request.stamp {
        checked.stamp(&state.store).await?
    } else {
        checked.verify(&state.store).await?
    };

    // Stamped status is only visible to the holder, the owner, or a
    // see_stamped_ticket delegate
    let stamped = if request.check_public_key == auth.public_key {
        Some(stamped)
    } else {
        let caller = permissions::load(&state.store, &request.event_id, &auth.public_key).await?;
        caller
            .allows(Capability::SeeStampedTicket)
            .then_some(stamped)
    };

    Ok(ValidateResponse {
        ticket_number: checked.number + 1,
        redeemed,
        stamped,
        version: checked.version + 1,
        transfer_limit: checked.transfer_limit,
        metadata: checked.metadata.clone(),
    })
}

pub async fn cancel(state: AppState, auth: Auth<CancelRequest>) -> Result<CancelResponse> {
    let request = auth.authenticate(&state.nonces).await?;

    let caller = permissions::load(&state.store, &request.event_id, &auth.public_key).await?;
    if !caller.allows(Capability::CancelTicket) {
        return Err(ZetaError::permission_denied("permission denied"));
    }

    let event = event::load(&state.store, &request.event_id).await?;
    if request.ticket_number == 0 || request.ticket_number > event.tickets {
        return Err(ZetaError::validation("ticket number out of range"));
    }
    if request.ticket_number > event.issued {
        return Err(ZetaError::conflict("ticket cancelation failed"));
    }

    ticket::cancel(&state.store, &request.event_id, request.ticket_number - 1).await?;

    Ok(CancelResponse { success: true })
}

pub async fn flag(state: AppState, auth: Auth<FlagRequest>) -> Result<FlagResponse> {
    let request = auth.authenticate(&state.nonces).await?;
    let event = event::load(&state.store, &request.event_id).await?;

    let writing = request.value.is_some() || request.public.is_some();
    if !event.enable_flags {
        return Err(ZetaError::conflict(if writing {
            "ticket flag set failed"
        } else {
            "ticket flag retrieval failed"
        }));
    }
    if request.ticket_number == 0 || request.ticket_number > event.tickets {
        return Err(ZetaError::validation("ticket number out of range"));
    }
    let number = request.ticket_number - 1;

    let (value, public) = if writing {
        if let Some(value) = request.value {
            if value > MAX_FLAG_VALUE {
                return Err(ZetaError::validation("ticket flag value out of range"));
            }
        }
        let caller = permissions::load(&state.store, &request.event_id, &auth.public_key).await?;
        if !caller.allows(Capability::UpdateTicketFlag) {
            return Err(ZetaError::permission_denied("permission denied"));
        }

        ticket::write_flag(
            &state.store,
            &request.event_id,
            number,
            request.value,
            request.public,
        )
        .await?
    } else {
        let (value, public) = ticket::read_flag(&state.store, &request.event_id, number).await?;
        if !public {
            let caller =
                permissions::load(&state.store, &request.event_id, &auth.public_key).await?;
            if !caller.allows(Capability::SeeTicketFlag) {
                return Err(ZetaError::permission_denied("ticket flag is not public"));
            }
        }
        (value, public)
    };

    Ok(FlagResponse { value, public })
}

pub async fn update_permissions(
    state: AppState,
    auth: Auth<PermissionsRequest>,
) -> Result<PermissionsResponse> {
    let request = auth.authenticate(&state.nonces).await?;

    if !permissions::is_owner(&state.store, &request.event_id, &auth.public_key).await? {
        return Err(ZetaError::permission_denied("not event owner"));
    }

    let resolved = match &request.permissions {
        None => {
            permissions::load(&state.store, &request.event_id, &request.target_public_key).await?
        }
        Some(updated) => {
            permissions::update(
                &state.store,
                &request.event_id,
                &request.target_public_key,
                updated,
            )
            .await?;
            *updated
        }
    };

    Ok(PermissionsResponse {
        permissions: resolved,
    })
}

pub async fn delete(state: AppState, auth: Auth<DeleteRequest>) -> Result<DeleteResponse> {
    let request = auth.authenticate(&state.nonces).await?;

    if !permissions::is_owner(&state.store, &request.event_id, &auth.public_key).await? {
        return Err(ZetaError::permission_denied("not event owner"));
    }
    event::delete(&state.store, &request.event_id).await?;

    Ok(DeleteResponse { success: true })
}
