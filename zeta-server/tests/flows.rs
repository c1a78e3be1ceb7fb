//! End-to-end endpoint flow tests over the in-memory store
//!
//! Principals: slot 0 signs server responses, slot 1 is the event owner,
//! slots 2 and 3 are ticket holders, slot 4 is a delegate, slot 5 is a
//! stranger.

use serde_json::{json, Value};
use zeta_core::crypto::KeyPair;
use zeta_core::envelope::Auth;
use zeta_core::nonce::NonceStore;
use zeta_core::protocol::*;
use zeta_core::{test_utils, ErrorKind, EventDraft, Permissions, ZetaError};
use zeta_engine::Store;
use zeta_server::{flows, AppState};

fn server() -> &'static KeyPair {
    test_utils::keypair(0)
}

fn owner() -> &'static KeyPair {
    test_utils::keypair(1)
}

fn alice() -> &'static KeyPair {
    test_utils::keypair(2)
}

fn bob() -> &'static KeyPair {
    test_utils::keypair(3)
}

fn delegate() -> &'static KeyPair {
    test_utils::keypair(4)
}

fn stranger() -> &'static KeyPair {
    test_utils::keypair(5)
}

fn app_state() -> AppState {
    AppState::new(Store::memory(), NonceStore::in_memory(), server().clone())
}

fn draft(tickets: u32) -> EventDraft {
    EventDraft {
        name: "Launch night".to_string(),
        description: "Doors at seven".to_string(),
        tickets,
        start: 1_700_000_000.0,
        finish: 1_700_086_400.0,
        restricted: false,
        transfer_limit: 8,
        enable_flags: false,
    }
}

async fn create_event(state: &AppState, creator: &KeyPair, event: EventDraft) -> String {
    let auth = Auth::seal(CreateRequest { event }, creator).unwrap();
    flows::create(state.clone(), auth).await.unwrap().event_id
}

async fn register(
    state: &AppState,
    holder: &KeyPair,
    event_id: &str,
    verification: Option<Auth<Verification>>,
) -> Result<String, ZetaError> {
    let auth = Auth::seal(
        RegisterRequest {
            event_id: event_id.to_string(),
            verification,
        },
        holder,
    )
    .unwrap();
    Ok(flows::register(state.clone(), auth).await?.ticket)
}

async fn redeem(
    state: &AppState,
    holder: &KeyPair,
    event_id: &str,
    ticket: &str,
) -> Result<RedeemResponse, ZetaError> {
    let auth = Auth::seal(
        RedeemRequest {
            event_id: event_id.to_string(),
            ticket: ticket.to_string(),
        },
        holder,
    )
    .unwrap();
    flows::redeem(state.clone(), auth).await
}

async fn transfer(
    state: &AppState,
    from: &KeyPair,
    to: &KeyPair,
    event_id: &str,
    ticket: &str,
) -> Result<String, ZetaError> {
    let block = Auth::seal(
        Transfer {
            ticket: ticket.to_string(),
            transfer_public_key: to.public_pem().to_string(),
        },
        from,
    )
    .unwrap();
    let auth = Auth::seal(
        TransferRequest {
            event_id: event_id.to_string(),
            transfer: block,
        },
        to,
    )
    .unwrap();
    Ok(flows::transfer(state.clone(), auth).await?.ticket)
}

async fn validate(
    state: &AppState,
    caller: &KeyPair,
    event_id: &str,
    ticket: &str,
    check: &KeyPair,
    stamp: bool,
) -> Result<ValidateResponse, ZetaError> {
    let auth = Auth::seal(
        ValidateRequest {
            event_id: event_id.to_string(),
            ticket: ticket.to_string(),
            check_public_key: check.public_pem().to_string(),
            stamp,
        },
        caller,
    )
    .unwrap();
    flows::validate(state.clone(), auth).await
}

async fn grant(state: &AppState, event_id: &str, target: &KeyPair, permissions: Permissions) {
    let auth = Auth::seal(
        PermissionsRequest {
            event_id: event_id.to_string(),
            target_public_key: target.public_pem().to_string(),
            permissions: Some(permissions),
        },
        owner(),
    )
    .unwrap();
    flows::update_permissions(state.clone(), auth).await.unwrap();
}

async fn flag(
    state: &AppState,
    caller: &KeyPair,
    event_id: &str,
    ticket_number: u32,
    value: Option<u8>,
    public: Option<bool>,
) -> Result<FlagResponse, ZetaError> {
    let auth = Auth::seal(
        FlagRequest {
            event_id: event_id.to_string(),
            ticket_number,
            value,
            public,
        },
        caller,
    )
    .unwrap();
    flows::flag(state.clone(), auth).await
}

#[tokio::test]
async fn test_create_and_search() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    // Id mode returns exactly the one event
    let auth = Auth::seal(
        SearchRequest {
            text: event_id.clone(),
            limit: 1,
            mode: SearchMode::Id,
        },
        alice(),
    )
    .unwrap();
    let found = flows::search(state.clone(), auth).await.unwrap().events;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, event_id);
    assert_eq!(found[0].issued, 0);

    // Text mode is a case-insensitive substring match
    let auth = Auth::seal(
        SearchRequest {
            text: "LAUNCH".to_string(),
            limit: 10,
            mode: SearchMode::Text,
        },
        alice(),
    )
    .unwrap();
    let found = flows::search(state.clone(), auth).await.unwrap().events;
    assert_eq!(found.len(), 1);

    // Unknown id is a 404-kind error
    let auth = Auth::seal(
        SearchRequest {
            text: "eeeeeeee-0000-0000-0000-000000000000".to_string(),
            limit: 1,
            mode: SearchMode::Id,
        },
        alice(),
    )
    .unwrap();
    let err = flows::search(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.detail(), "event not found");
}

// S1: transfer, then redemption with the superseded ticket fails
#[tokio::test]
async fn test_old_ticket_fails_after_transfer() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    let t0 = register(&state, alice(), &event_id, None).await.unwrap();
    let t1 = transfer(&state, alice(), bob(), &event_id, &t0).await.unwrap();

    let err = redeem(&state, alice(), &event_id, &t0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.detail(), "ticket superseded");

    assert!(redeem(&state, bob(), &event_id, &t1).await.unwrap().success);
}

// S2: stamping requires redemption first
#[tokio::test]
async fn test_stamp_requires_redeem() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    let t0 = register(&state, alice(), &event_id, None).await.unwrap();
    let t1 = transfer(&state, alice(), bob(), &event_id, &t0).await.unwrap();

    let err = validate(&state, owner(), &event_id, &t1, bob(), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.detail(), "ticket has not been redeemed");

    assert!(redeem(&state, bob(), &event_id, &t1).await.unwrap().success);

    let stamped = validate(&state, owner(), &event_id, &t1, bob(), true)
        .await
        .unwrap();
    assert!(stamped.redeemed);
    assert_eq!(stamped.stamped, Some(true));
}

// S3: replay defense and signature binding
#[tokio::test]
async fn test_replay_and_signature_defense() {
    let state = app_state();

    let auth = Auth::seal(CreateRequest { event: draft(3) }, owner()).unwrap();
    flows::create(state.clone(), auth.clone()).await.unwrap();

    // Same signed body again within the window: nonce conflict
    let err = flows::create(state.clone(), auth.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.detail(), "duplicate request nonce");

    // Same body past the freshness window: rejected before the nonce check
    let mut stale = Auth::seal(CreateRequest { event: draft(3) }, owner()).unwrap();
    stale.data.timestamp -= 30.0;
    stale.signature = owner().sign(&stale.data).unwrap();
    let err = flows::create(state.clone(), stale).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.detail(), "timestamp out of sync");

    // Fresh nonce and timestamp but a key that did not sign the body
    let mut forged = Auth::seal(CreateRequest { event: draft(3) }, owner()).unwrap();
    forged.public_key = stranger().public_pem().to_string();
    let err = flows::create(state.clone(), forged).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "signature verification failed");
}

// S4: restricted events bind verification blocks to a key
#[tokio::test]
async fn test_restricted_registration_key_binding() {
    let state = app_state();
    let mut restricted = draft(3);
    restricted.restricted = true;
    let event_id = create_event(&state, owner(), restricted).await;

    // No verification at all
    let err = register(&state, alice(), &event_id, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "verification required");

    // Verification bound to bob's key, presented by alice
    let for_bob = Auth::seal(
        Verification {
            event_id: event_id.clone(),
            public_key: bob().public_pem().to_string(),
            transfer_limit: None,
            metadata: Value::Null,
        },
        owner(),
    )
    .unwrap();
    let err = register(&state, alice(), &event_id, Some(for_bob))
        .await
        .unwrap_err();
    assert_eq!(err.detail(), "verification for different user");

    // Verification bound to alice, presented by alice
    let for_alice = Auth::seal(
        Verification {
            event_id: event_id.clone(),
            public_key: alice().public_pem().to_string(),
            transfer_limit: None,
            metadata: json!({"tier": "vip"}),
        },
        owner(),
    )
    .unwrap();
    let ticket = register(&state, alice(), &event_id, Some(for_alice))
        .await
        .unwrap();

    let checked = validate(&state, alice(), &event_id, &ticket, alice(), false)
        .await
        .unwrap();
    assert_eq!(checked.metadata, json!({"tier": "vip"}));
}

#[tokio::test]
async fn test_restricted_registration_signer_rules() {
    let state = app_state();
    let mut restricted = draft(3);
    restricted.restricted = true;
    let event_id = create_event(&state, owner(), restricted).await;

    // A verification signed by a non-owner without delegation is refused
    let rogue = Auth::seal(
        Verification {
            event_id: event_id.clone(),
            public_key: alice().public_pem().to_string(),
            transfer_limit: None,
            metadata: Value::Null,
        },
        stranger(),
    )
    .unwrap();
    let err = register(&state, alice(), &event_id, Some(rogue))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "unauthorized signer");

    // The same signer works once granted authorize_registration
    grant(
        &state,
        &event_id,
        stranger(),
        Permissions {
            authorize_registration: true,
            ..Permissions::default()
        },
    )
    .await;

    let delegated = Auth::seal(
        Verification {
            event_id: event_id.clone(),
            public_key: alice().public_pem().to_string(),
            transfer_limit: None,
            metadata: Value::Null,
        },
        stranger(),
    )
    .unwrap();
    assert!(register(&state, alice(), &event_id, Some(delegated)).await.is_ok());

    // Verification for another event is refused
    let mut open = draft(3);
    open.restricted = true;
    let other_id = create_event(&state, owner(), open).await;
    let wrong_event = Auth::seal(
        Verification {
            event_id: other_id,
            public_key: bob().public_pem().to_string(),
            transfer_limit: None,
            metadata: Value::Null,
        },
        owner(),
    )
    .unwrap();
    let err = register(&state, bob(), &event_id, Some(wrong_event))
        .await
        .unwrap_err();
    assert_eq!(err.detail(), "verification for different event");
}

#[tokio::test]
async fn test_verification_transfer_limit_is_clamped() {
    let state = app_state();
    let mut restricted = draft(3);
    restricted.restricted = true;
    restricted.transfer_limit = 2;
    let event_id = create_event(&state, owner(), restricted).await;

    let generous = Auth::seal(
        Verification {
            event_id: event_id.clone(),
            public_key: alice().public_pem().to_string(),
            transfer_limit: Some(63),
            metadata: Value::Null,
        },
        owner(),
    )
    .unwrap();
    let ticket = register(&state, alice(), &event_id, Some(generous))
        .await
        .unwrap();

    let checked = validate(&state, alice(), &event_id, &ticket, alice(), false)
        .await
        .unwrap();
    assert_eq!(checked.transfer_limit, 2);
}

// S5: selling out is a conflict
#[tokio::test]
async fn test_sold_out_registration() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(2)).await;

    register(&state, alice(), &event_id, None).await.unwrap();
    register(&state, bob(), &event_id, None).await.unwrap();

    let err = register(&state, stranger(), &event_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.detail(), "unable to issue ticket");
}

// S6: ciphertext tampering is detected opaquely
#[tokio::test]
async fn test_tampered_ticket_rejected() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    let ticket = register(&state, alice(), &event_id, None).await.unwrap();

    let mut tampered = ticket.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let err = redeem(&state, alice(), &event_id, &tampered).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "ticket verification failed");
}

// S7: flag visibility rules
#[tokio::test]
async fn test_flag_visibility() {
    let state = app_state();
    let mut flagged = draft(3);
    flagged.enable_flags = true;
    let event_id = create_event(&state, owner(), flagged).await;
    register(&state, alice(), &event_id, None).await.unwrap();

    grant(
        &state,
        &event_id,
        delegate(),
        Permissions {
            update_ticket_flag: true,
            see_ticket_flag: true,
            ..Permissions::default()
        },
    )
    .await;

    // Delegate writes a private flag
    let written = flag(&state, delegate(), &event_id, 1, Some(69), Some(false))
        .await
        .unwrap();
    assert_eq!((written.value, written.public), (69, false));

    // A non-delegate cannot read it while private
    let err = flag(&state, stranger(), &event_id, 1, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "ticket flag is not public");

    // Delegate flips it public; now anyone reads it
    let written = flag(&state, delegate(), &event_id, 1, None, Some(true))
        .await
        .unwrap();
    assert_eq!((written.value, written.public), (69, true));

    let read = flag(&state, stranger(), &event_id, 1, None, None)
        .await
        .unwrap();
    assert_eq!((read.value, read.public), (69, true));

    // Writing without the capability is denied
    let err = flag(&state, stranger(), &event_id, 1, Some(1), Some(true))
        .await
        .unwrap_err();
    assert_eq!(err.detail(), "permission denied");
}

#[tokio::test]
async fn test_flags_require_enable_flags() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    let err = flag(&state, owner(), &event_id, 1, None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.detail(), "ticket flag retrieval failed");

    let err = flag(&state, owner(), &event_id, 1, Some(3), None)
        .await
        .unwrap_err();
    assert_eq!(err.detail(), "ticket flag set failed");
}

#[tokio::test]
async fn test_stamped_visibility_is_gated() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    let ticket = register(&state, alice(), &event_id, None).await.unwrap();
    redeem(&state, alice(), &event_id, &ticket).await.unwrap();

    // The holder sees their own stamped status
    let own = validate(&state, alice(), &event_id, &ticket, alice(), false)
        .await
        .unwrap();
    assert_eq!(own.stamped, Some(false));
    assert!(own.redeemed);

    // A stranger sees redemption but not the stamped field
    let unprivileged = validate(&state, stranger(), &event_id, &ticket, alice(), false)
        .await
        .unwrap();
    assert!(unprivileged.redeemed);
    assert_eq!(unprivileged.stamped, None);

    // A see_stamped_ticket delegate sees it
    grant(
        &state,
        &event_id,
        delegate(),
        Permissions {
            see_stamped_ticket: true,
            ..Permissions::default()
        },
    )
    .await;
    let privileged = validate(&state, delegate(), &event_id, &ticket, alice(), false)
        .await
        .unwrap();
    assert_eq!(privileged.stamped, Some(false));

    // Stamping needs the stamp_ticket capability
    let err = validate(&state, stranger(), &event_id, &ticket, alice(), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "permission denied");
}

#[tokio::test]
async fn test_cancel_capability_and_terminality() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;
    let ticket = register(&state, alice(), &event_id, None).await.unwrap();

    // Without cancel_ticket the call is denied
    let auth = Auth::seal(
        CancelRequest {
            event_id: event_id.clone(),
            ticket_number: 1,
        },
        stranger(),
    )
    .unwrap();
    let err = flows::cancel(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.detail(), "permission denied");

    // The owner cancels ticket number 1 (the only issued ticket)
    let auth = Auth::seal(
        CancelRequest {
            event_id: event_id.clone(),
            ticket_number: 1,
        },
        owner(),
    )
    .unwrap();
    assert!(flows::cancel(state.clone(), auth).await.unwrap().success);

    let err = redeem(&state, alice(), &event_id, &ticket).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.detail(), "ticket canceled");

    // Numbers that were never issued cannot be canceled
    let auth = Auth::seal(
        CancelRequest {
            event_id: event_id.clone(),
            ticket_number: 2,
        },
        owner(),
    )
    .unwrap();
    let err = flows::cancel(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.detail(), "ticket cancelation failed");

    // Out-of-range numbers fail validation outright
    let auth = Auth::seal(
        CancelRequest {
            event_id: event_id.clone(),
            ticket_number: 0,
        },
        owner(),
    )
    .unwrap();
    let err = flows::cancel(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_transfer_block_binding() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;
    let ticket = register(&state, alice(), &event_id, None).await.unwrap();

    // A transfer block naming bob cannot be redeemed by a stranger
    let block = Auth::seal(
        Transfer {
            ticket: ticket.clone(),
            transfer_public_key: bob().public_pem().to_string(),
        },
        alice(),
    )
    .unwrap();
    let auth = Auth::seal(
        TransferRequest {
            event_id: event_id.clone(),
            transfer: block,
        },
        stranger(),
    )
    .unwrap();
    let err = flows::transfer(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "authorization for different user");
}

#[tokio::test]
async fn test_permissions_endpoint_owner_only() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;

    // Non-owners cannot touch permissions
    let auth = Auth::seal(
        PermissionsRequest {
            event_id: event_id.clone(),
            target_public_key: delegate().public_pem().to_string(),
            permissions: None,
        },
        stranger(),
    )
    .unwrap();
    let err = flows::update_permissions(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.detail(), "not event owner");

    // Owner writes, then reads back
    let granted = Permissions {
        stamp_ticket: true,
        ..Permissions::default()
    };
    grant(&state, &event_id, delegate(), granted).await;

    let auth = Auth::seal(
        PermissionsRequest {
            event_id: event_id.clone(),
            target_public_key: delegate().public_pem().to_string(),
            permissions: None,
        },
        owner(),
    )
    .unwrap();
    let read = flows::update_permissions(state.clone(), auth).await.unwrap();
    assert_eq!(read.permissions, granted);

    // Reading the owner's own permissions reports everything granted
    let auth = Auth::seal(
        PermissionsRequest {
            event_id: event_id.clone(),
            target_public_key: owner().public_pem().to_string(),
            permissions: None,
        },
        owner(),
    )
    .unwrap();
    let read = flows::update_permissions(state.clone(), auth).await.unwrap();
    assert_eq!(read.permissions, Permissions::grant_all());
}

#[tokio::test]
async fn test_delete_is_owner_only_and_cascades() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;
    let ticket = register(&state, alice(), &event_id, None).await.unwrap();

    let auth = Auth::seal(
        DeleteRequest {
            event_id: event_id.clone(),
        },
        alice(),
    )
    .unwrap();
    let err = flows::delete(state.clone(), auth).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert_eq!(err.detail(), "not event owner");

    let auth = Auth::seal(
        DeleteRequest {
            event_id: event_id.clone(),
        },
        owner(),
    )
    .unwrap();
    assert!(flows::delete(state.clone(), auth).await.unwrap().success);

    // The event and everything hanging off it are gone
    let err = redeem(&state, alice(), &event_id, &ticket).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.detail(), "event not found");
}

#[tokio::test]
async fn test_stamp_by_delegate() {
    let state = app_state();
    let event_id = create_event(&state, owner(), draft(3)).await;
    let ticket = register(&state, alice(), &event_id, None).await.unwrap();
    redeem(&state, alice(), &event_id, &ticket).await.unwrap();

    grant(
        &state,
        &event_id,
        delegate(),
        Permissions {
            stamp_ticket: true,
            see_stamped_ticket: true,
            ..Permissions::default()
        },
    )
    .await;

    let stamped = validate(&state, delegate(), &event_id, &ticket, alice(), true)
        .await
        .unwrap();
    assert_eq!(stamped.stamped, Some(true));

    // Stamping twice is refused
    let err = validate(&state, delegate(), &event_id, &ticket, alice(), true)
        .await
        .unwrap_err();
    assert_eq!(err.detail(), "ticket is already stamped");
}
