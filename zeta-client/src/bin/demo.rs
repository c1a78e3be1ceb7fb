//! Walkthrough of the full ticket lifecycle against a running server
//!
//! Generates three principals (owner, Alice, Bob), creates a restricted
//! event with flags, and drives register, transfer, redeem, stamp, flag
//! and cancel end to end. Start the server first.

use serde_json::json;
use zeta_client::Client;
use zeta_core::crypto::KeyPair;
use zeta_core::protocol::SearchMode;
use zeta_core::types::{EventDraft, Permissions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

    println!("generating principals (2048-bit keys for the demo)...");
    let owner = Client::new(&base_url, KeyPair::generate(2048)?)?;
    let alice = Client::new(&base_url, KeyPair::generate(2048)?)?;
    let bob = Client::new(&base_url, KeyPair::generate(2048)?)?;

    println!("\n== create ==");
    let event_id = owner
        .create_event(EventDraft {
            name: "ZETA launch night".to_string(),
            description: "A demonstration event".to_string(),
            tickets: 16,
            start: zeta_core::envelope::epoch_now(),
            finish: zeta_core::envelope::epoch_now() + 86_400.0,
            restricted: true,
            transfer_limit: 4,
            enable_flags: true,
        })
        .await?;
    println!("event created: {event_id}");

    println!("\n== search ==");
    let found = owner.search("launch", 8, SearchMode::Text).await?;
    println!("text search found {} event(s)", found.len());

    println!("\n== register (restricted) ==");
    match alice.register(&event_id, None).await {
        Err(err) => println!("without verification: {err}"),
        Ok(_) => println!("unexpected: registration succeeded without verification"),
    }

    let verification = owner.issue_verification(
        &event_id,
        alice.public_key(),
        None,
        json!({"tier": "vip"}),
    )?;
    let alice_ticket = alice.register(&event_id, Some(verification)).await?;
    println!("alice holds ticket ({} chars)", alice_ticket.len());

    println!("\n== transfer ==");
    let block = alice.authorize_transfer(&alice_ticket, bob.public_key())?;
    let bob_ticket = bob.transfer(&event_id, block).await?;
    println!("bob now holds version 2 of the ticket");

    match alice.redeem(&event_id, &alice_ticket).await {
        Err(err) => println!("alice's old ticket: {err}"),
        Ok(_) => println!("unexpected: superseded ticket redeemed"),
    }

    println!("\n== redeem ==");
    bob.redeem(&event_id, &bob_ticket).await?;
    println!("bob's ticket redeemed");

    println!("\n== validate and stamp ==");
    let checked = owner
        .validate(&event_id, &bob_ticket, bob.public_key(), true)
        .await?;
    println!(
        "ticket {} redeemed={} stamped={:?}",
        checked.ticket_number, checked.redeemed, checked.stamped
    );

    println!("\n== permissions and flags ==");
    owner
        .permissions(
            &event_id,
            bob.public_key(),
            Some(Permissions {
                see_ticket_flag: true,
                update_ticket_flag: true,
                ..Permissions::default()
            }),
        )
        .await?;
    let written = bob
        .flag(&event_id, checked.ticket_number, Some(69), Some(true))
        .await?;
    println!("flag set to {} (public={})", written.value, written.public);

    println!("\n== cancel ==");
    owner.cancel(&event_id, checked.ticket_number).await?;
    match bob.validate(&event_id, &bob_ticket, bob.public_key(), false).await {
        Err(err) => println!("after cancel: {err}"),
        Ok(_) => println!("unexpected: canceled ticket validated"),
    }

    println!("\n== delete ==");
    owner.delete(&event_id).await?;
    println!("event deleted; demo complete");

    Ok(())
}
