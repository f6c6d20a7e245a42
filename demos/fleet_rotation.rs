//! Minimal example: two servers sharing seeds through a rotation.
//!
//! Demonstrates cross-server resumption, renewal after rotation and stats
//! persistence.
//! Run with: `cargo run --example fleet_rotation`

use std::sync::{Arc, Mutex};

use ticket_seeds::crypto::{split_ticket, IV_LEN};
use ticket_seeds::ticket::TICKET_NAME_LEN;
use ticket_seeds::{
    FileStatsSink, SealingContext, StatsLog, TicketHandler, TicketKeyManager, TicketName,
    TicketOutcome, TicketSeeds,
};

fn issue(server: &mut TicketKeyManager, state: &[u8]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut name = TicketName::from_bytes([0u8; TICKET_NAME_LEN]);
    let mut iv = [0u8; IV_LEN];
    let mut ctx = SealingContext::new();
    match server.encrypt_ticket(&mut name, &mut iv, &mut ctx) {
        TicketOutcome::Handled => Ok(ctx.seal(&name, state)?),
        other => Err(format!("ticket not issued: {:?}", other).into()),
    }
}

fn resume(server: &mut TicketKeyManager, ticket: &[u8]) -> Result<TicketOutcome, Box<dyn std::error::Error>> {
    let (name, iv) = split_ticket(ticket).ok_or("truncated ticket")?;
    let mut ctx = SealingContext::new();
    let outcome = server.decrypt_ticket(&name, &iv, &mut ctx);
    if matches!(outcome, TicketOutcome::Handled | TicketOutcome::Renew) {
        let state = ctx.open(ticket)?;
        println!("  resumed {} byte session state", state.len());
    }
    Ok(outcome)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Day 0: both servers get the same document, with tomorrow's seed staged.
    let day0 = TicketSeeds::from_raw(&[], &["monday-seed"], &["tuesday-seed"]);
    let mut server_a = TicketKeyManager::from_seeds(&day0)?;
    let mut server_b = TicketKeyManager::from_seeds(&day0)?;

    // Optional: count events on B and persist them to a file.
    let log = Arc::new(Mutex::new(StatsLog::new()));
    let stats_path = std::env::temp_dir().join("ticket_seeds_stats.jsonl");
    if let Ok(mut inner) = log.lock() {
        inner.add_forward_sink(Box::new(FileStatsSink::new(&stats_path)?));
    }
    server_b.set_stats(Box::new(Arc::clone(&log)));

    // 2. A client's ticket from A resumes on B.
    let ticket = issue(&mut server_a, b"client session")?;
    println!("B resumes A's ticket: {:?}", resume(&mut server_b, &ticket)?);

    // 3. Day 1: B rotates first. A's Monday ticket still works, but B asks for renewal.
    let day1 = TicketSeeds::from_raw(&["monday-seed"], &["tuesday-seed"], &[]);
    println!("day0 -> day1 is a staged rotation: {}", day0.is_valid_rotation(&day1));
    server_b.set_seeds(&day1)?;
    println!("B after rotation: {:?}", resume(&mut server_b, &ticket)?);

    // 4. A ticket from the rotated B resumes on A, which still has Tuesday staged as NEW.
    let renewed = issue(&mut server_b, b"client session")?;
    println!("A resumes B's renewed ticket: {:?}", resume(&mut server_a, &renewed)?);

    if let Ok(inner) = log.lock() {
        println!("B stats: {:?}", inner.counters());
    }
    println!("Events also written to: {}", stats_path.display());

    Ok(())
}
