//! Simulate command implementation.
//!
//! Runs two sessions, "alice" and "bob", against one in-process server.
//! Both talk CBOR over a loopback HTTP client, so the full wire path is
//! exercised without a socket.

use clap::ValueEnum;
use quotesync_engine::{
    HttpGateway, LoopbackClient, LoopbackServer, MemoryStorage, SessionBus, SyncConfig,
    SyncCoordinator, SyncObserver, SyncStatus,
};
use quotesync_protocol::{ConflictInfo, Payload, QuotationDocument, ResolutionStrategy};
use quotesync_server::{QuotationServer, ServerConfig};
use serde_json::{json, Value};
use std::sync::Arc;

/// A scripted scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Both sessions edit the same field.
    Conflict,
    /// The sessions edit different fields.
    FastForward,
    /// One session edits while disconnected.
    Offline,
}

struct ServerHandle(Arc<QuotationServer>);

impl LoopbackServer for ServerHandle {
    fn handle_post(&self, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        self.0.handle_post(path, body)
    }
}

type Session = SyncCoordinator<HttpGateway<LoopbackClient<ServerHandle>>, MemoryStorage>;

/// Prints every callback with the session's name.
struct Printer {
    name: &'static str,
}

impl SyncObserver for Printer {
    fn on_conflict(&self, conflict: &ConflictInfo) {
        let fields: Vec<&str> = conflict
            .conflicting_fields
            .iter()
            .map(String::as_str)
            .collect();
        println!(
            "[{}] conflict with server v{} on {}",
            self.name,
            conflict.server_version,
            fields.join(", ")
        );
    }

    fn on_remote_update(&self, document: &QuotationDocument) {
        println!("[{}] pulled remote update v{}", self.name, document.version);
    }

    fn on_status_change(&self, status: SyncStatus) {
        println!("[{}] status -> {}", self.name, status);
    }
}

fn session(name: &'static str, server: &Arc<QuotationServer>, bus: &Arc<SessionBus>) -> Session {
    let client = LoopbackClient::new(ServerHandle(Arc::clone(server)));
    let gateway = HttpGateway::new("http://quotesync.local", client);
    SyncCoordinator::new(SyncConfig::interactive(), gateway, MemoryStorage::new())
        .with_bus(Arc::clone(bus))
        .with_observer(Arc::new(Printer { name }))
}

fn patch(value: Value) -> Result<Payload, Box<dyn std::error::Error>> {
    Payload::from_json(value).ok_or_else(|| "patch must be a JSON object".into())
}

/// Runs the simulate command.
pub fn run(
    scenario: Scenario,
    strategy: ResolutionStrategy,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(simulate(scenario, strategy))
}

async fn simulate(
    scenario: Scenario,
    strategy: ResolutionStrategy,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(?scenario, %strategy, "starting simulation");
    let server = Arc::new(QuotationServer::new(ServerConfig::default()));
    let seeded = server.create_document(patch(json!({
        "customer": "Acme Corp",
        "currency": "EUR",
        "price": 100,
        "discount": 0,
        "notes": ""
    }))?);
    let bus = Arc::new(SessionBus::new());

    let alice = session("alice", &server, &bus);
    let bob = session("bob", &server, &bus);
    alice.open(seeded.id).await?;
    bob.open(seeded.id).await?;
    println!("Both sessions opened {} at v{}", seeded.id, seeded.version);

    match scenario {
        Scenario::Conflict => {
            bob.mutate(&patch(json!({"price": 120}))?)?;
            println!("[bob] push: {:?}", bob.force_push().await?);
            alice.mutate(&patch(json!({"price": 110}))?)?;
            println!("[alice] push: {:?}", alice.force_push().await?);
            println!("[alice] resolve {}: {:?}", strategy, alice.resolve(strategy).await?);
        }
        Scenario::FastForward => {
            bob.mutate(&patch(json!({"price": 120}))?)?;
            println!("[bob] push: {:?}", bob.force_push().await?);
            alice.mutate(&patch(json!({"discount": 10}))?)?;
            println!("[alice] push: {:?}", alice.force_push().await?);
        }
        Scenario::Offline => {
            alice.gateway().client().set_reachable(false);
            println!("[alice] reachability: {:?}", alice.set_reachability(false).await?);
            alice.mutate(&patch(json!({"notes": "call back Monday"}))?)?;
            bob.mutate(&patch(json!({"price": 120}))?)?;
            println!("[bob] push: {:?}", bob.force_push().await?);
            alice.gateway().client().set_reachable(true);
            println!("[alice] reachability: {:?}", alice.set_reachability(true).await?);
        }
    }

    match server.document(&seeded.id) {
        Some(doc) => println!(
            "Server holds v{}: {}",
            doc.version,
            serde_json::to_string(&doc.payload.to_json())?
        ),
        None => println!("Server lost the document"),
    }
    for (name, session) in [("alice", &alice), ("bob", &bob)] {
        let stats = session.stats();
        println!(
            "[{}] status {} | accepted {} rejected {} fast-forwards {} conflicts {}",
            name,
            session.status(),
            stats.pushes_accepted,
            stats.pushes_rejected,
            stats.fast_forwards,
            stats.conflicts_detected
        );
    }

    alice.close();
    bob.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_runs() {
        for scenario in [Scenario::Conflict, Scenario::FastForward, Scenario::Offline] {
            run(scenario, ResolutionStrategy::Merge).unwrap();
        }
    }

    #[test]
    fn conflict_scenario_runs_with_cancel() {
        run(Scenario::Conflict, ResolutionStrategy::Cancel).unwrap();
    }
}
