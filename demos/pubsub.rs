//! Publish/subscribe over an in-process dispatcher.
//!
//! Demonstrates:
//! - Binding an in-process Dispatcher on an ephemeral port
//! - Connecting two independent transports to it
//! - Registering a topic listener and receiving publishes
//!
//! Usage:
//!   cargo run --example pubsub

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uplink_transport::{Dispatcher, Envelope, Listener, SocketTransport, Uri};

// ============================================================================
// Listener
// ============================================================================

struct PrintListener;

#[async_trait]
impl Listener for PrintListener {
    async fn on_receive(&self, envelope: Envelope) {
        println!(
            "    ✓ received on {}: {:?}",
            envelope.source().map(Uri::as_str).unwrap_or_default(),
            String::from_utf8_lossy(&envelope.payload),
        );
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    println!("=== pubsub: topic fan-out ===\n");

    // ========================================================================
    // Dispatcher + Transports
    // ========================================================================

    println!("[1] Binding dispatcher...");
    let dispatcher = Dispatcher::bind("127.0.0.1:0").await?;
    println!("    ✓ Listening on {}\n", dispatcher.local_addr());

    println!("[2] Connecting transports...");
    let endpoint = dispatcher.local_addr().to_string();
    let publisher = SocketTransport::connect(&endpoint).await?;
    let subscriber = SocketTransport::connect(&endpoint).await?;
    println!("    ✓ Publisher and subscriber connected\n");

    // ========================================================================
    // Subscribe + Publish
    // ========================================================================

    println!("[3] Registering listener on vehicle/door/status...");
    let topic: Uri = "vehicle/door/status".parse()?;
    subscriber.register_listener(&topic, Arc::new(PrintListener))?;
    println!("    ✓ Registered\n");

    println!("[4] Publishing...");
    for state in ["open", "ajar", "closed"] {
        publisher
            .send(Envelope::publish(topic.clone(), state.as_bytes().to_vec()))
            .await?;
    }

    // Give the frames a moment to fan out before shutting down.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[Cleanup] Closing...");
    publisher.close().await;
    subscriber.close().await;
    dispatcher.shutdown().await;
    println!("          ✓ Done");

    Ok(())
}
