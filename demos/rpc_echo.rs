//! RPC invocation against an echo service.
//!
//! Demonstrates:
//! - Serving a method by listening on its sink URI
//! - Building a response envelope from a request
//! - invoke_method with a deadline, and what a timeout looks like
//!
//! Usage:
//!   cargo run --example rpc_echo

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uplink_transport::{
    CallOptions, Dispatcher, Envelope, Listener, MessageKind, SocketTransport, Uri,
};

// ============================================================================
// Echo Service
// ============================================================================

/// Answers every request with the same payload.
struct EchoService {
    transport: Arc<SocketTransport>,
}

#[async_trait]
impl Listener for EchoService {
    async fn on_receive(&self, envelope: Envelope) {
        if envelope.kind() != MessageKind::Request {
            return;
        }
        let payload = envelope.payload.clone();
        let response = match Envelope::response_to(&envelope, payload) {
            Ok(response) => response,
            Err(e) => {
                eprintln!("    ✗ cannot build response: {e}");
                return;
            }
        };
        if let Err(e) = self.transport.send(response).await {
            eprintln!("    ✗ response send failed: {e}");
        }
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
    println!("=== rpc_echo: request/response correlation ===\n");

    // ========================================================================
    // Dispatcher + Transports
    // ========================================================================

    println!("[1] Binding dispatcher...");
    let dispatcher = Dispatcher::bind("127.0.0.1:0").await?;
    let endpoint = dispatcher.local_addr().to_string();
    println!("    ✓ Listening on {endpoint}\n");

    println!("[2] Starting echo service...");
    let service = Arc::new(
        SocketTransport::builder()
            .endpoint(&endpoint)
            .source("service.echo/instance_1".parse()?)
            .build()
            .await?,
    );
    let method: Uri = "service/echo/invoke".parse()?;
    service.register_listener(
        &method,
        Arc::new(EchoService {
            transport: Arc::clone(&service),
        }),
    )?;
    println!("    ✓ Serving {method}\n");

    println!("[3] Invoking...");
    let caller = SocketTransport::builder()
        .endpoint(&endpoint)
        .source("client.demo/instance_1".parse()?)
        .build()
        .await?;

    let response = caller
        .invoke_method(
            method,
            b"hello over the wire".to_vec(),
            CallOptions::new().timeout(Duration::from_secs(2)),
        )
        .await?;
    println!(
        "    ✓ response: {:?}\n",
        String::from_utf8_lossy(&response.payload)
    );

    // ========================================================================
    // Timeout Path
    // ========================================================================

    println!("[4] Invoking a method nobody serves...");
    let err = caller
        .invoke_method(
            "service/silent/invoke".parse()?,
            Vec::new(),
            CallOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .expect_err("nobody answers");
    println!("    ✓ failed as expected: {err}\n");

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("[Cleanup] Closing...");
    caller.close().await;
    service.close().await;
    dispatcher.shutdown().await;
    println!("          ✓ Done");

    Ok(())
}
