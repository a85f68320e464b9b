//! # Realm Node
//!
//! Demo executable: builds the configured realm and a peer, connects them,
//! runs one kaitiaki round trip and one event publish, then exits.
//!
//! ```text
//! REALM_NAME=alpha REALM_BEARER_KEY=dev-secret cargo run --bin realm-node
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use realm_bus::{event_handler_fn, Event};
use realm_router::{handler_fn, payload, Message, MessageType, RealmAddress};
use realm_runtime::{init_logging, NodeConfig, RealmDirectory};
use realm_types::{tags, AllowAll};
use serde_json::json;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load realm configuration")?;
    init_logging(&config.telemetry).context("Failed to initialize logging")?;

    let home_realm = config.realm.clone();
    let peer_realm = format!("{home_realm}-peer");

    let directory = RealmDirectory::new(config, Arc::new(AllowAll));
    let home = directory.get_or_create(&home_realm)?;
    let peer = directory.get_or_create(&peer_realm)?;
    directory.connect(&home_realm, &peer_realm).await?;

    peer.router().on(
        MessageType::KaitiakiRequest,
        handler_fn(|msg: Message| async move {
            let task = msg.payload.get("task").cloned().unwrap_or_default();
            info!(task = %task, "Kaitiaki request handled");
            Ok(Some(payload(json!({"result": "ok", "task": task}))))
        }),
    );
    peer.bus().on(
        "kaitiaki.*",
        event_handler_fn(|event: Event| async move {
            info!(event = %event.name, from = %event.source_realm, "Event observed");
            Ok(())
        }),
    );

    let request = Message::new(
        home.router().address(),
        RealmAddress::realm(peer_realm.clone()).with_kaitiaki("tane"),
        MessageType::KaitiakiRequest,
        payload(json!({"task": "summarise"})),
    );
    let reply = directory
        .send_checked(request, true, Some("kaitiaki"))
        .await?
        .context("Peer sent no reply")?;
    info!(
        reply_to = ?reply.reply_to,
        verified = %home.router().verify(&reply),
        payload = %serde_json::Value::Object(reply.payload.clone()),
        "Kaitiaki round trip complete"
    );

    let event = home
        .bus()
        .publish("kaitiaki.invoked", payload(json!({"kaitiaki": "tane"})), tags(["demo"]))
        .await;
    info!(
        event_id = %event.id,
        peer_history = peer.bus().history_len(),
        "Event published"
    );

    Ok(())
}
