//! # Integration Test Flows
//!
//! Buses, routers and the directory working together the way a realm
//! deployment wires them.
//!
//! ## Flows Tested:
//!
//! 1. **Bus propagation**: events cross one connection and stop there
//! 2. **Router → Bus**: a handler announces finished work as an event
//! 3. **Directory**: access-checked sends and lifecycle events
//! 4. **Verification policy**: signed realms refuse forged traffic

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;

    use realm_bus::{event_handler_fn, Event, EventFilter};
    use realm_router::{
        handler_fn, payload, BearerKey, Message, MessageType, Payload, RouterConfig, VerifyPolicy,
    };
    use realm_runtime::{
        DirectoryError, NodeConfig, RealmDirectory, RealmNode, ROUTER_CONNECTED, SYSTEM_TAG,
    };
    use realm_types::{sign_message, tags, AllowAll, LineageAccess};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn node(realm: &str) -> RealmNode {
        RealmNode::new(NodeConfig::for_realm(realm)).unwrap()
    }

    fn signed_node(realm: &str, key: &str) -> RealmNode {
        let mut config = NodeConfig::for_realm(realm);
        config.router = RouterConfig::default()
            .with_bearer_key(BearerKey::from(key))
            .with_verify_policy(VerifyPolicy::RequireSigned);
        RealmNode::new(config).unwrap()
    }

    fn event_names(seen: &Arc<Mutex<Vec<Event>>>) -> Vec<String> {
        seen.lock().iter().map(|e| e.name.clone()).collect()
    }

    fn recorder() -> (Arc<Mutex<Vec<Event>>>, Arc<dyn realm_bus::EventHandler>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = event_handler_fn(move |event: Event| {
            let sink = sink.clone();
            async move {
                sink.lock().push(event);
                Ok(())
            }
        });
        (seen, handler)
    }

    // =============================================================================
    // BUS PROPAGATION
    // =============================================================================

    #[tokio::test]
    async fn test_event_reaches_direct_peers_only() {
        let alpha = node("alpha");
        let beta = node("beta");
        let gamma = node("gamma");
        alpha.connect(&beta).await;
        beta.connect(&gamma).await;

        let (on_beta, handler) = recorder();
        beta.bus()
            .subscribe(EventFilter::pattern("kaitiaki.*").from_realm("alpha"), handler);
        let (on_gamma, handler) = recorder();
        gamma.bus().on("kaitiaki.*", handler);

        alpha
            .bus()
            .publish("kaitiaki.invoked", payload(json!({"kaitiaki": "tane"})), tags(["agent"]))
            .await;

        assert_eq!(event_names(&on_beta), vec!["kaitiaki.invoked"]);
        assert!(on_gamma.lock().is_empty());
        assert_eq!(on_beta.lock()[0].source_realm, "alpha");
    }

    #[tokio::test]
    async fn test_history_filters_by_tag_across_realms() {
        let alpha = node("alpha");
        let beta = node("beta");
        alpha.connect(&beta).await;

        alpha
            .bus()
            .publish("memory.stored", Payload::new(), tags(["mauri"]))
            .await;
        alpha
            .bus()
            .publish("memory.stored", Payload::new(), tags(["routine"]))
            .await;

        let mauri = EventFilter::pattern("memory.*")
            .from_realm("alpha")
            .with_tags(tags(["mauri"]));
        assert_eq!(beta.bus().history_matching(&mauri, 10).len(), 1);
        assert_eq!(beta.bus().get_history("memory.*", Some("alpha"), 10).len(), 2);
        assert!(beta.bus().get_history("memory.*", Some("beta"), 10).is_empty());
    }

    // =============================================================================
    // ROUTER → BUS
    // =============================================================================

    /// A pipeline handler replies to the caller and announces the run on
    /// its own bus, which forwards it to the caller's bus.
    #[tokio::test]
    async fn test_pipeline_result_is_announced_on_the_bus() {
        let caller = node("caller");
        let worker = node("worker");
        caller.connect(&worker).await;

        let bus = worker.bus().clone();
        worker.router().on(
            MessageType::PipelineTrigger,
            handler_fn(move |msg: Message| {
                let bus = bus.clone();
                async move {
                    let pipeline = msg.payload["pipeline"].clone();
                    bus.publish(
                        "pipeline.completed",
                        payload(json!({"pipeline": pipeline})),
                        tags(["pipeline"]),
                    )
                    .await;
                    Ok(Some(payload(json!({"output": "done"}))))
                }
            }),
        );
        let (announced, handler) = recorder();
        caller.bus().on("pipeline.*", handler);

        let result = caller
            .router()
            .trigger_pipeline("worker", "ingest", Payload::new())
            .await
            .unwrap();

        assert_eq!(result["output"], json!("done"));
        assert_eq!(event_names(&announced), vec!["pipeline.completed"]);
        assert_eq!(announced.lock()[0].payload["pipeline"], json!("ingest"));
    }

    #[tokio::test]
    async fn test_broadcast_from_node_reaches_all_peers() {
        let hub = node("hub");
        let peers = [node("p1"), node("p2"), node("p3")];
        let hits = Arc::new(Mutex::new(Vec::new()));
        for peer in &peers {
            hub.connect(peer).await;
            let hits = hits.clone();
            peer.router().on(
                MessageType::Heartbeat,
                handler_fn(move |msg: Message| {
                    let hits = hits.clone();
                    async move {
                        hits.lock().push(msg.target.realm);
                        Ok(None)
                    }
                }),
            );
        }

        let delivered = hub.router().broadcast(MessageType::Heartbeat, Payload::new()).await;
        assert_eq!(delivered, vec!["p1", "p2", "p3"]);
        assert_eq!(hits.lock().len(), 3);
    }

    // =============================================================================
    // DIRECTORY
    // =============================================================================

    #[tokio::test]
    async fn test_directory_gates_by_lineage_and_permission() {
        let access = LineageAccess::new()
            .allow_with("parent", "child", ["memory.query"])
            .allow("child", "parent");
        let dir = RealmDirectory::new(NodeConfig::default(), Arc::new(access));
        let parent = dir.get_or_create("parent").unwrap();
        let child = dir.get_or_create("child").unwrap();
        dir.connect("parent", "child").await.unwrap();

        child.router().on(
            MessageType::MemoryQuery,
            handler_fn(|_msg: Message| async { Ok(Some(payload(json!({"results": [1, 2]})))) }),
        );

        let query = parent
            .router()
            .message("child", MessageType::MemoryQuery, Payload::new());
        let reply = dir
            .send_checked(query, true, Some("memory.query"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.payload["results"], json!([1, 2]));

        let trigger = parent
            .router()
            .message("child", MessageType::PipelineTrigger, Payload::new());
        assert!(matches!(
            dir.send_checked(trigger, false, Some("pipeline.trigger")).await,
            Err(DirectoryError::AccessDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_directory_connect_emits_lifecycle_events() {
        let dir = RealmDirectory::new(NodeConfig::default(), Arc::new(AllowAll));
        let a = dir.get_or_create("A").unwrap();
        let b = dir.get_or_create("B").unwrap();
        let (lifecycle, handler) = recorder();
        b.bus()
            .subscribe(EventFilter::all().with_tags(tags([SYSTEM_TAG])), handler);

        dir.connect("A", "B").await.unwrap();

        assert_eq!(event_names(&lifecycle), vec![ROUTER_CONNECTED]);
        assert_eq!(lifecycle.lock()[0].payload["peer"], json!("A"));
        assert!(a.router().is_connected("B"));
    }

    #[tokio::test]
    async fn test_unknown_source_realm_is_reported() {
        let dir = RealmDirectory::new(NodeConfig::default(), Arc::new(AllowAll));
        let ghost = node("ghost");
        let message = ghost
            .router()
            .message("anyone", MessageType::Heartbeat, Payload::new());

        assert!(matches!(
            dir.send_checked(message, false, None).await,
            Err(DirectoryError::UnknownRealm(name)) if name == "ghost"
        ));
    }

    // =============================================================================
    // VERIFICATION POLICY
    // =============================================================================

    #[tokio::test]
    async fn test_signed_realms_exchange_messages() {
        let a = signed_node("A", "tapu");
        let b = signed_node("B", "tapu");
        a.connect(&b).await;
        b.router().on(
            MessageType::KaitiakiRequest,
            handler_fn(|_msg: Message| async { Ok(Some(payload(json!({"result": "ok"})))) }),
        );

        let answer = a
            .router()
            .request_kaitiaki("B", "tane", payload(json!({"task": "x"})))
            .await
            .unwrap();
        assert_eq!(answer, payload(json!({"result": "ok"})));
    }

    #[tokio::test]
    async fn test_forged_message_never_reaches_handlers() {
        let a = signed_node("A", "tapu");
        let b = signed_node("B", "tapu");
        a.connect(&b).await;

        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        b.router().on(
            MessageType::MemoryShare,
            handler_fn(move |_msg: Message| {
                let counter = counter.clone();
                async move {
                    *counter.lock() += 1;
                    Ok(None)
                }
            }),
        );

        // Signed with the wrong key.
        let mut forged = a
            .router()
            .message("B", MessageType::MemoryShare, payload(json!({"memory": "fake"})));
        sign_message(&mut forged, &BearerKey::from("noa"));
        b.router().receive(forged).await;

        // Signed correctly, then tampered with.
        let mut tampered = a
            .router()
            .message("B", MessageType::MemoryShare, payload(json!({"memory": "real"})));
        sign_message(&mut tampered, &BearerKey::from("tapu"));
        tampered.payload.insert("memory".to_string(), json!("edited"));
        b.router().receive(tampered).await;

        // Unsigned.
        b.router()
            .receive(a.router().message("B", MessageType::MemoryShare, Payload::new()))
            .await;

        assert_eq!(*calls.lock(), 0);
        assert_eq!(b.router().messages_received(), 3);
    }

    #[tokio::test]
    async fn test_short_timeout_from_node_config() {
        let mut config = NodeConfig::for_realm("A");
        config.router = config
            .router
            .with_response_timeout(Duration::from_millis(25));
        let a = RealmNode::new(config).unwrap();
        let b = node("B");
        a.connect(&b).await;

        let err = a
            .router()
            .query_memory("B", "anything", 1)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(a.router().pending_count(), 0);
    }
}
