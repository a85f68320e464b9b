//! # End-to-End Messaging Tests
//!
//! Request/response between realms:
//!
//! ```text
//! [Realm A Router] ──kaitiaki.request──→ [Realm B Router]
//!        ↑                                      │
//!        │                              handler returns payload
//!        │                                      │
//!        └──────────kaitiaki.response───────────┘
//!                   (reply_to = request id)
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: correlated replies, signed and unsigned
//! 2. **Failure Handling**: timeouts, handler errors, disconnects
//! 3. **Concurrency**: many requests in flight at once
//! 4. **Wire**: delivery through a JSON-serializing sink

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use realm_router::{
        handler_fn, payload, BearerKey, Message, MessageSink, MessageType, Payload, RealmAddress,
        Router, RouterConfig, RouterError, VerificationResult,
    };
    use realm_types::HandlerError;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn connected(config: RouterConfig) -> (Arc<Router>, Arc<Router>) {
        let a = Arc::new(Router::with_config("A", config.clone()));
        let b = Arc::new(Router::with_config("B", config));
        a.connect(&b);
        (a, b)
    }

    fn kaitiaki_ok(router: &Router) {
        router.on(
            MessageType::KaitiakiRequest,
            handler_fn(|_msg: Message| async { Ok(Some(payload(json!({"result": "ok"})))) }),
        );
    }

    /// Sink that pushes every message through its JSON wire form before
    /// handing it to the target router.
    struct JsonWireSink {
        target: Arc<Router>,
        frames: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageSink for JsonWireSink {
        async fn deliver(&self, message: Message) {
            let frame = serde_json::to_string(&message).unwrap();
            self.frames.lock().push(frame.clone());
            let decoded: Message = serde_json::from_str(&frame).unwrap();
            self.target.receive(decoded).await;
        }
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    /// Realm A asks realm B's kaitiaki for work and gets B's answer back.
    #[tokio::test]
    async fn test_kaitiaki_request_round_trip() {
        let (a, b) = connected(RouterConfig::default());
        kaitiaki_ok(&b);

        let request = Message::new(
            RealmAddress::realm("A"),
            RealmAddress::realm("B"),
            MessageType::KaitiakiRequest,
            payload(json!({"task": "x"})),
        );
        let request_id = request.id.clone();

        let reply = a.send(request, true).await.unwrap().unwrap();

        assert_eq!(reply.payload, payload(json!({"result": "ok"})));
        assert_eq!(reply.reply_to, Some(request_id));
        assert_eq!(a.pending_count(), 0);
        assert_eq!(b.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_signed_round_trip_is_verified_both_ways() {
        let key = BearerKey::from("realm-link-shared");
        let (a, b) = connected(RouterConfig::default().with_bearer_key(key));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        b.on(
            MessageType::MemoryQuery,
            handler_fn(move |msg: Message| {
                let seen = seen.clone();
                async move {
                    seen.lock().push(msg);
                    Ok(Some(payload(json!({"results": []}))))
                }
            }),
        );

        let reply = a
            .send(a.message("B", MessageType::MemoryQuery, Payload::new()), true)
            .await
            .unwrap()
            .unwrap();

        let requests = requests.lock();
        assert!(requests[0].is_signed());
        assert_eq!(b.verify(&requests[0]), VerificationResult::Valid);
        assert_eq!(a.verify(&reply), VerificationResult::Valid);
        assert_eq!(reply.message_type, MessageType::MemoryResult);
    }

    #[tokio::test]
    async fn test_explicit_reply_from_handler() {
        let (a, b) = connected(RouterConfig::default());
        let responder = b.clone();
        b.on(
            MessageType::PipelineTrigger,
            handler_fn(move |msg: Message| {
                let responder = responder.clone();
                async move {
                    responder
                        .reply(&msg, payload(json!({"status": "queued"})))
                        .await
                        .map_err(|e| HandlerError::new(e.to_string()))?;
                    Ok(None)
                }
            }),
        );

        let reply = a
            .send(a.message("B", MessageType::PipelineTrigger, Payload::new()), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.message_type, MessageType::PipelineResult);
        assert_eq!(reply.payload["status"], json!("queued"));
    }

    // =============================================================================
    // FAILURE HANDLING
    // =============================================================================

    #[tokio::test]
    async fn test_silent_target_times_out_cleanly() {
        let (a, _b) =
            connected(RouterConfig::default().with_response_timeout(Duration::from_millis(30)));

        let request = a.message("B", MessageType::KaitiakiRequest, Payload::new());
        let err = a.send(request, true).await.unwrap_err();

        assert!(matches!(err, RouterError::Timeout { .. }));
        assert_eq!(a.pending_count(), 0);
        assert_eq!(
            a.pending_stats()
                .total_timeouts
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    /// The first handler fails, the second still runs, and the sender sees a
    /// single error reply.
    #[tokio::test]
    async fn test_handler_failure_becomes_error_reply() {
        let (a, b) = connected(RouterConfig::default());
        b.on(
            MessageType::KaitiakiRequest,
            handler_fn(|_msg: Message| async { Err(HandlerError::new("kaitiaki offline")) }),
        );
        let ran = Arc::new(Mutex::new(0usize));
        let counter = ran.clone();
        b.on(
            MessageType::KaitiakiRequest,
            handler_fn(move |_msg: Message| {
                let counter = counter.clone();
                async move {
                    *counter.lock() += 1;
                    Ok(None)
                }
            }),
        );

        let request = a.message("B", MessageType::KaitiakiRequest, payload(json!({"task": "x"})));
        let request_id = request.id.clone();
        let reply = a.send(request, true).await.unwrap().unwrap();

        assert_eq!(*ran.lock(), 1);
        assert_eq!(reply.message_type, MessageType::Error);
        assert_eq!(reply.error_text(), Some("kaitiaki offline"));
        assert_eq!(reply.reply_to, Some(request_id));
    }

    #[tokio::test]
    async fn test_convenience_wrapper_surfaces_remote_error() {
        let (a, b) = connected(RouterConfig::default());
        b.on(
            MessageType::KaitiakiRequest,
            handler_fn(|_msg: Message| async { Err(HandlerError::new("no such kaitiaki")) }),
        );

        let err = a
            .request_kaitiaki("B", "rangi", Payload::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, RouterError::Remote { ref error, .. } if error == "no such kaitiaki"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_disconnect_mid_wait_fails_the_request() {
        let (a, b) = connected(RouterConfig::default());
        b.on(
            MessageType::MemoryQuery,
            handler_fn(|_msg: Message| async { Ok(None) }),
        );

        let sender = a.clone();
        let waiting = tokio::spawn(async move {
            sender
                .send(sender.message("B", MessageType::MemoryQuery, Payload::new()), true)
                .await
        });
        while a.pending_count() == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        a.disconnect("B");

        assert_eq!(
            waiting.await.unwrap().unwrap_err(),
            RouterError::Disconnected { realm: "B".into() }
        );
        assert!(!b.is_connected("A"));
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    /// Replies are matched by id even when requests overlap.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_get_their_own_replies() {
        let (a, b) = connected(RouterConfig::default());
        b.on(
            MessageType::MemoryQuery,
            handler_fn(|msg: Message| async move {
                let n = msg.payload["n"].clone();
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Some(payload(json!({"echo": n}))))
            }),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..16u64 {
            let a = a.clone();
            tasks.spawn(async move {
                let request = a.message("B", MessageType::MemoryQuery, payload(json!({"n": n})));
                let reply = a.send(request, true).await.unwrap().unwrap();
                (n, reply.payload["echo"].as_u64())
            });
        }

        while let Some(result) = tasks.join_next().await {
            let (sent, echoed) = result.unwrap();
            assert_eq!(echoed, Some(sent));
        }
        assert_eq!(a.pending_count(), 0);
    }

    // =============================================================================
    // WIRE
    // =============================================================================

    /// Signatures survive a serialize/deserialize hop.
    #[tokio::test]
    async fn test_signed_message_survives_json_transport() {
        let key = BearerKey::from("wire-key");
        let a = Arc::new(Router::with_config(
            "A",
            RouterConfig::default().with_bearer_key(key.clone()),
        ));
        let b = Arc::new(Router::with_config(
            "B",
            RouterConfig::default().with_bearer_key(key),
        ));
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = received.clone();
        b.on(
            MessageType::MemoryShare,
            handler_fn(move |msg: Message| {
                let sink_seen = sink_seen.clone();
                async move {
                    sink_seen.lock().push(msg);
                    Ok(None)
                }
            }),
        );

        let wire = Arc::new(JsonWireSink {
            target: b.clone(),
            frames: Mutex::new(Vec::new()),
        });
        a.attach("B", wire.clone());

        a.send(
            a.message("B", MessageType::MemoryShare, payload(json!({"memory": "kōrero"}))),
            false,
        )
        .await
        .unwrap();

        let frames = wire.frames.lock();
        let frame: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(frame["type"], json!("memory.share"));
        assert_eq!(frame["auth"]["bearer_hash"].as_str().unwrap().len(), 16);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(b.verify(&received[0]), VerificationResult::Valid);
    }
}
