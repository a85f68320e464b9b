//! # Convenience Operations
//!
//! Typed wrappers over [`Router::send`] for the common exchanges. The
//! waiting wrappers turn a `system.error` reply into [`RouterError::Remote`].

use crate::errors::RouterError;
use crate::router::Router;
use realm_types::{Message, MessageType, Payload, RealmAddress};
use serde_json::{json, Value};
use tracing::{debug, warn};

impl Router {
    /// Ask `target_realm` for memories matching `query`.
    ///
    /// Returns the `results` array of the `memory.result` reply.
    ///
    /// # Errors
    ///
    /// Any send error, `Remote` for an error reply, `UnexpectedReply` when
    /// the reply has no `results` array.
    pub async fn query_memory(
        &self,
        target_realm: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Value>, RouterError> {
        let mut payload = Payload::new();
        payload.insert("query".to_string(), json!(query));
        payload.insert("limit".to_string(), json!(limit));

        let reply = self
            .request(self.message(target_realm, MessageType::MemoryQuery, payload))
            .await?;

        match reply.payload.get("results") {
            Some(Value::Array(results)) => Ok(results.clone()),
            _ => Err(RouterError::UnexpectedReply {
                message_id: reply.reply_to.unwrap_or(reply.id),
                reason: "memory.result without a 'results' array".to_string(),
            }),
        }
    }

    /// Hand `task` to `kaitiaki` in `target_realm` and return its answer.
    ///
    /// # Errors
    ///
    /// Any send error, or `Remote` for an error reply.
    pub async fn request_kaitiaki(
        &self,
        target_realm: &str,
        kaitiaki: &str,
        task: Payload,
    ) -> Result<Payload, RouterError> {
        let message = Message::new(
            self.address(),
            RealmAddress::realm(target_realm).with_kaitiaki(kaitiaki),
            MessageType::KaitiakiRequest,
            task,
        );
        Ok(self.request(message).await?.payload)
    }

    /// Start `pipeline` in `target_realm` with `input` and wait for its result.
    ///
    /// # Errors
    ///
    /// Any send error, or `Remote` for an error reply.
    pub async fn trigger_pipeline(
        &self,
        target_realm: &str,
        pipeline: &str,
        input: Payload,
    ) -> Result<Payload, RouterError> {
        let mut payload = Payload::new();
        payload.insert("pipeline".to_string(), json!(pipeline));
        payload.insert("input".to_string(), Value::Object(input));

        let message = Message::new(
            self.address(),
            RealmAddress::realm(target_realm).with_component(pipeline),
            MessageType::PipelineTrigger,
            payload,
        );
        Ok(self.request(message).await?.payload)
    }

    /// Send one message of `message_type` to every connected realm, without
    /// waiting. Returns the realms it was delivered to.
    pub async fn broadcast(&self, message_type: MessageType, payload: Payload) -> Vec<String> {
        let mut delivered = Vec::new();

        for realm in self.connected_realms() {
            let message = self.message(realm.clone(), message_type, payload.clone());
            match self.send(message, false).await {
                Ok(_) => delivered.push(realm),
                Err(e) => warn!(realm = %self.realm(), peer = %realm, error = %e, "Broadcast skipped realm"),
            }
        }

        debug!(
            realm = %self.realm(),
            message_type = %message_type,
            delivered = delivered.len(),
            "Broadcast sent"
        );
        delivered
    }

    /// Send and wait, mapping an error reply to `Remote`.
    async fn request(&self, message: Message) -> Result<Message, RouterError> {
        let message_id = message.id.clone();
        let Some(reply) = self.send(message, true).await? else {
            return Err(RouterError::UnexpectedReply {
                message_id,
                reason: "no reply".to_string(),
            });
        };

        if let Some(error) = reply.error_text() {
            return Err(RouterError::Remote {
                message_id,
                error: error.to_string(),
            });
        }
        if reply.message_type == MessageType::Error {
            return Err(RouterError::Remote {
                message_id,
                error: "unspecified error".to_string(),
            });
        }
        Ok(reply)
    }
}
