use actix::prelude::*;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::Harness;
use crate::{
    clients::JwtIdentityVerifier,
    modules::websocket::{
        events::ClientText,
        fanout::Fanout,
        server::WebSocketServer,
        session::{GatewayServices, WebSocketSession},
    },
    utils::{Claims, TypeClaims},
};

const SECRET: &[u8] = b"gateway-secret";

struct Client {
    session: Addr<WebSocketSession>,
    server: Addr<WebSocketServer>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Client {
    fn open(h: &Harness, user_id: Option<Uuid>) -> Self {
        let server = WebSocketServer::default().start();
        let services = GatewayServices {
            messages: h.messages.clone(),
            conversations: h.conversations.clone(),
            reactions: h.reactions.clone(),
            identity: Arc::new(JwtIdentityVerifier::new(SECRET)),
            presence: None,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let session = WebSocketSession::new(server.clone(), tx, services, user_id).start();
        Client { session, server, rx }
    }

    fn send(&self, event: &str, data: Value) {
        self.session.do_send(ClientText(json!({ "event": event, "data": data }).to_string()));
    }

    fn send_raw(&self, text: &str) {
        self.session.do_send(ClientText(text.to_string()));
    }

    async fn reply(&mut self) -> Value {
        let json = actix_web::rt::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .expect("no reply from session")
            .expect("session channel closed");
        serde_json::from_str(&json).unwrap()
    }

    /// Gửi một event và trả về reply duy nhất của nó
    async fn call(&mut self, event: &str, data: Value) -> Value {
        self.send(event, data);
        let reply = self.reply().await;
        self.assert_silent().await;
        reply
    }

    async fn assert_silent(&mut self) {
        let extra = actix_web::rt::time::timeout(Duration::from_millis(50), self.rx.recv()).await;
        assert!(extra.is_err(), "unexpected extra frame: {:?}", extra);
    }
}

fn token(user_id: Uuid, _type: TypeClaims) -> String {
    Claims::new(&user_id, 300).with_type(_type).encode(SECRET).unwrap()
}

#[actix_web::test]
async fn test_event_before_auth_rejected() {
    let h = Harness::new();
    let (an, binh) = (h.user("An"), h.user("Binh"));
    let id = h.conversations.create_direct(an, binh).await.unwrap().id;
    let mut client = Client::open(&h, None);

    let reply = client.call("send-message", json!({ "conversationId": id, "message": "hi" })).await;

    assert_eq!(reply["event"], "send-message-error");
    assert_eq!(reply["data"]["message"], "Invalid session");
    assert_eq!(h.message_repo.count(), 0);
}

#[actix_web::test]
async fn test_auth_handshake() {
    let h = Harness::new();
    let (an, binh) = (h.user("An"), h.user("Binh"));
    let id = h.conversations.create_direct(an, binh).await.unwrap().id;
    let mut client = Client::open(&h, None);

    let reply = client.call("auth", json!({ "token": "garbage" })).await;
    assert_eq!(reply["event"], "auth-error");
    assert_eq!(reply["data"]["message"], "Invalid token");

    // Refresh token không dùng được cho gateway
    let reply = client.call("auth", json!({ "token": token(an, TypeClaims::RefreshToken) })).await;
    assert_eq!(reply["event"], "auth-error");

    let reply = client.call("auth", json!({ "token": token(an, TypeClaims::AccessToken) })).await;
    assert_eq!(reply["event"], "auth-success");
    assert_eq!(reply["data"]["userId"], json!(an));

    let reply = client.call("auth", json!({ "token": token(an, TypeClaims::AccessToken) })).await;
    assert_eq!(reply["event"], "auth-error");
    assert_eq!(reply["data"]["message"], "Session already authenticated");

    let reply = client.call("send-message", json!({ "conversationId": id, "message": "hi" })).await;
    assert_eq!(reply["event"], "send-message-success");
    assert_eq!(reply["data"]["message"], "hi");
    assert_eq!(h.message_repo.count(), 1);
}

#[actix_web::test]
async fn test_each_event_gets_exactly_one_reply() {
    let h = Harness::new();
    let (an, binh, chi) = (h.user("An"), h.user("Binh"), h.user("Chi"));
    let id = h.conversations.create_direct(an, binh).await.unwrap().id;
    let elsewhere = h.conversations.create_direct(binh, chi).await.unwrap().id;
    let mut client = Client::open(&h, Some(an));

    let reply = client.call("ping", Value::Null).await;
    assert_eq!(reply["event"], "pong");

    let reply = client.call("join-conversation", json!({ "conversationId": id })).await;
    assert_eq!(reply["event"], "join-conversation-success");
    assert_eq!(client.server.viewing_users(id).await, vec![an]);

    let reply = client.call("join-conversation", json!({ "conversationId": elsewhere })).await;
    assert_eq!(reply["event"], "join-conversation-error");
    assert!(client.server.viewing_users(elsewhere).await.is_empty());

    let reply = client.call("send-message", json!({ "conversationId": id, "message": "  " })).await;
    assert_eq!(reply["event"], "send-message-error");

    let reply = client.call("recall-message", json!({ "messageId": "nope" })).await;
    assert_eq!(reply["event"], "recall-message-error");

    let reply = client.call("typing-start", json!({})).await;
    assert_eq!(reply["event"], "typing-start-error");

    let reply = client.call("leave-conversation", json!({ "conversationId": id })).await;
    assert_eq!(reply["event"], "leave-conversation-success");
    assert!(client.server.viewing_users(id).await.is_empty());
}

#[actix_web::test]
async fn test_pin_and_unpin_replies() {
    let h = Harness::new();
    let (an, binh) = (h.user("An"), h.user("Binh"));
    let id = h.conversations.create_direct(an, binh).await.unwrap().id;
    let mut client = Client::open(&h, Some(an));

    let sent = client.call("send-message", json!({ "conversationId": id, "message": "keep" })).await;
    let message_id = sent["data"]["id"].clone();

    let reply = client.call("pin-message", json!({ "messageId": message_id, "pin": true })).await;
    assert_eq!(reply["event"], "pin-message-success");
    assert_eq!(reply["data"]["pinned"], true);

    let reply = client.call("pin-message", json!({ "messageId": message_id, "pin": false })).await;
    assert_eq!(reply["event"], "unpin-message-success");
    assert_eq!(reply["data"]["pinned"], false);
}

#[actix_web::test]
async fn test_malformed_frame_rejected() {
    let h = Harness::new();
    let an = h.user("An");
    let mut client = Client::open(&h, Some(an));

    client.send_raw("{not json");
    let reply = client.reply().await;
    client.assert_silent().await;

    assert_eq!(reply["event"], "frame-error");
    assert_eq!(reply["data"]["message"], "Malformed frame");

    // Session vẫn dùng được sau frame lỗi
    let reply = client.call("ping", Value::Null).await;
    assert_eq!(reply["event"], "pong");
}
