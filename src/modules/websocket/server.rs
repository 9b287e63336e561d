/// WebSocket Server Actor
///
/// Quản lý tất cả sessions qua `SessionRegistry` và route ServerEvent tới đúng
/// user (mọi device). Presence trong Redis được cập nhật khi user có session đầu tiên
/// hoặc mất session cuối cùng.
use actix::prelude::*;
use uuid::Uuid;

use super::events::*;
use super::message::ServerEvent;
use super::presence::PresenceService;
use super::registry::SessionRegistry;

pub struct WebSocketServer {
    registry: SessionRegistry<Recipient<ServerEvent>>,
    /// None trong test environment
    presence: Option<PresenceService>,
}

impl WebSocketServer {
    pub fn new(presence: Option<PresenceService>) -> Self {
        Self { registry: SessionRegistry::new(), presence }
    }

    fn update_presence(&self, user_id: Uuid, online: bool, ctx: &mut Context<Self>) {
        let Some(presence) = self.presence.clone() else {
            return;
        };

        ctx.spawn(
            async move {
                let result = if online {
                    presence.set_online(user_id).await
                } else {
                    presence.set_offline(user_id).await
                };
                if let Err(e) = result {
                    tracing::warn!("Cannot update presence of user {}: {}", user_id, e);
                }
            }
            .into_actor(self),
        );
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Actor for WebSocketServer {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket server started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket server stopped");
    }
}

impl Handler<Connect> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        self.registry.create(msg.id, msg.recipient);
        tracing::debug!("New WebSocket session connected: {} ({} open)", msg.id, self.registry.len());
    }
}

impl Handler<Disconnect> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, ctx: &mut Context<Self>) {
        tracing::debug!("WebSocket session disconnected: {}", msg.id);

        let Some(removed) = self.registry.delete(&msg.id) else {
            return;
        };

        if let (Some(user_id), true) = (removed.user_id, removed.last_session) {
            tracing::info!("User {} fully disconnected (no more sessions)", user_id);
            self.update_presence(user_id, false, ctx);
        }
    }
}

impl Handler<Authenticate> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Authenticate, ctx: &mut Context<Self>) {
        tracing::info!("User {} authenticated on session {}", msg.user_id, msg.session_id);

        if self.registry.authenticate(msg.session_id, msg.user_id) {
            self.update_presence(msg.user_id, true, ctx);
        }
    }
}

impl Handler<JoinConversation> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: JoinConversation, _: &mut Context<Self>) {
        if self.registry.lookup(&msg.session_id).and_then(|e| e.user_id).is_none() {
            tracing::warn!("Session {} cannot join before authenticating", msg.session_id);
            return;
        }
        self.registry.join(&msg.session_id, msg.conversation_id);
        tracing::debug!("Session {} viewing conversation {}", msg.session_id, msg.conversation_id);
    }
}

impl Handler<LeaveConversation> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: LeaveConversation, _: &mut Context<Self>) {
        self.registry.leave(&msg.session_id, &msg.conversation_id);
        tracing::debug!("Session {} left conversation {}", msg.session_id, msg.conversation_id);
    }
}

impl Handler<SendToUser> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: SendToUser, _: &mut Context<Self>) {
        if !self.registry.is_online(&msg.user_id) {
            tracing::debug!("User {} not online, '{}' not sent", msg.user_id, msg.event.event);
            return;
        }

        let mut sent = 0;
        for recipient in self.registry.recipients_of(&msg.user_id) {
            recipient.do_send(msg.event.clone());
            sent += 1;
        }
        tracing::debug!("Sent '{}' to user {} ({} sessions)", msg.event.event, msg.user_id, sent);
    }
}

impl Handler<GetViewers> for WebSocketServer {
    type Result = Vec<Uuid>;

    fn handle(&mut self, msg: GetViewers, _: &mut Context<Self>) -> Self::Result {
        self.registry.viewers(&msg.conversation_id)
    }
}
