/// WebSocket Session Actor
///
/// Mỗi WebSocket connection có một Session actor riêng, giữ state
/// `CONNECTING → AUTHENTICATED` và gửi JSON tới client qua mpsc channel được bridge
/// từ handler.rs.
///
/// Mỗi inbound event chạy trong `ctx.spawn()` + `into_actor()` nên nhiều event có thể
/// đang xử lý cùng lúc; mỗi event trả về đúng một `<event>-success` hoặc `<event>-error`.
use actix::prelude::*;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    api::error,
    clients::IdentityVerifier,
    modules::{
        conversation::service::ConversationService,
        message::service::MessageService,
        reaction::{model::ReactionAction, service::ReactionService},
    },
};

use super::events::{self, Authenticate, ClientText, Connect, Disconnect, Shutdown};
use super::message::{ClientEvent, InboundFrame, ServerEvent, AUTH_ERROR};
use super::presence::PresenceService;
use super::server::WebSocketServer;

/// Refresh presence TTL theo chu kỳ này
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Dependencies dùng chung cho mọi session
#[derive(Clone)]
pub struct GatewayServices {
    pub messages: Arc<MessageService>,
    pub conversations: Arc<ConversationService>,
    pub reactions: Arc<ReactionService>,
    pub identity: Arc<dyn IdentityVerifier>,
    /// None trong test environment
    pub presence: Option<PresenceService>,
}

pub struct WebSocketSession {
    pub id: Uuid,

    /// None cho tới khi xác thực (qua handshake hoặc event `auth`)
    pub user_id: Option<Uuid>,

    server: Addr<WebSocketServer>,

    /// Channel gửi JSON tới client (bridge → handler.rs → WebSocket)
    tx: mpsc::UnboundedSender<String>,

    services: GatewayServices,
}

fn send_json(tx: &mpsc::UnboundedSender<String>, session_id: Uuid, event: &ServerEvent) {
    match event.to_json() {
        Ok(json) => {
            if let Err(e) = tx.send(json) {
                tracing::error!("Cannot send '{}' to session {}: {}", event.event, session_id, e);
            }
        }
        Err(e) => tracing::error!("Cannot serialize '{}' (session {}): {}", event.event, session_id, e),
    }
}

/// Lý do hiển thị cho client, lỗi nội bộ đã được log khi map
fn reason(e: error::SystemError) -> String {
    error::Error::from(e).reason().into_owned()
}

impl WebSocketSession {
    pub fn new(
        server: Addr<WebSocketServer>,
        tx: mpsc::UnboundedSender<String>,
        services: GatewayServices,
        user_id: Option<Uuid>,
    ) -> Self {
        Self { id: Uuid::now_v7(), user_id, server, tx, services }
    }

    fn send_to_client(&self, event: &ServerEvent) {
        send_json(&self.tx, self.id, event);
    }

    fn require_auth(&self, event: &ClientEvent) -> Option<Uuid> {
        if self.user_id.is_none() {
            tracing::warn!("Session {} not authenticated, rejecting '{}'", self.id, event.name());
            self.send_to_client(&ServerEvent::error(event.name(), "Invalid session"));
        }
        self.user_id
    }

    fn on_authenticated(&mut self, user_id: Uuid, ctx: &mut Context<Self>) {
        self.user_id = Some(user_id);
        self.server.do_send(Authenticate { session_id: self.id, user_id });

        let Some(presence) = self.services.presence.clone() else {
            return;
        };
        ctx.run_interval(HEARTBEAT_INTERVAL, move |act, ctx| {
            let presence = presence.clone();
            ctx.spawn(
                async move {
                    if let Err(e) = presence.refresh(user_id).await {
                        tracing::warn!("Cannot refresh presence of {}: {}", user_id, e);
                    }
                }
                .into_actor(act),
            );
        });
    }

    fn handle_auth(&mut self, token: String, ctx: &mut Context<Self>) {
        if self.user_id.is_some() {
            self.send_to_client(&ServerEvent::new(
                AUTH_ERROR,
                serde_json::json!({ "message": "Session already authenticated" }),
            ));
            return;
        }

        let identity = self.services.identity.clone();
        ctx.spawn(
            async move { identity.introspect(&token).await }.into_actor(self).map(
                |result, act, ctx| match result {
                    Ok(introspection) if introspection.valid => {
                        let Some(user_id) = introspection.user_id else {
                            act.send_to_client(&ServerEvent::new(
                                AUTH_ERROR,
                                serde_json::json!({ "message": "Invalid token" }),
                            ));
                            return;
                        };
                        act.on_authenticated(user_id, ctx);
                        act.send_to_client(&ServerEvent::auth_success(user_id));
                        tracing::info!("User {} authenticated on session {}", user_id, act.id);
                    }
                    Ok(_) => {
                        act.send_to_client(&ServerEvent::new(
                            AUTH_ERROR,
                            serde_json::json!({ "message": "Invalid token" }),
                        ));
                    }
                    Err(e) => {
                        act.send_to_client(&ServerEvent::new(
                            AUTH_ERROR,
                            serde_json::json!({ "message": reason(e) }),
                        ));
                    }
                },
            ),
        );
    }

    fn dispatch(&mut self, event: ClientEvent, ctx: &mut Context<Self>) {
        let Some(user_id) = self.require_auth(&event) else {
            return;
        };

        let services = self.services.clone();
        let server = self.server.clone();
        let tx = self.tx.clone();
        let session_id = self.id;
        let name = event.name();
        let success = event.success_name();

        ctx.spawn(
            async move {
                let reply = match execute(&services, &server, session_id, user_id, event).await {
                    Ok(data) => ServerEvent::success(success, data),
                    Err(e) => {
                        tracing::debug!("'{}' failed for user {}: {}", name, user_id, e);
                        ServerEvent::error(name, reason(e))
                    }
                };
                send_json(&tx, session_id, &reply);
            }
            .into_actor(self),
        );
    }

    fn handle_frame(&mut self, frame: InboundFrame, ctx: &mut Context<Self>) {
        let name = frame.event.clone();
        let event = match ClientEvent::parse(frame) {
            Ok(event) => event,
            Err(e) => {
                self.send_to_client(&ServerEvent::error(&name, reason(e)));
                return;
            }
        };

        match event {
            ClientEvent::Auth(req) => self.handle_auth(req.token, ctx),
            ClientEvent::Ping => self.send_to_client(&ServerEvent::pong()),
            other => self.dispatch(other, ctx),
        }
    }
}

async fn execute(
    services: &GatewayServices,
    server: &Addr<WebSocketServer>,
    session_id: Uuid,
    user_id: Uuid,
    event: ClientEvent,
) -> Result<Value, error::SystemError> {
    let messages = &services.messages;
    let conversations = &services.conversations;
    let reactions = &services.reactions;

    let data = match event {
        ClientEvent::JoinConversation(req) => {
            messages.accessible_conversation(&user_id, &req.conversation_id).await?;
            server.do_send(events::JoinConversation {
                session_id,
                conversation_id: req.conversation_id,
            });
            serde_json::json!({ "conversationId": req.conversation_id })
        }
        ClientEvent::LeaveConversation(req) => {
            server.do_send(events::LeaveConversation {
                session_id,
                conversation_id: req.conversation_id,
            });
            serde_json::json!({ "conversationId": req.conversation_id })
        }
        ClientEvent::MessageStatusUpdate(req) => {
            serde_json::to_value(messages.mark_read(user_id, req.conversation_id).await?)?
        }
        ClientEvent::SendMessage(req) => serde_json::to_value(messages.send_message(user_id, req).await?)?,
        ClientEvent::ReplyMessage(req) => serde_json::to_value(messages.reply(user_id, req).await?)?,
        ClientEvent::ReactMessage(req) => {
            serde_json::to_value(reactions.react(user_id, req, ReactionAction::Add).await?)?
        }
        ClientEvent::RemoveReaction(req) => {
            serde_json::to_value(reactions.react(user_id, req, ReactionAction::Remove).await?)?
        }
        ClientEvent::ToggleReaction(req) => {
            serde_json::to_value(reactions.react(user_id, req, ReactionAction::Toggle).await?)?
        }
        ClientEvent::RecallMessage(req) => serde_json::to_value(messages.recall(user_id, req).await?)?,
        ClientEvent::PinMessage(req) => serde_json::to_value(messages.set_pinned(user_id, req).await?)?,
        ClientEvent::SendMediaMessage(req) => {
            serde_json::to_value(messages.send_media(user_id, req).await?)?
        }
        ClientEvent::SendMediaReply(req) => {
            serde_json::to_value(messages.send_media_reply(user_id, req).await?)?
        }
        ClientEvent::DeleteMediaMessage(req) => {
            serde_json::to_value(messages.delete_media(user_id, req.message_id).await?)?
        }
        ClientEvent::CreateGroupConversation(req) => {
            serde_json::to_value(conversations.create_group(user_id, req).await?)?
        }
        ClientEvent::AddParticipants(req) => {
            serde_json::to_value(conversations.add_members(user_id, req).await?)?
        }
        ClientEvent::RemoveParticipants(req) => {
            serde_json::to_value(conversations.remove_members(user_id, req).await?)?
        }
        ClientEvent::LeaveGroup(req) => {
            serde_json::to_value(conversations.leave_group(user_id, req.conversation_id).await?)?
        }
        ClientEvent::EditGroupInfo(req) => {
            serde_json::to_value(conversations.edit_group_info(user_id, req).await?)?
        }
        ClientEvent::ForwardMessage(req) => serde_json::to_value(messages.forward(user_id, req).await?)?,
        ClientEvent::EditMessage(req) => {
            serde_json::to_value(messages.edit_message(user_id, req).await?)?
        }
        ClientEvent::Auth(_) | ClientEvent::Ping => {
            return Err(error::SystemError::bad_request("Unexpected event"));
        }
    };

    Ok(data)
}

impl Actor for WebSocketSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session started: {}", self.id);

        self.server.do_send(Connect { id: self.id, recipient: ctx.address().recipient() });

        // Token hợp lệ ngay từ handshake
        if let Some(user_id) = self.user_id {
            self.on_authenticated(user_id, ctx);
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session stopped: {}", self.id);
        self.server.do_send(Disconnect { id: self.id });
    }
}

/// Handler: nhận text frame từ handler.rs
impl Handler<ClientText> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, ClientText(text): ClientText, ctx: &mut Context<Self>) {
        match serde_json::from_str::<InboundFrame>(&text) {
            Ok(frame) => self.handle_frame(frame, ctx),
            Err(e) => {
                tracing::warn!(
                    "Cannot parse client frame on session {}: {} - raw: {}",
                    self.id,
                    e,
                    text.chars().take(100).collect::<String>()
                );
                self.send_to_client(&ServerEvent::error("frame", "Malformed frame"));
            }
        }
    }
}

/// Handler: nhận ServerEvent từ server actor → gửi tới client qua channel
impl Handler<ServerEvent> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, event: ServerEvent, _ctx: &mut Context<Self>) {
        self.send_to_client(&event);
    }
}

impl Handler<Shutdown> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Context<Self>) {
        ctx.stop();
    }
}
