/// WebSocket HTTP Handler
///
/// Upgrade HTTP request thành WebSocket và bridge 2 chiều:
/// - Inbound:  Client → WebSocket → ClientText → Session Actor
/// - Outbound: Server Actor → Session Actor → mpsc channel → WebSocket → Client
///
/// Token lấy từ query `token` hoặc header `Authorization: Bearer`. Token sai thì đóng
/// connection với close code policy violation; không có token thì session phải gửi `auth`.
use actix::{Actor, Addr};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::events::{ClientText, Shutdown};
use super::server::WebSocketServer;
use super::session::{GatewayServices, WebSocketSession};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let from_query = web::Query::<TokenQuery>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().token)
        .filter(|t| !t.is_empty());

    from_query.or_else(|| {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

/// Endpoint: GET /ws
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<WebSocketServer>>,
    services: web::Data<GatewayServices>,
) -> Result<HttpResponse, Error> {
    tracing::debug!("WebSocket upgrade request from {:?}", req.peer_addr());

    let user_id = match bearer_token(&req) {
        Some(token) => match services.identity.introspect(&token).await {
            Ok(result) if result.valid => result.user_id,
            Ok(_) => {
                tracing::warn!("Rejecting WebSocket connection with invalid token");
                return reject(&req, stream, "Invalid token");
            }
            Err(e) => {
                tracing::warn!("Token introspection failed: {}", e);
                return reject(&req, stream, "Identity service unavailable");
            }
        },
        None => None,
    };

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    // Session actor gửi JSON → spawned task → WebSocket → client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let addr = WebSocketSession::new(
        server.get_ref().clone(),
        tx,
        services.get_ref().clone(),
        user_id,
    )
    .start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => addr.do_send(ClientText(text.to_string())),

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Cannot send pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary frames are not supported");
                        }

                        Some(Ok(Message::Pong(_) | Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        None => break,
                    }
                }

                Some(json) = rx.recv() => {
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Cannot write to WebSocket client");
                        break;
                    }
                }
            }
        }

        let _ = ws_session.close(None).await;
        // Server actor vẫn giữ recipient nên phải dừng session một cách tường minh
        addr.do_send(Shutdown);
        tracing::debug!("WebSocket message loop finished");
    });

    Ok(response)
}

/// Hoàn tất handshake rồi đóng ngay với policy violation
fn reject(
    req: &HttpRequest,
    stream: web::Payload,
    description: &'static str,
) -> Result<HttpResponse, Error> {
    let (response, ws_session, _msg_stream) = actix_ws::handle(req, stream)?;

    actix_web::rt::spawn(async move {
        let reason = CloseReason { code: CloseCode::Policy, description: Some(description.into()) };
        let _ = ws_session.close(Some(reason)).await;
    });

    Ok(response)
}
