/// WebSocket Module
///
/// Connection Gateway của chat core:
///
/// - Protocol (`ClientEvent` & `ServerEvent`, frame `{ event, data }`)
/// - Session registry + Server actor (route event tới mọi device của user)
/// - Session actor (xử lý từng connection)
/// - Fanout (seam giữa services và server actor)
/// - HTTP handler (upgrade HTTP thành WebSocket)
pub mod events;
pub mod fanout;
pub mod handler;
pub mod message;
pub mod presence;
pub mod registry;
pub mod server;
pub mod session;
