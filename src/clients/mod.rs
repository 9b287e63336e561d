/// External collaborators
///
/// Các service bên ngoài mà chat core phụ thuộc vào, chỉ truy cập qua trait:
/// - `ProfileLookup`: lấy profile user để tạo participant snapshot
/// - `NotificationDispatch`: gửi realtime notification (fire-and-forget)
/// - `IdentityVerifier`: xác thực bearer token khi connect WebSocket
pub mod identity;
pub mod notification;
pub mod profile;

pub use identity::{IdentityVerifier, Introspection, JwtIdentityVerifier};
pub use notification::{HttpNotificationClient, NotificationDispatch, RealtimeNotification};
pub use profile::{HttpProfileClient, Profile, ProfileLookup};
