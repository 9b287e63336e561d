pub struct Env {
    pub jwt_secret: String,
    pub database_url: String,
    pub redis_url: String,
    pub profile_service_url: String,
    pub notification_service_url: String,
    pub service_timeout_secs: u64,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
}

impl Env {
    fn new() -> Self {
        let jwt_secret = std::env::var("SECRET_KEY")
            .expect("SECRET_KEY must be set in .env file or environment variable");

        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variable");
        let redis_url = std::env::var("REDIS_URL")
            .expect("REDIS_URL must be set in .env file or environment variable");

        let profile_service_url = std::env::var("PROFILE_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8081/profile".to_string());
        let notification_service_url = std::env::var("NOTIFICATION_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8082/notification".to_string());
        let service_timeout_secs = std::env::var("SERVICE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .expect("SERVICE_TIMEOUT_SECS must be a valid u64 integer");

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16 integer");
        Env {
            jwt_secret,
            database_url,
            redis_url,
            profile_service_url,
            notification_service_url,
            service_timeout_secs,
            frontend_url,
            ip,
            port,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

/// Nội dung bootstrap message khi conversation mới được tạo
pub const CONVERSATION_STARTED: &str = "Let's start chat conversation";

/// Nội dung hiển thị thay cho message đã bị thu hồi
pub const RECALLED_PLACEHOLDER: &str = "Message has been recalled";

/// Số lần retry tối đa khi replace document gặp version cũ
pub const MAX_CONFLICT_RETRIES: usize = 5;

/// Notification type khi user được thêm vào group chat
pub const CHAT_GROUP_ADDED: &str = "CHAT_GROUP_ADDED";
