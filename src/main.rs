use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    self, App, HttpServer,
    middleware::{Logger, from_fn},
    web,
};
use std::sync::{Arc, LazyLock};

use crate::{
    clients::{HttpNotificationClient, HttpProfileClient, JwtIdentityVerifier},
    configs::{connect_database, connect_redis, http_client},
    middlewares::authentication,
    modules::{
        conversation::{repository_pg::ConversationPgRepository, service::ConversationService},
        message::{repository_pg::MessageRepositoryPg, service::MessageService},
        reaction::{
            repository_pg::ReactionRepositoryPg,
            service::{ReactionLedger, ReactionService},
        },
        websocket::{
            handler::websocket_handler, presence::PresenceService, server::WebSocketServer,
            session::GatewayServices,
        },
    },
};

mod api;
mod clients;
mod configs;
mod constants;
mod middlewares;
mod modules;
#[cfg(test)]
mod test;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;

    let redis_pool = connect_redis().map_err(|_| std::io::Error::other("Redis connection error"))?;

    let client = http_client().map_err(|_| std::io::Error::other("HTTP client error"))?;

    let conversation_repo = Arc::new(ConversationPgRepository::new(db_pool.clone()));
    let message_repo = Arc::new(MessageRepositoryPg::new(db_pool.clone()));
    let reaction_repo = Arc::new(ReactionRepositoryPg::new(db_pool.clone()));

    let presence = PresenceService::new(redis_pool);
    let ws_server = WebSocketServer::new(Some(presence.clone())).start();

    let message_service = Arc::new(MessageService::with_dependencies(
        message_repo,
        conversation_repo.clone(),
        Arc::new(ws_server.clone()),
    ));
    let conversation_service = Arc::new(ConversationService::with_dependencies(
        conversation_repo,
        message_service.clone(),
        Arc::new(HttpProfileClient::new(client.clone(), ENV.profile_service_url.as_str())),
        Arc::new(HttpNotificationClient::new(client, ENV.notification_service_url.as_str())),
    ));
    let reaction_service = Arc::new(ReactionService::with_dependencies(
        ReactionLedger::new(reaction_repo),
        message_service.clone(),
    ));

    let gateway = GatewayServices {
        messages: message_service.clone(),
        conversations: conversation_service.clone(),
        reactions: reaction_service.clone(),
        identity: Arc::new(JwtIdentityVerifier::new(ENV.jwt_secret.as_bytes())),
        presence: Some(presence),
    };

    log::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&ENV.frontend_url)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::from(message_service.clone()))
            .app_data(web::Data::from(conversation_service.clone()))
            .app_data(web::Data::from(reaction_service.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(ws_server.clone()))
            .service(health_check)
            .route("/ws", web::get().to(websocket_handler))
            .service(
                web::scope("/api").service(
                    web::scope("")
                        .wrap(from_fn(authentication))
                        .configure(modules::conversation::route::configure)
                        .configure(modules::message::route::configure),
                ),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}
