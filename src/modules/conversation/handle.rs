use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        conversation::{
            model::{ConversationView, CreateDirectRequest},
            service::ConversationService,
        },
        message::{model::MessageView, service::MessageService},
    },
    utils::ValidatedJson,
};

#[get("")]
pub async fn get_conversations(
    conversation_svc: web::Data<ConversationService>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ConversationView>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversations = conversation_svc.my_conversations(user_id).await?;

    Ok(success::Success::ok(Some(conversations)).message("Successfully retrieved conversations"))
}

#[post("")]
pub async fn create_direct_conversation(
    conversation_svc: web::Data<ConversationService>,
    ValidatedJson(body): ValidatedJson<CreateDirectRequest>,
    req: HttpRequest,
) -> Result<success::Success<ConversationView>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let conversation = conversation_svc.create_direct(user_id, body.participant_id).await?;

    Ok(success::Success::created(Some(conversation)).message("Successfully created conversation"))
}

#[get("/{conversation_id}/messages")]
pub async fn get_messages(
    message_svc: web::Data<MessageService>,
    conversation_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<Vec<MessageView>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let messages = message_svc.list_messages(user_id, *conversation_id).await?;

    Ok(success::Success::ok(Some(messages)).message("Successfully retrieved messages"))
}
