use actix_web::{get, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::reaction::{model::ReactionSummary, service::ReactionService},
};

#[get("/{message_id}/reactions")]
pub async fn get_reactions(
    reaction_svc: web::Data<ReactionService>,
    message_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ReactionSummary>>, error::Error> {
    let user_id = get_claims(&req)?.sub;

    let reactions = reaction_svc.summary(user_id, *message_id).await?;

    Ok(success::Success::ok(Some(reactions)).message("Successfully retrieved reactions"))
}
