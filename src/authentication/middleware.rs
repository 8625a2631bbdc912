use std::ops::Deref;

use actix_web::body::EitherBody;
use actix_web::body::MessageBody;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::http::Method;
use actix_web::web;
use actix_web::HttpMessage;
use actix_web::HttpResponse;
use actix_web_lab::middleware::Next;
use uuid::Uuid;

use super::bearer_token;
use super::TokenVerifier;
use crate::utils::error_500;
use crate::utils::ApiResponse;

// `Clone` grants `.into_inner`
#[derive(Clone, Debug)]
pub struct UserId(Uuid);

// basically just for unpacking the inner Uuid type
impl Deref for UserId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target { &self.0 }
}

/// Verify the bearer token and embed the caller's `UserId` in the request, for
/// handlers to extract with `web::ReqData<UserId>`.
///
/// Preflight (`OPTIONS`) requests never carry credentials and are let through.
///
/// Failures are turned into a 401 response here rather than returned as
/// `Err`, so that outer middleware (the CORS headers) still applies to them.
pub async fn reject_unauthenticated(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, actix_web::Error> {
    if req.method() == Method::OPTIONS {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }

    let outcome = match req.app_data::<web::Data<TokenVerifier>>() {
        Some(verifier) => bearer_token(req.headers()).and_then(|t| verifier.verify(t)),
        None => return Err(error_500("TokenVerifier was not registered as app data")),
    };

    match outcome {
        Ok(user_id) => {
            req.extensions_mut().insert(UserId(user_id));
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(e) => {
            tracing::warn!(error.message=%e, "rejecting unauthenticated request");
            let resp = HttpResponse::Unauthorized().json(ApiResponse::failure(format!(
                "Unauthorized: {e}"
            )));
            Ok(req.into_response(resp).map_into_right_body())
        }
    }
}
