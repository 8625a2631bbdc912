use actix_web::HttpResponse;

/// `OPTIONS` on any CORS-enabled route. The headers themselves are added to
/// every response by the `DefaultHeaders` middleware (see `startup::run`), so
/// this only needs to answer with an empty body.
pub async fn preflight() -> HttpResponse { HttpResponse::Ok().finish() }
