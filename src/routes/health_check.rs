use actix_web::HttpResponse;

/// `GET /health_check`
///
/// Liveness probe for the container platform; touches neither the db nor the
/// email provider.
pub async fn health_check() -> HttpResponse { HttpResponse::Ok().finish() }
