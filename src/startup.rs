use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::error::InternalError;
use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::web;
use actix_web::web::Data;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web_lab::middleware::from_fn;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_actix_web::TracingLogger;

use crate::authentication::reject_unauthenticated;
use crate::authentication::TokenVerifier;
use crate::configuration::DatabaseSettings;
use crate::configuration::SendLogBackend;
use crate::configuration::Settings;
use crate::domain::RecipientEmail;
use crate::email_client::EmailClient;
use crate::rate_limit::InMemorySendLog;
use crate::rate_limit::PgSendLog;
use crate::rate_limit::RateLimiter;
use crate::rate_limit::SendLog;
use crate::routes::health_check;
use crate::routes::preflight;
use crate::routes::send_contact_email;
use crate::routes::send_email;
use crate::utils::ApiResponse;
use crate::utils::CORS_HEADERS;

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
}

impl Application {
    /// Wrapper over `startup::run` that builds every collaborator from `cfg`
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;

        // get the port assigned by OS (if `port` was 0)
        let port = listener.local_addr()?.port();

        let send_log: Arc<dyn SendLog> = match cfg.send_log.backend {
            SendLogBackend::Postgres => Arc::new(PgSendLog::new(get_connection_pool(&cfg.database))),
            SendLogBackend::Memory => {
                tracing::warn!("using in-memory send log; rate limits are not shared between replicas");
                Arc::new(InMemorySendLog::new())
            }
        };

        let email_client = cfg.email_client.client().map_err(anyhow::Error::msg)?;
        let contact = cfg.email_client.contact().map_err(anyhow::Error::msg)?;

        let server = run(
            listener,
            send_log,
            email_client,
            cfg.auth.verifier(),
            contact,
        )?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

// connect_lazy only connects when the pool is used for the first time, so the
// server can start (and answer health checks) before the db is reachable
pub fn get_connection_pool(db_cfg: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(db_cfg.connection())
}

/// Wrapper for the organisers' inbox (because raw types may conflict with one
/// another when passed around by `Data`)
pub struct ContactAddress(pub RecipientEmail);

/// Malformed JSON bodies get the same envelope as every other failure
fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    let resp = HttpResponse::BadRequest().json(ApiResponse::failure(err.to_string()));
    InternalError::from_response(err, resp).into()
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    send_log: Arc<dyn SendLog>,
    email_client: EmailClient,
    verifier: TokenVerifier,
    contact: RecipientEmail,
) -> Result<Server, anyhow::Error> {
    // `Data` is externally an `Arc` (for sharing/cloning); every worker gets a
    // clone of these
    let limiter = Data::new(RateLimiter::new(send_log));
    let email_client = Data::new(email_client);
    let verifier = Data::new(verifier);
    let contact = Data::new(ContactAddress(contact));

    let server = HttpServer::new(move || {
        let cors = CORS_HEADERS
            .into_iter()
            .fold(DefaultHeaders::new(), |h, pair| h.add(pair));

        App::new()
            .wrap(cors)
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::resource("/send-email")
                    .wrap(from_fn(reject_unauthenticated))
                    .route(web::post().to(send_email))
                    .route(web::method(Method::OPTIONS).to(preflight)),
            )
            .service(
                web::resource("/send-contact-email")
                    .route(web::post().to(send_contact_email))
                    .route(web::method(Method::OPTIONS).to(preflight)),
            )
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(limiter.clone())
            .app_data(email_client.clone())
            .app_data(verifier.clone())
            .app_data(contact.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
