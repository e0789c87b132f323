use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use koinonia_server::config::Config;
use koinonia_server::email::{LogMailer, Mailer, SmtpMailer};
use koinonia_server::gateway::PayPalClient;
use koinonia_server::notify::Notifier;
use koinonia_server::routes::create_routes;
use koinonia_server::state::AppState;
use koinonia_server::store::Store;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env());

    let store = Store::open(&config.database_path).expect("Failed to open database");
    tracing::info!(path = %config.database_path, "Database loaded");

    let gateway = Arc::new(PayPalClient::new(
        config.paypal.client_id.clone(),
        config.paypal.client_secret.clone(),
        config.paypal.base_url.clone(),
        config.paypal.webhook_id.clone(),
        config.public_site_url.clone(),
        config.brand_name.clone(),
    ));

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(
            SmtpMailer::new(
                &smtp.host,
                smtp.username.clone(),
                smtp.password.clone(),
                smtp.from.clone(),
            )
            .expect("Failed to build SMTP transport"),
        ),
        None => {
            tracing::warn!("SMTP not configured, emails will be logged only");
            Arc::new(LogMailer)
        }
    };
    let notifier = Arc::new(Notifier::new(
        mailer,
        config.admin_email.clone(),
        config.brand_name.clone(),
    ));

    let state = AppState {
        store: Arc::new(store),
        gateway,
        notifier,
        config: config.clone(),
    };

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
