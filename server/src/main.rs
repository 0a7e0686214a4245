use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticketing_server::config::{Config, StorageBackend};
use ticketing_server::payments::{MercadoPagoClient, MockPaymentProvider, PaymentProvider};
use ticketing_server::routes::create_routes;
use ticketing_server::state::AppState;
use ticketing_server::store::{MemoryStore, PgStore, TicketingStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ticketing_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn TicketingStore> = match config.storage {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Successfully connected to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Migrations run successfully");
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let payments: Arc<dyn PaymentProvider> = match &config.mercadopago {
        Some(mp) => Arc::new(MercadoPagoClient::new(mp).expect("Failed to build MercadoPago client")),
        None => {
            tracing::warn!("MERCADOPAGO_ACCESS_TOKEN not set, using the mock payment provider");
            Arc::new(MockPaymentProvider::new(config.public_base_url.clone()))
        }
    };

    let addr = config.bind_addr;
    let app = create_routes(AppState::new(config, store, payments));

    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
