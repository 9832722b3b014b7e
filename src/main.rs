//! Process entry point, grounded on the teacher's `src/main.rs`:
//! `mimalloc` as the global allocator, startup lifecycle, actix-web
//! server bound to the configured address, graceful shutdown on
//! ctrl-c.

mod adapter;
mod adjuster;
mod app;
mod circuit;
mod currency;
mod exchange;
mod floors;
mod fpd;
mod http;
mod margin;
mod observability;
mod pipeline;
mod privacy;
mod resolver;
mod rtb;
mod store;
mod telemetry;

use actix_web::{web, App as ActixApp, HttpServer};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    let config_path = std::env::var("APP_CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
    let app = Arc::new(app::bootstrap(&config_path)?);

    tracing::info!(bind_addr = %app.config.http.bind_addr, "starting hb-exchange");

    let bind_addr = app.config.http.bind_addr.clone();
    let workers = app.config.http.workers;

    let mut server = HttpServer::new(move || {
        let app = app.clone();
        ActixApp::new().configure(move |cfg| http::configure(cfg, app.clone()))
    })
    .bind(&bind_addr)?;

    if workers > 0 {
        server = server.workers(workers);
    }

    server.run().await?;
    Ok(())
}
