// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

// Unified dispatch segment API server: one live view of today's segments,
// kept warm by a background refresh task, and a TTL-cached replay view of
// any past day.

use actix_web::middleware::DefaultHeaders;
use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sorrel::dispatch_db::{MysqlDispatchDb, make_mysql_pool};
use sorrel::live_cache::{
    LiveSegmentCache, REFRESH_FAILURE_BACKOFF, refresh_live_once, run_live_refresh_loop,
};
use sorrel::replay_cache::ReplayCache;
use std::sync::Arc;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
struct ReplayQuery {
    date: Option<String>,
}

#[actix_web::get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({"ok": true}))
}

#[actix_web::get("/api/segments")]
async fn live_segments(live: web::Data<Arc<LiveSegmentCache>>) -> impl Responder {
    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-cache"))
        .json(live.current())
}

#[actix_web::get("/api/replay")]
async fn replay_segments(
    query: web::Query<ReplayQuery>,
    db: web::Data<Arc<MysqlDispatchDb>>,
    replay_cache: web::Data<Arc<ReplayCache>>,
) -> impl Responder {
    let date = query.date.as_deref().map(str::trim).unwrap_or("");
    if date.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "ok": false,
            "error": "missing_date",
            "example": "/api/replay?date=2025-07-29",
        }));
    }

    match replay_cache
        .snapshot_for_date(db.get_ref().as_ref(), date)
        .await
    {
        Ok(snapshot) => HttpResponse::Ok()
            .insert_header(("Cache-Control", "no-cache"))
            .json(snapshot),
        Err(e) => {
            log::error!("replay build failed for {}: {}", date, e);
            HttpResponse::InternalServerError().json(json!({
                "ok": false,
                "error": e.to_string(),
            }))
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let host = env_or("HOST", "0.0.0.0");
    let port: u16 = env_or("PORT", "5055").parse().expect("PORT must be a port number");
    let poll_interval =
        Duration::from_secs(env_or("POLL_INTERVAL", "60").parse().expect("POLL_INTERVAL must be seconds"));
    let replay_ttl =
        Duration::from_secs(env_or("REPLAY_CACHE_TTL", "0").parse().expect("REPLAY_CACHE_TTL must be seconds"));
    let allowed_origins = env_or("ALLOWED_ORIGINS", "*");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = make_mysql_pool(&database_url)
        .await
        .expect("Failed to create pool");

    let db = Arc::new(MysqlDispatchDb::new(pool));
    let live = Arc::new(LiveSegmentCache::new());
    let replay_cache = Arc::new(ReplayCache::new(replay_ttl));

    // Warm the live slot before accepting requests, then hand it to the
    // refresh task. A failed warm-up serves the cold shell until the loop
    // catches up.
    if let Err(e) = refresh_live_once(db.as_ref(), &live).await {
        log::warn!("initial live refresh failed, starting cold: {}", e);
    }
    tokio::spawn(run_live_refresh_loop(
        db.as_ref().clone(),
        Arc::clone(&live),
        poll_interval,
        REFRESH_FAILURE_BACKOFF,
    ));

    println!("Starting mallow segment server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", allowed_origins.clone()))
                    .add(("Access-Control-Allow-Methods", "GET, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "Content-Type")),
            )
            .app_data(web::Data::new(Arc::clone(&db)))
            .app_data(web::Data::new(Arc::clone(&live)))
            .app_data(web::Data::new(Arc::clone(&replay_cache)))
            .service(health)
            .service(live_segments)
            .service(replay_segments)
    })
    .bind((host, port))?
    .run()
    .await
}
