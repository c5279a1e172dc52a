use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    simple_logger::SimpleLogger::new().env().init().unwrap();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| String::from("127.0.0.1:8080"))
        .parse()
        .expect("Invalid BIND_ADDR");

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    log::info!("Listening on {addr}");
    warp::serve(platebook_sdk::api(pool)).run(addr).await;
}
