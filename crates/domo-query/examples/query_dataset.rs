// List datasets and query one of them
//
// This example shows:
// 1. Reading client credentials from DOMO_CLIENT_ID / DOMO_SECRET
// 2. Listing every dataset the client can see
// 3. Querying a dataset by id or name, then reusing it
//
// Run with: cargo run --example query_dataset -- <dataset id or name> [sql]

use domo_query::Connection;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("domo_query=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let id_or_name = args.next().unwrap_or_default();
    let sql = args.next().unwrap_or_default();

    let mut conn = Connection::from_env()?;

    println!("=== Datasets ===");
    for ds in conn.list_datasets().await? {
        println!("{:<40} {:<36} {:>10} rows {:>4} cols", ds.name, ds.id, ds.rows, ds.columns);
    }

    if id_or_name.is_empty() {
        return Ok(());
    }

    match conn.resolve(&id_or_name).await? {
        Some(ds) => println!("\nQuerying '{}' ({})", ds.name, ds.id),
        None => return Err(format!("no dataset named or with id '{}'", id_or_name).into()),
    }

    let records = conn.query(&sql, "").await?;
    for record in records.iter().take(10) {
        println!("{}", serde_json::Value::Object(record.clone()));
    }
    println!("({} records)", records.len());

    Ok(())
}
