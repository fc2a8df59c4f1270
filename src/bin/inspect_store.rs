use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let database_url = "sqlite://ftui.db";
    let pool = SqlitePoolOptions::new()
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    match args.get(1) {
        None => {
            let rows = sqlx::query("SELECT key, length(value), updated_at FROM store ORDER BY key")
                .fetch_all(&pool)
                .await?;
            if rows.is_empty() {
                println!("Store is empty.");
                return Ok(());
            }
            println!("{:<32} {:>10} {:>16}", "KEY", "BYTES", "UPDATED_AT");
            for row in rows {
                let key: String = row.get(0);
                let bytes: i64 = row.get(1);
                let updated_at: i64 = row.get(2);
                println!("{:<32} {:>10} {:>16}", key, bytes, updated_at);
            }
        }
        Some(key) => {
            let row = sqlx::query("SELECT value, updated_at FROM store WHERE key = ?")
                .bind(key)
                .fetch_optional(&pool)
                .await?;

            if let Some(row) = row {
                let value: String = row.get("value");
                let updated_at: i64 = row.get("updated_at");
                println!("Key: {}", key);
                println!("Updated: {}", updated_at);
                println!(
                    "--------------------------------------------------------------------------------"
                );
                match serde_json::from_str::<serde_json::Value>(&value) {
                    Ok(parsed) => println!("{}", serde_json::to_string_pretty(&parsed)?),
                    Err(_) => println!("{}", value),
                }
            } else {
                println!("No value stored under '{}'", key);
            }
        }
    }

    Ok(())
}
