//! Database seeder for Kavera development and testing.
//!
//! Seeds a demo wallet with a funded balance and a payout destination so
//! deposits and withdrawals can be exercised locally.
//!
//! Usage: cargo run --bin seeder

use rust_decimal::Decimal;
use uuid::Uuid;

use kavera_db::WalletRepository;

/// Demo user ID (consistent for all seeds).
const DEMO_USER_ID: &str = "00000000-0000-0000-0000-000000000002";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = kavera_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    let wallets = WalletRepository::new(db);
    let user_id = Uuid::parse_str(DEMO_USER_ID).expect("demo user id is valid");

    println!("Seeding demo wallet...");
    match wallets.find_by_user(user_id).await {
        Ok(Some(_)) => println!("  Demo wallet already exists, skipping..."),
        Ok(None) => {
            let wallet = wallets
                .create(
                    user_id,
                    "UGX",
                    Some("256700000001"),
                    Some("demo@kavera.dev"),
                    Decimal::from(100_000),
                )
                .await
                .expect("Failed to seed wallet");
            println!("  Created wallet {} with balance {}", wallet.id, wallet.balance);
        }
        Err(e) => panic!("Failed to query wallets: {e}"),
    }

    println!("Seeding complete!");
}
