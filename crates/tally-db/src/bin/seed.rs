//! # Seed Data Generator
//!
//! Populates a tenant's catalog with products for development and demos.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products for tenant "demo-shop" (defaults)
//! cargo run -p tally-db --bin seed
//!
//! # Custom amount, tenant, and database
//! cargo run -p tally-db --bin seed -- --count 1000 --tenant shop-42 --db ./data/tally.db
//! ```
//!
//! Each product gets a price between 1.99 and 9.99 plus a size addon, a
//! cost at 60-80% of the price, and an opening stock of 0-100 recorded in
//! the stock ledger.

use chrono::Utc;
use std::env;
use tally_core::Product;
use tally_db::repository::generate_id;
use tally_db::pool::DEFAULT_DB_PATH;
use tally_db::{Database, DbConfig};

/// Product families for realistic test data
const FAMILIES: &[(&str, &[&str])] = &[
    (
        "grocery",
        &[
            "Basmati Rice",
            "Wheat Flour",
            "Sugar",
            "Lentils",
            "Chickpeas",
            "Cooking Oil",
            "Salt",
            "Black Tea",
            "Green Tea",
            "Red Chilli Powder",
        ],
    ),
    (
        "beverage",
        &[
            "Mineral Water",
            "Orange Juice",
            "Mango Juice",
            "Cola",
            "Lemon Soda",
            "Milk",
            "Yogurt Drink",
            "Iced Coffee",
        ],
    ),
    (
        "household",
        &[
            "Dish Soap",
            "Laundry Powder",
            "Bath Soap",
            "Shampoo",
            "Toothpaste",
            "Tissue Box",
            "Floor Cleaner",
            "Matches",
        ],
    ),
];

/// Size variants and their price addon in minor units
const SIZES: &[(&str, &str, i64)] = &[
    ("Small", "pcs", 0),
    ("Medium", "pcs", 100),
    ("Large", "pcs", 200),
    ("1kg", "kg", 150),
    ("5kg", "kg", 600),
    ("500ml", "l", 50),
    ("1L", "l", 120),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut config = DbConfig::from_env()?;
    let mut tenant_id = String::from("demo-shop");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 200)");
                println!(
                    "  -d, --db <PATH>      Database file path (default: $TALLY_DB_PATH or {})",
                    DEFAULT_DB_PATH
                );
                println!("  -t, --tenant <ID>    Tenant to seed (default: demo-shop)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database_path.display());
    println!("Tenant:   {}", tenant_id);
    println!("Products: {}", count);
    println!();

    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count(&tenant_id).await?;
    if existing > 0 {
        println!("⚠ Tenant already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (family_idx, (family, names)) in FAMILIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, size) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let product = generate_product(
                    &tenant_id,
                    family,
                    name,
                    *size,
                    family_idx * 1000 + name_idx * 20 + size_idx,
                );

                if let Err(e) = db.products().insert(&product, "seed").await {
                    eprintln!("Failed to insert {}: {}", product.name, e);
                    continue;
                }

                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    let low = db.products().low_stock(&tenant_id).await?;
    println!("  {} products start at or below their reorder level", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(
    tenant_id: &str,
    family: &str,
    name: &str,
    (size, unit, price_addon): (&str, &str, i64),
    seed: usize,
) -> Product {
    let now = Utc::now();

    // 1.99 - 9.99 plus the size addon
    let selling_price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;

    // 60-80% of price
    let cost_pct = 60 + (seed % 20) as i64;
    let purchase_price_cents = selling_price_cents * cost_pct / 100;

    Product {
        id: generate_id(),
        tenant_id: tenant_id.to_string(),
        name: format!("{} {}", name, size),
        category_id: Some(family.to_string()),
        unit: Some(unit.to_string()),
        purchase_price_cents,
        selling_price_cents,
        current_stock: (seed % 101) as i64,
        min_stock_level: 5,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
