//! # Seed Data Generator
//!
//! Populates a database with a demo tenant for local development.
//!
//! ## Usage
//! ```bash
//! # Demo tenant "demo" with 12 quotations (default)
//! cargo run -p tienda-db --bin seed
//!
//! # Custom tenant, quotation count and database
//! cargo run -p tienda-db --bin seed -- --tenant acme --quotations 40 --db ./data/acme.db
//!
//! # More logging
//! RUST_LOG=debug cargo run -p tienda-db --bin seed
//! ```
//!
//! ## Generated Data
//! - Customers and one branch
//! - Quotations spread over the current month, some approved or rejected
//! - One register taken through open → adjust → close
//!
//! Prints a JSON summary on stdout.

use serde_json::json;
use std::env;
use tienda_core::{
    Money, NewCashRegister, NewQuotation, NewQuotationItem, QuotationStatus, TenantId,
};
use tienda_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CUSTOMERS: &[&str] = &[
    "Ferretería López",
    "Panadería Sol",
    "Abarrotes Don Pepe",
    "Farmacia Central",
    "Papelería Escolar",
];

/// (product id, unit price in cents)
const PRODUCTS: &[(&str, i64)] = &[
    ("CEM-50KG", 21_500),
    ("VAR-3/8", 14_990),
    ("PIN-BLANCA-19L", 189_000),
    ("TORN-1/4-100", 8_550),
    ("CABLE-12-100M", 125_000),
    ("FOCO-LED-9W", 3_900),
    ("MANG-1/2-15M", 27_900),
    ("CINTA-AISL", 1_500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tienda_db=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = DbConfig::from_env()?;
    let mut tenant = String::from("demo");
    let mut count: usize = 12;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" if i + 1 < args.len() => {
                config.database_path = args[i + 1].clone().into();
                i += 1;
            }
            "--tenant" | "-t" if i + 1 < args.len() => {
                tenant = args[i + 1].clone();
                i += 1;
            }
            "--quotations" | "-q" if i + 1 < args.len() => {
                count = args[i + 1].parse().unwrap_or(count);
                i += 1;
            }
            "--help" | "-h" => {
                println!("Tienda Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file (default: $TIENDA_DATABASE_PATH or ./tienda.db)");
                println!("  -t, --tenant <ID>        Tenant id (default: demo)");
                println!("  -q, --quotations <N>     Quotations to create (default: 12)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let tenant = TenantId::new(tenant)?;
    let db = Database::new(config).await?;

    if !db.customers().list(&tenant).await?.is_empty() {
        warn!(tenant = %tenant, "Tenant already has data, skipping seed");
        return Ok(());
    }

    info!(tenant = %tenant, quotations = count, "Seeding demo tenant");

    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for name in CUSTOMERS {
        customer_ids.push(db.customers().create(&tenant, name).await?.id);
    }
    let branch = db.branches().create(&tenant, "Sucursal Centro").await?;

    let mut numbers = Vec::with_capacity(count);
    for n in 0..count {
        let quotation = db
            .quotations()
            .create(&tenant, demo_quotation(&customer_ids[n % customer_ids.len()], n))
            .await?;

        match n % 4 {
            1 => {
                db.quotations()
                    .transition(&tenant, &quotation.id, QuotationStatus::Approved)
                    .await?;
            }
            3 => {
                db.quotations()
                    .transition(&tenant, &quotation.id, QuotationStatus::Rejected)
                    .await?;
            }
            _ => {}
        }
        numbers.push(quotation.document_number);
    }

    let registers = db.cash_registers();
    let register = registers
        .create(
            &tenant,
            NewCashRegister::new("Caja 1")
                .with_branch(&branch.id)
                .with_opening_balance(Money::from_cents(50_000)),
        )
        .await?;
    registers
        .open(&tenant, &register.id, Money::from_cents(50_000))
        .await?;
    for delta in [12_550, 3_900, -2_000, 21_500] {
        registers
            .adjust_balance(&tenant, &register.id, Money::from_cents(delta))
            .await?;
    }
    let register = registers.close(&tenant, &register.id).await?;

    let summary = json!({
        "tenant": tenant,
        "customers": customer_ids.len(),
        "branch": branch.id,
        "quotations": numbers,
        "register": register,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    info!("Seed complete");
    Ok(())
}

/// One to three lines, totals consistent, every third quotation discounted.
fn demo_quotation(customer_id: &str, n: usize) -> NewQuotation {
    let lines = 1 + n % 3;
    let items: Vec<NewQuotationItem> = (0..lines)
        .map(|line| {
            let (product, price) = PRODUCTS[(n * 3 + line) % PRODUCTS.len()];
            NewQuotationItem::new(product, 1 + ((n + line) % 5) as i64, Money::from_cents(price))
        })
        .collect();

    let subtotal: Money = items
        .iter()
        .map(|item| Money::from_cents(item.unit_price.cents() * item.quantity))
        .sum();
    let discount = if n % 3 == 0 {
        Money::from_cents(subtotal.cents() / 10)
    } else {
        Money::zero()
    };

    NewQuotation {
        customer_id: customer_id.to_string(),
        subtotal,
        discount,
        total: subtotal - discount,
        items,
        notes: (n % 2 == 0).then(|| "Precios sujetos a existencia".to_string()),
        expires_at: Some(chrono::Utc::now() + chrono::Duration::days(15)),
    }
}
