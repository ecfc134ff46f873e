//! Ledger behaviour against an on-disk database shared by several pooled
//! connections.
//! Run: cargo test -p tienda-db --test ledger_test

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use tempfile::TempDir;
use tienda_core::{Money, NewCashRegister, NewQuotation, NewQuotationItem, TenantId};
use tienda_db::{Database, DbConfig, DbError};

async fn open_db(dir: &TempDir) -> Database {
    let config = DbConfig::new(dir.path().join("ledger.db"))
        .max_connections(8)
        .busy_timeout(Duration::from_secs(30));
    Database::new(config).await.unwrap()
}

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn march() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()
}

fn simple_quotation(customer_id: &str) -> NewQuotation {
    NewQuotation {
        customer_id: customer_id.to_string(),
        subtotal: Money::from_cents(2000),
        discount: Money::zero(),
        total: Money::from_cents(2000),
        items: vec![NewQuotationItem::new("p-1", 2, Money::from_cents(1000))],
        notes: None,
        expires_at: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_get_dense_distinct_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let acme = tenant("acme");
    let customer = db.customers().create(&acme, "Ana").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let db = db.clone();
        let acme = acme.clone();
        let customer_id = customer.id.clone();
        handles.push(tokio::spawn(async move {
            db.quotations()
                .create_at(&acme, simple_quotation(&customer_id), march())
                .await
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap().document_number);
    }
    numbers.sort();

    let expected: Vec<String> = (1..=20).map(|n| format!("COT-202503-{n:04}")).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tenants_number_independently() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let a = tenant("tienda-a");
    let b = tenant("tienda-b");
    let ca = db.customers().create(&a, "Cliente A").await.unwrap();
    let cb = db.customers().create(&b, "Cliente B").await.unwrap();
    let repo = db.quotations();

    let first = repo.create_at(&a, simple_quotation(&ca.id), march()).await.unwrap();
    let second = repo.create_at(&a, simple_quotation(&ca.id), march()).await.unwrap();
    let other = repo.create_at(&b, simple_quotation(&cb.id), march()).await.unwrap();

    assert_eq!(first.document_number, "COT-202503-0001");
    assert_eq!(second.document_number, "COT-202503-0002");
    assert_eq!(other.document_number, "COT-202503-0001");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn numbering_survives_restart_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let acme = tenant("acme");

    let deleted_number = {
        let db = open_db(&dir).await;
        let customer = db.customers().create(&acme, "Ana").await.unwrap();
        db.quotations()
            .create_at(&acme, simple_quotation(&customer.id), march())
            .await
            .unwrap();
        let last = db
            .quotations()
            .create_at(&acme, simple_quotation(&customer.id), march())
            .await
            .unwrap();
        db.quotations().delete(&acme, &last.id).await.unwrap();
        db.close().await;
        last.document_number
    };

    let db = open_db(&dir).await;
    let customer = db.customers().list(&acme).await.unwrap().remove(0);
    let next = db
        .quotations()
        .create_at(&acme, simple_quotation(&customer.id), march())
        .await
        .unwrap();

    assert_eq!(deleted_number, "COT-202503-0002");
    assert_eq!(next.document_number, "COT-202503-0003");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn adjustments_commute_in_any_order() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let acme = tenant("acme");
    let repo = db.cash_registers();

    let orders: [[i64; 3]; 6] = [
        [5_000, -2_000, 500],
        [5_000, 500, -2_000],
        [-2_000, 5_000, 500],
        [-2_000, 500, 5_000],
        [500, 5_000, -2_000],
        [500, -2_000, 5_000],
    ];

    for (i, order) in orders.iter().enumerate() {
        let r = repo
            .create(&acme, NewCashRegister::new(format!("Caja {i}")))
            .await
            .unwrap();
        repo.open(&acme, &r.id, Money::from_cents(10_000)).await.unwrap();
        for delta in order {
            repo.adjust_balance(&acme, &r.id, Money::from_cents(*delta))
                .await
                .unwrap();
        }
        let r = repo.get(&acme, &r.id).await.unwrap();
        assert_eq!(r.current_balance(), Money::from_cents(13_500));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adjustments_lose_no_updates() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let acme = tenant("acme");
    let r = db
        .cash_registers()
        .create(&acme, NewCashRegister::new("Caja 1"))
        .await
        .unwrap();
    db.cash_registers()
        .open(&acme, &r.id, Money::from_cents(10_000))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..30 {
        let db = db.clone();
        let acme = acme.clone();
        let id = r.id.clone();
        let delta = [5_000, -2_000, 500][i % 3];
        handles.push(tokio::spawn(async move {
            db.cash_registers()
                .adjust_balance(&acme, &id, Money::from_cents(delta))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let r = db.cash_registers().get(&acme, &r.id).await.unwrap();
    assert_eq!(r.current_balance(), Money::from_cents(10_000 + 10 * 3_500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opens_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let acme = tenant("acme");
    let r = db
        .cash_registers()
        .create(&acme, NewCashRegister::new("Caja 1"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for amount in 1..=8 {
        let db = db.clone();
        let acme = acme.clone();
        let id = r.id.clone();
        handles.push(tokio::spawn(async move {
            db.cash_registers()
                .open(&acme, &id, Money::from_cents(amount * 100))
                .await
        }));
    }

    let mut opened = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(register) => opened.push(register),
            Err(DbError::Conflict { reason, .. }) => {
                assert_eq!(reason, "la caja ya está abierta");
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(opened.len(), 1);
    assert_eq!(conflicts, 7);

    let stored = db.cash_registers().get(&acme, &r.id).await.unwrap();
    assert_eq!(stored, opened[0]);
}
