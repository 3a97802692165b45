#![allow(dead_code)]
use chrono::{Duration, Utc};
use sponsor_engine::{
    db_types::{NewWork, NewWorkVersion, Price, Work, WorkVersion},
    events::EventProducers,
    traits::CatalogManagement,
    OrderFlowApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use wxpay_tools::data_objects::{DecryptedTransaction, TransactionAmount};

pub const BUYER: &str = "alice@example.com";

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/sponsor_it_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn prepare_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db
}

pub async fn setup() -> OrderFlowApi<SqliteDatabase> {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> OrderFlowApi<SqliteDatabase> {
    let db = prepare_db().await;
    OrderFlowApi::new(db, producers)
}

pub async fn tear_down(mut api: OrderFlowApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    api.db_mut().close().await;
    let _ = Sqlite::drop_database(&url).await;
}

/// A small catalog covering each pricing path
pub struct Catalog {
    /// 99.00, one figma link, no versions
    pub flat: Work,
    /// Free, with a delivery url
    pub free: Work,
    /// 99.00 at work level, with versions v1 (99.00) and v2 (129.00, the latest)
    pub versioned: Work,
    pub v1: WorkVersion,
    pub v2: WorkVersion,
    /// Has a price but nothing to deliver
    pub empty: Work,
}

pub async fn seed_catalog(db: &SqliteDatabase) -> Catalog {
    let flat = db
        .insert_work(NewWork {
            title: "Flat work".into(),
            price: Some(Price::from_minor_units(9900)),
            figma_url: Some("https://figma.com/file/flat".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let free = db
        .insert_work(NewWork {
            title: "Free work".into(),
            price: Some(Price::from_minor_units(5000)),
            is_free: true,
            delivery_url: Some("https://cdn.example.com/free.zip".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let versioned = db
        .insert_work(NewWork {
            title: "Versioned work".into(),
            price: Some(Price::from_minor_units(9900)),
            figma_url: Some("https://figma.com/file/versioned".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let mut v1 = NewWorkVersion::new(versioned.id, "v1");
    v1.price = Some(Price::from_minor_units(9900));
    v1.created_at = Utc::now() - Duration::days(30);
    let v1 = db.insert_work_version(v1).await.unwrap();
    let mut v2 = NewWorkVersion::new(versioned.id, "v2");
    v2.price = Some(Price::from_minor_units(12900));
    v2.delivery_url = Some("https://cdn.example.com/v2.zip".into());
    let v2 = db.insert_work_version(v2).await.unwrap();
    let empty = db
        .insert_work(NewWork {
            title: "Nothing here".into(),
            price: Some(Price::from_minor_units(100)),
            ..Default::default()
        })
        .await
        .unwrap();
    Catalog { flat, free, versioned, v1, v2, empty }
}

pub fn successful_payment(order_no: &str, total: i64) -> DecryptedTransaction {
    DecryptedTransaction {
        out_trade_no: order_no.to_string(),
        transaction_id: format!("4200{total}"),
        trade_state: "SUCCESS".into(),
        trade_state_desc: None,
        success_time: None,
        amount: Some(TransactionAmount { total, currency: Some("CNY".into()) }),
    }
}
