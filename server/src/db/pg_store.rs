// marketplace_server/src/db/pg_store.rs

//! `MarketStore` over Postgres.
//!
//! Every write is one statement on one row. Guarded updates put their
//! expectations in the `WHERE` clause, so a row that moved on since the
//! caller read it is left untouched and reported as a conflict.
//!
//! Change events are published from this process after each successful
//! write. Writers in other processes are not observed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplace::order::model::ProductId;
use marketplace::{
  CatalogEntry, ChangeKind, CommissionRate, MarketStore, NewOrderRow, Notifier, Order, OrderEvent, OrderFilter, OrderId,
  OrderItem, OrderPatch, OrderQuery, StoreError, StoreResult, Subscription, SubscriptionPlan, TransactionId, UserId,
};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, order_number, buyer_id, seller_id, items, total_amount, commission_rate_bps, \
   commission_amount, vendor_payout, customer_name, phone, city, district, landmark, tracking_number, \
   payment_method, transaction_id, payout_status, status, verified_by, logistician_id, created_at, delivered_at, \
   reception_confirmed_at, updated_at";

fn backend(err: sqlx::Error) -> StoreError {
  StoreError::Backend(err.to_string())
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> StoreError {
  StoreError::Backend(format!("unreadable '{}' column: {}", column, detail))
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRecord {
  id: Uuid,
  order_number: i64,
  buyer_id: Option<Uuid>,
  seller_id: Option<Uuid>,
  items: Json<Vec<OrderItem>>,
  total_amount: i64,
  commission_rate_bps: i32,
  commission_amount: i64,
  vendor_payout: i64,
  customer_name: Option<String>,
  phone: Option<String>,
  city: String,
  district: String,
  landmark: Option<String>,
  tracking_number: Option<String>,
  payment_method: String,
  transaction_id: Option<String>,
  payout_status: String,
  status: String,
  verified_by: Option<String>,
  logistician_id: Option<Uuid>,
  created_at: DateTime<Utc>,
  delivered_at: Option<DateTime<Utc>>,
  reception_confirmed_at: Option<DateTime<Utc>>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for Order {
  type Error = StoreError;

  fn try_from(r: OrderRecord) -> Result<Self, Self::Error> {
    let bps = u32::try_from(r.commission_rate_bps).map_err(|e| corrupt("commission_rate_bps", e))?;
    let transaction_id = r
      .transaction_id
      .as_deref()
      .map(TransactionId::parse)
      .transpose()
      .map_err(|e| corrupt("transaction_id", e))?;
    Ok(Order {
      id: r.id,
      order_number: r.order_number,
      buyer_id: r.buyer_id,
      seller_id: r.seller_id,
      items: r.items.0,
      total_amount: r.total_amount,
      commission_rate: CommissionRate::from_basis_points(bps),
      commission_amount: r.commission_amount,
      vendor_payout: r.vendor_payout,
      customer_name: r.customer_name,
      phone: r.phone,
      city: r.city,
      district: r.district,
      landmark: r.landmark,
      tracking_number: r.tracking_number,
      payment_method: r.payment_method.parse().map_err(|e| corrupt("payment_method", e))?,
      transaction_id,
      payout_status: r.payout_status.parse().map_err(|e| corrupt("payout_status", e))?,
      status: r.status.parse().map_err(|e| corrupt("status", e))?,
      verified_by: r.verified_by,
      logistician_id: r.logistician_id,
      created_at: r.created_at,
      delivered_at: r.delivered_at,
      reception_confirmed_at: r.reception_confirmed_at,
      updated_at: r.updated_at,
    })
  }
}

pub struct PgStore {
  pool: PgPool,
  notifier: Notifier,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    PgStore {
      pool,
      notifier: Notifier::new(),
    }
  }

  async fn fetch(&self, id: OrderId) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let record = sqlx::query_as::<_, OrderRecord>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    record.map(Order::try_from).transpose()
  }
}

#[async_trait]
impl MarketStore for PgStore {
  #[instrument(name = "PgStore::insert_order", skip_all, err(Display))]
  async fn insert_order(&self, row: NewOrderRow) -> StoreResult<Order> {
    let id = Uuid::new_v4();
    let bps = i32::try_from(row.commission_rate.basis_points()).map_err(|e| corrupt("commission_rate_bps", e))?;
    let (order_number,): (i64,) = sqlx::query_as(
      r#"
      INSERT INTO orders
          (id, buyer_id, seller_id, items, total_amount, commission_rate_bps, commission_amount, vendor_payout,
           customer_name, phone, city, district, landmark, payment_method, transaction_id,
           payout_status, status, created_at, updated_at)
      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 'pending', 'pending', $16, $16)
      RETURNING order_number
      "#,
    )
    .bind(id)
    .bind(row.buyer_id)
    .bind(row.seller_id)
    .bind(Json(&row.items))
    .bind(row.total_amount)
    .bind(bps)
    .bind(row.commission_amount)
    .bind(row.vendor_payout)
    .bind(&row.customer_name)
    .bind(&row.phone)
    .bind(&row.city)
    .bind(&row.district)
    .bind(&row.landmark)
    .bind(row.payment_method.as_str())
    .bind(row.transaction_id.as_ref().map(|t| t.as_str().to_string()))
    .bind(row.created_at)
    .fetch_one(&self.pool)
    .await
    .map_err(backend)?;

    let order = row.into_order(id, order_number);
    self.notifier.publish(OrderEvent {
      kind: ChangeKind::Insert,
      order: order.clone(),
    });
    Ok(order)
  }

  async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
    self.fetch(id).await
  }

  #[instrument(name = "PgStore::update_order", skip(self, patch), fields(order_id = %id), err(Display))]
  async fn update_order(&self, id: OrderId, patch: OrderPatch) -> StoreResult<Order> {
    let sql = format!(
      r#"
      UPDATE orders SET
          status                 = COALESCE($2, status),
          payout_status          = COALESCE($3, payout_status),
          tracking_number        = COALESCE($4, tracking_number),
          verified_by            = COALESCE($5, verified_by),
          logistician_id         = COALESCE($6, logistician_id),
          delivered_at           = COALESCE(delivered_at, $7),
          reception_confirmed_at = COALESCE(reception_confirmed_at, $8),
          updated_at             = $9
      WHERE id = $1
        AND ($10::text IS NULL OR status = $10)
        AND ($11::text IS NULL OR payout_status = $11)
      RETURNING {}
      "#,
      ORDER_COLUMNS
    );
    let record = sqlx::query_as::<_, OrderRecord>(&sql)
      .bind(id)
      .bind(patch.status.map(|s| s.as_str()))
      .bind(patch.payout_status.map(|s| s.as_str()))
      .bind(&patch.tracking_number)
      .bind(&patch.verified_by)
      .bind(patch.logistician_id)
      .bind(patch.delivered_at)
      .bind(patch.reception_confirmed_at)
      .bind(patch.updated_at)
      .bind(patch.expect_status.map(|s| s.as_str()))
      .bind(patch.expect_payout_status.map(|s| s.as_str()))
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;

    let order = match record {
      Some(record) => Order::try_from(record)?,
      None => {
        // Either the row is gone or a guard failed; tell which.
        let current = self.fetch(id).await?.ok_or(StoreError::NotFound(id))?;
        patch.check(&current)?;
        return Err(StoreError::Conflict {
          order_id: id,
          detail: "row changed between read and update".to_string(),
        });
      }
    };
    self.notifier.publish(OrderEvent {
      kind: ChangeKind::Update,
      order: order.clone(),
    });
    Ok(order)
  }

  async fn list_orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>> {
    let sql = format!(
      r#"
      SELECT {} FROM orders
      WHERE ($1::text IS NULL OR status = $1)
        AND ($2::text IS NULL OR payout_status = $2)
        AND ($3::uuid IS NULL
             OR seller_id = $3
             OR items @> jsonb_build_array(jsonb_build_object('seller_id', $3::text)))
        AND ($4::uuid IS NULL OR buyer_id = $4)
      ORDER BY order_number ASC
      "#,
      ORDER_COLUMNS
    );
    let records = sqlx::query_as::<_, OrderRecord>(&sql)
      .bind(query.status.map(|s| s.as_str()))
      .bind(query.payout_status.map(|s| s.as_str()))
      .bind(query.seller_id)
      .bind(query.buyer_id)
      .fetch_all(&self.pool)
      .await
      .map_err(backend)?;
    records.into_iter().map(Order::try_from).collect()
  }

  async fn seller_plan(&self, seller_id: UserId) -> StoreResult<Option<SubscriptionPlan>> {
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT subscription_plan FROM profiles WHERE id = $1")
      .bind(seller_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(backend)?;
    Ok(row.map(|(plan,)| SubscriptionPlan::from_profile(plan.as_deref())))
  }

  async fn catalog_entry(&self, product_id: ProductId) -> StoreResult<Option<CatalogEntry>> {
    let row: Option<(Uuid, i64, bool)> =
      sqlx::query_as("SELECT seller_id, price, stock_quantity IS NOT NULL FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
    Ok(row.map(|(seller_id, unit_price, tracks_stock)| CatalogEntry {
      seller_id,
      unit_price,
      tracks_stock,
    }))
  }

  async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> StoreResult<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
      r#"
      UPDATE products
      SET    stock_quantity = GREATEST(stock_quantity - $2, 0)
      WHERE  id = $1 AND stock_quantity IS NOT NULL
      RETURNING stock_quantity
      "#,
    )
    .bind(product_id)
    .bind(i64::from(quantity))
    .fetch_optional(&self.pool)
    .await
    .map_err(backend)?;
    debug!(%product_id, quantity, remaining = ?row.map(|(q,)| q), "Stock row updated.");
    Ok(row.map(|(q,)| q))
  }

  fn subscribe(&self, filter: OrderFilter) -> Subscription {
    self.notifier.subscribe(filter)
  }
}
