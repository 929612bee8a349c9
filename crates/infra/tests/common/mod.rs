//! Shared fixture for engine integration tests.

#![allow(dead_code)]

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use stockbook_core::{Entity, Money, PartyId, ProductId, PurchaseOrderId, TenantId, UserId, WarehouseId};
use stockbook_infra::engine::LineChange;
use stockbook_infra::store::{DocumentTx, Filter, Store, StoreTx};
use stockbook_infra::{AssignPurchaseSerial, Engine, EngineConfig, InMemoryStore, RetryPolicy};
use stockbook_inventory::{BulkLot, SerialUnit};
use stockbook_products::{CreateProduct, Product, StockType};
use stockbook_purchasing::{AddPurchaseLine, CreatePurchaseOrder, PurchaseLine, PurchaseOrder};
use stockbook_sales::{AddSaleLine, CreateSaleOrder, SaleLine, SaleOrder};

pub fn money(amount: Decimal) -> Money {
    Money::new(amount)
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

pub struct Fixture {
    pub engine: Engine<InMemoryStore>,
    pub tenant: TenantId,
    pub user: UserId,
    pub warehouse: WarehouseId,
}

impl Fixture {
    pub fn new() -> Self {
        let config = EngineConfig::default()
            .with_retry(RetryPolicy::fixed(20, Duration::from_millis(1)));
        Self {
            engine: Engine::with_config(InMemoryStore::new(), config),
            tenant: TenantId::new(),
            user: UserId::new(),
            warehouse: WarehouseId::new(),
        }
    }

    pub async fn product(&self, sku: &str, stock_type: StockType) -> Product {
        self.engine
            .create_product(CreateProduct {
                tenant_id: self.tenant,
                product_id: ProductId::new(),
                sku: sku.to_string(),
                name: format!("{sku} name"),
                sale_price: money(Decimal::new(1999, 2)),
                stock_type,
                occurred_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    pub async fn purchase(&self) -> PurchaseOrder {
        self.engine
            .create_purchase_order(CreatePurchaseOrder {
                tenant_id: self.tenant,
                provider_id: PartyId::new(),
                date: date(),
                created_by: self.user,
            })
            .await
            .unwrap()
    }

    pub async fn purchase_line(
        &self,
        order: PurchaseOrderId,
        product: &Product,
        quantity: i64,
        unit_price: Decimal,
        warehouse: WarehouseId,
    ) -> LineChange<PurchaseOrder, PurchaseLine> {
        self.engine
            .add_purchase_line(AddPurchaseLine {
                tenant_id: self.tenant,
                order_id: order,
                product_id: product_id(product),
                quantity,
                unit_price: money(unit_price),
                warehouse_id: Some(warehouse),
            })
            .await
            .unwrap()
    }

    /// Purchase and approve `quantity` bulk units at `warehouse`.
    pub async fn receive_bulk(
        &self,
        product: &Product,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> PurchaseOrder {
        let order = self.purchase().await;
        self.purchase_line(order_id(&order), product, quantity, Decimal::new(500, 2), warehouse)
            .await;
        self.engine
            .approve_purchase_order(self.tenant, order_id(&order))
            .await
            .unwrap()
            .order
    }

    /// Purchase and approve one serialized unit per serial at `warehouse`.
    pub async fn receive_serials(
        &self,
        product: &Product,
        warehouse: WarehouseId,
        serials: &[&str],
    ) -> PurchaseOrder {
        let order = self.purchase().await;
        let line = self
            .purchase_line(
                order_id(&order),
                product,
                serials.len() as i64,
                Decimal::new(10000, 2),
                warehouse,
            )
            .await
            .line;
        for serial in serials {
            self.engine
                .assign_purchase_serial(AssignPurchaseSerial {
                    tenant_id: self.tenant,
                    line_id: line.id(),
                    serial: serial.to_string(),
                    warehouse_id: None,
                })
                .await
                .unwrap();
        }
        self.engine
            .approve_purchase_order(self.tenant, order_id(&order))
            .await
            .unwrap()
            .order
    }

    pub async fn sale(&self) -> SaleOrder {
        self.engine
            .create_sale_order(CreateSaleOrder {
                tenant_id: self.tenant,
                client_id: PartyId::new(),
                date: date(),
                created_by: self.user,
            })
            .await
            .unwrap()
    }

    pub fn sale_line_cmd(
        &self,
        order: &SaleOrder,
        product: &Product,
        quantity: i64,
        unit_price: Decimal,
    ) -> AddSaleLine {
        AddSaleLine {
            tenant_id: self.tenant,
            order_id: order.id(),
            product_id: product_id(product),
            quantity,
            unit_price: money(unit_price),
            warehouse_id: Some(self.warehouse),
        }
    }

    pub async fn sale_line(
        &self,
        order: &SaleOrder,
        product: &Product,
        quantity: i64,
        unit_price: Decimal,
    ) -> SaleLine {
        self.engine
            .add_sale_line(self.sale_line_cmd(order, product, quantity, unit_price))
            .await
            .unwrap()
            .line
    }

    pub async fn stock_of(&self, product: &Product) -> i64 {
        self.engine
            .get_product(self.tenant, product_id(product))
            .await
            .unwrap()
            .stock()
    }

    /// Lots of `product` at `warehouse`, oldest first.
    pub async fn lots(&self, product: &Product, warehouse: WarehouseId) -> Vec<BulkLot> {
        let mut tx = self.engine.store().begin(self.tenant).await.unwrap();
        let mut lots: Vec<BulkLot> = tx
            .find(Filter::all().product(product_id(product)).warehouse(warehouse))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        lots.sort_by_key(|lot| (lot.created_at(), lot.id()));
        lots
    }

    pub async fn serial(&self, serial: &str) -> SerialUnit {
        let mut tx = self.engine.store().begin(self.tenant).await.unwrap();
        let mut units: Vec<SerialUnit> = tx.find(Filter::all().key(serial)).await.unwrap();
        tx.rollback().await.unwrap();
        units.pop().unwrap_or_else(|| panic!("serial {serial} not stored"))
    }

    pub async fn assert_clean(&self) {
        let report = self.engine.audit(self.tenant).await.unwrap();
        assert!(report.is_clean(), "audit findings: {:#?}", report.findings);
    }
}

pub fn product_id(product: &Product) -> ProductId {
    product.id()
}

pub fn order_id(order: &PurchaseOrder) -> PurchaseOrderId {
    order.id()
}
