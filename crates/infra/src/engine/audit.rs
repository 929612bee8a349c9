//! Read-only reconciliation audit over one tenant's records.
//!
//! Recomputes every derived counter from the records it is derived from and
//! reports each disagreement as a [`Finding`]. A clean report means:
//!
//! - every order total equals the rounded sum of its line subtotals
//! - every subtotal equals `round(quantity × unit_price, 2)`
//! - `serials_assigned` matches the units actually linked to each line and
//!   never exceeds the line quantity; approved serialized lines are full
//! - lot counters are non-negative and `reserved + sold ≤ quantity`
//! - product stock is non-negative and equals what the lots and serials
//!   say is on hand
//! - every serial hold points at a line that exists

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use stockbook_core::{Entity, LotId, Money, ProductId, TenantId};
use stockbook_inventory::{BulkLot, SerialHold, SerialUnit};
use stockbook_products::Product;
use stockbook_purchasing::{PurchaseLine, PurchaseOrder};
use stockbook_sales::{SaleLine, SaleOrder};
use stockbook_transfers::TransferLine;

use super::{Engine, in_transaction};
use crate::error::EngineError;
use crate::store::{DocumentTx, Filter, Store};

/// One detected inconsistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    OrderTotalDrift {
        order: String,
        recorded: Money,
        expected: Money,
    },
    SubtotalDrift {
        line: String,
        recorded: Money,
        expected: Money,
    },
    SerialCountDrift {
        line: String,
        recorded: i64,
        linked: i64,
    },
    OverAssigned {
        line: String,
        assigned: i64,
        quantity: i64,
    },
    IncompleteApprovedLine {
        line: String,
        assigned: i64,
        quantity: i64,
    },
    LotCounterDrift {
        lot: LotId,
        quantity: i64,
        reserved: i64,
        sold: i64,
    },
    NegativeStock {
        product: String,
        stock: i64,
    },
    StockDrift {
        product: String,
        recorded: i64,
        on_hand: i64,
    },
    DanglingSerialHold {
        serial: String,
        line: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub tenant_id: TenantId,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Everything the audit reads, loaded in one transaction.
struct Snapshot {
    products: Vec<Product>,
    purchase_orders: Vec<PurchaseOrder>,
    purchase_lines: Vec<PurchaseLine>,
    sale_orders: Vec<SaleOrder>,
    sale_lines: Vec<SaleLine>,
    serials: Vec<SerialUnit>,
    lots: Vec<BulkLot>,
    transfer_lines: Vec<TransferLine>,
}

impl<S: Store> Engine<S> {
    /// Check every stored counter of `tenant_id` against its sources.
    #[instrument(skip(self), err)]
    pub async fn audit(&self, tenant_id: TenantId) -> Result<AuditReport, EngineError> {
        let snapshot = in_transaction!(self, tenant_id, |tx| {
            Snapshot {
                products: tx.find(Filter::all()).await?,
                purchase_orders: tx.find(Filter::all()).await?,
                purchase_lines: tx.find(Filter::all()).await?,
                sale_orders: tx.find(Filter::all()).await?,
                sale_lines: tx.find(Filter::all()).await?,
                serials: tx.find(Filter::all()).await?,
                lots: tx.find(Filter::all()).await?,
                transfer_lines: tx.find(Filter::all()).await?,
            }
        })?;
        let findings = snapshot.findings();
        if findings.is_empty() {
            tracing::info!("audit clean");
        } else {
            tracing::warn!(findings = findings.len(), "audit found drift");
        }
        Ok(AuditReport { tenant_id, findings })
    }
}

impl Snapshot {
    fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        self.check_orders(&mut findings);
        self.check_serial_links(&mut findings);
        self.check_lots(&mut findings);
        self.check_stock(&mut findings);
        findings
    }

    fn check_orders(&self, findings: &mut Vec<Finding>) {
        for order in &self.purchase_orders {
            let lines: Vec<&PurchaseLine> = self
                .purchase_lines
                .iter()
                .filter(|line| line.order_id() == order.id())
                .collect();
            let expected = Money::total(lines.iter().map(|line| line.subtotal())).unwrap_or(Money::ZERO);
            if order.total() != expected {
                findings.push(Finding::OrderTotalDrift {
                    order: order.code().to_string(),
                    recorded: order.total(),
                    expected,
                });
            }
            for line in lines {
                check_line(
                    findings,
                    LineFacts {
                        code: line.code(),
                        quantity: line.quantity(),
                        unit_price: line.unit_price(),
                        subtotal: line.subtotal(),
                        assigned: line.serials_assigned(),
                        serialized: line.is_serialized(),
                        approved: order.is_approved(),
                    },
                );
            }
        }

        for order in &self.sale_orders {
            let lines: Vec<&SaleLine> = self
                .sale_lines
                .iter()
                .filter(|line| line.order_id() == order.id())
                .collect();
            let expected = Money::total(lines.iter().map(|line| line.subtotal())).unwrap_or(Money::ZERO);
            if order.total() != expected {
                findings.push(Finding::OrderTotalDrift {
                    order: order.code().to_string(),
                    recorded: order.total(),
                    expected,
                });
            }
            for line in lines {
                check_line(
                    findings,
                    LineFacts {
                        code: line.code(),
                        quantity: line.quantity(),
                        unit_price: line.unit_price(),
                        subtotal: line.subtotal(),
                        assigned: line.serials_assigned(),
                        serialized: line.is_serialized(),
                        approved: order.is_approved(),
                    },
                );
            }
        }
    }

    fn check_serial_links(&self, findings: &mut Vec<Finding>) {
        let mut by_purchase_line: HashMap<Uuid, i64> = HashMap::new();
        let mut by_sale_line: HashMap<Uuid, i64> = HashMap::new();
        let sale_lines: HashSet<Uuid> = self.sale_lines.iter().map(|l| l.id().into()).collect();
        let transfer_lines: HashSet<Uuid> =
            self.transfer_lines.iter().map(|l| l.id().into()).collect();

        for unit in &self.serials {
            *by_purchase_line
                .entry(unit.purchase_line_id().into())
                .or_default() += 1;
            let (line, exists) = match unit.hold() {
                None => continue,
                Some(SerialHold::SaleLine(id)) => {
                    let id = Uuid::from(id);
                    *by_sale_line.entry(id).or_default() += 1;
                    (id, sale_lines.contains(&id))
                }
                Some(SerialHold::TransferLine(id)) => {
                    let id = Uuid::from(id);
                    (id, transfer_lines.contains(&id))
                }
            };
            if !exists {
                findings.push(Finding::DanglingSerialHold {
                    serial: unit.serial().to_string(),
                    line,
                });
            }
        }

        for line in &self.purchase_lines {
            let linked = by_purchase_line
                .get(&Uuid::from(line.id()))
                .copied()
                .unwrap_or(0);
            if linked != line.serials_assigned() {
                findings.push(Finding::SerialCountDrift {
                    line: line.code().to_string(),
                    recorded: line.serials_assigned(),
                    linked,
                });
            }
        }
        for line in &self.sale_lines {
            let linked = by_sale_line.get(&Uuid::from(line.id())).copied().unwrap_or(0);
            if linked != line.serials_assigned() {
                findings.push(Finding::SerialCountDrift {
                    line: line.code().to_string(),
                    recorded: line.serials_assigned(),
                    linked,
                });
            }
        }
    }

    fn check_lots(&self, findings: &mut Vec<Finding>) {
        for lot in &self.lots {
            let broken = lot.quantity() < 0
                || lot.reserved() < 0
                || lot.sold() < 0
                || lot.reserved() + lot.sold() > lot.quantity();
            if broken {
                findings.push(Finding::LotCounterDrift {
                    lot: lot.id(),
                    quantity: lot.quantity(),
                    reserved: lot.reserved(),
                    sold: lot.sold(),
                });
            }
        }
    }

    fn check_stock(&self, findings: &mut Vec<Finding>) {
        let mut on_hand: HashMap<ProductId, i64> = HashMap::new();
        for lot in &self.lots {
            *on_hand.entry(lot.product_id()).or_default() += lot.on_hand();
        }
        for unit in self.serials.iter().filter(|unit| unit.is_on_hand()) {
            *on_hand.entry(unit.product_id()).or_default() += 1;
        }

        for product in &self.products {
            if product.stock() < 0 {
                findings.push(Finding::NegativeStock {
                    product: product.sku().to_string(),
                    stock: product.stock(),
                });
            }
            let ledger = on_hand.get(&product.id()).copied().unwrap_or(0);
            if ledger != product.stock() {
                findings.push(Finding::StockDrift {
                    product: product.sku().to_string(),
                    recorded: product.stock(),
                    on_hand: ledger,
                });
            }
        }
    }
}

/// The parts of a purchase or sale line the audit checks.
struct LineFacts<'a> {
    code: &'a str,
    quantity: i64,
    unit_price: Money,
    subtotal: Money,
    assigned: i64,
    serialized: bool,
    approved: bool,
}

fn check_line(findings: &mut Vec<Finding>, line: LineFacts<'_>) {
    // An unrepresentable product is reported against zero.
    let expected = line.unit_price.times(line.quantity).unwrap_or(Money::ZERO);
    if line.subtotal != expected {
        findings.push(Finding::SubtotalDrift {
            line: line.code.to_string(),
            recorded: line.subtotal,
            expected,
        });
    }
    if line.assigned > line.quantity {
        findings.push(Finding::OverAssigned {
            line: line.code.to_string(),
            assigned: line.assigned,
            quantity: line.quantity,
        });
    }
    if line.approved && line.serialized && line.assigned != line.quantity {
        findings.push(Finding::IncompleteApprovedLine {
            line: line.code.to_string(),
            assigned: line.assigned,
            quantity: line.quantity,
        });
    }
}
