//! Storage bindings for the domain types.

use stockbook_inventory::{BulkLot, LotOrigin, SerialHold, SerialUnit};
use stockbook_products::Product;
use stockbook_purchasing::{PurchaseLine, PurchaseOrder};
use stockbook_sales::{SaleLine, SaleOrder};
use stockbook_transfers::{Transfer, TransferLine};
use uuid::Uuid;

use crate::store::{Collection, DocIndex, Document};

impl Document for Product {
    const COLLECTION: Collection = Collection::Products;
    const LABEL: &'static str = "product";

    fn index(&self) -> DocIndex {
        DocIndex::default()
    }
}

impl Document for PurchaseOrder {
    const COLLECTION: Collection = Collection::PurchaseOrders;
    const LABEL: &'static str = "purchase order";

    fn index(&self) -> DocIndex {
        DocIndex::default()
    }
}

impl Document for PurchaseLine {
    const COLLECTION: Collection = Collection::PurchaseLines;
    const LABEL: &'static str = "purchase line";

    fn index(&self) -> DocIndex {
        DocIndex {
            parent: Some(self.order_id().into()),
            product: Some(self.product_id().into()),
            warehouse: self.warehouse_id().map(Into::into),
            ..DocIndex::default()
        }
    }
}

impl Document for SaleOrder {
    const COLLECTION: Collection = Collection::SaleOrders;
    const LABEL: &'static str = "sale order";

    fn index(&self) -> DocIndex {
        DocIndex::default()
    }
}

impl Document for SaleLine {
    const COLLECTION: Collection = Collection::SaleLines;
    const LABEL: &'static str = "sale line";

    fn index(&self) -> DocIndex {
        DocIndex {
            parent: Some(self.order_id().into()),
            product: Some(self.product_id().into()),
            warehouse: self.warehouse_id().map(Into::into),
            ..DocIndex::default()
        }
    }
}

/// Serials are found by purchase line (`parent`), holding line (`link`),
/// stock position and serial string (`key`).
impl Document for SerialUnit {
    const COLLECTION: Collection = Collection::SerialUnits;
    const LABEL: &'static str = "serial";

    fn index(&self) -> DocIndex {
        let link: Option<Uuid> = self.hold().map(|hold| match hold {
            SerialHold::SaleLine(id) => id.into(),
            SerialHold::TransferLine(id) => id.into(),
        });
        DocIndex {
            parent: Some(self.purchase_line_id().into()),
            link,
            product: Some(self.product_id().into()),
            warehouse: Some(self.warehouse_id().into()),
            key: Some(self.serial().to_string()),
        }
    }
}

impl Document for BulkLot {
    const COLLECTION: Collection = Collection::BulkLots;
    const LABEL: &'static str = "lot";

    fn index(&self) -> DocIndex {
        DocIndex {
            parent: Some(origin_line(self.origin())),
            product: Some(self.product_id().into()),
            warehouse: Some(self.warehouse_id().into()),
            ..DocIndex::default()
        }
    }
}

impl Document for Transfer {
    const COLLECTION: Collection = Collection::Transfers;
    const LABEL: &'static str = "transfer";

    fn index(&self) -> DocIndex {
        DocIndex::default()
    }
}

impl Document for TransferLine {
    const COLLECTION: Collection = Collection::TransferLines;
    const LABEL: &'static str = "transfer line";

    fn index(&self) -> DocIndex {
        DocIndex {
            parent: Some(self.transfer_id().into()),
            product: Some(self.product_id().into()),
            ..DocIndex::default()
        }
    }
}

/// Id of the line a lot hangs off.
fn origin_line(origin: LotOrigin) -> Uuid {
    match origin {
        LotOrigin::Purchase(id) => id.into(),
        LotOrigin::Transfer(id) => id.into(),
    }
}
