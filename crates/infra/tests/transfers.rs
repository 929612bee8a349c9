//! Transfers between warehouses: FIFO reservation, completion, release.

mod common;

use rust_decimal_macros::dec;

use common::{Fixture, date, order_id, product_id};
use stockbook_core::{Entity, WarehouseId};
use stockbook_infra::{AssignSaleSerial, ErrorKind};
use stockbook_inventory::{LotAllocation, LotOrigin, LotStatus, SerialHold, SerialStatus};
use stockbook_products::{Product, StockType};
use stockbook_transfers::{AddTransferLine, CreateTransfer, Transfer, TransferStatus, TransferStock};

async fn transfer(fx: &Fixture, destination: WarehouseId) -> Transfer {
    fx.engine
        .create_transfer(CreateTransfer {
            tenant_id: fx.tenant,
            origin_id: fx.warehouse,
            destination_id: destination,
            date: date(),
        })
        .await
        .unwrap()
}

fn line_cmd(fx: &Fixture, transfer: &Transfer, product: &Product, quantity: i64) -> AddTransferLine {
    AddTransferLine {
        tenant_id: fx.tenant,
        transfer_id: transfer.id(),
        product_id: product_id(product),
        quantity,
        serials: Vec::new(),
    }
}

#[tokio::test]
async fn bulk_line_reserves_oldest_lots_first() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    fx.receive_bulk(&bolt, fx.warehouse, 3).await;
    fx.receive_bulk(&bolt, fx.warehouse, 4).await;
    let origin = fx.lots(&bolt, fx.warehouse).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    assert_eq!(tr.code(), "TR-000001");
    let line = fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 5)).await.unwrap();

    let TransferStock::Bulk { allocations, destination_lot } = line.stock() else {
        panic!("expected a bulk line");
    };
    assert_eq!(
        allocations,
        &[
            LotAllocation { lot_id: origin[0].id(), quantity: 3 },
            LotAllocation { lot_id: origin[1].id(), quantity: 2 },
        ]
    );
    let after = fx.lots(&bolt, fx.warehouse).await;
    assert_eq!((after[0].available(), after[1].available()), (0, 2));
    assert_eq!((after[0].reserved(), after[1].reserved()), (3, 2));

    let arriving = fx.lots(&bolt, destination).await;
    assert_eq!(arriving.len(), 1);
    assert_eq!(arriving[0].id(), *destination_lot);
    assert_eq!(arriving[0].status(), LotStatus::Draft);
    assert_eq!(arriving[0].quantity(), 5);

    assert_eq!(fx.stock_of(&bolt).await, 7);
    fx.assert_clean().await;
}

#[tokio::test]
async fn lots_are_drawn_in_creation_order_not_approval_order() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    let first = fx.purchase().await;
    let a = fx
        .purchase_line(order_id(&first), &bolt, 3, dec!(5.00), fx.warehouse)
        .await
        .line;
    let second = fx.purchase().await;
    let b = fx
        .purchase_line(order_id(&second), &bolt, 4, dec!(5.00), fx.warehouse)
        .await
        .line;

    // The newer purchase is received first.
    fx.engine.approve_purchase_order(fx.tenant, order_id(&second)).await.unwrap();
    fx.engine.approve_purchase_order(fx.tenant, order_id(&first)).await.unwrap();

    let origin = fx.lots(&bolt, fx.warehouse).await;
    let lot_of = |line_id| {
        origin
            .iter()
            .find(|lot| lot.origin() == LotOrigin::Purchase(line_id))
            .map(|lot| lot.id())
            .unwrap()
    };
    let (lot_a, lot_b) = (lot_of(a.id()), lot_of(b.id()));

    let tr = transfer(&fx, WarehouseId::new()).await;
    let line = fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 5)).await.unwrap();
    let TransferStock::Bulk { allocations, .. } = line.stock() else {
        panic!("expected a bulk line");
    };
    assert_eq!(
        allocations,
        &[
            LotAllocation { lot_id: lot_a, quantity: 3 },
            LotAllocation { lot_id: lot_b, quantity: 2 },
        ]
    );
    fx.assert_clean().await;
}

#[tokio::test]
async fn completion_moves_units_without_changing_stock() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    fx.receive_bulk(&bolt, fx.warehouse, 3).await;
    fx.receive_bulk(&bolt, fx.warehouse, 4).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 5)).await.unwrap();
    let view = fx.engine.complete_transfer(fx.tenant, tr.id()).await.unwrap();
    assert_eq!(view.transfer.status(), TransferStatus::Completed);
    assert_eq!(view.lines.len(), 1);

    let origin = fx.lots(&bolt, fx.warehouse).await;
    assert_eq!((origin[0].quantity(), origin[0].reserved()), (0, 0));
    assert_eq!((origin[1].quantity(), origin[1].available()), (2, 2));

    let arrived = fx.lots(&bolt, destination).await;
    assert_eq!(arrived[0].status(), LotStatus::Available);
    assert_eq!(arrived[0].available(), 5);
    assert!(arrived[0].receipt_no() > origin[1].receipt_no());
    assert_eq!(fx.stock_of(&bolt).await, 7);
    fx.assert_clean().await;

    // Completed transfers are frozen.
    let err = fx.engine.complete_transfer(fx.tenant, tr.id()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let err = fx.engine.delete_transfer(fx.tenant, tr.id()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[tokio::test]
async fn transferred_units_sell_at_the_destination() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    fx.receive_bulk(&bolt, fx.warehouse, 6).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 4)).await.unwrap();
    fx.engine.complete_transfer(fx.tenant, tr.id()).await.unwrap();

    let order = fx.sale().await;
    let mut cmd = fx.sale_line_cmd(&order, &bolt, 4, dec!(3.00));
    cmd.warehouse_id = Some(destination);
    fx.engine.add_sale_line(cmd).await.unwrap();
    fx.engine.approve_sale_order(fx.tenant, order.id()).await.unwrap();

    assert_eq!(fx.stock_of(&bolt).await, 2);
    assert_eq!(fx.lots(&bolt, destination).await[0].sold(), 4);
    fx.assert_clean().await;
}

#[tokio::test]
async fn bulk_line_beyond_origin_availability_is_refused() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    fx.receive_bulk(&bolt, fx.warehouse, 3).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    let err = fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 4)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(fx.lots(&bolt, fx.warehouse).await[0].reserved(), 0);
    assert!(fx.lots(&bolt, destination).await.is_empty());
    fx.assert_clean().await;
}

#[tokio::test]
async fn serialized_line_reserves_the_named_units() {
    let fx = Fixture::new();
    let phone = fx.product("PHONE", StockType::Serialized).await;
    fx.receive_serials(&phone, fx.warehouse, &["SN-1", "SN-2", "SN-3"]).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    let mut cmd = line_cmd(&fx, &tr, &phone, 2);

    let err = fx.engine.add_transfer_line(cmd.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    cmd.serials = vec!["SN-1".into(), " SN-1".into()];
    let err = fx.engine.add_transfer_line(cmd.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    cmd.serials = vec!["SN-1".into(), "SN-3".into()];
    let line = fx.engine.add_transfer_line(cmd).await.unwrap();
    let sn1 = fx.serial("SN-1").await;
    assert_eq!(sn1.status(), SerialStatus::Reserved);
    assert_eq!(sn1.hold(), Some(SerialHold::TransferLine(line.id())));
    assert_eq!(fx.serial("SN-2").await.status(), SerialStatus::Available);

    // A unit held by the transfer cannot go to a sale.
    let order = fx.sale().await;
    let sale_line = fx.sale_line(&order, &phone, 1, dec!(500.00)).await;
    let err = fx
        .engine
        .assign_sale_serial(AssignSaleSerial {
            tenant_id: fx.tenant,
            line_id: sale_line.id(),
            serial: "SN-1".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    fx.engine.complete_transfer(fx.tenant, tr.id()).await.unwrap();
    let sn1 = fx.serial("SN-1").await;
    assert_eq!(sn1.status(), SerialStatus::Available);
    assert_eq!(sn1.warehouse_id(), destination);
    assert_eq!(sn1.hold(), None);
    assert_eq!(fx.serial("SN-2").await.warehouse_id(), fx.warehouse);
    assert_eq!(fx.stock_of(&phone).await, 3);
    fx.assert_clean().await;
}

#[tokio::test]
async fn serialized_line_checks_origin_stock() {
    let fx = Fixture::new();
    let phone = fx.product("PHONE", StockType::Serialized).await;
    let annex = WarehouseId::new();
    fx.receive_serials(&phone, fx.warehouse, &["SN-1"]).await;
    fx.receive_serials(&phone, annex, &["SN-2"]).await;

    let tr = transfer(&fx, WarehouseId::new()).await;
    let mut cmd = line_cmd(&fx, &tr, &phone, 2);
    cmd.serials = vec!["SN-1".into(), "SN-2".into()];
    let err = fx.engine.add_transfer_line(cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    let mut cmd = line_cmd(&fx, &tr, &phone, 1);
    cmd.serials = vec!["SN-2".into()];
    let err = fx.engine.add_transfer_line(cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fx.serial("SN-2").await.status(), SerialStatus::Available);
    fx.assert_clean().await;
}

#[tokio::test]
async fn deleting_a_draft_transfer_releases_everything() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    let phone = fx.product("PHONE", StockType::Serialized).await;
    fx.receive_bulk(&bolt, fx.warehouse, 4).await;
    fx.receive_serials(&phone, fx.warehouse, &["SN-1"]).await;
    let before = fx.lots(&bolt, fx.warehouse).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 3)).await.unwrap();
    let mut cmd = line_cmd(&fx, &tr, &phone, 1);
    cmd.serials = vec!["SN-1".into()];
    fx.engine.add_transfer_line(cmd).await.unwrap();

    let view = fx.engine.delete_transfer(fx.tenant, tr.id()).await.unwrap();
    assert_eq!(view.lines.len(), 2);
    assert_eq!(fx.lots(&bolt, fx.warehouse).await, before);
    assert!(fx.lots(&bolt, destination).await.is_empty());
    assert_eq!(fx.serial("SN-1").await.status(), SerialStatus::Available);

    let err = fx.engine.get_transfer(fx.tenant, tr.id()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    fx.assert_clean().await;
}

#[tokio::test]
async fn removing_a_line_releases_its_reservation() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    fx.receive_bulk(&bolt, fx.warehouse, 4).await;

    let destination = WarehouseId::new();
    let tr = transfer(&fx, destination).await;
    let line = fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 4)).await.unwrap();
    fx.engine.remove_transfer_line(fx.tenant, line.id()).await.unwrap();

    assert_eq!(fx.lots(&bolt, fx.warehouse).await[0].available(), 4);
    assert!(fx.lots(&bolt, destination).await.is_empty());
    let view = fx.engine.get_transfer(fx.tenant, tr.id()).await.unwrap();
    assert!(view.lines.is_empty());

    let err = fx.engine.complete_transfer(fx.tenant, tr.id()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    fx.assert_clean().await;
}

#[tokio::test]
async fn malformed_transfers_are_rejected() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    fx.receive_bulk(&bolt, fx.warehouse, 5).await;

    let err = fx
        .engine
        .create_transfer(CreateTransfer {
            tenant_id: fx.tenant,
            origin_id: fx.warehouse,
            destination_id: fx.warehouse,
            date: date(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let tr = transfer(&fx, WarehouseId::new()).await;
    let err = fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut cmd = line_cmd(&fx, &tr, &bolt, 1);
    cmd.serials = vec!["B-1".into()];
    let err = fx.engine.add_transfer_line(cmd).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 1)).await.unwrap();
    let err = fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(fx.lots(&bolt, fx.warehouse).await[0].reserved(), 1);
    fx.assert_clean().await;
}

#[tokio::test]
async fn purchase_cannot_be_deleted_once_its_units_moved() {
    let fx = Fixture::new();
    let bolt = fx.product("BOLT", StockType::Bulk).await;
    let purchase = fx.receive_bulk(&bolt, fx.warehouse, 5).await;

    let tr = transfer(&fx, WarehouseId::new()).await;
    fx.engine.add_transfer_line(line_cmd(&fx, &tr, &bolt, 2)).await.unwrap();
    let err = fx
        .engine
        .delete_purchase_order(fx.tenant, order_id(&purchase))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    fx.engine.complete_transfer(fx.tenant, tr.id()).await.unwrap();
    let err = fx
        .engine
        .delete_purchase_order(fx.tenant, order_id(&purchase))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(fx.stock_of(&bolt).await, 5);
    fx.assert_clean().await;
}
