//! Inter-warehouse transfers.
//!
//! A transfer moves bulk units (FIFO-drawn from origin lots into a new
//! destination lot) or explicitly reserved serial units from one warehouse to
//! another. Nothing here touches storage.

pub mod line;
pub mod transfer;

pub use line::{AddTransferLine, NewTransferLine, TransferLine, TransferStock, ensure_positive};
pub use transfer::{CreateTransfer, Transfer, TransferEvent, TransferStatus};
