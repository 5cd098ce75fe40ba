#![warn(warnings)]
#![deny(clippy::all)]

pub mod column;
pub mod config;
pub mod error;
pub mod field;
pub mod gateway;
pub mod record;
pub mod sync;
pub mod view;
pub mod writeback;

#[cfg(feature = "python")]
mod python;

pub use column::{ColumnDef, ColumnOption};
pub use config::SyncConfig;
pub use error::SyncError;
pub use field::{FieldType, FieldValue};
pub use gateway::{GatewayResponse, MemoryGateway, RemoteGateway};
pub use record::{RecordValue, RowData};
pub use sync::{EditingCell, SyncOrchestrator, TableState};
pub use view::{FilterOp, SortDirection, SortKey, ViewParams};
pub use writeback::{PropertyUpdate, UpdatePayload};
