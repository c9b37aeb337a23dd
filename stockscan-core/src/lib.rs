pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod scanner;

pub use api::StockApi;
pub use channel::{apply_message, notification_url, ChannelState, NotificationChannel};
pub use config::ScanConfig;
pub use error::{ApiError, ChannelError, ConfigError};
pub use history::{ScanHistory, DEFAULT_CAPACITY, STORAGE_FILE};
pub use models::{
    BarcodeStockIn, NewScan, ScannedItem, StockInEvent, StockInResponse, StockNotification,
};
pub use scanner::{ScanBuffer, ScanKey};
