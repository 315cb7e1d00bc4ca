pub mod asset;
pub mod book;
pub mod intent;

pub use asset::{is_remote_url, AssetCategory, AssetSlot, RemoteAssetRef, StagedAsset};
pub use book::{Book, BookChanges, BookResponse, CreatedBookResponse, NewBook};
pub use intent::{AssetIntent, IntentOperation, IntentState};
