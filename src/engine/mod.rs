pub mod handle;
pub mod memstore;
pub mod redb;

pub use handle::{Locator, StoreHandle};
pub use memstore::MemEngine;
pub use self::redb::RedbEngine;
