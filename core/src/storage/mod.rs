pub mod db;
pub mod memory;
mod records;
pub mod state;
pub mod types;

pub use db::RocksDbStore;
pub use memory::MemoryStore;
pub use state::WalletDb;
pub use types::{Alias, Note, TxAction, UserData, UserSigningKey, UserTx};
