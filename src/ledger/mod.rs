//! Transaction ledger - storage collaborator and the materializer handler

mod category;
mod materializer;
mod store;

pub use category::Category;
pub use materializer::{ADD_TO_DATABASE, ExtractedTransaction, TransactionMaterializer};
pub use store::{
    DbConn, DbPool, PersistedTransaction, SCHEMA_VERSION, TransactionRepo, User, UserRepo, init,
    init_memory,
};
