pub mod config;
pub mod drag;
pub mod errors;
pub mod filter;
pub mod models;
pub mod mutator;
pub mod session;
pub mod state;
pub mod store;

pub use errors::{BoardError, StoreError};
pub use mutator::{BoardList, MoveOutcome, OptimisticMutator};
pub use session::{BoardContext, Session};
pub use state::LocalBoardState;
pub use store::RecordStore;
