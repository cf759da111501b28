//! Mining module for block creation and transaction pooling

pub mod admission;
pub mod mempool;
pub mod miner;

pub use admission::{MempoolAdmissionFilter, ResolvedSpend};
pub use mempool::{Admission, Mempool, MempoolEntry, MempoolError, DEFAULT_MEMPOOL_SIZE, MAX_ANCESTORS};
pub use miner::{Miner, MiningStats};
