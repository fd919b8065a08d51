pub mod cache;
pub mod canonical;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod prune;
pub mod psl;
pub mod reconcile;
pub mod render;
pub mod rule_file;
pub mod sort;

pub use crate::domain::model::{DomainKey, DomainSet, OrderedRules, ReconciliationInput};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
