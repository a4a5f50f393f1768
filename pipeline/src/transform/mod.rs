//! Transformation stages.
//!
//! - Flatten: baskets to one row per item
//! - Join: inner join with the customer and product masters
//! - Bucket: ISO week key per purchase date
//! - Aggregate: distinct purchase dates per week/customer/product
//! - Pipeline: runs all stages and the writer in order

pub mod aggregate;
pub mod bucket;
pub mod flatten;
pub mod join;
pub mod pipeline;

pub use aggregate::aggregate;
pub use bucket::{bucket, parse_purchase_date, BucketedPurchase};
pub use flatten::{decode_transaction, flatten, flatten_transaction};
pub use join::{join, JoinOutcome, MasterIndex};
pub use pipeline::*;
