pub mod client;
pub mod report_repo;
pub mod review_repo;

pub use client::MongoClient;
pub use report_repo::ReportRepository;
pub use review_repo::ReviewRepository;

use crate::error::StoreError;

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}
