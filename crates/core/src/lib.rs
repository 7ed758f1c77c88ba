pub mod backend;
pub mod collection;
pub mod error;
pub mod policy;
pub mod record;
pub mod source;
pub mod store;
pub mod sync;

pub use collection::MergedCollection;
pub use error::{CacheError, FetchError, SyncError};
pub use policy::CollectionSpec;
pub use record::{Resource, Watermark};
pub use source::{FetchOutcome, FetchRequest, FetchedPages, PageSource};
pub use store::CacheStore;
pub use sync::Synchronizer;
