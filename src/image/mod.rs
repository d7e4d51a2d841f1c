//! Image Module
//!
//! Resolution of image names to image records, plus the stores the resolver
//! reads from.

pub mod inventory;
pub mod kube_store;
pub mod memory;
pub mod resolver;

pub use kube_store::{ImageCache, KubeImageStore};
pub use inventory::{load_inventory, parse_inventory, ImageObject};
pub use memory::{MemoryImageStore, StoreStatsSnapshot};
pub use resolver::{select_display_name_match, ImageResolver};
