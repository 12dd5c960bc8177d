//! Streaming multi-resolution tile paging for a globe.
//!
//! A [`TileDatabase`] maps quadtree tile addresses to geography and source
//! urls; [`PageStorage`] holds the live page quadtree; [`TilePager`] drives
//! it each tick: walk against the camera, pick the coarse-to-fine render
//! set, stream missing content in the background and prune what the camera
//! has left behind.

pub mod error;
pub mod fetch;
pub mod page;
pub mod page_storage;
pub mod pager;
pub mod tile_database;
pub mod tile_key;

pub use error::{ConfigError, DecodeError, FetchError, LoadError};
pub use fetch::{ContentHandle, Decoder, FetchService, StreamKind};
pub use page::{LoadState, Page, Quadrant, StreamSlot};
pub use page_storage::PageStorage;
pub use pager::{PagerOptions, PagerStats, StreamConfig, TilePager};
pub use tile_database::{TileDatabase, TileDatabaseOptions};
pub use tile_key::TileKey;
