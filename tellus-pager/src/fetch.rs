use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tellus_jobs::AsyncReturn;

use crate::error::{DecodeError, FetchError};

/// Which content stream a payload belongs to. The pager treats all of them
/// as opaque payloads; the distinction only matters to the decoder and the
/// render traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Imagery,
    Terrain,
    /// Combined geometry/imagery stream used by the single-database setup.
    Geometry,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Imagery => write!(f, "imagery"),
            StreamKind::Terrain => write!(f, "terrain"),
            StreamKind::Geometry => write!(f, "geometry"),
        }
    }
}

/// Opaque decoded payload held by a page and handed to the render traversal.
#[derive(Clone)]
pub struct ContentHandle(Arc<dyn Any + Send + Sync>);

impl ContentHandle {
    pub fn new<T: Any + Send + Sync>(content: T) -> Self {
        Self(Arc::new(content))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentHandle")
    }
}

/// Abstract "fetch bytes for a url" capability. Transport details live
/// outside the core; cancellation happens through the job handle.
pub trait FetchService: Send + Sync + 'static {
    fn fetch(&self, url: String) -> AsyncReturn<Result<Bytes, FetchError>>;
}

/// Turns fetched bytes into displayable content. Formats live outside the
/// core.
pub trait Decoder: Send + Sync + 'static {
    fn decode(&self, bytes: Bytes, kind: StreamKind) -> Result<ContentHandle, DecodeError>;
}
