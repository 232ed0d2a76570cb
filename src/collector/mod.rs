mod handlers;
mod processor;

pub use handlers::{cache, collect, method_not_allowed, CacheResponse, PIXEL_GIF};
pub use processor::{
    build_event, exchange, write_event, ClientInfo, CollectParams, Disposition, SkipReason, Visit,
    WRITE_TIMEOUT,
};
