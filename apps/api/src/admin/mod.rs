//! Administrative endpoints. Mounted behind the admin guard and the cache
//! invalidation middleware; every mutation here flushes the response cache.

pub mod handlers;
