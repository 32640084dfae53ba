//! Adaptive caching and request coalescing for the upstream API.
//!
//! Layered leaves-first: [`key`] derives request identity, [`ttl`] decides
//! entry lifetime from payload content, [`store`] persists entries across
//! processes, [`dedup`] collapses concurrent identical fetches in-process,
//! and [`client`] composes them into the fetch path the rest of the
//! application consumes. [`form`] is the stale-while-revalidate variant for
//! per-team fixture history.

pub mod client;
pub mod dedup;
pub mod form;
pub mod key;
pub mod store;
pub mod ttl;

pub use client::CachedClient;
pub use form::TeamFormCache;
pub use store::CacheStore;
