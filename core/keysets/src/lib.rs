//! Generation, caching and runtime access of FHE keysets.
//!
//! A keyset is fully determined by a [KeysetInfo] and a 128-bit seed. It is
//! produced by [generation], persisted by [storage], shared between processes
//! through the content-addressed [cache::KeysetCache] and made available to the
//! evaluation engine by [runtime::RuntimeContext].

pub mod cache;
pub mod conf;
pub mod consts;
pub mod error;
pub mod generation;
pub mod hashing;
pub mod keys;
pub mod runtime;
pub mod storage;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::KeysetCache;
pub use error::{KeysetError, KeysetResult};
pub use generation::{combine_seed, generate, keyset, KeyGenerator};
pub use keys::{ClientKeyset, KeyId, KeyKind, Keyset, KeysetInfo, ServerKeyset};
pub use runtime::{KeyTransport, NodeRole, RootKeyServer, RuntimeContext};
pub use storage::{load_keyset, save_keyset};
pub use wire::Wire;
