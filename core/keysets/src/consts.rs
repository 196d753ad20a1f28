use crate::hashing::DomainSep;

/// Domain separator for the cache directory digest.
pub const DSEP_CACHE_KEY: DomainSep = *b"KSETCACH";

/// Suffix of the staging directory used while publishing a cache entry.
pub const INCOMPLETE_SUFFIX: &str = "incomplete";

/// Suffix of the advisory lock file that sits next to a cache entry.
pub const LOCK_SUFFIX: &str = "lock";

pub const DEFAULT_CACHE_DIR: &str = "keysets_cache";

// Setting the limit to 4GB because a whole keyset with production parameters
// can weigh several GB
pub const WIRE_BIG_DESER_SIZE_LIMIT: usize = 1024 * 1024 * 1024 * 4;

// Single keys sent between nodes are bounded by this limit
pub const WIRE_SMALL_DESER_SIZE_LIMIT: usize = 1024 * 1024 * 1024 * 2;

/// Smallest polynomial size the Fourier conversion of a bootstrap key supports.
pub const MIN_POLYNOMIAL_SIZE: usize = 4;
