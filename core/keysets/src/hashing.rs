use crate::consts::DSEP_CACHE_KEY;
use crate::error::{KeysetError, KeysetResult};
use crate::keys::KeysetInfo;
use crate::wire::serialize;
use serde::Serialize;
use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};

/// Domain separator for hashing elements.
/// This is used to ensure that the hash is unique to the context in which it is used.
pub type DomainSep = [u8; DSEP_LEN];
pub const DSEP_LEN: usize = 8;

/// The amount of bytes in a digest
pub const DIGEST_BYTES: usize = 256 / 8;

/// Compute the SHAKE-256 digest of a list of elements where all except AT MOST one MUST be of constant length.
/// WARNING: If more than one of the `elements` are of variable length, the hash will NOT be guaranteed to be unique per list.
pub fn unsafe_hash_list<T>(domain_separator: &DomainSep, elements: &[&T]) -> Vec<u8>
where
    T: ?Sized + AsRef<[u8]>,
{
    let mut hasher = Shake256::default();
    hasher.update(domain_separator);
    for cur_elem in elements {
        hasher.update(cur_elem.as_ref());
    }
    let mut output_reader = hasher.finalize_xof();
    let mut digest = vec![0u8; DIGEST_BYTES];
    output_reader.read(&mut digest);
    digest
}

/// Serialize an element and hash it using SHAKE-256 together with trailing constant length suffixes.
pub fn serialize_hash_element<T>(
    domain_separator: &DomainSep,
    msg: &T,
    suffixes: &[&[u8]],
) -> KeysetResult<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let to_hash = serialize(msg).map_err(|e| {
        KeysetError::Encoding(format!("Could not encode message due to error: {e:?}"))
    })?;
    let mut elements: Vec<&[u8]> = Vec::with_capacity(1 + suffixes.len());
    elements.push(&to_hash);
    elements.extend_from_slice(suffixes);
    Ok(unsafe_hash_list(domain_separator, &elements))
}

/// Name of the cache entry holding the keyset generated from `info` and the two seed halves.
///
/// The seed halves enter the digest as little-endian bytes after the serialized
/// info, so the digest is the same on every platform.
pub fn cache_key(info: &KeysetInfo, seed_msb: u64, seed_lsb: u64) -> KeysetResult<String> {
    let digest = serialize_hash_element(
        &DSEP_CACHE_KEY,
        info,
        &[&seed_msb.to_le_bytes(), &seed_lsb.to_le_bytes()],
    )?;
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::small_keyset_info;
    use proptest::prelude::*;

    const DSEP_TEST: DomainSep = *b"test_1__";
    const DSEP_TEST2: DomainSep = *b"test_2__";

    #[test]
    fn negative_hash() {
        let digest = unsafe_hash_list(&DSEP_TEST, &["test"]);
        let digest_other_domain = unsafe_hash_list(&DSEP_TEST2, &["test"]);
        let digest_other_val = unsafe_hash_list(&DSEP_TEST, &["test2"]);
        assert_ne!(digest, digest_other_domain);
        assert_ne!(digest, digest_other_val);
        assert_eq!(digest.len(), DIGEST_BYTES);
    }

    #[test]
    fn cache_key_is_hex_digest() {
        let key = cache_key(&small_keyset_info(), 0, 42).unwrap();
        assert_eq!(key.len(), 2 * DIGEST_BYTES);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_key_depends_on_info() {
        let info = small_keyset_info();
        let mut other = info.clone();
        other.keyswitch_keys[0].params.base_log += 1;
        assert_ne!(
            cache_key(&info, 0, 42).unwrap(),
            cache_key(&other, 0, 42).unwrap()
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn cache_key_is_deterministic(msb in any::<u64>(), lsb in any::<u64>()) {
            let info = small_keyset_info();
            prop_assert_eq!(cache_key(&info, msb, lsb).unwrap(), cache_key(&info.clone(), msb, lsb).unwrap());
        }

        #[test]
        fn seed_halves_are_not_interchangeable(msb in any::<u64>(), lsb in any::<u64>()) {
            prop_assume!(msb != lsb);
            let info = small_keyset_info();
            prop_assert_ne!(cache_key(&info, msb, lsb).unwrap(), cache_key(&info, lsb, msb).unwrap());
        }
    }
}
