//! Worker side of a distributed execution.
//!
//! A worker holds no keys at first. The first request for a key takes the
//! context-wide mutex, fetches the key from the root through the transport,
//! converts it and stores it. Later requests, including the ones that waited
//! on the mutex during the fetch, are answered from the stored copy. Stored
//! keys are never replaced or removed.

use super::fourier::FourierBootstrapKey;
use super::transport::KeyTransport;
use super::ContextKeys;
use crate::error::{KeysetError, KeysetResult};
use crate::keys::{BootstrapKey, KeyEntity, KeyId, KeyswitchKey, PackingKeyswitchKey, ServerKeyset};
use crate::wire::deserialize_safe;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Role of a node in a distributed execution.
pub enum NodeRole {
    /// The node owning the whole server keyset.
    Root(ServerKeyset),
    /// A node fetching keys on demand from the root.
    Worker(Box<dyn KeyTransport>),
}

pub(crate) struct WorkerKeys {
    transport: Box<dyn KeyTransport>,
    keys: Mutex<ContextKeys>,
}

impl WorkerKeys {
    pub(crate) fn new(transport: Box<dyn KeyTransport>) -> Self {
        Self {
            transport,
            keys: Mutex::new(ContextKeys::default()),
        }
    }

    // The maps are append-only, so a panic in another holder cannot leave them inconsistent.
    fn lock(&self) -> MutexGuard<'_, ContextKeys> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn bootstrap_key(&self, id: KeyId) -> KeysetResult<Arc<FourierBootstrapKey>> {
        let mut keys = self.lock();
        get_or_fetch(&mut keys.bootstrap, self.transport.as_ref(), id, |bsk: BootstrapKey| {
            FourierBootstrapKey::convert(&bsk)
        })
    }

    pub(crate) fn keyswitch_key(&self, id: KeyId) -> KeysetResult<Arc<KeyswitchKey>> {
        let mut keys = self.lock();
        get_or_fetch(&mut keys.keyswitch, self.transport.as_ref(), id, |ksk: KeyswitchKey| ksk)
    }

    pub(crate) fn packing_keyswitch_key(
        &self,
        id: KeyId,
    ) -> KeysetResult<Arc<PackingKeyswitchKey>> {
        let mut keys = self.lock();
        get_or_fetch(
            &mut keys.packing_keyswitch,
            self.transport.as_ref(),
            id,
            |pksk: PackingKeyswitchKey| pksk,
        )
    }
}

/// Returns the stored entry for `id`, fetching, converting and storing it first if absent.
///
/// The caller holds the mutex guarding `map` for the whole call.
fn get_or_fetch<K, V>(
    map: &mut HashMap<KeyId, Arc<V>>,
    transport: &dyn KeyTransport,
    id: KeyId,
    convert: impl FnOnce(K) -> V,
) -> KeysetResult<Arc<V>>
where
    K: KeyEntity,
{
    match map.entry(id) {
        Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
        Entry::Vacant(entry) => {
            let key = fetch::<K>(transport, id)?;
            let value = Arc::new(convert(key));
            entry.insert(Arc::clone(&value));
            tracing::info!("Fetched {} key {id} from the root", K::KIND);
            Ok(value)
        }
    }
}

fn fetch<K: KeyEntity>(transport: &dyn KeyTransport, id: KeyId) -> KeysetResult<K> {
    let transport_error = |source: anyhow::Error| {
        tracing::error!("Failed to fetch {} key {id}: {source}", K::KIND);
        KeysetError::Transport {
            kind: K::KIND,
            id,
            source,
        }
    };
    let bytes = transport.fetch_key(K::KIND, id).map_err(transport_error)?;
    let key: K = deserialize_safe(&bytes).map_err(|e| transport_error(anyhow::Error::new(e)))?;
    if key.id() != id {
        return Err(transport_error(anyhow::anyhow!(
            "root answered with key {} instead of {id}",
            key.id()
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyKind;
    use crate::runtime::transport::{MockKeyTransport, RootKeyServer};
    use crate::runtime::RuntimeContext;
    use crate::testing::{small_keyset, CountingTransport};
    use crate::wire::Wire;
    use std::sync::Barrier;

    #[test]
    fn root_needs_no_transport() {
        let (_, keyset) = small_keyset();
        let root = RuntimeContext::distributed(NodeRole::Root(keyset.server));
        assert!(!root.is_worker());
        root.fourier_bootstrap_key_buffer(0).unwrap();
        assert_eq!(root.fetched_keys(), 0);
    }

    #[test]
    fn worker_fetches_each_key_once() {
        let (_, keyset) = small_keyset();
        let local = RuntimeContext::new(keyset.server.clone());
        let transport = CountingTransport::new(RootKeyServer::new(keyset.server));
        let calls = transport.calls();
        let worker = RuntimeContext::distributed(NodeRole::Worker(Box::new(transport)));
        assert!(worker.is_worker());
        assert_eq!(worker.fetched_keys(), 0);

        let fetched = worker.fourier_bootstrap_key_buffer(0).unwrap();
        let expected = local.fourier_bootstrap_key_buffer(0).unwrap();
        assert_eq!(&*fetched, &*expected);
        // the FFT plan comes with the bootstrap key
        worker.fft(0).unwrap();
        assert_eq!(calls.get(KeyKind::Bootstrap), 1);

        assert_eq!(
            &*worker.keyswitch_key_buffer(0).unwrap(),
            &*local.keyswitch_key_buffer(0).unwrap()
        );
        assert_eq!(
            &*worker.packing_keyswitch_key_buffer(0).unwrap(),
            &*local.packing_keyswitch_key_buffer(0).unwrap()
        );
        worker.keyswitch_key_buffer(0).unwrap();
        worker.packing_keyswitch_key_buffer(0).unwrap();

        assert_eq!(calls.get(KeyKind::Keyswitch), 1);
        assert_eq!(calls.get(KeyKind::PackingKeyswitch), 1);
        assert_eq!(worker.fetched_keys(), 3);
    }

    #[test]
    fn concurrent_requests_fetch_once() {
        const THREADS: usize = 8;
        let (_, keyset) = small_keyset();
        let transport = CountingTransport::new(RootKeyServer::new(keyset.server));
        let calls = transport.calls();
        let worker = Arc::new(RuntimeContext::distributed(NodeRole::Worker(Box::new(
            transport,
        ))));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let worker = Arc::clone(&worker);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    worker.fourier_bootstrap_key_buffer(0).unwrap().to_vec()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.get(KeyKind::Bootstrap), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));

        worker.fourier_bootstrap_key_buffer(0).unwrap();
        assert_eq!(calls.get(KeyKind::Bootstrap), 1);
    }

    #[test]
    fn transport_failure_is_reported_and_not_cached() {
        let mut transport = MockKeyTransport::new();
        transport
            .expect_fetch_key()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("root unreachable")));
        let worker = RuntimeContext::distributed(NodeRole::Worker(Box::new(transport)));

        for _ in 0..2 {
            match worker.keyswitch_key_buffer(0) {
                Err(KeysetError::Transport { kind, id, source }) => {
                    assert_eq!(kind, KeyKind::Keyswitch);
                    assert_eq!(id, 0);
                    assert!(source.to_string().contains("root unreachable"));
                }
                _ => panic!("expected a transport error"),
            }
        }
        assert_eq!(worker.fetched_keys(), 0);
    }

    #[test]
    fn wrong_key_from_root_is_rejected() {
        let (_, keyset) = small_keyset();
        let answer = keyset.server.keyswitch_keys[0].to_wire().unwrap();
        let mut transport = MockKeyTransport::new();
        transport
            .expect_fetch_key()
            .withf(|kind, id| *kind == KeyKind::Keyswitch && *id == 5)
            .times(1)
            .returning(move |_, _| Ok(answer.clone()));
        let worker = RuntimeContext::distributed(NodeRole::Worker(Box::new(transport)));

        let err = worker.keyswitch_key_buffer(5).err().unwrap();
        assert!(matches!(err, KeysetError::Transport { id: 5, .. }));
        assert!(err.to_string().contains("keyswitch key 5"));
    }

    #[test]
    fn undecodable_answer_is_a_transport_error() {
        let mut transport = MockKeyTransport::new();
        transport
            .expect_fetch_key()
            .returning(|_, _| Ok(vec![1, 2, 3]));
        let worker = RuntimeContext::distributed(NodeRole::Worker(Box::new(transport)));
        assert!(matches!(
            worker.fourier_bootstrap_key_buffer(0),
            Err(KeysetError::Transport {
                kind: KeyKind::Bootstrap,
                ..
            })
        ));
    }
}
