//! Stress tests: concurrent resolutions against one filesystem store.
//!
//! Many threads decrypting the same reference must converge on a single
//! object; distinct references must not interfere. No temp files may remain.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use age_import::{
    ContentStore, DecryptError, Decryptor, EncryptedReference, FsProbe, FsStore, Hash,
    IdentityConfig, Operation, ResolveSettings, Resolver,
};

const THREADS: usize = 16;

#[derive(Default)]
struct Passthrough {
    calls: AtomicUsize,
}

impl Decryptor for Passthrough {
    fn decrypt(&self, _: &[PathBuf], encrypted: &Path) -> Result<Vec<u8>, DecryptError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        std::fs::read(encrypted).map_err(|source| DecryptError::Spawn {
            program: "cat".to_string(),
            source,
        })
    }
}

fn setup() -> (tempfile::TempDir, FsStore, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsStore::open(dir.path().join("store")).expect("open store");
    let identity = dir.path().join("id");
    std::fs::write(&identity, b"AGE-SECRET-KEY-1STRESS").unwrap();
    (dir, store, identity)
}

fn leftover_temp_files(store: &FsStore) -> Vec<String> {
    std::fs::read_dir(store.store_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".tmp-"))
        .collect()
}

#[test]
fn stress_same_reference_converges() {
    let (dir, store, identity) = setup();
    let secret = dir.path().join("shared.age");
    std::fs::write(&secret, b"one secret for everyone\n").unwrap();
    let dec = Passthrough::default();

    let (store_ref, dec_ref, identity_ref, secret_ref) = (&store, &dec, &identity, &secret);
    let locations: Vec<PathBuf> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(move || {
                    let resolver = Resolver::new(
                        store_ref,
                        dec_ref,
                        &FsProbe,
                        IdentityConfig::with_override(identity_ref),
                        ResolveSettings::impure(),
                    );
                    resolver
                        .resolve(Operation::ReadAge, &EncryptedReference::new(secret_ref))
                        .expect("resolve")
                        .artifact
                        .location
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(locations.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(
        std::fs::read(&locations[0]).unwrap(),
        b"one secret for everyone\n"
    );
    assert_eq!(std::fs::read_dir(store.store_dir()).unwrap().count(), 1);
    assert!(leftover_temp_files(&store).is_empty());
}

#[test]
fn stress_distinct_references_in_parallel() {
    let (dir, store, identity) = setup();
    let secrets: Vec<(PathBuf, Vec<u8>)> = (0..THREADS)
        .map(|i| {
            let path = dir.path().join(format!("secret-{i}.age"));
            let plaintext = format!("secret number {i}\n").into_bytes();
            std::fs::write(&path, &plaintext).unwrap();
            (path, plaintext)
        })
        .collect();
    let dec = Passthrough::default();

    std::thread::scope(|s| {
        for (path, plaintext) in &secrets {
            let store = &store;
            let dec = &dec;
            let identity = &identity;
            s.spawn(move || {
                let resolver = Resolver::new(
                    store,
                    dec,
                    &FsProbe,
                    IdentityConfig::with_override(identity),
                    ResolveSettings::impure(),
                );
                let reference =
                    EncryptedReference::new(path).with_hash(Hash::sha256(plaintext));
                let text = age_import::read_age(&resolver, &reference).unwrap();
                assert_eq!(text.as_bytes(), plaintext.as_slice());
            });
        }
    });

    assert_eq!(dec.calls.load(Ordering::Relaxed), THREADS);
    assert_eq!(std::fs::read_dir(store.store_dir()).unwrap().count(), THREADS);
    assert!(leftover_temp_files(&store).is_empty());
}

#[test]
fn stress_cached_reads_under_contention() {
    let (dir, store, identity) = setup();
    let secret = dir.path().join("config.age");
    std::fs::write(&secret, b"cached\n").unwrap();
    let dec = Passthrough::default();
    let reference = EncryptedReference::new(&secret).with_hash(Hash::sha256(b"cached\n"));

    Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ReadAge, &reference)
    .unwrap();

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let resolver = Resolver::new(
                    &store,
                    &dec,
                    &FsProbe,
                    IdentityConfig::default(),
                    ResolveSettings::pure(),
                );
                for _ in 0..50 {
                    let text = age_import::read_age(&resolver, &reference).unwrap();
                    assert_eq!(text, "cached\n");
                }
            });
        }
    });

    assert_eq!(dec.calls.load(Ordering::Relaxed), 1);
}
