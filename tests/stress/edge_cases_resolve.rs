//! Edge-case tests: identity precedence, substitution, repair, odd names
//! and large payloads.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use age_import::output::{import_age, read_age, DocumentEvaluator};
use age_import::{
    CandidateState, ContentStore, DecryptError, Decryptor, EncryptedReference, ErrorKind,
    FileProbe, FsProbe, FsStore, Hash, IdentityConfig, IngestionMethod, Operation, Origin,
    ResolveSettings, Resolver,
};

/// Reads the encrypted file verbatim and remembers the identities it got.
#[derive(Default)]
struct Recording {
    identities: Mutex<Vec<Vec<PathBuf>>>,
}

impl Recording {
    fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.identities.lock().unwrap().clone()
    }
}

impl Decryptor for Recording {
    fn decrypt(&self, identities: &[PathBuf], encrypted: &Path) -> Result<Vec<u8>, DecryptError> {
        self.identities.lock().unwrap().push(identities.to_vec());
        std::fs::read(encrypted).map_err(|source| DecryptError::Spawn {
            program: "cat".to_string(),
            source,
        })
    }
}

/// Delegates to the real filesystem, logging every probed path.
#[derive(Default)]
struct LoggingProbe {
    seen: RefCell<Vec<PathBuf>>,
}

impl FileProbe for LoggingProbe {
    fn state(&self, path: &Path) -> CandidateState {
        self.seen.borrow_mut().push(path.to_path_buf());
        FsProbe.state(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.seen.borrow_mut().push(path.to_path_buf());
        FsProbe.exists(path)
    }
}

struct ByteLen;

impl DocumentEvaluator for ByteLen {
    type Output = usize;

    fn evaluate(&self, _: &Path, bytes: &[u8]) -> Result<usize, String> {
        Ok(bytes.len())
    }
}

fn write(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

// ── Identity discovery ───────────────────────────────────────────────────────

#[test]
fn edge_override_shadows_home_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    write(&home.join(".ssh/id_ed25519"), b"key");
    let override_file = dir.path().join("agenix.key");
    write(&override_file, b"key");
    let secret = dir.path().join("s.age");
    write(&secret, b"v");

    let store = FsStore::open(dir.path().join("store")).unwrap();
    let dec = Recording::default();
    let probe = LoggingProbe::default();
    let config = IdentityConfig {
        override_file: Some(override_file.clone()),
        home: Some(home.clone()),
    };
    Resolver::new(&store, &dec, &probe, config, ResolveSettings::impure())
        .resolve(Operation::ReadAge, &EncryptedReference::new(&secret))
        .unwrap();

    assert_eq!(dec.calls(), vec![vec![override_file]]);
    assert!(
        !probe.seen.borrow().iter().any(|p| p.starts_with(&home)),
        "home defaults must not be probed: {:?}",
        probe.seen.borrow()
    );
}

#[test]
fn edge_missing_override_does_not_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    write(&home.join(".ssh/id_ed25519"), b"key");
    let secret = dir.path().join("s.age");
    write(&secret, b"v");

    let store = FsStore::open(dir.path().join("store")).unwrap();
    let dec = Recording::default();
    let config = IdentityConfig {
        override_file: Some(dir.path().join("nope.key")),
        home: Some(home),
    };
    let err = Resolver::new(&store, &dec, &FsProbe, config, ResolveSettings::impure())
        .resolve(Operation::ReadAge, &EncryptedReference::new(&secret))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Identity);
    assert!(err.to_string().contains("nope.key (not found)"));
    assert!(dec.calls().is_empty());
}

#[test]
fn edge_home_defaults_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    write(&home.join(".ssh/id_rsa"), b"rsa");
    write(&home.join(".ssh/id_ed25519"), b"ed");
    let secret = dir.path().join("s.age");
    write(&secret, b"v");

    let store = FsStore::open(dir.path().join("store")).unwrap();
    let dec = Recording::default();
    Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_home(&home),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ReadAge, &EncryptedReference::new(&secret))
    .unwrap();

    assert_eq!(
        dec.calls(),
        vec![vec![home.join(".ssh/id_ed25519"), home.join(".ssh/id_rsa")]]
    );
}

#[test]
fn edge_only_rsa_present() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home");
    write(&home.join(".ssh/id_rsa"), b"rsa");
    let secret = dir.path().join("s.age");
    write(&secret, b"v");

    let store = FsStore::open(dir.path().join("store")).unwrap();
    let dec = Recording::default();
    Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_home(&home),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ReadAge, &EncryptedReference::new(&secret))
    .unwrap();

    assert_eq!(dec.calls(), vec![vec![home.join(".ssh/id_rsa")]]);
}

// ── Substitution ─────────────────────────────────────────────────────────────

#[test]
fn edge_substituter_satisfies_pure_lookup_without_identity() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let hash = Hash::sha256(b"from the binary cache\n");

    let store = FsStore::open(dir.path().join("store"))
        .unwrap()
        .with_substituter(&cache);
    let path = store
        .compute_path("creds", &hash, IngestionMethod::Flat)
        .unwrap();
    write(&cache.join(path.to_string()), b"from the binary cache\n");

    let dec = Recording::default();
    let resolver = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::default(),
        ResolveSettings::pure(),
    );
    // The encrypted file itself does not exist on this machine.
    let reference = EncryptedReference::new(dir.path().join("creds.age")).with_hash(hash);
    let res = resolver.resolve(Operation::ReadAge, &reference).unwrap();

    assert_eq!(res.origin, Origin::Cached);
    assert!(dec.calls().is_empty());
    assert_eq!(
        std::fs::read(&res.artifact.location).unwrap(),
        b"from the binary cache\n"
    );
}

#[test]
fn edge_tampered_substitute_is_not_admitted() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let hash = Hash::sha256(b"genuine\n");

    let store = FsStore::open(dir.path().join("store"))
        .unwrap()
        .with_substituter(&cache);
    let path = store
        .compute_path("creds", &hash, IngestionMethod::Flat)
        .unwrap();
    write(&cache.join(path.to_string()), b"tampered\n");

    let dec = Recording::default();
    let err = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::default(),
        ResolveSettings::pure(),
    )
    .resolve(
        Operation::ReadAge,
        &EncryptedReference::new(dir.path().join("creds.age")).with_hash(hash),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Identity);
    assert!(!store.location(&path).exists());
}

// ── Repair ───────────────────────────────────────────────────────────────────

#[allow(clippy::permissions_set_readonly_false)]
fn corrupt(location: &Path) {
    let mut perms = std::fs::metadata(location).unwrap().permissions();
    perms.set_readonly(false);
    std::fs::set_permissions(location, perms).unwrap();
    std::fs::write(location, b"bit rot").unwrap();
}

#[test]
fn edge_repair_rewrites_damaged_object() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let identity = dir.path().join("id");
    write(&identity, b"key");
    let secret = dir.path().join("cfg.age");
    write(&secret, b"intact\n");
    let dec = Recording::default();
    let reference = EncryptedReference::new(&secret);

    let first = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ReadAge, &reference)
    .unwrap();
    corrupt(&first.artifact.location);

    // Without repair the existing object is kept as is.
    Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ReadAge, &reference)
    .unwrap();
    assert_eq!(std::fs::read(&first.artifact.location).unwrap(), b"bit rot");

    let repaired = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure().with_repair(true),
    )
    .resolve(Operation::ReadAge, &reference)
    .unwrap();
    assert_eq!(repaired.artifact.location, first.artifact.location);
    assert_eq!(std::fs::read(&repaired.artifact.location).unwrap(), b"intact\n");
}

// ── Names and payloads ───────────────────────────────────────────────────────

#[test]
fn edge_bare_suffix_is_rejected_as_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let identity = dir.path().join("id");
    write(&identity, b"key");
    let secret = dir.path().join(".age");
    write(&secret, b"v");
    let dec = Recording::default();

    let err = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ReadAge, &EncryptedReference::new(&secret))
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(dec.calls().is_empty());
}

#[test]
fn edge_name_keeps_inner_extension() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let identity = dir.path().join("id");
    write(&identity, b"key");
    let secret = dir.path().join("secrets").join("wifi.env.age");
    write(&secret, b"SSID=home\n");
    let dec = Recording::default();

    let res = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    )
    .resolve(Operation::ImportAge, &EncryptedReference::new(&secret))
    .unwrap();

    assert_eq!(res.artifact.store_path.name(), "wifi.env");
    assert!(res.artifact.location.to_string_lossy().ends_with("-wifi.env"));
}

#[test]
fn edge_large_binary_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let identity = dir.path().join("id");
    write(&identity, b"key");

    // 4 MiB of every byte value, NUL included.
    let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let secret = dir.path().join("blob.bin.age");
    write(&secret, &payload);
    let dec = Recording::default();
    let resolver = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    );
    let reference = EncryptedReference::new(&secret).with_hash(Hash::sha256(&payload));

    assert_eq!(import_age(&resolver, &reference, &ByteLen).unwrap(), payload.len());
    assert_eq!(
        read_age(&resolver, &reference).unwrap_err().kind(),
        ErrorKind::Representation
    );
    assert_eq!(dec.calls().len(), 1);
}

#[test]
fn edge_empty_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path().join("store")).unwrap();
    let identity = dir.path().join("id");
    write(&identity, b"key");
    let secret = dir.path().join("empty.age");
    write(&secret, b"");
    let dec = Recording::default();

    let resolver = Resolver::new(
        &store,
        &dec,
        &FsProbe,
        IdentityConfig::with_override(&identity),
        ResolveSettings::impure(),
    );
    let res = resolver
        .resolve(Operation::ReadAge, &EncryptedReference::new(&secret))
        .unwrap();

    assert_eq!(
        res.artifact.content_hash.to_nix32(),
        "0mdqa9w1p6cmli6976v4wi0sw9r4p5prkj7lzfd1877wk11c9c73"
    );
    assert_eq!(read_age(&resolver, &EncryptedReference::new(&secret)).unwrap(), "");
}
