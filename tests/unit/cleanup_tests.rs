//! Unit tests for the cache-directory guard.

use proxy_harness::cleanup::CacheGuard;

#[test]
fn acquisition_removes_a_stale_directory() {
    let root = tempfile::tempdir().expect("tempdir");
    let cache = root.path().join("proxy-cache");
    std::fs::create_dir_all(cache.join("entries")).expect("stale dir");
    std::fs::write(cache.join("entries").join("stale"), b"old").expect("stale file");

    let guard = CacheGuard::acquire(cache.clone());
    assert!(!cache.exists(), "stale cache must be gone on acquisition");
    drop(guard);
}

#[test]
fn drop_removes_whatever_the_run_wrote() {
    let root = tempfile::tempdir().expect("tempdir");
    let cache = root.path().join("proxy-cache");

    {
        let _guard = CacheGuard::acquire(cache.clone());
        // Simulate the proxy writing cache entries during the run.
        std::fs::create_dir_all(&cache).expect("cache dir");
        std::fs::write(cache.join("entry"), b"cached").expect("cache file");
        assert!(cache.exists());
    }

    assert!(!cache.exists(), "cache must be gone after the guard drops");
}

#[test]
fn missing_directory_is_not_an_error() {
    let root = tempfile::tempdir().expect("tempdir");
    let cache = root.path().join("never-created");
    let guard = CacheGuard::acquire(cache.clone());
    assert_eq!(guard.path(), cache.as_path());
    drop(guard);
    assert!(!cache.exists());
}
