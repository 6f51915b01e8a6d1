//! End-to-end routing over real local backends.

use std::sync::Arc;

use depot::{BackendRegistry, Config, FileSource, StorageRouter};
use tempfile::TempDir;

fn router_for(config_text: &str) -> StorageRouter {
    let registry = Arc::new(BackendRegistry::builtin());
    let config = Config::parse(config_text, &registry).unwrap();
    StorageRouter::new(registry, Arc::new(config))
}

#[tokio::test]
async fn store_local_preserve_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config_text = format!(
        r#"
        [store]
        type = "local"
        dest = "{}"
        base_uri = "http://files.example/"
        name_policy = "preserve"
        structure = ""
        "#,
        dir.path().display()
    );
    let router = router_for(&config_text);

    let file = FileSource::new("note.txt", &b"remember the milk"[..]);
    let uri = router.route_store(&file).await.unwrap();

    assert_eq!(uri, "http://files.example/note.txt");
    let stored = std::fs::read(dir.path().join("note.txt")).unwrap();
    assert_eq!(stored, b"remember the milk");
}

#[tokio::test]
async fn failover_skips_unavailable_backend() {
    let dir = TempDir::new().unwrap();
    let config_text = format!(
        r#"
        [primary]
        type = "local"
        dest = "{missing}"
        base_uri = "http://primary.example/"
        name_policy = "preserve"
        structure = ""
        priority = 0

        [backup]
        type = "local"
        dest = "{present}"
        base_uri = "http://backup.example/"
        name_policy = "preserve"
        structure = ""
        priority = 1
        "#,
        missing = dir.path().join("does-not-exist").display(),
        present = dir.path().display()
    );
    let router = router_for(&config_text);

    let file = FileSource::new("note.txt", &b"x"[..]);
    let uri = router.route_store(&file).await.unwrap();

    assert_eq!(uri, "http://backup.example/note.txt");
    assert!(dir.path().join("note.txt").exists());
}

#[tokio::test]
async fn exhaustion_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config_text = format!(
        r#"
        [a]
        type = "local"
        dest = "{a}"
        base_uri = "http://a.example/"
        name_policy = "preserve"
        structure = ""

        [b]
        type = "local"
        dest = "{b}"
        base_uri = "http://b.example/"
        name_policy = "preserve"
        structure = ""
        "#,
        a = dir.path().join("gone-a").display(),
        b = dir.path().join("gone-b").display()
    );
    let router = router_for(&config_text);

    let file = FileSource::new("note.txt", &b"x"[..]);
    let err = router.route_store(&file).await.unwrap_err();

    assert!(err.is_unavailable());
    // neither destination was created, let alone written to
    assert!(!dir.path().join("gone-a").exists());
    assert!(!dir.path().join("gone-b").exists());
}

#[tokio::test]
async fn equal_priority_backends_share_the_load() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    std::fs::create_dir_all(&a).unwrap();
    std::fs::create_dir_all(&b).unwrap();

    let config_text = format!(
        r#"
        [a]
        type = "local"
        dest = "{a}"
        base_uri = "http://a.example/"
        name_policy = "random"
        structure = ""
        weight = 10

        [b]
        type = "local"
        dest = "{b}"
        base_uri = "http://b.example/"
        name_policy = "random"
        structure = ""
        weight = 10
        "#,
        a = a.display(),
        b = b.display()
    );
    let router = router_for(&config_text);

    let mut hit_a = false;
    let mut hit_b = false;
    for _ in 0..100 {
        let file = FileSource::new("note.txt", &b"x"[..]);
        let uri = router.route_store(&file).await.unwrap();
        if uri.starts_with("http://a.example/") {
            hit_a = true;
        } else {
            hit_b = true;
        }
        if hit_a && hit_b {
            break;
        }
    }
    // equal weights: 100 routes landing on one backend only is ~2^-99
    assert!(hit_a && hit_b);
}
