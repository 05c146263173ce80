//! End-to-end sandbox behavior over real directories.

use arc_vfs::{CartMount, DiskMount, Error, SandboxLimits, Vfs};

fn sandbox(limits: SandboxLimits) -> (tempfile::TempDir, Vfs) {
    let dir = tempfile::tempdir().unwrap();
    let cart_dir = dir.path().join("cart");
    std::fs::create_dir_all(cart_dir.join("scripts")).unwrap();
    std::fs::write(cart_dir.join("cartridge.toml"), b"id = \"t\"").unwrap();
    std::fs::write(cart_dir.join("scripts/main.rhai"), b"fn init() {}").unwrap();

    let vfs = Vfs::mount(
        CartMount::Dir(DiskMount::open(&cart_dir).unwrap()),
        &dir.path().join("user-data"),
        "com.example.test",
        limits,
    )
    .unwrap();
    (dir, vfs)
}

fn writable() -> SandboxLimits {
    SandboxLimits {
        save_writes_enabled: true,
        ..SandboxLimits::default()
    }
}

#[test]
fn cart_reads_work_and_writes_are_denied() {
    let (_dir, vfs) = sandbox(writable());
    assert_eq!(vfs.read_text("cart:/cartridge.toml").unwrap(), "id = \"t\"");
    assert!(vfs.exists("cart:/scripts/main.rhai").unwrap());

    let err = vfs.write_text("cart:/scripts/main.rhai", "pwned").unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    // No effect on the backing file.
    assert_eq!(vfs.read_text("cart:/scripts/main.rhai").unwrap(), "fn init() {}");
}

#[test]
fn traversal_never_reaches_the_host() {
    let (_dir, vfs) = sandbox(writable());
    let err = vfs.read_text("cart:/../etc/passwd").unwrap_err();
    assert!(matches!(err, Error::InvalidPath { .. }));
    // The message echoes the offending virtual path and nothing host-side.
    let message = err.to_string();
    assert!(message.contains("cart:/../etc/passwd"));
    assert!(!message.contains("tmp"));

    assert!(vfs.write_text("save:/../../other/file", "x").is_err());
    assert!(vfs.list_dir("temp:/..").is_err());
}

#[test]
fn save_permission_gate() {
    let (_dir, vfs) = sandbox(SandboxLimits::default());
    let err = vfs.write_text("save:/slot1.json", "{}").unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    // temp:/ stays writable without the save permission.
    vfs.write_text("temp:/cache.bin", "data").unwrap();
    assert_eq!(vfs.read_text("temp:/cache.bin").unwrap(), "data");
}

#[test]
fn save_roundtrip_listing_and_stat() {
    let (_dir, vfs) = sandbox(writable());
    vfs.write_text("save:/b.json", "{}").unwrap();
    vfs.write_bytes("save:/a.bin", &[1, 2, 3]).unwrap();
    vfs.mkdir("save:/nested").unwrap();
    vfs.write_text("save:/nested/deep.txt", "x").unwrap();

    assert_eq!(vfs.list_dir("save:/").unwrap(), ["a.bin", "b.json", "nested"]);
    let stat = vfs.stat("save:/a.bin").unwrap();
    assert_eq!(stat.size, 3);
    assert_eq!(stat.kind, arc_vfs::FileKind::File);
    assert_eq!(vfs.stat("save:/nested").unwrap().kind, arc_vfs::FileKind::Dir);

    vfs.remove("save:/a.bin").unwrap();
    assert!(!vfs.exists("save:/a.bin").unwrap());
    // Idempotence is not promised for remove; a second call reports NotFound.
    assert!(matches!(vfs.remove("save:/a.bin"), Err(Error::NotFound(_))));
}

#[test]
fn quota_is_enforced_per_namespace() {
    let limits = SandboxLimits {
        save_writes_enabled: true,
        save_bytes: 100,
        temp_bytes: 10,
    };
    let (_dir, vfs) = sandbox(limits);

    vfs.write_bytes("save:/a", &[0; 60]).unwrap();
    let err = vfs.write_bytes("save:/b", &[0; 60]).unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { .. }));

    // Overwriting the same file re-counts it rather than double-counting.
    vfs.write_bytes("save:/a", &[0; 90]).unwrap();

    vfs.write_bytes("temp:/t", &[0; 10]).unwrap();
    assert!(vfs.write_bytes("temp:/u", &[0; 1]).is_err());
}

#[test]
fn clear_temp_wipes_everything() {
    let (_dir, vfs) = sandbox(writable());
    vfs.write_text("temp:/a.txt", "1").unwrap();
    vfs.write_text("temp:/d/b.txt", "2").unwrap();
    vfs.clear_temp().unwrap();
    assert_eq!(vfs.list_dir("temp:/").unwrap(), Vec::<String>::new());
}
