//! Content reads and writes through paths and through inode keys.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crdtfs_kernel::inode::MAX_FILE_SIZE;
use crdtfs_kernel::store::MemoryStore;
use crdtfs_kernel::{CrdtFs, FsConfig, FsError, SetAttr};

async fn fresh() -> CrdtFs {
    CrdtFs::open(Arc::new(MemoryStore::new()), FsConfig::default())
        .await
        .expect("open")
}

#[tokio::test]
async fn docs_scenario() {
    let fs = fresh().await;
    fs.mkdir("/docs").await.unwrap();
    fs.create("/docs/a.txt").await.unwrap();

    let key = fs.lookup("/docs/a.txt").unwrap().unwrap();
    fs.inodes().write_content(&key, 0, b"hi", None).await.unwrap();

    assert_eq!(fs.list_children("/docs").unwrap(), vec!["a.txt"]);
    assert_eq!(fs.inodes().read_content(&key, 0, 2).await.unwrap(), b"hi");
}

#[tokio::test]
async fn rename_preserves_file_content() {
    let fs = fresh().await;
    let content = b"the quick brown fox";
    let before = fs.create("/old").await.unwrap().key;
    fs.write("/old", 0, content).await.unwrap();

    fs.rename("/old", "/new").await.unwrap();

    let key = fs.lookup("/new").unwrap().unwrap();
    assert_eq!(key, before);
    let read = fs
        .inodes()
        .read_content(&key, 0, content.len() as u64)
        .await
        .unwrap();
    assert_eq!(read, content);
    assert_eq!(fs.lookup("/old").unwrap(), None);
}

#[tokio::test]
async fn content_follows_a_directory_rename() {
    let fs = fresh().await;
    fs.mkdir("/a").await.unwrap();
    fs.create("/a/f").await.unwrap();
    fs.write("/a/f", 0, b"nested").await.unwrap();

    fs.rename("/a", "/b").await.unwrap();
    assert_eq!(fs.read("/b/f", 0, 64).await.unwrap(), b"nested");
    assert!(matches!(fs.read("/a/f", 0, 64).await, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn sequential_writes_extend_content() {
    let fs = fresh().await;
    let key = fs.create("/f").await.unwrap().key;
    assert_eq!(fs.write("/f", 0, b"hello").await.unwrap(), 5);
    assert_eq!(fs.write("/f", 5, b"world").await.unwrap(), 5);

    assert_eq!(fs.inodes().read_content(&key, 0, 10).await.unwrap(), b"helloworld");
    assert_eq!(fs.inodes().get_attributes(&key).await.unwrap().size, 10);
    assert_eq!(fs.getattr("/f").await.unwrap().size, 10);
}

#[tokio::test]
async fn reads_clip_at_end_of_content() {
    let fs = fresh().await;
    fs.create("/f").await.unwrap();
    fs.write("/f", 0, b"0123456789").await.unwrap();
    let n = 10;

    assert_eq!(fs.read("/f", n - 2, 10).await.unwrap(), b"89");
    assert!(fs.read("/f", n + 5, 10).await.unwrap().is_empty());
    assert!(fs.read("/f", n, 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn overwrite_in_the_middle_keeps_length() {
    let fs = fresh().await;
    fs.create("/f").await.unwrap();
    fs.write("/f", 0, b"aaaaaa").await.unwrap();
    fs.write("/f", 2, b"BB").await.unwrap();
    assert_eq!(fs.read("/f", 0, 100).await.unwrap(), b"aaBBaa");
    assert_eq!(fs.getattr("/f").await.unwrap().size, 6);
}

#[tokio::test]
async fn truncate_through_paths() {
    let fs = fresh().await;
    fs.create("/f").await.unwrap();
    fs.write("/f", 0, b"abcdef").await.unwrap();

    fs.truncate("/f", 3).await.unwrap();
    assert_eq!(fs.read("/f", 0, 100).await.unwrap(), b"abc");

    let attr = fs.setattr("/f", SetAttr::new().with_size(5)).await.unwrap();
    assert_eq!(attr.size, 5);
    assert_eq!(fs.read("/f", 0, 100).await.unwrap(), b"abc\0\0");

    fs.truncate("/f", 0).await.unwrap();
    assert!(fs.read("/f", 0, 100).await.unwrap().is_empty());
    assert_eq!(fs.getattr("/f").await.unwrap().size, 0);
}

#[tokio::test]
async fn directories_have_no_content() {
    let fs = fresh().await;
    fs.mkdir("/d").await.unwrap();
    assert!(matches!(fs.read("/d", 0, 1).await, Err(FsError::IsADirectory(_))));
    assert!(matches!(fs.write("/d", 0, b"x").await, Err(FsError::IsADirectory(_))));
    assert!(matches!(fs.truncate("/d", 0).await, Err(FsError::IsADirectory(_))));
    assert!(matches!(
        fs.setattr("/d", SetAttr::new().with_size(1)).await,
        Err(FsError::IsADirectory(_))
    ));

    let attr = fs.setattr("/d", SetAttr::new().with_perm(0o700)).await.unwrap();
    assert_eq!(attr.mode, 0o040700);
}

#[tokio::test]
async fn content_of_missing_paths() {
    let fs = fresh().await;
    assert!(matches!(fs.read("/none", 0, 1).await, Err(FsError::NotFound(_))));
    assert!(matches!(fs.write("/none", 0, b"x").await, Err(FsError::NotFound(_))));
    assert!(matches!(fs.getattr("/none").await, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn oversized_writes_and_truncates_are_rejected() {
    let fs = fresh().await;
    fs.create("/f").await.unwrap();
    fs.write("/f", 0, b"abc").await.unwrap();

    assert!(matches!(
        fs.write("/f", u64::MAX - 8, b"x").await,
        Err(FsError::InvalidArgument(_))
    ));
    assert!(matches!(
        fs.write("/f", 1 << 40, b"x").await,
        Err(FsError::InvalidArgument(_))
    ));
    assert!(matches!(
        fs.truncate("/f", u64::MAX / 2 + 10).await,
        Err(FsError::InvalidArgument(_))
    ));
    assert!(matches!(
        fs.setattr("/f", SetAttr::new().with_size(MAX_FILE_SIZE + 1)).await,
        Err(FsError::InvalidArgument(_))
    ));

    assert_eq!(fs.read("/f", 0, 100).await.unwrap(), b"abc");
    assert_eq!(fs.getattr("/f").await.unwrap().size, 3);
}

// ============================================================================
// Timestamps
// ============================================================================

#[tokio::test]
async fn create_stamps_all_three_times() {
    let fs = fresh().await;
    let before = SystemTime::now() - Duration::from_secs(1);
    let created = fs.create("/f").await.unwrap();
    assert!(created.ctime >= before);
    assert_eq!(created.atime, created.ctime);
    assert_eq!(created.mtime, created.ctime);

    let dir = fs.mkdir("/d").await.unwrap();
    assert!(dir.mtime >= before);
}

#[tokio::test]
async fn writes_move_mtime_but_not_atime() {
    let fs = fresh().await;
    fs.create("/f").await.unwrap();
    let old = UNIX_EPOCH + Duration::from_secs(1_000);
    fs.setattr("/f", SetAttr::new().with_atime(old).with_mtime(old))
        .await
        .unwrap();

    fs.write("/f", 0, b"data").await.unwrap();
    let attr = fs.getattr("/f").await.unwrap();
    assert!(attr.mtime > old);
    assert!(attr.ctime >= attr.mtime);
    assert_eq!(attr.atime, old);

    // Reads do not touch the record.
    fs.read("/f", 0, 4).await.unwrap();
    assert_eq!(fs.getattr("/f").await.unwrap().atime, old);
}

#[tokio::test]
async fn setattr_times_survive_a_rename() {
    let fs = fresh().await;
    fs.create("/f").await.unwrap();
    let atime = UNIX_EPOCH + Duration::from_millis(1_234_567);
    let mtime = UNIX_EPOCH + Duration::from_secs(42);
    let set = fs
        .setattr("/f", SetAttr::new().with_atime(atime).with_mtime(mtime))
        .await
        .unwrap();
    assert_eq!(set.atime, atime);
    assert_eq!(set.mtime, mtime);

    fs.rename("/f", "/g").await.unwrap();
    let moved = fs.getattr("/g").await.unwrap();
    assert_eq!(moved, set);
}
