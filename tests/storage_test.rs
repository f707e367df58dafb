//! File and folder operations end to end, including the local blob store.

mod common;

use tempfile::TempDir;
use url::Url;

use common::{TestEnv, MASTER_KEY};
use strongbox::blob::BlobStore;
use strongbox::crypto::envelope;
use strongbox::db::Tier;
use strongbox::{
    FileService, FolderService, KeyDeriver, LocalBlobStore, PageRequest, ShareService,
    StrongboxError, UploadRequest,
};

fn upload(name: &str, bytes: usize) -> UploadRequest {
    UploadRequest::new(name, "application/octet-stream", vec![7; bytes])
}

#[tokio::test]
async fn test_sibling_folder_names() {
    let env = TestEnv::in_memory().await;
    let user = env.create_user("alice", Tier::Free).await;
    let other = env.create_user("bob", Tier::Free).await;
    let folders = FolderService::new(&env.db, env.blobs.as_ref());

    let reports = folders.create(user, "Reports", None).await.unwrap();
    assert!(matches!(
        folders.create(user, "Reports", None).await,
        Err(StrongboxError::DuplicateName(_))
    ));

    let archive = folders.create(user, "Archive", None).await.unwrap();
    folders
        .create(user, "Reports", Some(archive.id))
        .await
        .unwrap();
    // Names are scoped per owner
    folders.create(other, "Reports", None).await.unwrap();

    assert!(matches!(
        folders.rename(archive.id, user, "Reports").await,
        Err(StrongboxError::DuplicateName(_))
    ));
    assert_eq!(folders.get(reports.id, user).await.unwrap().name, "Reports");
}

/// Deleting a subtree removes every file and releases exactly their bytes.
#[tokio::test]
async fn test_recursive_delete_accounting() {
    let env = TestEnv::in_memory().await;
    let user = env.create_user("alice", Tier::Pro).await;
    let folders = FolderService::new(&env.db, env.blobs.as_ref());
    let files = FileService::new(&env.db, env.blobs.as_ref(), &env.keys);

    let top = folders.create(user, "top", None).await.unwrap();
    let left = folders.create(user, "left", Some(top.id)).await.unwrap();
    let right = folders.create(user, "right", Some(top.id)).await.unwrap();
    let deep = folders.create(user, "deep", Some(left.id)).await.unwrap();

    let mut expected = 0;
    for (i, folder) in [top.id, left.id, right.id, deep.id, deep.id]
        .into_iter()
        .enumerate()
    {
        let size = 100 * (i + 1);
        files
            .upload(user, &upload(&format!("f{i}"), size).in_folder(folder))
            .await
            .unwrap();
        expected += size as u64;
    }
    let kept = files.upload(user, &upload("kept", 4096)).await.unwrap();

    let deletion = folders.delete(top.id, user).await.unwrap();
    assert_eq!(deletion.deleted_files, 5);
    assert_eq!(deletion.freed_bytes, expected);

    assert_eq!(env.usage(user).await, 4096);
    assert_eq!(env.committed_bytes(user).await, 4096);
    assert_eq!(env.blobs.len(), 1);
    for id in [top.id, left.id, right.id, deep.id] {
        assert!(matches!(
            folders.get(id, user).await,
            Err(StrongboxError::NotFound(_))
        ));
    }
    assert_eq!(files.get(kept.id, user).await.unwrap().size, 4096);
}

#[tokio::test]
async fn test_ownership_checks() {
    let env = TestEnv::in_memory().await;
    let alice = env.create_user("alice", Tier::Free).await;
    let bob = env.create_user("bob", Tier::Free).await;
    let folders = FolderService::new(&env.db, env.blobs.as_ref());
    let files = FileService::new(&env.db, env.blobs.as_ref(), &env.keys);

    let folder = folders.create(alice, "private", None).await.unwrap();
    let file = files
        .upload(alice, &upload("secret.bin", 10).in_folder(folder.id))
        .await
        .unwrap();

    assert!(matches!(
        files.download(file.id, bob).await,
        Err(StrongboxError::AccessDenied(_))
    ));
    assert!(matches!(
        files.delete(file.id, bob).await,
        Err(StrongboxError::AccessDenied(_))
    ));
    assert!(matches!(
        folders.delete(folder.id, bob).await,
        Err(StrongboxError::AccessDenied(_))
    ));
    assert!(matches!(
        files.list(bob, Some(folder.id), PageRequest::default()).await,
        Err(StrongboxError::NotFound(_))
    ));

    let listing = files
        .list(alice, Some(folder.id), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.items[0].id, file.id);
}

/// Upload, download and share through the filesystem-backed store.
#[tokio::test]
async fn test_local_blob_store_end_to_end() {
    let env = TestEnv::in_memory().await;
    let user = env.create_user("alice", Tier::Free).await;

    let dir = TempDir::new().unwrap();
    let blobs =
        LocalBlobStore::new(dir.path(), "https://blobs.example.com/objects", "presign").unwrap();
    let files = FileService::new(&env.db, &blobs, &env.keys);

    let plaintext = b"quarterly numbers, do not forward".to_vec();
    let record = files
        .upload(
            user,
            &UploadRequest::new("q3.txt", "text/plain", plaintext.clone()),
        )
        .await
        .unwrap();

    // The object on disk is sealed
    let path = blobs.object_path(&record.object_key).unwrap();
    let on_disk = std::fs::read(&path).unwrap();
    assert!(!on_disk
        .windows(plaintext.len())
        .any(|window| window == plaintext.as_slice()));

    let download = files.download(record.id, user).await.unwrap();
    assert_eq!(download.content, plaintext);
    assert_eq!(download.filename, "q3.txt");
    assert_eq!(download.mime_type, "text/plain");

    // A different master key cannot open the object
    let rotated = KeyDeriver::new([1u8; 32]).unwrap();
    assert!(matches!(
        FileService::new(&env.db, &blobs, &rotated)
            .download(record.id, user)
            .await,
        Err(StrongboxError::DecryptionFailed(_))
    ));

    // Presigned access serves the sealed object
    let shares = ShareService::new(&env.db, &blobs, &env.shares);
    let share = shares.create(record.id, user, 1, Some(1)).await.unwrap();
    let access = shares.resolve(&share.token).await.unwrap();

    let url = Url::parse(&access.url).unwrap();
    assert_eq!(url.host_str(), Some("blobs.example.com"));
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    };
    let expires: i64 = param("expires").parse().unwrap();
    let sealed = blobs
        .read_presigned(&record.object_key, expires, &param("signature"))
        .await
        .unwrap();

    let key = KeyDeriver::new(MASTER_KEY)
        .unwrap()
        .derive_file_key(&record.encryption_salt, record.id)
        .unwrap();
    assert_eq!(envelope::open(&key, &sealed).unwrap(), plaintext);

    files.delete(record.id, user).await.unwrap();
    assert!(!path.exists());
    assert!(matches!(
        blobs.get(&record.object_key, &key).await,
        Err(StrongboxError::NotFound(_)) | Err(StrongboxError::StorageUnavailable(_))
    ));
}
