//! Export a store, wipe it, import into a fresh one.

use std::sync::Arc;

use fader_archive::{Archive, APP_NAME};
use fader_store::{BucketManager, DbManager, FileManager, RedbStore};
use fader_types::{Bucket, DataUsed, File, ImportPolicy};

fn store() -> Arc<dyn DbManager> {
    Arc::new(RedbStore::in_memory().unwrap())
}

const LAYOUT: &[(&str, &[&str])] = &[("bucket1", &["file1-1", "file1-2"]), ("bucket2", &["file2-1"])];

fn raw_for(file: &str) -> Vec<u8> {
    format!("raw bytes of {file}").into_bytes()
}

#[test]
fn whole_store_survives_export_and_import() {
    let source = store();
    for (bucket_name, files) in LAYOUT {
        let mut bucket = Bucket::new(*bucket_name);
        source.create_bucket(&mut bucket).unwrap();
        for name in *files {
            let mut file = File::new(bucket.id, *name);
            file.raw_data = raw_for(name);
            source.create_file(&mut file).unwrap();
        }
    }

    let data = Archive::new(Arc::clone(&source), ImportPolicy::Strict)
        .export("0.1.0", "tester", "round trip")
        .unwrap();
    drop(source);

    let target = store();
    let archive = Archive::new(Arc::clone(&target), ImportPolicy::Strict);
    let report = archive.import_with_report(&data).unwrap();
    assert_eq!(report.buckets_applied, 2);
    assert_eq!(report.files_applied, 3);
    assert_eq!(report.skipped, 0);

    let info = report.info.unwrap();
    assert_eq!(info.app_name, APP_NAME);
    assert_eq!(info.version, "0.1.0");
    assert_eq!(info.author, "tester");
    assert_eq!(info.description, "round trip");

    for (bucket_name, files) in LAYOUT {
        let bucket = target
            .find_bucket_by_name(bucket_name, DataUsed::PRIMARY_IDS)
            .unwrap();
        for name in *files {
            let file = target
                .find_file_by_name(&bucket.id, name, DataUsed::FULL_FILE)
                .unwrap();
            assert_eq!(file.raw_data, raw_for(name));
        }
    }
}

#[test]
fn ids_are_preserved() {
    let source = store();
    let mut bucket = Bucket::new("b");
    source.create_bucket(&mut bucket).unwrap();
    let mut file = File::new(bucket.id, "f");
    source.create_file(&mut file).unwrap();

    let data = Archive::new(source, ImportPolicy::Strict)
        .export("1", "a", "")
        .unwrap();
    let target = store();
    Archive::new(Arc::clone(&target), ImportPolicy::Strict)
        .import(&data)
        .unwrap();

    assert_eq!(target.find_bucket(&bucket.id, DataUsed::PRIMARY_NAMES).unwrap().name, "b");
    assert_eq!(target.find_file(&file.id, DataUsed::PRIMARY_NAMES).unwrap().name, "f");
}
