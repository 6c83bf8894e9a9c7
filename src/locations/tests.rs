use super::*;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write");
    path
}

#[tokio::test]
async fn ingests_csv_rows() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(
        &temp_dir,
        "map.csv",
        "name,details,lat,lon\n\
         Main Library, Three floors ,12.9716,77.5946\n\
         Gym,,12.9720,77.5950\n",
    );

    let store = LocationStore::new();
    let report = store.ingest_files(&[file]).await.expect("ingest");

    assert_eq!(
        report,
        LocationIngestReport {
            files_uploaded: 1,
            locations_added: 2,
            rows_skipped: 0
        }
    );

    let locations = store.snapshot().await;
    assert_eq!(locations[0].name, "Main Library");
    assert_eq!(locations[0].details, "Three floors");
    assert!((locations[0].lat - 12.9716).abs() < 1e-9);
    assert_eq!(locations[1].details, "");
}

#[tokio::test]
async fn duplicate_names_are_ignored_case_insensitively() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = write(&temp_dir, "a.csv", "name,lat,lon\nCanteen,1.0,2.0\n");
    let second = write(
        &temp_dir,
        "b.csv",
        "name,lat,lon\nCANTEEN,3.0,4.0\nAuditorium,5.0,6.0\nauditorium,7.0,8.0\n",
    );

    let store = LocationStore::new();
    store.ingest_files(&[first.clone()]).await.expect("ingest");

    let report = store.ingest_files(&[first]).await.expect("ingest again");
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.locations_added, 0);

    let report = store.ingest_files(&[second]).await.expect("ingest");
    assert_eq!(report.locations_added, 1);

    let names: Vec<String> = store
        .snapshot()
        .await
        .into_iter()
        .map(|location| location.name)
        .collect();
    assert_eq!(names, vec!["Canteen", "Auditorium"]);
    assert!((store.snapshot().await[0].lat - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn invalid_rows_are_skipped() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(
        &temp_dir,
        "bad.csv",
        "name,details,lat,lon\n\
         Hostel,Boys hostel,north,77.1\n\
         ,Nameless,1.0,2.0\n\
         Clinic,First aid\n\
         Admin Block,Offices,10.5,20.25\n",
    );

    let store = LocationStore::new();
    let report = store.ingest_files(&[file]).await.expect("ingest");

    assert_eq!(report.locations_added, 1);
    assert_eq!(report.rows_skipped, 3);
    assert_eq!(store.snapshot().await[0].name, "Admin Block");
}

#[tokio::test]
async fn non_csv_files_count_but_are_not_parsed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let notes = write(&temp_dir, "notes.txt", "name,lat,lon\nGym,1,2\n");

    let store = LocationStore::new();
    let report = store.ingest_files(&[notes]).await.expect("ingest");

    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.locations_added, 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn load_folder_reads_saved_file_and_reset() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(&temp_dir, LOCATIONS_FILE, "name,details,lat,lon\nLibrary,,1,2\nGym,Indoor courts,3,4\n");
    write(&temp_dir, "stray.csv", "name,lat,lon\nCanteen,5,6\n");

    let store = LocationStore::new();
    let report = store.load_folder(temp_dir.path()).await.expect("load");
    assert_eq!(report.locations_added, 2);
    assert_eq!(store.len().await, 2);

    store.reset().await;
    assert!(store.is_empty().await);

    let missing = store
        .load_folder(&temp_dir.path().join("absent"))
        .await
        .expect("missing folder");
    assert_eq!(missing, LocationIngestReport::default());
}

#[tokio::test]
async fn rejected_duplicates_never_replace_saved_entries() {
    let uploads = TempDir::new().expect("Failed to create temp dir");
    let saved = TempDir::new().expect("Failed to create temp dir");
    let first = write(&uploads, "b_first.csv", "name,details,lat,lon\nLibrary,Original entry,1,2\n");
    let second = write(
        &uploads,
        "a_second.csv",
        "name,details,lat,lon\nlibrary,Later duplicate,9,9\nGym,\"Courts, pool\",3,4\n",
    );

    let store = LocationStore::new();
    store.ingest_files(&[first]).await.expect("ingest");
    store.save(saved.path()).await.expect("save");

    let reopened = LocationStore::new();
    reopened.load_folder(saved.path()).await.expect("load");
    let report = reopened.ingest_files(&[second]).await.expect("ingest");
    assert_eq!(report.locations_added, 1);
    reopened.save(saved.path()).await.expect("save");

    let reloaded = LocationStore::new();
    reloaded.load_folder(saved.path()).await.expect("reload");
    assert_eq!(
        reloaded.snapshot().await,
        vec![
            Location {
                name: "Library".to_string(),
                details: "Original entry".to_string(),
                lat: 1.0,
                lon: 2.0,
            },
            Location {
                name: "Gym".to_string(),
                details: "Courts, pool".to_string(),
                lat: 3.0,
                lon: 4.0,
            },
        ]
    );

    let files: Vec<_> = fs::read_dir(saved.path())
        .expect("read dir")
        .filter_map(|entry| entry.ok().map(|entry| entry.file_name()))
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from(LOCATIONS_FILE)]);
}

#[test]
fn locations_serialize_for_clients() {
    let location = Location {
        name: "Gym".to_string(),
        details: "Open 6 AM".to_string(),
        lat: 1.5,
        lon: 2.5,
    };

    assert_eq!(
        serde_json::to_value(&location).expect("serialize"),
        serde_json::json!({ "name": "Gym", "details": "Open 6 AM", "lat": 1.5, "lon": 2.5 })
    );
}
