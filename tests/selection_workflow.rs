/// End-to-end catalog workflows: import, select, lock, submit, edit requests.

use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use client_gallery::{EditRequestItem, ErrorKind, GalleryError, Library, SourceItem};

fn drive_item(id: &str) -> SourceItem {
    SourceItem {
        external_id: Some(id.to_string()),
        storage_path: None,
        name: format!("{}.NEF", id),
        mime_type: "image/x-nikon-nef".to_string(),
        size: 24_000_000,
        preview_ref: None,
    }
}

fn listing(ids: &[&str]) -> Vec<SourceItem> {
    ids.iter().map(|id| drive_item(id)).collect()
}

fn setup() -> Library {
    let library = Library::open_in_memory().unwrap();
    library.create_project("LCA-TEST", "wedding").unwrap();
    library.create_folder("LCA-TEST", "Raw 1").unwrap();
    library.create_folder("LCA-TEST", "Raw 2").unwrap();
    library
}

/// Asset ids of one folder keyed by external id
fn ids_by_external(library: &Library, folder: &str) -> HashMap<String, i64> {
    library
        .list_assets("LCA-TEST", Some(folder))
        .unwrap()
        .into_iter()
        .map(|a| (a.external_id.unwrap(), a.id))
        .collect()
}

#[test]
fn import_is_idempotent() {
    let library = setup();
    let first = library.import_assets("LCA-TEST", "Raw 1", listing(&["a", "b", "c"])).unwrap();
    assert_eq!(first.imported_count, 3);

    let ids = ids_by_external(&library, "Raw 1");
    library.set_selection("LCA-TEST", ids["b"], true, "customer").unwrap();
    let before = library.list_assets("LCA-TEST", Some("Raw 1")).unwrap();

    let second = library.import_assets("LCA-TEST", "Raw 1", listing(&["a", "b", "c"])).unwrap();
    assert_eq!(second.imported_count, 0);
    assert_eq!(second.skipped_count, 3);

    let after = library.list_assets("LCA-TEST", Some("Raw 1")).unwrap();
    let selection = |assets: &[client_gallery::Asset]| {
        assets
            .iter()
            .map(|a| (a.id, a.is_selected, a.selected_at))
            .collect::<Vec<_>>()
    };
    assert_eq!(selection(&before), selection(&after));
}

#[test]
fn same_file_in_two_folders_is_independent() {
    let library = setup();
    library.import_assets("LCA-TEST", "Raw 1", listing(&["a"])).unwrap();
    let a1 = ids_by_external(&library, "Raw 1")["a"];
    library.set_selection("LCA-TEST", a1, true, "customer").unwrap();

    let result = library.import_assets("LCA-TEST", "Raw 2", listing(&["a"])).unwrap();
    assert_eq!(result.imported_count, 1);

    let a2 = ids_by_external(&library, "Raw 2")["a"];
    assert_ne!(a1, a2);
    assert!(!library.get_asset("LCA-TEST", a2).unwrap().is_selected);
    assert!(library.get_asset("LCA-TEST", a1).unwrap().is_selected);
}

#[test]
fn lock_rejects_every_toggle() {
    let library = setup();
    library.import_assets("LCA-TEST", "Raw 1", listing(&["a", "b"])).unwrap();
    let ids = ids_by_external(&library, "Raw 1");
    library.set_selection("LCA-TEST", ids["a"], true, "customer").unwrap();
    library.set_lock("LCA-TEST", true).unwrap();

    for (asset, value) in [(ids["a"], false), (ids["b"], true), (ids["a"], true)] {
        let err = library.set_selection("LCA-TEST", asset, value, "customer").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
    assert!(library.get_asset("LCA-TEST", ids["a"]).unwrap().is_selected);
    assert!(!library.get_asset("LCA-TEST", ids["b"]).unwrap().is_selected);
}

#[test]
fn counts_match_ground_truth_after_mixed_operations() {
    let library = setup();
    library.import_assets("LCA-TEST", "Raw 1", listing(&["a", "b", "c", "d"])).unwrap();
    library.import_assets("LCA-TEST", "Raw 2", listing(&["a", "e"])).unwrap();

    let raw1 = ids_by_external(&library, "Raw 1");
    let raw2 = ids_by_external(&library, "Raw 2");
    library.set_selection("LCA-TEST", raw1["a"], true, "customer").unwrap();
    library.set_selection("LCA-TEST", raw1["b"], true, "customer").unwrap();
    library.set_selection("LCA-TEST", raw2["e"], true, "customer").unwrap();
    library.set_selection("LCA-TEST", raw1["b"], false, "customer").unwrap();
    library.import_assets("LCA-TEST", "Raw 1", listing(&["c", "f"])).unwrap();
    library.remove_asset("LCA-TEST", raw1["d"]).unwrap();
    library.delete_folder("LCA-TEST", "Raw 2").unwrap();

    let assets = library.list_assets("LCA-TEST", None).unwrap();
    let expected_raw = assets.len() as i64;
    let expected_selected = assets.iter().filter(|a| a.is_selected).count() as i64;

    let cached = library.get_project("LCA-TEST").unwrap().counts;
    let recounted = library.recount_project("LCA-TEST").unwrap();
    assert_eq!(recounted.raw_total, expected_raw);
    assert_eq!(recounted.selected, expected_selected);
    assert_eq!(cached, recounted);
    assert_eq!((expected_raw, expected_selected), (4, 1));
}

#[test]
fn lock_from_another_connection_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gallery.db");

    let studio = Library::open(&path).unwrap();
    studio.create_project("LCA-TEST", "wedding").unwrap();
    studio.create_folder("LCA-TEST", "Raw 1").unwrap();
    studio.import_assets("LCA-TEST", "Raw 1", listing(&["a"])).unwrap();

    // Separate handle = separate SQLite connection
    let portal = Library::open(&path).unwrap();
    let asset = portal.list_assets("LCA-TEST", Some("Raw 1")).unwrap()[0].id;

    studio.set_lock("LCA-TEST", true).unwrap();
    let err = portal.set_selection("LCA-TEST", asset, true, "customer").unwrap_err();
    assert!(matches!(err, GalleryError::SelectionLocked));

    assert!(!portal.get_asset("LCA-TEST", asset).unwrap().is_selected);
    assert!(!studio.get_asset("LCA-TEST", asset).unwrap().is_selected);
    assert_eq!(studio.get_project("LCA-TEST").unwrap().counts.selected, 0);
}

#[test]
fn versions_are_monotonic_with_correct_diffs() {
    let library = setup();
    library.import_assets("LCA-TEST", "Raw 1", listing(&["A", "B", "C"])).unwrap();
    let ids = ids_by_external(&library, "Raw 1");

    library.set_selection("LCA-TEST", ids["A"], true, "customer").unwrap();
    library.set_selection("LCA-TEST", ids["B"], true, "customer").unwrap();
    let v1 = library.submit_selection("LCA-TEST").unwrap();
    assert_eq!(v1.version, 1);
    let mut picked = vec![ids["A"], ids["B"]];
    picked.sort_unstable();
    assert_eq!(v1.diff.added, picked);
    assert!(v1.diff.removed.is_empty());
    assert_eq!(v1.items.len(), 2);

    library.set_selection("LCA-TEST", ids["B"], false, "customer").unwrap();
    library.set_selection("LCA-TEST", ids["C"], true, "customer").unwrap();
    let v2 = library.submit_selection("LCA-TEST").unwrap();
    assert_eq!(v2.version, 2);
    assert_eq!(v2.diff.added, vec![ids["C"]]);
    assert_eq!(v2.diff.removed, vec![ids["B"]]);

    // Deleting the folder leaves history untouched
    library.delete_folder("LCA-TEST", "Raw 1").unwrap();
    let history = library.list_selection_versions("LCA-TEST").unwrap();
    assert_eq!(history[1], v1);
    assert_eq!(history[0], v2);
}

#[test]
fn edit_requests_drop_invalid_items() {
    let library = setup();
    let item = |file_name: &str, changes: &str| EditRequestItem {
        file_name: file_name.to_string(),
        changes: changes.to_string(),
    };

    let stored = library
        .submit_edit_request("LCA-TEST", &[item("", "fix"), item("IMG_1.JPG", "brighten")])
        .unwrap();
    assert_eq!(stored.items, vec![item("IMG_1.JPG", "brighten")]);

    let err = library.submit_edit_request("LCA-TEST", &[item("", "fix")]).unwrap_err();
    assert!(matches!(err, GalleryError::EmptyRequest));
}

#[test]
fn concurrent_submissions_get_distinct_versions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gallery.db");

    let setup = Library::open(&path).unwrap();
    setup.create_project("LCA-TEST", "wedding").unwrap();
    drop(setup);

    const WRITERS: usize = 4;
    const ROUNDS: usize = 5;
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Separate handle = separate SQLite connection
                let library = Library::open(&path).unwrap();
                barrier.wait();
                (0..ROUNDS)
                    .map(|_| library.submit_selection("LCA-TEST").unwrap().version)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut versions: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    versions.sort_unstable();

    let expected: Vec<i64> = (1..=(WRITERS * ROUNDS) as i64).collect();
    assert_eq!(versions, expected);

    let library = Library::open(&path).unwrap();
    assert_eq!(
        library.get_project("LCA-TEST").unwrap().last_selection_version,
        (WRITERS * ROUNDS) as i64
    );
}
