//! Queue ordering, renames, and permission resolution through the pipeline.

mod helpers;

use treevault_core::error::ErrorKind;
use treevault_core::types::Permission;
use treevault_entity::resource::AccessGroups;
use treevault_worker::ResourceChanges;

use helpers::{ADMINS, TestApp};

#[tokio::test]
async fn test_tasks_on_one_store_run_in_submission_order() {
    let app = TestApp::new().await;
    let pipeline = &app.pipeline;
    let root = app.at("/");

    let add_a = pipeline
        .add_directory(&app.admin, root.clone(), "a", None, AccessGroups::inherit())
        .await
        .unwrap();
    let add_b = pipeline
        .add_directory(&app.admin, root, "b", None, AccessGroups::inherit())
        .await
        .unwrap();
    // "/a" does not exist yet when this is submitted.
    let remove_a = pipeline.remove_directory(&app.admin, app.at("/a")).await.unwrap();

    assert_eq!(remove_a.wait().await.unwrap(), 1);
    add_a.wait().await.unwrap();
    add_b.wait().await.unwrap();

    assert_eq!(app.child_names("/").await, vec!["b"]);
}

#[tokio::test]
async fn test_rename_round_trip_rewrites_subtree_paths() {
    let app = TestApp::new().await;
    app.mkdir("/", "reports", AccessGroups::inherit()).await;
    app.mkdir("/reports", "2024", AccessGroups::inherit()).await;
    app.put("/reports/2024", "q1.txt", b"q1").await;

    let renamed = app
        .pipeline
        .update_directory(&app.admin, app.at("/reports"), ResourceChanges::rename("archive"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(renamed.relative_path, "/archive");

    let file = app.resolve(&app.admin, "/archive/2024/q1.txt").await.unwrap();
    assert_eq!(file.path().relative_path, "/archive/2024/q1.txt");
    assert!(app.disk(&app.store, "/archive/2024/q1.txt").exists());
    assert!(!app.disk(&app.store, "/reports").exists());

    app.pipeline
        .update_directory(&app.admin, app.at("/archive"), ResourceChanges::rename("reports"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    let file = app.resolve(&app.admin, "/reports/2024/q1.txt").await.unwrap();
    assert_eq!(file.path().relative_path, "/reports/2024/q1.txt");
    assert_eq!(
        std::fs::read(app.disk(&app.store, "/reports/2024/q1.txt")).unwrap(),
        b"q1"
    );
}

#[tokio::test]
async fn test_rename_to_existing_sibling_name_conflicts_ignoring_case() {
    let app = TestApp::new().await;
    app.mkdir("/", "Alpha", AccessGroups::inherit()).await;
    app.mkdir("/", "beta", AccessGroups::inherit()).await;

    let err = app
        .pipeline
        .update_directory(&app.admin, app.at("/beta"), ResourceChanges::rename("ALPHA"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
}

#[tokio::test]
async fn test_store_root_cannot_be_removed() {
    let app = TestApp::new().await;
    let err = app
        .pipeline
        .remove_directory(&app.admin, app.at("/"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Structural));
}

#[tokio::test]
async fn test_declared_groups_are_inherited_below() {
    let app = TestApp::new().await;
    let team = AccessGroups {
        read: Some("team".into()),
        write: Some("team".into()),
        execute: None,
    };
    app.mkdir("/", "shared", team).await;
    app.mkdir("/shared", "notes", AccessGroups::inherit()).await;

    let member = TestApp::user(&["team"]);
    let notes = app.resolve(&member, "/shared/notes").await.unwrap();
    assert!(notes.path().can(Permission::Read));
    assert!(notes.path().can(Permission::Write));
    // Execute is undeclared below the root, so it comes from the root's admins group.
    assert!(!notes.path().can(Permission::Execute));

    let outsider = TestApp::user(&["guests"]);
    let notes = app.resolve(&outsider, "/shared/notes").await.unwrap();
    assert!(!notes.path().can(Permission::Read));
}

#[tokio::test]
async fn test_denied_write_fails_task_and_reports_node() {
    let app = TestApp::new().await;
    app.mkdir("/", "locked", AccessGroups::all(ADMINS)).await;

    let reader = TestApp::user(&["readers"]);
    let err = app
        .pipeline
        .add_directory(&reader, app.at("/locked"), "mine", None, AccessGroups::inherit())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::PermissionDenied));
    let denied = err.denied.expect("denied access details");
    assert_eq!(denied.permission, Permission::Write);
    assert_eq!(denied.path, "/locked");
    assert!(app.child_names("/locked").await.is_empty());
}

#[tokio::test]
async fn test_removing_one_branch_leaves_siblings() {
    let app = TestApp::new().await;
    app.mkdir("/", "keep", AccessGroups::inherit()).await;
    app.mkdir("/keep", "inner", AccessGroups::inherit()).await;
    app.mkdir("/", "drop", AccessGroups::inherit()).await;
    app.mkdir("/drop", "inner", AccessGroups::inherit()).await;
    app.put("/drop/inner", "x.txt", b"x").await;

    let removed = app
        .pipeline
        .remove_directory(&app.admin, app.at("/drop"))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(removed, 3);

    assert_eq!(app.child_names("/").await, vec!["keep"]);
    assert_eq!(app.child_names("/keep").await, vec!["inner"]);
    assert!(!app.disk(&app.store, "/drop").exists());
}
