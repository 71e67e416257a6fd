#![allow(clippy::expect_used, clippy::unwrap_used)]

use serde_json::json;
use tasks_aio_core::DocumentEvent;
use tasks_aio_store_fs::{FsVault, VaultError};
use tempfile::TempDir;

fn setup() -> (TempDir, FsVault) {
    let dir = TempDir::with_prefix("tasks-aio-vault-it-").expect("create temp dir");
    let vault = FsVault::open(dir.path()).expect("open vault");
    (dir, vault)
}

#[test]
fn list_documents_walks_folders_and_skips_hidden_entries() {
    let (dir, vault) = setup();
    std::fs::create_dir_all(dir.path().join("Projects/2024")).unwrap();
    std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
    std::fs::write(dir.path().join("Inbox.md"), "- [ ] a").unwrap();
    std::fs::write(dir.path().join("Projects/2024/plan.md"), "- [ ] b").unwrap();
    std::fs::write(dir.path().join("Projects/logo.png"), [0_u8, 1, 2]).unwrap();
    std::fs::write(dir.path().join(".obsidian/workspace.md"), "- [ ] hidden").unwrap();
    std::fs::write(dir.path().join(".hidden.md"), "- [ ] hidden").unwrap();

    let paths: Vec<String> = vault
        .list_documents()
        .expect("list")
        .into_iter()
        .map(|doc| doc.path)
        .collect();
    assert_eq!(paths, vec!["Inbox.md", "Projects/2024/plan.md", "Projects/logo.png"]);
}

#[test]
fn frontmatter_is_parsed_into_json_properties() {
    let (_dir, vault) = setup();
    vault
        .write("note.md", "---\nstatus: done\narchive:\ncount: 3\n---\n- [ ] task\n")
        .expect("write");
    let fm = vault.frontmatter("note.md").expect("read").expect("front matter");
    assert_eq!(fm.get("status"), Some(&json!("done")));
    assert_eq!(fm.get("count"), Some(&json!(3)));
    assert!(fm.contains_key("archive"));

    vault.write("plain.md", "- [ ] task\n").expect("write");
    assert!(vault.frontmatter("plain.md").expect("read").is_none());

    vault.write("broken.md", "---\nkey: [unclosed\n---\nbody").expect("write");
    assert!(vault.frontmatter("broken.md").expect("read").is_none());
}

#[tokio::test]
async fn mutations_publish_events_in_order() {
    let (_dir, vault) = setup();
    let mut events = vault.subscribe();

    vault.create("a.md", "- [ ] one").expect("create");
    vault.rename("a.md", "Archive/b.md").expect("rename");
    vault.delete("Archive/b.md").expect("delete");

    match events.recv().await.expect("changed") {
        DocumentEvent::Changed { document, content } => {
            assert_eq!(document.path, "a.md");
            assert_eq!(content.as_deref(), Some("- [ ] one"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match events.recv().await.expect("renamed") {
        DocumentEvent::Renamed { document, old_path } => {
            assert_eq!(document.path, "Archive/b.md");
            assert_eq!(old_path, "a.md");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        events.recv().await.expect("deleted"),
        DocumentEvent::Deleted {
            path: "Archive/b.md".into()
        }
    );
}

#[test]
fn create_and_rename_refuse_to_overwrite() {
    let (_dir, vault) = setup();
    vault.create("a.md", "a").expect("create");
    vault.create("b.md", "b").expect("create");
    assert!(matches!(vault.create("a.md", "again"), Err(VaultError::AlreadyExists(_))));
    assert!(matches!(vault.rename("a.md", "b.md"), Err(VaultError::AlreadyExists(_))));
    assert!(matches!(vault.rename("zzz.md", "c.md"), Err(VaultError::NotFound(_))));
    assert_eq!(vault.read("b.md").expect("read"), "b");
}

#[test]
fn announce_change_reports_current_mtime() {
    let (dir, vault) = setup();
    std::fs::write(dir.path().join("external.md"), "- [ ] edited elsewhere").unwrap();
    let mut events = vault.subscribe();
    let document = vault.announce_change("external.md").expect("announce");
    assert_eq!(
        events.try_recv().expect("event"),
        DocumentEvent::Changed {
            document,
            content: None
        }
    );
    assert!(matches!(vault.announce_change("gone.md"), Err(VaultError::NotFound(_))));
}
