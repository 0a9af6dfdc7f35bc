//! End-to-end weaves through the real adapters.

use std::path::Path;

use tempfile::TempDir;

use weft_adapters::{
    HandlebarsRenderer, JsonManifestStore, LocalFilesystem, ManifestLoader, MemoryFilesystem,
    MemoryManifestStore, WeaveManifest, parse_manifest,
};
use weft_core::application::ports::ManifestStore;
use weft_core::domain::marker::scan_blocks;
use weft_core::prelude::*;

const RINGS: &str = r#"
[[rings]]
name = "engine"
kind = "core"

[[rings]]
name = "android"
kind = "android"
export = "app-android"
wraps = ["engine"]

[[rings]]
name = "desktop"
kind = "desktop"
export = "app-desktop"
wraps = ["engine"]

[[rings]]
name = "plugin"
kind = "plugin"
wraps = ["android", "desktop"]
"#;

const BOOKMARKS: &str = r#"
[[capabilities]]
name = "BookmarkMgmt"
reach = "global"

[[capabilities.methods]]
name = "addBookmark"
params = [{ name = "url", type = "string" }]
returns = "number"
"#;

const NOTES: &str = r#"
[[capabilities]]
name = "NoteMgmt"
reach = "local"

[[capabilities.methods]]
name = "countNotes"
returns = "number"
"#;

const JNI: &str = r#"
[[treadles]]
name = "jni"
match = ["android->core", "desktop->core"]
prefix = true

[[treadles.outputs]]
template = "bind/module.rs"
path = "{export}/src/bind/{capability.prefix}.rs"
each = "capability"

[[treadles.patches]]
template = "bind/mods.rs"
path = "{export}/src/lib.rs"
block = "mods"
anchor = { at = "after", pattern = "^pub mod api;" }

[[treadles.hookups]]
kind = "cargo-dependency"
manifest = "{export}/Cargo.toml"
name = "jni"
version = "0.21"
"#;

const IPC: &str = r#"
[[treadles]]
name = "ipc"
match = ["plugin->android", "plugin->desktop"]
target = "typescript"

[[treadles.outputs]]
template = "ipc/commands.ts"
path = "{export}/{inner.name}.ts"
skip_if = "no-methods"

[[treadles.hookups]]
kind = "json-dependency"
manifest = "{export}/package.json"
name = "@tauri-apps/api"
version = "^2.0.0"
"#;

const TEMPLATES: [(&str, &str); 3] = [
    (
        "bind/module.rs",
        "{{#each methods}}pub fn {{name}}() {}\n{{/each}}",
    ),
    (
        "bind/mods.rs",
        "{{#each capabilities}}pub mod {{prefix}};\n{{/each}}",
    ),
    (
        "ipc/commands.ts",
        "{{#each methods}}export const {{name}} = '{{original_name}}';\n{{/each}}",
    ),
];

const LIB: &str = "pub mod api;\n\nfn main() {}\n";

fn manifest(parts: &[&str]) -> WeaveManifest {
    parse_manifest(&parts.concat()).unwrap()
}

fn renderer() -> HandlebarsRenderer {
    let mut renderer = HandlebarsRenderer::new();
    for (id, source) in TEMPLATES {
        renderer.register(id, source).unwrap();
    }
    renderer
}

fn workspace() -> MemoryFilesystem {
    MemoryFilesystem::new()
        .with_file("/ws/app-android/src/lib.rs", LIB)
        .with_file(
            "/ws/app-android/Cargo.toml",
            "[package]\nname = \"app-android\"\n\n[dependencies]\nserde = \"1\"\n",
        )
        .with_file("/ws/app-desktop/src/lib.rs", LIB)
        .with_file(
            "/ws/app-desktop/Cargo.toml",
            "[package]\nname = \"app-desktop\"\n\n[dependencies]\njni = \"0.20\"\n",
        )
        .with_file("/ws/plugin/package.json", "{\n  \"name\": \"plugin\"\n}\n")
}

fn weave(fs: &MemoryFilesystem, store: &MemoryManifestStore, manifest: &WeaveManifest) -> WeaveReport {
    let service = WeaveService::new(
        Box::new(fs.clone()),
        Box::new(renderer()),
        Box::new(store.clone()),
    );
    service.weave(
        &manifest.graph,
        &manifest.capabilities,
        &manifest.matrix().unwrap(),
        &WeaveConfig::new("/ws"),
    )
}

#[test]
fn first_weave_writes_outputs_blocks_and_hookups() {
    let fs = workspace();
    let store = MemoryManifestStore::new();
    let report = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, NOTES, JNI, IPC]));
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.tasks_run, 4);

    let bridge = fs.get("/ws/app-android/src/bind/bookmark.rs").unwrap();
    assert_eq!(bridge, "pub fn bookmark_add_bookmark() {}\n");
    assert!(fs.get("/ws/app-android/src/bind/note.rs").is_some());

    let lib = fs.get("/ws/app-android/src/lib.rs").unwrap();
    assert!(lib.starts_with("pub mod api;\n// WEFT-START jni:mods\n"));
    assert!(lib.contains("pub mod bookmark;\npub mod note;\n"));
    assert!(lib.ends_with("fn main() {}\n"));

    let cargo = fs.get("/ws/app-android/Cargo.toml").unwrap();
    assert!(cargo.contains("# WEFT-START jni:dep-jni\njni = \"0.21\"\n# WEFT-END jni:dep-jni\n"));
    // A hand-declared entry is left alone.
    let desktop_cargo = fs.get("/ws/app-desktop/Cargo.toml").unwrap();
    assert!(!desktop_cargo.contains("WEFT-START"));
    assert!(desktop_cargo.contains("jni = \"0.20\""));

    // The plugin only sees global capabilities, named for TypeScript.
    let ts = fs.get("/ws/plugin/android.ts").unwrap();
    assert_eq!(ts, "export const addBookmark = 'addBookmark';\n");
    let package = fs.get("/ws/plugin/package.json").unwrap();
    assert!(package.contains("\"@tauri-apps/api\": \"^2.0.0\""));

    // mods x2, dep-jni x1
    assert_eq!(store.snapshot().block_count(), 3);
}

#[test]
fn second_weave_writes_nothing() {
    let fs = workspace();
    let store = MemoryManifestStore::new();
    let manifest = manifest(&[RINGS, BOOKMARKS, NOTES, JNI, IPC]);
    weave(&fs, &store, &manifest);
    let writes = fs.write_count();

    let report = weave(&fs, &store, &manifest);
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.changed(), 0);
    assert!(report.removed_blocks.is_empty());
    assert_eq!(fs.write_count(), writes);
}

#[test]
fn dropped_capability_rewrites_the_block() {
    let fs = workspace();
    let store = MemoryManifestStore::new();
    weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, NOTES, JNI, IPC]));

    let report = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, JNI, IPC]));
    assert!(report.is_success(), "{:?}", report.errors);
    let lib = fs.get("/ws/app-desktop/src/lib.rs").unwrap();
    assert!(lib.contains("pub mod bookmark;\n"));
    assert!(!lib.contains("pub mod note;"));
}

#[test]
fn removed_treadle_blocks_are_swept() {
    let fs = workspace();
    let store = MemoryManifestStore::new();
    weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, JNI, IPC]));

    let report = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, IPC]));
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.removed_blocks.len(), 3);

    for path in [
        "/ws/app-android/src/lib.rs",
        "/ws/app-desktop/src/lib.rs",
        "/ws/app-android/Cargo.toml",
    ] {
        let text = fs.get(path).unwrap();
        assert!(scan_blocks(&text).unwrap().is_empty(), "{path}: {text}");
    }
    assert!(fs.get("/ws/app-android/src/lib.rs").unwrap().contains("pub mod api;"));
    assert_eq!(store.snapshot().block_count(), 0);
}

#[test]
fn corrupt_block_fails_one_task_and_keeps_its_blocks() {
    let fs = workspace();
    let store = MemoryManifestStore::new();
    let manifest = manifest(&[RINGS, BOOKMARKS, JNI, IPC]);
    weave(&fs, &store, &manifest);

    let broken = "pub mod api;\n// WEFT-START jni:mods\npub mod bookmark;\n";
    fs.add_file("/ws/app-desktop/src/lib.rs", broken);

    let report = weave(&fs, &store, &manifest);
    assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
    assert!(report.errors[0].task.starts_with("app-desktop:"));
    assert!(report.errors[0].message.contains("WEFT-START jni:mods"));
    assert_eq!(fs.get("/ws/app-desktop/src/lib.rs").unwrap(), broken);
    // The failed scope is not swept anywhere.
    assert!(report.removed_blocks.is_empty());
    assert_eq!(store.snapshot().block_count(), 3);
}

#[test]
fn package_filter_runs_one_ring_without_sweeping() {
    let fs = workspace();
    let store = MemoryManifestStore::new();
    let manifest = manifest(&[RINGS, BOOKMARKS, JNI, IPC]);
    let service = WeaveService::new(
        Box::new(fs.clone()),
        Box::new(renderer()),
        Box::new(store.clone()),
    );
    let report = service.weave(
        &manifest.graph,
        &manifest.capabilities,
        &manifest.matrix().unwrap(),
        &WeaveConfig::new("/ws").package("plugin"),
    );

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(report.tasks_run, 2);
    assert!(report.sweep_skipped);
    assert!(fs.get("/ws/plugin/desktop.ts").is_some());
    assert!(!fs.get("/ws/app-android/src/lib.rs").unwrap().contains("WEFT-START"));
}

#[test]
fn dependencies_header_with_comment_is_found() {
    let fs = workspace().with_file(
        "/ws/app-android/Cargo.toml",
        "[package]\nname = \"app-android\"\n\n[dependencies] # managed by hand\nserde = \"1\"\n",
    );
    let store = MemoryManifestStore::new();
    let report = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, JNI]));
    assert!(report.is_success(), "{:?}", report.errors);

    let cargo = fs.get("/ws/app-android/Cargo.toml").unwrap();
    assert!(cargo.contains(
        "[dependencies] # managed by hand\n# WEFT-START jni:dep-jni\njni = \"0.21\"\n# WEFT-END jni:dep-jni\nserde = \"1\"\n"
    ));
}

#[test]
fn created_dependencies_table_is_swept_with_its_block() {
    let original = "[package]\nname = \"app-android\"";
    let fs = workspace().with_file("/ws/app-android/Cargo.toml", original);
    let store = MemoryManifestStore::new();

    let report = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, JNI]));
    assert!(report.is_success(), "{:?}", report.errors);
    let cargo = fs.get("/ws/app-android/Cargo.toml").unwrap();
    assert_eq!(
        cargo,
        "[package]\nname = \"app-android\"\n# WEFT-START jni:dep-jni\n[dependencies]\njni = \"0.21\"\n# WEFT-END jni:dep-jni"
    );
    assert!(cargo.parse::<toml::Table>().unwrap()["dependencies"]
        .as_table()
        .unwrap()
        .contains_key("jni"));

    let again = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS, JNI]));
    assert_eq!(again.changed(), 0);

    let report = weave(&fs, &store, &manifest(&[RINGS, BOOKMARKS]));
    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(fs.get("/ws/app-android/Cargo.toml").unwrap(), original);
}

// ── On disk ──────────────────────────────────────────────────────────────────

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn disk_workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "weft.toml", &[RINGS, BOOKMARKS, NOTES, JNI, IPC].concat());
    for (id, source) in TEMPLATES {
        write(root, &format!("templates/{id}.hbs"), source);
    }
    write(root, "app-android/src/lib.rs", LIB);
    write(root, "app-android/Cargo.toml", "[package]\nname = \"app-android\"\n");
    write(root, "app-desktop/src/lib.rs", LIB);
    write(root, "app-desktop/Cargo.toml", "[package]\nname = \"app-desktop\"\n");
    write(root, "plugin/package.json", "{}\n");
    temp
}

fn disk_weave(root: &Path) -> WeaveReport {
    let manifest = ManifestLoader::in_workspace(root).load().unwrap();
    let service = WeaveService::new(
        Box::new(LocalFilesystem::new()),
        Box::new(HandlebarsRenderer::from_dir(&root.join("templates")).unwrap()),
        Box::new(JsonManifestStore::in_workspace(root)),
    );
    service.weave(
        &manifest.graph,
        &manifest.capabilities,
        &manifest.matrix().unwrap(),
        &WeaveConfig::new(root).parallel(true),
    )
}

#[test]
fn parallel_weave_on_disk_is_idempotent() {
    let temp = disk_workspace();
    let root = temp.path();

    let first = disk_weave(root);
    assert!(first.is_success(), "{:?}", first.errors);
    assert!(root.join(".weft/markers.json").exists());

    let cargo = std::fs::read_to_string(root.join("app-android/Cargo.toml")).unwrap();
    assert_eq!(
        cargo,
        "[package]\nname = \"app-android\"\n# WEFT-START jni:dep-jni\n[dependencies]\njni = \"0.21\"\n# WEFT-END jni:dep-jni\n"
    );

    let saved = JsonManifestStore::in_workspace(root).load().unwrap();
    assert_eq!(saved.block_count(), 4);

    let lib = std::fs::read_to_string(root.join("app-desktop/src/lib.rs")).unwrap();
    let second = disk_weave(root);
    assert!(second.is_success(), "{:?}", second.errors);
    assert_eq!(second.changed(), 0);
    assert_eq!(
        std::fs::read_to_string(root.join("app-desktop/src/lib.rs")).unwrap(),
        lib
    );
}
