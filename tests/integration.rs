use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn forge_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push(format!("forge{}", std::env::consts::EXE_SUFFIX));
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Create test vault
    let vault = root.join("vault");
    fs::create_dir_all(vault.join("Hardware")).unwrap();
    fs::create_dir_all(vault.join("Services")).unwrap();
    fs::write(
        vault.join("2025-09-17.md"),
        "- [ ] buy milk\n- [x] call dentist\n",
    )
    .unwrap();
    fs::write(
        vault.join("Hardware/NAS.md"),
        "---\ntype: hardware\ntags: [storage, homelab]\n---\nSynology storage box running RAID 5 with 4 drives.\n",
    )
    .unwrap();
    fs::write(
        vault.join("Services/Omada.md"),
        "# Omada\n\nController for the switch and access points.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = '{}'

[vault]
root = '{}'

[embedding]
provider = "hash"
dims = 256
"#,
        root.join("data").join("forge.sqlite").display(),
        vault.display()
    );

    let config_path = config_dir.join("forge.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_forge(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = forge_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run forge binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn indexed_env() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, ok) = run_forge(&config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    let (stdout, stderr, ok) = run_forge(&config_path, &["index"]);
    assert!(ok, "index failed: stdout={}, stderr={}", stdout, stderr);
    (tmp, config_path)
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_forge(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_forge(&config_path, &["init"]);
    assert!(success, "Second init failed (not idempotent)");
}

#[test]
fn test_index_then_incremental_noop() {
    let (_tmp, config_path) = setup_test_env();
    run_forge(&config_path, &["init"]);

    let (stdout, stderr, success) = run_forge(&config_path, &["index", "--progress", "off"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files indexed:   3"), "{}", stdout);
    assert!(stdout.contains("ok"));

    let (stdout, _, _) = run_forge(&config_path, &["index"]);
    assert!(stdout.contains("files unchanged: 3"), "{}", stdout);
    assert!(stdout.contains("chunks written:  0"), "{}", stdout);
}

#[test]
fn test_index_removes_deleted_files() {
    let (tmp, config_path) = indexed_env();
    fs::remove_file(tmp.path().join("vault/Hardware/NAS.md")).unwrap();

    let (stdout, _, success) = run_forge(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("files removed:   1"), "{}", stdout);

    let (stdout, _, _) = run_forge(&config_path, &["browse"]);
    assert!(!stdout.contains("NAS.md"), "{}", stdout);
}

#[test]
fn test_search_open_tasks() {
    let (_tmp, config_path) = indexed_env();

    let (stdout, stderr, success) =
        run_forge(&config_path, &["search", "what are my open tasks", "--explain"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("2025-09-17.md"), "{}", stdout);
    assert!(stdout.contains("[Source: 2025-09-17.md]"));
    assert!(stdout.contains("score: semantic"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = indexed_env();

    let (first, _, _) = run_forge(&config_path, &["search", "storage controller"]);
    let (second, _, _) = run_forge(&config_path, &["search", "storage controller"]);
    assert_eq!(first, second);
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = indexed_env();
    let (stdout, _, success) = run_forge(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_before_init_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_forge(&config_path, &["search", "milk"]);
    assert!(!success, "search should fail without init: {}", stdout);
    assert!(stderr.contains("index unavailable"), "{}", stderr);
    assert!(!stdout.contains("No results."));
}

#[test]
fn test_classify_without_config() {
    let (stdout, stderr, success) = run_forge(
        Path::new("/nonexistent/forge.toml"),
        &["classify", "how many projects are in my vault"],
    );
    assert!(success, "classify failed: {}", stderr);
    assert!(stdout.contains("primary: structural"), "{}", stdout);
    assert!(stdout.contains("ambiguous: true"));
}

#[test]
fn test_context_and_browse_and_stats() {
    let (_tmp, config_path) = indexed_env();

    let (stdout, _, success) = run_forge(&config_path, &["context", "what are my open tasks"]);
    assert!(success);
    assert!(stdout.contains("=== RELEVANT KNOWLEDGE FROM YOUR VAULT ==="));
    assert!(stdout.contains("- [ ] buy milk"));

    let (stdout, _, success) = run_forge(&config_path, &["browse"]);
    assert!(success);
    assert!(stdout.contains("Hardware/NAS.md"));
    assert!(stdout.contains("3 documents"));

    let (stdout, _, success) = run_forge(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Files:       3"), "{}", stdout);
    assert!(stdout.contains("homelab"));
}

#[test]
fn test_verify_claim() {
    let (_tmp, config_path) = indexed_env();

    let (stdout, _, success) =
        run_forge(&config_path, &["verify", "2025-09-17.md", "buy milk"]);
    assert!(success);
    assert!(stdout.contains("found: yes"), "{}", stdout);

    let (stdout, _, success) = run_forge(&config_path, &["verify", "Missing.md", "buy milk"]);
    assert!(success);
    assert!(stdout.contains("found: no"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("forge.toml");
    fs::write(
        &config_path,
        "[db]\npath = 'x.sqlite'\n\n[vault]\nroot = '.'\n\n[embedding]\nprovider = \"bogus\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_forge(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"), "{}", stderr);
}
