//! Checks the editor and container tooling files at the repository root.

use std::collections::BTreeMap;
use std::path::PathBuf;

fn read_root_file(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

/// Make targets mapped to their recipe lines.
fn make_targets(makefile: &str) -> BTreeMap<String, Vec<String>> {
    let mut targets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in makefile.lines() {
        if let Some(recipe) = line.strip_prefix('\t') {
            if let Some(target) = &current {
                targets.entry(target.clone()).or_default().push(recipe.to_string());
            }
        } else if let Some((name, _)) = line.split_once(':') {
            if name.starts_with('.') || name.contains(' ') || name.contains('=') {
                current = None;
            } else {
                current = Some(name.to_string());
                targets.entry(name.to_string()).or_default();
            }
        } else if line.trim().is_empty() {
            current = None;
        }
    }
    targets
}

/// `key = value` assignments inside the Lua settings table.
fn lua_assignments(lua: &str) -> Vec<(String, String)> {
    lua.lines()
        .filter_map(|line| line.trim().trim_end_matches(',').split_once(" = "))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[test]
fn nvim_registers_rust_analyzer() {
    let lua = read_root_file(".nvim.lua");
    assert!(lua.contains(r#"vim.lsp.config("rust_analyzer""#));
    assert!(lua.contains(r#"cmd = { "rust-analyzer" }"#));
    assert!(lua.contains(r#"filetypes = { "rust" }"#));
    assert!(lua.contains(r#"["rust-analyzer"] = {"#));
}

#[test]
fn nvim_settings_have_exactly_the_documented_values() {
    let lua = read_root_file(".nvim.lua");
    let leaves: Vec<(String, String)> = lua_assignments(&lua)
        .into_iter()
        .filter(|(_, v)| v != "{")
        .filter(|(k, _)| k != "cmd" && k != "filetypes")
        .collect();
    assert_eq!(
        leaves,
        vec![
            ("allFeatures".to_string(), "true".to_string()),
            ("command".to_string(), r#""clippy""#.to_string()),
            ("enable".to_string(), "true".to_string()),
        ]
    );

    let filetypes = lua
        .lines()
        .find(|l| l.trim_start().starts_with("filetypes"))
        .unwrap();
    assert_eq!(filetypes.matches('"').count(), 2, "exactly one filetype");
}

#[test]
fn makefile_has_the_four_container_targets() {
    let targets = make_targets(&read_root_file("Makefile"));
    let names: Vec<&str> = targets.keys().map(String::as_str).collect();
    assert_eq!(names, ["build", "run", "shell", "test"]);

    assert_eq!(targets["build"], ["docker build -t crimson-dev ."]);
    for (target, trailing) in [
        ("shell", "bash"),
        ("run", "cargo run -- run"),
        ("test", "cargo test"),
    ] {
        let recipe = &targets[target];
        assert_eq!(recipe.len(), 1, "{target}: {recipe:?}");
        let line = &recipe[0];
        assert!(line.starts_with("docker run"), "{target}: {line}");
        assert!(line.contains(":/app"), "{target}: {line}");
        assert!(line.contains("-w /app"), "{target}: {line}");
        assert!(line.contains("-p 6379:6379"), "{target}: {line}");
        assert!(
            line.ends_with(&format!("crimson-dev {trailing}")),
            "{target}: {line}"
        );
    }
}

#[test]
fn reading_twice_is_stable() {
    assert_eq!(read_root_file(".nvim.lua"), read_root_file(".nvim.lua"));
    assert_eq!(
        make_targets(&read_root_file("Makefile")),
        make_targets(&read_root_file("Makefile"))
    );
}
