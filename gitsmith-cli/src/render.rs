//! Human-readable output for operation payloads.

use serde_json::Value;

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("")
}

fn list_len(value: &Value, key: &str) -> usize {
    value[key].as_array().map_or(0, Vec::len)
}

pub fn user_and_repositories(user: &Value, repositories: &Value) {
    println!("✓ Connected as: {}", text(user, "login"));

    let repositories = repositories.as_array().map(Vec::as_slice).unwrap_or_default();
    println!("✓ Found {} repositories:", repositories.len());
    for repo in repositories {
        let visibility = if repo["private"].as_bool().unwrap_or(false) {
            "private"
        } else {
            "public"
        };
        println!("  • {} - {}", text(repo, "name"), visibility);
        if let Some(description) = repo["description"].as_str().filter(|d| !d.is_empty()) {
            println!("    {}", description);
        }
    }
}

pub fn created(repository: &Value) {
    println!("✓ Repository created: {}", text(repository, "html_url"));
}

pub fn synced(report: &Value) {
    println!(
        "✓ Synced {} files to {}",
        list_len(report, "synced"),
        text(report, "repository")
    );
    unchanged_and_skipped(report);
}

pub fn created_and_synced(report: &Value) {
    println!("✓ Success! Repository URL: {}", text(report, "url"));
    println!(
        "  {} files uploaded to {}",
        list_len(report, "synced"),
        text(report, "branch")
    );
    unchanged_and_skipped(report);
}

fn unchanged_and_skipped(report: &Value) {
    let unchanged = list_len(report, "unchanged");
    if unchanged > 0 {
        println!("  {} files already up to date", unchanged);
    }
    if let Some(skipped) = report["skipped"].as_array().filter(|s| !s.is_empty()) {
        println!("  Skipped (too large):");
        for path in skipped {
            println!("    {}", path.as_str().unwrap_or_default());
        }
    }
}

pub fn file(file: &Value) {
    match file["content"].as_str() {
        Some(content) => print!("{}", content),
        None => eprintln!(
            "{} is binary ({} bytes); use --json for base64 content",
            text(file, "path"),
            file["size"]
        ),
    }
}
