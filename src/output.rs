use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Filename for a crawl of `root_domain`: the domain with non-alphanumerics
/// replaced by `_`, plus a UTC timestamp.
pub fn output_filename(root_domain: &str) -> String {
    let safe: String = root_domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let ts = OffsetDateTime::now_utc()
        .format(&TIMESTAMP)
        .unwrap_or_default();
    format!("{safe}_{ts}.txt")
}

/// Writes the visited set as a sorted, newline-delimited list, creating
/// parent directories and truncating any existing file.
pub fn save_visited(path: &Path, visited: &HashSet<String>) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    let mut sorted: Vec<&String> = visited.iter().collect();
    sorted.sort();
    let mut contents = String::new();
    for url in sorted {
        contents.push_str(url);
        contents.push('\n');
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
