use std::sync::LazyLock;

use regex::Regex;

static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Matches .../drive/folders/<id> and .../drive/u/<n>/folders/<id>
    Regex::new(r"/drive(?:/u/[^/]*)?/folders/([^/?]*)/?").expect("Invalid folder URL regex")
});

/// Pulls the folder id out of a folder URL; anything else is taken to be an id
/// already and returned trimmed.
pub fn extract_folder_id(locator: &str) -> &str {
    let locator = locator.trim();
    match FOLDER_URL_REGEX.captures(locator) {
        Some(caps) => caps.get(1).map_or(locator, |m| m.as_str().trim()),
        None => locator,
    }
}
