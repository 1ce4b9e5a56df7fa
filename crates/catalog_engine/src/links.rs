use std::sync::LazyLock;

use regex::Regex;

// The third host is only ever quoted with single quotes in the manifest script.
static DOWNLOAD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(https?://dl\.delivery\.mp\.microsoft\.com/[^'"]*)"#,
        r#"|(https?://download\.windowsupdate\.com/[^'"]*)"#,
        r#"|(https://catalog\.s\.download\.windowsupdate\.com[^'\n]*)'"#,
    ))
    .expect("download link pattern is valid")
});

static REFERENCE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)",
    )
    .expect("reference url pattern is valid")
});

/// Every CDN link in a download manifest response, in order of appearance.
pub fn download_links(manifest: &str) -> Vec<String> {
    DOWNLOAD_LINK
        .captures_iter(manifest)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct URLs found in a fragment of markup, first occurrence first.
pub fn reference_urls(markup: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in REFERENCE_URL.find_iter(markup) {
        if !urls.iter().any(|seen| seen == m.as_str()) {
            urls.push(m.as_str().to_string());
        }
    }
    urls
}
