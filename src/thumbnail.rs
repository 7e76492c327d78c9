use url::Url;

const LOW_RES: &str = "hqdefault.jpg";
const LIVE_RES: &str = "mqdefault_live.jpg";

/// Swaps a YouTube `hqdefault.jpg` thumbnail for the `mqdefault_live.jpg` variant.
///
/// Anything else, including values that are not URLs at all, is returned unchanged.
/// Only the file name is replaced; every other byte of the input is kept as written.
pub fn normalize(thumbnail: &str) -> String {
    let Ok(url) = Url::parse(thumbnail) else {
        return thumbnail.to_string();
    };

    let is_low_res = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(|last| last == LOW_RES);
    if !is_low_res {
        return thumbnail.to_string();
    }

    let path_end = thumbnail.find(['?', '#']).unwrap_or(thumbnail.len());
    let (head, tail) = thumbnail.split_at(path_end);
    match head.strip_suffix(LOW_RES) {
        Some(prefix) => format!("{prefix}{LIVE_RES}{tail}"),
        None => thumbnail.to_string(),
    }
}
