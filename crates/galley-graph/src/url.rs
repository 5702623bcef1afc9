//! Url string helpers.
//!
//! Urls are kept as plain strings throughout the graph. These helpers cover
//! the small set of operations the engine needs: RFC 3986 reference
//! resolution, search/hash manipulation, `file:` <-> path conversion and
//! relative specifier generation.

use std::path::{Path, PathBuf};

/// Components of a url, borrowed from the source string.
///
/// `query` keeps its leading `?` and `fragment` its leading `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parts<'a> {
    scheme: &'a str,
    authority: Option<&'a str>,
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl Parts<'_> {
    fn is_hierarchical(&self) -> bool {
        self.authority.is_some() || self.path.starts_with('/')
    }
}

fn scheme_end(input: &str) -> Option<usize> {
    let colon = input.find(':')?;
    let scheme = &input[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    // single letters are windows drive letters, not schemes
    if !first.is_ascii_alphabetic() || scheme.len() < 2 {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(colon)
}

fn split_tail(input: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match input.find('#') {
        Some(i) => (&input[..i], Some(&input[i..])),
        None => (input, None),
    };
    let (path, query) = match rest.find('?') {
        Some(i) => (&rest[..i], Some(&rest[i..])),
        None => (rest, None),
    };
    (path, query, fragment)
}

fn split(url: &str) -> Option<Parts<'_>> {
    let end = scheme_end(url)?;
    let scheme = &url[..=end];
    let (rest, query, fragment) = split_tail(&url[end + 1..]);
    let (authority, path) = match rest.strip_prefix("//") {
        Some(after) => {
            let slash = after.find('/').unwrap_or(after.len());
            (Some(&after[..slash]), &after[slash..])
        }
        None => (None, rest),
    };
    Some(Parts {
        scheme,
        authority,
        path,
        query,
        fragment,
    })
}

fn assemble(
    scheme: &str,
    authority: Option<&str>,
    path: &str,
    query: Option<&str>,
    fragment: Option<&str>,
) -> String {
    let mut out = String::with_capacity(scheme.len() + path.len() + 16);
    out.push_str(scheme);
    if let Some(authority) = authority {
        out.push_str("//");
        out.push_str(authority);
    }
    out.push_str(path);
    if let Some(query) = query {
        out.push_str(query);
    }
    if let Some(fragment) = fragment {
        out.push_str(fragment);
    }
    out
}

/// RFC 3986 section 5.2.4.
pub fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    let mut trailing_slash = false;

    for (index, segment) in segments.iter().enumerate() {
        match *segment {
            "." => trailing_slash |= index == last,
            ".." => {
                out.pop();
                trailing_slash |= index == last;
            }
            "" if index == 0 && absolute => {}
            other => out.push(other),
        }
    }

    let mut result = String::with_capacity(path.len());
    if absolute {
        result.push('/');
    }
    result.push_str(&out.join("/"));
    if trailing_slash && !result.ends_with('/') {
        result.push('/');
    }
    result
}

/// Returns the protocol of an absolute url, including the trailing colon.
pub fn protocol(url: &str) -> Option<&str> {
    scheme_end(url).map(|end| &url[..=end])
}

pub fn is_absolute_url(specifier: &str) -> bool {
    scheme_end(specifier).is_some()
}

/// A specifier that is neither a url nor a relative/absolute path, such as `react`.
pub fn is_bare_specifier(specifier: &str) -> bool {
    !(specifier.is_empty()
        || specifier.starts_with('/')
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('#')
        || specifier.starts_with('?')
        || is_absolute_url(specifier))
}

/// Resolve `specifier` against `base`.
///
/// Returns `None` when `base` is not an absolute url or is opaque
/// (`data:`, `ignore:`...) and `specifier` is relative.
pub fn resolve_url(specifier: &str, base: &str) -> Option<String> {
    if let Some(parts) = split(specifier) {
        if !parts.is_hierarchical() {
            return Some(specifier.to_string());
        }
        return Some(assemble(
            parts.scheme,
            parts.authority,
            &remove_dot_segments(parts.path),
            parts.query,
            parts.fragment,
        ));
    }

    let base = split(base)?;
    if let Some(network_path) = specifier.strip_prefix("//") {
        return resolve_url(&format!("{}//{network_path}", base.scheme), "");
    }
    if !base.is_hierarchical() {
        return None;
    }

    let (path, query, fragment) = split_tail(specifier);
    let (path, query) = if path.is_empty() {
        (base.path.to_string(), query.or(base.query))
    } else if path.starts_with('/') {
        (remove_dot_segments(path), query)
    } else {
        let merged = match base.path.rfind('/') {
            Some(i) => format!("{}{path}", &base.path[..=i]),
            None if base.authority.is_some() => format!("/{path}"),
            None => path.to_string(),
        };
        (remove_dot_segments(&merged), query)
    };

    Some(assemble(
        base.scheme,
        base.authority,
        &path,
        query,
        fragment,
    ))
}

pub fn url_without_hash(url: &str) -> &str {
    url.find('#').map_or(url, |i| &url[..i])
}

pub fn url_without_search(url: &str) -> String {
    let (before_hash, hash) = match url.find('#') {
        Some(i) => (&url[..i], &url[i..]),
        None => (url, ""),
    };
    let before_search = before_hash.find('?').map_or(before_hash, |i| &before_hash[..i]);
    format!("{before_search}{hash}")
}

/// The search part (without `?`), if any.
pub fn search(url: &str) -> Option<&str> {
    let url = url_without_hash(url);
    url.find('?').map(|i| &url[i + 1..])
}

pub fn has_search(url: &str) -> bool {
    search(url).is_some_and(|s| !s.is_empty())
}

/// Replace (or append) `key=value` in the search part of `url`.
pub fn set_search_param(url: &str, key: &str, value: &str) -> String {
    let (before_hash, hash) = match url.find('#') {
        Some(i) => (&url[..i], &url[i..]),
        None => (url, ""),
    };
    let (base, existing) = match before_hash.find('?') {
        Some(i) => (&before_hash[..i], &before_hash[i + 1..]),
        None => (before_hash, ""),
    };
    let mut pairs: Vec<String> = existing
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(key))
        .map(str::to_string)
        .collect();
    pairs.push(format!("{key}={value}"));
    format!("{base}?{}{hash}", pairs.join("&"))
}

/// Last path segment, without search or hash.
pub fn filename(url: &str) -> &str {
    let url = url_without_hash(url);
    let url = url.find('?').map_or(url, |i| &url[..i]);
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Extension of the last path segment, including the dot (`.js`).
pub fn extension(url: &str) -> Option<&str> {
    let name = filename(url);
    name.rfind('.')
        .filter(|&i| i > 0)
        .map(|i| &name[i..])
}

pub fn is_file_url(url: &str) -> bool {
    url.starts_with("file://")
}

/// Whether `url` is `directory_url` itself or located below it.
pub fn is_inside(url: &str, directory_url: &str) -> bool {
    let directory = directory_url.strip_suffix('/').unwrap_or(directory_url);
    url == directory || url.starts_with(&format!("{directory}/"))
}

/// Decode `%XX` escapes; invalid escapes are kept as is.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(value) = decoded {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn percent_encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => out.push_str("%20"),
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            c => out.push(c),
        }
    }
    out
}

/// Convert an absolute filesystem path into a `file://` url.
///
/// A trailing separator on `path` is kept as a trailing `/`, which is how
/// directory urls are distinguished.
pub fn path_to_file_url(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let is_directory = raw.ends_with('/') || raw.ends_with('\\');
    let cleaned = path_clean::clean(path);
    let mut normalized = cleaned.to_string_lossy().replace('\\', "/");
    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }
    if is_directory && !normalized.ends_with('/') {
        normalized.push('/');
    }
    format!("file://{}", percent_encode_path(&normalized))
}

/// Convert a `file://` url into a filesystem path; `None` for other protocols.
pub fn file_url_to_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    let rest = url_without_hash(rest);
    let rest = rest.find('?').map_or(rest, |i| &rest[..i]);
    // file:///C:/dir -> C:/dir
    let decoded = percent_decode(rest);
    let bytes = decoded.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        return Some(PathBuf::from(&decoded[1..]));
    }
    Some(PathBuf::from(decoded))
}

/// Specifier reaching `to` from a resource located at `from`.
///
/// Relative (`./x`, `../x`) when both urls share scheme and authority,
/// `to` unchanged otherwise.
pub fn relative_url(from: &str, to: &str) -> String {
    let (Some(from_parts), Some(to_parts)) = (split(from), split(to)) else {
        return to.to_string();
    };
    if from_parts.scheme != to_parts.scheme
        || from_parts.authority != to_parts.authority
        || !from_parts.is_hierarchical()
    {
        return to.to_string();
    }

    let from_segments: Vec<&str> = from_parts.path.split('/').collect();
    let from_dir = &from_segments[..from_segments.len().saturating_sub(1)];
    let to_segments: Vec<&str> = to_parts.path.split('/').collect();
    let to_dir = &to_segments[..to_segments.len().saturating_sub(1)];

    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let ups = from_dir.len() - common;

    let mut out = if ups == 0 {
        String::from("./")
    } else {
        "../".repeat(ups)
    };
    out.push_str(&to_segments[common..].join("/"));
    if let Some(query) = to_parts.query {
        out.push_str(query);
    }
    if let Some(fragment) = to_parts.fragment {
        out.push_str(fragment);
    }
    out
}
