//! Unified diff parsing.
//!
//! Only file identity matters downstream, so the parser walks file headers
//! and skips hunk bodies by their declared line counts. Hunk lines such as a
//! removed `-- comment` therefore never masquerade as `---` headers.
//!
//! Empty files and mode-only changes carry no `---`/`+++` pair, so the
//! `diff --git` header is read as well. Quoted names use git's C-style
//! escapes and are decoded back to the original bytes.

use std::borrow::Cow;
use std::collections::BTreeSet;

/// Paths touched by a revision, relative to the repository root.
pub type ChangedFiles = BTreeSet<String>;

const DEV_NULL: &str = "/dev/null";

/// Collect every old and new path named in a unified diff.
pub fn parse_changed_files(diff: &str) -> ChangedFiles {
    let mut files = ChangedFiles::new();
    let mut old_left = 0usize;
    let mut new_left = 0usize;

    for line in diff.lines() {
        if old_left > 0 || new_left > 0 {
            match line.as_bytes().first() {
                Some(b'-') => old_left = old_left.saturating_sub(1),
                Some(b'+') => new_left = new_left.saturating_sub(1),
                Some(b'\\') => {}
                _ => {
                    old_left = old_left.saturating_sub(1);
                    new_left = new_left.saturating_sub(1);
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("@@ ") {
            (old_left, new_left) = parse_hunk_header(rest);
        } else if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some((old, new)) = split_git_header(rest) {
                files.extend(header_path(old));
                files.extend(header_path(new));
            }
        } else if let Some(rest) = line
            .strip_prefix("--- ")
            .or_else(|| line.strip_prefix("+++ "))
        {
            files.extend(header_path(rest));
        } else if let Some(rest) = line
            .strip_prefix("rename from ")
            .or_else(|| line.strip_prefix("rename to "))
            .or_else(|| line.strip_prefix("copy from "))
            .or_else(|| line.strip_prefix("copy to "))
        {
            files.insert(unquote(rest).into_owned());
        } else if let Some(rest) = line
            .strip_prefix("Binary files ")
            .and_then(|r| r.strip_suffix(" differ"))
        {
            if let Some((old, new)) = rest.split_once(" and ") {
                files.extend(header_path(old));
                files.extend(header_path(new));
            }
        }
    }

    files
}

/// `-12,3 +12,4 @@ context` -> `(3, 4)`. Omitted counts default to one.
fn parse_hunk_header(rest: &str) -> (usize, usize) {
    let mut ranges = rest.split_whitespace();
    let old = ranges
        .next()
        .and_then(|r| r.strip_prefix('-'))
        .map(range_len)
        .unwrap_or(0);
    let new = ranges
        .next()
        .and_then(|r| r.strip_prefix('+'))
        .map(range_len)
        .unwrap_or(0);
    (old, new)
}

fn range_len(range: &str) -> usize {
    match range.split_once(',') {
        Some((_, len)) => len.parse().unwrap_or(0),
        None => 1,
    }
}

/// Split `a/OLD b/NEW` from a `diff --git` line into its two raw names.
///
/// Unquoted names may contain spaces, so the separator is ambiguous. When
/// several ` b/` positions exist, the one giving identical old and new paths
/// wins; otherwise the first is used.
fn split_git_header(rest: &str) -> Option<(&str, &str)> {
    if rest.starts_with('"') {
        let end = closing_quote(rest)?;
        let (old, new) = rest.split_at(end + 1);
        return Some((old, new.trim_start()));
    }
    if rest.ends_with('"') {
        let start = rest.rfind(" \"")?;
        return Some((&rest[..start], &rest[start + 1..]));
    }

    let splits: Vec<usize> = rest.match_indices(" b/").map(|(i, _)| i).collect();
    let split = splits
        .iter()
        .copied()
        .find(|&i| rest[..i].strip_prefix("a/") == Some(&rest[i + 3..]))
        .or_else(|| splits.first().copied())?;
    Some((&rest[..split], &rest[split + 1..]))
}

/// Byte index of the quote closing a name that starts with `"`.
fn closing_quote(raw: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in raw.bytes().enumerate().skip(1) {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Path from a diff header name, or `None` for `/dev/null`.
fn header_path(raw: &str) -> Option<String> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim_end();
    let raw = unquote(raw);
    if raw == DEV_NULL {
        return None;
    }
    let path = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(&*raw);
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// Decode a git-quoted name (`"caf\303\251.md"`). Unquoted names pass through.
fn unquote(raw: &str) -> Cow<'_, str> {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return Cow::Borrowed(raw);
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut input = inner.bytes().peekable();
    while let Some(b) = input.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match input.next() {
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'n') => bytes.push(b'\n'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'v') => bytes.push(0x0b),
            Some(digit @ b'0'..=b'7') => {
                let mut value = u32::from(digit - b'0');
                for _ in 0..2 {
                    match input.peek() {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            input.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
}
