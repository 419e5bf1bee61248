// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Cow;
use std::fmt;

use smol_str::SmolStr;

use super::ids::TypePath;

/// A serialized DM variable value.
///
/// Values keep their source spelling (escapes, number formatting) so equality is exact and
/// writing a value back reproduces the text it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarValue {
    Null,
    /// String contents between the quotes, still escaped.
    Str(String),
    /// Number literal as written (`4`, `-0.5`, `1e+006`).
    Num(SmolStr),
    /// Resource file reference between single quotes, e.g. `icons/obj/tools.dmi`.
    Resource(String),
    Path(TypePath),
    /// Anything else (`list(...)`, `{"..."}`, `newlist(...)`, arithmetic) kept verbatim.
    Raw(String),
}

impl VarValue {
    pub fn parse(src: &str) -> Self {
        let src = src.trim();
        if src == "null" {
            return Self::Null;
        }
        if is_number_literal(src) {
            return Self::Num(SmolStr::new(src));
        }
        if let Some(inner) = strip_delimited(src, b'"') {
            return Self::Str(inner.to_owned());
        }
        if let Some(inner) = strip_delimited(src, b'\'') {
            return Self::Resource(inner.to_owned());
        }
        if src.starts_with('/') {
            if let Ok(path) = TypePath::new(src) {
                return Self::Path(path);
            }
        }
        Self::Raw(src.to_owned())
    }

    pub fn string(text: &str) -> Self {
        Self::Str(escape_dm_string(text))
    }

    pub fn number(value: i64) -> Self {
        let mut buf = itoa::Buffer::new();
        Self::Num(SmolStr::new(buf.format(value)))
    }

    pub fn resource(file: impl Into<String>) -> Self {
        Self::Resource(file.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The human-readable text of the value; `None` for `null`.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Str(raw) => Some(unescape_dm_string(raw)),
            Self::Num(raw) => Some(Cow::Borrowed(raw.as_str())),
            Self::Resource(file) => Some(Cow::Borrowed(file.as_str())),
            Self::Path(path) => Some(Cow::Borrowed(path.as_str())),
            Self::Raw(raw) => Some(Cow::Borrowed(raw.as_str())),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Num(raw) => raw.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Str(raw) => write!(f, "\"{raw}\""),
            Self::Num(raw) => f.write_str(raw),
            Self::Resource(file) => write!(f, "'{file}'"),
            Self::Path(path) => f.write_str(path.as_str()),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

fn is_number_literal(src: &str) -> bool {
    let bytes = src.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut saw_digit = i > digits_start;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        saw_digit |= i > frac_start;
    }
    if !saw_digit {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

/// Returns the inner text when `src` is exactly one `quote ... quote` literal.
fn strip_delimited(src: &str, quote: u8) -> Option<&str> {
    let bytes = src.as_bytes();
    if bytes.len() < 2 || bytes[0] != quote || bytes[bytes.len() - 1] != quote {
        return None;
    }
    let inner = &src[1..src.len() - 1];
    let mut escaped = false;
    for &b in inner.as_bytes() {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == quote {
            return None;
        }
    }
    if escaped {
        return None;
    }
    Some(inner)
}

fn escape_dm_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '[' => out.push_str("\\["),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_dm_string(raw: &str) -> Cow<'_, str> {
    if memchr::memchr(b'\\', raw.as_bytes()).is_none() {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}
