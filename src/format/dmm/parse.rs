// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use memchr::memmem;
use smol_str::SmolStr;
use thiserror::Error;

use super::keys::{capacity, is_key_byte, key_index, MAX_KEY_LEN};
use super::{DictEntry, DmmData, Prefab, PrefabEntry};
use crate::model::{
    Flavor, LineEnding, MapSize, Overrides, Point, SourceFormat, TypePath, TypePathError,
    VarValue,
};

pub const TGM_HEADER: &str =
    "//MAP CONVERTED BY dmm2tgm.py THIS HEADER COMMENT PREVENTS RECONVERSION, DO NOT REMOVE";

const TGM_MARKER: &str = "//MAP CONVERTED BY dmm2tgm.py";
const MAX_COORD: u32 = 10_000;
const MAX_TILES: u64 = 1 << 24;
const EMPTY_SLOT: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed map at line {line}: {kind}")]
pub struct DmmParseError {
    pub line: usize,
    pub kind: DmmParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DmmParseErrorKind {
    #[error("file is not valid UTF-8")]
    InvalidUtf8,
    #[error("unexpected {found:?} (expected {expected})")]
    Unexpected { found: char, expected: &'static str },
    #[error("unexpected end of file (expected {expected})")]
    UnexpectedEof { expected: &'static str },
    #[error("unterminated dictionary key")]
    UnterminatedKey,
    #[error("invalid dictionary key {0:?}")]
    InvalidKey(String),
    #[error("unsupported key length {0} (expected 1 to 3)")]
    UnsupportedKeyLength(usize),
    #[error("key {key:?} has length {found}, the file uses {expected}")]
    InconsistentKeyLength {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate dictionary key {0:?}")]
    DuplicateKey(String),
    #[error("invalid type path {path:?}: {source}")]
    InvalidTypePath {
        path: String,
        source: TypePathError,
    },
    #[error("unterminated prefab")]
    UnterminatedPrefab,
    #[error("unterminated variable block")]
    UnterminatedVars,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated grid block")]
    UnterminatedBlock,
    #[error("invalid coordinate {0:?}")]
    InvalidCoordinate(String),
    #[error("coordinate {0} is out of range (1 to 10000)")]
    CoordinateOutOfRange(u64),
    #[error("map of {0} tiles is too large")]
    MapTooLarge(u64),
    #[error("grid rows have uneven widths")]
    RaggedRows,
    #[error("grid references unknown key {0:?}")]
    UnknownKey(String),
    #[error("map has no dictionary entries")]
    EmptyDictionary,
    #[error("map has no grid blocks")]
    NoGrid,
    #[error("grid does not cover tile {0}")]
    GridGap(Point),
}

pub(super) fn decode_utf8(bytes: &[u8]) -> Result<&str, DmmParseError> {
    std::str::from_utf8(bytes).map_err(|err| DmmParseError {
        line: 1 + memchr::memchr_iter(b'\n', &bytes[..err.valid_up_to()]).count(),
        kind: DmmParseErrorKind::InvalidUtf8,
    })
}

struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        Some(b)
    }

    fn advance_to(&mut self, pos: usize) {
        self.line += memchr::memchr_iter(b'\n', &self.bytes[self.pos..pos]).count();
        self.pos = pos;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    fn at_comment(&self) -> bool {
        self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/')
    }

    /// Position of the next `\n`, or the end of input.
    fn line_end(&self) -> usize {
        memchr::memchr(b'\n', &self.bytes[self.pos..])
            .map_or(self.bytes.len(), |offset| self.pos + offset)
    }

    /// Like [`Self::line_end`] but before a `\r` that ends the line.
    fn content_end(&self) -> usize {
        let end = self.line_end();
        if end > self.pos && self.bytes[end - 1] == b'\r' {
            end - 1
        } else {
            end
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            self.skip_ws();
            if !self.at_comment() {
                return;
            }
            self.advance_to(self.line_end());
        }
    }

    /// Skips whitespace like [`Self::skip_ws_and_comments`], keeping each comment line.
    fn collect_comments(&mut self, comments: &mut Vec<String>) {
        loop {
            self.skip_ws();
            if !self.at_comment() {
                return;
            }
            let end = self.content_end();
            comments.push(self.src[self.pos..end].to_owned());
            self.advance_to(end);
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn err(&self, kind: DmmParseErrorKind) -> DmmParseError {
        DmmParseError {
            line: self.line,
            kind,
        }
    }

    fn unexpected(&self, expected: &'static str) -> DmmParseError {
        match self.src[self.pos..].chars().next() {
            Some(found) => self.err(DmmParseErrorKind::Unexpected { found, expected }),
            None => self.err(DmmParseErrorKind::UnexpectedEof { expected }),
        }
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), DmmParseError> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }
}

struct Block {
    line: usize,
    origin: Point,
    width: u32,
    height: u32,
    /// Row-major from the top row.
    slots: Vec<u32>,
}

/// Parses a map file into its structural model.
pub fn parse_dmm(text: &str) -> Result<DmmData, DmmParseError> {
    let (bom, text) = match text.strip_prefix('\u{feff}') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let flavor = if text.starts_with(TGM_MARKER) {
        Flavor::Tgm
    } else {
        Flavor::Standard
    };
    let line_ending = detect_line_ending(text);

    let mut cur = Cursor::new(text);
    if flavor == Flavor::Tgm {
        // The writer emits its own header.
        cur.advance_to(cur.line_end());
    }
    let mut dictionary = Vec::<DictEntry>::new();
    let mut key_len = None::<usize>;
    let mut slot_by_key = Vec::<u32>::new();
    let mut preamble = Vec::new();
    let mut comments = Vec::new();

    loop {
        cur.collect_comments(&mut comments);
        match cur.peek() {
            Some(b'"') => {
                let mut entry = parse_dict_entry(&mut cur, &mut key_len)?;
                // Comments above the first entry belong to the file, not to that entry.
                if dictionary.is_empty() {
                    preamble = std::mem::take(&mut comments);
                } else {
                    entry.comments = std::mem::take(&mut comments);
                }
                if slot_by_key.is_empty() {
                    slot_by_key = vec![EMPTY_SLOT; capacity(entry.key.len())];
                }
                let index = key_index(&entry.key).unwrap_or_default();
                if slot_by_key[index] != EMPTY_SLOT {
                    return Err(cur.err(DmmParseErrorKind::DuplicateKey(entry.key.to_string())));
                }
                slot_by_key[index] = dictionary.len() as u32;
                dictionary.push(entry);
            }
            Some(b'(') | None => break,
            Some(_) => return Err(cur.unexpected("a dictionary entry or grid block")),
        }
    }

    let Some(key_len) = key_len else {
        return Err(cur.err(DmmParseErrorKind::EmptyDictionary));
    };

    let grid_line = cur.line;
    let mut blocks = Vec::new();
    loop {
        cur.skip_ws_and_comments();
        match cur.peek() {
            Some(b'(') => blocks.push(parse_block(&mut cur, key_len, &slot_by_key)?),
            None => break,
            Some(_) => return Err(cur.unexpected("a grid block")),
        }
    }
    if blocks.is_empty() {
        return Err(cur.err(DmmParseErrorKind::NoGrid));
    }

    let (size, grid) = assemble_grid(&blocks, grid_line)?;

    Ok(DmmData {
        format: SourceFormat {
            flavor,
            key_len,
            line_ending,
        },
        size,
        dictionary,
        grid,
        bom,
        preamble,
        before_grid: comments,
        final_newline: text.ends_with('\n'),
    })
}

fn detect_line_ending(text: &str) -> LineEnding {
    match memchr::memchr(b'\n', text.as_bytes()) {
        Some(pos) if pos > 0 && text.as_bytes()[pos - 1] == b'\r' => LineEnding::CrLf,
        _ => LineEnding::Lf,
    }
}

fn parse_dict_entry(
    cur: &mut Cursor<'_>,
    key_len: &mut Option<usize>,
) -> Result<DictEntry, DmmParseError> {
    let start = cur.pos;
    cur.bump();
    let key = cur.take_while(|b| b != b'"' && b != b'\n');
    if cur.peek() != Some(b'"') {
        return Err(cur.err(DmmParseErrorKind::UnterminatedKey));
    }
    cur.bump();

    if !key.bytes().all(is_key_byte) {
        return Err(cur.err(DmmParseErrorKind::InvalidKey(key.to_owned())));
    }
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(cur.err(DmmParseErrorKind::UnsupportedKeyLength(key.len())));
    }
    match *key_len {
        Some(expected) if expected != key.len() => {
            return Err(cur.err(DmmParseErrorKind::InconsistentKeyLength {
                key: key.to_owned(),
                expected,
                found: key.len(),
            }));
        }
        Some(_) => {}
        None => *key_len = Some(key.len()),
    }

    cur.skip_ws();
    cur.expect(b'=', "'=' after dictionary key")?;
    cur.skip_ws();
    cur.expect(b'(', "'(' opening a prefab")?;
    let prefab = parse_prefab(cur)?;

    // A comment on the same line stays part of the entry.
    let gap = cur.bytes[cur.pos..]
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    if cur.bytes[cur.pos + gap..].starts_with(b"//") {
        cur.advance_to(cur.content_end());
    }

    Ok(DictEntry {
        key: SmolStr::new(key),
        prefab,
        source: cur.src[start..cur.pos].to_owned(),
        comments: Vec::new(),
    })
}

fn parse_prefab(cur: &mut Cursor<'_>) -> Result<Prefab, DmmParseError> {
    let mut entries = Prefab::new();
    cur.skip_ws();
    if cur.peek() == Some(b')') {
        cur.bump();
        return Ok(entries);
    }

    loop {
        cur.skip_ws();
        if cur.peek().is_none() {
            return Err(cur.err(DmmParseErrorKind::UnterminatedPrefab));
        }
        let raw = cur.take_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'/');
        let type_path = TypePath::new(raw).map_err(|source| {
            if raw.is_empty() {
                cur.unexpected("a type path")
            } else {
                cur.err(DmmParseErrorKind::InvalidTypePath {
                    path: raw.to_owned(),
                    source,
                })
            }
        })?;

        cur.skip_ws();
        let vars = if cur.peek() == Some(b'{') {
            cur.bump();
            parse_vars(cur)?
        } else {
            None
        };
        entries.push(PrefabEntry { type_path, vars });

        cur.skip_ws();
        match cur.peek() {
            Some(b',') => {
                cur.bump();
            }
            Some(b')') => {
                cur.bump();
                return Ok(entries);
            }
            None => return Err(cur.err(DmmParseErrorKind::UnterminatedPrefab)),
            Some(_) => return Err(cur.unexpected("',' or ')' in a prefab")),
        }
    }
}

fn parse_vars(cur: &mut Cursor<'_>) -> Result<Option<Overrides>, DmmParseError> {
    let mut entries = Vec::<(SmolStr, VarValue)>::new();
    loop {
        cur.skip_ws();
        match cur.peek() {
            Some(b'}') => {
                cur.bump();
                return Ok(Overrides::from_entries(entries));
            }
            None => return Err(cur.err(DmmParseErrorKind::UnterminatedVars)),
            Some(_) => {}
        }

        let name = cur.take_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        if name.is_empty() {
            return Err(cur.unexpected("a variable name"));
        }
        cur.skip_ws();
        cur.expect(b'=', "'=' after a variable name")?;
        let expr = scan_expr(cur)?;
        entries.push((SmolStr::new(name), VarValue::parse(expr)));

        if cur.peek() == Some(b';') {
            cur.bump();
        }
    }
}

/// Consumes one value expression, stopping before a top-level `;` or `}`.
fn scan_expr<'a>(cur: &mut Cursor<'a>) -> Result<&'a str, DmmParseError> {
    let start = cur.pos;
    let mut depth = 0usize;
    loop {
        match cur.peek() {
            None => return Err(cur.err(DmmParseErrorKind::UnterminatedVars)),
            Some(quote @ (b'"' | b'\'')) => scan_quoted(cur, quote)?,
            Some(b'{') if cur.peek_at(1) == Some(b'"') => scan_long_string(cur)?,
            Some(b'(' | b'[' | b'{') => {
                depth += 1;
                cur.bump();
            }
            Some(b'}' | b';') if depth == 0 => break,
            Some(b')' | b']' | b'}') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| cur.unexpected("a balanced expression"))?;
                cur.bump();
            }
            Some(_) => {
                cur.bump();
            }
        }
    }
    Ok(cur.src[start..cur.pos].trim())
}

fn scan_quoted(cur: &mut Cursor<'_>, quote: u8) -> Result<(), DmmParseError> {
    cur.bump();
    loop {
        match cur.peek() {
            None | Some(b'\n') => return Err(cur.err(DmmParseErrorKind::UnterminatedString)),
            Some(b'\\') => {
                cur.bump();
                if cur.peek() != Some(b'\n') {
                    cur.bump();
                }
            }
            Some(b) => {
                cur.bump();
                if b == quote {
                    return Ok(());
                }
            }
        }
    }
}

fn scan_long_string(cur: &mut Cursor<'_>) -> Result<(), DmmParseError> {
    let body = cur.pos + 2;
    match memmem::find(&cur.bytes[body..], b"\"}") {
        Some(offset) => {
            cur.advance_to(body + offset + 2);
            Ok(())
        }
        None => Err(cur.err(DmmParseErrorKind::UnterminatedString)),
    }
}

fn parse_coord(cur: &mut Cursor<'_>) -> Result<u32, DmmParseError> {
    cur.skip_ws();
    let digits = cur.take_while(|b| b.is_ascii_digit());
    if digits.is_empty() {
        return Err(cur.unexpected("a coordinate"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| cur.err(DmmParseErrorKind::InvalidCoordinate(digits.to_owned())))?;
    if value == 0 || value > u64::from(MAX_COORD) {
        return Err(cur.err(DmmParseErrorKind::CoordinateOutOfRange(value)));
    }
    cur.skip_ws();
    Ok(value as u32)
}

fn parse_block(
    cur: &mut Cursor<'_>,
    key_len: usize,
    slot_by_key: &[u32],
) -> Result<Block, DmmParseError> {
    let line = cur.line;
    cur.expect(b'(', "'(' opening a grid block")?;
    let x = parse_coord(cur)?;
    cur.expect(b',', "',' between coordinates")?;
    let y = parse_coord(cur)?;
    cur.expect(b',', "',' between coordinates")?;
    let z = parse_coord(cur)?;
    cur.expect(b')', "')' closing coordinates")?;
    cur.skip_ws();
    cur.expect(b'=', "'=' after block coordinates")?;
    cur.skip_ws();
    cur.expect(b'{', "'{\"' opening grid rows")?;
    cur.expect(b'"', "'{\"' opening grid rows")?;

    let body_start = cur.pos;
    let Some(body_len) = memmem::find(&cur.bytes[body_start..], b"\"}") else {
        return Err(DmmParseError {
            line,
            kind: DmmParseErrorKind::UnterminatedBlock,
        });
    };
    let body = &cur.src[body_start..body_start + body_len];
    let first_row_line = cur.line + usize::from(body.starts_with('\n') || body.starts_with("\r\n"));
    cur.advance_to(body_start + body_len + 2);

    let mut rows = body
        .split('\n')
        .map(|row| row.trim_end_matches(['\r', ' ', '\t']))
        .collect::<Vec<_>>();
    if rows.first().is_some_and(|row| row.is_empty()) {
        rows.remove(0);
    }
    while rows.last().is_some_and(|row| row.is_empty()) {
        rows.pop();
    }

    if let Some((row_no, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| !row.bytes().all(is_key_byte))
    {
        return Err(DmmParseError {
            line: first_row_line + row_no,
            kind: DmmParseErrorKind::InvalidKey((*row).to_owned()),
        });
    }

    let width_chars = rows.first().map_or(0, |row| row.len());
    if width_chars == 0
        || width_chars % key_len != 0
        || rows.iter().any(|row| row.len() != width_chars)
    {
        return Err(DmmParseError {
            line,
            kind: DmmParseErrorKind::RaggedRows,
        });
    }

    let mut slots = Vec::with_capacity(rows.len() * (width_chars / key_len));
    for (row_no, row) in rows.iter().enumerate() {
        let mut offset = 0;
        while offset < row.len() {
            // Rows are ASCII key bytes and a whole number of keys wide.
            let key = &row[offset..offset + key_len];
            let slot = key_index(key)
                .and_then(|index| slot_by_key.get(index).copied())
                .filter(|slot| *slot != EMPTY_SLOT);
            match slot {
                Some(slot) => slots.push(slot),
                None => {
                    return Err(DmmParseError {
                        line: first_row_line + row_no,
                        kind: DmmParseErrorKind::UnknownKey(key.to_owned()),
                    })
                }
            }
            offset += key_len;
        }
    }

    Ok(Block {
        line,
        origin: Point::new(x, y, z),
        width: (width_chars / key_len) as u32,
        height: rows.len() as u32,
        slots,
    })
}

fn assemble_grid(blocks: &[Block], grid_line: usize) -> Result<(MapSize, Vec<u32>), DmmParseError> {
    let mut max = (0u64, 0u64, 0u64);
    for block in blocks {
        let far_x = u64::from(block.origin.x) + u64::from(block.width) - 1;
        let far_y = u64::from(block.origin.y) + u64::from(block.height) - 1;
        for far in [far_x, far_y] {
            if far > u64::from(MAX_COORD) {
                return Err(DmmParseError {
                    line: block.line,
                    kind: DmmParseErrorKind::CoordinateOutOfRange(far),
                });
            }
        }
        max.0 = max.0.max(far_x);
        max.1 = max.1.max(far_y);
        max.2 = max.2.max(u64::from(block.origin.z));
    }

    let tiles = max.0 * max.1 * max.2;
    if tiles > MAX_TILES {
        return Err(DmmParseError {
            line: grid_line,
            kind: DmmParseErrorKind::MapTooLarge(tiles),
        });
    }

    let size = MapSize::new(max.0 as u32, max.1 as u32, max.2 as u32);
    let mut grid = vec![EMPTY_SLOT; size.tile_count()];
    for block in blocks {
        for row in 0..block.height {
            let y = block.origin.y + (block.height - 1 - row);
            for col in 0..block.width {
                let point = Point::new(block.origin.x + col, y, block.origin.z);
                if let Some(index) = size.index_of(point) {
                    grid[index] = block.slots[(row * block.width + col) as usize];
                }
            }
        }
    }

    if let Some(gap) = grid.iter().position(|slot| *slot == EMPTY_SLOT) {
        return Err(DmmParseError {
            line: grid_line,
            kind: DmmParseErrorKind::GridGap(size.point_at(gap)),
        });
    }

    Ok((size, grid))
}
