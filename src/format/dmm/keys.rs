// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Tilewright-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Tilewright and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Dictionary keys: fixed-width base-52 strings over `a-z` then `A-Z`.

use smol_str::SmolStr;

pub const KEY_ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const MAX_KEY_LEN: usize = 3;

pub fn capacity(len: usize) -> usize {
    KEY_ALPHABET.len().pow(len as u32)
}

fn digit(b: u8) -> Option<usize> {
    match b {
        b'a'..=b'z' => Some((b - b'a') as usize),
        b'A'..=b'Z' => Some((b - b'A') as usize + 26),
        _ => None,
    }
}

pub fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

/// Position of `key` in the key sequence of its length. `None` for anything that is not a
/// key of a supported length.
pub fn key_index(key: &str) -> Option<usize> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return None;
    }
    key.bytes()
        .try_fold(0usize, |acc, b| digit(b).map(|d| acc * KEY_ALPHABET.len() + d))
}

pub fn key_at(index: usize, len: usize) -> SmolStr {
    let mut out = [b'a'; MAX_KEY_LEN];
    let mut rest = index;
    for slot in out[..len].iter_mut().rev() {
        *slot = KEY_ALPHABET[rest % KEY_ALPHABET.len()];
        rest /= KEY_ALPHABET.len();
    }
    SmolStr::new(String::from_utf8_lossy(&out[..len]))
}

/// Hands out unused keys of one length in sequence order.
#[derive(Debug, Clone)]
pub struct KeyAllocator {
    len: usize,
    cursor: usize,
    taken: Vec<bool>,
}

impl KeyAllocator {
    pub fn new(len: usize, reserved: impl IntoIterator<Item = usize>) -> Self {
        let mut taken = vec![false; capacity(len)];
        for index in reserved {
            if let Some(slot) = taken.get_mut(index) {
                *slot = true;
            }
        }
        Self {
            len,
            cursor: 0,
            taken,
        }
    }

    pub fn free_count(&self) -> usize {
        self.taken[self.cursor..].iter().filter(|taken| !**taken).count()
    }

    pub fn next_key(&mut self) -> Option<SmolStr> {
        while self.cursor < self.taken.len() {
            let index = self.cursor;
            self.cursor += 1;
            if !self.taken[index] {
                self.taken[index] = true;
                return Some(key_at(index, self.len));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{capacity, key_at, key_index, KeyAllocator};

    #[test]
    fn key_sequence_orders_lowercase_before_uppercase() {
        assert_eq!(key_at(0, 2).as_str(), "aa");
        assert_eq!(key_at(25, 2).as_str(), "az");
        assert_eq!(key_at(26, 2).as_str(), "aA");
        assert_eq!(key_at(52, 2).as_str(), "ba");
        assert_eq!(key_at(capacity(2) - 1, 2).as_str(), "ZZ");
    }

    #[test]
    fn key_index_inverts_key_at() {
        for index in [0, 1, 51, 52, 2703] {
            assert_eq!(key_index(&key_at(index, 2)), Some(index));
        }
        assert_eq!(key_index("a1"), None);
        assert_eq!(key_index(""), None);
        assert_eq!(key_index("abcd"), None);
    }

    #[test]
    fn allocator_skips_reserved_keys() {
        let mut alloc = KeyAllocator::new(1, [0, 2]);
        assert_eq!(alloc.next_key().as_deref(), Some("b"));
        assert_eq!(alloc.next_key().as_deref(), Some("d"));
        assert_eq!(alloc.free_count(), 48);
    }
}
