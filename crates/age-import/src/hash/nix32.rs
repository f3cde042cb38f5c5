//! Nix-flavoured base-32 encoding.
//!
//! The alphabet omits `e`, `o`, `u` and `t`, and digits are emitted from the
//! most significant 5-bit group down, so the encoding of a 32-byte digest is
//! always 52 characters and a 20-byte store path digest is 32 characters.

const ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Number of characters needed to encode `size` bytes.
pub fn encoded_len(size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    (size * 8 - 1) / 5 + 1
}

/// Encode raw bytes.
pub fn encode(bytes: &[u8]) -> String {
    let size = bytes.len();
    let len = encoded_len(size);
    let mut out = String::with_capacity(len);

    for n in (0..len).rev() {
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;
        let low = u32::from(bytes[i]) >> j;
        let high = if i + 1 < size {
            u32::from(bytes[i + 1]) << (8 - j)
        } else {
            0
        };
        out.push(ALPHABET[((low | high) & 0x1f) as usize] as char);
    }

    out
}

/// Decode a string produced by [`encode`] back into `size` bytes.
///
/// Returns `None` if the string has the wrong length, contains a character
/// outside the alphabet, or carries bits beyond the final byte.
pub fn decode(s: &str, size: usize) -> Option<Vec<u8>> {
    let input = s.as_bytes();
    if input.len() != encoded_len(size) {
        return None;
    }

    let mut bytes = vec![0u8; size];
    let len = input.len();

    for n in 0..len {
        let c = input[len - n - 1];
        let digit = ALPHABET.iter().position(|&a| a == c)? as u16;
        let b = n * 5;
        let i = b / 8;
        let j = b % 8;
        bytes[i] |= ((digit << j) & 0xff) as u8;
        let carry = (digit >> (8 - j)) as u8;
        if i + 1 < size {
            bytes[i + 1] |= carry;
        } else if carry != 0 {
            return None;
        }
    }

    Some(bytes)
}
