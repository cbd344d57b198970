//! Nibble-key protocol: byte keys expand to hex nibbles, and a sequence that
//! ends at a stored value carries a trailing terminator sentinel.

use alloc::vec::Vec;

/// Sentinel nibble appended to a sequence that terminates at a stored value.
/// It never appears mid-path; in a branch node it selects the value slot.
pub const TERMINATOR: u8 = 16;

/// Expands a byte key into its hex-nibble sequence, high nibble first.
/// No terminator is appended at this layer.
pub fn unpack(key: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(key.len() * 2);
    for byte in key {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// Length of the shared prefix of two nibble sequences.
pub fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Hex-prefix encoding of a nibble path, as embedded in short node bodies.
///
/// The flag nibble of the first byte encodes leaf status (bit 1) and odd
/// length (bit 0); an odd path contributes its first nibble to the flag
/// byte, the rest pack two per byte. A trailing terminator marks the path as
/// a leaf and is stripped before packing.
pub fn encode_path(path: &[u8]) -> Vec<u8> {
    let (path, is_leaf) = strip_terminator(path);
    let odd = path.len() % 2 == 1;
    let flags = (is_leaf as u8) << 1 | odd as u8;

    let mut out = Vec::with_capacity(1 + path.len() / 2);
    let rest = if odd {
        out.push(flags << 4 | path[0]);
        &path[1..]
    } else {
        out.push(flags << 4);
        path
    };
    for pair in rest.chunks_exact(2) {
        out.push(pair[0] << 4 | pair[1]);
    }
    out
}

/// Inverse of [`encode_path`]. Re-appends the terminator when the leaf flag
/// is set, so round-tripped paths compare equal to the originals.
pub fn decode_path(bytes: &[u8]) -> Result<Vec<u8>, alloy_rlp::Error> {
    let Some((&first, rest)) = bytes.split_first() else {
        return Err(alloy_rlp::Error::InputTooShort);
    };
    let (is_leaf, odd) = match first >> 4 {
        0b0000 => (false, false),
        0b0001 => (false, true),
        0b0010 => (true, false),
        0b0011 => (true, true),
        _ => return Err(alloy_rlp::Error::Custom("invalid hex-prefix flag nibble")),
    };

    let mut path = Vec::with_capacity(bytes.len() * 2);
    if odd {
        path.push(first & 0x0f);
    }
    for byte in rest {
        path.push(byte >> 4);
        path.push(byte & 0x0f);
    }
    if is_leaf {
        path.push(TERMINATOR);
    }
    Ok(path)
}

fn strip_terminator(path: &[u8]) -> (&[u8], bool) {
    match path.split_last() {
        Some((&TERMINATOR, head)) => (head, true),
        _ => (path, false),
    }
}
