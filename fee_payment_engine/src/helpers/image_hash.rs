/// Number of differing bits between two hex-encoded 64-bit perceptual hashes. Returns `None` if either hash is not
/// valid hex of at most 16 digits.
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    let a = parse_hash(a)?;
    let b = parse_hash(b)?;
    Some((a ^ b).count_ones())
}

fn parse_hash(hash: &str) -> Option<u64> {
    let hash = hash.trim().trim_start_matches("0x");
    if hash.is_empty() || hash.len() > 16 {
        return None;
    }
    u64::from_str_radix(hash, 16).ok()
}
