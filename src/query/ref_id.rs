use std::collections::HashSet;

/// Number of ref-ids [`generate_ref_id`] will hand out.
pub const MAX_REF_IDS: usize = 26;

/// Map a 0-based index onto the letter sequence `A..Z, AA, AB, …`.
pub fn index_to_ref_id(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// First single-letter ref-id not in `used`, or an empty string once all
/// 26 letters are taken.
pub fn generate_ref_id(used: &HashSet<String>) -> String {
    (0..MAX_REF_IDS)
        .map(index_to_ref_id)
        .find(|id| !used.contains(id))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_sequence() {
        assert_eq!(index_to_ref_id(0), "A");
        assert_eq!(index_to_ref_id(25), "Z");
        assert_eq!(index_to_ref_id(26), "AA");
        assert_eq!(index_to_ref_id(27), "AB");
        assert_eq!(index_to_ref_id(701), "ZZ");
        assert_eq!(index_to_ref_id(702), "AAA");
    }

    #[test]
    fn generates_in_order_until_exhausted() {
        let mut used = HashSet::new();
        let mut seen = Vec::new();
        for _ in 0..MAX_REF_IDS {
            let id = generate_ref_id(&used);
            used.insert(id.clone());
            seen.push(id);
        }
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
        assert_eq!(seen.first().map(String::as_str), Some("A"));
        assert_eq!(seen.last().map(String::as_str), Some("Z"));
        assert_eq!(generate_ref_id(&used), "");
    }

    #[test]
    fn reuses_freed_gaps() {
        let used: HashSet<String> = ["A", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(generate_ref_id(&used), "B");
    }
}
