//! The one piece of key structure the engine itself understands: table-name routing.
//!
//! Everything past the table name is opaque to the engine; only `pattern.rs` interprets it.

/// The table name of `key`: the prefix up to and including the first `|`, or the whole key if
/// it contains none. Two keys with different table names always route to different tables.
pub fn table_name_of(key: &[u8]) -> Vec<u8> {
    match key.iter().position(|&b| b == b'|') {
        Some(idx) => key[..=idx].to_vec(),
        None => key.to_vec(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_first_pipe() {
        assert_eq!(table_name_of(b"t|a|b"), b"t|".to_vec());
    }

    #[test]
    fn whole_key_is_the_table_name_without_a_pipe() {
        assert_eq!(table_name_of(b"noseparator"), b"noseparator".to_vec());
    }
}
