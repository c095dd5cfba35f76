/// Splits `s` into chunks of at most `max_chars` characters.
///
/// Chunks always end on a char boundary. An empty input yields a single
/// empty chunk; a `max_chars` of zero yields the whole input unsplit.
pub fn split_into_chunks(s: &str, max_chars: usize) -> Vec<String> {
    if s.is_empty() || max_chars == 0 {
        return vec![s.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for c in s.chars() {
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(c);
        count += 1;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
