use std::collections::HashSet;

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Drop repeated identifiers, keeping first occurrences in order.
pub fn dedup_identifiers<I, S>(identifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    identifiers
        .into_iter()
        .map(Into::into)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Split identifiers into request-sized batches. `None` keeps them together.
pub fn chunk_identifiers(identifiers: &[String], chunk_size: Option<usize>) -> Vec<Vec<String>> {
    if identifiers.is_empty() {
        return Vec::new();
    }
    match chunk_size {
        Some(size) => identifiers
            .chunks(size.max(1))
            .map(<[String]>::to_vec)
            .collect(),
        None => vec![identifiers.to_vec()],
    }
}
