use rand::{Rng, distr::Alphanumeric};

/// Generates a random alphanumeric string of the specified length.
///
/// ```ignore
/// let password = generate_random_string(12); // e.g. "A1b2C3d4E5f6"
/// ```
pub fn generate_random_string(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect::<String>()
}

/// Zero-padded random decimal suffix, e.g. `"0427"` for `length == 4`.
pub fn random_digits(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_have_requested_length() {
        let value = generate_random_string(12);
        assert_eq!(value.len(), 12);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn digits_are_numeric() {
        let value = random_digits(4);
        assert_eq!(value.len(), 4);
        assert!(value.chars().all(|c| c.is_ascii_digit()));
    }
}
