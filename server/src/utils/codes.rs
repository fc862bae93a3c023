use rand::distributions::Uniform;
use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SLUG_SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const ORDER_PREFIX: &str = "ORD";
const ORDER_CODE_LEN: usize = 10;
const TICKET_PREFIX: &str = "TKT";
const TICKET_CODE_LEN: usize = 12;
const SLUG_SUFFIX_LEN: usize = 6;
const SLUG_MAX_BASE_LEN: usize = 60;

fn random_chars(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..alphabet.len());
    (0..len)
        .map(|_| alphabet[rng.sample(dist)] as char)
        .collect()
}

/// `ORD-` followed by ten upper-case alphanumerics.
pub fn generate_order_number() -> String {
    format!(
        "{}-{}",
        ORDER_PREFIX,
        random_chars(CODE_ALPHABET, ORDER_CODE_LEN)
    )
}

/// `TKT-` followed by twelve upper-case alphanumerics.
pub fn generate_ticket_number() -> String {
    format!(
        "{}-{}",
        TICKET_PREFIX,
        random_chars(CODE_ALPHABET, TICKET_CODE_LEN)
    )
}

pub fn is_ticket_number(value: &str) -> bool {
    match value.split_once('-') {
        Some((prefix, rest)) => {
            prefix == TICKET_PREFIX
                && rest.len() == TICKET_CODE_LEN
                && rest.bytes().all(|b| CODE_ALPHABET.contains(&b))
        }
        None => false,
    }
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    let mut base: String = trimmed.chars().take(SLUG_MAX_BASE_LEN).collect();
    while base.ends_with('-') {
        base.pop();
    }
    if base.is_empty() {
        base.push_str("event");
    }
    base
}

/// Slug for a new event; the random suffix keeps identical titles apart.
pub fn event_slug(title: &str) -> String {
    format!(
        "{}-{}",
        slugify(title),
        random_chars(SLUG_SUFFIX_ALPHABET, SLUG_SUFFIX_LEN)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert_eq!(number.len(), 14);
        assert!(number.starts_with("ORD-"));
        assert!(number[4..].bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_ticket_number_round_trips_through_detector() {
        let number = generate_ticket_number();
        assert_eq!(number.len(), 16);
        assert!(is_ticket_number(&number));
        assert!(!is_ticket_number("ORD-ABCDEFGHIJ"));
        assert!(!is_ticket_number("TKT-short"));
        assert!(!is_ticket_number("TKT-abcdefghijkl"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Rust Meetup: Lagos 2025!"), "rust-meetup-lagos-2025");
        assert_eq!(slugify("  --  "), "event");
        assert_eq!(slugify("Ça va?"), "a-va");
    }

    #[test]
    fn test_event_slug_has_suffix() {
        let slug = event_slug("Launch Party");
        assert!(slug.starts_with("launch-party-"));
        assert_eq!(slug.len(), "launch-party-".len() + SLUG_SUFFIX_LEN);
    }
}
