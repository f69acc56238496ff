//! Property-name normalization.
//!
//! `HIGH_PRICE`, `highPrice`, `high-price` and `high_price` all normalize to
//! `high_price`. Used to pair enumerated cases with output port names.

pub fn normalize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut cur = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            flush(&mut cur, &mut words);
            continue;
        }
        if c.is_uppercase() && !cur.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            // fooBar | foo2Bar | HTTPServer
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                flush(&mut cur, &mut words);
            }
        }
        cur.extend(c.to_lowercase());
    }
    flush(&mut cur, &mut words);
    words.join("_")
}

fn flush(cur: &mut String, words: &mut Vec<String>) {
    if !cur.is_empty() {
        words.push(std::mem::take(cur));
    }
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn constant_and_camel_case_agree() {
        assert_eq!(normalize("HIGH_PRICE"), "high_price");
        assert_eq!(normalize("highPrice"), "high_price");
        assert_eq!(normalize("high-price"), "high_price");
        assert_eq!(normalize("high_price"), "high_price");
    }

    #[test]
    fn acronyms_and_digits() {
        assert_eq!(normalize("HTTPServer"), "http_server");
        assert_eq!(normalize("level2Cache"), "level2_cache");
        assert_eq!(normalize("A"), "a");
        assert_eq!(normalize("__x__"), "x");
    }
}
