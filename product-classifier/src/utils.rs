/// Text processing utilities
pub mod text {
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::borrow::Cow;
    use unicode_normalization::char::is_combining_mark;
    use unicode_normalization::UnicodeNormalization;

    static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new("<[^>]*>").unwrap());

    /// Compatibility-decompose and drop combining marks: "Crème" -> "Creme".
    pub fn fold_diacritics(text: &str) -> String {
        text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
    }

    /// Lowercase, diacritics stripped, whitespace collapsed.
    pub fn normalize_text(text: &str) -> String {
        fold_diacritics(text)
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `normalize_text` with every non-alphanumeric character removed.
    pub fn normalize_for_hash(text: &str) -> String {
        normalize_text(text)
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Trim, collapse whitespace and drop control characters. Blank input becomes `None`.
    pub fn clean_text(text: Option<&str>) -> Option<String> {
        let cleaned = text?
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    pub fn strip_html(input: &str) -> Cow<'_, str> {
        if !input.contains('<') && !input.contains('&') {
            return Cow::Borrowed(input);
        }
        let stripped = HTML_TAG_RE.replace_all(input, " ");
        Cow::Owned(
            stripped
                .replace("&nbsp;", " ")
                .replace("&amp;", "&")
                .replace("&quot;", "\"")
                .replace("&#39;", "'"),
        )
    }

    /// Keyword as the matcher expects it; config keywords are usually already lowercase ASCII.
    pub fn keyword_form(keyword: &str) -> Cow<'_, str> {
        let needs_work = keyword
            .chars()
            .any(|c| !c.is_ascii() || c.is_uppercase())
            || keyword.trim().len() != keyword.len();
        if needs_work {
            Cow::Owned(normalize_text(keyword))
        } else {
            Cow::Borrowed(keyword)
        }
    }

    /// Word-prefix match on normalized text: the keyword must start at a word
    /// boundary, so "men" does not hit "women" while "koptelefoon" still hits
    /// "koptelefoons".
    pub fn contains_keyword(normalized_text: &str, keyword: &str) -> bool {
        let keyword = keyword_form(keyword);
        if keyword.is_empty() {
            return false;
        }
        normalized_text
            .match_indices(keyword.as_ref())
            .any(|(idx, _)| {
                normalized_text[..idx]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !c.is_alphanumeric())
            })
    }

    pub fn contains_any(normalized_text: &str, keywords: &[String]) -> bool {
        keywords.iter().any(|kw| contains_keyword(normalized_text, kw))
    }

    pub fn count_matches(normalized_text: &str, keywords: &[String]) -> usize {
        keywords
            .iter()
            .filter(|kw| contains_keyword(normalized_text, kw))
            .count()
    }

    /// First `max_chars` characters, never splitting a code point.
    pub fn excerpt(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Absolute http(s) URL with a host.
    pub fn is_resolvable(url_str: &str) -> bool {
        match Url::parse(url_str.trim()) {
            Ok(url) => (url.scheme() == "http" || url.scheme() == "https") && url.host().is_some(),
            Err(_) => false,
        }
    }

    /// AWIN click-through link for a merchant URL.
    pub fn awin_deep_link(advertiser_id: &str, affiliate_id: &str, target: &str) -> Option<String> {
        if !is_resolvable(target) {
            return None;
        }
        Url::parse_with_params(
            "https://www.awin1.com/cread.php",
            &[
                ("awinmid", advertiser_id),
                ("awinaffid", affiliate_id),
                ("ued", target),
            ],
        )
        .ok()
        .map(String::from)
    }

    /// Amazon.nl detail page for an ASIN carrying the associate tag.
    pub fn amazon_detail_link(asin: &str, tag: &str) -> Option<String> {
        let asin = asin.trim();
        if asin.is_empty() || !asin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Url::parse_with_params(&format!("https://www.amazon.nl/dp/{}", asin), &[("tag", tag)])
            .ok()
            .map(String::from)
    }
}

/// Field access on schema-free feed rows
pub mod fields {
    use crate::types::RawFeedRow;
    use serde_json::Value;

    /// Scalar value as a trimmed, non-empty string.
    pub fn value_to_string(value: &Value) -> Option<String> {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Resolve a column name, or a dotted path into nested JSON
    /// (`ItemInfo.Title.DisplayValue`, `Offers.Listings.0.Price.Amount`).
    pub fn lookup<'a>(row: &'a RawFeedRow, key: &str) -> Option<&'a Value> {
        if let Some(value) = row.get(key) {
            return Some(value);
        }
        let mut segments = key.split('.');
        let mut current = row.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// First key that yields a non-empty scalar.
    pub fn first(row: &RawFeedRow, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| lookup(row, key))
            .find_map(value_to_string)
    }

    /// First key that yields any value, scalars and arrays alike.
    pub fn first_value<'a>(row: &'a RawFeedRow, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().filter_map(|key| lookup(row, key)).find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
    }

    /// Common truthy/falsy spellings found in feeds. Unknown spellings yield `None`.
    pub fn flag(row: &RawFeedRow, keys: &[&str]) -> Option<bool> {
        let value = first(row, keys)?.to_lowercase();
        match value.as_str() {
            "1" | "true" | "yes" | "y" | "ja" | "in stock" | "instock" | "in_stock" | "available" => Some(true),
            "0" | "false" | "no" | "n" | "nee" | "out of stock" | "outofstock" | "out_of_stock" | "unavailable" => Some(false),
            _ => None,
        }
    }
}

/// Price parsing for feed values
pub mod price {
    use serde_json::Value;

    const FOREIGN_CURRENCY_MARKERS: [&str; 6] = ["$", "USD", "£", "GBP", "CHF", "SEK"];

    /// Parse a feed price into EUR. Unparseable, negative, non-finite and
    /// foreign-currency values all yield `None`.
    pub fn parse_price(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
            Value::String(s) => parse_price_str(s),
            _ => None,
        }
    }

    pub fn parse_price_str(raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        let first_digit = trimmed.find(|c: char| c.is_ascii_digit())?;

        let upper = trimmed.to_uppercase();
        if FOREIGN_CURRENCY_MARKERS.iter().any(|marker| upper.contains(marker)) {
            return None;
        }
        if trimmed[..first_digit].contains('-') {
            return None;
        }

        let digits: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
            .collect();
        let canonical = normalize_separators(&digits)?;
        canonical
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

    /// Rewrite locale separators to a plain `1234.56` form.
    fn normalize_separators(digits: &str) -> Option<String> {
        match (digits.rfind(','), digits.rfind('.')) {
            (Some(comma), Some(dot)) => {
                // Whichever separator comes last is the decimal one
                let (decimal, thousands) = if comma > dot { (',', '.') } else { ('.', ',') };
                let without: String = digits.chars().filter(|c| *c != thousands).collect();
                if without.matches(decimal).count() > 1 {
                    return None;
                }
                Some(without.replace(decimal, "."))
            }
            (Some(_), None) => Some(single_separator(digits, ',')),
            (None, Some(_)) => Some(single_separator(digits, '.')),
            (None, None) => Some(digits.to_string()),
        }
    }

    /// "59,99" is a decimal; "1.299" and "1,299,000" are grouped thousands.
    fn single_separator(digits: &str, separator: char) -> String {
        let parts: Vec<&str> = digits.split(separator).collect();
        let grouped = parts.len() > 2
            || (parts.len() == 2 && parts[1].len() == 3 && !parts[0].is_empty() && parts[0] != "0");
        if grouped {
            parts.concat()
        } else {
            parts.join(".")
        }
    }
}
