pub const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",          // 2024-06-17
    "%Y/%m/%d",          // 2024/06/17
    "%m-%d-%Y",          // 06-17-2024
    "%m/%d/%Y",          // 06/17/2024
    "%d-%m-%Y",          // 17-06-2024
    "%d/%m/%Y",          // 17/06/2024
    "%Y-%m-%d %H:%M:%S", // 2024-06-17 12:30:00
    "%b %d, %Y",         // Jun 17, 2024
    "%B %d, %Y",         // June 17, 2024
];

/// Formats without a day component. The day defaults to the 1st.
pub const PARTIAL_DATE_FORMATS: [&str; 4] = [
    "%Y-%m", // 2024-06
    "%Y/%m", // 2024/06
    "%b %Y", // Jun 2024
    "%B %Y", // June 2024
];

/// Convert a string to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let mut c = s.chars();
            match c.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().chain(c).collect(),
            }
        })
        .collect()
}

/// Convert a string to camelCase
pub fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut c = pascal.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_lowercase().chain(c).collect(),
    }
}

/// Convert a string to kebab-case. Runs of capitals are kept together, so
/// `DRAMChip` becomes `dram-chip`.
pub fn to_kebab_case(s: &str) -> String {
    let chars: Vec<char> = to_pascal_case(s).chars().collect();
    let mut result = String::with_capacity(chars.len() + 4);

    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                result.push('-');
            }
        }
        result.extend(c.to_lowercase());
    }

    result
}

/// Normalize a string to be used as an IRI label
pub fn normalize_label_for_iri(label: &str) -> String {
    label
        .trim()
        .replace("//", "-")
        .replace(|c: char| !c.is_alphanumeric() && c != '-', "-")
        .split('-') // collapse consecutive dashes
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolve `possibly_relative_iri` against `base_iri`. Absolute IRIs are
/// returned unchanged; a base ending in an empty fragment (`...#`) receives the
/// relative part as its fragment.
pub fn expand_iri_with_base(base_iri: &str, possibly_relative_iri: &str) -> String {
    let mut base_url = match url::Url::parse(base_iri) {
        Ok(url) => url,
        Err(_) => return possibly_relative_iri.to_string(),
    };

    if let Some(fragment) = base_url.fragment() {
        if !fragment.is_empty() {
            return possibly_relative_iri.to_string();
        }
        return match url::Url::parse(possibly_relative_iri) {
            Ok(url) => url.to_string(),
            Err(_) => {
                base_url.set_fragment(Some(possibly_relative_iri));
                decode_iri(base_url.as_str(), possibly_relative_iri)
            }
        };
    }

    match base_url.join(possibly_relative_iri) {
        Ok(url) => decode_iri(url.as_str(), possibly_relative_iri),
        Err(_) => possibly_relative_iri.to_string(),
    }
}

fn decode_iri(encoded: &str, fallback: &str) -> String {
    urlencoding::decode(encoded)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| fallback.to_string())
}

pub fn is_absolute_iri(value: &str) -> bool {
    url::Url::parse(value).is_ok()
}

/// The part of an IRI after its last `/` or `#`
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['/', '#']).next().unwrap_or(iri)
}

/// Check if two Option values are conflicting (both Some, both non-empty, but different)
pub fn are_conflicting(value_one: &Option<String>, value_two: &Option<String>) -> bool {
    match (value_one, value_two) {
        (Some(value_one), Some(value_two)) => {
            if value_one.is_empty() || value_two.is_empty() {
                false
            } else {
                value_one != value_two
            }
        }
        _ => false,
    }
}

#[macro_export]
macro_rules! contains_variant {
    ($collection:expr, $pattern:pat) => {
        $collection.iter().any(|item| matches!(item, $pattern))
    };
}
