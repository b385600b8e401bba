//! Identifier naming helpers.

/// Converts a type or field name to `snake_case`.
///
/// Acronyms stay together: `APIKey` becomes `api_key` and `SimpleURL`
/// becomes `simple_url`.
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase() || (next_is_lower && i > 1) {
                result.push('_');
            }
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// Returns the English plural of a snake_case noun.
#[must_use]
pub fn pluralize(s: &str) -> String {
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| s.ends_with(suffix)) {
        return format!("{s}es");
    }
    if let Some(stem) = s.strip_suffix('y') {
        if stem
            .chars()
            .last()
            .is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        {
            return format!("{stem}ies");
        }
    }
    format!("{s}s")
}

/// Derives the default table name for a type: pluralized snake_case.
#[must_use]
pub fn default_table_name(type_name: &str) -> String {
    pluralize(&to_snake_case(type_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_handles_acronyms() {
        let cases = [
            ("ID", "id"),
            ("UserName", "user_name"),
            ("APIKey", "api_key"),
            ("OAuthToken", "oauth_token"),
            ("OAuth2Token", "oauth2_token"),
            ("SimpleURL", "simple_url"),
            ("already_snake", "already_snake"),
        ];
        for (input, expected) in cases {
            assert_eq!(to_snake_case(input), expected, "input: {input}");
        }
    }

    #[test]
    fn plural_forms() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("wish"), "wishes");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("y"), "ys");
    }

    #[test]
    fn table_name_from_type() {
        assert_eq!(default_table_name("OrderItem"), "order_items");
        assert_eq!(default_table_name("Company"), "companies");
    }
}
