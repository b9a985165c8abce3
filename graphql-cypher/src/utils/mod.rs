pub(crate) mod logging;

use apollo_compiler::Name;

/// Upper cases the first character: `actors` becomes `Actors`.
pub(crate) fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower cases the leading run of upper case characters: `Movie` becomes `movie`,
/// `HTTPRoute` becomes `httpRoute`.
pub(crate) fn lower_first(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_uppercase()).count();
    let lowered = match upper_run {
        0 => 0,
        1 => 1,
        n if n == chars.len() => n,
        // Keep the last upper case letter of the run: it starts the next word.
        n => n - 1,
    };
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i < lowered {
                c.to_lowercase().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// English plural of a type name, used for root field names.
pub(crate) fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ies") {
        return word.to_owned();
    }
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.is_some_and(|c| !"aeiouAEIOU".contains(c)) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

/// Builds a `Name` from a string produced by our own naming functions.
///
/// Generated names are concatenations of valid GraphQL names and fixed suffixes, so they are
/// always valid.
pub(crate) fn generated_name(s: impl AsRef<str>) -> Name {
    Name::new_unchecked(s.as_ref())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Movie", "Movies")]
    #[case("Series", "Series")]
    #[case("Status", "Statuses")]
    #[case("Category", "Categories")]
    #[case("Day", "Days")]
    #[case("Box", "Boxes")]
    #[case("Match", "Matches")]
    fn plurals(#[case] word: &str, #[case] expected: &str) {
        assert_eq!(pluralize(word), expected);
    }

    #[rstest]
    #[case("Movie", "movie")]
    #[case("HTTPRoute", "httpRoute")]
    #[case("ID", "id")]
    #[case("actors", "actors")]
    fn lower_first_word(#[case] word: &str, #[case] expected: &str) {
        assert_eq!(lower_first(word), expected);
    }

    #[test]
    fn upper_first_word() {
        assert_eq!(upper_first("actors"), "Actors");
        assert_eq!(upper_first(""), "");
    }
}
