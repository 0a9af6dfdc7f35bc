//! Identifier case conversion.
//!
//! Every target ecosystem has its own naming convention: Rust members are
//! `snake_case`, Kotlin/Swift/TypeScript members are `camelCase`, and types are
//! `PascalCase` everywhere. Capability declarations may arrive in any of these
//! forms, so all conversions go through one word splitter.
//!
//! | Input             | snake              | pascal          | camel           |
//! |-------------------|--------------------|-----------------|-----------------|
//! | `addBookmark`     | `add_bookmark`     | `AddBookmark`   | `addBookmark`   |
//! | `BookmarkMgmt`    | `bookmark_mgmt`    | `BookmarkMgmt`  | `bookmarkMgmt`  |
//! | `HTTPRequest`     | `http_request`     | `HttpRequest`   | `httpRequest`   |
//! | `my-awesome app`  | `my_awesome_app`   | `MyAwesomeApp`  | `myAwesomeApp`  |

/// Convert a string to snake_case.
pub fn to_snake_case(s: &str) -> String {
    split_words(s).join("_")
}

/// Convert a string to kebab-case.
pub fn to_kebab_case(s: &str) -> String {
    split_words(s).join("-")
}

/// Convert a string to SCREAMING_SNAKE_CASE.
pub fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}

/// Convert a string to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize(w)).collect()
}

/// Convert a string to camelCase.
pub fn to_camel_case(s: &str) -> String {
    let words = split_words(s);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::new();
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

/// Split a string into lowercase words based on casing and separators.
///
/// ## Word Boundary Detection
///
/// 1. **Explicit separators:** `_`, `-`, `.`, whitespace → always split
/// 2. **Case transition (camelCase):** `aB` → split between `a` and `B`
/// 3. **Acronym boundary:** `HTTPRequest` → split between `P` and `R`
///    (detected by `Upper Upper Lower` pattern)
/// 4. **Digit to upper:** `v2Api` → `v2` + `api`
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }

        if let Some(&next) = chars.peek() {
            if (c.is_lowercase() || c.is_ascii_digit()) && next.is_uppercase() {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }

            if c.is_uppercase()
                && next.is_uppercase()
                && chars.clone().nth(1).is_some_and(|n| n.is_lowercase())
            {
                current.push(c);
                words.push(current.to_lowercase());
                current.clear();
                continue;
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current.to_lowercase());
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_from_camel_and_pascal() {
        assert_eq!(to_snake_case("addBookmark"), "add_bookmark");
        assert_eq!(to_snake_case("BookmarkMgmt"), "bookmark_mgmt");
        assert_eq!(to_snake_case("XMLHttpRequest"), "xml_http_request");
    }

    #[test]
    fn pascal_and_camel() {
        assert_eq!(to_pascal_case("add_bookmark"), "AddBookmark");
        assert_eq!(to_pascal_case("HTTPRequest"), "HttpRequest");
        assert_eq!(to_camel_case("delete_bookmark"), "deleteBookmark");
        assert_eq!(to_camel_case("List-All items"), "listAllItems");
    }

    #[test]
    fn kebab_and_screaming() {
        assert_eq!(to_kebab_case("My Awesome App"), "my-awesome-app");
        assert_eq!(to_screaming_snake_case("readerMode"), "READER_MODE");
    }

    #[test]
    fn digits_stay_with_their_word() {
        assert_eq!(split_words("v2Api"), vec!["v2", "api"]);
        assert_eq!(to_snake_case("sha256"), "sha256");
    }

    #[test]
    fn empty_input_yields_no_words() {
        assert!(split_words("").is_empty());
        assert_eq!(to_pascal_case("__"), "");
    }
}
