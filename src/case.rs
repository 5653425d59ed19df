//! Identifier case conversion used when deriving association and column names.

/// Convert an identifier to snake_case. Runs of capitals are treated as one word,
/// so "UserRole" -> "user_role", "HTTPServer" -> "http_server", "role_id" stays put.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map(|n| n.is_lowercase()).unwrap_or(false),
                Some(_) => false,
            };
            if starts_word {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip a trailing identifier suffix: `RoleID` -> `Role`, `role_id` -> `role`.
pub fn strip_id_suffix(s: &str) -> Option<&str> {
    s.strip_suffix("_id")
        .or_else(|| s.strip_suffix("ID"))
        .filter(|stem| !stem.is_empty())
}
