//! Display names generated for groups created without one

/// Name used when no responsible yields a usable first name
pub const UNNAMED_GROUP: &str = "GR_Sans_Responsable";

/// Keep letters, digits and spaces, then join the words with underscores
pub fn clean_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// `GR_<first name>` from the first responsible whose name survives
/// cleaning, else [`UNNAMED_GROUP`]
pub fn group_name<'a, I>(first_names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    first_names
        .into_iter()
        .map(clean_name)
        .find(|name| !name.is_empty())
        .map(|name| format!("GR_{}", name))
        .unwrap_or_else(|| UNNAMED_GROUP.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_collapses_spaces() {
        assert_eq!(clean_name("  Jean -  Marc! "), "Jean_Marc");
        assert_eq!(clean_name("Zoé"), "Zoé");
        assert_eq!(clean_name("R2D2"), "R2D2");
    }

    #[test]
    fn uses_first_usable_responsible() {
        assert_eq!(group_name(["Alice"]), "GR_Alice");
        assert_eq!(group_name(["?!", "Bob"]), "GR_Bob");
        assert_eq!(group_name(["Anne Marie", "Bob"]), "GR_Anne_Marie");
    }

    #[test]
    fn falls_back_when_nothing_usable() {
        assert_eq!(group_name(Vec::<&str>::new()), UNNAMED_GROUP);
        assert_eq!(group_name(["", "--"]), UNNAMED_GROUP);
    }
}
