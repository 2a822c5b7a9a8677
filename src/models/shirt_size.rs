use serde::{Deserialize, Serialize};
use std::fmt;

/// Shirt sizes offered at registration and in the merch checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShirtSize {
    #[serde(rename = "XS")]
    Xs,
    #[serde(rename = "S")]
    S,
    #[serde(rename = "M")]
    M,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "XL")]
    Xl,
    #[serde(rename = "2XL")]
    Xxl,
    #[serde(rename = "3XL")]
    Xxxl,
}

impl ShirtSize {
    pub const ALL: [ShirtSize; 7] = [
        ShirtSize::Xs,
        ShirtSize::S,
        ShirtSize::M,
        ShirtSize::L,
        ShirtSize::Xl,
        ShirtSize::Xxl,
        ShirtSize::Xxxl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShirtSize::Xs => "XS",
            ShirtSize::S => "S",
            ShirtSize::M => "M",
            ShirtSize::L => "L",
            ShirtSize::Xl => "XL",
            ShirtSize::Xxl => "2XL",
            ShirtSize::Xxxl => "3XL",
        }
    }

    /// Lenient parse used for form input: trims and ignores case,
    /// anything unrecognised is `None`
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_uppercase();
        ShirtSize::ALL
            .iter()
            .copied()
            .find(|size| size.as_str() == normalized)
    }
}

impl fmt::Display for ShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ShirtSize::parse(" xl "), Some(ShirtSize::Xl));
        assert_eq!(ShirtSize::parse("2xl"), Some(ShirtSize::Xxl));
        assert_eq!(ShirtSize::parse("3XL"), Some(ShirtSize::Xxxl));
    }

    #[test]
    fn test_parse_rejects_unknown_sizes() {
        assert_eq!(ShirtSize::parse("XXL"), None);
        assert_eq!(ShirtSize::parse(""), None);
        assert_eq!(ShirtSize::parse("medium"), None);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&ShirtSize::Xxl).unwrap();
        assert_eq!(json, "\"2XL\"");
    }
}
