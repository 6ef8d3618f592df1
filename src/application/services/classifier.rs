//! Frequency tier classification.

use crate::domain::entities::Tier;

/// Maps a capped visit total to its [`Tier`].
///
/// | total   | tier    |
/// |---------|---------|
/// | `< 4`   | New     |
/// | `4..=6` | Weekly  |
/// | `7..=14`| Regular |
/// | `>= 15` | Daily   |
pub fn classify(total_count: u32) -> Tier {
    match total_count {
        15.. => Tier::Daily,
        7..=14 => Tier::Regular,
        4..=6 => Tier::Weekly,
        _ => Tier::New,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(classify(0), Tier::New);
        assert_eq!(classify(3), Tier::New);
        assert_eq!(classify(4), Tier::Weekly);
        assert_eq!(classify(6), Tier::Weekly);
        assert_eq!(classify(7), Tier::Regular);
        assert_eq!(classify(14), Tier::Regular);
        assert_eq!(classify(15), Tier::Daily);
        assert_eq!(classify(u32::MAX), Tier::Daily);
    }

    #[test]
    fn test_folder_names() {
        assert_eq!(classify(20).folder_name(), "🔥 Daily");
        assert_eq!(classify(1).folder_name(), "💡 New");
    }
}
