//! Hide/keep decision for a single post.

use crate::denylist::Denylist;
use crate::policy::Policy;

/// Decides whether the post `id` is hidden.
///
/// Only the most severe tier containing `id` counts; a post in no tier is
/// always kept.
#[must_use]
pub fn decide(id: &str, denylist: &Denylist, policy: Policy) -> bool {
    denylist
        .most_severe_tier(id)
        .is_some_and(|tier| policy.hides(tier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denylist::Tier;
    use proptest::prelude::*;

    const POLICIES: [Policy; 4] = [Policy::Low, Policy::Medium, Policy::High, Policy::Unrecognized];

    fn tier_strategy() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Level1), Just(Tier::Level2), Just(Tier::Level3)]
    }

    #[test]
    fn test_level_2_example() {
        let list = Denylist::from_tiers([(Tier::Level2, ["xyz"])]);
        assert!(!decide("xyz", &list, Policy::Low));
        assert!(decide("xyz", &list, Policy::Medium));
        assert!(decide("xyz", &list, Policy::High));
    }

    #[test]
    fn test_unlisted_id_is_kept() {
        let list = Denylist::from_tiers([(Tier::Level1, ["abc"])]);
        for policy in POLICIES {
            assert!(!decide("other", &list, policy));
        }
    }

    #[test]
    fn test_unrecognized_policy_keeps_everything() {
        let list = Denylist::from_tiers([
            (Tier::Level1, ["a"]),
            (Tier::Level2, ["b"]),
            (Tier::Level3, ["c"]),
        ]);
        for id in ["a", "b", "c"] {
            assert!(!decide(id, &list, Policy::Unrecognized));
        }
    }

    #[test]
    fn test_most_severe_tier_wins() {
        // Level 3 membership would keep the post under medium; Level 1 hides it.
        let list = Denylist::from_tiers([(Tier::Level1, ["dup"]), (Tier::Level3, ["dup"])]);
        assert!(decide("dup", &list, Policy::Low));
        assert!(decide("dup", &list, Policy::Medium));
    }

    proptest! {
        #[test]
        fn prop_decision_follows_most_severe_tier(
            id in "[a-zA-Z0-9]{1,8}",
            tiers in proptest::collection::btree_set(tier_strategy(), 1..=3),
        ) {
            let list = Denylist::from_tiers(tiers.iter().map(|&tier| (tier, [id.clone()])));
            let most_severe = *tiers.iter().next().unwrap_or(&Tier::Level3);

            for policy in POLICIES {
                prop_assert_eq!(decide(&id, &list, policy), policy.hides(most_severe));
            }
        }

        #[test]
        fn prop_stricter_policy_hides_superset(
            id in "[a-z]{1,6}",
            tier in tier_strategy(),
        ) {
            let list = Denylist::from_tiers([(tier, [id.clone()])]);
            let low = decide(&id, &list, Policy::Low);
            let medium = decide(&id, &list, Policy::Medium);
            let high = decide(&id, &list, Policy::High);
            prop_assert!(!low || medium);
            prop_assert!(!medium || high);
            prop_assert!(high);
        }
    }
}
