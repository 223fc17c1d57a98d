use std::cmp::Ordering;

use tally_types::ContestantTally;

/// Leaderboard order between two tallies.
pub fn compare_tallies(a: &ContestantTally, b: &ContestantTally) -> Ordering {
    b.total()
        .cmp(&a.total())
        .then_with(|| match (a.first_vote_at, b.first_vote_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id().cmp(b.id()))
}

/// Sort tallies into leaderboard order. Ids are unique within an event, so
/// the order is total and independent of the input order.
pub fn order_tallies(tallies: &mut [&ContestantTally]) {
    tallies.sort_by(|a, b| compare_tallies(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{ContestantProfile, Timestamp};

    fn tally(id: &str, total: u64, first: Option<u64>) -> ContestantTally {
        let mut t = ContestantTally::new(ContestantProfile::new(id, "main"));
        t.free_votes = total;
        t.first_vote_at = first.map(Timestamp::from_secs);
        t
    }

    #[test]
    fn higher_total_wins() {
        let a = tally("a", 5, Some(1));
        let b = tally("b", 9, Some(2));
        assert_eq!(compare_tallies(&b, &a), Ordering::Less);
    }

    #[test]
    fn earlier_first_vote_breaks_ties() {
        let a = tally("z", 5, Some(1));
        let b = tally("a", 5, Some(2));
        assert_eq!(compare_tallies(&a, &b), Ordering::Less);
    }

    #[test]
    fn id_is_final_fallback() {
        let a = tally("alpha", 5, Some(1));
        let b = tally("beta", 5, Some(1));
        assert_eq!(compare_tallies(&a, &b), Ordering::Less);
        let c = tally("c", 0, None);
        let d = tally("d", 0, None);
        assert_eq!(compare_tallies(&c, &d), Ordering::Less);
    }

    #[test]
    fn contestants_with_votes_precede_unvoted_ties() {
        let voted = tally("z", 0, Some(1));
        let unvoted = tally("a", 0, None);
        assert_eq!(compare_tallies(&voted, &unvoted), Ordering::Less);
    }

    #[test]
    fn order_is_independent_of_input_order() {
        let rows = [
            tally("c", 10, Some(3)),
            tally("a", 10, Some(3)),
            tally("b", 20, Some(9)),
            tally("d", 10, Some(1)),
        ];
        let mut forward: Vec<&ContestantTally> = rows.iter().collect();
        let mut backward: Vec<&ContestantTally> = rows.iter().rev().collect();
        order_tallies(&mut forward);
        order_tallies(&mut backward);
        let ids = |v: &[&ContestantTally]| v.iter().map(|t| t.id().as_str().to_string()).collect::<Vec<_>>();
        assert_eq!(ids(&forward), vec!["b", "d", "a", "c"]);
        assert_eq!(ids(&forward), ids(&backward));
    }
}
