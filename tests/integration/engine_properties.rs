#![allow(missing_docs)]

use affinity::engine::{rank_similar, SimilarityMatrix, UserItemMatrix};
use affinity::{InMemoryRatings, Rating, Recommender};
use proptest::prelude::*;

fn arb_rating() -> impl Strategy<Value = Rating> {
    (1u64..=8, 101u64..=107, 0u32..=10).prop_map(|(user, item, half_steps)| {
        Rating::new(user, item, f64::from(half_steps) / 2.0).expect("rating within bounds")
    })
}

fn arb_ratings() -> impl Strategy<Value = Vec<Rating>> {
    prop::collection::vec(arb_rating(), 1..60)
}

fn similarity_of(ratings: &[Rating]) -> SimilarityMatrix {
    let matrix = UserItemMatrix::build(ratings).expect("non-empty ratings");
    SimilarityMatrix::compute(&matrix).expect("finite similarities")
}

proptest! {
    #[test]
    fn similarity_is_symmetric(ratings in arb_ratings()) {
        let sim = similarity_of(&ratings);
        for &a in sim.items() {
            for &b in sim.items() {
                let ab = sim.score(a, b).expect("known pair");
                let ba = sim.score(b, a).expect("known pair");
                prop_assert!((ab - ba).abs() <= 1e-9, "sim({a},{b})={ab} sim({b},{a})={ba}");
            }
        }
    }

    #[test]
    fn self_similarity_is_maximal(ratings in arb_ratings()) {
        let sim = similarity_of(&ratings);
        for &a in sim.items() {
            prop_assert_eq!(sim.score(a, a), Some(1.0));
            for &b in sim.items() {
                let score = sim.score(a, b).expect("known pair");
                prop_assert!((0.0..=1.0).contains(&score), "score {score} out of range");
            }
        }
    }

    #[test]
    fn query_item_is_never_recommended(ratings in arb_ratings(), top_n in 0usize..10) {
        let sim = similarity_of(&ratings);
        for &item in sim.items() {
            let recs = rank_similar(&sim, item, top_n);
            prop_assert!(recs.iter().all(|rec| rec.item_id != item));
        }
    }

    #[test]
    fn result_length_is_bounded(ratings in arb_ratings(), top_n in 0usize..10) {
        let sim = similarity_of(&ratings);
        for &item in sim.items() {
            let recs = rank_similar(&sim, item, top_n);
            prop_assert!(recs.len() <= top_n);
            prop_assert!(recs.len() <= sim.len() - 1);
            prop_assert_eq!(recs.len(), top_n.min(sim.len() - 1));
        }
    }

    #[test]
    fn results_are_descending_and_repeatable(ratings in arb_ratings(), top_n in 0usize..10) {
        let recommender = Recommender::new(InMemoryRatings::new(ratings));
        prop_assert!(recommender.train());
        for item in recommender.item_ids() {
            let first = recommender.recommend(item, top_n);
            let second = recommender.recommend(item, top_n);
            prop_assert_eq!(&first, &second);
            for pair in first.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score, "unordered pair {:?}", pair);
            }
        }
    }
}
