//! Property tests for weighted scoring, verdicts, and loop termination.

mod common;

use proptest::prelude::*;
use uuid::Uuid;

use common::{harness, MarkerCapability};
use vigil::domain::models::evaluation::weighted_score;
use vigil::domain::models::{
    CriterionId, CriterionOutcome, CriterionScore, EvaluationSnapshot, Thresholds, Tier,
    ValidationConfig, ValidationContext, Verdict,
};

/// `None` is an unknown score.
fn outcomes_strategy() -> impl Strategy<Value = Vec<CriterionOutcome>> {
    prop::collection::vec(prop::option::weighted(0.85, 0.0f64..=1.0), 10).prop_map(|scores| {
        CriterionId::ALL
            .into_iter()
            .zip(scores)
            .map(|(criterion, score)| match score {
                Some(score) => CriterionOutcome::Scored(CriterionScore::new(criterion, score, "prop")),
                None => CriterionOutcome::Failed {
                    criterion,
                    error: "unavailable".into(),
                },
            })
            .collect()
    })
}

proptest! {
    /// Property: the weighted score stays within [0, 1]
    #[test]
    fn prop_weighted_score_is_bounded(outcomes in outcomes_strategy()) {
        let score = weighted_score(&outcomes);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&score));
    }

    /// Property: with every criterion known, a uniform score is its own weighted score
    #[test]
    fn prop_uniform_scores_are_preserved(score in 0.0f64..=1.0) {
        let outcomes: Vec<_> = CriterionId::ALL
            .into_iter()
            .map(|c| CriterionOutcome::Scored(CriterionScore::new(c, score, "prop")))
            .collect();
        prop_assert!((weighted_score(&outcomes) - score).abs() < 1e-9);
    }

    /// Property: release needs every gating criterion known and passing
    #[test]
    fn prop_release_requires_known_passing_gating(outcomes in outcomes_strategy()) {
        let thresholds = Thresholds::default();
        let snapshot = EvaluationSnapshot::from_outcomes(outcomes, &thresholds);

        if snapshot.verdict == Verdict::ReleaseOk {
            prop_assert!(snapshot.weighted_score >= thresholds.release);
            for criterion in CriterionId::in_tier(Tier::Gating) {
                let score = snapshot.score(criterion);
                prop_assert!(score.is_some_and(|s| s >= thresholds.release), "{criterion} blocks release");
            }
        }
    }

    /// Property: a split verdict always comes with a known failing atomicity score
    #[test]
    fn prop_split_verdict_implies_atomicity_failure(outcomes in outcomes_strategy()) {
        let thresholds = Thresholds::default();
        let snapshot = EvaluationSnapshot::from_outcomes(outcomes, &thresholds);

        prop_assert_eq!(
            snapshot.verdict == Verdict::Split,
            !snapshot.is_release_ok() && snapshot.atomicity_failure(&thresholds).is_some()
        );
    }

    /// Property: unknown criteria are never listed as failing
    #[test]
    fn prop_unknown_criteria_are_not_failing(outcomes in outcomes_strategy()) {
        let thresholds = Thresholds::default();
        let snapshot = EvaluationSnapshot::from_outcomes(outcomes, &thresholds);
        let unknown = snapshot.unknown();

        prop_assert!(snapshot.failing(&thresholds).iter().all(|s| !unknown.contains(&s.criterion)));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: processing finishes within max_iterations for any failing set
    #[test]
    fn prop_processing_terminates_within_the_cap(
        max_iterations in 1u32..6,
        failing in prop::sample::subsequence(CriterionId::ALL.to_vec(), 0..=9),
        stubborn in prop::sample::select(CriterionId::ALL[1..].to_vec()),
        fix_batch_size in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let h = harness(
            MarkerCapability::new().failing(&failing).stubborn(stubborn),
            ValidationConfig { max_iterations, fix_batch_size, ..ValidationConfig::default() },
        );

        let result = runtime
            .block_on(h.orchestrator.process(
                Uuid::new_v4(),
                "Uploads must be virus scanned",
                &ValidationContext::default(),
                None,
            ))
            .unwrap();

        prop_assert!(result.iteration_count() <= max_iterations as usize);
        prop_assert!(result.verdict != Verdict::Split);
        for iteration in &result.iterations {
            let mut criteria: Vec<_> = iteration.fixes_applied.iter().map(|f| f.criterion).collect();
            let merged = criteria.clone();
            criteria.sort();
            prop_assert_eq!(merged, criteria, "fixes merge in tier order");
        }
    }
}
