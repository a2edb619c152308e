use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use exam_core::model::{Question, QuestionId};

/// Outcome of drawing questions for one exam.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamPlan {
    pub questions: Vec<Question>,
    /// Questions matching the filter, before removing attempted ones.
    pub matched: usize,
    /// Candidates left after removing attempted ones.
    pub pool: usize,
}

impl ExamPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }
}

/// Drop every question already in `attempted`.
#[must_use]
pub fn candidate_pool(matched: &[Question], attempted: &HashSet<QuestionId>) -> Vec<Question> {
    matched
        .iter()
        .filter(|q| !attempted.contains(q.id()))
        .cloned()
        .collect()
}

/// Uniform in-place permutation (Fisher–Yates, as implemented by `rand`).
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Draws an exam from a non-empty candidate pool.
pub struct ExamBuilder<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
    total_questions: usize,
}

impl<'a, R: Rng + ?Sized> ExamBuilder<'a, R> {
    #[must_use]
    pub fn new(rng: &'a mut R, total_questions: usize) -> Self {
        Self {
            rng,
            total_questions,
        }
    }

    /// Shuffle `pool` and keep the first `min(total_questions, pool.len())`.
    ///
    /// Returning fewer than requested is expected when the pool is small.
    pub fn build(self, matched: usize, mut pool: Vec<Question>) -> ExamPlan {
        let pool_len = pool.len();
        shuffle(pool.as_mut_slice(), self.rng);
        pool.truncate(self.total_questions.min(pool_len));
        ExamPlan {
            questions: pool,
            matched,
            pool: pool_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::QuestionDraft;
    use exam_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn build_question(id: usize) -> Question {
        QuestionDraft::new(
            format!("q{id}"),
            format!("Prompt {id}"),
            vec!["a".into(), "b".into(), "c".into()],
            0,
        )
        .validate(fixed_now())
        .unwrap()
    }

    #[test]
    fn candidate_pool_excludes_attempted() {
        let matched: Vec<_> = (0..4).map(build_question).collect();
        let attempted: HashSet<_> = [QuestionId::new("q1"), QuestionId::new("q3")]
            .into_iter()
            .collect();

        let pool = candidate_pool(&matched, &attempted);
        let ids: Vec<_> = pool.iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, vec!["q0", "q2"]);
    }

    #[test]
    fn builder_takes_min_of_request_and_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool: Vec<_> = (0..5).map(build_question).collect();

        let plan = ExamBuilder::new(&mut rng, 3).build(5, pool.clone());
        assert_eq!(plan.total(), 3);
        assert_eq!(plan.pool, 5);

        let plan = ExamBuilder::new(&mut rng, 10).build(7, pool);
        assert_eq!(plan.total(), 5);
        assert_eq!(plan.matched, 7);

        let unique: HashSet<_> = plan.questions.iter().map(|q| q.id().clone()).collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut items: Vec<u32> = (0..50).collect();
        shuffle(items.as_mut_slice(), &mut rng);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_positions_are_roughly_uniform() {
        const TRIALS: usize = 8_000;
        const ITEMS: usize = 4;

        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        for _ in 0..TRIALS {
            let mut items: Vec<usize> = (0..ITEMS).collect();
            shuffle(items.as_mut_slice(), &mut rng);
            for (position, item) in items.into_iter().enumerate() {
                *counts.entry((position, item)).or_default() += 1;
            }
        }

        // Expected 2000 per cell; allow a generous band for a seeded run.
        let expected = TRIALS / ITEMS;
        for position in 0..ITEMS {
            for item in 0..ITEMS {
                let seen = counts.get(&(position, item)).copied().unwrap_or(0);
                assert!(
                    seen.abs_diff(expected) < expected / 5,
                    "item {item} at position {position}: {seen}"
                );
            }
        }
    }
}
