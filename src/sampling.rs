use anyhow::{bail, Result};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::schema::Conversation;

/// Everything the flattening step needs: the full popular partition plus the
/// two sampled strata, and the pool sizes for reporting.
#[derive(Debug)]
pub struct Selection {
    pub popular_assignment_id: String,
    pub pool_with_concepts: usize,
    pub pool_without_concepts: usize,
    pub with_concepts: Vec<Conversation>,
    pub without_concepts: Vec<Conversation>,
    pub popular: Vec<Conversation>,
}

impl Selection {
    pub fn total(&self) -> usize {
        self.with_concepts.len() + self.without_concepts.len() + self.popular.len()
    }

    /// Selected conversations in sampling order: concept stratum, then the
    /// no-concept stratum, then the full popular partition.
    pub fn into_selected(self) -> Vec<Conversation> {
        let mut selected = self.with_concepts;
        selected.extend(self.without_concepts);
        selected.extend(self.popular);
        selected
    }
}

/// Assignment id with the most conversations. Ties go to the
/// lexicographically smallest id so reordering the source cannot change
/// the outcome.
pub fn most_popular_assignment(conversations: &[Conversation]) -> Option<String> {
    conversations
        .iter()
        .map(|c| c.assignment.id.as_str())
        .counts()
        .into_iter()
        .max_by(|(id_a, n_a), (id_b, n_b)| n_a.cmp(n_b).then_with(|| id_b.cmp(id_a)))
        .map(|(id, _)| id.to_owned())
}

/// Uniform sample without replacement, capped at the pool size.
pub fn sample_stratum<R: Rng>(
    mut pool: Vec<Conversation>,
    target: usize,
    rng: &mut R,
) -> Vec<Conversation> {
    pool.shuffle(rng);
    pool.truncate(target);
    pool
}

/// Runs the whole selection: popular partition in full, the rest stratified
/// by concept presence and sampled to `base_conversations / 2` per stratum.
pub fn select_conversations<R: Rng>(
    conversations: Vec<Conversation>,
    base_conversations: usize,
    rng: &mut R,
) -> Result<Selection> {
    let Some(popular_assignment_id) = most_popular_assignment(&conversations) else {
        bail!("source contains no conversations");
    };

    let (popular, remaining): (Vec<_>, Vec<_>) = conversations
        .into_iter()
        .partition(|c| c.assignment.id == popular_assignment_id);

    let (with_concepts, without_concepts): (Vec<_>, Vec<_>) =
        remaining.into_iter().partition(Conversation::has_valid_concepts);

    let pool_with_concepts = with_concepts.len();
    let pool_without_concepts = without_concepts.len();

    let half = base_conversations / 2;
    let with_concepts = sample_stratum(with_concepts, half, rng);
    let without_concepts = sample_stratum(without_concepts, half, rng);

    Ok(Selection {
        popular_assignment_id,
        pool_with_concepts,
        pool_without_concepts,
        with_concepts,
        without_concepts,
        popular,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Assignment, Participant};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::Map as JsonMap;
    use std::collections::HashSet;

    fn conv(id: &str, assignment_id: &str, concepts: &[&str]) -> Conversation {
        Conversation {
            id: id.to_string(),
            assignment: Assignment {
                id: assignment_id.to_string(),
                title: Some(format!("Assignment {assignment_id}")),
                assignment_type: Some("Essay".to_string()),
                subject: None,
                grade: None,
                concepts: concepts.iter().map(|c| c.to_string()).collect(),
                text: None,
                conversation_flow: None,
                extra: JsonMap::new(),
            },
            student: Participant::default(),
            teacher: Participant::default(),
            student_work: None,
            questions: Vec::new(),
            extra: JsonMap::new(),
        }
    }

    #[test]
    fn picks_assignment_with_most_conversations() {
        let data = vec![
            conv("c1", "a1", &[]),
            conv("c2", "a2", &[]),
            conv("c3", "a2", &[]),
        ];
        assert_eq!(most_popular_assignment(&data).as_deref(), Some("a2"));
    }

    #[test]
    fn ties_go_to_smallest_assignment_id() {
        let data = vec![
            conv("c1", "b", &[]),
            conv("c2", "b", &[]),
            conv("c3", "a", &[]),
            conv("c4", "a", &[]),
        ];
        assert_eq!(most_popular_assignment(&data).as_deref(), Some("a"));
    }

    #[test]
    fn no_conversations_means_no_popular_assignment() {
        assert_eq!(most_popular_assignment(&[]), None);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_conversations(Vec::new(), 4, &mut rng).is_err());
    }

    #[test]
    fn undersized_pool_is_taken_whole() {
        let pool = vec![conv("c1", "a1", &[]), conv("c2", "a1", &[])];
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_stratum(pool, 50, &mut rng).len(), 2);
    }

    #[test]
    fn large_pool_is_capped_at_target() {
        let pool: Vec<_> = (0..20).map(|i| conv(&format!("c{i}"), "a1", &[])).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = sample_stratum(pool, 5, &mut rng);
        assert_eq!(sampled.len(), 5);
        let ids: HashSet<_> = sampled.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 5, "sampling must be without replacement");
    }

    #[test]
    fn selection_partitions_are_exhaustive_and_disjoint() {
        let mut data: Vec<_> = (0..6).map(|i| conv(&format!("p{i}"), "popular", &[])).collect();
        data.push(conv("r1", "b", &["gravity"]));
        data.push(conv("r2", "c", &["mitosis"]));
        data.push(conv("r3", "d", &[]));
        data.push(conv("r4", "e", &[""]));

        let mut rng = StdRng::seed_from_u64(3);
        let selection = select_conversations(data, 400, &mut rng).unwrap();

        assert_eq!(selection.popular.len(), 6);
        assert_eq!(selection.pool_with_concepts, 2);
        assert_eq!(selection.pool_without_concepts, 2);

        let ids: HashSet<_> = selection
            .into_selected()
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(ids.len(), 10, "every record lands in exactly one partition");
    }

    #[test]
    fn scenario_ten_records_base_four_selects_eight() {
        // 6 popular + half=2 from each stratum, both pools already at 2
        let mut data: Vec<_> = (0..6).map(|i| conv(&format!("p{i}"), "a", &[])).collect();
        data.push(conv("r1", "b", &["gravity"]));
        data.push(conv("r2", "c", &["mitosis"]));
        data.push(conv("r3", "b", &[]));
        data.push(conv("r4", "c", &[]));

        let mut rng = StdRng::seed_from_u64(11);
        let selection = select_conversations(data, 4, &mut rng).unwrap();
        assert_eq!(selection.with_concepts.len(), 2);
        assert_eq!(selection.without_concepts.len(), 2);
        assert_eq!(selection.total(), 8);
    }

    #[test]
    fn strata_never_exceed_half_of_base() {
        let mut data: Vec<_> = (0..3).map(|i| conv(&format!("p{i}"), "a", &[])).collect();
        for i in 0..40 {
            data.push(conv(&format!("w{i}"), &format!("b{i}"), &["gravity"]));
            data.push(conv(&format!("n{i}"), &format!("c{i}"), &[]));
        }

        let mut rng = StdRng::seed_from_u64(5);
        let selection = select_conversations(data, 20, &mut rng).unwrap();
        assert_eq!(selection.with_concepts.len(), 10);
        assert_eq!(selection.without_concepts.len(), 10);
    }

    #[test]
    fn same_seed_selects_the_same_conversations() {
        let build = || -> Vec<Conversation> {
            let mut data: Vec<_> = (0..4).map(|i| conv(&format!("p{i}"), "a", &[])).collect();
            for i in 0..30 {
                data.push(conv(&format!("w{i}"), &format!("b{i}"), &["gravity"]));
                data.push(conv(&format!("n{i}"), &format!("c{i}"), &[]));
            }
            data
        };

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let ids_a: Vec<_> = select_conversations(build(), 10, &mut rng_a)
            .unwrap()
            .into_selected()
            .into_iter()
            .map(|c| c.id)
            .collect();
        let ids_b: Vec<_> = select_conversations(build(), 10, &mut rng_b)
            .unwrap()
            .into_selected()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids_a, ids_b);
    }
}
