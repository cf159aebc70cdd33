use std::collections::BTreeMap;

use log::warn;

use crate::schema::{Conversation, PopularExtract, SummaryRow};

/// The three outputs of one preprocessing run. Summary rows and the raw
/// lookup share their key set; the popular extract is the subset of the
/// lookup belonging to the most-frequent assignment.
#[derive(Debug)]
pub struct Artifacts {
    pub summary: Vec<SummaryRow>,
    pub raw: BTreeMap<String, Conversation>,
    pub popular: PopularExtract,
}

/// Flattens the selected conversations into the three artifacts. Keys are
/// sorted, so equal selections serialize to identical bytes. A duplicated
/// conversation id keeps the later record and logs a warning.
pub fn build_artifacts(
    popular_assignment_id: &str,
    selected: impl IntoIterator<Item = Conversation>,
) -> Artifacts {
    let mut raw: BTreeMap<String, Conversation> = BTreeMap::new();
    for conv in selected {
        let id = conv.id.clone();
        if raw.insert(id.clone(), conv).is_some() {
            warn!("duplicate conversation id {id}, keeping the later record");
        }
    }

    let summary: Vec<SummaryRow> = raw
        .values()
        .map(|conv| SummaryRow::from_conversation(conv, popular_assignment_id))
        .collect();

    let conversations: BTreeMap<String, Conversation> = raw
        .iter()
        .filter(|(_, conv)| conv.assignment.id == popular_assignment_id)
        .map(|(id, conv)| (id.clone(), conv.clone()))
        .collect();
    let assignment_name = conversations
        .values()
        .next()
        .and_then(|conv| conv.assignment.title.clone());

    Artifacts {
        summary,
        raw,
        popular: PopularExtract {
            assignment_id: popular_assignment_id.to_owned(),
            assignment_name,
            conversations,
        },
    }
}
