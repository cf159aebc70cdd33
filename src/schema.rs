use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

pub const READING_RESPONSES: &str = "Reading Responses";

// Source records. The export uses Mongo-style `_id` keys; unknown fields are
// kept in the flattened `extra` maps so the raw lookup stores the full record.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub assignment: Assignment,
    #[serde(default)]
    pub student: Participant,
    #[serde(default)]
    pub teacher: Participant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_work: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
    // Reading text, set on "Reading Responses" assignments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_flow: Option<Vec<FlowStep>>,
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_response: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

impl Assignment {
    /// Concepts count only when the list is non-empty and every entry is a
    /// non-empty string; a single empty entry invalidates the whole set.
    pub fn has_valid_concepts(&self) -> bool {
        !self.concepts.is_empty() && self.concepts.iter().all(|c| !c.is_empty())
    }

    pub fn is_reading_response(&self) -> bool {
        self.assignment_type.as_deref() == Some(READING_RESPONSES)
    }
}

impl Conversation {
    pub fn has_valid_concepts(&self) -> bool {
        self.assignment.has_valid_concepts()
    }

    /// The assignment's reading text for "Reading Responses", the student's
    /// own submitted work for every other assignment type.
    pub fn student_reading(&self) -> Option<&str> {
        if self.assignment.is_reading_response() {
            self.assignment.text.as_deref()
        } else {
            self.student_work.as_deref()
        }
    }
}

// One flattened row per selected conversation, persisted as CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub conversation_id: String,
    pub assignment_id: String,
    pub assignment_name: Option<String>,
    pub assignment_type: Option<String>,
    pub assignment_subject: Option<String>,
    pub assignment_grade: Option<String>,
    pub has_concepts: bool,
    // JSON-encoded list, CSV cells are flat
    pub concepts: String,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub student_reading: Option<String>,
    pub is_popular_assignment: bool,
}

// The most-frequent assignment with its full conversations, persisted as a
// standalone artifact. Always a subset of the raw lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularExtract {
    pub assignment_id: String,
    pub assignment_name: Option<String>,
    pub conversations: std::collections::BTreeMap<String, Conversation>,
}

impl SummaryRow {
    pub fn from_conversation(conv: &Conversation, popular_assignment_id: &str) -> Self {
        SummaryRow {
            conversation_id: conv.id.clone(),
            assignment_id: conv.assignment.id.clone(),
            assignment_name: conv.assignment.title.clone(),
            assignment_type: conv.assignment.assignment_type.clone(),
            assignment_subject: conv.assignment.subject.clone(),
            assignment_grade: conv.assignment.grade.clone(),
            has_concepts: conv.has_valid_concepts(),
            concepts: serde_json::to_string(&conv.assignment.concepts).unwrap_or_default(),
            student_id: conv.student.id.clone(),
            student_name: conv.student.name.clone(),
            teacher_id: conv.teacher.id.clone(),
            teacher_name: conv.teacher.name.clone(),
            student_reading: conv.student_reading().map(str::to_owned),
            is_popular_assignment: conv.assignment.id == popular_assignment_id,
        }
    }

    pub fn concept_list(&self) -> Vec<String> {
        serde_json::from_str(&self.concepts).unwrap_or_default()
    }
}
