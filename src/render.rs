use std::fmt::Write;

use clap::ValueEnum;

use crate::schema::{Conversation, SummaryRow, READING_RESPONSES};

/// Fixed six-step conversation flow: (label, description), index is the
/// zero-based question position.
pub const QUESTION_TAXONOMY: [(&str, &str); 6] = [
    (
        "I1: Hook Question",
        "Intrigues the student about the reading",
    ),
    (
        "BQ1: Recall Question",
        "Simple retrieve and recall question with a discrete answer",
    ),
    (
        "P1: Probing Question (Follow-up to BQ1)",
        "Follow-up probing question for Question 2",
    ),
    (
        "BQ2: Analytical Question",
        "More challenging analytical question requiring synthesis",
    ),
    (
        "P2: Probing Question (Follow-up to BQ2)",
        "Probing question based on the student's response to Question 4",
    ),
    (
        "BQ3: Open-ended Question",
        "Abstract, open-ended question to stimulate creativity",
    ),
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConceptFilter {
    /// Every conversation
    All,
    /// Teacher-selected questions (assignment carries concepts)
    TeacherSelected,
    /// 100% AI selected questions (no concepts)
    AiSelected,
}

impl ConceptFilter {
    pub fn matches(self, row: &SummaryRow) -> bool {
        match self {
            ConceptFilter::All => true,
            ConceptFilter::TeacherSelected => row.has_concepts,
            ConceptFilter::AiSelected => !row.has_concepts,
        }
    }
}

pub fn filter_rows(rows: &[SummaryRow], filter: ConceptFilter) -> Vec<&SummaryRow> {
    rows.iter().filter(|row| filter.matches(row)).collect()
}

pub fn picker_label(row: &SummaryRow) -> String {
    format!(
        "Conversation {} - {}",
        row.conversation_id,
        row.assignment_name.as_deref().unwrap_or("(untitled assignment)")
    )
}

/// Label and description for the question at `index`. The flow assumes six
/// questions but the data does not enforce it, so later positions get a
/// generic label instead of truncating the transcript.
pub fn question_label(index: usize) -> (String, String) {
    match QUESTION_TAXONOMY.get(index) {
        Some((label, description)) => ((*label).to_owned(), (*description).to_owned()),
        None => (
            format!("Q{}: Additional Question", index + 1),
            "Question beyond the six-step flow".to_owned(),
        ),
    }
}

/// Concept the teacher attached to this question position, if any.
pub fn flow_concept(conv: &Conversation, index: usize) -> Option<&str> {
    conv.assignment
        .conversation_flow
        .as_ref()?
        .get(index)?
        .concept
        .as_deref()
        .filter(|concept| !concept.is_empty())
}

pub fn reading_panel_title(row: &SummaryRow) -> &'static str {
    if row.assignment_type.as_deref() == Some(READING_RESPONSES) {
        "Reading"
    } else {
        "Student Work"
    }
}

pub fn render_metadata(row: &SummaryRow) -> String {
    let mut out = String::new();
    let missing = "(not recorded)";
    let _ = writeln!(out, "Assignment: {}", row.assignment_name.as_deref().unwrap_or(missing));
    let _ = writeln!(out, "Subject:    {}", row.assignment_subject.as_deref().unwrap_or(missing));
    let _ = writeln!(out, "Grade:      {}", row.assignment_grade.as_deref().unwrap_or(missing));
    let _ = writeln!(out, "Type:       {}", row.assignment_type.as_deref().unwrap_or(missing));
    let _ = writeln!(out, "Student:    {}", row.student_name.as_deref().unwrap_or(missing));
    let _ = writeln!(out, "Teacher:    {}", row.teacher_name.as_deref().unwrap_or(missing));
    let concepts = row.concept_list();
    if !concepts.is_empty() {
        let _ = writeln!(out, "Concepts:   {}", concepts.join(", "));
    }
    out
}

pub fn render_questions(conv: &Conversation) -> String {
    let mut out = String::new();
    for (index, question) in conv.questions.iter().enumerate() {
        let (label, description) = question_label(index);
        let _ = writeln!(out, "[{label}]");
        let _ = writeln!(out, "Question Type: {description}");
        if let Some(concept) = flow_concept(conv, index) {
            let _ = writeln!(out, "Teacher asked AI to include this concept: {concept}");
        }
        let _ = writeln!(out, "Question:");
        let _ = writeln!(out, "{}", question.question);
        let _ = writeln!(out, "Student Response:");
        let _ = writeln!(out, "{}", question.response);
        if let Some(improved) = question
            .improved_response
            .as_deref()
            .filter(|text| !text.is_empty())
        {
            let _ = writeln!(out, "Improved Response (GPT-improved):");
            let _ = writeln!(out, "{improved}");
        }
        let _ = writeln!(out);
    }
    out
}

pub fn render_reading(row: &SummaryRow) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", reading_panel_title(row));
    match row.student_reading.as_deref().filter(|text| !text.is_empty()) {
        Some(text) => {
            let _ = writeln!(out, "{text}");
        }
        None => {
            let _ = writeln!(out, "No student work/reading available for this conversation.");
        }
    }
    out
}

pub fn render_conversation(row: &SummaryRow, conv: &Conversation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    out.push_str(&render_metadata(row));
    let _ = writeln!(out, "{}", "-".repeat(60));
    out.push_str(&render_questions(conv));
    out.push_str(&render_reading(row));
    out
}
