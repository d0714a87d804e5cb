//! The static interview script. Sessions take a prefix of this list at
//! creation time and never look at the catalog again.

/// Default interview questions, asked in order.
pub const DEFAULT_QUESTIONS: &[&str] = &[
    "Tell me about yourself and what draws you to this role.",
    "Describe a challenging project you worked on. What made it difficult?",
    "Tell me about a time you disagreed with a teammate. How did you resolve it?",
    "What is a technical decision you made that you later regretted, and why?",
    "How do you approach learning a technology you have never used before?",
    "Describe a time you had to deliver under a tight deadline. What did you trade off?",
    "Tell me about a time you received difficult feedback. How did you respond?",
    "What accomplishment are you most proud of, and what was your specific contribution?",
    "Describe a situation where you had to influence a decision without formal authority.",
    "Where do you want to grow in the next few years, and how does this role fit?",
];

/// How many questions a session gets when the caller does not say.
pub const DEFAULT_QUESTION_COUNT: usize = 3;

/// Selects the first `count` catalog questions. Out-of-range counts are
/// silently clamped to `[1, catalog.len()]`, never rejected.
pub fn select(catalog: &[String], count: Option<usize>) -> Vec<String> {
    let count = count
        .unwrap_or(DEFAULT_QUESTION_COUNT)
        .clamp(1, catalog.len());
    catalog[..count].to_vec()
}

pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}
