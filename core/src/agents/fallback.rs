//! Rule-based answers used when no provider produced a reply.
//!
//! Rules are checked in order and the first keyword hit wins, so a message
//! mentioning both "timer" and "stress" gets the Pomodoro answer.

const POMODORO: &str = "The Pomodoro Technique uses 25-minute focused work sessions followed by 5-minute breaks. This helps maintain concentration and prevents mental fatigue. Try setting a timer for 25 minutes and focus solely on your task!";

const MOTIVATION: &str = "Remember, every expert was once a beginner. Your progress might feel slow, but consistency beats perfection. Take it one step at a time, celebrate small wins, and trust the process. You're building something amazing!";

const MEMORY: &str = "Active recall and spaced repetition are powerful memory techniques. Instead of just re-reading, try testing yourself on the material. Review concepts at increasing intervals - this strengthens neural pathways and improves long-term retention.";

const FOCUS: &str = "To improve focus: eliminate distractions, use the Pomodoro Technique, take regular breaks, stay hydrated, and create a dedicated study environment. Your brain works best when it can fully engage with one task at a time.";

const STRESS: &str = "It's normal to feel stressed about studies. Practice deep breathing, take regular breaks, maintain a consistent sleep schedule, and remember that your worth isn't defined by academic performance. You've got this!";

const PLANNING: &str = "Effective study planning involves: identifying your most important tasks, scheduling them during your peak energy hours, building in buffer time for unexpected challenges, and reviewing your plan daily. Start with 2-3 main priorities per day.";

pub const CATCH_ALL: &str = "That's an interesting question! While I can provide general study advice, for specific academic questions, I'd recommend consulting your course materials or instructor. Is there something specific about study techniques or learning strategies I can help you with?";

/// Answer category, in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Pomodoro,
    Motivation,
    Memory,
    Focus,
    Stress,
    Planning,
    General,
}

struct Rule {
    category: Category,
    keywords: &'static [&'static str],
    answer: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        category: Category::Pomodoro,
        keywords: &["pomodoro", "timer"],
        answer: POMODORO,
    },
    Rule {
        category: Category::Motivation,
        keywords: &["motivation", "motivated", "tired", "bored"],
        answer: MOTIVATION,
    },
    Rule {
        category: Category::Memory,
        keywords: &["memory", "remember"],
        answer: MEMORY,
    },
    Rule {
        category: Category::Focus,
        keywords: &["focus", "concentration"],
        answer: FOCUS,
    },
    Rule {
        category: Category::Stress,
        keywords: &["stress", "anxiety"],
        answer: STRESS,
    },
    Rule {
        category: Category::Planning,
        keywords: &["schedule", "planning"],
        answer: PLANNING,
    },
];

/// First matching category, or [`Category::General`].
pub fn classify(message: &str) -> Category {
    let lowered = message.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|rule| rule.category)
        .unwrap_or(Category::General)
}

/// Canned answer for `message`. Total: every input yields a non-empty string.
pub fn respond(message: &str) -> &'static str {
    let category = classify(message);
    RULES
        .iter()
        .find(|rule| rule.category == category)
        .map(|rule| rule.answer)
        .unwrap_or(CATCH_ALL)
}
