//! Generation prompts. Each strategy is a pure function of its input so the
//! three variants share one frame and cannot drift apart.

use serpent_core::types::{format_transcript, Message};

/// Everything a prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub context: &'a [String],
    pub history: &'a [Message],
    pub summary: Option<&'a str>,
    pub question: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStrategy {
    /// Plain question answering.
    QuestionAnswer,
    /// Descriptive report on a recognised species.
    SpeciesDescription,
    /// Question about a recognised species, with follow-up suggestions.
    SpeciesQuestion,
}

const FOLLOW_UP_TOPICS: &[&str] = &[
    "Scientific name and common name",
    "Taxonomy",
    "Morphological characteristics",
    "Toxicology",
    "Predation behavior",
    "Behavior and ecology",
    "Geographic distribution and habitat",
    "Reproduction",
    "Conservation status",
    "Research value",
    "Human relevance",
    "Symptoms when bitten",
    "How to handle",
];

impl PromptStrategy {
    pub fn render(self, input: &PromptInput<'_>) -> String {
        let mut prompt = String::from(
            "You are a snake expert assistant. Use the context information and chat history to answer the user's question naturally and professionally.\n",
        );
        if let Some(summary) = input.summary.filter(|s| !s.trim().is_empty()) {
            prompt.push_str(&format!("\nConversation Summary:\n{summary}\n"));
        }
        let history = if input.history.is_empty() {
            "(No previous messages)".to_string()
        } else {
            format_transcript(input.history)
        };
        prompt.push_str(&format!("\nRecent Chat History:\n{history}\n\n"));
        let context = render_context(input.context);
        prompt.push_str(&match self {
            PromptStrategy::QuestionAnswer => question_answer(&context, input.question),
            PromptStrategy::SpeciesDescription => species_description(&context, input.question),
            PromptStrategy::SpeciesQuestion => species_question(&context, input.question),
        });
        prompt
    }
}

fn render_context(context: &[String]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Context {}: {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn question_answer(context: &str, question: &str) -> String {
    format!(
        "Context Information from Knowledge Base:\n{context}\n\n\
         Current Question: {question}\n\n\
         Instructions:\n\
         - Answer naturally as an expert without mentioning \"based on context\" or \"according to the information\"\n\
         - Consider the chat history to provide contextually relevant responses\n\
         - If the question refers to previous messages, use that context appropriately\n\
         - Suggest 3-5 related questions the user might want to explore\n\
         - Format your response clearly with appropriate sections\n\n\
         Response:"
    )
}

fn species_description(context: &str, request: &str) -> String {
    format!(
        "Consider yourself a professional herpetologist (snake expert). Answer as a true expert, \
         delivering professional, confident and natural scientific answers without referring to any source.\n\n\
         Context Information:\n{context}\n\n\
         Question:\n{request}\n\n\
         Please provide a detailed and comprehensive answer in a scientific descriptive format.\n\
         Formatting requirements:\n\
         - Snake names are capitalized; the scientific name is italicized, followed by the common name if any\n\
         - Divide the content into numbered sections such as Identifying characteristics, Distribution, Habits\n\
         - Write short, well-structured paragraphs without Markdown syntax\n\
         At the end of your answer, suggest a few related questions the user might want to ask next, \
         then invite the user to choose one."
    )
}

fn species_question(context: &str, question: &str) -> String {
    format!(
        "Consider yourself a snake expert and answer like one, without saying that the answer relies on any provided information.\n\n\
         Context Information:\n{context}\n\n\
         Question: {question}\n\n\
         Please provide a detailed answer. If the information is not enough to answer the question, say so.\n\
         Then suggest 3 to 5 follow-up questions drawn from these topics and ask which one the user wants next:\n{}",
        FOLLOW_UP_TOPICS.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
    )
}

/// Search string for an image-only turn.
pub fn description_search(species: &str) -> String {
    format!(
        "Describe the snake species {species} in detail, including:\n\
         1. Identifying characteristics (color, shape, size)\n\
         2. Habitat and geographic distribution\n\
         3. Danger level (venomous or not, toxicity)\n"
    )
}

/// Search string for an image turn that carries a question.
pub fn species_question_search(species: &str, question: &str) -> String {
    format!(
        "This is the snake species {species}.\nUser question: {question}\n\n\
         Answer the question above using information about {species}. If the question touches other aspects \
         (comparison, classification and so on), provide accurate related information."
    )
}
