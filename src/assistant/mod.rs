//! The side-panel loan assistant.
//!
//! Keyword lookup over a fixed response table — no model, no network. The
//! first keyword contained in the lowercased query wins; anything else gets
//! the customer-service referral.

/// Greeting shown before the user has asked anything.
pub const GREETING: &str =
    "Hello! I'm your Finesse Bank virtual assistant. How can I help you with your loan-related questions today?";

const FALLBACK: &str = "I'm sorry, I don't have specific information about that. Please contact our customer service at support@finessebank.com for assistance with your query.";

const RESPONSES: [(&str, &str); 9] = [
    (
        "interest rates",
        "Our current interest rates range from 7.5% to 12.5% depending on your credit score, loan amount, and repayment term.",
    ),
    (
        "loan term",
        "We offer flexible loan terms ranging from 1 to 7 years for personal loans, and up to 30 years for home loans.",
    ),
    (
        "documents required",
        "You'll need to provide proof of identity (Aadhaar/PAN), proof of income (salary slips/IT returns), and address proof. Additional documents may be required based on your loan type.",
    ),
    (
        "loan amount",
        "Personal loans range from \u{20b9}50,000 to \u{20b9}25 lakhs, while home loans can go up to \u{20b9}5 crores depending on your eligibility and property value.",
    ),
    (
        "processing time",
        "Once all documents are verified, personal loans are typically processed within 48-72 hours, and home loans within 5-7 working days.",
    ),
    (
        "processing fee",
        "The processing fee is 1-2% of the loan amount, subject to a minimum of \u{20b9}1,500 and maximum of \u{20b9}25,000.",
    ),
    (
        "eligibility",
        "Eligibility depends on factors like age (21-65 years), income stability, credit score (700+), and existing financial obligations.",
    ),
    (
        "repayment options",
        "We offer flexible repayment options including ECS, PDC, or direct debit from your bank account.",
    ),
    (
        "prepayment",
        "Partial or full prepayment is allowed after 6 months from disbursement, with a nominal prepayment charge of 2-3% on the prepaid amount.",
    ),
];

/// Answers a free-text query from the response table.
pub fn answer(query: &str) -> &'static str {
    let query = query.to_lowercase();
    RESPONSES
        .iter()
        .find(|(keyword, _)| query.contains(keyword))
        .map(|(_, response)| *response)
        .unwrap_or(FALLBACK)
}

/// One line of the assistant conversation.
#[derive(Debug, Clone)]
pub struct ChatLine {
    pub from_user: bool,
    pub message: String,
}

/// Conversation history for the side panel.
#[derive(Debug)]
pub struct Conversation {
    lines: Vec<ChatLine>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            lines: vec![ChatLine {
                from_user: false,
                message: GREETING.into(),
            }],
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }

    /// Records a query and its answer. Blank queries are ignored.
    pub fn ask(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.record(query, answer(query));
    }

    /// Appends an exchange whose answer was produced elsewhere.
    pub fn record(&mut self, query: &str, response: &str) {
        self.lines.push(ChatLine {
            from_user: true,
            message: query.into(),
        });
        self.lines.push(ChatLine {
            from_user: false,
            message: response.into(),
        });
    }
}
