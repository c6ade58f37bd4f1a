//! The interview script.
//!
//! Index 0 is the introduction recorded in its own wizard step; the rest run
//! back-to-back in the interview step. The final entry is informational — it
//! has no response prompt and a zero duration, so the flow never records for
//! it and the user simply continues to processing.

/// One scripted interview question.
#[derive(Debug)]
pub struct QuestionSpec {
    /// Stable identifier the recorded response is stored under.
    pub id: &'static str,
    /// What the virtual branch manager says.
    pub script: &'static str,
    /// Prompt over the record button. `None` marks an informational entry
    /// with nothing to record.
    pub response_prompt: Option<&'static str>,
    /// Hard cap on the response length, in seconds.
    pub max_duration_secs: u32,
}

impl QuestionSpec {
    /// Whether this entry records a response at all.
    pub fn records(&self) -> bool {
        self.response_prompt.is_some()
    }
}

pub const QUESTIONS: [QuestionSpec; 6] = [
    QuestionSpec {
        id: "introduction",
        script: "Hello, I'm your virtual branch manager at Finesse Bank. I'll be guiding you through the loan application process. Let's start with a brief introduction - please tell me your name and why you're applying for a loan today.",
        response_prompt: Some("Record your introduction"),
        max_duration_secs: 60,
    },
    QuestionSpec {
        id: "loan_amount",
        script: "Thank you. How much would you like to borrow, and what will be the purpose of this loan?",
        response_prompt: Some("Record your loan amount and purpose"),
        max_duration_secs: 45,
    },
    QuestionSpec {
        id: "employment",
        script: "Could you tell me about your current employment? Include your job title, employer name, and how long you've been working there.",
        response_prompt: Some("Record your employment details"),
        max_duration_secs: 60,
    },
    QuestionSpec {
        id: "income",
        script: "What is your monthly income, and do you have any additional sources of income?",
        response_prompt: Some("Record your income details"),
        max_duration_secs: 45,
    },
    QuestionSpec {
        id: "existing_debts",
        script: "Do you have any existing loans or credit card debts? If yes, please provide details including the outstanding amounts and monthly payments.",
        response_prompt: Some("Record your existing debt information"),
        max_duration_secs: 60,
    },
    QuestionSpec {
        id: "confirmation",
        script: "Thank you for providing all the information. I'll now process your application based on the details and documents you've shared. You'll receive the decision shortly.",
        response_prompt: None,
        max_duration_secs: 0,
    },
];
