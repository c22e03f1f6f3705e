//! Canonical English phrases.
//!
//! Every user-visible string starts as one of these and is resolved
//! through the Localization Store per turn; when no localized entry
//! exists the canonical text is sent verbatim.

pub const CHOOSE_LANGUAGE_BODY: &str = "Please choose your preferred language.";
pub const CHOOSE_LANGUAGE_BUTTON: &str = "Choose Language";

pub const CHOOSE_DOCUMENT_BODY: &str = "Please specify which document you have a question about.";
pub const CHOOSE_DOCUMENT_BUTTON: &str = "Choose Document";
pub const CHOOSE_DOCUMENT_FOOTER: &str = "To ask about another document, choose Change Policy.";

pub const ASK_QUESTION_PROMPT: &str = "Please ask your question related to";
pub const INVALID_DOCUMENT: &str = "Invalid document. Please upload your document and try again.";
pub const NO_DOCUMENTS: &str = "No documents found. Please upload a document first.";
pub const NOT_AUTHORIZED: &str = "You do not have such a document.";

pub const FAQ_BUTTON: &str = "Common Questions";

pub const CHANGE_POLICY: &str = "Change Policy";
pub const END_CONVERSATION: &str = "End Conversation";
pub const CONTINUE_ASKING: &str = "Continue Asking";
pub const FOLLOW_UP_BODY: &str = "What would you like to do next?";

pub const WAS_THIS_HELPFUL: &str = "Was this helpful?";
pub const YES: &str = "Yes";
pub const NO: &str = "No";
pub const THANKS_FEEDBACK: &str = "Thank you for your feedback!";

pub const FALLBACK: &str = "Please follow the instructions to continue.";
