// Cross-cutting text shared by every caller of the LLM client.
// Feature modules keep their own prompt builders alongside them.

/// Returned when no usable API key could be resolved.
pub const NOT_CONFIGURED_MESSAGE: &str = "I apologize, but the AI service is not properly \
    configured. Please contact the administrator.";

/// Returned for every upstream failure the rotation protocol could not recover.
pub const UNAVAILABLE_MESSAGE: &str =
    "I apologize, but I'm having trouble connecting to the AI interviewer right now.";

/// Returned for a malformed interview turn. Keeps the session alive.
pub const INVALID_TURN_MESSAGE: &str =
    "I encountered an error processing that. Please try again.";
