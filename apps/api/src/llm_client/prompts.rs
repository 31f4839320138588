// Shared prompt fragments and formatting helpers.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every prompt whose answer is parsed as a JSON object.
pub const JSON_OBJECT_ONLY: &str = "IMPORTANT: You must respond with ONLY valid JSON. \
    Do not include any explanatory text before or after the JSON. \
    Your response must start with { and end with }.";

/// Appended to every prompt whose answer is parsed as a JSON array.
pub const JSON_ARRAY_ONLY: &str = "IMPORTANT: You must respond with ONLY a valid JSON array. \
    Do not include any explanatory text before or after the JSON. \
    Your response must start with [ and end with ].";

/// Formats a rupee amount with thousands separators, dropping paise.
pub fn format_inr(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-₹{grouped}")
    } else {
        format!("₹{grouped}")
    }
}

/// Renders a list for a prompt, or `fallback` when it is empty.
pub fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}
