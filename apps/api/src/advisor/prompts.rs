// Prompt builders for the advisor endpoints.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::advisor::budget::{BudgetRequest, BudgetType, COLLEGE_SHARE, PG_SHARE};
use crate::advisor::guidance::GuidanceRequest;
use crate::llm_client::prompts::{format_inr, join_or, JSON_ARRAY_ONLY, JSON_OBJECT_ONLY};

const NOT_SPECIFIED: &str = "Not specified";

fn profile(req: &GuidanceRequest) -> String {
    let budget = req.budget.map(format_inr);
    format!(
        "- Interests: {}\n- Strengths: {}\n- Goals: {}\n- Budget: {}\n- Location: {}",
        join_or(&req.interests, NOT_SPECIFIED),
        join_or(&req.strengths, NOT_SPECIFIED),
        join_or(&req.goals, NOT_SPECIFIED),
        budget.as_deref().unwrap_or(NOT_SPECIFIED),
        req.location_or(NOT_SPECIFIED),
    )
}

const GUIDANCE_SCHEMA: &str = r#"{
  "recommendedStream": "Science" | "Commerce" | "Arts",
  "streamReason": "Brief explanation for stream recommendation",
  "careers": [
    {
      "name": "Career name",
      "description": "Detailed description",
      "whyRecommended": "Why this career matches the user",
      "salaryInsights": [
        {"year": 0, "minSalary": 300000, "avgSalary": 500000, "maxSalary": 800000},
        {"year": 5, "minSalary": 600000, "avgSalary": 1000000, "maxSalary": 1500000},
        {"year": 10, "minSalary": 1200000, "avgSalary": 2000000, "maxSalary": 3000000}
      ]
    }
  ],
  "colleges": [
    {"name": "College name", "description": "Brief description", "city": "City name",
     "state": "State name", "fees": 500000, "courses": ["Course 1"], "website": "https://example.com"}
  ],
  "coaching": [
    {"name": "Coaching center name", "description": "Brief description", "city": "City name",
     "state": "State name", "phone": "Phone number", "website": "https://example.com"}
  ],
  "pgs": [
    {"name": "PG name", "description": "Brief description", "address": "Full address",
     "city": "City name", "monthlyRent": 15000, "amenities": ["WiFi", "Food"]}
  ],
  "recommendations": [
    {"college": {"name": "College name", "fees": 500000},
     "pg": {"name": "PG name", "monthlyRent": 15000},
     "totalCost": 680000}
  ]
}"#;

/// Structured guidance, parsed as a JSON object.
pub fn guidance(req: &GuidanceRequest) -> String {
    let location = req.location_or("India");
    format!(
        "You are a career guidance counselor. Based on the following information, \
         provide detailed career recommendations.\n\n\
         User Information:\n{profile}\n\n\
         {JSON_OBJECT_ONLY}\n\n\
         Return the response in this exact JSON format:\n{GUIDANCE_SCHEMA}\n\n\
         Requirements:\n\
         - Provide at least 5 careers, 5 colleges, 5 coaching centers and 5 PG options\n\
         - Colleges, coaching centers and PGs must be relevant to {location}\n\
         - Salary figures are annual amounts in INR\n\
         - Package recommendations combine one college and one PG; totalCost is \
         annual fees plus 12 months of rent\n\n\
         Return ONLY the JSON object, no other text.",
        profile = profile(req),
    )
}

/// Free-form guidance for the streaming endpoint.
pub fn guidance_stream(req: &GuidanceRequest) -> String {
    format!(
        "You are a career guidance counselor. Based on the following information, \
         provide detailed career recommendations:\n\n{}\n\n\
         Provide a comprehensive career guidance response with:\n\
         1. Recommended stream (Science, Commerce, or Arts) with reasoning\n\
         2. List of recommended careers with descriptions and salary insights\n\
         3. List of recommended colleges\n\
         4. List of recommended coaching centers\n\
         5. List of recommended PG options\n\
         6. Complete package recommendations (college + PG combinations)\n\n\
         Format your response in a clear, structured way.",
        profile(req)
    )
}

/// Salary progression for one career, parsed as a JSON array.
pub fn salary_insights(career: &str) -> String {
    format!(
        "Provide salary insights for the career: {career} in India.\n\n\
         {JSON_ARRAY_ONLY}\n\n\
         Return one entry for each of the years 0, 5, 10, 15 and 20 of experience, \
         in this exact format:\n\
         [\n  {{\"year\": 0, \"minSalary\": 300000, \"avgSalary\": 500000, \"maxSalary\": 800000}},\n  \
         {{\"year\": 5, \"minSalary\": 600000, \"avgSalary\": 1000000, \"maxSalary\": 1500000}}\n]\n\n\
         Provide realistic annual salary data in INR (Indian Rupees) based on the current \
         Indian job market. Return ONLY the JSON array, no other text."
    )
}

const BUDGET_SCHEMA: &str = r#"{
  "colleges": [
    {"id": "unique-id-1", "name": "College name", "city": "City name", "state": "State name",
     "fees": 500000, "courses": ["Course 1", "Course 2"], "website": "https://example.com",
     "description": "Brief description"}
  ],
  "pgs": [
    {"id": "unique-id-1", "name": "PG name", "address": "Full address", "city": "City name",
     "monthlyRent": 15000, "ownerName": "Owner name", "ownerPhone": "Phone number",
     "amenities": ["WiFi", "AC", "Food"], "description": "Brief description"}
  ],
  "recommendations": [
    {"college": {"name": "College name", "city": "City name", "state": "State name", "fees": 500000},
     "pg": {"name": "PG name", "monthlyRent": 15000},
     "totalCost": 680000}
  ]
}"#;

/// College/PG proposals within a budget, parsed as a JSON object.
pub fn budget(req: &BudgetRequest) -> String {
    let location = req.location();
    let total = format_inr(req.total_budget);
    let allocation = match req.budget_type {
        BudgetType::Both => format!(
            "College: 70% ({}), PG: 30% ({})",
            format_inr(req.total_budget * COLLEGE_SHARE),
            format_inr(req.total_budget * PG_SHARE),
        ),
        BudgetType::College | BudgetType::Pg => format!("Full budget: {total}"),
    };

    let mut requirements = Vec::new();
    if req.budget_type.includes_colleges() {
        let share = if req.budget_type == BudgetType::Both {
            "70% of total budget"
        } else {
            "full budget"
        };
        requirements.push(format!(
            "- Provide at least 10 colleges within budget ({share}) in {location}"
        ));
    }
    if req.budget_type.includes_pgs() {
        let share = if req.budget_type == BudgetType::Both {
            "30% of total budget annually"
        } else {
            "full budget annually"
        };
        requirements.push(format!(
            "- Provide at least 10 PG options within budget ({share}) in {location}"
        ));
    }
    if req.budget_type == BudgetType::Both {
        requirements.push(format!(
            "- Provide at least 15 best college + PG combinations where total cost \
             (college fees + annual PG rent) is within {total}"
        ));
    }

    format!(
        "You are a budget planning advisor for students. Based on the following budget \
         requirements, provide detailed recommendations.\n\n\
         Budget Requirements:\n\
         - Budget Type: {budget_type}\n\
         - Total Budget: {total}\n\
         - Location: {location}\n\
         - Budget Allocation: {allocation}\n\n\
         {JSON_OBJECT_ONLY}\n\n\
         Return the response in this exact JSON format:\n{BUDGET_SCHEMA}\n\n\
         Requirements:\n{requirements}\n\
         - All recommendations must be realistic and relevant to {location}\n\
         - College fees should be annual fees\n\
         - PG monthly rent should be realistic for {location}\n\
         - Sort recommendations by total cost (lowest first)\n\n\
         Return ONLY the JSON object, no other text.",
        budget_type = req.budget_type.as_str(),
        requirements = requirements.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guidance_request() -> GuidanceRequest {
        GuidanceRequest {
            interests: vec!["Biology".into(), "Chemistry".into()],
            strengths: vec![],
            goals: vec!["Doctor".into()],
            budget: Some(250_000.0),
            location: None,
        }
    }

    #[test]
    fn test_guidance_prompt_renders_profile() {
        let prompt = guidance(&guidance_request());
        assert!(prompt.contains("- Interests: Biology, Chemistry"));
        assert!(prompt.contains("- Strengths: Not specified"));
        assert!(prompt.contains("- Budget: ₹250,000"));
        assert!(prompt.contains("- Location: Not specified"));
        assert!(prompt.contains("relevant to India"));
        assert!(prompt.contains(JSON_OBJECT_ONLY));
    }

    #[test]
    fn test_salary_prompt_names_the_career() {
        let prompt = salary_insights("Data Scientist");
        assert!(prompt.contains("career: Data Scientist in India"));
        assert!(prompt.contains(JSON_ARRAY_ONLY));
    }

    #[test]
    fn test_budget_prompt_splits_allocation_for_both() {
        let req = BudgetRequest {
            budget_type: BudgetType::Both,
            total_budget: 1_000_000.0,
            city: Some("Pune".into()),
            state: Some("Maharashtra".into()),
        };
        let prompt = budget(&req);
        assert!(prompt.contains("College: 70% (₹700,000), PG: 30% (₹300,000)"));
        assert!(prompt.contains("Location: Pune, Maharashtra"));
        assert!(prompt.contains("at least 15 best college + PG combinations"));
    }

    #[test]
    fn test_budget_prompt_for_pg_only_skips_colleges() {
        let req = BudgetRequest {
            budget_type: BudgetType::Pg,
            total_budget: 120_000.0,
            city: None,
            state: None,
        };
        let prompt = budget(&req);
        assert!(prompt.contains("Full budget: ₹120,000"));
        assert!(!prompt.contains("at least 10 colleges"));
        assert!(prompt.contains("at least 10 PG options within budget (full budget annually) in India"));
    }
}
