use uuid::Uuid;

use crate::models::catalog::Stream;

/// What a caller below the paid tier gets on a gated route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreePolicy {
    /// Fixed 403.
    Restricted,
    /// A hardcoded sample dataset; no data access.
    Static,
    /// The same query restricted to free-tier records, cached under a free key.
    FreeQuery,
}

/// Every endpoint family the response gate protects, with its path parameter.
///
/// Each variant has its own route key: endpoints with different response
/// shapes never share cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedRoute {
    Class10Careers,
    Streams,
    Colleges,
    CoachingForCareer { career_id: Uuid },
    CoachingDetail { id: Uuid },
    CoachingPgs { id: Uuid },
    StreamCareers { stream: Stream },
    StreamCareerDetail { career_id: Uuid },
}

impl GatedRoute {
    pub fn route_key(&self) -> &'static str {
        match self {
            GatedRoute::Class10Careers => "class10",
            GatedRoute::Streams => "streams",
            GatedRoute::Colleges => "colleges",
            GatedRoute::CoachingForCareer { .. } => "coaching-career",
            GatedRoute::CoachingDetail { .. } => "coaching",
            GatedRoute::CoachingPgs { .. } => "coaching-pgs",
            GatedRoute::StreamCareers { .. } => "streams-Data",
            GatedRoute::StreamCareerDetail { .. } => "streams-Data2",
        }
    }

    /// Canonical text of the path parameter, if the route has one.
    pub fn param(&self) -> Option<String> {
        match self {
            GatedRoute::Class10Careers | GatedRoute::Streams | GatedRoute::Colleges => None,
            GatedRoute::CoachingForCareer { career_id }
            | GatedRoute::StreamCareerDetail { career_id } => Some(career_id.to_string()),
            GatedRoute::CoachingDetail { id } | GatedRoute::CoachingPgs { id } => {
                Some(id.to_string())
            }
            GatedRoute::StreamCareers { stream } => Some(stream.as_str().to_string()),
        }
    }

    pub fn free_policy(&self) -> FreePolicy {
        match self {
            GatedRoute::Class10Careers
            | GatedRoute::StreamCareers { .. }
            | GatedRoute::StreamCareerDetail { .. } => FreePolicy::FreeQuery,
            GatedRoute::Streams
            | GatedRoute::Colleges
            | GatedRoute::CoachingForCareer { .. }
            | GatedRoute::CoachingDetail { .. } => FreePolicy::Static,
            GatedRoute::CoachingPgs { .. } => FreePolicy::Restricted,
        }
    }

    /// `paid:<route>-paid[-<param>]`
    pub fn paid_key(&self) -> String {
        self.key("paid")
    }

    /// `free:<route>-free[-<param>]`
    pub fn free_key(&self) -> String {
        self.key("free")
    }

    fn key(&self, tier: &str) -> String {
        match self.param() {
            Some(param) => format!("{tier}:{}-{tier}-{param}", self.route_key()),
            None => format!("{tier}:{}-{tier}", self.route_key()),
        }
    }
}
