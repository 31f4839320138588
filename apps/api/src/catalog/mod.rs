//! Catalog: read access to careers, salary insights, colleges, coaching
//! centers and PGs.
//!
//! `AppState` holds an `Arc<dyn CatalogStore>`. Production uses
//! `PgCatalog`; tests swap in an in-memory store and count calls.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::catalog::{
    Career, CareerDetail, CareerOverview, CareerWithInsights, CoachingDetail,
    CoachingWithCareers, CollegeSummary, Level, Pg, SalaryInsight, Stream,
};

pub mod handlers;
pub mod postgres;
pub mod salary;
#[cfg(test)]
pub mod testing;

pub use postgres::PgCatalog;

/// Which records a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every record, paid or not.
    All,
    /// Only records flagged as part of the free tier (`is_paid = false`).
    FreeTier,
}

impl Visibility {
    pub fn includes_paid(self) -> bool {
        matches!(self, Visibility::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CareerFilter {
    pub level: Option<Level>,
    pub stream: Option<Stream>,
    pub visibility: Visibility,
}

impl CareerFilter {
    pub fn level(level: Level, visibility: Visibility) -> Self {
        Self {
            level: Some(level),
            stream: None,
            visibility,
        }
    }

    pub fn stream(stream: Stream, visibility: Visibility) -> Self {
        Self {
            level: None,
            stream: Some(stream),
            visibility,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn matches(&self, career: &Career) -> bool {
        self.level.map_or(true, |l| career.level == l.as_str())
            && self
                .stream
                .map_or(true, |s| career.stream.as_deref() == Some(s.as_str()))
            && (self.visibility.includes_paid() || !career.is_paid)
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Careers ordered by name.
    async fn careers(&self, filter: CareerFilter) -> Result<Vec<Career>, AppError>;

    /// Careers ordered by name, each with its salary insights by ascending year.
    async fn careers_with_insights(
        &self,
        filter: CareerFilter,
    ) -> Result<Vec<CareerWithInsights>, AppError>;

    /// Careers ordered by name with insights and linked coaching centers.
    async fn stream_careers(&self, filter: CareerFilter) -> Result<Vec<CareerOverview>, AppError>;

    /// One career with insights and linked coaching centers, regardless of tier.
    async fn career_overview(&self, id: Uuid) -> Result<Option<CareerOverview>, AppError>;

    /// A career with insights, coaching centers and their PGs. PGs follow
    /// `visibility`; with `FreeTier` a paid career is reported as absent.
    async fn career_detail(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<CareerDetail>, AppError>;

    async fn salary_insights(&self, career_id: Uuid) -> Result<Vec<SalaryInsight>, AppError>;

    /// Up to `limit` colleges ordered by name.
    async fn colleges(&self, limit: i64) -> Result<Vec<CollegeSummary>, AppError>;

    async fn coaching_for_career(
        &self,
        career_id: Uuid,
    ) -> Result<Vec<CoachingWithCareers>, AppError>;

    async fn coaching_detail(&self, id: Uuid) -> Result<Option<CoachingDetail>, AppError>;

    /// PGs attached to a coaching center in its city or state, nearest first.
    /// `None` when the coaching center does not exist.
    async fn nearby_pgs(&self, coaching_id: Uuid) -> Result<Option<Vec<Pg>>, AppError>;
}
