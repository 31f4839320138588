//! In-memory `CatalogStore` for unit tests. Every trait call bumps `calls`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::salary::aggregate_by_year;
use crate::catalog::{CareerFilter, CatalogStore, Visibility};
use crate::errors::AppError;
use crate::models::catalog::{
    Career, CareerDetail, CareerOverview, CareerWithInsights, Coaching, CoachingDetail,
    CoachingWithCareers, CoachingWithPgs, CollegeSummary, Level, Pg, SalaryInsight, Stream,
};

#[derive(Default)]
pub struct FakeCatalog {
    pub careers: Vec<Career>,
    pub insights: Vec<SalaryInsight>,
    pub coaching: Vec<Coaching>,
    /// (career id, coaching id)
    pub links: Vec<(Uuid, Uuid)>,
    pub pgs: Vec<Pg>,
    pub colleges: Vec<CollegeSummary>,
    /// When set, every call fails with a database error.
    pub failing: bool,
    pub call_count: AtomicUsize,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub fn career(name: &str, level: Level, stream: Option<Stream>, is_paid: bool) -> Career {
    Career {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        stream: stream.map(|s| s.as_str().to_string()),
        level: level.as_str().to_string(),
        is_paid,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn insight(career_id: Uuid, year: i32, avg: f64) -> SalaryInsight {
    SalaryInsight {
        id: Uuid::new_v4(),
        career_id,
        year,
        min_salary: avg * 0.8,
        avg_salary: avg,
        max_salary: avg * 1.2,
    }
}

pub fn coaching(name: &str, city: &str) -> Coaching {
    Coaching {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        website: None,
        address: None,
        city: Some(city.to_string()),
        state: None,
        pincode: None,
        phone: None,
        email: None,
        is_paid: false,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

pub fn pg(name: &str, coaching_id: Uuid, city: &str, distance: f64, is_paid: bool) -> Pg {
    Pg {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        address: None,
        city: Some(city.to_string()),
        state: None,
        owner_name: None,
        owner_phone: None,
        owner_email: None,
        monthly_rent: 8000.0,
        amenities: vec!["WiFi".to_string()],
        coaching_id: Some(coaching_id),
        distance: Some(distance),
        is_paid,
        created_at: epoch(),
    }
}

pub fn college(name: &str) -> CollegeSummary {
    CollegeSummary {
        id: Uuid::new_v4(),
        name: name.to_string(),
        city: Some("Pune".to_string()),
        state: Some("Maharashtra".to_string()),
        stream: Some("Science".to_string()),
    }
}

impl FakeCatalog {
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn filtered(&self, filter: &CareerFilter) -> Vec<Career> {
        let mut careers: Vec<Career> = self
            .careers
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        careers.sort_by(|a, b| a.name.cmp(&b.name));
        careers
    }

    fn insights_for(&self, career_id: Uuid) -> Vec<SalaryInsight> {
        let mut insights: Vec<SalaryInsight> = self
            .insights
            .iter()
            .filter(|i| i.career_id == career_id)
            .cloned()
            .collect();
        insights.sort_by_key(|i| i.year);
        insights
    }

    fn coaching_of(&self, career_id: Uuid) -> Vec<Coaching> {
        self.coaching
            .iter()
            .filter(|c| self.links.contains(&(career_id, c.id)))
            .cloned()
            .collect()
    }

    fn careers_of(&self, coaching_id: Uuid) -> Vec<Career> {
        self.careers
            .iter()
            .filter(|k| self.links.contains(&(k.id, coaching_id)))
            .cloned()
            .collect()
    }

    fn overview(&self, career: Career) -> CareerOverview {
        CareerOverview {
            salary_insights: self.insights_for(career.id),
            coaching: self.coaching_of(career.id),
            career,
        }
    }

    fn with_insights(&self, careers: Vec<Career>) -> Vec<CareerWithInsights> {
        careers
            .into_iter()
            .map(|career| CareerWithInsights {
                salary_insights: self.insights_for(career.id),
                career,
            })
            .collect()
    }
}

#[async_trait]
impl CatalogStore for FakeCatalog {
    async fn careers(&self, filter: CareerFilter) -> Result<Vec<Career>, AppError> {
        self.record_call()?;
        Ok(self.filtered(&filter))
    }

    async fn careers_with_insights(
        &self,
        filter: CareerFilter,
    ) -> Result<Vec<CareerWithInsights>, AppError> {
        self.record_call()?;
        Ok(self.with_insights(self.filtered(&filter)))
    }

    async fn stream_careers(&self, filter: CareerFilter) -> Result<Vec<CareerOverview>, AppError> {
        self.record_call()?;
        Ok(self
            .filtered(&filter)
            .into_iter()
            .map(|career| self.overview(career))
            .collect())
    }

    async fn career_overview(&self, id: Uuid) -> Result<Option<CareerOverview>, AppError> {
        self.record_call()?;
        Ok(self
            .careers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(|career| self.overview(career)))
    }

    async fn career_detail(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<CareerDetail>, AppError> {
        self.record_call()?;
        let Some(career) = self
            .careers
            .iter()
            .find(|c| c.id == id && (visibility.includes_paid() || !c.is_paid))
            .cloned()
        else {
            return Ok(None);
        };
        let coaching = self
            .coaching_of(id)
            .into_iter()
            .map(|c| CoachingWithPgs {
                pgs: self
                    .pgs
                    .iter()
                    .filter(|p| {
                        p.coaching_id == Some(c.id) && (visibility.includes_paid() || !p.is_paid)
                    })
                    .cloned()
                    .collect(),
                coaching: c,
            })
            .collect();
        Ok(Some(CareerDetail {
            salary_insights: self.insights_for(id),
            career,
            coaching,
        }))
    }

    async fn salary_insights(&self, career_id: Uuid) -> Result<Vec<SalaryInsight>, AppError> {
        self.record_call()?;
        Ok(self.insights_for(career_id))
    }

    async fn colleges(&self, limit: i64) -> Result<Vec<CollegeSummary>, AppError> {
        self.record_call()?;
        let mut colleges = self.colleges.clone();
        colleges.sort_by(|a, b| a.name.cmp(&b.name));
        colleges.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(colleges)
    }

    async fn coaching_for_career(
        &self,
        career_id: Uuid,
    ) -> Result<Vec<CoachingWithCareers>, AppError> {
        self.record_call()?;
        Ok(self
            .coaching_of(career_id)
            .into_iter()
            .map(|c| CoachingWithCareers {
                careers: self.careers_of(c.id),
                coaching: c,
            })
            .collect())
    }

    async fn coaching_detail(&self, id: Uuid) -> Result<Option<CoachingDetail>, AppError> {
        self.record_call()?;
        let Some(coaching) = self.coaching.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };
        let careers = self.with_insights(self.careers_of(id));
        let salary_insights =
            aggregate_by_year(careers.iter().flat_map(|c| c.salary_insights.iter()));
        Ok(Some(CoachingDetail {
            coaching,
            careers,
            salary_insights,
        }))
    }

    async fn nearby_pgs(&self, coaching_id: Uuid) -> Result<Option<Vec<Pg>>, AppError> {
        self.record_call()?;
        let Some(coaching) = self.coaching.iter().find(|c| c.id == coaching_id) else {
            return Ok(None);
        };
        let mut pgs: Vec<Pg> = self
            .pgs
            .iter()
            .filter(|p| {
                p.coaching_id == Some(coaching_id)
                    && ((p.city.is_some() && p.city == coaching.city)
                        || (p.state.is_some() && p.state == coaching.state))
            })
            .cloned()
            .collect();
        pgs.sort_by(|a, b| {
            a.distance
                .unwrap_or(f64::MAX)
                .total_cmp(&b.distance.unwrap_or(f64::MAX))
        });
        Ok(Some(pgs))
    }
}
