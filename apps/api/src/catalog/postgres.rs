use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::catalog::salary::aggregate_by_year;
use crate::catalog::{CareerFilter, CatalogStore, Visibility};
use crate::errors::AppError;
use crate::models::catalog::{
    Career, CareerDetail, CareerOverview, CareerWithInsights, Coaching, CoachingDetail,
    CoachingWithCareers, CoachingWithPgs, CollegeSummary, Pg, SalaryInsight,
};

/// `CatalogStore` over the Postgres schema in `migrations/`.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Salary insights for many careers at once, grouped by career.
    async fn insights_by_career(
        &self,
        career_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<SalaryInsight>>, AppError> {
        if career_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, SalaryInsight>(
            "SELECT * FROM salary_insights WHERE career_id = ANY($1) ORDER BY career_id, year ASC",
        )
        .bind(career_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<SalaryInsight>> = HashMap::new();
        for row in rows {
            grouped.entry(row.career_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn attach_insights(&self, careers: Vec<Career>) -> Result<Vec<CareerWithInsights>, AppError> {
        let ids: Vec<Uuid> = careers.iter().map(|c| c.id).collect();
        let mut insights = self.insights_by_career(&ids).await?;
        Ok(careers
            .into_iter()
            .map(|career| CareerWithInsights {
                salary_insights: insights.remove(&career.id).unwrap_or_default(),
                career,
            })
            .collect())
    }

    async fn overviews(&self, careers: Vec<Career>) -> Result<Vec<CareerOverview>, AppError> {
        let ids: Vec<Uuid> = careers.iter().map(|c| c.id).collect();
        let mut insights = self.insights_by_career(&ids).await?;

        let linked = sqlx::query_as::<_, LinkedCoaching>(
            r#"
            SELECT cc.career_id, c.* FROM coaching c
            JOIN career_coaching cc ON cc.coaching_id = c.id
            WHERE cc.career_id = ANY($1)
            ORDER BY c.name
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut coaching_by_career: HashMap<Uuid, Vec<Coaching>> = HashMap::new();
        for row in linked {
            coaching_by_career
                .entry(row.career_id)
                .or_default()
                .push(row.coaching);
        }

        Ok(careers
            .into_iter()
            .map(|career| CareerOverview {
                salary_insights: insights.remove(&career.id).unwrap_or_default(),
                coaching: coaching_by_career.remove(&career.id).unwrap_or_default(),
                career,
            })
            .collect())
    }

    async fn coaching_row(&self, id: Uuid) -> Result<Option<Coaching>, AppError> {
        Ok(sqlx::query_as::<_, Coaching>("SELECT * FROM coaching WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// A career row tagged with the coaching center it was reached through.
#[derive(FromRow)]
struct LinkedCareer {
    coaching_id: Uuid,
    #[sqlx(flatten)]
    career: Career,
}

/// A coaching row tagged with the career it was reached through.
#[derive(FromRow)]
struct LinkedCoaching {
    career_id: Uuid,
    #[sqlx(flatten)]
    coaching: Coaching,
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn careers(&self, filter: CareerFilter) -> Result<Vec<Career>, AppError> {
        Ok(sqlx::query_as::<_, Career>(
            r#"
            SELECT * FROM careers
            WHERE ($1::text IS NULL OR level = $1)
              AND ($2::text IS NULL OR stream = $2)
              AND ($3 OR NOT is_paid)
            ORDER BY name
            "#,
        )
        .bind(filter.level.map(|l| l.as_str()))
        .bind(filter.stream.map(|s| s.as_str()))
        .bind(filter.visibility.includes_paid())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn careers_with_insights(
        &self,
        filter: CareerFilter,
    ) -> Result<Vec<CareerWithInsights>, AppError> {
        let careers = self.careers(filter).await?;
        self.attach_insights(careers).await
    }

    async fn stream_careers(&self, filter: CareerFilter) -> Result<Vec<CareerOverview>, AppError> {
        let careers = self.careers(filter).await?;
        self.overviews(careers).await
    }

    async fn career_overview(&self, id: Uuid) -> Result<Option<CareerOverview>, AppError> {
        let career = sqlx::query_as::<_, Career>("SELECT * FROM careers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match career {
            Some(career) => Ok(self.overviews(vec![career]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn career_detail(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<CareerDetail>, AppError> {
        let career = sqlx::query_as::<_, Career>(
            "SELECT * FROM careers WHERE id = $1 AND ($2 OR NOT is_paid)",
        )
        .bind(id)
        .bind(visibility.includes_paid())
        .fetch_optional(&self.pool)
        .await?;
        let Some(career) = career else {
            return Ok(None);
        };

        let salary_insights = self.salary_insights(id).await?;

        let coaching = sqlx::query_as::<_, Coaching>(
            r#"
            SELECT c.* FROM coaching c
            JOIN career_coaching cc ON cc.coaching_id = c.id
            WHERE cc.career_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let coaching_ids: Vec<Uuid> = coaching.iter().map(|c| c.id).collect();
        let pgs = sqlx::query_as::<_, Pg>(
            r#"
            SELECT * FROM pgs
            WHERE coaching_id = ANY($1) AND ($2 OR NOT is_paid)
            ORDER BY distance ASC NULLS LAST, name
            "#,
        )
        .bind(coaching_ids)
        .bind(visibility.includes_paid())
        .fetch_all(&self.pool)
        .await?;

        let mut pgs_by_coaching: HashMap<Uuid, Vec<Pg>> = HashMap::new();
        for pg in pgs {
            if let Some(coaching_id) = pg.coaching_id {
                pgs_by_coaching.entry(coaching_id).or_default().push(pg);
            }
        }

        let coaching = coaching
            .into_iter()
            .map(|c| CoachingWithPgs {
                pgs: pgs_by_coaching.remove(&c.id).unwrap_or_default(),
                coaching: c,
            })
            .collect();

        Ok(Some(CareerDetail {
            career,
            salary_insights,
            coaching,
        }))
    }

    async fn salary_insights(&self, career_id: Uuid) -> Result<Vec<SalaryInsight>, AppError> {
        Ok(sqlx::query_as::<_, SalaryInsight>(
            "SELECT * FROM salary_insights WHERE career_id = $1 ORDER BY year ASC",
        )
        .bind(career_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn colleges(&self, limit: i64) -> Result<Vec<CollegeSummary>, AppError> {
        Ok(sqlx::query_as::<_, CollegeSummary>(
            "SELECT id, name, city, state, stream FROM colleges ORDER BY name ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn coaching_for_career(
        &self,
        career_id: Uuid,
    ) -> Result<Vec<CoachingWithCareers>, AppError> {
        let coaching = sqlx::query_as::<_, Coaching>(
            r#"
            SELECT c.* FROM coaching c
            JOIN career_coaching cc ON cc.coaching_id = c.id
            WHERE cc.career_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(career_id)
        .fetch_all(&self.pool)
        .await?;

        let coaching_ids: Vec<Uuid> = coaching.iter().map(|c| c.id).collect();
        let linked = sqlx::query_as::<_, LinkedCareer>(
            r#"
            SELECT cc.coaching_id, k.* FROM careers k
            JOIN career_coaching cc ON cc.career_id = k.id
            WHERE cc.coaching_id = ANY($1)
            ORDER BY k.name
            "#,
        )
        .bind(coaching_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut careers_by_coaching: HashMap<Uuid, Vec<Career>> = HashMap::new();
        for row in linked {
            careers_by_coaching
                .entry(row.coaching_id)
                .or_default()
                .push(row.career);
        }

        Ok(coaching
            .into_iter()
            .map(|c| CoachingWithCareers {
                careers: careers_by_coaching.remove(&c.id).unwrap_or_default(),
                coaching: c,
            })
            .collect())
    }

    async fn coaching_detail(&self, id: Uuid) -> Result<Option<CoachingDetail>, AppError> {
        let Some(coaching) = self.coaching_row(id).await? else {
            return Ok(None);
        };

        let careers = sqlx::query_as::<_, Career>(
            r#"
            SELECT k.* FROM careers k
            JOIN career_coaching cc ON cc.career_id = k.id
            WHERE cc.coaching_id = $1
            ORDER BY k.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let careers = self.attach_insights(careers).await?;

        let salary_insights =
            aggregate_by_year(careers.iter().flat_map(|c| c.salary_insights.iter()));

        Ok(Some(CoachingDetail {
            coaching,
            careers,
            salary_insights,
        }))
    }

    async fn nearby_pgs(&self, coaching_id: Uuid) -> Result<Option<Vec<Pg>>, AppError> {
        let Some(coaching) = self.coaching_row(coaching_id).await? else {
            return Ok(None);
        };

        let pgs = sqlx::query_as::<_, Pg>(
            r#"
            SELECT * FROM pgs
            WHERE coaching_id = $1 AND (city = $2 OR state = $3)
            ORDER BY distance ASC NULLS LAST
            "#,
        )
        .bind(coaching_id)
        .bind(coaching.city)
        .bind(coaching.state)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(pgs))
    }
}
