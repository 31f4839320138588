use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Higher-secondary stream a career belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    Science,
    Commerce,
    Arts,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Science, Stream::Commerce, Stream::Arts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Science => "Science",
            Stream::Commerce => "Commerce",
            Stream::Arts => "Arts",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stream::Science => {
                "Become an engineer, doctor, scientist, or work in technology and research."
            }
            Stream::Commerce => {
                "Become a CA, banker, business analyst, or work in finance and management."
            }
            Stream::Arts => {
                "Become a designer, journalist, lawyer, psychologist, or work in creative and social fields."
            }
        }
    }

    pub fn core_subjects(&self) -> [&'static str; 3] {
        match self {
            Stream::Science => ["Physics", "Chemistry", "Maths"],
            Stream::Commerce => ["Accounts", "Economics", "Business"],
            Stream::Arts => ["History", "Political Science", "Geography"],
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stream {
    type Err = String;

    /// Stream names are matched exactly, as they appear in URLs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Science" => Ok(Stream::Science),
            "Commerce" => Ok(Stream::Commerce),
            "Arts" => Ok(Stream::Arts),
            other => Err(format!(
                "Invalid stream '{other}'. Must be Science, Commerce, or Arts"
            )),
        }
    }
}

/// Education level a career is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Class10,
    Stream,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Class10 => "Class10",
            Level::Stream => "Stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Career {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub stream: Option<String>,
    pub level: String,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SalaryInsight {
    pub id: Uuid,
    pub career_id: Uuid,
    pub year: i32,
    pub min_salary: f64,
    pub avg_salary: f64,
    pub max_salary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerWithInsights {
    #[serde(flatten)]
    pub career: Career,
    pub salary_insights: Vec<SalaryInsight>,
}

/// A career with its salary curve and the coaching centers that prepare for
/// it, without any PG data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerOverview {
    #[serde(flatten)]
    pub career: Career,
    pub salary_insights: Vec<SalaryInsight>,
    pub coaching: Vec<Coaching>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coaching {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Pg {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub owner_email: Option<String>,
    pub monthly_rent: f64,
    pub amenities: Vec<String>,
    pub coaching_id: Option<Uuid>,
    pub distance: Option<f64>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingWithPgs {
    #[serde(flatten)]
    pub coaching: Coaching,
    pub pgs: Vec<Pg>,
}

/// A career with its salary curve and the coaching centers (and their PGs)
/// that prepare for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerDetail {
    #[serde(flatten)]
    pub career: Career,
    pub salary_insights: Vec<SalaryInsight>,
    pub coaching: Vec<CoachingWithPgs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingWithCareers {
    #[serde(flatten)]
    pub coaching: Coaching,
    pub careers: Vec<Career>,
}

/// Per-year salary averaged across every career a coaching center prepares for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedInsight {
    pub year: i32,
    pub min_salary: f64,
    pub avg_salary: f64,
    pub max_salary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingDetail {
    #[serde(flatten)]
    pub coaching: Coaching,
    pub careers: Vec<CareerWithInsights>,
    pub salary_insights: Vec<AggregatedInsight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct College {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub stream: Option<String>,
    pub courses: Vec<String>,
    pub fees: Option<f64>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CollegeSummary {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub stream: Option<String>,
}
