use chrono::{DateTime, NaiveDate, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};
use crate::dates;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub service_type_id: String,
    pub sort_date: DateTime<Utc>,
    /// Seconds.
    #[serde(default)]
    pub total_length: u32,
    #[serde(default)]
    pub needed_positions_count: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlanField {
    Title,
    ServiceTypeId,
    SortDate,
}

/// `/services/v2/plans`
pub struct Services;

impl Schema for Services {
    type Field = PlanField;
    const ENDPOINT: &'static str = "/services/v2/plans";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            PlanField::Title => "title",
            PlanField::ServiceTypeId => "service_type_id",
            PlanField::SortDate => "sort_date",
        }
    }
}

impl Resource for Services {
    type Model = Plan;
}

impl Services {
    pub const TITLE: FieldRef<Services, String> = FieldRef::new(PlanField::Title);
    pub const SERVICE_TYPE_ID: FieldRef<Services, String> =
        FieldRef::new(PlanField::ServiceTypeId);
    pub const SORT_DATE: FieldRef<Services, DateTime<Utc>> = FieldRef::new(PlanField::SortDate);

    pub const ITEMS: RelationRef<Services> = RelationRef::new("items");
    pub const TEAM_MEMBERS: RelationRef<Services> = RelationRef::new("team_members");
    pub const NEEDED_POSITIONS: RelationRef<Services> = RelationRef::new("needed_positions");
}

pub type ServicesContext = FluentContext<Services>;

impl FluentContext<Services> {
    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_service_type(&self, service_type_id: &str) -> Result<Self, QueryError> {
        super::require_id("service_type_id", service_type_id)?;
        self.filter(Services::SERVICE_TYPE_ID.eq(service_type_id))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn this_week(&self) -> Result<Self, QueryError> {
        self.this_week_on(dates::today())
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn this_week_on(&self, today: NaiveDate) -> Result<Self, QueryError> {
        let week = dates::week_window(today);
        self.refine(|q| q.where_between(Services::SORT_DATE, week.start, week.end))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn upcoming_on(&self, today: NaiveDate) -> Result<Self, QueryError> {
        let start = dates::day_window(today).start;
        self.refine(|q| q.where_after(Services::SORT_DATE, start))?
            .order_by(Services::SORT_DATE)
    }

    /// Plans with at least one unfilled position.
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn needing_positions(&self) -> Result<Self, QueryError> {
        self.refine(|q| q.where_relationship_count_greater_than(Services::NEEDED_POSITIONS, 0))
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn total_length_seconds(
        &self,
        cancel: &CancellationToken,
    ) -> Result<u64, QueryError> {
        let plans = self.get_all(None, cancel).await?;
        Ok(plans.iter().map(|p| u64::from(p.total_length)).sum())
    }
}
