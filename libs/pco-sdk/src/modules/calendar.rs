use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};
use crate::dates;

/// Approval states as reported by Calendar.
pub const APPROVED: &str = "A";
pub const PENDING: &str = "P";
pub const REJECTED: &str = "R";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub approval_status: String,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub visible_in_church_center: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventField {
    Name,
    ApprovalStatus,
    ArchivedAt,
    StartsAt,
    EndsAt,
    VisibleInChurchCenter,
}

/// `/calendar/v2/events`
pub struct Calendar;

impl Schema for Calendar {
    type Field = EventField;
    const ENDPOINT: &'static str = "/calendar/v2/events";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            EventField::Name => "name",
            EventField::ApprovalStatus => "approval_status",
            EventField::ArchivedAt => "archived_at",
            EventField::StartsAt => "starts_at",
            EventField::EndsAt => "ends_at",
            EventField::VisibleInChurchCenter => "visible_in_church_center",
        }
    }
}

impl Resource for Calendar {
    type Model = Event;
}

impl Calendar {
    pub const NAME: FieldRef<Calendar, String> = FieldRef::new(EventField::Name);
    pub const APPROVAL_STATUS: FieldRef<Calendar, String> =
        FieldRef::new(EventField::ApprovalStatus);
    pub const ARCHIVED_AT: FieldRef<Calendar, DateTime<Utc>> =
        FieldRef::new(EventField::ArchivedAt);
    pub const STARTS_AT: FieldRef<Calendar, DateTime<Utc>> = FieldRef::new(EventField::StartsAt);
    pub const ENDS_AT: FieldRef<Calendar, DateTime<Utc>> = FieldRef::new(EventField::EndsAt);
    pub const VISIBLE_IN_CHURCH_CENTER: FieldRef<Calendar, bool> =
        FieldRef::new(EventField::VisibleInChurchCenter);

    pub const EVENT_INSTANCES: RelationRef<Calendar> = RelationRef::new("event_instances");
    pub const OWNER: RelationRef<Calendar> = RelationRef::new("owner");
    pub const TAGS: RelationRef<Calendar> = RelationRef::new("tags");
}

pub type CalendarContext = FluentContext<Calendar>;

impl FluentContext<Calendar> {
    /// # Errors
    /// Propagates builder validation errors.
    pub fn approved(&self) -> Result<Self, QueryError> {
        self.filter(Calendar::APPROVAL_STATUS.eq(APPROVED))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn pending(&self) -> Result<Self, QueryError> {
        self.filter(Calendar::APPROVAL_STATUS.eq(PENDING))
    }

    /// Events that are not archived.
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn active(&self) -> Result<Self, QueryError> {
        self.filter(Calendar::ARCHIVED_AT.is_null())
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn visible_in_church_center(&self) -> Result<Self, QueryError> {
        self.filter(Calendar::VISIBLE_IN_CHURCH_CENTER.eq(true))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn this_week(&self) -> Result<Self, QueryError> {
        self.this_week_on(dates::today())
    }

    /// Events starting between Monday and Sunday of the week holding `today`.
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn this_week_on(&self, today: NaiveDate) -> Result<Self, QueryError> {
        let week = dates::week_window(today);
        self.refine(|q| q.where_between(Calendar::STARTS_AT, week.start, week.end))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn starting_after(&self, at: DateTime<Utc>) -> Result<Self, QueryError> {
        self.refine(|q| q.where_after(Calendar::STARTS_AT, at))
    }

    /// Number of events per start date (UTC).
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn events_by_day(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<NaiveDate, u64>, QueryError> {
        let events = self.get_all(None, cancel).await?;
        Ok(super::tally(events.iter().map(|e| e.starts_at.date_naive())))
    }
}
