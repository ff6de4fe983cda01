use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};
use crate::dates;

pub const KIND_REGULAR: &str = "Regular";
pub const KIND_GUEST: &str = "Guest";
pub const KIND_VOLUNTEER: &str = "Volunteer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub person_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// `Regular`, `Guest` or `Volunteer`.
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub checked_out_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CheckInField {
    EventId,
    PersonId,
    Kind,
    CreatedAt,
    CheckedOutAt,
}

/// `/check-ins/v2/check_ins`
pub struct CheckIns;

impl Schema for CheckIns {
    type Field = CheckInField;
    const ENDPOINT: &'static str = "/check-ins/v2/check_ins";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            CheckInField::EventId => "event_id",
            CheckInField::PersonId => "person_id",
            CheckInField::Kind => "kind",
            CheckInField::CreatedAt => "created_at",
            CheckInField::CheckedOutAt => "checked_out_at",
        }
    }
}

impl Resource for CheckIns {
    type Model = CheckIn;
}

impl CheckIns {
    pub const EVENT_ID: FieldRef<CheckIns, String> = FieldRef::new(CheckInField::EventId);
    pub const PERSON_ID: FieldRef<CheckIns, String> = FieldRef::new(CheckInField::PersonId);
    pub const KIND: FieldRef<CheckIns, String> = FieldRef::new(CheckInField::Kind);
    pub const CREATED_AT: FieldRef<CheckIns, DateTime<Utc>> =
        FieldRef::new(CheckInField::CreatedAt);
    pub const CHECKED_OUT_AT: FieldRef<CheckIns, DateTime<Utc>> =
        FieldRef::new(CheckInField::CheckedOutAt);

    pub const EVENT: RelationRef<CheckIns> = RelationRef::new("event");
    pub const LOCATIONS: RelationRef<CheckIns> = RelationRef::new("locations");
    pub const PERSON: RelationRef<CheckIns> = RelationRef::new("person");
}

pub type CheckInsContext = FluentContext<CheckIns>;

impl FluentContext<CheckIns> {
    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_event(&self, event_id: &str) -> Result<Self, QueryError> {
        super::require_id("event_id", event_id)?;
        self.filter(CheckIns::EVENT_ID.eq(event_id))
    }

    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_person(&self, person_id: &str) -> Result<Self, QueryError> {
        super::require_id("person_id", person_id)?;
        self.filter(CheckIns::PERSON_ID.eq(person_id))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn guests(&self) -> Result<Self, QueryError> {
        self.filter(CheckIns::KIND.eq(KIND_GUEST))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn volunteers(&self) -> Result<Self, QueryError> {
        self.filter(CheckIns::KIND.eq(KIND_VOLUNTEER))
    }

    /// Still checked in (no checkout recorded).
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn checked_in(&self) -> Result<Self, QueryError> {
        self.filter(CheckIns::CHECKED_OUT_AT.is_null())
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn today(&self) -> Result<Self, QueryError> {
        self.on_day(dates::today())
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn on_day(&self, day: NaiveDate) -> Result<Self, QueryError> {
        let window = dates::day_window(day);
        self.refine(|q| q.where_between(CheckIns::CREATED_AT, window.start, window.end))
    }

    /// People still checked in among the filtered set.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn count_checked_in(&self, cancel: &CancellationToken) -> Result<u64, QueryError> {
        let check_ins = self.checked_in()?.get_all(None, cancel).await?;
        Ok(super::len_u64(check_ins.len()))
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn count_by_kind(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>, QueryError> {
        let check_ins = self.get_all(None, cancel).await?;
        Ok(super::tally(check_ins.into_iter().map(|c| c.kind)))
    }
}
