use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};
use crate::dates;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// `active` or `inactive`.
    pub status: String,
    #[serde(default)]
    pub membership: Option<String>,
    #[serde(default)]
    pub child: bool,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PersonField {
    FirstName,
    LastName,
    Status,
    Membership,
    Child,
    Gender,
    Birthdate,
    CreatedAt,
}

/// `/people/v2/people`
pub struct People;

impl Schema for People {
    type Field = PersonField;
    const ENDPOINT: &'static str = "/people/v2/people";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            PersonField::FirstName => "first_name",
            PersonField::LastName => "last_name",
            PersonField::Status => "status",
            PersonField::Membership => "membership",
            PersonField::Child => "child",
            PersonField::Gender => "gender",
            PersonField::Birthdate => "birthdate",
            PersonField::CreatedAt => "created_at",
        }
    }
}

impl Resource for People {
    type Model = Person;
}

impl People {
    pub const FIRST_NAME: FieldRef<People, String> = FieldRef::new(PersonField::FirstName);
    pub const LAST_NAME: FieldRef<People, String> = FieldRef::new(PersonField::LastName);
    pub const STATUS: FieldRef<People, String> = FieldRef::new(PersonField::Status);
    pub const MEMBERSHIP: FieldRef<People, String> = FieldRef::new(PersonField::Membership);
    pub const CHILD: FieldRef<People, bool> = FieldRef::new(PersonField::Child);
    pub const GENDER: FieldRef<People, String> = FieldRef::new(PersonField::Gender);
    pub const BIRTHDATE: FieldRef<People, NaiveDate> = FieldRef::new(PersonField::Birthdate);
    pub const CREATED_AT: FieldRef<People, DateTime<Utc>> = FieldRef::new(PersonField::CreatedAt);

    pub const EMAILS: RelationRef<People> = RelationRef::new("emails");
    pub const PHONE_NUMBERS: RelationRef<People> = RelationRef::new("phone_numbers");
    pub const ADDRESSES: RelationRef<People> = RelationRef::new("addresses");
    pub const HOUSEHOLDS: RelationRef<People> = RelationRef::new("households");
}

pub type PeopleContext = FluentContext<People>;

impl FluentContext<People> {
    /// `status = active`
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn active(&self) -> Result<Self, QueryError> {
        self.filter(People::STATUS.eq("active"))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn inactive(&self) -> Result<Self, QueryError> {
        self.filter(People::STATUS.eq("inactive"))
    }

    /// # Errors
    /// `InvalidArgument` for an empty membership name.
    pub fn by_membership(&self, membership: &str) -> Result<Self, QueryError> {
        super::require_id("membership", membership)?;
        self.filter(People::MEMBERSHIP.eq(membership))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn children(&self) -> Result<Self, QueryError> {
        self.filter(People::CHILD.eq(true))
    }

    /// # Errors
    /// `InvalidArgument` when `from` is after `to`.
    pub fn born_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Self, QueryError> {
        self.refine(|q| q.where_between(People::BIRTHDATE, from, to))
    }

    /// # Errors
    /// See [`Self::created_this_week_on`].
    pub fn created_this_week(&self) -> Result<Self, QueryError> {
        self.created_this_week_on(dates::today())
    }

    /// Created between Monday and Sunday of the week holding `today`.
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn created_this_week_on(&self, today: NaiveDate) -> Result<Self, QueryError> {
        let week = dates::week_window(today);
        self.refine(|q| q.where_between(People::CREATED_AT, week.start, week.end))
    }

    /// Side-load emails and phone numbers.
    ///
    /// # Errors
    /// Never for the built-in relationship names.
    pub fn with_contact_info(&self) -> Result<Self, QueryError> {
        self.include([People::EMAILS, People::PHONE_NUMBERS])
    }

    /// People by status across every page.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn count_by_status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>, QueryError> {
        let people = self.get_all(None, cancel).await?;
        Ok(super::tally(people.into_iter().map(|p| p.status)))
    }
}
