use chrono::{DateTime, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub group_type_id: String,
    #[serde(default)]
    pub memberships_count: u32,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GroupField {
    Name,
    GroupTypeId,
    ArchivedAt,
    CreatedAt,
}

/// `/groups/v2/groups`
pub struct Groups;

impl Schema for Groups {
    type Field = GroupField;
    const ENDPOINT: &'static str = "/groups/v2/groups";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            GroupField::Name => "name",
            GroupField::GroupTypeId => "group_type_id",
            GroupField::ArchivedAt => "archived_at",
            GroupField::CreatedAt => "created_at",
        }
    }
}

impl Resource for Groups {
    type Model = Group;
}

impl Groups {
    pub const NAME: FieldRef<Groups, String> = FieldRef::new(GroupField::Name);
    pub const GROUP_TYPE_ID: FieldRef<Groups, String> = FieldRef::new(GroupField::GroupTypeId);
    pub const ARCHIVED_AT: FieldRef<Groups, DateTime<Utc>> = FieldRef::new(GroupField::ArchivedAt);
    pub const CREATED_AT: FieldRef<Groups, DateTime<Utc>> = FieldRef::new(GroupField::CreatedAt);

    pub const MEMBERSHIPS: RelationRef<Groups> = RelationRef::new("memberships");
    pub const GROUP_TYPE: RelationRef<Groups> = RelationRef::new("group_type");
    pub const LOCATION: RelationRef<Groups> = RelationRef::new("location");
}

pub type GroupsContext = FluentContext<Groups>;

impl FluentContext<Groups> {
    /// Groups that are not archived.
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn active(&self) -> Result<Self, QueryError> {
        self.filter(Groups::ARCHIVED_AT.is_null())
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn archived(&self) -> Result<Self, QueryError> {
        self.filter(Groups::ARCHIVED_AT.is_not_null())
    }

    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_group_type(&self, group_type_id: &str) -> Result<Self, QueryError> {
        super::require_id("group_type_id", group_type_id)?;
        self.filter(Groups::GROUP_TYPE_ID.eq(group_type_id))
    }

    /// `where[memberships_count]=>{count}`
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn with_members_more_than(&self, count: u32) -> Result<Self, QueryError> {
        self.refine(|q| q.where_relationship_count_greater_than(Groups::MEMBERSHIPS, count))
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn without_members(&self) -> Result<Self, QueryError> {
        self.refine(|q| q.where_doesnt_have_relationship(Groups::MEMBERSHIPS))
    }

    /// Sum of member counts across the filtered set.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn total_members(&self, cancel: &CancellationToken) -> Result<u64, QueryError> {
        let groups = self.get_all(None, cancel).await?;
        Ok(groups.iter().map(|g| u64::from(g.memberships_count)).sum())
    }

    /// # Errors
    /// `EmptySequence` when no group matches, `Remote` on service failure.
    #[allow(clippy::cast_precision_loss)]
    pub async fn average_group_size(&self, cancel: &CancellationToken) -> Result<f64, QueryError> {
        let groups = self.get_all(None, cancel).await?;
        if groups.is_empty() {
            return Err(QueryError::EmptySequence);
        }
        let members: u64 = groups.iter().map(|g| u64::from(g.memberships_count)).sum();
        Ok(members as f64 / groups.len() as f64)
    }
}
