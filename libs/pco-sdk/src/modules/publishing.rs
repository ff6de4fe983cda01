use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub published_live_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stream_type: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EpisodeField {
    Title,
    SeriesId,
    PublishedLiveAt,
}

/// `/publishing/v2/episodes`
pub struct Publishing;

impl Schema for Publishing {
    type Field = EpisodeField;
    const ENDPOINT: &'static str = "/publishing/v2/episodes";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            EpisodeField::Title => "title",
            EpisodeField::SeriesId => "series_id",
            EpisodeField::PublishedLiveAt => "published_live_at",
        }
    }
}

impl Resource for Publishing {
    type Model = Episode;
}

impl Publishing {
    pub const TITLE: FieldRef<Publishing, String> = FieldRef::new(EpisodeField::Title);
    pub const SERIES_ID: FieldRef<Publishing, String> = FieldRef::new(EpisodeField::SeriesId);
    pub const PUBLISHED_LIVE_AT: FieldRef<Publishing, DateTime<Utc>> =
        FieldRef::new(EpisodeField::PublishedLiveAt);

    pub const SERIES: RelationRef<Publishing> = RelationRef::new("series");
    pub const SPEAKERS: RelationRef<Publishing> = RelationRef::new("speakers");
}

pub type PublishingContext = FluentContext<Publishing>;

impl FluentContext<Publishing> {
    /// # Errors
    /// Propagates builder validation errors.
    pub fn published(&self) -> Result<Self, QueryError> {
        self.filter(Publishing::PUBLISHED_LIVE_AT.is_not_null())
    }

    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_series(&self, series_id: &str) -> Result<Self, QueryError> {
        super::require_id("series_id", series_id)?;
        self.filter(Publishing::SERIES_ID.eq(series_id))
    }

    /// # Errors
    /// `InvalidArgument` when `from` is after `to`.
    pub fn published_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Self, QueryError> {
        self.refine(|q| q.where_between(Publishing::PUBLISHED_LIVE_AT, from, to))
    }

    /// Episode count per series; episodes without a series are skipped.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn episodes_per_series(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>, QueryError> {
        let episodes = self.get_all(None, cancel).await?;
        Ok(super::tally(episodes.into_iter().filter_map(|e| e.series_id)))
    }
}
