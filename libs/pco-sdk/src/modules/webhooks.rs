use std::collections::BTreeMap;

use pco_query::{CancellationToken, FieldRef, QueryError, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: String,
    /// Event name, e.g. `people.v2.events.person.created`.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub application_id: Option<String>,
}

impl WebhookSubscription {
    /// Product segment of the event name (`people` for `people.v2.events...`).
    #[must_use]
    pub fn product(&self) -> &str {
        self.name.split('.').next().unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WebhookField {
    Name,
    Url,
    Active,
}

/// `/webhooks/v2/webhook_subscriptions`
pub struct Webhooks;

impl Schema for Webhooks {
    type Field = WebhookField;
    const ENDPOINT: &'static str = "/webhooks/v2/webhook_subscriptions";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            WebhookField::Name => "name",
            WebhookField::Url => "url",
            WebhookField::Active => "active",
        }
    }
}

impl Resource for Webhooks {
    type Model = WebhookSubscription;
}

impl Webhooks {
    pub const NAME: FieldRef<Webhooks, String> = FieldRef::new(WebhookField::Name);
    pub const URL: FieldRef<Webhooks, String> = FieldRef::new(WebhookField::Url);
    pub const ACTIVE: FieldRef<Webhooks, bool> = FieldRef::new(WebhookField::Active);
}

pub type WebhooksContext = FluentContext<Webhooks>;

impl FluentContext<Webhooks> {
    /// # Errors
    /// Propagates builder validation errors.
    pub fn active(&self) -> Result<Self, QueryError> {
        self.filter(Webhooks::ACTIVE.eq(true))
    }

    /// # Errors
    /// `InvalidArgument` for an empty event name.
    pub fn for_event(&self, name: &str) -> Result<Self, QueryError> {
        super::require_id("name", name)?;
        self.filter(Webhooks::NAME.eq(name))
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn count_active(&self, cancel: &CancellationToken) -> Result<u64, QueryError> {
        let subscriptions = self.get_all(None, cancel).await?;
        Ok(super::len_u64(
            subscriptions.iter().filter(|s| s.active).count(),
        ))
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn subscriptions_by_product(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, u64>, QueryError> {
        let subscriptions = self.get_all(None, cancel).await?;
        Ok(super::tally(
            subscriptions.iter().map(|s| s.product().to_owned()),
        ))
    }
}
