use std::path::Path;
use std::sync::Arc;

use crate::config::{ConfigError, SdkConfig};
use crate::context::{FluentContext, Resource};
use crate::hub::{HubError, ServiceHub};
use crate::modules::{
    calendar::CalendarContext, check_ins::CheckInsContext, giving::GivingContext,
    groups::GroupsContext, people::PeopleContext, publishing::PublishingContext,
    registrations::RegistrationsContext, services::ServicesContext, webhooks::WebhooksContext,
};
use crate::service::ResourceService;

/// Entry point: configuration plus the registered resource services.
///
/// ```rust,ignore
/// let pco = PlanningCenter::new(SdkConfig::default());
/// pco.register::<People>(Arc::new(PeopleHttpService::new(transport)));
///
/// let page = pco
///     .people()?
///     .active()?
///     .order_by_desc(People::CREATED_AT)?
///     .get_paged(Some(25), &cancel)
///     .await?;
/// ```
#[derive(Clone)]
pub struct PlanningCenter {
    config: SdkConfig,
    hub: Arc<ServiceHub>,
}

impl PlanningCenter {
    #[must_use]
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            hub: Arc::new(ServiceHub::new()),
        }
    }

    /// # Errors
    /// See [`SdkConfig::load`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(SdkConfig::load(path)?))
    }

    #[must_use]
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<ServiceHub> {
        &self.hub
    }

    /// Register (or replace) the service backing resource `R`.
    pub fn register<R: Resource>(&self, service: Arc<dyn ResourceService<R::Model>>) {
        self.hub.register::<R::Model>(service);
    }

    /// Fresh context for `R`, pointed at the configured base URL.
    ///
    /// # Errors
    /// `NotRegistered` when no service was registered for `R`.
    pub fn context<R: Resource>(&self) -> Result<FluentContext<R>, HubError> {
        let service = self.hub.get::<R::Model>()?;
        Ok(FluentContext::new(service)
            .with_endpoint(self.config.endpoint(R::ENDPOINT))
            .with_pagination(self.config.pagination)
            .with_default_page_size(self.config.default_page_size))
    }

    /// # Errors
    /// `NotRegistered` when no People service was registered.
    pub fn people(&self) -> Result<PeopleContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Giving service was registered.
    pub fn giving(&self) -> Result<GivingContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Calendar service was registered.
    pub fn calendar(&self) -> Result<CalendarContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Check-Ins service was registered.
    pub fn check_ins(&self) -> Result<CheckInsContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Groups service was registered.
    pub fn groups(&self) -> Result<GroupsContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Registrations service was registered.
    pub fn registrations(&self) -> Result<RegistrationsContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Publishing service was registered.
    pub fn publishing(&self) -> Result<PublishingContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Services service was registered.
    pub fn services(&self) -> Result<ServicesContext, HubError> {
        self.context()
    }

    /// # Errors
    /// `NotRegistered` when no Webhooks service was registered.
    pub fn webhooks(&self) -> Result<WebhooksContext, HubError> {
        self.context()
    }
}
