use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use pco_query::{CancellationToken, FieldRef, QueryError, RelationRef, Schema};
use serde::{Deserialize, Serialize};

use crate::context::{FluentContext, Resource};
use crate::dates;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    #[serde(default)]
    pub person_id: Option<String>,
    pub fund_id: String,
    pub amount_cents: i64,
    pub amount_currency: String,
    pub payment_method: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub refunded: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DonationField {
    PersonId,
    FundId,
    AmountCents,
    PaymentMethod,
    ReceivedAt,
    Refunded,
}

/// `/giving/v2/donations`
pub struct Giving;

impl Schema for Giving {
    type Field = DonationField;
    const ENDPOINT: &'static str = "/giving/v2/donations";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            DonationField::PersonId => "person_id",
            DonationField::FundId => "fund_id",
            DonationField::AmountCents => "amount_cents",
            DonationField::PaymentMethod => "payment_method",
            DonationField::ReceivedAt => "received_at",
            DonationField::Refunded => "refunded",
        }
    }
}

impl Resource for Giving {
    type Model = Donation;
}

impl Giving {
    pub const PERSON_ID: FieldRef<Giving, String> = FieldRef::new(DonationField::PersonId);
    pub const FUND_ID: FieldRef<Giving, String> = FieldRef::new(DonationField::FundId);
    pub const AMOUNT_CENTS: FieldRef<Giving, i64> = FieldRef::new(DonationField::AmountCents);
    pub const PAYMENT_METHOD: FieldRef<Giving, String> =
        FieldRef::new(DonationField::PaymentMethod);
    pub const RECEIVED_AT: FieldRef<Giving, DateTime<Utc>> =
        FieldRef::new(DonationField::ReceivedAt);
    pub const REFUNDED: FieldRef<Giving, bool> = FieldRef::new(DonationField::Refunded);

    pub const DESIGNATIONS: RelationRef<Giving> = RelationRef::new("designations");
    pub const LABELS: RelationRef<Giving> = RelationRef::new("labels");
}

pub type GivingContext = FluentContext<Giving>;

impl FluentContext<Giving> {
    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_person(&self, person_id: &str) -> Result<Self, QueryError> {
        super::require_id("person_id", person_id)?;
        self.filter(Giving::PERSON_ID.eq(person_id))
    }

    /// # Errors
    /// `InvalidArgument` for an empty id.
    pub fn by_fund(&self, fund_id: &str) -> Result<Self, QueryError> {
        super::require_id("fund_id", fund_id)?;
        self.filter(Giving::FUND_ID.eq(fund_id))
    }

    /// # Errors
    /// `InvalidArgument` when `from` is after `to`.
    pub fn received_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Self, QueryError> {
        self.refine(|q| q.where_between(Giving::RECEIVED_AT, from, to))
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
        self.received_between(week.start, week.end)
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn this_month(&self) -> Result<Self, QueryError> {
        self.this_month_on(dates::today())
    }

    /// Donations received in the calendar month containing `today`.
    ///
    /// # Errors
    /// Propagates builder validation errors.
    pub fn this_month_on(&self, today: NaiveDate) -> Result<Self, QueryError> {
        let month = dates::month_window(today);
        self.received_between(month.start, month.end)
    }

    /// # Errors
    /// Propagates builder validation errors.
    pub fn not_refunded(&self) -> Result<Self, QueryError> {
        self.filter(Giving::REFUNDED.eq(false))
    }

    /// Sum of `amount_cents` across the filtered set.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn total_amount_cents(&self, cancel: &CancellationToken) -> Result<i64, QueryError> {
        let donations = self.get_all(None, cancel).await?;
        Ok(donations.iter().map(|d| d.amount_cents).sum())
    }

    /// # Errors
    /// `EmptySequence` when nothing matches, `Remote` on service failure.
    #[allow(clippy::cast_precision_loss)]
    pub async fn average_amount_cents(
        &self,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        let donations = self.get_all(None, cancel).await?;
        if donations.is_empty() {
            return Err(QueryError::EmptySequence);
        }
        let total: i64 = donations.iter().map(|d| d.amount_cents).sum();
        Ok(total as f64 / donations.len() as f64)
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn totals_by_fund(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, i64>, QueryError> {
        let donations = self.get_all(None, cancel).await?;
        let mut totals = BTreeMap::new();
        for donation in donations {
            *totals.entry(donation.fund_id).or_insert(0) += donation.amount_cents;
        }
        Ok(totals)
    }

    /// Distinct donors; anonymous donations are not counted.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn count_donors(&self, cancel: &CancellationToken) -> Result<u64, QueryError> {
        let donations = self.get_all(None, cancel).await?;
        let donors: BTreeSet<String> =
            donations.into_iter().filter_map(|d| d.person_id).collect();
        Ok(super::len_u64(donors.len()))
    }
}
