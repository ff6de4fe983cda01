#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pco_errors::PcoError;
use pco_query::{
    CancellationToken, FieldRef, ListSource, PagedResult, QueryBuilder, QueryParameters,
    RelationRef, Schema,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PersonField {
    Status,
    Gender,
    CreatedAt,
    LastName,
    Birthdate,
}

pub struct PersonSchema;

impl Schema for PersonSchema {
    type Field = PersonField;
    const ENDPOINT: &'static str = "/people/v2/people";

    fn field_name(field: Self::Field) -> &'static str {
        match field {
            PersonField::Status => "status",
            PersonField::Gender => "gender",
            PersonField::CreatedAt => "created_at",
            PersonField::LastName => "last_name",
            PersonField::Birthdate => "birthdate",
        }
    }
}

pub const STATUS: FieldRef<PersonSchema, String> = FieldRef::new(PersonField::Status);
pub const GENDER: FieldRef<PersonSchema, String> = FieldRef::new(PersonField::Gender);
pub const CREATED_AT: FieldRef<PersonSchema, String> = FieldRef::new(PersonField::CreatedAt);
pub const LAST_NAME: FieldRef<PersonSchema, String> = FieldRef::new(PersonField::LastName);
pub const BIRTHDATE: FieldRef<PersonSchema, String> = FieldRef::new(PersonField::Birthdate);
pub const EMAILS: RelationRef<PersonSchema> = RelationRef::new("emails");

#[derive(Clone, Debug, PartialEq)]
pub struct PersonDto {
    pub id: String,
    pub status: String,
    pub age: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub id: String,
    pub active: bool,
    pub age: u32,
}

pub fn to_person(dto: PersonDto) -> Person {
    Person {
        active: dto.status == "active",
        id: dto.id,
        age: dto.age,
    }
}

pub fn dto(id: &str, status: &str, age: u32) -> PersonDto {
    PersonDto {
        id: id.to_owned(),
        status: status.to_owned(),
        age,
    }
}

/// Replies with queued pages in order (or slices a fixed data set by offset)
/// and records every request along with whether its token was cancelled.
#[derive(Default)]
pub struct RecordingSource {
    pub calls: Mutex<Vec<(String, QueryParameters)>>,
    pub cancelled: Mutex<Vec<bool>>,
    pub replies: Mutex<VecDeque<Result<PagedResult<PersonDto>, PcoError>>>,
    pub dataset: Option<Vec<PersonDto>>,
}

impl RecordingSource {
    pub fn with_replies(
        replies: impl IntoIterator<Item = Result<PagedResult<PersonDto>, PcoError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn with_dataset(data: Vec<PersonDto>) -> Arc<Self> {
        Arc::new(Self {
            dataset: Some(data),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(String, QueryParameters)> {
        self.calls.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<bool> {
        self.cancelled.lock().clone()
    }

    pub fn last_params(&self) -> QueryParameters {
        self.calls.lock().last().expect("no list call recorded").1.clone()
    }
}

#[async_trait]
impl ListSource<PersonDto> for RecordingSource {
    async fn list(
        &self,
        endpoint: &str,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<PersonDto>, PcoError> {
        self.calls.lock().push((endpoint.to_owned(), params.clone()));
        self.cancelled.lock().push(cancel.is_cancelled());

        if let Some(data) = &self.dataset {
            let offset = params.offset.unwrap_or(0) as usize;
            let per_page = params.per_page.unwrap_or(25) as usize;
            let page: Vec<PersonDto> = data.iter().skip(offset).take(per_page).cloned().collect();
            let mut result = PagedResult::from_items(page);
            result.meta.total_count = Some(data.len() as u64);
            return Ok(result);
        }

        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(PagedResult::from_items(Vec::new())))
    }
}

pub fn people(source: &Arc<RecordingSource>) -> QueryBuilder<PersonSchema, Person, PersonDto> {
    let source: Arc<dyn ListSource<PersonDto>> = source.clone();
    QueryBuilder::with_mapper(source, to_person)
}
