#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Chaining behavior of the query builder: immutability, merge rules,
//! validation, and filter encodings.

mod common;

use chrono::NaiveDate;
use common::{BIRTHDATE, CREATED_AT, EMAILS, GENDER, LAST_NAME, RecordingSource, STATUS, people};
use pco_query::{QueryError, QueryParameters, SortDir, SortKey};

#[test]
fn chaining_never_mutates_the_receiver() {
    let source = RecordingSource::with_replies([]);
    let base = people(&source);

    let filtered = base.where_eq(STATUS, "active").unwrap();
    let included = filtered.include(["emails"]).unwrap();
    let ordered = included.order_by_desc(CREATED_AT).unwrap();
    let paged = ordered.take(25).unwrap().skip(50);

    assert_eq!(base.build(), QueryParameters::default());
    assert_eq!(filtered.params().filters.len(), 1);
    assert!(filtered.params().include.is_empty());
    assert!(included.params().order_by.is_empty());
    assert_eq!(ordered.params().per_page, None);
    assert_eq!(paged.params().per_page, Some(25));
    assert_eq!(paged.params().offset, Some(50));
}

#[test]
fn filters_are_last_write_wins() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .where_eq(STATUS, "active")
        .unwrap()
        .where_eq("status", "inactive")
        .unwrap();

    assert_eq!(q.params().filter("status"), Some("inactive"));
    assert_eq!(q.params().filters.len(), 1);
}

#[test]
fn built_parameters_are_independent_snapshots() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source).where_eq(STATUS, "active").unwrap();

    let mut snapshot = q.build();
    snapshot.merge_filter("status", "changed");
    snapshot.add_include("addresses");

    assert_eq!(q.params().filter("status"), Some("active"));
    assert!(q.params().include.is_empty());
}

#[test]
fn includes_are_deduplicated_in_order() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .include(["emails", "addresses"])
        .unwrap()
        .include_relation(EMAILS)
        .include_deep("households.people")
        .unwrap()
        .include(["addresses", "phone_numbers"])
        .unwrap();

    assert_eq!(
        q.params().include,
        vec!["emails", "addresses", "households.people", "phone_numbers"]
    );
}

#[test]
fn empty_include_name_is_rejected_without_partial_update() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source);
    let err = q.include(["emails", " "]).unwrap_err();

    assert!(matches!(err, QueryError::InvalidArgument { param: "include", .. }));
    assert!(q.params().include.is_empty());
}

#[test]
fn order_by_resets_and_then_by_appends() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .order_by(LAST_NAME, SortDir::Asc)
        .unwrap()
        .then_by_desc(CREATED_AT)
        .unwrap();
    assert_eq!(q.params().order_token().as_deref(), Some("last_name,-created_at"));

    let reset = q.order_by_desc(BIRTHDATE).unwrap();
    assert_eq!(
        reset.params().order_by,
        vec![SortKey {
            field: "birthdate".to_owned(),
            dir: SortDir::Desc,
        }]
    );
    assert_eq!(q.params().order_by.len(), 2);
}

#[test]
fn page_math() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source).page(3, 10).unwrap();
    assert_eq!(q.params().per_page, Some(10));
    assert_eq!(q.params().offset, Some(20));

    let first = people(&source).page(1, 25).unwrap();
    assert_eq!(first.params().offset, Some(0));

    assert!(people(&source).page(0, 10).is_err());
    assert!(people(&source).page(1, 0).is_err());
    assert!(people(&source).take(0).is_err());
}

#[test]
fn ranges_are_validated_before_any_call() {
    let source = RecordingSource::with_replies([]);
    let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dec = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

    let q = people(&source).where_between(BIRTHDATE, jan, dec).unwrap();
    assert_eq!(q.params().filter("birthdate"), Some("2024-01-01..2024-12-31"));

    let q = people(&source).where_after(CREATED_AT, jan).unwrap();
    assert_eq!(q.params().filter("created_at"), Some("2024-01-01.."));

    let q = people(&source).where_before(CREATED_AT, dec).unwrap();
    assert_eq!(q.params().filter("created_at"), Some("..2024-12-31"));

    let q = people(&source)
        .where_date_range(CREATED_AT, None, Some(dec))
        .unwrap();
    assert_eq!(q.params().filter("created_at"), Some("..2024-12-31"));

    let err = people(&source).where_between(BIRTHDATE, dec, jan).unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument { .. }));

    let none: Option<NaiveDate> = None;
    assert!(people(&source).where_date_range(CREATED_AT, none, None).is_err());
    assert!(source.calls().is_empty());
}

#[test]
fn in_and_null_encodings() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .where_in(STATUS, ["active", "pending"])
        .unwrap()
        .where_not_in(GENDER, ["M"])
        .unwrap()
        .where_null("remote_id")
        .unwrap()
        .where_not_null(BIRTHDATE)
        .unwrap();

    assert_eq!(q.params().filter("status"), Some("active,pending"));
    assert_eq!(q.params().filter("gender"), Some("!M"));
    assert_eq!(q.params().filter("remote_id"), Some("null"));
    assert_eq!(q.params().filter("birthdate"), Some("!null"));

    let empty: [&str; 0] = [];
    assert!(people(&source).where_in(STATUS, empty).is_err());
    assert!(
        people(&source)
            .where_in(STATUS, [Some("a"), None])
            .is_err()
    );
}

#[test]
fn typed_predicates_translate_to_where_entries() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .filter(
            STATUS
                .eq("active")
                .and(GENDER.ne("M"))
                .and(CREATED_AT.ge("2024-01-01"))
                .and(LAST_NAME.is_in(["Smith", "Jones"])),
        )
        .unwrap();

    let filters = &q.params().filters;
    assert_eq!(filters.get("status").map(String::as_str), Some("active"));
    assert_eq!(filters.get("gender").map(String::as_str), Some("!M"));
    assert_eq!(
        filters.get("created_at[gte]").map(String::as_str),
        Some("2024-01-01")
    );
    assert_eq!(
        filters.get("last_name").map(String::as_str),
        Some("Smith,Jones")
    );
}

#[test]
fn disjunction_is_a_translation_error() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source);
    match q.filter(STATUS.eq("active").or(STATUS.eq("pending"))) {
        Err(QueryError::Translation { expression, .. }) => {
            assert_eq!(expression, "(status eq 'active') or (status eq 'pending')");
        }
        other => panic!("Expected Translation error, got {other:?}"),
    }
    assert!(q.params().filters.is_empty());
}

#[test]
fn null_equality_needs_dedicated_methods() {
    let source = RecordingSource::with_replies([]);
    let none: Option<&str> = None;
    let err = people(&source).where_eq(STATUS, none).unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument { param: "value", .. }));

    let q = people(&source).filter(STATUS.eq(none)).unwrap();
    assert_eq!(q.params().filter("status"), Some("null"));
}

#[test]
fn relationship_filters() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .where_has_relationship(EMAILS)
        .unwrap()
        .where_doesnt_have_relationship("households")
        .unwrap()
        .where_has("emails", "location", "Home")
        .unwrap()
        .where_relationship_count_greater_than("phone_numbers", 1)
        .unwrap()
        .where_relationship_count_between("addresses", 1, 3)
        .unwrap()
        .where_relationship_count_less_than("notes", 5)
        .unwrap()
        .where_relationship_count("field_data", 0)
        .unwrap();

    let p = q.params();
    assert_eq!(p.filter("has_emails"), Some("true"));
    assert_eq!(p.filter("has_households"), Some("false"));
    assert_eq!(p.filter("emails.location"), Some("Home"));
    assert_eq!(p.filter("phone_numbers_count"), Some(">1"));
    assert_eq!(p.filter("addresses_count"), Some("1..3"));
    assert_eq!(p.filter("notes_count"), Some("<5"));
    assert_eq!(p.filter("field_data_count"), Some("0"));

    assert!(
        people(&source)
            .where_relationship_count_between("addresses", 3, 1)
            .is_err()
    );
    assert!(people(&source).where_has_relationship("").is_err());
}

#[test]
fn query_string_uses_nested_where_keys() {
    let source = RecordingSource::with_replies([]);
    let q = people(&source)
        .filter(CREATED_AT.lt("2024-06-01"))
        .unwrap()
        .take(10)
        .unwrap();

    let qs = q.build().to_query_string().unwrap();
    assert_eq!(qs, "where%5Bcreated_at%5D%5Blt%5D=2024-06-01&per_page=10");
}

#[test]
fn operator_like_values_are_rejected() {
    let source = RecordingSource::with_replies([]);
    let base = people(&source);

    assert!(matches!(
        base.where_eq(STATUS, "!active"),
        Err(QueryError::InvalidArgument { param: "value", .. })
    ));
    assert!(base.where_eq(STATUS, "null").is_err());
    assert!(base.where_all([(STATUS, "ok"), (GENDER, "!M")]).is_err());
    assert!(base.filter(STATUS.eq("!active")).is_err());
    assert!(base.params().filters.is_empty());

    // one member holding a comma is not two members
    assert!(matches!(
        base.where_in(LAST_NAME, ["Smith,Jones"]),
        Err(QueryError::InvalidArgument { param: "values", .. })
    ));
    assert!(base.where_not_in(LAST_NAME, ["a", "b,c"]).is_err());
    assert_eq!(
        base.where_in(LAST_NAME, ["Smith", "Jones"])
            .unwrap()
            .params()
            .filter("last_name"),
        Some("Smith,Jones")
    );
}
