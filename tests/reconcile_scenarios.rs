use std::collections::VecDeque;

use tempfile::TempDir;
use typelink::corpus::{Corpus, NameRecord, NomenclatureStatus, ReferenceKind, SpeciesTypeKind, Tag};
use typelink::engine::{DeferralReason, Deferral, MatchDecision, Outcome, Reconciler, RunContext, Summary};
use typelink::export::ExternalRow;
use typelink::memo::ExclusionMemo;
use typelink::operator::{Edit, Operator, Verdict};
use typelink::persist::{Database, PersistenceMode};
use typelink::source::{Mvz, Nhmuk, SourceAdapter, Usnm};
use typelink::{Result, TypelinkError};

struct Fixture {
    db: Database,
    memo: ExclusionMemo,
    context: RunContext,
    dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(PersistenceMode::InMemory).unwrap();
    let memo = ExclusionMemo::open(dir.path().join("excluded.txt")).unwrap();
    let context = RunContext::establish(&db, "collection export", "type collection").unwrap();
    Fixture { db, memo, context, dir }
}

impl Fixture {
    fn name(&self, name: &str, authority: &str, year: i32) -> NameRecord {
        self.db
            .create_name(name, Some(authority), Some(year), NomenclatureStatus::Available)
            .unwrap()
    }
    fn reload(&self, record: &NameRecord) -> NameRecord {
        self.db.name(record.id()).unwrap().unwrap()
    }
    fn run(&mut self, adapter: &dyn SourceAdapter, rows: Vec<ExternalRow>) -> Result<Summary> {
        Reconciler::new(&self.db, adapter, &mut self.memo, self.context.clone()).run(rows)
    }
    fn run_with(&mut self, adapter: &dyn SourceAdapter, rows: Vec<ExternalRow>, operator: &mut Scripted) -> Result<Summary> {
        Reconciler::new(&self.db, adapter, &mut self.memo, self.context.clone())
            .with_operator(operator)
            .run(rows)
    }
}

/// Answers deferrals from a script; runs out by quitting.
#[derive(Default)]
struct Scripted {
    verdicts: VecDeque<Verdict>,
    seen: Vec<DeferralReason>,
}

impl Scripted {
    fn answering(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            verdicts: verdicts.into_iter().collect(),
            seen: Vec::new(),
        }
    }
}

impl Operator for Scripted {
    fn present(&mut self, deferral: &Deferral) -> Result<Verdict> {
        self.seen.push(deferral.reason.clone());
        self.verdicts.pop_front().ok_or(TypelinkError::OperatorAbort)
    }
}

fn nhmuk_row(catalog: &str, taxon: &str, status: &str) -> ExternalRow {
    ExternalRow::new([
        ("catalogNumber", catalog),
        ("scientificName", taxon),
        ("typeStatus", status),
        ("occurrenceID", catalog),
    ])
}

fn links(record: &NameRecord) -> usize {
    record
        .tags()
        .iter()
        .filter(|tag| matches!(tag, Tag::TypeSpecimenLink { .. }))
        .count()
}

#[test]
fn fills_empty_type_specimen_and_links_once() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    let summary = f
        .run(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")])
        .unwrap();
    assert_eq!(summary.count(Outcome::Matched), 1);
    let mouse = f.reload(&mouse);
    assert_eq!(mouse.type_specimen(), Some("BMNH 42"));
    assert_eq!(links(&mouse), 1);
    assert_eq!(mouse.collection(), Some(f.context.collection()));
    assert_eq!(mouse.species_type_kind(), Some(SpeciesTypeKind::Holotype));
}

#[test]
fn rerunning_changes_nothing() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    let rows = vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")];
    f.run(&Nhmuk, rows.clone()).unwrap();
    let before = f.reload(&mouse);
    let ledger = f.db.ledger_length().unwrap();

    let summary = f.run(&Nhmuk, rows).unwrap();
    assert_eq!(summary.count(Outcome::TagAlreadyPresent), 1);
    assert_eq!(f.reload(&mouse), before);
    assert_eq!(f.db.ledger_length().unwrap(), ledger);
}

#[test]
fn rerun_without_link_tag_is_still_idempotent() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    let row = ExternalRow::new([
        ("catalogNumber", "BMNH 42"),
        ("scientificName", "Mus musculus Linnaeus, 1758"),
        ("typeStatus", "Holotype"),
        ("locality", "Uppsala"),
    ]);
    f.run(&Nhmuk, vec![row.clone()]).unwrap();
    let ledger = f.db.ledger_length().unwrap();
    let summary = f.run(&Nhmuk, vec![row]).unwrap();
    assert_eq!(summary.count(Outcome::TagAlreadyPresent), 1);
    assert_eq!(f.db.ledger_length().unwrap(), ledger);
    assert_eq!(f.reload(&mouse).tags().len(), 1);
}

#[test]
fn unextractable_taxon_cannot_be_parsed() {
    let mut f = fixture();
    f.name("Mus musculus", "Linnaeus", 1758);
    let summary = f
        .run(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus, no authority", "Holotype")])
        .unwrap();
    assert_eq!(summary.count(Outcome::CannotParse), 1);
    assert_eq!(f.db.ledger_length().unwrap(), 0);
}

#[test]
fn excluded_identifiers_stay_excluded() {
    let mut f = fixture();
    f.name("Mus musculus", "Thomas", 1758);
    let rows = vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")];
    let mut operator = Scripted::answering([Verdict::RejectAndExclude]);
    let summary = f.run_with(&Nhmuk, rows.clone(), &mut operator).unwrap();
    assert_eq!(summary.count(Outcome::Excluded), 1);
    assert_eq!(operator.seen, vec![DeferralReason::NoExactMatch]);

    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    let summary = f.run(&Nhmuk, rows).unwrap();
    assert_eq!(summary.count(Outcome::Excluded), 1);
    assert_eq!(f.reload(&mouse).type_specimen(), None);
    assert_eq!(f.db.ledger_length().unwrap(), 0);

    let reopened = ExclusionMemo::open(f.dir.path().join("excluded.txt")).unwrap();
    assert!(reopened.contains("BMNH 42"));
}

#[test]
fn years_match_within_two() {
    let mut f = fixture();
    let near = f.name("Mus musculus", "Linnaeus", 1760);
    let far = f.name("Mus spretus", "Lataste", 1883);
    let summary = f
        .run(
            &Nhmuk,
            vec![
                nhmuk_row("BMNH 1", "Mus musculus Linnaeus, 1758", "Holotype"),
                nhmuk_row("BMNH 2", "Mus spretus Lataste, 1880", "Holotype"),
            ],
        )
        .unwrap();
    assert_eq!(summary.count(Outcome::Matched), 1);
    assert_eq!(summary.count(Outcome::CannotFindName), 1);
    assert_eq!(f.reload(&near).type_specimen(), Some("BMNH 1"));
    assert_eq!(f.reload(&far).type_specimen(), None);
}

#[test]
fn unavailable_names_and_non_types_are_skipped() {
    let mut f = fixture();
    let nudum = f
        .db
        .create_name("Mus nudus", Some("Gray"), Some(1843), NomenclatureStatus::NomenNudum)
        .unwrap();
    f.name("Mus musculus", "Linnaeus", 1758);
    let summary = f
        .run(
            &Nhmuk,
            vec![
                nhmuk_row("BMNH 1", "Mus nudus Gray, 1843", "Holotype"),
                nhmuk_row("BMNH 2", "Mus musculus Linnaeus, 1758", "Paratype"),
                nhmuk_row("", "Mus musculus Linnaeus, 1758", "Holotype"),
            ],
        )
        .unwrap();
    assert_eq!(summary.count(Outcome::HasStatus(NomenclatureStatus::NomenNudum)), 1);
    assert_eq!(summary.count(Outcome::NotAType), 1);
    assert_eq!(summary.count(Outcome::CannotParse), 1);
    assert_eq!(summary.total(), 3);
    assert_eq!(f.reload(&nudum).type_specimen(), None);
    assert_eq!(f.db.ledger_length().unwrap(), 0);
    assert!(summary.to_string().contains("has status nomen_nudum: 1"));
}

#[test]
fn existing_type_is_not_overwritten() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    f.db.set_type_specimen(mouse.id(), "BMNH 1900.5.5.5").unwrap();
    let summary = f
        .run(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")])
        .unwrap();
    assert_eq!(summary.count(Outcome::CannotFindName), 1);
    let mouse = f.reload(&mouse);
    assert_eq!(mouse.type_specimen(), Some("BMNH 1900.5.5.5"));
    assert!(mouse.tags().is_empty());
}

#[test]
fn unreadable_existing_type_cannot_be_parsed() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    f.db.set_type_specimen(mouse.id(), "see Thomas (1901)").unwrap();
    let summary = f
        .run(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")])
        .unwrap();
    assert_eq!(summary.count(Outcome::CannotParse), 1);
    assert_eq!(f.reload(&mouse).type_specimen(), Some("see Thomas (1901)"));
}

#[test]
fn less_precise_type_is_replaced() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    f.db.set_type_specimen(mouse.id(), "BMNH 1900.1.1").unwrap();
    let summary = f
        .run(&Nhmuk, vec![nhmuk_row("NHMUK 1900.1.1.1", "Mus musculus Linnaeus, 1758", "Holotype")])
        .unwrap();
    assert_eq!(summary.count(Outcome::MatchedWithExistingType), 1);
    assert_eq!(f.reload(&mouse).type_specimen(), Some("BMNH 1900.1.1.1"));
}

#[test]
fn different_collection_is_a_conflict() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    let elsewhere = f
        .db
        .get_or_create_singleton_by_label(ReferenceKind::Collection, "another museum")
        .unwrap();
    f.db.set_collection(mouse.id(), &elsewhere).unwrap();
    let rows = vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")];
    let decision = Reconciler::new(&f.db, &Nhmuk, &mut f.memo, f.context.clone())
        .assess(&rows[0])
        .unwrap();
    match decision {
        MatchDecision::Deferred(deferral) => match &deferral.reason {
            DeferralReason::Conflict(conflict) => assert_eq!(conflict.existing_collection, Some(elsewhere)),
            other => panic!("expected a collection conflict, got {other:?}"),
        },
        other => panic!("expected a deferral, got {other:?}"),
    }
}

#[test]
fn syntypes_join_the_series() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    let row = |catalog: &str| {
        let link = format!("http://n2t.net/ark:/65665/{catalog}");
        ExternalRow::new([
            ("catalogNumber", catalog),
            ("typeStatus", "Syntype"),
            ("scientificName", "Mus musculus"),
            ("scientificNameAuthorship", "Linnaeus, 1758"),
            ("occurrenceID", link.as_str()),
        ])
    };
    let summary = f.run(&Usnm, vec![row("100"), row("101")]).unwrap();
    assert_eq!(summary.count(Outcome::Matched), 1);
    assert_eq!(summary.count(Outcome::MatchedWithExistingType), 1);
    let mouse = f.reload(&mouse);
    assert_eq!(mouse.type_specimen(), Some("USNM 100, USNM 101"));
    assert_eq!(mouse.species_type_kind(), Some(SpeciesTypeKind::Syntypes));
    assert_eq!(links(&mouse), 2);
}

#[test]
fn syntypes_do_not_join_a_holotype() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    f.db.set_type_specimen(mouse.id(), "USNM 100").unwrap();
    f.db.set_species_type_kind(mouse.id(), SpeciesTypeKind::Holotype).unwrap();
    let ledger = f.db.ledger_length().unwrap();
    let row = ExternalRow::new([
        ("catalogNumber", "101"),
        ("typeStatus", "Syntype"),
        ("scientificName", "Mus musculus"),
        ("scientificNameAuthorship", "Linnaeus, 1758"),
    ]);
    let decision = Reconciler::new(&f.db, &Usnm, &mut f.memo, f.context.clone())
        .assess(&row)
        .unwrap();
    assert!(matches!(
        decision,
        MatchDecision::Deferred(ref deferral) if matches!(deferral.reason, DeferralReason::Conflict(_))
    ));

    let summary = f.run(&Usnm, vec![row]).unwrap();
    assert_eq!(summary.count(Outcome::CannotFindName), 1);
    let mouse = f.reload(&mouse);
    assert_eq!(mouse.type_specimen(), Some("USNM 100"));
    assert_eq!(mouse.species_type_kind(), Some(SpeciesTypeKind::Holotype));
    assert_eq!(f.db.ledger_length().unwrap(), ledger);
}

#[test]
fn arctos_guid_numbers_replace_suffixed_ones() {
    let mut f = fixture();
    let gopher = f.name("Thomomys bottae mewa", "Thaeler", 1968);
    f.db.set_type_specimen(gopher.id(), "MVZ 12345a").unwrap();
    let row = ExternalRow::new([
        ("guid", "MVZ:Mamm:12345"),
        ("typestatus", "holotype of Thomomys bottae mewa Thaeler, 1968"),
        ("scientific_name", "Thomomys bottae"),
        ("spec_locality", "Mewa"),
        ("country", "United States"),
    ]);
    let summary = f.run(&Mvz, vec![row]).unwrap();
    assert_eq!(summary.count(Outcome::MatchedWithExistingType), 1);
    let gopher = f.reload(&gopher);
    assert_eq!(gopher.type_specimen(), Some("MVZ 12345"));
    assert!(gopher.has_tag(&Tag::LocationDetail {
        text: "Mewa, United States".to_string(),
        source: f.context.citation().id(),
    }));
    assert!(gopher.has_tag(&Tag::TypeSpecimenLink {
        url: "https://arctos.database.museum/guid/MVZ:Mamm:12345".to_string(),
    }));
}

#[test]
fn assessing_does_not_mutate() {
    let mut f = fixture();
    f.name("Mus musculus", "Linnaeus", 1758);
    let row = nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype");
    let reconciler = Reconciler::new(&f.db, &Nhmuk, &mut f.memo, f.context.clone());
    assert!(matches!(reconciler.assess(&row).unwrap(), MatchDecision::Matched(_)));
    assert_eq!(f.db.ledger_length().unwrap(), 0);
}

#[test]
fn operator_approves_conflict_keeping_existing_type() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    f.db.set_type_specimen(mouse.id(), "BMNH 1900.5.5.5").unwrap();
    let mut operator = Scripted::answering([Verdict::Approve]);
    let summary = f
        .run_with(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")], &mut operator)
        .unwrap();
    assert_eq!(summary.count(Outcome::MatchedWithExistingType), 1);
    let mouse = f.reload(&mouse);
    assert_eq!(mouse.type_specimen(), Some("BMNH 1900.5.5.5"));
    assert_eq!(links(&mouse), 1);
}

#[test]
fn operator_picks_between_ambiguous_names() {
    let mut f = fixture();
    let first = f.name("Mus musculus", "Linnaeus", 1758);
    let second = f.name("Mus musculus", "Linnaeus", 1759);
    let mut operator = Scripted::answering([Verdict::EditThenApprove(Edit {
        record: Some(second.id()),
        type_specimen: None,
    })]);
    let summary = f
        .run_with(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")], &mut operator)
        .unwrap();
    assert_eq!(operator.seen, vec![DeferralReason::Ambiguous]);
    assert_eq!(summary.count(Outcome::Matched), 1);
    assert_eq!(f.reload(&first).type_specimen(), None);
    assert_eq!(f.reload(&second).type_specimen(), Some("BMNH 42"));
}

#[test]
fn operator_edits_are_checked_against_the_grammar() {
    let mut f = fixture();
    let mouse = f.name("Mus musculus", "Linnaeus", 1758);
    f.db.set_type_specimen(mouse.id(), "BMNH 1900.5.5.5").unwrap();
    let ledger = f.db.ledger_length().unwrap();
    let rows = vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")];
    let mut operator = Scripted::answering([
        Verdict::EditThenApprove(Edit {
            record: None,
            type_specimen: Some("BMNH 42,".to_string()),
        }),
        Verdict::EditThenApprove(Edit {
            record: None,
            type_specimen: Some("BMNH 42 (= BMNH 1900.5.5.5)".to_string()),
        }),
    ]);
    let summary = f.run_with(&Nhmuk, rows.clone(), &mut operator).unwrap();
    assert_eq!(summary.count(Outcome::CannotParse), 1);
    assert_eq!(f.db.ledger_length().unwrap(), ledger);

    let summary = f.run_with(&Nhmuk, rows, &mut operator).unwrap();
    assert_eq!(summary.count(Outcome::MatchedWithExistingType), 1);
    assert_eq!(f.reload(&mouse).type_specimen(), Some("BMNH 42 (= BMNH 1900.5.5.5)"));
}

#[test]
fn rejected_and_unattended_deferrals_degrade() {
    let mut f = fixture();
    f.name("Mus musculus", "Linnaeus", 1758);
    f.name("Mus musculus", "Linnaeus", 1758);
    let rows = vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")];
    let mut operator = Scripted::answering([Verdict::Reject]);
    let summary = f.run_with(&Nhmuk, rows.clone(), &mut operator).unwrap();
    assert_eq!(summary.count(Outcome::CannotFindName), 1);
    let summary = f.run(&Nhmuk, rows).unwrap();
    assert_eq!(summary.count(Outcome::CannotFindName), 1);
    assert_eq!(f.db.ledger_length().unwrap(), 0);
}

#[test]
fn unknown_names_are_not_put_to_the_operator() {
    let mut f = fixture();
    let mut operator = Scripted::default();
    let summary = f
        .run_with(&Nhmuk, vec![nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype")], &mut operator)
        .unwrap();
    assert_eq!(summary.count(Outcome::CannotFindName), 1);
    assert!(operator.seen.is_empty());
}

#[test]
fn quitting_keeps_committed_rows() {
    let mut f = fixture();
    let field_mouse = f.name("Apodemus sylvaticus", "Linnaeus", 1758);
    f.name("Mus musculus", "Linnaeus", 1758);
    f.name("Mus musculus", "Linnaeus", 1758);
    let rows = vec![
        nhmuk_row("BMNH 42", "Mus musculus Linnaeus, 1758", "Holotype"),
        nhmuk_row("BMNH 7", "Apodemus sylvaticus (Linnaeus, 1758)", "Holotype"),
    ];
    let mut operator = Scripted::default();
    let result = f.run_with(&Nhmuk, rows, &mut operator);
    assert!(matches!(result, Err(TypelinkError::OperatorAbort)));
    assert_eq!(f.reload(&field_mouse).type_specimen(), Some("BMNH 7"));
}

#[test]
fn summary_reports_every_outcome() {
    let mut summary = Summary::default();
    summary.record(Outcome::Matched);
    summary.record(Outcome::Matched);
    summary.record(Outcome::NotAType);
    assert_eq!(summary.to_string(), "total: 3\nmatched: 2\nnot a type: 1\n");
    let json = summary.to_json();
    assert_eq!(json["total"], 3);
    assert_eq!(json["outcomes"]["matched"], 2);
}
