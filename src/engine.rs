//! The reconciliation driver.
//!
//! [`Reconciler::assess`] turns a row into a [`MatchDecision`] by reading the
//! corpus only. [`Reconciler::run`] walks an export in review order, commits
//! matched decisions row by row, and hands deferred ones to the operator, if
//! there is one. Every row ends in exactly one [`Outcome`], tallied in a
//! [`Summary`].
use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::candidate::CandidateName;
use crate::classify::{self, Conflict, Eligibility, TypeUpdate};
use crate::corpus::{Corpus, NameRecord, NomenclatureStatus, Reference, ReferenceKind, SpeciesTypeKind, Tag};
use crate::error::{Result, TypelinkError};
use crate::export::ExternalRow;
use crate::lookup::{self, LookupResult};
use crate::memo::ExclusionMemo;
use crate::operator::{Edit, Operator, Verdict};
use crate::source::{SourceAdapter, TypeStatus};
use crate::specimen;

// ------------- Outcome -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    Matched,
    MatchedWithExistingType,
    CannotParse,
    CannotFindName,
    HasStatus(NomenclatureStatus),
    NotAType,
    Excluded,
    TagAlreadyPresent,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::MatchedWithExistingType => write!(f, "matched with existing type"),
            Self::CannotParse => write!(f, "cannot parse"),
            Self::CannotFindName => write!(f, "cannot find name"),
            Self::HasStatus(status) => write!(f, "has status {status}"),
            Self::NotAType => write!(f, "not a type"),
            Self::Excluded => write!(f, "excluded"),
            Self::TagAlreadyPresent => write!(f, "tag already present"),
        }
    }
}

/// Why a row was turned down without touching the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Excluded,
    NotAType,
    CannotParse,
    CannotFindName,
    HasStatus(NomenclatureStatus),
    TagAlreadyPresent,
}

impl From<Rejection> for Outcome {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Excluded => Self::Excluded,
            Rejection::NotAType => Self::NotAType,
            Rejection::CannotParse => Self::CannotParse,
            Rejection::CannotFindName => Self::CannotFindName,
            Rejection::HasStatus(status) => Self::HasStatus(status),
            Rejection::TagAlreadyPresent => Self::TagAlreadyPresent,
        }
    }
}

// ------------- Decision -------------
/// A mutation ready to be committed to one name.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub record: NameRecord,
    pub identifier: String,
    pub type_update: TypeUpdate,
    pub species_type_kind: SpeciesTypeKind,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeferralReason {
    /// Several names fit the candidate.
    Ambiguous,
    /// Names share the spelling, but not the authority and year.
    NoExactMatch,
    Conflict(Conflict),
}

impl fmt::Display for DeferralReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ambiguous => write!(f, "ambiguous name"),
            Self::NoExactMatch => write!(f, "no exact match"),
            Self::Conflict(conflict) => write!(f, "{conflict}"),
        }
    }
}

/// A case only a person can settle.
#[derive(Debug, Clone, PartialEq)]
pub struct Deferral {
    pub reason: DeferralReason,
    pub identifier: String,
    pub candidate: CandidateName,
    pub records: Vec<NameRecord>,
    pub species_type_kind: SpeciesTypeKind,
    pub tags: Vec<Tag>,
}

impl Deferral {
    /// The outcome recorded when nobody settles the case.
    pub fn unresolved_outcome(&self) -> Outcome {
        match &self.reason {
            DeferralReason::Conflict(conflict) if conflict.unparseable => Outcome::CannotParse,
            _ => Outcome::CannotFindName,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    Matched(Box<Proposal>),
    Rejected(Rejection),
    Deferred(Box<Deferral>),
}

// ------------- Summary -------------
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    total: usize,
    counts: BTreeMap<Outcome, usize>,
}

impl Summary {
    pub fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        *self.counts.entry(outcome).or_insert(0) += 1;
    }
    pub fn total(&self) -> usize {
        self.total
    }
    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }
    pub fn counts(&self) -> impl Iterator<Item = (&Outcome, &usize)> {
        self.counts.iter()
    }
    pub fn to_json(&self) -> serde_json::Value {
        let counts = self
            .counts
            .iter()
            .map(|(outcome, count)| (outcome.to_string(), serde_json::Value::from(*count)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::json!({ "total": self.total, "outcomes": counts })
    }
}

// One line per outcome so that runs can be diffed.
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "total: {}", self.total)?;
        for (outcome, count) in &self.counts {
            writeln!(f, "{outcome}: {count}")?;
        }
        Ok(())
    }
}

// ------------- Context -------------
/// The fixed objects a run refers to, created once and passed around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    citation: Reference,
    collection: Reference,
}

impl RunContext {
    pub fn new(citation: Reference, collection: Reference) -> Self {
        Self { citation, collection }
    }
    pub fn establish<C: Corpus + ?Sized>(corpus: &C, citation: &str, collection: &str) -> Result<Self> {
        Ok(Self {
            citation: corpus.get_or_create_singleton_by_label(ReferenceKind::Citation, citation)?,
            collection: corpus.get_or_create_singleton_by_label(ReferenceKind::Collection, collection)?,
        })
    }
    pub fn citation(&self) -> &Reference {
        &self.citation
    }
    pub fn collection(&self) -> &Reference {
        &self.collection
    }
}

// ------------- Reconciler -------------
pub struct Reconciler<'r, C: Corpus + ?Sized> {
    corpus: &'r C,
    adapter: &'r dyn SourceAdapter,
    memo: &'r mut ExclusionMemo,
    context: RunContext,
    operator: Option<&'r mut dyn Operator>,
}

impl<'r, C: Corpus + ?Sized> Reconciler<'r, C> {
    pub fn new(
        corpus: &'r C,
        adapter: &'r dyn SourceAdapter,
        memo: &'r mut ExclusionMemo,
        context: RunContext,
    ) -> Self {
        Self {
            corpus,
            adapter,
            memo,
            context,
            operator: None,
        }
    }
    /// Deferred cases go to `operator` instead of being tallied as unresolved.
    pub fn with_operator(mut self, operator: &'r mut dyn Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Reconciles every row. Only an operator abort (or a failing store)
    /// stops the run; whatever was committed before stays committed.
    pub fn run(&mut self, mut rows: Vec<ExternalRow>) -> Result<Summary> {
        rows.sort_by_cached_key(|row| self.adapter.sort_key(row));
        info!(source = self.adapter.name(), rows = rows.len(), "reconciliation started");
        let mut summary = Summary::default();
        for row in &rows {
            match self.reconcile(row) {
                Ok(outcome) => summary.record(outcome),
                Err(TypelinkError::OperatorAbort) => {
                    warn!(processed = summary.total(), "aborted by operator\n{summary}");
                    return Err(TypelinkError::OperatorAbort);
                }
                Err(e) => return Err(e),
            }
        }
        info!(source = self.adapter.name(), total = summary.total(), "reconciliation finished");
        Ok(summary)
    }

    pub fn reconcile(&mut self, row: &ExternalRow) -> Result<Outcome> {
        let outcome = match self.assess(row)? {
            MatchDecision::Matched(proposal) => self.commit(&proposal)?,
            MatchDecision::Rejected(rejection) => rejection.into(),
            MatchDecision::Deferred(deferral) => self.adjudicate(&deferral)?,
        };
        debug!(identifier = ?self.adapter.identifier(row), %outcome, "row reconciled");
        Ok(outcome)
    }

    pub fn assess(&self, row: &ExternalRow) -> Result<MatchDecision> {
        use MatchDecision::Rejected;

        let Some(identifier) = self.adapter.identifier(row) else {
            return Ok(Rejected(Rejection::CannotParse));
        };
        if self.memo.contains(&identifier) {
            return Ok(Rejected(Rejection::Excluded));
        }
        let TypeStatus::Type(species_type_kind) = self.adapter.type_status(row) else {
            return Ok(Rejected(Rejection::NotAType));
        };
        if let Err(e) = specimen::parse(&identifier) {
            debug!(%identifier, error = %e, "identifier does not parse");
            return Ok(Rejected(Rejection::CannotParse));
        }
        let candidate = match self.adapter.candidate(row) {
            Ok(candidate) => candidate,
            Err(TypelinkError::Extraction { text }) => {
                debug!(%identifier, %text, "no name in taxon text");
                return Ok(Rejected(Rejection::CannotParse));
            }
            Err(e) => return Err(e),
        };
        let tags = self.adapter.tags(row, &self.context);
        let defer = |reason, records| {
            MatchDecision::Deferred(Box::new(Deferral {
                reason,
                identifier: identifier.clone(),
                candidate: candidate.clone(),
                records,
                species_type_kind,
                tags: tags.clone(),
            }))
        };
        let record = match lookup::find_name(self.corpus, &candidate)? {
            LookupResult::Unique(record) => record,
            LookupResult::Ambiguous(records) => return Ok(defer(DeferralReason::Ambiguous, records)),
            LookupResult::Empty { near_misses } if near_misses.is_empty() => {
                return Ok(Rejected(Rejection::CannotFindName));
            }
            LookupResult::Empty { near_misses } => {
                return Ok(defer(DeferralReason::NoExactMatch, near_misses));
            }
        };
        if let Eligibility::Ineligible(status) = classify::eligibility(&record) {
            return Ok(Rejected(Rejection::HasStatus(status)));
        }
        let link_present = tags
            .iter()
            .any(|tag| matches!(tag, Tag::TypeSpecimenLink { .. }) && record.has_tag(tag));
        if link_present {
            return Ok(Rejected(Rejection::TagAlreadyPresent));
        }
        let plan = classify::plan_type_update(
            &record,
            &identifier,
            species_type_kind,
            self.adapter,
            self.context.collection(),
        );
        match plan {
            Ok(type_update) => Ok(MatchDecision::Matched(Box::new(Proposal {
                record,
                identifier: identifier.clone(),
                type_update,
                species_type_kind,
                tags: tags.clone(),
            }))),
            Err(conflict) => Ok(defer(DeferralReason::Conflict(conflict), vec![record])),
        }
    }

    /// Applies a proposal: tags are added unless present, and fields are only
    /// written when empty or when the plan says so.
    fn commit(&self, proposal: &Proposal) -> Result<Outcome> {
        let record = &proposal.record;
        let id = record.id();
        let mut changes = 0;
        for tag in &proposal.tags {
            if !record.has_tag(tag) && self.corpus.add_tag(id, tag)? {
                changes += 1;
            }
        }
        if let Some(text) = proposal.type_update.text() {
            if record.type_specimen() != Some(text) {
                self.corpus.set_type_specimen(id, text)?;
                changes += 1;
            }
        }
        if record.collection().is_none() {
            self.corpus.set_collection(id, self.context.collection())?;
            changes += 1;
        }
        if record.species_type_kind().is_none() {
            self.corpus.set_species_type_kind(id, proposal.species_type_kind)?;
            changes += 1;
        }
        let outcome = if changes == 0 {
            Outcome::TagAlreadyPresent
        } else if matches!(proposal.type_update, TypeUpdate::Fill(_)) {
            Outcome::Matched
        } else {
            Outcome::MatchedWithExistingType
        };
        info!(name = id, identifier = %proposal.identifier, changes, %outcome, "committed");
        Ok(outcome)
    }

    fn adjudicate(&mut self, deferral: &Deferral) -> Result<Outcome> {
        let verdict = match self.operator.as_mut() {
            Some(operator) => operator.present(deferral)?,
            None => return Ok(deferral.unresolved_outcome()),
        };
        info!(identifier = %deferral.identifier, reason = %deferral.reason, ?verdict, "adjudicated");
        match verdict {
            Verdict::Approve => match (&deferral.reason, deferral.records.as_slice()) {
                (DeferralReason::Conflict(_), [record]) => self.commit(&Proposal {
                    record: record.clone(),
                    identifier: deferral.identifier.clone(),
                    type_update: TypeUpdate::Keep,
                    species_type_kind: deferral.species_type_kind,
                    tags: deferral.tags.clone(),
                }),
                (_, [record]) => self.apply_edit(deferral, Edit { record: Some(record.id()), type_specimen: None }),
                _ => Ok(deferral.unresolved_outcome()),
            },
            Verdict::EditThenApprove(edit) => self.apply_edit(deferral, edit),
            Verdict::Reject => Ok(deferral.unresolved_outcome()),
            Verdict::RejectAndExclude => {
                self.memo.record(&deferral.identifier)?;
                Ok(Outcome::Excluded)
            }
        }
    }

    // The operator picked a name and possibly wrote the type specimen text
    // themselves; their text goes in even over existing text.
    fn apply_edit(&self, deferral: &Deferral, edit: Edit) -> Result<Outcome> {
        let record = match edit.record {
            Some(id) => match deferral.records.iter().find(|r| r.id() == id) {
                Some(record) => Some(record.clone()),
                None => self.corpus.name(id)?,
            },
            None => match deferral.records.as_slice() {
                [record] => Some(record.clone()),
                _ => None,
            },
        };
        let Some(record) = record else {
            return Ok(deferral.unresolved_outcome());
        };
        if let Eligibility::Ineligible(status) = classify::eligibility(&record) {
            return Ok(Outcome::HasStatus(status));
        }
        let type_update = match edit.type_specimen {
            Some(text) => {
                if let Err(e) = specimen::parse(&text) {
                    warn!(%text, error = %e, "edited type specimen does not parse");
                    return Ok(Outcome::CannotParse);
                }
                match record.type_specimen() {
                    None => TypeUpdate::Fill(text),
                    Some(existing) if existing == text => TypeUpdate::Keep,
                    Some(_) => TypeUpdate::Replace(text),
                }
            }
            None => classify::plan_type_update(
                &record,
                &deferral.identifier,
                deferral.species_type_kind,
                self.adapter,
                self.context.collection(),
            )
            .unwrap_or(TypeUpdate::Keep),
        };
        self.commit(&Proposal {
            record,
            identifier: deferral.identifier.clone(),
            type_update,
            species_type_kind: deferral.species_type_kind,
            tags: deferral.tags.clone(),
        })
    }
}
