// used for persistence
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::corpus::{
    Corpus, NameField, NameRecord, NomenclatureStatus, RecordId, Reference, ReferenceKind,
    SpeciesTypeKind, Tag,
};
use crate::error::{Result, TypelinkError};

const NAME_QUERY: &str = "
    select n.Name_Identity,
           n.CorrectedOriginalName,
           n.Authority,
           n.Year,
           n.NomenclatureStatus,
           n.TypeSpecimen,
           n.SpeciesTypeKind,
           r.Reference_Identity,
           r.Kind,
           r.Label
      from Name n
      left join Reference r
        on r.Reference_Identity = n.Collection_Identity
";

// A name as it sits in the Name table, before its text columns are interpreted.
struct StoredName {
    id: RecordId,
    corrected_original_name: String,
    authority: Option<String>,
    year: Option<i32>,
    nomenclature_status: String,
    type_specimen: Option<String>,
    species_type_kind: Option<String>,
    collection_id: Option<RecordId>,
    collection_kind: Option<String>,
    collection_label: Option<String>,
}

impl StoredName {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            corrected_original_name: row.get(1)?,
            authority: row.get(2)?,
            year: row.get(3)?,
            nomenclature_status: row.get(4)?,
            type_specimen: row.get(5)?,
            species_type_kind: row.get(6)?,
            collection_id: row.get(7)?,
            collection_kind: row.get(8)?,
            collection_label: row.get(9)?,
        })
    }
    fn into_record(self, tags: Vec<Tag>) -> Result<NameRecord> {
        let collection = match (self.collection_id, self.collection_kind, self.collection_label) {
            (Some(id), Some(kind), Some(label)) => Some(Reference::new(id, kind.parse()?, label)),
            _ => None,
        };
        let species_type_kind = match self.species_type_kind {
            Some(kind) => Some(kind.parse::<SpeciesTypeKind>()?),
            None => None,
        };
        Ok(NameRecord {
            id: self.id,
            corrected_original_name: self.corrected_original_name,
            authority: self.authority,
            year: self.year,
            nomenclature_status: self.nomenclature_status.parse()?,
            type_specimen: self.type_specimen,
            collection,
            species_type_kind,
            tags,
        })
    }
}

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
    // head of the change ledger, chained through every committed mutation
    superhash: Option<String>,
}
impl Persistor {
    pub fn new(connection: Connection) -> Result<Self> {
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            pragma foreign_keys = on;
            create table if not exists Reference (
                Reference_Identity integer not null,
                Kind text not null,
                Label text not null,
                constraint referenceable_Reference_Identity primary key (
                    Reference_Identity
                ),
                constraint unique_Reference unique (
                    Kind,
                    Label
                )
            );-- STRICT;
            create table if not exists Name (
                Name_Identity integer not null,
                CorrectedOriginalName text not null,
                Authority text null,
                Year integer null,
                NomenclatureStatus text not null,
                TypeSpecimen text null,
                Collection_Identity integer null,
                SpeciesTypeKind text null,
                constraint referenceable_Name_Identity primary key (
                    Name_Identity
                ),
                constraint Collection_is_Reference foreign key (
                    Collection_Identity
                ) references Reference(Reference_Identity)
            );-- STRICT;
            create index if not exists Name_by_CorrectedOriginalName on Name (
                CorrectedOriginalName
            );
            create table if not exists Tag (
                Name_Identity integer not null,
                Position integer not null,
                Tag text not null,
                constraint Tag_of_Name foreign key (
                    Name_Identity
                ) references Name(Name_Identity),
                constraint unique_Tag unique (
                    Name_Identity,
                    Tag
                )
            );-- STRICT;
            create table if not exists Ledger (
                Ledger_Identity integer not null,
                Name_Identity integer not null,
                Change text not null,
                ChangedAt text not null,
                Superhash text not null,
                constraint referenceable_Ledger_Identity primary key (
                    Ledger_Identity
                )
            );-- STRICT;
            ",
        )?;
        let superhash = connection
            .query_row(
                "select Superhash from Ledger order by Ledger_Identity desc limit 1",
                [],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(Self { connection, superhash })
    }
    pub fn current_superhash(&self) -> Option<String> {
        self.superhash.clone()
    }
    pub fn ledger_length(&self) -> Result<usize> {
        let length: i64 = self
            .connection
            .query_row("select count(*) from Ledger", [], |r| r.get(0))?;
        Ok(length as usize)
    }
    fn append_ledger(&mut self, name: RecordId, change: &str) -> Result<()> {
        let changed_at: DateTime<Utc> = Utc::now();
        let mut hasher = blake3::Hasher::new();
        if let Some(previous) = &self.superhash {
            hasher.update(previous.as_bytes());
        }
        hasher.update(&name.to_le_bytes());
        hasher.update(change.as_bytes());
        hasher.update(changed_at.to_rfc3339().as_bytes());
        let superhash = hasher.finalize().to_hex().to_string();
        self.connection.execute(
            "insert into Ledger (Name_Identity, Change, ChangedAt, Superhash) values (?, ?, ?, ?)",
            params![name, change, changed_at, superhash],
        )?;
        debug!(name, change, "ledger appended");
        self.superhash = Some(superhash);
        Ok(())
    }
    pub fn add_name(
        &mut self,
        corrected_original_name: &str,
        authority: Option<&str>,
        year: Option<i32>,
        status: NomenclatureStatus,
    ) -> Result<RecordId> {
        self.connection.execute(
            "insert into Name (CorrectedOriginalName, Authority, Year, NomenclatureStatus) values (?, ?, ?, ?)",
            params![corrected_original_name, authority, year, status.as_str()],
        )?;
        Ok(self.connection.last_insert_rowid())
    }
    pub fn names_by(&self, field: NameField, value: &str) -> Result<Vec<NameRecord>> {
        let sql = format!("{NAME_QUERY} where n.{} = ? order by n.Name_Identity", field.column());
        let stored = self
            .connection
            .prepare_cached(&sql)?
            .query_map(params![value], StoredName::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        stored
            .into_iter()
            .map(|name| {
                let tags = self.tags(name.id)?;
                name.into_record(tags)
            })
            .collect()
    }
    pub fn name(&self, id: RecordId) -> Result<Option<NameRecord>> {
        let sql = format!("{NAME_QUERY} where n.Name_Identity = ?");
        let stored = self
            .connection
            .prepare_cached(&sql)?
            .query_row(params![id], StoredName::from_row)
            .optional()?;
        match stored {
            Some(name) => {
                let tags = self.tags(id)?;
                Ok(Some(name.into_record(tags)?))
            }
            None => Ok(None),
        }
    }
    fn tags(&self, id: RecordId) -> Result<Vec<Tag>> {
        let texts = self
            .connection
            .prepare_cached("select Tag from Tag where Name_Identity = ? order by Position")?
            .query_map(params![id], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        texts
            .iter()
            .map(|text| serde_json::from_str::<Tag>(text).map_err(TypelinkError::from))
            .collect()
    }
    pub fn add_tag(&mut self, id: RecordId, tag: &Tag) -> Result<bool> {
        let text = serde_json::to_string(tag)?;
        let known = self
            .connection
            .query_row("select 1 from Name where Name_Identity = ?", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if !known {
            return Err(TypelinkError::Persistence(format!("there is no name #{id}")));
        }
        let inserted = self.connection.execute(
            "
            insert or ignore into Tag (Name_Identity, Position, Tag)
            select ?1, coalesce(max(Position), 0) + 1, ?2
              from Tag
             where Name_Identity = ?1
            ",
            params![id, text],
        )?;
        if inserted > 0 {
            self.append_ledger(id, &format!("add tag {text}"))?;
        }
        Ok(inserted > 0)
    }
    pub fn reference(&mut self, kind: ReferenceKind, label: &str) -> Result<Reference> {
        let existing = self
            .connection
            .query_row(
                "select Reference_Identity from Reference where Kind = ? and Label = ?",
                params![kind.as_str(), label],
                |r| r.get::<_, RecordId>(0),
            )
            .optional()?;
        let id = match existing {
            Some(id) => id,
            None => {
                self.connection.execute(
                    "insert into Reference (Kind, Label) values (?, ?)",
                    params![kind.as_str(), label],
                )?;
                self.connection.last_insert_rowid()
            }
        };
        Ok(Reference::new(id, kind, label.to_string()))
    }
    fn update_name<V: ToSql>(&mut self, id: RecordId, column: &str, value: V, change: String) -> Result<()> {
        let updated = self.connection.execute(
            &format!("update Name set {column} = ? where Name_Identity = ?"),
            params![value, id],
        )?;
        if updated == 0 {
            return Err(TypelinkError::Persistence(format!("there is no name #{id}")));
        }
        self.append_ledger(id, &change)
    }
}

// ------------- Database -------------
pub enum PersistenceMode {
    InMemory,
    File(String),
}

impl PersistenceMode {
    /// `:memory:` selects an in-memory store, anything else is a file path.
    pub fn from_setting(setting: &str) -> Self {
        match setting.trim() {
            ":memory:" => Self::InMemory,
            path => Self::File(path.to_string()),
        }
    }
}

/// A corpus backed by SQLite.
pub struct Database {
    pub persistor: Arc<Mutex<Persistor>>,
}

impl Database {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        Ok(Self {
            persistor: Arc::new(Mutex::new(Persistor::new(connection)?)),
        })
    }
    fn persistor(&self) -> Result<MutexGuard<'_, Persistor>> {
        Ok(self.persistor.lock()?)
    }
    /// Adds a bare name to the corpus.
    pub fn create_name(
        &self,
        corrected_original_name: &str,
        authority: Option<&str>,
        year: Option<i32>,
        status: NomenclatureStatus,
    ) -> Result<NameRecord> {
        let mut persistor = self.persistor()?;
        let id = persistor.add_name(corrected_original_name, authority, year, status)?;
        persistor
            .name(id)?
            .ok_or_else(|| TypelinkError::Invariant(format!("name #{id} vanished after insert")))
    }
    pub fn ledger_length(&self) -> Result<usize> {
        self.persistor()?.ledger_length()
    }
}

impl Corpus for Database {
    fn lookup_by_exact_field(&self, field: NameField, value: &str) -> Result<Vec<NameRecord>> {
        self.persistor()?.names_by(field, value)
    }
    fn name(&self, id: RecordId) -> Result<Option<NameRecord>> {
        self.persistor()?.name(id)
    }
    fn get_or_create_singleton_by_label(&self, kind: ReferenceKind, label: &str) -> Result<Reference> {
        self.persistor()?.reference(kind, label)
    }
    fn add_tag(&self, id: RecordId, tag: &Tag) -> Result<bool> {
        self.persistor()?.add_tag(id, tag)
    }
    fn set_type_specimen(&self, id: RecordId, type_specimen: &str) -> Result<()> {
        self.persistor()?
            .update_name(id, "TypeSpecimen", type_specimen, format!("set type specimen {type_specimen:?}"))
    }
    fn set_collection(&self, id: RecordId, collection: &Reference) -> Result<()> {
        self.persistor()?
            .update_name(id, "Collection_Identity", collection.id(), format!("set collection #{}", collection.id()))
    }
    fn set_species_type_kind(&self, id: RecordId, kind: SpeciesTypeKind) -> Result<()> {
        self.persistor()?
            .update_name(id, "SpeciesTypeKind", kind.as_str(), format!("set species type kind {kind}"))
    }
    fn set_nomenclature_status(&self, id: RecordId, status: NomenclatureStatus) -> Result<()> {
        self.persistor()?
            .update_name(id, "NomenclatureStatus", status.as_str(), format!("set nomenclature status {status}"))
    }
}
