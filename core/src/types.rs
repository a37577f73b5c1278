//! Record model and sheet cell values

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a record or parent aggregate
pub type RecordId = u64;

/// Ordered bag of JSON properties
pub type FieldMap = IndexMap<String, Value>;

/// Repeating subrecord families stored as plain property bags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubrecordKind {
    /// Date statements
    Date,
    /// Extent statements
    Extent,
}

impl SubrecordKind {
    /// All kinds in column order
    pub const ALL: [Self; 2] = [Self::Date, Self::Extent];

    /// Property holding the subrecord list, also the path prefix
    #[must_use]
    pub fn property_name(self) -> &'static str {
        match self {
            Self::Date => "dates",
            Self::Extent => "extents",
        }
    }

    /// Singular label used in headers and messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Extent => "Extent",
        }
    }

    /// Look up a kind by its property name
    #[must_use]
    pub fn from_property_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.property_name() == name)
    }
}

/// Note types exposed as sheet columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    /// Conditions governing access
    AccessRestrict,
    /// Scope and contents
    ScopeContent,
    /// Biographical / historical
    BiogHist,
}

impl NoteType {
    /// All note types in column order
    pub const ALL: [Self; 3] = [Self::AccessRestrict, Self::ScopeContent, Self::BiogHist];

    /// Code stored in the note's `type` property
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::AccessRestrict => "accessrestrict",
            Self::ScopeContent => "scopecontent",
            Self::BiogHist => "bioghist",
        }
    }

    /// Human label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AccessRestrict => "Conditions Governing Access",
            Self::ScopeContent => "Scope and Contents",
            Self::BiogHist => "Biographical / Historical",
        }
    }

    /// Look up a note type by its code
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Reference to a top container held by the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerRef(pub String);

impl ContainerRef {
    /// Create a reference from its URI
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Reference URI
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Natural key of a top container within one parent aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerKey {
    /// Container type code (box, folder, ...)
    #[serde(default, rename = "type")]
    pub container_type: Option<String>,
    /// Indicator
    #[serde(default)]
    pub indicator: Option<String>,
    /// Barcode
    #[serde(default)]
    pub barcode: Option<String>,
}

impl ContainerKey {
    /// Build a key, treating blank parts as absent
    #[must_use]
    pub fn new(
        container_type: Option<&str>,
        indicator: Option<&str>,
        barcode: Option<&str>,
    ) -> Self {
        let clean = |part: Option<&str>| {
            part.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };
        Self {
            container_type: clean(container_type),
            indicator: clean(indicator),
            barcode: clean(barcode),
        }
    }

    /// All three parts are absent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.container_type.is_none() && self.indicator.is_none() && self.barcode.is_none()
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.container_type, &self.indicator]
            .into_iter()
            .filter_map(Option::as_deref)
            .collect();
        f.write_str(&parts.join(" "))?;
        if let Some(barcode) = &self.barcode {
            write!(f, " [{barcode}]")?;
        }
        Ok(())
    }
}

/// Sub container of an instance: container link plus child container shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubContainer {
    /// Linked top container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_container: Option<ContainerRef>,
    /// Second level type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_2: Option<String>,
    /// Second level indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_2: Option<String>,
    /// Second level barcode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_2: Option<String>,
    /// Third level type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_3: Option<String>,
    /// Third level indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_3: Option<String>,
}

impl SubContainer {
    fn slot(&self, key: &str) -> Option<&Option<String>> {
        match key {
            "type_2" => Some(&self.type_2),
            "indicator_2" => Some(&self.indicator_2),
            "barcode_2" => Some(&self.barcode_2),
            "type_3" => Some(&self.type_3),
            "indicator_3" => Some(&self.indicator_3),
            _ => None,
        }
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "type_2" => Some(&mut self.type_2),
            "indicator_2" => Some(&mut self.indicator_2),
            "barcode_2" => Some(&mut self.barcode_2),
            "type_3" => Some(&mut self.type_3),
            "indicator_3" => Some(&mut self.indicator_3),
            _ => None,
        }
    }

    /// Read a child container field by storage key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.slot(key).and_then(Option::as_deref)
    }

    /// Write a child container field; returns whether the value changed
    pub fn set(&mut self, key: &str, value: Option<String>) -> bool {
        match self.slot_mut(key) {
            Some(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        }
    }
}

/// Instance linking a record to a physical container or digital object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance type code
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Physical container link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_container: Option<SubContainer>,
    /// Digital object link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_object: Option<String>,
}

impl Instance {
    /// Instance type code reserved for digital object links
    pub const DIGITAL_OBJECT: &'static str = "digital_object";

    /// Digital object instances are never exposed as sheet columns
    #[must_use]
    pub fn is_digital_object(&self) -> bool {
        self.instance_type.as_deref() == Some(Self::DIGITAL_OBJECT)
    }

    /// Linked top container, if any
    #[must_use]
    pub fn top_container(&self) -> Option<&ContainerRef> {
        self.sub_container.as_ref()?.top_container.as_ref()
    }
}

/// Subnote of a multipart note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "jsonmodel_type")]
pub enum Subnote {
    /// Free text body
    #[serde(rename = "note_text")]
    Text {
        /// Body text
        #[serde(default)]
        content: String,
    },
    /// Ordered list
    #[serde(rename = "note_orderedlist")]
    OrderedList {
        /// List title
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Items
        #[serde(default)]
        items: Vec<String>,
    },
    /// Chronology
    #[serde(rename = "note_chronology")]
    Chronology {
        /// Chronology title
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Events, kept opaque
        #[serde(default)]
        items: Vec<Value>,
    },
    /// Any other subnote kind, kept as raw JSON
    #[serde(untagged)]
    Other(Value),
}

/// Multipart note: typed, with ordered subnotes and extra properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipartNote {
    /// Note type code
    #[serde(rename = "type")]
    pub note_type: String,
    /// Ordered subnotes
    #[serde(default)]
    pub subnotes: Vec<Subnote>,
    /// Remaining properties (publish, rights restriction bag, ...)
    #[serde(flatten)]
    pub properties: FieldMap,
}

impl MultipartNote {
    /// Create an empty multipart note of the given type
    #[must_use]
    pub fn new(note_type: NoteType) -> Self {
        Self {
            note_type: note_type.code().to_string(),
            subnotes: Vec::new(),
            properties: FieldMap::new(),
        }
    }

    /// Body of the first text subnote
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.subnotes.iter().find_map(|subnote| match subnote {
            Subnote::Text { content } => Some(content.as_str()),
            _ => None,
        })
    }

    /// Mutable body of the first text subnote
    pub fn first_text_mut(&mut self) -> Option<&mut String> {
        self.subnotes.iter_mut().find_map(|subnote| match subnote {
            Subnote::Text { content } => Some(content),
            _ => None,
        })
    }
}

/// Single part note, carried through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinglepartNote {
    /// Note type code
    #[serde(rename = "type")]
    pub note_type: String,
    /// Content paragraphs
    #[serde(default)]
    pub content: Vec<String>,
    /// Remaining properties
    #[serde(flatten)]
    pub properties: FieldMap,
}

/// Note attached to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "jsonmodel_type")]
pub enum Note {
    /// Multipart note
    #[serde(rename = "note_multipart")]
    Multipart(MultipartNote),
    /// Single part note
    #[serde(rename = "note_singlepart")]
    Singlepart(SinglepartNote),
    /// Any other note kind, kept as raw JSON
    #[serde(untagged)]
    Other(Value),
}

impl Note {
    /// Multipart note of the given type, if this is one
    #[must_use]
    pub fn as_multipart_of(&self, note_type: NoteType) -> Option<&MultipartNote> {
        match self {
            Self::Multipart(note) if note.note_type == note_type.code() => Some(note),
            _ => None,
        }
    }
}

/// Minimal identity of a record, used for pre-flight checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Record id
    pub id: RecordId,
    /// Parent aggregate id
    pub resource_id: RecordId,
}

/// Hierarchical archival record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record id
    pub id: RecordId,
    /// Record URI
    #[serde(default)]
    pub uri: String,
    /// Parent aggregate id
    pub resource_id: RecordId,
    /// Optimistic concurrency token
    #[serde(default)]
    pub lock_version: u64,
    /// Human display string
    #[serde(default)]
    pub display_string: String,
    /// Date subrecords
    #[serde(default)]
    pub dates: Vec<FieldMap>,
    /// Extent subrecords
    #[serde(default)]
    pub extents: Vec<FieldMap>,
    /// Instances
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Notes
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Root scalar properties (title, level, publish, ...)
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Record {
    /// Create an empty record under a parent aggregate
    #[must_use]
    pub fn new(id: RecordId, resource_id: RecordId) -> Self {
        Self {
            id,
            uri: format!("/repositories/2/archival_objects/{id}"),
            resource_id,
            lock_version: 0,
            display_string: String::new(),
            dates: Vec::new(),
            extents: Vec::new(),
            instances: Vec::new(),
            notes: Vec::new(),
            fields: FieldMap::new(),
        }
    }

    /// Header for pre-flight checks
    #[must_use]
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            id: self.id,
            resource_id: self.resource_id,
        }
    }

    /// Value of a root property, including the identity columns
    #[must_use]
    pub fn root_value(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::from(self.id)),
            "lock_version" => Some(Value::from(self.lock_version)),
            _ => self.fields.get(key).filter(|v| !v.is_null()).cloned(),
        }
    }

    /// Set a root property; `Null` removes it. Returns whether anything changed.
    pub fn set_root_value(&mut self, key: &str, value: Value) -> bool {
        if value.is_null() {
            return self.fields.shift_remove(key).is_some_and(|old| !old.is_null());
        }
        if self.fields.get(key) == Some(&value) {
            return false;
        }
        self.fields.insert(key.to_string(), value);
        true
    }

    /// Subrecords of a kind
    #[must_use]
    pub fn subrecords(&self, kind: SubrecordKind) -> &[FieldMap] {
        match kind {
            SubrecordKind::Date => &self.dates,
            SubrecordKind::Extent => &self.extents,
        }
    }

    /// Mutable subrecords of a kind
    pub fn subrecords_mut(&mut self, kind: SubrecordKind) -> &mut Vec<FieldMap> {
        match kind {
            SubrecordKind::Date => &mut self.dates,
            SubrecordKind::Extent => &mut self.extents,
        }
    }

    /// Instances shown in the sheet, i.e. everything but digital objects
    pub fn sheet_instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(|i| !i.is_digital_object())
    }

    /// Multipart notes of one type, in stored order
    pub fn notes_of(&self, note_type: NoteType) -> impl Iterator<Item = &MultipartNote> {
        self.notes
            .iter()
            .filter_map(move |note| note.as_multipart_of(note_type))
    }
}

/// Value of a single spreadsheet cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Blank cell
    #[default]
    Empty,
    /// Text
    String(String),
    /// Number
    Number(f64),
    /// Boolean
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
}

impl CellValue {
    /// Trimmed text form; `None` when the cell is blank
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Cell is blank or whitespace only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
