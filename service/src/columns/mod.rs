//! Sheet columns
//!
//! A column is described once by a [`ColumnDescriptor`]; its machine path
//! (the second header row) is produced and parsed by [`path`], and
//! enumerated values travel through the sheet as `label [code]`.

pub mod catalog;
pub mod descriptor;
pub mod enums;
pub mod path;
pub mod value;

pub use catalog::{ColumnCatalog, ColumnSelection, STANDARD_CATALOG};
pub use descriptor::{ColumnDescriptor, ContainerPart, InstanceField, OwnerKind, ValueKind};
pub use enums::EnumCodec;
pub use path::MachinePath;
pub use value::ValueError;
