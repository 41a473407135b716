//! Phenotype request records: identity, lifecycle and merge rules

mod ids;
mod record;
mod status;


pub use ids::{IssueNumber, PhenotypeId, LOCAL_ID_PREFIX};
pub use record::{canonicalize, name_key, Phenotype, DESCRIPTION_DELIMITER, NO_PARENT};
pub use status::{ParseStatusError, Status, TransitionError};
