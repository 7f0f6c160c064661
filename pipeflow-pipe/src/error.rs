use crate::pipe::PipeId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{pipe} has no field list, records cannot be converted")]
    MissingFields { pipe: PipeId },
    #[error("{pipe} already carries a different field list")]
    FieldsConflict { pipe: PipeId },
    #[error("field `{field}` appears more than once in the field list")]
    DuplicateField { field: String },
}

impl Error {
    pub fn missing_fields(pipe: PipeId) -> Self {
        Self::MissingFields { pipe }
    }

    pub fn fields_conflict(pipe: PipeId) -> Self {
        Self::FieldsConflict { pipe }
    }

    pub fn duplicate_field(field: impl Into<String>) -> Self {
        Self::DuplicateField {
            field: field.into(),
        }
    }
}
