use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown slot: {name}")]
    UnknownSlot { name: String },

    #[error("unknown attachment '{attachment}' for slot '{slot}'")]
    UnknownAttachment { slot: String, attachment: String },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("bone '{bone}' references parent index {parent} which is not declared before it")]
    InvalidBoneParent { bone: String, parent: usize },

    #[error("{kind} '{name}' references {reference} index {index} out of range")]
    InvalidReference {
        kind: &'static str,
        name: String,
        reference: &'static str,
        index: usize,
    },

    #[error("{kind} '{name}' must constrain {expected} bones, found {found}")]
    InvalidConstraintBones {
        kind: &'static str,
        name: String,
        expected: &'static str,
        found: usize,
    },

    #[error("constraint order {order} is used more than once")]
    DuplicateConstraintOrder { order: usize },
}
