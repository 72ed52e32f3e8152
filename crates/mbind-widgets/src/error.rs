#![forbid(unsafe_code)]

use mbind_runtime::{TreeError, ViewId};

/// Failure to set up or update a list view.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListError {
    #[error("list view {0:?} does not exist or was destroyed")]
    UnknownList(ViewId),
    #[error("template {template:?} is not a child of list view {list:?}")]
    TemplateNotChild { list: ViewId, template: ViewId },
    #[error("template type {0:?} declares no Item field")]
    TemplateWithoutItem(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
}
