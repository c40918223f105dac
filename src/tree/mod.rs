//! Ordered folder trees (page folders, favorite folders)

mod drop;
mod folder;
mod store;


pub use drop::DropTarget;
pub use folder::{DeletePolicy, Folder, FolderId, TreeItem, TreeLeaf};
pub use store::TreeSnapshot;
