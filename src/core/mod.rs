//! Archive, codec and catalog building blocks behind [`crate::Package`]

pub mod archive;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod naming;
pub mod options;
